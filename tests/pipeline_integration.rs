//! Integration tests for the block-parallel hashing pipeline
//!
//! Tests for:
//! - Pipeline digest equals the single-threaded reference for any size
//! - Independence from pool size and completion interleaving
//! - Empty-file digest stability

use hashgen_files::{DigestAlgorithm, hash_file};
use hashgen_integration_tests::{reference_digest, sha1_digest, start_pool};
use proptest::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

const EMPTY_SHA1: &str = "da39a3ee5e6b4b0d3255bfef95601890afd80709";

fn temp_with(data: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(data).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_single_block_is_digest_of_digest() {
    let file = temp_with(b"hello world");
    let pool = start_pool(2);

    let digest = hash_file(&pool, file.path(), 1024).unwrap();
    assert_eq!(digest.blocks, 1);
    assert_eq!(digest.hex, hex::encode(sha1_digest(&sha1_digest(b"hello world"))));
}

#[test]
fn test_tiny_blocks_many_workers() {
    let data: Vec<u8> = (0..20_000u32).map(|i| (i * 7 % 256) as u8).collect();
    let file = temp_with(&data);
    let pool = start_pool(8);

    // 20,000 one-byte blocks keep every worker busy and completions interleaved.
    for _ in 0..3 {
        let digest = hash_file(&pool, file.path(), 1).unwrap();
        assert_eq!(digest.blocks, 20_000);
        assert_eq!(digest.hex, reference_digest(&data, 1));
    }

    let report = pool.shutdown().unwrap();
    assert_eq!(report.workers.len(), 8);
    assert_eq!(report.total_blocks(), 60_000);
}

#[test]
fn test_empty_file_digest_is_stable() {
    let file = temp_with(&[]);

    for workers in [1, 3] {
        let pool = start_pool(workers);
        for _ in 0..3 {
            let digest = hash_file(&pool, file.path(), 16).unwrap();
            assert_eq!(digest.hex, EMPTY_SHA1);
            assert_eq!(digest.hex, DigestAlgorithm::Sha1.empty_digest_hex());
        }
    }
}

#[test]
fn test_block_size_changes_digest() {
    let data = vec![0x11u8; 4096];
    let file = temp_with(&data);
    let pool = start_pool(2);

    let a = hash_file(&pool, file.path(), 1024).unwrap();
    let b = hash_file(&pool, file.path(), 2048).unwrap();
    assert_ne!(a.hex, b.hex);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_pipeline_matches_sequential_reference(
        data in proptest::collection::vec(any::<u8>(), 1..8192),
        block_size in 1usize..1500,
        workers in 1usize..6,
    ) {
        let file = temp_with(&data);
        let pool = start_pool(workers);

        let digest = hash_file(&pool, file.path(), block_size).unwrap();
        prop_assert_eq!(digest.blocks, data.len().div_ceil(block_size) as u64);
        prop_assert_eq!(digest.bytes, data.len() as u64);
        prop_assert_eq!(digest.hex, reference_digest(&data, block_size));
    }
}
