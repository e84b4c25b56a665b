//! Whole-file hashing on top of the worker pool.
//!
//! One file at a time: the splitter feeds blocks into the pool, then exactly
//! as many results as blocks dispatched are collected and folded in index
//! order by the [`Aggregator`].

use crate::aggregator::Aggregator;
use crate::error::Result;
use crate::pool::WorkerPool;
use crate::splitter::BlockSplitter;
use std::path::Path;

/// Digest of one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigest {
    /// Lowercase hex whole-file digest
    pub hex: String,
    /// Number of blocks the file was split into
    pub blocks: u64,
    /// File size in bytes
    pub bytes: u64,
}

/// Hash one file using every worker in `pool`
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read, or if the pool
/// disconnects. When a read fails part-way, results for blocks already
/// dispatched are drained first so the pool is clean for the next file.
pub fn hash_file<P: AsRef<Path>>(pool: &WorkerPool, path: P, block_size: usize) -> Result<FileDigest> {
    let path = path.as_ref();
    let mut splitter = BlockSplitter::open(path, block_size)?;
    let mut bytes = 0u64;

    let split_result = loop {
        match splitter.next_block() {
            Ok(Some(block)) => {
                bytes += block.body.len() as u64;
                if let Err(e) = pool.dispatch(block) {
                    break Err(e);
                }
            }
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        }
    };

    let dispatched = splitter.blocks_emitted();

    if let Err(e) = split_result {
        tracing::debug!(path = %path.display(), dispatched, "Draining after failed split");
        for _ in 0..dispatched {
            if pool.next_result().is_err() {
                break;
            }
        }
        return Err(e);
    }

    let mut aggregator = Aggregator::new(pool.algorithm(), dispatched);
    while !aggregator.is_complete() {
        aggregator.insert(pool.next_result()?)?;
    }
    let hex = aggregator.finish()?;

    tracing::debug!(path = %path.display(), blocks = dispatched, bytes, digest = %hex, "File hashed");

    Ok(FileDigest {
        hex,
        blocks: dispatched,
        bytes,
    })
}
