//! # hashgen Files
//!
//! Block-parallel hashing and manifest synchronization for hashgen.
//!
//! This crate provides:
//! - Sequential block splitting with a configurable block size
//! - A fixed worker pool hashing blocks concurrently
//! - Order-preserving aggregation of block digests into a whole-file digest
//! - The `<digest>   <name>` manifest codec with sorted rewrites
//! - Directory/manifest diffing and the clear/recompute synchronization modes

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aggregator;
pub mod digest;
pub mod error;
pub mod manifest;
pub mod pipeline;
pub mod pool;
pub mod progress;
pub mod splitter;
pub mod sync;

pub use digest::DigestAlgorithm;
pub use error::{HashgenError, Result};
pub use manifest::{Manifest, WriteStrategy};
pub use pipeline::{FileDigest, hash_file};
pub use pool::{PoolConfig, PoolReport, PoolState, WorkerPool};
pub use progress::{NoopProgress, ProgressSink, SyncEvent};
pub use sync::{FileSets, Recompute, SyncConfig, SyncMode, SyncReport, Synchronizer};

/// Default block size (1,000,000 bytes).
///
/// Each block is hashed independently, so this bounds the memory held per
/// queued block and sets the granularity of parallelism within one file.
pub const DEFAULT_BLOCK_SIZE: usize = 1_000_000;

/// Default capacity of the shared work queue, in blocks.
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// Block of file content awaiting hashing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Zero-based position of the block within its file
    pub index: u64,
    /// Block content (never empty)
    pub body: Vec<u8>,
}

/// Digest of one block, emitted by a worker once the body has been hashed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDigest {
    /// Index of the block this digest belongs to
    pub index: u64,
    /// Raw digest bytes
    pub digest: Vec<u8>,
}
