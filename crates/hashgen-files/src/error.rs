//! Error types for hashing and manifest operations

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while hashing files or synchronizing a manifest
#[derive(Debug, Error)]
pub enum HashgenError {
    /// File or directory I/O failed
    #[error("I/O error on {path:?}: {source}")]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// A manifest line could not be parsed
    #[error("Malformed manifest line {line}: {reason}")]
    ManifestParse {
        /// 1-based line number
        line: usize,
        /// What was wrong with the line
        reason: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Worker channels closed while blocks were still outstanding
    #[error("Worker pool disconnected")]
    PoolDisconnected,

    /// A worker thread panicked
    #[error("Worker {id} panicked")]
    WorkerPanicked {
        /// Worker identity
        id: usize,
    },

    /// A worker could not be spawned
    #[error("Failed to spawn worker {id}: {source}")]
    WorkerSpawn {
        /// Worker identity
        id: usize,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// A block result did not fit the expected index range
    #[error("Unexpected block result {index} (expected {expected} blocks)")]
    BlockOrder {
        /// Offending index
        index: u64,
        /// Number of blocks dispatched
        expected: u64,
    },
}

impl HashgenError {
    /// Wrap an I/O error with the path it occurred on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for hashgen operations
pub type Result<T> = std::result::Result<T, HashgenError>;
