//! Configuration file support for the hashgen CLI

use anyhow::Context;
use hashgen_files::{
    DEFAULT_BLOCK_SIZE, DEFAULT_QUEUE_CAPACITY, DigestAlgorithm, PoolConfig, SyncConfig,
    WriteStrategy,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Largest accepted block size (256 MiB)
const MAX_BLOCK_SIZE: usize = 256 * 1024 * 1024;

/// hashgen configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Hashing pipeline settings
    pub hashing: HashingConfig,
    /// Manifest settings
    pub manifest: ManifestConfig,
}

/// Hashing pipeline settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashingConfig {
    /// Block size in bytes
    pub block_size: usize,
    /// Worker count (0 = available parallelism minus reserved threads)
    pub workers: usize,
    /// Work queue capacity in blocks
    pub queue_capacity: usize,
    /// Digest algorithm
    pub algorithm: DigestAlgorithm,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            workers: 0,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            algorithm: DigestAlgorithm::default(),
        }
    }
}

/// Manifest settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestConfig {
    /// Rewrite strategy
    pub write_strategy: WriteStrategy,
}

impl Config {
    /// Default configuration file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hashgen")
            .join("config.toml")
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Load the default configuration file, or defaults if it does not exist
    pub fn load_or_default() -> anyhow::Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.hashing.block_size == 0 || self.hashing.block_size > MAX_BLOCK_SIZE {
            anyhow::bail!(
                "hashing.block_size must be between 1 and {} bytes, got {}",
                MAX_BLOCK_SIZE,
                self.hashing.block_size
            );
        }
        if self.hashing.queue_capacity == 0 {
            anyhow::bail!("hashing.queue_capacity must be greater than zero");
        }
        Ok(())
    }

    /// Worker pool settings
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            workers: self.hashing.workers,
            queue_capacity: self.hashing.queue_capacity,
            algorithm: self.hashing.algorithm,
        }
    }

    /// Synchronizer settings
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            block_size: self.hashing.block_size,
            algorithm: self.hashing.algorithm,
            write_strategy: self.manifest.write_strategy,
        }
    }
}
