//! Digest function selection.
//!
//! The same algorithm is used twice per file: once for every block, and once
//! more over the concatenated block digests to produce the whole-file digest.

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::fmt;
use std::str::FromStr;

/// Supported digest algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    /// SHA-1 (20-byte digest, manifest `.sha1`)
    #[default]
    Sha1,
    /// BLAKE3 (32-byte digest, manifest `.b3`)
    Blake3,
}

impl DigestAlgorithm {
    /// Digest length in bytes
    #[must_use]
    pub fn output_len(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Blake3 => blake3::OUT_LEN,
        }
    }

    /// Name of the manifest file kept inside the target directory
    #[must_use]
    pub fn manifest_file_name(self) -> &'static str {
        match self {
            Self::Sha1 => ".sha1",
            Self::Blake3 => ".b3",
        }
    }

    /// Hash a byte slice in one shot
    #[must_use]
    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha1 => Sha1::digest(data).to_vec(),
            Self::Blake3 => blake3::hash(data).as_bytes().to_vec(),
        }
    }

    /// Start an incremental hasher
    #[must_use]
    pub fn hasher(self) -> StreamingDigest {
        match self {
            Self::Sha1 => StreamingDigest::Sha1(Sha1::new()),
            Self::Blake3 => StreamingDigest::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    /// Lowercase hex digest of the empty input.
    ///
    /// This is the whole-file digest of an empty file, which has no blocks.
    #[must_use]
    pub fn empty_digest_hex(self) -> String {
        self.hasher().finalize_hex()
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha1 => f.write_str("sha1"),
            Self::Blake3 => f.write_str("blake3"),
        }
    }
}

impl FromStr for DigestAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha1" | "sha-1" => Ok(Self::Sha1),
            "blake3" | "b3" => Ok(Self::Blake3),
            other => Err(format!("unknown digest algorithm '{other}'")),
        }
    }
}

/// Incremental hasher for the selected algorithm
pub enum StreamingDigest {
    /// SHA-1 state
    Sha1(Sha1),
    /// BLAKE3 state
    Blake3(Box<blake3::Hasher>),
}

impl StreamingDigest {
    /// Feed more bytes
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha1(h) => Digest::update(h, data),
            Self::Blake3(h) => {
                h.update(data);
            }
        }
    }

    /// Finish and return the raw digest
    #[must_use]
    pub fn finalize(self) -> Vec<u8> {
        match self {
            Self::Sha1(h) => h.finalize().to_vec(),
            Self::Blake3(h) => h.finalize().as_bytes().to_vec(),
        }
    }

    /// Finish and return the lowercase hex digest
    #[must_use]
    pub fn finalize_hex(self) -> String {
        hex::encode(self.finalize())
    }
}
