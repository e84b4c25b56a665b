//! Manifest codec and persistence.
//!
//! # Format
//!
//! One record per line, sorted ascending by file name:
//!
//! ```text
//! <digest_hex>   <file_name>\r\n
//! ```
//!
//! The separator is exactly three spaces. File names may contain spaces but
//! not the separator itself.

use crate::error::{HashgenError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Separator between digest and file name
pub const SEPARATOR: &str = "   ";

/// Record terminator
pub const LINE_TERMINATOR: &str = "\r\n";

/// Suffix of the temporary file used by atomic rewrites
pub const TEMP_SUFFIX: &str = ".tmp";

/// How the manifest file is rewritten
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStrategy {
    /// Write a temporary sibling file, then rename it over the manifest
    #[default]
    Atomic,
    /// Truncate the manifest and rewrite it line by line
    InPlace,
}

/// Name → digest mapping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: BTreeMap<String, String>,
}

impl Manifest {
    /// Create an empty manifest
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the manifest has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Digest recorded for `name`
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    /// Whether `name` has an entry
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Insert or replace an entry, returning the previous digest
    pub fn insert(&mut self, name: impl Into<String>, digest_hex: impl Into<String>) -> Option<String> {
        self.entries.insert(name.into(), digest_hex.into())
    }

    /// Remove an entry, returning its digest
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries.remove(name)
    }

    /// File names in ascending order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// `(name, digest)` pairs in ascending name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parse manifest text
    ///
    /// Accepts `\r\n` and `\n` terminators and a final line without one.
    ///
    /// # Errors
    ///
    /// Returns [`HashgenError::ManifestParse`] for the first line that does
    /// not split into exactly a hex digest and a non-empty name.
    pub fn parse(text: &str) -> Result<Self> {
        let mut manifest = Self::new();

        for (i, line) in text.lines().enumerate() {
            let fields: Vec<&str> = line.split(SEPARATOR).collect();
            let malformed = |reason: String| HashgenError::ManifestParse {
                line: i + 1,
                reason,
            };

            let [digest, name] = fields[..] else {
                return Err(malformed(format!("expected 2 fields, found {}", fields.len())));
            };
            if digest.is_empty() || hex::decode(digest).is_err() {
                return Err(malformed(format!("invalid digest '{digest}'")));
            }
            if name.is_empty() {
                return Err(malformed("empty file name".to_string()));
            }

            manifest.insert(name, digest.to_ascii_lowercase());
        }

        Ok(manifest)
    }

    /// Render every entry as sorted records
    #[must_use]
    pub fn render(&self) -> String {
        self.iter().map(|(name, digest)| record(name, digest)).collect()
    }

    /// Load a manifest file; a missing file is an empty manifest
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(text) => Self::parse(&text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(HashgenError::io(path, e)),
        }
    }

    /// Rewrite the manifest file, returning the number of records written
    ///
    /// With [`WriteStrategy::InPlace`], a record that fails to write is
    /// logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the file (or its temporary sibling) cannot be
    /// created, written or renamed.
    pub fn store<P: AsRef<Path>>(&self, path: P, strategy: WriteStrategy) -> Result<usize> {
        let path = path.as_ref();
        match strategy {
            WriteStrategy::Atomic => self.store_atomic(path),
            WriteStrategy::InPlace => self.store_in_place(path),
        }
    }

    fn store_atomic(&self, path: &Path) -> Result<usize> {
        let tmp = temp_path(path);
        fs::write(&tmp, self.render()).map_err(|e| HashgenError::io(&tmp, e))?;

        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(HashgenError::io(path, e));
        }

        Ok(self.len())
    }

    fn store_in_place(&self, path: &Path) -> Result<usize> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| HashgenError::io(path, e))?;

        let mut written = 0;
        for (name, digest) in self.iter() {
            match file.write_all(record(name, digest).as_bytes()) {
                Ok(()) => written += 1,
                Err(e) => tracing::warn!(file = name, error = %e, "Failed to write manifest record"),
            }
        }

        Ok(written)
    }
}

impl FromIterator<(String, String)> for Manifest {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Temporary sibling used by atomic rewrites of `path`
#[must_use]
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(TEMP_SUFFIX);
    path.with_file_name(name)
}

/// Whether `name` can be stored as a record and read back unchanged.
///
/// Names containing the separator or a line break cannot.
#[must_use]
pub fn is_recordable(name: &str) -> bool {
    !name.is_empty() && !name.contains(SEPARATOR) && !name.contains(['\r', '\n'])
}

fn record(name: &str, digest: &str) -> String {
    format!("{digest}{SEPARATOR}{name}{LINE_TERMINATOR}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    const D1: &str = "da39a3ee5e6b4b0d3255bfef95601890afd80709";
    const D2: &str = "a9993e364706816aba3e25717850c26c9cd0d89d";

    #[test]
    fn test_render_is_sorted_with_crlf() {
        let mut manifest = Manifest::new();
        manifest.insert("zeta", D1);
        manifest.insert("alpha", D2);

        assert_eq!(
            manifest.render(),
            format!("{D2}   alpha\r\n{D1}   zeta\r\n")
        );
    }

    #[test]
    fn test_empty_manifest_renders_nothing() {
        assert_eq!(Manifest::new().render(), "");
        assert!(Manifest::parse("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_accepts_lf_and_missing_final_terminator() {
        let text = format!("{D1}   a\n{D2}   b");
        let manifest = Manifest::parse(&text).unwrap();
        assert_eq!(manifest.get("a"), Some(D1));
        assert_eq!(manifest.get("b"), Some(D2));
    }

    #[test]
    fn test_parse_names_with_spaces() {
        let text = format!("{D1}   my file.txt\r\n{D2}    leading\r\n");
        let manifest = Manifest::parse(&text).unwrap();
        assert_eq!(manifest.get("my file.txt"), Some(D1));
        assert_eq!(manifest.get(" leading"), Some(D2));
    }

    #[test]
    fn test_parse_rejects_wrong_field_count() {
        let err = Manifest::parse(&format!("{D1}   a\r\n{D2} b\r\n")).unwrap_err();
        assert!(matches!(err, HashgenError::ManifestParse { line: 2, .. }));

        let err = Manifest::parse(&format!("{D1}   a   b\r\n")).unwrap_err();
        assert!(matches!(err, HashgenError::ManifestParse { line: 1, .. }));
    }

    #[test]
    fn test_parse_rejects_blank_line_and_bad_digest() {
        assert!(Manifest::parse(&format!("{D1}   a\r\n\r\n{D2}   b\r\n")).is_err());
        assert!(Manifest::parse("not-hex   a\r\n").is_err());
        assert!(Manifest::parse(&format!("{D1}   \r\n")).is_err());
    }

    #[test]
    fn test_load_missing_is_empty() {
        let dir = TempDir::new().unwrap();
        let manifest = Manifest::load(dir.path().join(".sha1")).unwrap();
        assert!(manifest.is_empty());
    }

    #[test]
    fn test_store_strategies_produce_identical_bytes() {
        let dir = TempDir::new().unwrap();
        let mut manifest = Manifest::new();
        manifest.insert("b", D1);
        manifest.insert("a", D2);

        let atomic = dir.path().join("atomic");
        let in_place = dir.path().join("in_place");
        assert_eq!(manifest.store(&atomic, WriteStrategy::Atomic).unwrap(), 2);
        assert_eq!(manifest.store(&in_place, WriteStrategy::InPlace).unwrap(), 2);

        assert_eq!(fs::read(&atomic).unwrap(), fs::read(&in_place).unwrap());
        assert!(!temp_path(&atomic).exists());
    }

    #[test]
    fn test_in_place_truncates_longer_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".sha1");
        fs::write(&path, "x".repeat(4096)).unwrap();

        let mut manifest = Manifest::new();
        manifest.insert("only", D1);
        manifest.store(&path, WriteStrategy::InPlace).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), format!("{D1}   only\r\n"));
    }

    #[test]
    fn test_is_recordable() {
        assert!(is_recordable("plain.txt"));
        assert!(is_recordable("two  spaces"));
        assert!(is_recordable(" leading"));
        assert!(!is_recordable("a   b"));
        assert!(!is_recordable("trailing   "));
        assert!(!is_recordable("line\nbreak"));
        assert!(!is_recordable("carriage\rreturn"));
        assert!(!is_recordable(""));
    }

    #[test]
    fn test_temp_path() {
        assert_eq!(
            temp_path(Path::new("/data/.sha1")),
            PathBuf::from("/data/.sha1.tmp")
        );
    }

    proptest! {
        #[test]
        fn prop_store_load_roundtrip(
            entries in proptest::collection::btree_map(
                "[a-zA-Z0-9._-]{1,8}( {1,2}[a-zA-Z0-9._-]{1,8}){0,2}",
                "[0-9a-f]{40}",
                0..20,
            )
        ) {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join(".sha1");
            let manifest: Manifest = entries.clone().into_iter().collect();

            manifest.store(&path, WriteStrategy::Atomic).unwrap();
            let loaded = Manifest::load(&path).unwrap();

            prop_assert_eq!(loaded.len(), entries.len());
            for (name, digest) in &entries {
                prop_assert_eq!(loaded.get(name), Some(digest.as_str()));
            }
        }
    }
}
