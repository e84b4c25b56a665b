//! Manifest synchronization.
//!
//! A [`Synchronizer`] is opened once per run. Opening lists the target
//! directory, loads the manifest and computes the [`FileSets`]. The selected
//! [`SyncMode`] then removes orphans, hashes new (or all) files through the
//! worker pool and rewrites the manifest.
//!
//! Manifest rewrites are best-effort: a failed rewrite is logged and the run
//! continues. Failing to read a file that needs hashing aborts the run before
//! the manifest is rewritten.

use crate::DEFAULT_BLOCK_SIZE;
use crate::digest::DigestAlgorithm;
use crate::error::{HashgenError, Result};
use crate::manifest::{self, Manifest, WriteStrategy};
use crate::pipeline::hash_file;
use crate::pool::{PoolReport, WorkerPool};
use crate::progress::{ProgressSink, SyncEvent};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Which files get (re)hashed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Recompute {
    /// Every file in the directory
    All,
    /// Only files without a manifest entry
    #[default]
    New,
    /// Nothing; only meaningful together with `clear_orphans`
    None,
}

/// Synchronization mode for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncMode {
    /// Remove orphaned entries and rewrite the manifest before hashing
    pub clear_orphans: bool,
    /// Files to hash afterwards
    pub recompute: Recompute,
}

/// Synchronizer configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Block size used when splitting files
    pub block_size: usize,
    /// Digest algorithm; selects the manifest file name
    pub algorithm: DigestAlgorithm,
    /// How the manifest is rewritten
    pub write_strategy: WriteStrategy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            algorithm: DigestAlgorithm::default(),
            write_strategy: WriteStrategy::default(),
        }
    }
}

impl SyncConfig {
    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns [`HashgenError::InvalidConfig`] if the block size is zero.
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(HashgenError::InvalidConfig(
                "block size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Directory entries without a manifest record, and records without a file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSets {
    /// Present in the directory, absent from the manifest
    pub new_files: BTreeSet<String>,
    /// Present in the manifest, absent from the directory
    pub orphans: BTreeSet<String>,
}

impl FileSets {
    /// Diff a directory listing against a manifest
    #[must_use]
    pub fn diff(listing: &BTreeSet<String>, manifest: &Manifest) -> Self {
        let new_files = listing
            .iter()
            .filter(|name| !manifest.contains(name))
            .cloned()
            .collect();
        let orphans = manifest
            .names()
            .filter(|name| !listing.contains(*name))
            .map(str::to_string)
            .collect();

        Self { new_files, orphans }
    }
}

/// Outcome of a synchronization run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Files that had no manifest entry when the run started
    pub new_files: Vec<String>,
    /// Orphaned entries removed
    pub orphans_removed: Vec<String>,
    /// Files hashed, in processing order
    pub hashed: Vec<String>,
    /// Whether the last manifest rewrite succeeded
    pub manifest_written: bool,
    /// Entries in the manifest at the end of the run
    pub entries: usize,
}

/// Keeps one directory's manifest in step with its contents
#[derive(Debug)]
pub struct Synchronizer {
    dir: PathBuf,
    manifest_path: PathBuf,
    config: SyncConfig,
    listing: BTreeSet<String>,
    manifest: Manifest,
    sets: FileSets,
    report: SyncReport,
}

impl Synchronizer {
    /// List `dir`, load its manifest and compute the file sets
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the directory cannot
    /// be listed, or the manifest cannot be read or parsed.
    pub fn open<P: AsRef<Path>>(dir: P, config: SyncConfig) -> Result<Self> {
        config.validate()?;

        let dir = dir.as_ref().to_path_buf();
        let manifest_name = config.algorithm.manifest_file_name();
        let manifest_path = dir.join(manifest_name);

        let listing = list_directory(&dir, manifest_name)?;
        let manifest = Manifest::load(&manifest_path)?;
        let sets = FileSets::diff(&listing, &manifest);

        tracing::info!(
            dir = %dir.display(),
            files = listing.len(),
            entries = manifest.len(),
            new = sets.new_files.len(),
            orphans = sets.orphans.len(),
            "Directory scanned"
        );

        let report = SyncReport {
            new_files: sets.new_files.iter().cloned().collect(),
            ..SyncReport::default()
        };

        Ok(Self {
            dir,
            manifest_path,
            config,
            listing,
            manifest,
            sets,
            report,
        })
    }

    /// Target directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the manifest file
    #[must_use]
    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Directory listing, excluding the manifest itself
    #[must_use]
    pub fn listing(&self) -> &BTreeSet<String> {
        &self.listing
    }

    /// Current in-memory manifest
    #[must_use]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// New and orphaned names computed when the synchronizer was opened
    #[must_use]
    pub fn file_sets(&self) -> &FileSets {
        &self.sets
    }

    /// Run every phase selected by `mode` and return the report
    ///
    /// # Errors
    ///
    /// Returns an error if the pool uses a different algorithm than the
    /// manifest, or if hashing any file fails.
    pub fn run(
        mut self,
        mode: SyncMode,
        pool: &WorkerPool,
        progress: &mut dyn ProgressSink,
    ) -> Result<SyncReport> {
        if self.clear_phase(mode, progress) {
            return Ok(self.finish());
        }

        self.recompute(mode.recompute, pool, progress)?;
        Ok(self.finish())
    }

    /// Like [`run`](Self::run), but owns the pool.
    ///
    /// `start_pool` is only called once hashing is needed. The pool is shut
    /// down before returning, also when hashing fails; its report is returned
    /// alongside the run's.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be started, hashing fails, or the
    /// pool does not shut down cleanly. A hashing error takes precedence over
    /// a shutdown error.
    pub fn run_with<F>(
        mut self,
        mode: SyncMode,
        start_pool: F,
        progress: &mut dyn ProgressSink,
    ) -> Result<(SyncReport, Option<PoolReport>)>
    where
        F: FnOnce() -> Result<WorkerPool>,
    {
        if self.clear_phase(mode, progress) {
            return Ok((self.finish(), None));
        }

        let pool = start_pool()?;
        let hashed = self.recompute(mode.recompute, &pool, progress);
        let shutdown = pool.shutdown();
        hashed?;
        let pool_report = shutdown?;

        Ok((self.finish(), Some(pool_report)))
    }

    /// Clear orphans if `mode` asks for it; true when nothing is left to hash
    fn clear_phase(&mut self, mode: SyncMode, progress: &mut dyn ProgressSink) -> bool {
        if mode.clear_orphans {
            self.clear_orphans(progress);
        }
        mode.recompute == Recompute::None
    }

    /// Remove orphaned entries and rewrite the manifest immediately
    pub fn clear_orphans(&mut self, progress: &mut dyn ProgressSink) {
        progress.on_event(SyncEvent::RemovingOrphans {
            count: self.sets.orphans.len(),
        });
        self.remove_orphans();
        self.rewrite();
    }

    /// Remove orphans, hash the files selected by `which` and rewrite the
    /// manifest
    ///
    /// # Errors
    ///
    /// Returns an error if the pool's algorithm does not match the manifest
    /// or a file cannot be hashed. The manifest is not rewritten in that case.
    pub fn recompute(
        &mut self,
        which: Recompute,
        pool: &WorkerPool,
        progress: &mut dyn ProgressSink,
    ) -> Result<()> {
        if which == Recompute::None {
            return Ok(());
        }
        if pool.algorithm() != self.config.algorithm {
            return Err(HashgenError::InvalidConfig(format!(
                "pool hashes with {} but the manifest uses {}",
                pool.algorithm(),
                self.config.algorithm
            )));
        }

        self.remove_orphans();

        let targets: Vec<String> = match which {
            Recompute::All => self.listing.iter().cloned().collect(),
            _ => self.sets.new_files.iter().cloned().collect(),
        };

        for name in targets {
            progress.on_event(SyncEvent::Hashing { name: name.clone() });
            let digest = hash_file(pool, self.dir.join(&name), self.config.block_size)?;
            self.manifest.insert(name.as_str(), digest.hex);
            self.report.hashed.push(name);
        }

        self.rewrite();
        Ok(())
    }

    /// Rewrite the manifest file, logging instead of failing.
    ///
    /// Returns whether the rewrite succeeded.
    pub fn rewrite(&mut self) -> bool {
        let written = match self
            .manifest
            .store(&self.manifest_path, self.config.write_strategy)
        {
            Ok(records) => {
                tracing::debug!(path = %self.manifest_path.display(), records, "Manifest rewritten");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to rewrite manifest");
                false
            }
        };
        self.report.manifest_written = written;
        written
    }

    fn remove_orphans(&mut self) {
        for name in &self.sets.orphans {
            if self.manifest.remove(name).is_some() {
                self.report.orphans_removed.push(name.clone());
            }
        }
    }

    /// Consume the synchronizer and return its report
    #[must_use]
    pub fn finish(mut self) -> SyncReport {
        self.report.entries = self.manifest.len();
        tracing::info!(
            hashed = self.report.hashed.len(),
            orphans_removed = self.report.orphans_removed.len(),
            entries = self.report.entries,
            "Synchronization finished"
        );
        self.report
    }
}

/// Names of the regular files directly inside `dir`, excluding the manifest,
/// its temporary rewrite file and names the manifest format cannot hold
///
/// # Errors
///
/// Returns an error if the directory cannot be read.
pub fn list_directory(dir: &Path, manifest_name: &str) -> Result<BTreeSet<String>> {
    let temp_name = format!("{manifest_name}{}", manifest::TEMP_SUFFIX);
    let mut names = BTreeSet::new();

    for entry in fs::read_dir(dir).map_err(|e| HashgenError::io(dir, e))? {
        let entry = entry.map_err(|e| HashgenError::io(dir, e))?;
        let path = entry.path();

        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(raw) => {
                tracing::warn!(name = ?raw, "Skipping entry with non UTF-8 name");
                continue;
            }
        };
        if name == manifest_name || name == temp_name {
            continue;
        }
        if !manifest::is_recordable(&name) {
            tracing::warn!(name = ?name, "Skipping file whose name cannot be stored in the manifest");
            continue;
        }
        if !path.is_file() {
            tracing::debug!(name = %name, "Skipping non-file entry");
            continue;
        }

        names.insert(name);
    }

    Ok(names)
}
