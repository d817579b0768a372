//! The on-disk signature cache.
//!
//! One JSON file per package, validated on load against the format version
//! and the dependency fingerprint. Any mismatch, unreadable file, or parse
//! failure is a plain cache miss -- the caller re-extracts and overwrites.
//! Writes go through a temp file and rename, so a crash mid-write leaves
//! either the old record or none, never a torn one.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::extract::PackageSignatures;

/// Bumped whenever the serialized shape changes; older records then read
/// as misses.
pub const CACHE_FORMAT_VERSION: u32 = 1;

/// A cached extraction for one package version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub format_version: u32,
    pub package: String,
    pub version: String,
    /// Digest of the package version and its transitive pinned versions.
    pub fingerprint: String,
    /// Whether every method produced a signature at extraction time.
    pub complete: bool,
    pub signatures: PackageSignatures,
}

impl CacheRecord {
    pub fn new(
        package: impl Into<String>,
        version: impl Into<String>,
        fingerprint: impl Into<String>,
        complete: bool,
        signatures: PackageSignatures,
    ) -> Self {
        Self {
            format_version: CACHE_FORMAT_VERSION,
            package: package.into(),
            version: version.into(),
            fingerprint: fingerprint.into(),
            complete,
            signatures,
        }
    }
}

/// A directory of per-package cache records.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn record_path(&self, package: &str) -> PathBuf {
        // Package names are filesystem-safe except for path separators.
        let safe = package.replace(['/', '\\'], "_");
        self.dir.join(format!("{safe}.json"))
    }

    /// Persist a record, atomically with respect to concurrent readers.
    pub fn save(&self, record: &CacheRecord) -> Result<(), String> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| format!("failed to create cache dir {}: {}", self.dir.display(), e))?;
        let content = serde_json::to_string_pretty(record)
            .map_err(|e| format!("failed to serialize cache record: {}", e))?;
        let path = self.record_path(&record.package);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, content)
            .map_err(|e| format!("failed to write {}: {}", tmp.display(), e))?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| format!("failed to move cache record into place: {}", e))
    }

    /// Load a record when it exists and matches the expected fingerprint.
    /// Every failure mode is a miss.
    pub fn load(&self, package: &str, fingerprint: &str) -> Option<CacheRecord> {
        let content = std::fs::read_to_string(self.record_path(package)).ok()?;
        let record: CacheRecord = serde_json::from_str(&content).ok()?;
        if record.format_version != CACHE_FORMAT_VERSION
            || record.package != package
            || record.fingerprint != fingerprint
        {
            return None;
        }
        Some(record)
    }

    /// Drop a package's record, if any. Missing is not an error.
    pub fn invalidate(&self, package: &str) -> Result<(), String> {
        let path = self.record_path(package);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(format!("failed to remove {}: {}", path.display(), e)),
        }
    }
}
