// src/services/backup.rs
//! Backups: timestamped, consistent copies of the fiche database.
//!
//! - Files are written as `<dir>/meddic_backup_YYYYMMDD_HHMMSS.db`; a second
//!   backup in the same second gets `_1`, `_2`, ... before the extension.
//! - The copy is taken with `VACUUM INTO`, so WAL content is included.
//! - Retention is decided from the timestamp in the file name, not mtime.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::BackupConfig;
use crate::error::{Error, Result};
use crate::services::store::FicheStore;

const PREFIX: &str = "meddic_backup_";
const SUFFIX: &str = ".db";
const STAMP: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, Clone)]
pub struct BackupReport {
    pub path: PathBuf,
    pub bytes: u64,
    /// Hex BLAKE3 digest of the backup file.
    pub digest: String,
}

/// Filesystem-backed backup directory (no DB handle of its own).
#[derive(Debug, Clone)]
pub struct Backups {
    dir: PathBuf,
    retention_days: u32,
}

impl Backups {
    /// Initialize the backup directory (idempotent).
    pub fn open(dir: impl Into<PathBuf>, retention_days: u32) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, retention_days })
    }

    pub fn from_config(cfg: &BackupConfig) -> Result<Self> {
        if !cfg.enabled {
            return Err(Error::Disabled("backup"));
        }
        Self::open(&cfg.dir, cfg.retention_days)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Snapshot the store into a new file stamped with `now`.
    pub fn create(&self, store: &FicheStore, now: DateTime<Utc>) -> Result<BackupReport> {
        let path = self.free_path(now);
        let target = path.to_string_lossy().into_owned();
        store.db.execute("VACUUM INTO ?1", [&target])?;

        let bytes = fs::read(&path)?;
        let digest = blake3::hash(&bytes).to_hex().to_string();
        tracing::info!(path = %path.display(), bytes = bytes.len(), %digest, "backup written");

        Ok(BackupReport {
            path,
            bytes: bytes.len() as u64,
            digest,
        })
    }

    /// First unused name for `now`. Existing snapshots are never replaced.
    fn free_path(&self, now: DateTime<Utc>) -> PathBuf {
        let base = self.dir.join(backup_file_name(now));
        if !base.exists() {
            return base;
        }
        let stem = format!("{PREFIX}{}", now.format(STAMP));
        (1u32..)
            .map(|n| self.dir.join(format!("{stem}_{n}{SUFFIX}")))
            .find(|p| !p.exists())
            .unwrap_or(base)
    }

    /// Backups in this directory, oldest first, with their stamped time.
    pub fn list(&self) -> Result<Vec<(PathBuf, NaiveDateTime)>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(stamp) = parse_backup_file_name(name) {
                out.push((path, stamp));
            }
        }
        out.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        Ok(out)
    }

    /// Delete backups stamped more than `retention_days` before `now`.
    /// Returns the removed paths. Files that are not backups are left alone.
    pub fn prune(&self, now: DateTime<Utc>) -> Result<Vec<PathBuf>> {
        let cutoff = now.naive_utc() - Duration::days(i64::from(self.retention_days));
        let mut removed = Vec::new();
        for (path, stamp) in self.list()? {
            if stamp < cutoff {
                fs::remove_file(&path)?;
                tracing::info!(path = %path.display(), "expired backup removed");
                removed.push(path);
            }
        }
        Ok(removed)
    }
}

pub fn backup_file_name(now: DateTime<Utc>) -> String {
    format!("{PREFIX}{}{SUFFIX}", now.format(STAMP))
}

fn parse_backup_file_name(name: &str) -> Option<NaiveDateTime> {
    let rest = name.strip_prefix(PREFIX)?.strip_suffix(SUFFIX)?;
    // YYYYMMDD_HHMMSS, optionally followed by _<n>
    let (stamp, seq) = rest.split_at_checked(15)?;
    if !seq.is_empty() {
        let n = seq.strip_prefix('_')?;
        if n.is_empty() || !n.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
    }
    NaiveDateTime::parse_from_str(stamp, STAMP).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn file_name_round_trips() {
        let now = Utc.with_ymd_and_hms(2024, 2, 29, 13, 5, 9).unwrap();
        let name = backup_file_name(now);
        assert_eq!(name, "meddic_backup_20240229_130509.db");
        assert_eq!(parse_backup_file_name(&name), Some(now.naive_utc()));
        assert_eq!(parse_backup_file_name("notes.txt"), None);
        assert_eq!(
            parse_backup_file_name("meddic_backup_20240229_130509_2.db"),
            Some(now.naive_utc())
        );
        assert_eq!(parse_backup_file_name("meddic_backup_20240229_130509_x.db"), None);
        assert_eq!(parse_backup_file_name("meddic_backup_20240229_130509_.db"), None);
    }
}
