use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result, bail};
use chrono::Local;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Whole-file JSON persistence for one record list, with a timestamped
/// backup written before every overwrite.
#[derive(Debug, Clone)]
pub struct RecordStore {
    pub path: PathBuf,
    pub backup_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackupInfo {
    pub file_name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    #[serde(skip)]
    pub modified: SystemTime,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PruneReport {
    pub removed: usize,
    pub kept: usize,
    pub errors: Vec<String>,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            backup_dir: backup_dir.into(),
        }
    }

    /// Load the full record list. A missing file is not an error and yields
    /// an empty list; malformed content or a non-array document fails.
    pub fn load<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let records: Vec<T> = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", self.path.display()))?;
        Ok(records)
    }

    /// Persist the full record list, backing up any existing file first.
    /// The document is written to a sibling temp file and renamed into
    /// place so a crash mid-write never truncates the store.
    /// Returns the entry count written; callers log it.
    pub fn save<T: Serialize>(&self, records: &[T], backup: bool) -> Result<usize> {
        if backup && self.path.exists() {
            self.backup_existing()?;
        }
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let rendered =
            serde_json::to_string_pretty(records).context("failed to serialize record list")?;
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, rendered)
            .with_context(|| format!("failed to write {}", temp_path.display()))?;
        fs::rename(&temp_path, &self.path).with_context(|| {
            format!(
                "failed to move {} into place at {}",
                temp_path.display(),
                self.path.display()
            )
        })?;
        Ok(records.len())
    }

    /// Copy the current on-disk file to `{stem}_{YYYYMMDD_HHMMSS}{ext}`
    /// under the backup directory.
    pub fn backup_existing(&self) -> Result<PathBuf> {
        if !self.path.exists() {
            bail!("nothing to back up: {} does not exist", self.path.display());
        }
        fs::create_dir_all(&self.backup_dir)
            .with_context(|| format!("failed to create {}", self.backup_dir.display()))?;

        let stem = self
            .path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| "store".to_string());
        let extension = self
            .path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        // Saves can land within the same second; suffix instead of
        // overwriting the earlier backup.
        let base = format!("{stem}_{timestamp}");
        let mut backup_path = self.backup_dir.join(format!("{base}{extension}"));
        let mut counter = 1u32;
        while backup_path.exists() {
            backup_path = self.backup_dir.join(format!("{base}_{counter}{extension}"));
            counter += 1;
        }

        fs::copy(&self.path, &backup_path).with_context(|| {
            format!(
                "failed to back up {} to {}",
                self.path.display(),
                backup_path.display()
            )
        })?;
        Ok(backup_path)
    }
}

/// List backup files, newest first. A missing backup directory yields an
/// empty list.
pub fn list_backups(backup_dir: &Path) -> Result<Vec<BackupInfo>> {
    if !backup_dir.exists() {
        return Ok(Vec::new());
    }
    let mut backups = Vec::new();
    let entries = fs::read_dir(backup_dir)
        .with_context(|| format!("failed to read {}", backup_dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read {}", backup_dir.display()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let metadata = entry
            .metadata()
            .with_context(|| format!("failed to stat {}", path.display()))?;
        backups.push(BackupInfo {
            file_name: entry.file_name().to_string_lossy().to_string(),
            path,
            size_bytes: metadata.len(),
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        });
    }
    backups.sort_by(|left, right| right.modified.cmp(&left.modified));
    Ok(backups)
}

/// Remove backups older than `max_age_days`, always keeping at least
/// `keep_at_least` of the newest files. Per-file removal failures are
/// collected, never fatal.
pub fn prune_backups(backup_dir: &Path, max_age_days: u64, keep_at_least: usize) -> Result<PruneReport> {
    let backups = list_backups(backup_dir)?;
    // An age too large to represent keeps everything.
    let cutoff = max_age_days
        .checked_mul(24 * 60 * 60)
        .map(Duration::from_secs)
        .and_then(|age| SystemTime::now().checked_sub(age));

    let mut report = PruneReport::default();
    for (index, backup) in backups.iter().enumerate() {
        let stale = cutoff.is_some_and(|cutoff| backup.modified < cutoff);
        if index < keep_at_least || !stale {
            report.kept += 1;
            continue;
        }
        match fs::remove_file(&backup.path) {
            Ok(()) => report.removed += 1,
            Err(error) => report
                .errors
                .push(format!("{}: {}", backup.file_name, error)),
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ThemeRecord;
    use tempfile::tempdir;

    fn theme(repo: &str, name: &str) -> ThemeRecord {
        ThemeRecord {
            name: Some(name.to_string()),
            author: Some("X".to_string()),
            repo: Some(repo.to_string()),
            screenshot: Some("s.png".to_string()),
            modes: vec!["dark".to_string()],
            ..ThemeRecord::default()
        }
    }

    #[test]
    fn load_returns_empty_for_missing_file() {
        let temp = tempdir().expect("tempdir");
        let store = RecordStore::new(temp.path().join("themes.json"), temp.path().join("backups"));
        let records: Vec<ThemeRecord> = store.load().expect("load");
        assert!(records.is_empty());
    }

    #[test]
    fn load_fails_for_malformed_json() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("themes.json");
        fs::write(&path, "{not json").expect("write");
        let store = RecordStore::new(&path, temp.path().join("backups"));
        let error = store.load::<ThemeRecord>().expect_err("must fail");
        assert!(error.to_string().contains("failed to parse"));
    }

    #[test]
    fn load_fails_for_non_array_document() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("themes.json");
        fs::write(&path, r#"{"repo":"a/b"}"#).expect("write");
        let store = RecordStore::new(&path, temp.path().join("backups"));
        assert!(store.load::<ThemeRecord>().is_err());
    }

    #[test]
    fn save_then_load_round_trips() {
        let temp = tempdir().expect("tempdir");
        let store = RecordStore::new(temp.path().join("themes.json"), temp.path().join("backups"));
        let records = vec![theme("a/b", "Theme B"), theme("c/d", "Theme D")];
        let written = store.save(&records, true).expect("save");
        assert_eq!(written, 2);

        let loaded: Vec<ThemeRecord> = store.load().expect("load");
        assert_eq!(loaded, records);
        assert!(!store.path.with_extension("json.tmp").exists());
    }

    #[test]
    fn save_creates_parent_directories() {
        let temp = tempdir().expect("tempdir");
        let store = RecordStore::new(
            temp.path().join("nested/dir/themes.json"),
            temp.path().join("backups"),
        );
        store.save(&[theme("a/b", "B")], false).expect("save");
        assert!(store.path.exists());
    }

    #[test]
    fn save_backs_up_prior_content_exactly_once() {
        let temp = tempdir().expect("tempdir");
        let backup_dir = temp.path().join("backups");
        let store = RecordStore::new(temp.path().join("themes.json"), &backup_dir);

        store.save(&[theme("a/b", "B")], true).expect("first save");
        let before = fs::read_to_string(&store.path).expect("read");
        store
            .save(&[theme("a/b", "B"), theme("c/d", "D")], true)
            .expect("second save");

        let backups = list_backups(&backup_dir).expect("list");
        assert_eq!(backups.len(), 1);
        let backup_content = fs::read_to_string(&backups[0].path).expect("read backup");
        assert_eq!(backup_content, before);
        assert!(backups[0].file_name.starts_with("themes_"));
        assert!(backups[0].file_name.ends_with(".json"));
    }

    #[test]
    fn save_without_backup_leaves_backup_dir_absent() {
        let temp = tempdir().expect("tempdir");
        let backup_dir = temp.path().join("backups");
        let store = RecordStore::new(temp.path().join("themes.json"), &backup_dir);
        store.save(&[theme("a/b", "B")], false).expect("save");
        store.save(&[theme("c/d", "D")], false).expect("save again");
        assert!(!backup_dir.exists());
    }

    #[test]
    fn rapid_backups_never_overwrite_each_other() {
        let temp = tempdir().expect("tempdir");
        let backup_dir = temp.path().join("backups");
        let store = RecordStore::new(temp.path().join("themes.json"), &backup_dir);
        store.save(&[theme("a/b", "B")], false).expect("seed");

        let first = store.backup_existing().expect("first backup");
        let second = store.backup_existing().expect("second backup");
        assert_ne!(first, second);
        assert!(first.exists());
        assert!(second.exists());
        assert_eq!(list_backups(&backup_dir).expect("list").len(), 2);
    }

    #[test]
    fn prune_with_enormous_age_keeps_everything() {
        let temp = tempdir().expect("tempdir");
        let backup_dir = temp.path().join("backups");
        fs::create_dir_all(&backup_dir).expect("mkdir");
        for name in ["themes_20200101_000000.json", "themes_20200102_000000.json"] {
            fs::write(backup_dir.join(name), "[]").expect("write");
        }

        let report = prune_backups(&backup_dir, u64::MAX, 0).expect("prune");
        assert_eq!(report.removed, 0);
        assert_eq!(report.kept, 2);
    }

    #[test]
    fn prune_keeps_recent_and_minimum_count() {
        let temp = tempdir().expect("tempdir");
        let backup_dir = temp.path().join("backups");
        fs::create_dir_all(&backup_dir).expect("mkdir");
        for name in ["themes_20200101_000000.json", "themes_20200102_000000.json"] {
            fs::write(backup_dir.join(name), "[]").expect("write");
        }

        // Everything is newer than the cutoff, so nothing is removed.
        let report = prune_backups(&backup_dir, 30, 0).expect("prune");
        assert_eq!(report.removed, 0);
        assert_eq!(report.kept, 2);

        // Age zero makes everything stale, but keep_at_least holds one back.
        std::thread::sleep(Duration::from_millis(20));
        let report = prune_backups(&backup_dir, 0, 1).expect("prune");
        assert_eq!(report.removed, 1);
        assert_eq!(report.kept, 1);
        assert_eq!(list_backups(&backup_dir).expect("list").len(), 1);
    }
}
