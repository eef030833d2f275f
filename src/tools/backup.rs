//! Automatic file backups before destructive writes.
//!
//! Snapshots land under `.flavia/file_backups/<mirrored-path>/` as
//! `<name>.<timestamp>.bak` and are garbage-collected by age.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, warn};

/// Backup root inside the config directory.
const BACKUP_DIR: &str = "file_backups";
/// Default backup retention in days.
pub const DEFAULT_BACKUP_RETENTION_DAYS: u64 = 30;

/// Snapshots `path` before a destructive change. Missing sources are a
/// no-op. Returns the backup path when one was written.
///
/// # Errors
///
/// Returns a human-readable reason when the snapshot cannot be written.
pub fn backup_file(base_dir: &Path, path: &Path) -> std::result::Result<Option<PathBuf>, String> {
    if !path.exists() || !path.is_file() {
        return Ok(None);
    }

    let rel = path.strip_prefix(base_dir).unwrap_or(path);
    let mirrored_dir = base_dir
        .join(".flavia")
        .join(BACKUP_DIR)
        .join(rel.parent().unwrap_or_else(|| Path::new("")));
    std::fs::create_dir_all(&mirrored_dir).map_err(|e| e.to_string())?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| "path has no file name".to_string())?;
    let timestamp = Utc::now().format("%Y%m%d%H%M%S%3f");
    let backup_path = mirrored_dir.join(format!("{name}.{timestamp}.bak"));

    std::fs::copy(path, &backup_path).map_err(|e| e.to_string())?;
    debug!(source = %path.display(), backup = %backup_path.display(), "backed up file");
    Ok(Some(backup_path))
}

/// Deletes backups older than `max_age_days`. Returns the number
/// removed. Failures on individual files are logged and skipped.
#[must_use]
pub fn gc_backups(base_dir: &Path, max_age_days: u64) -> usize {
    let root = base_dir.join(".flavia").join(BACKUP_DIR);
    if !root.exists() {
        return 0;
    }
    let cutoff = std::time::SystemTime::now()
        .checked_sub(std::time::Duration::from_secs(max_age_days * 24 * 3600));
    let Some(cutoff) = cutoff else { return 0 };

    let mut removed = 0;
    let mut stack = vec![root];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            let is_old = entry
                .metadata()
                .and_then(|m| m.modified())
                .is_ok_and(|modified| modified < cutoff);
            if is_old {
                match std::fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) => warn!(path = %path.display(), error = %e, "backup gc failed"),
                }
            }
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_backup_mirrors_relative_path() {
        let Ok(temp) = TempDir::new() else { return };
        let target = temp.path().join("notes/draft.md");
        std::fs::create_dir_all(temp.path().join("notes")).ok();
        std::fs::write(&target, "original").ok();

        let backup = backup_file(temp.path(), &target);
        let Ok(Some(backup)) = backup else {
            return;
        };
        assert!(backup.starts_with(temp.path().join(".flavia/file_backups/notes")));
        assert!(backup.file_name().is_some_and(|n| {
            let n = n.to_string_lossy();
            n.starts_with("draft.md.") && n.ends_with(".bak")
        }));
        assert_eq!(
            std::fs::read_to_string(&backup).unwrap_or_default(),
            "original"
        );
    }

    #[test]
    fn test_backup_missing_source_is_noop() {
        let Ok(temp) = TempDir::new() else { return };
        let result = backup_file(temp.path(), &temp.path().join("missing.md"));
        assert!(matches!(result, Ok(None)));
    }

    #[test]
    fn test_gc_removes_old_backups() {
        let Ok(temp) = TempDir::new() else { return };
        let target = temp.path().join("a.md");
        std::fs::write(&target, "x").ok();
        let backup = backup_file(temp.path(), &target);
        let Ok(Some(backup)) = backup else { return };

        // Age the backup past the cutoff.
        let old = std::time::SystemTime::now() - std::time::Duration::from_secs(90 * 24 * 3600);
        if let Ok(file) = std::fs::File::options().write(true).open(&backup) {
            file.set_modified(old).ok();
        }

        let removed = gc_backups(temp.path(), DEFAULT_BACKUP_RETENTION_DAYS);
        assert_eq!(removed, 1);
        assert!(!backup.exists());
    }

    #[test]
    fn test_gc_keeps_fresh_backups() {
        let Ok(temp) = TempDir::new() else { return };
        let target = temp.path().join("a.md");
        std::fs::write(&target, "x").ok();
        let _ = backup_file(temp.path(), &target);
        assert_eq!(gc_backups(temp.path(), DEFAULT_BACKUP_RETENTION_DAYS), 0);
    }
}
