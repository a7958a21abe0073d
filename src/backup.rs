//! Timestamped snapshots with a per-prefix "latest" pointer.
//!
//! # Naming
//!
//! ```text
//! <prefix><file-name>.<YYYYMMDDHHMMSS>      immutable snapshot
//! <prefix><file-name>.latest                pointer to the newest snapshot
//! ```
//!
//! On Unix the pointer is a relative symlink, so it keeps resolving if the
//! backup directory is moved. It is created under a temporary name and
//! renamed over the old pointer, which replaces it atomically. Elsewhere
//! the pointer is a small file holding the snapshot's name.

use crate::error::{Result, SetupError};
use std::fs::{self, File, FileTimes};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Snapshot of `.zshrc` taken before a setup run changes anything
pub const ORIGINAL_PREFIX: &str = "original-";
/// Snapshot taken before an `env` rollback
pub const BEFORE_ENV_PREFIX: &str = "zshrc.before-env.";
/// Snapshots taken before a `full` rollback
pub const BEFORE_FULL_PREFIX: &str = "zshrc.before-full.";

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
const LATEST_SUFFIX: &str = "latest";

#[derive(Debug, Clone)]
pub struct BackupManager {
    dir: PathBuf,
}

impl BackupManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copy `source` into the backup directory and repoint its latest
    /// pointer. Returns `None` if `source` does not exist.
    pub fn snapshot(&self, source: &Path, prefix: &str) -> Result<Option<PathBuf>> {
        if !source.is_file() {
            debug!("Nothing to back up at {:?}", source);
            return Ok(None);
        }
        let file_name = file_name(source)?;

        fs::create_dir_all(&self.dir).map_err(|e| SetupError::backup(&self.dir, e))?;

        let stamp = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
        let base = format!("{prefix}{file_name}.{stamp}");
        let mut name = base.clone();
        let mut n = 1;
        // two snapshots within one second must not overwrite each other
        while self.dir.join(&name).symlink_metadata().is_ok() {
            name = format!("{base}-{n}");
            n += 1;
        }

        let snapshot = self.dir.join(&name);
        if let Err(e) = copy_preserving(source, &snapshot) {
            // no half-written snapshot without a pointer
            let _ = fs::remove_file(&snapshot);
            return Err(SetupError::backup(source, e));
        }
        self.repoint(&self.pointer_path(prefix, &file_name), &name)
            .map_err(|e| SetupError::backup(&snapshot, e))?;

        info!("Backup created: {}", snapshot.display());
        Ok(Some(snapshot))
    }

    /// Resolve the latest snapshot of `source` taken under `prefix`.
    ///
    /// Returns `None` if there is no pointer or it dangles.
    pub fn latest(&self, source: &Path, prefix: &str) -> Option<PathBuf> {
        let file_name = file_name(source).ok()?;
        let pointer = self.pointer_path(prefix, &file_name);
        let meta = pointer.symlink_metadata().ok()?;

        let resolved = if meta.file_type().is_symlink() {
            let target = fs::read_link(&pointer).ok()?;
            self.dir.join(target)
        } else if cfg!(unix) {
            // a plain copy left behind by another tool
            pointer
        } else {
            let name = fs::read_to_string(&pointer).ok()?;
            self.dir.join(name.trim())
        };

        resolved.is_file().then_some(resolved)
    }

    /// Overwrite `target` with the contents and metadata of `snapshot`.
    pub fn restore(&self, snapshot: &Path, target: &Path) -> Result<()> {
        copy_preserving(snapshot, target).map_err(|e| SetupError::backup(snapshot, e))?;
        info!("Restored {} from {}", target.display(), snapshot.display());
        Ok(())
    }

    fn pointer_path(&self, prefix: &str, file_name: &str) -> PathBuf {
        self.dir.join(format!("{prefix}{file_name}.{LATEST_SUFFIX}"))
    }

    fn repoint(&self, pointer: &Path, snapshot_name: &str) -> std::io::Result<()> {
        let mut tmp_name = pointer.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);
        if tmp.symlink_metadata().is_ok() {
            fs::remove_file(&tmp)?;
        }

        #[cfg(unix)]
        std::os::unix::fs::symlink(snapshot_name, &tmp)?;
        #[cfg(not(unix))]
        fs::write(&tmp, snapshot_name)?;

        fs::rename(&tmp, pointer)
    }
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| SetupError::config(format!("{} has no file name", path.display())))
}

/// Copy contents, permissions and access/modification times.
fn copy_preserving(from: &Path, to: &Path) -> std::io::Result<()> {
    fs::copy(from, to)?;
    let meta = fs::metadata(from)?;
    let mut times = FileTimes::new();
    if let Ok(accessed) = meta.accessed() {
        times = times.set_accessed(accessed);
    }
    if let Ok(modified) = meta.modified() {
        times = times.set_modified(modified);
    }
    // setting explicit times needs ownership, not write access, so a
    // read-only copy can still be stamped
    File::open(to)?.set_times(times)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_snapshot_of_missing_file_is_none() {
        let dir = tempdir().unwrap();
        let backups = BackupManager::new(dir.path().join("backup"));
        let result = backups.snapshot(&dir.path().join(".zshrc"), ORIGINAL_PREFIX).unwrap();
        assert!(result.is_none());
        assert!(backups.latest(&dir.path().join(".zshrc"), ORIGINAL_PREFIX).is_none());
    }

    #[test]
    fn test_snapshot_name_and_content() {
        let dir = tempdir().unwrap();
        let source = dir.path().join(".zshrc");
        fs::write(&source, "alias g=git\n").unwrap();
        let backups = BackupManager::new(dir.path().join("backup"));

        let snapshot = backups.snapshot(&source, ORIGINAL_PREFIX).unwrap().unwrap();
        let name = snapshot.file_name().unwrap().to_string_lossy().to_string();
        let stamp = name.strip_prefix("original-.zshrc.").unwrap();

        assert_eq!(stamp.len(), 14);
        assert!(stamp.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(fs::read_to_string(&snapshot).unwrap(), "alias g=git\n");
    }

    #[test]
    fn test_snapshots_in_same_second_do_not_collide() {
        let dir = tempdir().unwrap();
        let source = dir.path().join(".zshrc");
        fs::write(&source, "one\n").unwrap();
        let backups = BackupManager::new(dir.path().join("backup"));

        let first = backups.snapshot(&source, "p-").unwrap().unwrap();
        fs::write(&source, "two\n").unwrap();
        let second = backups.snapshot(&source, "p-").unwrap().unwrap();

        assert_ne!(first, second);
        assert_eq!(fs::read_to_string(&first).unwrap(), "one\n");
        assert_eq!(fs::read_to_string(&second).unwrap(), "two\n");
    }

    #[test]
    fn test_latest_is_per_prefix() {
        let dir = tempdir().unwrap();
        let source = dir.path().join(".zshrc");
        fs::write(&source, "x\n").unwrap();
        let backups = BackupManager::new(dir.path().join("backup"));

        let original = backups.snapshot(&source, ORIGINAL_PREFIX).unwrap().unwrap();
        let before_env = backups.snapshot(&source, BEFORE_ENV_PREFIX).unwrap().unwrap();

        assert_eq!(backups.latest(&source, ORIGINAL_PREFIX), Some(original));
        assert_eq!(backups.latest(&source, BEFORE_ENV_PREFIX), Some(before_env));
    }

    #[cfg(unix)]
    #[test]
    fn test_latest_pointer_is_relative_symlink() {
        let dir = tempdir().unwrap();
        let source = dir.path().join(".zshrc");
        fs::write(&source, "x\n").unwrap();
        let backups = BackupManager::new(dir.path().join("backup"));
        let snapshot = backups.snapshot(&source, ORIGINAL_PREFIX).unwrap().unwrap();

        let pointer = dir.path().join("backup/original-.zshrc.latest");
        let target = fs::read_link(&pointer).unwrap();
        assert!(target.is_relative());
        assert_eq!(target, PathBuf::from(snapshot.file_name().unwrap()));
    }

    #[cfg(unix)]
    #[test]
    fn test_snapshot_preserves_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let source = dir.path().join(".zshrc");
        fs::write(&source, "x\n").unwrap();
        fs::set_permissions(&source, fs::Permissions::from_mode(0o600)).unwrap();
        let backups = BackupManager::new(dir.path().join("backup"));

        let snapshot = backups.snapshot(&source, ORIGINAL_PREFIX).unwrap().unwrap();
        let mode = fs::metadata(&snapshot).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(
            fs::metadata(&snapshot).unwrap().modified().unwrap(),
            fs::metadata(&source).unwrap().modified().unwrap()
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_snapshot_of_read_only_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let source = dir.path().join(".zshrc");
        fs::write(&source, "x\n").unwrap();
        fs::set_permissions(&source, fs::Permissions::from_mode(0o444)).unwrap();
        let backups = BackupManager::new(dir.path().join("backup"));

        let snapshot = backups.snapshot(&source, ORIGINAL_PREFIX).unwrap().unwrap();
        let mode = fs::metadata(&snapshot).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o444);
        assert_eq!(
            fs::metadata(&snapshot).unwrap().modified().unwrap(),
            fs::metadata(&source).unwrap().modified().unwrap()
        );
        assert_eq!(backups.latest(&source, ORIGINAL_PREFIX), Some(snapshot));
    }

    #[test]
    fn test_dangling_pointer_resolves_to_none() {
        let dir = tempdir().unwrap();
        let source = dir.path().join(".zshrc");
        fs::write(&source, "x\n").unwrap();
        let backups = BackupManager::new(dir.path().join("backup"));
        let snapshot = backups.snapshot(&source, ORIGINAL_PREFIX).unwrap().unwrap();

        fs::remove_file(snapshot).unwrap();
        assert!(backups.latest(&source, ORIGINAL_PREFIX).is_none());
    }

    #[test]
    fn test_restore_overwrites_target() {
        let dir = tempdir().unwrap();
        let source = dir.path().join(".zshrc");
        fs::write(&source, "original\n").unwrap();
        let backups = BackupManager::new(dir.path().join("backup"));
        let snapshot = backups.snapshot(&source, ORIGINAL_PREFIX).unwrap().unwrap();

        fs::write(&source, "modified\n").unwrap();
        backups.restore(&snapshot, &source).unwrap();
        assert_eq!(fs::read_to_string(&source).unwrap(), "original\n");
    }
}
