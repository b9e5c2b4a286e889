//! Storage driver (spec §4.8): atomic file write, backup rotation, and a
//! coordinated variant for shared/synced directories.

use crate::error::{Result, VaultError};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

/// A reference to one rotated backup on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRef {
    pub path: PathBuf,
}

pub trait StorageDriver {
    fn read(&self) -> Result<Vec<u8>>;
    fn write(&self, bytes: &[u8]) -> Result<()>;
    fn delete(&self) -> Result<()>;
    fn backup(&self) -> Result<BackupRef>;
    fn restore(&self, backup: &BackupRef) -> Result<()>;
    fn list_backups(&self) -> Result<Vec<BackupRef>>;
    fn delete_backup(&self, backup: &BackupRef) -> Result<()>;
}

/// Plain local-filesystem storage: atomic write-and-rename, a sibling
/// `Backups/` directory, retention of the `max_backups` most recent copies.
pub struct FileStorageDriver {
    path: PathBuf,
    backup_dir: PathBuf,
    max_backups: usize,
}

impl FileStorageDriver {
    #[must_use]
    pub fn new(path: PathBuf, max_backups: usize) -> Self {
        let backup_dir = path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("Backups");
        Self {
            path,
            backup_dir,
            max_backups,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn atomic_write(target: &Path, bytes: &[u8]) -> Result<()> {
        let dir = target.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;
        let tmp_path = dir.join(format!(".{}.tmp-{}", file_stem(target), Uuid::new_v4()));

        let write_result = (|| -> Result<()> {
            let mut file = File::create(&tmp_path)?;
            file.write_all(bytes)?;
            file.sync_all()?;
            Ok(())
        })();

        if write_result.is_err() {
            let _ = fs::remove_file(&tmp_path);
            return write_result;
        }

        if target.exists() {
            let _ = fs::remove_file(target);
        }
        if let Err(e) = fs::rename(&tmp_path, target) {
            let _ = fs::remove_file(&tmp_path);
            return Err(VaultError::Io(e));
        }
        Ok(())
    }

    fn backup_filename(now: OffsetDateTime) -> Result<String> {
        let rfc3339 = now
            .format(&time::format_description::well_known::Rfc3339)
            .map_err(|_| VaultError::Coordination("failed to format backup timestamp".into()))?;
        let safe = rfc3339.replace(':', "-");
        Ok(format!("DodoPass-{safe}-{}.vaultdb", now.unix_timestamp()))
    }
}

fn file_stem(path: &Path) -> String {
    path.file_name().and_then(|n| n.to_str()).unwrap_or("vault").to_string()
}

impl StorageDriver for FileStorageDriver {
    fn read(&self) -> Result<Vec<u8>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // A reader that finds the target momentarily missing (mid
                // rename elsewhere) retries once (spec §4.8).
                thread::sleep(Duration::from_millis(20));
                Ok(fs::read(&self.path)?)
            }
            Err(e) => Err(VaultError::Io(e)),
        }
    }

    fn write(&self, bytes: &[u8]) -> Result<()> {
        Self::atomic_write(&self.path, bytes)
    }

    fn delete(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(VaultError::Io(e)),
        }
    }

    fn backup(&self) -> Result<BackupRef> {
        fs::create_dir_all(&self.backup_dir)?;
        let now = OffsetDateTime::now_utc();
        let filename = Self::backup_filename(now)?;
        let backup_path = self.backup_dir.join(filename);
        let bytes = self.read()?;
        Self::atomic_write(&backup_path, &bytes)?;
        self.rotate_backups()?;
        Ok(BackupRef { path: backup_path })
    }

    fn restore(&self, backup: &BackupRef) -> Result<()> {
        let bytes = fs::read(&backup.path)?;
        Self::atomic_write(&self.path, &bytes)
    }

    fn list_backups(&self) -> Result<Vec<BackupRef>> {
        if !self.backup_dir.exists() {
            return Ok(Vec::new());
        }
        let mut refs = Vec::new();
        for entry in fs::read_dir(&self.backup_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_file() && path.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.starts_with("DodoPass-")) {
                refs.push(BackupRef { path });
            }
        }
        Ok(refs)
    }

    fn delete_backup(&self, backup: &BackupRef) -> Result<()> {
        match fs::remove_file(&backup.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(VaultError::Io(e)),
        }
    }
}

impl FileStorageDriver {
    /// Oldest-first deletion beyond `max_backups`, using the filename's
    /// embedded unix timestamp with file mtime as tiebreaker (spec §4.8).
    fn rotate_backups(&self) -> Result<()> {
        let mut backups = self.list_backups()?;
        if backups.len() <= self.max_backups {
            return Ok(());
        }

        backups.sort_by_key(|b| {
            let ts = extract_timestamp(&b.path);
            let mtime = fs::metadata(&b.path)
                .and_then(|m| m.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
            (ts, mtime)
        });

        let overflow = backups.len() - self.max_backups;
        for backup in &backups[..overflow] {
            let _ = fs::remove_file(&backup.path);
        }
        Ok(())
    }
}

fn extract_timestamp(path: &Path) -> i64 {
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.rsplit('-').next())
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(0)
}

/// A cooperative coordination primitive for a shared/synced directory: no
/// other coordinated writer may be mid-operation while this one proceeds
/// (spec §4.8). Implemented with an exclusive lockfile sibling to the vault;
/// this is advisory, not kernel-enforced, matching "cooperative" in the
/// spec's own wording.
pub struct CoordinatedStorageDriver<D: StorageDriver> {
    inner: D,
    lock_path: PathBuf,
}

impl<D: StorageDriver> CoordinatedStorageDriver<D> {
    pub fn new(inner: D, lock_path: PathBuf) -> Self {
        Self { inner, lock_path }
    }

    fn with_lock<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let mut guard = LockGuard::acquire(&self.lock_path)?;
        let result = f();
        guard.release();
        result
    }
}

struct LockGuard<'a> {
    path: &'a Path,
    held: bool,
}

impl<'a> LockGuard<'a> {
    fn acquire(path: &'a Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => {
                    VaultError::Coordination("another coordinated writer is mid-operation".into())
                }
                _ => VaultError::Io(e),
            })?;
        Ok(Self { path, held: true })
    }

    fn release(&mut self) {
        if self.held {
            let _ = fs::remove_file(self.path);
            self.held = false;
        }
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<D: StorageDriver> StorageDriver for CoordinatedStorageDriver<D> {
    fn read(&self) -> Result<Vec<u8>> {
        self.with_lock(|| self.inner.read())
    }

    fn write(&self, bytes: &[u8]) -> Result<()> {
        self.with_lock(|| self.inner.write(bytes))
    }

    fn delete(&self) -> Result<()> {
        self.with_lock(|| self.inner.delete())
    }

    fn backup(&self) -> Result<BackupRef> {
        self.with_lock(|| self.inner.backup())
    }

    fn restore(&self, backup: &BackupRef) -> Result<()> {
        self.with_lock(|| self.inner.restore(backup))
    }

    fn list_backups(&self) -> Result<Vec<BackupRef>> {
        self.with_lock(|| self.inner.list_backups())
    }

    fn delete_backup(&self, backup: &BackupRef) -> Result<()> {
        self.with_lock(|| self.inner.delete_backup(backup))
    }
}
