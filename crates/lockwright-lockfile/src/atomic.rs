//! Atomic file operations with crash-safe guarantees.
//!
//! Provides:
//! - Exclusive file locking via fs2
//! - Atomic write via a temp file in the target directory + rename
//! - Integrity verification before commit

use crate::error::{LockfileError, Result};
use fs2::FileExt;
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use tracing::{debug, trace};

/// Lock file suffix appended to the target's file name.
const LOCK_SUFFIX: &str = "lck";

/// File lock acquisition timeout.
const LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of a successful atomic write.
#[derive(Debug)]
pub struct WriteResult {
    /// Path that was written.
    pub path: PathBuf,
    /// Number of bytes written.
    pub bytes_written: usize,
    /// SHA-256 of the content (hex).
    pub hash: String,
    /// Whether there was an existing file.
    pub had_existing: bool,
}

/// Write `contents` to `path` so readers see either the old file or the
/// complete new one.
///
/// An exclusive lock on `<path>.lck` is held for the duration of the write.
pub fn write_atomic(path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Result<WriteResult> {
    let target = path.as_ref();
    let contents = contents.as_ref();
    let _lock = acquire_lock(&lock_path(target))?;

    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    if !dir.exists() {
        fs::create_dir_all(&dir).map_err(|e| LockfileError::io(&dir, e))?;
    }

    debug!(target = %target.display(), bytes = contents.len(), "Starting atomic write");
    let expected = sha256_hex(contents);

    let mut temp = NamedTempFile::new_in(&dir).map_err(|e| LockfileError::io(&dir, e))?;
    temp.write_all(contents)
        .map_err(|e| LockfileError::io(temp.path(), e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| LockfileError::io(temp.path(), e))?;

    let written = fs::read(temp.path()).map_err(|e| LockfileError::io(temp.path(), e))?;
    let actual = sha256_hex(&written);
    if actual != expected {
        return Err(LockfileError::IntegrityError { expected, actual });
    }
    trace!("Temp file integrity verified");

    let had_existing = target.exists();
    temp.persist(target)
        .map_err(|e| LockfileError::io(target, e.error))?;

    #[cfg(unix)]
    if let Ok(parent) = File::open(&dir) {
        let _ = parent.sync_all();
    }

    debug!(target = %target.display(), "Atomic write completed");
    Ok(WriteResult {
        path: target.to_path_buf(),
        bytes_written: contents.len(),
        hash: expected,
        had_existing,
    })
}

/// Read `path` under a shared lock.
pub fn read_locked(path: impl AsRef<Path>) -> Result<String> {
    let target = path.as_ref();
    let _lock = acquire_shared_lock(&lock_path(target))?;
    fs::read_to_string(target).map_err(|e| LockfileError::io(target, e))
}

fn lock_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(LOCK_SUFFIX);
    target.with_file_name(name)
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn open_lock_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| LockfileError::io(path, e))?;
    }
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| LockfileError::io(path, e))
}

fn acquire_lock(path: &Path) -> Result<File> {
    let file = open_lock_file(path)?;
    wait_for(path, || FileExt::try_lock_exclusive(&file))?;
    debug!(path = %path.display(), "Acquired exclusive lock");
    Ok(file)
}

fn acquire_shared_lock(path: &Path) -> Result<File> {
    let file = open_lock_file(path)?;
    wait_for(path, || FileExt::try_lock_shared(&file))?;
    trace!(path = %path.display(), "Acquired shared lock");
    Ok(file)
}

fn wait_for(path: &Path, mut attempt: impl FnMut() -> std::io::Result<()>) -> Result<()> {
    let start = Instant::now();
    loop {
        match attempt() {
            Ok(()) => return Ok(()),
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                if start.elapsed() > LOCK_TIMEOUT {
                    return Err(LockfileError::LockTimeout {
                        path: path.to_path_buf(),
                        timeout: LOCK_TIMEOUT,
                    });
                }
                std::thread::sleep(Duration::from_millis(10));
            }
            Err(e) => return Err(LockfileError::io(path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("requirements.txt");

        let result = write_atomic(&path, "six==1.16.0\n").unwrap();

        assert_eq!(result.bytes_written, 12);
        assert!(!result.had_existing);
        assert_eq!(result.hash.len(), 64);
        assert_eq!(fs::read_to_string(&path).unwrap(), "six==1.16.0\n");
    }

    #[test]
    fn test_atomic_write_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("requirements.txt");
        fs::write(&path, "old content").unwrap();

        let result = write_atomic(&path, "new content").unwrap();

        assert!(result.had_existing);
        assert_eq!(read_locked(&path).unwrap(), "new content");
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/requirements.txt");
        write_atomic(&path, "x").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("requirements.txt");
        write_atomic(&path, "a").unwrap();
        write_atomic(&path, "b").unwrap();

        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["requirements.txt", "requirements.txt.lck"]);
    }

    #[test]
    fn test_read_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = read_locked(dir.path().join("absent.txt")).unwrap_err();
        assert!(err.is_not_found());
    }
}
