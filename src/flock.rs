use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::io::AsRawFd;

/// Exclusive advisory lock on a store directory's lock file.
pub struct FileLock {
    _file: File,
    path: PathBuf,
}

impl FileLock {
    /// Creates the lock file if needed and locks it without blocking.
    /// The file holds the owning process ID for debugging.
    pub fn lock<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)?;

        Self::try_lock(&file)?;

        // Only the holder rewrites the contents.
        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        file.flush()?;

        Ok(Self { _file: file, path })
    }

    #[cfg(unix)]
    fn try_lock(file: &File) -> io::Result<()> {
        use libc::{flock, LOCK_EX, LOCK_NB};

        // SAFETY: the descriptor is owned by `file` and stays open for the call.
        let result = unsafe { flock(file.as_raw_fd(), LOCK_EX | LOCK_NB) };
        if result != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn try_lock(_file: &File) -> io::Result<()> {
        Ok(())
    }

    /// Releases the lock. Dropping the lock has the same effect; the file is
    /// left in place.
    pub fn unlock(self) -> io::Result<()> {
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_lock_writes_pid() {
        let dir = tempdir().expect("Failed to create temp dir");
        let lock_path = dir.path().join("segdb.lock");

        let lock = FileLock::lock(&lock_path).expect("Failed to acquire lock");
        assert_eq!(lock.path(), lock_path.as_path());
        let content = fs::read_to_string(&lock_path).expect("Failed to read lock file");
        assert_eq!(content.trim(), std::process::id().to_string());

        lock.unlock().expect("Failed to release lock");
        assert!(lock_path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_second_lock_fails_until_release() {
        let dir = tempdir().expect("Failed to create temp dir");
        let lock_path = dir.path().join("segdb.lock");

        let first = FileLock::lock(&lock_path).expect("Failed to acquire first lock");
        assert!(FileLock::lock(&lock_path).is_err());

        // a failed attempt must not clobber the holder's contents
        let content = fs::read_to_string(&lock_path).expect("Failed to read lock file");
        assert_eq!(content.trim(), std::process::id().to_string());

        drop(first);
        FileLock::lock(&lock_path).expect("Should be able to acquire lock after drop");
    }
}
