//! Exclusivity guard for evaluation passes
//!
//! Protects against a second instance of the service (or a manual run)
//! evaluating at the same time. Acquisition never blocks: when the token is
//! held the caller gets [`LockError::AlreadyLocked`] and skips its pass.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

type ReleaseFn = Box<dyn FnOnce() -> Result<(), LockError> + Send>;

/// Non-blocking mutual exclusion between evaluation passes
pub trait PassLock: Send + Sync {
    /// Atomically take the token or fail with `AlreadyLocked`
    fn try_acquire(&self) -> Result<LockGuard, LockError>;
}

/// Held token; released explicitly or when dropped
pub struct LockGuard {
    release: Option<ReleaseFn>,
}

impl LockGuard {
    pub fn new<F>(release: F) -> Self
    where
        F: FnOnce() -> Result<(), LockError> + Send + 'static,
    {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Release the token and report failures to the caller
    pub fn release(mut self) -> Result<(), LockError> {
        match self.release.take() {
            Some(release) => release(),
            None => Ok(()),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            if let Err(e) = release() {
                tracing::error!(error = %e, "Failed to release pass lock");
            }
        }
    }
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("held", &self.release.is_some())
            .finish()
    }
}

/// Lock file created with `O_CREAT | O_EXCL` semantics
#[derive(Debug, Clone)]
pub struct FileLock {
    path: PathBuf,
    stale_after: Option<Duration>,
}

impl FileLock {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            stale_after: None,
        }
    }

    /// Treat a lock file older than `age` as left behind by a dead process
    pub fn with_stale_after(mut self, age: Option<Duration>) -> Self {
        self.stale_after = age;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn create(&self) -> Result<LockGuard, LockError> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => LockError::AlreadyLocked,
                _ => LockError::Io(e),
            })?;

        // Holder info is diagnostic only; the file's existence is the lock
        if let Err(e) = writeln!(
            file,
            "{} {}",
            std::process::id(),
            chrono::Local::now().to_rfc3339()
        ) {
            tracing::debug!(error = %e, "Could not write lock holder info");
        }

        let path = self.path.clone();
        Ok(LockGuard::new(move || match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }))
    }

    fn is_abandoned(&self, path: &Path) -> bool {
        let Some(stale_after) = self.stale_after else {
            return false;
        };

        fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .map(|age| age > stale_after)
            .unwrap_or(false)
    }

    /// Delete the token when it is abandoned; `true` when it was removed
    fn break_abandoned(&self) -> Result<bool, LockError> {
        if !self.is_abandoned(&self.path) {
            return Ok(false);
        }
        self.claim_and_remove()
    }

    /// Move the token aside and delete it if it is still abandoned.
    ///
    /// The rename claims one specific file, so the age is checked again on
    /// what was actually moved. A fresh token taken by a concurrent breaker
    /// is put back and `false` is returned.
    fn claim_and_remove(&self) -> Result<bool, LockError> {
        let nanos = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".stale.{}.{}", std::process::id(), nanos));
        let claimed = PathBuf::from(name);

        match fs::rename(&self.path, &claimed) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        }

        if !self.is_abandoned(&claimed) {
            // hard_link fails if a newer token already took the path
            if let Err(e) = fs::hard_link(&claimed, &self.path) {
                tracing::warn!(error = %e, "Could not restore live lock file");
            }
            fs::remove_file(&claimed)?;
            return Ok(false);
        }

        tracing::warn!(path = %self.path.display(), "Removing abandoned lock file");
        fs::remove_file(&claimed)?;
        Ok(true)
    }
}

impl PassLock for FileLock {
    fn try_acquire(&self) -> Result<LockGuard, LockError> {
        match self.create() {
            Err(LockError::AlreadyLocked) => {
                if self.break_abandoned()? {
                    self.create()
                } else {
                    Err(LockError::AlreadyLocked)
                }
            }
            result => result,
        }
    }
}

/// In-process lock, for running passes without touching the filesystem
#[derive(Debug, Clone, Default)]
pub struct MemoryLock {
    held: Arc<AtomicBool>,
}

impl MemoryLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }
}

impl PassLock for MemoryLock {
    fn try_acquire(&self) -> Result<LockGuard, LockError> {
        self.held
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| LockError::AlreadyLocked)?;

        let held = Arc::clone(&self.held);
        Ok(LockGuard::new(move || {
            held.store(false, Ordering::SeqCst);
            Ok(())
        }))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("Another evaluation pass holds the lock")]
    AlreadyLocked,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_lock_excludes_second_holder() {
        let dir = TempDir::new().unwrap();
        let lock = FileLock::new(dir.path().join("alert_check.lock"));

        let guard = lock.try_acquire().unwrap();
        assert!(lock.path().exists());
        assert!(matches!(lock.try_acquire(), Err(LockError::AlreadyLocked)));

        guard.release().unwrap();
        assert!(!lock.path().exists());
        assert!(lock.try_acquire().is_ok());
    }

    #[test]
    fn test_file_lock_released_on_drop() {
        let dir = TempDir::new().unwrap();
        let lock = FileLock::new(dir.path().join("alert_check.lock"));
        {
            let _guard = lock.try_acquire().unwrap();
            assert!(lock.path().exists());
        }
        assert!(!lock.path().exists());
    }

    #[test]
    fn test_fresh_lock_is_not_broken() {
        let dir = TempDir::new().unwrap();
        let lock = FileLock::new(dir.path().join("alert_check.lock"))
            .with_stale_after(Some(Duration::from_secs(600)));

        let _guard = lock.try_acquire().unwrap();
        assert!(matches!(lock.try_acquire(), Err(LockError::AlreadyLocked)));
    }

    #[test]
    fn test_abandoned_lock_is_broken() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("alert_check.lock");
        fs::write(&path, "4242 crashed").unwrap();
        std::thread::sleep(Duration::from_millis(50));

        let lock = FileLock::new(&path).with_stale_after(Some(Duration::from_millis(10)));
        let guard = lock.try_acquire().unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with(&std::process::id().to_string()));
        drop(guard);
    }

    #[test]
    fn test_fresh_lock_survives_breaking() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("alert_check.lock");
        fs::write(&path, "4242 crashed").unwrap();
        std::thread::sleep(Duration::from_millis(50));

        let lock = FileLock::new(&path).with_stale_after(Some(Duration::from_millis(10)));
        assert!(lock.break_abandoned().unwrap());
        assert!(!path.exists());

        // A late breaker saw the old token as abandoned, but a new holder
        // took the path before its rename
        let _fresh = FileLock::new(&path).try_acquire().unwrap();
        let late = FileLock::new(&path).with_stale_after(Some(Duration::from_secs(600)));
        assert!(!late.claim_and_remove().unwrap());

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with(&std::process::id().to_string()));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_concurrent_acquire_has_one_winner() {
        let dir = TempDir::new().unwrap();
        let lock = Arc::new(FileLock::new(dir.path().join("alert_check.lock")));
        let barrier = Arc::new(std::sync::Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lock = Arc::clone(&lock);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    // Keep the guard alive so late threads still see the lock
                    lock.try_acquire().map(std::mem::forget).is_ok()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_memory_lock() {
        let lock = MemoryLock::new();
        let guard = lock.try_acquire().unwrap();
        assert!(lock.is_held());
        assert!(matches!(lock.try_acquire(), Err(LockError::AlreadyLocked)));
        drop(guard);
        assert!(!lock.is_held());
    }
}
