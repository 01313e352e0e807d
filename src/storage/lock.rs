//! Advisory archive locks based on exclusive file creation
//!
//! A lock is a file that holds the decimal pid of its owner. Creating it with
//! `create_new` is the only mutual exclusion primitive; it works across
//! processes and across machines sharing the storage. Waiters poll.

use crate::core::error::{LockError, PrereleaseError, PrereleaseResult, ResultExt};
use crate::storage::cleanup::CleanupRegistry;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_secs(1);
const PROGRESS_EVERY: u32 = 10;

#[derive(Debug, Clone)]
pub struct LockManager {
  registry: CleanupRegistry,
  poll_interval: Duration,
}

impl LockManager {
  pub fn new(registry: CleanupRegistry) -> Self {
    Self {
      registry,
      poll_interval: POLL_INTERVAL,
    }
  }

  #[cfg(test)]
  pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
    self.poll_interval = poll_interval;
    self
  }

  #[cfg(test)]
  pub fn registry(&self) -> &CleanupRegistry {
    &self.registry
  }

  /// Wait up to `timeout` for the lock
  pub fn acquire(&self, path: &Path, timeout: Duration) -> PrereleaseResult<LockHandle> {
    let start = Instant::now();
    let mut attempts: u32 = 0;
    loop {
      if let Some(handle) = self.create(path)? {
        if attempts > 0 {
          tracing::info!(path = %path.display(), waited = start.elapsed().as_secs(), "lock acquired");
        }
        return Ok(handle);
      }
      let elapsed = start.elapsed();
      if elapsed >= timeout {
        return Err(PrereleaseError::Lock(LockError::Timeout {
          path: path.to_path_buf(),
          seconds: elapsed.as_secs(),
        }));
      }
      attempts += 1;
      if attempts % PROGRESS_EVERY == 0 {
        tracing::info!(
          path = %path.display(),
          holder = holder_pid(path).as_deref().unwrap_or("?"),
          waited = elapsed.as_secs(),
          timeout = timeout.as_secs(),
          "waiting for lock"
        );
      }
      thread::sleep(self.poll_interval);
    }
  }

  /// Single attempt, for maintenance commands that skip busy archives
  pub fn try_acquire(&self, path: &Path) -> PrereleaseResult<LockHandle> {
    self
      .create(path)?
      .ok_or_else(|| PrereleaseError::Lock(LockError::Busy { path: path.to_path_buf() }))
  }

  /// Delete the lock file and forget it. Fails for handles this manager's registry does not know.
  pub fn release(&self, mut handle: LockHandle) -> PrereleaseResult<()> {
    handle.released = true;
    if !self.registry.contains(&handle.path) {
      return Err(PrereleaseError::Lock(LockError::NotHeld { path: handle.path.clone() }));
    }
    fs::remove_file(&handle.path).with_context(|| format!("Failed to remove lock {}", handle.path.display()))?;
    self.registry.deregister(&handle.path);
    tracing::debug!(path = %handle.path.display(), "lock released");
    Ok(())
  }

  /// None if somebody else holds the lock
  fn create(&self, path: &Path) -> PrereleaseResult<Option<LockHandle>> {
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
      Ok(file) => file,
      Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(None),
      Err(e) => return Err(PrereleaseError::from(e).context(format!("Failed to create lock {}", path.display()))),
    };
    self.registry.register(path);
    if let Err(e) = file.write_all(std::process::id().to_string().as_bytes()) {
      self.registry.deregister(path);
      let _ = fs::remove_file(path);
      return Err(PrereleaseError::from(e).context(format!("Failed to write lock {}", path.display())));
    }
    tracing::debug!(path = %path.display(), "lock created");
    Ok(Some(LockHandle {
      path: path.to_path_buf(),
      registry: self.registry.clone(),
      released: false,
    }))
  }
}

/// Content of a lock file, if readable
pub fn holder_pid(path: &Path) -> Option<String> {
  fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

/// A held lock. Dropping it without `LockManager::release` (unwinding panic)
/// still deletes the file.
#[derive(Debug)]
pub struct LockHandle {
  path: PathBuf,
  registry: CleanupRegistry,
  released: bool,
}

impl LockHandle {
  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl Drop for LockHandle {
  fn drop(&mut self) {
    if self.released {
      return;
    }
    if self.registry.deregister(&self.path) {
      match fs::remove_file(&self.path) {
        Ok(()) => tracing::warn!(path = %self.path.display(), "lock dropped without release"),
        Err(e) => tracing::warn!(path = %self.path.display(), error = %e, "cannot remove dropped lock"),
      }
    }
  }
}
