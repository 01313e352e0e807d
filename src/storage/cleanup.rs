//! Exit-time cleanup of lock files
//!
//! The registry is created once by `main` and handed to every `LockManager`.
//! It lists the lock files this process created and has not released yet.
//! Draining it deletes them; `main` drains on return, from the panic hook,
//! and before `process::exit`. A lock that was released is removed from the
//! registry first, so a replacement file created by another process at the
//! same path is never touched.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Default)]
pub struct CleanupRegistry {
  paths: Arc<Mutex<Vec<PathBuf>>>,
}

impl CleanupRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  fn paths(&self) -> MutexGuard<'_, Vec<PathBuf>> {
    // A panic while holding the guard must not keep locks from being cleaned up
    self.paths.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  pub fn register(&self, path: &Path) {
    let mut paths = self.paths();
    if !paths.iter().any(|p| p == path) {
      paths.push(path.to_path_buf());
    }
  }

  /// Returns false if the path was not registered
  pub fn deregister(&self, path: &Path) -> bool {
    let mut paths = self.paths();
    let before = paths.len();
    paths.retain(|p| p != path);
    paths.len() != before
  }

  pub fn contains(&self, path: &Path) -> bool {
    self.paths().iter().any(|p| p == path)
  }

  #[cfg(test)]
  pub fn len(&self) -> usize {
    self.paths().len()
  }

  /// Delete every registered file, best effort. Returns the number deleted.
  pub fn drain(&self) -> usize {
    let paths: Vec<PathBuf> = self.paths().drain(..).collect();
    let mut deleted = 0;
    for path in paths {
      match fs::remove_file(&path) {
        Ok(()) => {
          tracing::debug!(path = %path.display(), "removed lock at exit");
          deleted += 1;
        }
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "cannot remove lock at exit"),
      }
    }
    deleted
  }

  /// Drain the registry before the default panic output runs
  pub fn install_panic_hook(&self) {
    let registry = self.clone();
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
      registry.drain();
      previous(info);
    }));
  }
}

/// Drains the registry when dropped; owned by `main`
pub struct ExitGuard {
  registry: CleanupRegistry,
}

impl ExitGuard {
  pub fn new(registry: CleanupRegistry) -> Self {
    Self { registry }
  }
}

impl Drop for ExitGuard {
  fn drop(&mut self) {
    let left = self.registry.drain();
    if left > 0 {
      tracing::warn!(count = left, "released locks that were still held at exit");
    }
  }
}
