//! Per-project prerelease archive
//!
//! An archive is the set of `<tier>/<groupId>/<artifactId>/` directories of
//! one project plus the lock files next to them. Opening an archive takes the
//! lock in every tier (in tier order); closing releases them in reverse.
//! Every mutation happens below the archive directories.
//!
//! Targets are never deleted directly: they are renamed to `REMOVE` together
//! with a `CAUSE` file, and the previous `REMOVE` is deleted at that moment.

pub mod target;

use crate::core::error::{PrereleaseError, PrereleaseResult, ResultExt};
use crate::storage::lock::{LockHandle, LockManager};
use crate::storage::{ProjectId, Storage};
use crate::utils;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use target::{CAUSE, REMOVE, Target};

#[derive(Debug)]
pub struct Archive {
  id: ProjectId,
  dirs: Vec<PathBuf>,
  locks: LockManager,
  handles: Vec<LockHandle>,
}

impl Archive {
  /// Lock the archive in all tiers, waiting up to `timeout` overall
  pub fn open(storage: &Storage, id: ProjectId, timeout: Duration) -> PrereleaseResult<Self> {
    let start = Instant::now();
    Self::open_with(storage, id, |locks, path| {
      locks.acquire(path, timeout.saturating_sub(start.elapsed()))
    })
  }

  /// Lock the archive without waiting; fails with `LockError::Busy`
  pub fn try_open(storage: &Storage, id: ProjectId) -> PrereleaseResult<Self> {
    Self::open_with(storage, id, |locks, path| locks.try_acquire(path))
  }

  fn open_with<F>(storage: &Storage, id: ProjectId, acquire: F) -> PrereleaseResult<Self>
  where
    F: Fn(&LockManager, &Path) -> PrereleaseResult<LockHandle>,
  {
    let locks = storage.locks().clone();
    let mut archive = Self {
      dirs: storage.tiers().iter().map(|tier| Storage::archive_dir(tier, &id)).collect(),
      id,
      locks,
      handles: Vec::new(),
    };
    for tier in storage.tiers() {
      let path = Storage::lock_path(tier, &archive.id);
      match acquire(&archive.locks, &path) {
        Ok(handle) => archive.handles.push(handle),
        Err(e) => {
          if let Err(close_err) = archive.close() {
            tracing::warn!(error = %close_err, "cannot release partially acquired archive locks");
          }
          return Err(e);
        }
      }
    }
    tracing::debug!(archive = %archive.id, "archive opened");
    Ok(archive)
  }

  /// Release all locks. Consumes the archive, so it cannot be closed twice.
  pub fn close(mut self) -> PrereleaseResult<()> {
    let mut first_error = None;
    while let Some(handle) = self.handles.pop() {
      if let Err(e) = self.locks.release(handle)
        && first_error.is_none()
      {
        first_error = Some(e);
      }
    }
    tracing::debug!(archive = %self.id, "archive closed");
    first_error.map_or(Ok(()), Err)
  }

  pub fn id(&self) -> &ProjectId {
    &self.id
  }

  /// Archive directories, primary tier first
  #[cfg(test)]
  pub fn dirs(&self) -> &[PathBuf] {
    &self.dirs
  }

  pub fn primary(&self) -> &Path {
    &self.dirs[0]
  }

  /// Slot for a revision in the primary tier; no I/O
  pub fn target(&self, revision: u64) -> Target {
    Target::new(self.primary(), revision)
  }

  /// Live target for a revision in any tier
  pub fn lookup(&self, revision: u64) -> Option<Target> {
    self
      .dirs
      .iter()
      .map(|dir| Target::new(dir, revision))
      .find(Target::exists)
  }

  /// Live targets in all tiers, ascending by revision
  pub fn list(&self) -> PrereleaseResult<Vec<Target>> {
    list_targets(&self.dirs)
  }

  /// Highest numeric subdirectory; `REMOVE` and other names are ignored
  pub fn latest_revision_on_disk(dir: &Path) -> PrereleaseResult<Option<u64>> {
    Ok(revisions_on_disk(dir)?.into_iter().max())
  }

  /// Rename a target to `REMOVE` and record why. The previous `REMOVE`, if any, is deleted now.
  pub fn stage_for_removal(&self, target: &Target, cause: &str) -> PrereleaseResult<()> {
    let archive_dir = target.archive_dir();
    if !self.dirs.iter().any(|dir| dir == archive_dir) {
      return Err(PrereleaseError::message(format!(
        "{} does not belong to archive {}",
        target.dir().display(),
        self.id
      )));
    }
    let remove = archive_dir.join(REMOVE);
    if remove.exists() {
      fs::remove_dir_all(&remove).with_context(|| format!("Failed to delete {}", remove.display()))?;
    }
    fs::rename(target.dir(), &remove)
      .with_context(|| format!("Failed to move {} to {}", target.dir().display(), remove.display()))?;
    fs::write(remove.join(CAUSE), cause).with_context(|| format!("Failed to write cause in {}", remove.display()))?;
    tracing::info!(archive = %self.id, revision = target.revision(), cause, "prerelease staged for removal");
    Ok(())
  }

  /// Keep the `keep` most recent live targets, stage the others for removal
  pub fn wipe(&self, keep: usize) -> PrereleaseResult<Vec<Target>> {
    let mut targets = self.list()?;
    targets.sort_by_key(|t| std::cmp::Reverse(t.revision()));
    let doomed: Vec<Target> = targets.into_iter().skip(keep).collect();
    for target in &doomed {
      self.stage_for_removal(target, &format!("wiped, keeping {} newer prerelease(s)", keep))?;
    }
    Ok(doomed)
  }

  /// Move targets older than `min_age` one tier down. Each target moves at most one tier per call.
  pub fn swap(&self, min_age: Duration) -> PrereleaseResult<Vec<(Target, Target)>> {
    let mut moved = Vec::new();
    if self.dirs.len() < 2 {
      return Ok(moved);
    }
    let now = SystemTime::now();
    for tier in (0..self.dirs.len() - 1).rev() {
      for revision in revisions_on_disk(&self.dirs[tier])? {
        let from = Target::new(&self.dirs[tier], revision);
        let age = now.duration_since(last_modified(&from)?).unwrap_or_default();
        if age < min_age {
          continue;
        }
        let to = Target::new(&self.dirs[tier + 1], revision);
        if to.exists() {
          tracing::warn!(from = %from.dir().display(), to = %to.dir().display(), "swap target exists, skipped");
          continue;
        }
        utils::move_dir(from.dir(), to.dir())?;
        tracing::info!(archive = %self.id, revision, from = tier, to = tier + 1, "prerelease swapped");
        moved.push((from, to));
      }
    }
    Ok(moved)
  }
}

/// Cause text of the target currently staged for removal, if any
pub fn removal_cause(archive_dir: &Path) -> Option<String> {
  fs::read_to_string(archive_dir.join(REMOVE).join(CAUSE)).ok()
}

/// Live targets in the given archive directories, ascending by revision
pub fn list_targets(dirs: &[PathBuf]) -> PrereleaseResult<Vec<Target>> {
  let mut targets = Vec::new();
  for dir in dirs {
    for revision in revisions_on_disk(dir)? {
      targets.push(Target::new(dir, revision));
    }
  }
  targets.sort_by_key(Target::revision);
  Ok(targets)
}

fn revisions_on_disk(dir: &Path) -> PrereleaseResult<Vec<u64>> {
  if !dir.is_dir() {
    return Ok(Vec::new());
  }
  let mut revisions = Vec::new();
  for entry in fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))? {
    let entry = entry?;
    if !entry.file_type()?.is_dir() {
      continue;
    }
    if let Some(revision) = entry.file_name().to_str().and_then(|name| name.parse::<u64>().ok()) {
      revisions.push(revision);
    }
  }
  revisions.sort_unstable();
  Ok(revisions)
}

fn last_modified(target: &Target) -> PrereleaseResult<SystemTime> {
  let file = target.descriptor_file();
  let path = if file.exists() { file } else { target.dir().to_path_buf() };
  fs::metadata(&path)
    .and_then(|m| m.modified())
    .with_context(|| format!("Failed to stat {}", path.display()))
}
