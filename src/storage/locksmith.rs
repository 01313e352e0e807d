//! Stale lock detection
//!
//! A crashed holder leaves its lock file behind. A lock is stale when no
//! running process has the recorded pid, or when the process with that pid
//! started after the lock was written (the pid was reused).

use crate::core::error::{PrereleaseResult, ResultExt};
use crate::storage::process::{ProcessInfo, ProcessTable};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A lock without a readable pid may be in the middle of being written
const WRITE_GRACE: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockInfo {
  pub path: PathBuf,
  pub pid: Option<u32>,
  pub modified: DateTime<Utc>,
}

impl LockInfo {
  pub fn read(path: &Path) -> PrereleaseResult<Self> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read lock {}", path.display()))?;
    let modified = fs::metadata(path)
      .and_then(|m| m.modified())
      .with_context(|| format!("Failed to stat lock {}", path.display()))?;
    Ok(Self {
      path: path.to_path_buf(),
      pid: content.trim().parse().ok(),
      modified: DateTime::<Utc>::from(modified),
    })
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaleLock {
  pub lock: LockInfo,
  pub reason: String,
}

/// Why a lock is stale, or None if its holder is alive
pub fn stale_reason(lock: &LockInfo, processes: &[ProcessInfo], now: DateTime<Utc>) -> Option<String> {
  let Some(pid) = lock.pid else {
    let age = now.signed_duration_since(lock.modified).to_std().unwrap_or_default();
    return (age > WRITE_GRACE).then(|| "lock file has no pid".to_string());
  };
  match processes.iter().find(|p| p.pid == pid) {
    None => Some(format!("pid {} is not running", pid)),
    Some(process) if process.started > lock.modified => Some(format!(
      "pid {} was reused: process started {} after lock was written {}",
      pid, process.started, lock.modified
    )),
    Some(_) => None,
  }
}

/// Check every given lock file against the process table
pub fn find_stale(locks: &[PathBuf], table: &dyn ProcessTable) -> PrereleaseResult<Vec<StaleLock>> {
  let processes = table.list()?;
  let now = Utc::now();
  let mut stale = Vec::new();
  for path in locks {
    // released between listing and reading
    if !path.exists() {
      continue;
    }
    let lock = LockInfo::read(path)?;
    match stale_reason(&lock, &processes, now) {
      Some(reason) => stale.push(StaleLock { lock, reason }),
      None => tracing::debug!(path = %path.display(), pid = ?lock.pid, "lock holder is alive"),
    }
  }
  Ok(stale)
}

/// Delete a stale lock unless it changed since it was inspected
pub fn remove(stale: &StaleLock) -> PrereleaseResult<bool> {
  let path = &stale.lock.path;
  if !path.exists() {
    return Ok(false);
  }
  let current = LockInfo::read(path)?;
  if current != stale.lock {
    tracing::info!(path = %path.display(), "lock changed since inspection, not deleting");
    return Ok(false);
  }
  fs::remove_file(path).with_context(|| format!("Failed to delete lock {}", path.display()))?;
  tracing::info!(path = %path.display(), reason = %stale.reason, "deleted stale lock");
  Ok(true)
}
