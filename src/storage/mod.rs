//! Storage tiers and the locks that guard them
//!
//! - **cleanup**: exit-time registry of held lock files
//! - **lock**: exclusive-create lock files with polling and timeout
//! - **locksmith**: stale lock detection against the process table
//! - **process**: process table backends (sysinfo, ps)

pub mod cleanup;
pub mod lock;
pub mod locksmith;
pub mod process;

use crate::core::error::{PrereleaseResult, ResultExt};
use lock::LockManager;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Suffix of lock files, sibling to the archive directory
pub const LOCK_SUFFIX: &str = ".LOCK";

/// Identity of an archive: Maven groupId and artifactId
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ProjectId {
  pub group_id: String,
  pub artifact_id: String,
}

impl ProjectId {
  pub fn new(group_id: impl Into<String>, artifact_id: impl Into<String>) -> Self {
    Self {
      group_id: group_id.into(),
      artifact_id: artifact_id.into(),
    }
  }
}

impl fmt::Display for ProjectId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.group_id, self.artifact_id)
  }
}

/// Ordered storage tiers, primary first
#[derive(Debug, Clone)]
pub struct Storage {
  tiers: Vec<PathBuf>,
  locks: LockManager,
}

impl Storage {
  pub fn new(tiers: Vec<PathBuf>, locks: LockManager) -> Self {
    Self { tiers, locks }
  }

  pub fn tiers(&self) -> &[PathBuf] {
    &self.tiers
  }

  pub fn locks(&self) -> &LockManager {
    &self.locks
  }

  /// Archive directory of a project in one tier
  pub fn archive_dir(tier: &Path, id: &ProjectId) -> PathBuf {
    tier.join(&id.group_id).join(&id.artifact_id)
  }

  /// Lock file of a project in one tier
  pub fn lock_path(tier: &Path, id: &ProjectId) -> PathBuf {
    tier
      .join(&id.group_id)
      .join(format!("{}{}", id.artifact_id, LOCK_SUFFIX))
  }

  /// All projects with an archive directory in any tier
  pub fn projects(&self) -> PrereleaseResult<Vec<ProjectId>> {
    let mut projects = BTreeSet::new();
    for tier in &self.tiers {
      if !tier.is_dir() {
        continue;
      }
      for group in subdirectories(tier)? {
        for artifact in subdirectories(&tier.join(&group))? {
          projects.insert(ProjectId::new(group.clone(), artifact));
        }
      }
    }
    Ok(projects.into_iter().collect())
  }

  /// All lock files in any tier
  pub fn lock_files(&self) -> PrereleaseResult<Vec<PathBuf>> {
    let mut result = Vec::new();
    for tier in &self.tiers {
      if !tier.is_dir() {
        continue;
      }
      for group in subdirectories(tier)? {
        let group_dir = tier.join(&group);
        for entry in fs::read_dir(&group_dir).with_context(|| format!("Failed to list {}", group_dir.display()))? {
          let path = entry?.path();
          if path.is_file() && path.to_string_lossy().ends_with(LOCK_SUFFIX) {
            result.push(path);
          }
        }
      }
    }
    result.sort();
    Ok(result)
  }
}

/// Names of the subdirectories of `dir`, sorted
pub fn subdirectories(dir: &Path) -> PrereleaseResult<Vec<String>> {
  let mut names = Vec::new();
  for entry in fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))? {
    let entry = entry?;
    if entry.file_type()?.is_dir() {
      names.push(entry.file_name().to_string_lossy().to_string());
    }
  }
  names.sort();
  Ok(names)
}
