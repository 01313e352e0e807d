//! One prerelease slot on disk

use serde::Serialize;
use std::path::{Path, PathBuf};

/// Name a target directory gets when staged for removal
pub const REMOVE: &str = "REMOVE";
/// Removal reason inside `REMOVE`
pub const CAUSE: &str = "CAUSE";
/// Serialized descriptor inside a target
pub const DESCRIPTOR: &str = "prerelease.properties";

/// Handle for `<archive>/<revision>/`. Creating one does no I/O.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
  dir: PathBuf,
  revision: u64,
}

impl Target {
  pub fn new(archive_dir: &Path, revision: u64) -> Self {
    Self {
      dir: archive_dir.join(revision.to_string()),
      revision,
    }
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  pub fn revision(&self) -> u64 {
    self.revision
  }

  /// Archive directory this target lives in
  pub fn archive_dir(&self) -> &Path {
    self.dir.parent().unwrap_or(&self.dir)
  }

  /// Empty-depth checkout of the tag's parent directory
  pub fn tags(&self) -> PathBuf {
    self.dir.join("tags")
  }

  /// Staged, uncommitted tag working copy
  pub fn checkout(&self, tag_name: &str) -> PathBuf {
    self.tags().join(tag_name)
  }

  /// Local deployment repository filled by the build
  pub fn artifacts(&self) -> PathBuf {
    self.dir.join("artifacts")
  }

  pub fn descriptor_file(&self) -> PathBuf {
    self.dir.join(DESCRIPTOR)
  }

  pub fn exists(&self) -> bool {
    self.dir.is_dir()
  }

  /// A target whose creation finished: it has a descriptor
  pub fn is_complete(&self) -> bool {
    self.descriptor_file().is_file()
  }
}
