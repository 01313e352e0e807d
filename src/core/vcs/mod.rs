//! Source control access
//!
//! Everything the prerelease lifecycle needs from Subversion, behind one
//! trait so the state machine can run against an in-memory fake.

pub mod svn;

pub use svn::SvnScm;

use crate::core::error::{PrereleaseResult, ScmError};
use std::path::{Path, PathBuf};

/// Checkout depth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
  /// Only the directory itself; children are added by later copies
  Empty,
  Infinity,
}

impl Depth {
  pub fn as_str(self) -> &'static str {
    match self {
      Depth::Empty => "empty",
      Depth::Infinity => "infinity",
    }
  }
}

pub trait Scm {
  /// Check out `url` (at `revision`, or head) into `dest`
  fn checkout(&self, url: &str, revision: Option<u64>, depth: Depth, dest: &Path) -> PrereleaseResult<()>;

  fn update(&self, dir: &Path) -> PrereleaseResult<()>;

  /// Repository-to-working-copy copy of `url@revision`; nothing is committed
  fn copy_to_working_copy(&self, url: &str, revision: u64, dest: &Path) -> PrereleaseResult<()>;

  fn commit(&self, dir: &Path, message: &str) -> PrereleaseResult<()>;

  /// Repository lock on working copy files
  fn lock(&self, paths: &[PathBuf], message: &str) -> PrereleaseResult<()>;

  fn unlock(&self, paths: &[PathBuf]) -> PrereleaseResult<()>;

  /// Server-side delete
  fn delete(&self, url: &str, message: &str) -> PrereleaseResult<()>;

  fn exists(&self, url: &str) -> PrereleaseResult<bool>;

  /// Last changed revision of a working copy
  fn revision(&self, dir: &Path) -> PrereleaseResult<u64>;

  /// Repository url of a working copy, without trailing `/`
  fn url(&self, dir: &Path) -> PrereleaseResult<String>;

  /// Local modifications, as status lines; None if clean
  fn uncommitted_changes(&self, dir: &Path) -> PrereleaseResult<Option<String>>;

  /// Newer repository revisions not in the working copy, as status lines; None if up to date
  fn pending_updates(&self, dir: &Path) -> PrereleaseResult<Option<String>>;
}

/// Refuse working copies that would not build what the repository has
pub fn ensure_clean(scm: &dyn Scm, dir: &Path) -> PrereleaseResult<()> {
  if let Some(status) = scm.uncommitted_changes(dir)? {
    return Err(
      ScmError::UncommittedChanges {
        path: dir.to_path_buf(),
        status,
      }
      .into(),
    );
  }
  if let Some(status) = scm.pending_updates(dir)? {
    return Err(
      ScmError::PendingUpdates {
        path: dir.to_path_buf(),
        status,
      }
      .into(),
    );
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::core::error::PrereleaseError;
  use crate::testing::FakeScm;

  #[test]
  fn test_ensure_clean() {
    let scm = FakeScm::new();
    let dir = Path::new("/wc");
    assert!(ensure_clean(&scm, dir).is_ok());

    scm.set_pending_updates(Some("       *       12   pom.xml"));
    assert!(matches!(
      ensure_clean(&scm, dir),
      Err(PrereleaseError::Scm(ScmError::PendingUpdates { .. }))
    ));

    scm.set_uncommitted_changes(Some("M       pom.xml"));
    assert!(matches!(
      ensure_clean(&scm, dir),
      Err(PrereleaseError::Scm(ScmError::UncommittedChanges { .. }))
    ));
  }
}
