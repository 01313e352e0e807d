//! Filesystem and url helpers

use crate::core::error::{PrereleaseResult, ResultExt};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Local path of a `file:` url, or None for any other scheme
///
/// Accepts `file:/path`, `file:///path` and `file://localhost/path`.
pub fn file_url_to_path(url: &str) -> Option<PathBuf> {
  let rest = url.strip_prefix("file:")?;
  let path = if let Some(authority) = rest.strip_prefix("//") {
    if authority.starts_with('/') {
      authority
    } else {
      authority.strip_prefix("localhost")?
    }
  } else {
    rest
  };
  if !path.starts_with('/') {
    return None;
  }
  let trimmed = path.trim_end_matches('/');
  Some(PathBuf::from(if trimmed.is_empty() { "/" } else { trimmed }))
}

/// Recursive copy. Symlinks are recreated, not followed.
pub fn copy_dir_all(from: &Path, to: &Path) -> PrereleaseResult<()> {
  fs::create_dir_all(to).with_context(|| format!("Failed to create {}", to.display()))?;
  for entry in fs::read_dir(from).with_context(|| format!("Failed to list {}", from.display()))? {
    let entry = entry?;
    let file_type = entry.file_type()?;
    let dest = to.join(entry.file_name());
    if file_type.is_dir() {
      copy_dir_all(&entry.path(), &dest)?;
    } else if file_type.is_symlink() {
      copy_symlink(&entry.path(), &dest)?;
    } else {
      fs::copy(entry.path(), &dest)
        .with_context(|| format!("Failed to copy {} to {}", entry.path().display(), dest.display()))?;
    }
  }
  Ok(())
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> PrereleaseResult<()> {
  let link = fs::read_link(from)?;
  std::os::unix::fs::symlink(link, to).with_context(|| format!("Failed to create symlink {}", to.display()))
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, to: &Path) -> PrereleaseResult<()> {
  fs::copy(from, to).with_context(|| format!("Failed to copy {}", from.display()))?;
  Ok(())
}

/// Rename a directory, falling back to copy and delete across file systems
pub fn move_dir(from: &Path, to: &Path) -> PrereleaseResult<()> {
  if let Some(parent) = to.parent() {
    fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
  }
  match fs::rename(from, to) {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
      tracing::debug!(from = %from.display(), to = %to.display(), "rename crosses devices, copying");
      copy_then_rename(from, to, copy_dir_all)
    }
    Err(e) => Err(e).with_context(|| format!("Failed to move {} to {}", from.display(), to.display())),
  }
}

/// Sibling of `path` named `.<name>.<suffix>`
fn hidden_sibling(path: &Path, suffix: &str) -> PathBuf {
  let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
  path.with_file_name(format!(".{}.{}", name, suffix))
}

/// Copy into a hidden sibling of `to`, rename it into place, then retire `from`.
///
/// `to` only ever appears complete. A failed or interrupted copy leaves at most
/// the hidden sibling, which the next attempt replaces. `from` is renamed to a
/// hidden name before it is deleted, so it stops being visible even if the
/// delete fails halfway.
fn copy_then_rename<F>(from: &Path, to: &Path, copy: F) -> PrereleaseResult<()>
where
  F: Fn(&Path, &Path) -> PrereleaseResult<()>,
{
  let staging = hidden_sibling(to, "moving");
  if staging.exists() {
    fs::remove_dir_all(&staging).with_context(|| format!("Failed to delete {}", staging.display()))?;
  }
  if let Err(e) = copy(from, &staging) {
    if let Err(cleanup) = fs::remove_dir_all(&staging) {
      tracing::warn!(dir = %staging.display(), error = %cleanup, "cannot delete partial copy");
    }
    return Err(e);
  }
  fs::rename(&staging, to).with_context(|| format!("Failed to move {} to {}", staging.display(), to.display()))?;

  let retired = hidden_sibling(from, "moved");
  fs::rename(from, &retired).with_context(|| format!("Failed to move {} to {}", from.display(), retired.display()))?;
  fs::remove_dir_all(&retired).with_context(|| format!("Failed to delete {}", retired.display()))
}
