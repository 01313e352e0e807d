use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::archive::{list_targets, removal_cause};
use crate::archive::target::Target;
use crate::core::context::AppContext;
use crate::core::error::{PrereleaseError, PrereleaseResult};
use crate::core::vcs::Scm;
use crate::storage::{ProjectId, Storage};

/// Status of one working copy
#[derive(Debug, Clone, Serialize)]
pub struct WorkingCopyStatus {
  /// Working copy directory
  pub dir: PathBuf,

  /// Repository url of the working copy
  pub url: String,

  /// Last changed revision; the prerelease key
  pub revision: u64,

  /// groupId:artifactId
  pub project: String,

  /// Version a prerelease of this revision would release
  pub release: String,

  /// Tag a promotion would create
  pub tag: String,

  /// Target of this revision, if one exists in any tier
  pub prerelease: Option<PathBuf>,

  /// Whether that target finished building
  pub complete: bool,

  /// Revisions of all live targets of the project
  pub live: Vec<u64>,

  /// Why the last prerelease of the primary tier was retired
  pub last_removed: Option<String>,

  /// `svn status` lines of local modifications
  pub modified: Option<String>,
}

/// Run the status command
pub fn run_status(ctx: &AppContext, dir: &Path, json: bool) -> PrereleaseResult<()> {
  let status = working_copy_status(ctx, dir)?;
  if json {
    println!(
      "{}",
      serde_json::to_string_pretty(&status)
        .map_err(|e| PrereleaseError::message(format!("Serialization error: {}", e)))?
    );
  } else {
    print_status(&status);
  }
  Ok(())
}

fn working_copy_status(ctx: &AppContext, dir: &Path) -> PrereleaseResult<WorkingCopyStatus> {
  let descriptor = super::load_descriptor(ctx, dir, false)?;
  let id = descriptor.id();
  let archive = ArchiveState::read(&ctx.storage, &id, descriptor.revision)?;

  Ok(WorkingCopyStatus {
    dir: dir.to_path_buf(),
    url: ctx.scm.url(dir)?,
    revision: descriptor.revision,
    project: id.to_string(),
    release: descriptor.project.version.clone(),
    tag: descriptor.tag.clone(),
    complete: archive.target.as_ref().is_some_and(Target::is_complete),
    prerelease: archive.target.map(|t| t.dir().to_path_buf()),
    live: archive.live,
    last_removed: archive.last_removed,
    modified: ctx.scm.uncommitted_changes(dir)?,
  })
}

/// What the storage holds for one project, read without the archive lock
#[derive(Debug)]
struct ArchiveState {
  /// Target of the revision in any tier
  target: Option<Target>,
  live: Vec<u64>,
  last_removed: Option<String>,
}

impl ArchiveState {
  fn read(storage: &Storage, id: &ProjectId, revision: u64) -> PrereleaseResult<Self> {
    let dirs: Vec<PathBuf> = storage
      .tiers()
      .iter()
      .map(|tier| Storage::archive_dir(tier, id))
      .collect();
    let target = dirs
      .iter()
      .map(|dir| Target::new(dir, revision))
      .find(Target::exists);
    let live = list_targets(&dirs)?.iter().map(Target::revision).collect();
    let last_removed = dirs.first().and_then(|primary| removal_cause(primary));
    Ok(Self {
      target,
      live,
      last_removed,
    })
  }
}

fn print_status(status: &WorkingCopyStatus) {
  println!("\n📊 {} r{}\n", status.project, status.revision);
  println!("{:<12} {}", "working copy", status.dir.display());
  println!("{:<12} {}", "url", status.url);
  println!("{:<12} {}", "release", status.release);
  println!("{:<12} {}", "tag", status.tag);
  let prerelease = match (&status.prerelease, status.complete) {
    (None, _) => "none".to_string(),
    (Some(dir), true) => dir.display().to_string(),
    (Some(dir), false) => format!("{} (incomplete)", dir.display()),
  };
  println!("{:<12} {}", "prerelease", prerelease);
  if !status.live.is_empty() {
    let live: Vec<String> = status.live.iter().map(u64::to_string).collect();
    println!("{:<12} {}", "live", live.join(", "));
  }
  if let Some(cause) = &status.last_removed {
    println!("{:<12} {}", "removed", cause);
  }
  if let Some(modified) = &status.modified {
    println!("\nLocal modifications (not part of a prerelease):\n{}", modified);
  }
  println!();
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::storage::cleanup::CleanupRegistry;
  use crate::storage::lock::LockManager;
  use std::fs;
  use tempfile::TempDir;

  #[test]
  fn test_archive_state() {
    let dir = TempDir::new().unwrap();
    let tiers = vec![dir.path().join("fast"), dir.path().join("slow")];
    let storage = Storage::new(tiers.clone(), LockManager::new(CleanupRegistry::new()));
    let id = ProjectId::new("org.example", "app");

    let empty = ArchiveState::read(&storage, &id, 7).unwrap();
    assert!(empty.target.is_none());
    assert!(empty.live.is_empty());
    assert!(empty.last_removed.is_none());

    let primary = Storage::archive_dir(&tiers[0], &id);
    fs::create_dir_all(primary.join("9")).unwrap();
    fs::create_dir_all(primary.join("REMOVE")).unwrap();
    fs::write(primary.join("REMOVE/CAUSE"), "creation failed: Build failed").unwrap();
    fs::create_dir_all(Storage::archive_dir(&tiers[1], &id).join("7")).unwrap();

    let state = ArchiveState::read(&storage, &id, 7).unwrap();
    assert_eq!(state.target.unwrap().dir(), Storage::archive_dir(&tiers[1], &id).join("7"));
    assert_eq!(state.live, vec![7, 9]);
    assert_eq!(state.last_removed.as_deref(), Some("creation failed: Build failed"));
  }
}
