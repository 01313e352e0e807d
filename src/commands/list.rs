use serde::Serialize;
use std::path::PathBuf;

use crate::archive::list_targets;
use crate::core::context::AppContext;
use crate::core::error::{PrereleaseError, PrereleaseResult};
use crate::descriptor::Descriptor;
use crate::storage::{ProjectId, Storage};

/// One live prerelease
#[derive(Debug, Clone, Serialize)]
pub struct ListEntry {
  pub project: ProjectId,
  pub revision: u64,
  /// Storage tier index, 0 is primary
  pub tier: usize,
  pub dir: PathBuf,
  /// Release version; None while building or if the descriptor is unreadable
  pub version: Option<String>,
  pub tag: Option<String>,
  pub complete: bool,
}

/// Run the list command
pub fn run_list(ctx: &AppContext, json: bool) -> PrereleaseResult<()> {
  let entries = collect(&ctx.storage)?;
  if json {
    println!(
      "{}",
      serde_json::to_string_pretty(&entries)
        .map_err(|e| PrereleaseError::message(format!("Serialization error: {}", e)))?
    );
  } else {
    print_table(&entries);
  }
  Ok(())
}

/// Live targets of all projects, without locking
pub fn collect(storage: &Storage) -> PrereleaseResult<Vec<ListEntry>> {
  let mut entries = Vec::new();
  for id in storage.projects()? {
    for (tier, root) in storage.tiers().iter().enumerate() {
      for target in list_targets(&[Storage::archive_dir(root, &id)])? {
        let descriptor = if target.is_complete() {
          match Descriptor::load(&target) {
            Ok(descriptor) => Some(descriptor),
            Err(e) => {
              tracing::warn!(dir = %target.dir().display(), error = %e, "unreadable descriptor");
              None
            }
          }
        } else {
          None
        };
        entries.push(ListEntry {
          project: id.clone(),
          revision: target.revision(),
          tier,
          dir: target.dir().to_path_buf(),
          version: descriptor.as_ref().map(|d| d.project.version.clone()),
          tag: descriptor.map(|d| d.tag),
          complete: target.is_complete(),
        });
      }
    }
  }
  Ok(entries)
}

fn print_table(entries: &[ListEntry]) {
  if entries.is_empty() {
    println!("No prereleases.");
    return;
  }
  println!("{:<40} {:>9} {:<12} {:<5} DIR", "PROJECT", "REVISION", "VERSION", "TIER");
  println!("{:-<100}", "");
  for entry in entries {
    let version = match (&entry.version, entry.complete) {
      (Some(version), _) => version.clone(),
      (None, false) => "(building)".to_string(),
      (None, true) => "?".to_string(),
    };
    println!(
      "{:<40} {:>9} {:<12} {:<5} {}",
      entry.project.to_string(),
      entry.revision,
      version,
      entry.tier,
      entry.dir.display()
    );
  }
}
