use std::path::Path;

use crate::core::context::AppContext;
use crate::core::error::{PrereleaseError, PrereleaseResult};
use crate::core::vcs::{Scm, ensure_clean};
use crate::prerelease::Prerelease;

/// Promote the prerelease of the working copy revision, creating it first if needed.
///
/// Warnings (failed after-promote goals, failed next-version commit) are
/// printed but do not fail the command: the release is out.
pub fn run_promote(ctx: &AppContext, dir: &Path) -> PrereleaseResult<()> {
  let (tag, warnings) = promote(ctx, dir)?;
  print_promoted(&tag, &warnings);
  println!("Run `svn update` in {} to get the next development version.", dir.display());
  Ok(())
}

/// `svn update`, then promote
pub fn run_update_promote(ctx: &AppContext, dir: &Path) -> PrereleaseResult<()> {
  ctx.scm.update(dir)?;
  run_promote(ctx, dir)
}

/// Returns the tag and the warnings
pub(crate) fn promote(ctx: &AppContext, dir: &Path) -> PrereleaseResult<(String, Vec<PrereleaseError>)> {
  ensure_clean(&ctx.scm, dir)?;
  let descriptor = super::load_descriptor(ctx, dir, true)?;
  let env = ctx.collaborators();
  super::with_archive(ctx, descriptor.id(), |archive| {
    let prerelease = Prerelease::lookup_or_create(archive, descriptor, &env)?;
    let warnings = prerelease.promote(archive, &env).into_result()?;
    Ok((prerelease.descriptor.tag, warnings))
  })
}

pub(crate) fn print_promoted(tag: &str, warnings: &[PrereleaseError]) {
  if warnings.is_empty() {
    println!("✅ promoted {}", tag);
    return;
  }
  println!("⚠️  promoted {} with {} warning(s):", tag, warnings.len());
  for warning in warnings {
    println!("  - {}", warning);
  }
}
