use std::path::Path;

use crate::core::context::AppContext;
use crate::core::error::PrereleaseResult;
use crate::core::vcs::{Scm, ensure_clean};
use crate::prerelease::Prerelease;

/// Create the prerelease of the working copy revision, or report the existing one
pub fn run_create(ctx: &AppContext, dir: &Path) -> PrereleaseResult<()> {
  print_created(&create(ctx, dir)?);
  Ok(())
}

/// `svn update`, then create
pub fn run_update(ctx: &AppContext, dir: &Path) -> PrereleaseResult<()> {
  ctx.scm.update(dir)?;
  run_create(ctx, dir)
}

pub(crate) fn create(ctx: &AppContext, dir: &Path) -> PrereleaseResult<Prerelease> {
  ensure_clean(&ctx.scm, dir)?;
  let descriptor = super::load_descriptor(ctx, dir, true)?;
  let env = ctx.collaborators();
  super::with_archive(ctx, descriptor.id(), |archive| {
    Prerelease::lookup_or_create(archive, descriptor, &env)
  })
}

pub(crate) fn print_created(prerelease: &Prerelease) {
  println!(
    "✅ prerelease {} r{}: {}",
    prerelease.descriptor.tag_name(),
    prerelease.descriptor.revision,
    prerelease.target.dir().display()
  );
}
