use std::path::Path;

use crate::core::context::AppContext;
use crate::core::error::PrereleaseResult;

/// Run the release policy check without touching the storage
pub fn run_check(ctx: &AppContext, dir: &Path) -> PrereleaseResult<()> {
  let descriptor = super::load_descriptor(ctx, dir, true)?;
  println!(
    "✅ {} r{} can be released as {} ({})",
    descriptor.id(),
    descriptor.revision,
    descriptor.project.version,
    descriptor.tag
  );
  Ok(())
}
