use crate::core::context::AppContext;
use crate::core::error::PrereleaseResult;

/// Keep the `keep` newest prereleases of every project (default: `keep` from the config)
pub fn run_wipe(ctx: &AppContext, keep: Option<usize>) -> PrereleaseResult<()> {
  let keep = keep.unwrap_or(ctx.config.keep);
  let mut wiped = 0;
  let busy = super::for_each_idle_archive(ctx, |archive| {
    for target in archive.wipe(keep)? {
      println!("🗑  {} r{}", archive.id(), target.revision());
      wiped += 1;
    }
    Ok(())
  })?;
  println!("Wiped {} prerelease(s), skipped {} busy archive(s).", wiped, busy);
  Ok(())
}
