use std::time::Duration;

use crate::core::context::AppContext;
use crate::core::error::PrereleaseResult;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Move prereleases older than `days` (default: `swap_after_days`) one tier down
pub fn run_swap(ctx: &AppContext, days: Option<u64>) -> PrereleaseResult<()> {
  if ctx.storage.tiers().len() < 2 {
    println!("Only one storage tier, nothing to swap.");
    return Ok(());
  }
  let days = days.unwrap_or(ctx.config.swap_after_days);
  let min_age = DAY.saturating_mul(u32::try_from(days).unwrap_or(u32::MAX));
  let mut moved = 0;
  let busy = super::for_each_idle_archive(ctx, |archive| {
    for (from, to) in archive.swap(min_age)? {
      println!("🔀 {} r{}: {} -> {}", archive.id(), from.revision(), from.dir().display(), to.dir().display());
      moved += 1;
    }
    Ok(())
  })?;
  println!("Swapped {} prerelease(s), skipped {} busy archive(s).", moved, busy);
  Ok(())
}
