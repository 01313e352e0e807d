use crate::core::context::AppContext;
use crate::core::error::PrereleaseResult;
use crate::storage::locksmith::{find_stale, remove};
use crate::storage::process::{ProcessTable, PsProcessTable, SysinfoProcessTable};

/// Report stale archive locks; delete them with `delete`
pub fn run_locksmith(ctx: &AppContext, delete: bool, ps: bool) -> PrereleaseResult<()> {
  let table: Box<dyn ProcessTable> = if ps {
    Box::new(PsProcessTable::new(&ctx.config.tools.ps))
  } else {
    Box::new(SysinfoProcessTable)
  };
  let locks = ctx.storage.lock_files()?;
  let stale = find_stale(&locks, table.as_ref())?;
  println!("{} lock(s), {} stale", locks.len(), stale.len());

  for lock in &stale {
    let path = lock.lock.path.display();
    if !delete {
      println!("  {}: {}", path, lock.reason);
    } else if remove(lock)? {
      println!("  deleted {}: {}", path, lock.reason);
    } else {
      println!("  kept {}: changed since inspection", path);
    }
  }
  if !delete && !stale.is_empty() {
    println!("Run with --delete to remove them.");
  }
  Ok(())
}
