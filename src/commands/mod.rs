//! CLI commands
//!
//! ## Working copy
//! - **status**: revision, origin and prerelease of a working copy
//! - **check**: release policy check only
//! - **create** / **update**: create the prerelease of a working copy
//! - **promote** / **update-promote**: create if needed, then promote
//! - **bare**: create or promote from a url, via a temporary checkout
//!
//! ## Storage maintenance
//! - **list**: all prereleases in all tiers
//! - **swap**: move old prereleases one tier down
//! - **wipe**: retire all but the newest prereleases
//! - **locksmith**: find and delete stale locks
//!
//! All commands take the `AppContext` built once in main.rs.

pub mod bare;
pub mod check;
pub mod create;
pub mod list;
pub mod locksmith;
pub mod promote;
pub mod status;
pub mod swap;
pub mod wipe;

pub use bare::{run_bare_create, run_bare_promote};
pub use check::run_check;
pub use create::{run_create, run_update};
pub use list::run_list;
pub use locksmith::run_locksmith;
pub use promote::{run_promote, run_update_promote};
pub use status::run_status;
pub use swap::run_swap;
pub use wipe::run_wipe;

use crate::archive::Archive;
use crate::core::context::AppContext;
use crate::core::error::{LockError, PrereleaseError, PrereleaseResult};
use crate::core::vcs::Scm;
use crate::descriptor::Descriptor;
use crate::maven::pom::ProjectModel;
use crate::maven::runner::BuildRunner;
use crate::storage::ProjectId;
use std::path::Path;

/// Release descriptor of the working copy in `dir`, from its effective pom.
/// With `check`, the release policy must hold too.
pub(crate) fn load_descriptor(ctx: &AppContext, dir: &Path, check: bool) -> PrereleaseResult<Descriptor> {
  let revision = ctx.scm.revision(dir)?;
  let model = ProjectModel::parse(&ctx.runner.effective_pom(dir)?)?;
  let descriptor = Descriptor::create(&model, revision, ctx.schedule.clone())?;

  let url = ctx.scm.url(dir)?;
  if url != descriptor.origin {
    tracing::warn!(
      working_copy = %url,
      origin = %descriptor.origin,
      "working copy url differs from the scm connection in the pom; the pom wins"
    );
  }
  if check {
    descriptor.check(&model, &ctx.config.self_plugin, &ctx.scm)
  } else {
    Ok(descriptor)
  }
}

/// Run `f` with the archive locked. Errors of `f` win over errors closing the archive.
pub(crate) fn with_archive<T, F>(ctx: &AppContext, id: ProjectId, f: F) -> PrereleaseResult<T>
where
  F: FnOnce(&Archive) -> PrereleaseResult<T>,
{
  let archive = Archive::open(&ctx.storage, id, ctx.timeout())?;
  let result = f(&archive);
  match (result, archive.close()) {
    (Ok(value), Ok(())) => Ok(value),
    (Ok(_), Err(close)) => Err(close),
    (Err(e), close) => {
      if let Err(close) = close {
        tracing::warn!(error = %close, "cannot release archive lock");
      }
      Err(e)
    }
  }
}

/// Run `f` on every archive that is not locked by another process.
/// Returns the number of busy archives that were skipped.
pub(crate) fn for_each_idle_archive<F>(ctx: &AppContext, mut f: F) -> PrereleaseResult<usize>
where
  F: FnMut(&Archive) -> PrereleaseResult<()>,
{
  let mut busy = 0;
  for id in ctx.storage.projects()? {
    let archive = match Archive::try_open(&ctx.storage, id.clone()) {
      Ok(archive) => archive,
      Err(PrereleaseError::Lock(LockError::Busy { path })) => {
        println!("⏭  {} is busy ({}), skipped", id, path.display());
        busy += 1;
        continue;
      }
      Err(e) => return Err(e),
    };
    let result = f(&archive);
    let closed = archive.close();
    result?;
    closed?;
  }
  Ok(busy)
}
