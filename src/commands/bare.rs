//! Create and promote without a working copy

use std::path::PathBuf;

use crate::core::context::AppContext;
use crate::core::error::{PrereleaseResult, ResultExt};
use crate::core::vcs::{Depth, Scm};

/// Fresh checkout of `url` head in a temp dir, removed on drop
struct BareCheckout {
  _temp: tempfile::TempDir,
  dir: PathBuf,
}

impl BareCheckout {
  fn new(ctx: &AppContext, url: &str) -> PrereleaseResult<Self> {
    let temp = tempfile::Builder::new()
      .prefix("prerelease-bare")
      .tempdir()
      .context("Failed to create temp dir")?;
    let dir = temp.path().join("checkout");
    tracing::info!(url, dir = %dir.display(), "checking out");
    ctx.scm.checkout(url.trim_end_matches('/'), None, Depth::Infinity, &dir)?;
    Ok(Self { _temp: temp, dir })
  }
}

pub fn run_bare_create(ctx: &AppContext, url: &str) -> PrereleaseResult<()> {
  let checkout = BareCheckout::new(ctx, url)?;
  super::create::print_created(&super::create::create(ctx, &checkout.dir)?);
  Ok(())
}

pub fn run_bare_promote(ctx: &AppContext, url: &str) -> PrereleaseResult<()> {
  let checkout = BareCheckout::new(ctx, url)?;
  let (tag, warnings) = super::promote::promote(ctx, &checkout.dir)?;
  super::promote::print_promoted(&tag, &warnings);
  Ok(())
}
