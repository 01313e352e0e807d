//! Progress indicators for long-running operations
//!
//! Uses `linya`, which draws to stderr. Nothing is drawn when stderr is not a
//! terminal, so build logs stay clean.

use linya::{Bar, Progress};
use std::io::IsTerminal;

/// Progress bar for artifact uploads
pub struct DeployProgress {
  inner: Option<(Progress, Bar)>,
}

impl DeployProgress {
  pub fn new(total: usize, label: impl Into<String>) -> Self {
    let inner = std::io::stderr().is_terminal().then(|| {
      let mut progress = Progress::new();
      let bar = progress.bar(total, label.into());
      (progress, bar)
    });
    Self { inner }
  }

  /// Increment progress by 1
  pub fn inc(&mut self) {
    if let Some((progress, bar)) = &mut self.inner {
      progress.inc_and_draw(bar, 1);
    }
  }
}
