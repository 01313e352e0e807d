//! Result of a promotion

use crate::core::error::{PrereleaseError, PrereleaseResult};
use std::fmt::Write as _;

#[derive(Debug)]
pub enum PromoteOutcome {
  /// Tag committed, artifacts deployed, next version committed
  Promoted,

  /// Tag committed and artifacts deployed; later steps failed
  PromotedWithWarnings(Vec<PrereleaseError>),

  /// Nothing observable was left behind, as far as compensation succeeded
  Failed {
    error: PrereleaseError,
    /// Tag reverted and target staged for removal (or nothing to revert)
    compensated: bool,
    /// Errors of compensating actions
    suppressed: Vec<PrereleaseError>,
  },
}

impl PromoteOutcome {
  pub fn failed(error: PrereleaseError) -> Self {
    PromoteOutcome::Failed {
      error,
      compensated: true,
      suppressed: Vec::new(),
    }
  }

  /// Warnings on success, `PrereleaseError::Promote` on failure
  pub fn into_result(self) -> PrereleaseResult<Vec<PrereleaseError>> {
    match self {
      PromoteOutcome::Promoted => Ok(Vec::new()),
      PromoteOutcome::PromotedWithWarnings(warnings) => Ok(warnings),
      PromoteOutcome::Failed {
        error,
        compensated: true,
        suppressed,
      } if suppressed.is_empty() => Err(error),
      PromoteOutcome::Failed {
        error,
        compensated,
        suppressed,
      } => Err(PrereleaseError::Promote {
        cause: Box::new(error),
        compensated,
        suppressed,
      }),
    }
  }
}

/// Mail body listing post-promotion problems
pub fn warnings_report(tag: &str, user: &str, warnings: &[PrereleaseError]) -> String {
  let mut body = format!(
    "{} was promoted by {}: the tag is committed and the artifacts are deployed.\n\
     The following steps failed and need manual attention:\n",
    tag, user
  );
  for warning in warnings {
    let _ = write!(body, "\n- {}", warning);
  }
  body.push('\n');
  body
}
