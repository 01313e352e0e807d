//! Plugins that run only around promotion

use crate::core::error::{DescriptorError, PrereleaseError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
  BeforePromote,
  AfterPromote,
}

impl Phase {
  pub fn as_str(self) -> &'static str {
    match self {
      Phase::BeforePromote => "BEFORE_PROMOTE",
      Phase::AfterPromote => "AFTER_PROMOTE",
    }
  }
}

impl fmt::Display for Phase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Phase {
  type Err = PrereleaseError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "BEFORE_PROMOTE" => Ok(Phase::BeforePromote),
      "AFTER_PROMOTE" => Ok(Phase::AfterPromote),
      other => Err(PrereleaseError::Descriptor(DescriptorError::InvalidProperty {
        key: "phase".to_string(),
        value: other.to_string(),
        reason: "expected BEFORE_PROMOTE or AFTER_PROMOTE".to_string(),
      })),
    }
  }
}

/// One plugin goal gated by a skip property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
  pub group_id: String,
  pub artifact_id: String,
  pub goal: String,
  pub phase: Phase,
  /// Property that disables the goal during ordinary builds
  pub skip: String,
}

impl ScheduleEntry {
  /// Fully qualified goal for the mvn command line
  pub fn goal_spec(&self) -> String {
    format!("{}:{}:{}", self.group_id, self.artifact_id, self.goal)
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Schedule {
  entries: Vec<ScheduleEntry>,
}

impl Schedule {
  pub fn new(entries: Vec<ScheduleEntry>) -> Self {
    Self { entries }
  }

  pub fn all(&self) -> &[ScheduleEntry] {
    &self.entries
  }

  /// Entries of one phase, in declaration order
  pub fn entries(&self, phase: Phase) -> impl Iterator<Item = &ScheduleEntry> {
    self.entries.iter().filter(move |e| e.phase == phase)
  }

  /// `<skip>=true` for every entry, for builds outside promotion
  pub fn skip_properties(&self) -> BTreeMap<String, String> {
    self
      .entries
      .iter()
      .map(|e| (e.skip.clone(), "true".to_string()))
      .collect()
  }
}
