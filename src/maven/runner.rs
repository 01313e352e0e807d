//! Maven invocation

use crate::core::error::{BuildError, PrereleaseResult, ResultExt};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Runs builds in a directory
pub trait BuildRunner {
  /// Run `goals` with `-Dkey=value` properties; returns the combined output
  fn build(&self, dir: &Path, properties: &BTreeMap<String, String>, goals: &[&str]) -> PrereleaseResult<String>;

  /// Effective pom of the project in `dir`
  fn effective_pom(&self, dir: &Path) -> PrereleaseResult<String>;
}

/// `mvn -B` subprocess
#[derive(Debug, Clone)]
pub struct MavenRunner {
  mvn: PathBuf,
  update_snapshots: bool,
}

impl MavenRunner {
  pub fn new(mvn: impl Into<PathBuf>) -> Self {
    Self {
      mvn: mvn.into(),
      update_snapshots: false,
    }
  }

  /// Pass `-U` to every build
  pub fn update_snapshots(mut self, enabled: bool) -> Self {
    self.update_snapshots = enabled;
    self
  }

  fn args(&self, properties: &BTreeMap<String, String>, goals: &[&str]) -> Vec<String> {
    let mut args = vec!["-B".to_string()];
    if self.update_snapshots {
      args.push("-U".to_string());
    }
    args.extend(properties.iter().map(|(k, v)| format!("-D{}={}", k, v)));
    args.extend(goals.iter().map(|g| g.to_string()));
    args
  }
}

impl BuildRunner for MavenRunner {
  fn build(&self, dir: &Path, properties: &BTreeMap<String, String>, goals: &[&str]) -> PrereleaseResult<String> {
    let args = self.args(properties, goals);
    let command = format!("{} {}", self.mvn.display(), args.join(" "));
    tracing::info!(dir = %dir.display(), %command, "running build");

    let output = Command::new(&self.mvn)
      .args(&args)
      .current_dir(dir)
      .output()
      .map_err(|e| BuildError::Spawn {
        command: command.clone(),
        reason: e.to_string(),
      })?;

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    if !output.status.success() {
      return Err(
        BuildError::Failed {
          command,
          dir: dir.to_path_buf(),
          output: combined,
        }
        .into(),
      );
    }
    tracing::debug!(lines = combined.lines().count(), "build succeeded");
    Ok(combined)
  }

  fn effective_pom(&self, dir: &Path) -> PrereleaseResult<String> {
    let out = tempfile::Builder::new()
      .prefix("effective-pom")
      .suffix(".xml")
      .tempfile()
      .context("Failed to create temp file for effective pom")?;
    let mut properties = BTreeMap::new();
    properties.insert("output".to_string(), out.path().display().to_string());
    self.build(dir, &properties, &["help:effective-pom"])?;
    fs::read_to_string(out.path()).with_context(|| format!("Failed to read effective pom of {}", dir.display()))
  }
}
