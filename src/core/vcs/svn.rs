//! Subversion via the system `svn` binary
//!
//! Every call runs non-interactively in an isolated environment, with the
//! C locale so that status output and error codes are parseable.

use super::{Depth, Scm};
use crate::core::error::{PrereleaseResult, ResultExt, ScmError};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Error codes `svn info` reports for urls that do not exist
const NOT_FOUND_CODES: [&str; 3] = ["W170000", "E170000", "E200009"];

#[derive(Debug, Clone)]
pub struct SvnScm {
  svn: PathBuf,
}

impl SvnScm {
  pub fn new(svn: impl Into<PathBuf>) -> Self {
    Self { svn: svn.into() }
  }

  /// Create a svn command with isolated environment
  ///
  /// - Clears environment variables
  /// - Whitelists only PATH and HOME (credentials live in ~/.subversion)
  /// - Forces the C locale and --non-interactive
  fn svn_cmd(&self) -> Command {
    let mut cmd = Command::new(&self.svn);
    cmd.env_clear();
    if let Ok(path) = std::env::var("PATH") {
      cmd.env("PATH", path);
    }
    if let Ok(home) = std::env::var("HOME") {
      cmd.env("HOME", home);
    }
    cmd.env("LC_ALL", "C");
    cmd.arg("--non-interactive");
    cmd
  }

  /// Run and return stdout; non-zero exit is `ScmError::CommandFailed`
  fn run(&self, args: &[&str]) -> PrereleaseResult<String> {
    let command = format!("svn {}", args.join(" "));
    tracing::debug!(%command, "running svn");
    let output = self
      .svn_cmd()
      .args(args)
      .output()
      .with_context(|| format!("Failed to execute {}", command))?;
    if !output.status.success() {
      return Err(
        ScmError::CommandFailed {
          command,
          stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
        .into(),
      );
    }
    Ok(String::from_utf8(output.stdout)?)
  }

  fn info_item(&self, dir: &Path, item: &str) -> PrereleaseResult<String> {
    let path = dir.to_string_lossy();
    match self.run(&["info", "--show-item", item, &path]) {
      Ok(out) => Ok(out.trim().to_string()),
      Err(crate::core::error::PrereleaseError::Scm(ScmError::CommandFailed { stderr, .. }))
        if stderr.contains("E155007") =>
      {
        Err(
          ScmError::NotAWorkingCopy {
            path: dir.to_path_buf(),
          }
          .into(),
        )
      }
      Err(e) => Err(e),
    }
  }
}

fn paths_as_args(paths: &[PathBuf]) -> Vec<String> {
  paths.iter().map(|p| p.to_string_lossy().into_owned()).collect()
}

impl Scm for SvnScm {
  fn checkout(&self, url: &str, revision: Option<u64>, depth: Depth, dest: &Path) -> PrereleaseResult<()> {
    let target = match revision {
      Some(rev) => format!("{}@{}", url, rev),
      None => url.to_string(),
    };
    let dest = dest.to_string_lossy();
    self.run(&["checkout", "--quiet", "--depth", depth.as_str(), &target, &dest])?;
    Ok(())
  }

  fn update(&self, dir: &Path) -> PrereleaseResult<()> {
    self.run(&["update", "--quiet", &dir.to_string_lossy()])?;
    Ok(())
  }

  fn copy_to_working_copy(&self, url: &str, revision: u64, dest: &Path) -> PrereleaseResult<()> {
    let source = format!("{}@{}", url, revision);
    self.run(&["copy", "--quiet", &source, &dest.to_string_lossy()])?;
    Ok(())
  }

  fn commit(&self, dir: &Path, message: &str) -> PrereleaseResult<()> {
    self.run(&["commit", "--quiet", "-m", message, &dir.to_string_lossy()])?;
    Ok(())
  }

  fn lock(&self, paths: &[PathBuf], message: &str) -> PrereleaseResult<()> {
    let paths = paths_as_args(paths);
    let mut args = vec!["lock", "-m", message];
    args.extend(paths.iter().map(String::as_str));
    self.run(&args)?;
    Ok(())
  }

  fn unlock(&self, paths: &[PathBuf]) -> PrereleaseResult<()> {
    let paths = paths_as_args(paths);
    let mut args = vec!["unlock"];
    args.extend(paths.iter().map(String::as_str));
    self.run(&args)?;
    Ok(())
  }

  fn delete(&self, url: &str, message: &str) -> PrereleaseResult<()> {
    self.run(&["delete", "--quiet", "-m", message, url])?;
    Ok(())
  }

  fn exists(&self, url: &str) -> PrereleaseResult<bool> {
    match self.run(&["info", "--show-item", "kind", url]) {
      Ok(_) => Ok(true),
      Err(crate::core::error::PrereleaseError::Scm(ScmError::CommandFailed { stderr, .. }))
        if NOT_FOUND_CODES.iter().any(|code| stderr.contains(code)) =>
      {
        Ok(false)
      }
      Err(e) => Err(e),
    }
  }

  fn revision(&self, dir: &Path) -> PrereleaseResult<u64> {
    let revision = self.info_item(dir, "last-changed-revision")?;
    revision
      .parse()
      .with_context(|| format!("Unexpected revision '{}' for {}", revision, dir.display()))
  }

  fn url(&self, dir: &Path) -> PrereleaseResult<String> {
    Ok(self.info_item(dir, "url")?.trim_end_matches('/').to_string())
  }

  fn uncommitted_changes(&self, dir: &Path) -> PrereleaseResult<Option<String>> {
    let output = self.run(&["status", &dir.to_string_lossy()])?;
    Ok(modified_lines(&output))
  }

  fn pending_updates(&self, dir: &Path) -> PrereleaseResult<Option<String>> {
    let output = self.run(&["status", "--show-updates", &dir.to_string_lossy()])?;
    Ok(out_of_date_lines(&output))
  }
}

/// `svn status` lines other than unversioned files and externals
pub fn modified_lines(status: &str) -> Option<String> {
  let lines: Vec<&str> = status
    .lines()
    .filter(|l| !l.trim().is_empty())
    .filter(|l| !l.starts_with('?') && !l.starts_with('X') && !l.starts_with("Performing status"))
    .collect();
  (!lines.is_empty()).then(|| lines.join("\n"))
}

/// `svn status --show-updates` lines with the out-of-date marker in column 9
pub fn out_of_date_lines(status: &str) -> Option<String> {
  let lines: Vec<&str> = status.lines().filter(|l| l.chars().nth(8) == Some('*')).collect();
  (!lines.is_empty()).then(|| lines.join("\n"))
}
