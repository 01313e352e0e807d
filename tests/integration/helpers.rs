//! Test helpers for integration tests

use anyhow::{Context, Result};
use filetime::FileTime;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

/// Pid no Linux or macOS system hands out
pub const DEAD_PID: &str = "999999999";

/// Storage tiers in a temp dir
pub struct TestStorage {
  _root: TempDir,
  pub root: PathBuf,
  pub tiers: Vec<PathBuf>,
}

impl TestStorage {
  pub fn new(tiers: usize) -> Result<Self> {
    let root = TempDir::new()?;
    let path = root.path().to_path_buf();
    let tiers: Vec<PathBuf> = (0..tiers).map(|n| path.join(format!("tier{}", n))).collect();
    for tier in &tiers {
      std::fs::create_dir_all(tier)?;
    }
    Ok(Self {
      _root: root,
      root: path,
      tiers,
    })
  }

  pub fn archive(&self, tier: usize, group: &str, artifact: &str) -> PathBuf {
    self.tiers[tier].join(group).join(artifact)
  }

  pub fn lock_file(&self, tier: usize, group: &str, artifact: &str) -> PathBuf {
    self.tiers[tier].join(group).join(format!("{}.LOCK", artifact))
  }

  /// A finished prerelease as `create` leaves it
  pub fn add_prerelease(&self, tier: usize, group: &str, artifact: &str, revision: u64, version: &str) -> Result<PathBuf> {
    let dir = self.archive(tier, group, artifact).join(revision.to_string());
    let tag = format!("{}-{}", artifact, version);
    std::fs::create_dir_all(dir.join("tags").join(&tag))?;
    std::fs::create_dir_all(dir.join("artifacts"))?;
    std::fs::write(
      dir.join("prerelease.properties"),
      format!(
        r#"# prerelease of {group}:{artifact} r{revision}
svn.orig=https\://svn.example.org/repo/{artifact}/trunk
svn.tag=https\://svn.example.org/repo/{artifact}/tags/{tag}
project.name={artifact}
project.url=
project.groupId={group}
project.artifactId={artifact}
project.version={version}
deployRepository=releases\:\:default\:\:https\://repo.example.org/releases
deployPluginMetadata=false
previous={version}-SNAPSHOT
next={version}.1-SNAPSHOT
"#
      ),
    )?;
    Ok(dir)
  }

  /// A target whose build has not finished: no descriptor
  pub fn add_incomplete(&self, tier: usize, group: &str, artifact: &str, revision: u64) -> Result<PathBuf> {
    let dir = self.archive(tier, group, artifact).join(revision.to_string());
    std::fs::create_dir_all(dir.join("tags"))?;
    Ok(dir)
  }

  /// Lock file as a running or crashed process would leave it
  pub fn add_lock(&self, tier: usize, group: &str, artifact: &str, pid: &str) -> Result<PathBuf> {
    let path = self.lock_file(tier, group, artifact);
    std::fs::create_dir_all(path.parent().context("lock without parent")?)?;
    std::fs::write(&path, pid)?;
    Ok(path)
  }

  /// Run with `--storage` for every tier; fails if the command fails
  pub fn run(&self, args: &[&str]) -> Result<Output> {
    let output = self.run_raw(args)?;
    if !output.status.success() {
      anyhow::bail!(
        "prerelease command failed: prerelease {}\nstdout: {}\nstderr: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
      );
    }
    Ok(output)
  }

  /// Run and return the output whatever the exit code
  pub fn run_raw(&self, args: &[&str]) -> Result<Output> {
    let mut all: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    for tier in &self.tiers {
      all.push("--storage".to_string());
      all.push(tier.display().to_string());
    }
    run_prerelease(&self.root, &all)
  }
}

/// Run the prerelease binary
pub fn run_prerelease<S: AsRef<std::ffi::OsStr>>(cwd: &Path, args: &[S]) -> Result<Output> {
  let bin = env!("CARGO_BIN_EXE_prerelease");
  Command::new(bin)
    .current_dir(cwd)
    .args(args)
    .env("PRERELEASE_LOG", "warn")
    .output()
    .context("Failed to run prerelease")
}

pub fn stdout(output: &Output) -> String {
  String::from_utf8_lossy(&output.stdout).to_string()
}

/// Set the mtime of a prerelease (descriptor and directory) into the past
pub fn age(dir: &Path, days: u64) -> Result<()> {
  let then = FileTime::from_system_time(SystemTime::now() - Duration::from_secs(days * 24 * 60 * 60));
  filetime::set_file_mtime(dir.join("prerelease.properties"), then)?;
  filetime::set_file_mtime(dir, then)?;
  Ok(())
}
