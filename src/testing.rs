//! In-memory collaborators for unit tests

use crate::core::error::{BuildError, PrereleaseError, PrereleaseResult, ScmError};
use crate::core::vcs::{Depth, Scm};
use crate::mail::Mailer;
use crate::maven::deploy::Deployer;
use crate::maven::pom::{DeploymentRepository, ProjectModel};
use crate::maven::runner::BuildRunner;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

pub const TRUNK_URL: &str = "https://svn.example.org/repo/app/trunk";
pub const TAG_URL: &str = "https://svn.example.org/repo/app/tags/app-1.2.0";

/// Minimal pom of org.example:app living in trunk
pub fn pom_xml(version: &str) -> String {
  format!(
    r#"<?xml version="1.0" encoding="UTF-8"?>
<project xmlns="http://maven.apache.org/POM/4.0.0">
  <modelVersion>4.0.0</modelVersion>
  <groupId>org.example</groupId>
  <artifactId>app</artifactId>
  <version>{version}</version>
  <scm>
    <connection>scm:svn:{trunk}</connection>
    <developerConnection>scm:svn:{trunk}</developerConnection>
  </scm>
  <distributionManagement>
    <repository>
      <id>releases</id>
      <url>https://repo.example.org/releases</url>
    </repository>
  </distributionManagement>
</project>
"#,
    version = version,
    trunk = TRUNK_URL
  )
}

#[derive(Debug, Default)]
struct ScmState {
  urls: BTreeSet<String>,
  working_copies: BTreeMap<PathBuf, String>,
  tag_working_copies: BTreeSet<PathBuf>,
  locked: Vec<PathBuf>,
  pom: String,
  changes: Option<String>,
  revision: u64,
  uncommitted: Option<String>,
  pending: Option<String>,
  failing: BTreeSet<String>,
  commit_messages: Vec<String>,
  committed_pom: Option<String>,
  calls: Vec<String>,
}

/// Subversion stand-in that materializes `pom.xml` on checkout and copy
#[derive(Debug, Clone)]
pub struct FakeScm {
  state: Rc<RefCell<ScmState>>,
}

impl Default for FakeScm {
  fn default() -> Self {
    Self::new()
  }
}

impl FakeScm {
  pub fn new() -> Self {
    let state = ScmState {
      pom: pom_xml("1.2.0-SNAPSHOT"),
      revision: 100,
      ..ScmState::default()
    };
    Self {
      state: Rc::new(RefCell::new(state)),
    }
  }

  pub fn add_url(&self, url: &str) {
    self.state.borrow_mut().urls.insert(url.to_string());
  }

  pub fn has_url(&self, url: &str) -> bool {
    self.state.borrow().urls.contains(url)
  }

  pub fn set_pom(&self, pom: String) {
    self.state.borrow_mut().pom = pom;
  }

  pub fn set_changes(&self, changes: &str) {
    self.state.borrow_mut().changes = Some(changes.to_string());
  }

  pub fn set_revision(&self, revision: u64) {
    self.state.borrow_mut().revision = revision;
  }

  pub fn set_uncommitted_changes(&self, status: Option<&str>) {
    self.state.borrow_mut().uncommitted = status.map(str::to_string);
  }

  pub fn set_pending_updates(&self, status: Option<&str>) {
    self.state.borrow_mut().pending = status.map(str::to_string);
  }

  /// Make an operation fail from now on: checkout, copy, commit-tag, commit, lock, unlock, delete, exists, update
  pub fn fail_on(&self, op: &str) {
    self.state.borrow_mut().failing.insert(op.to_string());
  }

  pub fn locked(&self) -> Vec<PathBuf> {
    self.state.borrow().locked.clone()
  }

  pub fn commit_messages(&self) -> Vec<String> {
    self.state.borrow().commit_messages.clone()
  }

  /// pom.xml of the last regular (non-tag) commit
  pub fn committed_pom(&self) -> Option<String> {
    self.state.borrow().committed_pom.clone()
  }

  pub fn calls(&self) -> Vec<String> {
    self.state.borrow().calls.clone()
  }

  fn enter(&self, op: &str) -> PrereleaseResult<()> {
    let mut state = self.state.borrow_mut();
    state.calls.push(op.to_string());
    if state.failing.contains(op) {
      return Err(
        ScmError::CommandFailed {
          command: format!("svn {}", op),
          stderr: "svn: E000000: injected failure".to_string(),
        }
        .into(),
      );
    }
    Ok(())
  }

  fn materialize(&self, dest: &Path) -> PrereleaseResult<()> {
    let state = self.state.borrow();
    fs::create_dir_all(dest)?;
    fs::write(dest.join("pom.xml"), &state.pom)?;
    if let Some(changes) = &state.changes {
      let file = crate::maven::changes::changes_file(dest);
      if let Some(parent) = file.parent() {
        fs::create_dir_all(parent)?;
      }
      fs::write(file, changes)?;
    }
    Ok(())
  }
}

impl Scm for FakeScm {
  fn checkout(&self, url: &str, _revision: Option<u64>, depth: Depth, dest: &Path) -> PrereleaseResult<()> {
    self.enter("checkout")?;
    match depth {
      Depth::Empty => {
        fs::create_dir_all(dest)?;
        self.state.borrow_mut().tag_working_copies.insert(dest.to_path_buf());
      }
      Depth::Infinity => self.materialize(dest)?,
    }
    self
      .state
      .borrow_mut()
      .working_copies
      .insert(dest.to_path_buf(), url.to_string());
    Ok(())
  }

  fn update(&self, _dir: &Path) -> PrereleaseResult<()> {
    self.enter("update")
  }

  fn copy_to_working_copy(&self, _url: &str, _revision: u64, dest: &Path) -> PrereleaseResult<()> {
    self.enter("copy")?;
    self.materialize(dest)
  }

  fn commit(&self, dir: &Path, message: &str) -> PrereleaseResult<()> {
    let is_tags = self.state.borrow().tag_working_copies.contains(dir);
    if is_tags {
      self.enter("commit-tag")?;
      let base = self.state.borrow().working_copies.get(dir).cloned().unwrap_or_default();
      for child in fs::read_dir(dir)? {
        let child = child?;
        if child.file_type()?.is_dir() {
          let url = format!("{}/{}", base, child.file_name().to_string_lossy());
          self.state.borrow_mut().urls.insert(url);
        }
      }
    } else {
      self.enter("commit")?;
      let pom = fs::read_to_string(dir.join("pom.xml")).ok();
      let mut state = self.state.borrow_mut();
      state.committed_pom = pom;
      state.locked.retain(|path| !path.starts_with(dir));
    }
    self.state.borrow_mut().commit_messages.push(message.to_string());
    Ok(())
  }

  fn lock(&self, paths: &[PathBuf], _message: &str) -> PrereleaseResult<()> {
    self.enter("lock")?;
    let mut state = self.state.borrow_mut();
    if let Some(held) = paths.iter().find(|p| state.locked.contains(p)) {
      return Err(PrereleaseError::message(format!("{} is already locked", held.display())));
    }
    state.locked.extend(paths.iter().cloned());
    Ok(())
  }

  fn unlock(&self, paths: &[PathBuf]) -> PrereleaseResult<()> {
    self.enter("unlock")?;
    let mut state = self.state.borrow_mut();
    if let Some(free) = paths.iter().find(|p| !state.locked.contains(p)) {
      return Err(PrereleaseError::message(format!("{} is not locked", free.display())));
    }
    state.locked.retain(|p| !paths.contains(p));
    Ok(())
  }

  fn delete(&self, url: &str, _message: &str) -> PrereleaseResult<()> {
    self.enter("delete")?;
    if !self.state.borrow_mut().urls.remove(url) {
      return Err(PrereleaseError::message(format!("{} does not exist", url)));
    }
    Ok(())
  }

  fn exists(&self, url: &str) -> PrereleaseResult<bool> {
    self.enter("exists")?;
    Ok(self.has_url(url))
  }

  fn revision(&self, _dir: &Path) -> PrereleaseResult<u64> {
    Ok(self.state.borrow().revision)
  }

  fn url(&self, dir: &Path) -> PrereleaseResult<String> {
    Ok(
      self
        .state
        .borrow()
        .working_copies
        .get(dir)
        .cloned()
        .unwrap_or_else(|| TRUNK_URL.to_string()),
    )
  }

  fn uncommitted_changes(&self, _dir: &Path) -> PrereleaseResult<Option<String>> {
    Ok(self.state.borrow().uncommitted.clone())
  }

  fn pending_updates(&self, _dir: &Path) -> PrereleaseResult<Option<String>> {
    Ok(self.state.borrow().pending.clone())
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
  pub dir: PathBuf,
  pub properties: BTreeMap<String, String>,
  pub goals: Vec<String>,
}

#[derive(Debug, Default)]
struct RunnerState {
  calls: Vec<Call>,
  failing: BTreeSet<String>,
}

/// Build stand-in. A `deploy` with a `file:` altDeploymentRepository writes the pom and jar there.
#[derive(Debug, Clone, Default)]
pub struct FakeRunner {
  state: Rc<RefCell<RunnerState>>,
}

impl FakeRunner {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn calls(&self) -> Vec<Call> {
    self.state.borrow().calls.clone()
  }

  /// Fail every build that runs `goal`
  pub fn fail_goal(&self, goal: &str) {
    self.state.borrow_mut().failing.insert(goal.to_string());
  }

  fn deploy_locally(dir: &Path, repository: &str) -> PrereleaseResult<()> {
    let Some(root) = repository.split("::").nth(2).and_then(|url| url.strip_prefix("file:")) else {
      return Ok(());
    };
    let model = ProjectModel::parse(&fs::read_to_string(dir.join("pom.xml"))?)?;
    let version_dir = Path::new(root)
      .join(model.group_id.replace('.', "/"))
      .join(&model.artifact_id)
      .join(&model.version);
    fs::create_dir_all(&version_dir)?;
    let base = format!("{}-{}", model.artifact_id, model.version);
    fs::copy(dir.join("pom.xml"), version_dir.join(format!("{}.pom", base)))?;
    fs::write(version_dir.join(format!("{}.jar", base)), "jar")?;
    Ok(())
  }
}

impl BuildRunner for FakeRunner {
  fn build(&self, dir: &Path, properties: &BTreeMap<String, String>, goals: &[&str]) -> PrereleaseResult<String> {
    let goals: Vec<String> = goals.iter().map(|g| g.to_string()).collect();
    let failing = {
      let mut state = self.state.borrow_mut();
      state.calls.push(Call {
        dir: dir.to_path_buf(),
        properties: properties.clone(),
        goals: goals.clone(),
      });
      goals.iter().any(|g| state.failing.contains(g))
    };
    if failing {
      return Err(
        BuildError::Failed {
          command: format!("mvn {}", goals.join(" ")),
          dir: dir.to_path_buf(),
          output: "[ERROR] BUILD FAILURE".to_string(),
        }
        .into(),
      );
    }
    if goals.iter().any(|g| g == "deploy")
      && let Some(repository) = properties.get("altDeploymentRepository")
    {
      Self::deploy_locally(dir, repository)?;
    }
    Ok("[INFO] BUILD SUCCESS".to_string())
  }

  fn effective_pom(&self, dir: &Path) -> PrereleaseResult<String> {
    Ok(fs::read_to_string(dir.join("pom.xml"))?)
  }
}

#[derive(Debug, Default)]
struct DeployerState {
  fail: bool,
  deployed: Vec<(PathBuf, DeploymentRepository)>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeDeployer {
  state: Rc<RefCell<DeployerState>>,
}

impl FakeDeployer {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn fail(&self) {
    self.state.borrow_mut().fail = true;
  }

  pub fn deployed(&self) -> Vec<(PathBuf, DeploymentRepository)> {
    self.state.borrow().deployed.clone()
  }
}

impl Deployer for FakeDeployer {
  fn deploy(&self, artifacts: &Path, repository: &DeploymentRepository, _plugin_metadata: bool) -> PrereleaseResult<usize> {
    let mut state = self.state.borrow_mut();
    if state.fail {
      return Err(PrereleaseError::message(format!("deploy to {} failed: 503", repository.url)));
    }
    state.deployed.push((artifacts.to_path_buf(), repository.clone()));
    Ok(1)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
  pub from: String,
  pub to: Vec<String>,
  pub subject: String,
  pub body: String,
}

#[derive(Debug, Clone, Default)]
pub struct RecordingMailer {
  sent: Rc<RefCell<Vec<Sent>>>,
}

impl RecordingMailer {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn sent(&self) -> Vec<Sent> {
    self.sent.borrow().clone()
  }
}

impl Mailer for RecordingMailer {
  fn send(&self, from: &str, to: &[String], subject: &str, body: &str) -> PrereleaseResult<()> {
    self.sent.borrow_mut().push(Sent {
      from: from.to_string(),
      to: to.to_vec(),
      subject: subject.to_string(),
      body: body.to_string(),
    });
    Ok(())
  }
}
