//! Prerelease lifecycle: absent -> staged -> promoted | removed
//!
//! Creation stages an uncommitted tag working copy inside the target, builds
//! it and deploys the build into the target's `artifacts/`. Promotion turns
//! the staged tag into a real one, publishes the artifacts and advances the
//! origin to the next development version.
//!
//! All operations expect the archive to be open, i.e. locked.

pub mod outcome;

use crate::archive::Archive;
use crate::archive::target::Target;
use crate::core::error::{PrereleaseError, PrereleaseResult, ResultExt};
use crate::core::vcs::{Depth, Scm};
use crate::descriptor::Descriptor;
use crate::descriptor::schedule::Phase;
use crate::mail::Notifier;
use crate::maven::deploy::Deployer;
use crate::maven::runner::BuildRunner;
use crate::maven::{STAGING_REPOSITORY_ID, changes, pom};
use chrono::Local;
use outcome::{PromoteOutcome, warnings_report};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// External tools and settings a lifecycle step may use
pub struct Collaborators<'a> {
  pub scm: &'a dyn Scm,
  pub runner: &'a dyn BuildRunner,
  pub deployer: &'a dyn Deployer,
  pub notifier: &'a Notifier,
  /// User properties passed to every build
  pub properties: &'a BTreeMap<String, String>,
  /// Acting user, recorded in commit messages
  pub user: &'a str,
}

/// A staged prerelease: complete target plus its descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct Prerelease {
  pub descriptor: Descriptor,
  pub target: Target,
}

impl Prerelease {
  /// Load a complete target
  pub fn load(target: Target) -> PrereleaseResult<Self> {
    let descriptor = Descriptor::load(&target)?;
    Ok(Self { descriptor, target })
  }

  /// The prerelease for `revision` in any tier, if its creation finished
  pub fn lookup(archive: &Archive, revision: u64) -> PrereleaseResult<Option<Self>> {
    match archive.lookup(revision) {
      Some(target) if target.is_complete() => Ok(Some(Self::load(target)?)),
      _ => Ok(None),
    }
  }

  /// The existing prerelease for the descriptor's revision, or a new one
  pub fn lookup_or_create(archive: &Archive, descriptor: Descriptor, env: &Collaborators) -> PrereleaseResult<Self> {
    if let Some(existing) = Self::lookup(archive, descriptor.revision)? {
      tracing::info!(revision = descriptor.revision, dir = %existing.target.dir().display(), "prerelease exists");
      return Ok(existing);
    }
    Self::create(archive, descriptor, env)
  }

  /// Stage, build and archive a new prerelease in the primary tier.
  ///
  /// Leftovers of an interrupted creation of the same revision are staged
  /// for removal first. A failed creation is staged for removal with the
  /// error as cause. On success every other target of the archive is retired.
  pub fn create(archive: &Archive, descriptor: Descriptor, env: &Collaborators) -> PrereleaseResult<Self> {
    let revision = descriptor.revision;
    if let Some(stale) = archive.lookup(revision) {
      if stale.is_complete() {
        return Err(PrereleaseError::message(format!(
          "prerelease {} already exists in {}",
          revision,
          stale.dir().display()
        )));
      }
      archive.stage_for_removal(&stale, "incomplete, recreating")?;
    }

    if let Some(latest) = Archive::latest_revision_on_disk(archive.primary())?
      && latest > revision
    {
      tracing::warn!(archive = %archive.id(), revision, latest, "creating a prerelease older than the newest one, which it replaces");
    }
    let target = archive.target(revision);
    tracing::info!(archive = %archive.id(), revision, dir = %target.dir().display(), "creating prerelease");
    if let Err(e) = stage_and_build(&target, &descriptor, env) {
      if target.exists()
        && let Err(staging) = archive.stage_for_removal(&target, &format!("creation failed: {}", e))
      {
        tracing::warn!(error = %staging, dir = %target.dir().display(), "cannot stage failed prerelease for removal");
      }
      return Err(e);
    }

    descriptor.save(&target)?;
    for other in archive.list()? {
      if other.revision() != revision {
        archive.stage_for_removal(&other, &format!("replaced by {}", revision))?;
      }
    }
    tracing::info!(archive = %archive.id(), revision, "prerelease created");
    Ok(Self { descriptor, target })
  }

  /// Staged tag working copy
  pub fn checkout(&self) -> PathBuf {
    self.target.checkout(self.descriptor.tag_name())
  }

  /// Turn the prerelease into a release. See `PromoteOutcome` for what each result leaves behind.
  pub fn promote(&self, archive: &Archive, env: &Collaborators) -> PromoteOutcome {
    let descriptor = &self.descriptor;
    tracing::info!(tag = %descriptor.tag, revision = descriptor.revision, "promoting");

    for entry in descriptor.schedule.entries(Phase::BeforePromote) {
      if let Err(e) = env.runner.build(&self.checkout(), env.properties, &[&entry.goal_spec()]) {
        return PromoteOutcome::failed(e.context(format!("before-promote goal {} failed", entry.goal_spec())));
      }
    }

    let next = match NextIteration::prepare(descriptor, env) {
      Ok(next) => next,
      Err(e) => return PromoteOutcome::failed(e.context("Cannot prepare next development version")),
    };

    let mut lock = ScmLock::new(env.scm);
    if let Err(e) = lock.acquire(next.lock_paths(), &format!("{}: promoting {}", env.user, descriptor.tag_name())) {
      return PromoteOutcome::failed(e);
    }

    let message = format!("{}: tag {} (promoted by {})", descriptor.project.artifact_id, descriptor.tag_name(), env.user);
    if let Err(e) = env.scm.commit(&self.target.tags(), &message) {
      return PromoteOutcome::Failed {
        error: e.context(format!("Cannot commit tag {}", descriptor.tag)),
        compensated: true,
        suppressed: lock.release().err().into_iter().collect(),
      };
    }
    tracing::info!(tag = %descriptor.tag, "tag committed");

    if let Err(e) = env.deployer.deploy(
      &self.target.artifacts(),
      &descriptor.deploy_repository,
      descriptor.deploy_plugin_metadata,
    ) {
      return self.revert(archive, env, lock, e);
    }

    let mut warnings = Vec::new();
    for entry in descriptor.schedule.entries(Phase::AfterPromote) {
      if let Err(e) = env.runner.build(&self.checkout(), env.properties, &[&entry.goal_spec()]) {
        warnings.push(e.context(format!("after-promote goal {} failed", entry.goal_spec())));
      }
    }

    let message = format!(
      "{}: prepare for next development iteration {} ({})",
      descriptor.project.artifact_id, descriptor.next, env.user
    );
    match env.scm.commit(next.dir(), &message) {
      // commit releases the svn locks
      Ok(()) => lock.forget(),
      Err(e) => warnings.push(e.context(format!("Cannot commit next development version {}", descriptor.next))),
    }
    if let Err(e) = lock.release() {
      warnings.push(e);
    }

    if let Err(e) = archive.stage_for_removal(&self.target, "promoted") {
      warnings.push(e);
    }

    if warnings.is_empty() {
      tracing::info!(tag = %descriptor.tag, "promoted");
      PromoteOutcome::Promoted
    } else {
      for warning in &warnings {
        tracing::warn!(error = %warning, "promotion step failed");
      }
      env.notifier.notify(
        &format!("prerelease {}: promoted with warnings", descriptor.tag_name()),
        &warnings_report(&descriptor.tag, env.user, &warnings),
      );
      PromoteOutcome::PromotedWithWarnings(warnings)
    }
  }

  /// Compensation for a failed deployment: delete the tag, retire the target
  fn revert(&self, archive: &Archive, env: &Collaborators, mut lock: ScmLock, error: PrereleaseError) -> PromoteOutcome {
    tracing::warn!(error = %error, tag = %self.descriptor.tag, "deployment failed, reverting tag");
    let mut suppressed = Vec::new();
    let message = format!("{}: revert {}, deployment failed", env.user, self.descriptor.tag_name());
    if let Err(e) = env.scm.delete(&self.descriptor.tag, &message) {
      suppressed.push(e.context(format!("Cannot revert tag {}", self.descriptor.tag)));
    }
    if let Err(e) = archive.stage_for_removal(&self.target, &format!("deployment failed, tag reverted: {}", error)) {
      suppressed.push(e);
    }
    let compensated = suppressed.is_empty();
    if let Err(e) = lock.release() {
      suppressed.push(e);
    }
    PromoteOutcome::Failed {
      error,
      compensated,
      suppressed,
    }
  }
}

/// Steps 1-5 of creation; the caller cleans up on error
fn stage_and_build(target: &Target, descriptor: &Descriptor, env: &Collaborators) -> PrereleaseResult<()> {
  fs::create_dir_all(target.dir()).with_context(|| format!("Failed to create {}", target.dir().display()))?;

  env
    .scm
    .checkout(descriptor.tag_base(), None, Depth::Empty, &target.tags())?;
  let checkout = target.checkout(descriptor.tag_name());
  env
    .scm
    .copy_to_working_copy(&descriptor.origin, descriptor.revision, &checkout)?;

  let pom_file = checkout.join("pom.xml");
  let xml = fs::read_to_string(&pom_file).with_context(|| format!("Failed to read {}", pom_file.display()))?;
  let xml = pom::set_version(&xml, &descriptor.project.version)?;
  let xml = pom::set_scm(&xml, &descriptor.tag)?;
  fs::write(&pom_file, xml).with_context(|| format!("Failed to write {}", pom_file.display()))?;

  changes::stamp_file(&checkout, &descriptor.project.version, &today(), None)?;

  let mut properties = env.properties.clone();
  properties.extend(descriptor.schedule.skip_properties());
  properties.insert(
    "altDeploymentRepository".to_string(),
    format!("{}::default::file:{}", STAGING_REPOSITORY_ID, target.artifacts().display()),
  );
  env.runner.build(&checkout, &properties, &["clean", "deploy"])?;
  Ok(())
}

fn today() -> String {
  Local::now().format("%Y-%m-%d").to_string()
}

/// Fresh working copy of the origin, advanced to the next development version
struct NextIteration {
  // removed on drop
  _temp: tempfile::TempDir,
  dir: PathBuf,
  pom: PathBuf,
  changes: Option<PathBuf>,
}

impl NextIteration {
  fn prepare(descriptor: &Descriptor, env: &Collaborators) -> PrereleaseResult<Self> {
    let temp = tempfile::Builder::new()
      .prefix("prerelease-next")
      .tempdir()
      .context("Failed to create temp dir")?;
    let dir = temp.path().join("origin");
    env.scm.checkout(&descriptor.origin, None, Depth::Infinity, &dir)?;

    let pom_file = dir.join("pom.xml");
    let xml = fs::read_to_string(&pom_file).with_context(|| format!("Failed to read {}", pom_file.display()))?;
    let current = pom::ProjectModel::parse(&xml)?.version;
    if current != descriptor.previous {
      return Err(PrereleaseError::with_help(
        format!(
          "{} is at version {}, expected {}",
          descriptor.origin, current, descriptor.previous
        ),
        "Somebody changed the version since the prerelease was built. Create a new prerelease.",
      ));
    }
    fs::write(&pom_file, pom::set_version(&xml, &descriptor.next)?)?;

    let changes = changes::stamp_file(&dir, &descriptor.project.version, &today(), Some(&descriptor.next))?
      .then(|| changes::changes_file(&dir));
    Ok(Self {
      _temp: temp,
      dir,
      pom: pom_file,
      changes,
    })
  }

  fn dir(&self) -> &Path {
    &self.dir
  }

  fn lock_paths(&self) -> Vec<PathBuf> {
    std::iter::once(self.pom.clone()).chain(self.changes.clone()).collect()
  }
}

/// Repository lock on the next-iteration files. Unlocked on drop if still held.
struct ScmLock<'a> {
  scm: &'a dyn Scm,
  held: Vec<PathBuf>,
}

impl<'a> ScmLock<'a> {
  fn new(scm: &'a dyn Scm) -> Self {
    Self { scm, held: Vec::new() }
  }

  fn acquire(&mut self, paths: Vec<PathBuf>, message: &str) -> PrereleaseResult<()> {
    self.scm.lock(&paths, message)?;
    self.held = paths;
    Ok(())
  }

  /// The locks were released by other means (commit)
  fn forget(&mut self) {
    self.held.clear();
  }

  fn release(&mut self) -> PrereleaseResult<()> {
    if self.held.is_empty() {
      return Ok(());
    }
    let paths = std::mem::take(&mut self.held);
    self
      .scm
      .unlock(&paths)
      .with_context(|| format!("Cannot unlock {}", display_paths(&paths)))
  }
}

impl Drop for ScmLock<'_> {
  fn drop(&mut self) {
    if !self.held.is_empty() {
      tracing::warn!(paths = %display_paths(&self.held), "releasing svn lock after abnormal exit");
      if let Err(e) = self.release() {
        tracing::error!(error = %e, "svn lock still held, run `svn unlock --force` on the files");
      }
    }
  }
}

fn display_paths(paths: &[PathBuf]) -> String {
  paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::archive::removal_cause;
  use crate::descriptor::schedule::{Schedule, ScheduleEntry};
  use crate::maven::pom::ProjectModel;
  use crate::storage::cleanup::CleanupRegistry;
  use crate::storage::lock::LockManager;
  use crate::storage::{ProjectId, Storage};
  use crate::testing::{FakeDeployer, FakeRunner, FakeScm, RecordingMailer, TAG_URL, pom_xml};
  use std::time::Duration;
  use tempfile::TempDir;

  struct Fixture {
    archive: Archive,
    scm: FakeScm,
    runner: FakeRunner,
    deployer: FakeDeployer,
    mailer: RecordingMailer,
    notifier: Notifier,
    properties: BTreeMap<String, String>,
    _tier: TempDir,
  }

  impl Fixture {
    fn new() -> Self {
      let tier = TempDir::new().unwrap();
      let storage = Storage::new(
        vec![tier.path().to_path_buf()],
        LockManager::new(CleanupRegistry::new()),
      );
      let archive = Archive::open(&storage, ProjectId::new("org.example", "app"), Duration::from_secs(1)).unwrap();
      let mailer = RecordingMailer::new();
      let notifier = Notifier::new(Box::new(mailer.clone()), "prerelease@x", vec!["team@x".to_string()]);
      Self {
        _tier: tier,
        archive,
        scm: FakeScm::new(),
        runner: FakeRunner::new(),
        deployer: FakeDeployer::new(),
        mailer,
        notifier,
        properties: BTreeMap::new(),
      }
    }

    fn env(&self) -> Collaborators<'_> {
      Collaborators {
        scm: &self.scm,
        runner: &self.runner,
        deployer: &self.deployer,
        notifier: &self.notifier,
        properties: &self.properties,
        user: "builder",
      }
    }

    fn descriptor(&self, revision: u64, schedule: Schedule) -> Descriptor {
      let model = ProjectModel::parse(&pom_xml("1.2.0-SNAPSHOT")).unwrap();
      Descriptor::create(&model, revision, schedule).unwrap()
    }

    fn live(&self) -> Vec<u64> {
      self.archive.list().unwrap().iter().map(Target::revision).collect()
    }
  }

  fn after_promote() -> Schedule {
    Schedule::new(vec![ScheduleEntry {
      group_id: "org.example.plugins".to_string(),
      artifact_id: "announce".to_string(),
      goal: "mail".to_string(),
      phase: Phase::AfterPromote,
      skip: "announce.skip".to_string(),
    }])
  }

  #[test]
  fn test_create_stages_and_builds() {
    let f = Fixture::new();
    let prerelease = Prerelease::create(&f.archive, f.descriptor(100, after_promote()), &f.env()).unwrap();

    assert!(prerelease.target.is_complete());
    let staged_pom = fs::read_to_string(prerelease.checkout().join("pom.xml")).unwrap();
    assert!(staged_pom.contains("<version>1.2.0</version>"));
    assert!(staged_pom.contains(&format!("scm:svn:{}", TAG_URL)));

    let calls = f.runner.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].goals, vec!["clean", "deploy"]);
    assert_eq!(calls[0].properties["announce.skip"], "true");
    assert!(calls[0].properties["altDeploymentRepository"].starts_with("prerelease::default::file:/"));
    assert!(prerelease.target.artifacts().join("org/example/app/1.2.0/app-1.2.0.pom").is_file());
    // the tag is not committed by creation
    assert!(!f.scm.has_url(TAG_URL));
  }

  #[test]
  fn test_create_keeps_one_live_target() {
    let f = Fixture::new();
    Prerelease::create(&f.archive, f.descriptor(100, Schedule::default()), &f.env()).unwrap();
    Prerelease::create(&f.archive, f.descriptor(105, Schedule::default()), &f.env()).unwrap();
    assert_eq!(f.live(), vec![105]);
    assert_eq!(removal_cause(f.archive.primary()).unwrap(), "replaced by 105");

    // same revision again is served from the archive
    let again = Prerelease::lookup_or_create(&f.archive, f.descriptor(105, Schedule::default()), &f.env()).unwrap();
    assert_eq!(again.descriptor.revision, 105);
    assert_eq!(f.runner.calls().len(), 2);
    assert!(Prerelease::create(&f.archive, f.descriptor(105, Schedule::default()), &f.env()).is_err());
  }

  #[test]
  fn test_older_revision_replaces_newer() {
    let f = Fixture::new();
    Prerelease::create(&f.archive, f.descriptor(105, Schedule::default()), &f.env()).unwrap();
    Prerelease::create(&f.archive, f.descriptor(100, Schedule::default()), &f.env()).unwrap();
    assert_eq!(f.live(), vec![100]);
    assert_eq!(removal_cause(f.archive.primary()).unwrap(), "replaced by 100");
  }

  #[test]
  fn test_failed_build_is_staged_for_removal() {
    let f = Fixture::new();
    Prerelease::create(&f.archive, f.descriptor(100, Schedule::default()), &f.env()).unwrap();
    f.runner.fail_goal("deploy");

    assert!(Prerelease::create(&f.archive, f.descriptor(101, Schedule::default()), &f.env()).is_err());
    // the failed one is gone, the previous one survives
    assert_eq!(f.live(), vec![100]);
    assert!(removal_cause(f.archive.primary()).unwrap().starts_with("creation failed"));
  }

  #[test]
  fn test_incomplete_target_is_recreated() {
    let f = Fixture::new();
    fs::create_dir_all(f.archive.target(100).tags()).unwrap();
    Prerelease::create(&f.archive, f.descriptor(100, Schedule::default()), &f.env()).unwrap();
    assert_eq!(f.live(), vec![100]);
    assert_eq!(removal_cause(f.archive.primary()).unwrap(), "incomplete, recreating");
  }

  #[test]
  fn test_promote() {
    let f = Fixture::new();
    let prerelease = Prerelease::create(&f.archive, f.descriptor(100, Schedule::default()), &f.env()).unwrap();

    let outcome = prerelease.promote(&f.archive, &f.env());
    assert!(matches!(outcome, PromoteOutcome::Promoted), "{:?}", outcome);
    assert!(f.scm.has_url(TAG_URL));
    assert_eq!(f.deployer.deployed().len(), 1);
    assert!(f.scm.locked().is_empty());
    assert!(f.scm.commit_messages().iter().any(|m| m.contains("promoted by builder")));
    let next_pom = f.scm.committed_pom().unwrap();
    assert!(next_pom.contains("<version>1.2.1-SNAPSHOT</version>"));
    assert!(f.live().is_empty());
    assert_eq!(removal_cause(f.archive.primary()).unwrap(), "promoted");
    assert!(f.mailer.sent().is_empty());
  }

  #[test]
  fn test_promote_reverts_tag_when_deploy_fails() {
    let f = Fixture::new();
    let prerelease = Prerelease::create(&f.archive, f.descriptor(100, Schedule::default()), &f.env()).unwrap();
    f.deployer.fail();

    let outcome = prerelease.promote(&f.archive, &f.env());
    match &outcome {
      PromoteOutcome::Failed {
        compensated, suppressed, ..
      } => {
        assert!(*compensated);
        assert!(suppressed.is_empty());
      }
      other => panic!("unexpected outcome {:?}", other),
    }
    assert!(!f.scm.has_url(TAG_URL));
    assert!(f.scm.locked().is_empty());
    assert!(f.live().is_empty());
    assert!(
      removal_cause(f.archive.primary())
        .unwrap()
        .starts_with("deployment failed, tag reverted")
    );
    assert!(outcome.into_result().is_err());
  }

  #[test]
  fn test_failed_revert_is_suppressed_not_masking() {
    let f = Fixture::new();
    let prerelease = Prerelease::create(&f.archive, f.descriptor(100, Schedule::default()), &f.env()).unwrap();
    f.deployer.fail();
    f.scm.fail_on("delete");

    let err = prerelease.promote(&f.archive, &f.env()).into_result().unwrap_err();
    match err {
      PrereleaseError::Promote {
        cause,
        compensated,
        suppressed,
      } => {
        assert!(cause.to_string().contains("deploy"));
        assert!(!compensated);
        assert_eq!(suppressed.len(), 1);
        assert!(suppressed[0].to_string().starts_with(&format!("Cannot revert tag {}", TAG_URL)));
      }
      other => panic!("unexpected error {}", other),
    }
  }

  #[test]
  fn test_promote_survives_after_promote_failure() {
    let f = Fixture::new();
    let prerelease = Prerelease::create(&f.archive, f.descriptor(100, after_promote()), &f.env()).unwrap();
    f.runner.fail_goal("org.example.plugins:announce:mail");

    let outcome = prerelease.promote(&f.archive, &f.env());
    assert!(matches!(outcome, PromoteOutcome::PromotedWithWarnings(ref w) if w.len() == 1), "{:?}", outcome);
    assert!(f.scm.has_url(TAG_URL));
    assert_eq!(f.deployer.deployed().len(), 1);
    assert_eq!(f.mailer.sent().len(), 1);
    assert!(
      f.mailer.sent()[0]
        .body
        .contains("after-promote goal org.example.plugins:announce:mail failed: ")
    );
  }

  #[test]
  fn test_failed_next_commit_is_a_warning_and_unlocks() {
    let f = Fixture::new();
    let prerelease = Prerelease::create(&f.archive, f.descriptor(100, Schedule::default()), &f.env()).unwrap();
    f.scm.fail_on("commit");

    let outcome = prerelease.promote(&f.archive, &f.env());
    match &outcome {
      PromoteOutcome::PromotedWithWarnings(warnings) => {
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].to_string().starts_with("Cannot commit next development version 1.2.1-SNAPSHOT: "));
      }
      other => panic!("unexpected outcome {:?}", other),
    }
    assert!(f.scm.has_url(TAG_URL));
    assert!(f.scm.locked().is_empty());
    assert_eq!(f.mailer.sent().len(), 1);
  }

  #[test]
  fn test_failed_tag_commit_unlocks() {
    let f = Fixture::new();
    let prerelease = Prerelease::create(&f.archive, f.descriptor(100, Schedule::default()), &f.env()).unwrap();
    f.scm.fail_on("commit-tag");

    let err = prerelease.promote(&f.archive, &f.env()).into_result().unwrap_err();
    assert!(err.to_string().starts_with(&format!("Cannot commit tag {}: ", TAG_URL)), "{}", err);
    assert!(f.scm.locked().is_empty());
    assert!(f.deployer.deployed().is_empty());
    // nothing was published, the prerelease can be promoted again
    assert_eq!(f.live(), vec![100]);
  }

  #[test]
  fn test_promote_refuses_moved_origin() {
    let f = Fixture::new();
    let prerelease = Prerelease::create(&f.archive, f.descriptor(100, Schedule::default()), &f.env()).unwrap();
    f.scm.set_pom(pom_xml("1.3.0-SNAPSHOT"));

    let outcome = prerelease.promote(&f.archive, &f.env());
    assert!(matches!(outcome, PromoteOutcome::Failed { .. }), "{:?}", outcome);
    assert!(!f.scm.has_url(TAG_URL));
    assert!(f.scm.locked().is_empty());
  }

  #[test]
  fn test_unlock_on_panic() {
    let f = Fixture::new();
    let paths = vec![PathBuf::from("/wc/pom.xml")];
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
      let mut lock = ScmLock::new(&f.scm);
      lock.acquire(paths.clone(), "promote").unwrap();
      assert_eq!(f.scm.locked(), paths);
      panic!("out of memory during upload");
    }));
    assert!(result.is_err());
    assert!(f.scm.locked().is_empty());
  }
}
