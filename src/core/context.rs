//! Application context - build once in main, pass everywhere
//!
//! Holds the loaded configuration and the real collaborators (svn, mvn,
//! deployer, mail). Commands borrow it and hand `collaborators()` to the
//! prerelease state machine.

use crate::core::config::PrereleaseConfig;
use crate::core::error::{PrereleaseResult, ResultExt};
use crate::core::vcs::SvnScm;
use crate::descriptor::schedule::Schedule;
use crate::mail::Notifier;
use crate::maven::deploy::RepositoryDeployer;
use crate::maven::runner::MavenRunner;
use crate::prerelease::Collaborators;
use crate::storage::Storage;
use crate::storage::cleanup::CleanupRegistry;
use crate::storage::lock::LockManager;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Command line settings that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
  /// Explicit config file instead of the search order
  pub config: Option<PathBuf>,
  /// Replaces the configured storage tiers
  pub storages: Vec<PathBuf>,
  /// Lock timeout in seconds
  pub timeout: Option<u64>,
}

impl Overrides {
  /// Load the config file and apply the overrides.
  ///
  /// Without a config file, `--storage` alone is enough to run.
  pub fn load(&self, dir: &Path) -> PrereleaseResult<PrereleaseConfig> {
    let mut config = match &self.config {
      Some(path) => PrereleaseConfig::load_file(path)?,
      None => match PrereleaseConfig::find_config_path(dir) {
        Some(path) => PrereleaseConfig::load_file(&path)?,
        None if !self.storages.is_empty() => PrereleaseConfig::new(Vec::new()),
        None => PrereleaseConfig::load(dir)?,
      },
    };
    if !self.storages.is_empty() {
      config.storages = self
        .storages
        .iter()
        .map(|s| std::path::absolute(s).with_context(|| format!("Invalid storage {}", s.display())))
        .collect::<PrereleaseResult<_>>()?;
    }
    if let Some(timeout) = self.timeout {
      config.lock_timeout = timeout;
    }
    config.validate()?;
    Ok(config)
  }
}

pub struct AppContext {
  pub config: PrereleaseConfig,
  pub storage: Storage,
  pub scm: SvnScm,
  pub runner: MavenRunner,
  pub deployer: RepositoryDeployer<MavenRunner>,
  pub notifier: Notifier,
  pub schedule: Schedule,
  pub user: String,
}

impl AppContext {
  pub fn build(config: PrereleaseConfig, registry: CleanupRegistry) -> Self {
    let storage = Storage::new(config.storages.clone(), LockManager::new(registry));
    // builds always refresh snapshots; deploy-file runs need no -U
    let runner = MavenRunner::new(&config.tools.mvn).update_snapshots(true);
    let deployer = RepositoryDeployer::new(MavenRunner::new(&config.tools.mvn));
    Self {
      storage,
      scm: SvnScm::new(&config.tools.svn),
      runner,
      deployer,
      notifier: Notifier::from_config(config.mail.as_ref()),
      schedule: Schedule::new(config.schedule.clone()),
      user: config.acting_user(),
      config,
    }
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.config.lock_timeout)
  }

  pub fn collaborators(&self) -> Collaborators<'_> {
    Collaborators {
      scm: &self.scm,
      runner: &self.runner,
      deployer: &self.deployer,
      notifier: &self.notifier,
      properties: &self.config.properties,
      user: &self.user,
    }
  }
}
