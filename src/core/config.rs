use crate::core::error::{ConfigError, PrereleaseError, PrereleaseResult, ResultExt};
use crate::descriptor::schedule::ScheduleEntry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for prerelease
/// Searched in order: prerelease.toml, .prerelease.toml, .config/prerelease.toml,
/// then the user config dir (`~/.config/prerelease/config.toml` on Linux)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrereleaseConfig {
  /// Storage tiers, primary first. New prereleases always go to the first one.
  pub storages: Vec<PathBuf>,

  /// Seconds to wait for an archive lock
  #[serde(default = "default_lock_timeout")]
  pub lock_timeout: u64,

  /// Prereleases kept per project by `wipe`
  #[serde(default = "default_keep")]
  pub keep: usize,

  /// Age after which `swap` moves a prerelease to the next tier
  #[serde(default)]
  pub swap_after_days: u64,

  /// Acting user recorded in commit messages (default: $USER)
  #[serde(default)]
  pub user: Option<String>,

  /// Extra -D properties passed to every Maven invocation
  #[serde(default)]
  pub properties: BTreeMap<String, String>,

  #[serde(default)]
  pub tools: ToolsConfig,

  /// Coordinates of this tool's own Maven plugin; exempt from the release check
  #[serde(default)]
  pub self_plugin: PluginCoordinates,

  #[serde(default)]
  pub mail: Option<MailConfig>,

  /// Plugins that only run around promotion
  #[serde(default)]
  pub schedule: Vec<ScheduleEntry>,
}

fn default_lock_timeout() -> u64 {
  3600
}

fn default_keep() -> usize {
  1
}

/// External binaries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
  #[serde(default = "default_mvn")]
  pub mvn: PathBuf,
  #[serde(default = "default_svn")]
  pub svn: PathBuf,
  /// Used by `locksmith --ps`
  #[serde(default = "default_ps")]
  pub ps: PathBuf,
}

fn default_mvn() -> PathBuf {
  PathBuf::from("mvn")
}

fn default_svn() -> PathBuf {
  PathBuf::from("svn")
}

fn default_ps() -> PathBuf {
  PathBuf::from("ps")
}

impl Default for ToolsConfig {
  fn default() -> Self {
    Self {
      mvn: default_mvn(),
      svn: default_svn(),
      ps: default_ps(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginCoordinates {
  pub group_id: String,
  pub artifact_id: String,
}

impl Default for PluginCoordinates {
  fn default() -> Self {
    Self {
      group_id: "net.oneandone.maven.plugins".to_string(),
      artifact_id: "prerelease".to_string(),
    }
  }
}

/// Notification mail settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
  pub from: String,
  pub to: Vec<String>,
  #[serde(default = "default_sendmail")]
  pub sendmail: PathBuf,
}

fn default_sendmail() -> PathBuf {
  PathBuf::from("/usr/sbin/sendmail")
}

impl PrereleaseConfig {
  /// Candidate config files, in search order
  pub fn candidates(dir: &Path) -> Vec<PathBuf> {
    let mut candidates = vec![
      dir.join("prerelease.toml"),
      dir.join(".prerelease.toml"),
      dir.join(".config").join("prerelease.toml"),
    ];
    if let Some(config_dir) = dirs::config_dir() {
      candidates.push(config_dir.join("prerelease").join("config.toml"));
    }
    candidates
  }

  /// First existing candidate
  pub fn find_config_path(dir: &Path) -> Option<PathBuf> {
    Self::candidates(dir).into_iter().find(|p| p.exists())
  }

  /// Load config (searches multiple locations)
  pub fn load(dir: &Path) -> PrereleaseResult<Self> {
    let config_path = Self::find_config_path(dir).ok_or_else(|| {
      PrereleaseError::Config(ConfigError::NotFound {
        searched: Self::candidates(dir),
      })
    })?;
    Self::load_file(&config_path)
  }

  pub fn load_file(config_path: &Path) -> PrereleaseResult<Self> {
    let content = fs::read_to_string(config_path)
      .with_context(|| format!("Failed to read config from {}", config_path.display()))?;
    let config: PrereleaseConfig = toml_edit::de::from_str(&content)
      .with_context(|| format!("Failed to parse config from {}", config_path.display()))?;

    config
      .validate()
      .with_context(|| format!("Invalid configuration in {}", config_path.display()))?;

    Ok(config)
  }

  /// Config with defaults for everything but the storage tiers
  pub fn new(storages: Vec<PathBuf>) -> Self {
    Self {
      storages,
      lock_timeout: default_lock_timeout(),
      keep: default_keep(),
      swap_after_days: 0,
      user: None,
      properties: BTreeMap::new(),
      tools: ToolsConfig::default(),
      self_plugin: PluginCoordinates::default(),
      mail: None,
      schedule: Vec::new(),
    }
  }

  pub fn validate(&self) -> PrereleaseResult<()> {
    if self.storages.is_empty() {
      return Err(PrereleaseError::Config(ConfigError::MissingField {
        field: "storages".to_string(),
      }));
    }
    for storage in &self.storages {
      if !storage.is_absolute() {
        return Err(PrereleaseError::Config(ConfigError::Invalid {
          field: "storages".to_string(),
          reason: format!("{} is not an absolute path", storage.display()),
        }));
      }
    }
    if let Some(mail) = &self.mail
      && mail.to.is_empty()
    {
      return Err(PrereleaseError::Config(ConfigError::Invalid {
        field: "mail.to".to_string(),
        reason: "at least one recipient required".to_string(),
      }));
    }
    Ok(())
  }

  /// User named in commit messages and notifications
  pub fn acting_user(&self) -> String {
    self
      .user
      .clone()
      .or_else(|| std::env::var("USER").ok())
      .or_else(|| std::env::var("USERNAME").ok())
      .unwrap_or_else(|| "unknown".to_string())
  }
}
