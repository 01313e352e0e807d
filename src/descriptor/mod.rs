//! Persisted metadata of one prerelease
//!
//! - **properties**: java.util.Properties codec used for `prerelease.properties`
//! - **schedule**: plugins gated to run before or after promotion
//! - **version**: version bumping and tag url derivation

pub mod properties;
pub mod schedule;
pub mod version;

use crate::archive::target::Target;
use crate::core::config::PluginCoordinates;
use crate::core::error::{DescriptorError, PrereleaseError, PrereleaseResult, ResultExt, VersioningProblem};
use crate::core::vcs::Scm;
use crate::maven::pom::{DeploymentRepository, ProjectModel};
use crate::storage::ProjectId;
use properties::Properties;
use schedule::{Schedule, ScheduleEntry};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Project identity recorded at creation time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectInfo {
  pub name: String,
  pub url: String,
  pub group_id: String,
  pub artifact_id: String,
  /// Release version, without -SNAPSHOT
  pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Descriptor {
  pub revision: u64,
  /// Location the prerelease was built from, never ends in `/`
  pub origin: String,
  /// Tag location, never ends in `/`
  pub tag: String,
  pub project: ProjectInfo,
  pub deploy_repository: DeploymentRepository,
  pub deploy_plugin_metadata: bool,
  /// Development version before the release
  pub previous: String,
  /// Development version after the release
  pub next: String,
  pub schedule: Schedule,
}

impl Descriptor {
  /// Derive everything a prerelease needs from the effective pom.
  ///
  /// Fails before anything touches the disk when the project has no scm
  /// connection, no deployment repository, an origin outside trunk/branches,
  /// or a version that cannot be bumped.
  pub fn create(model: &ProjectModel, revision: u64, schedule: Schedule) -> PrereleaseResult<Self> {
    let origin = model
      .scm
      .as_deref()
      .ok_or(DescriptorError::MissingScm)?
      .trim_end_matches('/')
      .to_string();
    let release = version::release_version(&model.version).to_string();
    let tag = version::tag_url(&origin, &model.artifact_id, &release)?;
    let next = version::next_development_version(&release)?;
    let deploy_repository = model.repository.clone().ok_or(DescriptorError::MissingRepository)?;

    Ok(Self {
      revision,
      origin,
      tag,
      project: ProjectInfo {
        name: model.name.clone().unwrap_or_else(|| model.artifact_id.clone()),
        url: model.url.clone().unwrap_or_default(),
        group_id: model.group_id.clone(),
        artifact_id: model.artifact_id.clone(),
        version: release,
      },
      deploy_repository,
      deploy_plugin_metadata: model.packaging == "maven-plugin",
      previous: model.version.clone(),
      next,
      schedule,
    })
  }

  /// Release policy: snapshot project, released parent, dependencies and plugins, fresh tag.
  ///
  /// All policy violations are reported together. The tag is only looked up
  /// when the policy holds.
  pub fn check(self, model: &ProjectModel, self_plugin: &PluginCoordinates, scm: &dyn Scm) -> PrereleaseResult<Self> {
    let mut violations = Vec::new();
    if !version::is_snapshot(&model.version) {
      violations.push(format!("project version {} is not a snapshot", model.version));
    }
    if let Some(parent) = &model.parent
      && version::is_snapshot(&parent.version)
    {
      violations.push(format!("parent {} is a snapshot", parent));
    }
    for dependency in &model.dependencies {
      if version::is_snapshot(&dependency.version) {
        violations.push(format!("dependency {} is a snapshot", dependency));
      }
    }
    for plugin in &model.plugins {
      if plugin.group_id == self_plugin.group_id && plugin.artifact_id == self_plugin.artifact_id {
        continue;
      }
      if version::is_snapshot(&plugin.version) {
        violations.push(format!("plugin {} is a snapshot", plugin));
      }
    }
    if !violations.is_empty() {
      return Err(VersioningProblem { violations }.into());
    }
    if scm.exists(&self.tag)? {
      return Err(DescriptorError::TagAlreadyExists { url: self.tag }.into());
    }
    Ok(self)
  }

  pub fn id(&self) -> ProjectId {
    ProjectId::new(&self.project.group_id, &self.project.artifact_id)
  }

  pub fn tag_name(&self) -> &str {
    version::tag_name(&self.tag)
  }

  pub fn tag_base(&self) -> &str {
    version::tag_base(&self.tag)
  }

  pub fn to_properties(&self) -> Properties {
    let mut props = Properties::new();
    props.set("svn.orig", &self.origin);
    props.set("svn.tag", &self.tag);
    props.set("project.name", &self.project.name);
    props.set("project.url", &self.project.url);
    props.set("project.groupId", &self.project.group_id);
    props.set("project.artifactId", &self.project.artifact_id);
    props.set("project.version", &self.project.version);
    props.set("deployRepository", self.deploy_repository.to_string());
    props.set("deployPluginMetadata", self.deploy_plugin_metadata.to_string());
    props.set("previous", &self.previous);
    props.set("next", &self.next);
    for (n, entry) in self.schedule.all().iter().enumerate() {
      props.set(format!("plugin.{}.groupId", n), &entry.group_id);
      props.set(format!("plugin.{}.artifactId", n), &entry.artifact_id);
      props.set(format!("plugin.{}.goal", n), &entry.goal);
      props.set(format!("plugin.{}.phase", n), entry.phase.as_str());
      props.set(format!("plugin.{}.skip", n), &entry.skip);
    }
    props
  }

  pub fn from_properties(props: &Properties, revision: u64, file: &Path) -> PrereleaseResult<Self> {
    let get = |key: &str| -> PrereleaseResult<String> {
      props.get(key).map(str::to_string).ok_or_else(|| {
        DescriptorError::MissingProperty {
          file: file.to_path_buf(),
          key: key.to_string(),
        }
        .into()
      })
    };

    let mut entries = Vec::new();
    for n in 0.. {
      if props.get(&format!("plugin.{}.groupId", n)).is_none() {
        break;
      }
      entries.push(ScheduleEntry {
        group_id: get(&format!("plugin.{}.groupId", n))?,
        artifact_id: get(&format!("plugin.{}.artifactId", n))?,
        goal: get(&format!("plugin.{}.goal", n))?,
        phase: get(&format!("plugin.{}.phase", n))?.parse()?,
        skip: get(&format!("plugin.{}.skip", n))?,
      });
    }

    Ok(Self {
      revision,
      origin: get("svn.orig")?,
      tag: get("svn.tag")?,
      project: ProjectInfo {
        name: get("project.name")?,
        url: get("project.url")?,
        group_id: get("project.groupId")?,
        artifact_id: get("project.artifactId")?,
        version: get("project.version")?,
      },
      deploy_repository: get("deployRepository")?.parse()?,
      deploy_plugin_metadata: get("deployPluginMetadata")? == "true",
      previous: get("previous")?,
      next: get("next")?,
      schedule: Schedule::new(entries),
    })
  }

  pub fn load(target: &Target) -> PrereleaseResult<Self> {
    let file = target.descriptor_file();
    let text = fs::read_to_string(&file).with_context(|| format!("Failed to read descriptor {}", file.display()))?;
    let props = Properties::parse(&text).with_context(|| format!("Malformed descriptor {}", file.display()))?;
    Self::from_properties(&props, target.revision(), &file)
  }

  /// Write the descriptor. Goes through a temp file, so a present descriptor is always complete.
  pub fn save(&self, target: &Target) -> PrereleaseResult<()> {
    if target.revision() != self.revision {
      return Err(PrereleaseError::message(format!(
        "descriptor for revision {} cannot be saved in target {}",
        self.revision,
        target.dir().display()
      )));
    }
    let file = target.descriptor_file();
    let tmp = file.with_extension("properties.tmp");
    let text = self.to_properties().write(Some(&format!("prerelease of {} r{}", self.id(), self.revision)));
    fs::write(&tmp, text).with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, &file).with_context(|| format!("Failed to write {}", file.display()))?;
    Ok(())
  }
}
