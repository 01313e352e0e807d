//! Publishing the artifacts collected in a target
//!
//! The build deployed into `artifacts/` with the default repository layout:
//! `<group path>/<artifactId>/<version>/<artifactId>-<version>[-<classifier>].<type>`
//! plus `maven-metadata.xml` files one and two levels up. `file:` repositories
//! get the files copied and their metadata merged; any other repository gets
//! one `deploy:deploy-file` per version directory.

use crate::core::error::{PrereleaseError, PrereleaseResult, ResultExt};
use crate::descriptor::version;
use crate::maven::pom::DeploymentRepository;
use crate::maven::runner::BuildRunner;
use crate::ui::progress::DeployProgress;
use crate::utils;
use chrono::Utc;
use roxmltree::Document;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const METADATA: &str = "maven-metadata.xml";
const CHECKSUMS: [&str; 4] = [".md5", ".sha1", ".sha256", ".sha512"];

pub trait Deployer {
  /// Publish everything below `artifacts`; returns the number of files published
  fn deploy(&self, artifacts: &Path, repository: &DeploymentRepository, plugin_metadata: bool)
  -> PrereleaseResult<usize>;
}

/// Files of one `<artifactId>/<version>` directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSet {
  /// Relative to the artifacts root
  pub dir: PathBuf,
  pub artifact_id: String,
  pub version: String,
  pub pom: PathBuf,
  /// Main artifact; None for pom packaging
  pub main: Option<PathBuf>,
  pub attached: Vec<Attached>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attached {
  pub file: PathBuf,
  pub classifier: String,
  pub kind: String,
}

impl ArtifactSet {
  fn files(&self) -> usize {
    1 + usize::from(self.main.is_some()) + self.attached.len()
  }
}

/// Version directories below `root`, sorted by path
pub fn collect(root: &Path) -> PrereleaseResult<Vec<ArtifactSet>> {
  let mut sets = Vec::new();
  walk(root, root, &mut sets)?;
  sets.sort_by(|a, b| a.dir.cmp(&b.dir));
  Ok(sets)
}

fn walk(root: &Path, dir: &Path, sets: &mut Vec<ArtifactSet>) -> PrereleaseResult<()> {
  let mut files = Vec::new();
  for entry in fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))? {
    let entry = entry?;
    let path = entry.path();
    if entry.file_type()?.is_dir() {
      walk(root, &path, sets)?;
    } else {
      files.push(path);
    }
  }
  if files.iter().any(|f| f.extension().is_some_and(|e| e == "pom")) {
    sets.push(artifact_set(root, dir, files)?);
  }
  Ok(())
}

fn artifact_set(root: &Path, dir: &Path, mut files: Vec<PathBuf>) -> PrereleaseResult<ArtifactSet> {
  let rel = dir.strip_prefix(root).unwrap_or(dir).to_path_buf();
  let version = file_name(dir);
  let artifact_id = dir.parent().map(file_name).unwrap_or_default();
  let base = format!("{}-{}", artifact_id, version);
  files.sort();

  let mut pom = None;
  let mut main = None;
  let mut attached = Vec::new();
  for file in files {
    let name = file_name(&file);
    if name.starts_with(METADATA) || CHECKSUMS.iter().any(|c| name.ends_with(c)) {
      continue;
    }
    let Some(rest) = name.strip_prefix(&base) else {
      tracing::warn!(file = %file.display(), "unexpected file in artifact directory, not deployed");
      continue;
    };
    if let Some(kind) = rest.strip_prefix('.') {
      if kind == "pom" {
        pom = Some(file);
      } else if main.is_none() {
        main = Some(file);
      } else {
        attached.push(Attached {
          file,
          classifier: String::new(),
          kind: kind.to_string(),
        });
      }
    } else if let Some(rest) = rest.strip_prefix('-')
      && let Some((classifier, kind)) = rest.split_once('.')
    {
      attached.push(Attached {
        file: file.clone(),
        classifier: classifier.to_string(),
        kind: kind.to_string(),
      });
    }
  }

  let pom = pom.ok_or_else(|| PrereleaseError::message(format!("No {}.pom in {}", base, dir.display())))?;
  Ok(ArtifactSet {
    dir: rel,
    artifact_id,
    version,
    pom,
    main,
    attached,
  })
}

fn file_name(path: &Path) -> String {
  path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

/// Copies into `file:` repositories, runs `deploy:deploy-file` for everything else
pub struct RepositoryDeployer<R: BuildRunner> {
  runner: R,
}

impl<R: BuildRunner> RepositoryDeployer<R> {
  pub fn new(runner: R) -> Self {
    Self { runner }
  }

  fn copy_to(&self, artifacts: &Path, repo: &Path, sets: &[ArtifactSet], plugin_metadata: bool) -> PrereleaseResult<usize> {
    // releases are immutable: check everything before copying anything
    for set in sets {
      let dest = repo.join(&set.dir);
      if dest.exists() {
        return Err(PrereleaseError::message(format!("{} already exists", dest.display())));
      }
    }

    let mut progress = DeployProgress::new(sets.len(), "deploying");
    let mut count = 0;
    for set in sets {
      let dest = repo.join(&set.dir);
      fs::create_dir_all(&dest).with_context(|| format!("Failed to create {}", dest.display()))?;
      let files = std::iter::once(&set.pom)
        .chain(set.main.as_ref())
        .chain(set.attached.iter().map(|a| &a.file));
      for file in files {
        let target = dest.join(file_name(file));
        fs::copy(file, &target).with_context(|| format!("Failed to copy {} to {}", file.display(), target.display()))?;
        count += 1;
      }

      if let Some(artifact_dir) = set.dir.parent() {
        count += merge_metadata_file(&artifacts.join(artifact_dir), &repo.join(artifact_dir), merge_versions)?;
        if plugin_metadata && let Some(group_dir) = artifact_dir.parent() {
          count += merge_metadata_file(&artifacts.join(group_dir), &repo.join(group_dir), merge_plugins)?;
        }
      }
      progress.inc();
    }
    Ok(count)
  }

  fn deploy_files(&self, artifacts: &Path, repository: &DeploymentRepository, sets: &[ArtifactSet]) -> PrereleaseResult<usize> {
    let mut progress = DeployProgress::new(sets.len(), "deploying");
    let mut count = 0;
    for set in sets {
      let mut properties = BTreeMap::new();
      properties.insert("repositoryId".to_string(), repository.id.clone());
      properties.insert("url".to_string(), repository.url.clone());
      properties.insert("pomFile".to_string(), set.pom.display().to_string());
      properties.insert(
        "file".to_string(),
        set.main.as_ref().unwrap_or(&set.pom).display().to_string(),
      );
      if !set.attached.is_empty() {
        let join = |f: fn(&Attached) -> String| set.attached.iter().map(f).collect::<Vec<_>>().join(",");
        properties.insert("files".to_string(), join(|a| a.file.display().to_string()));
        properties.insert("classifiers".to_string(), join(|a| a.classifier.clone()));
        properties.insert("types".to_string(), join(|a| a.kind.clone()));
      }
      self
        .runner
        .build(artifacts, &properties, &["deploy:deploy-file"])
        .with_context(|| format!("Failed to deploy {}:{}", set.artifact_id, set.version))?;
      count += set.files();
      progress.inc();
    }
    Ok(count)
  }
}

impl<R: BuildRunner> Deployer for RepositoryDeployer<R> {
  fn deploy(&self, artifacts: &Path, repository: &DeploymentRepository, plugin_metadata: bool) -> PrereleaseResult<usize> {
    let sets = collect(artifacts)?;
    if sets.is_empty() {
      return Err(PrereleaseError::message(format!(
        "Nothing to deploy in {}",
        artifacts.display()
      )));
    }
    tracing::info!(repository = %repository.url, artifacts = sets.len(), "deploying");
    let count = match utils::file_url_to_path(&repository.url) {
      Some(repo) => self.copy_to(artifacts, &repo, &sets, plugin_metadata)?,
      None => {
        if plugin_metadata {
          tracing::debug!("plugin prefix metadata is maintained by the remote repository");
        }
        self.deploy_files(artifacts, repository, &sets)?
      }
    };
    tracing::info!(files = count, "deployed");
    Ok(count)
  }
}

/// Merge `from/maven-metadata.xml` into `to/maven-metadata.xml`. Returns 1 if a file was written.
fn merge_metadata_file(
  from: &Path,
  to: &Path,
  merge: fn(Option<&str>, &str) -> PrereleaseResult<String>,
) -> PrereleaseResult<usize> {
  let incoming = from.join(METADATA);
  if !incoming.is_file() {
    return Ok(0);
  }
  let incoming = fs::read_to_string(&incoming)?;
  let dest = to.join(METADATA);
  let existing = if dest.is_file() { Some(fs::read_to_string(&dest)?) } else { None };
  let merged = merge(existing.as_deref(), &incoming).with_context(|| format!("Failed to merge {}", dest.display()))?;
  fs::create_dir_all(to)?;
  fs::write(&dest, merged).with_context(|| format!("Failed to write {}", dest.display()))?;
  // checksums of the old file would be wrong now
  for checksum in CHECKSUMS {
    let stale = to.join(format!("{}{}", METADATA, checksum));
    if stale.exists() {
      fs::remove_file(&stale)?;
    }
  }
  Ok(1)
}

fn text_of(doc: &Document, name: &str) -> Option<String> {
  doc
    .descendants()
    .find(|n| n.is_element() && n.tag_name().name() == name)
    .and_then(|n| n.text())
    .map(|t| t.trim().to_string())
}

fn texts_of(doc: &Document, name: &str) -> Vec<String> {
  doc
    .descendants()
    .filter(|n| n.is_element() && n.tag_name().name() == name)
    .filter_map(|n| n.text().map(|t| t.trim().to_string()))
    .collect()
}

/// Artifact-level metadata: union of versions. `latest` and `release` only move forward.
pub fn merge_versions(existing: Option<&str>, incoming: &str) -> PrereleaseResult<String> {
  let new = Document::parse(incoming)?;
  let group_id = text_of(&new, "groupId").unwrap_or_default();
  let artifact_id = text_of(&new, "artifactId").unwrap_or_default();
  let new_versions = texts_of(&new, "version");
  let new_release = text_of(&new, "release").or_else(|| new_versions.last().cloned());
  let new_latest = text_of(&new, "latest").or_else(|| new_release.clone());

  let (mut versions, mut release, mut latest) = match existing {
    Some(xml) => {
      let old = Document::parse(xml)?;
      (texts_of(&old, "version"), text_of(&old, "release"), text_of(&old, "latest"))
    }
    None => (Vec::new(), None, None),
  };
  for version in &new_versions {
    if !versions.contains(version) {
      versions.push(version.clone());
    }
  }
  release = newest(release, new_release);
  latest = newest(newest(latest, new_latest), release.clone());

  let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<metadata>\n");
  xml.push_str(&format!(
    "  <groupId>{}</groupId>\n  <artifactId>{}</artifactId>\n",
    escape_xml(&group_id),
    escape_xml(&artifact_id)
  ));
  xml.push_str("  <versioning>\n");
  if let Some(latest) = &latest {
    xml.push_str(&format!("    <latest>{}</latest>\n", escape_xml(latest)));
  }
  if let Some(release) = &release {
    xml.push_str(&format!("    <release>{}</release>\n", escape_xml(release)));
  }
  xml.push_str("    <versions>\n");
  for version in &versions {
    xml.push_str(&format!("      <version>{}</version>\n", escape_xml(version)));
  }
  xml.push_str("    </versions>\n");
  xml.push_str(&format!(
    "    <lastUpdated>{}</lastUpdated>\n",
    Utc::now().format("%Y%m%d%H%M%S")
  ));
  xml.push_str("  </versioning>\n</metadata>\n");
  Ok(xml)
}

fn newest(a: Option<String>, b: Option<String>) -> Option<String> {
  match (a, b) {
    (Some(a), Some(b)) if version::compare(&a, &b) == Ordering::Greater => Some(a),
    (a, b) => b.or(a),
  }
}

fn escape_xml(text: &str) -> String {
  text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Group-level metadata: union of plugin prefixes by artifactId
pub fn merge_plugins(existing: Option<&str>, incoming: &str) -> PrereleaseResult<String> {
  let mut plugins: BTreeMap<String, (String, String)> = BTreeMap::new();
  for xml in existing.into_iter().chain(std::iter::once(incoming)) {
    let doc = Document::parse(xml)?;
    for plugin in doc.descendants().filter(|n| n.is_element() && n.tag_name().name() == "plugin") {
      let field = |name: &str| {
        plugin
          .children()
          .find(|c| c.is_element() && c.tag_name().name() == name)
          .and_then(|c| c.text())
          .map(|t| t.trim().to_string())
          .unwrap_or_default()
      };
      plugins.insert(field("artifactId"), (field("name"), field("prefix")));
    }
  }

  let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<metadata>\n  <plugins>\n");
  for (artifact_id, (name, prefix)) in &plugins {
    xml.push_str(&format!(
      "    <plugin>\n      <name>{}</name>\n      <prefix>{}</prefix>\n      <artifactId>{}</artifactId>\n    </plugin>\n",
      escape_xml(name),
      escape_xml(prefix),
      escape_xml(artifact_id)
    ));
  }
  xml.push_str("  </plugins>\n</metadata>\n");
  Ok(xml)
}
