//! Effective pom reading and the two edits applied to a staged pom
//!
//! Reading ignores namespaces. `mvn help:effective-pom` wraps multi-module
//! output in `<projects>`; the first `<project>` is the one being released.
//! Edits splice new text into the original document, so formatting and
//! comments survive.

use crate::core::error::{PrereleaseError, PrereleaseResult};
use roxmltree::{Document, Node};
use serde::Serialize;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

const SCM_SVN_PREFIX: &str = "scm:svn:";
const DEFAULT_PLUGIN_GROUP: &str = "org.apache.maven.plugins";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Coordinates {
  pub group_id: String,
  pub artifact_id: String,
  pub version: String,
}

impl fmt::Display for Coordinates {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.version)
  }
}

/// `distributionManagement/repository`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentRepository {
  pub id: String,
  pub layout: String,
  pub url: String,
}

/// `id::layout::url`, the altDeploymentRepository syntax
impl fmt::Display for DeploymentRepository {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}::{}::{}", self.id, self.layout, self.url)
  }
}

impl FromStr for DeploymentRepository {
  type Err = PrereleaseError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let mut parts = s.splitn(3, "::");
    match (parts.next(), parts.next(), parts.next()) {
      (Some(id), Some(layout), Some(url)) if !id.is_empty() && !url.is_empty() => Ok(Self {
        id: id.to_string(),
        layout: layout.to_string(),
        url: url.to_string(),
      }),
      _ => Err(PrereleaseError::message(format!(
        "Malformed repository '{}', expected id::layout::url",
        s
      ))),
    }
  }
}

/// The parts of a pom the release process looks at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectModel {
  pub group_id: String,
  pub artifact_id: String,
  pub version: String,
  pub packaging: String,
  pub name: Option<String>,
  pub url: Option<String>,
  /// Subversion url from `scm/developerConnection` (or `connection`), without `scm:svn:`
  pub scm: Option<String>,
  pub repository: Option<DeploymentRepository>,
  pub parent: Option<Coordinates>,
  pub dependencies: Vec<Coordinates>,
  pub plugins: Vec<Coordinates>,
}

impl ProjectModel {
  pub fn parse(xml: &str) -> PrereleaseResult<Self> {
    let doc = Document::parse(xml)?;
    let project = doc
      .descendants()
      .find(|n| n.is_element() && n.tag_name().name() == "project")
      .ok_or_else(|| PrereleaseError::message("No <project> element in pom"))?;

    let parent = child(project, "parent").map(coordinates);
    let group_id = child_text(project, "groupId")
      .or_else(|| parent.as_ref().map(|p| p.group_id.clone()))
      .ok_or_else(|| PrereleaseError::message("pom has no groupId"))?;
    let artifact_id = child_text(project, "artifactId").ok_or_else(|| PrereleaseError::message("pom has no artifactId"))?;
    let version = child_text(project, "version")
      .or_else(|| parent.as_ref().map(|p| p.version.clone()))
      .ok_or_else(|| PrereleaseError::message("pom has no version"))?;

    let scm = child(project, "scm")
      .and_then(|scm| child_text(scm, "developerConnection").or_else(|| child_text(scm, "connection")))
      .map(|connection| {
        connection
          .strip_prefix(SCM_SVN_PREFIX)
          .unwrap_or(&connection)
          .trim_end_matches('/')
          .to_string()
      });

    let repository = path(project, &["distributionManagement", "repository"]).and_then(|repo| {
      Some(DeploymentRepository {
        id: child_text(repo, "id")?,
        layout: child_text(repo, "layout").unwrap_or_else(|| "default".to_string()),
        url: child_text(repo, "url")?,
      })
    });

    let dependencies = path(project, &["dependencies"])
      .map(|deps| children(deps, "dependency").map(coordinates).collect())
      .unwrap_or_default();

    let plugins = path(project, &["build", "plugins"])
      .map(|plugins| {
        children(plugins, "plugin")
          .map(|p| {
            let mut c = coordinates(p);
            if c.group_id.is_empty() {
              c.group_id = DEFAULT_PLUGIN_GROUP.to_string();
            }
            c
          })
          .collect()
      })
      .unwrap_or_default();

    Ok(Self {
      group_id,
      artifact_id,
      version,
      packaging: child_text(project, "packaging").unwrap_or_else(|| "jar".to_string()),
      name: child_text(project, "name"),
      url: child_text(project, "url"),
      scm,
      repository,
      parent,
      dependencies,
      plugins,
    })
  }
}

/// Replace the project's own `<version>`
pub fn set_version(xml: &str, version: &str) -> PrereleaseResult<String> {
  let doc = Document::parse(xml)?;
  let project = root_project(&doc)?;
  let node = child(project, "version").ok_or_else(|| {
    PrereleaseError::with_help(
      "pom.xml has no <version> of its own",
      "Declare the project version explicitly instead of inheriting it.",
    )
  })?;
  splice(xml, vec![(text_range(xml, node)?, escape(version))])
}

/// Point `<scm>` connection, developerConnection and url at `url`. Missing elements are left out.
pub fn set_scm(xml: &str, url: &str) -> PrereleaseResult<String> {
  let doc = Document::parse(xml)?;
  let project = root_project(&doc)?;
  let Some(scm) = child(project, "scm") else {
    return Ok(xml.to_string());
  };
  let mut edits = Vec::new();
  for (name, value) in [
    ("connection", format!("{}{}", SCM_SVN_PREFIX, url)),
    ("developerConnection", format!("{}{}", SCM_SVN_PREFIX, url)),
    ("url", url.to_string()),
  ] {
    if let Some(node) = child(scm, name) {
      edits.push((text_range(xml, node)?, escape(&value)));
    }
  }
  splice(xml, edits)
}

fn root_project<'a, 'input>(doc: &'a Document<'input>) -> PrereleaseResult<Node<'a, 'input>> {
  let root = doc.root_element();
  if root.tag_name().name() == "project" {
    Ok(root)
  } else {
    Err(PrereleaseError::message("pom.xml root element is not <project>"))
  }
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
  node.children().find(|c| c.is_element() && c.tag_name().name() == name)
}

fn children<'a, 'input: 'a>(node: Node<'a, 'input>, name: &'a str) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
  node.children().filter(move |c| c.is_element() && c.tag_name().name() == name)
}

fn path<'a, 'input>(node: Node<'a, 'input>, names: &[&str]) -> Option<Node<'a, 'input>> {
  names.iter().try_fold(node, |n, name| child(n, name))
}

fn child_text(node: Node, name: &str) -> Option<String> {
  child(node, name)
    .and_then(|c| c.text())
    .map(str::trim)
    .filter(|t| !t.is_empty())
    .map(str::to_string)
}

fn coordinates(node: Node) -> Coordinates {
  Coordinates {
    group_id: child_text(node, "groupId").unwrap_or_default(),
    artifact_id: child_text(node, "artifactId").unwrap_or_default(),
    version: child_text(node, "version").unwrap_or_default(),
  }
}

/// Byte range of an element's content, `<a>` + here + `</a>`
fn text_range(xml: &str, element: Node) -> PrereleaseResult<Range<usize>> {
  if let Some(text) = element.first_child().filter(|c| c.is_text())
    && element.children().count() == 1
  {
    return Ok(text.range());
  }
  let unexpected = || {
    PrereleaseError::message(format!(
      "Cannot edit <{}>: expected text content",
      element.tag_name().name()
    ))
  };
  if element.has_children() {
    return Err(unexpected());
  }
  // empty element: insert after the start tag, unless it is self-closing
  let start = element.range().start;
  let gt = start + xml[start..].find('>').ok_or_else(unexpected)?;
  if xml[..gt].ends_with('/') {
    return Err(unexpected());
  }
  Ok(gt + 1..gt + 1)
}

fn splice(xml: &str, mut edits: Vec<(Range<usize>, String)>) -> PrereleaseResult<String> {
  edits.sort_by_key(|(range, _)| std::cmp::Reverse(range.start));
  let mut out = xml.to_string();
  for (range, replacement) in edits {
    if range.end > out.len() || !out.is_char_boundary(range.start) || !out.is_char_boundary(range.end) {
      return Err(PrereleaseError::message("Cannot edit pom.xml: unexpected element layout"));
    }
    out.replace_range(range, &replacement);
  }
  Ok(out)
}

fn escape(text: &str) -> String {
  text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
