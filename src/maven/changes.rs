//! `src/changes/changes.xml` release stamping
//!
//! Only `<release>` start tags are touched, by text substitution, so the
//! rest of the changelog stays byte-identical.

use crate::core::error::PrereleaseResult;
use crate::descriptor::version::{SNAPSHOT_SUFFIX, release_version};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

pub const CHANGES_XML: &str = "src/changes/changes.xml";

static RELEASE_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<release\b[^>]*>").expect("valid regex"));
static VERSION_ATTR: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r#"\bversion\s*=\s*"([^"]*)""#).expect("valid regex"));
static DATE_ATTR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"\bdate\s*=\s*"[^"]*""#).expect("valid regex"));

pub fn changes_file(dir: &Path) -> PathBuf {
  dir.join(CHANGES_XML)
}

/// Set version and date of the `<release>` entry for `release`.
///
/// Matches an entry for `release` or `release-SNAPSHOT`. Returns None when
/// there is no such entry.
pub fn stamp_release(xml: &str, release: &str, date: &str) -> Option<String> {
  let tag = RELEASE_TAG.find_iter(xml).find(|m| {
    VERSION_ATTR
      .captures(m.as_str())
      .is_some_and(|c| release_version(&c[1]) == release)
  })?;
  let stamped = VERSION_ATTR.replace(tag.as_str(), format!(r#"version="{}""#, release).as_str());
  let stamped = if DATE_ATTR.is_match(&stamped) {
    DATE_ATTR.replace(&stamped, format!(r#"date="{}""#, date).as_str()).into_owned()
  } else {
    let insert_at = stamped.len() - if stamped.ends_with("/>") { 2 } else { 1 };
    format!(r#"{} date="{}"{}"#, &stamped[..insert_at].trim_end(), date, &stamped[insert_at..])
  };
  Some(format!("{}{}{}", &xml[..tag.start()], stamped, &xml[tag.end()..]))
}

/// Open an unreleased entry for `next` (a snapshot version) in front of the first release
pub fn open_release(xml: &str, next: &str) -> Option<String> {
  let first = RELEASE_TAG.find(xml)?;
  let version = next.strip_suffix(SNAPSHOT_SUFFIX).unwrap_or(next);
  let indent: String = xml[..first.start()]
    .rsplit('\n')
    .next()
    .unwrap_or_default()
    .chars()
    .take_while(|c| c.is_whitespace())
    .collect();
  Some(format!(
    "{}<release version=\"{}\" date=\"unreleased\">\n{}</release>\n{}{}",
    &xml[..first.start()],
    version,
    indent,
    indent,
    &xml[first.start()..]
  ))
}

/// Stamp the file below `dir`, if there is one. Returns whether it changed.
pub fn stamp_file(dir: &Path, release: &str, date: &str, next: Option<&str>) -> PrereleaseResult<bool> {
  let file = changes_file(dir);
  if !file.is_file() {
    return Ok(false);
  }
  let xml = fs::read_to_string(&file)?;
  let Some(mut stamped) = stamp_release(&xml, release, date) else {
    tracing::warn!(file = %file.display(), release, "no release entry in changes.xml");
    return Ok(false);
  };
  if let Some(next) = next
    && let Some(opened) = open_release(&stamped, next)
  {
    stamped = opened;
  }
  fs::write(&file, stamped)?;
  Ok(true)
}
