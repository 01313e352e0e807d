//! Version arithmetic and tag location

use crate::core::error::DescriptorError;
use std::cmp::Ordering;

pub const SNAPSHOT_SUFFIX: &str = "-SNAPSHOT";

pub fn is_snapshot(version: &str) -> bool {
  version.ends_with(SNAPSHOT_SUFFIX)
}

/// `1.2.3-SNAPSHOT` -> `1.2.3`
pub fn release_version(version: &str) -> &str {
  version.strip_suffix(SNAPSHOT_SUFFIX).unwrap_or(version)
}

/// Increment the last dot-separated component and mark as snapshot: `1.2.3` -> `1.2.4-SNAPSHOT`
pub fn next_development_version(release: &str) -> Result<String, DescriptorError> {
  let bump_error = || DescriptorError::CannotBumpVersion {
    version: release.to_string(),
  };
  let (head, last) = match release.rfind('.') {
    Some(idx) => (&release[..=idx], &release[idx + 1..]),
    None => ("", release),
  };
  if last.is_empty() || !last.chars().all(|c| c.is_ascii_digit()) {
    return Err(bump_error());
  }
  let next = last
    .parse::<u64>()
    .ok()
    .and_then(|n| n.checked_add(1))
    .ok_or_else(bump_error)?;
  Ok(format!("{}{}{}", head, next, SNAPSHOT_SUFFIX))
}

/// Tag url for a release built from `origin`.
///
/// The `/trunk/...` or `/branches/<name>/...` tail of the origin is replaced by
/// `/tags/<artifactId>-<version>`. A sub-path below trunk or the branch is dropped.
pub fn tag_url(origin: &str, artifact_id: &str, version: &str) -> Result<String, DescriptorError> {
  let origin = origin.trim_end_matches('/');
  let padded = format!("{}/", origin);
  let base = if let Some(idx) = padded.find("/trunk/") {
    &padded[..idx]
  } else if let Some(idx) = padded.find("/branches/")
    && padded[idx + "/branches/".len()..].contains('/')
    && !padded[idx + "/branches/".len()..].starts_with('/')
  {
    &padded[..idx]
  } else {
    return Err(DescriptorError::CannotDetermineTagBase {
      url: origin.to_string(),
    });
  };
  Ok(format!("{}/tags/{}-{}", base, artifact_id, version))
}

/// Last path segment of a tag url
pub fn tag_name(tag_url: &str) -> &str {
  tag_url.rsplit('/').next().unwrap_or(tag_url)
}

/// Parent directory of a tag url
pub fn tag_base(tag_url: &str) -> &str {
  tag_url.rsplit_once('/').map_or(tag_url, |(base, _)| base)
}

#[derive(Debug, PartialEq, Eq)]
enum Token {
  /// Digits without leading zeros, compared by length then text
  Number(String),
  Qualifier(String),
}

fn tokens(version: &str) -> Vec<Token> {
  version
    .split(['.', '-'])
    .filter(|t| !t.is_empty())
    .map(|t| {
      if t.chars().all(|c| c.is_ascii_digit()) {
        let digits = t.trim_start_matches('0');
        Token::Number(if digits.is_empty() { "0" } else { digits }.to_string())
      } else {
        Token::Qualifier(t.to_ascii_lowercase())
      }
    })
    .collect()
}

/// Repository ordering of two versions.
///
/// Numeric components compare as numbers and missing ones count as zero, so
/// `1.10 > 1.9` and `1.0 == 1.0.0`. A qualifier sorts before the plain
/// release (`1.0-beta-1 < 1.0`) and before any number.
pub fn compare(a: &str, b: &str) -> Ordering {
  let (a, b) = (tokens(a), tokens(b));
  for i in 0..a.len().max(b.len()) {
    let ordering = match (a.get(i), b.get(i)) {
      (Some(Token::Number(x)), Some(Token::Number(y))) => x.len().cmp(&y.len()).then_with(|| x.cmp(y)),
      (Some(Token::Qualifier(x)), Some(Token::Qualifier(y))) => x.cmp(y),
      (Some(Token::Number(_)), Some(Token::Qualifier(_))) => Ordering::Greater,
      (Some(Token::Qualifier(_)), Some(Token::Number(_))) => Ordering::Less,
      (Some(Token::Number(x)), None) => x.as_str().cmp("0"),
      (None, Some(Token::Number(y))) => "0".cmp(y.as_str()),
      (Some(Token::Qualifier(_)), None) => Ordering::Less,
      (None, Some(Token::Qualifier(_))) => Ordering::Greater,
      (None, None) => Ordering::Equal,
    };
    if ordering != Ordering::Equal {
      return ordering;
    }
  }
  Ordering::Equal
}
