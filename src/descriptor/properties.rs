//! Flat key/value files in java.util.Properties syntax
//!
//! Writing escapes `\`, `=`, `:`, `#`, `!`, leading spaces, line breaks and
//! non-ASCII characters (as `\uXXXX`). Reading understands comments, line
//! continuations, all three key separators and the same escapes.

use crate::core::error::{PrereleaseError, PrereleaseResult};
use std::fmt::Write as _;

/// Ordered property map. Keys are written in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
  entries: Vec<(String, String)>,
}

impl Properties {
  pub fn new() -> Self {
    Self::default()
  }

  /// Set a key, replacing an earlier value in place
  pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
    let key = key.into();
    let value = value.into();
    match self.entries.iter_mut().find(|(k, _)| *k == key) {
      Some(entry) => entry.1 = value,
      None => self.entries.push((key, value)),
    }
  }

  pub fn get(&self, key: &str) -> Option<&str> {
    self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
  }

  pub fn parse(text: &str) -> PrereleaseResult<Self> {
    let mut properties = Self::new();
    for line in logical_lines(text) {
      let (key, value) = split_entry(&line);
      properties.set(unescape(key)?, unescape(value)?);
    }
    Ok(properties)
  }

  pub fn write(&self, comment: Option<&str>) -> String {
    let mut out = String::new();
    if let Some(comment) = comment {
      for line in comment.lines() {
        let _ = writeln!(out, "# {}", line);
      }
    }
    for (key, value) in &self.entries {
      let _ = writeln!(out, "{}={}", escape(key, true), escape(value, false));
    }
    out
  }
}

/// Physical lines joined over `\` continuations; blank and comment lines dropped
fn logical_lines(text: &str) -> Vec<String> {
  let mut result = Vec::new();
  let mut current: Option<String> = None;
  for raw in text.lines() {
    let line = match current {
      // continuation lines lose their leading whitespace
      Some(_) => raw.trim_start(),
      None => {
        let trimmed = raw.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
          continue;
        }
        trimmed
      }
    };
    let continued = ends_with_odd_backslashes(line);
    let content = if continued { &line[..line.len() - 1] } else { line };
    let mut joined = current.take().unwrap_or_default();
    joined.push_str(content);
    if continued {
      current = Some(joined);
    } else {
      result.push(joined);
    }
  }
  if let Some(last) = current {
    result.push(last);
  }
  result
}

fn ends_with_odd_backslashes(line: &str) -> bool {
  line.chars().rev().take_while(|&c| c == '\\').count() % 2 == 1
}

/// Split at the first unescaped `=`, `:` or whitespace. Returns raw (still escaped) parts.
fn split_entry(line: &str) -> (&str, &str) {
  let mut escaped = false;
  for (idx, c) in line.char_indices() {
    if escaped {
      escaped = false;
      continue;
    }
    match c {
      '\\' => escaped = true,
      '=' | ':' => return (&line[..idx], line[idx + 1..].trim_start()),
      c if c.is_whitespace() => {
        let rest = line[idx..].trim_start();
        let rest = rest
          .strip_prefix('=')
          .or_else(|| rest.strip_prefix(':'))
          .map_or(rest, str::trim_start);
        return (&line[..idx], rest);
      }
      _ => {}
    }
  }
  (line, "")
}

fn unescape(text: &str) -> PrereleaseResult<String> {
  let mut out = String::with_capacity(text.len());
  let mut chars = text.chars();
  let mut pending_high: Option<u16> = None;
  while let Some(c) = chars.next() {
    if c != '\\' {
      out.push(c);
      continue;
    }
    let Some(next) = chars.next() else {
      break;
    };
    match next {
      't' => out.push('\t'),
      'n' => out.push('\n'),
      'r' => out.push('\r'),
      'f' => out.push('\u{c}'),
      'u' => {
        let hex: String = chars.by_ref().take(4).collect();
        let unit = u16::from_str_radix(&hex, 16)
          .map_err(|_| PrereleaseError::message(format!("Malformed \\u escape: \\u{}", hex)))?;
        if let Some(high) = pending_high.take() {
          let decoded = char::decode_utf16([high, unit])
            .next()
            .and_then(Result::ok)
            .ok_or_else(|| PrereleaseError::message(format!("Invalid surrogate pair in \\u escape: {}", text)))?;
          out.push(decoded);
        } else if (0xD800..0xDC00).contains(&unit) {
          pending_high = Some(unit);
        } else {
          out.push(
            char::from_u32(u32::from(unit))
              .ok_or_else(|| PrereleaseError::message(format!("Invalid \\u escape: \\u{}", hex)))?,
          );
        }
      }
      other => out.push(other),
    }
  }
  Ok(out)
}

fn escape(text: &str, is_key: bool) -> String {
  let mut out = String::with_capacity(text.len());
  for (idx, c) in text.chars().enumerate() {
    match c {
      '\\' => out.push_str("\\\\"),
      '\t' => out.push_str("\\t"),
      '\n' => out.push_str("\\n"),
      '\r' => out.push_str("\\r"),
      '\u{c}' => out.push_str("\\f"),
      '=' | ':' | '#' | '!' => {
        out.push('\\');
        out.push(c);
      }
      ' ' if idx == 0 || is_key => out.push_str("\\ "),
      c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
      c => {
        let mut units = [0u16; 2];
        for unit in c.encode_utf16(&mut units) {
          let _ = write!(out, "\\u{:04X}", unit);
        }
      }
    }
  }
  out
}
