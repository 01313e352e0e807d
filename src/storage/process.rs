//! Process table access for stale lock detection
//!
//! Two backends behind one trait: `sysinfo` (default) and `ps`. The `ps`
//! backend asks for the full `lstart` timestamp and falls back to the short
//! `start` column where `ps` has no `lstart` (BusyBox, some BSDs). The short
//! format depends on the process age and the platform:
//!
//! - time of day: `14:05:09`, `14:05`, `2:05PM`
//! - month/day: `Oct 18`, `Oct18`, `18Oct26`
//! - full timestamp: `Sun Oct 18 14:05:09 2026`

use crate::core::error::{PrereleaseError, PrereleaseResult, ResultExt};
use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use std::path::PathBuf;
use std::process::Command;
use sysinfo::{ProcessesToUpdate, System};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
  pub pid: u32,
  pub started: DateTime<Utc>,
}

pub trait ProcessTable {
  fn list(&self) -> PrereleaseResult<Vec<ProcessInfo>>;
}

/// Reads the process table through `sysinfo`
#[derive(Debug, Default)]
pub struct SysinfoProcessTable;

impl ProcessTable for SysinfoProcessTable {
  fn list(&self) -> PrereleaseResult<Vec<ProcessInfo>> {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);
    Ok(
      system
        .processes()
        .iter()
        .filter_map(|(pid, process)| {
          let started = DateTime::from_timestamp(i64::try_from(process.start_time()).ok()?, 0)?;
          Some(ProcessInfo {
            pid: pid.as_u32(),
            started,
          })
        })
        .collect(),
    )
  }
}

/// Which start column to ask `ps` for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PsFormat {
  /// `lstart`: full timestamp, second precision
  Full,
  /// `start`: short, age-dependent format
  Short,
}

impl PsFormat {
  fn column(self) -> &'static str {
    match self {
      PsFormat::Full => "pid=,lstart=",
      PsFormat::Short => "pid=,start=",
    }
  }
}

/// Runs `ps -eo pid=,lstart=`, or `ps -eo pid=,start=` when that fails
#[derive(Debug)]
pub struct PsProcessTable {
  ps: PathBuf,
}

impl PsProcessTable {
  pub fn new(ps: impl Into<PathBuf>) -> Self {
    Self { ps: ps.into() }
  }

  fn list_with(&self, format: PsFormat) -> PrereleaseResult<Vec<ProcessInfo>> {
    let output = Command::new(&self.ps)
      .env("LC_ALL", "C")
      .args(["-eo", format.column()])
      .output()
      .with_context(|| format!("Failed to execute {}", self.ps.display()))?;
    if !output.status.success() {
      return Err(PrereleaseError::message(format!(
        "ps failed: {}",
        String::from_utf8_lossy(&output.stderr).trim()
      )));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_ps_output(&stdout, Local::now())
  }
}

impl ProcessTable for PsProcessTable {
  fn list(&self) -> PrereleaseResult<Vec<ProcessInfo>> {
    self.list_with(PsFormat::Full).or_else(|e| {
      tracing::debug!(error = %e, "ps without lstart, using the start column");
      self.list_with(PsFormat::Short)
    })
  }
}

/// Parse `pid start` lines. Lines whose start column cannot be parsed are an error:
/// guessing would risk deleting a live lock.
pub fn parse_ps_output(output: &str, now: DateTime<Local>) -> PrereleaseResult<Vec<ProcessInfo>> {
  let mut result = Vec::new();
  for line in output.lines() {
    let line = line.trim();
    if line.is_empty() {
      continue;
    }
    let (pid, start) = line
      .split_once(char::is_whitespace)
      .ok_or_else(|| PrereleaseError::message(format!("Unexpected ps line: {}", line)))?;
    let pid: u32 = pid.parse().with_context(|| format!("Unexpected ps pid: {}", line))?;
    let started = parse_start(start.trim(), now)
      .ok_or_else(|| PrereleaseError::message(format!("Unknown ps start format: {}", line)))?;
    result.push(ProcessInfo { pid, started });
  }
  Ok(result)
}

/// Start column in any of the known families, interpreted in local time.
///
/// Day-precision formats resolve to the start of that day, which is the
/// earliest moment the process could have started.
pub fn parse_start(text: &str, now: DateTime<Local>) -> Option<DateTime<Utc>> {
  let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
  let naive = parse_full(&normalized)
    .or_else(|| parse_time_of_day(&normalized, now))
    .or_else(|| parse_month_day(&normalized, now))?;
  let local = Local.from_local_datetime(&naive).earliest()?;
  Some(local.with_timezone(&Utc))
}

fn parse_full(text: &str) -> Option<NaiveDateTime> {
  NaiveDateTime::parse_from_str(text, "%a %b %d %H:%M:%S %Y").ok()
}

fn parse_time_of_day(text: &str, now: DateTime<Local>) -> Option<NaiveDateTime> {
  let time = ["%H:%M:%S", "%H:%M", "%I:%M%p"]
    .iter()
    .find_map(|fmt| NaiveTime::parse_from_str(text, fmt).ok())?;
  let today = now.date_naive().and_time(time);
  // ps shows a time of day for processes younger than 24h
  if today > now.naive_local() {
    Some(today - chrono::Duration::days(1))
  } else {
    Some(today)
  }
}

fn parse_month_day(text: &str, now: DateTime<Local>) -> Option<NaiveDateTime> {
  if let Ok(date) = NaiveDate::parse_from_str(text, "%d%b%y") {
    return date.and_hms_opt(0, 0, 0);
  }
  // "Oct 5", "Oct05", "Oct 18"
  let compact = text.replace(' ', "");
  let split = compact.find(|c: char| c.is_ascii_digit())?;
  let (month, day) = compact.split_at(split);
  let date = NaiveDate::parse_from_str(&format!("{} {} {}", month, day, now.year()), "%b %d %Y").ok()?;
  let date = if date > now.date_naive() {
    date.with_year(now.year() - 1)?
  } else {
    date
  };
  date.and_hms_opt(0, 0, 0)
}
