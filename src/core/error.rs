//! Error types for prerelease with contextual messages and exit codes
//!
//! One error type for the whole tool. Every variant maps to an exit code and
//! most carry a help message that points the user at the way out.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Exit codes for prerelease
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
  /// User error (config, invalid args, dirty working copy)
  User = 1,
  /// System error (svn, mvn, network, I/O, lock timeout)
  System = 2,
  /// Validation failure (versioning problems, existing tag)
  Validation = 3,
}

impl ExitCode {
  /// Convert to i32 for process exit
  pub fn as_i32(self) -> i32 {
    self as i32
  }
}

/// Main error type for prerelease
#[derive(Debug)]
pub enum PrereleaseError {
  /// Configuration errors
  Config(ConfigError),

  /// Subversion errors
  Scm(ScmError),

  /// Maven invocation errors
  Build(BuildError),

  /// Archive lock errors
  Lock(LockError),

  /// Descriptor construction and persistence errors
  Descriptor(DescriptorError),

  /// Snapshot/release policy violations, all of them at once
  Versioning(VersioningProblem),

  /// Promotion failed after compensating actions ran
  Promote {
    cause: Box<PrereleaseError>,
    /// Tag reverted and target retired; false if manual cleanup is needed
    compensated: bool,
    suppressed: Vec<PrereleaseError>,
  },

  /// Structured error with a label saying which step failed
  Context {
    message: String,
    source: Box<PrereleaseError>,
  },

  /// I/O errors
  Io(io::Error),

  /// Generic error with message and optional context
  Message {
    message: String,
    context: Option<String>,
    help: Option<String>,
  },
}

impl PrereleaseError {
  /// Create a simple error message
  pub fn message(msg: impl Into<String>) -> Self {
    PrereleaseError::Message {
      message: msg.into(),
      context: None,
      help: None,
    }
  }

  /// Create an error with help text
  pub fn with_help(msg: impl Into<String>, help: impl Into<String>) -> Self {
    PrereleaseError::Message {
      message: msg.into(),
      context: None,
      help: Some(help.into()),
    }
  }

  /// Add context to an existing error
  ///
  /// Plain I/O errors are folded into a message. Structured errors are
  /// wrapped and keep their exit code and help.
  pub fn context(self, ctx: impl Into<String>) -> Self {
    let ctx_str = ctx.into();
    match self {
      PrereleaseError::Message { message, context, help } => PrereleaseError::Message {
        message,
        context: Some(context.map(|c| format!("{}\n{}", ctx_str, c)).unwrap_or(ctx_str)),
        help,
      },
      PrereleaseError::Io(e) => PrereleaseError::Message {
        message: format!("I/O error: {}", e),
        context: Some(ctx_str),
        help: None,
      },
      source => PrereleaseError::Context {
        message: ctx_str,
        source: Box::new(source),
      },
    }
  }

  /// Get the appropriate exit code for this error
  pub fn exit_code(&self) -> ExitCode {
    match self {
      PrereleaseError::Config(_) => ExitCode::User,
      PrereleaseError::Scm(ScmError::UncommittedChanges { .. } | ScmError::PendingUpdates { .. }) => ExitCode::User,
      PrereleaseError::Scm(_) => ExitCode::System,
      PrereleaseError::Build(_) => ExitCode::System,
      PrereleaseError::Lock(_) => ExitCode::System,
      PrereleaseError::Descriptor(DescriptorError::TagAlreadyExists { .. }) => ExitCode::Validation,
      PrereleaseError::Descriptor(_) => ExitCode::User,
      PrereleaseError::Versioning(_) => ExitCode::Validation,
      PrereleaseError::Promote { cause, .. } => cause.exit_code(),
      PrereleaseError::Context { source, .. } => source.exit_code(),
      PrereleaseError::Io(_) => ExitCode::System,
      PrereleaseError::Message { .. } => ExitCode::User,
    }
  }

  /// Get contextual help message for this error
  pub fn help_message(&self) -> Option<String> {
    match self {
      PrereleaseError::Config(e) => e.help_message(),
      PrereleaseError::Scm(e) => e.help_message(),
      PrereleaseError::Lock(e) => e.help_message(),
      PrereleaseError::Descriptor(e) => e.help_message(),
      PrereleaseError::Versioning(_) => {
        Some("Release all parents, dependencies and plugins first, then retry.".to_string())
      }
      PrereleaseError::Promote {
        compensated: false,
        cause,
        ..
      } => Some(match cause.help_message() {
        Some(help) => format!("{} {}", help, UNCOMPENSATED_HELP),
        None => UNCOMPENSATED_HELP.to_string(),
      }),
      PrereleaseError::Promote { cause, .. } => cause.help_message(),
      PrereleaseError::Context { source, .. } => source.help_message(),
      PrereleaseError::Message { help, .. } => help.clone(),
      _ => None,
    }
  }
}

const UNCOMPENSATED_HELP: &str =
  "The failed promotion was not fully undone. See the suppressed errors and delete the tag with `svn delete` if it still exists.";

impl fmt::Display for PrereleaseError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PrereleaseError::Config(e) => write!(f, "{}", e),
      PrereleaseError::Scm(e) => write!(f, "{}", e),
      PrereleaseError::Build(e) => write!(f, "{}", e),
      PrereleaseError::Lock(e) => write!(f, "{}", e),
      PrereleaseError::Descriptor(e) => write!(f, "{}", e),
      PrereleaseError::Versioning(e) => write!(f, "{}", e),
      PrereleaseError::Promote { cause, suppressed, .. } => {
        write!(f, "{}", cause)?;
        for s in suppressed {
          write!(f, "\n  suppressed: {}", s)?;
        }
        Ok(())
      }
      PrereleaseError::Context { message, source } => write!(f, "{}: {}", message, source),
      PrereleaseError::Io(e) => write!(f, "I/O error: {}", e),
      PrereleaseError::Message { message, context, .. } => {
        write!(f, "{}", message)?;
        if let Some(ctx) = context {
          write!(f, "\n{}", ctx)?;
        }
        Ok(())
      }
    }
  }
}

impl std::error::Error for PrereleaseError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      PrereleaseError::Io(e) => Some(e),
      PrereleaseError::Promote { cause, .. } => Some(cause.as_ref()),
      PrereleaseError::Context { source, .. } => Some(source.as_ref()),
      _ => None,
    }
  }
}

impl From<io::Error> for PrereleaseError {
  fn from(err: io::Error) -> Self {
    PrereleaseError::Io(err)
  }
}

impl From<String> for PrereleaseError {
  fn from(msg: String) -> Self {
    PrereleaseError::message(msg)
  }
}

impl From<&str> for PrereleaseError {
  fn from(msg: &str) -> Self {
    PrereleaseError::message(msg)
  }
}

impl From<ConfigError> for PrereleaseError {
  fn from(err: ConfigError) -> Self {
    PrereleaseError::Config(err)
  }
}

impl From<ScmError> for PrereleaseError {
  fn from(err: ScmError) -> Self {
    PrereleaseError::Scm(err)
  }
}

impl From<BuildError> for PrereleaseError {
  fn from(err: BuildError) -> Self {
    PrereleaseError::Build(err)
  }
}

impl From<LockError> for PrereleaseError {
  fn from(err: LockError) -> Self {
    PrereleaseError::Lock(err)
  }
}

impl From<DescriptorError> for PrereleaseError {
  fn from(err: DescriptorError) -> Self {
    PrereleaseError::Descriptor(err)
  }
}

impl From<VersioningProblem> for PrereleaseError {
  fn from(err: VersioningProblem) -> Self {
    PrereleaseError::Versioning(err)
  }
}

impl From<toml_edit::de::Error> for PrereleaseError {
  fn from(err: toml_edit::de::Error) -> Self {
    PrereleaseError::message(format!("TOML deserialization error: {}", err))
  }
}

impl From<serde_json::Error> for PrereleaseError {
  fn from(err: serde_json::Error) -> Self {
    PrereleaseError::message(format!("JSON error: {}", err))
  }
}

impl From<roxmltree::Error> for PrereleaseError {
  fn from(err: roxmltree::Error) -> Self {
    PrereleaseError::message(format!("XML parse error: {}", err))
  }
}

impl From<std::num::ParseIntError> for PrereleaseError {
  fn from(err: std::num::ParseIntError) -> Self {
    PrereleaseError::message(format!("Parse error: {}", err))
  }
}

impl From<std::string::FromUtf8Error> for PrereleaseError {
  fn from(err: std::string::FromUtf8Error) -> Self {
    PrereleaseError::message(format!("UTF-8 conversion error: {}", err))
  }
}

/// Configuration-related errors
#[derive(Debug)]
pub enum ConfigError {
  /// No prerelease.toml anywhere in the search path
  NotFound { searched: Vec<PathBuf> },

  /// Missing required field
  MissingField { field: String },

  /// Field present but unusable
  Invalid { field: String, reason: String },
}

impl ConfigError {
  fn help_message(&self) -> Option<String> {
    match self {
      ConfigError::NotFound { .. } | ConfigError::MissingField { .. } => Some(
        "Create a prerelease.toml with at least `storages = [\"/path/to/storage\"]`, or pass --storage.".to_string(),
      ),
      ConfigError::Invalid { .. } => None,
    }
  }
}

impl fmt::Display for ConfigError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ConfigError::NotFound { searched } => {
        write!(f, "No prerelease configuration found. Searched:")?;
        for p in searched {
          write!(f, "\n  {}", p.display())?;
        }
        Ok(())
      }
      ConfigError::MissingField { field } => {
        write!(f, "Missing required field in config: {}", field)
      }
      ConfigError::Invalid { field, reason } => {
        write!(f, "Invalid config field '{}': {}", field, reason)
      }
    }
  }
}

/// Subversion errors
#[derive(Debug)]
pub enum ScmError {
  /// svn command failed
  CommandFailed { command: String, stderr: String },

  /// Directory is not a working copy
  NotAWorkingCopy { path: PathBuf },

  /// Working copy has local modifications
  UncommittedChanges { path: PathBuf, status: String },

  /// Repository has newer revisions than the working copy
  PendingUpdates { path: PathBuf, status: String },
}

impl ScmError {
  fn help_message(&self) -> Option<String> {
    match self {
      ScmError::UncommittedChanges { .. } => Some("Commit or revert your changes first.".to_string()),
      ScmError::PendingUpdates { .. } => {
        Some("Run `svn update` (or `prerelease update`) to build the latest revision.".to_string())
      }
      ScmError::CommandFailed { stderr, .. } if stderr.contains("E200035") || stderr.contains("locked") => Some(
        "A path is locked in the repository. If a previous promote crashed, release it with `svn unlock --force <url>`."
          .to_string(),
      ),
      ScmError::NotAWorkingCopy { path } => Some(format!(
        "Run the command inside a Subversion working copy, or use the bare-* variants (path: {})",
        path.display()
      )),
      _ => None,
    }
  }
}

impl fmt::Display for ScmError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ScmError::CommandFailed { command, stderr } => {
        write!(f, "svn command failed: {}\n{}", command, stderr)
      }
      ScmError::NotAWorkingCopy { path } => {
        write!(f, "Not a Subversion working copy: {}", path.display())
      }
      ScmError::UncommittedChanges { path, status } => {
        write!(f, "Uncommitted changes in {}:\n{}", path.display(), status)
      }
      ScmError::PendingUpdates { path, status } => {
        write!(f, "Pending updates for {}:\n{}", path.display(), status)
      }
    }
  }
}

/// Maven invocation errors
#[derive(Debug)]
pub enum BuildError {
  /// mvn exited non-zero
  Failed {
    command: String,
    dir: PathBuf,
    output: String,
  },

  /// mvn could not be started at all
  Spawn { command: String, reason: String },
}

/// Lines of build output kept in error messages
const OUTPUT_TAIL: usize = 40;

impl fmt::Display for BuildError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BuildError::Failed { command, dir, output } => {
        write!(f, "Build failed: {} (in {})", command, dir.display())?;
        let lines: Vec<&str> = output.lines().collect();
        let start = lines.len().saturating_sub(OUTPUT_TAIL);
        for line in &lines[start..] {
          write!(f, "\n  {}", line)?;
        }
        Ok(())
      }
      BuildError::Spawn { command, reason } => {
        write!(f, "Failed to run {}: {}", command, reason)
      }
    }
  }
}

/// Archive lock errors
#[derive(Debug)]
pub enum LockError {
  /// Gave up waiting
  Timeout { path: PathBuf, seconds: u64 },

  /// Non-blocking attempt found the lock taken
  Busy { path: PathBuf },

  /// Release of a lock this process does not hold
  NotHeld { path: PathBuf },
}

impl LockError {
  fn help_message(&self) -> Option<String> {
    match self {
      LockError::Timeout { path, .. } => Some(format!(
        "Another prerelease process holds {}. Rerun later, or run `prerelease locksmith` if its holder crashed.",
        path.display()
      )),
      _ => None,
    }
  }
}

impl fmt::Display for LockError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      LockError::Timeout { path, seconds } => {
        write!(f, "Cannot lock {} after {} seconds", path.display(), seconds)
      }
      LockError::Busy { path } => write!(f, "Lock is taken: {}", path.display()),
      LockError::NotHeld { path } => write!(f, "Lock not held by this process: {}", path.display()),
    }
  }
}

/// Descriptor construction and persistence errors
#[derive(Debug)]
pub enum DescriptorError {
  /// Project declares no <scm> connection
  MissingScm,

  /// Project declares no distributionManagement repository
  MissingRepository,

  /// Neither /trunk/ nor /branches/<name>/ in the origin url
  CannotDetermineTagBase { url: String },

  /// Last version component is not numeric
  CannotBumpVersion { version: String },

  /// Tag already present in the repository
  TagAlreadyExists { url: String },

  /// Required key absent from prerelease.properties
  MissingProperty { file: PathBuf, key: String },

  /// Key present but value unusable
  InvalidProperty { key: String, value: String, reason: String },
}

impl DescriptorError {
  fn help_message(&self) -> Option<String> {
    match self {
      DescriptorError::MissingScm => Some("Add an <scm><developerConnection> element to your pom.xml.".to_string()),
      DescriptorError::MissingRepository => Some(
        "Add a <distributionManagement><repository> element (or inherit one from your parent pom).".to_string(),
      ),
      DescriptorError::CannotDetermineTagBase { .. } => {
        Some("Prereleases can only be built from trunk or from a branch.".to_string())
      }
      DescriptorError::TagAlreadyExists { .. } => {
        Some("This version was already released. Bump the version in your pom.xml.".to_string())
      }
      _ => None,
    }
  }
}

impl fmt::Display for DescriptorError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      DescriptorError::MissingScm => write!(f, "Project has no scm connection"),
      DescriptorError::MissingRepository => write!(f, "Project has no deployment repository"),
      DescriptorError::CannotDetermineTagBase { url } => {
        write!(f, "Cannot determine tag base for {}", url)
      }
      DescriptorError::CannotBumpVersion { version } => {
        write!(f, "Cannot compute next development version for {}", version)
      }
      DescriptorError::TagAlreadyExists { url } => write!(f, "Tag already exists: {}", url),
      DescriptorError::MissingProperty { file, key } => {
        write!(f, "Missing property '{}' in {}", key, file.display())
      }
      DescriptorError::InvalidProperty { key, value, reason } => {
        write!(f, "Invalid property {}={}: {}", key, value, reason)
      }
    }
  }
}

/// Aggregated snapshot/release policy violations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersioningProblem {
  pub violations: Vec<String>,
}

impl fmt::Display for VersioningProblem {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Versioning problems ({}):", self.violations.len())?;
    for v in &self.violations {
      write!(f, "\n  - {}", v)?;
    }
    Ok(())
  }
}

/// Result type alias for prerelease
pub type PrereleaseResult<T> = Result<T, PrereleaseError>;

/// Helper trait to add context to Results
pub trait ResultExt<T> {
  /// Add context to an error result
  fn context(self, ctx: impl Into<String>) -> PrereleaseResult<T>;

  /// Add context using a closure (lazy evaluation)
  fn with_context<F>(self, f: F) -> PrereleaseResult<T>
  where
    F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
  E: Into<PrereleaseError>,
{
  fn context(self, ctx: impl Into<String>) -> PrereleaseResult<T> {
    self.map_err(|e| e.into().context(ctx))
  }

  fn with_context<F>(self, f: F) -> PrereleaseResult<T>
  where
    F: FnOnce() -> String,
  {
    self.map_err(|e| e.into().context(f()))
  }
}

/// Pretty-print an error to stderr with help text
pub fn print_error(error: &PrereleaseError) {
  eprintln!("\n❌ {}\n", error);

  if let Some(help) = error.help_message() {
    eprintln!("💡 Help: {}\n", help);
  }
}
