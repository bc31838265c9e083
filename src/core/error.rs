//! Error types for release-rail with contextual messages and exit codes
//!
//! Every failure the orchestrator can hit is categorized here so the CLI can
//! pick an exit code and print a helpful suggestion. Lane failures are
//! collected into a [`LaneReport`] instead of aborting on the first one.

use crate::core::tool::ToolError;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Exit codes for release-rail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
  /// User error (config, invalid args, bad release metadata)
  User = 1,
  /// System error (git, network, I/O, missing tools)
  System = 2,
  /// Validation failure (lanes, tests, recompression, publish conflicts)
  Validation = 3,
}

impl ExitCode {
  /// Convert to i32 for process exit
  pub fn as_i32(self) -> i32 {
    self as i32
  }
}

/// Main error type for release-rail
#[derive(Debug)]
pub enum RailError {
  /// Configuration errors (always raised before any build work)
  Config(ConfigError),

  /// Git operation errors
  Git(GitError),

  /// Release metadata that cannot be turned into a version
  Version(VersionError),

  /// External tool invocation failed
  Tool(ToolError),

  /// The archive recompressor exited non-zero
  RecompressionFailed { archive: PathBuf, stderr: String },

  /// One or more downgrade lanes failed
  Lanes(LaneReport),

  /// Release publication failed
  Publish(PublishError),

  /// I/O errors
  Io(io::Error),

  /// Generic error with message and optional context
  Message {
    message: String,
    context: Option<String>,
    help: Option<String>,
  },
}

impl RailError {
  /// Create a simple error message
  pub fn message(msg: impl Into<String>) -> Self {
    RailError::Message {
      message: msg.into(),
      context: None,
      help: None,
    }
  }

  /// Create an error with help text
  pub fn with_help(msg: impl Into<String>, help: impl Into<String>) -> Self {
    RailError::Message {
      message: msg.into(),
      context: None,
      help: Some(help.into()),
    }
  }

  /// Add context to an existing error
  pub fn context(self, ctx: impl Into<String>) -> Self {
    let ctx_str = ctx.into();
    match self {
      RailError::Message { message, context, help } => RailError::Message {
        message,
        context: Some(context.map(|c| format!("{}\n{}", ctx_str, c)).unwrap_or(ctx_str)),
        help,
      },
      RailError::Io(e) => RailError::Message {
        message: format!("{}: {}", ctx_str, e),
        context: None,
        help: None,
      },
      _ => self,
    }
  }

  /// Get the appropriate exit code for this error
  pub fn exit_code(&self) -> ExitCode {
    match self {
      RailError::Config(_) => ExitCode::User,
      RailError::Git(_) => ExitCode::System,
      RailError::Version(_) => ExitCode::User,
      RailError::Tool(_) => ExitCode::System,
      RailError::RecompressionFailed { .. } => ExitCode::Validation,
      RailError::Lanes(_) => ExitCode::Validation,
      RailError::Publish(PublishError::Conflict { .. }) => ExitCode::Validation,
      RailError::Publish(PublishError::MissingToken { .. }) => ExitCode::User,
      RailError::Publish(_) => ExitCode::System,
      RailError::Io(_) => ExitCode::System,
      RailError::Message { .. } => ExitCode::User,
    }
  }

  /// Get contextual help message for this error
  pub fn help_message(&self) -> Option<String> {
    match self {
      RailError::Config(e) => e.help_message(),
      RailError::Git(e) => e.help_message(),
      RailError::Version(e) => e.help_message(),
      RailError::Tool(ToolError::NotFound { tool }) => Some(format!(
        "Install `{}` or point the [tools] section of rail.toml at it.",
        tool
      )),
      RailError::RecompressionFailed { .. } => {
        Some("The archive was left untouched. Re-run with -v to see the recompressor invocation.".to_string())
      }
      RailError::Lanes(_) => Some("Run `release-rail test-downgraded <target>` to reproduce a single lane.".to_string()),
      RailError::Publish(e) => e.help_message(),
      RailError::Message { help, .. } => help.clone(),
      _ => None,
    }
  }
}

impl fmt::Display for RailError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RailError::Config(e) => write!(f, "{}", e),
      RailError::Git(e) => write!(f, "{}", e),
      RailError::Version(e) => write!(f, "{}", e),
      RailError::Tool(e) => write!(f, "{}", e),
      RailError::RecompressionFailed { archive, stderr } => {
        write!(f, "Recompression of {} failed:\n{}", archive.display(), stderr.trim_end())
      }
      RailError::Lanes(report) => write!(f, "{}", report),
      RailError::Publish(e) => write!(f, "{}", e),
      RailError::Io(e) => write!(f, "I/O error: {}", e),
      RailError::Message { message, context, .. } => {
        write!(f, "{}", message)?;
        if let Some(ctx) = context {
          write!(f, "\n{}", ctx)?;
        }
        Ok(())
      }
    }
  }
}

impl std::error::Error for RailError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      RailError::Io(e) => Some(e),
      RailError::Tool(e) => Some(e),
      _ => None,
    }
  }
}

impl From<io::Error> for RailError {
  fn from(err: io::Error) -> Self {
    RailError::Io(err)
  }
}

impl From<String> for RailError {
  fn from(msg: String) -> Self {
    RailError::message(msg)
  }
}

impl From<&str> for RailError {
  fn from(msg: &str) -> Self {
    RailError::message(msg)
  }
}

impl From<ConfigError> for RailError {
  fn from(err: ConfigError) -> Self {
    RailError::Config(err)
  }
}

impl From<GitError> for RailError {
  fn from(err: GitError) -> Self {
    RailError::Git(err)
  }
}

impl From<VersionError> for RailError {
  fn from(err: VersionError) -> Self {
    RailError::Version(err)
  }
}

impl From<ToolError> for RailError {
  fn from(err: ToolError) -> Self {
    RailError::Tool(err)
  }
}

impl From<PublishError> for RailError {
  fn from(err: PublishError) -> Self {
    RailError::Publish(err)
  }
}

impl From<toml_edit::de::Error> for RailError {
  fn from(err: toml_edit::de::Error) -> Self {
    RailError::message(format!("TOML deserialization error: {}", err))
  }
}

impl From<serde_json::Error> for RailError {
  fn from(err: serde_json::Error) -> Self {
    RailError::message(format!("JSON error: {}", err))
  }
}

impl From<reqwest::Error> for RailError {
  fn from(err: reqwest::Error) -> Self {
    RailError::Publish(PublishError::Http {
      url: err.url().map(|u| u.to_string()).unwrap_or_default(),
      message: err.to_string(),
    })
  }
}

impl From<walkdir::Error> for RailError {
  fn from(err: walkdir::Error) -> Self {
    RailError::message(format!("Directory walk error: {}", err))
  }
}

/// Configuration-related errors
#[derive(Debug)]
pub enum ConfigError {
  /// rail.toml not found
  NotFound { workspace_root: PathBuf },

  /// Missing required field
  MissingField { field: String },

  /// Field present but unusable
  Invalid { field: String, reason: String },

  /// CLI named a target that is not declared
  UnknownTarget { name: String, available: Vec<String> },
}

impl ConfigError {
  fn help_message(&self) -> Option<String> {
    match self {
      ConfigError::NotFound { .. } => {
        Some("Create a rail.toml with [project], [[targets]], [build] and [tools] sections.".to_string())
      }
      ConfigError::MissingField { field } => Some(format!("Add `{}` to rail.toml.", field)),
      ConfigError::UnknownTarget { available, .. } => {
        if available.is_empty() {
          Some("No downgrade targets are configured; declare more than one [[targets]] entry.".to_string())
        } else {
          Some(format!("Available targets: {}", available.join(", ")))
        }
      }
      ConfigError::Invalid { .. } => None,
    }
  }
}

impl fmt::Display for ConfigError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ConfigError::NotFound { workspace_root } => {
        write!(
          f,
          "No release-rail configuration found.\nExpected file: {}/rail.toml",
          workspace_root.display()
        )
      }
      ConfigError::MissingField { field } => {
        write!(f, "Missing required field in config: {}", field)
      }
      ConfigError::Invalid { field, reason } => {
        write!(f, "Invalid value for {}: {}", field, reason)
      }
      ConfigError::UnknownTarget { name, .. } => {
        write!(f, "Target '{}' is not a configured downgrade target", name)
      }
    }
  }
}

/// Git operation errors
#[derive(Debug)]
pub enum GitError {
  /// Git command failed
  CommandFailed { command: String, stderr: String },

  /// Repository not found
  RepoNotFound { path: PathBuf },
}

impl GitError {
  fn help_message(&self) -> Option<String> {
    match self {
      GitError::RepoNotFound { path } => Some(format!(
        "Version resolution reads release tags; run inside a git checkout: {}",
        path.display()
      )),
      GitError::CommandFailed { stderr, .. } if stderr.contains("shallow") => {
        Some("Tag history looks truncated. Fetch with `git fetch --tags --unshallow`.".to_string())
      }
      _ => None,
    }
  }
}

impl fmt::Display for GitError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      GitError::CommandFailed { command, stderr } => {
        write!(f, "Git command failed: {}\n{}", command, stderr)
      }
      GitError::RepoNotFound { path } => {
        write!(f, "Git repository not found at: {}", path.display())
      }
    }
  }
}

/// Release metadata errors raised by version resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
  /// A release tag carries a suffix that maps to no channel
  UnknownChannelSuffix { tag: String, suffix: String },

  /// A declared channel override names no channel
  UnknownChannel { value: String },
}

impl VersionError {
  fn help_message(&self) -> Option<String> {
    match self {
      VersionError::UnknownChannelSuffix { .. } => {
        Some("Known channel suffixes: dev. Retag the release or add the channel.".to_string())
      }
      VersionError::UnknownChannel { .. } => Some("Use `dev` or `release`.".to_string()),
    }
  }
}

impl fmt::Display for VersionError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      VersionError::UnknownChannelSuffix { tag, suffix } => {
        write!(f, "Release tag '{}' has unknown channel suffix '{}'", tag, suffix)
      }
      VersionError::UnknownChannel { value } => {
        write!(f, "Unknown release channel '{}'", value)
      }
    }
  }
}

/// Why a single downgrade lane failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaneFailure {
  /// The downgrade tool could not rewrite the input for the target runtime
  UnsupportedConstruct { stage: String, detail: String },

  /// The downgraded test suite did not pass
  TestFailure { detail: String },

  /// A tool could not be run at all (missing, timed out)
  Tool { detail: String },

  /// Filesystem trouble while preparing lane outputs
  Io { detail: String },
}

impl LaneFailure {
  /// Short name of the failure kind, as printed in the aggregate report
  pub fn kind(&self) -> &'static str {
    match self {
      LaneFailure::UnsupportedConstruct { .. } => "UnsupportedConstruct",
      LaneFailure::TestFailure { .. } => "TestFailure",
      LaneFailure::Tool { .. } => "ToolError",
      LaneFailure::Io { .. } => "IoError",
    }
  }

  fn detail(&self) -> &str {
    match self {
      LaneFailure::UnsupportedConstruct { detail, .. }
      | LaneFailure::TestFailure { detail }
      | LaneFailure::Tool { detail }
      | LaneFailure::Io { detail } => detail,
    }
  }
}

impl fmt::Display for LaneFailure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      LaneFailure::UnsupportedConstruct { stage, detail } => {
        write!(f, "{} while {}: {}", self.kind(), stage, detail.trim_end())
      }
      _ => write!(f, "{}: {}", self.kind(), self.detail().trim_end()),
    }
  }
}

/// Aggregate of every failed lane in one orchestrator run
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LaneReport {
  /// (target display name, failure)
  pub failures: Vec<(String, LaneFailure)>,
  /// Lanes that never started because of the fail-fast policy
  pub cancelled: Vec<String>,
}

impl fmt::Display for LaneReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} lane(s) failed:", self.failures.len())?;
    for (target, failure) in &self.failures {
      write!(f, "\n  - Java {}: {}", target, failure)?;
    }
    if !self.cancelled.is_empty() {
      write!(f, "\n  cancelled: {}", self.cancelled.join(", "))?;
    }
    Ok(())
  }
}

/// Publication errors
#[derive(Debug)]
pub enum PublishError {
  /// The version is already published and the policy says fail
  Conflict { destination: String, version: String },

  /// A required secret is not set
  MissingToken { variable: String },

  /// A release artifact does not exist on disk
  MissingArtifact { path: PathBuf },

  /// HTTP request failed or returned an unexpected status
  Http { url: String, message: String },
}

impl PublishError {
  fn help_message(&self) -> Option<String> {
    match self {
      PublishError::Conflict { .. } => Some(
        "Bump the minor version, delete the existing release, or set release.on_conflict = \"skip\".".to_string(),
      ),
      PublishError::MissingToken { variable } => Some(format!("Export {} before publishing.", variable)),
      PublishError::MissingArtifact { .. } => Some("Run `release-rail assemble` first.".to_string()),
      PublishError::Http { .. } => None,
    }
  }
}

impl fmt::Display for PublishError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PublishError::Conflict { destination, version } => {
        write!(f, "Version {} already exists at {}", version, destination)
      }
      PublishError::MissingToken { variable } => {
        write!(f, "Environment variable {} is not set", variable)
      }
      PublishError::MissingArtifact { path } => {
        write!(f, "Release artifact missing: {}", path.display())
      }
      PublishError::Http { url, message } => {
        write!(f, "HTTP request to {} failed: {}", url, message)
      }
    }
  }
}

/// Result type alias for release-rail
pub type RailResult<T> = Result<T, RailError>;

/// Helper trait to add context to Results
pub trait ResultExt<T> {
  /// Add context to an error result
  fn context(self, ctx: impl Into<String>) -> RailResult<T>;

  /// Add context using a closure (lazy evaluation)
  fn with_context<F>(self, f: F) -> RailResult<T>
  where
    F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
  E: Into<RailError>,
{
  fn context(self, ctx: impl Into<String>) -> RailResult<T> {
    self.map_err(|e| e.into().context(ctx))
  }

  fn with_context<F>(self, f: F) -> RailResult<T>
  where
    F: FnOnce() -> String,
  {
    self.map_err(|e| e.into().context(f()))
  }
}

/// Pretty-print an error to stderr with help text
pub fn print_error(error: &RailError) {
  eprintln!("\n❌ {}\n", error);

  if let Some(help) = error.help_message() {
    eprintln!("💡 Help: {}\n", help);
  }
}
