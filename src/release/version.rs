//! Version resolution from release tag history
//!
//! The version is `<minor>.<patch>[-<channel suffix>]`. The minor part is
//! declared in rail.toml; the patch is a pure function of tag history and CI
//! context, so no counter is ever persisted.
//!
//! # Patch rules
//!
//! For tags `release/<minor>.<remainder>`, `max_patch` is the largest number
//! before any `-suffix` in the remainders:
//!
//! - no tags for this minor: patch 0
//! - a stable tag exactly `<minor>.<max_patch>` exists and this is not the
//!   external CI: `max_patch + 1` (local builds move past the last stable point)
//! - otherwise: `max_patch` (CI re-runs reproduce the tagged version, dev
//!   builds stacked on a dev tag don't skip numbers)

use super::tags::TagHistory;
use crate::core::error::VersionError;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

/// Suffix of a pre-release tag: `-<word>.<n>` at the end of the name
static CHANNEL_SUFFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-(\w+)\.\d+$").expect("valid regex"));

/// Release channel of a build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseChannel {
  /// Pre-release build, version carries `-dev`
  Dev,
  /// Stable release, no suffix
  Release,
}

impl ReleaseChannel {
  pub const ALL: [ReleaseChannel; 2] = [ReleaseChannel::Dev, ReleaseChannel::Release];

  /// Version suffix for this channel
  pub fn suffix(&self) -> Option<&'static str> {
    match self {
      ReleaseChannel::Dev => Some("dev"),
      ReleaseChannel::Release => None,
    }
  }

  /// Channel whose suffix is exactly `suffix`
  pub fn from_suffix(suffix: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|c| c.suffix() == Some(suffix))
  }

  /// Parse a declared channel override (case-insensitive)
  pub fn parse_override(value: &str) -> Result<Self, VersionError> {
    match value.trim().to_ascii_lowercase().as_str() {
      "dev" | "dev_build" | "dev-build" => Ok(ReleaseChannel::Dev),
      "release" => Ok(ReleaseChannel::Release),
      _ => Err(VersionError::UnknownChannel {
        value: value.to_string(),
      }),
    }
  }

  pub fn is_prerelease(&self) -> bool {
    self.suffix().is_some()
  }
}

impl fmt::Display for ReleaseChannel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ReleaseChannel::Dev => write!(f, "dev"),
      ReleaseChannel::Release => write!(f, "release"),
    }
  }
}

/// A fully resolved version
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionIdentifier {
  pub minor: String,
  pub patch: u64,
  pub channel: ReleaseChannel,
}

impl VersionIdentifier {
  /// Name of the tag this version is released under
  pub fn tag_name(&self, prefix: &str) -> String {
    format!("{}{}", prefix, self)
  }
}

impl fmt::Display for VersionIdentifier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{}", self.minor, self.patch)?;
    if let Some(suffix) = self.channel.suffix() {
      write!(f, "-{}", suffix)?;
    }
    Ok(())
  }
}

/// Everything version resolution depends on
#[derive(Debug, Clone)]
pub struct VersionInputs<'a> {
  pub history: &'a TagHistory,
  pub minor_version: &'a str,
  pub tag_prefix: &'a str,
  pub external_ci: bool,
  pub channel_override: Option<&'a str>,
}

/// Output of version resolution, computed once per invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedVersion {
  pub version: VersionIdentifier,
  pub tag_name: String,
  /// A declared channel or an external CI run; drives post-processing effort
  pub is_release_build: bool,
}

impl ResolvedVersion {
  pub fn version_string(&self) -> String {
    self.version.to_string()
  }

  pub fn channel(&self) -> ReleaseChannel {
    self.version.channel
  }
}

/// Resolve the version for this build
pub fn resolve(inputs: &VersionInputs<'_>) -> Result<ResolvedVersion, VersionError> {
  let channel = resolve_channel(inputs)?;
  let minor_prefix = format!("{}{}.", inputs.tag_prefix, inputs.minor_version);
  let patch = resolve_patch(inputs.history, &minor_prefix, inputs.external_ci);

  let version = VersionIdentifier {
    minor: inputs.minor_version.to_string(),
    patch,
    channel,
  };
  let tag_name = version.tag_name(inputs.tag_prefix);

  tracing::info!(version = %version, channel = %channel, tag = %tag_name, "resolved version");

  Ok(ResolvedVersion {
    version,
    tag_name,
    is_release_build: inputs.channel_override.is_some() || inputs.external_ci,
  })
}

fn resolve_channel(inputs: &VersionInputs<'_>) -> Result<ReleaseChannel, VersionError> {
  if inputs.external_ci {
    let Some(tag) = inputs.history.most_recent() else {
      return Ok(ReleaseChannel::Release);
    };
    return match CHANNEL_SUFFIX.captures(&tag.name).and_then(|c| c.get(1)) {
      Some(suffix) => ReleaseChannel::from_suffix(suffix.as_str()).ok_or_else(|| VersionError::UnknownChannelSuffix {
        tag: tag.name.clone(),
        suffix: suffix.as_str().to_string(),
      }),
      None => Ok(ReleaseChannel::Release),
    };
  }

  match inputs.channel_override {
    Some(value) => ReleaseChannel::parse_override(value),
    None => Ok(ReleaseChannel::Dev),
  }
}

fn resolve_patch(history: &TagHistory, minor_prefix: &str, external_ci: bool) -> u64 {
  let remainders: Vec<&str> = history
    .names()
    .filter_map(|name| name.strip_prefix(minor_prefix))
    .collect();

  let max_patch = remainders
    .iter()
    .filter_map(|remainder| {
      let number = remainder.split('-').next().unwrap_or(remainder);
      // a patch must have a successor, or the next dev build has no number
      match number.parse::<u64>().ok().filter(|n| n.checked_add(1).is_some()) {
        Some(n) => Some(n),
        None => {
          tracing::warn!(tag = %format!("{}{}", minor_prefix, remainder), "ignoring release tag with unusable patch number");
          None
        }
      }
    })
    .max();

  match max_patch {
    None => 0,
    Some(max) if !external_ci && remainders.contains(&max.to_string().as_str()) => max + 1,
    Some(max) => max,
  }
}
