//! Runtime targets and the downgrade matrix
//!
//! The highest declared runtime is the one the library is compiled for
//! ("current"). Every strictly lower runtime gets its own downgrade lane.

use crate::core::config::TargetConfig;
use crate::core::error::{ConfigError, RailError, RailResult};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Class-file major version of Java 1.0 minus one; feature N maps to N + 44
const CLASS_VERSION_OFFSET: u32 = 44;

/// A JVM feature release (8, 11, 17, 21, ...)
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeVersion {
  feature: u32,
  /// Spelling as declared, for display
  #[serde(skip)]
  declared: String,
}

impl RuntimeVersion {
  pub fn feature(&self) -> u32 {
    self.feature
  }

  /// Class-file major version for bytecode targeting this runtime
  pub fn class_version(&self) -> u32 {
    self.feature + CLASS_VERSION_OFFSET
  }

  pub fn declared(&self) -> &str {
    &self.declared
  }
}

impl FromStr for RuntimeVersion {
  type Err = RailError;

  /// Accepts "8", "17", and the legacy "1.8" spelling
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let trimmed = s.trim();
    let digits = trimmed.strip_prefix("1.").unwrap_or(trimmed);
    let feature = digits.parse::<u32>().ok().filter(|f| *f >= 1).ok_or_else(|| {
      RailError::Config(ConfigError::Invalid {
        field: "targets.version".to_string(),
        reason: format!("'{}' is not a Java version", s),
      })
    })?;

    Ok(Self {
      feature,
      declared: trimmed.to_string(),
    })
  }
}

impl PartialEq for RuntimeVersion {
  fn eq(&self, other: &Self) -> bool {
    self.feature == other.feature
  }
}

impl Eq for RuntimeVersion {}

impl Ord for RuntimeVersion {
  fn cmp(&self, other: &Self) -> Ordering {
    self.feature.cmp(&other.feature)
  }
}

impl PartialOrd for RuntimeVersion {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl fmt::Display for RuntimeVersion {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.feature)
  }
}

/// One supported runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildTarget {
  pub display_name: String,
  pub runtime_version: RuntimeVersion,
  /// Tests may be downgraded less aggressively than shipped code
  pub test_runtime_version: RuntimeVersion,
}

impl BuildTarget {
  pub fn from_config(config: &TargetConfig) -> RailResult<Self> {
    let runtime_version: RuntimeVersion = config.version.parse()?;
    let test_runtime_version = match &config.test {
      Some(test) => test.parse()?,
      None => runtime_version.clone(),
    };
    let display_name = config.display.clone().unwrap_or_else(|| config.version.trim().to_string());

    Ok(Self {
      display_name,
      runtime_version,
      test_runtime_version,
    })
  }

  /// Display name safe for paths and artifact classifiers ("1.8" -> "1_8")
  pub fn slug(&self) -> String {
    self.display_name.replace('.', "_")
  }

  /// Classifier of this target's downgraded archive
  pub fn classifier(&self) -> String {
    format!("downgraded-{}", self.slug())
  }

  /// Whether a CLI argument names this target
  pub fn matches(&self, name: &str) -> bool {
    if self.display_name == name || self.slug() == name {
      return true;
    }
    name
      .parse::<RuntimeVersion>()
      .is_ok_and(|v| v == self.runtime_version)
  }
}

/// The current target plus every older target to downgrade to
#[derive(Debug, Clone, Serialize)]
pub struct TargetMatrix {
  pub current: BuildTarget,
  /// Strictly older than current, highest first
  pub downgrades: Vec<BuildTarget>,
}

impl TargetMatrix {
  /// Build the matrix from declared targets
  pub fn build(declared: &[TargetConfig]) -> RailResult<Self> {
    let mut targets = declared.iter().map(BuildTarget::from_config).collect::<RailResult<Vec<_>>>()?;

    // stable sort keeps declaration order among equal versions
    targets.sort_by(|a, b| b.runtime_version.cmp(&a.runtime_version));

    let mut iter = targets.into_iter();
    let current = iter.next().ok_or_else(|| {
      RailError::Config(ConfigError::MissingField {
        field: "[[targets]] (at least one runtime target)".to_string(),
      })
    })?;

    let downgrades = iter
      .filter(|t| t.runtime_version < current.runtime_version)
      .collect();

    Ok(Self { current, downgrades })
  }

  /// Resolve a CLI target argument to a downgrade target
  pub fn find(&self, name: &str) -> RailResult<&BuildTarget> {
    self.downgrades.iter().find(|t| t.matches(name)).ok_or_else(|| {
      RailError::Config(ConfigError::UnknownTarget {
        name: name.to_string(),
        available: self.downgrades.iter().map(|t| t.display_name.clone()).collect(),
      })
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn target(version: &str) -> TargetConfig {
    TargetConfig {
      version: version.to_string(),
      display: None,
      test: None,
    }
  }

  fn features(targets: &[BuildTarget]) -> Vec<u32> {
    targets.iter().map(|t| t.runtime_version.feature()).collect()
  }

  #[test]
  fn test_matrix_descending_below_current() {
    let matrix = TargetMatrix::build(&[target("21"), target("17"), target("11"), target("8")]).unwrap();
    assert_eq!(matrix.current.runtime_version.feature(), 21);
    assert_eq!(features(&matrix.downgrades), vec![17, 11, 8]);
  }

  #[test]
  fn test_matrix_sorts_unordered_declarations() {
    let matrix = TargetMatrix::build(&[target("8"), target("21"), target("11"), target("17")]).unwrap();
    assert_eq!(matrix.current.display_name, "21");
    assert_eq!(features(&matrix.downgrades), vec![17, 11, 8]);
  }

  #[test]
  fn test_single_target_has_empty_matrix() {
    let matrix = TargetMatrix::build(&[target("21")]).unwrap();
    assert!(matrix.downgrades.is_empty());
  }

  #[test]
  fn test_duplicate_of_current_is_not_a_downgrade() {
    let matrix = TargetMatrix::build(&[target("21"), target("21"), target("17")]).unwrap();
    assert_eq!(features(&matrix.downgrades), vec![17]);
  }

  #[test]
  fn test_no_targets_is_configuration_error() {
    let err = TargetMatrix::build(&[]).unwrap_err();
    assert!(matches!(err, RailError::Config(ConfigError::MissingField { .. })));
  }

  #[test]
  fn test_legacy_version_spelling() {
    let config = TargetConfig {
      version: "1.8".to_string(),
      display: None,
      test: Some("11".to_string()),
    };
    let target = BuildTarget::from_config(&config).unwrap();
    assert_eq!(target.runtime_version.feature(), 8);
    assert_eq!(target.runtime_version.class_version(), 52);
    assert_eq!(target.test_runtime_version.feature(), 11);
    assert_eq!(target.slug(), "1_8");
    assert_eq!(target.classifier(), "downgraded-1_8");
    assert!(target.matches("1.8"));
    assert!(target.matches("8"));
    assert!(target.matches("1_8"));
    assert!(!target.matches("11"));
  }

  #[test]
  fn test_invalid_version() {
    assert!("eight".parse::<RuntimeVersion>().is_err());
    assert!("0".parse::<RuntimeVersion>().is_err());
  }

  #[test]
  fn test_find_unknown_target_lists_available() {
    let matrix = TargetMatrix::build(&[target("21"), target("8")]).unwrap();
    assert_eq!(matrix.find("8").unwrap().display_name, "8");
    match matrix.find("21").unwrap_err() {
      RailError::Config(ConfigError::UnknownTarget { available, .. }) => assert_eq!(available, vec!["8"]),
      other => panic!("unexpected error: {other}"),
    }
  }
}
