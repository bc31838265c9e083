use crate::core::error::{ConfigError, RailError, RailResult, ResultExt};
use crate::core::tool::CommandTemplate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for release-rail
/// Searched in order: rail.toml, .rail.toml, .config/rail.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RailConfig {
  pub project: ProjectConfig,
  #[serde(default)]
  pub release: ReleaseConfig,
  #[serde(default)]
  pub targets: Vec<TargetConfig>,
  #[serde(default)]
  pub build: BuildConfig,
  #[serde(default)]
  pub tools: ToolsConfig,
  /// Runtime version -> java executable used to launch tests on that runtime
  #[serde(default)]
  pub runtimes: BTreeMap<String, PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
  /// Archive base name (e.g. "zson")
  #[serde(default)]
  pub name: String,

  /// Maven group id; required only when publishing to a Maven repository
  #[serde(default)]
  pub group: Option<String>,

  /// "<major>.<minor>" part of every version; the patch is derived from tags
  #[serde(default)]
  pub minor_version: String,
}

/// What to do when a version has already been published
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
  /// Surface a `PublishConflict` error
  #[default]
  Fail,
  /// Log and leave the existing publication untouched
  Skip,
}

/// Release and publishing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseConfig {
  /// Prefix every release tag carries (default: "release/")
  #[serde(default = "default_tag_prefix")]
  pub tag_prefix: String,

  /// Channel override ("dev" or "release"); declaring one makes this a release build
  #[serde(default)]
  pub channel: Option<String>,

  /// Running as the external CI that republishes an existing tag
  #[serde(default)]
  pub external_ci: bool,

  /// Branch the GitHub release tag is created on (default: "master")
  #[serde(default = "default_target_branch")]
  pub target_branch: String,

  /// GitHub repository as "owner/name"
  #[serde(default)]
  pub github_repository: Option<String>,

  /// GitHub API base URL (default: "https://api.github.com")
  #[serde(default = "default_github_api_url")]
  pub github_api_url: String,

  /// Maven repository URL or local path; env `local_maven_url` takes precedence
  #[serde(default)]
  pub maven_url: Option<String>,

  /// Re-publish behavior
  #[serde(default)]
  pub on_conflict: ConflictPolicy,
}

fn default_tag_prefix() -> String {
  "release/".to_string()
}

fn default_target_branch() -> String {
  "master".to_string()
}

fn default_github_api_url() -> String {
  "https://api.github.com".to_string()
}

impl Default for ReleaseConfig {
  fn default() -> Self {
    Self {
      tag_prefix: default_tag_prefix(),
      channel: None,
      external_ci: false,
      target_branch: default_target_branch(),
      github_repository: None,
      github_api_url: default_github_api_url(),
      maven_url: None,
      on_conflict: ConflictPolicy::default(),
    }
  }
}

/// A declared runtime target
///
/// ```toml
/// [[targets]]
/// version = "8"
/// display = "8"   # optional, defaults to version
/// test = "11"     # optional, defaults to version
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
  pub version: String,
  #[serde(default)]
  pub display: Option<String>,
  #[serde(default)]
  pub test: Option<String>,
}

/// The opaque buildable unit and where its outputs land
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
  /// Command that builds the primary, sources and docs archives plus compiled tests
  #[serde(default)]
  pub command: Vec<String>,

  /// Directory for release-rail's own outputs (downgraded jars, caches)
  #[serde(default = "default_output_dir")]
  pub output_dir: PathBuf,

  #[serde(default = "default_primary")]
  pub primary: String,

  #[serde(default = "default_sources")]
  pub sources: String,

  #[serde(default = "default_docs")]
  pub docs: String,

  /// Compiled main classes (excluded from downgraded test classpaths)
  #[serde(default = "default_main_classes")]
  pub main_classes: PathBuf,

  /// Compiled test classes (downgraded per lane)
  #[serde(default = "default_test_classes")]
  pub test_classes: PathBuf,

  /// Runtime-only test dependencies (jars or directories)
  #[serde(default)]
  pub test_runtime_classpath: Vec<PathBuf>,

  /// Micro-benchmark archives live here and are never recompressed
  #[serde(default = "default_benchmark_dir")]
  pub benchmark_dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
  PathBuf::from("build/rail")
}

fn default_primary() -> String {
  "build/libs/{name}-{version}.jar".to_string()
}

fn default_sources() -> String {
  "build/libs/{name}-{version}-sources.jar".to_string()
}

fn default_docs() -> String {
  "build/libs/{name}-{version}-javadoc.jar".to_string()
}

fn default_main_classes() -> PathBuf {
  PathBuf::from("build/classes/java/main")
}

fn default_test_classes() -> PathBuf {
  PathBuf::from("build/classes/java/test")
}

fn default_benchmark_dir() -> PathBuf {
  PathBuf::from("build/jmhlibs")
}

impl Default for BuildConfig {
  fn default() -> Self {
    Self {
      command: Vec::new(),
      output_dir: default_output_dir(),
      primary: default_primary(),
      sources: default_sources(),
      docs: default_docs(),
      main_classes: default_main_classes(),
      test_classes: default_test_classes(),
      test_runtime_classpath: Vec::new(),
      benchmark_dir: default_benchmark_dir(),
    }
  }
}

impl BuildConfig {
  /// Expand `{name}` and `{version}` in an archive path template
  pub fn archive_path(template: &str, name: &str, version: &str) -> PathBuf {
    PathBuf::from(template.replace("{name}", name).replace("{version}", version))
  }
}

/// External tools
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
  /// Downgrader command template ({input}, {output}, {class_version}, {runtime}, {classpath})
  #[serde(default)]
  pub downgrade: Vec<String>,

  /// Test runner command template ({java}, {classpath}, {runtime})
  #[serde(default)]
  pub test: Vec<String>,

  /// Archive recompressor executable (default: "advzip")
  #[serde(default = "default_recompressor")]
  pub recompressor: String,

  /// Per-invocation timeout in seconds (default: 1800)
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,

  /// Worker threads for downgrade lanes (0 = available cores)
  #[serde(default)]
  pub jobs: usize,

  /// Cancel lanes that have not started once any lane fails
  #[serde(default)]
  pub fail_fast: bool,

  /// Recompress finished archives
  #[serde(default = "default_true")]
  pub postprocess: bool,
}

fn default_recompressor() -> String {
  "advzip".to_string()
}

fn default_timeout_secs() -> u64 {
  30 * 60
}

fn default_true() -> bool {
  true
}

impl Default for ToolsConfig {
  fn default() -> Self {
    Self {
      downgrade: Vec::new(),
      test: Vec::new(),
      recompressor: default_recompressor(),
      timeout_secs: default_timeout_secs(),
      jobs: 0,
      fail_fast: false,
      postprocess: true,
    }
  }
}

impl ToolsConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }

  pub fn downgrade_template(&self) -> CommandTemplate {
    CommandTemplate::new(self.downgrade.clone())
  }

  pub fn test_template(&self) -> CommandTemplate {
    CommandTemplate::new(self.test.clone())
  }
}

impl RailConfig {
  /// Find config file in search order: rail.toml, .rail.toml, .config/rail.toml
  pub fn find_config_path(path: &Path) -> Option<PathBuf> {
    let candidates = vec![
      path.join("rail.toml"),
      path.join(".rail.toml"),
      path.join(".config").join("rail.toml"),
    ];

    candidates.into_iter().find(|p| p.exists())
  }

  /// Load config from the workspace (searches multiple locations)
  pub fn load(path: &Path) -> RailResult<Self> {
    let config_path = Self::find_config_path(path).ok_or_else(|| {
      RailError::Config(ConfigError::NotFound {
        workspace_root: path.to_path_buf(),
      })
    })?;
    Self::load_file(&config_path)
  }

  /// Load and validate a specific config file
  pub fn load_file(config_path: &Path) -> RailResult<Self> {
    let content = fs::read_to_string(config_path)
      .with_context(|| format!("Failed to read config from {}", config_path.display()))?;
    let config = Self::parse(&content).with_context(|| format!("Invalid config in {}", config_path.display()))?;
    Ok(config)
  }

  /// Parse and validate config text
  pub fn parse(content: &str) -> RailResult<Self> {
    let config: RailConfig = toml_edit::de::from_str(content)?;
    config.validate()?;
    Ok(config)
  }

  /// Reject configurations that would fail halfway through a build
  pub fn validate(&self) -> RailResult<()> {
    if self.project.name.trim().is_empty() {
      return Err(ConfigError::MissingField {
        field: "project.name".to_string(),
      }
      .into());
    }

    if self.project.minor_version.trim().is_empty() {
      return Err(ConfigError::MissingField {
        field: "project.minor_version".to_string(),
      }
      .into());
    }

    // "1.4" must extend to a valid semver core once the patch is appended
    if semver::Version::parse(&format!("{}.0", self.project.minor_version)).is_err() {
      return Err(
        ConfigError::Invalid {
          field: "project.minor_version".to_string(),
          reason: format!("'{}' is not of the form <major>.<minor>", self.project.minor_version),
        }
        .into(),
      );
    }

    if self.release.tag_prefix.is_empty() {
      return Err(
        ConfigError::Invalid {
          field: "release.tag_prefix".to_string(),
          reason: "must not be empty".to_string(),
        }
        .into(),
      );
    }

    if self.targets.is_empty() {
      return Err(ConfigError::MissingField {
        field: "[[targets]] (at least one runtime target)".to_string(),
      }
      .into());
    }

    if self.tools.timeout_secs == 0 {
      return Err(
        ConfigError::Invalid {
          field: "tools.timeout_secs".to_string(),
          reason: "must be greater than zero".to_string(),
        }
        .into(),
      );
    }

    if let Some(repo) = &self.release.github_repository
      && repo.split('/').filter(|s| !s.is_empty()).count() != 2
    {
      return Err(
        ConfigError::Invalid {
          field: "release.github_repository".to_string(),
          reason: format!("'{}' is not of the form owner/name", repo),
        }
        .into(),
      );
    }

    Ok(())
  }

  /// Java executable for a runtime version, if one is declared
  pub fn runtime_executable(&self, runtime: &str) -> Option<&Path> {
    self.runtimes.get(runtime).map(PathBuf::as_path)
  }
}
