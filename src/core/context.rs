//! Build context - resolve once, pass everywhere
//!
//! # Design
//!
//! Version resolution reads the whole tag history and must run exactly once
//! per invocation. `BuildContext` is built in main.rs from config, git and CLI
//! overrides, then handed by reference to every command. Nothing in it is
//! mutated afterwards.
//!
//! ```text
//! main.rs:
//!   BuildContext::build() -> &BuildContext
//!   |
//!   v
//! commands/*.rs:
//!   fn run_*(ctx: &BuildContext)
//! ```

use crate::core::config::{BuildConfig, RailConfig};
use crate::core::error::{ConfigError, RailError, RailResult};
use crate::core::tool::ToolOptions;
use crate::core::vcs::SystemGit;
use crate::pipeline::artifact::{Artifact, ArtifactKind};
use crate::pipeline::targets::{BuildTarget, RuntimeVersion, TargetMatrix};
use crate::release::version::{self, ResolvedVersion, VersionInputs};
use crate::release::TagHistory;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Values supplied on the command line (or their env equivalents)
#[derive(Debug, Clone, Default)]
pub struct Overrides {
  pub config_path: Option<PathBuf>,
  pub external_ci: bool,
  pub release_channel: Option<String>,
}

/// Where HEAD is, for display and release metadata
#[derive(Debug, Clone, Default)]
pub struct HeadInfo {
  pub commit: String,
  pub branch: String,
}

/// Immutable per-invocation build state
#[derive(Clone)]
pub struct BuildContext {
  /// Project root (absolute path)
  pub root: PathBuf,

  /// Parsed and validated rail.toml
  pub config: Arc<RailConfig>,

  /// Release tag candidates visible from HEAD
  pub history: TagHistory,

  /// Version, tag name and release-build flag
  pub resolved: ResolvedVersion,

  /// Current target and downgrade lanes
  pub matrix: TargetMatrix,

  pub head: HeadInfo,
}

impl BuildContext {
  /// Build the context for a project root.
  ///
  /// Loads config, reads tags from git and resolves the version. Any failure
  /// here aborts before build work starts.
  pub fn build(root: &Path, overrides: &Overrides) -> RailResult<Self> {
    let config = match &overrides.config_path {
      Some(path) => RailConfig::load_file(&root.join(path))?,
      None => RailConfig::load(root)?,
    };

    let git = SystemGit::open(root)?;
    let head_timestamp = git.head_timestamp()?;
    let all_tags = git.list_tags()?;
    let history = TagHistory::read(all_tags, &config.release.tag_prefix, head_timestamp);
    if history.is_empty() {
      tracing::info!(prefix = %config.release.tag_prefix, "no release tags visible from HEAD, treating as first release");
    } else {
      tracing::debug!(candidates = history.len(), "read release tag history");
    }

    let head = HeadInfo {
      commit: git.head_commit()?,
      branch: git.current_branch()?,
    };

    Self::from_parts(git.work_tree().to_path_buf(), config, history, head, overrides)
  }

  /// Assemble a context from already-loaded parts
  pub fn from_parts(
    root: PathBuf,
    config: RailConfig,
    history: TagHistory,
    head: HeadInfo,
    overrides: &Overrides,
  ) -> RailResult<Self> {
    let external_ci = overrides.external_ci || config.release.external_ci;
    let channel_override = overrides
      .release_channel
      .as_deref()
      .or(config.release.channel.as_deref())
      .filter(|c| !c.trim().is_empty());

    let resolved = version::resolve(&VersionInputs {
      history: &history,
      minor_version: &config.project.minor_version,
      tag_prefix: &config.release.tag_prefix,
      external_ci,
      channel_override,
    })?;

    let matrix = TargetMatrix::build(&config.targets)?;

    Ok(Self {
      root,
      config: Arc::new(config),
      history,
      resolved,
      matrix,
      head,
    })
  }

  /// Rendered version string, e.g. "1.4.0-dev"
  pub fn version(&self) -> String {
    self.resolved.version_string()
  }

  pub fn project_name(&self) -> &str {
    &self.config.project.name
  }

  /// Resolve a config-relative path against the project root
  pub fn resolve_path(&self, path: &Path) -> PathBuf {
    if path.is_absolute() {
      path.to_path_buf()
    } else {
      self.root.join(path)
    }
  }

  fn archive(&self, template: &str) -> PathBuf {
    self.resolve_path(&BuildConfig::archive_path(template, self.project_name(), &self.version()))
  }

  pub fn primary_archive(&self) -> PathBuf {
    self.archive(&self.config.build.primary)
  }

  pub fn sources_archive(&self) -> PathBuf {
    self.archive(&self.config.build.sources)
  }

  pub fn docs_archive(&self) -> PathBuf {
    self.archive(&self.config.build.docs)
  }

  /// Directory for release-rail's own outputs
  pub fn output_dir(&self) -> PathBuf {
    self.resolve_path(&self.config.build.output_dir)
  }

  /// Per-target output directory; lanes never share one
  pub fn lane_dir(&self, target: &BuildTarget) -> PathBuf {
    self.output_dir().join("downgrade").join(target.slug())
  }

  pub fn downgraded_archive(&self, target: &BuildTarget) -> PathBuf {
    self.lane_dir(target).join(format!(
      "{}-{}-{}.jar",
      self.project_name(),
      self.version(),
      target.classifier()
    ))
  }

  pub fn downgraded_test_classes(&self, target: &BuildTarget) -> PathBuf {
    self.lane_dir(target).join("test-classes")
  }

  pub fn cache_dir(&self) -> PathBuf {
    self.output_dir().join(".cache")
  }

  /// The full artifact set a release ships
  pub fn release_artifacts(&self) -> Vec<Artifact> {
    let mut artifacts = vec![
      Artifact::new(ArtifactKind::Primary, self.primary_archive()),
      Artifact::new(ArtifactKind::Sources, self.sources_archive()),
      Artifact::new(ArtifactKind::Docs, self.docs_archive()),
    ];
    artifacts.extend(
      self
        .matrix
        .downgrades
        .iter()
        .map(|t| Artifact::new(ArtifactKind::Downgraded(t.clone()), self.downgraded_archive(t))),
    );
    artifacts
  }

  /// Options for every external tool, rooted at the project
  pub fn tool_options(&self) -> ToolOptions {
    ToolOptions::new(self.config.tools.timeout())
      .in_dir(&self.root)
      .with_env("RAIL_VERSION", self.version())
      .with_env("RAIL_VERSION_TAG", self.resolved.tag_name.clone())
      .with_env("RAIL_CHANNEL", self.resolved.channel().to_string())
  }

  /// Java launcher for a runtime.
  ///
  /// Looks in `[runtimes]`, then `JAVA_HOME_<v>_X64` / `JAVA_HOME_<v>` (the
  /// CI runner convention), then falls back to `java` on PATH.
  pub fn java_for(&self, runtime: &RuntimeVersion) -> String {
    let feature = runtime.feature().to_string();
    if let Some(exe) = self
      .config
      .runtime_executable(&feature)
      .or_else(|| self.config.runtime_executable(runtime.declared()))
    {
      return exe.to_string_lossy().into_owned();
    }

    for var in [format!("JAVA_HOME_{}_X64", feature), format!("JAVA_HOME_{}", feature)] {
      if let Ok(home) = std::env::var(&var)
        && !home.is_empty()
      {
        return Path::new(&home).join("bin").join("java").to_string_lossy().into_owned();
      }
    }

    "java".to_string()
  }

  /// Require a non-empty build command
  pub fn require_build_command(&self) -> RailResult<&[String]> {
    if self.config.build.command.is_empty() {
      return Err(RailError::Config(ConfigError::MissingField {
        field: "build.command".to_string(),
      }));
    }
    Ok(&self.config.build.command)
  }
}
