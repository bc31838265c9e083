//! One downgrade lane: a target's downgrade, test downgrade and test run
//!
//! ```text
//! Pending -> DowngradingArtifact -> DowngradingTests -> Testing -> Passed
//!                   |                      |               |
//!                   +----------------------+---------------+----> Failed
//! ```
//!
//! A lane only ever writes under its own `{output_dir}/downgrade/{slug}`
//! directory. The primary archive and compiled tests are read-only inputs.

use crate::core::context::BuildContext;
use crate::core::error::LaneFailure;
use crate::core::tool::{CommandTemplate, ToolError, run_external_tool};
use crate::pipeline::cache::{FingerprintBuilder, StageCache};
use crate::pipeline::classpath;
use crate::pipeline::targets::{BuildTarget, RuntimeVersion};
use crate::ui::LaneProgress;
use linya::Bar;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Which stages a lane runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneMode {
  /// Downgrade the primary archive only
  Assemble,
  /// Downgrade archive and tests, then run the tests
  Verify,
}

impl LaneMode {
  pub fn stage_count(self) -> usize {
    match self {
      LaneMode::Assemble => 1,
      LaneMode::Verify => 3,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LaneState {
  Pending,
  DowngradingArtifact,
  DowngradingTests,
  Testing,
  Passed,
  Failed,
  /// Never started; another lane failed under fail-fast
  Cancelled,
}

impl LaneState {
  pub fn is_terminal(self) -> bool {
    matches!(self, LaneState::Passed | LaneState::Failed | LaneState::Cancelled)
  }

  /// Present-participle description used in failure messages
  fn activity(self) -> &'static str {
    match self {
      LaneState::DowngradingArtifact => "downgrading artifact",
      LaneState::DowngradingTests => "downgrading tests",
      LaneState::Testing => "testing",
      _ => "idle",
    }
  }

  /// Cache key suffix for the downgrade stages
  fn cache_stage(self) -> &'static str {
    match self {
      LaneState::DowngradingTests => "tests",
      _ => "artifact",
    }
  }
}

impl fmt::Display for LaneState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      LaneState::Pending => "pending",
      LaneState::DowngradingArtifact => "downgrading artifact",
      LaneState::DowngradingTests => "downgrading tests",
      LaneState::Testing => "testing",
      LaneState::Passed => "passed",
      LaneState::Failed => "failed",
      LaneState::Cancelled => "cancelled",
    };
    write!(f, "{}", s)
  }
}

/// Final state of a lane
#[derive(Debug, Clone)]
pub struct LaneOutcome {
  pub target: BuildTarget,
  pub state: LaneState,
  pub failure: Option<LaneFailure>,
  /// The downgraded archive, when the artifact stage succeeded
  pub artifact: Option<PathBuf>,
  /// Stages skipped because their fingerprint matched
  pub cached: Vec<LaneState>,
  pub duration: Duration,
}

impl LaneOutcome {
  pub fn cancelled(target: BuildTarget) -> Self {
    Self {
      target,
      state: LaneState::Cancelled,
      failure: None,
      artifact: None,
      cached: Vec::new(),
      duration: Duration::ZERO,
    }
  }

  pub fn passed(&self) -> bool {
    self.state == LaneState::Passed
  }
}

/// A single target's lane
pub struct Lane<'a> {
  ctx: &'a BuildContext,
  target: &'a BuildTarget,
  mode: LaneMode,
  state: LaneState,
  cache: StageCache,
  cached: Vec<LaneState>,
  artifact: Option<PathBuf>,
  progress: Option<(&'a LaneProgress, &'a Bar)>,
}

impl<'a> Lane<'a> {
  pub fn new(ctx: &'a BuildContext, target: &'a BuildTarget, mode: LaneMode) -> Self {
    Self {
      ctx,
      target,
      mode,
      state: LaneState::Pending,
      cache: StageCache::new(ctx.cache_dir()),
      cached: Vec::new(),
      artifact: None,
      progress: None,
    }
  }

  pub fn with_progress(mut self, progress: &'a LaneProgress, bar: &'a Bar) -> Self {
    self.progress = Some((progress, bar));
    self
  }

  /// Run every stage for this lane's mode to a terminal state
  pub fn run(mut self) -> LaneOutcome {
    let start = Instant::now();
    let result = self.run_stages();

    let failure = match result {
      Ok(()) => {
        self.advance(LaneState::Passed);
        None
      }
      Err(failure) => {
        tracing::warn!(lane = %self.target.display_name, stage = %self.state, "lane failed: {}", failure.kind());
        self.advance(LaneState::Failed);
        Some(failure)
      }
    };

    if let Some((progress, bar)) = self.progress {
      progress.finish(bar, self.mode.stage_count());
    }

    LaneOutcome {
      target: self.target.clone(),
      state: self.state,
      failure,
      artifact: self.artifact,
      cached: self.cached,
      duration: start.elapsed(),
    }
  }

  fn run_stages(&mut self) -> Result<(), LaneFailure> {
    let ctx = self.ctx;
    let target = self.target;
    let lane_dir = ctx.lane_dir(target);
    fs::create_dir_all(&lane_dir).map_err(|e| LaneFailure::Io {
      detail: format!("cannot create {}: {}", lane_dir.display(), e),
    })?;

    let primary = ctx.primary_archive();
    require_input(&primary, "primary archive")?;
    let artifact = ctx.downgraded_archive(target);
    let dependencies = classpath::test_entries(ctx, &[]);

    self.advance(LaneState::DowngradingArtifact);
    self.downgrade(&primary, &artifact, &target.runtime_version, &dependencies)?;
    self.artifact = Some(artifact.clone());
    self.stage_done();

    if self.mode == LaneMode::Assemble {
      return Ok(());
    }

    let test_classes = ctx.resolve_path(&ctx.config.build.test_classes);
    require_input(&test_classes, "compiled tests")?;
    let downgraded_tests = ctx.downgraded_test_classes(target);
    let with_primary = classpath::test_entries(ctx, std::slice::from_ref(&artifact));

    self.advance(LaneState::DowngradingTests);
    self.downgrade(&test_classes, &downgraded_tests, &target.test_runtime_version, &with_primary)?;
    self.stage_done();

    self.advance(LaneState::Testing);
    self.test(&artifact, &downgraded_tests)?;
    self.stage_done();

    Ok(())
  }

  fn advance(&mut self, next: LaneState) {
    tracing::info!(lane = %self.target.display_name, from = %self.state, to = %next, "lane transition");
    self.state = next;
  }

  fn stage_done(&self) {
    if let Some((progress, bar)) = self.progress {
      progress.stage_done(bar);
    }
  }

  fn downgrade(
    &mut self,
    input: &Path,
    output: &Path,
    runtime: &RuntimeVersion,
    classpath_entries: &[PathBuf],
  ) -> Result<(), LaneFailure> {
    let ctx = self.ctx;
    let template = ctx.config.tools.downgrade_template();
    if template.is_empty() {
      return Err(LaneFailure::Tool {
        detail: "tools.downgrade is not configured".to_string(),
      });
    }

    let classpath = classpath::join(classpath_entries).map_err(io_failure)?;
    let stage = self.state.cache_stage();
    let key = format!("{}-{}", self.target.slug(), stage);
    let fingerprint = FingerprintBuilder::new(stage)
      .text(&template.raw())
      .text(&runtime.to_string())
      .text(&ctx.version())
      .classpath(classpath_entries)
      .map_err(io_failure)?
      .contents(input)
      .map_err(io_failure)?
      .finish();

    if self.cache.is_fresh(&key, &fingerprint, output) {
      tracing::info!(lane = %self.target.display_name, stage, "inputs unchanged, reusing previous output");
      self.cached.push(self.state);
      return Ok(());
    }

    self.cache.invalidate(&key);
    remove_output(output)?;

    let mut vars = self.base_vars();
    vars.insert("input", input.to_string_lossy().into_owned());
    vars.insert("output", output.to_string_lossy().into_owned());
    vars.insert("class_version", runtime.class_version().to_string());
    vars.insert("runtime", runtime.to_string());
    vars.insert("classpath", classpath);
    vars.insert("java", ctx.java_for(&ctx.matrix.current.runtime_version));

    let activity = self.state.activity();
    self.invoke(&template, &vars, |e| match e {
      ToolError::Failed { .. } => LaneFailure::UnsupportedConstruct {
        stage: activity.to_string(),
        detail: e.diagnostics(),
      },
      other => LaneFailure::Tool {
        detail: other.to_string(),
      },
    })?;

    if !output.exists() {
      return Err(LaneFailure::Tool {
        detail: format!("downgrade tool produced no output at {}", output.display()),
      });
    }

    self.cache.record(&key, &fingerprint).map_err(io_failure)
  }

  fn test(&self, artifact: &Path, downgraded_tests: &Path) -> Result<(), LaneFailure> {
    let ctx = self.ctx;
    let template = ctx.config.tools.test_template();
    if template.is_empty() {
      return Err(LaneFailure::Tool {
        detail: "tools.test is not configured".to_string(),
      });
    }

    let runtime = &self.target.test_runtime_version;
    let classpath = classpath::for_tests(ctx, &[artifact.to_path_buf(), downgraded_tests.to_path_buf()])
      .map_err(io_failure)?;

    let mut vars = self.base_vars();
    vars.insert("java", ctx.java_for(runtime));
    vars.insert("runtime", runtime.to_string());
    vars.insert("class_version", runtime.class_version().to_string());
    vars.insert("classpath", classpath);
    vars.insert("test_classes", downgraded_tests.to_string_lossy().into_owned());

    self.invoke(&template, &vars, |e| match e {
      ToolError::Failed { .. } => LaneFailure::TestFailure {
        detail: e.diagnostics(),
      },
      other => LaneFailure::Tool {
        detail: other.to_string(),
      },
    })
  }

  fn base_vars(&self) -> HashMap<&'static str, String> {
    HashMap::from([
      ("name", self.ctx.project_name().to_string()),
      ("version", self.ctx.version()),
      ("target", self.target.display_name.clone()),
    ])
  }

  fn invoke(
    &self,
    template: &CommandTemplate,
    vars: &HashMap<&str, String>,
    classify: impl FnOnce(ToolError) -> LaneFailure,
  ) -> Result<(), LaneFailure> {
    let (program, args) = template.render(vars).ok_or_else(|| LaneFailure::Tool {
      detail: "empty command template".to_string(),
    })?;
    tracing::debug!(lane = %self.target.display_name, %program, ?args, "running tool");

    run_external_tool(&program, &args, &self.ctx.tool_options())
      .map(|output| {
        tracing::debug!(lane = %self.target.display_name, %program, elapsed = ?output.duration, "tool finished");
      })
      .map_err(classify)
  }
}

fn require_input(path: &Path, what: &str) -> Result<(), LaneFailure> {
  if path.exists() {
    Ok(())
  } else {
    Err(LaneFailure::Io {
      detail: format!("{} not found at {} (run `release-rail build-current` first)", what, path.display()),
    })
  }
}

fn remove_output(output: &Path) -> Result<(), LaneFailure> {
  let result = if output.is_dir() {
    fs::remove_dir_all(output)
  } else if output.exists() {
    fs::remove_file(output)
  } else {
    Ok(())
  };
  result.map_err(|e| LaneFailure::Io {
    detail: format!("cannot clear {}: {}", output.display(), e),
  })
}

fn io_failure(e: crate::core::error::RailError) -> LaneFailure {
  LaneFailure::Io { detail: e.to_string() }
}

#[cfg(all(test, unix))]
mod tests {
  use super::*;
  use crate::core::context::test_support::context_from_toml;
  use tempfile::TempDir;

  /// Downgrader: copies input to output, refuses class version 52 when asked
  const COPY: &str = r#"downgrade = ["sh", "-c", "if [ \"$2\" = \"$3\" ]; then echo 'unsupported: java/lang/Record' >&2; exit 1; fi; cp -R \"$0\" \"$1\"", "{input}", "{output}", "{class_version}", "REJECT"]"#;

  fn project(dir: &Path, downgrade: &str, test: &str) -> BuildContext {
    fs::create_dir_all(dir.join("build/libs")).unwrap();
    fs::write(dir.join("build/libs/zson-1.4.0-dev.jar"), b"PK-primary").unwrap();
    fs::create_dir_all(dir.join("build/classes/java/test/pkg")).unwrap();
    fs::write(dir.join("build/classes/java/test/pkg/ZsonTest.class"), b"cafe").unwrap();

    let toml = format!(
      r#"
[project]
name = "zson"
minor_version = "1.4"

[[targets]]
version = "21"

[[targets]]
version = "17"

[[targets]]
version = "8"

[tools]
{}
{}
"#,
      downgrade, test
    );
    context_from_toml(dir, &toml)
  }

  fn copy_tool(reject: Option<u32>) -> String {
    let reject = reject.map(|r| r.to_string()).unwrap_or_else(|| "none".to_string());
    COPY.replace("REJECT", &reject)
  }

  const PASSING_TESTS: &str = r#"test = ["sh", "-c", "test -f \"$0\"", "{test_classes}/pkg/ZsonTest.class"]"#;

  #[test]
  fn test_verify_lane_passes_through_every_stage() {
    let dir = TempDir::new().unwrap();
    let ctx = project(dir.path(), &copy_tool(None), PASSING_TESTS);
    let target = ctx.matrix.find("8").unwrap();

    let outcome = Lane::new(&ctx, target, LaneMode::Verify).run();
    assert_eq!(outcome.state, LaneState::Passed, "{:?}", outcome.failure);
    let artifact = outcome.artifact.unwrap();
    assert_eq!(artifact, ctx.downgraded_archive(target));
    assert_eq!(fs::read(&artifact).unwrap(), b"PK-primary");
    assert!(ctx.downgraded_test_classes(target).join("pkg/ZsonTest.class").is_file());
  }

  #[test]
  fn test_assemble_lane_only_downgrades_artifact() {
    let dir = TempDir::new().unwrap();
    let ctx = project(dir.path(), &copy_tool(None), r#"test = ["false"]"#);
    let target = ctx.matrix.find("17").unwrap();

    let outcome = Lane::new(&ctx, target, LaneMode::Assemble).run();
    assert!(outcome.passed());
    assert!(!ctx.downgraded_test_classes(target).exists());
  }

  #[test]
  fn test_unsupported_construct_fails_only_the_artifact_stage() {
    let dir = TempDir::new().unwrap();
    let ctx = project(dir.path(), &copy_tool(Some(52)), PASSING_TESTS);
    let target = ctx.matrix.find("8").unwrap();

    let outcome = Lane::new(&ctx, target, LaneMode::Verify).run();
    assert_eq!(outcome.state, LaneState::Failed);
    match outcome.failure.unwrap() {
      LaneFailure::UnsupportedConstruct { stage, detail } => {
        assert_eq!(stage, "downgrading artifact");
        assert!(detail.contains("java/lang/Record"));
      }
      other => panic!("unexpected failure: {other}"),
    }
    assert!(outcome.artifact.is_none());
  }

  #[test]
  fn test_failing_tests_are_test_failures() {
    let dir = TempDir::new().unwrap();
    let failing = r#"test = ["sh", "-c", "echo '1 test failed' >&2; exit 1"]"#;
    let ctx = project(dir.path(), &copy_tool(None), failing);
    let target = ctx.matrix.find("17").unwrap();

    let outcome = Lane::new(&ctx, target, LaneMode::Verify).run();
    assert_eq!(outcome.state, LaneState::Failed);
    assert_eq!(
      outcome.failure,
      Some(LaneFailure::TestFailure {
        detail: "1 test failed\n".to_string()
      })
    );
    // the artifact stage had already succeeded
    assert!(outcome.artifact.is_some());
  }

  #[test]
  fn test_missing_primary_archive() {
    let dir = TempDir::new().unwrap();
    let ctx = project(dir.path(), &copy_tool(None), PASSING_TESTS);
    fs::remove_file(ctx.primary_archive()).unwrap();
    let target = ctx.matrix.find("8").unwrap();

    let outcome = Lane::new(&ctx, target, LaneMode::Assemble).run();
    assert!(matches!(outcome.failure, Some(LaneFailure::Io { .. })));
  }

  #[test]
  fn test_unchanged_inputs_hit_the_cache() {
    let dir = TempDir::new().unwrap();
    let ctx = project(dir.path(), &copy_tool(None), PASSING_TESTS);
    let target = ctx.matrix.find("8").unwrap();

    let first = Lane::new(&ctx, target, LaneMode::Verify).run();
    assert!(first.passed());
    assert!(first.cached.is_empty());

    let second = Lane::new(&ctx, target, LaneMode::Verify).run();
    assert!(second.passed());
    assert_eq!(
      second.cached,
      vec![LaneState::DowngradingArtifact, LaneState::DowngradingTests]
    );

    // the downgraded tests are compiled against the primary, so both re-run
    fs::write(ctx.primary_archive(), b"PK-changed").unwrap();
    let third = Lane::new(&ctx, target, LaneMode::Verify).run();
    assert!(third.passed());
    assert!(third.cached.is_empty());
    assert_eq!(fs::read(ctx.downgraded_archive(target)).unwrap(), b"PK-changed");
  }

  #[test]
  fn test_missing_downgrade_tool_is_tool_failure() {
    let dir = TempDir::new().unwrap();
    let ctx = project(
      dir.path(),
      r#"downgrade = ["jvmdg-not-installed-anywhere", "{input}", "{output}"]"#,
      PASSING_TESTS,
    );
    let target = ctx.matrix.find("8").unwrap();

    let outcome = Lane::new(&ctx, target, LaneMode::Assemble).run();
    assert!(matches!(outcome.failure, Some(LaneFailure::Tool { .. })));
  }
}
