//! Building and testing the current target
//!
//! The build command is opaque: it is expected to leave the primary, sources
//! and docs archives plus the compiled tests where `[build]` says they go.

use crate::core::context::BuildContext;
use crate::core::error::{ConfigError, LaneFailure, LaneReport, RailError, RailResult, ResultExt};
use crate::core::tool::{CommandTemplate, ToolError, run_external_tool};
use crate::pipeline::artifact::{Artifact, ArtifactKind};
use crate::pipeline::classpath;
use std::collections::HashMap;

/// Run the build command and return the archives it produced
pub fn build_current(ctx: &BuildContext) -> RailResult<Vec<Artifact>> {
  let template = CommandTemplate::new(ctx.require_build_command()?.to_vec());
  let vars = HashMap::from([
    ("name", ctx.project_name().to_string()),
    ("version", ctx.version()),
    ("output_dir", ctx.output_dir().to_string_lossy().into_owned()),
  ]);
  let (program, args) = template.render(&vars).ok_or_else(|| {
    RailError::Config(ConfigError::MissingField {
      field: "build.command".to_string(),
    })
  })?;

  tracing::info!(%program, ?args, "running build command");
  let output = run_external_tool(&program, &args, &ctx.tool_options()).context("Build command failed")?;
  tracing::info!(elapsed = ?output.duration, "build command finished");
  tracing::debug!(stdout = %output.stdout.trim_end(), stderr = %output.stderr.trim_end(), "build command output");

  let artifacts = vec![
    Artifact::new(ArtifactKind::Primary, ctx.primary_archive()),
    Artifact::new(ArtifactKind::Sources, ctx.sources_archive()),
    Artifact::new(ArtifactKind::Docs, ctx.docs_archive()),
  ];
  for artifact in &artifacts {
    if !artifact.exists() {
      return Err(RailError::with_help(
        format!(
          "Build finished but the {} archive is missing: {}",
          artifact.kind.label(),
          artifact.path.display()
        ),
        "Check the archive paths in [build] against what the build command produces.",
      ));
    }
  }

  Ok(artifacts)
}

/// Run the test suite on the current runtime against the original build output
pub fn test_current(ctx: &BuildContext) -> RailResult<()> {
  let template = ctx.config.tools.test_template();
  if template.is_empty() {
    return Err(RailError::Config(ConfigError::MissingField {
      field: "tools.test".to_string(),
    }));
  }

  let current = &ctx.matrix.current;
  let primary = ctx.primary_archive();
  let test_classes = ctx.resolve_path(&ctx.config.build.test_classes);
  for (path, what) in [(&primary, "primary archive"), (&test_classes, "compiled tests")] {
    if !path.exists() {
      return Err(RailError::with_help(
        format!("The {} is missing: {}", what, path.display()),
        "Run `release-rail build-current` first.",
      ));
    }
  }

  let runtime = &current.test_runtime_version;
  let vars = HashMap::from([
    ("name", ctx.project_name().to_string()),
    ("version", ctx.version()),
    ("target", current.display_name.clone()),
    ("java", ctx.java_for(runtime)),
    ("runtime", runtime.to_string()),
    ("class_version", runtime.class_version().to_string()),
    ("classpath", classpath::for_tests(ctx, &[primary, test_classes.clone()])?),
    ("test_classes", test_classes.to_string_lossy().into_owned()),
  ]);
  let (program, args) = template.render(&vars).ok_or_else(|| {
    RailError::Config(ConfigError::MissingField {
      field: "tools.test".to_string(),
    })
  })?;

  tracing::info!(%program, runtime = %runtime, "running current tests");
  match run_external_tool(&program, &args, &ctx.tool_options()) {
    Ok(_) => Ok(()),
    Err(e @ ToolError::Failed { .. }) => Err(RailError::Lanes(LaneReport {
      failures: vec![(
        current.display_name.clone(),
        LaneFailure::TestFailure {
          detail: e.diagnostics(),
        },
      )],
      cancelled: Vec::new(),
    })),
    Err(e) => Err(e.into()),
  }
}
