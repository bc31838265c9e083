//! Whole-matrix commands

use crate::commands::postprocess::postprocess_archives;
use crate::core::context::BuildContext;
use crate::core::error::{LaneReport, RailError, RailResult};
use crate::pipeline::build;
use crate::pipeline::lane::{LaneMode, LaneOutcome};
use crate::pipeline::orchestrator::{FailurePolicy, LaneRun, run_lanes};
use std::path::PathBuf;

/// Build the current target, then downgrade to every older target
pub fn run_assemble(ctx: &BuildContext, fail_fast: bool) -> RailResult<()> {
  let policy = FailurePolicy::resolve(fail_fast, ctx);

  println!("🔨 Building {} {}", ctx.project_name(), ctx.version());
  let artifacts = build::build_current(ctx)?;
  postprocess_archives(ctx, artifacts.iter().map(|a| a.path.as_path()))?;

  let outcomes = downgrade_all(ctx, LaneMode::Assemble, policy)?;
  postprocess_archives(ctx, downgraded_archives(&outcomes).iter().map(PathBuf::as_path))?;

  println!("✅ Assembled {} archives", artifacts.len() + outcomes.len());
  Ok(())
}

/// Build, then test on the current runtime and on every downgraded target
pub fn run_check(ctx: &BuildContext, fail_fast: bool) -> RailResult<()> {
  let policy = FailurePolicy::resolve(fail_fast, ctx);

  println!("🔨 Building {} {}", ctx.project_name(), ctx.version());
  build::build_current(ctx)?;

  verify_all(ctx, policy)?;
  println!("✅ All targets passed");
  Ok(())
}

/// test-current plus every Verify lane; failures from both are reported together
pub(crate) fn verify_all(ctx: &BuildContext, policy: FailurePolicy) -> RailResult<Vec<LaneOutcome>> {
  println!("🧪 Testing on Java {}", ctx.matrix.current.test_runtime_version);
  let mut report = match build::test_current(ctx) {
    Ok(()) => {
      println!("   ✅ {:<10} passed", format!("Java {}", ctx.matrix.current.display_name));
      LaneReport::default()
    }
    Err(RailError::Lanes(report)) if policy == FailurePolicy::Aggregate => {
      println!("   ❌ {:<10} TestFailure", format!("Java {}", ctx.matrix.current.display_name));
      report
    }
    Err(e) => return Err(e),
  };

  let run = run_downgrade_lanes(ctx, LaneMode::Verify, policy)?;
  let lanes = run.report();
  report.failures.extend(lanes.failures);
  report.cancelled.extend(lanes.cancelled);

  if report.failures.is_empty() {
    Ok(run.outcomes)
  } else {
    Err(RailError::Lanes(report))
  }
}

fn run_downgrade_lanes(ctx: &BuildContext, mode: LaneMode, policy: FailurePolicy) -> RailResult<LaneRun> {
  let targets = &ctx.matrix.downgrades;
  if targets.is_empty() {
    println!("   No downgrade targets");
  } else {
    let names: Vec<&str> = targets.iter().map(|t| t.display_name.as_str()).collect();
    println!("⬇️  Running {} lane(s): Java {}", targets.len(), names.join(", "));
  }

  let run = run_lanes(ctx, targets, mode, policy)?;
  run.print_summary();
  Ok(run)
}

fn downgrade_all(ctx: &BuildContext, mode: LaneMode, policy: FailurePolicy) -> RailResult<Vec<LaneOutcome>> {
  run_downgrade_lanes(ctx, mode, policy)?.into_result()
}

pub(crate) fn downgraded_archives(outcomes: &[LaneOutcome]) -> Vec<PathBuf> {
  outcomes.iter().filter_map(|o| o.artifact.clone()).collect()
}
