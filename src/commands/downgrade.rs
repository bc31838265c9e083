//! Single-lane commands

use crate::commands::postprocess::postprocess_archives;
use crate::core::context::BuildContext;
use crate::core::error::{LaneReport, RailError, RailResult};
use crate::pipeline::lane::{Lane, LaneMode, LaneOutcome};

/// Downgrade the primary archive for one target
pub fn run_downgrade(ctx: &BuildContext, target: &str) -> RailResult<()> {
  let target = ctx.matrix.find(target)?;
  println!("⬇️  Downgrading {} to Java {}", ctx.project_name(), target.display_name);

  let outcome = finish(Lane::new(ctx, target, LaneMode::Assemble).run())?;
  if let Some(artifact) = &outcome.artifact {
    println!("   {}", artifact.display());
    postprocess_archives(ctx, [artifact.as_path()])?;
  }
  println!("✅ Downgraded to Java {}", target.display_name);
  Ok(())
}

/// Run one target's full lane: downgrade, downgrade tests, test
pub fn run_test_downgraded(ctx: &BuildContext, target: &str) -> RailResult<()> {
  let target = ctx.matrix.find(target)?;
  println!(
    "🧪 Testing {} downgraded to Java {} (tests on Java {})",
    ctx.project_name(),
    target.display_name,
    target.test_runtime_version
  );

  finish(Lane::new(ctx, target, LaneMode::Verify).run())?;
  println!("✅ Java {} lane passed", target.display_name);
  Ok(())
}

fn finish(outcome: LaneOutcome) -> RailResult<LaneOutcome> {
  if !outcome.cached.is_empty() {
    let stages: Vec<String> = outcome.cached.iter().map(|s| s.to_string()).collect();
    println!("   ♻️  Reused cached output for: {}", stages.join(", "));
  }

  match &outcome.failure {
    None => Ok(outcome),
    Some(failure) => Err(RailError::Lanes(LaneReport {
      failures: vec![(outcome.target.display_name.clone(), failure.clone())],
      cancelled: Vec::new(),
    })),
  }
}
