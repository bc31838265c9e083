//! Parallel lane scheduling
//!
//! Lanes run on a rayon pool, one task per target. Stages inside a lane stay
//! sequential. Under the aggregate policy every lane runs to completion; under
//! fail-fast, lanes that have not started yet are cancelled once any lane
//! fails. Either way the report names every failed lane.

use crate::core::context::BuildContext;
use crate::core::error::{LaneReport, RailError, RailResult};
use crate::pipeline::lane::{Lane, LaneMode, LaneOutcome, LaneState};
use crate::pipeline::targets::BuildTarget;
use crate::ui::LaneProgress;
use rayon::prelude::*;
use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
  /// Run every lane, report all failures at the end
  #[default]
  Aggregate,
  /// Cancel lanes that have not started once one fails
  FailFast,
}

impl FailurePolicy {
  /// CLI flag wins; otherwise `tools.fail_fast`
  pub fn resolve(cli_fail_fast: bool, ctx: &BuildContext) -> Self {
    if cli_fail_fast || ctx.config.tools.fail_fast {
      FailurePolicy::FailFast
    } else {
      FailurePolicy::Aggregate
    }
  }
}

/// Outcomes of one orchestrator run, in target order
#[derive(Debug, Clone)]
pub struct LaneRun {
  pub outcomes: Vec<LaneOutcome>,
}

impl LaneRun {
  pub fn all_passed(&self) -> bool {
    self.outcomes.iter().all(LaneOutcome::passed)
  }

  pub fn report(&self) -> LaneReport {
    let mut report = LaneReport::default();
    for outcome in &self.outcomes {
      match (&outcome.state, &outcome.failure) {
        (LaneState::Failed, Some(failure)) => report
          .failures
          .push((outcome.target.display_name.clone(), failure.clone())),
        (LaneState::Cancelled, _) => report.cancelled.push(outcome.target.display_name.clone()),
        _ => {}
      }
    }
    report
  }

  /// Print one line per lane
  pub fn print_summary(&self) {
    for outcome in &self.outcomes {
      let name = format!("Java {}", outcome.target.display_name);
      match outcome.state {
        LaneState::Passed => {
          let cached = if outcome.cached.is_empty() {
            String::new()
          } else {
            let stages: Vec<String> = outcome.cached.iter().map(|s| s.to_string()).collect();
            format!(" (cached: {})", stages.join(", "))
          };
          println!("   ✅ {:<10} passed in {:.1}s{}", name, outcome.duration.as_secs_f64(), cached);
        }
        LaneState::Cancelled => println!("   ⏭️  {:<10} cancelled", name),
        _ => {
          let kind = outcome.failure.as_ref().map(|f| f.kind()).unwrap_or("Failed");
          println!("   ❌ {:<10} {}", name, kind);
        }
      }
    }
  }

  /// Ok when every lane passed, otherwise the aggregate report
  pub fn into_result(self) -> RailResult<Vec<LaneOutcome>> {
    if self.all_passed() {
      Ok(self.outcomes)
    } else {
      Err(RailError::Lanes(self.report()))
    }
  }
}

/// Run one lane per target
pub fn run_lanes(
  ctx: &BuildContext,
  targets: &[BuildTarget],
  mode: LaneMode,
  policy: FailurePolicy,
) -> RailResult<LaneRun> {
  let pool = rayon::ThreadPoolBuilder::new()
    .num_threads(ctx.config.tools.jobs)
    .build()
    .map_err(|e| RailError::message(format!("Failed to start lane workers: {}", e)))?;

  let progress = (targets.len() > 1 && std::io::stderr().is_terminal()).then(LaneProgress::new);
  let failed = AtomicBool::new(false);

  tracing::info!(lanes = targets.len(), workers = pool.current_num_threads(), ?policy, "starting lanes");

  let outcomes: Vec<LaneOutcome> = pool.install(|| {
    targets
      .par_iter()
      .map(|target| {
        if policy == FailurePolicy::FailFast && failed.load(Ordering::SeqCst) {
          tracing::info!(lane = %target.display_name, "cancelled after an earlier failure");
          return LaneOutcome::cancelled(target.clone());
        }

        let outcome = match &progress {
          Some(progress) => {
            let bar = progress.add_lane(mode.stage_count(), format!("Java {}", target.display_name));
            Lane::new(ctx, target, mode).with_progress(progress, &bar).run()
          }
          None => Lane::new(ctx, target, mode).run(),
        };

        if !outcome.passed() {
          failed.store(true, Ordering::SeqCst);
        }
        outcome
      })
      .collect()
  });

  debug_assert!(outcomes.iter().all(|o| o.state.is_terminal()));
  Ok(LaneRun { outcomes })
}
