//! Publish command
//!
//! Nothing is published unless the primary build, the current tests and
//! every downgrade lane pass in this invocation. Destinations are resolved
//! before any of that runs.

use crate::commands::assemble::{downgraded_archives, verify_all};
use crate::commands::postprocess::postprocess_archives;
use crate::core::context::BuildContext;
use crate::core::error::RailResult;
use crate::pipeline::build;
use crate::pipeline::orchestrator::FailurePolicy;
use crate::release::publish::{self, Destinations, PublishOptions, Release};
use std::path::PathBuf;

pub fn run_publish(ctx: &BuildContext, dry_run: bool, skip_maven: bool, skip_github: bool) -> RailResult<()> {
  let options = PublishOptions {
    github: !skip_github,
    maven: !skip_maven,
  };
  let release = Release::from_context(ctx);

  if dry_run {
    publish::print_plan(ctx, &release, options);
    return Ok(());
  }

  let destinations = Destinations::resolve(ctx, options)?;

  println!("🔨 Building {} {}", ctx.project_name(), ctx.version());
  let artifacts = build::build_current(ctx)?;
  postprocess_archives(ctx, artifacts.iter().map(|a| a.path.as_path()))?;

  // publishing needs every lane's verdict, so no fail-fast here
  let outcomes = verify_all(ctx, FailurePolicy::Aggregate)?;
  postprocess_archives(ctx, downgraded_archives(&outcomes).iter().map(PathBuf::as_path))?;

  println!();
  publish::publish(&release, &destinations, ctx.config.release.on_conflict)?;
  println!();
  println!("✅ Published {} {}", ctx.project_name(), release.title);
  Ok(())
}
