//! Version and target inspection

use crate::core::context::BuildContext;
use crate::core::error::RailResult;
use crate::pipeline::targets::BuildTarget;
use crate::release::ReleaseChannel;
use serde::Serialize;

#[derive(Serialize)]
struct VersionReport<'a> {
  version: String,
  tag: &'a str,
  minor: &'a str,
  patch: u64,
  channel: ReleaseChannel,
  prerelease: bool,
  release_build: bool,
  tags_considered: usize,
  commit: &'a str,
  branch: &'a str,
}

/// Print the resolved version
pub fn run_resolve_version(ctx: &BuildContext, json: bool) -> RailResult<()> {
  let resolved = &ctx.resolved;
  let report = VersionReport {
    version: ctx.version(),
    tag: &resolved.tag_name,
    minor: &resolved.version.minor,
    patch: resolved.version.patch,
    channel: resolved.channel(),
    prerelease: resolved.channel().is_prerelease(),
    release_build: resolved.is_release_build,
    tags_considered: ctx.history.len(),
    commit: &ctx.head.commit,
    branch: &ctx.head.branch,
  };

  if json {
    println!("{}", serde_json::to_string_pretty(&report)?);
    return Ok(());
  }

  println!("📦 {} {}", ctx.project_name(), report.version);
  println!("   Tag:           {}", report.tag);
  println!("   Channel:       {}", report.channel);
  println!("   Release build: {}", if report.release_build { "yes" } else { "no" });
  println!("   HEAD:          {} ({})", short_commit(report.commit), report.branch);
  match ctx.history.most_recent() {
    Some(tag) => println!("   Last tag:      {} ({} candidates)", tag.name, report.tags_considered),
    None => println!("   Last tag:      none (first release)"),
  }
  Ok(())
}

fn short_commit(commit: &str) -> &str {
  commit.get(..12).unwrap_or(commit)
}

#[derive(Serialize)]
struct TargetReport<'a> {
  current: TargetEntry<'a>,
  downgrades: Vec<TargetEntry<'a>>,
}

#[derive(Serialize)]
struct TargetEntry<'a> {
  name: &'a str,
  runtime: u32,
  test_runtime: u32,
  class_version: u32,
  classifier: String,
}

impl<'a> TargetEntry<'a> {
  fn new(target: &'a BuildTarget) -> Self {
    Self {
      name: &target.display_name,
      runtime: target.runtime_version.feature(),
      test_runtime: target.test_runtime_version.feature(),
      class_version: target.runtime_version.class_version(),
      classifier: target.classifier(),
    }
  }
}

/// Print the current target and the downgrade matrix
pub fn run_targets(ctx: &BuildContext, json: bool) -> RailResult<()> {
  let matrix = &ctx.matrix;

  if json {
    let report = TargetReport {
      current: TargetEntry::new(&matrix.current),
      downgrades: matrix.downgrades.iter().map(TargetEntry::new).collect(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    return Ok(());
  }

  println!(
    "🎯 Current: Java {} (class version {})",
    matrix.current.display_name,
    matrix.current.runtime_version.class_version()
  );
  if matrix.downgrades.is_empty() {
    println!("   No downgrade targets");
    return Ok(());
  }

  println!("   Downgrades:");
  for target in &matrix.downgrades {
    println!(
      "     ⬇  Java {:<6} tests on {:<4} -> {}",
      target.display_name,
      target.test_runtime_version,
      ctx.downgraded_archive(target).display()
    );
  }
  Ok(())
}
