//! Current-target build and test commands

use crate::commands::postprocess::postprocess_archives;
use crate::core::context::BuildContext;
use crate::core::error::RailResult;
use crate::pipeline::build;

/// Run the build command and recompress its archives
pub fn run_build_current(ctx: &BuildContext) -> RailResult<()> {
  println!("🔨 Building {} {}", ctx.project_name(), ctx.version());
  let artifacts = build::build_current(ctx)?;
  for artifact in &artifacts {
    let size = artifact.size().unwrap_or_default();
    println!("   {:<8} {} ({} bytes)", artifact.kind.label(), artifact.path.display(), size);
  }

  postprocess_archives(ctx, artifacts.iter().map(|a| a.path.as_path()))?;
  println!("✅ Build complete");
  Ok(())
}

/// Run the test suite on the current runtime
pub fn run_test_current(ctx: &BuildContext) -> RailResult<()> {
  println!("🧪 Testing on Java {}", ctx.matrix.current.test_runtime_version);
  build::test_current(ctx)?;
  println!("✅ Tests passed on Java {}", ctx.matrix.current.test_runtime_version);
  Ok(())
}
