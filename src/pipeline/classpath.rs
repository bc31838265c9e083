//! Test classpath composition for downgraded lanes
//!
//! A downgraded test run must see the downgraded bytecode, never the original
//! build output. The runtime classpath reported by the build still contains
//! the main and test class directories; those are swapped for the lane's
//! downgraded archive and test classes.

use crate::core::context::BuildContext;
use crate::core::error::{RailError, RailResult};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Compose a classpath with the downgraded outputs first.
///
/// Result = `downgraded` ∪ (`runtime` − `exclude`), order-preserving and
/// without duplicates.
pub fn compose(downgraded: &[PathBuf], runtime: &[PathBuf], exclude: &[PathBuf]) -> Vec<PathBuf> {
  let excluded: HashSet<PathBuf> = exclude.iter().map(|p| normalize(p)).collect();
  let mut seen = HashSet::new();

  downgraded
    .iter()
    .chain(runtime.iter().filter(|p| !excluded.contains(&normalize(p))))
    .filter(|p| seen.insert(normalize(p)))
    .cloned()
    .collect()
}

/// Test classpath entries: `leading` plus the build's runtime dependencies,
/// with the original class directories removed
pub fn test_entries(ctx: &BuildContext, leading: &[PathBuf]) -> Vec<PathBuf> {
  let build = &ctx.config.build;
  let runtime: Vec<PathBuf> = build.test_runtime_classpath.iter().map(|p| ctx.resolve_path(p)).collect();
  let exclude = [ctx.resolve_path(&build.main_classes), ctx.resolve_path(&build.test_classes)];
  compose(leading, &runtime, &exclude)
}

/// [`test_entries`], joined
pub fn for_tests(ctx: &BuildContext, leading: &[PathBuf]) -> RailResult<String> {
  join(&test_entries(ctx, leading))
}

/// Join entries with the platform separator
pub fn join(entries: &[PathBuf]) -> RailResult<String> {
  let joined = std::env::join_paths(entries)
    .map_err(|e| RailError::message(format!("Classpath entry cannot be joined: {}", e)))?;
  Ok(joined.to_string_lossy().into_owned())
}

/// Lexical normalization; trailing separators and `.` components don't count
fn normalize(path: &Path) -> PathBuf {
  path.components().collect()
}
