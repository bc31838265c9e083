//! Archive recompression
//!
//! Finished archives are recompressed in place with `advzip`. Effort scales
//! with archive size and with whether this is a release build. The tool is
//! optional: when it is not installed the step is skipped with a notice.

use crate::core::context::BuildContext;
use crate::core::error::{RailError, RailResult};
use crate::core::tool::{ToolError, ToolOptions, run_external_tool};
use crate::pipeline::artifact::file_size;
use std::path::{Path, PathBuf};

/// Archives smaller than this get the higher iteration count
const SMALL_ARCHIVE_BYTES: u64 = 20_000;

/// Recompression iterations for an archive.
///
/// | size < 20000 | release build | iterations |
/// |---|---|---|
/// | yes | yes | 1000 |
/// | yes | no  | 100  |
/// | no  | yes | 100  |
/// | no  | no  | 10   |
pub fn iterations_for(size: u64, is_release_build: bool) -> u32 {
  match (size < SMALL_ARCHIVE_BYTES, is_release_build) {
    (true, true) => 1000,
    (true, false) | (false, true) => 100,
    (false, false) => 10,
  }
}

/// What happened to one archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recompression {
  Recompressed { iterations: u32, before: u64, after: u64 },
  SkippedBenchmark,
  SkippedToolMissing,
  Disabled,
}

/// Runs the recompressor over finished archives
#[derive(Debug, Clone)]
pub struct Recompressor {
  tool: String,
  enabled: bool,
  is_release_build: bool,
  benchmark_dir: PathBuf,
  options: ToolOptions,
}

impl Recompressor {
  pub fn from_context(ctx: &BuildContext) -> Self {
    Self {
      tool: ctx.config.tools.recompressor.clone(),
      enabled: ctx.config.tools.postprocess,
      is_release_build: ctx.resolved.is_release_build,
      benchmark_dir: ctx.resolve_path(&ctx.config.build.benchmark_dir),
      options: ctx.tool_options(),
    }
  }

  /// Whether the recompressor executable is on PATH
  pub fn is_installed(&self) -> bool {
    which::which(&self.tool).is_ok()
  }

  /// Benchmark archives are exempt; they are never shipped
  pub fn is_exempt(&self, archive: &Path) -> bool {
    if archive.starts_with(&self.benchmark_dir) {
      return true;
    }
    match (archive.canonicalize(), self.benchmark_dir.canonicalize()) {
      (Ok(archive), Ok(dir)) => archive.starts_with(dir),
      _ => false,
    }
  }

  /// Recompress one archive in place
  pub fn process(&self, archive: &Path) -> RailResult<Recompression> {
    if !self.enabled {
      return Ok(Recompression::Disabled);
    }
    if self.is_exempt(archive) {
      tracing::debug!(archive = %archive.display(), "benchmark archive, not recompressing");
      return Ok(Recompression::SkippedBenchmark);
    }
    if !self.is_installed() {
      tracing::debug!(tool = %self.tool, "recompressor not on PATH");
      return Ok(Recompression::SkippedToolMissing);
    }

    let before = file_size(archive).ok_or_else(|| {
      RailError::with_help(
        format!("Archive not found: {}", archive.display()),
        "Run `release-rail build-current` first.",
      )
    })?;
    let iterations = iterations_for(before, self.is_release_build);

    let args = vec![
      "-z".to_string(),
      "-4".to_string(),
      format!("--iter={}", iterations),
      archive.to_string_lossy().into_owned(),
    ];
    tracing::info!(archive = %archive.display(), iterations, "recompressing");

    match run_external_tool(&self.tool, &args, &self.options) {
      Ok(_) => {}
      Err(ToolError::Failed { stderr, .. }) => {
        return Err(RailError::RecompressionFailed {
          archive: archive.to_path_buf(),
          stderr,
        });
      }
      Err(ToolError::NotFound { .. }) => return Ok(Recompression::SkippedToolMissing),
      Err(e) => return Err(e.into()),
    }

    let after = file_size(archive).unwrap_or(before);
    Ok(Recompression::Recompressed {
      iterations,
      before,
      after,
    })
  }

  /// One-line summary of an outcome
  pub fn describe(&self, archive: &Path, outcome: &Recompression) -> String {
    let name = archive.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    match outcome {
      Recompression::Recompressed {
        iterations,
        before,
        after,
      } => format!("{}: {} -> {} bytes ({} iterations)", name, before, after, iterations),
      Recompression::SkippedBenchmark => format!("{}: benchmark archive, not recompressed", name),
      Recompression::SkippedToolMissing => format!("{}: {} not installed, skipping recompression", name, self.tool),
      Recompression::Disabled => format!("{}: recompression disabled", name),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::core::tool::DEFAULT_TIMEOUT;
  use std::fs;
  use tempfile::TempDir;

  fn recompressor(tool: &str, benchmark_dir: PathBuf) -> Recompressor {
    Recompressor {
      tool: tool.to_string(),
      enabled: true,
      is_release_build: false,
      benchmark_dir,
      options: ToolOptions::new(DEFAULT_TIMEOUT),
    }
  }

  #[test]
  fn test_iteration_table() {
    assert_eq!(iterations_for(19_999, true), 1000);
    assert_eq!(iterations_for(19_999, false), 100);
    assert_eq!(iterations_for(20_000, true), 100);
    assert_eq!(iterations_for(20_000, false), 10);
    assert_eq!(iterations_for(0, false), 100);
  }

  #[test]
  fn test_missing_tool_is_skipped() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("zson.jar");
    fs::write(&archive, b"PK").unwrap();

    let r = recompressor("advzip-definitely-not-installed", dir.path().join("jmh"));
    assert_eq!(r.process(&archive).unwrap(), Recompression::SkippedToolMissing);
    assert_eq!(fs::read(&archive).unwrap(), b"PK");
  }

  #[test]
  fn test_benchmark_archives_are_exempt() {
    let dir = TempDir::new().unwrap();
    let bench = dir.path().join("build/jmhlibs");
    fs::create_dir_all(&bench).unwrap();
    let archive = bench.join("zson-jmh.jar");
    fs::write(&archive, b"PK").unwrap();

    let r = recompressor("false", bench);
    assert_eq!(r.process(&archive).unwrap(), Recompression::SkippedBenchmark);
  }

  #[cfg(unix)]
  #[test]
  fn test_non_zero_exit_is_fatal() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("zson.jar");
    fs::write(&archive, b"PK").unwrap();

    // `false` ignores its arguments and exits 1
    let r = recompressor("false", dir.path().join("jmh"));
    match r.process(&archive) {
      Err(RailError::RecompressionFailed { archive: failed, .. }) => assert_eq!(failed, archive),
      other => panic!("expected RecompressionFailed, got {:?}", other),
    }
  }

  #[cfg(unix)]
  #[test]
  fn test_successful_run_reports_iterations() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("zson.jar");
    fs::write(&archive, b"PK").unwrap();

    let r = recompressor("true", dir.path().join("jmh"));
    match r.process(&archive).unwrap() {
      Recompression::Recompressed { iterations, before, .. } => {
        assert_eq!(iterations, 100);
        assert_eq!(before, 2);
      }
      other => panic!("unexpected outcome: {:?}", other),
    }
  }
}
