//! Integration tests for building, downgrade lanes and post-processing

#![cfg(unix)]

use crate::helpers::*;
use anyhow::Result;

const NO_RECOMPRESSOR: &str = r#"recompressor = "rail-test-no-such-advzip""#;

fn configure(project: &TestProject, reject_class_version: Option<u32>, extra_tools: &str) -> Result<()> {
  project.write_config_with(&format!(
    "[build]\n{}\n\n[tools]\n{}\n{}\n{}\n{}\n",
    FAKE_BUILD,
    downgrader(reject_class_version),
    PASSING_TESTS,
    NO_RECOMPRESSOR,
    extra_tools
  ))
}

#[test]
fn test_assemble_produces_one_archive_per_target() -> Result<()> {
  let project = TestProject::new()?;
  configure(&project, None, "")?;

  let output = run_rail(&project.path, &["assemble"])?;
  let stdout = String::from_utf8_lossy(&output.stdout);

  assert!(project.file_exists("build/libs/zson-1.4.0-dev.jar"));
  assert!(project.file_exists("build/rail/downgrade/17/zson-1.4.0-dev-downgraded-17.jar"));
  assert!(project.file_exists("build/rail/downgrade/8/zson-1.4.0-dev-downgraded-8.jar"));
  assert!(stdout.contains("not installed, skipping recompression"), "stdout: {}", stdout);

  Ok(())
}

#[test]
fn test_check_reports_every_failing_lane_and_keeps_others_running() -> Result<()> {
  let project = TestProject::new()?;
  // Java 8 is class version 52
  configure(&project, Some(52), "")?;

  let output = run_rail_raw(&project.path, &["check"], &[])?;
  assert_eq!(output.status.code(), Some(3));

  let stderr = String::from_utf8_lossy(&output.stderr);
  assert!(stderr.contains("1 lane(s) failed"), "stderr: {}", stderr);
  assert!(stderr.contains("Java 8: UnsupportedConstruct"), "stderr: {}", stderr);

  // the Java 17 lane ran to completion despite the Java 8 failure
  assert!(project.file_exists("build/rail/downgrade/17/zson-1.4.0-dev-downgraded-17.jar"));
  assert!(project.file_exists("build/rail/downgrade/17/test-classes/pkg/ZsonTest.class"));
  assert!(!project.file_exists("build/rail/downgrade/8/zson-1.4.0-dev-downgraded-8.jar"));

  Ok(())
}

#[test]
fn test_check_fail_fast_with_one_worker_cancels_remaining_lanes() -> Result<()> {
  let project = TestProject::new()?;
  // Java 17 is class version 61 and runs first (highest target first)
  configure(&project, Some(61), "jobs = 1")?;

  let output = run_rail_raw(&project.path, &["check", "--fail-fast"], &[])?;
  assert_eq!(output.status.code(), Some(3));

  let stderr = String::from_utf8_lossy(&output.stderr);
  assert!(stderr.contains("Java 17: UnsupportedConstruct"), "stderr: {}", stderr);
  assert!(stderr.contains("cancelled: 8"), "stderr: {}", stderr);
  assert!(!project.file_exists("build/rail/downgrade/8"));

  Ok(())
}

#[test]
fn test_downgrade_single_target() -> Result<()> {
  let project = TestProject::new()?;
  configure(&project, None, "")?;
  run_rail(&project.path, &["build-current"])?;

  run_rail(&project.path, &["downgrade", "8"])?;
  assert!(project.file_exists("build/rail/downgrade/8/zson-1.4.0-dev-downgraded-8.jar"));
  assert!(!project.file_exists("build/rail/downgrade/17"));

  Ok(())
}

#[test]
fn test_second_downgrade_reuses_cached_output() -> Result<()> {
  let project = TestProject::new()?;
  configure(&project, None, "")?;
  run_rail(&project.path, &["build-current"])?;

  run_rail(&project.path, &["test-downgraded", "17"])?;
  let output = run_rail(&project.path, &["test-downgraded", "17"])?;
  let stdout = String::from_utf8_lossy(&output.stdout);
  assert!(stdout.contains("Reused cached output"), "stdout: {}", stdout);

  Ok(())
}

#[test]
fn test_unknown_target_is_a_user_error() -> Result<()> {
  let project = TestProject::new()?;
  configure(&project, None, "")?;

  let output = run_rail_raw(&project.path, &["downgrade", "6"], &[])?;
  assert_eq!(output.status.code(), Some(1));

  Ok(())
}

#[test]
fn test_failing_current_tests_exit_with_validation_code() -> Result<()> {
  let project = TestProject::new()?;
  project.write_config_with(&format!(
    "[build]\n{}\n\n[tools]\ntest = [\"sh\", \"-c\", \"exit 1\"]\n{}\n",
    FAKE_BUILD, NO_RECOMPRESSOR
  ))?;
  run_rail(&project.path, &["build-current"])?;

  let output = run_rail_raw(&project.path, &["test-current"], &[])?;
  assert_eq!(output.status.code(), Some(3));
  assert!(String::from_utf8_lossy(&output.stderr).contains("Java 21: TestFailure"));

  Ok(())
}

#[test]
fn test_postprocess_skips_when_recompressor_missing() -> Result<()> {
  let project = TestProject::new()?;
  configure(&project, None, "")?;
  run_rail(&project.path, &["build-current"])?;

  let output = run_rail(&project.path, &["postprocess", "build/libs/zson-1.4.0-dev.jar"])?;
  let stdout = String::from_utf8_lossy(&output.stdout);
  assert!(stdout.contains("zson-1.4.0-dev.jar: rail-test-no-such-advzip not installed"), "stdout: {}", stdout);

  Ok(())
}

#[test]
fn test_failing_recompressor_fails_the_build() -> Result<()> {
  let project = TestProject::new()?;
  configure(&project, None, "")?;
  run_rail(&project.path, &["build-current"])?;

  project.write_config_with(&format!(
    "[build]\n{}\n\n[tools]\nrecompressor = \"false\"\n",
    FAKE_BUILD
  ))?;
  let output = run_rail_raw(&project.path, &["postprocess", "build/libs/zson-1.4.0-dev.jar"], &[])?;
  assert_eq!(output.status.code(), Some(3));

  Ok(())
}
