//! Integration tests for `release-rail publish`

use crate::helpers::*;
use anyhow::Result;

#[test]
fn test_dry_run_prints_plan_without_building() -> Result<()> {
  let project = TestProject::new()?;
  project.write_config_with(
    r#"
[release]
github_repository = "nolij/zson"
"#,
  )?;
  project.tag("release/1.4.3", None)?;

  let output = run_rail(&project.path, &["publish", "--dry-run", "--release-channel", "release"])?;
  let stdout = String::from_utf8_lossy(&output.stdout);

  assert!(stdout.contains("release/1.4.4 (on master)"), "stdout: {}", stdout);
  assert!(stdout.contains("Prerelease: no"));
  assert!(stdout.contains("zson-1.4.4-downgraded-8.jar"));
  assert!(stdout.contains("nolij/zson"));
  assert!(stdout.contains("No hosts contacted."));
  assert!(!project.file_exists("build"));

  Ok(())
}

#[test]
fn test_dry_run_shows_maven_override_from_env() -> Result<()> {
  let project = TestProject::new()?;
  project.write_config_with(
    r#"
[release]
maven_url = "https://maven.example.com/releases"
"#,
  )?;

  let output = run_rail_with_env(
    &project.path,
    &["publish", "--dry-run", "--skip-github"],
    &[("local_maven_url", "/srv/maven")],
  )?;
  let stdout = String::from_utf8_lossy(&output.stdout);

  assert!(stdout.contains("dev.nolij:zson:1.4.0-dev -> /srv/maven"), "stdout: {}", stdout);
  assert!(!stdout.contains("maven.example.com"));
  assert!(stdout.contains("Prerelease: yes"));

  Ok(())
}

#[test]
fn test_missing_github_repository_aborts_before_building() -> Result<()> {
  let project = TestProject::new()?;
  project.write_config_with("")?;
  let repo = project.path.join("repo");

  let output = run_rail_raw(
    &project.path,
    &["publish"],
    &[("local_maven_url", repo.to_string_lossy().as_ref())],
  )?;
  assert_eq!(output.status.code(), Some(1));
  assert!(
    String::from_utf8_lossy(&output.stderr).contains("release.github_repository"),
    "stderr: {}",
    String::from_utf8_lossy(&output.stderr)
  );
  assert!(!project.file_exists("build"));
  assert!(!project.file_exists("repo"));

  Ok(())
}

#[cfg(unix)]
mod end_to_end {
  use super::*;

  fn configure(project: &TestProject, on_conflict: &str) -> Result<()> {
    project.write_config_with(&format!(
      "[release]\non_conflict = \"{}\"\n\n[build]\n{}\n\n[tools]\n{}\n{}\nrecompressor = \"rail-test-no-such-advzip\"\n",
      on_conflict,
      FAKE_BUILD,
      downgrader(None),
      PASSING_TESTS
    ))
  }

  fn publish(project: &TestProject) -> Result<std::process::Output> {
    let repo = project.path.join("repo");
    run_rail_raw(
      &project.path,
      &["publish", "--skip-github"],
      &[("local_maven_url", repo.to_string_lossy().as_ref())],
    )
  }

  #[test]
  fn test_publish_to_local_maven_repository() -> Result<()> {
    let project = TestProject::new()?;
    configure(&project, "fail")?;

    let output = publish(&project)?;
    assert!(
      output.status.success(),
      "stderr: {}",
      String::from_utf8_lossy(&output.stderr)
    );

    let dir = "repo/dev/nolij/zson/1.4.0-dev";
    for file in [
      "zson-1.4.0-dev.jar",
      "zson-1.4.0-dev.jar.sha256",
      "zson-1.4.0-dev-sources.jar",
      "zson-1.4.0-dev-javadoc.jar",
      "zson-1.4.0-dev-downgraded-17.jar",
      "zson-1.4.0-dev-downgraded-8.jar",
      "zson-1.4.0-dev.pom",
    ] {
      assert!(project.file_exists(&format!("{}/{}", dir, file)), "missing {}", file);
    }

    Ok(())
  }

  #[test]
  fn test_republishing_same_version_conflicts() -> Result<()> {
    let project = TestProject::new()?;
    configure(&project, "fail")?;

    assert!(publish(&project)?.status.success());

    let output = publish(&project)?;
    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("1.4.0-dev"));

    Ok(())
  }

  #[test]
  fn test_republishing_with_skip_policy_succeeds() -> Result<()> {
    let project = TestProject::new()?;
    configure(&project, "skip")?;

    assert!(publish(&project)?.status.success());

    let output = publish(&project)?;
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("already in the repository"));

    Ok(())
  }

  #[test]
  fn test_failing_lane_blocks_publication() -> Result<()> {
    let project = TestProject::new()?;
    project.write_config_with(&format!(
      "[build]\n{}\n\n[tools]\n{}\n{}\nrecompressor = \"rail-test-no-such-advzip\"\n",
      FAKE_BUILD,
      downgrader(Some(52)),
      PASSING_TESTS
    ))?;

    let output = publish(&project)?;
    assert_eq!(output.status.code(), Some(3));
    assert!(!project.file_exists("repo"));

    Ok(())
  }
}
