//! Integration tests for `release-rail resolve-version` and `targets`

use crate::helpers::*;
use anyhow::Result;

#[test]
fn test_first_build_without_tags() -> Result<()> {
  let project = TestProject::new()?;
  project.write_config(BASE_CONFIG)?;

  let output = run_rail(&project.path, &["resolve-version", "--json"])?;
  let json = stdout_json(&output)?;

  assert_eq!(json["version"], "1.4.0-dev");
  assert_eq!(json["tag"], "release/1.4.0-dev");
  assert_eq!(json["channel"], "dev");
  assert_eq!(json["release_build"], false);
  assert_eq!(json["tags_considered"], 0);

  Ok(())
}

#[test]
fn test_local_build_increments_past_stable_tag() -> Result<()> {
  let project = TestProject::new()?;
  project.write_config(BASE_CONFIG)?;
  project.tag("release/1.4.3", None)?;
  project.commit_at("Fix serializer", "2024-02-01T00:00:00Z")?;

  let output = run_rail(&project.path, &["resolve-version", "--json"])?;
  assert_eq!(stdout_json(&output)?["version"], "1.4.4-dev");

  // declaring a channel makes it a release build without changing the patch
  let output = run_rail(&project.path, &["resolve-version", "--json", "--release-channel", "release"])?;
  let json = stdout_json(&output)?;
  assert_eq!(json["version"], "1.4.4");
  assert_eq!(json["tag"], "release/1.4.4");
  assert_eq!(json["release_build"], true);

  Ok(())
}

#[test]
fn test_external_ci_reproduces_tagged_version() -> Result<()> {
  let project = TestProject::new()?;
  project.write_config(BASE_CONFIG)?;
  project.tag("release/1.4.3", None)?;
  project.commit_at("Prepare 1.4.4", "2024-02-01T00:00:00Z")?;
  project.tag("release/1.4.4-dev", None)?;

  let output = run_rail(&project.path, &["resolve-version", "--json", "--external-ci"])?;
  let json = stdout_json(&output)?;
  assert_eq!(json["version"], "1.4.4");
  assert_eq!(json["channel"], "release");
  assert_eq!(json["release_build"], true);

  // the environment switch behaves like the flag
  let output = run_rail_with_env(&project.path, &["resolve-version", "--json"], &[("EXTERNAL_PUBLISH", "true")])?;
  assert_eq!(stdout_json(&output)?["version"], "1.4.4");

  Ok(())
}

#[test]
fn test_tags_after_head_are_ignored() -> Result<()> {
  let project = TestProject::new()?;
  project.write_config(BASE_CONFIG)?;
  let base = project.commit_at("Release 1.4.2", "2024-01-02T00:00:00Z")?;
  project.tag("release/1.4.2", None)?;

  project.commit_at("Later work", "2024-06-01T00:00:00Z")?;
  project.tag("release/1.4.9", None)?;

  project.checkout(&base)?;

  let output = run_rail(&project.path, &["resolve-version", "--json"])?;
  let json = stdout_json(&output)?;
  assert_eq!(json["version"], "1.4.3-dev");
  assert_eq!(json["tags_considered"], 1);

  Ok(())
}

#[test]
fn test_other_minor_versions_do_not_count() -> Result<()> {
  let project = TestProject::new()?;
  project.write_config(BASE_CONFIG)?;
  project.tag("release/1.3.7", None)?;
  project.tag("v1.4.5", None)?;

  let output = run_rail(&project.path, &["resolve-version", "--json"])?;
  assert_eq!(stdout_json(&output)?["version"], "1.4.0-dev");

  Ok(())
}

#[test]
fn test_unknown_channel_suffix_aborts() -> Result<()> {
  let project = TestProject::new()?;
  project.write_config(BASE_CONFIG)?;
  project.tag("release/1.4.5-rc.1", None)?;

  let output = run_rail_raw(&project.path, &["resolve-version", "--external-ci"], &[])?;
  assert_eq!(output.status.code(), Some(1));

  let stderr = String::from_utf8_lossy(&output.stderr);
  assert!(stderr.contains("rc"), "stderr should name the suffix: {}", stderr);

  Ok(())
}

#[test]
fn test_missing_config_is_a_user_error() -> Result<()> {
  let project = TestProject::new()?;

  let output = run_rail_raw(&project.path, &["resolve-version"], &[])?;
  assert_eq!(output.status.code(), Some(1));

  Ok(())
}

#[test]
fn test_config_without_minor_version_is_rejected() -> Result<()> {
  let project = TestProject::new()?;
  project.write_config(
    r#"
[project]
name = "zson"

[[targets]]
version = "21"
"#,
  )?;

  let output = run_rail_raw(&project.path, &["resolve-version"], &[])?;
  assert_eq!(output.status.code(), Some(1));
  assert!(String::from_utf8_lossy(&output.stderr).contains("minor_version"));

  Ok(())
}

#[test]
fn test_targets_json_lists_matrix() -> Result<()> {
  let project = TestProject::new()?;
  project.write_config(BASE_CONFIG)?;

  let output = run_rail(&project.path, &["targets", "--json"])?;
  let json = stdout_json(&output)?;

  assert_eq!(json["current"]["name"], "21");
  assert_eq!(json["current"]["class_version"], 65);

  let downgrades = json["downgrades"].as_array().expect("downgrades array");
  assert_eq!(downgrades.len(), 2);
  assert_eq!(downgrades[0]["name"], "17");
  assert_eq!(downgrades[1]["name"], "8");
  assert_eq!(downgrades[1]["class_version"], 52);
  assert_eq!(downgrades[1]["test_runtime"], 11);
  assert_eq!(downgrades[1]["classifier"], "downgraded-8");

  Ok(())
}
