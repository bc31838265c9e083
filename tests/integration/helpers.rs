//! Test helpers for integration tests

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Every variable release-rail reads from the environment; cleared so the
/// host CI cannot leak into a test
const RAIL_ENV: &[&str] = &[
  "EXTERNAL_PUBLISH",
  "RELEASE_CHANNEL",
  "local_maven_url",
  "GITHUB_TOKEN",
  "MAVEN_USERNAME",
  "MAVEN_PASSWORD",
  "RUST_LOG",
];

/// Two runtime targets below the current one; no tools configured
pub const BASE_CONFIG: &str = r#"
[project]
name = "zson"
group = "dev.nolij"
minor_version = "1.4"

[[targets]]
version = "21"

[[targets]]
version = "17"

[[targets]]
version = "1.8"
display = "8"
test = "11"
"#;

/// Writes the three archives and one compiled test class
pub const FAKE_BUILD: &str = r#"command = ["sh", "-c", "mkdir -p build/libs build/classes/java/test/pkg && echo cafe > build/classes/java/test/pkg/ZsonTest.class && for s in '' -sources -javadoc; do echo PK > build/libs/$0-$1$s.jar; done", "{name}", "{version}"]"#;

/// Copies input to output; refuses to downgrade to class version `REJECT`
const DOWNGRADER: &str = r#"downgrade = ["sh", "-c", "if [ \"$2\" = \"$3\" ]; then echo 'unsupported: java/lang/Record' >&2; exit 1; fi; cp -R \"$0\" \"$1\"", "{input}", "{output}", "{class_version}", "REJECT"]"#;

/// Passes when the (downgraded) test classes reached the runner
pub const PASSING_TESTS: &str = r#"test = ["sh", "-c", "test -f \"$0\"", "{test_classes}/pkg/ZsonTest.class"]"#;

/// Downgrader that fails for the given class version, or never
pub fn downgrader(reject_class_version: Option<u32>) -> String {
  let reject = reject_class_version
    .map(|v| v.to_string())
    .unwrap_or_else(|| "none".to_string());
  DOWNGRADER.replace("REJECT", &reject)
}

/// A git repository standing in for a JVM project
pub struct TestProject {
  _root: TempDir,
  pub path: PathBuf,
}

impl TestProject {
  /// Create a repository with one commit dated 2024-01-01
  pub fn new() -> Result<Self> {
    let root = TempDir::new()?;
    let path = root.path().to_path_buf();

    git(&path, &["init", "--initial-branch=master"])?;
    git(&path, &["config", "user.name", "Test User"])?;
    git(&path, &["config", "user.email", "test@example.com"])?;
    git(&path, &["config", "tag.gpgSign", "false"])?;
    git(&path, &["config", "commit.gpgSign", "false"])?;

    std::fs::write(path.join(".gitignore"), "build/\nrepo/\n")?;

    let project = Self { _root: root, path };
    project.commit_at("Initial commit", "2024-01-01T00:00:00Z")?;
    Ok(project)
  }

  /// Write rail.toml
  pub fn write_config(&self, content: &str) -> Result<()> {
    std::fs::write(self.path.join("rail.toml"), content)?;
    Ok(())
  }

  /// Write rail.toml from the base config plus extra sections
  pub fn write_config_with(&self, extra: &str) -> Result<()> {
    self.write_config(&format!("{}\n{}\n", BASE_CONFIG, extra))
  }

  /// Empty commit with a fixed author and committer date
  pub fn commit_at(&self, message: &str, date: &str) -> Result<String> {
    git_with_env(
      &self.path,
      &["commit", "--allow-empty", "-m", message],
      &[("GIT_AUTHOR_DATE", date), ("GIT_COMMITTER_DATE", date)],
    )?;
    let output = git(&self.path, &["rev-parse", "HEAD"])?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
  }

  /// Lightweight tag on HEAD (or on `rev`)
  pub fn tag(&self, name: &str, rev: Option<&str>) -> Result<()> {
    match rev {
      Some(rev) => git(&self.path, &["tag", name, rev])?,
      None => git(&self.path, &["tag", name])?,
    };
    Ok(())
  }

  pub fn checkout(&self, rev: &str) -> Result<()> {
    git(&self.path, &["checkout", "--quiet", rev])?;
    Ok(())
  }

  /// Check if a file exists
  pub fn file_exists(&self, path: &str) -> bool {
    self.path.join(path).exists()
  }
}

/// Run git command in a directory
pub fn git(cwd: &Path, args: &[&str]) -> Result<Output> {
  git_with_env(cwd, args, &[])
}

fn git_with_env(cwd: &Path, args: &[&str], env: &[(&str, &str)]) -> Result<Output> {
  let output = Command::new("git")
    .current_dir(cwd)
    .args(args)
    .envs(env.iter().copied())
    .output()
    .context("Failed to run git command")?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    anyhow::bail!("Git command failed: git {}\n{}", args.join(" "), stderr);
  }

  Ok(output)
}

/// Run release-rail and return its output whatever the exit status
pub fn run_rail_raw(cwd: &Path, args: &[&str], env: &[(&str, &str)]) -> Result<Output> {
  let rail_bin = env!("CARGO_BIN_EXE_release-rail");

  let mut command = Command::new(rail_bin);
  command.current_dir(cwd).args(args);
  for var in RAIL_ENV {
    command.env_remove(var);
  }
  command.envs(env.iter().copied());

  command.output().context("Failed to run release-rail")
}

/// Run release-rail, failing unless it exits successfully
pub fn run_rail(cwd: &Path, args: &[&str]) -> Result<Output> {
  run_rail_with_env(cwd, args, &[])
}

pub fn run_rail_with_env(cwd: &Path, args: &[&str], env: &[(&str, &str)]) -> Result<Output> {
  let output = run_rail_raw(cwd, args, env)?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    anyhow::bail!(
      "release-rail command failed: release-rail {}\nstdout: {}\nstderr: {}",
      args.join(" "),
      stdout,
      stderr
    );
  }

  Ok(output)
}

/// Parse stdout as JSON
pub fn stdout_json(output: &Output) -> Result<serde_json::Value> {
  serde_json::from_slice(&output.stdout).context("stdout is not valid JSON")
}
