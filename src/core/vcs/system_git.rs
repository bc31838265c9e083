//! System git backend
//!
//! Uses git plumbing commands for the few things release-rail needs from the
//! repository: HEAD metadata and the tag list with commit timestamps.

use crate::core::error::{GitError, RailError, RailResult, ResultExt};
use crate::release::Tag;
use chrono::{DateTime, TimeZone, Utc};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Field separator for `for-each-ref` output (tag names can't contain NUL)
const FIELD_SEP: char = '\u{0}';

/// Git backend using system git
pub struct SystemGit {
  /// Repository working directory
  pub(crate) repo_path: PathBuf,

  /// Working tree root
  pub(crate) work_tree: PathBuf,
}

impl SystemGit {
  /// Open a git repository
  pub fn open(path: &Path) -> RailResult<Self> {
    let output = Command::new("git")
      .arg("-C")
      .arg(path)
      .args(["rev-parse", "--show-toplevel"])
      .output()
      .context("Failed to execute git rev-parse")?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      if stderr.contains("not a git repository") {
        return Err(RailError::Git(GitError::RepoNotFound {
          path: path.to_path_buf(),
        }));
      }
      return Err(RailError::message(format!("Failed to open git repository: {}", stderr)));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let work_tree = stdout.trim();

    Ok(Self {
      repo_path: path.to_path_buf(),
      work_tree: PathBuf::from(work_tree),
    })
  }

  /// Working tree root
  pub fn work_tree(&self) -> &Path {
    &self.work_tree
  }

  /// Get HEAD commit SHA
  pub fn head_commit(&self) -> RailResult<String> {
    let stdout = self.run(&["rev-parse", "HEAD"])?;
    Ok(stdout.trim().to_string())
  }

  /// Committer timestamp of HEAD
  pub fn head_timestamp(&self) -> RailResult<DateTime<Utc>> {
    let stdout = self.run(&["log", "-1", "--format=%ct", "HEAD"])?;
    parse_unix_timestamp(stdout.trim()).ok_or_else(|| {
      RailError::Git(GitError::CommandFailed {
        command: "git log -1 --format=%ct HEAD".to_string(),
        stderr: format!("unexpected timestamp output: {}", stdout.trim()),
      })
    })
  }

  /// Get current branch name
  pub fn current_branch(&self) -> RailResult<String> {
    let output = self
      .git_cmd()
      .args(["rev-parse", "--abbrev-ref", "HEAD"])
      .output()
      .context("Failed to get current branch")?;

    if !output.status.success() {
      return Ok("HEAD".to_string()); // Detached HEAD
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
  }

  /// List every tag with the committer timestamp of the commit it points to.
  ///
  /// Annotated tags are peeled to their commit; lightweight tags already
  /// point at one. Tags on non-commit objects are skipped.
  pub fn list_tags(&self) -> RailResult<Vec<Tag>> {
    let format = format!(
      "--format=%(refname:short){sep}%(objecttype){sep}%(committerdate:unix){sep}%(*committerdate:unix)",
      sep = "%00"
    );
    let stdout = self.run(&["for-each-ref", &format, "refs/tags"])?;
    Ok(parse_tag_listing(&stdout))
  }

  /// Run a git subcommand and return stdout, mapping failure to GitError
  fn run(&self, args: &[&str]) -> RailResult<String> {
    let output = self
      .git_cmd()
      .args(args)
      .output()
      .with_context(|| format!("Failed to execute git {}", args.join(" ")))?;

    if !output.status.success() {
      return Err(RailError::Git(GitError::CommandFailed {
        command: format!("git {}", args.join(" ")),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
      }));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
  }

  /// Create a safe git command with isolated environment
  ///
  /// - Sets working directory to repo path
  /// - Clears environment variables
  /// - Whitelists only PATH and HOME
  /// - Adds safe configuration overrides
  pub(crate) fn git_cmd(&self) -> Command {
    let mut cmd = Command::new("git");

    cmd.arg("-C").arg(&self.repo_path);

    // Isolated environment (don't trust global config)
    cmd.env_clear();
    if let Ok(path) = std::env::var("PATH") {
      cmd.env("PATH", path);
    }
    if let Ok(home) = std::env::var("HOME") {
      cmd.env("HOME", home);
    }

    cmd.arg("-c").arg("core.quotePath=false");

    cmd
  }
}

/// Parse `for-each-ref` output produced by [`SystemGit::list_tags`]
pub(crate) fn parse_tag_listing(stdout: &str) -> Vec<Tag> {
  stdout
    .lines()
    .filter_map(|line| {
      let mut fields = line.split(FIELD_SEP);
      let name = fields.next()?.trim();
      let object_type = fields.next()?;
      let direct = fields.next().unwrap_or("");
      let peeled = fields.next().unwrap_or("");

      let timestamp = match object_type {
        "tag" => parse_unix_timestamp(peeled)?,
        "commit" => parse_unix_timestamp(direct)?,
        _ => return None,
      };

      if name.is_empty() {
        return None;
      }

      Some(Tag {
        name: name.to_string(),
        commit_timestamp: timestamp,
      })
    })
    .collect()
}

/// Parse git timestamp (seconds since epoch)
fn parse_unix_timestamp(ts_str: &str) -> Option<DateTime<Utc>> {
  let secs: i64 = ts_str.split_whitespace().next()?.parse().ok()?;
  Utc.timestamp_opt(secs, 0).single()
}
