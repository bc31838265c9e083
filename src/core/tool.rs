//! External tool invocation
//!
//! Every subprocess the orchestrator launches (build command, downgrader,
//! test runner, recompressor) goes through [`run_external_tool`]. The contract
//! is the same for all of them: blocking call, uniform timeout, stdout/stderr
//! captured, non-zero exit reported as [`ToolError::Failed`] with stderr.

use std::collections::HashMap;
use std::fmt;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// How often a running child is polled for exit
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Default timeout for a single tool invocation (30 minutes)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Options shared by every tool invocation
#[derive(Debug, Clone)]
pub struct ToolOptions {
  pub timeout: Duration,
  pub cwd: Option<PathBuf>,
  pub env: Vec<(String, String)>,
}

impl Default for ToolOptions {
  fn default() -> Self {
    Self {
      timeout: DEFAULT_TIMEOUT,
      cwd: None,
      env: Vec::new(),
    }
  }
}

impl ToolOptions {
  pub fn new(timeout: Duration) -> Self {
    Self {
      timeout,
      ..Default::default()
    }
  }

  pub fn in_dir(mut self, cwd: &Path) -> Self {
    self.cwd = Some(cwd.to_path_buf());
    self
  }

  pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.env.push((key.into(), value.into()));
    self
  }
}

/// Captured result of a successful invocation
#[derive(Debug, Clone)]
pub struct ToolOutput {
  pub stdout: String,
  pub stderr: String,
  pub duration: Duration,
}

/// Tool invocation errors
#[derive(Debug)]
pub enum ToolError {
  /// Executable not found on PATH
  NotFound { tool: String },

  /// Process could not be spawned for another reason
  Spawn { tool: String, source: io::Error },

  /// Process did not finish in time and was killed
  TimedOut { tool: String, timeout: Duration },

  /// Process exited non-zero (or was killed by a signal)
  Failed {
    tool: String,
    code: Option<i32>,
    stdout: String,
    stderr: String,
  },
}

impl ToolError {
  /// Captured diagnostic output, preferring stderr
  pub fn diagnostics(&self) -> String {
    match self {
      ToolError::Failed { stdout, stderr, .. } => {
        if stderr.trim().is_empty() {
          stdout.clone()
        } else {
          stderr.clone()
        }
      }
      other => other.to_string(),
    }
  }
}

impl fmt::Display for ToolError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ToolError::NotFound { tool } => write!(f, "Tool not found: {}", tool),
      ToolError::Spawn { tool, source } => write!(f, "Failed to start {}: {}", tool, source),
      ToolError::TimedOut { tool, timeout } => {
        write!(f, "{} timed out after {} seconds", tool, timeout.as_secs())
      }
      ToolError::Failed { tool, code, stderr, .. } => {
        match code {
          Some(code) => write!(f, "{} exited with code {}", tool, code)?,
          None => write!(f, "{} was terminated by a signal", tool)?,
        }
        if !stderr.trim().is_empty() {
          write!(f, "\n{}", stderr.trim_end())?;
        }
        Ok(())
      }
    }
  }
}

impl std::error::Error for ToolError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      ToolError::Spawn { source, .. } => Some(source),
      _ => None,
    }
  }
}

/// Run an external tool to completion.
///
/// Blocks until the child exits or `options.timeout` elapses, in which case
/// the child is killed and [`ToolError::TimedOut`] is returned.
pub fn run_external_tool(name: &str, args: &[String], options: &ToolOptions) -> Result<ToolOutput, ToolError> {
  let start = Instant::now();

  let mut cmd = Command::new(name);
  cmd.args(args).stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
  if let Some(cwd) = &options.cwd {
    cmd.current_dir(cwd);
  }
  for (key, value) in &options.env {
    cmd.env(key, value);
  }

  tracing::debug!(tool = name, args = ?args, "running external tool");

  let mut child = cmd.spawn().map_err(|e| {
    if e.kind() == io::ErrorKind::NotFound {
      ToolError::NotFound { tool: name.to_string() }
    } else {
      ToolError::Spawn {
        tool: name.to_string(),
        source: e,
      }
    }
  })?;

  // Drain pipes on their own threads so a chatty child can't block on a full pipe
  let stdout_reader = child.stdout.take().map(spawn_reader);
  let stderr_reader = child.stderr.take().map(spawn_reader);

  let status = match wait_with_timeout(&mut child, options.timeout) {
    Ok(Some(status)) => status,
    Ok(None) => {
      let _ = child.kill();
      let _ = child.wait();
      tracing::warn!(tool = name, timeout_secs = options.timeout.as_secs(), "tool timed out");
      return Err(ToolError::TimedOut {
        tool: name.to_string(),
        timeout: options.timeout,
      });
    }
    Err(e) => {
      let _ = child.kill();
      return Err(ToolError::Spawn {
        tool: name.to_string(),
        source: e,
      });
    }
  };

  let stdout = stdout_reader.map(join_reader).unwrap_or_default();
  let stderr = stderr_reader.map(join_reader).unwrap_or_default();
  let duration = start.elapsed();

  tracing::debug!(
    tool = name,
    code = ?status.code(),
    elapsed_ms = duration.as_millis() as u64,
    "external tool finished"
  );

  if !status.success() {
    return Err(ToolError::Failed {
      tool: name.to_string(),
      code: status.code(),
      stdout,
      stderr,
    });
  }

  Ok(ToolOutput {
    stdout,
    stderr,
    duration,
  })
}

/// Poll the child until it exits; `Ok(None)` means the timeout elapsed
fn wait_with_timeout(child: &mut std::process::Child, timeout: Duration) -> io::Result<Option<ExitStatus>> {
  let deadline = Instant::now() + timeout;
  loop {
    if let Some(status) = child.try_wait()? {
      return Ok(Some(status));
    }
    if Instant::now() >= deadline {
      return Ok(None);
    }
    thread::sleep(POLL_INTERVAL);
  }
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<String> {
  thread::spawn(move || {
    let mut buf = Vec::new();
    let _ = pipe.read_to_end(&mut buf);
    String::from_utf8_lossy(&buf).into_owned()
  })
}

fn join_reader(handle: thread::JoinHandle<String>) -> String {
  handle.join().unwrap_or_default()
}

/// A configured command line with `{placeholder}` substitution.
///
/// The first element is the executable. Unknown placeholders are left as-is
/// so tool-specific braces survive rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
  parts: Vec<String>,
}

impl CommandTemplate {
  pub fn new(parts: Vec<String>) -> Self {
    Self { parts }
  }

  pub fn is_empty(&self) -> bool {
    self.parts.is_empty()
  }

  /// Raw template text, used for cache fingerprints
  pub fn raw(&self) -> String {
    self.parts.join("\u{1f}")
  }

  /// Substitute variables and split into (program, args)
  pub fn render(&self, vars: &HashMap<&str, String>) -> Option<(String, Vec<String>)> {
    let mut rendered = self.parts.iter().map(|part| substitute(part, vars));
    let program = rendered.next()?;
    Some((program, rendered.collect()))
  }
}

fn substitute(part: &str, vars: &HashMap<&str, String>) -> String {
  let mut out = part.to_string();
  for (key, value) in vars {
    let needle = format!("{{{}}}", key);
    if out.contains(&needle) {
      out = out.replace(&needle, value);
    }
  }
  out
}
