//! Content-addressed skip cache for downgrade stages
//!
//! A stage is skipped when the SHA256 fingerprint of its inputs matches the
//! one recorded on its last success and its output still exists. Test runs
//! are never cached.

use crate::core::error::{RailResult, ResultExt};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// SHA256 over everything that determines a stage's output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint(String);

impl Fingerprint {
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

/// Accumulates stage inputs into a fingerprint
pub struct FingerprintBuilder {
  hasher: Sha256,
}

impl FingerprintBuilder {
  pub fn new(stage: &str) -> Self {
    let mut hasher = Sha256::new();
    hasher.update(stage.as_bytes());
    hasher.update([0]);
    Self { hasher }
  }

  /// Mix in a string value (tool template, runtime, version)
  pub fn text(mut self, value: &str) -> Self {
    self.hasher.update((value.len() as u64).to_le_bytes());
    self.hasher.update(value.as_bytes());
    self
  }

  /// Mix in a file, or every file under a directory in path order
  pub fn contents(mut self, path: &Path) -> RailResult<Self> {
    if path.is_dir() {
      let mut files: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();
      files.sort();

      for file in files {
        let relative = file.strip_prefix(path).unwrap_or(&file);
        self = self.text(&relative.to_string_lossy());
        self.hash_file(&file)?;
      }
    } else {
      self.hash_file(path)?;
    }
    Ok(self)
  }

  /// Mix in every classpath entry: its path, and its contents when present
  pub fn classpath(mut self, entries: &[PathBuf]) -> RailResult<Self> {
    for entry in entries {
      self = self.text(&entry.to_string_lossy());
      if entry.exists() {
        self = self.contents(entry)?;
      }
    }
    Ok(self)
  }

  fn hash_file(&mut self, path: &Path) -> RailResult<()> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    self.hasher.update((bytes.len() as u64).to_le_bytes());
    self.hasher.update(&bytes);
    Ok(())
  }

  pub fn finish(self) -> Fingerprint {
    Fingerprint(format!("{:x}", self.hasher.finalize()))
  }
}

/// Fingerprint records under `{output_dir}/.cache`
#[derive(Debug, Clone)]
pub struct StageCache {
  dir: PathBuf,
}

impl StageCache {
  pub fn new(dir: PathBuf) -> Self {
    Self { dir }
  }

  fn record_path(&self, key: &str) -> PathBuf {
    self.dir.join(format!("{}.sha256", key))
  }

  /// True when `key` last succeeded with `fingerprint` and `output` exists
  pub fn is_fresh(&self, key: &str, fingerprint: &Fingerprint, output: &Path) -> bool {
    if !output.exists() {
      return false;
    }
    fs::read_to_string(self.record_path(key)).is_ok_and(|recorded| recorded.trim() == fingerprint.as_str())
  }

  /// Record a successful stage
  pub fn record(&self, key: &str, fingerprint: &Fingerprint) -> RailResult<()> {
    fs::create_dir_all(&self.dir).with_context(|| format!("Failed to create {}", self.dir.display()))?;
    let path = self.record_path(key);
    fs::write(&path, fingerprint.as_str()).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
  }

  /// Forget a stage, forcing it to rerun
  pub fn invalidate(&self, key: &str) {
    let _ = fs::remove_file(self.record_path(key));
  }
}
