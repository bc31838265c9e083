//! Build artifacts and their classifiers

use crate::pipeline::targets::BuildTarget;
use std::path::{Path, PathBuf};

/// What an archive is, which decides its Maven classifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactKind {
  Primary,
  Sources,
  Docs,
  Downgraded(BuildTarget),
}

impl ArtifactKind {
  /// Maven classifier; the primary archive has none
  pub fn classifier(&self) -> Option<String> {
    match self {
      ArtifactKind::Primary => None,
      ArtifactKind::Sources => Some("sources".to_string()),
      ArtifactKind::Docs => Some("javadoc".to_string()),
      ArtifactKind::Downgraded(target) => Some(target.classifier()),
    }
  }

  /// Short label for logs and summaries
  pub fn label(&self) -> String {
    match self {
      ArtifactKind::Primary => "primary".to_string(),
      ArtifactKind::Sources => "sources".to_string(),
      ArtifactKind::Docs => "docs".to_string(),
      ArtifactKind::Downgraded(target) => target.classifier(),
    }
  }
}

/// An archive on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
  pub kind: ArtifactKind,
  pub path: PathBuf,
}

impl Artifact {
  pub fn new(kind: ArtifactKind, path: PathBuf) -> Self {
    Self { kind, path }
  }

  /// File name as it is uploaded
  pub fn file_name(&self) -> String {
    self
      .path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
  }

  pub fn exists(&self) -> bool {
    self.path.is_file()
  }

  /// Size in bytes, if the file exists
  pub fn size(&self) -> Option<u64> {
    file_size(&self.path)
  }
}

pub(crate) fn file_size(path: &Path) -> Option<u64> {
  std::fs::metadata(path).ok().map(|m| m.len())
}
