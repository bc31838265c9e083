//! Maven repository publication
//!
//! Writes the standard layout:
//!
//! ```text
//! {group as path}/{artifact}/{version}/{artifact}-{version}[-{classifier}].jar
//! {group as path}/{artifact}/{version}/{artifact}-{version}.pom
//! ```
//!
//! with a `.sha256` file next to each. Local directories and `file://` URLs
//! are written to disk; `http(s)://` repositories receive PUT requests.

use super::{PublishStatus, on_existing};
use crate::core::config::ConflictPolicy;
use crate::core::error::{ConfigError, PublishError, RailError, RailResult, ResultExt};
use crate::pipeline::artifact::Artifact;
use crate::utils::is_local_path;
use reqwest::blocking::Client;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Optional basic-auth credentials for remote repositories
pub const USERNAME_ENV: &str = "MAVEN_USERNAME";
pub const PASSWORD_ENV: &str = "MAVEN_PASSWORD";

/// groupId:artifactId:version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MavenCoordinates {
  pub group: String,
  pub artifact: String,
  pub version: String,
}

impl MavenCoordinates {
  /// Repository-relative version directory
  pub fn directory(&self) -> String {
    format!("{}/{}/{}", self.group.replace('.', "/"), self.artifact, self.version)
  }

  pub fn file_name(&self, classifier: Option<&str>, extension: &str) -> String {
    match classifier {
      Some(classifier) => format!("{}-{}-{}.{}", self.artifact, self.version, classifier, extension),
      None => format!("{}-{}.{}", self.artifact, self.version, extension),
    }
  }

  fn path_of(&self, file_name: &str) -> String {
    format!("{}/{}", self.directory(), file_name)
  }

  /// Minimal POM; the library declares no runtime dependencies
  pub fn pom(&self) -> String {
    format!(
      r#"<?xml version="1.0" encoding="UTF-8"?>
<project xmlns="http://maven.apache.org/POM/4.0.0" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:schemaLocation="http://maven.apache.org/POM/4.0.0 https://maven.apache.org/xsd/maven-4.0.0.xsd">
  <modelVersion>4.0.0</modelVersion>
  <groupId>{}</groupId>
  <artifactId>{}</artifactId>
  <version>{}</version>
  <packaging>jar</packaging>
</project>
"#,
      self.group, self.artifact, self.version
    )
  }
}

impl fmt::Display for MavenCoordinates {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}:{}", self.group, self.artifact, self.version)
  }
}

/// Where artifacts are published
pub enum MavenRepository {
  Local(PathBuf),
  Remote {
    base: String,
    client: Client,
    credentials: Option<(String, String)>,
  },
}

impl MavenRepository {
  /// Classify a repository URL; relative local paths resolve against `root`
  pub fn from_url(url: &str, root: &Path, timeout: Duration) -> RailResult<Self> {
    let url = url.trim();
    if let Some(path) = url.strip_prefix("file://") {
      return Ok(MavenRepository::Local(PathBuf::from(path)));
    }
    if url.starts_with("http://") || url.starts_with("https://") {
      let client = Client::builder()
        .user_agent(concat!("release-rail/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()?;
      let credentials = match (std::env::var(USERNAME_ENV), std::env::var(PASSWORD_ENV)) {
        (Ok(user), Ok(password)) => Some((user, password)),
        _ => None,
      };
      return Ok(MavenRepository::Remote {
        base: url.trim_end_matches('/').to_string(),
        client,
        credentials,
      });
    }
    if is_local_path(url) {
      let path = Path::new(url);
      let path = if path.is_absolute() { path.to_path_buf() } else { root.join(path) };
      return Ok(MavenRepository::Local(path));
    }

    Err(RailError::Config(ConfigError::Invalid {
      field: "release.maven_url".to_string(),
      reason: format!(
        "'{}' is neither a local path nor an http(s)/file URL (prefix relative paths with ./)",
        url
      ),
    }))
  }

  fn exists(&self, relative: &str) -> RailResult<bool> {
    match self {
      MavenRepository::Local(root) => Ok(root.join(relative).exists()),
      MavenRepository::Remote { client, credentials, .. } => {
        let mut request = client.head(self.url_of(relative));
        if let Some((user, password)) = credentials {
          request = request.basic_auth(user, Some(password));
        }
        Ok(request.send()?.status().is_success())
      }
    }
  }

  fn url_of(&self, relative: &str) -> String {
    match self {
      MavenRepository::Remote { base, .. } => format!("{}/{}", base, relative),
      MavenRepository::Local(root) => root.join(relative).to_string_lossy().into_owned(),
    }
  }

  fn put(&self, relative: &str, bytes: Vec<u8>) -> RailResult<()> {
    match self {
      MavenRepository::Local(root) => {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
          fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
      }
      MavenRepository::Remote { client, credentials, .. } => {
        let url = self.url_of(relative);
        let mut request = client.put(&url).body(bytes);
        if let Some((user, password)) = credentials {
          request = request.basic_auth(user, Some(password));
        }
        let response = request.send()?;
        if !response.status().is_success() {
          return Err(RailError::Publish(PublishError::Http {
            message: response.status().to_string(),
            url,
          }));
        }
      }
    }
    tracing::debug!(file = relative, "published");
    Ok(())
  }

  /// Write a file and its `.sha256` sibling
  fn put_with_checksum(&self, relative: &str, bytes: Vec<u8>) -> RailResult<()> {
    let checksum = sha256_hex(&bytes);
    self.put(relative, bytes)?;
    self.put(&format!("{}.sha256", relative), checksum.into_bytes())
  }

  /// Publish every artifact plus the POM.
  ///
  /// The POM goes last; a version counts as published once it exists.
  pub fn publish(
    &self,
    coordinates: &MavenCoordinates,
    artifacts: &[Artifact],
    policy: ConflictPolicy,
  ) -> RailResult<PublishStatus> {
    let pom = coordinates.path_of(&coordinates.file_name(None, "pom"));
    if self.exists(&pom)? {
      return on_existing(policy, &self.url_of(&coordinates.directory()), &coordinates.version);
    }

    for artifact in artifacts {
      let classifier = artifact.kind.classifier();
      let relative = coordinates.path_of(&coordinates.file_name(classifier.as_deref(), "jar"));
      let bytes = fs::read(&artifact.path).with_context(|| format!("Failed to read {}", artifact.path.display()))?;
      self.put_with_checksum(&relative, bytes)?;
    }

    self.put_with_checksum(&pom, coordinates.pom().into_bytes())?;
    Ok(PublishStatus::Published)
  }
}

impl fmt::Display for MavenRepository {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      MavenRepository::Local(path) => write!(f, "{}", path.display()),
      MavenRepository::Remote { base, .. } => write!(f, "{}", base),
    }
  }
}

fn sha256_hex(bytes: &[u8]) -> String {
  let mut hasher = Sha256::new();
  hasher.update(bytes);
  format!("{:x}", hasher.finalize())
}
