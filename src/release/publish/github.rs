//! GitHub release publication via the REST API

use super::{PublishStatus, Release, on_existing};
use crate::core::config::ConflictPolicy;
use crate::core::context::BuildContext;
use crate::core::error::{ConfigError, PublishError, RailError, RailResult, ResultExt};
use crate::pipeline::artifact::Artifact;
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Env var holding the API token
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

const API_VERSION: &str = "2022-11-28";
const JAR_CONTENT_TYPE: &str = "application/java-archive";

/// A release as returned by the API
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRelease {
  pub id: u64,
  /// URI template, e.g. `https://uploads.github.com/.../assets{?name,label}`
  pub upload_url: String,
  #[serde(default)]
  pub html_url: String,
}

#[derive(Debug, Serialize)]
struct CreateRelease<'a> {
  tag_name: &'a str,
  target_commitish: &'a str,
  name: &'a str,
  prerelease: bool,
  draft: bool,
}

#[derive(Debug, Serialize)]
struct UpdateRelease {
  draft: bool,
}

pub struct GitHubPublisher {
  client: Client,
  api_url: String,
  repository: String,
  token: String,
}

impl GitHubPublisher {
  pub fn new(api_url: &str, repository: &str, token: &str, timeout: Duration) -> RailResult<Self> {
    let client = Client::builder()
      .user_agent(concat!("release-rail/", env!("CARGO_PKG_VERSION")))
      .timeout(timeout)
      .build()?;
    Ok(Self {
      client,
      api_url: api_url.trim_end_matches('/').to_string(),
      repository: repository.to_string(),
      token: token.to_string(),
    })
  }

  /// Repository from config, token from `GITHUB_TOKEN`
  pub fn from_context(ctx: &BuildContext) -> RailResult<Self> {
    let release = &ctx.config.release;
    let repository = release.github_repository.as_deref().ok_or_else(|| {
      RailError::Config(ConfigError::MissingField {
        field: "release.github_repository".to_string(),
      })
    })?;
    let token = std::env::var(TOKEN_ENV)
      .ok()
      .filter(|t| !t.trim().is_empty())
      .ok_or_else(|| {
        RailError::Publish(PublishError::MissingToken {
          variable: TOKEN_ENV.to_string(),
        })
      })?;
    Self::new(&release.github_api_url, repository, &token, ctx.config.tools.timeout())
  }

  pub fn repository(&self) -> &str {
    &self.repository
  }

  fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
    builder
      .bearer_auth(&self.token)
      .header(ACCEPT, "application/vnd.github+json")
      .header("X-GitHub-Api-Version", API_VERSION)
  }

  /// Existing release for a tag, if any
  pub fn find_release(&self, tag: &str) -> RailResult<Option<GitHubRelease>> {
    let url = format!("{}/repos/{}/releases/tags/{}", self.api_url, self.repository, tag);
    let response = self.authorized(self.client.get(&url)).send()?;
    if response.status() == StatusCode::NOT_FOUND {
      return Ok(None);
    }
    let release = expect_success(response, &url)?.json::<GitHubRelease>()?;
    Ok(Some(release))
  }

  /// Create the release as a draft; drafts are not visible through the tag
  pub fn create_draft(&self, release: &Release) -> RailResult<GitHubRelease> {
    let url = format!("{}/repos/{}/releases", self.api_url, self.repository);
    let body = CreateRelease {
      tag_name: &release.tag_name,
      target_commitish: &release.target_branch,
      name: &release.title,
      prerelease: release.prerelease,
      draft: true,
    };
    let response = self.authorized(self.client.post(&url)).json(&body).send()?;
    Ok(expect_success(response, &url)?.json::<GitHubRelease>()?)
  }

  pub fn publish_draft(&self, draft: &GitHubRelease) -> RailResult<()> {
    let url = self.release_url(draft.id);
    let response = self
      .authorized(self.client.patch(&url))
      .json(&UpdateRelease { draft: false })
      .send()?;
    expect_success(response, &url)?;
    Ok(())
  }

  pub fn delete_release(&self, release: &GitHubRelease) -> RailResult<()> {
    let url = self.release_url(release.id);
    let response = self.authorized(self.client.delete(&url)).send()?;
    expect_success(response, &url)?;
    Ok(())
  }

  fn release_url(&self, id: u64) -> String {
    format!("{}/repos/{}/releases/{}", self.api_url, self.repository, id)
  }

  pub fn upload_asset(&self, release: &GitHubRelease, artifact: &Artifact) -> RailResult<()> {
    let url = upload_endpoint(&release.upload_url);
    let bytes = std::fs::read(&artifact.path).with_context(|| format!("Failed to read {}", artifact.path.display()))?;
    let response = self
      .authorized(self.client.post(url))
      .query(&[("name", artifact.file_name())])
      .header(CONTENT_TYPE, JAR_CONTENT_TYPE)
      .body(bytes)
      .send()?;
    expect_success(response, url)?;
    Ok(())
  }

  /// Create the release and attach every artifact.
  ///
  /// The release stays a draft until all assets are uploaded. A failed upload
  /// deletes the draft, so a retry starts from a clean state.
  pub fn publish(&self, release: &Release, policy: ConflictPolicy) -> RailResult<PublishStatus> {
    if self.find_release(&release.tag_name)?.is_some() {
      let destination = format!("github.com/{} ({})", self.repository, release.tag_name);
      return on_existing(policy, &destination, &release.title);
    }

    let draft = self.create_draft(release)?;
    tracing::info!(id = draft.id, url = %draft.html_url, "created draft GitHub release");

    for artifact in &release.artifacts {
      tracing::info!(asset = %artifact.file_name(), "uploading release asset");
      if let Err(err) = self.upload_asset(&draft, artifact) {
        if let Err(cleanup) = self.delete_release(&draft) {
          tracing::warn!(id = draft.id, error = %cleanup, "failed to delete draft release");
        }
        return Err(err);
      }
    }

    self.publish_draft(&draft)?;
    Ok(PublishStatus::Published)
  }
}

/// Strip the `{?name,label}` URI template suffix
fn upload_endpoint(upload_url: &str) -> &str {
  upload_url.split('{').next().unwrap_or(upload_url)
}

fn expect_success(response: Response, url: &str) -> RailResult<Response> {
  let status = response.status();
  if status.is_success() {
    return Ok(response);
  }
  let body = response.text().unwrap_or_default();
  Err(RailError::Publish(PublishError::Http {
    url: url.to_string(),
    message: format!("{} {}", status, body.trim()),
  }))
}
