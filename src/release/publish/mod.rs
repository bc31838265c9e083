//! Release publication
//!
//! Publishing is the last gate: it only runs after the primary build, the
//! current tests and every downgrade lane passed. Destinations:
//!
//! - **github**: a GitHub release for the version tag with every archive attached
//! - **maven**: a Maven repository layout (local directory or HTTP PUT)
//!
//! Re-publishing an existing version is governed by `release.on_conflict`.

pub mod github;
pub mod maven;

use crate::core::config::ConflictPolicy;
use crate::core::context::BuildContext;
use crate::core::error::{ConfigError, PublishError, RailError, RailResult};
use crate::pipeline::artifact::Artifact;
use github::GitHubPublisher;
use maven::{MavenCoordinates, MavenRepository};

/// Env var that overrides `release.maven_url`
pub const MAVEN_URL_ENV: &str = "local_maven_url";

/// Everything a GitHub release is made of
#[derive(Debug, Clone)]
pub struct Release {
  pub tag_name: String,
  /// Rendered version, used as the release title
  pub title: String,
  pub artifacts: Vec<Artifact>,
  pub target_branch: String,
  pub prerelease: bool,
}

impl Release {
  pub fn from_context(ctx: &BuildContext) -> Self {
    Self {
      tag_name: ctx.resolved.tag_name.clone(),
      title: ctx.version(),
      artifacts: ctx.release_artifacts(),
      target_branch: ctx.config.release.target_branch.clone(),
      prerelease: ctx.resolved.channel().is_prerelease(),
    }
  }

  /// Every artifact must exist before anything is uploaded
  pub fn verify_artifacts(&self) -> RailResult<()> {
    match self.artifacts.iter().find(|a| !a.exists()) {
      Some(missing) => Err(RailError::Publish(PublishError::MissingArtifact {
        path: missing.path.clone(),
      })),
      None => Ok(()),
    }
  }
}

/// Result of publishing to one destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStatus {
  Published,
  /// Version already present and `on_conflict = "skip"`
  AlreadyPublished,
}

/// Apply the conflict policy to an already-published version
pub(crate) fn on_existing(policy: ConflictPolicy, destination: &str, version: &str) -> RailResult<PublishStatus> {
  match policy {
    ConflictPolicy::Fail => Err(RailError::Publish(PublishError::Conflict {
      destination: destination.to_string(),
      version: version.to_string(),
    })),
    ConflictPolicy::Skip => {
      tracing::warn!(destination, version, "version already published, skipping");
      Ok(PublishStatus::AlreadyPublished)
    }
  }
}

#[derive(Debug, Clone, Copy)]
pub struct PublishOptions {
  pub github: bool,
  pub maven: bool,
}

/// Maven repository URL: env override first, then config
pub fn maven_url(ctx: &BuildContext) -> Option<String> {
  std::env::var(MAVEN_URL_ENV)
    .ok()
    .filter(|v| !v.trim().is_empty())
    .or_else(|| ctx.config.release.maven_url.clone())
}

fn maven_coordinates(ctx: &BuildContext) -> RailResult<MavenCoordinates> {
  let group = ctx.config.project.group.clone().ok_or_else(|| {
    RailError::Config(ConfigError::MissingField {
      field: "project.group".to_string(),
    })
  })?;
  Ok(MavenCoordinates {
    group,
    artifact: ctx.project_name().to_string(),
    version: ctx.version(),
  })
}

pub struct MavenDestination {
  pub repository: MavenRepository,
  pub coordinates: MavenCoordinates,
}

/// Publication targets, resolved from config and environment up front.
///
/// Resolving fails on a missing repository, group or token, so it must run
/// before the build and the lanes.
pub struct Destinations {
  pub maven: Option<MavenDestination>,
  pub github: Option<GitHubPublisher>,
}

impl Destinations {
  pub fn resolve(ctx: &BuildContext, options: PublishOptions) -> RailResult<Self> {
    let maven = match maven_url(ctx) {
      Some(url) if options.maven => Some(MavenDestination {
        repository: MavenRepository::from_url(&url, &ctx.root, ctx.config.tools.timeout())?,
        coordinates: maven_coordinates(ctx)?,
      }),
      None if options.maven => {
        println!("⏭️  No Maven repository configured, skipping Maven publication");
        None
      }
      _ => None,
    };
    let github = if options.github {
      Some(GitHubPublisher::from_context(ctx)?)
    } else {
      None
    };
    Ok(Self { maven, github })
  }
}

/// Publish a release to every resolved destination
pub fn publish(release: &Release, destinations: &Destinations, policy: ConflictPolicy) -> RailResult<()> {
  release.verify_artifacts()?;

  if let Some(MavenDestination {
    repository,
    coordinates,
  }) = &destinations.maven
  {
    println!("📦 Publishing {} to {}", coordinates, repository);
    match repository.publish(coordinates, &release.artifacts, policy)? {
      PublishStatus::Published => println!("   ✅ Maven publication complete"),
      PublishStatus::AlreadyPublished => println!("   ⏭️  {} already in the repository, skipped", coordinates),
    }
  }

  if let Some(publisher) = &destinations.github {
    println!("🚀 Publishing GitHub release {} to {}", release.tag_name, publisher.repository());
    match publisher.publish(release, policy)? {
      PublishStatus::Published => println!("   ✅ GitHub release created with {} assets", release.artifacts.len()),
      PublishStatus::AlreadyPublished => println!("   ⏭️  Release {} already exists, skipped", release.tag_name),
    }
  }

  Ok(())
}

/// Dry-run output: what would be published where
pub fn print_plan(ctx: &BuildContext, release: &Release, options: PublishOptions) {
  println!("🔍 Dry-run: release plan for {} {}", ctx.project_name(), release.title);
  println!();
  println!("  Tag:        {} (on {})", release.tag_name, release.target_branch);
  println!("  Prerelease: {}", if release.prerelease { "yes" } else { "no" });
  println!("  Artifacts:");
  for artifact in &release.artifacts {
    let marker = if artifact.exists() { "" } else { "  (missing)" };
    println!("    - {:<16} {}{}", artifact.kind.label(), artifact.path.display(), marker);
  }

  if options.github {
    match &ctx.config.release.github_repository {
      Some(repo) => println!("  GitHub:     {} via {}", repo, ctx.config.release.github_api_url),
      None => println!("  GitHub:     not configured (release.github_repository)"),
    }
  }
  if options.maven {
    match (maven_url(ctx), maven_coordinates(ctx)) {
      (Some(url), Ok(coordinates)) => println!("  Maven:      {} -> {}", coordinates, url),
      (Some(url), Err(_)) => println!("  Maven:      {} (project.group missing)", url),
      (None, _) => println!("  Maven:      not configured"),
    }
  }
  println!();
  println!("No hosts contacted.");
}
