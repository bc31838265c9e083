//! Core engine for release-rail
//!
//! The building blocks every command shares:
//!
//! - **config**: rail.toml parsing and validation
//! - **context**: the immutable per-invocation build context
//! - **error**: error taxonomy with contextual help and exit codes
//! - **tool**: the uniform external-tool contract (timeout, captured stderr)
//! - **vcs**: git access through the system `git` binary (SystemGit)

pub mod config;
pub mod context;
pub mod error;
pub mod tool;
pub mod vcs;
