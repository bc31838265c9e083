//! Release identity and publication
//!
//! - **tags**: release tag history visible from HEAD
//! - **version**: channel and patch resolution from that history
//! - **publish**: GitHub release and Maven repository publication
//!
//! # Invariants
//!
//! 1. **The version is a pure function of tag history and CI context**
//!    - No counter is persisted anywhere
//!    - Resolving twice against the same inputs yields the same version
//!
//! 2. **A stable version string is never reused**
//!    - Local builds move past the last stable tag
//!    - Re-publishing is refused (or skipped) per `release.on_conflict`
//!
//! 3. **Nothing is published unless every lane passed**

pub mod publish;
pub mod tags;
pub mod version;

pub use tags::{Tag, TagHistory};
pub use version::ReleaseChannel;
