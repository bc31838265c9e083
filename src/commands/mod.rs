//! CLI commands for release-rail
//!
//! ## Inspection
//! - **resolve-version**: version, tag and channel from tag history
//! - **targets**: current runtime and the downgrade matrix
//!
//! ## Building
//! - **build-current**: run the build command, recompress its archives
//! - **test-current**: run the test suite on the current runtime
//! - **downgrade** / **test-downgraded**: a single lane
//! - **postprocess**: recompress one archive
//! - **assemble**: build-current plus every downgrade
//! - **check**: build-current, test-current, then every downgraded test lane
//!
//! ## Releasing
//! - **publish**: full gate, then GitHub release and Maven repository
//!
//! All commands accept `&BuildContext`; version resolution happens once in main.rs.

pub mod assemble;
pub mod build;
pub mod downgrade;
pub mod postprocess;
pub mod publish;
pub mod version;

pub use assemble::{run_assemble, run_check};
pub use build::{run_build_current, run_test_current};
pub use downgrade::{run_downgrade, run_test_downgraded};
pub use postprocess::run_postprocess;
pub use publish::run_publish;
pub use version::{run_resolve_version, run_targets};
