//! Build, downgrade and post-process pipeline
//!
//! - **targets**: runtime targets and the downgrade matrix
//! - **build**: the opaque build command and the current-runtime test run
//! - **lane**: one target's downgrade and test stages
//! - **orchestrator**: lanes in parallel with a failure policy
//! - **postprocess**: in-place archive recompression
//!
//! # Invariants
//!
//! 1. **Lanes are isolated**: each writes only under its own slug directory
//! 2. **A lane failure never aborts another lane** (unless fail-fast cancels
//!    lanes that have not started)
//! 3. **Downgraded tests run against downgraded bytecode only**

pub mod artifact;
pub mod build;
pub mod cache;
pub mod classpath;
pub mod lane;
pub mod orchestrator;
pub mod postprocess;
pub mod targets;

pub use postprocess::Recompressor;
