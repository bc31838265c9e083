//! Integration tests: drive the release-rail binary against throwaway git repositories

mod helpers;
mod test_lanes;
mod test_publish;
mod test_version;
