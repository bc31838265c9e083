//! Progress indicators for downgrade lanes
//!
//! Uses `linya` for allocation-free, concurrency-optimized progress bars.
//! One bar per lane, advanced once per completed stage.

use linya::{Bar, Progress};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Thread-safe multi-bar progress shared by all lanes
#[derive(Clone)]
pub struct LaneProgress {
  progress: Arc<Mutex<Progress>>,
}

impl LaneProgress {
  pub fn new() -> Self {
    Self {
      progress: Arc::new(Mutex::new(Progress::new())),
    }
  }

  // a panicking lane must not take the other bars down with it
  fn lock(&self) -> MutexGuard<'_, Progress> {
    self.progress.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Add a bar for one lane
  pub fn add_lane(&self, stages: usize, label: impl Into<String>) -> Bar {
    self.lock().bar(stages, label.into())
  }

  /// Mark one stage of a lane as done
  pub fn stage_done(&self, bar: &Bar) {
    self.lock().inc_and_draw(bar, 1);
  }

  /// Fill a lane's bar (cached, failed or cancelled lanes)
  pub fn finish(&self, bar: &Bar, stages: usize) {
    self.lock().set_and_draw(bar, stages);
  }
}

impl Default for LaneProgress {
  fn default() -> Self {
    Self::new()
  }
}
