//! Release tag history
//!
//! Candidate release tags are the tags carrying the release prefix whose
//! commit is not newer than HEAD. A rewritten or rebased history can leave
//! tags "from the future" behind; counting them would inflate the patch.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// A git tag and the committer timestamp of the commit it points to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
  pub name: String,
  pub commit_timestamp: DateTime<Utc>,
}

impl Tag {
  pub fn new(name: impl Into<String>, commit_timestamp: DateTime<Utc>) -> Self {
    Self {
      name: name.into(),
      commit_timestamp,
    }
  }
}

/// Oldest first; ties by shorter name, then lexically
impl Ord for Tag {
  fn cmp(&self, other: &Self) -> Ordering {
    self
      .commit_timestamp
      .cmp(&other.commit_timestamp)
      .then_with(|| self.name.len().cmp(&other.name.len()))
      .then_with(|| self.name.cmp(&other.name))
  }
}

impl PartialOrd for Tag {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

/// Ordered release tag history visible from HEAD
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagHistory {
  tags: Vec<Tag>,
}

impl TagHistory {
  /// Filter `all_tags` to release candidates and order them.
  ///
  /// Keeps tags starting with `prefix` whose commit timestamp is not after
  /// `head_timestamp`. An empty history means "no prior release".
  pub fn read(all_tags: impl IntoIterator<Item = Tag>, prefix: &str, head_timestamp: DateTime<Utc>) -> Self {
    let mut tags: Vec<Tag> = all_tags
      .into_iter()
      .filter(|tag| tag.name.starts_with(prefix))
      .filter(|tag| {
        let visible = tag.commit_timestamp <= head_timestamp;
        if !visible {
          tracing::debug!(tag = %tag.name, "ignoring release tag newer than HEAD");
        }
        visible
      })
      .collect();
    tags.sort();
    Self { tags }
  }

  pub fn is_empty(&self) -> bool {
    self.tags.is_empty()
  }

  pub fn len(&self) -> usize {
    self.tags.len()
  }

  /// Most recent candidate tag, if any
  pub fn most_recent(&self) -> Option<&Tag> {
    self.tags.last()
  }

  /// Tag names in history order
  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.tags.iter().map(|t| t.name.as_str())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
  }

  #[test]
  fn test_filters_prefix_and_orders() {
    let tags = vec![
      Tag::new("release/1.4.2", at(300)),
      Tag::new("v0.1", at(50)),
      Tag::new("release/1.4.0", at(100)),
      Tag::new("release/1.4.1", at(200)),
    ];
    let history = TagHistory::read(tags, "release/", at(1000));
    let names: Vec<_> = history.names().collect();
    assert_eq!(names, vec!["release/1.4.0", "release/1.4.1", "release/1.4.2"]);
    assert_eq!(history.most_recent().unwrap().name, "release/1.4.2");
  }

  #[test]
  fn test_same_commit_ties_break_by_length_then_name() {
    let tags = vec![
      Tag::new("release/1.4.10", at(100)),
      Tag::new("release/1.4.9-dev", at(100)),
      Tag::new("release/1.4.9", at(100)),
      Tag::new("release/1.4.8", at(100)),
    ];
    let history = TagHistory::read(tags, "release/", at(100));
    let names: Vec<_> = history.names().collect();
    assert_eq!(
      names,
      vec!["release/1.4.8", "release/1.4.9", "release/1.4.10", "release/1.4.9-dev"]
    );
  }

  #[test]
  fn test_excludes_tags_newer_than_head() {
    let tags = vec![
      Tag::new("release/1.4.0", at(100)),
      Tag::new("release/1.4.7", at(900)),
      Tag::new("release/1.4.1", at(500)),
    ];
    let history = TagHistory::read(tags, "release/", at(500));
    let names: Vec<_> = history.names().collect();
    // equal to HEAD is kept, strictly after is dropped
    assert_eq!(names, vec!["release/1.4.0", "release/1.4.1"]);
  }

  #[test]
  fn test_empty_history() {
    let history = TagHistory::read(Vec::new(), "release/", at(0));
    assert!(history.is_empty());
    assert!(history.most_recent().is_none());
  }
}
