//! Domain types for threads and their comment forests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use super::api_types::VoteCounts;

/// Identifier of a thread (a "post" on the remote side).
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ThreadId(pub u64);

/// Identifier of a comment.
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CommentId(pub u64);

impl fmt::Display for ThreadId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl fmt::Display for CommentId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Category attached to a comment when it is created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommentType {
  Suggestion,
  Story,
  #[default]
  Question,
}

/// How a thread was resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub contributing_comment_ids: Vec<CommentId>,
  #[serde(default, with = "timestamp::option")]
  pub resolved_at: Option<DateTime<Utc>>,
}

/// A comment as served by the remote, with its parent given by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
  pub id: CommentId,
  #[serde(default)]
  pub parent_comment_id: Option<CommentId>,
  #[serde(default)]
  pub content: String,
  #[serde(default)]
  pub author: String,
  #[serde(default)]
  pub upvotes: u64,
  #[serde(default)]
  pub downvotes: u64,
  #[serde(default)]
  pub user_upvoted: bool,
  #[serde(default)]
  pub user_downvoted: bool,
  #[serde(default)]
  pub best_answer: bool,
  #[serde(default)]
  pub comment_type: CommentType,
  #[serde(default, with = "timestamp")]
  pub created_at: DateTime<Utc>,
}

impl Comment {
  /// Apply server-confirmed vote counts on behalf of the current user.
  pub fn apply_vote(&mut self, counts: &VoteCounts, is_upvote: bool) {
    self.upvotes = counts.upvotes;
    self.downvotes = counts.downvotes;
    self.user_upvoted = is_upvote;
    self.user_downvoted = !is_upvote;
  }
}

/// Ordered list of root comments, each owning its replies.
pub type Forest = Vec<Arc<CommentNode>>;

/// A comment placed in its tree. Children are shared, so an unchanged
/// subtree can be reused between versions of a forest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentNode {
  pub comment: Comment,
  pub replies: Forest,
}

impl CommentNode {
  pub fn leaf(comment: Comment) -> Self {
    Self {
      comment,
      replies: Vec::new(),
    }
  }

  pub fn id(&self) -> CommentId {
    self.comment.id
  }

  /// Copy of this node with the comment record changed and replies kept.
  pub fn map_comment(&self, f: impl FnOnce(&mut Comment)) -> Self {
    let mut comment = self.comment.clone();
    f(&mut comment);
    Self {
      comment,
      replies: self.replies.clone(),
    }
  }
}

/// A discussion thread.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
  pub id: ThreadId,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub tags: BTreeSet<String>,
  #[serde(default)]
  pub author: String,
  #[serde(default, with = "timestamp")]
  pub created_at: DateTime<Utc>,
  #[serde(default, with = "timestamp")]
  pub updated_at: DateTime<Utc>,
  #[serde(default)]
  pub upvotes: u64,
  #[serde(default)]
  pub downvotes: u64,
  #[serde(default)]
  pub user_upvoted: bool,
  #[serde(default)]
  pub user_downvoted: bool,
  #[serde(default)]
  pub solved: bool,
  #[serde(default)]
  pub resolution: Option<Resolution>,
  #[serde(default, skip_serializing_if = "Option::is_none", with = "flat_forest")]
  pub comments: Option<Forest>,
}

impl Thread {
  /// Apply server-confirmed vote counts on behalf of the current user.
  pub fn apply_vote(&mut self, counts: &VoteCounts, is_upvote: bool) {
    self.upvotes = counts.upvotes;
    self.downvotes = counts.downvotes;
    self.user_upvoted = is_upvote;
    self.user_downvoted = !is_upvote;
  }
}

/// One page of the thread collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
  pub items: Vec<Thread>,
  pub is_last_page: bool,
}

/// Forests are written as a flat pre-order list, each comment tagged with
/// its depth, so the encoding nests no deeper than one comment however deep
/// the replies go.
mod flat_forest {
  use serde::{Deserialize, Deserializer, Serialize, Serializer};

  use super::{Comment, Forest};
  use crate::forum::tree;

  #[derive(Serialize)]
  struct FlatRef<'a> {
    depth: usize,
    #[serde(flatten)]
    comment: &'a Comment,
  }

  #[derive(Deserialize)]
  struct Flat {
    #[serde(default)]
    depth: usize,
    #[serde(flatten)]
    comment: Comment,
  }

  pub fn serialize<S: Serializer>(
    value: &Option<Forest>,
    serializer: S,
  ) -> Result<S::Ok, S::Error> {
    match value {
      Some(forest) => {
        let flat: Vec<FlatRef<'_>> = tree::preorder(forest)
          .into_iter()
          .map(|(depth, comment)| FlatRef { depth, comment })
          .collect();
        serializer.serialize_some(&flat)
      }
      None => serializer.serialize_none(),
    }
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(
    deserializer: D,
  ) -> Result<Option<Forest>, D::Error> {
    let flat = Option::<Vec<Flat>>::deserialize(deserializer)?;
    Ok(flat.map(|items| tree::from_preorder(items.into_iter().map(|f| (f.depth, f.comment)))))
  }
}

/// Timestamps arrive either as RFC 3339 or as a zone-less ISO date time
/// (the backend's local time, taken as UTC). They are always written back
/// as RFC 3339.
pub(crate) mod timestamp {
  use chrono::{DateTime, NaiveDateTime, Utc};
  use serde::{Deserialize, Deserializer, Serializer};

  pub fn parse(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
      return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
      .ok()
      .map(|dt| dt.and_utc())
  }

  pub fn serialize<S: Serializer>(
    value: &DateTime<Utc>,
    serializer: S,
  ) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_rfc3339())
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(
    deserializer: D,
  ) -> Result<DateTime<Utc>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw {
      Some(s) => {
        parse(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", s)))
      }
      None => Ok(DateTime::<Utc>::default()),
    }
  }

  pub mod option {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
      value: &Option<DateTime<Utc>>,
      serializer: S,
    ) -> Result<S::Ok, S::Error> {
      match value {
        Some(dt) => serializer.serialize_some(&dt.to_rfc3339()),
        None => serializer.serialize_none(),
      }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
      deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
      let raw = Option::<String>::deserialize(deserializer)?;
      raw
        .map(|s| {
          super::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", s)))
        })
        .transpose()
    }
  }
}
