//! Serde types matching the forum API's request and response bodies.
//!
//! Kept apart from the domain types so wire quirks (`content`/`last`,
//! `postId`) stay out of the store.

use serde::{Deserialize, Serialize};

use super::types::{CommentId, CommentType, Page, Thread, ThreadId};

// ============================================================================
// Responses
// ============================================================================

/// Spring-style page of the post list endpoint.
#[derive(Debug, Deserialize)]
pub struct ApiPage {
  #[serde(default)]
  pub content: Vec<Thread>,
  #[serde(default = "default_last")]
  pub last: bool,
}

fn default_last() -> bool {
  true
}

impl From<ApiPage> for Page {
  fn from(page: ApiPage) -> Self {
    Page {
      items: page.content,
      is_last_page: page.last,
    }
  }
}

/// Authoritative counts returned by both vote endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCounts {
  #[serde(default)]
  pub upvotes: u64,
  #[serde(default)]
  pub downvotes: u64,
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCreateComment<'a> {
  pub content: &'a str,
  pub post_id: ThreadId,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub parent_comment_id: Option<CommentId>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub comment_type: Option<CommentType>,
}
