use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Result, SyncError};
use crate::forum::api_types::{ApiCreateComment, ApiPage, VoteCounts};
use crate::forum::transport::Transport;
use crate::forum::types::{Comment, CommentId, CommentType, Page, Resolution, ThreadId};

/// Forum API client wrapper
#[derive(Clone)]
pub struct ForumClient<T> {
  transport: T,
}

impl<T: Transport> ForumClient<T> {
  pub fn new(transport: T) -> Self {
    Self { transport }
  }

  /// Get one page of the thread list
  pub async fn fetch_page(&self, page: u32, size: u32) -> Result<Page> {
    let path = format!("/api/posts/getForPostList?page={}&size={}", page, size);
    let response: ApiPage = self.request(Method::GET, &path, None).await?;
    Ok(response.into())
  }

  /// Get the flat comment list of a thread
  pub async fn fetch_comments(&self, thread_id: ThreadId) -> Result<Vec<Comment>> {
    let path = format!("/api/comments/get/{}", thread_id);
    self.request(Method::GET, &path, None).await
  }

  /// Create a comment, as a root or as a reply
  pub async fn create_comment(
    &self,
    thread_id: ThreadId,
    content: &str,
    parent_comment_id: Option<CommentId>,
    comment_type: Option<CommentType>,
  ) -> Result<Comment> {
    let body = ApiCreateComment {
      content,
      post_id: thread_id,
      parent_comment_id,
      comment_type,
    };
    let body = serde_json::to_value(body).map_err(|e| SyncError::Decode {
      path: "/api/comments/create".to_string(),
      message: e.to_string(),
    })?;

    self
      .request(Method::POST, "/api/comments/create", Some(body))
      .await
  }

  pub async fn vote_thread(&self, thread_id: ThreadId, is_upvote: bool) -> Result<VoteCounts> {
    let path = format!("/api/posts/{}/{}", vote_verb(is_upvote), thread_id);
    self.request(Method::POST, &path, None).await
  }

  pub async fn vote_comment(&self, comment_id: CommentId, is_upvote: bool) -> Result<VoteCounts> {
    let path = format!("/api/comments/{}/{}", vote_verb(is_upvote), comment_id);
    self.request(Method::POST, &path, None).await
  }

  pub async fn resolve(&self, thread_id: ThreadId, resolution: &Resolution) -> Result<()> {
    let path = format!("/api/posts/{}/resolve", thread_id);
    let body = serde_json::to_value(resolution).map_err(|e| SyncError::Decode {
      path: path.clone(),
      message: e.to_string(),
    })?;
    self.acknowledge(Method::PUT, &path, Some(body)).await
  }

  pub async fn unresolve(&self, thread_id: ThreadId) -> Result<()> {
    let path = format!("/api/posts/{}/unresolve", thread_id);
    self.acknowledge(Method::PUT, &path, None).await
  }

  pub async fn mark_best_answer(&self, thread_id: ThreadId, comment_id: CommentId) -> Result<()> {
    let path = format!("/api/posts/{}/best-answer/{}", thread_id, comment_id);
    self.acknowledge(Method::PUT, &path, None).await
  }

  /// Send a request and decode a 2xx JSON body
  async fn request<R: DeserializeOwned>(
    &self,
    method: Method,
    path: &str,
    body: Option<Value>,
  ) -> Result<R> {
    let response = self.send(method, path, body).await?;

    serde_json::from_str(&response).map_err(|e| SyncError::Decode {
      path: path.to_string(),
      message: e.to_string(),
    })
  }

  /// Send a request whose body, if any, is only an acknowledgement
  async fn acknowledge(&self, method: Method, path: &str, body: Option<Value>) -> Result<()> {
    self.send(method, path, body).await.map(|_| ())
  }

  async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<String> {
    let response = self.transport.call(method.clone(), path, body).await?;

    if !response.is_success() {
      tracing::warn!(%method, path, status = response.status, "forum api request failed");
      return Err(SyncError::Status {
        status: response.status,
        body: response.body,
      });
    }

    Ok(response.body)
  }
}

fn vote_verb(is_upvote: bool) -> &'static str {
  if is_upvote {
    "upvote"
  } else {
    "downvote"
  }
}
