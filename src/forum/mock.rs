//! Scripted transport for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Method;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};

use crate::error::{Result, SyncError};
use crate::forum::transport::{HttpResponse, Transport};

/// A request seen by the mock.
#[derive(Debug, Clone)]
pub struct RecordedCall {
  pub method: Method,
  pub path: String,
  pub body: Option<Value>,
}

/// Answers each (method, path) with the responses queued for it, in order.
/// A request with nothing queued fails as if the network were down.
#[derive(Default)]
pub struct MockTransport {
  responses: Mutex<HashMap<(Method, String), VecDeque<Result<HttpResponse>>>>,
  calls: Mutex<Vec<RecordedCall>>,
}

impl MockTransport {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn respond(&self, method: Method, path: &str, body: Value) {
    self.respond_text(method, path, 200, &body.to_string());
  }

  pub fn respond_text(&self, method: Method, path: &str, status: u16, body: &str) {
    self.push(
      method,
      path,
      Ok(HttpResponse {
        status,
        body: body.to_string(),
      }),
    );
  }

  pub fn fail(&self, method: Method, path: &str, status: u16, body: &str) {
    self.respond_text(method, path, status, body);
  }

  pub fn disconnect(&self, method: Method, path: &str) {
    self.push(
      method,
      path,
      Err(SyncError::Transport("connection refused".to_string())),
    );
  }

  pub fn calls(&self) -> Vec<RecordedCall> {
    self.calls.lock().clone()
  }

  fn push(&self, method: Method, path: &str, response: Result<HttpResponse>) {
    self
      .responses
      .lock()
      .entry((method, path.to_string()))
      .or_default()
      .push_back(response);
  }
}

#[async_trait]
impl Transport for MockTransport {
  async fn call(&self, method: Method, path: &str, body: Option<Value>) -> Result<HttpResponse> {
    self.calls.lock().push(RecordedCall {
      method: method.clone(),
      path: path.to_string(),
      body,
    });

    self
      .responses
      .lock()
      .get_mut(&(method.clone(), path.to_string()))
      .and_then(|queue| queue.pop_front())
      .unwrap_or_else(|| {
        Err(SyncError::Transport(format!(
          "no response scripted for {} {}",
          method, path
        )))
      })
  }
}
