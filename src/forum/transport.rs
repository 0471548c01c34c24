//! HTTP capability the forum client is built on.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::config::ApiConfig;
use crate::error::{Result, SyncError};

/// Raw response: status plus body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
  pub status: u16,
  pub body: String,
}

impl HttpResponse {
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

/// Sends a request and hands back whatever the remote answered.
///
/// Implementations only fail for requests that never got a response;
/// status interpretation is left to the caller.
#[async_trait]
pub trait Transport: Send + Sync {
  async fn call(&self, method: Method, path: &str, body: Option<Value>) -> Result<HttpResponse>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
  async fn call(&self, method: Method, path: &str, body: Option<Value>) -> Result<HttpResponse> {
    (**self).call(method, path, body).await
  }
}

/// Transport backed by reqwest, with an optional bearer token.
#[derive(Clone)]
pub struct ReqwestTransport {
  client: reqwest::Client,
  base_url: Url,
  token: Option<String>,
}

impl ReqwestTransport {
  pub fn new(config: &ApiConfig, token: Option<String>) -> color_eyre::Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| color_eyre::eyre::eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      client,
      base_url: config.url.clone(),
      token,
    })
  }
}

#[async_trait]
impl Transport for ReqwestTransport {
  async fn call(&self, method: Method, path: &str, body: Option<Value>) -> Result<HttpResponse> {
    let url = self
      .base_url
      .join(path)
      .map_err(|e| SyncError::Transport(format!("invalid path {}: {}", path, e)))?;

    let mut request = self.client.request(method.clone(), url);
    if let Some(token) = &self.token {
      request = request.bearer_auth(token);
    }
    if let Some(body) = body {
      request = request.json(&body);
    }

    let response = request
      .send()
      .await
      .map_err(|e| SyncError::Transport(e.to_string()))?;
    let status = response.status().as_u16();
    let body = response
      .text()
      .await
      .map_err(|e| SyncError::Transport(e.to_string()))?;

    tracing::debug!(%method, path, status, "forum api response");

    Ok(HttpResponse { status, body })
  }
}
