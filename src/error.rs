//! Errors surfaced by remote operations.

use thiserror::Error;

/// Failure of a remote call made on behalf of the caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
  /// The remote answered with a non-2xx status.
  #[error("request failed with status {status}: {body}")]
  Status { status: u16, body: String },

  /// The request never produced a response.
  #[error("transport error: {0}")]
  Transport(String),

  /// A 2xx response whose body did not have the expected shape.
  #[error("failed to decode response from {path}: {message}")]
  Decode { path: String, message: String },
}

impl SyncError {
  /// HTTP status of the failure, if the remote answered at all.
  pub fn status(&self) -> Option<u16> {
    match self {
      SyncError::Status { status, .. } => Some(*status),
      _ => None,
    }
  }
}

pub type Result<T> = std::result::Result<T, SyncError>;
