pub mod facade;
pub mod retry;
pub mod transport;

#[cfg(test)]
mod tests;

pub use facade::StateClient;
pub use retry::RetryPolicy;
pub use transport::{GrpcTransport, StateTransport};

use crate::types::Error;

/// Failure kinds surfaced by the client, discriminable by the caller.
/// Only [`ClientError::Transport`] is ever retried automatically.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
  #[error("transport failure: {0}")]
  Transport(String),

  /// The supplied etag no longer matches current state; re-read (e.g. via
  /// `get` or `checkpoints`) to adopt a fresh one before resubmitting.
  #[error("conflict: {0}")]
  Conflict(String),

  #[error("not found: {0}")]
  NotFound(String),

  /// A mutating call was attempted before any etag was known locally.
  #[error("{0}")]
  Precondition(String),
}

impl From<Error> for ClientError {
  fn from(err: Error) -> Self {
    match err {
      Error::NotFound(message) => ClientError::NotFound(message),
      conflict @ Error::Conflict { .. } => ClientError::Conflict(conflict.to_string()),
    }
  }
}
