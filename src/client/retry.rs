use super::ClientError;
use log::warn;
use std::future::Future;
use std::time::Duration;

/// Bounded retry for transport-level failures: up to `retries` attempts
/// separated by a fixed `delay`, then one final attempt whose outcome is
/// propagated as-is. Application-level outcomes (conflict, not-found) are
/// definitive and returned immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  pub retries: u32,
  pub delay: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      retries: 3,
      delay: Duration::from_millis(500),
    }
  }
}

impl RetryPolicy {
  pub async fn run<Out, Fut>(&self, mut call: impl FnMut() -> Fut) -> Result<Out, ClientError>
  where
    Fut: Future<Output = Result<Out, ClientError>>,
  {
    for attempt in 1..=self.retries {
      match call().await {
        Err(ClientError::Transport(reason)) => {
          warn!(
            "Transport failure (attempt {}/{}): {}; retrying in {:?}",
            attempt, self.retries, reason, self.delay
          );
          tokio::time::sleep(self.delay).await;
        }
        outcome => return outcome,
      }
    }
    call().await
  }
}
