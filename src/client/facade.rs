use super::retry::RetryPolicy;
use super::transport::StateTransport;
use super::ClientError;
use crate::service::interface::Checkpoint;
use crate::types::{Bytes, Etag, KeyValue};
use log::debug;
use std::collections::HashMap;

/// Thin client bound to one app id. Holds the last-known etag, stamps it onto
/// every mutating call and adopts the etag of every successful response.
/// Conflict detection is entirely the service's job; the facade only relays
/// the outcome.
pub struct StateClient<T> {
  transport: T,
  retry: RetryPolicy,
  app_id: String,
  etag: Option<Etag>,
}

impl<T: StateTransport> StateClient<T> {
  pub fn new(transport: T, app_id: impl Into<String>) -> Self {
    Self {
      transport,
      retry: RetryPolicy::default(),
      app_id: app_id.into(),
      etag: None,
    }
  }

  pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
    self.retry = retry;
    self
  }

  pub fn app_id(&self) -> &str {
    &self.app_id
  }

  pub fn etag(&self) -> Option<&Etag> {
    self.etag.as_ref()
  }

  fn require_etag(&self) -> Result<Etag, ClientError> {
    self.etag.clone().ok_or_else(|| {
      ClientError::Precondition(format!(
        "no etag known for app {}; init_app or a read must succeed first",
        self.app_id
      ))
    })
  }

  fn adopt(&mut self, etag: Etag) {
    debug!("[{}]: adopting etag {}", self.app_id, etag);
    self.etag = Some(etag);
  }

  pub async fn init_app(&mut self) -> Result<(), ClientError> {
    let transport = &self.transport;
    let app_id = &self.app_id;
    let etag = self.retry.run(|| transport.init_app(app_id)).await?;
    self.adopt(etag);
    Ok(())
  }

  /// Returns the parts present in state for the requested keys; absent keys
  /// are omitted. Also refreshes the held etag, so `get(&[])` is the cheapest
  /// way to recover from a conflict.
  pub async fn get<Key: AsRef<str>>(
    &mut self,
    keys: &[Key],
  ) -> Result<HashMap<String, Bytes>, ClientError> {
    let keys: Vec<String> = keys.iter().map(|key| key.as_ref().to_owned()).collect();
    let transport = &self.transport;
    let app_id = &self.app_id;
    let (etag, parts) = self.retry.run(|| transport.get(app_id, &keys)).await?;
    self.adopt(etag);
    Ok(parts.into_iter().map(|part| (part.key, part.value)).collect())
  }

  /// Upserts all supplied parts atomically.
  pub async fn set(&mut self, parts: Vec<KeyValue>) -> Result<(), ClientError> {
    let held = self.require_etag()?;
    let transport = &self.transport;
    let app_id = &self.app_id;
    let etag = self
      .retry
      .run(|| transport.set(app_id, &held, parts.clone()))
      .await?;
    self.adopt(etag);
    Ok(())
  }

  pub async fn checkpoints(&mut self) -> Result<Vec<Checkpoint>, ClientError> {
    let transport = &self.transport;
    let app_id = &self.app_id;
    let (etag, checkpoints) = self.retry.run(|| transport.checkpoints(app_id)).await?;
    self.adopt(etag);
    Ok(checkpoints)
  }

  pub async fn create_checkpoint(&mut self, payload: &str) -> Result<String, ClientError> {
    let held = self.require_etag()?;
    let transport = &self.transport;
    let app_id = &self.app_id;
    let (etag, id) = self
      .retry
      .run(|| transport.create_checkpoint(app_id, &held, payload))
      .await?;
    self.adopt(etag);
    Ok(id)
  }

  pub async fn revert(&mut self, checkpoint_id: &str) -> Result<(), ClientError> {
    let held = self.require_etag()?;
    let transport = &self.transport;
    let app_id = &self.app_id;
    let etag = self
      .retry
      .run(|| transport.revert(app_id, &held, checkpoint_id))
      .await?;
    self.adopt(etag);
    Ok(())
  }

  pub async fn cleanup(&mut self, until_checkpoint: &str) -> Result<(), ClientError> {
    let held = self.require_etag()?;
    let transport = &self.transport;
    let app_id = &self.app_id;
    let etag = self
      .retry
      .run(|| transport.cleanup(app_id, &held, until_checkpoint))
      .await?;
    self.adopt(etag);
    Ok(())
  }

  pub async fn reset(&mut self) -> Result<(), ClientError> {
    let held = self.require_etag()?;
    let transport = &self.transport;
    let app_id = &self.app_id;
    let etag = self.retry.run(|| transport.reset(app_id, &held)).await?;
    self.adopt(etag);
    Ok(())
  }
}
