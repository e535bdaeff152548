use super::facade::StateClient;
use super::retry::RetryPolicy;
use super::transport::StateTransport;
use super::ClientError;
use crate::service::fenced::FencedStateManager;
use crate::service::in_memory::InMemoryStateManager;
use crate::service::interface::Checkpoint;
use crate::types::{Etag, KeyValue};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn part(key: impl AsRef<str>, value: impl AsRef<[u8]>) -> KeyValue {
  KeyValue {
    key: key.as_ref().to_owned(),
    value: value.as_ref().to_owned(),
  }
}

fn to_map(parts: &[KeyValue]) -> HashMap<String, Vec<u8>> {
  parts
    .iter()
    .map(|part| (part.key.clone(), part.value.clone()))
    .collect()
}

fn fast_retry() -> RetryPolicy {
  RetryPolicy {
    retries: 2,
    delay: Duration::from_millis(1),
  }
}

/// In-process stand-in for the remote service: same fencing layer the gRPC
/// server uses, minus the wire.
#[derive(Clone)]
struct LocalTransport {
  state: Arc<FencedStateManager<InMemoryStateManager>>,
  calls: Arc<AtomicU32>,
}

impl LocalTransport {
  fn new() -> Self {
    Self {
      state: Arc::new(FencedStateManager::new(InMemoryStateManager::default())),
      calls: Arc::new(AtomicU32::new(0)),
    }
  }

  fn calls(&self) -> u32 {
    self.calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl StateTransport for LocalTransport {
  async fn init_app(&self, app_id: &str) -> Result<Etag, ClientError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self.state.init_app(app_id).map_err(From::from)
  }

  async fn get(&self, app_id: &str, keys: &[String]) -> Result<(Etag, Vec<KeyValue>), ClientError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self.state.get(app_id, keys).map_err(From::from)
  }

  async fn set(
    &self,
    app_id: &str,
    etag: &Etag,
    parts: Vec<KeyValue>,
  ) -> Result<Etag, ClientError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self.state.set(app_id, etag, parts).map_err(From::from)
  }

  async fn checkpoints(&self, app_id: &str) -> Result<(Etag, Vec<Checkpoint>), ClientError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self.state.checkpoints(app_id).map_err(From::from)
  }

  async fn create_checkpoint(
    &self,
    app_id: &str,
    etag: &Etag,
    payload: &str,
  ) -> Result<(Etag, String), ClientError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self
      .state
      .create_checkpoint(app_id, etag, payload)
      .map_err(From::from)
  }

  async fn revert(
    &self,
    app_id: &str,
    etag: &Etag,
    checkpoint_id: &str,
  ) -> Result<Etag, ClientError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self
      .state
      .revert(app_id, etag, checkpoint_id)
      .map_err(From::from)
  }

  async fn cleanup(
    &self,
    app_id: &str,
    etag: &Etag,
    until_checkpoint: &str,
  ) -> Result<Etag, ClientError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self
      .state
      .cleanup(app_id, etag, until_checkpoint)
      .map_err(From::from)
  }

  async fn reset(&self, app_id: &str, etag: &Etag) -> Result<Etag, ClientError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self.state.reset(app_id, etag).map_err(From::from)
  }
}

/// Fault injection in front of an inner transport. `refuse_next` rejects the
/// next n calls before they reach the server, as a dropped connection would;
/// `drop_next_acks` lets a `set` apply and swallows its acknowledgement.
#[derive(Clone)]
struct FaultTransport<T> {
  inner: T,
  refusals: Arc<AtomicU32>,
  dropped_acks: Arc<AtomicU32>,
  attempts: Arc<AtomicU32>,
}

impl<T> FaultTransport<T> {
  fn new(inner: T) -> Self {
    Self {
      inner,
      refusals: Arc::new(AtomicU32::new(0)),
      dropped_acks: Arc::new(AtomicU32::new(0)),
      attempts: Arc::new(AtomicU32::new(0)),
    }
  }

  fn refuse_next(&self, n: u32) {
    self.refusals.store(n, Ordering::SeqCst);
  }

  fn drop_next_acks(&self, n: u32) {
    self.dropped_acks.store(n, Ordering::SeqCst);
  }

  fn attempts(&self) -> u32 {
    self.attempts.load(Ordering::SeqCst)
  }

  fn interrupt(&self) -> Result<(), ClientError> {
    self.attempts.fetch_add(1, Ordering::SeqCst);
    if self.refusals.load(Ordering::SeqCst) > 0 {
      self.refusals.fetch_sub(1, Ordering::SeqCst);
      Err(ClientError::Transport("connection refused".to_owned()))
    } else {
      Ok(())
    }
  }
}

#[async_trait]
impl<T: StateTransport> StateTransport for FaultTransport<T> {
  async fn init_app(&self, app_id: &str) -> Result<Etag, ClientError> {
    self.interrupt()?;
    self.inner.init_app(app_id).await
  }

  async fn get(&self, app_id: &str, keys: &[String]) -> Result<(Etag, Vec<KeyValue>), ClientError> {
    self.interrupt()?;
    self.inner.get(app_id, keys).await
  }

  async fn set(
    &self,
    app_id: &str,
    etag: &Etag,
    parts: Vec<KeyValue>,
  ) -> Result<Etag, ClientError> {
    self.interrupt()?;
    let result = self.inner.set(app_id, etag, parts).await;
    if result.is_ok() && self.dropped_acks.load(Ordering::SeqCst) > 0 {
      self.dropped_acks.fetch_sub(1, Ordering::SeqCst);
      return Err(ClientError::Transport(
        "connection reset before response".to_owned(),
      ));
    }
    result
  }

  async fn checkpoints(&self, app_id: &str) -> Result<(Etag, Vec<Checkpoint>), ClientError> {
    self.interrupt()?;
    self.inner.checkpoints(app_id).await
  }

  async fn create_checkpoint(
    &self,
    app_id: &str,
    etag: &Etag,
    payload: &str,
  ) -> Result<(Etag, String), ClientError> {
    self.interrupt()?;
    self.inner.create_checkpoint(app_id, etag, payload).await
  }

  async fn revert(
    &self,
    app_id: &str,
    etag: &Etag,
    checkpoint_id: &str,
  ) -> Result<Etag, ClientError> {
    self.interrupt()?;
    self.inner.revert(app_id, etag, checkpoint_id).await
  }

  async fn cleanup(
    &self,
    app_id: &str,
    etag: &Etag,
    until_checkpoint: &str,
  ) -> Result<Etag, ClientError> {
    self.interrupt()?;
    self.inner.cleanup(app_id, etag, until_checkpoint).await
  }

  async fn reset(&self, app_id: &str, etag: &Etag) -> Result<Etag, ClientError> {
    self.interrupt()?;
    self.inner.reset(app_id, etag).await
  }
}

#[tokio::test]
async fn scenario_checkpoint_revert_cleanup() {
  let transport = LocalTransport::new();
  let mut client = StateClient::new(transport, "test-app");

  client.init_app().await.unwrap();
  assert!(client.checkpoints().await.unwrap().is_empty());
  assert!(client.get(&["a", "b"]).await.unwrap().is_empty());

  client.set(vec![part("a", "1")]).await.unwrap();
  assert_eq!(
    client.get(&["a", "b"]).await.unwrap(),
    to_map(&[part("a", "1")])
  );

  client.set(vec![part("a", "2")]).await.unwrap();
  let checkpoint0 = client.create_checkpoint("0").await.unwrap();

  client.set(vec![part("a", "3"), part("b", "3")]).await.unwrap();
  assert_eq!(
    client.get(&["a"]).await.unwrap(),
    to_map(&[part("a", "3")])
  );

  client.revert(&checkpoint0).await.unwrap();
  assert_eq!(
    client.get(&["a"]).await.unwrap(),
    to_map(&[part("a", "2")])
  );

  let checkpoint1 = client.create_checkpoint("1").await.unwrap();
  client.cleanup(&checkpoint1).await.unwrap();
  let remaining = client.checkpoints().await.unwrap();
  assert!(remaining.iter().all(|c| c.id != checkpoint0 && c.id != checkpoint1));
  assert!(remaining.is_empty());

  // reverting to a pruned checkpoint is a definitive failure
  match client.revert(&checkpoint0).await {
    Err(ClientError::NotFound(_)) => {}
    other => panic!("expected NotFound, got {:?}", other),
  }
  // and cleanup never touches the live mapping
  assert_eq!(
    client.get(&["a"]).await.unwrap(),
    to_map(&[part("a", "2")])
  );
}

#[tokio::test]
async fn reset_empties_mapping_and_checkpoints() {
  let transport = LocalTransport::new();
  let mut client = StateClient::new(transport, "test-app");

  client.init_app().await.unwrap();
  client.set(vec![part("a", "1")]).await.unwrap();
  client.create_checkpoint("0").await.unwrap();
  client.set(vec![part("b", "2")]).await.unwrap();

  client.reset().await.unwrap();
  assert!(client.get(&["a", "b"]).await.unwrap().is_empty());
  assert!(client.checkpoints().await.unwrap().is_empty());

  // still Ready: the fresh etag accepts further mutations
  client.set(vec![part("a", "again")]).await.unwrap();
}

#[tokio::test]
async fn mutating_call_without_etag_fails_fast() {
  let transport = LocalTransport::new();
  let mut client = StateClient::new(transport.clone(), "test-app");

  match client.set(vec![part("a", "1")]).await {
    Err(ClientError::Precondition(_)) => {}
    other => panic!("expected Precondition, got {:?}", other),
  }
  // no remote call was made
  assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn every_successful_call_returns_a_fresh_etag() {
  let transport = LocalTransport::new();
  let mut client = StateClient::new(transport, "test-app");

  client.init_app().await.unwrap();
  let mut seen = client.etag().unwrap().clone();

  client.set(vec![part("a", "1")]).await.unwrap();
  assert_ne!(*client.etag().unwrap(), seen);
  seen = client.etag().unwrap().clone();

  client.create_checkpoint("0").await.unwrap();
  assert_ne!(*client.etag().unwrap(), seen);
}

#[tokio::test]
async fn transport_failures_are_retried() {
  let transport = FaultTransport::new(LocalTransport::new());
  let mut client =
    StateClient::new(transport.clone(), "test-app").with_retry_policy(fast_retry());

  client.init_app().await.unwrap();
  transport.refuse_next(2);
  client.set(vec![part("a", "1")]).await.unwrap();
  assert_eq!(
    client.get(&["a"]).await.unwrap(),
    to_map(&[part("a", "1")])
  );
}

#[tokio::test]
async fn retry_budget_exhaustion_surfaces_transport_error() {
  let transport = FaultTransport::new(LocalTransport::new());
  let mut client =
    StateClient::new(transport.clone(), "test-app").with_retry_policy(fast_retry());

  client.init_app().await.unwrap();
  let before = transport.attempts();
  transport.refuse_next(10);
  match client.set(vec![part("a", "1")]).await {
    Err(ClientError::Transport(_)) => {}
    other => panic!("expected Transport, got {:?}", other),
  }
  // retries plus the one final attempt
  assert_eq!(transport.attempts() - before, 3);
}

#[tokio::test]
async fn conflicts_are_not_retried() {
  let server = LocalTransport::new();
  let mut writer = StateClient::new(server.clone(), "test-app").with_retry_policy(fast_retry());
  let mut stale = StateClient::new(server.clone(), "test-app").with_retry_policy(fast_retry());

  writer.init_app().await.unwrap();
  stale.init_app().await.unwrap();
  writer.set(vec![part("a", "1")]).await.unwrap();

  let before = server.calls();
  match stale.set(vec![part("a", "2")]).await {
    Err(ClientError::Conflict(_)) => {}
    other => panic!("expected Conflict, got {:?}", other),
  }
  // definitive outcome: exactly one remote call
  assert_eq!(server.calls() - before, 1);
}

#[tokio::test]
async fn concurrent_clients_race_for_the_etag() {
  let server = LocalTransport::new();
  let mut alice = StateClient::new(server.clone(), "test-app");
  let mut bob = StateClient::new(server.clone(), "test-app");

  alice.init_app().await.unwrap();
  bob.init_app().await.unwrap();
  assert_eq!(alice.etag(), bob.etag());

  // both present the same etag; exactly one wins
  alice.set(vec![part("a", "alice")]).await.unwrap();
  match bob.set(vec![part("a", "bob")]).await {
    Err(ClientError::Conflict(_)) => {}
    other => panic!("expected Conflict, got {:?}", other),
  }

  // the loser re-reads to adopt the fresh etag, then succeeds
  bob.get::<&str>(&[]).await.unwrap();
  bob.set(vec![part("a", "bob")]).await.unwrap();
  assert_eq!(
    alice.get(&["a"]).await.unwrap(),
    to_map(&[part("a", "bob")])
  );
}

#[tokio::test]
async fn lost_ack_applies_exactly_once() {
  let transport = FaultTransport::new(LocalTransport::new());
  let mut client =
    StateClient::new(transport.clone(), "test-app").with_retry_policy(fast_retry());

  client.init_app().await.unwrap();
  transport.drop_next_acks(1);

  // the first attempt applies but its ack is lost; the automatic retry
  // carries the now-stale etag, so the server answers Conflict instead of
  // applying twice
  match client.set(vec![part("a", "1")]).await {
    Err(ClientError::Conflict(_)) => {}
    other => panic!("expected Conflict, got {:?}", other),
  }

  // the effect landed exactly once; a re-read recovers the fresh etag
  assert_eq!(
    client.get(&["a"]).await.unwrap(),
    to_map(&[part("a", "1")])
  );
  client.set(vec![part("a", "2")]).await.unwrap();
  assert_eq!(
    client.get(&["a"]).await.unwrap(),
    to_map(&[part("a", "2")])
  );
}
