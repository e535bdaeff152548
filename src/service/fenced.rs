use super::interface::{AppStateManager, Checkpoint, StateManager};
use crate::types::{Error, Etag, KeyValue, Result};
use rand::{distributions::Alphanumeric, Rng};

/// Etag fencing over a [`StateManager`]: every mutating call must present the
/// etag of the state it was issued against, and every accepted call returns a
/// fresh one. At most one concurrent mutation can win any given etag; the
/// rest are rejected with [`Error::Conflict`] and leave state untouched.
#[derive(Debug)]
pub struct FencedStateManager<M> {
  manager: M,
  // Some string which is different across process restarts
  run_id: String,
}

impl<M: StateManager> FencedStateManager<M> {
  pub fn new(manager: M) -> Self {
    let run_id = rand::thread_rng()
      .sample_iter(&Alphanumeric)
      .take(6)
      .map(char::from)
      .collect();
    Self { manager, run_id }
  }

  fn etag_for(&self, app: &M::AppStateManager) -> Etag {
    Etag::from(format!("{}-{}", self.run_id, app.modifications_number()))
  }

  fn check_etag(&self, supplied: &Etag, app: &M::AppStateManager) -> Result<()> {
    let expected = self.etag_for(app);
    if *supplied == expected {
      Ok(())
    } else {
      Err(Error::Conflict {
        supplied: supplied.to_string(),
        expected: expected.to_string(),
      })
    }
  }

  fn with_app<Out>(
    &self,
    id: &str,
    f: impl FnOnce(&mut M::AppStateManager) -> Result<Out>,
  ) -> Result<(Etag, Out)> {
    self.manager.with_app(id, |app| {
      let out = f(app)?;
      Ok((self.etag_for(app), out))
    })?
  }

  pub fn init_app(&self, id: &str) -> Result<Etag> {
    self.manager.init_app(id)?;
    let (etag, ()) = self.with_app(id, |_app| Ok(()))?;
    Ok(etag)
  }

  pub fn get<Key: AsRef<str>>(&self, id: &str, keys: &[Key]) -> Result<(Etag, Vec<KeyValue>)> {
    self.with_app(id, |app| app.get(keys))
  }

  pub fn set(&self, id: &str, etag: &Etag, parts: Vec<KeyValue>) -> Result<Etag> {
    let (etag, ()) = self.with_app(id, |app| {
      self.check_etag(etag, app)?;
      app.set(parts)
    })?;
    Ok(etag)
  }

  pub fn checkpoints(&self, id: &str) -> Result<(Etag, Vec<Checkpoint>)> {
    self.with_app(id, |app| app.get_checkpoints())
  }

  pub fn create_checkpoint(&self, id: &str, etag: &Etag, payload: &str) -> Result<(Etag, String)> {
    self.with_app(id, |app| {
      self.check_etag(etag, app)?;
      app.create_checkpoint(payload)
    })
  }

  pub fn revert(&self, id: &str, etag: &Etag, checkpoint_id: &str) -> Result<Etag> {
    let (etag, ()) = self.with_app(id, |app| {
      self.check_etag(etag, app)?;
      app.revert(checkpoint_id)
    })?;
    Ok(etag)
  }

  pub fn cleanup(&self, id: &str, etag: &Etag, until_checkpoint: &str) -> Result<Etag> {
    let (etag, ()) = self.with_app(id, |app| {
      self.check_etag(etag, app)?;
      app.cleanup(until_checkpoint)
    })?;
    Ok(etag)
  }

  pub fn reset(&self, id: &str, etag: &Etag) -> Result<Etag> {
    let (etag, ()) = self.with_app(id, |app| {
      self.check_etag(etag, app)?;
      app.reset()
    })?;
    Ok(etag)
  }
}
