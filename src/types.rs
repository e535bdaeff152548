use std::fmt;

pub type Bytes = Vec<u8>;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct KeyValue {
  pub key: String,
  pub value: Bytes,
}

/// Opaque version stamp identifying the exact state a mutating call is
/// conditioned on. Issued by the service; clients only carry it around.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Etag(String);

impl Etag {
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl From<String> for Etag {
  fn from(raw: String) -> Self {
    Self(raw)
  }
}

impl From<Etag> for String {
  fn from(etag: Etag) -> Self {
    etag.0
  }
}

impl fmt::Display for Etag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("{0}")]
  NotFound(String),

  #[error("invalid etag: {supplied}, expected: {expected}")]
  Conflict { supplied: String, expected: String },
}

pub type Result<T> = std::result::Result<T, Error>;
