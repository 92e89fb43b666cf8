//! Error type for `infinity-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] infinity_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("column decode error: {0}")]
  Decode(String),
}

/// Collapse into the core taxonomy: domain errors pass through, backend
/// plumbing becomes an opaque storage error.
impl From<Error> for infinity_core::Error {
  fn from(err: Error) -> Self {
    match err {
      Error::Core(e) => e,
      Error::Json(e) => infinity_core::Error::Serialization(e),
      other => infinity_core::Error::Storage(other.to_string()),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
