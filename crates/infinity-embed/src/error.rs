//! Error type for `infinity-embed`.
//!
//! Provider failures are kept distinct from everything else so callers can
//! apply the configured failure policy (fail the write vs. commit without a
//! fresh vector).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The external embedding call failed (network, auth, or provider-side).
  #[error("embedding provider error: {0}")]
  Provider(String),

  /// The provider answered with a vector of the wrong length.
  #[error("embedding has {actual} dimensions, expected {expected}")]
  Dimension { expected: usize, actual: usize },
}

impl From<reqwest::Error> for Error {
  fn from(err: reqwest::Error) -> Self {
    Error::Provider(err.to_string())
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
