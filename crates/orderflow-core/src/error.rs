//! Error types for `orderflow-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown order status: {0:?}")]
  UnknownStatus(String),

  #[error("malformed event: {0}")]
  MalformedEvent(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
