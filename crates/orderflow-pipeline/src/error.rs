//! Error type for reducer passes.

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Why a pass was abandoned. Either way no cursor was advanced, so the next
/// pass retries the same window.
#[derive(Debug, Error)]
pub enum ReduceError {
  #[error("event log error: {0}")]
  Log(#[source] BoxError),

  #[error("state store error: {0}")]
  Store(#[source] BoxError),
}

impl ReduceError {
  pub(crate) fn log(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Log(Box::new(e))
  }

  pub(crate) fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}
