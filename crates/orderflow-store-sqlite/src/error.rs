//! Error type for `orderflow-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] orderflow_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  /// A stored value could not be decoded into its domain type.
  #[error("decode error: {0}")]
  Decode(String),

  /// The row changed between the read and the conditional write of a merge.
  #[error("order {0} was modified concurrently")]
  MergeConflict(i64),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
