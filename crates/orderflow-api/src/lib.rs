//! JSON HTTP API for the order-status pipeline.
//!
//! Exposes an axum [`Router`] over any store that is both the
//! [`EventLog`] and the [`StatusStore`]: a producer endpoint that routes and
//! appends events, read endpoints for the materialized state, and a manual
//! reducer trigger. Auth, TLS and transport concerns are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", orderflow_api::api_router(state))
//! ```

pub mod error;
pub mod events;
pub mod orders;
pub mod reduce;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use orderflow_core::{
  route::{PartitionSet, Partitioner},
  store::{EventLog, StatusStore},
};
use orderflow_pipeline::StatusReducer;

pub use error::ApiError;

/// Shared handler state.
pub struct AppState<S> {
  pub store:       Arc<S>,
  /// Shared with the scheduler so manual and scheduled passes serialize.
  pub reducer:     Arc<StatusReducer<S, S>>,
  pub partitions:  PartitionSet,
  pub partitioner: Partitioner,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:       self.store.clone(),
      reducer:     self.reducer.clone(),
      partitions:  self.partitions.clone(),
      partitioner: self.partitioner,
    }
  }
}

/// Build a fully-materialised API router over `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: AppState<S>) -> Router<()>
where
  S: EventLog + StatusStore + 'static,
{
  Router::new()
    .route("/events", post(events::ingest::<S>))
    .route("/orders", get(orders::list::<S>))
    .route("/orders/{id}", get(orders::get_one::<S>))
    .route("/summary", get(orders::summary::<S>))
    .route("/reduce", post(reduce::run::<S>))
    .with_state(state)
}
