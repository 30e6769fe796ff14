//! The `EventLog` and `StatusStore` traits and supporting types.
//!
//! Both traits are implemented by storage backends (e.g.
//! `orderflow-store-sqlite`). The reducer and the API depend on these
//! abstractions, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  event::{EventRecord, OrderId, OrderStatus},
  reduce::{MergeOutcome, OrderWindow},
  state::{OrderStatusState, StatusSummary},
};

// ─── Log positions ───────────────────────────────────────────────────────────

/// Ingestion position of an event in the log. Assigned by the log, strictly
/// increasing in append order, unrelated to `status_ts`.
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct LogPosition(pub i64);

impl LogPosition {
  /// Position before the first event.
  pub const ORIGIN: Self = Self(0);
}

/// Result of [`EventLog::append`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appended {
  pub position: LogPosition,
  pub partition: u32,
  /// `false` when the `event_id` was already in the log.
  pub inserted: bool,
}

/// A stored event read back from the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedEvent {
  pub position:  LogPosition,
  pub partition: u32,
  pub event:     EventRecord,
}

/// A log row that could not be decoded into an [`EventRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MalformedEvent {
  pub position: LogPosition,
  pub reason:   String,
}

/// One page of the log past a cursor.
#[derive(Debug, Clone, Default)]
pub struct LogBatch {
  pub events:    Vec<LoggedEvent>,
  pub malformed: Vec<MalformedEvent>,
}

impl LogBatch {
  /// Number of rows read, decodable or not.
  pub fn len(&self) -> usize { self.events.len() + self.malformed.len() }

  pub fn is_empty(&self) -> bool { self.len() == 0 }

  /// The highest position in this batch, if any.
  pub fn high_water(&self) -> Option<LogPosition> {
    let events = self.events.iter().map(|e| e.position);
    let malformed = self.malformed.iter().map(|m| m.position);
    events.chain(malformed).max()
  }
}

/// Raw-log summary shown on the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogStats {
  pub total_events:  u64,
  pub unique_orders: u64,
  pub latest_event:  Option<DateTime<Utc>>,
}

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`StatusStore::list_states`].
#[derive(Debug, Clone, Default)]
pub struct StateQuery {
  /// Restrict to orders currently in this status.
  pub status: Option<OrderStatus>,
  pub limit:  Option<usize>,
}

// ─── Traits ──────────────────────────────────────────────────────────────────

/// Append-only log of status-change events.
///
/// Events are never updated or removed. Readers consume it by cursor.
pub trait EventLog: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Append `event` as routed to `partition`. Appending an `event_id` that is
  /// already present leaves the log unchanged and reports `inserted = false`.
  fn append(
    &self,
    event: EventRecord,
    partition: u32,
  ) -> impl Future<Output = Result<Appended, Self::Error>> + Send + '_;

  /// Read up to `limit` rows with position strictly greater than `cursor`,
  /// ascending by position.
  fn read_after(
    &self,
    cursor: LogPosition,
    limit: usize,
  ) -> impl Future<Output = Result<LogBatch, Self::Error>> + Send + '_;

  fn stats(&self) -> impl Future<Output = Result<LogStats, Self::Error>> + Send + '_;
}

/// Durable materialized state, one row per order, plus reducer cursors.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait StatusStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Merge ─────────────────────────────────────────────────────────────

  /// Resolve `window` against the stored row for its order and write the
  /// result. Read, decide and write happen atomically for that row; a
  /// concurrent writer can never interleave between them.
  fn merge_window(
    &self,
    window: OrderWindow,
  ) -> impl Future<Output = Result<MergeOutcome, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Current state for one order. Returns `None` if never seen.
  fn get_state(
    &self,
    order_id: OrderId,
  ) -> impl Future<Output = Result<Option<OrderStatusState>, Self::Error>> + Send + '_;

  /// Current-state rows ordered by `last_update_ts`, most recent first.
  fn list_states<'a>(
    &'a self,
    query: &'a StateQuery,
  ) -> impl Future<Output = Result<Vec<OrderStatusState>, Self::Error>> + Send + 'a;

  fn summary(&self) -> impl Future<Output = Result<StatusSummary, Self::Error>> + Send + '_;

  // ── Cursors ───────────────────────────────────────────────────────────

  /// The last log position fully reduced by the named reader, or
  /// [`LogPosition::ORIGIN`] if it has never completed a pass.
  fn load_cursor<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<LogPosition, Self::Error>> + Send + 'a;

  /// Record progress for the named reader. Never moves a cursor backwards.
  fn save_cursor<'a>(
    &'a self,
    name: &'a str,
    position: LogPosition,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
