//! [`StatusReducer`] runs latest-wins passes from the event log into the state
//! store.
//!
//! A pass loads the stored cursor and walks the log past it one page at a
//! time. Each page is grouped per order, every order's window is merged
//! atomically, and only then is the cursor saved at the highest position in
//! the page. A failure leaves the cursor after the last completed page;
//! re-running a page is harmless because merges compare against stored state.

use std::{sync::Arc, time::Instant};

use orderflow_core::{
  event::EventRecord,
  reduce::{MergeOutcome, SkipReason, group_by_order},
  store::{EventLog, LogPosition, StatusStore},
};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::ReduceError;

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ReducerConfig {
  /// Name under which the change-tracking cursor is stored.
  pub cursor_name: String,
  /// Rows fetched from the log per read.
  pub page_size:   usize,
}

impl Default for ReducerConfig {
  fn default() -> Self {
    Self { cursor_name: "order_status".to_owned(), page_size: 500 }
  }
}

// ─── Report ──────────────────────────────────────────────────────────────────

/// What one pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
  /// Cursor at the start of the pass.
  pub cursor_from: LogPosition,
  /// Cursor saved at the end of the pass.
  pub cursor:      LogPosition,
  pub events_read: usize,
  /// Rows skipped because they could not be decoded.
  pub malformed:   usize,
  /// Order windows merged; an order spanning two pages counts twice.
  pub orders:      usize,
  pub inserted:    usize,
  pub updated:     usize,
  /// Orders whose window was entirely older than the stored state.
  pub stale:       usize,
  /// Orders whose window only repeated the stored status.
  pub unchanged:   usize,
  pub elapsed_ms:  u64,
}

impl PassReport {
  /// Add the merge counts of one page.
  fn absorb(&mut self, page: &PassReport) {
    self.events_read += page.events_read;
    self.orders += page.orders;
    self.inserted += page.inserted;
    self.updated += page.updated;
    self.stale += page.stale;
    self.unchanged += page.unchanged;
  }

  fn record(&mut self, outcome: MergeOutcome) {
    match outcome {
      MergeOutcome::Inserted => self.inserted += 1,
      MergeOutcome::Updated { .. } => self.updated += 1,
      MergeOutcome::Skipped { reason: SkipReason::Stale } => self.stale += 1,
      MergeOutcome::Skipped { reason: SkipReason::SameStatus } => self.unchanged += 1,
    }
  }
}

// ─── Reducer ─────────────────────────────────────────────────────────────────

/// Latest-wins reducer over an [`EventLog`] and a [`StatusStore`].
///
/// Passes are serialized: a second caller waits for the pass in flight to
/// finish, then starts from the cursor it saved.
pub struct StatusReducer<L, S> {
  log:       Arc<L>,
  store:     Arc<S>,
  config:    ReducerConfig,
  pass_lock: Mutex<()>,
}

impl<L, S> StatusReducer<L, S>
where
  L: EventLog,
  S: StatusStore,
{
  pub fn new(log: Arc<L>, store: Arc<S>, config: ReducerConfig) -> Self {
    Self { log, store, config, pass_lock: Mutex::new(()) }
  }

  pub fn config(&self) -> &ReducerConfig { &self.config }

  /// Reduce every event appended since the last completed pass.
  ///
  /// The log is consumed one page at a time: each page is merged and the
  /// cursor saved past it before the next page is read.
  pub async fn run_pass(&self) -> Result<PassReport, ReduceError> {
    let _guard = self.pass_lock.lock().await;
    let started = Instant::now();
    let page_size = self.config.page_size.max(1);

    let cursor_from = self
      .store
      .load_cursor(&self.config.cursor_name)
      .await
      .map_err(ReduceError::store)?;

    let mut report = PassReport { cursor_from, cursor: cursor_from, ..PassReport::default() };
    loop {
      let batch = self
        .log
        .read_after(report.cursor, page_size)
        .await
        .map_err(ReduceError::log)?;
      let Some(high_water) = batch.high_water() else { break };

      for bad in &batch.malformed {
        tracing::warn!(
          position = bad.position.0,
          reason = %bad.reason,
          "skipping malformed event"
        );
      }
      report.malformed += batch.malformed.len();

      let full_page = batch.len() >= page_size;
      let page = self
        .merge_all(batch.events.into_iter().map(|logged| logged.event).collect())
        .await?;
      report.absorb(&page);

      self
        .store
        .save_cursor(&self.config.cursor_name, high_water)
        .await
        .map_err(ReduceError::store)?;
      report.cursor = high_water;

      if !full_page {
        break;
      }
    }

    report.elapsed_ms = started.elapsed().as_millis() as u64;
    tracing::info!(
      cursor_from = report.cursor_from.0,
      cursor = report.cursor.0,
      events = report.events_read,
      malformed = report.malformed,
      orders = report.orders,
      inserted = report.inserted,
      updated = report.updated,
      stale = report.stale,
      unchanged = report.unchanged,
      elapsed_ms = report.elapsed_ms,
      "reducer pass complete"
    );
    Ok(report)
  }

  /// Reduce an in-memory window without touching any cursor.
  pub async fn reduce_window(&self, events: Vec<EventRecord>) -> Result<PassReport, ReduceError> {
    let _guard = self.pass_lock.lock().await;
    let started = Instant::now();
    let mut report = self.merge_all(events).await?;
    report.elapsed_ms = started.elapsed().as_millis() as u64;
    Ok(report)
  }

  async fn merge_all(&self, events: Vec<EventRecord>) -> Result<PassReport, ReduceError> {
    let mut report = PassReport { events_read: events.len(), ..PassReport::default() };

    let windows = group_by_order(events);
    report.orders = windows.len();

    for (order_id, window) in windows {
      let outcome = self
        .store
        .merge_window(window)
        .await
        .map_err(ReduceError::store)?;
      tracing::debug!(order_id, ?outcome, "merged order window");
      report.record(outcome);
    }
    Ok(report)
  }
}
