//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with a fixed nanosecond fraction
//! and a `Z` suffix, so text comparison in SQL orders them chronologically.
//! UUIDs are stored as hyphenated lowercase strings; statuses as upper-case
//! names.

use chrono::{DateTime, SecondsFormat, Utc};
use orderflow_core::{
  event::{EventRecord, OrderStatus},
  state::OrderStatusState,
  store::{LogPosition, LoggedEvent},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("{s:?}: {e}")))
}

// ─── OrderStatus ─────────────────────────────────────────────────────────────

pub fn encode_status(s: OrderStatus) -> &'static str { s.as_str() }

pub fn decode_status(s: &str) -> Result<OrderStatus> { Ok(OrderStatus::parse(s)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

pub const EVENT_COLUMNS: &str =
  "position, event_id, order_id, customer_id, new_status, status_ts, source, partition_id";

/// Raw values read directly from an `events` row.
pub struct RawEvent {
  pub position:     i64,
  pub event_id:     String,
  pub order_id:     i64,
  pub customer_id:  i64,
  pub new_status:   String,
  pub status_ts:    String,
  pub source:       Option<String>,
  pub partition_id: i64,
}

impl RawEvent {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      position:     row.get(0)?,
      event_id:     row.get(1)?,
      order_id:     row.get(2)?,
      customer_id:  row.get(3)?,
      new_status:   row.get(4)?,
      status_ts:    row.get(5)?,
      source:       row.get(6)?,
      partition_id: row.get(7)?,
    })
  }

  pub fn position(&self) -> LogPosition { LogPosition(self.position) }

  pub fn into_logged(self) -> Result<LoggedEvent> {
    let event = EventRecord {
      event_id:    decode_uuid(&self.event_id)?,
      order_id:    self.order_id,
      customer_id: self.customer_id,
      new_status:  decode_status(&self.new_status)?,
      status_ts:   decode_dt(&self.status_ts)?,
      source:      self.source,
    };
    let partition = u32::try_from(self.partition_id)
      .map_err(|_| Error::Decode(format!("partition out of range: {}", self.partition_id)))?;

    Ok(LoggedEvent { position: LogPosition(self.position), partition, event })
  }
}

pub const STATE_COLUMNS: &str =
  "order_id, customer_id, previous_status, current_status, last_update_ts";

/// Raw values read directly from an `order_status` row.
pub struct RawState {
  pub order_id:        i64,
  pub customer_id:     i64,
  pub previous_status: Option<String>,
  pub current_status:  String,
  pub last_update_ts:  String,
}

impl RawState {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      order_id:        row.get(0)?,
      customer_id:     row.get(1)?,
      previous_status: row.get(2)?,
      current_status:  row.get(3)?,
      last_update_ts:  row.get(4)?,
    })
  }

  pub fn into_state(self) -> Result<OrderStatusState> {
    Ok(OrderStatusState {
      order_id:        self.order_id,
      customer_id:     self.customer_id,
      previous_status: self.previous_status.as_deref().map(decode_status).transpose()?,
      current_status:  decode_status(&self.current_status)?,
      last_update_ts:  decode_dt(&self.last_update_ts)?,
    })
  }
}
