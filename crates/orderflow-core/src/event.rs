//! Event types: the immutable status-change facts that feed the pipeline.
//!
//! An event is produced once and never updated or deleted. Its `status_ts` is
//! the ordering field; ingestion order carries no meaning for reduction.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::{Error, Result};

pub type OrderId = i64;
pub type CustomerId = i64;

// ─── Status vocabulary ───────────────────────────────────────────────────────

/// The finite set of statuses an order can report. No transition order is
/// enforced at the event level.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
  IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum OrderStatus {
  Created,
  Paid,
  Packed,
  Shipped,
  Delivered,
}

impl OrderStatus {
  /// The upper-case form stored in the database and sent on the wire.
  pub fn as_str(self) -> &'static str { self.into() }

  /// Parse a status name, ignoring ASCII case.
  pub fn parse(s: &str) -> Result<Self> {
    Self::from_str(s.trim()).map_err(|_| Error::UnknownStatus(s.to_owned()))
  }
}

// ─── EventRecord ─────────────────────────────────────────────────────────────

/// One status-change fact for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
  /// Globally unique; used for dedup, tracing and tie-breaks, never for
  /// ordering.
  pub event_id:    Uuid,
  pub order_id:    OrderId,
  /// Carried through to the materialized state.
  pub customer_id: CustomerId,
  pub new_status:  OrderStatus,
  /// When the status change happened, distinct from ingestion time.
  pub status_ts:   DateTime<Utc>,
  /// Free-text provenance tag, e.g. `"kafka_producer"`.
  pub source:      Option<String>,
}

/// Wire shape accepted from producers before validation.
#[derive(Deserialize)]
struct RawEvent {
  event_id:    Uuid,
  order_id:    OrderId,
  customer_id: CustomerId,
  new_status:  String,
  status_ts:   DateTime<Utc>,
  #[serde(default)]
  source:      Option<String>,
}

impl EventRecord {
  /// Validate a producer-supplied JSON document.
  ///
  /// Missing fields, unparseable identifiers or timestamps and unknown
  /// statuses all surface as [`Error::MalformedEvent`].
  pub fn from_json(value: serde_json::Value) -> Result<Self> {
    let raw: RawEvent = serde_json::from_value(value)
      .map_err(|e| Error::MalformedEvent(e.to_string()))?;
    let new_status = OrderStatus::parse(&raw.new_status)
      .map_err(|e| Error::MalformedEvent(e.to_string()))?;

    Ok(Self {
      event_id: raw.event_id,
      order_id: raw.order_id,
      customer_id: raw.customer_id,
      new_status,
      status_ts: raw.status_ts,
      source: raw.source,
    })
  }

  /// Broker message key: the decimal order id.
  pub fn order_key(&self) -> String { self.order_id.to_string() }

  /// Key understood by [`crate::route::route_by_customer_id`].
  pub fn customer_key(&self) -> String { format!("customer:{}", self.customer_id) }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn status_parse_ignores_case() {
    assert_eq!(OrderStatus::parse("shipped").unwrap(), OrderStatus::Shipped);
    assert_eq!(OrderStatus::parse(" PAID ").unwrap(), OrderStatus::Paid);
    assert!(matches!(
      OrderStatus::parse("LOST"),
      Err(Error::UnknownStatus(s)) if s == "LOST"
    ));
  }

  #[test]
  fn status_string_forms_are_upper_case() {
    assert_eq!(OrderStatus::Delivered.as_str(), "DELIVERED");
    assert_eq!(OrderStatus::Packed.to_string(), "PACKED");
    assert_eq!(serde_json::to_value(OrderStatus::Created).unwrap(), json!("CREATED"));
  }

  #[test]
  fn from_json_accepts_producer_shape() {
    let id = Uuid::new_v4();
    let event = EventRecord::from_json(json!({
      "event_id":    id,
      "order_id":    7,
      "customer_id": 123,
      "new_status":  "paid",
      "status_ts":   "2025-01-02T03:04:05Z",
      "source":      "kafka_producer",
    }))
    .unwrap();

    assert_eq!(event.event_id, id);
    assert_eq!(event.order_id, 7);
    assert_eq!(event.new_status, OrderStatus::Paid);
    assert_eq!(event.source.as_deref(), Some("kafka_producer"));
    assert_eq!(event.order_key(), "7");
    assert_eq!(event.customer_key(), "customer:123");
  }

  #[test]
  fn from_json_rejects_missing_fields_and_unknown_status() {
    let missing = EventRecord::from_json(json!({
      "event_id": Uuid::new_v4(),
      "order_id": 1,
    }));
    assert!(matches!(missing, Err(Error::MalformedEvent(_))));

    let unknown = EventRecord::from_json(json!({
      "event_id":    Uuid::new_v4(),
      "order_id":    1,
      "customer_id": 1,
      "new_status":  "TELEPORTED",
      "status_ts":   "2025-01-02T03:04:05Z",
    }));
    assert!(matches!(unknown, Err(Error::MalformedEvent(_))));
  }
}
