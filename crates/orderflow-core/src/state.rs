//! Materialized state: one current/previous-status record per order.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{CustomerId, OrderId, OrderStatus};

/// The current-state row for an order. Created on the first accepted event,
/// mutated in place by later accepted events, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusState {
  pub order_id:        OrderId,
  /// Overwritten on each accepted update.
  pub customer_id:     CustomerId,
  /// The `current_status` that the latest accepted update replaced.
  pub previous_status: Option<OrderStatus>,
  pub current_status:  OrderStatus,
  /// `status_ts` of the event that produced this state. Non-decreasing.
  pub last_update_ts:  DateTime<Utc>,
}

/// Aggregate view over the state table, as shown on the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
  pub tracked_orders: u64,
  pub latest_update:  Option<DateTime<Utc>>,
  /// Number of orders per `current_status`; statuses with no orders are
  /// omitted.
  pub distribution:   BTreeMap<OrderStatus, u64>,
}
