//! Latest-wins reduction rules.
//!
//! Pure steps shared by every store backend:
//!
//! 1. [`group_by_order`] splits an event window into one [`OrderWindow`] per
//!    order, sorted by `(status_ts, event_id)`. The last entry is the
//!    authoritative latest event; equal timestamps resolve to the greatest
//!    `event_id`.
//! 2. [`decide`] compares one candidate against a stored row and yields the
//!    insert/update to apply, or the reason to leave the row alone.
//! 3. [`OrderWindow::resolve`] folds the window's strictly-older events and
//!    then the winner through [`decide`], producing the single write for the
//!    pass. The older events only shape `previous_status`; the winner alone
//!    decides `current_status` and `last_update_ts`.
//!
//! Every guard compares against state, never against a log of seen event ids,
//! so applying the same window twice is a no-op the second time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
  event::{EventRecord, OrderId, OrderStatus},
  state::OrderStatusState,
};

// ─── Dedup-to-latest ─────────────────────────────────────────────────────────

/// `true` if `a` is strictly later than `b` in reduction order.
pub fn supersedes(a: &EventRecord, b: &EventRecord) -> bool {
  (a.status_ts, a.event_id) > (b.status_ts, b.event_id)
}

/// All events for one order within a window, in reduction order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderWindow {
  events: Vec<EventRecord>,
}

impl OrderWindow {
  /// Build a window from events of a single order. Returns `None` when empty.
  pub fn new(mut events: Vec<EventRecord>) -> Option<Self> {
    if events.is_empty() {
      return None;
    }
    events.sort_by(|a, b| (a.status_ts, a.event_id).cmp(&(b.status_ts, b.event_id)));
    Some(Self { events })
  }

  pub fn order_id(&self) -> OrderId { self.latest().order_id }

  /// The authoritative latest event for the order.
  pub fn latest(&self) -> &EventRecord {
    // Non-empty by construction.
    &self.events[self.events.len() - 1]
  }

  pub fn len(&self) -> usize { self.events.len() }

  pub fn is_empty(&self) -> bool { self.events.is_empty() }

  pub fn events(&self) -> &[EventRecord] { &self.events }

  /// Compute the single write this window makes against `existing`.
  pub fn resolve(&self, existing: Option<&OrderStatusState>) -> MergeDecision {
    let winner = self.latest();
    let mut state = existing.cloned();

    for event in self.events.iter().filter(|e| e.status_ts < winner.status_ts) {
      if let Some(row) = decide(state.as_ref(), event).into_row() {
        state = Some(row);
      }
    }

    let mut skip = None;
    match decide(state.as_ref(), winner) {
      MergeDecision::Skip(reason) => match state.as_mut() {
        // The winner repeats a status reached earlier in this window. It is
        // not a transition, but it is still the newest event for the order.
        Some(row) if Some(&*row) != existing && row.current_status == winner.new_status => {
          row.customer_id = winner.customer_id;
          row.last_update_ts = winner.status_ts;
        }
        _ => skip = Some(reason),
      },
      decision => state = decision.into_row(),
    }

    match (existing, state) {
      (None, Some(row)) => MergeDecision::Insert(row),
      (Some(prev), Some(row)) if *prev != row => MergeDecision::Update(row),
      _ => MergeDecision::Skip(skip.unwrap_or(SkipReason::Stale)),
    }
  }
}

/// Split `events` into per-order windows.
///
/// The result does not depend on the iteration order of `events`.
pub fn group_by_order<I>(events: I) -> BTreeMap<OrderId, OrderWindow>
where
  I: IntoIterator<Item = EventRecord>,
{
  let mut grouped: BTreeMap<OrderId, Vec<EventRecord>> = BTreeMap::new();
  for event in events {
    grouped.entry(event.order_id).or_default().push(event);
  }
  grouped
    .into_iter()
    .filter_map(|(order_id, events)| OrderWindow::new(events).map(|w| (order_id, w)))
    .collect()
}

// ─── Conditional merge ───────────────────────────────────────────────────────

/// Why a candidate left the stored row untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
  /// `status_ts` is not strictly newer than `last_update_ts`.
  Stale,
  /// The candidate repeats the current status.
  SameStatus,
}

/// What to write for one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeDecision {
  Insert(OrderStatusState),
  Update(OrderStatusState),
  Skip(SkipReason),
}

/// The result of merging one order's window into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MergeOutcome {
  Inserted,
  Updated { from: OrderStatus },
  Skipped { reason: SkipReason },
}

/// Decide how a single `candidate` changes `existing`.
///
/// An absent row behaves as `last_update_ts = -inf`, `current_status = null`.
pub fn decide(
  existing: Option<&OrderStatusState>,
  candidate: &EventRecord,
) -> MergeDecision {
  let Some(current) = existing else {
    return MergeDecision::Insert(OrderStatusState {
      order_id:        candidate.order_id,
      customer_id:     candidate.customer_id,
      previous_status: None,
      current_status:  candidate.new_status,
      last_update_ts:  candidate.status_ts,
    });
  };

  if candidate.status_ts <= current.last_update_ts {
    return MergeDecision::Skip(SkipReason::Stale);
  }
  if candidate.new_status == current.current_status {
    return MergeDecision::Skip(SkipReason::SameStatus);
  }

  MergeDecision::Update(OrderStatusState {
    order_id:        current.order_id,
    customer_id:     candidate.customer_id,
    previous_status: Some(current.current_status),
    current_status:  candidate.new_status,
    last_update_ts:  candidate.status_ts,
  })
}

impl MergeDecision {
  /// The row to write, if any.
  pub fn into_row(self) -> Option<OrderStatusState> {
    match self {
      Self::Insert(row) | Self::Update(row) => Some(row),
      Self::Skip(_) => None,
    }
  }

  /// The outcome reported once this decision has been applied to `existing`.
  pub fn outcome(&self, existing: Option<&OrderStatusState>) -> MergeOutcome {
    match (self, existing) {
      (Self::Update(_), Some(prev)) => MergeOutcome::Updated { from: prev.current_status },
      (Self::Skip(reason), _) => MergeOutcome::Skipped { reason: *reason },
      _ => MergeOutcome::Inserted,
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::{DateTime, TimeZone, Utc};
  use uuid::Uuid;

  use super::*;

  fn ts(secs: i64) -> DateTime<Utc> { Utc.timestamp_opt(secs, 0).unwrap() }

  fn event(order_id: OrderId, status: OrderStatus, secs: i64) -> EventRecord {
    EventRecord {
      event_id: Uuid::new_v4(),
      order_id,
      customer_id: 100 + order_id,
      new_status: status,
      status_ts: ts(secs),
      source: None,
    }
  }

  fn row(
    order_id: OrderId,
    previous: Option<OrderStatus>,
    current: OrderStatus,
    secs: i64,
  ) -> OrderStatusState {
    OrderStatusState {
      order_id,
      customer_id: 100 + order_id,
      previous_status: previous,
      current_status: current,
      last_update_ts: ts(secs),
    }
  }

  /// Fold a window into an in-memory table with the same rules a store uses.
  fn apply(table: &mut BTreeMap<OrderId, OrderStatusState>, window: &[EventRecord]) {
    for (order_id, order_window) in group_by_order(window.iter().cloned()) {
      if let Some(row) = order_window.resolve(table.get(&order_id)).into_row() {
        table.insert(order_id, row);
      }
    }
  }

  // ─── Grouping ──────────────────────────────────────────────────────────────

  #[test]
  fn latest_is_independent_of_arrival_order() {
    let paid = event(7, OrderStatus::Paid, 10);
    let shipped = event(7, OrderStatus::Shipped, 20);
    let other = event(8, OrderStatus::Created, 30);

    for window in [
      vec![paid.clone(), shipped.clone()],
      vec![shipped.clone(), paid.clone()],
      vec![shipped.clone(), other.clone(), paid.clone()],
    ] {
      let grouped = group_by_order(window);
      assert_eq!(grouped[&7].latest().event_id, shipped.event_id);
      assert_eq!(grouped[&7].len(), 2);
    }
  }

  #[test]
  fn equal_timestamps_break_ties_on_event_id() {
    let mut a = event(9, OrderStatus::Packed, 50);
    let mut b = event(9, OrderStatus::Shipped, 50);
    a.event_id = Uuid::from_u128(1);
    b.event_id = Uuid::from_u128(2);

    for _ in 0..5 {
      let forward = group_by_order([a.clone(), b.clone()]);
      let backward = group_by_order([b.clone(), a.clone()]);
      assert_eq!(forward[&9].latest().event_id, b.event_id);
      assert_eq!(backward[&9].latest().event_id, b.event_id);

      let resolved = forward[&9].resolve(None).into_row().unwrap();
      assert_eq!(resolved.current_status, OrderStatus::Shipped);
    }
  }

  #[test]
  fn empty_window_is_rejected() {
    assert!(OrderWindow::new(Vec::new()).is_none());
  }

  // ─── decide ────────────────────────────────────────────────────────────────

  #[test]
  fn first_event_inserts_with_no_previous_status() {
    let candidate = event(1, OrderStatus::Created, 1);
    let decision = decide(None, &candidate);
    assert_eq!(decision.outcome(None), MergeOutcome::Inserted);
    assert_eq!(decision.into_row(), Some(row(1, None, OrderStatus::Created, 1)));
  }

  #[test]
  fn older_or_equal_timestamp_is_stale() {
    let stored = row(3, None, OrderStatus::Paid, 10);
    for secs in [5, 10] {
      let candidate = event(3, OrderStatus::Shipped, secs);
      assert_eq!(decide(Some(&stored), &candidate), MergeDecision::Skip(SkipReason::Stale));
    }
  }

  #[test]
  fn newer_event_with_same_status_is_a_no_op() {
    let stored = row(4, Some(OrderStatus::Created), OrderStatus::Paid, 10);
    let candidate = event(4, OrderStatus::Paid, 15);
    assert_eq!(
      decide(Some(&stored), &candidate),
      MergeDecision::Skip(SkipReason::SameStatus)
    );

    let window = OrderWindow::new(vec![candidate]).unwrap();
    assert_eq!(window.resolve(Some(&stored)), MergeDecision::Skip(SkipReason::SameStatus));
  }

  #[test]
  fn accepted_update_shifts_status_and_overwrites_customer() {
    let stored = row(5, Some(OrderStatus::Created), OrderStatus::Paid, 10);
    let mut candidate = event(5, OrderStatus::Packed, 11);
    candidate.customer_id = 2;

    let decision = decide(Some(&stored), &candidate);
    assert_eq!(
      decision.outcome(Some(&stored)),
      MergeOutcome::Updated { from: OrderStatus::Paid }
    );
    let updated = decision.into_row().unwrap();
    assert_eq!(updated.previous_status, Some(OrderStatus::Paid));
    assert_eq!(updated.current_status, OrderStatus::Packed);
    assert_eq!(updated.customer_id, 2);
    assert_eq!(updated.last_update_ts, ts(11));
  }

  // ─── Whole-window properties ───────────────────────────────────────────────

  #[test]
  fn single_window_end_to_end() {
    let window = vec![
      event(1, OrderStatus::Created, 1),
      event(1, OrderStatus::Paid, 2),
      event(1, OrderStatus::Shipped, 3),
    ];
    let mut table = BTreeMap::new();
    apply(&mut table, &window);

    assert_eq!(table[&1], row(1, Some(OrderStatus::Paid), OrderStatus::Shipped, 3));
  }

  #[test]
  fn reordered_window_yields_same_state() {
    let paid = event(7, OrderStatus::Paid, 10);
    let shipped = event(7, OrderStatus::Shipped, 20);
    let noise = event(8, OrderStatus::Created, 15);

    for window in [
      vec![shipped.clone(), paid.clone()],
      vec![paid.clone(), shipped.clone()],
      vec![shipped.clone(), noise.clone(), paid.clone()],
    ] {
      let mut table = BTreeMap::new();
      apply(&mut table, &window);
      assert_eq!(table[&7], row(7, Some(OrderStatus::Paid), OrderStatus::Shipped, 20));
    }
  }

  #[test]
  fn trailing_repeat_of_status_carries_the_latest_timestamp() {
    let window = vec![
      event(2, OrderStatus::Paid, 10),
      event(2, OrderStatus::Shipped, 20),
      event(2, OrderStatus::Shipped, 25),
    ];
    let mut table = BTreeMap::new();
    apply(&mut table, &window);
    assert_eq!(table[&2], row(2, Some(OrderStatus::Paid), OrderStatus::Shipped, 25));
  }

  #[test]
  fn repeated_status_window_inserts_the_latest_event() {
    let window = OrderWindow::new(vec![
      event(6, OrderStatus::Paid, 20),
      event(6, OrderStatus::Paid, 10),
    ])
    .unwrap();
    let inserted = window.resolve(None);
    assert_eq!(inserted, MergeDecision::Insert(row(6, None, OrderStatus::Paid, 20)));

    // A late event older than the newest known one stays out.
    let stored = inserted.into_row().unwrap();
    let late = OrderWindow::new(vec![event(6, OrderStatus::Shipped, 15)]).unwrap();
    assert_eq!(late.resolve(Some(&stored)), MergeDecision::Skip(SkipReason::Stale));
  }

  #[test]
  fn repeated_status_window_moves_an_existing_row_once() {
    let stored = row(6, None, OrderStatus::Created, 5);
    let window = OrderWindow::new(vec![
      event(6, OrderStatus::Paid, 10),
      event(6, OrderStatus::Paid, 20),
    ])
    .unwrap();
    assert_eq!(
      window.resolve(Some(&stored)),
      MergeDecision::Update(row(6, Some(OrderStatus::Created), OrderStatus::Paid, 20))
    );

    // Repeating the stored status is still a no-op.
    let stored = row(6, Some(OrderStatus::Created), OrderStatus::Paid, 15);
    assert_eq!(window.resolve(Some(&stored)), MergeDecision::Skip(SkipReason::SameStatus));
  }

  #[test]
  fn reapplying_a_window_is_idempotent() {
    let window = vec![
      event(1, OrderStatus::Created, 1),
      event(2, OrderStatus::Paid, 4),
      event(1, OrderStatus::Packed, 6),
      event(2, OrderStatus::Paid, 9),
      event(2, OrderStatus::Shipped, 9),
      event(3, OrderStatus::Delivered, 2),
      event(1, OrderStatus::Packed, 8),
    ];
    let mut once = BTreeMap::new();
    apply(&mut once, &window);

    let mut twice = once.clone();
    apply(&mut twice, &window);
    assert_eq!(once, twice);

    for (order_id, order_window) in group_by_order(window) {
      assert!(matches!(
        order_window.resolve(once.get(&order_id)),
        MergeDecision::Skip(_)
      ));
    }
  }

  #[test]
  fn last_update_ts_never_moves_backwards() {
    let windows = [
      vec![event(1, OrderStatus::Paid, 20)],
      vec![event(1, OrderStatus::Created, 5)],
      vec![event(1, OrderStatus::Shipped, 30), event(1, OrderStatus::Packed, 25)],
      vec![event(1, OrderStatus::Delivered, 29)],
    ];
    let mut table = BTreeMap::new();
    let mut last = None;
    for window in &windows {
      apply(&mut table, window);
      let now = table[&1].last_update_ts;
      if let Some(prev) = last {
        assert!(now >= prev);
      }
      last = Some(now);
    }
    assert_eq!(table[&1], row(1, Some(OrderStatus::Packed), OrderStatus::Shipped, 30));
  }
}
