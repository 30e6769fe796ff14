//! [`SqliteStore`], the SQLite implementation of [`EventLog`] and
//! [`StatusStore`].

use std::{collections::BTreeMap, path::Path};

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, TransactionBehavior};

use orderflow_core::{
  event::{EventRecord, OrderId},
  reduce::{MergeDecision, MergeOutcome, OrderWindow},
  state::{OrderStatusState, StatusSummary},
  store::{
    Appended, EventLog, LogBatch, LogPosition, LogStats, MalformedEvent, StateQuery,
    StatusStore,
  },
};

use crate::{
  encode::{
    EVENT_COLUMNS, RawEvent, RawState, STATE_COLUMNS, decode_dt, decode_status, encode_dt,
    encode_status, encode_uuid,
  },
  schema::SCHEMA,
  Error, Result,
};

/// Row cap for [`StatusStore::list_states`] when the query sets none.
const DEFAULT_LIST_LIMIT: usize = 1000;

// ─── Store ───────────────────────────────────────────────────────────────────

/// An event log and state store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  #[cfg(test)]
  pub(crate) fn connection(&self) -> &tokio_rusqlite::Connection { &self.conn }
}

/// Read, resolve and conditionally write one order's row inside a single
/// immediate transaction.
///
/// The UPDATE is additionally guarded on the `current_status` and
/// `last_update_ts` that were read, so it only lands on the row the decision
/// was computed from.
fn merge_in_tx(conn: &mut rusqlite::Connection, window: &OrderWindow) -> Result<MergeOutcome> {
  let order_id = window.order_id();
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

  let existing = tx
    .query_row(
      &format!("SELECT {STATE_COLUMNS} FROM order_status WHERE order_id = ?1"),
      rusqlite::params![order_id],
      RawState::from_row,
    )
    .optional()?
    .map(RawState::into_state)
    .transpose()?;

  let decision = window.resolve(existing.as_ref());
  let outcome = decision.outcome(existing.as_ref());

  match (decision, existing) {
    (MergeDecision::Insert(row), None) => {
      tx.execute(
        "INSERT INTO order_status (
           order_id, customer_id, previous_status, current_status, last_update_ts
         ) VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
          row.order_id,
          row.customer_id,
          row.previous_status.map(encode_status),
          encode_status(row.current_status),
          encode_dt(row.last_update_ts),
        ],
      )?;
    }
    (MergeDecision::Update(row), Some(prev)) => {
      let changed = tx.execute(
        "UPDATE order_status
            SET customer_id     = ?2,
                previous_status = ?3,
                current_status  = ?4,
                last_update_ts  = ?5
          WHERE order_id       = ?1
            AND current_status = ?6
            AND last_update_ts = ?7",
        rusqlite::params![
          row.order_id,
          row.customer_id,
          row.previous_status.map(encode_status),
          encode_status(row.current_status),
          encode_dt(row.last_update_ts),
          encode_status(prev.current_status),
          encode_dt(prev.last_update_ts),
        ],
      )?;
      if changed != 1 {
        return Err(Error::MergeConflict(order_id));
      }
    }
    // Skipped: nothing to write; dropping `tx` rolls back the read.
    _ => return Ok(outcome),
  }

  tx.commit()?;
  Ok(outcome)
}

/// Timestamp texts in `table.column` that share the greatest instant.
///
/// Compared through `julianday` rather than as text, so rows written in
/// another RFC 3339 shape (no fraction, a numeric offset) still order by
/// time. Ties at `julianday` precision are settled by [`latest_instant`].
fn latest_candidates(
  conn: &rusqlite::Connection,
  table: &str,
  column: &str,
) -> rusqlite::Result<Vec<String>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {column} FROM {table}
      WHERE julianday({column}) = (SELECT MAX(julianday({column})) FROM {table})"
  ))?;
  let rows = stmt
    .query_map([], |row| row.get(0))?
    .collect::<rusqlite::Result<Vec<String>>>()?;
  Ok(rows)
}

/// The latest decodable instant among `candidates`.
fn latest_instant(candidates: &[String]) -> Option<DateTime<Utc>> {
  candidates.iter().filter_map(|s| decode_dt(s).ok()).max()
}

// ─── EventLog impl ───────────────────────────────────────────────────────────

impl EventLog for SqliteStore {
  type Error = Error;

  async fn append(&self, event: EventRecord, partition: u32) -> Result<Appended> {
    let event_id_str  = encode_uuid(event.event_id);
    let status_str    = encode_status(event.new_status);
    let status_ts_str = encode_dt(event.status_ts);
    let ingested_str  = encode_dt(Utc::now());
    let source        = event.source;
    let order_id      = event.order_id;
    let customer_id   = event.customer_id;

    let (position, partition_id, inserted): (i64, i64, bool) = self
      .conn
      .call(move |conn| {
        let inserted = conn.execute(
          "INSERT INTO events (
             event_id, order_id, customer_id, new_status, status_ts,
             source, partition_id, ingested_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
           ON CONFLICT(event_id) DO NOTHING",
          rusqlite::params![
            event_id_str,
            order_id,
            customer_id,
            status_str,
            status_ts_str,
            source,
            partition,
            ingested_str,
          ],
        )? == 1;

        let (position, partition_id) = conn.query_row(
          "SELECT position, partition_id FROM events WHERE event_id = ?1",
          rusqlite::params![event_id_str],
          |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok((position, partition_id, inserted))
      })
      .await?;

    let partition = u32::try_from(partition_id)
      .map_err(|_| Error::Decode(format!("partition out of range: {partition_id}")))?;

    Ok(Appended { position: LogPosition(position), partition, inserted })
  }

  async fn read_after(&self, cursor: LogPosition, limit: usize) -> Result<LogBatch> {
    let limit_val = i64::try_from(limit).unwrap_or(i64::MAX);

    let raws: Vec<RawEvent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {EVENT_COLUMNS} FROM events
            WHERE position > ?1
            ORDER BY position ASC
            LIMIT ?2"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![cursor.0, limit_val], RawEvent::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    // A row that fails to decode is reported, not fatal, so readers can skip
    // it and still move past it.
    let mut batch = LogBatch::default();
    for raw in raws {
      let position = raw.position();
      match raw.into_logged() {
        Ok(logged) => batch.events.push(logged),
        Err(e) => batch.malformed.push(MalformedEvent {
          position,
          reason: e.to_string(),
        }),
      }
    }
    Ok(batch)
  }

  async fn stats(&self) -> Result<LogStats> {
    let (total, unique, latest): (i64, i64, Vec<String>) = self
      .conn
      .call(|conn| {
        let (total, unique) = conn.query_row(
          "SELECT COUNT(*), COUNT(DISTINCT order_id) FROM events",
          [],
          |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let latest = latest_candidates(conn, "events", "status_ts")?;
        Ok((total, unique, latest))
      })
      .await?;

    Ok(LogStats {
      total_events:  total as u64,
      unique_orders: unique as u64,
      latest_event:  latest_instant(&latest),
    })
  }
}

// ─── StatusStore impl ────────────────────────────────────────────────────────

impl StatusStore for SqliteStore {
  type Error = Error;

  // ── Merge ─────────────────────────────────────────────────────────────────

  async fn merge_window(&self, window: OrderWindow) -> Result<MergeOutcome> {
    self
      .conn
      .call(move |conn| Ok(merge_in_tx(conn, &window)))
      .await?
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn get_state(&self, order_id: OrderId) -> Result<Option<OrderStatusState>> {
    let raw: Option<RawState> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {STATE_COLUMNS} FROM order_status WHERE order_id = ?1"),
            rusqlite::params![order_id],
            RawState::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawState::into_state).transpose()
  }

  async fn list_states(&self, query: &StateQuery) -> Result<Vec<OrderStatusState>> {
    let status_str = query.status.map(encode_status);
    let limit_val  =
      i64::try_from(query.limit.unwrap_or(DEFAULT_LIST_LIMIT)).unwrap_or(i64::MAX);

    let raws: Vec<RawState> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {STATE_COLUMNS} FROM order_status
            WHERE (?1 IS NULL OR current_status = ?1)
            ORDER BY last_update_ts DESC, order_id ASC
            LIMIT ?2"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![status_str, limit_val], RawState::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawState::into_state).collect()
  }

  async fn summary(&self) -> Result<StatusSummary> {
    let (counts, latest): (Vec<(String, i64)>, Vec<String>) = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT current_status, COUNT(*) FROM order_status GROUP BY current_status",
        )?;
        let counts = stmt
          .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        let latest = latest_candidates(conn, "order_status", "last_update_ts")?;
        Ok((counts, latest))
      })
      .await?;

    let mut distribution = BTreeMap::new();
    let mut tracked_orders = 0;
    for (status, count) in counts {
      let count = count as u64;
      tracked_orders += count;
      distribution.insert(decode_status(&status)?, count);
    }

    Ok(StatusSummary {
      tracked_orders,
      latest_update: latest_instant(&latest),
      distribution,
    })
  }

  // ── Cursors ───────────────────────────────────────────────────────────────

  async fn load_cursor(&self, name: &str) -> Result<LogPosition> {
    let name = name.to_owned();

    let position: Option<i64> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT position FROM reducer_cursors WHERE name = ?1",
            rusqlite::params![name],
            |row| row.get(0),
          )
          .optional()?)
      })
      .await?;

    Ok(position.map(LogPosition).unwrap_or(LogPosition::ORIGIN))
  }

  async fn save_cursor(&self, name: &str, position: LogPosition) -> Result<()> {
    let name   = name.to_owned();
    let at_str = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO reducer_cursors (name, position, updated_at)
           VALUES (?1, ?2, ?3)
           ON CONFLICT(name) DO UPDATE
             SET position   = max(reducer_cursors.position, excluded.position),
                 updated_at = excluded.updated_at",
          rusqlite::params![name, position.0, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
