//! SQL schema for the orderflow SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- Status-change events are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS events (
    position     INTEGER PRIMARY KEY AUTOINCREMENT,  -- ingestion cursor
    event_id     TEXT    NOT NULL UNIQUE,
    order_id     INTEGER NOT NULL,
    customer_id  INTEGER NOT NULL,
    new_status   TEXT    NOT NULL,   -- 'CREATED' | 'PAID' | 'PACKED' | ...
    status_ts    TEXT    NOT NULL,   -- RFC 3339 UTC, nanosecond precision
    source       TEXT,
    partition_id INTEGER NOT NULL DEFAULT 0,
    ingested_at  TEXT    NOT NULL
);

-- Materialized current state; one row per order, never deleted.
CREATE TABLE IF NOT EXISTS order_status (
    order_id        INTEGER PRIMARY KEY,
    customer_id     INTEGER NOT NULL,
    previous_status TEXT,
    current_status  TEXT    NOT NULL,
    last_update_ts  TEXT    NOT NULL
);

-- Durable change-tracking offsets into `events`.
CREATE TABLE IF NOT EXISTS reducer_cursors (
    name       TEXT    PRIMARY KEY,
    position   INTEGER NOT NULL,
    updated_at TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS events_order_idx         ON events(order_id);
CREATE INDEX IF NOT EXISTS order_status_updated_idx ON order_status(last_update_ts);
CREATE INDEX IF NOT EXISTS order_status_current_idx ON order_status(current_status);

PRAGMA user_version = 1;
";
