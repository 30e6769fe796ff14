//! SQLite backend for the order-status pipeline.
//!
//! One database file holds the append-only event log, the materialized
//! `order_status` table and the reducer cursors. Wraps [`tokio_rusqlite`] so
//! all database access runs on a dedicated thread without blocking the async
//! runtime.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
