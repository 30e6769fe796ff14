//! Core types and trait definitions for the order-status pipeline.
//!
//! This crate is deliberately free of HTTP and database dependencies. It holds
//! the event model, the partition router, the pure latest-wins reduction rules
//! and the storage traits every other crate builds on.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod event;
pub mod reduce;
pub mod route;
pub mod state;
pub mod store;

pub use error::{Error, Result};
