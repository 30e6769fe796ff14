//! The order-status materialization pipeline.
//!
//! [`StatusReducer`] folds newly visible log events into the state store one
//! pass at a time; [`Scheduler`] fires those passes on a trigger and keeps
//! them serialized.

pub mod error;
pub mod reducer;
pub mod scheduler;

pub use error::ReduceError;
pub use reducer::{PassReport, ReducerConfig, StatusReducer};
pub use scheduler::{
  IntervalTrigger, ManualTrigger, Scheduler, SchedulerConfig, SchedulerStats, Trigger,
  TriggerHandle,
};
