//! [`Scheduler`] drives reducer passes from a [`Trigger`].
//!
//! One loop, one pass in flight at a time. A tick that arrives while a pass is
//! running waits; a late tick just means the next pass sees a larger window.
//! A failed pass is logged and retried on the next tick. Shutdown drops the
//! pass in flight: per-order merges are atomic and the cursor has not moved,
//! so the abandoned work is redone by the next run.

use std::{future::Future, sync::Arc, time::Duration};

use orderflow_core::store::{EventLog, StatusStore};
use tokio::{
  sync::{mpsc, watch},
  time::{self, Instant, Interval, MissedTickBehavior},
};

use crate::StatusReducer;

// ─── Triggers ────────────────────────────────────────────────────────────────

/// Source of "run a pass now" signals.
pub trait Trigger: Send {
  /// Wait for the next tick. `None` means the trigger is exhausted and the
  /// scheduler should stop.
  fn next_tick(&mut self) -> impl Future<Output = Option<()>> + Send + '_;
}

/// Fixed-cadence trigger backed by a tokio interval.
pub struct IntervalTrigger {
  interval: Interval,
}

impl IntervalTrigger {
  /// Tick every `period`. With `fire_immediately` the first tick is
  /// immediate; otherwise it comes one period from now.
  pub fn new(period: Duration, fire_immediately: bool) -> Self {
    let start = if fire_immediately { Instant::now() } else { Instant::now() + period };
    let mut interval = time::interval_at(start, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Self { interval }
  }
}

impl Trigger for IntervalTrigger {
  async fn next_tick(&mut self) -> Option<()> {
    self.interval.tick().await;
    Some(())
  }
}

/// Trigger fired by hand through a [`TriggerHandle`]. Exhausted once every
/// handle is dropped and pending ticks are consumed.
pub struct ManualTrigger {
  rx: mpsc::Receiver<()>,
}

/// Sending half of a [`ManualTrigger`].
#[derive(Clone)]
pub struct TriggerHandle {
  tx: mpsc::Sender<()>,
}

impl ManualTrigger {
  pub fn channel(buffer: usize) -> (TriggerHandle, Self) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (TriggerHandle { tx }, Self { rx })
  }
}

impl TriggerHandle {
  /// Queue a tick. Returns `false` if the scheduler has gone away.
  pub async fn fire(&self) -> bool { self.tx.send(()).await.is_ok() }
}

impl Trigger for ManualTrigger {
  async fn next_tick(&mut self) -> Option<()> { self.rx.recv().await }
}

// ─── Scheduler ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
  /// Consecutive failed passes after which failures are logged at `error`
  /// instead of `warn`.
  pub failure_alert_threshold: u32,
}

impl Default for SchedulerConfig {
  fn default() -> Self { Self { failure_alert_threshold: 3 } }
}

/// Totals returned when the scheduler stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
  pub passes:   u64,
  pub failures: u64,
  /// Passes dropped mid-flight by shutdown.
  pub aborted:  u64,
}

pub struct Scheduler<L, S, T> {
  reducer: Arc<StatusReducer<L, S>>,
  trigger: T,
  config:  SchedulerConfig,
}

impl<L, S, T> Scheduler<L, S, T>
where
  L: EventLog,
  S: StatusStore,
  T: Trigger,
{
  pub fn new(reducer: Arc<StatusReducer<L, S>>, trigger: T, config: SchedulerConfig) -> Self {
    Self { reducer, trigger, config }
  }

  /// Run until the trigger is exhausted or `shutdown` flips to `true` (or its
  /// sender is dropped).
  pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> SchedulerStats {
    let mut stats = SchedulerStats::default();
    let mut consecutive_failures: u32 = 0;

    loop {
      if *shutdown.borrow() {
        break;
      }

      tokio::select! {
        biased;
        _ = shutdown.changed() => break,
        tick = self.trigger.next_tick() => {
          if tick.is_none() {
            tracing::debug!("trigger exhausted");
            break;
          }
        }
      }

      tokio::select! {
        biased;
        _ = shutdown.changed() => {
          tracing::info!("shutdown requested; abandoning pass in flight");
          stats.aborted += 1;
          break;
        }
        result = self.reducer.run_pass() => match result {
          Ok(_) => {
            stats.passes += 1;
            consecutive_failures = 0;
          }
          Err(e) => {
            stats.failures += 1;
            consecutive_failures += 1;
            if consecutive_failures >= self.config.failure_alert_threshold {
              tracing::error!(
                error = %e,
                consecutive_failures,
                "reducer pass keeps failing"
              );
            } else {
              tracing::warn!(error = %e, consecutive_failures, "reducer pass failed; retrying next tick");
            }
          }
        }
      }
    }

    tracing::info!(
      passes = stats.passes,
      failures = stats.failures,
      aborted = stats.aborted,
      "scheduler stopped"
    );
    stats
  }
}
