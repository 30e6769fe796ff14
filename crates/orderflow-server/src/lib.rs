//! Configuration for the `orderflow` binary.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use orderflow_core::route::{PartitionSet, Partitioner};
use orderflow_pipeline::{ReducerConfig, SchedulerConfig};
use serde::Deserialize;

/// Server settings, read from an optional TOML file overlaid with
/// `ORDERFLOW_*` environment variables. Every field has a default.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                    String,
  pub port:                    u16,
  /// SQLite database holding the event log and the state table. A leading
  /// `~/` is expanded.
  pub store_path:              PathBuf,
  /// Seconds between scheduled reducer passes.
  pub reduce_interval_secs:    u64,
  /// Partition count of the event log.
  pub partitions:              u32,
  pub partitioner:             Partitioner,
  /// Log rows read per page during a pass.
  pub page_size:               usize,
  /// Run a pass as soon as the scheduler starts instead of one interval in.
  pub run_on_start:            bool,
  pub failure_alert_threshold: u32,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                    "127.0.0.1".to_string(),
      port:                    8080,
      store_path:              PathBuf::from("orderflow.db"),
      reduce_interval_secs:    120,
      partitions:              3,
      partitioner:             Partitioner::Hash,
      page_size:               ReducerConfig::default().page_size,
      run_on_start:            true,
      failure_alert_threshold: SchedulerConfig::default().failure_alert_threshold,
    }
  }
}

impl ServerConfig {
  /// Layer `path` (if it exists) under the environment.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("ORDERFLOW"))
      .build()?
      .try_deserialize()
  }

  /// Scheduler cadence; never zero.
  pub fn reduce_interval(&self) -> Duration {
    Duration::from_secs(self.reduce_interval_secs.max(1))
  }

  pub fn reducer_config(&self) -> ReducerConfig {
    ReducerConfig { page_size: self.page_size, ..ReducerConfig::default() }
  }

  pub fn scheduler_config(&self) -> SchedulerConfig {
    SchedulerConfig { failure_alert_threshold: self.failure_alert_threshold }
  }

  pub fn partition_set(&self) -> PartitionSet { PartitionSet::uniform(self.partitions) }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use config::{Config, File, FileFormat};

  use super::*;

  fn from_toml(toml: &str) -> ServerConfig {
    Config::builder()
      .add_source(File::from_str(toml, FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap()
  }

  #[test]
  fn empty_file_gives_defaults() {
    let cfg = from_toml("");
    assert_eq!(cfg, ServerConfig::default());
    assert_eq!(cfg.reduce_interval(), Duration::from_secs(120));
    assert_eq!(cfg.page_size, 500);
    assert_eq!(cfg.failure_alert_threshold, 3);
  }

  #[test]
  fn file_overrides_defaults() {
    let cfg = from_toml(
      r#"
        port = 9000
        partitions = 8
        partitioner = "customer_id"
        reduce_interval_secs = 30
        run_on_start = false
      "#,
    );
    assert_eq!(cfg.port, 9000);
    assert_eq!(cfg.partitioner, Partitioner::CustomerId);
    assert_eq!(cfg.partition_set().available.len(), 8);
    assert_eq!(cfg.reduce_interval(), Duration::from_secs(30));
    assert!(!cfg.run_on_start);
    assert_eq!(cfg.host, "127.0.0.1");
  }

  #[test]
  fn zero_interval_is_clamped() {
    let cfg = ServerConfig { reduce_interval_secs: 0, ..ServerConfig::default() };
    assert_eq!(cfg.reduce_interval(), Duration::from_secs(1));
  }

  #[test]
  fn missing_config_file_is_not_an_error() {
    let cfg = ServerConfig::load(Path::new("/nonexistent/orderflow.toml")).unwrap();
    assert_eq!(cfg.store_path, PathBuf::from("orderflow.db"));
  }

  #[test]
  fn tilde_is_expanded_only_at_the_start() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(expand_tilde(Path::new("~/data/o.db")), PathBuf::from(home).join("data/o.db"));
    assert_eq!(expand_tilde(Path::new("/tmp/~/o.db")), PathBuf::from("/tmp/~/o.db"));
  }
}
