//! Partition routing for keyed events.
//!
//! Routing is a pure function of its inputs: no clock, no randomness. All
//! events sharing a key land on the same partition, which is what gives
//! consumers per-key ordering.
//!
//! The signatures mirror the usual broker partitioner callback
//! `(key, all_partitions, available_partitions) -> partition`.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Partition used when no partition is reported available.
pub const FALLBACK_PARTITION: u32 = 0;

/// First eight bytes of the SHA-256 digest of `key`, big-endian.
pub fn key_digest(key: &[u8]) -> u64 {
  let digest = Sha256::digest(key);
  let mut head = [0u8; 8];
  head.copy_from_slice(&digest[..8]);
  u64::from_be_bytes(head)
}

/// Generic router.
///
/// - No available partitions: [`FALLBACK_PARTITION`]; producers never block.
/// - No key: the first available partition, so unkeyed events stay ordered
///   relative to each other.
/// - Otherwise: `available[key_digest(key) % available.len()]`.
pub fn route(key: Option<&[u8]>, _all_partitions: &[u32], available_partitions: &[u32]) -> u32 {
  let Some(&first) = available_partitions.first() else {
    return FALLBACK_PARTITION;
  };
  let Some(key) = key else {
    return first;
  };
  let idx = key_digest(key) % available_partitions.len() as u64;
  available_partitions[idx as usize]
}

/// Customer router for keys such as `b"customer:123"` or `b"123"`.
///
/// The ASCII decimal digits in the key are concatenated and read as one
/// integer; its value modulo the partition count is the index, unhashed.
/// Digits from other scripts are ignored. Keys that are not UTF-8 or carry no
/// ASCII digits fall back to [`route`].
pub fn route_by_customer_id(
  key: Option<&[u8]>,
  all_partitions: &[u32],
  available_partitions: &[u32],
) -> u32 {
  let digits_idx = key
    .and_then(|k| std::str::from_utf8(k).ok())
    .and_then(|text| embedded_number_mod(text, available_partitions.len() as u64));

  match digits_idx {
    Some(_) if available_partitions.is_empty() => FALLBACK_PARTITION,
    Some(idx) => available_partitions[idx as usize],
    None => route(key, all_partitions, available_partitions),
  }
}

/// `int(all digits of text) % modulus`, computed digit by digit so arbitrarily
/// long runs do not overflow. `None` if `text` has no ASCII digits.
fn embedded_number_mod(text: &str, modulus: u64) -> Option<u64> {
  let mut seen = false;
  let mut acc: u64 = 0;
  for digit in text.chars().filter_map(|c| c.to_digit(10)) {
    seen = true;
    if modulus > 0 {
      acc = (acc * 10 + u64::from(digit)) % modulus;
    }
  }
  seen.then_some(acc)
}

// ─── Strategy ────────────────────────────────────────────────────────────────

/// Configurable routing strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partitioner {
  /// [`route`] keyed by order id.
  #[default]
  Hash,
  /// [`route_by_customer_id`] keyed by `customer:<id>`.
  CustomerId,
}

/// The partitions of one topic and which of them are currently available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionSet {
  pub all:       Vec<u32>,
  pub available: Vec<u32>,
}

impl PartitionSet {
  /// `count` partitions numbered from zero, all available.
  pub fn uniform(count: u32) -> Self {
    let all: Vec<u32> = (0..count).collect();
    Self { available: all.clone(), all }
  }

  pub fn route(&self, partitioner: Partitioner, key: Option<&[u8]>) -> u32 {
    match partitioner {
      Partitioner::Hash => route(key, &self.all, &self.available),
      Partitioner::CustomerId => route_by_customer_id(key, &self.all, &self.available),
    }
  }
}
