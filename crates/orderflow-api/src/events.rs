//! Handler for `POST /events`, the producer surface.
//!
//! The body is a JSON array. Each item is validated on its own; one bad item
//! does not reject the batch.

use axum::{Json, extract::State};
use orderflow_core::{
  event::EventRecord,
  route::Partitioner,
  store::{EventLog, StatusStore},
};
use serde::Serialize;

use crate::{AppState, error::ApiError};

#[derive(Debug, Serialize)]
pub struct Rejected {
  /// Position of the item in the request array.
  pub index:  usize,
  pub reason: String,
}

#[derive(Debug, Default, Serialize)]
pub struct IngestReport {
  /// Newly appended events.
  pub accepted:   usize,
  /// Events whose id was already in the log.
  pub duplicates: usize,
  pub rejected:   Vec<Rejected>,
}

/// `POST /events` with body `[{"event_id": .., "order_id": .., ..}, ..]`
pub async fn ingest<S>(
  State(state): State<AppState<S>>,
  Json(items): Json<Vec<serde_json::Value>>,
) -> Result<Json<IngestReport>, ApiError>
where
  S: EventLog + StatusStore,
{
  let mut report = IngestReport::default();

  for (index, item) in items.into_iter().enumerate() {
    let event = match EventRecord::from_json(item) {
      Ok(event) => event,
      Err(e) => {
        tracing::warn!(index, error = %e, "rejecting malformed event");
        report.rejected.push(Rejected { index, reason: e.to_string() });
        continue;
      }
    };

    let key = match state.partitioner {
      Partitioner::Hash => event.order_key(),
      Partitioner::CustomerId => event.customer_key(),
    };
    let partition = state.partitions.route(state.partitioner, Some(key.as_bytes()));

    let event_id = event.event_id;
    let appended = state
      .store
      .append(event, partition)
      .await
      .map_err(|e| ApiError::Store(Box::new(e)))?;
    tracing::debug!(%event_id, partition, position = appended.position.0, "event appended");

    if appended.inserted {
      report.accepted += 1;
    } else {
      report.duplicates += 1;
    }
  }

  Ok(Json(report))
}
