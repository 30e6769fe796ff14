//! Handler for `POST /reduce`.

use axum::{Json, extract::State};
use orderflow_core::store::{EventLog, StatusStore};
use orderflow_pipeline::PassReport;

use crate::{AppState, error::ApiError};

/// `POST /reduce`: run one pass now. Waits for any scheduled pass in flight.
pub async fn run<S>(State(state): State<AppState<S>>) -> Result<Json<PassReport>, ApiError>
where
  S: EventLog + StatusStore,
{
  let report = state.reducer.run_pass().await?;
  Ok(Json(report))
}
