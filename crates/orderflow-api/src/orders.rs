//! Read handlers over the materialized state.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/orders` | Optional `?status=<status>&limit=<n>` |
//! | `GET`  | `/orders/{id}` | 404 if the order has no state yet |
//! | `GET`  | `/summary` | State summary plus raw log stats |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use orderflow_core::{
  event::{OrderId, OrderStatus},
  state::{OrderStatusState, StatusSummary},
  store::{EventLog, LogStats, StateQuery, StatusStore},
};
use serde::{Deserialize, Serialize};

use crate::{AppState, error::ApiError};

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
  /// Status name, case-insensitive.
  pub status: Option<String>,
  pub limit:  Option<usize>,
}

/// `GET /orders[?status=<status>][&limit=<n>]`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<OrderStatusState>>, ApiError>
where
  S: EventLog + StatusStore,
{
  let status = params
    .status
    .as_deref()
    .map(OrderStatus::parse)
    .transpose()
    .map_err(|e| ApiError::BadRequest(e.to_string()))?;

  let query = StateQuery { status, limit: params.limit };
  let rows = state
    .store
    .list_states(&query)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(rows))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /orders/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<OrderId>,
) -> Result<Json<OrderStatusState>, ApiError>
where
  S: EventLog + StatusStore,
{
  let row = state
    .store
    .get_state(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("order {id} not found")))?;
  Ok(Json(row))
}

// ─── Summary ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SummaryBody {
  #[serde(flatten)]
  pub state: StatusSummary,
  pub log:   LogStats,
}

/// `GET /summary`
pub async fn summary<S>(State(state): State<AppState<S>>) -> Result<Json<SummaryBody>, ApiError>
where
  S: EventLog + StatusStore,
{
  let summary = state
    .store
    .summary()
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  let log = state
    .store
    .stats()
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(SummaryBody { state: summary, log }))
}
