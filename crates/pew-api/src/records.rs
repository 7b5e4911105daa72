//! Handlers for `/attendance/records` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`    | `/attendance/records` | Optional `?date=YYYY-MM-DD&event_type=…`; defaults to today, all events |
//! | `DELETE` | `/attendance/records/{id}` | 404 if not found |
//! | `DELETE` | `/attendance/records` | Removes every record |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
};
use chrono::NaiveDate;
use pew_core::{
  attendance::AttendanceEntry, photo::PhotoStore, recognition::RecognitionClient,
  store::AttendanceLedger,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{AppState, AttendanceStore, error::ApiError};

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  /// Defaults to today in server-local time.
  pub date:       Option<NaiveDate>,
  pub event_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecordList {
  pub date:       NaiveDate,
  pub event_type: Option<String>,
  pub count:      usize,
  pub records:    Vec<AttendanceEntry>,
}

/// `GET /attendance/records[?date=<date>][&event_type=<type>]`
pub async fn list<S, C, P>(
  State(state): State<AppState<S, C, P>>,
  Query(params): Query<ListParams>,
) -> Result<Json<RecordList>, ApiError>
where
  S: AttendanceStore,
  C: RecognitionClient + 'static,
  P: PhotoStore + 'static,
{
  let date = params.date.unwrap_or_else(|| state.clock.now().date());
  let event_type = params
    .event_type
    .map(|e| e.trim().to_owned())
    .filter(|e| !e.is_empty());

  let records = state
    .store
    .list_for_date(date, event_type.as_deref())
    .await
    .map_err(ApiError::store)?;

  Ok(Json(RecordList {
    date,
    event_type,
    count: records.len(),
    records,
  }))
}

// ─── Delete ──────────────────────────────────────────────────────────────────

/// `DELETE /attendance/records/{id}`
pub async fn delete_one<S, C, P>(
  State(state): State<AppState<S, C, P>>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: AttendanceStore,
  C: RecognitionClient + 'static,
  P: PhotoStore + 'static,
{
  let deleted = state.store.delete_by_id(id).await.map_err(ApiError::store)?;
  if !deleted {
    return Err(ApiError::NotFound(format!("attendance record {id} not found")));
  }
  info!(record_id = %id, "attendance record deleted");
  Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /attendance/records`
pub async fn clear<S, C, P>(
  State(state): State<AppState<S, C, P>>,
) -> Result<Json<serde_json::Value>, ApiError>
where
  S: AttendanceStore,
  C: RecognitionClient + 'static,
  P: PhotoStore + 'static,
{
  let deleted = state.store.truncate_all().await.map_err(ApiError::store)?;
  warn!(deleted, "all attendance records cleared");
  Ok(Json(serde_json::json!({
    "status":  "success",
    "message": format!("Cleared {deleted} attendance records."),
    "deleted": deleted,
  })))
}
