//! Handlers for `/members` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`    | `/members` | Active members, by first then last name |
//! | `DELETE` | `/members/{id}` | Optional `?mode=soft\|hard`, default `hard`; 404 if not found |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use pew_core::{
  photo::PhotoStore,
  recognition::RecognitionClient,
  removal::{RemovalMode, StepResult},
  store::MemberDirectory,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, AttendanceStore, error::ApiError, view::MemberView};

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /members`
pub async fn list<S, C, P>(
  State(state): State<AppState<S, C, P>>,
) -> Result<Json<Vec<MemberView>>, ApiError>
where
  S: AttendanceStore,
  C: RecognitionClient + 'static,
  P: PhotoStore + 'static,
{
  let members = state.store.list_active().await.map_err(ApiError::store)?;
  Ok(Json(members.iter().map(MemberView::from).collect()))
}

// ─── Remove ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RemoveParams {
  #[serde(default)]
  pub mode: RemovalMode,
}

#[derive(Debug, Serialize)]
pub struct RemovalView {
  pub status:          &'static str,
  pub member:          MemberView,
  pub mode:            RemovalMode,
  pub enrollment:      StepResult,
  pub photo:           StepResult,
  pub records_deleted: u64,
}

/// `DELETE /members/{id}[?mode=soft|hard]`
pub async fn remove<S, C, P>(
  State(state): State<AppState<S, C, P>>,
  Path(id): Path<Uuid>,
  Query(params): Query<RemoveParams>,
) -> Result<Json<RemovalView>, ApiError>
where
  S: AttendanceStore,
  C: RecognitionClient + 'static,
  P: PhotoStore + 'static,
{
  let report = state.removal.remove(id, params.mode).await?;
  Ok(Json(RemovalView {
    status:          "success",
    member:          MemberView::from(&report.member),
    mode:            report.mode,
    enrollment:      report.enrollment,
    photo:           report.photo,
    records_deleted: report.records_deleted,
  }))
}
