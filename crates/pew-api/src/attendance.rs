//! Handlers for the check-in and registration endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/attendance/record` | multipart `image`, `event_type?`; realtime threshold |
//! | `POST` | `/attendance/realtime` | as above, but recognition misses answer 200 |
//! | `POST` | `/attendance/recognize` | multipart `image`, `event_type?`; manual threshold |
//! | `POST` | `/attendance/register` | multipart `first_name`, `last_name`, `email?`, `phone?`, `image` |

use axum::{
  Json,
  extract::{Multipart, State},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use pew_core::{
  photo::PhotoStore,
  pipeline::{CheckIn, Outcome, Threshold},
  recognition::RecognitionClient,
  registration::{Registration, RegistrationOutcome},
};
use serde_json::{Value, json};

use crate::{AppState, AttendanceStore, error::ApiError, form::Upload, view::MemberView};

// ─── Status mapping ──────────────────────────────────────────────────────────

/// Status for the record and recognize endpoints, where a miss is a client
/// error.
pub fn record_status(outcome: &Outcome) -> StatusCode {
  match outcome {
    Outcome::Success { .. } => StatusCode::CREATED,
    Outcome::AlreadyRecorded { .. } => StatusCode::OK,
    Outcome::NoFaceDetected | Outcome::LowConfidence { .. } => {
      StatusCode::UNPROCESSABLE_ENTITY
    }
    Outcome::NoMatchFound | Outcome::MemberNotFound { .. } => StatusCode::NOT_FOUND,
    Outcome::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
    Outcome::InvalidInput { .. } => StatusCode::BAD_REQUEST,
  }
}

/// Status for the realtime endpoint. A kiosk polls it continuously, so every
/// recognition result is a normal answer; only bad input and an unavailable
/// service are not.
pub fn realtime_status(outcome: &Outcome) -> StatusCode {
  match outcome {
    Outcome::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
    Outcome::InvalidInput { .. } => StatusCode::BAD_REQUEST,
    _ => StatusCode::OK,
  }
}

pub fn registration_status(outcome: &RegistrationOutcome) -> StatusCode {
  match outcome {
    RegistrationOutcome::Registered { .. } => StatusCode::CREATED,
    RegistrationOutcome::EmailTaken { .. } => StatusCode::CONFLICT,
    RegistrationOutcome::InvalidInput { .. } => StatusCode::BAD_REQUEST,
    RegistrationOutcome::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
  }
}

// ─── Bodies ──────────────────────────────────────────────────────────────────

pub fn outcome_body(outcome: &Outcome) -> Value {
  let mut body = json!({
    "status":  outcome.tag(),
    "message": outcome.message(),
  });
  match outcome {
    Outcome::Success {
      member,
      record,
      confidence,
    }
    | Outcome::AlreadyRecorded {
      member,
      record,
      confidence,
    } => {
      body["member"] = json!(MemberView::from(member));
      body["attendance"] = json!(record);
      body["confidence"] = json!(confidence);
    }
    Outcome::LowConfidence { score } => body["confidence"] = json!(score),
    _ => {}
  }
  body
}

fn registration_body(outcome: &RegistrationOutcome) -> Value {
  let mut body = json!({
    "status":  outcome.tag(),
    "message": outcome.message(),
  });
  if let RegistrationOutcome::Registered { member, restored } = outcome {
    body["member"] = json!(MemberView::from(member));
    body["restored"] = json!(restored);
  }
  body
}

// ─── Check-in ────────────────────────────────────────────────────────────────

async fn check_in<S, C, P>(
  state: &AppState<S, C, P>,
  multipart: Multipart,
  threshold: Threshold,
) -> Result<Outcome, ApiError>
where
  S: AttendanceStore,
  C: RecognitionClient + 'static,
  P: PhotoStore + 'static,
{
  let max_bytes = state.pipeline.config().limits.max_bytes;
  let mut upload = match Upload::read(multipart, max_bytes).await {
    Ok(upload) => upload,
    Err(reason) => return Ok(Outcome::InvalidInput { reason }),
  };
  let event_type = upload.take("event_type");
  let outcome = state
    .pipeline
    .run(CheckIn {
      image: upload.image,
      event_type,
      threshold,
    })
    .await?;
  Ok(outcome)
}

/// `POST /attendance/record`
pub async fn record<S, C, P>(
  State(state): State<AppState<S, C, P>>,
  multipart: Multipart,
) -> Result<Response, ApiError>
where
  S: AttendanceStore,
  C: RecognitionClient + 'static,
  P: PhotoStore + 'static,
{
  let outcome = check_in(&state, multipart, state.thresholds.realtime).await?;
  Ok((record_status(&outcome), Json(outcome_body(&outcome))).into_response())
}

/// `POST /attendance/realtime`
pub async fn realtime<S, C, P>(
  State(state): State<AppState<S, C, P>>,
  multipart: Multipart,
) -> Result<Response, ApiError>
where
  S: AttendanceStore,
  C: RecognitionClient + 'static,
  P: PhotoStore + 'static,
{
  let outcome = check_in(&state, multipart, state.thresholds.realtime).await?;
  Ok((realtime_status(&outcome), Json(outcome_body(&outcome))).into_response())
}

/// `POST /attendance/recognize`
pub async fn recognize<S, C, P>(
  State(state): State<AppState<S, C, P>>,
  multipart: Multipart,
) -> Result<Response, ApiError>
where
  S: AttendanceStore,
  C: RecognitionClient + 'static,
  P: PhotoStore + 'static,
{
  let outcome = check_in(&state, multipart, state.thresholds.manual).await?;
  Ok((record_status(&outcome), Json(outcome_body(&outcome))).into_response())
}

// ─── Registration ────────────────────────────────────────────────────────────

/// `POST /attendance/register`
pub async fn register<S, C, P>(
  State(state): State<AppState<S, C, P>>,
  multipart: Multipart,
) -> Result<Response, ApiError>
where
  S: AttendanceStore,
  C: RecognitionClient + 'static,
  P: PhotoStore + 'static,
{
  let max_bytes = state.pipeline.config().limits.max_bytes;
  let mut upload = match Upload::read(multipart, max_bytes).await {
    Ok(upload) => upload,
    Err(reason) => {
      let outcome = RegistrationOutcome::InvalidInput { reason };
      return Ok(
        (registration_status(&outcome), Json(registration_body(&outcome)))
          .into_response(),
      );
    }
  };
  let registration = Registration {
    first_name: upload.take("first_name").unwrap_or_default(),
    last_name:  upload.take("last_name").unwrap_or_default(),
    email:      upload.take("email"),
    phone:      upload.take("phone"),
    image:      upload.image,
  };

  let outcome = state.registration.register(registration).await?;
  Ok(
    (registration_status(&outcome), Json(registration_body(&outcome)))
      .into_response(),
  )
}
