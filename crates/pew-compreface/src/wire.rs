//! CompreFace request and response shapes, and the mapping of its failures
//! onto [`ClientError`].

use pew_core::recognition::{ClientError, DetectedFace, EnrollmentRecord, SubjectMatch};
use reqwest::StatusCode;
use serde::Deserialize;

/// CompreFace's error code for "no face is found in the given image".
pub const NO_FACE_FOUND: i64 = 28;

// ─── Recognize ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RecognizeResponse {
  /// Absent or `null` means no faces.
  #[serde(default)]
  result: Option<Vec<FaceResult>>,
}

#[derive(Debug, Deserialize)]
struct FaceResult {
  #[serde(default)]
  subjects: Option<Vec<SubjectResult>>,
}

#[derive(Debug, Deserialize)]
struct SubjectResult {
  subject:    String,
  similarity: f64,
}

impl RecognizeResponse {
  pub fn into_faces(self) -> Result<Vec<DetectedFace>, ClientError> {
    self
      .result
      .unwrap_or_default()
      .into_iter()
      .map(|face| {
        let candidates = face
          .subjects
          .unwrap_or_default()
          .into_iter()
          .map(|s| {
            if (0.0..=1.0).contains(&s.similarity) {
              Ok(SubjectMatch {
                subject_id: s.subject,
                similarity: s.similarity,
              })
            } else {
              Err(ClientError::MalformedResponse(format!(
                "similarity {} for subject {:?} is outside [0, 1]",
                s.similarity, s.subject
              )))
            }
          })
          .collect::<Result<_, _>>()?;
        Ok(DetectedFace { candidates })
      })
      .collect()
  }
}

// ─── Enroll ──────────────────────────────────────────────────────────────────

pub fn enrollment_from(
  raw: serde_json::Value,
  subject_id: &str,
) -> Result<EnrollmentRecord, ClientError> {
  if !raw.is_object() {
    return Err(ClientError::MalformedResponse(format!(
      "expected an object from enrollment, got {raw}"
    )));
  }
  let subject_id = raw
    .get("subject")
    .and_then(serde_json::Value::as_str)
    .unwrap_or(subject_id)
    .to_owned();
  let image_id = raw
    .get("image_id")
    .and_then(serde_json::Value::as_str)
    .map(str::to_owned);
  Ok(EnrollmentRecord {
    subject_id,
    image_id,
    raw,
  })
}

// ─── Errors ──────────────────────────────────────────────────────────────────

/// The body CompreFace sends with a non-success status.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
  pub message: Option<String>,
  pub code:    Option<i64>,
}

impl ErrorBody {
  /// Parse leniently; a body that is not CompreFace's error shape yields an
  /// empty one.
  pub fn parse(body: &[u8]) -> Self {
    serde_json::from_slice(body).unwrap_or_default()
  }

  pub fn is_no_face(&self) -> bool { self.code == Some(NO_FACE_FOUND) }
}

/// Map a non-success status onto the client error taxonomy.
pub fn classify(status: StatusCode, body: &ErrorBody) -> ClientError {
  let detail = body
    .message
    .clone()
    .unwrap_or_else(|| status.to_string());

  match status {
    s if s.is_server_error() => ClientError::Unreachable(format!("{s}: {detail}")),
    StatusCode::UNAUTHORIZED => ClientError::Unauthorized(
      "invalid API key; check the recognition service configuration".to_owned(),
    ),
    StatusCode::FORBIDDEN => ClientError::Unauthorized(
      "access denied; check the recognition service permissions".to_owned(),
    ),
    StatusCode::PAYLOAD_TOO_LARGE => ClientError::BadRequest(
      "Image file is too large. Maximum size is 10MB.".to_owned(),
    ),
    StatusCode::UNSUPPORTED_MEDIA_TYPE => ClientError::BadRequest(
      "Unsupported image format. Please use JPEG or PNG.".to_owned(),
    ),
    s if s.is_client_error() => ClientError::BadRequest(detail),
    s => ClientError::MalformedResponse(format!("unexpected status {s}")),
  }
}
