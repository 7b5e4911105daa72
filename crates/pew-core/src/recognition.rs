//! The recognition-service contract.
//!
//! The face-recognition model is an opaque remote service. Implementations
//! (e.g. `pew-compreface`) translate transport and protocol failures into
//! [`ClientError`] at this boundary so that nothing above it ever sees a raw
//! HTTP error.

use std::future::Future;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One candidate identity for a detected face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectMatch {
  pub subject_id: String,
  /// In `[0, 1]`; higher is more similar.
  pub similarity: f64,
}

/// A face found in the submitted image with the service's candidate matches.
/// The candidates are in whatever order the service returned them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectedFace {
  pub candidates: Vec<SubjectMatch>,
}

/// What the service reported back after enrolling a face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentRecord {
  pub subject_id: String,
  /// The service's id for the stored example image, if it reports one.
  pub image_id:   Option<String>,
  /// The undecoded response body, kept with the member for diagnostics.
  pub raw:        serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
  /// Connection refused, timed out, or the service answered with a server
  /// error.
  #[error("recognition service unreachable: {0}")]
  Unreachable(String),

  #[error("recognition service rejected credentials: {0}")]
  Unauthorized(String),

  /// The service refused the input (unsupported, oversized, or unreadable
  /// image). The message is suitable for the end user.
  #[error("{0}")]
  BadRequest(String),

  #[error("malformed response from recognition service: {0}")]
  MalformedResponse(String),
}

/// Abstraction over a remote face-recognition service.
pub trait RecognitionClient: Send + Sync {
  /// Detect faces in `image` and match each against enrolled subjects.
  ///
  /// An image with no faces is `Ok(vec![])`, not an error.
  fn detect_or_match(
    &self,
    image: Bytes,
  ) -> impl Future<Output = Result<Vec<DetectedFace>, ClientError>> + Send + '_;

  /// Enroll the face in `image` under `subject_id`.
  fn enroll<'a>(
    &'a self,
    image: Bytes,
    subject_id: &'a str,
  ) -> impl Future<Output = Result<EnrollmentRecord, ClientError>> + Send + 'a;

  /// Remove every enrolled example for `subject_id`. Removing a subject the
  /// service does not know is not an error.
  fn remove_enrollment<'a>(
    &'a self,
    subject_id: &'a str,
  ) -> impl Future<Output = Result<(), ClientError>> + Send + 'a;
}
