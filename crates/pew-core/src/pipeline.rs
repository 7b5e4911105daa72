//! The recognition decision pipeline.
//!
//! Turns an uploaded image into at most one attendance record:
//!
//! 1. validate the image and event type,
//! 2. ask the recognition service for faces and candidates,
//! 3. take the first face and pick its most similar candidate,
//! 4. gate that candidate on the call site's confidence threshold,
//! 5. resolve the subject to an active member,
//! 6. write the record idempotently.
//!
//! Every way this can end is an [`Outcome`]. Only storage faults are errors.

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::{
  Error, Result,
  attendance::{
    AttendanceRecord, DEFAULT_EVENT_TYPE, InsertOutcome, NewAttendance,
    resolve_event_type,
  },
  clock::{Clock, SystemClock},
  image::ImageLimits,
  member::Member,
  recognition::{ClientError, RecognitionClient, SubjectMatch},
  store::{AttendanceLedger, MemberDirectory},
};

// ─── Thresholds ──────────────────────────────────────────────────────────────

/// Minimum similarity for a match to count as identity-confirming.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Threshold(f64);

impl Threshold {
  pub fn new(value: f64) -> Result<Self> {
    if (0.0..=1.0).contains(&value) {
      Ok(Self(value))
    } else {
      Err(Error::InvalidThreshold(value))
    }
  }

  pub fn value(self) -> f64 { self.0 }

  /// Whether `similarity` clears this threshold. Equal counts as a pass.
  pub fn accepts(self, similarity: f64) -> bool { similarity >= self.0 }
}

impl TryFrom<f64> for Threshold {
  type Error = Error;

  fn try_from(value: f64) -> Result<Self> { Self::new(value) }
}

impl From<Threshold> for f64 {
  fn from(t: Threshold) -> Self { t.0 }
}

/// The two threshold tiers used by the check-in entry points.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct Thresholds {
  /// Automated and kiosk check-in, where a false accept greets the wrong
  /// person.
  pub realtime: Threshold,
  /// Single-shot recognition triggered by an operator.
  pub manual:   Threshold,
}

impl Default for Thresholds {
  fn default() -> Self {
    Self {
      realtime: Threshold(0.95),
      manual:   Threshold(0.85),
    }
  }
}

// ─── Outcome ─────────────────────────────────────────────────────────────────

/// Everything a check-in can result in.
#[derive(Debug, Clone, PartialEq, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Outcome {
  Success {
    member:     Member,
    record:     AttendanceRecord,
    confidence: f64,
  },
  AlreadyRecorded {
    member:     Member,
    record:     AttendanceRecord,
    confidence: f64,
  },
  NoFaceDetected,
  NoMatchFound,
  LowConfidence {
    score: f64,
  },
  /// A recognised subject has no active member. This is a consistency
  /// anomaly between the service and the directory.
  MemberNotFound {
    subject_id: String,
  },
  ServiceUnavailable {
    cause: String,
  },
  InvalidInput {
    reason: String,
  },
}

impl Outcome {
  /// Stable status tag, e.g. `low_confidence`.
  pub fn tag(&self) -> &'static str { self.into() }

  /// Human-readable message for the person at the camera.
  pub fn message(&self) -> String {
    match self {
      Self::Success {
        member, confidence, ..
      } => format!(
        "Welcome, {}! (Confidence: {:.1}%)",
        member.full_name(),
        confidence * 100.0
      ),
      Self::AlreadyRecorded { member, .. } => format!(
        "Welcome back, {}! Your attendance is already recorded.",
        member.full_name()
      ),
      Self::NoFaceDetected => {
        "No face detected in the image. Please try again.".to_owned()
      }
      Self::NoMatchFound => {
        "Face not recognized. Please register first.".to_owned()
      }
      Self::LowConfidence { score } => format!(
        "Face recognition confidence too low ({:.1}%). Please try again with \
         better lighting and face position.",
        score * 100.0
      ),
      Self::MemberNotFound { .. } => "Member not found in database.".to_owned(),
      Self::ServiceUnavailable { .. } => {
        "Face recognition service is currently unavailable. Please try again \
         later."
          .to_owned()
      }
      Self::InvalidInput { reason } => reason.clone(),
    }
  }

  /// The confidence carried by a confirmed match, if any.
  pub fn confidence(&self) -> Option<f64> {
    match self {
      Self::Success { confidence, .. }
      | Self::AlreadyRecorded { confidence, .. } => Some(*confidence),
      Self::LowConfidence { score } => Some(*score),
      _ => None,
    }
  }

  /// Map a client failure. Rejected input is the caller's problem; anything
  /// else means the service cannot be relied on right now.
  pub fn from_client_error(e: ClientError) -> Self {
    match e {
      ClientError::BadRequest(reason) => Self::InvalidInput { reason },
      other => Self::ServiceUnavailable {
        cause: other.to_string(),
      },
    }
  }
}

// ─── Selection ───────────────────────────────────────────────────────────────

/// The candidate with the highest similarity. On a tie the earliest candidate
/// wins. Non-finite scores are never selected.
pub fn select_best_match(candidates: &[SubjectMatch]) -> Option<&SubjectMatch> {
  candidates
    .iter()
    .filter(|c| c.similarity.is_finite())
    .fold(None, |best: Option<&SubjectMatch>, c| match best {
      Some(b) if b.similarity >= c.similarity => Some(b),
      _ => Some(c),
    })
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PipelineConfig {
  pub limits:             ImageLimits,
  pub default_event_type: String,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      limits:             ImageLimits::default(),
      default_event_type: DEFAULT_EVENT_TYPE.to_owned(),
    }
  }
}

/// One check-in attempt.
#[derive(Debug, Clone)]
pub struct CheckIn {
  pub image:      Bytes,
  pub event_type: Option<String>,
  /// The call site's acceptance threshold.
  pub threshold:  Threshold,
}

pub struct RecognitionPipeline<D, L, C> {
  directory: Arc<D>,
  ledger:    Arc<L>,
  client:    Arc<C>,
  clock:     Arc<dyn Clock>,
  config:    PipelineConfig,
}

impl<D, L, C> RecognitionPipeline<D, L, C>
where
  D: MemberDirectory,
  L: AttendanceLedger,
  C: RecognitionClient,
{
  pub fn new(
    directory: Arc<D>,
    ledger: Arc<L>,
    client: Arc<C>,
    config: PipelineConfig,
  ) -> Self {
    Self {
      directory,
      ledger,
      client,
      clock: Arc::new(SystemClock),
      config,
    }
  }

  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  pub fn config(&self) -> &PipelineConfig { &self.config }

  pub async fn run(&self, check_in: CheckIn) -> Result<Outcome> {
    let CheckIn {
      image,
      event_type,
      threshold,
    } = check_in;

    if let Err(e) = self.config.limits.check(&image) {
      warn!(size = image.len(), error = %e, "rejected check-in image");
      return Ok(Outcome::InvalidInput {
        reason: e.to_string(),
      });
    }

    let event_type = match resolve_event_type(
      event_type.as_deref(),
      &self.config.default_event_type,
    ) {
      Ok(e) => e,
      Err(reason) => return Ok(Outcome::InvalidInput { reason }),
    };

    let faces = match self.client.detect_or_match(image).await {
      Ok(faces) => faces,
      Err(e) => {
        error!(error = %e, "recognition request failed");
        return Ok(Outcome::from_client_error(e));
      }
    };

    let Some(face) = faces.first() else {
      debug!("no face detected");
      return Ok(Outcome::NoFaceDetected);
    };
    if faces.len() > 1 {
      debug!(faces = faces.len(), "multiple faces detected; using the first");
    }

    let Some(best) = select_best_match(&face.candidates) else {
      debug!("detected face has no candidate matches");
      return Ok(Outcome::NoMatchFound);
    };

    if !threshold.accepts(best.similarity) {
      warn!(
        subject_id = %best.subject_id,
        similarity = best.similarity,
        threshold = threshold.value(),
        "low confidence match"
      );
      return Ok(Outcome::LowConfidence {
        score: best.similarity,
      });
    }

    let confidence = best.similarity;
    let member = match self
      .directory
      .find_by_subject_id(&best.subject_id)
      .await
      .map_err(Error::store)?
    {
      Some(m) => m,
      None => {
        error!(
          subject_id = %best.subject_id,
          similarity = confidence,
          "recognised subject has no active member"
        );
        return Ok(Outcome::MemberNotFound {
          subject_id: best.subject_id.clone(),
        });
      }
    };

    let now = self.clock.now();
    let date = now.date();

    if let Some(record) = self
      .ledger
      .find_by_member_date_event(member.member_id, date, &event_type)
      .await
      .map_err(Error::store)?
    {
      debug!(member_id = %member.member_id, %event_type, "attendance already recorded");
      return Ok(Outcome::AlreadyRecorded {
        member,
        record,
        confidence,
      });
    }

    let input = NewAttendance {
      member_id: member.member_id,
      attendance_date: date,
      check_in_time: now.time(),
      event_type,
      similarity_score: Some(confidence),
      notes: None,
    };

    match self
      .ledger
      .create_if_absent(input)
      .await
      .map_err(Error::store)?
    {
      InsertOutcome::Created(record) => {
        info!(
          member_id = %member.member_id,
          record_id = %record.record_id,
          event_type = %record.event_type,
          similarity = confidence,
          "attendance recorded"
        );
        Ok(Outcome::Success {
          member,
          record,
          confidence,
        })
      }
      InsertOutcome::AlreadyExists(record) => {
        debug!(
          member_id = %member.member_id,
          "concurrent check-in already stored the record"
        );
        Ok(Outcome::AlreadyRecorded {
          member,
          record,
          confidence,
        })
      }
    }
  }
}

#[cfg(test)]
mod tests;
