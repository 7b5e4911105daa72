//! Attendance records — one check-in per member, per event, per day.
//!
//! Records are append-only. The triple (member, date, event type) is unique,
//! and the storage backend must enforce that with a constraint rather than
//! relying on callers to check first.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event type used when a check-in does not name one.
pub const DEFAULT_EVENT_TYPE: &str = "sunday_service";

/// Longest accepted event type tag.
pub const MAX_EVENT_TYPE_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
  pub record_id:        Uuid,
  pub member_id:        Uuid,
  pub attendance_date:  NaiveDate,
  /// Local wall-clock time of the check-in.
  pub check_in_time:    NaiveTime,
  /// Free-form category, e.g. `sunday_service` or `bible_study`.
  pub event_type:       String,
  /// The recognition similarity that produced this record.
  pub similarity_score: Option<f64>,
  pub notes:            Option<String>,
  pub created_at:       DateTime<Utc>,
}

/// Input to [`crate::store::AttendanceLedger::create_if_absent`].
#[derive(Debug, Clone)]
pub struct NewAttendance {
  pub member_id:        Uuid,
  pub attendance_date:  NaiveDate,
  pub check_in_time:    NaiveTime,
  pub event_type:       String,
  pub similarity_score: Option<f64>,
  pub notes:            Option<String>,
}

/// Result of an idempotent insert.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
  Created(AttendanceRecord),
  /// A record for the same (member, date, event type) was already stored;
  /// this is that record.
  AlreadyExists(AttendanceRecord),
}

/// An attendance record joined with the display name of its member, for
/// reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceEntry {
  #[serde(flatten)]
  pub record:      AttendanceRecord,
  pub member_name: String,
}

/// Normalise a caller-supplied event type. Blank input falls back to
/// `default`; returns the rejection reason for over-long tags.
pub fn resolve_event_type(
  requested: Option<&str>,
  default: &str,
) -> Result<String, String> {
  let event_type = requested
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .unwrap_or(default);

  if event_type.chars().count() > MAX_EVENT_TYPE_LEN {
    return Err(format!(
      "event type must be at most {MAX_EVENT_TYPE_LEN} characters"
    ));
  }
  Ok(event_type.to_owned())
}
