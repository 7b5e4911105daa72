//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings. Attendance dates and times are local
//! wall-clock values without an offset. UUIDs are hyphenated lowercase.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use pew_core::{
  attendance::{AttendanceEntry, AttendanceRecord},
  member::{Member, MemberStatus},
};
use uuid::Uuid;

use crate::{Error, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S%.f";

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── Date and time ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format(DATE_FORMAT).to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, DATE_FORMAT)
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

pub fn encode_time(t: NaiveTime) -> String { t.format(TIME_FORMAT).to_string() }

pub fn decode_time(s: &str) -> Result<NaiveTime> {
  NaiveTime::parse_from_str(s, TIME_FORMAT)
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── MemberStatus ────────────────────────────────────────────────────────────

pub fn encode_status(s: MemberStatus) -> &'static str { s.into() }

pub fn decode_status(s: &str) -> Result<MemberStatus> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown member status: {s:?}")))
}

// ─── Enrollment ──────────────────────────────────────────────────────────────

pub fn encode_enrollment(v: Option<&serde_json::Value>) -> Option<String> {
  v.map(serde_json::Value::to_string)
}

pub fn decode_enrollment(s: Option<&str>) -> Result<Option<serde_json::Value>> {
  Ok(s.map(serde_json::from_str::<serde_json::Value>).transpose()?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawMember::from_row`].
pub const MEMBER_COLUMNS: &str = "member_id, first_name, last_name, email, \
                                  phone, photo, subject_id, enrollment, \
                                  status, created_at, updated_at";

/// Raw strings read directly from a `members` row.
pub struct RawMember {
  pub member_id:  String,
  pub first_name: String,
  pub last_name:  String,
  pub email:      Option<String>,
  pub phone:      Option<String>,
  pub photo:      Option<String>,
  pub subject_id: String,
  pub enrollment: Option<String>,
  pub status:     String,
  pub created_at: String,
  pub updated_at: String,
}

impl RawMember {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      member_id:  row.get(0)?,
      first_name: row.get(1)?,
      last_name:  row.get(2)?,
      email:      row.get(3)?,
      phone:      row.get(4)?,
      photo:      row.get(5)?,
      subject_id: row.get(6)?,
      enrollment: row.get(7)?,
      status:     row.get(8)?,
      created_at: row.get(9)?,
      updated_at: row.get(10)?,
    })
  }

  pub fn into_member(self) -> Result<Member> {
    Ok(Member {
      member_id:  decode_uuid(&self.member_id)?,
      first_name: self.first_name,
      last_name:  self.last_name,
      email:      self.email,
      phone:      self.phone,
      photo:      self.photo,
      subject_id: self.subject_id,
      enrollment: decode_enrollment(self.enrollment.as_deref())?,
      status:     decode_status(&self.status)?,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

/// Column list matching [`RawRecord::from_row`], qualified for joins.
pub const RECORD_COLUMNS: &str = "r.record_id, r.member_id, r.attendance_date, \
                                  r.check_in_time, r.event_type, \
                                  r.similarity_score, r.notes, r.created_at";

/// Raw values read directly from an `attendance_records` row.
pub struct RawRecord {
  pub record_id:        String,
  pub member_id:        String,
  pub attendance_date:  String,
  pub check_in_time:    String,
  pub event_type:       String,
  pub similarity_score: Option<f64>,
  pub notes:            Option<String>,
  pub created_at:       String,
}

impl RawRecord {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      record_id:        row.get(0)?,
      member_id:        row.get(1)?,
      attendance_date:  row.get(2)?,
      check_in_time:    row.get(3)?,
      event_type:       row.get(4)?,
      similarity_score: row.get(5)?,
      notes:            row.get(6)?,
      created_at:       row.get(7)?,
    })
  }

  pub fn into_record(self) -> Result<AttendanceRecord> {
    Ok(AttendanceRecord {
      record_id:        decode_uuid(&self.record_id)?,
      member_id:        decode_uuid(&self.member_id)?,
      attendance_date:  decode_date(&self.attendance_date)?,
      check_in_time:    decode_time(&self.check_in_time)?,
      event_type:       self.event_type,
      similarity_score: self.similarity_score,
      notes:            self.notes,
      created_at:       decode_dt(&self.created_at)?,
    })
  }
}

/// A record row joined with its member's display name.
pub struct RawEntry {
  pub record:      RawRecord,
  pub member_name: String,
}

impl RawEntry {
  pub fn into_entry(self) -> Result<AttendanceEntry> {
    Ok(AttendanceEntry {
      record:      self.record.into_record()?,
      member_name: self.member_name,
    })
  }
}
