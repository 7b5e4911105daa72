//! In-memory collaborators for unit tests.

use std::sync::{
  Mutex,
  atomic::{AtomicBool, AtomicUsize, Ordering},
};

use bytes::Bytes;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::{
  attendance::{AttendanceEntry, AttendanceRecord, InsertOutcome, NewAttendance},
  image::ImageFormat,
  member::{LifecycleEvent, Member, MemberStatus, NewMember},
  photo::PhotoStore,
  recognition::{
    ClientError, DetectedFace, EnrollmentRecord, RecognitionClient, SubjectMatch,
  },
  store::{AttendanceLedger, MemberDirectory, WriteOutcome},
};

#[derive(Debug, Error)]
#[error("memory backend failure: {0}")]
pub struct MemoryError(pub String);

// ─── Store ───────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Tables {
  members: Vec<Member>,
  records: Vec<AttendanceRecord>,
}

/// Both storage traits over two vectors, with the same uniqueness rules as
/// the SQLite schema.
#[derive(Default)]
pub struct MemoryStore {
  tables: Mutex<Tables>,
  writes: AtomicUsize,
  /// Make `mark_inactive` fail.
  pub fail_deactivate: AtomicBool,
  /// Have another writer restore the member just before the next `restore`
  /// call lands.
  pub restore_race: AtomicBool,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  /// Insert a member directly, bypassing registration.
  pub fn seed_member(&self, first: &str, last: &str, subject_id: &str) -> Member {
    let now = Utc::now();
    let member = Member {
      member_id:  Uuid::new_v4(),
      first_name: first.to_owned(),
      last_name:  last.to_owned(),
      email:      None,
      phone:      None,
      photo:      None,
      subject_id: subject_id.to_owned(),
      enrollment: None,
      status:     MemberStatus::Active,
      created_at: now,
      updated_at: now,
    };
    self.tables.lock().unwrap().members.push(member.clone());
    member
  }

  pub fn seed_record(&self, member_id: Uuid, at: NaiveDateTime, event_type: &str) -> AttendanceRecord {
    let record = AttendanceRecord {
      record_id:        Uuid::new_v4(),
      member_id,
      attendance_date:  at.date(),
      check_in_time:    at.time(),
      event_type:       event_type.to_owned(),
      similarity_score: None,
      notes:            None,
      created_at:       Utc::now(),
    };
    self.tables.lock().unwrap().records.push(record.clone());
    record
  }

  pub fn members(&self) -> Vec<Member> {
    self.tables.lock().unwrap().members.clone()
  }

  pub fn records(&self) -> Vec<AttendanceRecord> {
    self.tables.lock().unwrap().records.clone()
  }

  /// Number of mutating calls made through the traits.
  pub fn writes(&self) -> usize { self.writes.load(Ordering::SeqCst) }

  fn wrote(&self) { self.writes.fetch_add(1, Ordering::SeqCst); }

  fn conflicts(members: &[Member], candidate: &Member) -> bool {
    members.iter().any(|m| {
      m.member_id != candidate.member_id
        && m.is_active()
        && (m.subject_id == candidate.subject_id
          || (m.email.is_some() && m.email == candidate.email))
    })
  }

  fn transition(&self, member_id: Uuid, event: LifecycleEvent) -> Result<Member, MemoryError> {
    let mut tables = self.tables.lock().unwrap();
    let member = tables
      .members
      .iter_mut()
      .find(|m| m.member_id == member_id)
      .ok_or_else(|| MemoryError(format!("no member {member_id}")))?;
    member.status = member
      .status
      .apply(event)
      .map_err(|e| MemoryError(e.to_string()))?;
    member.updated_at = Utc::now();
    Ok(member.clone())
  }
}

impl MemberDirectory for MemoryStore {
  type Error = MemoryError;

  async fn find_by_subject_id(&self, subject_id: &str) -> Result<Option<Member>, MemoryError> {
    let tables = self.tables.lock().unwrap();
    Ok(
      tables
        .members
        .iter()
        .find(|m| m.is_active() && m.subject_id == subject_id)
        .cloned(),
    )
  }

  async fn find_by_email_including_inactive(&self, email: &str) -> Result<Option<Member>, MemoryError> {
    let tables = self.tables.lock().unwrap();
    let mut matching: Vec<&Member> = tables
      .members
      .iter()
      .filter(|m| m.email.as_deref() == Some(email))
      .collect();
    matching.sort_by_key(|m| (m.is_active(), m.updated_at));
    Ok(matching.last().map(|m| (*m).clone()))
  }

  async fn get(&self, member_id: Uuid) -> Result<Option<Member>, MemoryError> {
    let tables = self.tables.lock().unwrap();
    Ok(tables.members.iter().find(|m| m.member_id == member_id).cloned())
  }

  async fn list_active(&self) -> Result<Vec<Member>, MemoryError> {
    let tables = self.tables.lock().unwrap();
    let mut active: Vec<Member> =
      tables.members.iter().filter(|m| m.is_active()).cloned().collect();
    active.sort_by(|a, b| {
      (&a.first_name, &a.last_name).cmp(&(&b.first_name, &b.last_name))
    });
    Ok(active)
  }

  async fn create(&self, input: NewMember) -> Result<WriteOutcome<Member>, MemoryError> {
    self.wrote();
    let now = Utc::now();
    let member = Member {
      member_id:  Uuid::new_v4(),
      first_name: input.first_name,
      last_name:  input.last_name,
      email:      input.email,
      phone:      input.phone,
      photo:      None,
      subject_id: input.subject_id,
      enrollment: None,
      status:     MemberStatus::Active,
      created_at: now,
      updated_at: now,
    };
    let mut tables = self.tables.lock().unwrap();
    if Self::conflicts(&tables.members, &member) {
      return Ok(WriteOutcome::Conflict);
    }
    tables.members.push(member.clone());
    Ok(WriteOutcome::Written(member))
  }

  async fn update(&self, member: Member) -> Result<Member, MemoryError> {
    self.wrote();
    let mut tables = self.tables.lock().unwrap();
    let slot = tables
      .members
      .iter_mut()
      .find(|m| m.member_id == member.member_id)
      .ok_or_else(|| MemoryError(format!("no member {}", member.member_id)))?;
    let status = slot.status;
    *slot = Member {
      status,
      updated_at: Utc::now(),
      ..member
    };
    Ok(slot.clone())
  }

  async fn mark_inactive(&self, member_id: Uuid) -> Result<Member, MemoryError> {
    self.wrote();
    if self.fail_deactivate.load(Ordering::SeqCst) {
      return Err(MemoryError("database is locked".to_owned()));
    }
    self.transition(member_id, LifecycleEvent::Deactivate)
  }

  async fn restore(&self, member: Member) -> Result<WriteOutcome<Member>, MemoryError> {
    self.wrote();
    if self.restore_race.swap(false, Ordering::SeqCst) {
      self.transition(member.member_id, LifecycleEvent::Restore)?;
    }
    let mut tables = self.tables.lock().unwrap();
    let Some(index) = tables
      .members
      .iter()
      .position(|m| m.member_id == member.member_id)
    else {
      return Err(MemoryError(format!("no member {}", member.member_id)));
    };
    let current = &tables.members[index];
    if current.is_active() {
      return Ok(WriteOutcome::Conflict);
    }
    let status = current
      .status
      .apply(LifecycleEvent::Restore)
      .map_err(|e| MemoryError(e.to_string()))?;
    let restored = Member {
      status,
      created_at: current.created_at,
      updated_at: Utc::now(),
      ..member
    };
    if Self::conflicts(&tables.members, &restored) {
      return Ok(WriteOutcome::Conflict);
    }
    tables.members[index] = restored.clone();
    Ok(WriteOutcome::Written(restored))
  }

  async fn delete(&self, member_id: Uuid) -> Result<bool, MemoryError> {
    self.wrote();
    let mut tables = self.tables.lock().unwrap();
    let before = tables.members.len();
    tables.members.retain(|m| m.member_id != member_id);
    Ok(tables.members.len() != before)
  }
}

impl AttendanceLedger for MemoryStore {
  type Error = MemoryError;

  async fn find_by_member_date_event(
    &self,
    member_id: Uuid,
    date: NaiveDate,
    event_type: &str,
  ) -> Result<Option<AttendanceRecord>, MemoryError> {
    let tables = self.tables.lock().unwrap();
    Ok(
      tables
        .records
        .iter()
        .find(|r| {
          r.member_id == member_id
            && r.attendance_date == date
            && r.event_type == event_type
        })
        .cloned(),
    )
  }

  async fn create_if_absent(&self, input: NewAttendance) -> Result<InsertOutcome, MemoryError> {
    self.wrote();
    let mut tables = self.tables.lock().unwrap();
    if let Some(existing) = tables.records.iter().find(|r| {
      r.member_id == input.member_id
        && r.attendance_date == input.attendance_date
        && r.event_type == input.event_type
    }) {
      return Ok(InsertOutcome::AlreadyExists(existing.clone()));
    }
    let record = AttendanceRecord {
      record_id:        Uuid::new_v4(),
      member_id:        input.member_id,
      attendance_date:  input.attendance_date,
      check_in_time:    input.check_in_time,
      event_type:       input.event_type,
      similarity_score: input.similarity_score,
      notes:            input.notes,
      created_at:       Utc::now(),
    };
    tables.records.push(record.clone());
    Ok(InsertOutcome::Created(record))
  }

  async fn delete_by_id(&self, record_id: Uuid) -> Result<bool, MemoryError> {
    self.wrote();
    let mut tables = self.tables.lock().unwrap();
    let before = tables.records.len();
    tables.records.retain(|r| r.record_id != record_id);
    Ok(tables.records.len() != before)
  }

  async fn delete_for_member(&self, member_id: Uuid) -> Result<u64, MemoryError> {
    self.wrote();
    let mut tables = self.tables.lock().unwrap();
    let before = tables.records.len();
    tables.records.retain(|r| r.member_id != member_id);
    Ok((before - tables.records.len()) as u64)
  }

  async fn list_for_date(
    &self,
    date: NaiveDate,
    event_type: Option<&str>,
  ) -> Result<Vec<AttendanceEntry>, MemoryError> {
    let tables = self.tables.lock().unwrap();
    let mut entries: Vec<AttendanceEntry> = tables
      .records
      .iter()
      .filter(|r| r.attendance_date == date)
      .filter(|r| event_type.is_none_or(|e| r.event_type == e))
      .map(|r| AttendanceEntry {
        record:      r.clone(),
        member_name: tables
          .members
          .iter()
          .find(|m| m.member_id == r.member_id)
          .map(Member::full_name)
          .unwrap_or_default(),
      })
      .collect();
    entries.sort_by_key(|e| e.record.check_in_time);
    Ok(entries)
  }

  async fn truncate_all(&self) -> Result<u64, MemoryError> {
    self.wrote();
    let mut tables = self.tables.lock().unwrap();
    let n = tables.records.len() as u64;
    tables.records.clear();
    Ok(n)
  }
}

// ─── Recognition ─────────────────────────────────────────────────────────────

/// Returns canned responses and counts calls.
pub struct ScriptedClient {
  detect:      Mutex<Result<Vec<DetectedFace>, ClientError>>,
  enroll:      Mutex<Result<(), ClientError>>,
  remove:      Mutex<Result<(), ClientError>>,
  pub detects: AtomicUsize,
  pub enrolls: AtomicUsize,
  pub removes: AtomicUsize,
}

impl ScriptedClient {
  pub fn detecting(faces: Vec<DetectedFace>) -> Self {
    Self {
      detect:  Mutex::new(Ok(faces)),
      enroll:  Mutex::new(Ok(())),
      remove:  Mutex::new(Ok(())),
      detects: AtomicUsize::new(0),
      enrolls: AtomicUsize::new(0),
      removes: AtomicUsize::new(0),
    }
  }

  /// One face whose candidates are `(subject, similarity)` pairs.
  pub fn matching(candidates: &[(&str, f64)]) -> Self {
    Self::detecting(vec![face(candidates)])
  }

  pub fn failing(error: ClientError) -> Self {
    let client = Self::detecting(Vec::new());
    *client.detect.lock().unwrap() = Err(error);
    client
  }

  pub fn fail_enroll(self, error: ClientError) -> Self {
    *self.enroll.lock().unwrap() = Err(error);
    self
  }

  pub fn fail_remove(self, error: ClientError) -> Self {
    *self.remove.lock().unwrap() = Err(error);
    self
  }

  pub fn count(counter: &AtomicUsize) -> usize { counter.load(Ordering::SeqCst) }
}

pub fn face(candidates: &[(&str, f64)]) -> DetectedFace {
  DetectedFace {
    candidates: candidates
      .iter()
      .map(|(subject, similarity)| SubjectMatch {
        subject_id: (*subject).to_owned(),
        similarity: *similarity,
      })
      .collect(),
  }
}

impl RecognitionClient for ScriptedClient {
  async fn detect_or_match(&self, _image: Bytes) -> Result<Vec<DetectedFace>, ClientError> {
    self.detects.fetch_add(1, Ordering::SeqCst);
    self.detect.lock().unwrap().clone()
  }

  async fn enroll(&self, _image: Bytes, subject_id: &str) -> Result<EnrollmentRecord, ClientError> {
    self.enrolls.fetch_add(1, Ordering::SeqCst);
    self.enroll.lock().unwrap().clone()?;
    Ok(EnrollmentRecord {
      subject_id: subject_id.to_owned(),
      image_id:   Some("img-1".to_owned()),
      raw:        serde_json::json!({ "subject": subject_id, "image_id": "img-1" }),
    })
  }

  async fn remove_enrollment(&self, _subject_id: &str) -> Result<(), ClientError> {
    self.removes.fetch_add(1, Ordering::SeqCst);
    self.remove.lock().unwrap().clone()
  }
}

// ─── Photos ──────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryPhotos {
  pub saved:       Mutex<Vec<String>>,
  pub fail_save:   bool,
  pub fail_delete: bool,
}

impl PhotoStore for MemoryPhotos {
  type Error = MemoryError;

  async fn save(&self, member: &Member, _image: Bytes, format: ImageFormat) -> Result<String, MemoryError> {
    if self.fail_save {
      return Err(MemoryError("disk full".to_owned()));
    }
    let path = format!("member-photos/{}.{}", member.member_id, format.extension());
    self.saved.lock().unwrap().push(path.clone());
    Ok(path)
  }

  async fn delete(&self, path: &str) -> Result<(), MemoryError> {
    if self.fail_delete {
      return Err(MemoryError("permission denied".to_owned()));
    }
    self.saved.lock().unwrap().retain(|p| p != path);
    Ok(())
  }
}

// ─── Images ──────────────────────────────────────────────────────────────────

/// A buffer that passes the default image limits as a JPEG.
pub fn jpeg() -> Bytes {
  let mut bytes = vec![0u8; 4096];
  bytes[..3].copy_from_slice(&[0xFF, 0xD8, 0xFF]);
  Bytes::from(bytes)
}
