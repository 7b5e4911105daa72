//! [`SqliteStore`] — the SQLite implementation of [`MemberDirectory`] and
//! [`AttendanceLedger`].

use std::path::Path;

use chrono::{NaiveDate, Utc};
use rusqlite::OptionalExtension as _;
use tracing::debug;
use uuid::Uuid;

use pew_core::{
  attendance::{AttendanceEntry, AttendanceRecord, InsertOutcome, NewAttendance},
  member::{LifecycleEvent, Member, MemberStatus, NewMember},
  store::{AttendanceLedger, MemberDirectory, WriteOutcome},
};

use crate::{
  Error, Result,
  encode::{
    MEMBER_COLUMNS, RECORD_COLUMNS, RawEntry, RawMember, RawRecord, encode_date,
    encode_dt, encode_enrollment, encode_status, encode_time, encode_uuid,
  },
  schema::SCHEMA,
};

/// Whether `e` is a violation of a UNIQUE constraint or unique index.
fn is_unique_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(f, _)
      if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
  )
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// Members and attendance records backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Fetch one member with an arbitrary `WHERE` clause over a single
  /// parameter.
  async fn member_where(
    &self,
    clause: &'static str,
    param: String,
  ) -> Result<Option<Member>> {
    let raw: Option<RawMember> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {MEMBER_COLUMNS} FROM members WHERE {clause}"),
              rusqlite::params![param],
              RawMember::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawMember::into_member).transpose()
  }

  async fn record_where(
    &self,
    member_id: Uuid,
    date: NaiveDate,
    event_type: String,
  ) -> Result<Option<AttendanceRecord>> {
    let id_str = encode_uuid(member_id);
    let date_str = encode_date(date);

    let raw: Option<RawRecord> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {RECORD_COLUMNS} FROM attendance_records r
                 WHERE r.member_id = ?1
                   AND r.attendance_date = ?2
                   AND r.event_type = ?3"
              ),
              rusqlite::params![id_str, date_str, event_type],
              RawRecord::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawRecord::into_record).transpose()
  }

  /// Apply a lifecycle event as one conditional write. Returns `None` when
  /// the new status would violate an active-member uniqueness index.
  async fn transition(
    &self,
    member_id: Uuid,
    event: LifecycleEvent,
  ) -> Result<Option<Member>> {
    let member = self.get_member(member_id).await?;
    let from = member.status;
    let to = from.apply(event)?;

    let id_str = encode_uuid(member_id);
    let from_str = encode_status(from);
    let to_str = encode_status(to);
    let at_str = encode_dt(Utc::now());

    let changed: Option<usize> = self
      .conn
      .call(move |conn| {
        match conn.execute(
          "UPDATE members SET status = ?1, updated_at = ?2
           WHERE member_id = ?3 AND status = ?4",
          rusqlite::params![to_str, at_str, id_str, from_str],
        ) {
          Ok(n) => Ok(Some(n)),
          Err(e) if is_unique_violation(&e) => Ok(None),
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    match changed {
      None => Ok(None),
      Some(0) => Err(Error::ConcurrentModification(member_id)),
      Some(_) => {
        debug!(%member_id, %event, %to, "member status changed");
        self.get_member(member_id).await.map(Some)
      }
    }
  }

  async fn get_member(&self, member_id: Uuid) -> Result<Member> {
    self
      .member_where("member_id = ?1", encode_uuid(member_id))
      .await?
      .ok_or(Error::MemberNotFound(member_id))
  }
}

// ─── MemberDirectory impl ────────────────────────────────────────────────────

impl MemberDirectory for SqliteStore {
  type Error = Error;

  async fn find_by_subject_id(&self, subject_id: &str) -> Result<Option<Member>> {
    self
      .member_where("subject_id = ?1 AND status = 'active'", subject_id.to_owned())
      .await
  }

  async fn find_by_email_including_inactive(
    &self,
    email: &str,
  ) -> Result<Option<Member>> {
    self
      .member_where(
        "email = ?1 ORDER BY status = 'active' DESC, updated_at DESC LIMIT 1",
        email.to_owned(),
      )
      .await
  }

  async fn get(&self, member_id: Uuid) -> Result<Option<Member>> {
    self.member_where("member_id = ?1", encode_uuid(member_id)).await
  }

  async fn list_active(&self) -> Result<Vec<Member>> {
    let raws: Vec<RawMember> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {MEMBER_COLUMNS} FROM members
           WHERE status = 'active'
           ORDER BY first_name, last_name"
        ))?;
        let rows = stmt
          .query_map([], RawMember::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMember::into_member).collect()
  }

  async fn create(&self, input: NewMember) -> Result<WriteOutcome<Member>> {
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

    let id_str      = encode_uuid(member.member_id);
    let first_name  = member.first_name.clone();
    let last_name   = member.last_name.clone();
    let email       = member.email.clone();
    let phone       = member.phone.clone();
    let subject_id  = member.subject_id.clone();
    let status_str  = encode_status(member.status);
    let at_str      = encode_dt(now);

    let inserted: bool = self
      .conn
      .call(move |conn| {
        match conn.execute(
          "INSERT INTO members (
             member_id, first_name, last_name, email, phone,
             subject_id, status, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
          rusqlite::params![
            id_str, first_name, last_name, email, phone, subject_id,
            status_str, at_str,
          ],
        ) {
          Ok(_) => Ok(true),
          Err(e) if is_unique_violation(&e) => Ok(false),
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    if inserted {
      Ok(WriteOutcome::Written(member))
    } else {
      Ok(WriteOutcome::Conflict)
    }
  }

  async fn update(&self, member: Member) -> Result<Member> {
    let member_id   = member.member_id;
    let id_str      = encode_uuid(member_id);
    let enrollment  = encode_enrollment(member.enrollment.as_ref());
    let at_str      = encode_dt(Utc::now());

    let changed: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE members SET
             first_name = ?1, last_name = ?2, email = ?3, phone = ?4,
             photo = ?5, subject_id = ?6, enrollment = ?7, updated_at = ?8
           WHERE member_id = ?9",
          rusqlite::params![
            member.first_name,
            member.last_name,
            member.email,
            member.phone,
            member.photo,
            member.subject_id,
            enrollment,
            at_str,
            id_str,
          ],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(Error::MemberNotFound(member_id));
    }
    self.get_member(member_id).await
  }

  async fn mark_inactive(&self, member_id: Uuid) -> Result<Member> {
    // Deactivating cannot violate a partial index over active rows.
    self
      .transition(member_id, LifecycleEvent::Deactivate)
      .await?
      .ok_or(Error::ConcurrentModification(member_id))
  }

  async fn restore(&self, member: Member) -> Result<WriteOutcome<Member>> {
    let member_id   = member.member_id;
    let from        = MemberStatus::Inactive;
    let to          = from.apply(LifecycleEvent::Restore)?;
    let id_str      = encode_uuid(member_id);
    let enrollment  = encode_enrollment(member.enrollment.as_ref());
    let from_str    = encode_status(from);
    let to_str      = encode_status(to);
    let at_str      = encode_dt(Utc::now());

    let changed: Option<usize> = self
      .conn
      .call(move |conn| {
        match conn.execute(
          "UPDATE members SET
             first_name = ?1, last_name = ?2, email = ?3, phone = ?4,
             photo = ?5, subject_id = ?6, enrollment = ?7,
             status = ?8, updated_at = ?9
           WHERE member_id = ?10 AND status = ?11",
          rusqlite::params![
            member.first_name,
            member.last_name,
            member.email,
            member.phone,
            member.photo,
            member.subject_id,
            enrollment,
            to_str,
            at_str,
            id_str,
            from_str,
          ],
        ) {
          Ok(n) => Ok(Some(n)),
          Err(e) if is_unique_violation(&e) => Ok(None),
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    match changed {
      None => Ok(WriteOutcome::Conflict),
      Some(0) => {
        // Either gone, or no longer inactive because another restore won.
        self.get_member(member_id).await?;
        Ok(WriteOutcome::Conflict)
      }
      Some(_) => {
        debug!(%member_id, %to, "member restored");
        self.get_member(member_id).await.map(WriteOutcome::Written)
      }
    }
  }

  async fn delete(&self, member_id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(member_id);
    let n: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM members WHERE member_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;
    Ok(n > 0)
  }
}

// ─── AttendanceLedger impl ───────────────────────────────────────────────────

impl AttendanceLedger for SqliteStore {
  type Error = Error;

  async fn find_by_member_date_event(
    &self,
    member_id: Uuid,
    date: NaiveDate,
    event_type: &str,
  ) -> Result<Option<AttendanceRecord>> {
    self.record_where(member_id, date, event_type.to_owned()).await
  }

  async fn create_if_absent(&self, input: NewAttendance) -> Result<InsertOutcome> {
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

    let record_id_str = encode_uuid(record.record_id);
    let member_id_str = encode_uuid(record.member_id);
    let date_str      = encode_date(record.attendance_date);
    let time_str      = encode_time(record.check_in_time);
    let event_type    = record.event_type.clone();
    let score         = record.similarity_score;
    let notes         = record.notes.clone();
    let at_str        = encode_dt(record.created_at);

    let inserted: bool = self
      .conn
      .call(move |conn| {
        match conn.execute(
          "INSERT INTO attendance_records (
             record_id, member_id, attendance_date, check_in_time,
             event_type, similarity_score, notes, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            record_id_str, member_id_str, date_str, time_str, event_type,
            score, notes, at_str,
          ],
        ) {
          Ok(_) => Ok(true),
          Err(e) if is_unique_violation(&e) => Ok(false),
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    if inserted {
      return Ok(InsertOutcome::Created(record));
    }

    debug!(
      member_id = %record.member_id,
      event_type = %record.event_type,
      "attendance insert lost a uniqueness race"
    );
    let existing = self
      .record_where(record.member_id, record.attendance_date, record.event_type)
      .await?
      .ok_or(Error::ConcurrentModification(input.member_id))?;
    Ok(InsertOutcome::AlreadyExists(existing))
  }

  async fn delete_by_id(&self, record_id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(record_id);
    let n: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM attendance_records WHERE record_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;
    Ok(n > 0)
  }

  async fn delete_for_member(&self, member_id: Uuid) -> Result<u64> {
    let id_str = encode_uuid(member_id);
    let n: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM attendance_records WHERE member_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;
    Ok(n as u64)
  }

  async fn list_for_date(
    &self,
    date: NaiveDate,
    event_type: Option<&str>,
  ) -> Result<Vec<AttendanceEntry>> {
    let date_str = encode_date(date);
    let event_type = event_type.map(str::to_owned);

    let raws: Vec<RawEntry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {RECORD_COLUMNS}, m.first_name || ' ' || m.last_name
           FROM attendance_records r
           JOIN members m ON m.member_id = r.member_id
           WHERE r.attendance_date = ?1
             AND (?2 IS NULL OR r.event_type = ?2)
           ORDER BY r.check_in_time, r.created_at"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![date_str, event_type], |row| {
            Ok(RawEntry {
              record:      RawRecord::from_row(row)?,
              member_name: row.get(8)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEntry::into_entry).collect()
  }

  async fn truncate_all(&self) -> Result<u64> {
    let n: usize = self
      .conn
      .call(|conn| Ok(conn.execute("DELETE FROM attendance_records", [])?))
      .await?;
    Ok(n as u64)
  }
}
