//! The `MemberDirectory` and `AttendanceLedger` traits.
//!
//! Both are implemented by storage backends (e.g. `pew-store-sqlite`). The
//! decision pipeline and the HTTP layer depend on these abstractions, not on
//! any concrete backend.
//!
//! All methods return `Send` futures so the traits can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::future::Future;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
  attendance::{AttendanceEntry, AttendanceRecord, InsertOutcome, NewAttendance},
  member::{Member, NewMember},
};

/// Result of a write guarded by a uniqueness constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome<T> {
  Written(T),
  /// Another active member already holds the same email or subject id.
  Conflict,
}

// ─── Members ─────────────────────────────────────────────────────────────────

pub trait MemberDirectory: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// The active member enrolled under `subject_id`, if any.
  fn find_by_subject_id<'a>(
    &'a self,
    subject_id: &'a str,
  ) -> impl Future<Output = Result<Option<Member>, Self::Error>> + Send + 'a;

  /// A member with this email regardless of status. An active member is
  /// preferred; otherwise the most recently updated inactive one.
  fn find_by_email_including_inactive<'a>(
    &'a self,
    email: &'a str,
  ) -> impl Future<Output = Result<Option<Member>, Self::Error>> + Send + 'a;

  /// Any member by id, active or not.
  fn get(
    &self,
    member_id: Uuid,
  ) -> impl Future<Output = Result<Option<Member>, Self::Error>> + Send + '_;

  /// Active members ordered by first name, then last name.
  fn list_active(
    &self,
  ) -> impl Future<Output = Result<Vec<Member>, Self::Error>> + Send + '_;

  /// Persist a new, active member.
  fn create(
    &self,
    input: NewMember,
  ) -> impl Future<Output = Result<WriteOutcome<Member>, Self::Error>> + Send + '_;

  /// Overwrite the mutable attributes (names, contact fields, photo, subject
  /// id, enrollment). Status is only changed through
  /// [`mark_inactive`](Self::mark_inactive) and [`restore`](Self::restore).
  fn update(
    &self,
    member: Member,
  ) -> impl Future<Output = Result<Member, Self::Error>> + Send + '_;

  /// Apply [`LifecycleEvent::Deactivate`](crate::member::LifecycleEvent) as a
  /// single write.
  fn mark_inactive(
    &self,
    member_id: Uuid,
  ) -> impl Future<Output = Result<Member, Self::Error>> + Send + '_;

  /// Apply [`LifecycleEvent::Restore`](crate::member::LifecycleEvent) and
  /// overwrite the mutable attributes with those of `member`, as one write
  /// that only applies while the stored member is still inactive.
  ///
  /// [`WriteOutcome::Conflict`] when the member is no longer inactive (a
  /// concurrent restore won) or another active member holds its email or
  /// subject id.
  fn restore(
    &self,
    member: Member,
  ) -> impl Future<Output = Result<WriteOutcome<Member>, Self::Error>> + Send + '_;

  /// Permanently delete a member row. Returns `false` if there was none.
  fn delete(
    &self,
    member_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}

// ─── Attendance ──────────────────────────────────────────────────────────────

pub trait AttendanceLedger: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn find_by_member_date_event<'a>(
    &'a self,
    member_id: Uuid,
    date: NaiveDate,
    event_type: &'a str,
  ) -> impl Future<Output = Result<Option<AttendanceRecord>, Self::Error>> + Send + 'a;

  /// Insert unless a record with the same (member, date, event type) exists.
  ///
  /// Must not fail on the uniqueness constraint: a concurrent insert that
  /// wins the race is reported as [`InsertOutcome::AlreadyExists`].
  fn create_if_absent(
    &self,
    input: NewAttendance,
  ) -> impl Future<Output = Result<InsertOutcome, Self::Error>> + Send + '_;

  /// Returns `false` if there was no such record.
  fn delete_by_id(
    &self,
    record_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Delete every record of one member; returns how many were removed.
  fn delete_for_member(
    &self,
    member_id: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Records on `date`, optionally restricted to one event type, ordered by
  /// check-in time.
  fn list_for_date<'a>(
    &'a self,
    date: NaiveDate,
    event_type: Option<&'a str>,
  ) -> impl Future<Output = Result<Vec<AttendanceEntry>, Self::Error>> + Send + 'a;

  /// Administrative bulk clear; returns how many records were removed.
  fn truncate_all(
    &self,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;
}
