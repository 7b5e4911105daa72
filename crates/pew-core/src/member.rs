//! Members — the registered people attendance is recorded for.
//!
//! A member is correlated with the recognition service through its
//! `subject_id`. Removal is modelled as an explicit lifecycle rather than a
//! deletion timestamp: a member is either `Active` or `Inactive`, and only
//! active members take part in recognition lookups, listings, and the
//! duplicate-email check at registration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Lifecycle ───────────────────────────────────────────────────────────────

/// Whether a member participates in recognition.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MemberStatus {
  Active,
  Inactive,
}

/// An event that moves a member between lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum LifecycleEvent {
  /// Enrollment failed, or the member was soft-removed.
  Deactivate,
  /// A previously deactivated member registered again with the same email.
  Restore,
}

impl MemberStatus {
  /// The transition table. Anything not listed is rejected.
  ///
  /// | from       | `Deactivate` | `Restore` |
  /// |------------|--------------|-----------|
  /// | `Active`   | `Inactive`   | error     |
  /// | `Inactive` | error        | `Active`  |
  pub fn apply(self, event: LifecycleEvent) -> Result<Self> {
    match (self, event) {
      (Self::Active, LifecycleEvent::Deactivate) => Ok(Self::Inactive),
      (Self::Inactive, LifecycleEvent::Restore) => Ok(Self::Active),
      (from, event) => Err(Error::InvalidTransition { from, event }),
    }
  }

  pub fn is_active(self) -> bool { matches!(self, Self::Active) }
}

// ─── Member ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
  pub member_id:  Uuid,
  pub first_name: String,
  pub last_name:  String,
  pub email:      Option<String>,
  pub phone:      Option<String>,
  /// Path of the enrollment photo, relative to the photo store root.
  pub photo:      Option<String>,
  /// The key the recognition service reports matches under.
  pub subject_id: String,
  /// Whatever the recognition service returned on enrollment.
  pub enrollment: Option<serde_json::Value>,
  pub status:     MemberStatus,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Member {
  pub fn full_name(&self) -> String {
    format!("{} {}", self.first_name, self.last_name)
  }

  pub fn is_active(&self) -> bool { self.status.is_active() }
}

/// Input to [`crate::store::MemberDirectory::create`].
///
/// The id, timestamps, and status (always `Active`) are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewMember {
  pub first_name: String,
  pub last_name:  String,
  pub email:      Option<String>,
  pub phone:      Option<String>,
  pub subject_id: String,
}

/// Generate a fresh subject identifier for a new enrollment.
pub fn new_subject_id() -> String { Uuid::new_v4().to_string() }
