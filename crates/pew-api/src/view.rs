//! Response shapes. Internal columns such as the recognition subject id and
//! the raw enrollment payload are not exposed.

use chrono::{DateTime, Utc};
use pew_core::member::{Member, MemberStatus};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct MemberView {
  pub member_id:  Uuid,
  pub first_name: String,
  pub last_name:  String,
  pub full_name:  String,
  pub email:      Option<String>,
  pub phone:      Option<String>,
  pub photo:      Option<String>,
  pub status:     MemberStatus,
  pub created_at: DateTime<Utc>,
}

impl From<&Member> for MemberView {
  fn from(m: &Member) -> Self {
    Self {
      member_id:  m.member_id,
      first_name: m.first_name.clone(),
      last_name:  m.last_name.clone(),
      full_name:  m.full_name(),
      email:      m.email.clone(),
      phone:      m.phone.clone(),
      photo:      m.photo.clone(),
      status:     m.status,
      created_at: m.created_at,
    }
  }
}
