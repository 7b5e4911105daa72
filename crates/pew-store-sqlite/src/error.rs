//! Error type for `pew-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] pew_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A column held a value outside its domain, e.g. an unknown status.
  #[error("cannot decode column: {0}")]
  Decode(String),

  #[error("member not found: {0}")]
  MemberNotFound(uuid::Uuid),

  /// The member's status changed between reading and writing it.
  #[error("member {0} was modified concurrently")]
  ConcurrentModification(uuid::Uuid),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
