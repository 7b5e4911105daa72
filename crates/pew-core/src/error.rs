//! Error types for `pew-core`.
//!
//! Expected recognition results (no face, low confidence, duplicate check-in)
//! are not errors; they are variants of [`crate::pipeline::Outcome`]. This
//! type covers the failures a caller cannot act on: storage faults and
//! violations of the member lifecycle.

use thiserror::Error;
use uuid::Uuid;

use crate::member::{LifecycleEvent, MemberStatus};

#[derive(Debug, Error)]
pub enum Error {
  #[error("member not found: {0}")]
  MemberNotFound(Uuid),

  #[error("cannot apply {event} to a member that is {from}")]
  InvalidTransition {
    from:  MemberStatus,
    event: LifecycleEvent,
  },

  #[error("threshold must be within [0, 1], got {0}")]
  InvalidThreshold(f64),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Box a backend error. Used at every collaborator call site.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
