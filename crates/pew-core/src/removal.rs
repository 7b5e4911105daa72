//! Member removal.
//!
//! Removing a member touches three places: the recognition service, the photo
//! store and the directory. Only the directory is authoritative. The other two
//! are cleaned up first on a best-effort basis and each failure is reported
//! back instead of aborting the removal.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  member::Member,
  photo::PhotoStore,
  recognition::RecognitionClient,
  store::{AttendanceLedger, MemberDirectory},
};

#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RemovalMode {
  /// Deactivate the member and keep their attendance history.
  Soft,
  /// Delete the member and all of their attendance records.
  #[default]
  Hard,
}

/// The result of one best-effort cleanup step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum StepResult {
  Done,
  /// Nothing to clean up.
  Skipped,
  Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemovalReport {
  /// The member as they were before removal.
  pub member:          Member,
  pub mode:            RemovalMode,
  pub enrollment:      StepResult,
  pub photo:           StepResult,
  pub records_deleted: u64,
}

pub struct MemberRemoval<D, L, C, P> {
  directory: Arc<D>,
  ledger:    Arc<L>,
  client:    Arc<C>,
  photos:    Arc<P>,
}

impl<D, L, C, P> MemberRemoval<D, L, C, P>
where
  D: MemberDirectory,
  L: AttendanceLedger,
  C: RecognitionClient,
  P: PhotoStore,
{
  pub fn new(
    directory: Arc<D>,
    ledger: Arc<L>,
    client: Arc<C>,
    photos: Arc<P>,
  ) -> Self {
    Self {
      directory,
      ledger,
      client,
      photos,
    }
  }

  pub async fn remove(
    &self,
    member_id: Uuid,
    mode: RemovalMode,
  ) -> Result<RemovalReport> {
    let member = self
      .directory
      .get(member_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::MemberNotFound(member_id))?;

    let enrollment = match self
      .client
      .remove_enrollment(&member.subject_id)
      .await
    {
      Ok(()) => StepResult::Done,
      Err(e) => {
        warn!(
          %member_id,
          subject_id = %member.subject_id,
          error = %e,
          "failed to remove face enrollment"
        );
        StepResult::Failed(e.to_string())
      }
    };

    let photo = match &member.photo {
      None => StepResult::Skipped,
      Some(path) => match self.photos.delete(path).await {
        Ok(()) => StepResult::Done,
        Err(e) => {
          warn!(%member_id, photo = %path, error = %e, "failed to delete photo");
          StepResult::Failed(e.to_string())
        }
      },
    };

    let records_deleted = match mode {
      RemovalMode::Soft => {
        let current = if member.is_active() {
          self
            .directory
            .mark_inactive(member_id)
            .await
            .map_err(Error::store)?
        } else {
          member.clone()
        };
        // A path whose delete failed is kept so the file can still be found.
        if photo == StepResult::Done {
          self
            .directory
            .update(Member {
              photo: None,
              ..current
            })
            .await
            .map_err(Error::store)?;
        }
        0
      }
      RemovalMode::Hard => {
        let n = self
          .ledger
          .delete_for_member(member_id)
          .await
          .map_err(Error::store)?;
        self.directory.delete(member_id).await.map_err(Error::store)?;
        n
      }
    };

    info!(%member_id, %mode, records_deleted, "member removed");
    Ok(RemovalReport {
      member,
      mode,
      enrollment,
      photo,
      records_deleted,
    })
  }
}
