//! The registration gate — the write path that creates members.
//!
//! A member is only useful once the recognition service knows their face, so
//! registration is ordered to fail before any write whenever it can:
//! the form and image are validated, then the image must contain exactly one
//! face. Only then is a member created (or a previously deactivated one
//! restored), the photo stored, and the face enrolled. If enrollment fails the
//! member is deactivated, then any partial enrollment and the photo removed.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{error, info, warn};

use crate::{
  Error, Result,
  image::{ImageFormat, ImageLimits},
  member::{Member, NewMember, new_subject_id},
  photo::PhotoStore,
  recognition::{ClientError, RecognitionClient},
  store::{MemberDirectory, WriteOutcome},
};

const MAX_NAME_LEN: usize = 255;
const MAX_PHONE_LEN: usize = 20;

/// A registration form.
#[derive(Debug, Clone)]
pub struct Registration {
  pub first_name: String,
  pub last_name:  String,
  pub email:      Option<String>,
  pub phone:      Option<String>,
  pub image:      Bytes,
}

#[derive(Debug, Clone, PartialEq, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum RegistrationOutcome {
  Registered {
    member:   Member,
    /// The member existed, inactive, and was brought back.
    restored: bool,
  },
  /// An active member already uses this email.
  EmailTaken { email: String },
  InvalidInput { reason: String },
  ServiceUnavailable { cause: String },
}

impl RegistrationOutcome {
  pub fn tag(&self) -> &'static str { self.into() }

  pub fn message(&self) -> String {
    match self {
      Self::Registered { .. } => "Registration successful! You can now use \
                                  face recognition to record attendance."
        .to_owned(),
      Self::EmailTaken { .. } => "This email address is already registered. \
                                  Please use a different email address."
        .to_owned(),
      Self::InvalidInput { reason } => reason.clone(),
      Self::ServiceUnavailable { .. } => "Face recognition service is \
                                          currently unavailable. Please try \
                                          again later."
        .to_owned(),
    }
  }

  fn from_client_error(e: ClientError) -> Self {
    match e {
      ClientError::BadRequest(reason) => Self::InvalidInput { reason },
      other => Self::ServiceUnavailable {
        cause: other.to_string(),
      },
    }
  }
}

/// Validated, trimmed form fields.
struct Form {
  first_name: String,
  last_name:  String,
  email:      Option<String>,
  phone:      Option<String>,
}

fn non_blank(value: Option<&str>) -> Option<String> {
  value.map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned)
}

fn looks_like_email(email: &str) -> bool {
  match email.split_once('@') {
    Some((local, domain)) => {
      !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.contains(char::is_whitespace)
    }
    None => false,
  }
}

impl Registration {
  fn validate(&self) -> Result<Form, String> {
    let first_name = non_blank(Some(&self.first_name))
      .ok_or_else(|| "first name is required".to_owned())?;
    let last_name = non_blank(Some(&self.last_name))
      .ok_or_else(|| "last name is required".to_owned())?;
    if first_name.chars().count() > MAX_NAME_LEN
      || last_name.chars().count() > MAX_NAME_LEN
    {
      return Err(format!("names must be at most {MAX_NAME_LEN} characters"));
    }

    let email = non_blank(self.email.as_deref()).map(|e| e.to_lowercase());
    if let Some(email) = &email
      && !looks_like_email(email)
    {
      return Err(format!("{email:?} is not a valid email address"));
    }

    let phone = non_blank(self.phone.as_deref());
    if phone
      .as_ref()
      .is_some_and(|p| p.chars().count() > MAX_PHONE_LEN)
    {
      return Err(format!(
        "phone number must be at most {MAX_PHONE_LEN} characters"
      ));
    }

    Ok(Form {
      first_name,
      last_name,
      email,
      phone,
    })
  }
}

pub struct RegistrationGate<D, C, P> {
  directory: Arc<D>,
  client:    Arc<C>,
  photos:    Arc<P>,
  limits:    ImageLimits,
}

impl<D, C, P> RegistrationGate<D, C, P>
where
  D: MemberDirectory,
  C: RecognitionClient,
  P: PhotoStore,
{
  pub fn new(
    directory: Arc<D>,
    client: Arc<C>,
    photos: Arc<P>,
    limits: ImageLimits,
  ) -> Self {
    Self {
      directory,
      client,
      photos,
      limits,
    }
  }

  pub async fn register(
    &self,
    registration: Registration,
  ) -> Result<RegistrationOutcome> {
    let form = match registration.validate() {
      Ok(f) => f,
      Err(reason) => return Ok(RegistrationOutcome::InvalidInput { reason }),
    };
    let format = match self.limits.check(&registration.image) {
      Ok(f) => f,
      Err(e) => {
        return Ok(RegistrationOutcome::InvalidInput {
          reason: e.to_string(),
        });
      }
    };
    let image = registration.image;

    // Exactly one face, before anything is written.
    let faces = match self.client.detect_or_match(image.clone()).await {
      Ok(faces) => faces,
      Err(e) => {
        error!(error = %e, "face detection failed during registration");
        return Ok(RegistrationOutcome::from_client_error(e));
      }
    };
    match faces.len() {
      1 => {}
      0 => {
        warn!("no face detected in registration image");
        return Ok(RegistrationOutcome::InvalidInput {
          reason: "No face was detected in the photo. Please try again with \
                   better lighting and make sure your face is clearly visible."
            .to_owned(),
        });
      }
      n => {
        warn!(faces = n, "multiple faces detected in registration image");
        return Ok(RegistrationOutcome::InvalidInput {
          reason: "Multiple faces were detected in the photo. Please provide \
                   a photo with only your face."
            .to_owned(),
        });
      }
    }

    let (member, restored) = match self.claim_member(form).await? {
      Ok(claimed) => claimed,
      Err(taken) => return Ok(taken),
    };

    let member = self.attach_photo(member, image.clone(), format).await?;

    match self.client.enroll(image, &member.subject_id).await {
      Ok(enrollment) => {
        let member = self
          .directory
          .update(Member {
            enrollment: Some(enrollment.raw),
            ..member
          })
          .await
          .map_err(Error::store)?;
        info!(
          member_id = %member.member_id,
          subject_id = %member.subject_id,
          restored,
          "member registered"
        );
        Ok(RegistrationOutcome::Registered { member, restored })
      }
      Err(e) => {
        error!(
          member_id = %member.member_id,
          subject_id = %member.subject_id,
          error = %e,
          "enrollment failed; deactivating member"
        );
        self.compensate(member).await?;
        Ok(RegistrationOutcome::from_client_error(e))
      }
    }
  }

  /// Create the member, or restore an inactive one registered under the
  /// same email. The inner `Err` is the outcome to report when the email
  /// belongs to an active member.
  async fn claim_member(
    &self,
    form: Form,
  ) -> Result<Result<(Member, bool), RegistrationOutcome>> {
    let taken = |email: &Option<String>| RegistrationOutcome::EmailTaken {
      email: email.clone().unwrap_or_default(),
    };

    if let Some(email) = &form.email
      && let Some(existing) = self
        .directory
        .find_by_email_including_inactive(email)
        .await
        .map_err(Error::store)?
    {
      if existing.is_active() {
        return Ok(Err(taken(&form.email)));
      }

      // One conditional write: a concurrent registration that restored the
      // member first leaves it active and this one loses.
      let candidate = Member {
        first_name: form.first_name,
        last_name: form.last_name,
        phone: form.phone,
        photo: None,
        subject_id: new_subject_id(),
        enrollment: None,
        ..existing
      };
      return match self
        .directory
        .restore(candidate)
        .await
        .map_err(Error::store)?
      {
        WriteOutcome::Written(member) => {
          info!(member_id = %member.member_id, "restoring inactive member");
          Ok(Ok((member, true)))
        }
        WriteOutcome::Conflict => Ok(Err(taken(&form.email))),
      };
    }

    let input = NewMember {
      first_name: form.first_name,
      last_name:  form.last_name,
      email:      form.email.clone(),
      phone:      form.phone,
      subject_id: new_subject_id(),
    };
    match self.directory.create(input).await.map_err(Error::store)? {
      WriteOutcome::Written(member) => Ok(Ok((member, false))),
      WriteOutcome::Conflict => Ok(Err(taken(&form.email))),
    }
  }

  /// Store the photo and record its path. A storage failure is logged and
  /// registration continues without a photo.
  async fn attach_photo(
    &self,
    member: Member,
    image: Bytes,
    format: ImageFormat,
  ) -> Result<Member> {
    match self.photos.save(&member, image, format).await {
      Ok(path) => self
        .directory
        .update(Member {
          photo: Some(path),
          ..member
        })
        .await
        .map_err(Error::store),
      Err(e) => {
        warn!(
          member_id = %member.member_id,
          error = %e,
          "failed to store registration photo"
        );
        Ok(member)
      }
    }
  }

  /// Undo a registration whose enrollment failed. Deactivation comes first
  /// and is a single write, so the member leaves every active-only view at
  /// once. The enrollment and photo are then removed. Each step is attempted
  /// whatever happened to the others; a directory failure is returned once
  /// all of them have run.
  async fn compensate(&self, member: Member) -> Result<()> {
    let member_id = member.member_id;
    let mut failure = None;

    let current = match self.directory.mark_inactive(member_id).await {
      Ok(deactivated) => deactivated,
      Err(e) => {
        error!(%member_id, error = %e, "failed to deactivate member");
        failure = Some(Error::store(e));
        member
      }
    };

    // The enroll call may have reached the service before failing.
    if let Err(e) = self.client.remove_enrollment(&current.subject_id).await {
      warn!(
        %member_id,
        subject_id = %current.subject_id,
        error = %e,
        "failed to remove enrollment of deactivated member"
      );
    }

    if let Some(path) = current.photo.clone() {
      if let Err(e) = self.photos.delete(&path).await {
        warn!(
          %member_id,
          photo = %path,
          error = %e,
          "failed to delete photo of deactivated member"
        );
      }
      if let Err(e) = self
        .directory
        .update(Member {
          photo: None,
          ..current
        })
        .await
      {
        error!(%member_id, error = %e, "failed to clear photo path");
        if failure.is_none() {
          failure = Some(Error::store(e));
        }
      }
    }

    match failure {
      Some(e) => Err(e),
      None => Ok(()),
    }
  }
}
