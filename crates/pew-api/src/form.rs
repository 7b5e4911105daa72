//! Multipart form decoding shared by the check-in and registration handlers.

use std::collections::HashMap;

use axum::{
  extract::{Multipart, multipart::MultipartError},
  http::StatusCode,
};
use bytes::Bytes;

/// Name of the file field carrying the image.
pub const IMAGE_FIELD: &str = "image";

/// A decoded multipart upload: the image (empty when absent) and every other
/// field as text.
#[derive(Debug, Default)]
pub struct Upload {
  pub image: Bytes,
  fields:    HashMap<String, String>,
}

/// Why a form could not be read, worded for the caller.
fn rejection(e: &MultipartError, max_image_bytes: usize) -> String {
  if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
    format!("image is too large (maximum {max_image_bytes} bytes)")
  } else {
    e.body_text()
  }
}

impl Upload {
  /// Decode the form. The error is a reason to report as invalid input.
  pub async fn read(
    mut multipart: Multipart,
    max_image_bytes: usize,
  ) -> Result<Self, String> {
    let reject = |e: MultipartError| rejection(&e, max_image_bytes);
    let mut upload = Self::default();
    while let Some(field) = multipart.next_field().await.map_err(reject)? {
      let name = field.name().unwrap_or_default().to_owned();
      if name == IMAGE_FIELD {
        upload.image = field.bytes().await.map_err(reject)?;
      } else {
        let value = field.text().await.map_err(reject)?;
        upload.fields.insert(name, value);
      }
    }
    Ok(upload)
  }

  /// Take a text field, treating blank values as absent.
  pub fn take(&mut self, name: &str) -> Option<String> {
    self.fields.remove(name).filter(|v| !v.trim().is_empty())
  }
}
