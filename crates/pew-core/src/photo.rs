//! Storage for enrollment photos. Only the narrow save/delete contract lives
//! here; the server provides a filesystem implementation.

use std::future::Future;

use bytes::Bytes;

use crate::{image::ImageFormat, member::Member};

pub trait PhotoStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Store `image` for `member` and return its path relative to the store.
  fn save<'a>(
    &'a self,
    member: &'a Member,
    image: Bytes,
    format: ImageFormat,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'a;

  /// Delete a previously saved photo. Deleting a missing file succeeds.
  fn delete<'a>(
    &'a self,
    path: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
