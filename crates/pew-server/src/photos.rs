//! [`FsPhotoStore`] — member photos as files under a root directory.

use std::{
  io,
  path::{Component, Path, PathBuf},
};

use bytes::Bytes;
use pew_core::{image::ImageFormat, member::Member, photo::PhotoStore};
use tracing::debug;
use uuid::Uuid;

/// Subdirectory of the root that photos are written to.
const PHOTO_SUBDIR: &str = "member-photos";

#[derive(Debug, Clone)]
pub struct FsPhotoStore {
  root: PathBuf,
}

impl FsPhotoStore {
  pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

  /// Resolve a stored relative path, refusing anything that would leave the
  /// root.
  fn resolve(&self, path: &str) -> io::Result<PathBuf> {
    let rel = Path::new(path);
    if rel
      .components()
      .all(|c| matches!(c, Component::Normal(_)))
    {
      Ok(self.root.join(rel))
    } else {
      Err(io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("photo path {path:?} is outside the photo store"),
      ))
    }
  }
}

/// `Jane Doe-Smith` becomes `jane_doe_smith`.
fn slug(name: &str) -> String {
  let mut out = String::with_capacity(name.len());
  for c in name.chars() {
    if c.is_ascii_alphanumeric() {
      out.push(c.to_ascii_lowercase());
    } else if !out.is_empty() && !out.ends_with('_') {
      out.push('_');
    }
  }
  let trimmed = out.trim_end_matches('_');
  if trimmed.is_empty() {
    "member".to_owned()
  } else {
    trimmed.to_owned()
  }
}

fn file_name(member: &Member, format: ImageFormat) -> String {
  let suffix = Uuid::new_v4().simple().to_string();
  format!(
    "{}_{}.{}",
    slug(&format!("{} {}", member.first_name, member.last_name)),
    &suffix[..8],
    format.extension()
  )
}

impl PhotoStore for FsPhotoStore {
  type Error = io::Error;

  async fn save(&self, member: &Member, image: Bytes, format: ImageFormat) -> io::Result<String> {
    let rel = format!("{PHOTO_SUBDIR}/{}", file_name(member, format));
    tokio::fs::create_dir_all(self.root.join(PHOTO_SUBDIR)).await?;
    tokio::fs::write(self.root.join(&rel), &image).await?;
    debug!(member_id = %member.member_id, photo = %rel, "photo saved");
    Ok(rel)
  }

  async fn delete(&self, path: &str) -> io::Result<()> {
    match tokio::fs::remove_file(self.resolve(path)?).await {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(e),
    }
  }
}
