//! Upload validation shared by check-in and registration.
//!
//! Images are rejected before any network or storage call when they are
//! empty, implausibly small (a degenerate capture), too large for the
//! recognition service, or not a JPEG or PNG.

use serde::Deserialize;
use thiserror::Error;

/// Uploads below this are treated as broken captures.
pub const DEFAULT_MIN_BYTES: usize = 1024;
/// The recognition service refuses anything larger.
pub const DEFAULT_MAX_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
  Jpeg,
  Png,
}

impl ImageFormat {
  /// Identify the format from its magic bytes.
  pub fn sniff(bytes: &[u8]) -> Option<Self> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
      Some(Self::Jpeg)
    } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
      Some(Self::Png)
    } else {
      None
    }
  }

  pub fn extension(self) -> &'static str {
    match self {
      Self::Jpeg => "jpg",
      Self::Png => "png",
    }
  }

  pub fn media_type(self) -> &'static str {
    match self {
      Self::Jpeg => "image/jpeg",
      Self::Png => "image/png",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidImage {
  #[error("no image provided")]
  Empty,
  #[error(
    "image is too small ({size} bytes, minimum {min}); please provide a \
     clearer photo"
  )]
  TooSmall { size: usize, min: usize },
  #[error("image is too large ({size} bytes, maximum {max})")]
  TooLarge { size: usize, max: usize },
  #[error("unsupported image format; please use JPEG or PNG")]
  UnsupportedFormat,
}

/// Size bounds for uploaded images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ImageLimits {
  pub min_bytes: usize,
  pub max_bytes: usize,
}

impl Default for ImageLimits {
  fn default() -> Self {
    Self {
      min_bytes: DEFAULT_MIN_BYTES,
      max_bytes: DEFAULT_MAX_BYTES,
    }
  }
}

impl ImageLimits {
  pub fn check(&self, bytes: &[u8]) -> Result<ImageFormat, InvalidImage> {
    let size = bytes.len();
    if size == 0 {
      return Err(InvalidImage::Empty);
    }
    if size < self.min_bytes {
      return Err(InvalidImage::TooSmall {
        size,
        min: self.min_bytes,
      });
    }
    if size > self.max_bytes {
      return Err(InvalidImage::TooLarge {
        size,
        max: self.max_bytes,
      });
    }
    ImageFormat::sniff(bytes).ok_or(InvalidImage::UnsupportedFormat)
  }
}
