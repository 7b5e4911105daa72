//! Error type for `pew-compreface`. Only construction can fail with it;
//! request failures are [`pew_core::recognition::ClientError`]s.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("recognition api key is not configured")]
  MissingApiKey,

  #[error("invalid recognition base url {0:?}")]
  InvalidBaseUrl(String),

  #[error("failed to build HTTP client: {0}")]
  Http(#[from] reqwest::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
