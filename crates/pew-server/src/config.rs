//! Server configuration.
//!
//! Read from an optional TOML file layered under `PEW_*` environment
//! variables. Nested keys use a double underscore, e.g.
//! `PEW_RECOGNITION__API_KEY` or `PEW_THRESHOLDS__REALTIME`.

use std::{
  collections::HashMap,
  path::{Path, PathBuf},
};

use ::config::{Config, ConfigError, Environment, File};
use pew_compreface::CompreFaceConfig;
use pew_core::{
  attendance::{DEFAULT_EVENT_TYPE, MAX_EVENT_TYPE_LEN},
  image::ImageLimits,
  pipeline::{PipelineConfig, Thresholds},
};
use serde::Deserialize;
use thiserror::Error;

const ENV_PREFIX: &str = "PEW";

#[derive(Debug, Error)]
pub enum InvalidConfig {
  #[error("image.min_bytes ({min}) must not exceed image.max_bytes ({max})")]
  ImageLimits { min: usize, max: usize },

  #[error("default_event_type must be 1 to {MAX_EVENT_TYPE_LEN} characters")]
  DefaultEventType,
}

/// Runtime server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:               String,
  pub port:               u16,
  pub store_path:         PathBuf,
  /// Root under which member photos are written.
  pub photo_dir:          PathBuf,
  pub default_event_type: String,
  pub thresholds:         Thresholds,
  pub image:              ImageLimits,
  pub recognition:        CompreFaceConfig,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:               "127.0.0.1".to_owned(),
      port:               8080,
      store_path:         PathBuf::from("pew.db"),
      photo_dir:          PathBuf::from("storage"),
      default_event_type: DEFAULT_EVENT_TYPE.to_owned(),
      thresholds:         Thresholds::default(),
      image:              ImageLimits::default(),
      recognition:        CompreFaceConfig::default(),
    }
  }
}

impl ServerConfig {
  /// Load from `path` (if it exists) and the process environment.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    Self::load_with_env(path, None)
  }

  /// As [`load`](Self::load), reading variables from `env` instead of the
  /// process environment when given.
  pub fn load_with_env(
    path: &Path,
    env: Option<HashMap<String, String>>,
  ) -> Result<Self, ConfigError> {
    Config::builder()
      .add_source(File::from(path).required(false))
      .add_source(
        Environment::with_prefix(ENV_PREFIX)
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true)
          .source(env),
      )
      .build()?
      .try_deserialize()
  }

  /// Checks that deserialisation alone cannot express.
  pub fn validate(&self) -> Result<(), InvalidConfig> {
    if self.image.min_bytes > self.image.max_bytes {
      return Err(InvalidConfig::ImageLimits {
        min: self.image.min_bytes,
        max: self.image.max_bytes,
      });
    }
    let event = self.default_event_type.trim();
    if event.is_empty() || event.chars().count() > MAX_EVENT_TYPE_LEN {
      return Err(InvalidConfig::DefaultEventType);
    }
    Ok(())
  }

  pub fn pipeline_config(&self) -> PipelineConfig {
    PipelineConfig {
      limits:             self.image,
      default_event_type: self.default_event_type.trim().to_owned(),
    }
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
