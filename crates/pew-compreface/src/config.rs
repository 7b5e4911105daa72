use std::time::Duration;

use serde::Deserialize;

/// Connection settings for a CompreFace recognition service.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompreFaceConfig {
  pub base_url:             String,
  /// Key of the recognition service, sent as `x-api-key`. Must be set.
  pub api_key:              String,
  pub connect_timeout_secs: u64,
  pub timeout_secs:         u64,
  /// Minimum probability for a detected region to count as a face.
  pub det_prob_threshold:   f64,
  /// How many candidate subjects to return per face.
  pub prediction_count:     u32,
}

impl Default for CompreFaceConfig {
  fn default() -> Self {
    Self {
      base_url:             "http://localhost:8000".to_owned(),
      api_key:              String::new(),
      connect_timeout_secs: 10,
      timeout_secs:         30,
      det_prob_threshold:   0.7,
      prediction_count:     1,
    }
  }
}

impl CompreFaceConfig {
  pub fn connect_timeout(&self) -> Duration {
    Duration::from_secs(self.connect_timeout_secs)
  }

  pub fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs) }
}
