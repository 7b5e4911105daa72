//! CompreFace implementation of [`pew_core::recognition::RecognitionClient`].
//!
//! Talks to the recognition service of a CompreFace instance over HTTP.
//! Transport failures, non-success statuses and undecodable bodies are all
//! translated into [`pew_core::recognition::ClientError`] here.

mod client;
mod config;
mod wire;

pub mod error;

pub use client::CompreFaceClient;
pub use config::CompreFaceConfig;
pub use error::{Error, Result};
