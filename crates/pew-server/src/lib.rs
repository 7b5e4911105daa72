//! Attendance check-in server.
//!
//! Wires the SQLite store, the CompreFace client and a filesystem photo
//! store into the `pew-api` router, and owns server configuration.

pub mod config;
pub mod photos;

pub use config::ServerConfig;
pub use photos::FsPhotoStore;

use axum::Router;
use pew_api::{AppState, AttendanceStore, api_router};
use pew_core::{photo::PhotoStore, recognition::RecognitionClient};
use tower_http::trace::TraceLayer;

/// The API router with request tracing.
pub fn router<S, C, P>(state: AppState<S, C, P>) -> Router
where
  S: AttendanceStore,
  C: RecognitionClient + 'static,
  P: PhotoStore + 'static,
{
  api_router(state).layer(TraceLayer::new_for_http())
}
