//! JSON and multipart HTTP API for attendance check-in.
//!
//! Exposes an axum [`Router`] backed by any store implementing both
//! [`MemberDirectory`] and [`AttendanceLedger`], any [`RecognitionClient`] and
//! any [`PhotoStore`]. TLS and transport concerns are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = pew_api::api_router(AppState::new(store, client, photos, config, thresholds));
//! ```

pub mod attendance;
pub mod error;
pub mod form;
pub mod members;
pub mod records;
pub mod view;

use std::sync::Arc;

use axum::{
  Router,
  extract::DefaultBodyLimit,
  routing::{delete, get, post},
};
use pew_core::{
  clock::{Clock, SystemClock},
  photo::PhotoStore,
  pipeline::{PipelineConfig, RecognitionPipeline, Thresholds},
  recognition::RecognitionClient,
  registration::RegistrationGate,
  removal::MemberRemoval,
  store::{AttendanceLedger, MemberDirectory},
};

pub use error::ApiError;

/// Room for multipart framing and text fields on top of the image itself.
const FORM_OVERHEAD: usize = 64 * 1024;

/// A backend that holds both members and their attendance.
pub trait AttendanceStore: MemberDirectory + AttendanceLedger + 'static {}

impl<T> AttendanceStore for T where T: MemberDirectory + AttendanceLedger + 'static {}

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S, C, P> {
  pub store:        Arc<S>,
  pub pipeline:     Arc<RecognitionPipeline<S, S, C>>,
  pub registration: Arc<RegistrationGate<S, C, P>>,
  pub removal:      Arc<MemberRemoval<S, S, C, P>>,
  pub thresholds:   Thresholds,
  pub clock:        Arc<dyn Clock>,
}

impl<S, C, P> Clone for AppState<S, C, P> {
  fn clone(&self) -> Self {
    Self {
      store:        self.store.clone(),
      pipeline:     self.pipeline.clone(),
      registration: self.registration.clone(),
      removal:      self.removal.clone(),
      thresholds:   self.thresholds,
      clock:        self.clock.clone(),
    }
  }
}

impl<S, C, P> AppState<S, C, P>
where
  S: AttendanceStore,
  C: RecognitionClient + 'static,
  P: PhotoStore + 'static,
{
  pub fn new(
    store: Arc<S>,
    client: Arc<C>,
    photos: Arc<P>,
    config: PipelineConfig,
    thresholds: Thresholds,
  ) -> Self {
    Self::with_clock(store, client, photos, config, thresholds, Arc::new(SystemClock))
  }

  /// As [`new`](Self::new), with check-in dates taken from `clock`.
  pub fn with_clock(
    store: Arc<S>,
    client: Arc<C>,
    photos: Arc<P>,
    config: PipelineConfig,
    thresholds: Thresholds,
    clock: Arc<dyn Clock>,
  ) -> Self {
    let registration = RegistrationGate::new(
      store.clone(),
      client.clone(),
      photos.clone(),
      config.limits,
    );
    let removal =
      MemberRemoval::new(store.clone(), store.clone(), client.clone(), photos);
    let pipeline = RecognitionPipeline::new(store.clone(), store.clone(), client, config)
      .with_clock(clock.clone());

    Self {
      store,
      pipeline: Arc::new(pipeline),
      registration: Arc::new(registration),
      removal: Arc::new(removal),
      thresholds,
      clock,
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the API router for `state`.
///
/// The returned `Router<()>` can be merged or nested into any parent router
/// regardless of its own state type.
pub fn api_router<S, C, P>(state: AppState<S, C, P>) -> Router<()>
where
  S: AttendanceStore,
  C: RecognitionClient + 'static,
  P: PhotoStore + 'static,
{
  let body_limit = state.pipeline.config().limits.max_bytes + FORM_OVERHEAD;

  Router::new()
    // Check-in
    .route("/attendance/record", post(attendance::record::<S, C, P>))
    .route("/attendance/realtime", post(attendance::realtime::<S, C, P>))
    .route("/attendance/recognize", post(attendance::recognize::<S, C, P>))
    .route("/attendance/register", post(attendance::register::<S, C, P>))
    // Reports
    .route(
      "/attendance/records",
      get(records::list::<S, C, P>).delete(records::clear::<S, C, P>),
    )
    .route("/attendance/records/{id}", delete(records::delete_one::<S, C, P>))
    // Members
    .route("/members", get(members::list::<S, C, P>))
    .route("/members/{id}", delete(members::remove::<S, C, P>))
    .layer(DefaultBodyLimit::max(body_limit))
    .with_state(state)
}
