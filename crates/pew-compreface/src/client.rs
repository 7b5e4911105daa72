//! Async HTTP client for the CompreFace recognition API.

use bytes::Bytes;
use pew_core::{
  image::ImageFormat,
  recognition::{ClientError, DetectedFace, EnrollmentRecord, RecognitionClient},
};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url, multipart};
use tracing::{debug, error, info, warn};

use crate::{
  CompreFaceConfig, Error, Result,
  wire::{ErrorBody, RecognizeResponse, classify, enrollment_from},
};

const API_KEY_HEADER: &str = "x-api-key";

/// A failed exchange: either no response at all, or a non-success status
/// with its decoded error body.
enum Failure {
  Transport(ClientError),
  Status(StatusCode, ErrorBody),
}

/// Client for one CompreFace recognition service.
///
/// Cheap to clone — the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct CompreFaceClient {
  client: Client,
  base:   Url,
  config: CompreFaceConfig,
}

impl CompreFaceClient {
  pub fn new(config: CompreFaceConfig) -> Result<Self> {
    if config.api_key.trim().is_empty() {
      return Err(Error::MissingApiKey);
    }
    let base = Url::parse(&config.base_url)
      .ok()
      .filter(|u| !u.cannot_be_a_base())
      .ok_or_else(|| Error::InvalidBaseUrl(config.base_url.clone()))?;

    let client = Client::builder()
      .connect_timeout(config.connect_timeout())
      .timeout(config.timeout())
      .build()?;
    Ok(Self {
      client,
      base,
      config,
    })
  }

  fn url(&self, segments: &[&str]) -> Url {
    let mut url = self.base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
      path.pop_if_empty().extend(segments);
    }
    url
  }

  fn file_part(image: Bytes) -> Result<multipart::Part, ClientError> {
    let format = ImageFormat::sniff(&image).unwrap_or(ImageFormat::Jpeg);
    multipart::Part::stream(image)
      .file_name(format!("face.{}", format.extension()))
      .mime_str(format.media_type())
      .map_err(|e| ClientError::BadRequest(e.to_string()))
  }

  async fn send(&self, req: RequestBuilder, op: &'static str) -> Result<Response, Failure> {
    let resp = req
      .header(API_KEY_HEADER, &self.config.api_key)
      .send()
      .await
      .map_err(|e| {
        let kind = if e.is_timeout() {
          "timeout"
        } else if e.is_connect() {
          "connect"
        } else {
          "transport"
        };
        error!(endpoint = %self.base, op, kind, error = %e, "recognition request failed");
        Failure::Transport(ClientError::Unreachable(e.to_string()))
      })?;

    let status = resp.status();
    if status.is_success() {
      return Ok(resp);
    }

    let body = resp.bytes().await.unwrap_or_default();
    let body = ErrorBody::parse(&body);
    Err(Failure::Status(status, body))
  }

  async fn body(resp: Response) -> Result<Bytes, ClientError> {
    resp
      .bytes()
      .await
      .map_err(|e| ClientError::Unreachable(format!("reading response body: {e}")))
  }

  fn report(op: &'static str, status: StatusCode, body: &ErrorBody) -> ClientError {
    let e = classify(status, body);
    match &e {
      ClientError::BadRequest(_) => {
        warn!(op, %status, code = ?body.code, message = ?body.message, "recognition service rejected request");
      }
      _ => {
        error!(op, %status, code = ?body.code, message = ?body.message, "recognition service error");
      }
    }
    e
  }
}

impl RecognitionClient for CompreFaceClient {
  async fn detect_or_match(&self, image: Bytes) -> Result<Vec<DetectedFace>, ClientError> {
    debug!(size = image.len(), "recognizing faces");
    let req = self
      .client
      .post(self.url(&["api", "v1", "recognition", "recognize"]))
      .query(&[
        ("det_prob_threshold", self.config.det_prob_threshold.to_string()),
        ("prediction_count", self.config.prediction_count.to_string()),
      ])
      .multipart(multipart::Form::new().part("file", Self::file_part(image)?));

    let resp = match self.send(req, "recognize").await {
      Ok(r) => r,
      Err(Failure::Transport(e)) => return Err(e),
      Err(Failure::Status(StatusCode::BAD_REQUEST, body)) if body.is_no_face() => {
        debug!("recognition service found no face");
        return Ok(Vec::new());
      }
      Err(Failure::Status(status, body)) => {
        return Err(Self::report("recognize", status, &body));
      }
    };

    let bytes = Self::body(resp).await?;
    let parsed: RecognizeResponse = serde_json::from_slice(&bytes)
      .map_err(|e| ClientError::MalformedResponse(e.to_string()))?;
    let faces = parsed.into_faces()?;
    debug!(faces = faces.len(), "recognition completed");
    Ok(faces)
  }

  async fn enroll(&self, image: Bytes, subject_id: &str) -> Result<EnrollmentRecord, ClientError> {
    info!(subject_id, size = image.len(), "enrolling face");
    let req = self
      .client
      .post(self.url(&["api", "v1", "recognition", "faces"]))
      .query(&[
        ("subject", subject_id.to_owned()),
        ("det_prob_threshold", self.config.det_prob_threshold.to_string()),
      ])
      .multipart(multipart::Form::new().part("file", Self::file_part(image)?));

    let resp = match self.send(req, "enroll").await {
      Ok(r) => r,
      Err(Failure::Transport(e)) => return Err(e),
      Err(Failure::Status(status, body)) => {
        return Err(Self::report("enroll", status, &body));
      }
    };

    let bytes = Self::body(resp).await?;
    let raw: serde_json::Value = serde_json::from_slice(&bytes)
      .map_err(|e| ClientError::MalformedResponse(e.to_string()))?;
    enrollment_from(raw, subject_id)
  }

  async fn remove_enrollment(&self, subject_id: &str) -> Result<(), ClientError> {
    let req = self
      .client
      .delete(self.url(&["api", "v1", "recognition", "subjects", subject_id]));

    match self.send(req, "remove").await {
      Ok(_) => {
        info!(subject_id, "removed subject from recognition service");
        Ok(())
      }
      Err(Failure::Status(StatusCode::NOT_FOUND, _)) => {
        debug!(subject_id, "subject already absent from recognition service");
        Ok(())
      }
      Err(Failure::Transport(e)) => Err(e),
      Err(Failure::Status(status, body)) => Err(Self::report("remove", status, &body)),
    }
  }
}
