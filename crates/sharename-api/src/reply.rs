//! The JSON envelope every endpoint answers with.
//!
//! ```json
//! { "success": true, "message": "...", "data": { ... }, "timestamp": "..." }
//! { "success": false, "message": "...", "errors": { ... }, "timestamp": "..." }
//! ```

use axum::{
  Json,
  extract::FromRequest,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ApiError;

/// Wire shape shared by successes and failures.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
  pub success:   bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub message:   Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub data:      Option<T>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub errors:    Option<serde_json::Value>,
  pub timestamp: DateTime<Utc>,
}

impl Envelope<()> {
  pub fn failure(message: String, errors: Option<serde_json::Value>) -> Self {
    Self { success: false, message: Some(message), data: None, errors, timestamp: Utc::now() }
  }
}

/// A successful response: status plus envelope.
#[derive(Debug)]
pub struct Reply<T> {
  status: StatusCode,
  body:   Envelope<T>,
}

pub type ApiResult<T> = Result<Reply<T>, ApiError>;

impl<T> Reply<T> {
  fn new(status: StatusCode, data: Option<T>) -> Self {
    Self {
      status,
      body: Envelope { success: true, message: None, data, errors: None, timestamp: Utc::now() },
    }
  }

  pub fn ok(data: T) -> Self { Self::new(StatusCode::OK, Some(data)) }

  pub fn created(data: T) -> Self { Self::new(StatusCode::CREATED, Some(data)) }

  pub fn with_message(mut self, message: impl Into<String>) -> Self {
    self.body.message = Some(message.into());
    self
  }
}

impl Reply<()> {
  /// A data-less success carrying only a message.
  pub fn done(status: StatusCode, message: impl Into<String>) -> Self {
    Self::new(status, None).with_message(message)
  }
}

impl<T: Serialize> IntoResponse for Reply<T> {
  fn into_response(self) -> Response { (self.status, Json(self.body)).into_response() }
}

/// `Json<T>` whose rejection is reported in the envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);
