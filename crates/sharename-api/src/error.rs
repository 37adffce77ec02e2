//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  extract::rejection::JsonRejection,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use sharename_core::Error as CoreError;
use thiserror::Error;

use crate::reply::Envelope;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("unauthorized")]
  Unauthorized,

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Core(#[from] CoreError),
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self { Self::BadRequest(rejection.body_text()) }
}

impl ApiError {
  fn parts(self) -> (StatusCode, String, Option<serde_json::Value>) {
    match self {
      Self::Unauthorized => (
        StatusCode::UNAUTHORIZED,
        "Authentication credentials were not provided or are invalid.".to_owned(),
        None,
      ),
      Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message, None),
      Self::Core(CoreError::NotFound(what)) => {
        (StatusCode::NOT_FOUND, format!("{} not found", capitalise(&what)), None)
      }
      Self::Core(CoreError::Forbidden(denial)) => {
        let errors = denial.consent.and_then(|c| serde_json::to_value(c).ok());
        (StatusCode::FORBIDDEN, denial.message, errors)
      }
      Self::Core(CoreError::InvalidState(message)) => (StatusCode::BAD_REQUEST, message, None),
      Self::Core(CoreError::Validation(errors)) => (
        StatusCode::BAD_REQUEST,
        "Validation failed".to_owned(),
        serde_json::to_value(errors).ok(),
      ),
      Self::Core(CoreError::Store(e)) => {
        tracing::error!(error = %e, "store failure");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_owned(), None)
      }
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let unauthorized = matches!(self, Self::Unauthorized);
    let (status, message, errors) = self.parts();
    let mut res = (status, Json(Envelope::failure(message, errors))).into_response();
    if unauthorized {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"sharename\""),
      );
    }
    res
  }
}

fn capitalise(s: &str) -> String {
  let mut chars = s.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().chain(chars).collect(),
    None => String::new(),
  }
}
