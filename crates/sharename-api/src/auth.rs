//! HTTP Basic-auth extractors.
//!
//! Credentials are checked against the argon2 hashes of registered users.
//! [`Authenticated`] demands them; [`Identity`] accepts their absence and
//! falls back to an anonymous requester named by the `X-Client` header.
//! Credentials that are present but wrong are rejected by both.

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use sharename_core::{
  store::ShareStore,
  user::{Requester, User},
};

use crate::{AppState, error::ApiError};

/// Header an anonymous client may use to name itself in the audit trail.
pub const CLIENT_HEADER: &str = "x-client";

/// The request carried valid credentials for this user.
pub struct Authenticated(pub User);

/// Whoever is asking: a user with valid credentials, or an anonymous client.
pub struct Identity(pub Requester);

/// Parse `Authorization: Basic ...`. `Ok(None)` when the header is absent.
pub fn basic_credentials(headers: &HeaderMap) -> Result<Option<(String, String)>, ApiError> {
  let Some(value) = headers.get(header::AUTHORIZATION) else {
    return Ok(None);
  };

  let encoded = value
    .to_str()
    .ok()
    .and_then(|v| v.strip_prefix("Basic "))
    .ok_or(ApiError::Unauthorized)?;
  let decoded = B64.decode(encoded.trim()).map_err(|_| ApiError::Unauthorized)?;
  let creds = String::from_utf8(decoded).map_err(|_| ApiError::Unauthorized)?;
  let (email, password) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;

  Ok(Some((email.to_owned(), password.to_owned())))
}

async fn resolve<S>(headers: &HeaderMap, state: &AppState<S>) -> Result<Option<User>, ApiError>
where
  S: ShareStore + 'static,
{
  let Some((email, password)) = basic_credentials(headers)? else {
    return Ok(None);
  };
  let user = state.engine.authenticate(&email, &password).await?;
  if user.is_none() {
    tracing::debug!(%email, "rejected credentials");
    return Err(ApiError::Unauthorized);
  }
  Ok(user)
}

impl<S> FromRequestParts<AppState<S>> for Authenticated
where
  S: ShareStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    resolve(&parts.headers, state)
      .await?
      .map(Authenticated)
      .ok_or(ApiError::Unauthorized)
  }
}

impl<S> FromRequestParts<AppState<S>> for Identity
where
  S: ShareStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let requester = match resolve(&parts.headers, state).await? {
      Some(user) => Requester::User(user),
      None => {
        let client = parts.headers.get(CLIENT_HEADER).and_then(|v| v.to_str().ok());
        Requester::anonymous(client)
      }
    };
    Ok(Identity(requester))
  }
}

#[cfg(test)]
mod tests {
  use axum::http::HeaderValue;

  use super::*;

  fn headers(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
    headers
  }

  #[test]
  fn absent_header_is_not_an_error() {
    assert!(basic_credentials(&HeaderMap::new()).unwrap().is_none());
  }

  #[test]
  fn decodes_email_and_password() {
    let value = format!("Basic {}", B64.encode("a@example.com:pa:ss"));
    let (email, password) = basic_credentials(&headers(&value)).unwrap().unwrap();
    assert_eq!(email, "a@example.com");
    assert_eq!(password, "pa:ss");
  }

  #[test]
  fn malformed_headers_are_unauthorized() {
    let no_colon = format!("Basic {}", B64.encode("nocolon"));
    for value in ["Bearer token", "Basic !!!not-base64!!!", no_colon.as_str()] {
      assert!(matches!(basic_credentials(&headers(value)), Err(ApiError::Unauthorized)), "{value}");
    }
  }
}
