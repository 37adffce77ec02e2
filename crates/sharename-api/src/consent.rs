//! Handlers for `/consent-requests` endpoints.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `GET`   | `/consent-requests` | Requests on the caller's contexts |
//! | `POST`  | `/consent-requests` | Body: `{"context_id", "message"}`; returns 201 |
//! | `PATCH` | `/consent-requests/{id}` | Body: `{"status": "approved" \| "denied"}`; owner only |
//! | `POST`  | `/consent-requests/by-code` | Body: `{"code", "message"}`; returns 201 |
//! | `GET`   | `/consent-requests/pending` | The caller's own pending requests |

use axum::extract::{Path, State};
use serde::Deserialize;
use sharename_core::{
  consent::{ConsentRequest, ConsentRequestId, ConsentRequestView},
  context::ContextId,
  store::ShareStore,
};

use crate::{
  AppState,
  auth::Authenticated,
  reply::{ApiResult, JsonBody, Reply},
};

/// `GET /consent-requests`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Authenticated(owner): Authenticated,
) -> ApiResult<Vec<ConsentRequestView>>
where
  S: ShareStore + 'static,
{
  Ok(Reply::ok(state.engine.list_consent_requests(&owner).await?))
}

/// `GET /consent-requests/pending`
pub async fn pending<S>(
  State(state): State<AppState<S>>,
  Authenticated(requester): Authenticated,
) -> ApiResult<Vec<ConsentRequestView>>
where
  S: ShareStore + 'static,
{
  Ok(Reply::ok(state.engine.list_pending_requests(&requester).await?))
}

#[derive(Debug, Deserialize)]
pub struct NewRequestBody {
  pub context_id: ContextId,
  #[serde(default)]
  pub message:    String,
}

/// `POST /consent-requests`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Authenticated(requester): Authenticated,
  JsonBody(body): JsonBody<NewRequestBody>,
) -> ApiResult<ConsentRequest>
where
  S: ShareStore + 'static,
{
  let request = state
    .engine
    .create_consent_request(&requester, body.context_id, &body.message)
    .await?;
  Ok(Reply::created(request).with_message("Consent request sent successfully"))
}

#[derive(Debug, Deserialize)]
pub struct ByCodeBody {
  pub code:    String,
  #[serde(default)]
  pub message: String,
}

/// `POST /consent-requests/by-code`
pub async fn create_by_code<S>(
  State(state): State<AppState<S>>,
  Authenticated(requester): Authenticated,
  JsonBody(body): JsonBody<ByCodeBody>,
) -> ApiResult<ConsentRequest>
where
  S: ShareStore + 'static,
{
  let request = state
    .engine
    .create_consent_request_by_code(&requester, &body.code, &body.message)
    .await?;
  Ok(Reply::created(request).with_message("Consent request sent successfully"))
}

#[derive(Debug, Deserialize)]
pub struct ResolveBody {
  pub status: String,
}

/// `PATCH /consent-requests/{id}`
pub async fn resolve<S>(
  State(state): State<AppState<S>>,
  Authenticated(owner): Authenticated,
  Path(id): Path<ConsentRequestId>,
  JsonBody(body): JsonBody<ResolveBody>,
) -> ApiResult<ConsentRequest>
where
  S: ShareStore + 'static,
{
  let request = state.engine.resolve_consent_request(&owner, id, &body.status).await?;
  let message = format!("Consent request {}", request.status.as_ref());
  Ok(Reply::ok(request).with_message(message))
}
