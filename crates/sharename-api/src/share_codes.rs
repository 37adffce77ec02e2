//! Handlers for share codes and redemption.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `POST`  | `/sharecodes` | Body: [`NewShareCodeBody`]; owner only; returns 201 |
//! | `PATCH` | `/sharecodes/{id}` | Body: `{"expires_at": ...}`; `null` clears |
//! | `POST`  | `/sharecodes/{id}/revoke` | |
//! | `GET`   | `/codes/{code}` | Redeem; anonymous allowed (`X-Client` names the caller) |
//! | `POST`  | `/redeem-by-id` | Body: `{"context_id": ...}`; authenticated |

use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sharename_core::{
  context::{ContextId, SharedContext},
  share_code::{ShareCode, ShareCodeId},
  store::ShareStore,
};

use crate::{
  AppState,
  auth::{Authenticated, Identity},
  reply::{ApiResult, JsonBody, Reply},
};

// ─── Owner side ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct NewShareCodeBody {
  pub context_id: ContextId,
  pub expires_at: Option<DateTime<Utc>>,
}

/// `POST /sharecodes`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Authenticated(owner): Authenticated,
  JsonBody(body): JsonBody<NewShareCodeBody>,
) -> ApiResult<ShareCode>
where
  S: ShareStore + 'static,
{
  let code = state
    .engine
    .create_share_code(&owner, body.context_id, body.expires_at)
    .await?;
  Ok(Reply::created(code))
}

#[derive(Debug, Deserialize)]
pub struct ExpiryBody {
  pub expires_at: Option<DateTime<Utc>>,
}

/// `PATCH /sharecodes/{id}`
pub async fn set_expiry<S>(
  State(state): State<AppState<S>>,
  Authenticated(owner): Authenticated,
  Path(id): Path<ShareCodeId>,
  JsonBody(body): JsonBody<ExpiryBody>,
) -> ApiResult<ShareCode>
where
  S: ShareStore + 'static,
{
  let code = state.engine.set_share_code_expiry(&owner, id, body.expires_at).await?;
  Ok(Reply::ok(code))
}

/// `POST /sharecodes/{id}/revoke`
pub async fn revoke<S>(
  State(state): State<AppState<S>>,
  Authenticated(owner): Authenticated,
  Path(id): Path<ShareCodeId>,
) -> ApiResult<ShareCode>
where
  S: ShareStore + 'static,
{
  let code = state.engine.revoke_share_code(&owner, id).await?;
  Ok(Reply::ok(code).with_message("Share code revoked"))
}

// ─── Redemption ──────────────────────────────────────────────────────────────

/// `GET /codes/{code}`
pub async fn redeem<S>(
  State(state): State<AppState<S>>,
  Identity(requester): Identity,
  Path(code): Path<String>,
) -> ApiResult<SharedContext>
where
  S: ShareStore + 'static,
{
  let shared = state.engine.redeem_by_code(&code, &requester).await?;
  Ok(Reply::ok(shared).with_message("Share code redeemed successfully"))
}

#[derive(Debug, Deserialize)]
pub struct RedeemByIdBody {
  pub context_id: ContextId,
}

/// `POST /redeem-by-id`
pub async fn redeem_by_id<S>(
  State(state): State<AppState<S>>,
  Authenticated(user): Authenticated,
  JsonBody(body): JsonBody<RedeemByIdBody>,
) -> ApiResult<SharedContext>
where
  S: ShareStore + 'static,
{
  let shared = state.engine.redeem_by_context(body.context_id, &user).await?;
  Ok(Reply::ok(shared).with_message("Context accessed successfully"))
}
