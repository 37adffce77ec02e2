//! Redemption listings and per-redemption revocation.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/redemptions` | Redemptions of the caller's contexts |
//! | `GET`  | `/company-redemptions` | Redemptions the caller made |
//! | `POST` | `/revoke-access` | Body: `{"audit_id": ...}`; owner only |

use axum::extract::State;
use serde::{Deserialize, Serialize};
use sharename_core::{
  audit::{Audit, AuditId, Redemption},
  context::ContextId,
  store::ShareStore,
};

use crate::{
  AppState,
  auth::Authenticated,
  reply::{ApiResult, JsonBody, Reply},
};

/// `GET /company-redemptions`
pub async fn mine<S>(
  State(state): State<AppState<S>>,
  Authenticated(requester): Authenticated,
) -> ApiResult<Vec<Redemption>>
where
  S: ShareStore + 'static,
{
  Ok(Reply::ok(state.engine.requester_redemptions(&requester).await?))
}

/// `GET /redemptions`
pub async fn of_my_contexts<S>(
  State(state): State<AppState<S>>,
  Authenticated(owner): Authenticated,
) -> ApiResult<Vec<Redemption>>
where
  S: ShareStore + 'static,
{
  Ok(Reply::ok(state.engine.owner_redemptions(&owner).await?))
}

#[derive(Debug, Deserialize)]
pub struct RevokeBody {
  pub audit_id: AuditId,
}

#[derive(Debug, Serialize)]
pub struct RevokedView {
  pub audit:            Audit,
  pub context_id:       ContextId,
  pub consents_revoked: usize,
}

/// `POST /revoke-access`
pub async fn revoke<S>(
  State(state): State<AppState<S>>,
  Authenticated(owner): Authenticated,
  JsonBody(body): JsonBody<RevokeBody>,
) -> ApiResult<RevokedView>
where
  S: ShareStore + 'static,
{
  let revoked = state.engine.revoke(&owner, body.audit_id).await?;
  let view = RevokedView {
    audit:            revoked.audit,
    context_id:       revoked.context.id,
    consents_revoked: revoked.consents_revoked,
  };
  Ok(Reply::ok(view).with_message("Access revoked successfully"))
}
