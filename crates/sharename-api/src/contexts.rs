//! Handlers for `/contexts` endpoints. All are owner-scoped.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/contexts` | Active contexts with their live codes |
//! | `POST`   | `/contexts` | Body: [`NewContextBody`]; returns 201 |
//! | `GET`    | `/contexts/{id}` | |
//! | `PATCH`  | `/contexts/{id}` | Partial [`ContextUpdate`] |
//! | `DELETE` | `/contexts/{id}` | |
//! | `GET`    | `/contexts/archived` | Most recently archived first |
//! | `DELETE` | `/contexts/archived/{id}` | |
//! | `GET`    | `/contexts/expired` | What the next sweep would process |
//! | `POST`   | `/contexts/expired/check` | Starts a sweep; returns 202 |

use axum::{
  extract::{Path, State},
  http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sharename_core::{
  context::{Context, ContextId, ContextSummary, ContextUpdate, ExpiredContext, NewContext, Visibility},
  store::ShareStore,
  user::UserId,
};

use crate::{
  AppState,
  auth::Authenticated,
  reply::{ApiResult, JsonBody, Reply},
};

// ─── Active contexts ─────────────────────────────────────────────────────────

/// `GET /contexts`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Authenticated(owner): Authenticated,
) -> ApiResult<Vec<ContextSummary>>
where
  S: ShareStore + 'static,
{
  Ok(Reply::ok(state.engine.list_contexts(&owner).await?))
}

#[derive(Debug, Deserialize)]
pub struct NewContextBody {
  pub label:                String,
  pub visibility:           Visibility,
  pub given:                String,
  #[serde(default)]
  pub family:               String,
  #[serde(default = "default_true")]
  pub notify_on_redeem:     bool,
  #[serde(default)]
  pub auto_archive_expired: bool,
  /// When set, an initial share code with this expiry is issued.
  pub expires_at:           Option<DateTime<Utc>>,
}

fn default_true() -> bool { true }

/// `POST /contexts`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Authenticated(owner): Authenticated,
  JsonBody(body): JsonBody<NewContextBody>,
) -> ApiResult<ContextSummary>
where
  S: ShareStore + 'static,
{
  let input = NewContext {
    owner_id:             UserId(0),
    label:                body.label,
    visibility:           body.visibility,
    given:                body.given,
    family:               body.family,
    notify_on_redeem:     body.notify_on_redeem,
    auto_archive_expired: body.auto_archive_expired,
  };
  let summary = state.engine.create_context(&owner, input, body.expires_at).await?;
  Ok(Reply::created(summary).with_message("Context created successfully"))
}

/// `GET /contexts/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Authenticated(owner): Authenticated,
  Path(id): Path<ContextId>,
) -> ApiResult<ContextSummary>
where
  S: ShareStore + 'static,
{
  Ok(Reply::ok(state.engine.get_context(&owner, id).await?))
}

/// `PATCH /contexts/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  Authenticated(owner): Authenticated,
  Path(id): Path<ContextId>,
  JsonBody(update): JsonBody<ContextUpdate>,
) -> ApiResult<ContextSummary>
where
  S: ShareStore + 'static,
{
  let summary = state.engine.update_context(&owner, id, update).await?;
  Ok(Reply::ok(summary).with_message("Context updated successfully"))
}

/// `DELETE /contexts/{id}`
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  Authenticated(owner): Authenticated,
  Path(id): Path<ContextId>,
) -> ApiResult<()>
where
  S: ShareStore + 'static,
{
  state.engine.delete_context(&owner, id).await?;
  Ok(Reply::done(StatusCode::OK, "Context deleted successfully"))
}

// ─── Archive ─────────────────────────────────────────────────────────────────

/// `GET /contexts/archived`
pub async fn list_archived<S>(
  State(state): State<AppState<S>>,
  Authenticated(owner): Authenticated,
) -> ApiResult<Vec<Context>>
where
  S: ShareStore + 'static,
{
  Ok(Reply::ok(state.engine.list_archived_contexts(&owner).await?))
}

/// `DELETE /contexts/archived/{id}`
pub async fn delete_archived<S>(
  State(state): State<AppState<S>>,
  Authenticated(owner): Authenticated,
  Path(id): Path<ContextId>,
) -> ApiResult<()>
where
  S: ShareStore + 'static,
{
  state.engine.delete_archived_context(&owner, id).await?;
  Ok(Reply::done(StatusCode::OK, "Archived context deleted successfully"))
}

// ─── Expiry ──────────────────────────────────────────────────────────────────

/// `GET /contexts/expired`
pub async fn list_expired<S>(
  State(state): State<AppState<S>>,
  Authenticated(owner): Authenticated,
) -> ApiResult<Vec<ExpiredContext>>
where
  S: ShareStore + 'static,
{
  Ok(Reply::ok(state.engine.expired_contexts(&owner).await?))
}

/// `POST /contexts/expired/check`
pub async fn check_expired<S>(
  State(state): State<AppState<S>>,
  Authenticated(_): Authenticated,
) -> ApiResult<()>
where
  S: ShareStore + 'static,
{
  state.engine.trigger_sweep();
  Ok(Reply::done(StatusCode::ACCEPTED, "Expiration check started"))
}
