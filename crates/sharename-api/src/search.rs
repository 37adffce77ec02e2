//! Handlers for finding other users through their public profiles.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/search/users` | `?q=` over names, company name and email prefix; public profiles only |
//! | `GET`  | `/profile/public/{user_id}` | Public profile with its public contexts |

use axum::extract::{Path, Query, State};
use serde::Deserialize;
use sharename_core::{
  store::ShareStore,
  user::{ProfileCard, PublicProfile, UserId},
};

use crate::{
  AppState,
  auth::Authenticated,
  reply::{ApiResult, Reply},
};

#[derive(Debug, Deserialize, Default)]
pub struct SearchParams {
  /// Free-text query; blank returns nothing.
  #[serde(default)]
  pub q: String,
}

/// `GET /search/users?q=...`
pub async fn users<S>(
  State(state): State<AppState<S>>,
  Authenticated(_): Authenticated,
  Query(params): Query<SearchParams>,
) -> ApiResult<Vec<ProfileCard>>
where
  S: ShareStore + 'static,
{
  Ok(Reply::ok(state.engine.search_profiles(&params.q).await?))
}

/// `GET /profile/public/{user_id}`
pub async fn public_profile<S>(
  State(state): State<AppState<S>>,
  Authenticated(_): Authenticated,
  Path(user_id): Path<UserId>,
) -> ApiResult<PublicProfile>
where
  S: ShareStore + 'static,
{
  Ok(Reply::ok(state.engine.public_profile(user_id).await?))
}
