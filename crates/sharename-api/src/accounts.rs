//! Handlers for registration and the caller's own profile.
//!
//! | Method  | Path        | Notes |
//! |---------|-------------|-------|
//! | `POST`  | `/register` | Body: [`RegisterBody`]; no auth; returns 201 + user |
//! | `GET`   | `/profile`  | The caller's profile |
//! | `PATCH` | `/profile`  | Partial [`ProfileUpdate`]; every field validated |

use axum::extract::State;
use serde::{Deserialize, Serialize};
use sharename_core::{
  store::ShareStore,
  user::{Profile, ProfileUpdate, Role, User},
};

use crate::{
  AppState,
  auth::Authenticated,
  reply::{ApiResult, JsonBody, Reply},
};

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
  pub email:    String,
  pub password: String,
  #[serde(default)]
  pub role:     Role,
}

/// `POST /register`
pub async fn register<S>(
  State(state): State<AppState<S>>,
  JsonBody(body): JsonBody<RegisterBody>,
) -> ApiResult<User>
where
  S: ShareStore + 'static,
{
  let user = state.engine.register(&body.email, &body.password, body.role).await?;
  Ok(Reply::created(user).with_message("User registered successfully"))
}

/// A profile with the identity it belongs to.
#[derive(Debug, Serialize)]
pub struct ProfileView {
  pub email:        String,
  pub role:         Role,
  pub display_name: String,
  #[serde(flatten)]
  pub profile:      Profile,
}

impl ProfileView {
  fn new(user: &User, profile: Profile) -> Self {
    Self {
      email: user.email.clone(),
      role: user.role,
      display_name: profile.display_name(user),
      profile,
    }
  }
}

/// `GET /profile`
pub async fn get_profile<S>(
  State(state): State<AppState<S>>,
  Authenticated(user): Authenticated,
) -> ApiResult<ProfileView>
where
  S: ShareStore + 'static,
{
  let profile = state.engine.profile(&user).await?;
  Ok(Reply::ok(ProfileView::new(&user, profile)))
}

/// `PATCH /profile`
pub async fn update_profile<S>(
  State(state): State<AppState<S>>,
  Authenticated(user): Authenticated,
  JsonBody(update): JsonBody<ProfileUpdate>,
) -> ApiResult<ProfileView>
where
  S: ShareStore + 'static,
{
  let profile = state.engine.update_profile(&user, update).await?;
  Ok(Reply::ok(ProfileView::new(&user, profile)).with_message("Profile updated successfully"))
}
