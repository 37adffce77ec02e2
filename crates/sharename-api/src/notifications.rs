//! Handlers for `/notifications` endpoints.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `GET`   | `/notifications` | Newest first |
//! | `PATCH` | `/notifications/{id}` | Body: `{"read": bool}` |
//! | `GET`   | `/notifications/poll` | Takes the pending mailbox flag, if any, and the previous poll time |

use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sharename_core::{
  notification::{Notification, NotificationId},
  store::ShareStore,
};
use sharename_engine::{MailboxFlag, Poll};

use crate::{
  AppState,
  auth::Authenticated,
  reply::{ApiResult, JsonBody, Reply},
};

/// `GET /notifications`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Authenticated(user): Authenticated,
) -> ApiResult<Vec<Notification>>
where
  S: ShareStore + 'static,
{
  Ok(Reply::ok(state.engine.list_notifications(&user).await?))
}

#[derive(Debug, Deserialize)]
pub struct MarkBody {
  #[serde(default = "default_read")]
  pub read: bool,
}

fn default_read() -> bool { true }

/// `PATCH /notifications/{id}`
pub async fn mark<S>(
  State(state): State<AppState<S>>,
  Authenticated(user): Authenticated,
  Path(id): Path<NotificationId>,
  JsonBody(body): JsonBody<MarkBody>,
) -> ApiResult<Notification>
where
  S: ShareStore + 'static,
{
  Ok(Reply::ok(state.engine.mark_notification(&user, id, body.read).await?))
}

#[derive(Debug, Serialize)]
pub struct PollView {
  pub has_updates: bool,
  pub flag:        Option<MailboxFlag>,
  pub last_check:  Option<DateTime<Utc>>,
}

/// `GET /notifications/poll`
pub async fn poll<S>(
  State(state): State<AppState<S>>,
  Authenticated(user): Authenticated,
) -> ApiResult<PollView>
where
  S: ShareStore + 'static,
{
  let Poll { flag, last_check } = state.engine.poll(&user);
  Ok(Reply::ok(PollView { has_updates: flag.is_some(), flag, last_check }))
}
