//! Notifications: persisted, user-addressed event records.
//!
//! Persistence is the delivery guarantee; there is no retry and no push.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::{
  context::{Context, ContextId, Visibility},
  user::UserId,
};

row_id!(
  /// Primary key of a [`Notification`].
  NotificationId
);

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationKind {
  Redemption,
  ConsentRequest,
  ConsentApproved,
  ConsentDenied,
  AccessRevoked,
  ContextExpired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
  pub id:         NotificationId,
  pub user_id:    UserId,
  #[serde(rename = "type")]
  pub kind:       NotificationKind,
  pub title:      String,
  pub message:    String,
  pub context_id: Option<ContextId>,
  pub read:       bool,
  pub created_at: DateTime<Utc>,
}

/// Input to [`crate::store::ShareStore::create_notification`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
  pub user_id:    UserId,
  pub kind:       NotificationKind,
  pub title:      String,
  pub message:    String,
  pub context_id: Option<ContextId>,
}

impl NewNotification {
  /// Tell the owner someone redeemed their context.
  pub fn redemption(context: &Context, requester: &str) -> Self {
    let (title, message) = match context.visibility {
      Visibility::Public => (
        format!("Public Context Accessed by {requester}"),
        format!("{requester} accessed your public \"{}\" context.", context.label),
      ),
      Visibility::Code | Visibility::Consent => (
        format!("Code Redeemed by {requester}"),
        format!("{requester} has redeemed your \"{}\" context.", context.label),
      ),
    };
    Self {
      user_id: context.owner_id,
      kind: NotificationKind::Redemption,
      title,
      message,
      context_id: Some(context.id),
    }
  }

  /// Tell the owner someone asked for access.
  pub fn consent_request(context: &Context, requester_email: &str) -> Self {
    Self {
      user_id:    context.owner_id,
      kind:       NotificationKind::ConsentRequest,
      title:      format!("Consent Request from {requester_email}"),
      message:    format!(
        "{requester_email} is requesting access to your \"{}\" context.",
        context.label
      ),
      context_id: Some(context.id),
    }
  }

  pub fn consent_approved(context: &Context, requester: UserId) -> Self {
    Self {
      user_id:    requester,
      kind:       NotificationKind::ConsentApproved,
      title:      format!("Consent Approved for {}", context.label),
      message:    format!(
        "Your request to access \"{}\" has been approved.",
        context.label
      ),
      context_id: Some(context.id),
    }
  }

  pub fn consent_denied(context: &Context, requester: UserId) -> Self {
    Self {
      user_id:    requester,
      kind:       NotificationKind::ConsentDenied,
      title:      format!("Consent Denied for {}", context.label),
      message:    format!(
        "Your request to access \"{}\" has been denied.",
        context.label
      ),
      context_id: Some(context.id),
    }
  }

  pub fn access_revoked(context: &Context, requester: UserId) -> Self {
    Self {
      user_id:    requester,
      kind:       NotificationKind::AccessRevoked,
      title:      "Access Revoked".to_owned(),
      message:    format!(
        "Your access to \"{}\" context has been revoked by the owner.",
        context.label
      ),
      context_id: Some(context.id),
    }
  }

  /// Tell the owner their context expired. The context reference is kept only
  /// when the context survives as an archive; a deleted context would take the
  /// notification with it.
  pub fn context_expired_owner(context: &Context) -> Self {
    let outcome = if context.auto_archive_expired {
      "It has been archived."
    } else {
      "It has been deleted."
    };
    Self {
      user_id:    context.owner_id,
      kind:       NotificationKind::ContextExpired,
      title:      format!("Context '{}' has expired", context.label),
      message:    format!(
        "Your context '{}' has expired and all associated codes are no longer valid. {outcome}",
        context.label
      ),
      context_id: context.auto_archive_expired.then_some(context.id),
    }
  }

  /// Tell a past redeemer their access ended with the context.
  pub fn context_expired_redeemer(context: &Context, redeemer: UserId) -> Self {
    Self {
      user_id:    redeemer,
      kind:       NotificationKind::ContextExpired,
      title:      format!("Access to '{}' has expired", context.label),
      message:    format!(
        "The context '{}' you previously accessed has expired. Your access to this information is no longer valid.",
        context.label
      ),
      context_id: context.auto_archive_expired.then_some(context.id),
    }
  }
}
