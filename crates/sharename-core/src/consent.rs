//! Consent requests and their state machine.
//!
//! ```text
//!   (none) ──request──▶ pending ──approve──▶ approved
//!                          │                    │
//!                          └──deny──▶ denied ◀──┘ revoke (owner)
//!                                       │
//!                         pending ◀─────┘ request again
//! ```
//!
//! At most one request exists per (context, requester); asking again after a
//! denial rewrites that row rather than adding another.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::{ValidationErrors, context::ContextId, user::UserId};

row_id!(
  /// Primary key of a [`ConsentRequest`].
  ConsentRequestId
);

pub const MESSAGE_MAX_LEN: usize = 500;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConsentStatus {
  Pending,
  Approved,
  Denied,
}

impl ConsentStatus {
  /// Status after the requester asks again, or `None` if a request is already
  /// open or granted.
  pub fn renew(self) -> Option<Self> {
    match self {
      Self::Denied => Some(Self::Pending),
      Self::Pending | Self::Approved => None,
    }
  }

  /// Status after the owner decides, or `None` if the request is not awaiting
  /// a decision.
  pub fn resolve(self, resolution: Resolution) -> Option<Self> {
    match self {
      Self::Pending => Some(resolution.into()),
      Self::Approved | Self::Denied => None,
    }
  }

  /// Whether an owner's access revocation forces this request to `denied`.
  pub fn is_revocable(self) -> bool { matches!(self, Self::Pending | Self::Approved) }

  pub fn grants_access(self) -> bool { self == Self::Approved }
}

/// The two decisions an owner can make.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
  Approved,
  Denied,
}

impl From<Resolution> for ConsentStatus {
  fn from(r: Resolution) -> Self {
    match r {
      Resolution::Approved => Self::Approved,
      Resolution::Denied => Self::Denied,
    }
  }
}

impl FromStr for Resolution {
  type Err = ValidationErrors;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match ConsentStatus::from_str(s) {
      Ok(ConsentStatus::Approved) => Ok(Self::Approved),
      Ok(ConsentStatus::Denied) => Ok(Self::Denied),
      _ => Err(ValidationErrors::single(
        "status",
        format!("\"{s}\" is not a valid decision; expected approved or denied."),
      )),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRequest {
  pub id:           ConsentRequestId,
  pub context_id:   ContextId,
  pub requester_id: UserId,
  pub status:       ConsentStatus,
  pub message:      String,
  pub created_at:   DateTime<Utc>,
  pub updated_at:   DateTime<Utc>,
}

/// A consent request with the labels listings display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentRequestView {
  #[serde(flatten)]
  pub request:         ConsentRequest,
  pub context_label:   String,
  /// Email of the context owner.
  pub context_owner:   String,
  pub requester_email: String,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn renew_only_after_denial() {
    assert_eq!(ConsentStatus::Denied.renew(), Some(ConsentStatus::Pending));
    assert_eq!(ConsentStatus::Pending.renew(), None);
    assert_eq!(ConsentStatus::Approved.renew(), None);
  }

  #[test]
  fn resolve_only_from_pending() {
    use Resolution::*;
    assert_eq!(ConsentStatus::Pending.resolve(Approved), Some(ConsentStatus::Approved));
    assert_eq!(ConsentStatus::Pending.resolve(Denied), Some(ConsentStatus::Denied));
    assert_eq!(ConsentStatus::Approved.resolve(Denied), None);
    assert_eq!(ConsentStatus::Denied.resolve(Approved), None);
  }

  #[test]
  fn revocation_targets_open_and_granted_requests() {
    assert!(ConsentStatus::Pending.is_revocable());
    assert!(ConsentStatus::Approved.is_revocable());
    assert!(!ConsentStatus::Denied.is_revocable());
  }

  #[test]
  fn resolution_parsing() {
    assert_eq!("approved".parse::<Resolution>().unwrap(), Resolution::Approved);
    assert_eq!("denied".parse::<Resolution>().unwrap(), Resolution::Denied);
    let err = "pending".parse::<Resolution>().unwrap_err();
    assert!(err.get("status").is_some());
    assert!("maybe".parse::<Resolution>().is_err());
  }
}
