//! Audit records: the append-only ground truth of who read which context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{context::ContextId, share_code::ShareCodeId};

row_id!(
  /// Primary key of an [`Audit`].
  AuditId
);

/// Requester recorded for unauthenticated redemptions with no client marker.
/// Named anonymous requesters are recorded as `anon:<client>`.
pub const ANONYMOUS_REQUESTER: &str = "anon";

/// Longest requester string an audit row holds.
pub const REQUESTER_MAX_LEN: usize = 120;

/// One granted redemption. Never updated except to flip `revoked`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audit {
  pub id:            AuditId,
  pub share_code_id: ShareCodeId,
  /// Authenticated email, or an anonymous marker.
  pub requester:     String,
  pub ts:            DateTime<Utc>,
  /// Per-redemption revocation; independent of the code's own `revoked`.
  pub revoked:       bool,
}

/// An audit joined with the code and context it refers to, for listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Redemption {
  pub audit_id:      AuditId,
  pub requester:     String,
  pub ts:            DateTime<Utc>,
  pub revoked:       bool,
  pub code:          String,
  pub context_id:    ContextId,
  pub context_label: String,
}
