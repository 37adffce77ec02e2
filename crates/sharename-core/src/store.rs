//! The `ShareStore` trait and the outcome types of its atomic operations.
//!
//! The trait is implemented by storage backends (e.g.
//! `sharename-store-sqlite`). The engine depends on this abstraction, not on
//! any concrete backend.
//!
//! Operations that must not race (filing a consent request, get-or-create of a
//! share code, approving a request, revoking access, recording a redemption)
//! are single trait methods so a backend can run each one atomically.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  audit::{Audit, AuditId, Redemption},
  consent::{ConsentRequest, ConsentRequestId, ConsentRequestView, ConsentStatus},
  context::{Context, ContextId, NewContext},
  notification::{NewNotification, Notification, NotificationId},
  share_code::{ShareCode, ShareCodeId},
  user::{NewUser, Profile, User, UserId},
};

// ─── Outcome types ───────────────────────────────────────────────────────────

/// Result of [`ShareStore::file_consent_request`].
#[derive(Debug, Clone)]
pub enum ConsentFiling {
  /// No row existed; a pending one was inserted.
  Created(ConsentRequest),
  /// A denied row was reset to pending with the new message.
  Renewed(ConsentRequest),
  /// A pending or approved row already exists; nothing changed.
  AlreadyRequested(ConsentRequest),
}

/// Result of [`ShareStore::approve_consent_request`].
#[derive(Debug, Clone)]
pub struct ConsentApproval {
  pub request:         ConsentRequest,
  pub requester_email: String,
  /// The context's current valid code, created if needed.
  pub share_code:      ShareCode,
  /// Audit row pre-authorising the requester.
  pub audit:           Audit,
}

/// Result of [`ShareStore::revoke_access`].
#[derive(Debug, Clone)]
pub struct RevokedAccess {
  pub audit:            Audit,
  pub context:          Context,
  /// Consent requests forced from pending/approved to denied.
  pub consents_revoked: usize,
}

/// Result of [`ShareStore::record_redemption`].
#[derive(Debug, Clone)]
pub struct RecordedRedemption {
  pub audit:        Audit,
  /// `None` when no notification was asked for or inserting it failed.
  pub notification: Option<Notification>,
}

/// Filters for redemption listings.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedemptionFilter {
  pub include_revoked:  bool,
  pub include_archived: bool,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Sharename persistence backend.
///
/// Backends must enforce: unique `users.email`; unique share `code`; one
/// consent request per (context, requester); cascade deletes from context to
/// its codes, consent requests and notifications, and from code to audits.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait ShareStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Users ─────────────────────────────────────────────────────────────

  /// Create a user and an empty profile. Returns `None` if the email is taken.
  fn create_user(
    &self,
    user: NewUser,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    id: UserId,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Look a user up by (lower-cased) email.
  fn find_user_by_email(
    &self,
    email: String,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  fn get_profile(
    &self,
    user: UserId,
  ) -> impl Future<Output = Result<Option<Profile>, Self::Error>> + Send + '_;

  fn save_profile(
    &self,
    user: UserId,
    profile: Profile,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Users with a public profile whose first, last or company name contains
  /// `query`, or whose email starts with it. Matching ignores ASCII case and
  /// treats `query` literally. Ordered by user id.
  fn search_public_profiles(
    &self,
    query: String,
  ) -> impl Future<Output = Result<Vec<(User, Profile)>, Self::Error>> + Send + '_;

  // ── Contexts ──────────────────────────────────────────────────────────

  fn create_context(
    &self,
    input: NewContext,
  ) -> impl Future<Output = Result<Context, Self::Error>> + Send + '_;

  fn get_context(
    &self,
    id: ContextId,
  ) -> impl Future<Output = Result<Option<Context>, Self::Error>> + Send + '_;

  /// The owner's contexts: active ones newest first, or archived ones most
  /// recently archived first.
  fn list_contexts(
    &self,
    owner: UserId,
    archived: bool,
  ) -> impl Future<Output = Result<Vec<Context>, Self::Error>> + Send + '_;

  /// Persist the owner-editable fields of `context`. Returns `false` if the
  /// row no longer exists.
  fn update_context(
    &self,
    context: Context,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Delete a context and, by cascade, everything hanging off it.
  fn delete_context(
    &self,
    id: ContextId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Archive a context and mark its expiration processed, unless it already
  /// is. Returns `false` when nothing changed.
  fn archive_expired_context(
    &self,
    id: ContextId,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Non-archived, unprocessed contexts with at least one code that expired
  /// before `now`. Revoked codes count. Restricted to `owner` when given.
  fn list_expired_contexts(
    &self,
    owner: Option<UserId>,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<Context>, Self::Error>> + Send + '_;

  // ── Share codes ───────────────────────────────────────────────────────

  /// Issue a fresh code. Collisions with existing codes are retried.
  fn create_share_code(
    &self,
    context: ContextId,
    expires_at: Option<DateTime<Utc>>,
  ) -> impl Future<Output = Result<ShareCode, Self::Error>> + Send + '_;

  /// Return the context's most recently created valid code, creating one with
  /// `expires_at` if none exists. Atomic with respect to concurrent callers.
  fn get_or_create_share_code(
    &self,
    context: ContextId,
    expires_at: Option<DateTime<Utc>>,
  ) -> impl Future<Output = Result<ShareCode, Self::Error>> + Send + '_;

  /// Exact, case-sensitive lookup.
  fn find_share_code(
    &self,
    code: String,
  ) -> impl Future<Output = Result<Option<ShareCode>, Self::Error>> + Send + '_;

  fn get_share_code(
    &self,
    id: ShareCodeId,
  ) -> impl Future<Output = Result<Option<ShareCode>, Self::Error>> + Send + '_;

  /// Codes of a context, newest first.
  fn list_share_codes(
    &self,
    context: ContextId,
    include_revoked: bool,
  ) -> impl Future<Output = Result<Vec<ShareCode>, Self::Error>> + Send + '_;

  fn set_share_code_expiry(
    &self,
    id: ShareCodeId,
    expires_at: Option<DateTime<Utc>>,
  ) -> impl Future<Output = Result<Option<ShareCode>, Self::Error>> + Send + '_;

  fn revoke_share_code(
    &self,
    id: ShareCodeId,
  ) -> impl Future<Output = Result<Option<ShareCode>, Self::Error>> + Send + '_;

  // ── Audits ────────────────────────────────────────────────────────────

  /// Insert an audit row and then, if given, the owner notification. A failed
  /// notification insert is logged and dropped; it never undoes the audit.
  fn record_redemption(
    &self,
    share_code: ShareCodeId,
    requester: String,
    notification: Option<NewNotification>,
  ) -> impl Future<Output = Result<RecordedRedemption, Self::Error>> + Send + '_;

  /// Flag an audit as revoked and deny the requester's open or granted
  /// consent requests on the same context, atomically. Returns `None` unless
  /// the audit exists and its context belongs to `owner`.
  fn revoke_access(
    &self,
    audit: AuditId,
    owner: UserId,
  ) -> impl Future<Output = Result<Option<RevokedAccess>, Self::Error>> + Send + '_;

  /// Every audit of every code of `context`, oldest first.
  fn list_audits(
    &self,
    context: ContextId,
  ) -> impl Future<Output = Result<Vec<Audit>, Self::Error>> + Send + '_;

  /// Redemptions of contexts owned by `owner`, newest first. Audits of revoked
  /// codes are never included.
  fn list_owner_redemptions(
    &self,
    owner: UserId,
    filter: RedemptionFilter,
  ) -> impl Future<Output = Result<Vec<Redemption>, Self::Error>> + Send + '_;

  /// Redemptions made by `requester`, newest first. Audits of revoked codes
  /// are never included.
  fn list_requester_redemptions(
    &self,
    requester: String,
    filter: RedemptionFilter,
  ) -> impl Future<Output = Result<Vec<Redemption>, Self::Error>> + Send + '_;

  /// Distinct users whose email appears as a requester on any audit of the
  /// context. Requesters that match no user are skipped.
  fn list_redeemers(
    &self,
    context: ContextId,
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + '_;

  // ── Consent ───────────────────────────────────────────────────────────

  /// Insert a pending request, or reset a denied one to pending, atomically.
  fn file_consent_request(
    &self,
    context: ContextId,
    requester: UserId,
    message: String,
  ) -> impl Future<Output = Result<ConsentFiling, Self::Error>> + Send + '_;

  fn get_consent_request(
    &self,
    id: ConsentRequestId,
  ) -> impl Future<Output = Result<Option<ConsentRequest>, Self::Error>> + Send + '_;

  fn find_consent_request(
    &self,
    context: ContextId,
    requester: UserId,
  ) -> impl Future<Output = Result<Option<ConsentRequest>, Self::Error>> + Send + '_;

  /// Move a pending request to approved, get-or-create a code (a new one never
  /// expires) and record an audit for the requester, in one transaction. Returns `None` if
  /// the request is missing or no longer pending.
  fn approve_consent_request(
    &self,
    id: ConsentRequestId,
  ) -> impl Future<Output = Result<Option<ConsentApproval>, Self::Error>> + Send + '_;

  /// Move a pending request to denied. Returns `None` if the request is
  /// missing or no longer pending.
  fn deny_consent_request(
    &self,
    id: ConsentRequestId,
  ) -> impl Future<Output = Result<Option<ConsentRequest>, Self::Error>> + Send + '_;

  /// Requests on contexts owned by `owner`, newest first.
  fn list_owner_consent_requests(
    &self,
    owner: UserId,
  ) -> impl Future<Output = Result<Vec<ConsentRequestView>, Self::Error>> + Send + '_;

  /// Requests filed by `requester`, newest first, optionally by status.
  fn list_requester_consent_requests(
    &self,
    requester: UserId,
    status: Option<ConsentStatus>,
  ) -> impl Future<Output = Result<Vec<ConsentRequestView>, Self::Error>> + Send + '_;

  // ── Notifications ─────────────────────────────────────────────────────

  fn create_notification(
    &self,
    input: NewNotification,
  ) -> impl Future<Output = Result<Notification, Self::Error>> + Send + '_;

  /// The user's notifications, newest first.
  fn list_notifications(
    &self,
    user: UserId,
  ) -> impl Future<Output = Result<Vec<Notification>, Self::Error>> + Send + '_;

  /// Returns `None` unless the notification exists and belongs to `user`.
  fn set_notification_read(
    &self,
    id: NotificationId,
    user: UserId,
    read: bool,
  ) -> impl Future<Output = Result<Option<Notification>, Self::Error>> + Send + '_;
}
