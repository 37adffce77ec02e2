//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{Duration, Utc};
use sharename_core::{
  consent::ConsentStatus,
  context::{Context, NewContext, Visibility},
  notification::{NewNotification, NotificationKind},
  share_code::is_well_formed,
  store::{ConsentFiling, RedemptionFilter, ShareStore},
  user::{NewUser, Profile, Role, User, UserId},
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn user(s: &SqliteStore, email: &str) -> User {
  s.create_user(NewUser {
    email:         email.into(),
    password_hash: "$argon2id$stub".into(),
    role:          Role::Individual,
  })
  .await
  .unwrap()
  .expect("fresh email")
}

async fn context(s: &SqliteStore, owner: UserId, label: &str, visibility: Visibility) -> Context {
  s.create_context(NewContext {
    owner_id: owner,
    label: label.into(),
    visibility,
    given: "Alice".into(),
    family: "Liddell".into(),
    notify_on_redeem: true,
    auto_archive_expired: false,
  })
  .await
  .unwrap()
}

// ─── Users and profiles ──────────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_email_is_rejected_case_insensitively() {
  let s = store().await;
  let alice = user(&s, "alice@example.com").await;

  let again = s
    .create_user(NewUser {
      email:         "Alice@Example.com".into(),
      password_hash: "x".into(),
      role:          Role::Company,
    })
    .await
    .unwrap();
  assert!(again.is_none());

  let found = s.find_user_by_email("ALICE@example.com".into()).await.unwrap().unwrap();
  assert_eq!(found.id, alice.id);
}

#[tokio::test]
async fn new_users_get_an_empty_profile() {
  let s = store().await;
  let alice = user(&s, "alice@example.com").await;

  let profile = s.get_profile(alice.id).await.unwrap().unwrap();
  assert_eq!(profile, Profile::empty(alice.id));

  let mut edited = profile.clone();
  edited.first_name = "Alice".into();
  edited.company_founded = Some(1999);
  s.save_profile(alice.id, edited.clone()).await.unwrap();
  assert_eq!(s.get_profile(alice.id).await.unwrap().unwrap(), edited);
}

#[tokio::test]
async fn search_matches_public_profiles_only() {
  let s = store().await;
  let alice = user(&s, "alice@example.com").await;
  let alina = user(&s, "alina@example.com").await;
  let hidden = user(&s, "alistair@example.com").await;

  let publish = |id: UserId, first: &str, company: &str| Profile {
    first_name: first.into(),
    company_name: company.into(),
    is_public_profile: true,
    ..Profile::empty(id)
  };
  s.save_profile(alice.id, publish(alice.id, "Alice", "")).await.unwrap();
  s.save_profile(alina.id, publish(alina.id, "", "Acme 100% Ltd")).await.unwrap();
  let mut private = publish(hidden.id, "Alistair", "");
  private.is_public_profile = false;
  s.save_profile(hidden.id, private).await.unwrap();

  let ids = |found: Vec<(User, Profile)>| found.into_iter().map(|(u, _)| u.id).collect::<Vec<_>>();

  assert_eq!(ids(s.search_public_profiles("ali".into()).await.unwrap()), vec![alice.id, alina.id]);
  assert_eq!(ids(s.search_public_profiles("ACME".into()).await.unwrap()), vec![alina.id]);
  assert_eq!(ids(s.search_public_profiles("100%".into()).await.unwrap()), vec![alina.id]);
  // Emails match by prefix only.
  assert!(s.search_public_profiles("example".into()).await.unwrap().is_empty());
  // Wildcards are literal.
  assert!(s.search_public_profiles("_".into()).await.unwrap().is_empty());
}

// ─── Contexts ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn contexts_round_trip_and_list_newest_first() {
  let s = store().await;
  let alice = user(&s, "alice@example.com").await;
  let first = context(&s, alice.id, "Work", Visibility::Code).await;
  let second = context(&s, alice.id, "Home", Visibility::Consent).await;

  let fetched = s.get_context(first.id).await.unwrap().unwrap();
  assert_eq!(fetched.label, "Work");
  assert_eq!(fetched.visibility, Visibility::Code);
  assert!(fetched.notify_on_redeem);

  let listed = s.list_contexts(alice.id, false).await.unwrap();
  let ids: Vec<_> = listed.iter().map(|c| c.id).collect();
  assert_eq!(ids, vec![second.id, first.id]);
  assert!(s.list_contexts(alice.id, true).await.unwrap().is_empty());
}

#[tokio::test]
async fn deleting_a_context_cascades() {
  let s = store().await;
  let alice = user(&s, "alice@example.com").await;
  let bob = user(&s, "bob@example.com").await;
  let ctx = context(&s, alice.id, "Work", Visibility::Consent).await;
  let code = s.create_share_code(ctx.id, None).await.unwrap();
  s.record_redemption(code.id, bob.email.clone(), None).await.unwrap();
  s.file_consent_request(ctx.id, bob.id, String::new()).await.unwrap();
  s.create_notification(NewNotification::consent_request(&ctx, &bob.email)).await.unwrap();

  assert!(s.delete_context(ctx.id).await.unwrap());
  assert!(s.get_share_code(code.id).await.unwrap().is_none());
  assert!(s.find_consent_request(ctx.id, bob.id).await.unwrap().is_none());
  assert!(s.list_notifications(alice.id).await.unwrap().is_empty());
  assert!(!s.delete_context(ctx.id).await.unwrap());
}

#[tokio::test]
async fn expired_listing_counts_revoked_codes_and_skips_processed() {
  let s = store().await;
  let alice = user(&s, "alice@example.com").await;
  let now = Utc::now();

  let fresh = context(&s, alice.id, "Fresh", Visibility::Code).await;
  s.create_share_code(fresh.id, Some(now + Duration::hours(1))).await.unwrap();

  let lapsed = context(&s, alice.id, "Lapsed", Visibility::Code).await;
  let code = s.create_share_code(lapsed.id, Some(now - Duration::hours(1))).await.unwrap();
  s.revoke_share_code(code.id).await.unwrap();

  let expired = s.list_expired_contexts(None, now).await.unwrap();
  assert_eq!(expired.iter().map(|c| c.id).collect::<Vec<_>>(), vec![lapsed.id]);
  assert!(s.list_expired_contexts(Some(UserId(999)), now).await.unwrap().is_empty());

  assert!(s.archive_expired_context(lapsed.id, now).await.unwrap());
  assert!(!s.archive_expired_context(lapsed.id, now).await.unwrap());
  assert!(s.list_expired_contexts(None, now).await.unwrap().is_empty());

  let archived = s.list_contexts(alice.id, true).await.unwrap();
  assert_eq!(archived.len(), 1);
  assert!(archived[0].archived && archived[0].expiration_processed);
  assert!(archived[0].archived_at.is_some());
}

// ─── Share codes ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn get_or_create_reuses_the_newest_valid_code() {
  let s = store().await;
  let alice = user(&s, "alice@example.com").await;
  let ctx = context(&s, alice.id, "Work", Visibility::Code).await;

  let created = s.get_or_create_share_code(ctx.id, None).await.unwrap();
  assert!(is_well_formed(&created.code));
  assert_eq!(s.get_or_create_share_code(ctx.id, None).await.unwrap().id, created.id);

  let newer = s.create_share_code(ctx.id, Some(Utc::now() + Duration::days(1))).await.unwrap();
  assert_eq!(s.get_or_create_share_code(ctx.id, None).await.unwrap().id, newer.id);

  s.revoke_share_code(newer.id).await.unwrap();
  assert_eq!(s.get_or_create_share_code(ctx.id, None).await.unwrap().id, created.id);
}

#[tokio::test]
async fn get_or_create_skips_expired_codes() {
  let s = store().await;
  let alice = user(&s, "alice@example.com").await;
  let ctx = context(&s, alice.id, "Work", Visibility::Code).await;
  let stale = s.create_share_code(ctx.id, Some(Utc::now() - Duration::minutes(1))).await.unwrap();

  let current = s.get_or_create_share_code(ctx.id, None).await.unwrap();
  assert_ne!(current.id, stale.id);
  assert!(current.expires_at.is_none());
}

#[tokio::test]
async fn code_lookup_is_exact() {
  let s = store().await;
  let alice = user(&s, "alice@example.com").await;
  let ctx = context(&s, alice.id, "Work", Visibility::Code).await;
  let code = s.create_share_code(ctx.id, None).await.unwrap();

  assert_eq!(s.find_share_code(code.code.clone()).await.unwrap().unwrap().id, code.id);
  assert!(s.find_share_code(code.code.to_lowercase()).await.unwrap().is_none());
  assert!(s.find_share_code(format!(" {}", code.code)).await.unwrap().is_none());
}

#[tokio::test]
async fn codes_list_newest_first_and_hide_revoked() {
  let s = store().await;
  let alice = user(&s, "alice@example.com").await;
  let ctx = context(&s, alice.id, "Work", Visibility::Code).await;
  let a = s.create_share_code(ctx.id, None).await.unwrap();
  let b = s.create_share_code(ctx.id, None).await.unwrap();
  s.revoke_share_code(a.id).await.unwrap();

  let visible = s.list_share_codes(ctx.id, false).await.unwrap();
  assert_eq!(visible.iter().map(|c| c.id).collect::<Vec<_>>(), vec![b.id]);
  let all = s.list_share_codes(ctx.id, true).await.unwrap();
  assert_eq!(all.iter().map(|c| c.id).collect::<Vec<_>>(), vec![b.id, a.id]);

  let later = Utc::now() + Duration::days(3);
  let redated = s.set_share_code_expiry(b.id, Some(later)).await.unwrap().unwrap();
  assert!(redated.expires_at.is_some());
}

// ─── Audits ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn redemption_stores_audit_and_notification() {
  let s = store().await;
  let alice = user(&s, "alice@example.com").await;
  let ctx = context(&s, alice.id, "Work", Visibility::Code).await;
  let code = s.create_share_code(ctx.id, None).await.unwrap();

  let recorded = s
    .record_redemption(code.id, "anon".into(), Some(NewNotification::redemption(&ctx, "anon")))
    .await
    .unwrap();
  assert_eq!(recorded.audit.requester, "anon");
  assert_eq!(recorded.notification.unwrap().kind, NotificationKind::Redemption);
  assert_eq!(s.list_audits(ctx.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn failed_notification_keeps_the_audit() {
  let s = store().await;
  let alice = user(&s, "alice@example.com").await;
  let ctx = context(&s, alice.id, "Work", Visibility::Code).await;
  let code = s.create_share_code(ctx.id, None).await.unwrap();

  let mut orphan = NewNotification::redemption(&ctx, "anon");
  orphan.user_id = UserId(4242);

  let recorded = s.record_redemption(code.id, "anon".into(), Some(orphan)).await.unwrap();
  assert!(recorded.notification.is_none());
  assert_eq!(s.list_audits(ctx.id).await.unwrap(), vec![recorded.audit]);
}

#[tokio::test]
async fn revoke_access_denies_open_consent_for_owner_only() {
  let s = store().await;
  let alice = user(&s, "alice@example.com").await;
  let bob = user(&s, "bob@example.com").await;
  let ctx = context(&s, alice.id, "Private", Visibility::Consent).await;
  let code = s.create_share_code(ctx.id, None).await.unwrap();
  let audit = s.record_redemption(code.id, bob.email.clone(), None).await.unwrap().audit;
  s.file_consent_request(ctx.id, bob.id, String::new()).await.unwrap();

  assert!(s.revoke_access(audit.id, bob.id).await.unwrap().is_none());

  let revoked = s.revoke_access(audit.id, alice.id).await.unwrap().unwrap();
  assert!(revoked.audit.revoked);
  assert_eq!(revoked.context.id, ctx.id);
  assert_eq!(revoked.consents_revoked, 1);

  let request = s.find_consent_request(ctx.id, bob.id).await.unwrap().unwrap();
  assert_eq!(request.status, ConsentStatus::Denied);
}

#[tokio::test]
async fn revoke_access_leaves_denied_requests_alone() {
  let s = store().await;
  let alice = user(&s, "alice@example.com").await;
  let bob = user(&s, "bob@example.com").await;
  let ctx = context(&s, alice.id, "Private", Visibility::Consent).await;
  let code = s.create_share_code(ctx.id, None).await.unwrap();
  let audit = s.record_redemption(code.id, bob.email.clone(), None).await.unwrap().audit;

  let ConsentFiling::Created(request) =
    s.file_consent_request(ctx.id, bob.id, String::new()).await.unwrap()
  else {
    panic!("expected a new request");
  };
  s.deny_consent_request(request.id).await.unwrap().unwrap();

  let revoked = s.revoke_access(audit.id, alice.id).await.unwrap().unwrap();
  assert_eq!(revoked.consents_revoked, 0);
  let request = s.find_consent_request(ctx.id, bob.id).await.unwrap().unwrap();
  assert_eq!(request.status, ConsentStatus::Denied);
}

#[tokio::test]
async fn redemption_listings_respect_filters() {
  let s = store().await;
  let alice = user(&s, "alice@example.com").await;
  let bob = user(&s, "bob@example.com").await;
  let ctx = context(&s, alice.id, "Work", Visibility::Code).await;
  let live = s.create_share_code(ctx.id, None).await.unwrap();
  let dead = s.create_share_code(ctx.id, None).await.unwrap();

  let first = s.record_redemption(live.id, bob.email.clone(), None).await.unwrap().audit;
  let second = s.record_redemption(live.id, bob.email.clone(), None).await.unwrap().audit;
  s.record_redemption(dead.id, bob.email.clone(), None).await.unwrap();
  s.revoke_share_code(dead.id).await.unwrap();
  s.revoke_access(first.id, alice.id).await.unwrap();

  let owner = s.list_owner_redemptions(alice.id, RedemptionFilter::default()).await.unwrap();
  assert_eq!(owner.iter().map(|r| r.audit_id).collect::<Vec<_>>(), vec![second.id]);
  assert_eq!(owner[0].context_label, "Work");

  let everything = RedemptionFilter { include_revoked: true, include_archived: true };
  let requester = s.list_requester_redemptions(bob.email.clone(), everything).await.unwrap();
  assert_eq!(
    requester.iter().map(|r| r.audit_id).collect::<Vec<_>>(),
    vec![second.id, first.id],
  );

  let redeemers = s.list_redeemers(ctx.id).await.unwrap();
  assert_eq!(redeemers.iter().map(|u| u.id).collect::<Vec<_>>(), vec![bob.id]);
}

// ─── Consent ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn filing_creates_then_reports_then_renews() {
  let s = store().await;
  let alice = user(&s, "alice@example.com").await;
  let bob = user(&s, "bob@example.com").await;
  let ctx = context(&s, alice.id, "Private", Visibility::Consent).await;

  let ConsentFiling::Created(created) =
    s.file_consent_request(ctx.id, bob.id, "hi".into()).await.unwrap()
  else {
    panic!("expected a new request");
  };
  assert_eq!(created.status, ConsentStatus::Pending);

  let again = s.file_consent_request(ctx.id, bob.id, "again".into()).await.unwrap();
  assert!(matches!(again, ConsentFiling::AlreadyRequested(r) if r.message == "hi"));

  s.deny_consent_request(created.id).await.unwrap().unwrap();
  let ConsentFiling::Renewed(renewed) =
    s.file_consent_request(ctx.id, bob.id, "please".into()).await.unwrap()
  else {
    panic!("expected a renewal");
  };
  assert_eq!(renewed.id, created.id);
  assert_eq!(renewed.status, ConsentStatus::Pending);
  assert_eq!(renewed.message, "please");
}

#[tokio::test]
async fn approval_issues_code_and_audit_once() {
  let s = store().await;
  let alice = user(&s, "alice@example.com").await;
  let bob = user(&s, "bob@example.com").await;
  let ctx = context(&s, alice.id, "Private", Visibility::Consent).await;
  let ConsentFiling::Created(request) =
    s.file_consent_request(ctx.id, bob.id, String::new()).await.unwrap()
  else {
    panic!("expected a new request");
  };

  let approval = s.approve_consent_request(request.id).await.unwrap().unwrap();
  assert_eq!(approval.request.status, ConsentStatus::Approved);
  assert_eq!(approval.requester_email, "bob@example.com");
  assert!(approval.share_code.expires_at.is_none());
  assert_eq!(approval.audit.share_code_id, approval.share_code.id);
  assert_eq!(approval.audit.requester, "bob@example.com");

  assert!(s.approve_consent_request(request.id).await.unwrap().is_none());
  assert!(s.deny_consent_request(request.id).await.unwrap().is_none());
  assert_eq!(s.list_audits(ctx.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn consent_views_carry_labels() {
  let s = store().await;
  let alice = user(&s, "alice@example.com").await;
  let bob = user(&s, "bob@example.com").await;
  let ctx = context(&s, alice.id, "Private", Visibility::Consent).await;
  s.file_consent_request(ctx.id, bob.id, String::new()).await.unwrap();

  let owner = s.list_owner_consent_requests(alice.id).await.unwrap();
  assert_eq!(owner.len(), 1);
  assert_eq!(owner[0].context_label, "Private");
  assert_eq!(owner[0].context_owner, "alice@example.com");
  assert_eq!(owner[0].requester_email, "bob@example.com");

  let pending = s
    .list_requester_consent_requests(bob.id, Some(ConsentStatus::Pending))
    .await
    .unwrap();
  assert_eq!(pending.len(), 1);
  let approved = s
    .list_requester_consent_requests(bob.id, Some(ConsentStatus::Approved))
    .await
    .unwrap();
  assert!(approved.is_empty());
}

// ─── Notifications ───────────────────────────────────────────────────────────

#[tokio::test]
async fn notifications_are_private_to_their_user() {
  let s = store().await;
  let alice = user(&s, "alice@example.com").await;
  let bob = user(&s, "bob@example.com").await;
  let ctx = context(&s, alice.id, "Work", Visibility::Code).await;
  let first = s.create_notification(NewNotification::redemption(&ctx, "anon")).await.unwrap();
  let second = s.create_notification(NewNotification::redemption(&ctx, "anon")).await.unwrap();

  let listed = s.list_notifications(alice.id).await.unwrap();
  assert_eq!(listed.iter().map(|n| n.id).collect::<Vec<_>>(), vec![second.id, first.id]);

  assert!(s.set_notification_read(first.id, bob.id, true).await.unwrap().is_none());
  let read = s.set_notification_read(first.id, alice.id, true).await.unwrap().unwrap();
  assert!(read.read);
}
