//! Router tests driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::{
  body::Body,
  http::{Method, Request, StatusCode, header},
  response::Response,
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use chrono::{Duration, Utc};
use serde_json::{Value, json};
use sharename_store_sqlite::SqliteStore;
use tower::ServiceExt as _;

use crate::{AppState, ServerConfig, router};

const PASSWORD: &str = "Str0ng!pass";

async fn make_state() -> AppState<SqliteStore> {
  let store = SqliteStore::open_in_memory().await.unwrap();
  AppState::new(Arc::new(store), ServerConfig::default())
}

fn basic(email: &str) -> String {
  format!("Basic {}", B64.encode(format!("{email}:{PASSWORD}")))
}

async fn call(
  state: &AppState<SqliteStore>,
  method: Method,
  uri: &str,
  headers: &[(&str, &str)],
  body: Option<Value>,
) -> Response {
  let mut builder = Request::builder().method(method).uri(uri);
  for (k, v) in headers {
    builder = builder.header(*k, *v);
  }
  let body = match body {
    Some(json) => {
      builder = builder.header(header::CONTENT_TYPE, "application/json");
      Body::from(json.to_string())
    }
    None => Body::empty(),
  };
  router(state.clone()).oneshot(builder.body(body).unwrap()).await.unwrap()
}

async fn json_body(resp: Response) -> Value {
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  serde_json::from_slice(&bytes).unwrap()
}

async fn register(state: &AppState<SqliteStore>, email: &str, role: &str) {
  let resp = call(
    state,
    Method::POST,
    "/register",
    &[],
    Some(json!({ "email": email, "password": PASSWORD, "role": role })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::CREATED);
}

/// Create a context with one code that expires in a day; returns (id, code).
async fn context_with_code(
  state: &AppState<SqliteStore>,
  owner: &str,
  visibility: &str,
) -> (i64, String) {
  let auth = basic(owner);
  let resp = call(
    state,
    Method::POST,
    "/contexts",
    &[("authorization", auth.as_str())],
    Some(json!({
      "label": "Work",
      "visibility": visibility,
      "given": "alice",
      "family": "liddell",
      "expires_at": Utc::now() + Duration::days(1),
    })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  let body = json_body(resp).await;
  let id = body["data"]["id"].as_i64().unwrap();
  let code = body["data"]["share_codes"][0]["code"].as_str().unwrap().to_owned();
  (id, code)
}

// ── Accounts ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn register_then_duplicate_is_a_field_error() {
  let state = make_state().await;
  register(&state, "owner@example.com", "individual").await;

  let resp = call(
    &state,
    Method::POST,
    "/register",
    &[],
    Some(json!({ "email": "OWNER@example.com", "password": PASSWORD })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let body = json_body(resp).await;
  assert_eq!(body["success"], false);
  assert!(body["errors"]["email"].is_array(), "{body}");
  assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn profile_round_trip() {
  let state = make_state().await;
  register(&state, "owner@example.com", "individual").await;
  let auth = basic("owner@example.com");

  let resp = call(
    &state,
    Method::PATCH,
    "/profile",
    &[("authorization", auth.as_str())],
    Some(json!({ "first_name": "mary", "last_name": "jane", "phone": "+1 (415) 555-0100" })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);

  let body = json_body(call(&state, Method::GET, "/profile", &[("authorization", auth.as_str())], None).await).await;
  assert_eq!(body["data"]["display_name"], "Mary Jane");
  assert_eq!(body["data"]["phone"], "+14155550100");
}

#[tokio::test]
async fn public_profiles_are_searchable_and_viewable() {
  let state = make_state().await;
  register(&state, "owner@example.com", "individual").await;
  register(&state, "hidden@example.com", "individual").await;
  register(&state, "hr@company.example", "company").await;
  let owner = basic("owner@example.com");
  let hidden = basic("hidden@example.com");
  let company = basic("hr@company.example");

  for auth in [&owner, &hidden] {
    let resp = call(
      &state,
      Method::PATCH,
      "/profile",
      &[("authorization", auth.as_str())],
      Some(json!({ "first_name": "rosalind", "last_name": "franklin" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
  }
  let resp = call(
    &state,
    Method::PATCH,
    "/profile",
    &[("authorization", owner.as_str())],
    Some(json!({ "is_public_profile": true })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  context_with_code(&state, "owner@example.com", "public").await;
  context_with_code(&state, "owner@example.com", "code").await;

  let resp = call(&state, Method::GET, "/search/users?q=rosa", &[], None).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

  let found = json_body(call(&state, Method::GET, "/search/users?q=rosa", &[("authorization", company.as_str())], None).await).await;
  let found = found["data"].as_array().unwrap().clone();
  assert_eq!(found.len(), 1);
  assert_eq!(found[0]["email"], "owner@example.com");
  assert_eq!(found[0]["display_name"], "Rosalind Franklin");

  let empty = json_body(call(&state, Method::GET, "/search/users", &[("authorization", company.as_str())], None).await).await;
  assert!(empty["data"].as_array().unwrap().is_empty());

  let id = found[0]["id"].as_i64().unwrap();
  let resp = call(&state, Method::GET, &format!("/profile/public/{id}"), &[("authorization", company.as_str())], None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body = json_body(resp).await;
  assert_eq!(body["data"]["email"], "owner@example.com");
  let shown = body["data"]["public_contexts"].as_array().unwrap();
  assert_eq!(shown.len(), 1);
  assert_eq!(shown[0]["given"], "Alice");

  let me = json_body(call(&state, Method::GET, "/profile", &[("authorization", hidden.as_str())], None).await).await;
  let hidden_id = me["data"]["user_id"].as_i64().unwrap();
  let resp = call(&state, Method::GET, &format!("/profile/public/{hidden_id}"), &[("authorization", company.as_str())], None).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  assert_eq!(json_body(resp).await["message"], "Profile not found");
}

// ── Auth and middleware ─────────────────────────────────────────────────────

#[tokio::test]
async fn missing_or_wrong_credentials_get_401() {
  let state = make_state().await;
  register(&state, "owner@example.com", "individual").await;

  let resp = call(&state, Method::GET, "/contexts", &[], None).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));

  let wrong = format!("Basic {}", B64.encode("owner@example.com:nope"));
  let resp = call(&state, Method::GET, "/contexts", &[("authorization", wrong.as_str())], None).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

  let resp = call(&state, Method::GET, "/codes/ABCDEFGH", &[("authorization", wrong.as_str())], None).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn security_headers_are_set() {
  let state = make_state().await;
  let resp = call(&state, Method::GET, "/codes/ABCDEFGH", &[], None).await;
  assert_eq!(resp.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
  assert_eq!(resp.headers()[header::X_FRAME_OPTIONS], "DENY");
}

#[tokio::test]
async fn malformed_json_is_reported_in_the_envelope() {
  let state = make_state().await;
  let resp = call(&state, Method::POST, "/register", &[], Some(json!({ "email": 5 }))).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  assert_eq!(json_body(resp).await["success"], false);
}

// ── Redemption ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_code_is_404() {
  let state = make_state().await;
  let resp = call(&state, Method::GET, "/codes/ZZZZZZZZ", &[], None).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  assert_eq!(json_body(resp).await["message"], "Share code not found");
}

#[tokio::test]
async fn anonymous_redemption_names_the_client() {
  let state = make_state().await;
  register(&state, "owner@example.com", "individual").await;
  let (_, code) = context_with_code(&state, "owner@example.com", "public").await;

  let resp = call(&state, Method::GET, &format!("/codes/{code}"), &[("x-client", "kiosk-7")], None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body = json_body(resp).await;
  assert_eq!(body["data"]["given"], "Alice");
  assert_eq!(body["data"]["visibility"], "public");

  let auth = basic("owner@example.com");
  let body = json_body(call(&state, Method::GET, "/notifications", &[("authorization", auth.as_str())], None).await).await;
  assert_eq!(body["data"][0]["title"], "Public Context Accessed by anon:kiosk-7");
  assert_eq!(body["data"][0]["type"], "redemption");

  let body = json_body(call(&state, Method::GET, "/redemptions", &[("authorization", auth.as_str())], None).await).await;
  assert_eq!(body["data"][0]["requester"], "anon:kiosk-7");
}

#[tokio::test]
async fn client_header_cannot_borrow_a_registered_email() {
  let state = make_state().await;
  register(&state, "owner@example.com", "individual").await;
  register(&state, "victim@example.com", "company").await;
  let (_, code) = context_with_code(&state, "owner@example.com", "public").await;

  let resp = call(&state, Method::GET, &format!("/codes/{code}"), &[("x-client", "victim@example.com")], None).await;
  assert_eq!(resp.status(), StatusCode::OK);

  let victim = basic("victim@example.com");
  let made = json_body(call(&state, Method::GET, "/company-redemptions", &[("authorization", victim.as_str())], None).await).await;
  assert!(made["data"].as_array().unwrap().is_empty(), "{made}");

  let owner = basic("owner@example.com");
  let seen = json_body(call(&state, Method::GET, "/redemptions", &[("authorization", owner.as_str())], None).await).await;
  assert_eq!(seen["data"][0]["requester"], "anon:victimexample.com");
}

#[tokio::test]
async fn consent_flow_over_http() {
  let state = make_state().await;
  register(&state, "owner@example.com", "individual").await;
  register(&state, "hr@company.example", "company").await;
  let owner = basic("owner@example.com");
  let company = basic("hr@company.example");
  let (ctx, code) = context_with_code(&state, "owner@example.com", "consent").await;
  let redeem = format!("/codes/{code}");

  let resp = call(&state, Method::GET, &redeem, &[], None).await;
  assert_eq!(resp.status(), StatusCode::FORBIDDEN);
  assert!(json_body(resp).await.get("errors").is_none());

  let resp = call(&state, Method::GET, &redeem, &[("authorization", company.as_str())], None).await;
  assert_eq!(resp.status(), StatusCode::FORBIDDEN);
  let body = json_body(resp).await;
  assert_eq!(body["errors"]["requires_consent"], true);
  assert_eq!(body["errors"]["context_label"], "Work");
  assert_eq!(body["errors"]["owner"], "owner@example.com");

  let resp = call(
    &state,
    Method::POST,
    "/consent-requests",
    &[("authorization", company.as_str())],
    Some(json!({ "context_id": ctx, "message": "for onboarding" })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  let request_id = json_body(resp).await["data"]["id"].as_i64().unwrap();

  let pending = json_body(call(&state, Method::GET, "/consent-requests/pending", &[("authorization", company.as_str())], None).await).await;
  assert_eq!(pending["data"].as_array().unwrap().len(), 1);

  let uri = format!("/consent-requests/{request_id}");
  let resp = call(&state, Method::PATCH, &uri, &[("authorization", company.as_str())], Some(json!({ "status": "approved" }))).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);

  let resp = call(&state, Method::PATCH, &uri, &[("authorization", owner.as_str())], Some(json!({ "status": "maybe" }))).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  assert!(json_body(resp).await["errors"]["status"].is_array());

  let resp = call(&state, Method::PATCH, &uri, &[("authorization", owner.as_str())], Some(json!({ "status": "approved" }))).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(json_body(resp).await["data"]["status"], "approved");

  let resp = call(&state, Method::PATCH, &uri, &[("authorization", owner.as_str())], Some(json!({ "status": "denied" }))).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

  let resp = call(&state, Method::GET, &redeem, &[("authorization", company.as_str())], None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(json_body(resp).await["data"]["family"], "Liddell");

  let resp = call(
    &state,
    Method::POST,
    "/redeem-by-id",
    &[("authorization", company.as_str())],
    Some(json!({ "context_id": ctx })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);

  let made = json_body(call(&state, Method::GET, "/company-redemptions", &[("authorization", company.as_str())], None).await).await;
  assert_eq!(made["data"].as_array().unwrap().len(), 3);
  let made = json_body(call(&state, Method::GET, "/company-redemptions", &[("authorization", owner.as_str())], None).await).await;
  assert!(made["data"].as_array().unwrap().is_empty());

  let received = json_body(call(&state, Method::GET, "/redemptions", &[("authorization", owner.as_str())], None).await).await;
  assert_eq!(received["data"].as_array().unwrap().len(), 3);
  assert_eq!(received["data"][0]["requester"], "hr@company.example");
}

#[tokio::test]
async fn revoking_access_over_http() {
  let state = make_state().await;
  register(&state, "owner@example.com", "individual").await;
  register(&state, "hr@company.example", "company").await;
  let owner = basic("owner@example.com");
  let company = basic("hr@company.example");
  let (_, code) = context_with_code(&state, "owner@example.com", "code").await;

  let resp = call(&state, Method::GET, &format!("/codes/{code}"), &[("authorization", company.as_str())], None).await;
  assert_eq!(resp.status(), StatusCode::OK);

  let listed = json_body(call(&state, Method::GET, "/redemptions", &[("authorization", owner.as_str())], None).await).await;
  let audit_id = listed["data"][0]["audit_id"].as_i64().unwrap();

  let resp = call(
    &state,
    Method::POST,
    "/revoke-access",
    &[("authorization", company.as_str())],
    Some(json!({ "audit_id": audit_id })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);

  let resp = call(
    &state,
    Method::POST,
    "/revoke-access",
    &[("authorization", owner.as_str())],
    Some(json!({ "audit_id": audit_id })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(json_body(resp).await["data"]["audit"]["revoked"], true);

  let notes = json_body(call(&state, Method::GET, "/notifications", &[("authorization", company.as_str())], None).await).await;
  assert_eq!(notes["data"][0]["type"], "access_revoked");
}

// ── Contexts ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn invalid_context_fields_are_reported_per_field() {
  let state = make_state().await;
  register(&state, "owner@example.com", "individual").await;
  let auth = basic("owner@example.com");

  let resp = call(
    &state,
    Method::POST,
    "/contexts",
    &[("authorization", auth.as_str())],
    Some(json!({ "label": "no/slashes", "visibility": "code", "given": "R2D2" })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let body = json_body(resp).await;
  assert!(body["errors"]["label"].is_array());
  assert!(body["errors"]["given"].is_array());
}

#[tokio::test]
async fn contexts_are_invisible_to_other_users() {
  let state = make_state().await;
  register(&state, "owner@example.com", "individual").await;
  register(&state, "other@example.com", "individual").await;
  let (ctx, _) = context_with_code(&state, "owner@example.com", "code").await;
  let other = basic("other@example.com");

  let uri = format!("/contexts/{ctx}");
  let resp = call(&state, Method::GET, &uri, &[("authorization", other.as_str())], None).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  let resp = call(&state, Method::DELETE, &uri, &[("authorization", other.as_str())], None).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);

  let owner = basic("owner@example.com");
  let resp = call(&state, Method::DELETE, &uri, &[("authorization", owner.as_str())], None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let listed = json_body(call(&state, Method::GET, "/contexts", &[("authorization", owner.as_str())], None).await).await;
  assert!(listed["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn poll_is_empty_without_a_sweep() {
  let state = make_state().await;
  register(&state, "owner@example.com", "individual").await;
  let auth = basic("owner@example.com");
  let body = json_body(call(&state, Method::GET, "/notifications/poll", &[("authorization", auth.as_str())], None).await).await;
  assert_eq!(body["data"]["has_updates"], false);
  assert!(body["data"]["flag"].is_null());
  assert!(body["data"]["last_check"].is_null());

  let body = json_body(call(&state, Method::GET, "/notifications/poll", &[("authorization", auth.as_str())], None).await).await;
  assert!(body["data"]["last_check"].is_string(), "{body}");
}
