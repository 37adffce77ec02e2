//! JSON REST API for Sharename.
//!
//! Exposes an axum [`Router`] over an [`Engine`] backed by any
//! [`ShareStore`]. Callers authenticate with HTTP Basic against their
//! registered email and password; redemption by code also admits anonymous
//! callers. Every response uses the envelope in [`reply`].

pub mod accounts;
pub mod auth;
pub mod consent;
pub mod contexts;
pub mod error;
pub mod notifications;
pub mod redemptions;
pub mod reply;
pub mod search;
pub mod share_codes;

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{
  Router,
  http::{HeaderValue, header},
  routing::{delete, get, patch, post},
};
use serde::Deserialize;
use sharename_core::store::ShareStore;
use sharename_engine::{Engine, EngineConfig};
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};

pub use error::ApiError;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `SHARENAME_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                String,
  pub port:                u16,
  pub store_path:          PathBuf,
  /// Seconds between periodic sweeps; `0` runs only the start-up sweep.
  pub sweep_interval_secs: u64,
  pub sweep_lock_secs:     u64,
  pub mailbox_ttl_secs:    u64,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                "127.0.0.1".to_owned(),
      port:                8000,
      store_path:          PathBuf::from("~/.local/share/sharename/sharename.db"),
      sweep_interval_secs: 3600,
      sweep_lock_secs:     30,
      mailbox_ttl_secs:    300,
    }
  }
}

impl ServerConfig {
  pub fn engine_config(&self) -> EngineConfig {
    EngineConfig {
      sweep_lock_ttl: Duration::from_secs(self.sweep_lock_secs),
      mailbox_ttl: Duration::from_secs(self.mailbox_ttl_secs),
      ..EngineConfig::default()
    }
  }
}

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub engine: Engine<S>,
  pub config: Arc<ServerConfig>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self { engine: self.engine.clone(), config: Arc::clone(&self.config) }
  }
}

impl<S: ShareStore> AppState<S> {
  pub fn new(store: Arc<S>, config: ServerConfig) -> Self {
    Self { engine: Engine::new(store, config.engine_config()), config: Arc::new(config) }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the API router with request tracing and security headers applied.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: ShareStore + 'static,
{
  Router::new()
    // Accounts
    .route("/register", post(accounts::register::<S>))
    .route("/profile", get(accounts::get_profile::<S>).patch(accounts::update_profile::<S>))
    .route("/profile/public/{user_id}", get(search::public_profile::<S>))
    .route("/search/users", get(search::users::<S>))
    // Contexts
    .route("/contexts", get(contexts::list::<S>).post(contexts::create::<S>))
    .route(
      "/contexts/{id}",
      get(contexts::get_one::<S>)
        .patch(contexts::update::<S>)
        .delete(contexts::delete::<S>),
    )
    .route("/contexts/archived", get(contexts::list_archived::<S>))
    .route("/contexts/archived/{id}", delete(contexts::delete_archived::<S>))
    .route("/contexts/expired", get(contexts::list_expired::<S>))
    .route("/contexts/expired/check", post(contexts::check_expired::<S>))
    // Share codes
    .route("/sharecodes", post(share_codes::create::<S>))
    .route("/sharecodes/{id}", patch(share_codes::set_expiry::<S>))
    .route("/sharecodes/{id}/revoke", post(share_codes::revoke::<S>))
    .route("/codes/{code}", get(share_codes::redeem::<S>))
    .route("/redeem-by-id", post(share_codes::redeem_by_id::<S>))
    // Consent
    .route("/consent-requests", get(consent::list::<S>).post(consent::create::<S>))
    .route("/consent-requests/pending", get(consent::pending::<S>))
    .route("/consent-requests/by-code", post(consent::create_by_code::<S>))
    .route("/consent-requests/{id}", patch(consent::resolve::<S>))
    // Redemptions
    .route("/redemptions", get(redemptions::of_my_contexts::<S>))
    .route("/company-redemptions", get(redemptions::mine::<S>))
    .route("/revoke-access", post(redemptions::revoke::<S>))
    // Notifications
    .route("/notifications", get(notifications::list::<S>))
    .route("/notifications/poll", get(notifications::poll::<S>))
    .route("/notifications/{id}", patch(notifications::mark::<S>))
    .layer(SetResponseHeaderLayer::overriding(
      header::X_CONTENT_TYPE_OPTIONS,
      HeaderValue::from_static("nosniff"),
    ))
    .layer(SetResponseHeaderLayer::overriding(
      header::X_FRAME_OPTIONS,
      HeaderValue::from_static("DENY"),
    ))
    .layer(SetResponseHeaderLayer::overriding(
      header::X_XSS_PROTECTION,
      HeaderValue::from_static("1; mode=block"),
    ))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

#[cfg(test)]
mod tests;
