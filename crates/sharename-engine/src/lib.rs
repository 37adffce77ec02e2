//! The Sharename access-control engine.
//!
//! [`Engine`] implements every operation the HTTP layer exposes on top of any
//! [`ShareStore`]: redemption by code or context id, the consent workflow,
//! per-redemption revocation, the expiration sweep, and the owner-side
//! management of accounts, contexts, share codes and notifications.
//!
//! The engine never authenticates anyone. Callers hand it the [`User`] or
//! anonymous [`Requester`] their identity layer resolved.
//!
//! [`User`]: sharename_core::user::User
//! [`Requester`]: sharename_core::user::Requester

use std::{sync::Arc, time::Duration};

use sharename_core::store::ShareStore;

mod access;
mod accounts;
mod consent;
mod contexts;
mod notifications;
mod redeem;
mod sweep;

pub mod mailbox;

pub use mailbox::{Mailbox, MailboxFlag, Poll};
pub use sweep::{SweepLock, SweepReport};


// ─── Config ──────────────────────────────────────────────────────────────────

/// Timing knobs for the in-process state the engine keeps.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
  /// How long a sweep may hold the re-entrancy lock before it self-clears.
  pub sweep_lock_ttl: Duration,
  /// Lifetime of a mailbox flag raised by a sweep.
  pub mailbox_ttl:    Duration,
  /// Lifetime of a recorded last-poll timestamp.
  pub last_check_ttl: Duration,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      sweep_lock_ttl: Duration::from_secs(30),
      mailbox_ttl:    Duration::from_secs(300),
      last_check_ttl: Duration::from_secs(3600),
    }
  }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Entry point for every core operation. Cloning is cheap; clones share the
/// store, the sweep lock and the mailbox.
pub struct Engine<S> {
  store:      Arc<S>,
  sweep_lock: Arc<SweepLock>,
  mailbox:    Arc<Mailbox>,
}

impl<S> Clone for Engine<S> {
  fn clone(&self) -> Self {
    Self {
      store:      Arc::clone(&self.store),
      sweep_lock: Arc::clone(&self.sweep_lock),
      mailbox:    Arc::clone(&self.mailbox),
    }
  }
}

impl<S: ShareStore> Engine<S> {
  pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
    Self {
      store,
      sweep_lock: Arc::new(SweepLock::new(config.sweep_lock_ttl)),
      mailbox: Arc::new(Mailbox::new(config.mailbox_ttl, config.last_check_ttl)),
    }
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn mailbox(&self) -> &Mailbox { &self.mailbox }
}
