//! The expiration sweep and its re-entrancy lock.
//!
//! A context is due once any of its codes (revoked ones included) expired.
//! The sweep notifies the owner and every past redeemer, then archives the
//! context or deletes it. Each context is handled on its own: a failure is
//! logged and the sweep moves on.

use std::{
  collections::HashSet,
  sync::{Arc, Mutex, PoisonError},
  time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use sharename_core::{
  Error, Result,
  context::Context,
  notification::NewNotification,
  store::ShareStore,
  user::UserId,
};

use crate::Engine;

// ─── Lock ────────────────────────────────────────────────────────────────────

/// A time-boxed mutual-exclusion flag.
///
/// A holder that never releases (a crashed task) stops blocking others once
/// the TTL elapses.
pub struct SweepLock {
  ttl:  Duration,
  /// Generation and acquisition time of the current holder.
  held: Mutex<(u64, Option<Instant>)>,
}

/// Releases the lock on drop, unless it has since been taken over.
pub struct SweepGuard {
  lock:       Arc<SweepLock>,
  generation: u64,
}

impl SweepLock {
  pub fn new(ttl: Duration) -> Self { Self { ttl, held: Mutex::new((0, None)) } }

  pub fn try_acquire(self: &Arc<Self>) -> Option<SweepGuard> {
    let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
    let (generation, since) = &mut *held;
    if since.is_some_and(|at| at.elapsed() < self.ttl) {
      return None;
    }
    *generation += 1;
    *since = Some(Instant::now());
    Some(SweepGuard { lock: Arc::clone(self), generation: *generation })
  }

  pub fn is_held(&self) -> bool {
    let held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
    held.1.is_some_and(|at| at.elapsed() < self.ttl)
  }
}

impl Drop for SweepGuard {
  fn drop(&mut self) {
    let mut held = self.lock.held.lock().unwrap_or_else(PoisonError::into_inner);
    if held.0 == self.generation {
      held.1 = None;
    }
  }
}

// ─── Sweep ───────────────────────────────────────────────────────────────────

/// Outcome of one sweep run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
  /// Contexts archived or deleted.
  pub processed: usize,
  /// Contexts whose processing failed; they are retried on the next run.
  pub failed:    usize,
  /// Another sweep held the lock, so nothing was done.
  pub skipped:   bool,
}

impl<S: ShareStore + 'static> Engine<S> {
  /// Run the sweep now, unless one is already running.
  pub async fn run_expiration_sweep(&self) -> Result<SweepReport> {
    self.run_expiration_sweep_at(Utc::now()).await
  }

  /// Run the sweep as of `now`.
  pub async fn run_expiration_sweep_at(&self, now: DateTime<Utc>) -> Result<SweepReport> {
    let Some(guard) = self.sweep_lock.try_acquire() else {
      tracing::debug!("expiration sweep already running");
      return Ok(SweepReport { skipped: true, ..SweepReport::default() });
    };
    self.sweep(guard, now).await
  }

  /// Start a sweep in the background and return immediately. Does nothing if
  /// a sweep is already running; failures are only logged.
  pub fn trigger_sweep(&self) {
    let Some(guard) = self.sweep_lock.try_acquire() else {
      tracing::debug!("expiration sweep already running, trigger ignored");
      return;
    };
    let engine = self.clone();
    tokio::spawn(async move {
      if let Err(e) = engine.sweep(guard, Utc::now()).await {
        tracing::error!(error = %e, "background expiration sweep failed");
      }
    });
  }

  /// The sweep proper. `_guard` is held until this returns or unwinds.
  async fn sweep(&self, _guard: SweepGuard, now: DateTime<Utc>) -> Result<SweepReport> {
    let due = self
      .store
      .list_expired_contexts(None, now)
      .await
      .map_err(Error::store)?;

    let mut report = SweepReport::default();
    for context in due {
      match self.expire(&context, now).await {
        Ok(touched) => {
          report.processed += 1;
          for user in touched {
            self.mailbox.flag(user, now);
          }
        }
        Err(e) => {
          report.failed += 1;
          tracing::error!(context_id = %context.id, error = %e, "failed to process expired context");
        }
      }
    }

    if report.processed > 0 || report.failed > 0 {
      tracing::info!(processed = report.processed, failed = report.failed, "expiration sweep finished");
    } else {
      tracing::debug!("expiration sweep found nothing to do");
    }
    Ok(report)
  }

  /// Notify everyone concerned, then archive or delete. Returns the users who
  /// were notified.
  async fn expire(&self, context: &Context, now: DateTime<Utc>) -> Result<Vec<UserId>> {
    let mut touched = Vec::new();
    if self.notify(NewNotification::context_expired_owner(context)).await.is_some() {
      touched.push(context.owner_id);
    }

    let redeemers = self
      .store
      .list_redeemers(context.id)
      .await
      .map_err(Error::store)?;
    let mut seen = HashSet::from([context.owner_id]);
    for redeemer in redeemers.into_iter().filter(|u| seen.insert(u.id)) {
      let notice = NewNotification::context_expired_redeemer(context, redeemer.id);
      if self.notify(notice).await.is_some() {
        touched.push(redeemer.id);
      }
    }

    if context.auto_archive_expired {
      self
        .store
        .archive_expired_context(context.id, now)
        .await
        .map_err(Error::store)?;
      tracing::info!(context_id = %context.id, label = %context.label, "archived expired context");
    } else {
      self.store.delete_context(context.id).await.map_err(Error::store)?;
      tracing::info!(context_id = %context.id, label = %context.label, "deleted expired context");
    }
    Ok(touched)
  }
}
