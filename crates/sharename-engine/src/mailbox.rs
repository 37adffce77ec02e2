//! Poll-based delivery flags.
//!
//! After a sweep touches a user, a flag is raised for them; clients poll and
//! the flag is handed out once. Entries expire on their own. Nothing here is
//! authoritative: losing a flag only delays the client noticing new
//! notifications, which are persisted regardless.

use std::{
  collections::HashMap,
  sync::{Mutex, PoisonError},
  time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sharename_core::user::UserId;

/// Raised for a user when a sweep touched one of their contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MailboxFlag {
  pub timestamp: DateTime<Utc>,
  pub processed: bool,
}

/// Outcome of one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Poll {
  pub flag:       Option<MailboxFlag>,
  /// When the user polled before this, if still remembered.
  pub last_check: Option<DateTime<Utc>>,
}

/// A value that stops being visible once `expires` passes.
struct Entry<T> {
  value:   T,
  expires: Instant,
}

impl<T: Copy> Entry<T> {
  fn live(&self, now: Instant) -> Option<T> { (now < self.expires).then_some(self.value) }
}

pub struct Mailbox {
  flag_ttl:    Duration,
  check_ttl:   Duration,
  flags:       Mutex<HashMap<UserId, Entry<MailboxFlag>>>,
  last_checks: Mutex<HashMap<UserId, Entry<DateTime<Utc>>>>,
}

impl Mailbox {
  pub fn new(flag_ttl: Duration, check_ttl: Duration) -> Self {
    Self {
      flag_ttl,
      check_ttl,
      flags: Mutex::new(HashMap::new()),
      last_checks: Mutex::new(HashMap::new()),
    }
  }

  /// Raise (or refresh) the flag for `user`.
  pub fn flag(&self, user: UserId, at: DateTime<Utc>) {
    let now = Instant::now();
    let mut flags = self.flags.lock().unwrap_or_else(PoisonError::into_inner);
    flags.retain(|_, e| e.live(now).is_some());
    flags.insert(user, Entry {
      value:   MailboxFlag { timestamp: at, processed: true },
      expires: now + self.flag_ttl,
    });
  }

  /// Hand out and clear the user's flag, and record this poll.
  pub fn take(&self, user: UserId) -> Poll {
    let now = Instant::now();
    let flag = self
      .flags
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(&user)
      .and_then(|e| e.live(now));

    let mut checks = self.last_checks.lock().unwrap_or_else(PoisonError::into_inner);
    checks.retain(|_, e| e.live(now).is_some());
    let last_check = checks
      .insert(user, Entry { value: Utc::now(), expires: now + self.check_ttl })
      .and_then(|e| e.live(now));

    Poll { flag, last_check }
  }
}
