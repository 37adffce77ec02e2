//! Share codes: the capability tokens that unlock a context.

use chrono::{DateTime, Utc};
use rand_core::{CryptoRng, OsRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::context::ContextId;

row_id!(
  /// Primary key of a [`ShareCode`].
  ShareCodeId
);

/// Characters a code is drawn from.
pub const ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const CODE_LEN: usize = 8;

/// A redeemable code bound to exactly one context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareCode {
  pub id:         ShareCodeId,
  pub context_id: ContextId,
  pub code:       String,
  pub created_at: DateTime<Utc>,
  pub expires_at: Option<DateTime<Utc>>,
  pub revoked:    bool,
}

impl ShareCode {
  /// Not revoked, and either non-expiring or expiring strictly after `now`.
  pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
    !self.revoked && self.expires_at.is_none_or(|at| at > now)
  }

  /// Expired strictly before `now`, regardless of revocation.
  pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
    self.expires_at.is_some_and(|at| at < now)
  }
}

/// Generate a fresh code from the operating system's CSPRNG.
pub fn generate_code() -> String { generate_code_with(&mut OsRng) }

/// Generate a code from `rng`, drawing each character uniformly from
/// [`ALPHABET`].
pub fn generate_code_with<R: RngCore + CryptoRng>(rng: &mut R) -> String {
  // Largest multiple of the alphabet size that fits in a byte; bytes at or
  // above it are rejected so every character is equally likely.
  const LIMIT: u8 = (256 - 256 % ALPHABET.len()) as u8;

  let mut code = String::with_capacity(CODE_LEN);
  let mut buf = [0u8; 16];
  while code.len() < CODE_LEN {
    rng.fill_bytes(&mut buf);
    for &b in buf.iter().filter(|&&b| b < LIMIT) {
      if code.len() == CODE_LEN {
        break;
      }
      code.push(ALPHABET[usize::from(b) % ALPHABET.len()] as char);
    }
  }
  code
}

/// Whether `code` could have been produced by [`generate_code`].
pub fn is_well_formed(code: &str) -> bool {
  code.len() == CODE_LEN && code.bytes().all(|b| ALPHABET.contains(&b))
}
