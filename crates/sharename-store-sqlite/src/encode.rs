//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings. Enums are stored
//! as their lower-case names. Row structs hold raw column values read inside a
//! connection closure; they are decoded into domain types afterwards.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use sharename_core::{
  audit::{Audit, AuditId, Redemption},
  consent::{ConsentRequest, ConsentRequestId, ConsentRequestView},
  context::{Context, ContextId},
  notification::{Notification, NotificationId},
  share_code::{ShareCode, ShareCodeId},
  user::{Profile, User, UserId},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

/// Microsecond precision with a `Z` suffix; every value has the same width.
pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
  s.map(decode_dt).transpose()
}

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn decode_enum<T: FromStr>(column: &'static str, s: &str) -> Result<T> {
  T::from_str(s).map_err(|_| Error::UnknownVariant { column, value: s.to_owned() })
}

// ─── Users ───────────────────────────────────────────────────────────────────

pub const USER_COLUMNS: &str = "u.id, u.email, u.password_hash, u.role, u.created_at";

pub struct RawUser {
  pub id:            i64,
  pub email:         String,
  pub password_hash: String,
  pub role:          String,
  pub created_at:    String,
}

impl RawUser {
  /// Read [`USER_COLUMNS`] starting at column `offset`.
  pub fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      id:            row.get(offset)?,
      email:         row.get(offset + 1)?,
      password_hash: row.get(offset + 2)?,
      role:          row.get(offset + 3)?,
      created_at:    row.get(offset + 4)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      id:            UserId(self.id),
      email:         self.email,
      password_hash: self.password_hash,
      role:          decode_enum("role", &self.role)?,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

pub const PROFILE_COLUMNS: &str = "p.user_id, p.first_name, p.last_name, p.phone, \
  p.country, p.bio, p.company_name, p.company_phone, p.company_country, \
  p.company_website, p.company_founded, p.company_description, p.is_public_profile";

/// Profiles hold no encoded columns, so they are built straight from the row.
/// Reads [`PROFILE_COLUMNS`] starting at column `offset`.
pub fn profile_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Profile> {
  Ok(Profile {
    user_id:             Some(UserId(row.get(offset)?)),
    first_name:          row.get(offset + 1)?,
    last_name:           row.get(offset + 2)?,
    phone:               row.get(offset + 3)?,
    country:             row.get(offset + 4)?,
    bio:                 row.get(offset + 5)?,
    company_name:        row.get(offset + 6)?,
    company_phone:       row.get(offset + 7)?,
    company_country:     row.get(offset + 8)?,
    company_website:     row.get(offset + 9)?,
    company_founded:     row.get(offset + 10)?,
    company_description: row.get(offset + 11)?,
    is_public_profile:   row.get(offset + 12)?,
  })
}

/// Escape `%`, `_` and `\` so `s` matches literally under `LIKE … ESCAPE '\'`.
pub fn escape_like(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for c in s.chars() {
    if matches!(c, '%' | '_' | '\\') {
      out.push('\\');
    }
    out.push(c);
  }
  out
}

// ─── Contexts ────────────────────────────────────────────────────────────────

pub const CONTEXT_COLUMNS: &str = "c.id, c.owner_id, c.label, c.visibility, c.given, \
  c.family, c.created_at, c.notify_on_redeem, c.auto_archive_expired, c.archived, \
  c.archived_at, c.expiration_processed";

pub struct RawContext {
  pub id:                   i64,
  pub owner_id:             i64,
  pub label:                String,
  pub visibility:           String,
  pub given:                String,
  pub family:               String,
  pub created_at:           String,
  pub notify_on_redeem:     bool,
  pub auto_archive_expired: bool,
  pub archived:             bool,
  pub archived_at:          Option<String>,
  pub expiration_processed: bool,
}

impl RawContext {
  /// Read [`CONTEXT_COLUMNS`] starting at column `offset`.
  pub fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                   row.get(offset)?,
      owner_id:             row.get(offset + 1)?,
      label:                row.get(offset + 2)?,
      visibility:           row.get(offset + 3)?,
      given:                row.get(offset + 4)?,
      family:               row.get(offset + 5)?,
      created_at:           row.get(offset + 6)?,
      notify_on_redeem:     row.get(offset + 7)?,
      auto_archive_expired: row.get(offset + 8)?,
      archived:             row.get(offset + 9)?,
      archived_at:          row.get(offset + 10)?,
      expiration_processed: row.get(offset + 11)?,
    })
  }

  pub fn into_context(self) -> Result<Context> {
    Ok(Context {
      id:                   ContextId(self.id),
      owner_id:             UserId(self.owner_id),
      label:                self.label,
      visibility:           decode_enum("visibility", &self.visibility)?,
      given:                self.given,
      family:               self.family,
      created_at:           decode_dt(&self.created_at)?,
      notify_on_redeem:     self.notify_on_redeem,
      auto_archive_expired: self.auto_archive_expired,
      archived:             self.archived,
      archived_at:          decode_opt_dt(self.archived_at.as_deref())?,
      expiration_processed: self.expiration_processed,
    })
  }
}

// ─── Share codes ─────────────────────────────────────────────────────────────

pub const SHARE_CODE_COLUMNS: &str =
  "s.id, s.context_id, s.code, s.created_at, s.expires_at, s.revoked";

pub struct RawShareCode {
  pub id:         i64,
  pub context_id: i64,
  pub code:       String,
  pub created_at: String,
  pub expires_at: Option<String>,
  pub revoked:    bool,
}

impl RawShareCode {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      context_id: row.get(1)?,
      code:       row.get(2)?,
      created_at: row.get(3)?,
      expires_at: row.get(4)?,
      revoked:    row.get(5)?,
    })
  }

  pub fn into_share_code(self) -> Result<ShareCode> {
    Ok(ShareCode {
      id:         ShareCodeId(self.id),
      context_id: ContextId(self.context_id),
      code:       self.code,
      created_at: decode_dt(&self.created_at)?,
      expires_at: decode_opt_dt(self.expires_at.as_deref())?,
      revoked:    self.revoked,
    })
  }
}

// ─── Audits ──────────────────────────────────────────────────────────────────

pub const AUDIT_COLUMNS: &str = "a.id, a.share_code_id, a.requester, a.ts, a.revoked";

pub struct RawAudit {
  pub id:            i64,
  pub share_code_id: i64,
  pub requester:     String,
  pub ts:            String,
  pub revoked:       bool,
}

impl RawAudit {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:            row.get(0)?,
      share_code_id: row.get(1)?,
      requester:     row.get(2)?,
      ts:            row.get(3)?,
      revoked:       row.get(4)?,
    })
  }

  pub fn into_audit(self) -> Result<Audit> {
    Ok(Audit {
      id:            AuditId(self.id),
      share_code_id: ShareCodeId(self.share_code_id),
      requester:     self.requester,
      ts:            decode_dt(&self.ts)?,
      revoked:       self.revoked,
    })
  }
}

/// Columns for a [`Redemption`]: audits joined with share_codes and contexts.
pub const REDEMPTION_COLUMNS: &str =
  "a.id, a.requester, a.ts, a.revoked, s.code, c.id, c.label";

pub struct RawRedemption {
  pub audit_id:      i64,
  pub requester:     String,
  pub ts:            String,
  pub revoked:       bool,
  pub code:          String,
  pub context_id:    i64,
  pub context_label: String,
}

impl RawRedemption {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      audit_id:      row.get(0)?,
      requester:     row.get(1)?,
      ts:            row.get(2)?,
      revoked:       row.get(3)?,
      code:          row.get(4)?,
      context_id:    row.get(5)?,
      context_label: row.get(6)?,
    })
  }

  pub fn into_redemption(self) -> Result<Redemption> {
    Ok(Redemption {
      audit_id:      AuditId(self.audit_id),
      requester:     self.requester,
      ts:            decode_dt(&self.ts)?,
      revoked:       self.revoked,
      code:          self.code,
      context_id:    ContextId(self.context_id),
      context_label: self.context_label,
    })
  }
}

// ─── Consent requests ────────────────────────────────────────────────────────

pub const CONSENT_COLUMNS: &str =
  "r.id, r.context_id, r.requester_id, r.status, r.message, r.created_at, r.updated_at";

/// Columns for a [`ConsentRequestView`]: [`CONSENT_COLUMNS`] followed by the
/// context label, the owner's email and the requester's email.
pub const CONSENT_VIEW_COLUMNS: &str = "r.id, r.context_id, r.requester_id, r.status, \
  r.message, r.created_at, r.updated_at, c.label, owner.email, req.email";

pub struct RawConsent {
  pub id:           i64,
  pub context_id:   i64,
  pub requester_id: i64,
  pub status:       String,
  pub message:      String,
  pub created_at:   String,
  pub updated_at:   String,
}

impl RawConsent {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:           row.get(0)?,
      context_id:   row.get(1)?,
      requester_id: row.get(2)?,
      status:       row.get(3)?,
      message:      row.get(4)?,
      created_at:   row.get(5)?,
      updated_at:   row.get(6)?,
    })
  }

  pub fn into_request(self) -> Result<ConsentRequest> {
    Ok(ConsentRequest {
      id:           ConsentRequestId(self.id),
      context_id:   ContextId(self.context_id),
      requester_id: UserId(self.requester_id),
      status:       decode_enum("status", &self.status)?,
      message:      self.message,
      created_at:   decode_dt(&self.created_at)?,
      updated_at:   decode_dt(&self.updated_at)?,
    })
  }
}

pub struct RawConsentView {
  pub request:         RawConsent,
  pub context_label:   String,
  pub context_owner:   String,
  pub requester_email: String,
}

impl RawConsentView {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      request:         RawConsent::from_row(row)?,
      context_label:   row.get(7)?,
      context_owner:   row.get(8)?,
      requester_email: row.get(9)?,
    })
  }

  pub fn into_view(self) -> Result<ConsentRequestView> {
    Ok(ConsentRequestView {
      request:         self.request.into_request()?,
      context_label:   self.context_label,
      context_owner:   self.context_owner,
      requester_email: self.requester_email,
    })
  }
}

// ─── Notifications ───────────────────────────────────────────────────────────

pub const NOTIFICATION_COLUMNS: &str =
  "n.id, n.user_id, n.kind, n.title, n.message, n.context_id, n.read, n.created_at";

pub struct RawNotification {
  pub id:         i64,
  pub user_id:    i64,
  pub kind:       String,
  pub title:      String,
  pub message:    String,
  pub context_id: Option<i64>,
  pub read:       bool,
  pub created_at: String,
}

impl RawNotification {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      user_id:    row.get(1)?,
      kind:       row.get(2)?,
      title:      row.get(3)?,
      message:    row.get(4)?,
      context_id: row.get(5)?,
      read:       row.get(6)?,
      created_at: row.get(7)?,
    })
  }

  pub fn into_notification(self) -> Result<Notification> {
    Ok(Notification {
      id:         NotificationId(self.id),
      user_id:    UserId(self.user_id),
      kind:       decode_enum("kind", &self.kind)?,
      title:      self.title,
      message:    self.message,
      context_id: self.context_id.map(ContextId),
      read:       self.read,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone};
  use sharename_core::context::Visibility;

  use super::*;

  #[test]
  fn encoded_timestamps_sort_chronologically() {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let times = [
      base,
      base + Duration::microseconds(5),
      base + Duration::milliseconds(500),
      base + Duration::seconds(1),
      base + Duration::days(400),
    ];
    let encoded: Vec<String> = times.iter().copied().map(encode_dt).collect();
    let mut sorted = encoded.clone();
    sorted.sort();
    assert_eq!(encoded, sorted);
    assert!(encoded.iter().all(|s| s.len() == encoded[0].len()));
  }

  #[test]
  fn timestamps_round_trip() {
    let at = Utc.with_ymd_and_hms(2025, 6, 30, 12, 34, 56).unwrap() + Duration::microseconds(789);
    assert_eq!(decode_dt(&encode_dt(at)).unwrap(), at);
  }

  #[test]
  fn unknown_enum_values_are_reported() {
    let err = decode_enum::<Visibility>("visibility", "secret").unwrap_err();
    assert!(matches!(err, Error::UnknownVariant { column: "visibility", .. }));
  }
}
