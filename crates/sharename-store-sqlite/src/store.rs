//! [`SqliteStore`]: the SQLite implementation of [`ShareStore`].

use std::{path::Path, str::FromStr};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _, TransactionBehavior};

use sharename_core::{
  audit::{Audit, AuditId, Redemption},
  consent::{ConsentRequest, ConsentRequestId, ConsentRequestView, ConsentStatus},
  context::{Context, ContextId, NewContext},
  notification::{NewNotification, Notification, NotificationId},
  share_code::{ShareCode, ShareCodeId, generate_code},
  store::{
    ConsentApproval, ConsentFiling, RecordedRedemption, RedemptionFilter, RevokedAccess,
    ShareStore,
  },
  user::{NewUser, Profile, User, UserId},
};

use crate::{
  Error, Result,
  encode::{
    AUDIT_COLUMNS, CONSENT_COLUMNS, CONSENT_VIEW_COLUMNS, CONTEXT_COLUMNS,
    NOTIFICATION_COLUMNS, PROFILE_COLUMNS, REDEMPTION_COLUMNS, RawAudit, RawConsent,
    RawConsentView, RawContext, RawNotification, RawRedemption, RawShareCode, RawUser,
    SHARE_CODE_COLUMNS, USER_COLUMNS, encode_dt, escape_like, profile_from_row,
  },
  schema::SCHEMA,
};

/// Attempts at drawing an unused code before giving up.
const MAX_CODE_ATTEMPTS: usize = 16;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Sharename store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Row helpers ─────────────────────────────────────────────────────────────
//
// These run inside `Connection::call` closures and accept any connection-like
// handle, so they compose inside transactions and savepoints.

fn fetch_user(conn: &Connection, id: i64) -> rusqlite::Result<Option<RawUser>> {
  conn
    .query_row(
      &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?1"),
      rusqlite::params![id],
      |row| RawUser::from_row(row, 0),
    )
    .optional()
}

fn fetch_context(conn: &Connection, id: i64) -> rusqlite::Result<Option<RawContext>> {
  conn
    .query_row(
      &format!("SELECT {CONTEXT_COLUMNS} FROM contexts c WHERE c.id = ?1"),
      rusqlite::params![id],
      |row| RawContext::from_row(row, 0),
    )
    .optional()
}

fn fetch_share_code(conn: &Connection, id: i64) -> rusqlite::Result<Option<RawShareCode>> {
  conn
    .query_row(
      &format!("SELECT {SHARE_CODE_COLUMNS} FROM share_codes s WHERE s.id = ?1"),
      rusqlite::params![id],
      RawShareCode::from_row,
    )
    .optional()
}

fn fetch_consent(conn: &Connection, id: i64) -> rusqlite::Result<Option<RawConsent>> {
  conn
    .query_row(
      &format!("SELECT {CONSENT_COLUMNS} FROM consent_requests r WHERE r.id = ?1"),
      rusqlite::params![id],
      RawConsent::from_row,
    )
    .optional()
}

fn fetch_notification(
  conn: &Connection,
  id: i64,
) -> rusqlite::Result<Option<RawNotification>> {
  conn
    .query_row(
      &format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications n WHERE n.id = ?1"),
      rusqlite::params![id],
      RawNotification::from_row,
    )
    .optional()
}

/// The context's most recently created code that is valid at `now`.
fn find_valid_code(
  conn: &Connection,
  context_id: i64,
  now: &str,
) -> rusqlite::Result<Option<RawShareCode>> {
  conn
    .query_row(
      &format!(
        "SELECT {SHARE_CODE_COLUMNS} FROM share_codes s
         WHERE s.context_id = ?1
           AND s.revoked = 0
           AND (s.expires_at IS NULL OR s.expires_at > ?2)
         ORDER BY s.id DESC
         LIMIT 1"
      ),
      rusqlite::params![context_id, now],
      RawShareCode::from_row,
    )
    .optional()
}

/// Insert a code with a freshly drawn value, redrawing on collision. Returns
/// `None` once [`MAX_CODE_ATTEMPTS`] draws have all collided.
fn insert_share_code(
  conn: &Connection,
  context_id: i64,
  expires_at: Option<&str>,
  now: &str,
) -> rusqlite::Result<Option<RawShareCode>> {
  for _ in 0..MAX_CODE_ATTEMPTS {
    let inserted = conn.execute(
      "INSERT INTO share_codes (context_id, code, created_at, expires_at)
       VALUES (?1, ?2, ?3, ?4)
       ON CONFLICT (code) DO NOTHING",
      rusqlite::params![context_id, generate_code(), now, expires_at],
    )?;
    if inserted == 1 {
      return fetch_share_code(conn, conn.last_insert_rowid());
    }
    tracing::debug!(context_id, "share code collision, redrawing");
  }
  Ok(None)
}

fn insert_audit(
  conn: &Connection,
  share_code_id: i64,
  requester: &str,
  ts: &str,
) -> rusqlite::Result<RawAudit> {
  conn.execute(
    "INSERT INTO audits (share_code_id, requester, ts) VALUES (?1, ?2, ?3)",
    rusqlite::params![share_code_id, requester, ts],
  )?;
  Ok(RawAudit {
    id:            conn.last_insert_rowid(),
    share_code_id,
    requester:     requester.to_owned(),
    ts:            ts.to_owned(),
    revoked:       false,
  })
}

fn insert_notification(
  conn: &Connection,
  input: &NewNotification,
  now: &str,
) -> rusqlite::Result<RawNotification> {
  conn.execute(
    "INSERT INTO notifications (user_id, kind, title, message, context_id, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    rusqlite::params![
      input.user_id.0,
      input.kind.as_ref(),
      input.title,
      input.message,
      input.context_id.map(|c| c.0),
      now,
    ],
  )?;
  Ok(RawNotification {
    id:         conn.last_insert_rowid(),
    user_id:    input.user_id.0,
    kind:       input.kind.as_ref().to_owned(),
    title:      input.title.clone(),
    message:    input.message.clone(),
    context_id: input.context_id.map(|c| c.0),
    read:       false,
    created_at: now.to_owned(),
  })
}

/// Which branch [`ShareStore::file_consent_request`] took.
enum Filed {
  Created,
  Renewed,
  AlreadyRequested,
}

// ─── ShareStore impl ─────────────────────────────────────────────────────────

impl ShareStore for SqliteStore {
  type Error = Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn create_user(&self, user: NewUser) -> Result<Option<User>> {
    let email = user.email.to_lowercase();
    let role = user.role.as_ref().to_owned();
    let hash = user.password_hash;
    let now = encode_dt(Utc::now());

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let inserted = tx.execute(
          "INSERT INTO users (email, password_hash, role, created_at)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (email) DO NOTHING",
          rusqlite::params![email, hash, role, now],
        )?;
        if inserted == 0 {
          return Ok(None);
        }
        let id = tx.last_insert_rowid();
        tx.execute(
          "INSERT INTO profiles (user_id) VALUES (?1)",
          rusqlite::params![id],
        )?;
        let raw = fetch_user(&tx, id)?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn get_user(&self, id: UserId) -> Result<Option<User>> {
    let raw = self.conn.call(move |conn| Ok(fetch_user(conn, id.0)?)).await?;
    raw.map(RawUser::into_user).transpose()
  }

  async fn find_user_by_email(&self, email: String) -> Result<Option<User>> {
    let email = email.to_lowercase();

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.email = ?1"),
              rusqlite::params![email],
              |row| RawUser::from_row(row, 0),
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn get_profile(&self, user: UserId) -> Result<Option<Profile>> {
    let profile = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {PROFILE_COLUMNS} FROM profiles p WHERE p.user_id = ?1"),
              rusqlite::params![user.0],
              |row| profile_from_row(row, 0),
            )
            .optional()?,
        )
      })
      .await?;
    Ok(profile)
  }

  async fn save_profile(&self, user: UserId, profile: Profile) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO profiles (
             user_id, first_name, last_name, phone, country, bio,
             company_name, company_phone, company_country, company_website,
             company_founded, company_description, is_public_profile
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
           ON CONFLICT (user_id) DO UPDATE SET
             first_name          = excluded.first_name,
             last_name           = excluded.last_name,
             phone               = excluded.phone,
             country             = excluded.country,
             bio                 = excluded.bio,
             company_name        = excluded.company_name,
             company_phone       = excluded.company_phone,
             company_country     = excluded.company_country,
             company_website     = excluded.company_website,
             company_founded     = excluded.company_founded,
             company_description = excluded.company_description,
             is_public_profile   = excluded.is_public_profile",
          rusqlite::params![
            user.0,
            profile.first_name,
            profile.last_name,
            profile.phone,
            profile.country,
            profile.bio,
            profile.company_name,
            profile.company_phone,
            profile.company_country,
            profile.company_website,
            profile.company_founded,
            profile.company_description,
            profile.is_public_profile,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn search_public_profiles(&self, query: String) -> Result<Vec<(User, Profile)>> {
    let pattern = escape_like(&query);

    let rows: Vec<(RawUser, Profile)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {USER_COLUMNS}, {PROFILE_COLUMNS}
           FROM profiles p
           JOIN users u ON u.id = p.user_id
           WHERE p.is_public_profile = 1
             AND (p.first_name   LIKE '%' || ?1 || '%' ESCAPE '\\'
               OR p.last_name    LIKE '%' || ?1 || '%' ESCAPE '\\'
               OR p.company_name LIKE '%' || ?1 || '%' ESCAPE '\\'
               OR u.email        LIKE ?1 || '%' ESCAPE '\\')
           ORDER BY u.id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![pattern], |row| {
            Ok((RawUser::from_row(row, 0)?, profile_from_row(row, 5)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows
      .into_iter()
      .map(|(user, profile)| Ok((user.into_user()?, profile)))
      .collect()
  }

  // ── Contexts ──────────────────────────────────────────────────────────────

  async fn create_context(&self, input: NewContext) -> Result<Context> {
    let visibility = input.visibility.as_ref().to_owned();
    let now = encode_dt(Utc::now());

    let raw: RawContext = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO contexts (
             owner_id, label, visibility, given, family, created_at,
             notify_on_redeem, auto_archive_expired
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            input.owner_id.0,
            input.label,
            visibility,
            input.given,
            input.family,
            now,
            input.notify_on_redeem,
            input.auto_archive_expired,
          ],
        )?;
        let id = conn.last_insert_rowid();
        Ok(fetch_context(conn, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?)
      })
      .await?;

    raw.into_context()
  }

  async fn get_context(&self, id: ContextId) -> Result<Option<Context>> {
    let raw = self.conn.call(move |conn| Ok(fetch_context(conn, id.0)?)).await?;
    raw.map(RawContext::into_context).transpose()
  }

  async fn list_contexts(&self, owner: UserId, archived: bool) -> Result<Vec<Context>> {
    let order = if archived {
      "c.archived_at DESC, c.id DESC"
    } else {
      "c.created_at DESC, c.id DESC"
    };

    let raws: Vec<RawContext> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CONTEXT_COLUMNS} FROM contexts c
           WHERE c.owner_id = ?1 AND c.archived = ?2
           ORDER BY {order}"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![owner.0, archived], |row| {
            RawContext::from_row(row, 0)
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawContext::into_context).collect()
  }

  async fn update_context(&self, context: Context) -> Result<bool> {
    let visibility = context.visibility.as_ref().to_owned();

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE contexts SET
             label = ?2, visibility = ?3, given = ?4, family = ?5,
             notify_on_redeem = ?6, auto_archive_expired = ?7
           WHERE id = ?1",
          rusqlite::params![
            context.id.0,
            context.label,
            visibility,
            context.given,
            context.family,
            context.notify_on_redeem,
            context.auto_archive_expired,
          ],
        )?)
      })
      .await?;
    Ok(changed > 0)
  }

  async fn delete_context(&self, id: ContextId) -> Result<bool> {
    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM contexts WHERE id = ?1", rusqlite::params![id.0])?)
      })
      .await?;
    Ok(deleted > 0)
  }

  async fn archive_expired_context(&self, id: ContextId, at: DateTime<Utc>) -> Result<bool> {
    let at = encode_dt(at);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE contexts
           SET archived = 1, archived_at = ?2, expiration_processed = 1
           WHERE id = ?1 AND expiration_processed = 0",
          rusqlite::params![id.0, at],
        )?)
      })
      .await?;
    Ok(changed > 0)
  }

  async fn list_expired_contexts(
    &self,
    owner: Option<UserId>,
    now: DateTime<Utc>,
  ) -> Result<Vec<Context>> {
    let owner = owner.map(|o| o.0);
    let now = encode_dt(now);

    let raws: Vec<RawContext> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CONTEXT_COLUMNS} FROM contexts c
           WHERE c.archived = 0
             AND c.expiration_processed = 0
             AND (?1 IS NULL OR c.owner_id = ?1)
             AND EXISTS (
               SELECT 1 FROM share_codes s
               WHERE s.context_id = c.id
                 AND s.expires_at IS NOT NULL
                 AND s.expires_at < ?2
             )
           ORDER BY c.id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![owner, now], |row| RawContext::from_row(row, 0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawContext::into_context).collect()
  }

  // ── Share codes ───────────────────────────────────────────────────────────

  async fn create_share_code(
    &self,
    context: ContextId,
    expires_at: Option<DateTime<Utc>>,
  ) -> Result<ShareCode> {
    let expires_at = expires_at.map(encode_dt);
    let now = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        Ok(insert_share_code(conn, context.0, expires_at.as_deref(), &now)?)
      })
      .await?;

    raw
      .ok_or(Error::CodeSpaceExhausted(MAX_CODE_ATTEMPTS))?
      .into_share_code()
  }

  async fn get_or_create_share_code(
    &self,
    context: ContextId,
    expires_at: Option<DateTime<Utc>>,
  ) -> Result<ShareCode> {
    let expires_at = expires_at.map(encode_dt);
    let now = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let raw = match find_valid_code(&tx, context.0, &now)? {
          Some(existing) => Some(existing),
          None => insert_share_code(&tx, context.0, expires_at.as_deref(), &now)?,
        };
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw
      .ok_or(Error::CodeSpaceExhausted(MAX_CODE_ATTEMPTS))?
      .into_share_code()
  }

  async fn find_share_code(&self, code: String) -> Result<Option<ShareCode>> {
    let raw: Option<RawShareCode> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {SHARE_CODE_COLUMNS} FROM share_codes s WHERE s.code = ?1"),
              rusqlite::params![code],
              RawShareCode::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawShareCode::into_share_code).transpose()
  }

  async fn get_share_code(&self, id: ShareCodeId) -> Result<Option<ShareCode>> {
    let raw = self.conn.call(move |conn| Ok(fetch_share_code(conn, id.0)?)).await?;
    raw.map(RawShareCode::into_share_code).transpose()
  }

  async fn list_share_codes(
    &self,
    context: ContextId,
    include_revoked: bool,
  ) -> Result<Vec<ShareCode>> {
    let raws: Vec<RawShareCode> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SHARE_CODE_COLUMNS} FROM share_codes s
           WHERE s.context_id = ?1 AND (?2 OR s.revoked = 0)
           ORDER BY s.created_at DESC, s.id DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![context.0, include_revoked], RawShareCode::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawShareCode::into_share_code).collect()
  }

  async fn set_share_code_expiry(
    &self,
    id: ShareCodeId,
    expires_at: Option<DateTime<Utc>>,
  ) -> Result<Option<ShareCode>> {
    let expires_at = expires_at.map(encode_dt);

    let raw = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE share_codes SET expires_at = ?2 WHERE id = ?1",
          rusqlite::params![id.0, expires_at],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        Ok(fetch_share_code(conn, id.0)?)
      })
      .await?;

    raw.map(RawShareCode::into_share_code).transpose()
  }

  async fn revoke_share_code(&self, id: ShareCodeId) -> Result<Option<ShareCode>> {
    let raw = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE share_codes SET revoked = 1 WHERE id = ?1",
          rusqlite::params![id.0],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        Ok(fetch_share_code(conn, id.0)?)
      })
      .await?;

    raw.map(RawShareCode::into_share_code).transpose()
  }

  // ── Audits ────────────────────────────────────────────────────────────────

  async fn record_redemption(
    &self,
    share_code: ShareCodeId,
    requester: String,
    notification: Option<NewNotification>,
  ) -> Result<RecordedRedemption> {
    let now = encode_dt(Utc::now());

    let (audit, notification): (RawAudit, Option<RawNotification>) = self
      .conn
      .call(move |conn| {
        let mut tx = conn.transaction()?;
        let audit = insert_audit(&tx, share_code.0, &requester, &now)?;

        let notified = match notification {
          Some(input) => {
            // A savepoint confines a failed insert; the audit stays.
            let sp = tx.savepoint()?;
            match insert_notification(&sp, &input, &now) {
              Ok(raw) => {
                sp.commit()?;
                Some(raw)
              }
              Err(e) => {
                tracing::warn!(
                  share_code_id = share_code.0,
                  user_id = input.user_id.0,
                  error = %e,
                  "redemption notification could not be stored"
                );
                None
              }
            }
          }
          None => None,
        };

        tx.commit()?;
        Ok((audit, notified))
      })
      .await?;

    Ok(RecordedRedemption {
      audit:        audit.into_audit()?,
      notification: notification.map(RawNotification::into_notification).transpose()?,
    })
  }

  async fn revoke_access(&self, audit: AuditId, owner: UserId) -> Result<Option<RevokedAccess>> {
    let now = encode_dt(Utc::now());

    let raw: Option<(RawAudit, RawContext, usize)> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let found = tx
          .query_row(
            &format!(
              "SELECT {AUDIT_COLUMNS}, {CONTEXT_COLUMNS}
               FROM audits a
               JOIN share_codes s ON s.id = a.share_code_id
               JOIN contexts    c ON c.id = s.context_id
               WHERE a.id = ?1 AND c.owner_id = ?2"
            ),
            rusqlite::params![audit.0, owner.0],
            |row| Ok((RawAudit::from_row(row)?, RawContext::from_row(row, 5)?)),
          )
          .optional()?;
        let Some((mut raw_audit, raw_context)) = found else {
          return Ok(None);
        };

        tx.execute(
          "UPDATE audits SET revoked = 1 WHERE id = ?1",
          rusqlite::params![raw_audit.id],
        )?;
        raw_audit.revoked = true;

        let open: Vec<i64> = {
          let mut stmt = tx.prepare(
            "SELECT r.id, r.status FROM consent_requests r
             JOIN users u ON u.id = r.requester_id
             WHERE r.context_id = ?1 AND u.email = ?2",
          )?;
          stmt
            .query_map(rusqlite::params![raw_context.id, raw_audit.requester], |row| {
              Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?
            .filter_map(|row| match row {
              Ok((id, status)) => ConsentStatus::from_str(&status)
                .is_ok_and(ConsentStatus::is_revocable)
                .then_some(Ok(id)),
              Err(e) => Some(Err(e)),
            })
            .collect::<rusqlite::Result<_>>()?
        };

        let denied = ConsentStatus::Denied.as_ref().to_owned();
        let mut consents_revoked = 0;
        for id in open {
          consents_revoked += tx.execute(
            "UPDATE consent_requests SET status = ?2, updated_at = ?3 WHERE id = ?1",
            rusqlite::params![id, denied, now],
          )?;
        }

        tx.commit()?;
        Ok(Some((raw_audit, raw_context, consents_revoked)))
      })
      .await?;

    let Some((audit, context, consents_revoked)) = raw else {
      return Ok(None);
    };
    Ok(Some(RevokedAccess {
      audit: audit.into_audit()?,
      context: context.into_context()?,
      consents_revoked,
    }))
  }

  async fn list_audits(&self, context: ContextId) -> Result<Vec<Audit>> {
    let raws: Vec<RawAudit> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {AUDIT_COLUMNS} FROM audits a
           JOIN share_codes s ON s.id = a.share_code_id
           WHERE s.context_id = ?1
           ORDER BY a.ts, a.id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![context.0], RawAudit::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAudit::into_audit).collect()
  }

  async fn list_owner_redemptions(
    &self,
    owner: UserId,
    filter: RedemptionFilter,
  ) -> Result<Vec<Redemption>> {
    self.list_redemptions("c.owner_id = ?1", owner.0.into(), filter).await
  }

  async fn list_requester_redemptions(
    &self,
    requester: String,
    filter: RedemptionFilter,
  ) -> Result<Vec<Redemption>> {
    self.list_redemptions("a.requester = ?1", requester.into(), filter).await
  }

  async fn list_redeemers(&self, context: ContextId) -> Result<Vec<User>> {
    let raws: Vec<RawUser> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {USER_COLUMNS} FROM users u
           WHERE u.email IN (
             SELECT a.requester FROM audits a
             JOIN share_codes s ON s.id = a.share_code_id
             WHERE s.context_id = ?1
           )
           ORDER BY u.id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![context.0], |row| RawUser::from_row(row, 0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawUser::into_user).collect()
  }

  // ── Consent ───────────────────────────────────────────────────────────────

  async fn file_consent_request(
    &self,
    context: ContextId,
    requester: UserId,
    message: String,
  ) -> Result<ConsentFiling> {
    let now = encode_dt(Utc::now());

    let (filed, raw): (Filed, RawConsent) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let existing = tx
          .query_row(
            &format!(
              "SELECT {CONSENT_COLUMNS} FROM consent_requests r
               WHERE r.context_id = ?1 AND r.requester_id = ?2"
            ),
            rusqlite::params![context.0, requester.0],
            RawConsent::from_row,
          )
          .optional()?;

        let (filed, id) = match existing {
          None => {
            tx.execute(
              "INSERT INTO consent_requests
                 (context_id, requester_id, status, message, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
              rusqlite::params![
                context.0,
                requester.0,
                ConsentStatus::Pending.as_ref(),
                message,
                now,
              ],
            )?;
            (Filed::Created, tx.last_insert_rowid())
          }
          Some(raw) => match ConsentStatus::from_str(&raw.status).ok().and_then(ConsentStatus::renew) {
            Some(renewed) => {
              tx.execute(
                "UPDATE consent_requests SET status = ?2, message = ?3, updated_at = ?4
                 WHERE id = ?1",
                rusqlite::params![raw.id, renewed.as_ref(), message, now],
              )?;
              (Filed::Renewed, raw.id)
            }
            None => (Filed::AlreadyRequested, raw.id),
          },
        };

        let raw = fetch_consent(&tx, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        tx.commit()?;
        Ok((filed, raw))
      })
      .await?;

    let request = raw.into_request()?;

    Ok(match filed {
      Filed::Created => ConsentFiling::Created(request),
      Filed::Renewed => ConsentFiling::Renewed(request),
      Filed::AlreadyRequested => ConsentFiling::AlreadyRequested(request),
    })
  }

  async fn get_consent_request(&self, id: ConsentRequestId) -> Result<Option<ConsentRequest>> {
    let raw = self.conn.call(move |conn| Ok(fetch_consent(conn, id.0)?)).await?;
    raw.map(RawConsent::into_request).transpose()
  }

  async fn find_consent_request(
    &self,
    context: ContextId,
    requester: UserId,
  ) -> Result<Option<ConsentRequest>> {
    let raw: Option<RawConsent> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {CONSENT_COLUMNS} FROM consent_requests r
                 WHERE r.context_id = ?1 AND r.requester_id = ?2"
              ),
              rusqlite::params![context.0, requester.0],
              RawConsent::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawConsent::into_request).transpose()
  }

  async fn approve_consent_request(
    &self,
    id: ConsentRequestId,
  ) -> Result<Option<ConsentApproval>> {
    let now = encode_dt(Utc::now());

    let raw: Option<(RawConsent, String, Option<RawShareCode>, Option<RawAudit>)> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let changed = tx.execute(
          "UPDATE consent_requests SET status = ?2, updated_at = ?3
           WHERE id = ?1 AND status = ?4",
          rusqlite::params![
            id.0,
            ConsentStatus::Approved.as_ref(),
            now,
            ConsentStatus::Pending.as_ref(),
          ],
        )?;
        if changed == 0 {
          return Ok(None);
        }

        let Some(request) = fetch_consent(&tx, id.0)? else {
          return Ok(None);
        };
        let email: String = tx.query_row(
          "SELECT email FROM users WHERE id = ?1",
          rusqlite::params![request.requester_id],
          |row| row.get(0),
        )?;

        let code = match find_valid_code(&tx, request.context_id, &now)? {
          Some(existing) => Some(existing),
          None => insert_share_code(&tx, request.context_id, None, &now)?,
        };
        // Without a code nothing is committed; the caller sees the exhaustion.
        let Some(code) = code else {
          return Ok(Some((request, email, None, None)));
        };
        let audit = insert_audit(&tx, code.id, &email, &now)?;

        tx.commit()?;
        Ok(Some((request, email, Some(code), Some(audit))))
      })
      .await?;

    let Some((request, requester_email, code, audit)) = raw else {
      return Ok(None);
    };
    let (Some(code), Some(audit)) = (code, audit) else {
      return Err(Error::CodeSpaceExhausted(MAX_CODE_ATTEMPTS));
    };

    Ok(Some(ConsentApproval {
      request: request.into_request()?,
      requester_email,
      share_code: code.into_share_code()?,
      audit: audit.into_audit()?,
    }))
  }

  async fn deny_consent_request(&self, id: ConsentRequestId) -> Result<Option<ConsentRequest>> {
    let now = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE consent_requests SET status = ?2, updated_at = ?3
           WHERE id = ?1 AND status = ?4",
          rusqlite::params![
            id.0,
            ConsentStatus::Denied.as_ref(),
            now,
            ConsentStatus::Pending.as_ref(),
          ],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        Ok(fetch_consent(conn, id.0)?)
      })
      .await?;

    raw.map(RawConsent::into_request).transpose()
  }

  async fn list_owner_consent_requests(&self, owner: UserId) -> Result<Vec<ConsentRequestView>> {
    self.list_consent_views("c.owner_id = ?1", owner.0, None).await
  }

  async fn list_requester_consent_requests(
    &self,
    requester: UserId,
    status: Option<ConsentStatus>,
  ) -> Result<Vec<ConsentRequestView>> {
    self.list_consent_views("r.requester_id = ?1", requester.0, status).await
  }

  // ── Notifications ─────────────────────────────────────────────────────────

  async fn create_notification(&self, input: NewNotification) -> Result<Notification> {
    let now = encode_dt(Utc::now());
    let raw = self
      .conn
      .call(move |conn| Ok(insert_notification(conn, &input, &now)?))
      .await?;
    raw.into_notification()
  }

  async fn list_notifications(&self, user: UserId) -> Result<Vec<Notification>> {
    let raws: Vec<RawNotification> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {NOTIFICATION_COLUMNS} FROM notifications n
           WHERE n.user_id = ?1
           ORDER BY n.created_at DESC, n.id DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![user.0], RawNotification::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawNotification::into_notification).collect()
  }

  async fn set_notification_read(
    &self,
    id: NotificationId,
    user: UserId,
    read: bool,
  ) -> Result<Option<Notification>> {
    let raw = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE notifications SET read = ?3 WHERE id = ?1 AND user_id = ?2",
          rusqlite::params![id.0, user.0, read],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        Ok(fetch_notification(conn, id.0)?)
      })
      .await?;

    raw.map(RawNotification::into_notification).transpose()
  }
}

// ─── Shared listings ─────────────────────────────────────────────────────────

impl SqliteStore {
  /// Redemptions matching `scope` (a predicate over `?1`), newest first.
  /// Audits of revoked codes are always excluded.
  async fn list_redemptions(
    &self,
    scope: &'static str,
    key: rusqlite::types::Value,
    filter: RedemptionFilter,
  ) -> Result<Vec<Redemption>> {
    let raws: Vec<RawRedemption> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {REDEMPTION_COLUMNS}
           FROM audits a
           JOIN share_codes s ON s.id = a.share_code_id
           JOIN contexts    c ON c.id = s.context_id
           WHERE {scope}
             AND s.revoked = 0
             AND (?2 OR a.revoked = 0)
             AND (?3 OR c.archived = 0)
           ORDER BY a.ts DESC, a.id DESC"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![key, filter.include_revoked, filter.include_archived],
            RawRedemption::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRedemption::into_redemption).collect()
  }

  /// Consent requests matching `scope` (a predicate over `?1`), newest first.
  async fn list_consent_views(
    &self,
    scope: &'static str,
    key: i64,
    status: Option<ConsentStatus>,
  ) -> Result<Vec<ConsentRequestView>> {
    let status = status.map(|s| s.as_ref().to_owned());

    let raws: Vec<RawConsentView> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CONSENT_VIEW_COLUMNS}
           FROM consent_requests r
           JOIN contexts c     ON c.id     = r.context_id
           JOIN users    owner ON owner.id = c.owner_id
           JOIN users    req   ON req.id   = r.requester_id
           WHERE {scope}
             AND (?2 IS NULL OR r.status = ?2)
           ORDER BY r.created_at DESC, r.id DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![key, status], RawConsentView::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawConsentView::into_view).collect()
  }
}
