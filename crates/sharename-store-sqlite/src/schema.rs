//! SQL schema for the Sharename SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// Timestamps are fixed-width RFC 3339 strings (see `encode::encode_dt`), so
/// string comparison in SQL orders them chronologically.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    email         TEXT NOT NULL UNIQUE,   -- always lower-cased
    password_hash TEXT NOT NULL,          -- argon2 PHC string
    role          TEXT NOT NULL,          -- 'individual' | 'company'
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS profiles (
    user_id             INTEGER PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
    first_name          TEXT NOT NULL DEFAULT '',
    last_name           TEXT NOT NULL DEFAULT '',
    phone               TEXT NOT NULL DEFAULT '',
    country             TEXT NOT NULL DEFAULT '',
    bio                 TEXT NOT NULL DEFAULT '',
    company_name        TEXT NOT NULL DEFAULT '',
    company_phone       TEXT NOT NULL DEFAULT '',
    company_country     TEXT NOT NULL DEFAULT '',
    company_website     TEXT NOT NULL DEFAULT '',
    company_founded     INTEGER,
    company_description TEXT NOT NULL DEFAULT '',
    is_public_profile   INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS contexts (
    id                   INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id             INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    label                TEXT NOT NULL,
    visibility           TEXT NOT NULL,   -- 'public' | 'code' | 'consent'
    given                TEXT NOT NULL,
    family               TEXT NOT NULL DEFAULT '',
    created_at           TEXT NOT NULL,
    notify_on_redeem     INTEGER NOT NULL DEFAULT 1,
    auto_archive_expired INTEGER NOT NULL DEFAULT 0,
    archived             INTEGER NOT NULL DEFAULT 0,
    archived_at          TEXT,
    expiration_processed INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS share_codes (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    context_id INTEGER NOT NULL REFERENCES contexts(id) ON DELETE CASCADE,
    code       TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    expires_at TEXT,
    revoked    INTEGER NOT NULL DEFAULT 0
);

-- Audits are append-only. The only UPDATE ever issued flips `revoked`.
CREATE TABLE IF NOT EXISTS audits (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    share_code_id INTEGER NOT NULL REFERENCES share_codes(id) ON DELETE CASCADE,
    requester     TEXT NOT NULL,
    ts            TEXT NOT NULL,
    revoked       INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS consent_requests (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    context_id   INTEGER NOT NULL REFERENCES contexts(id) ON DELETE CASCADE,
    requester_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    status       TEXT NOT NULL DEFAULT 'pending',  -- 'pending' | 'approved' | 'denied'
    message      TEXT NOT NULL DEFAULT '',
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL,
    UNIQUE (context_id, requester_id)
);

CREATE TABLE IF NOT EXISTS notifications (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id    INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    kind       TEXT NOT NULL,
    title      TEXT NOT NULL,
    message    TEXT NOT NULL,
    context_id INTEGER REFERENCES contexts(id) ON DELETE CASCADE,
    read       INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS contexts_owner_idx       ON contexts(owner_id);
CREATE INDEX IF NOT EXISTS share_codes_context_idx  ON share_codes(context_id);
CREATE INDEX IF NOT EXISTS share_codes_expires_idx  ON share_codes(expires_at);
CREATE INDEX IF NOT EXISTS audits_share_code_idx    ON audits(share_code_id);
CREATE INDEX IF NOT EXISTS audits_requester_idx     ON audits(requester);
CREATE INDEX IF NOT EXISTS notifications_user_idx   ON notifications(user_id, created_at);

PRAGMA user_version = 1;
";
