//! SQL schema for the Anchor SQLite store.
//!
//! Executed once at connection startup. `PRAGMA user_version` records the
//! schema revision for later migrations.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- Shared cache. Rows past expires_at are dead and are purged lazily.
CREATE TABLE IF NOT EXISTS kv (
    key         TEXT PRIMARY KEY,
    value       TEXT NOT NULL,
    expires_at  INTEGER NOT NULL    -- unix milliseconds
);

CREATE TABLE IF NOT EXISTS claims (
    subject_id  TEXT NOT NULL,
    claim_id    TEXT NOT NULL,      -- '{type}:{key}'
    claim_json  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,      -- ISO 8601 UTC
    PRIMARY KEY (subject_id, claim_id)
);

CREATE TABLE IF NOT EXISTS profiles (
    subject_id     TEXT PRIMARY KEY,
    record_json    TEXT NOT NULL,
    date_modified  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS kv_expires_idx ON kv(expires_at);

PRAGMA user_version = 1;
";
