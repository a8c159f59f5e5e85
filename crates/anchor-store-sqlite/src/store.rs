//! [`SqliteStore`], the SQLite implementation of the Anchor store traits.

use std::{path::Path, time::Duration};

use anchor_core::{
  claim::{Claim, ClaimId},
  profile::IdentityRecord,
  store::{ClaimStore, KvStore, ProfileStore},
};
use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use crate::{
  Result,
  encode::{
    decode_claim, decode_record, encode_claim, encode_dt, encode_record,
    encode_uuid, expiry_millis,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// Claims, identity records and the shared cache in a single SQLite file.
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

  /// Open an in-memory store, useful for testing.
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

// ─── KvStore impl ────────────────────────────────────────────────────────────

impl KvStore for SqliteStore {
  type Error = crate::Error;

  async fn get(&self, key: &str) -> Result<Option<String>> {
    let key = key.to_owned();
    let now = Utc::now().timestamp_millis();

    let value = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT value FROM kv WHERE key = ?1 AND expires_at > ?2",
              rusqlite::params![key, now],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;
    Ok(value)
  }

  async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
    let key = key.to_owned();
    let now = Utc::now();
    let now_ms = now.timestamp_millis();
    let expires_at = expiry_millis(now, ttl);

    self
      .conn
      .call(move |conn| {
        conn.execute("DELETE FROM kv WHERE expires_at <= ?1", rusqlite::params![
          now_ms
        ])?;
        conn.execute(
          "INSERT INTO kv (key, value, expires_at) VALUES (?1, ?2, ?3)
           ON CONFLICT(key) DO UPDATE SET
             value      = excluded.value,
             expires_at = excluded.expires_at",
          rusqlite::params![key, value, expires_at],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn delete(&self, key: &str) -> Result<()> {
    let key = key.to_owned();
    self
      .conn
      .call(move |conn| {
        conn.execute("DELETE FROM kv WHERE key = ?1", rusqlite::params![key])?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── ClaimStore impl ─────────────────────────────────────────────────────────

impl ClaimStore for SqliteStore {
  type Error = crate::Error;

  async fn list_claims(&self, subject_id: Uuid) -> Result<Vec<Claim>> {
    let subject_id_str = encode_uuid(subject_id);

    let raws: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT claim_json FROM claims
           WHERE subject_id = ?1
           ORDER BY claim_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![subject_id_str], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;

    raws.iter().map(|raw| decode_claim(raw)).collect()
  }

  async fn get_claim(
    &self,
    subject_id: Uuid,
    claim_id: &ClaimId,
  ) -> Result<Option<Claim>> {
    let subject_id_str = encode_uuid(subject_id);
    let claim_id_str = claim_id.to_string();

    let raw: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT claim_json FROM claims
               WHERE subject_id = ?1 AND claim_id = ?2",
              rusqlite::params![subject_id_str, claim_id_str],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    raw.as_deref().map(decode_claim).transpose()
  }

  async fn upsert_claim(&self, subject_id: Uuid, claim: &Claim) -> Result<()> {
    let subject_id_str = encode_uuid(subject_id);
    let claim_id_str   = claim.id.to_string();
    let claim_json     = encode_claim(claim)?;
    let updated_at_str = encode_dt(claim.updated_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO claims (subject_id, claim_id, claim_json, updated_at)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT(subject_id, claim_id) DO UPDATE SET
             claim_json = excluded.claim_json,
             updated_at = excluded.updated_at",
          rusqlite::params![
            subject_id_str,
            claim_id_str,
            claim_json,
            updated_at_str
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn delete_claim(
    &self,
    subject_id: Uuid,
    claim_id: &ClaimId,
  ) -> Result<bool> {
    let subject_id_str = encode_uuid(subject_id);
    let claim_id_str = claim_id.to_string();

    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM claims WHERE subject_id = ?1 AND claim_id = ?2",
          rusqlite::params![subject_id_str, claim_id_str],
        )?)
      })
      .await?;
    Ok(removed > 0)
  }
}

// ─── ProfileStore impl ───────────────────────────────────────────────────────

impl ProfileStore for SqliteStore {
  type Error = crate::Error;

  async fn get_profile(&self, subject_id: Uuid) -> Result<Option<IdentityRecord>> {
    let subject_id_str = encode_uuid(subject_id);

    let raw: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT record_json FROM profiles WHERE subject_id = ?1",
              rusqlite::params![subject_id_str],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    raw.as_deref().map(decode_record).transpose()
  }

  async fn put_profile(
    &self,
    subject_id: Uuid,
    record: &IdentityRecord,
  ) -> Result<()> {
    let subject_id_str    = encode_uuid(subject_id);
    let record_json       = encode_record(record)?;
    let date_modified_str = encode_dt(record.date_modified);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO profiles (subject_id, record_json, date_modified)
           VALUES (?1, ?2, ?3)
           ON CONFLICT(subject_id) DO UPDATE SET
             record_json   = excluded.record_json,
             date_modified = excluded.date_modified",
          rusqlite::params![subject_id_str, record_json, date_modified_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
