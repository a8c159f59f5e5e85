//! Conversions between domain types and SQLite column values.
//!
//! UUIDs are stored hyphenated and lowercased, timestamps as RFC 3339, and
//! whole claims and records as compact JSON in their published shape.

use std::time::Duration;

use anchor_core::{claim::Claim, profile::IdentityRecord};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::Result;

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

/// Absolute expiry in unix milliseconds for an entry written at `now`.
pub fn expiry_millis(now: DateTime<Utc>, ttl: Duration) -> i64 {
  let ttl = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
  now.timestamp_millis().saturating_add(ttl)
}

pub fn encode_claim(claim: &Claim) -> Result<String> {
  Ok(serde_json::to_string(claim)?)
}

pub fn decode_claim(s: &str) -> Result<Claim> { Ok(serde_json::from_str(s)?) }

pub fn encode_record(record: &IdentityRecord) -> Result<String> {
  Ok(serde_json::to_string(record)?)
}

pub fn decode_record(s: &str) -> Result<IdentityRecord> {
  Ok(serde_json::from_str(s)?)
}
