//! Storage traits consumed by the engine.
//!
//! The traits are implemented by storage backends (e.g.
//! `anchor-store-sqlite`). The verification and canonicalization layers take
//! a store as an explicit dependency rather than reaching for an ambient
//! handle.
//!
//! The backing store is assumed to be a key-value store with eventual
//! consistency and no cross-operation transactions. Concurrent writers of the
//! same key resolve as last-write-wins.

use std::{future::Future, time::Duration};

use uuid::Uuid;

use crate::{
  claim::{Claim, ClaimId},
  profile::IdentityRecord,
};

// ─── Key-value cache ─────────────────────────────────────────────────────────

/// A shared, TTL-bounded key-value store.
///
/// Callers treat it as an optimization only: any error from these methods is
/// expected to degrade to "no cached value", never to a failed operation.
pub trait KvStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Fetch a live value. Expired entries read as `None`.
  fn get<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + 'a;

  /// Store `value` under `key` for `ttl`, replacing any previous value.
  fn put<'a>(
    &'a self,
    key: &'a str,
    value: String,
    ttl: Duration,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn delete<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

// ─── Claims ──────────────────────────────────────────────────────────────────

/// Per-subject claim lists. Each subject owns an append/replace list keyed by
/// claim id; deletion removes the claim outright.
pub trait ClaimStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// All claims owned by `subject_id`, ordered by claim id.
  fn list_claims(
    &self,
    subject_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Claim>, Self::Error>> + Send + '_;

  fn get_claim<'a>(
    &'a self,
    subject_id: Uuid,
    claim_id: &'a ClaimId,
  ) -> impl Future<Output = Result<Option<Claim>, Self::Error>> + Send + 'a;

  /// Insert `claim`, replacing any stored claim with the same id.
  fn upsert_claim<'a>(
    &'a self,
    subject_id: Uuid,
    claim: &'a Claim,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Remove a claim. Returns `false` if it did not exist.
  fn delete_claim<'a>(
    &'a self,
    subject_id: Uuid,
    claim_id: &'a ClaimId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;
}

// ─── Identity records ────────────────────────────────────────────────────────

/// One identity record per subject. Records are never deleted.
pub trait ProfileStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn get_profile(
    &self,
    subject_id: Uuid,
  ) -> impl Future<Output = Result<Option<IdentityRecord>, Self::Error>> + Send + '_;

  fn put_profile<'a>(
    &'a self,
    subject_id: Uuid,
    record: &'a IdentityRecord,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
