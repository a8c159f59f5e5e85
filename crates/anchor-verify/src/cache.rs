//! TTL-aware cache in front of a [`TxtSource`].
//!
//! Results are keyed by lowercased query name. Successes are cached for the
//! smallest observed DNS TTL, capped at 15 minutes (15 minutes when no TTL was
//! reported). Failures are cached for 2 minutes so a subject who fixes a
//! misconfigured record is not stuck behind a stale negative answer.
//!
//! The cache is an optimization only. A read fault degrades to a fresh query
//! and a write fault is logged and dropped; neither fails the lookup.

use std::{future::Future, time::Duration};

use anchor_core::{reason::FailReason, store::KvStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::doh::{DnsFailure, TxtAnswer, TxtResult, TxtSource};

/// Upper bound for caching a successful answer.
pub const SUCCESS_TTL_CAP: Duration = Duration::from_secs(15 * 60);

/// How long a failed lookup is remembered.
pub const FAILURE_TTL: Duration = Duration::from_secs(2 * 60);

const KEY_PREFIX: &str = "dns_txt:";

/// The cache key for a query name.
pub fn cache_key(qname: &str) -> String {
  format!("{KEY_PREFIX}{}", qname.trim().to_ascii_lowercase())
}

/// How long `result` may be served from cache.
pub fn cache_ttl(result: &TxtResult) -> Duration {
  match result {
    Ok(answer) => answer
      .min_ttl
      .map(|ttl| Duration::from_secs(u64::from(ttl)).min(SUCCESS_TTL_CAP))
      .unwrap_or(SUCCESS_TTL_CAP),
    Err(_) => FAILURE_TTL,
  }
}

// ─── Entry ───────────────────────────────────────────────────────────────────

/// The JSON document stored per query name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsCacheEntry {
  pub qname:      String,
  pub ok:         bool,
  #[serde(default)]
  pub txt_values: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error:      Option<FailReason>,
  pub cached_at:  DateTime<Utc>,
  pub expires_at: DateTime<Utc>,
}

impl DnsCacheEntry {
  pub fn new(
    qname: &str,
    result: &TxtResult,
    ttl: Duration,
    now: DateTime<Utc>,
  ) -> Self {
    let expires_at = now
      + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero());
    let (ok, txt_values, error) = match result {
      Ok(answer) => (true, answer.values.clone(), None),
      Err(failure) => (false, Vec::new(), Some(failure.reason.clone())),
    };
    Self {
      qname: qname.to_owned(),
      ok,
      txt_values,
      error,
      cached_at: now,
      expires_at,
    }
  }

  pub fn is_live(&self, now: DateTime<Utc>) -> bool { now < self.expires_at }

  /// Rebuild the lookup result. A cached failure is never transient: it has
  /// already had its retry.
  pub fn into_result(self) -> TxtResult {
    if self.ok {
      Ok(TxtAnswer {
        values:  self.txt_values,
        min_ttl: None,
      })
    } else {
      Err(DnsFailure::permanent(
        self.error.unwrap_or(FailReason::DnsQueryFailed),
      ))
    }
  }
}

// ─── Resolver ────────────────────────────────────────────────────────────────

/// A TXT lookup that may be served from cache.
pub trait TxtResolver: Send + Sync {
  fn lookup_txt<'a>(
    &'a self,
    qname: &'a str,
    bypass_cache: bool,
  ) -> impl Future<Output = TxtResult> + Send + 'a;
}

/// A [`TxtSource`] behind a [`KvStore`] cache.
#[derive(Debug, Clone)]
pub struct CachedResolver<S, K> {
  source: S,
  kv:     K,
}

impl<S, K> CachedResolver<S, K>
where
  S: TxtSource,
  K: KvStore,
{
  pub fn new(source: S, kv: K) -> Self { Self { source, kv } }

  async fn read(&self, key: &str) -> Option<DnsCacheEntry> {
    let raw = match self.kv.get(key).await {
      Ok(raw) => raw?,
      Err(e) => {
        warn!(key, error = %e, "DNS cache read failed; querying fresh");
        return None;
      }
    };
    match serde_json::from_str::<DnsCacheEntry>(&raw) {
      Ok(entry) if entry.is_live(Utc::now()) => Some(entry),
      Ok(_) => None,
      Err(e) => {
        warn!(key, error = %e, "DNS cache entry undecodable; ignoring");
        None
      }
    }
  }

  async fn write(&self, key: &str, qname: &str, result: &TxtResult) {
    let ttl = cache_ttl(result);
    if ttl.is_zero() {
      return;
    }
    let entry = DnsCacheEntry::new(qname, result, ttl, Utc::now());
    let raw = match serde_json::to_string(&entry) {
      Ok(raw) => raw,
      Err(e) => {
        warn!(key, error = %e, "DNS cache entry unserializable; skipping");
        return;
      }
    };
    if let Err(e) = self.kv.put(key, raw, ttl).await {
      warn!(key, error = %e, "DNS cache write failed; continuing");
    }
  }
}

impl<S, K> TxtResolver for CachedResolver<S, K>
where
  S: TxtSource,
  K: KvStore,
{
  #[instrument(skip(self), fields(qname = %qname))]
  async fn lookup_txt(&self, qname: &str, bypass_cache: bool) -> TxtResult {
    let qname = qname.trim().to_ascii_lowercase();
    let key = cache_key(&qname);

    if !bypass_cache && let Some(entry) = self.read(&key).await {
      debug!(ok = entry.ok, expires_at = %entry.expires_at, "DNS cache hit");
      return entry.into_result();
    }

    let result = self.source.query_txt(&qname).await;
    self.write(&key, &qname, &result).await;
    result
  }
}
