//! DNS-over-HTTPS TXT lookups.
//!
//! Queries a DoH JSON endpoint (`application/dns-json`) for the TXT records
//! of a name. Each attempt is bounded by a strict timeout. Outcomes are
//! classified as:
//!
//! - success: one or more TXT strings;
//! - non-transient failure: a non-zero DNS status (NXDOMAIN, SERVFAIL, ...),
//!   a non-2xx DoH response, an undecodable body, or no non-blank TXT
//!   strings;
//! - transient failure: network errors and timeouts.
//!
//! A transient failure is retried once after a short fixed backoff. Total
//! work per lookup is therefore at most two bounded attempts.

use std::{future::Future, time::Duration};

use anchor_core::{reason::FailReason, token::normalize_txt};
use reqwest::{Client, header::ACCEPT};
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::{Error, Result, USER_AGENT};

/// Cloudflare's public DoH JSON endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://cloudflare-dns.com/dns-query";

/// DNS RR type number for TXT.
const TXT_TYPE: u16 = 16;

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DohConfig {
  pub endpoint:         String,
  /// Per-attempt timeout.
  pub timeout_ms:       u64,
  /// Pause before the single retry of a transient failure.
  pub retry_backoff_ms: u64,
}

impl Default for DohConfig {
  fn default() -> Self {
    Self {
      endpoint:         DEFAULT_ENDPOINT.into(),
      timeout_ms:       2_500,
      retry_backoff_ms: 100,
    }
  }
}

// ─── Results ─────────────────────────────────────────────────────────────────

/// A successful TXT lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxtAnswer {
  /// Raw TXT values, one per character-string.
  pub values:  Vec<String>,
  /// Smallest TTL across the TXT answers, if the resolver reported any.
  pub min_ttl: Option<u32>,
}

/// A failed TXT lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsFailure {
  pub reason:    FailReason,
  /// Network-level failures worth one retry.
  pub transient: bool,
}

impl DnsFailure {
  pub fn permanent(reason: FailReason) -> Self {
    Self {
      reason,
      transient: false,
    }
  }

  pub fn transient(reason: FailReason) -> Self {
    Self {
      reason,
      transient: true,
    }
  }
}

pub type TxtResult = std::result::Result<TxtAnswer, DnsFailure>;

/// Anything that can answer an uncached TXT query.
pub trait TxtSource: Send + Sync {
  fn query_txt<'a>(
    &'a self,
    qname: &'a str,
  ) -> impl Future<Output = TxtResult> + Send + 'a;
}

// ─── Wire format ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct DohResponse {
  #[serde(rename = "Status")]
  status: u32,
  #[serde(rename = "Answer", default)]
  answer: Vec<DohAnswer>,
}

#[derive(Debug, Deserialize)]
struct DohAnswer {
  #[serde(rename = "type")]
  record_type: u16,
  #[serde(rename = "TTL", default)]
  ttl:         Option<u32>,
  #[serde(default)]
  data:        String,
}

// ─── Client ──────────────────────────────────────────────────────────────────

/// DoH JSON client. Cheap to clone; the inner [`reqwest::Client`] is
/// `Arc`-based.
#[derive(Debug, Clone)]
pub struct DohClient {
  client:        Client,
  endpoint:      Url,
  timeout:       Duration,
  retry_backoff: Duration,
}

impl DohClient {
  pub fn new(config: &DohConfig) -> Result<Self> {
    let endpoint = Url::parse(&config.endpoint)
      .map_err(|_| Error::InvalidEndpoint(config.endpoint.clone()))?;
    let client = Client::builder().user_agent(USER_AGENT).build()?;
    Ok(Self {
      client,
      endpoint,
      timeout: Duration::from_millis(config.timeout_ms),
      retry_backoff: Duration::from_millis(config.retry_backoff_ms),
    })
  }

  /// Look up TXT records for `qname`: one attempt plus at most one retry.
  #[instrument(skip(self), fields(qname = %qname))]
  pub async fn query(&self, qname: &str) -> TxtResult {
    match self.attempt(qname).await {
      Err(failure) if failure.transient => {
        warn!(
          reason = %failure.reason,
          backoff_ms = self.retry_backoff.as_millis() as u64,
          "DoH: transient failure, retrying once"
        );
        tokio::time::sleep(self.retry_backoff).await;
        self.attempt(qname).await
      }
      other => other,
    }
  }

  async fn attempt(&self, qname: &str) -> TxtResult {
    let response = self
      .client
      .get(self.endpoint.clone())
      .query(&[("name", qname), ("type", "TXT")])
      .header(ACCEPT, "application/dns-json")
      .timeout(self.timeout)
      .send()
      .await
      .map_err(|e| transport_failure(&e))?;

    let status = response.status();
    if !status.is_success() {
      debug!(http_status = status.as_u16(), "DoH: non-success response");
      return Err(DnsFailure::permanent(FailReason::DohStatus(
        status.as_u16(),
      )));
    }

    let body: DohResponse = response.json().await.map_err(|e| {
      if e.is_timeout() {
        DnsFailure::transient(FailReason::Timeout)
      } else {
        debug!(error = %e, "DoH: undecodable response body");
        DnsFailure::permanent(FailReason::DnsQueryFailed)
      }
    })?;

    parse_response(body)
  }
}

impl TxtSource for DohClient {
  async fn query_txt(&self, qname: &str) -> TxtResult { self.query(qname).await }
}

fn transport_failure(e: &reqwest::Error) -> DnsFailure {
  let reason = if e.is_timeout() {
    FailReason::Timeout
  } else if e.is_connect() {
    FailReason::FetchError("connect".into())
  } else if e.is_body() || e.is_decode() {
    FailReason::FetchError("body".into())
  } else {
    FailReason::FetchError("request".into())
  };
  DnsFailure::transient(reason)
}

fn parse_response(body: DohResponse) -> TxtResult {
  if body.status != 0 {
    return Err(DnsFailure::permanent(FailReason::dns_status(body.status)));
  }

  let txt: Vec<&DohAnswer> = body
    .answer
    .iter()
    .filter(|a| a.record_type == TXT_TYPE)
    .collect();
  let values: Vec<String> = txt
    .iter()
    .flat_map(|a| character_strings(&a.data))
    .filter(|v| !normalize_txt(v).trim().is_empty())
    .collect();
  if values.is_empty() {
    return Err(DnsFailure::permanent(FailReason::NoTxtRecords));
  }

  Ok(TxtAnswer {
    values,
    min_ttl: txt.iter().filter_map(|a| a.ttl).min(),
  })
}

/// Split a TXT `data` field into candidate values.
///
/// A record made of several quoted character-strings yields each string as
/// an independent candidate; they are not concatenated. A single string is
/// returned as-is, quotes included, for [`normalize_txt`] to strip.
fn character_strings(data: &str) -> Vec<String> {
  let trimmed = data.trim();
  if !trimmed.starts_with('"') {
    return vec![trimmed.to_owned()];
  }

  let mut segments = Vec::new();
  let mut current = String::new();
  let mut in_quotes = false;
  let mut chars = trimmed.chars();
  while let Some(c) = chars.next() {
    match (c, in_quotes) {
      ('"', false) => in_quotes = true,
      ('"', true) => {
        segments.push(std::mem::take(&mut current));
        in_quotes = false;
      }
      ('\\', true) => {
        if let Some(escaped) = chars.next() {
          current.push(escaped);
        }
      }
      (c, true) => current.push(c),
      (_, false) => {}
    }
  }

  if segments.len() > 1 {
    segments
  } else {
    vec![trimmed.to_owned()]
  }
}
