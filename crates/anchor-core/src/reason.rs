//! Failure reasons recorded on claims.
//!
//! Every variant has a stable wire string (`failReason` in the claim JSON).
//! Stored claims written by older builds may carry codes this version does not
//! know; those decode into [`FailReason::Other`] and re-encode verbatim.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ssrf::SsrfReason;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FailReason {
  // ── Transport / DNS ─────────────────────────────────────────────────────
  /// `timeout`
  Timeout,
  /// `fetch_error:<detail>`
  FetchError(String),
  /// `doh_status:<http-code>`
  DohStatus(u16),
  /// `dns_status:<response-code>`, e.g. `dns_status:NXDOMAIN`.
  DnsStatus(String),
  /// `no_txt_records`
  NoTxtRecords,
  /// `dns_query_failed`
  DnsQueryFailed,

  // ── Proof mismatch ──────────────────────────────────────────────────────
  /// `fetch_failed:<http-status>`
  FetchFailed(u16),
  /// `proof_not_found`
  ProofNotFound,
  /// `blocked_url:<reason>`: the fetch target (or a redirect hop) was
  /// refused by the SSRF guard.
  BlockedUrl(SsrfReason),

  // ── Contract violations ─────────────────────────────────────────────────
  /// `invalid_proof_kind`
  InvalidProofKind,
  /// `invalid_expected_token`
  InvalidExpectedToken,
  /// `unknown_claim_type`
  UnknownClaimType,
  /// `kv_not_available`
  KvNotAvailable,

  // ── Unexpected ──────────────────────────────────────────────────────────
  /// `verify_error:<message>`
  VerifyError(String),
  /// A code this build does not recognise.
  Other(String),
}

impl FailReason {
  /// Render a DNS response code the way resolvers name it.
  pub fn dns_status(code: u32) -> Self {
    let name = match code {
      1 => "FORMERR".to_owned(),
      2 => "SERVFAIL".to_owned(),
      3 => "NXDOMAIN".to_owned(),
      4 => "NOTIMP".to_owned(),
      5 => "REFUSED".to_owned(),
      other => other.to_string(),
    };
    Self::DnsStatus(name)
  }

  fn parse(raw: &str) -> Self {
    match raw {
      "timeout" => return Self::Timeout,
      "no_txt_records" => return Self::NoTxtRecords,
      "dns_query_failed" => return Self::DnsQueryFailed,
      "proof_not_found" => return Self::ProofNotFound,
      "invalid_proof_kind" => return Self::InvalidProofKind,
      "invalid_expected_token" => return Self::InvalidExpectedToken,
      "unknown_claim_type" => return Self::UnknownClaimType,
      "kv_not_available" => return Self::KvNotAvailable,
      _ => {}
    }

    let Some((code, detail)) = raw.split_once(':') else {
      return Self::Other(raw.to_owned());
    };
    let parsed = match code {
      "fetch_error" => Some(Self::FetchError(detail.to_owned())),
      "doh_status" => detail.parse().ok().map(Self::DohStatus),
      "dns_status" => Some(Self::DnsStatus(detail.to_owned())),
      "fetch_failed" => detail.parse().ok().map(Self::FetchFailed),
      "blocked_url" => detail.parse().ok().map(Self::BlockedUrl),
      "verify_error" => Some(Self::VerifyError(detail.to_owned())),
      _ => None,
    };
    parsed.unwrap_or_else(|| Self::Other(raw.to_owned()))
  }
}

impl fmt::Display for FailReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Timeout => f.write_str("timeout"),
      Self::FetchError(detail) => write!(f, "fetch_error:{detail}"),
      Self::DohStatus(code) => write!(f, "doh_status:{code}"),
      Self::DnsStatus(code) => write!(f, "dns_status:{code}"),
      Self::NoTxtRecords => f.write_str("no_txt_records"),
      Self::DnsQueryFailed => f.write_str("dns_query_failed"),
      Self::FetchFailed(status) => write!(f, "fetch_failed:{status}"),
      Self::ProofNotFound => f.write_str("proof_not_found"),
      Self::BlockedUrl(reason) => write!(f, "blocked_url:{reason}"),
      Self::InvalidProofKind => f.write_str("invalid_proof_kind"),
      Self::InvalidExpectedToken => f.write_str("invalid_expected_token"),
      Self::UnknownClaimType => f.write_str("unknown_claim_type"),
      Self::KvNotAvailable => f.write_str("kv_not_available"),
      Self::VerifyError(message) => write!(f, "verify_error:{message}"),
      Self::Other(raw) => f.write_str(raw),
    }
  }
}

impl From<String> for FailReason {
  fn from(raw: String) -> Self { Self::parse(&raw) }
}

impl From<&str> for FailReason {
  fn from(raw: &str) -> Self { Self::parse(raw) }
}

impl From<FailReason> for String {
  fn from(reason: FailReason) -> Self { reason.to_string() }
}
