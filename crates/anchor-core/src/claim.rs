//! Claims: assertions that a subject controls an external resource.
//!
//! A claim carries a proof that says where to look and what
//! to look for, plus its verification state. The claim id is derived from the
//! claim type and the normalized target, so re-submitting an equivalent
//! target replaces the existing claim instead of adding a second one.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, reason::FailReason};

// ─── Claim type ──────────────────────────────────────────────────────────────

/// The kind of external resource a claim refers to.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ClaimType {
  /// A website proven by a file under `/.well-known/`.
  Website,
  /// A DNS name proven by a TXT record.
  Dns,
  /// A code-hosting account proven by its profile README.
  CodeHost,
  /// Any public profile page that links back to the subject.
  PublicProfile,
}

impl ClaimType {
  /// Parse a wire-level claim type, mapping failure to
  /// [`Error::UnknownClaimType`].
  pub fn parse(raw: &str) -> Result<Self> {
    raw
      .trim()
      .parse()
      .map_err(|_| Error::UnknownClaimType(raw.to_owned()))
  }

  /// The proof kind this claim type is verified with.
  pub fn proof_kind(self) -> ProofKind {
    match self {
      Self::Website => ProofKind::WellKnown,
      Self::Dns => ProofKind::DnsTxt,
      Self::CodeHost => ProofKind::CodeHostReadme,
      Self::PublicProfile => ProofKind::ProfilePage,
    }
  }
}

// ─── Status ──────────────────────────────────────────────────────────────────

/// Verification state of a claim.
///
/// `SelfAsserted` is only ever the initial state. Once checked, a claim moves
/// between `Verified` and `Failed`.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
  #[default]
  SelfAsserted,
  Verified,
  Failed,
}

// ─── Proof ───────────────────────────────────────────────────────────────────

/// Discriminant of a [`Proof`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ProofKind {
  WellKnown,
  CodeHostReadme,
  DnsTxt,
  ProfilePage,
}

/// Where to look, and what to look for, when checking a claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
  tag = "kind",
  rename_all = "snake_case",
  rename_all_fields = "camelCase"
)]
pub enum Proof {
  /// `https://{host}/.well-known/<proof-file>` must contain the subject URL.
  WellKnown { url: String, must_contain: String },
  /// The raw README of the account's same-named repository must contain the
  /// subject URL.
  CodeHostReadme { url: String, must_contain: String },
  /// A TXT record at `qname` must decode to the subject's UUID.
  DnsTxt {
    qname:          String,
    expected_token: String,
  },
  /// The profile page itself must contain the subject URL.
  ProfilePage { url: String, must_contain: String },
}

impl Proof {
  pub fn kind(&self) -> ProofKind {
    match self {
      Self::WellKnown { .. } => ProofKind::WellKnown,
      Self::CodeHostReadme { .. } => ProofKind::CodeHostReadme,
      Self::DnsTxt { .. } => ProofKind::DnsTxt,
      Self::ProfilePage { .. } => ProofKind::ProfilePage,
    }
  }
}

// ─── Claim id ────────────────────────────────────────────────────────────────

/// `{type}:{normalized-target-key}`.
///
/// For DNS claims the key is the bare domain; for every other type it is the
/// normalized claim URL.
#[derive(
  Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct ClaimId {
  claim_type: ClaimType,
  key:        String,
}

impl ClaimId {
  pub fn new(claim_type: ClaimType, key: impl Into<String>) -> Self {
    Self {
      claim_type,
      key: key.into(),
    }
  }

  pub fn claim_type(&self) -> ClaimType { self.claim_type }

  pub fn key(&self) -> &str { &self.key }
}

impl fmt::Display for ClaimId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.claim_type, self.key)
  }
}

impl FromStr for ClaimId {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let invalid = || Error::InvalidClaimId(s.to_owned());
    let (claim_type, key) = s.split_once(':').ok_or_else(invalid)?;
    let claim_type: ClaimType = claim_type.parse().map_err(|_| invalid())?;
    if key.is_empty() || key.chars().any(char::is_whitespace) {
      return Err(invalid());
    }
    Ok(Self::new(claim_type, key))
  }
}

impl TryFrom<String> for ClaimId {
  type Error = Error;

  fn try_from(value: String) -> Result<Self> { value.parse() }
}

impl From<ClaimId> for String {
  fn from(id: ClaimId) -> Self { id.to_string() }
}

// ─── Claim ───────────────────────────────────────────────────────────────────

/// The result of one verification run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
  Verified,
  Failed(FailReason),
}

/// An assertion that the owning subject controls `url`, with its proof and
/// verification state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
  pub id:              ClaimId,
  #[serde(rename = "type")]
  pub claim_type:      ClaimType,
  pub url:             String,
  pub status:          ClaimStatus,
  pub proof:           Proof,
  pub created_at:      DateTime<Utc>,
  pub updated_at:      DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub last_checked_at: Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub verified_at:     Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub fail_reason:     Option<FailReason>,
}

impl Claim {
  /// A freshly built, unchecked claim.
  pub fn new(
    id: ClaimId,
    url: String,
    proof: Proof,
    now: DateTime<Utc>,
  ) -> Self {
    Self {
      claim_type: id.claim_type(),
      id,
      url,
      status: ClaimStatus::SelfAsserted,
      proof,
      created_at: now,
      updated_at: now,
      last_checked_at: None,
      verified_at: None,
      fail_reason: None,
    }
  }

  pub fn is_verified(&self) -> bool { self.status == ClaimStatus::Verified }

  /// Fold a re-submission of the same claim into `self`.
  ///
  /// The original `created_at` and verification state survive; the target
  /// URL and proof are taken from `fresh`.
  pub fn resubmit(&mut self, fresh: Claim) {
    self.url = fresh.url;
    self.proof = fresh.proof;
    self.updated_at = fresh.updated_at;
  }

  /// Apply the outcome of a verification run.
  ///
  /// `verified_at` is stamped only on the transition into `Verified`; a
  /// re-check of an already verified claim keeps the original stamp.
  pub fn record_outcome(&mut self, outcome: Outcome, now: DateTime<Utc>) {
    self.last_checked_at = Some(now);
    self.updated_at = now;
    match outcome {
      Outcome::Verified => {
        if self.status != ClaimStatus::Verified || self.verified_at.is_none()
        {
          self.verified_at = Some(now);
        }
        self.status = ClaimStatus::Verified;
        self.fail_reason = None;
      }
      Outcome::Failed(reason) => {
        self.status = ClaimStatus::Failed;
        self.verified_at = None;
        self.fail_reason = Some(reason);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone};

  use super::*;

  fn sample(now: DateTime<Utc>) -> Claim {
    Claim::new(
      ClaimId::new(ClaimType::Website, "https://example.com"),
      "https://example.com".into(),
      Proof::WellKnown {
        url:          "https://example.com/.well-known/anchor.txt".into(),
        must_contain: "https://anchorid.net/resolve/x".into(),
      },
      now,
    )
  }

  #[test]
  fn claim_id_round_trips_through_display() {
    let id: ClaimId = "dns:example.com".parse().unwrap();
    assert_eq!(id.claim_type(), ClaimType::Dns);
    assert_eq!(id.key(), "example.com");
    assert_eq!(id.to_string(), "dns:example.com");

    let url_id: ClaimId = "website:https://example.com".parse().unwrap();
    assert_eq!(url_id.key(), "https://example.com");
  }

  #[test]
  fn malformed_claim_ids_are_rejected() {
    for raw in ["", "website", "nope:example.com", "dns:", "dns:a b"] {
      assert!(
        matches!(raw.parse::<ClaimId>(), Err(Error::InvalidClaimId(_))),
        "{raw:?} should be rejected"
      );
    }
  }

  #[test]
  fn unknown_claim_type_is_reported() {
    assert!(matches!(
      ClaimType::parse("telepathy"),
      Err(Error::UnknownClaimType(_))
    ));
    assert_eq!(ClaimType::parse(" code_host ").unwrap(), ClaimType::CodeHost);
  }

  #[test]
  fn claim_serializes_with_camel_case_and_tagged_proof() {
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let json = serde_json::to_value(sample(now)).unwrap();

    assert_eq!(json["id"], "website:https://example.com");
    assert_eq!(json["type"], "website");
    assert_eq!(json["status"], "self_asserted");
    assert_eq!(json["proof"]["kind"], "well_known");
    assert_eq!(
      json["proof"]["mustContain"],
      "https://anchorid.net/resolve/x"
    );
    assert!(json.get("createdAt").is_some());
    assert!(json.get("verifiedAt").is_none());

    let back: Claim = serde_json::from_value(json).unwrap();
    assert_eq!(back, sample(now));
  }

  #[test]
  fn verified_at_tracks_transitions() {
    let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let t1 = t0 + Duration::minutes(5);
    let t2 = t1 + Duration::minutes(5);
    let t3 = t2 + Duration::minutes(5);
    let mut claim = sample(t0);

    claim.record_outcome(Outcome::Verified, t1);
    assert_eq!(claim.status, ClaimStatus::Verified);
    assert_eq!(claim.verified_at, Some(t1));
    assert_eq!(claim.last_checked_at, Some(t1));

    // Re-check while still verified keeps the original stamp.
    claim.record_outcome(Outcome::Verified, t2);
    assert_eq!(claim.verified_at, Some(t1));
    assert_eq!(claim.updated_at, t2);

    claim.record_outcome(Outcome::Failed(FailReason::ProofNotFound), t3);
    assert_eq!(claim.status, ClaimStatus::Failed);
    assert_eq!(claim.verified_at, None);
    assert_eq!(claim.fail_reason, Some(FailReason::ProofNotFound));
    assert_eq!(claim.created_at, t0);
  }

  #[test]
  fn resubmit_keeps_creation_and_status() {
    let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let t1 = t0 + Duration::hours(1);
    let mut stored = sample(t0);
    stored.record_outcome(Outcome::Verified, t0);

    let mut fresh = sample(t1);
    fresh.url = "https://example.com".into();
    stored.resubmit(fresh);

    assert_eq!(stored.created_at, t0);
    assert_eq!(stored.updated_at, t1);
    assert!(stored.is_verified());
  }
}
