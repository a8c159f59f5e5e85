//! Verification dispatcher.
//!
//! Runs the check that matches a claim's proof and folds the outcome back
//! into the claim. Every path ends in `verified` or `failed`; nothing here
//! returns an error.

use anchor_core::{
  claim::{Claim, Outcome, Proof},
  config::EngineConfig,
  reason::FailReason,
  ssrf, token,
};
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use crate::{cache::TxtResolver, fetch::ProofFetcher};

/// Checks claims against the outside world.
#[derive(Debug, Clone)]
pub struct Verifier<R, F> {
  resolver: R,
  fetcher:  F,
  config:   EngineConfig,
}

impl<R, F> Verifier<R, F>
where
  R: TxtResolver,
  F: ProofFetcher,
{
  pub fn new(resolver: R, fetcher: F, config: EngineConfig) -> Self {
    Self {
      resolver,
      fetcher,
      config,
    }
  }

  pub fn config(&self) -> &EngineConfig { &self.config }

  pub fn resolver(&self) -> &R { &self.resolver }

  pub fn fetcher(&self) -> &F { &self.fetcher }

  /// Verify `claim` now and return the updated copy.
  #[instrument(skip(self, claim), fields(claim = %claim.id))]
  pub async fn verify(&self, claim: &Claim, bypass_cache: bool) -> Claim {
    self.verify_at(claim, bypass_cache, Utc::now()).await
  }

  pub async fn verify_at(
    &self,
    claim: &Claim,
    bypass_cache: bool,
    now: DateTime<Utc>,
  ) -> Claim {
    let outcome = self.check(claim, bypass_cache).await;
    match &outcome {
      Outcome::Verified => info!(claim = %claim.id, "claim verified"),
      Outcome::Failed(reason) => {
        info!(claim = %claim.id, %reason, "claim failed verification")
      }
    }
    let mut updated = claim.clone();
    updated.record_outcome(outcome, now);
    updated
  }

  async fn check(&self, claim: &Claim, bypass_cache: bool) -> Outcome {
    if claim.proof.kind() != claim.claim_type.proof_kind() {
      return Outcome::Failed(FailReason::InvalidProofKind);
    }

    match &claim.proof {
      Proof::WellKnown { url, must_contain }
      | Proof::CodeHostReadme { url, must_contain }
      | Proof::ProfilePage { url, must_contain } => {
        self.check_http(url, must_contain).await
      }
      Proof::DnsTxt {
        qname,
        expected_token,
      } => self.check_dns(qname, expected_token, bypass_cache).await,
    }
  }

  async fn check_http(&self, url: &str, must_contain: &str) -> Outcome {
    let url = match ssrf::guard_str(url) {
      Ok(url) => url,
      Err(rejection) => {
        debug!(%rejection, "proof url refused");
        return Outcome::Failed(FailReason::BlockedUrl(rejection.reason));
      }
    };

    let page = match self.fetcher.fetch_text(&url).await {
      Ok(page) => page,
      Err(e) => return Outcome::Failed(e.reason()),
    };
    if !page.is_success() {
      return Outcome::Failed(FailReason::FetchFailed(page.status));
    }

    if page.body.contains(must_contain) {
      Outcome::Verified
    } else {
      Outcome::Failed(FailReason::ProofNotFound)
    }
  }

  async fn check_dns(
    &self,
    qname: &str,
    expected_token: &str,
    bypass_cache: bool,
  ) -> Outcome {
    let base = &self.config.resolver_base;
    let Some(expected) =
      token::extract_uuid(&token::normalize_txt(expected_token), base)
    else {
      return Outcome::Failed(FailReason::InvalidExpectedToken);
    };
    let accepted =
      token::accepted_tokens(expected, &self.config.canonical_url(expected));

    let answer = match self.resolver.lookup_txt(qname, bypass_cache).await {
      Ok(answer) => answer,
      Err(failure) => return Outcome::Failed(failure.reason),
    };

    let matched = answer.values.iter().any(|raw| {
      let value = token::normalize_txt(raw);
      token::extract_uuid(&value, base) == Some(expected)
        || accepted.iter().any(|t| *t == value)
    });
    if matched {
      Outcome::Verified
    } else {
      debug!(candidates = answer.values.len(), "no TXT value matched");
      Outcome::Failed(FailReason::ProofNotFound)
    }
  }
}
