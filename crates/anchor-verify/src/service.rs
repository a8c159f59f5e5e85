//! Caller-facing entry point.
//!
//! [`ClaimService`] owns the store and the verifier. Every operation that
//! takes caller-supplied ids validates them first, so a malformed id is
//! rejected before any network work happens.

use std::str::FromStr;

use anchor_core::{
  claim::{Claim, ClaimId, ClaimType},
  profile::{
    CanonicalProfile, CanonicalizeOptions, ProfileEdit, ProfileInput,
    canonicalize,
  },
  proof::ProofBuilder,
  store::{ClaimStore, ProfileStore},
  subject::parse_subject_id,
};
use chrono::Utc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::{
  Error, Result, cache::TxtResolver, dispatch::Verifier, fetch::ProofFetcher,
};

pub struct ClaimService<S, R, F> {
  store:    S,
  builder:  ProofBuilder,
  verifier: Verifier<R, F>,
}

impl<S, R, F> ClaimService<S, R, F>
where
  S: ClaimStore + ProfileStore,
  R: TxtResolver,
  F: ProofFetcher,
{
  pub fn new(store: S, verifier: Verifier<R, F>) -> Self {
    Self {
      store,
      builder: ProofBuilder::new(verifier.config().clone()),
      verifier,
    }
  }

  pub fn store(&self) -> &S { &self.store }

  // ─── Claims ───────────────────────────────────────────────────────────────

  /// Build a claim for `target` and persist it.
  ///
  /// Re-submitting an equivalent target updates the stored claim in place:
  /// its id, `createdAt` and verification state are kept.
  #[instrument(skip(self))]
  pub async fn create_claim(
    &self,
    subject_id: &str,
    claim_type: &str,
    target: &str,
  ) -> Result<Claim> {
    let subject_id = parse_subject_id(subject_id)?;
    let claim_type = ClaimType::parse(claim_type)?;
    let fresh = self
      .builder
      .build(claim_type, target, subject_id, Utc::now())?;

    let existing = self
      .store
      .get_claim(subject_id, &fresh.id)
      .await
      .map_err(Error::store)?;
    let claim = match existing {
      Some(mut existing) => {
        debug!(claim = %existing.id, "claim re-submitted");
        existing.resubmit(fresh);
        existing
      }
      None => fresh,
    };

    self
      .store
      .upsert_claim(subject_id, &claim)
      .await
      .map_err(Error::store)?;
    info!(%subject_id, claim = %claim.id, "claim saved");
    Ok(claim)
  }

  pub async fn list_claims(&self, subject_id: &str) -> Result<Vec<Claim>> {
    let subject_id = parse_subject_id(subject_id)?;
    self
      .store
      .list_claims(subject_id)
      .await
      .map_err(Error::store)
  }

  /// Remove a claim. Returns `false` if it did not exist.
  #[instrument(skip(self))]
  pub async fn delete_claim(
    &self,
    subject_id: &str,
    claim_id: &str,
  ) -> Result<bool> {
    let subject_id = parse_subject_id(subject_id)?;
    let claim_id = ClaimId::from_str(claim_id)?;
    self
      .store
      .delete_claim(subject_id, &claim_id)
      .await
      .map_err(Error::store)
  }

  /// Verify a stored claim and persist the outcome.
  ///
  /// A failed check is not an error: the returned claim carries
  /// `status = failed` and a reason.
  #[instrument(skip(self))]
  pub async fn verify_claim(
    &self,
    subject_id: &str,
    claim_id: &str,
    bypass_cache: bool,
  ) -> Result<Claim> {
    let subject_id = parse_subject_id(subject_id)?;
    let claim_id = ClaimId::from_str(claim_id)?;

    let claim = self
      .store
      .get_claim(subject_id, &claim_id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::ClaimNotFound(claim_id.clone()))?;

    let checked = self.verifier.verify(&claim, bypass_cache).await;
    self
      .store
      .upsert_claim(subject_id, &checked)
      .await
      .map_err(Error::store)?;
    Ok(checked)
  }

  /// URLs of the subject's verified claims.
  pub async fn verified_urls(&self, subject_id: Uuid) -> Result<Vec<String>> {
    let claims = self
      .store
      .list_claims(subject_id)
      .await
      .map_err(Error::store)?;
    Ok(
      claims
        .into_iter()
        .filter(Claim::is_verified)
        .map(|c| c.url)
        .collect(),
    )
  }

  // ─── Profiles ─────────────────────────────────────────────────────────────

  /// Build the subject's identity record.
  ///
  /// With an `edit` this is a write build and the record is persisted when
  /// it changed. Without one it is a read build for public rendering and
  /// nothing is written.
  #[instrument(skip(self, edit), fields(write = edit.is_some()))]
  pub async fn render_profile(
    &self,
    subject_id: &str,
    edit: Option<&ProfileEdit>,
    options: CanonicalizeOptions,
  ) -> Result<CanonicalProfile> {
    let subject_id = parse_subject_id(subject_id)?;
    let stored = self
      .store
      .get_profile(subject_id)
      .await
      .map_err(Error::store)?;
    let verified_urls = self.verified_urls(subject_id).await?;

    let built = canonicalize(
      ProfileInput {
        subject_id,
        stored: stored.as_ref(),
        edit,
        verified_urls: &verified_urls,
      },
      self.verifier.config(),
      options,
      Utc::now(),
    )?;

    if edit.is_some() && built.changed {
      self
        .store
        .put_profile(subject_id, &built.record)
        .await
        .map_err(Error::store)?;
      info!(%subject_id, "identity record updated");
    }
    Ok(built)
  }
}
