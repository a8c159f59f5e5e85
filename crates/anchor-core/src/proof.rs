//! Proof builder. Turns `(claim type, target)` into a checkable claim.
//!
//! | Type             | Proof                | Location                                          |
//! |------------------|----------------------|---------------------------------------------------|
//! | `website`        | `well_known`         | `https://{host}/.well-known/<proof-file>`         |
//! | `code_host`      | `code_host_readme`   | raw README of `{user}/{user}` on the default branch |
//! | `dns`            | `dns_txt`            | TXT at `_anchor.{domain}`                         |
//! | `public_profile` | `profile_page`       | the profile URL itself                            |
//!
//! HTTP proofs must contain the subject's canonical URL; the DNS proof must
//! decode to the subject's UUID.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  Error, Result,
  claim::{Claim, ClaimId, ClaimType, Proof},
  config::EngineConfig,
  normalize::{normalize_host, normalize_url, parse_lenient},
  ssrf, token,
};

/// Builds claims against a fixed [`EngineConfig`].
#[derive(Debug, Clone, Default)]
pub struct ProofBuilder {
  config: EngineConfig,
}

impl ProofBuilder {
  pub fn new(config: EngineConfig) -> Self { Self { config } }

  pub fn config(&self) -> &EngineConfig { &self.config }

  /// Build a fresh, self-asserted claim for `subject_id`.
  pub fn build(
    &self,
    claim_type: ClaimType,
    target: &str,
    subject_id: Uuid,
    now: DateTime<Utc>,
  ) -> Result<Claim> {
    let subject_url = self.config.canonical_url(subject_id);
    let invalid = || Error::InvalidTarget {
      claim_type,
      target: target.to_owned(),
    };

    let (key, url, proof) = match claim_type {
      ClaimType::Website => {
        let host = normalize_host(target).ok_or_else(invalid)?;
        let url = format!("https://{host}");
        let proof_url =
          format!("{url}/.well-known/{}", self.config.proof_file);
        ssrf::guard_str(&proof_url)?;
        (url.clone(), url, Proof::WellKnown {
          url:          proof_url,
          must_contain: subject_url,
        })
      }

      ClaimType::CodeHost => {
        let user = self.code_host_user(target).ok_or_else(invalid)?;
        let url = format!("https://{}/{user}", self.config.code_host);
        let readme = format!(
          "{}/{user}/{user}/HEAD/README.md",
          self.config.raw_content_base.trim_end_matches('/')
        );
        ssrf::guard_str(&readme)?;
        (url.clone(), url, Proof::CodeHostReadme {
          url:          readme,
          must_contain: subject_url,
        })
      }

      ClaimType::Dns => {
        let host = normalize_host(target).ok_or_else(invalid)?;
        let label = format!("{}.", self.config.dns_label.to_ascii_lowercase());
        let domain = host.strip_prefix(&label).unwrap_or(&host).to_owned();
        if domain.is_empty() {
          return Err(invalid());
        }
        let qname = format!("{label}{domain}");
        (domain.clone(), format!("https://{domain}"), Proof::DnsTxt {
          qname,
          expected_token: token::expected_token(subject_id),
        })
      }

      ClaimType::PublicProfile => {
        // Fetched exactly as submitted; only the claim key is normalized.
        let url = expand_handle(target)
          .unwrap_or_else(|| target.trim().to_owned());
        ssrf::guard_str(&url)?;
        let key = normalize_url(&url).ok_or_else(invalid)?;
        (key, url.clone(), Proof::ProfilePage {
          url,
          must_contain: subject_url,
        })
      }
    };

    Ok(Claim::new(ClaimId::new(claim_type, key), url, proof, now))
  }

  /// The lowercased account name from a bare name, `github.com/user`, or a
  /// full profile URL on the configured code host.
  fn code_host_user(&self, target: &str) -> Option<String> {
    let trimmed = target.trim().trim_start_matches('@');
    let user = if is_account_name(trimmed) {
      trimmed.to_owned()
    } else {
      let url = parse_lenient(trimmed)?;
      let host = url.host_str()?.to_ascii_lowercase();
      let code_host = self.config.code_host.to_ascii_lowercase();
      if host != code_host && host != format!("www.{code_host}") {
        return None;
      }
      url.path_segments()?.find(|s| !s.is_empty())?.to_owned()
    };
    is_account_name(&user).then(|| user.to_ascii_lowercase())
  }
}

fn is_account_name(s: &str) -> bool {
  !s.is_empty()
    && s.len() <= 39
    && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Expand the compact `@user@host` handle syntax into `https://{host}/@{user}`.
fn expand_handle(target: &str) -> Option<String> {
  let rest = target.trim().strip_prefix('@')?;
  let (user, host) = rest.split_once('@')?;
  if user.is_empty() || host.is_empty() || host.contains('/') {
    return None;
  }
  Some(format!("https://{host}/@{user}"))
}
