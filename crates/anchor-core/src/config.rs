//! Engine configuration shared by the proof builder and the canonicalizer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::normalize::normalize_host;

/// Deployment-specific conventions. Every field has a default, so a partial
/// `[engine]` table in `config.toml` is enough.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Base of the subject's canonical URL; the subject UUID is appended as
  /// the final path segment.
  pub resolver_base:             String,
  /// File name served under `/.well-known/` for website proofs.
  pub proof_file:                String,
  /// Label prepended to a domain to form the TXT query name.
  pub dns_label:                 String,
  /// Host of the code-hosting service for `code_host` claims.
  pub code_host:                 String,
  /// Base URL serving raw repository content for `code_host`.
  pub raw_content_base:          String,
  /// Store the effective (`manual ∪ verified`) `sameAs` set instead of the
  /// manual one.
  pub persist_effective_same_as: bool,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      resolver_base:             "https://anchorid.net/resolve".into(),
      proof_file:                "anchor.txt".into(),
      dns_label:                 "_anchor".into(),
      code_host:                 "github.com".into(),
      raw_content_base:          "https://raw.githubusercontent.com".into(),
      persist_effective_same_as: false,
    }
  }
}

impl EngineConfig {
  /// The URL a subject's proofs must point back to.
  pub fn canonical_url(&self, subject_id: Uuid) -> String {
    format!(
      "{}/{}",
      self.resolver_base.trim_end_matches('/'),
      subject_id.hyphenated()
    )
  }

  /// The host this deployment serves identity records from.
  pub fn own_host(&self) -> Option<String> {
    normalize_host(&self.resolver_base)
  }

  /// Whether `host` is this deployment's own host or one of its subdomains.
  pub fn is_own_host(&self, host: &str) -> bool {
    let Some(own) = self.own_host() else {
      return false;
    };
    host == own
      || host
        .strip_suffix(own.as_str())
        .is_some_and(|prefix| prefix.ends_with('.'))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn canonical_url_is_lowercase_and_slash_safe() {
    let cfg = EngineConfig {
      resolver_base: "https://id.example/resolve/".into(),
      ..Default::default()
    };
    let id = Uuid::parse_str("4FF7ED97-B78F-4AE6-9011-5AF714EE241C").unwrap();
    assert_eq!(
      cfg.canonical_url(id),
      "https://id.example/resolve/4ff7ed97-b78f-4ae6-9011-5af714ee241c"
    );
  }

  #[test]
  fn own_host_matches_subdomains_only() {
    let cfg = EngineConfig::default();
    assert!(cfg.is_own_host("anchorid.net"));
    assert!(cfg.is_own_host("www.anchorid.net"));
    assert!(!cfg.is_own_host("notanchorid.net"));
    assert!(!cfg.is_own_host("example.com"));
  }

  #[test]
  fn partial_tables_fill_defaults() {
    let cfg: EngineConfig =
      serde_json::from_str(r#"{"proof_file":"id.txt"}"#).unwrap();
    assert_eq!(cfg.proof_file, "id.txt");
    assert_eq!(cfg.dns_label, "_anchor");
  }
}
