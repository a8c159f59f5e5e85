//! SSRF guard for verification fetches.
//!
//! Every URL the engine fetches on a subject's behalf passes through
//! [`guard`] first. Only `https` is allowed, and loopback, link-local (which
//! covers cloud metadata at `169.254.169.254`) and RFC 1918 private ranges are
//! refused. The check is purely syntactic; hostnames are not resolved.

use std::net::{Ipv4Addr, Ipv6Addr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::{Host, Url};

/// Why a fetch target was refused.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SsrfReason {
  InvalidUrl,
  HttpsRequired,
  MissingHost,
  Localhost,
  Loopback,
  LinkLocal,
  PrivateNetwork,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("refusing to fetch {url}: {reason}")]
pub struct SsrfRejection {
  pub url:    String,
  pub reason: SsrfReason,
}

/// Accept or reject a parsed fetch target.
pub fn guard(url: &Url) -> Result<(), SsrfRejection> {
  check(url).map_err(|reason| SsrfRejection {
    url: url.to_string(),
    reason,
  })
}

/// Parse and check a fetch target in one step.
pub fn guard_str(raw: &str) -> Result<Url, SsrfRejection> {
  let url = Url::parse(raw.trim()).map_err(|_| SsrfRejection {
    url:    raw.to_owned(),
    reason: SsrfReason::InvalidUrl,
  })?;
  guard(&url)?;
  Ok(url)
}

fn check(url: &Url) -> Result<(), SsrfReason> {
  if url.scheme() != "https" {
    return Err(SsrfReason::HttpsRequired);
  }
  match url.host().ok_or(SsrfReason::MissingHost)? {
    Host::Domain(domain) => {
      let domain = domain.trim_end_matches('.');
      if domain.eq_ignore_ascii_case("localhost") {
        return Err(SsrfReason::Localhost);
      }
      Ok(())
    }
    Host::Ipv4(ip) => check_ipv4(ip),
    Host::Ipv6(ip) => check_ipv6(ip),
  }
}

fn check_ipv4(ip: Ipv4Addr) -> Result<(), SsrfReason> {
  let [a, b, ..] = ip.octets();
  match (a, b) {
    _ if ip.is_unspecified() => Err(SsrfReason::Localhost),
    (127, _) => Err(SsrfReason::Loopback),
    (169, 254) => Err(SsrfReason::LinkLocal),
    (10, _) => Err(SsrfReason::PrivateNetwork),
    (192, 168) => Err(SsrfReason::PrivateNetwork),
    (172, 16..=31) => Err(SsrfReason::PrivateNetwork),
    _ => Ok(()),
  }
}

fn check_ipv6(ip: Ipv6Addr) -> Result<(), SsrfReason> {
  if ip.is_unspecified() {
    return Err(SsrfReason::Localhost);
  }
  if ip.is_loopback() {
    return Err(SsrfReason::Loopback);
  }
  match ip.to_ipv4_mapped() {
    Some(v4) => check_ipv4(v4),
    None => Ok(()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn reason(raw: &str) -> Option<SsrfReason> {
    guard_str(raw).err().map(|r| r.reason)
  }

  #[test]
  fn public_https_is_accepted() {
    assert!(guard_str("https://example.com/").is_ok());
    assert!(guard_str("https://93.184.216.34/x").is_ok());
    assert!(guard_str("https://172.32.0.1/").is_ok());
    assert!(guard_str("https://172.15.255.255/").is_ok());
  }

  #[test]
  fn blocked_targets_are_rejected() {
    assert_eq!(reason("https://169.254.169.254/"), Some(SsrfReason::LinkLocal));
    assert_eq!(reason("https://10.1.2.3/"), Some(SsrfReason::PrivateNetwork));
    assert_eq!(reason("https://192.168.0.5/"), Some(SsrfReason::PrivateNetwork));
    assert_eq!(reason("https://127.0.0.1/"), Some(SsrfReason::Loopback));
    assert_eq!(reason("https://127.9.9.9/"), Some(SsrfReason::Loopback));
    assert_eq!(reason("http://example.com/"), Some(SsrfReason::HttpsRequired));
  }

  #[test]
  fn private_172_range_boundaries() {
    assert_eq!(reason("https://172.16.0.1/"), Some(SsrfReason::PrivateNetwork));
    assert_eq!(
      reason("https://172.31.255.254/"),
      Some(SsrfReason::PrivateNetwork)
    );
  }

  #[test]
  fn localhost_spellings_are_rejected() {
    assert_eq!(reason("https://localhost/"), Some(SsrfReason::Localhost));
    assert_eq!(reason("https://LOCALHOST./"), Some(SsrfReason::Localhost));
    assert_eq!(reason("https://0.0.0.0/"), Some(SsrfReason::Localhost));
    assert_eq!(reason("https://[::1]/"), Some(SsrfReason::Loopback));
    assert_eq!(reason("https://[::]/"), Some(SsrfReason::Localhost));
    assert_eq!(
      reason("https://[::ffff:10.0.0.1]/"),
      Some(SsrfReason::PrivateNetwork)
    );
  }

  #[test]
  fn garbage_is_invalid() {
    assert_eq!(reason("not a url"), Some(SsrfReason::InvalidUrl));
  }
}
