//! URL and domain canonicalization.
//!
//! Rules, applied in order: trim, parse (bare hosts get an `https://`
//! prefix), force the scheme to `https`, lowercase the host, drop the
//! fragment, drop the default port, and strip trailing slashes from the path.
//! The bare root renders without a slash (`https://example.com`). Query
//! strings are preserved verbatim.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use url::{Position, Url};

/// Canonicalize a single URL or bare host. Returns `None` when the input
/// cannot be parsed into an `https` URL with a host.
pub fn normalize_url(input: &str) -> Option<String> {
  let url = parse_lenient(input)?;
  let path = url.path().trim_end_matches('/');

  let mut out = String::with_capacity(url.as_str().len());
  out.push_str(&url[..Position::BeforePath]);
  out.push_str(path);
  out.push_str(&url[Position::AfterPath..]);
  Some(out)
}

/// The lowercased hostname of a URL or bare host.
pub fn normalize_host(input: &str) -> Option<String> {
  let url = parse_lenient(input)?;
  url.host_str().map(str::to_ascii_lowercase)
}

/// Parse `input` into an `https` URL with a host and no fragment.
pub fn parse_lenient(input: &str) -> Option<Url> {
  let trimmed = input.trim();
  if trimmed.is_empty() {
    return None;
  }

  let mut url = if trimmed.contains("://") {
    Url::parse(trimmed).ok()?
  } else {
    Url::parse(&format!("https://{trimmed}")).ok()?
  };

  if url.scheme() != "https" {
    url.set_scheme("https").ok()?;
  }
  url.host_str()?;
  url.set_fragment(None);
  if url.port() == Some(443) {
    url.set_port(None).ok()?;
  }
  Some(url)
}

// ─── Lists ───────────────────────────────────────────────────────────────────

/// A list-valued input: either a JSON array or a newline/comma-delimited
/// string, as submitted from a form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListInput {
  Many(Vec<String>),
  Delimited(String),
}

impl ListInput {
  /// Trimmed, non-empty entries in input order.
  pub fn entries(&self) -> Vec<&str> {
    let raw: Vec<&str> = match self {
      Self::Many(items) => items.iter().map(String::as_str).collect(),
      Self::Delimited(text) => text.split(['\n', ',']).collect(),
    };
    raw
      .into_iter()
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .collect()
  }
}

impl From<Vec<String>> for ListInput {
  fn from(items: Vec<String>) -> Self { Self::Many(items) }
}

/// Normalize every entry, drop the unparsable ones, and return a
/// deduplicated, lexicographically sorted list.
pub fn normalize_url_list(input: &ListInput) -> Vec<String> {
  sorted_urls(input.entries())
}

/// Normalize, dedupe, and sort an arbitrary iterator of URL strings.
pub fn sorted_urls<'a>(urls: impl IntoIterator<Item = &'a str>) -> Vec<String> {
  urls
    .into_iter()
    .filter_map(normalize_url)
    .collect::<BTreeSet<_>>()
    .into_iter()
    .collect()
}

/// Deduplicate trimmed, non-empty entries, keeping first-seen order.
pub fn dedupe_in_order(input: &ListInput) -> Vec<String> {
  let mut seen = HashSet::new();
  input
    .entries()
    .into_iter()
    .filter(|entry| seen.insert(*entry))
    .map(str::to_owned)
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bare_hosts_become_https_roots() {
    assert_eq!(
      normalize_url("Example.com/").as_deref(),
      Some("https://example.com")
    );
    assert_eq!(
      normalize_url("  https://EXAMPLE.com  ").as_deref(),
      Some("https://example.com")
    );
  }

  #[test]
  fn scheme_fragment_port_and_slashes() {
    assert_eq!(
      normalize_url("http://example.com/blog//#top").as_deref(),
      Some("https://example.com/blog")
    );
    assert_eq!(
      normalize_url("https://example.com:443/a/").as_deref(),
      Some("https://example.com/a")
    );
    assert_eq!(
      normalize_url("https://example.com:8443/a").as_deref(),
      Some("https://example.com:8443/a")
    );
  }

  #[test]
  fn query_is_preserved() {
    assert_eq!(
      normalize_url("https://example.com/p/?b=2&a=1").as_deref(),
      Some("https://example.com/p?b=2&a=1")
    );
    assert_eq!(
      normalize_url("https://example.com/?x").as_deref(),
      Some("https://example.com?x")
    );
  }

  #[test]
  fn unparsable_input_is_none() {
    assert_eq!(normalize_url(""), None);
    assert_eq!(normalize_url("   "), None);
    assert_eq!(normalize_url("https://"), None);
    assert_eq!(normalize_url("http://exa mple.com"), None);
  }

  #[test]
  fn normalization_is_idempotent() {
    let inputs = [
      "Example.com/",
      "http://example.com:80/a//b/?q=1#frag",
      "https://example.com/?x",
      "https://sub.Example.org/Path/",
      "example.com:8080/x/",
      "https://example.com/%7Euser/",
      "https://xn--bcher-kva.example/",
    ];
    for input in inputs {
      let once = normalize_url(input).expect(input);
      let twice = normalize_url(&once).expect(&once);
      assert_eq!(once, twice, "not idempotent for {input:?}");
    }
  }

  #[test]
  fn host_is_lowercased() {
    assert_eq!(
      normalize_host("HTTPS://Www.Example.COM/path").as_deref(),
      Some("www.example.com")
    );
    assert_eq!(normalize_host("example.com").as_deref(), Some("example.com"));
  }

  #[test]
  fn list_accepts_arrays_and_delimited_text() {
    let text = ListInput::Delimited(
      "https://b.example/\nhttps://a.example, not a url ,https://b.example"
        .into(),
    );
    assert_eq!(
      normalize_url_list(&text),
      vec!["https://a.example", "https://b.example"]
    );

    let array = ListInput::Many(vec![
      "b.example".into(),
      "".into(),
      "A.example/".into(),
    ]);
    assert_eq!(
      normalize_url_list(&array),
      vec!["https://a.example", "https://b.example"]
    );
  }

  #[test]
  fn list_input_deserializes_either_shape() {
    let many: ListInput = serde_json::from_str(r#"["a","b"]"#).unwrap();
    assert_eq!(many.entries(), vec!["a", "b"]);
    let text: ListInput = serde_json::from_str(r#""a, b""#).unwrap();
    assert_eq!(text.entries(), vec!["a", "b"]);
  }

  #[test]
  fn dedupe_keeps_first_seen_order() {
    let names = ListInput::Delimited("Zed, Alpha\nZed, Beta".into());
    assert_eq!(dedupe_in_order(&names), vec!["Zed", "Alpha", "Beta"]);
  }
}
