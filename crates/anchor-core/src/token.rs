//! DNS TXT proof tokens.
//!
//! A DNS claim is proven by a TXT record whose value decodes to the subject's
//! UUID. Four textual forms are accepted:
//!
//! ```text
//! anchor=urn:uuid:<uuid>
//! anchor=<uuid>
//! urn:uuid:<uuid>
//! https://<resolver>/<uuid>
//! ```
//!
//! The URL form is only accepted under the deployment's own `https`
//! resolver base.
//!
//! Values are normalized with [`normalize_txt`] before matching. Its exact
//! behaviour is part of the published record format and must not change.

use uuid::Uuid;

const ANCHOR_PREFIX: &str = "anchor=";
const URN_PREFIX: &str = "urn:uuid:";

/// The token a subject is told to publish.
pub fn expected_token(subject_id: Uuid) -> String {
  format!("{ANCHOR_PREFIX}{URN_PREFIX}{}", subject_id.hyphenated())
}

/// Every textual form that proves `subject_id`, in publication order.
pub fn accepted_tokens(subject_id: Uuid, canonical_url: &str) -> Vec<String> {
  let id = subject_id.hyphenated().to_string();
  vec![
    format!("{ANCHOR_PREFIX}{URN_PREFIX}{id}"),
    format!("{ANCHOR_PREFIX}{id}"),
    format!("{URN_PREFIX}{id}"),
    canonical_url.to_owned(),
  ]
}

/// Trim, strip one pair of surrounding double quotes, collapse whitespace
/// runs to a single space, and lowercase a leading `anchor=` prefix.
pub fn normalize_txt(value: &str) -> String {
  let mut s = value.trim();
  if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
    s = &s[1..s.len() - 1];
  }

  let mut collapsed = String::with_capacity(s.len());
  let mut in_space = false;
  for c in s.chars() {
    if c.is_whitespace() {
      if !in_space {
        collapsed.push(' ');
      }
      in_space = true;
    } else {
      collapsed.push(c);
      in_space = false;
    }
  }

  match collapsed.get(..ANCHOR_PREFIX.len()) {
    Some(head) if head.eq_ignore_ascii_case(ANCHOR_PREFIX) => {
      format!("{ANCHOR_PREFIX}{}", &collapsed[ANCHOR_PREFIX.len()..])
    }
    _ => collapsed,
  }
}

/// Extract the UUID from an already-normalized token in any accepted form.
///
/// `resolver_base` is the configured canonical resolver prefix, e.g.
/// `https://anchorid.net/resolve`.
pub fn extract_uuid(token: &str, resolver_base: &str) -> Option<Uuid> {
  let candidate = if let Some(rest) = token.strip_prefix(ANCHOR_PREFIX) {
    strip_urn(rest).unwrap_or(rest)
  } else if let Some(rest) = strip_urn(token) {
    rest
  } else {
    strip_resolver_base(token, resolver_base)?
  };
  parse_uuid_shape(candidate)
}

fn strip_urn(s: &str) -> Option<&str> {
  let head = s.get(..URN_PREFIX.len())?;
  head
    .eq_ignore_ascii_case(URN_PREFIX)
    .then(|| &s[URN_PREFIX.len()..])
}

/// The single path segment after `{resolver_base}/`, ignoring one trailing
/// slash. The prefix compares case-insensitively.
fn strip_resolver_base<'a>(
  token: &'a str,
  resolver_base: &str,
) -> Option<&'a str> {
  let base = resolver_base.trim_end_matches('/');
  let head = base.get(..8)?;
  if !head.eq_ignore_ascii_case("https://") {
    return None;
  }
  let prefix = token.get(..base.len())?;
  if !prefix.eq_ignore_ascii_case(base) {
    return None;
  }
  let rest = token[base.len()..].strip_prefix('/')?;
  Some(rest.strip_suffix('/').unwrap_or(rest))
}

/// Accept only the canonical 8-4-4-4-12 hex shape, then parse.
fn parse_uuid_shape(s: &str) -> Option<Uuid> {
  let bytes = s.as_bytes();
  if bytes.len() != 36 {
    return None;
  }
  let shaped = bytes.iter().enumerate().all(|(i, b)| match i {
    8 | 13 | 18 | 23 => *b == b'-',
    _ => b.is_ascii_hexdigit(),
  });
  if !shaped {
    return None;
  }
  Uuid::parse_str(s).ok()
}

#[cfg(test)]
mod tests {
  use super::*;

  const ID: &str = "4ff7ed97-b78f-4ae6-9011-5af714ee241c";
  const BASE: &str = "https://anchorid.net/resolve";

  fn extract(token: &str) -> Option<Uuid> { extract_uuid(token, BASE) }

  fn id() -> Uuid { Uuid::parse_str(ID).unwrap() }

  #[test]
  fn normalization_rules() {
    assert_eq!(
      normalize_txt(&format!("  \"anchor=urn:uuid:{ID}\"  ")),
      format!("anchor=urn:uuid:{ID}")
    );
    assert_eq!(normalize_txt("ANCHOR=abc"), "anchor=abc");
    assert_eq!(normalize_txt("Anchor=x \t\n y"), "anchor=x y");
    // Only one pair of quotes is stripped.
    assert_eq!(normalize_txt("\"\"x\"\""), "\"x\"");
    // Whitespace just inside the quotes is collapsed, not trimmed.
    assert_eq!(normalize_txt("\"  x  \""), " x ");
    assert_eq!(normalize_txt("\""), "\"");
  }

  #[test]
  fn every_accepted_form_extracts_the_same_uuid() {
    let canonical = format!("https://anchorid.net/resolve/{ID}");
    for token in accepted_tokens(id(), &canonical) {
      assert_eq!(
        extract(&normalize_txt(&token)),
        Some(id()),
        "failed for {token}"
      );
    }
  }

  #[test]
  fn extraction_is_case_insensitive_on_prefixes_and_hex() {
    let upper = ID.to_uppercase();
    assert_eq!(
      extract(&normalize_txt(&format!("ANCHOR=URN:UUID:{upper}"))),
      Some(id())
    );
    assert_eq!(extract(&format!("URN:uuid:{ID}")), Some(id()));
  }

  #[test]
  fn resolver_url_must_sit_under_the_configured_base() {
    assert_eq!(
      extract(&format!("https://anchorid.net/resolve/{ID}/")),
      Some(id())
    );
    assert_eq!(
      extract(&format!("HTTPS://AnchorID.net/resolve/{ID}")),
      Some(id())
    );
    assert_eq!(extract(&format!("https://evil.example/whatever/{ID}")), None);
    assert_eq!(extract(&format!("http://anchorid.net/resolve/{ID}")), None);
    assert_eq!(extract(&format!("https://anchorid.net/resolve/x/{ID}")), None);
    assert_eq!(extract(&format!("https://anchorid.net/resolver/{ID}")), None);
    assert_eq!(extract(&format!("ftp://anchorid.net/{ID}")), None);
  }

  #[test]
  fn plain_http_resolver_base_accepts_no_urls() {
    let token = format!("http://anchorid.net/resolve/{ID}");
    assert_eq!(extract_uuid(&token, "http://anchorid.net/resolve"), None);
  }

  #[test]
  fn malformed_uuids_are_rejected() {
    assert_eq!(extract("anchor=urn:uuid:not-a-uuid"), None);
    // Simple (unhyphenated) form is valid for `Uuid::parse_str` but not the
    // accepted shape.
    assert_eq!(extract("anchor=4ff7ed97b78f4ae690115af714ee241c"), None);
    assert_eq!(extract(&format!("anchor={ID}x")), None);
    assert_eq!(extract(ID), None);
  }

  #[test]
  fn expected_token_is_lowercase_urn_form() {
    let upper = Uuid::parse_str(&ID.to_uppercase()).unwrap();
    assert_eq!(expected_token(upper), format!("anchor=urn:uuid:{ID}"));
  }
}
