//! Identity records and their deterministic canonicalization.
//!
//! A record is rebuilt from `(subject, stored record, edit, verified URLs)`
//! every time it is written or rendered. The build is deterministic: the same
//! inputs always yield a structurally identical record, so a no-op edit never
//! moves `dateModified`.
//!
//! `sameAs` exists in two flavours. The *manual* set is what the subject
//! declared and is what gets stored. The *effective* set is
//! `manual ∪ verified` and is computed on every build for public rendering.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
  Result,
  config::EngineConfig,
  normalize::{
    ListInput, dedupe_in_order, normalize_host, normalize_url,
    normalize_url_list, sorted_urls,
  },
};

// ─── Record ──────────────────────────────────────────────────────────────────

/// The kind of entity a record describes. Fixed on first write.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
pub enum EntityType {
  #[default]
  Person,
  Organization,
}

/// A reference to another entity by its resolved URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
  pub id: String,
}

/// A reference as submitted: a raw identifier (UUID or URL) or a pre-formed
/// `{"id": ...}` reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RefInput {
  Identifier(String),
  Reference(EntityRef),
}

/// The canonical, storable identity document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
  pub id:             String,
  #[serde(rename = "type")]
  pub entity_type:    EntityType,
  pub identifier:     String,
  pub date_created:   DateTime<Utc>,
  pub date_modified:  DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name:           Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub alternate_name: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description:    Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub url:            Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub same_as:        Vec<String>,
  /// Organizations only.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub founder:        Vec<EntityRef>,
  /// People only.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub affiliation:    Vec<EntityRef>,
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// An edit submitted by the subject. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileEdit {
  /// Honoured on first write only.
  #[serde(rename = "type")]
  pub entity_type:    Option<EntityType>,
  pub name:           Option<String>,
  pub alternate_name: Option<ListInput>,
  pub description:    Option<String>,
  pub url:            Option<String>,
  /// When present, replaces the stored manual `sameAs` set wholesale.
  pub same_as:        Option<ListInput>,
  pub founder:        Option<Vec<RefInput>>,
  pub affiliation:    Option<Vec<RefInput>>,
}

/// Everything a build reads.
#[derive(Debug, Clone, Copy)]
pub struct ProfileInput<'a> {
  pub subject_id:    Uuid,
  pub stored:        Option<&'a IdentityRecord>,
  /// `Some` for a write build, `None` for a read (render) build.
  pub edit:          Option<&'a ProfileEdit>,
  pub verified_urls: &'a [String],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanonicalizeOptions {
  /// Advance `dateModified` on a write even when nothing changed.
  pub force_bump:               bool,
  /// On read builds, keep both stored timestamps verbatim.
  pub preserve_read_timestamps: bool,
}

impl Default for CanonicalizeOptions {
  fn default() -> Self {
    Self {
      force_bump:               false,
      preserve_read_timestamps: true,
    }
  }
}

/// The result of a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalProfile {
  pub record:            IdentityRecord,
  /// Whether persisting `record` would change stored state.
  pub changed:           bool,
  pub effective_same_as: Vec<String>,
}

impl CanonicalProfile {
  /// The record as rendered publicly, with the effective `sameAs` set.
  pub fn public_record(&self) -> IdentityRecord {
    IdentityRecord {
      same_as: self.effective_same_as.clone(),
      ..self.record.clone()
    }
  }
}

// ─── Build ───────────────────────────────────────────────────────────────────

/// Build the canonical record for `input` at time `now`.
pub fn canonicalize(
  input: ProfileInput<'_>,
  config: &EngineConfig,
  options: CanonicalizeOptions,
  now: DateTime<Utc>,
) -> Result<CanonicalProfile> {
  let ProfileInput {
    subject_id,
    stored,
    edit,
    verified_urls,
  } = input;

  let entity_type = stored
    .map(|r| r.entity_type)
    .or_else(|| edit.and_then(|e| e.entity_type))
    .unwrap_or_default();

  let name = pick_scalar(
    edit.and_then(|e| e.name.as_deref()),
    stored.and_then(|r| r.name.as_deref()),
  );
  let description = pick_scalar(
    edit.and_then(|e| e.description.as_deref()),
    stored.and_then(|r| r.description.as_deref()),
  );
  let url = edit
    .and_then(|e| e.url.as_deref())
    .and_then(normalize_url)
    .or_else(|| stored.and_then(|r| r.url.clone()));

  let alternate_name = match edit.and_then(|e| e.alternate_name.as_ref()) {
    Some(names) => dedupe_in_order(names),
    None => stored.map(|r| r.alternate_name.clone()).unwrap_or_default(),
  };

  let manual = match edit.and_then(|e| e.same_as.as_ref()) {
    Some(links) => normalize_url_list(links),
    None => stored
      .map(|r| sorted_urls(r.same_as.iter().map(String::as_str)))
      .unwrap_or_default(),
  };
  let effective_same_as = sorted_urls(
    manual
      .iter()
      .chain(verified_urls.iter())
      .map(String::as_str),
  );
  let persisted = if config.persist_effective_same_as {
    &effective_same_as
  } else {
    &manual
  };
  let stored_same_as: Vec<String> = persisted
    .iter()
    .filter(|link| !is_self_link(link, config))
    .cloned()
    .collect();

  let founder_src = edit
    .and_then(|e| e.founder.clone())
    .or_else(|| stored.map(|r| as_ref_inputs(&r.founder)));
  let affiliation_src = edit
    .and_then(|e| e.affiliation.clone())
    .or_else(|| stored.map(|r| as_ref_inputs(&r.affiliation)));
  let (founder, affiliation) = match entity_type {
    EntityType::Organization => {
      (resolve_refs(founder_src.as_deref(), config), Vec::new())
    }
    EntityType::Person => {
      (Vec::new(), resolve_refs(affiliation_src.as_deref(), config))
    }
  };

  let date_created = stored.map(|r| r.date_created).unwrap_or(now);
  let mut record = IdentityRecord {
    id: config.canonical_url(subject_id),
    entity_type,
    identifier: subject_id.hyphenated().to_string(),
    date_created,
    date_modified: stored.map(|r| r.date_modified).unwrap_or(now),
    name,
    alternate_name,
    description,
    url,
    same_as: stored_same_as,
    founder,
    affiliation,
  };

  let differs = match stored {
    Some(previous) => !structurally_equal(&record, previous)?,
    None => true,
  };

  let is_write = edit.is_some();
  let changed = if is_write {
    let changed = differs || options.force_bump;
    if changed {
      record.date_modified = now;
    }
    changed
  } else if options.preserve_read_timestamps || stored.is_none() {
    differs
  } else {
    if differs {
      record.date_modified = now;
    }
    differs
  };

  Ok(CanonicalProfile {
    record,
    changed,
    effective_same_as,
  })
}

/// Edit wins if present and non-empty after trimming; else keep stored.
fn pick_scalar(edit: Option<&str>, stored: Option<&str>) -> Option<String> {
  edit
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .or(stored)
    .map(str::to_owned)
}

fn is_self_link(link: &str, config: &EngineConfig) -> bool {
  normalize_host(link).is_some_and(|host| config.is_own_host(&host))
}

fn as_ref_inputs(refs: &[EntityRef]) -> Vec<RefInput> {
  refs.iter().cloned().map(RefInput::Reference).collect()
}

/// Resolve references, dropping unresolvable ones and duplicates by resolved
/// URL while keeping first-seen order.
fn resolve_refs(
  inputs: Option<&[RefInput]>,
  config: &EngineConfig,
) -> Vec<EntityRef> {
  let mut seen = HashSet::new();
  inputs
    .unwrap_or_default()
    .iter()
    .filter_map(|input| match input {
      RefInput::Identifier(raw) => resolve_identifier(raw, config),
      RefInput::Reference(r) => normalize_url(&r.id),
    })
    .filter(|id| seen.insert(id.clone()))
    .map(|id| EntityRef { id })
    .collect()
}

/// A bare UUID becomes the canonical resolver URL; anything URL-shaped is
/// normalized.
fn resolve_identifier(raw: &str, config: &EngineConfig) -> Option<String> {
  let raw = raw.trim();
  if let Ok(id) = Uuid::parse_str(raw) {
    return Some(config.canonical_url(id));
  }
  if raw.contains("://") {
    return normalize_url(raw);
  }
  None
}

// ─── Structural comparison ───────────────────────────────────────────────────

/// Compare two records ignoring `dateModified`, key order, and the
/// difference between an absent list and an empty one.
pub fn structurally_equal(
  a: &IdentityRecord,
  b: &IdentityRecord,
) -> Result<bool> {
  Ok(structural_key(a)? == structural_key(b)?)
}

/// `Value` maps are ordered by key, so equality ignores field order.
fn structural_key(record: &IdentityRecord) -> Result<Value> {
  let mut value = serde_json::to_value(record)?;
  if let Value::Object(map) = &mut value {
    map.remove("dateModified");
  }
  strip_empty_arrays(&mut value);
  Ok(value)
}

fn strip_empty_arrays(value: &mut Value) {
  match value {
    Value::Object(map) => {
      map.retain(|_, v| !matches!(v, Value::Array(items) if items.is_empty()));
      map.values_mut().for_each(strip_empty_arrays);
    }
    Value::Array(items) => items.iter_mut().for_each(strip_empty_arrays),
    _ => {}
  }
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone};
  use serde_json::json;

  use super::*;

  const ID: &str = "4ff7ed97-b78f-4ae6-9011-5af714ee241c";
  const ORG: &str = "0b6a3f5e-4c2d-4e8f-9a1b-2c3d4e5f6a7b";

  fn subject() -> Uuid { Uuid::parse_str(ID).unwrap() }

  fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
  }

  fn build(
    stored: Option<&IdentityRecord>,
    edit: Option<&ProfileEdit>,
    verified: &[String],
    now: DateTime<Utc>,
  ) -> CanonicalProfile {
    canonicalize(
      ProfileInput {
        subject_id: subject(),
        stored,
        edit,
        verified_urls: verified,
      },
      &EngineConfig::default(),
      CanonicalizeOptions::default(),
      now,
    )
    .unwrap()
  }

  fn first_edit() -> ProfileEdit {
    ProfileEdit {
      name: Some("  Alice Example ".into()),
      alternate_name: Some(ListInput::Delimited("Al, Ali\nAl".into())),
      url: Some("Alice.example/".into()),
      same_as: Some(ListInput::Many(vec![
        "https://b.example/alice/".into(),
        "a.example/alice".into(),
      ])),
      ..Default::default()
    }
  }

  #[test]
  fn first_write_sets_both_timestamps() {
    let out = build(None, Some(&first_edit()), &[], t0());
    assert!(out.changed);
    assert_eq!(out.record.date_created, t0());
    assert_eq!(out.record.date_modified, t0());
    assert_eq!(out.record.name.as_deref(), Some("Alice Example"));
    assert_eq!(out.record.url.as_deref(), Some("https://alice.example"));
    assert_eq!(out.record.alternate_name, vec!["Al", "Ali"]);
    assert_eq!(out.record.id, format!("https://anchorid.net/resolve/{ID}"));
    assert_eq!(out.record.identifier, ID);
    assert_eq!(out.record.same_as, vec![
      "https://a.example/alice",
      "https://b.example/alice"
    ]);
  }

  #[test]
  fn identical_rewrite_is_a_no_op() {
    let first = build(None, Some(&first_edit()), &[], t0()).record;
    let later = t0() + Duration::hours(3);
    let again = build(Some(&first), Some(&first_edit()), &[], later);
    assert!(!again.changed);
    assert_eq!(again.record.date_modified, t0());
    assert_eq!(again.record, first);
  }

  #[test]
  fn real_change_bumps_modified_but_not_created() {
    let first = build(None, Some(&first_edit()), &[], t0()).record;
    let later = t0() + Duration::hours(3);
    let edit = ProfileEdit {
      description: Some("Builds things.".into()),
      ..Default::default()
    };
    let out = build(Some(&first), Some(&edit), &[], later);
    assert!(out.changed);
    assert_eq!(out.record.date_created, t0());
    assert_eq!(out.record.date_modified, later);
    // Fields absent from the edit are kept.
    assert_eq!(out.record.name.as_deref(), Some("Alice Example"));
    assert_eq!(out.record.same_as.len(), 2);
  }

  #[test]
  fn force_bump_advances_modified() {
    let first = build(None, Some(&first_edit()), &[], t0()).record;
    let later = t0() + Duration::minutes(1);
    let out = canonicalize(
      ProfileInput {
        subject_id:    subject(),
        stored:        Some(&first),
        edit:          Some(&first_edit()),
        verified_urls: &[],
      },
      &EngineConfig::default(),
      CanonicalizeOptions {
        force_bump: true,
        ..Default::default()
      },
      later,
    )
    .unwrap();
    assert!(out.changed);
    assert_eq!(out.record.date_modified, later);
  }

  #[test]
  fn blank_and_invalid_edits_fall_back_to_stored() {
    let first = build(None, Some(&first_edit()), &[], t0()).record;
    let edit = ProfileEdit {
      name: Some("   ".into()),
      url: Some("not a url at all".into()),
      ..Default::default()
    };
    let out = build(Some(&first), Some(&edit), &[], t0() + Duration::hours(1));
    assert!(!out.changed);
    assert_eq!(out.record.name.as_deref(), Some("Alice Example"));
    assert_eq!(out.record.url.as_deref(), Some("https://alice.example"));
  }

  #[test]
  fn effective_same_as_is_a_sorted_union() {
    let manual = vec!["https://b.example".to_owned(), "c.example/".to_owned()];
    let verified = vec![
      "https://A.example/".to_owned(),
      "https://c.example".to_owned(),
    ];
    let edit = ProfileEdit {
      same_as: Some(ListInput::Many(manual)),
      ..Default::default()
    };
    let out = build(None, Some(&edit), &verified, t0());

    assert_eq!(out.effective_same_as, vec![
      "https://a.example",
      "https://b.example",
      "https://c.example",
    ]);
    // Only the manual set is stored.
    assert_eq!(out.record.same_as, vec![
      "https://b.example",
      "https://c.example"
    ]);
    assert_eq!(out.public_record().same_as, out.effective_same_as);
  }

  #[test]
  fn self_links_are_kept_out_of_storage_only() {
    let edit = ProfileEdit {
      same_as: Some(ListInput::Many(vec![
        format!("https://anchorid.net/resolve/{ID}"),
        "https://example.com".into(),
      ])),
      ..Default::default()
    };
    let out = build(None, Some(&edit), &[], t0());
    assert_eq!(out.record.same_as, vec!["https://example.com"]);
    assert_eq!(out.effective_same_as.len(), 2);
  }

  #[test]
  fn persisting_effective_same_as_is_opt_in() {
    let config = EngineConfig {
      persist_effective_same_as: true,
      ..Default::default()
    };
    let verified = vec!["https://v.example".to_owned()];
    let out = canonicalize(
      ProfileInput {
        subject_id:    subject(),
        stored:        None,
        edit:          Some(&ProfileEdit::default()),
        verified_urls: &verified,
      },
      &config,
      CanonicalizeOptions::default(),
      t0(),
    )
    .unwrap();
    assert_eq!(out.record.same_as, vec!["https://v.example"]);
  }

  #[test]
  fn read_build_preserves_stored_timestamps() {
    let first = build(None, Some(&first_edit()), &[], t0()).record;
    let later = t0() + Duration::days(2);
    let verified = vec!["https://verified.example".to_owned()];
    let out = build(Some(&first), None, &verified, later);

    assert!(!out.changed);
    assert_eq!(out.record.date_created, t0());
    assert_eq!(out.record.date_modified, t0());
    assert!(
      out
        .effective_same_as
        .contains(&"https://verified.example".to_owned())
    );
  }

  #[test]
  fn entity_type_is_fixed_on_first_write() {
    let org_edit = ProfileEdit {
      entity_type: Some(EntityType::Organization),
      founder: Some(vec![
        RefInput::Identifier(ID.into()),
        RefInput::Reference(EntityRef {
          id: format!("https://anchorid.net/resolve/{ID}/"),
        }),
        RefInput::Identifier("https://people.example/bob".into()),
        RefInput::Identifier("nonsense".into()),
      ]),
      ..Default::default()
    };
    let org = build(None, Some(&org_edit), &[], t0()).record;
    assert_eq!(org.entity_type, EntityType::Organization);
    assert_eq!(org.founder, vec![
      EntityRef {
        id: format!("https://anchorid.net/resolve/{ID}"),
      },
      EntityRef {
        id: "https://people.example/bob".into(),
      },
    ]);

    let flip = ProfileEdit {
      entity_type: Some(EntityType::Person),
      affiliation: Some(vec![RefInput::Identifier(ORG.into())]),
      ..Default::default()
    };
    let out = build(Some(&org), Some(&flip), &[], t0() + Duration::hours(1));
    assert_eq!(out.record.entity_type, EntityType::Organization);
    assert!(out.record.affiliation.is_empty());
    assert_eq!(out.record.founder.len(), 2);
    assert!(!out.changed);
  }

  #[test]
  fn structural_equality_ignores_empty_lists_and_key_order() {
    let stored: IdentityRecord = serde_json::from_value(json!({
      "id": format!("https://anchorid.net/resolve/{ID}"),
      "type": "Person",
      "identifier": ID,
      "dateCreated": "2024-05-01T12:00:00Z",
      "dateModified": "2024-05-01T12:00:00Z",
      "sameAs": [],
      "name": "Alice"
    }))
    .unwrap();
    let other = IdentityRecord {
      date_modified: t0() + Duration::days(1),
      ..stored.clone()
    };
    assert!(structurally_equal(&stored, &other).unwrap());

    let renamed = IdentityRecord {
      name: Some("Alicia".into()),
      ..stored.clone()
    };
    assert!(!structurally_equal(&stored, &renamed).unwrap());
  }

  #[test]
  fn structural_equality_keeps_list_order() {
    let stored = build(None, Some(&first_edit()), &[], t0()).record;
    assert_eq!(stored.alternate_name, vec!["Al", "Ali"]);

    let reordered = IdentityRecord {
      alternate_name: vec!["Ali".into(), "Al".into()],
      ..stored.clone()
    };
    assert!(!structurally_equal(&stored, &reordered).unwrap());
  }

  #[test]
  fn record_json_omits_empty_fields() {
    let out = build(None, Some(&ProfileEdit::default()), &[], t0());
    let json = serde_json::to_value(&out.record).unwrap();
    assert_eq!(json["type"], "Person");
    assert_eq!(json["dateCreated"], "2024-05-01T12:00:00Z");
    assert!(json.get("sameAs").is_none());
    assert!(json.get("name").is_none());
  }
}
