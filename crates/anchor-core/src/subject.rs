//! Subject identifiers.
//!
//! A subject is whoever owns claims and an identity record. It is known to
//! the engine only by its UUID.

use uuid::Uuid;

use crate::{Error, Result};

/// Parse a caller-supplied subject id.
///
/// Only the hyphenated form is accepted, in either case; the engine always
/// renders it lowercased.
pub fn parse_subject_id(raw: &str) -> Result<Uuid> {
  let trimmed = raw.trim();
  if trimmed.len() != 36 {
    return Err(Error::InvalidSubjectId(raw.to_owned()));
  }
  Uuid::parse_str(trimmed).map_err(|_| Error::InvalidSubjectId(raw.to_owned()))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn accepts_hyphenated_uuids() {
    let id = parse_subject_id(" 4FF7ED97-B78F-4AE6-9011-5AF714EE241C ").unwrap();
    assert_eq!(id.to_string(), "4ff7ed97-b78f-4ae6-9011-5af714ee241c");
  }

  #[test]
  fn rejects_everything_else() {
    for raw in ["", "nope", "4ff7ed97b78f4ae690115af714ee241c", "urn:uuid:x"] {
      assert!(matches!(
        parse_subject_id(raw),
        Err(Error::InvalidSubjectId(_))
      ));
    }
  }
}
