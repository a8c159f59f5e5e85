//! Error types for `anchor-core`.
//!
//! These are caller-input errors only. A claim that fails verification is not
//! an error; its outcome is recorded as a [`FailReason`](crate::reason::FailReason).

use thiserror::Error;

use crate::{claim::ClaimType, ssrf::SsrfRejection};

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid subject id: {0:?}")]
  InvalidSubjectId(String),

  #[error("invalid claim id: {0:?}")]
  InvalidClaimId(String),

  #[error("unknown claim type: {0:?}")]
  UnknownClaimType(String),

  #[error("invalid {claim_type} target: {target:?}")]
  InvalidTarget {
    claim_type: ClaimType,
    target:     String,
  },

  #[error(transparent)]
  Blocked(#[from] SsrfRejection),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
