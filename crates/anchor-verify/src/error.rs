//! Error type for `anchor-verify`.
//!
//! Only caller-input problems and infrastructure faults end up here. A claim
//! that fails verification is returned normally with `status = failed`.

use anchor_core::claim::ClaimId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] anchor_core::Error),

  #[error("claim not found: {0}")]
  ClaimNotFound(ClaimId),

  #[error("invalid endpoint url: {0:?}")]
  InvalidEndpoint(String),

  #[error("failed to build HTTP client: {0}")]
  Client(#[from] reqwest::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub(crate) fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
