//! HTTP proof fetching.
//!
//! The caller is expected to have passed the initial URL through
//! [`ssrf::guard`]. Redirects are followed up to a fixed hop limit and every
//! hop is re-checked, so a permitted host cannot bounce the fetch onto an
//! internal address. Bodies larger than [`FetchConfig::max_body_bytes`] are
//! refused.

use std::{future::Future, time::Duration};

use anchor_core::{
  reason::FailReason,
  ssrf::{self, SsrfRejection},
};
use reqwest::{Client, redirect};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::{Result, USER_AGENT};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
  pub timeout_secs:   u64,
  pub max_redirects:  usize,
  pub max_body_bytes: usize,
}

impl Default for FetchConfig {
  fn default() -> Self {
    Self {
      timeout_secs:   10,
      max_redirects:  5,
      max_body_bytes: 1024 * 1024,
    }
  }
}

/// The final response of a fetch, after redirects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
  pub status: u16,
  pub body:   String,
}

impl FetchedPage {
  pub fn is_success(&self) -> bool { (200..300).contains(&self.status) }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
  #[error("request timed out")]
  Timeout,

  #[error(transparent)]
  Blocked(SsrfRejection),

  #[error("network error: {0}")]
  Network(String),

  #[error("unexpected fetch failure: {0}")]
  Unexpected(String),
}

impl FetchError {
  /// The failure code recorded on the claim.
  pub fn reason(&self) -> FailReason {
    match self {
      Self::Timeout => FailReason::Timeout,
      Self::Blocked(rejection) => FailReason::BlockedUrl(rejection.reason),
      Self::Network(detail) => FailReason::FetchError(detail.clone()),
      Self::Unexpected(message) => FailReason::VerifyError(message.clone()),
    }
  }
}

/// Anything that can fetch a proof document.
pub trait ProofFetcher: Send + Sync {
  fn fetch_text<'a>(
    &'a self,
    url: &'a Url,
  ) -> impl Future<Output = Result<FetchedPage, FetchError>> + Send + 'a;
}

#[derive(Debug, Error)]
#[error("stopped after {0} redirects")]
struct TooManyRedirects(usize);

/// [`ProofFetcher`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
  client:         Client,
  max_body_bytes: usize,
}

impl HttpFetcher {
  pub fn new(config: &FetchConfig) -> Result<Self> {
    let max_redirects = config.max_redirects;
    let policy = redirect::Policy::custom(move |attempt| {
      if attempt.previous().len() > max_redirects {
        let hops = attempt.previous().len();
        return attempt.error(TooManyRedirects(hops));
      }
      match ssrf::guard(attempt.url()) {
        Ok(()) => attempt.follow(),
        Err(rejection) => attempt.error(rejection),
      }
    });

    let client = Client::builder()
      .user_agent(USER_AGENT)
      .timeout(Duration::from_secs(config.timeout_secs))
      .redirect(policy)
      .build()?;
    Ok(Self {
      client,
      max_body_bytes: config.max_body_bytes,
    })
  }

  #[instrument(skip(self), fields(url = %url))]
  async fn get(&self, url: &Url) -> Result<FetchedPage, FetchError> {
    let mut response = self
      .client
      .get(url.clone())
      .send()
      .await
      .map_err(|e| classify(&e))?;
    let status = response.status().as_u16();

    if response
      .content_length()
      .is_some_and(|len| len > self.max_body_bytes as u64)
    {
      return Err(too_large());
    }

    let mut buf = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(|e| classify(&e))? {
      if buf.len() + chunk.len() > self.max_body_bytes {
        return Err(too_large());
      }
      buf.extend_from_slice(&chunk);
    }

    let body = String::from_utf8_lossy(&buf).into_owned();
    debug!(status, bytes = buf.len(), "fetched proof document");
    Ok(FetchedPage { status, body })
  }
}

impl ProofFetcher for HttpFetcher {
  async fn fetch_text(&self, url: &Url) -> Result<FetchedPage, FetchError> {
    self.get(url).await
  }
}

fn too_large() -> FetchError { FetchError::Network("body_too_large".into()) }

fn classify(e: &reqwest::Error) -> FetchError {
  if let Some(rejection) = find_source::<SsrfRejection>(e) {
    return FetchError::Blocked(rejection.clone());
  }
  if e.is_timeout() {
    FetchError::Timeout
  } else if e.is_redirect() {
    FetchError::Network("redirect".into())
  } else if e.is_connect() {
    FetchError::Network("connect".into())
  } else if e.is_body() || e.is_decode() {
    FetchError::Network("body".into())
  } else if e.is_request() {
    FetchError::Network("request".into())
  } else {
    FetchError::Unexpected(e.to_string())
  }
}

fn find_source<'e, T>(e: &'e (dyn std::error::Error + 'static)) -> Option<&'e T>
where
  T: std::error::Error + 'static,
{
  let mut current = Some(e);
  while let Some(err) = current {
    if let Some(found) = err.downcast_ref::<T>() {
      return Some(found);
    }
    current = err.source();
  }
  None
}
