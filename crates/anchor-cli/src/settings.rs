//! Operator configuration.
//!
//! Read from an optional TOML file, then overlaid with `ANCHOR_*`
//! environment variables (`ANCHOR_STORE_PATH`, `ANCHOR_DOH_ENDPOINT`, ...).

use std::path::{Path, PathBuf};

use anchor_core::config::EngineConfig;
use anchor_verify::{DohConfig, FetchConfig};
use anyhow::Context as _;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
  pub store_path:                PathBuf,
  pub resolver_base:             String,
  pub proof_file:                String,
  pub dns_label:                 String,
  pub code_host:                 String,
  pub raw_content_base:          String,
  pub persist_effective_same_as: bool,
  pub doh_endpoint:              String,
  pub doh_timeout_ms:            u64,
  pub doh_retry_backoff_ms:      u64,
  pub fetch_timeout_secs:        u64,
  pub fetch_max_body_bytes:      usize,
}

impl Default for AppConfig {
  fn default() -> Self {
    let engine = EngineConfig::default();
    let doh = DohConfig::default();
    let fetch = FetchConfig::default();
    Self {
      store_path:                PathBuf::from("~/.local/share/anchor/anchor.db"),
      resolver_base:             engine.resolver_base,
      proof_file:                engine.proof_file,
      dns_label:                 engine.dns_label,
      code_host:                 engine.code_host,
      raw_content_base:          engine.raw_content_base,
      persist_effective_same_as: engine.persist_effective_same_as,
      doh_endpoint:              doh.endpoint,
      doh_timeout_ms:            doh.timeout_ms,
      doh_retry_backoff_ms:      doh.retry_backoff_ms,
      fetch_timeout_secs:        fetch.timeout_secs,
      fetch_max_body_bytes:      fetch.max_body_bytes,
    }
  }
}

impl AppConfig {
  /// Layer `path` (if it exists) under the process environment.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("ANCHOR"))
      .build()
      .context("failed to read config file")?
      .try_deserialize()
      .context("failed to deserialise AppConfig")
  }

  pub fn engine(&self) -> EngineConfig {
    EngineConfig {
      resolver_base:             self.resolver_base.clone(),
      proof_file:                self.proof_file.clone(),
      dns_label:                 self.dns_label.clone(),
      code_host:                 self.code_host.clone(),
      raw_content_base:          self.raw_content_base.clone(),
      persist_effective_same_as: self.persist_effective_same_as,
    }
  }

  pub fn doh(&self) -> DohConfig {
    DohConfig {
      endpoint:         self.doh_endpoint.clone(),
      timeout_ms:       self.doh_timeout_ms,
      retry_backoff_ms: self.doh_retry_backoff_ms,
    }
  }

  pub fn fetch(&self) -> FetchConfig {
    FetchConfig {
      timeout_secs:   self.fetch_timeout_secs,
      max_body_bytes: self.fetch_max_body_bytes,
      ..FetchConfig::default()
    }
  }

  /// `store_path` with a leading `~` expanded.
  pub fn store_path(&self) -> PathBuf { expand_tilde(&self.store_path) }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
