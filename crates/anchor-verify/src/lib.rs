//! Network verification for Anchor claims.
//!
//! - [`doh`] resolves TXT records over DNS-over-HTTPS with one bounded retry.
//! - [`cache`] wraps a TXT source in a TTL-aware success/failure cache.
//! - [`fetch`] fetches HTTP proofs, re-checking every redirect hop against
//!   the SSRF guard.
//! - [`dispatch`] runs the type-appropriate check for a claim and records a
//!   terminal status.
//! - [`service`] is the caller-facing entry point: it validates ids, talks to
//!   the stores, and drives the dispatcher and the profile canonicalizer.
//!
//! Verification failures are data, not errors. They come back as a claim in
//! the `failed` state with a [`FailReason`](anchor_core::reason::FailReason).

pub mod cache;
pub mod dispatch;
pub mod doh;
pub mod error;
pub mod fetch;
pub mod service;

pub use cache::{CachedResolver, TxtResolver};
pub use dispatch::Verifier;
pub use doh::{DohClient, DohConfig};
pub use error::{Error, Result};
pub use fetch::{FetchConfig, HttpFetcher};
pub use service::ClaimService;

/// `User-Agent` sent with every outbound request.
pub const USER_AGENT: &str = concat!("AnchorVerify/", env!("CARGO_PKG_VERSION"));
