//! SQLite backend for Anchor.
//!
//! One [`SqliteStore`] serves all three storage roles: the TTL-bounded
//! key-value cache, per-subject claim lists and identity records. Access
//! runs through [`tokio_rusqlite`] so queries never block the async runtime.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
