//! Core types and algorithms for the Anchor claims engine.
//!
//! This crate has no HTTP or database dependencies. It
//! defines what a claim and its proof look like, how user-supplied URLs are
//! canonicalized, which fetch targets are refused, and how a subject's
//! identity record is rebuilt deterministically. Network verification lives
//! in `anchor-verify`; storage backends implement the traits in [`store`].

pub mod claim;
pub mod config;
pub mod error;
pub mod normalize;
pub mod profile;
pub mod proof;
pub mod reason;
pub mod ssrf;
pub mod store;
pub mod subject;
pub mod token;

pub use error::{Error, Result};
