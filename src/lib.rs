//! Proxy Sieve - multi-threaded proxy list validator
//!
//! Parses proxy descriptors in several notations, probes each one with a
//! test request and sorts them into valid and invalid lists.

pub mod error;
pub mod proxy;
pub mod tui;

pub use error::SieveError;
pub use proxy::*;

/// Application result type
pub type Result<T> = anyhow::Result<T>;
