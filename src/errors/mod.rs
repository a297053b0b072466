//! # Error Handling
//!
//! Each pipeline stage has its own error type next to its code
//! ([`AccessError`](crate::cluster::AccessError),
//! [`ResolveError`](crate::keys::ResolveError),
//! [`BuildError`](crate::secret::BuildError),
//! [`SealError`](crate::seal::SealError)). [`SealedSecretError`] wraps them for
//! callers that drive the whole pipeline, plus configuration and I/O failures.

pub mod types;

pub use types::{Result, SealedSecretError};

/// Short alias used across the crate.
pub type Error = SealedSecretError;
