//! Error types for public key acquisition.

use thiserror::Error;

use crate::cluster::AccessError;

/// Errors produced while fetching or parsing the controller's public key.
///
/// The type is `Clone` because the resolver keeps the last error and hands it
/// back on later calls.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The cluster read failed.
    #[error("Failed to fetch controller certificate: {0}")]
    Fetch(#[from] AccessError),

    /// The response is not well-formed PEM.
    #[error("Invalid PEM data: {message}")]
    Pem { message: String },

    /// A certificate block could not be parsed as X.509.
    #[error("Invalid certificate: {message}")]
    Certificate { message: String },

    /// The PEM data carried no certificate blocks.
    #[error("Data does not contain any valid certificates")]
    NoCertificates,

    /// The first certificate carries a key that cannot be used for sealing.
    #[error("Expected RSA public key, got key with algorithm {algorithm}")]
    UnsupportedKeyType { algorithm: String },

    /// The caller cancelled the fetch.
    #[error("Public key fetch was cancelled")]
    Cancelled,
}

impl ResolveError {
    /// Create a PEM error.
    pub fn pem(message: impl Into<String>) -> Self {
        Self::Pem { message: message.into() }
    }

    /// Create a certificate error.
    pub fn certificate(message: impl Into<String>) -> Self {
        Self::Certificate { message: message.into() }
    }

    /// Create an unsupported key type error.
    pub fn unsupported_key_type(algorithm: impl Into<String>) -> Self {
        Self::UnsupportedKeyType { algorithm: algorithm.into() }
    }

    /// Whether the resolver should fetch again on the next call.
    ///
    /// Only transport-level "not found" and "service unavailable" qualify. Parse
    /// and key type failures stay terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch(err) if err.is_retryable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(ResolveError::from(AccessError::not_found("svc")).is_retryable());
        assert!(ResolveError::from(AccessError::service_unavailable("svc")).is_retryable());
        assert!(!ResolveError::from(AccessError::other("refused")).is_retryable());
        assert!(!ResolveError::pem("garbage").is_retryable());
        assert!(!ResolveError::certificate("truncated").is_retryable());
        assert!(!ResolveError::NoCertificates.is_retryable());
        assert!(!ResolveError::unsupported_key_type("1.2.840.10045.2.1").is_retryable());
        assert!(!ResolveError::Cancelled.is_retryable());
    }

    #[test]
    fn test_error_display_identifies_operation() {
        let err = ResolveError::from(AccessError::not_found("no such service"));
        assert!(err.to_string().starts_with("Failed to fetch controller certificate"));

        let err = ResolveError::unsupported_key_type("1.2.840.10045.2.1");
        assert!(err.to_string().contains("Expected RSA public key"));
    }
}
