//! Cluster access capability.
//!
//! The key resolver only ever needs one thing from the cluster: an authenticated
//! read of a path served by the sealing controller's service. That is modelled as
//! the narrow [`ClusterAccessor`] trait so the resolver never depends on a wider
//! cluster client surface. [`KubeServiceProxy`] is the HTTP implementation that
//! goes through the Kubernetes API server's service proxy.
//!
//! Errors are classified into [`AccessError`] variants; only "not found" and
//! "service unavailable" are retryable, which is what the resolver keys its lazy
//! re-fetch on.

pub mod proxy;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

pub use proxy::{ClusterConfig, KubeServiceProxy, DEFAULT_REQUEST_TIMEOUT};

/// Classified failure of a cluster read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// The controller service or the requested path does not exist (yet).
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// The controller exists but is not ready to serve requests.
    #[error("Service unavailable: {message}")]
    ServiceUnavailable { message: String },

    /// Any other transport, TLS, or status failure.
    #[error("Request to cluster failed: {message}")]
    Other { message: String },
}

impl AccessError {
    /// Create a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound { message: message.into() }
    }

    /// Create a service unavailable error.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable { message: message.into() }
    }

    /// Create an unclassified error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other { message: message.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_service_unavailable(&self) -> bool {
        matches!(self, Self::ServiceUnavailable { .. })
    }

    /// Whether a later attempt may succeed without anything changing on our side.
    pub fn is_retryable(&self) -> bool {
        self.is_not_found() || self.is_service_unavailable()
    }
}

/// Read access to a path served by a named service in a namespace.
///
/// Implementations own transport concerns (authentication, TLS, timeouts,
/// backoff). Callers treat the returned bytes as opaque.
#[async_trait]
pub trait ClusterAccessor: Send + Sync {
    /// Fetch `path` from the service `controller_name` in `controller_namespace`.
    ///
    /// # Errors
    ///
    /// - [`AccessError::NotFound`] if the service or path does not exist
    /// - [`AccessError::ServiceUnavailable`] if the service is not ready
    /// - [`AccessError::Other`] for everything else
    async fn fetch(
        &self,
        controller_name: &str,
        controller_namespace: &str,
        path: &str,
    ) -> Result<Vec<u8>, AccessError>;
}

#[async_trait]
impl<T: ClusterAccessor + ?Sized> ClusterAccessor for Arc<T> {
    async fn fetch(
        &self,
        controller_name: &str,
        controller_namespace: &str,
        path: &str,
    ) -> Result<Vec<u8>, AccessError> {
        (**self).fetch(controller_name, controller_namespace, path).await
    }
}
