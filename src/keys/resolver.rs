//! Cached resolver for the sealing controller's public key.
//!
//! The resolver holds a single slot: empty, a ready key, or the last failure.
//! A call fetches only when the slot is empty or the last failure was a
//! retryable transport error (not found / service unavailable). Once a key is
//! cached it is served forever, and a terminal failure is handed back on every
//! call until [`PublicKeyResolver::invalidate`] is used or a new resolver is built.
//!
//! The slot lock is held across the fetch, so concurrent callers never start
//! two fetches and never see a half-written slot. A cancelled fetch returns
//! [`ResolveError::Cancelled`] and leaves the slot exactly as it was.

use std::sync::Arc;

use rsa::RsaPublicKey;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::cert::public_key_from_pem_bytes;
use super::error::ResolveError;
use crate::cluster::ClusterAccessor;

/// Path of the controller's certificate endpoint.
pub const CERT_PATH: &str = "/v1/cert.pem";

#[derive(Debug, Default)]
enum KeySlot {
    #[default]
    Empty,
    Ready(Arc<RsaPublicKey>),
    Failed(ResolveError),
}

/// Fetches and caches the public key of one sealing controller.
pub struct PublicKeyResolver<A: ClusterAccessor> {
    accessor: A,
    controller_name: String,
    controller_namespace: String,
    slot: Mutex<KeySlot>,
}

impl<A: ClusterAccessor> PublicKeyResolver<A> {
    /// Create a resolver for the controller `controller_name` in `controller_namespace`.
    ///
    /// Nothing is fetched until the first [`resolve`](Self::resolve).
    pub fn new(
        accessor: A,
        controller_name: impl Into<String>,
        controller_namespace: impl Into<String>,
    ) -> Self {
        Self {
            accessor,
            controller_name: controller_name.into(),
            controller_namespace: controller_namespace.into(),
            slot: Mutex::new(KeySlot::Empty),
        }
    }

    pub fn controller_name(&self) -> &str {
        &self.controller_name
    }

    pub fn controller_namespace(&self) -> &str {
        &self.controller_namespace
    }

    /// Return the controller's public key, fetching it if needed.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::Fetch`] if the cluster read failed
    /// - [`ResolveError::Pem`], [`ResolveError::Certificate`],
    ///   [`ResolveError::NoCertificates`] if the response cannot be parsed
    /// - [`ResolveError::UnsupportedKeyType`] if the certificate key is not RSA
    /// - [`ResolveError::Cancelled`] if `cancel` fires first
    #[instrument(
        skip(self, cancel),
        fields(controller = %self.controller_name, namespace = %self.controller_namespace)
    )]
    pub async fn resolve(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Arc<RsaPublicKey>, ResolveError> {
        let mut slot = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ResolveError::Cancelled),
            slot = self.slot.lock() => slot,
        };

        match &*slot {
            KeySlot::Ready(key) => {
                debug!("Serving cached controller public key");
                return Ok(Arc::clone(key));
            }
            KeySlot::Failed(err) if !err.is_retryable() => {
                debug!(error = %err, "Returning cached terminal error");
                return Err(err.clone());
            }
            KeySlot::Failed(err) => {
                debug!(error = %err, "Previous fetch failed with a retryable error, fetching again");
            }
            KeySlot::Empty => {}
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("Public key fetch cancelled, cache left unchanged");
                return Err(ResolveError::Cancelled);
            }
            outcome = self.fetch_key() => outcome,
        };

        *slot = match &outcome {
            Ok(key) => {
                info!(fingerprint = %super::fingerprint(key), "Fetched controller public key");
                KeySlot::Ready(Arc::clone(key))
            }
            Err(err) => {
                warn!(error = %err, retryable = err.is_retryable(), "Failed to fetch controller public key");
                KeySlot::Failed(err.clone())
            }
        };

        outcome
    }

    /// Drop any cached key or error so the next [`resolve`](Self::resolve) fetches.
    pub async fn invalidate(&self) {
        *self.slot.lock().await = KeySlot::Empty;
        debug!(controller = %self.controller_name, "Invalidated cached public key");
    }

    /// The cached key, without fetching.
    pub async fn cached_key(&self) -> Option<Arc<RsaPublicKey>> {
        match &*self.slot.lock().await {
            KeySlot::Ready(key) => Some(Arc::clone(key)),
            _ => None,
        }
    }

    /// The cached error, without fetching.
    pub async fn cached_error(&self) -> Option<ResolveError> {
        match &*self.slot.lock().await {
            KeySlot::Failed(err) => Some(err.clone()),
            _ => None,
        }
    }

    async fn fetch_key(&self) -> Result<Arc<RsaPublicKey>, ResolveError> {
        debug!(path = CERT_PATH, "Fetching controller certificate");
        let body = self
            .accessor
            .fetch(&self.controller_name, &self.controller_namespace, CERT_PATH)
            .await?;
        Ok(Arc::new(public_key_from_pem_bytes(&body)?))
    }
}
