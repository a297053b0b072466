//! # sealedsecret
//!
//! Client-side sealing of Kubernetes Secrets for the sealed-secrets controller.
//! The controller's public key is fetched from the cluster, each secret value is
//! encrypted under it, and the result is a `SealedSecret` manifest that is safe
//! to commit. Only the controller holding the private key can open it.
//!
//! ## Architecture
//!
//! ```text
//! ClusterAccessor → PublicKeyResolver ─┐
//!                                      ├→ seal → SealedSecret manifest bytes
//! build / from_manifest → SecretRecord ┘
//! ```
//!
//! - [`cluster`]: the one capability the core needs from the cluster, plus a
//!   `reqwest` implementation over the API server's service proxy
//! - [`keys`]: certificate parsing and the cached [`PublicKeyResolver`]
//! - [`secret`]: [`SecretRecord`] construction
//! - [`seal`]: per-value hybrid encryption and manifest encoding
//! - [`services`]: request-level helpers tying the stages together
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sealedsecret::{
//!     cluster::{ClusterConfig, KubeServiceProxy},
//!     services::{SealRequest, SealService},
//!     PublicKeyResolver,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> sealedsecret::Result<()> {
//! let proxy = KubeServiceProxy::new(ClusterConfig::default())?;
//! let resolver = PublicKeyResolver::new(proxy, "sealed-secrets-controller", "kube-system");
//! let service = SealService::new(Arc::new(resolver));
//!
//! let request = SealRequest::new("db-credentials", "payments").with_string_data("password", "hunter2");
//! let sealed = service.seal(&request, &CancellationToken::new()).await?;
//! println!("{}", String::from_utf8_lossy(&sealed.manifest));
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod cluster;
pub mod config;
pub mod errors;
pub mod keys;
pub mod observability;
pub mod seal;
pub mod secret;
pub mod services;

// Re-export commonly used types and traits
pub use cluster::{AccessError, ClusterAccessor};
pub use config::Settings;
pub use errors::{Error, Result};
pub use keys::{PublicKeyResolver, ResolveError};
pub use seal::{seal, SealError, SealingScope};
pub use secret::{build, BuildError, SecretRecord};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
