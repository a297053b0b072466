//! Acquisition of the sealing controller's public key.
//!
//! - [`PublicKeyResolver`] fetches `/v1/cert.pem` from the controller through a
//!   [`ClusterAccessor`](crate::cluster::ClusterAccessor) and caches the result
//! - [`public_key_from_pem`] parses a certificate supplied out of band
//! - [`fingerprint`] identifies a key so callers can notice a controller key change

pub mod cert;
pub mod error;
pub mod resolver;

pub use cert::{fingerprint, public_key_from_pem, public_key_from_pem_bytes, MAX_MODULUS_BITS};
pub use error::ResolveError;
pub use resolver::{PublicKeyResolver, CERT_PATH};
