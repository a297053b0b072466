//! Business logic services
//!
//! Request-level sealing built on the resolver, builder and sealer.

pub mod seal_service;

pub use seal_service::{seal_record, seal_request, SealRequest, SealService, SealedOutput};
