//! # Observability
//!
//! Structured logging through `tracing`. Library code only emits events; the
//! binary installs the subscriber with [`init_logging`].

pub mod logging;

pub use logging::{init_logging, log_settings};
