//! # Configuration Management
//!
//! Settings come from an optional TOML file overlaid with `SEALEDSECRET_*`
//! environment variables. Nested keys use a double underscore, so
//! `SEALEDSECRET_CONTROLLER__NAMESPACE=sealed-secrets` sets
//! `controller.namespace`.

pub mod settings;

pub use settings::{
    ClusterSettings, ControllerSettings, LoggingConfig, Settings, DEFAULT_CONFIG_FILE,
};
