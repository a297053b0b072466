//! # Structured Logging
//!
//! Installs the global `tracing` subscriber. `RUST_LOG` wins over the configured
//! level. Output goes to stderr so sealed manifests written to stdout stay
//! clean.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Initialize the global subscriber from `config`.
///
/// Does nothing if a subscriber is already installed (e.g. in tests).
pub fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| build_filter(&config.level));

    let builder = fmt().with_env_filter(filter).with_writer(std::io::stderr).with_target(false);

    // An already installed subscriber stays in place.
    let _ = if config.json { builder.json().try_init() } else { builder.try_init() };
}

/// Filter for `level`, falling back to `warn` if it does not parse.
fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Log the effective configuration without credentials.
pub fn log_settings(settings: &crate::config::Settings) {
    tracing::debug!(
        cluster_host = %settings.cluster.host,
        controller_name = %settings.controller.name,
        controller_namespace = %settings.controller.namespace,
        timeout_seconds = settings.cluster.timeout_seconds,
        client_cert = settings.cluster.client_cert_path.is_some(),
        bearer_token = settings.cluster.bearer_token.is_some()
            || settings.cluster.bearer_token_path.is_some(),
        "Settings loaded"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;
    use tracing_test::traced_test;

    #[test]
    fn test_build_filter_accepts_directives() {
        assert_eq!(build_filter("debug").max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn test_build_filter_falls_back_on_garbage() {
        assert_eq!(build_filter("sealedsecret=loud").max_level_hint(), Some(LevelFilter::WARN));
    }

    #[traced_test]
    #[test]
    fn test_log_settings_omits_token() {
        let mut settings = crate::config::Settings::default();
        settings.cluster.bearer_token = Some("s3cr3t".to_string());

        log_settings(&settings);

        assert!(logs_contain("Settings loaded"));
        assert!(!logs_contain("s3cr3t"));
    }
}
