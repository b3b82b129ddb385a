//! Integration tests for logging system

use bridge_traits::time::LogLevel;
use core_runtime::logging::{init_logging, redact_if_sensitive, LogFormat, LoggingConfig};

#[test]
fn test_config_chaining() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Warn)
        .with_redaction(false)
        .with_spans(false)
        .with_target(false)
        .with_thread_info(true);

    assert_eq!(config.format, LogFormat::Compact);
    assert_eq!(config.level, LogLevel::Warn);
    assert!(!config.redact_sensitive);
    assert!(!config.enable_spans);
    assert!(!config.display_target);
    assert!(config.display_thread_info);
}

#[test]
fn test_token_fields_redacted() {
    assert_eq!(redact_if_sensitive("access_token", "BQDx"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("client_secret", "abc"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("remote_playlist_id", "37i9dQ"), "37i9dQ");
}

// Global subscriber can only be installed once per process, so both the
// success and the "already initialized" paths live in one test.
#[test]
fn test_init_logging_once() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Json)
        .with_level(LogLevel::Debug);

    init_logging(config.clone()).expect("first initialization succeeds");
    tracing::info!(target: "core_sync", base_playlist_id = "base-1", "logging ready");

    assert!(init_logging(config).is_err());
}
