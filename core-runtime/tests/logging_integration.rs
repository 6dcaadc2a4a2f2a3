//! Integration tests for the logging system

use core_runtime::logging::{init_logging, LogFormat, LogLevel, LoggingConfig};
use core_runtime::Error;

#[test]
fn test_logging_initializes_once() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Json)
        .with_level(LogLevel::Debug)
        .with_spans(true);

    init_logging(config.clone()).unwrap();
    tracing::info!(target: "core_ordering", table = "favorites", "logging ready");

    // The global subscriber is already installed.
    assert!(matches!(init_logging(config), Err(Error::Config(_))));
}
