//! Tests for configuration validation — the only fatal error class.

use verdict::config::Config;
use verdict::error::VerdictError;

#[test]
fn defaults_validate() {
    let config = Config::default();
    assert!(config.validate().is_ok());
}

#[test]
fn retry_attempts_out_of_bounds_is_fatal() {
    let config = Config {
        retry_attempts: 0,
        ..Config::default()
    };
    assert!(matches!(config.validate(), Err(VerdictError::Config(_))));

    let config = Config {
        retry_attempts: 11,
        ..Config::default()
    };
    assert!(matches!(config.validate(), Err(VerdictError::Config(_))));
}

#[test]
fn zero_rate_ceiling_is_fatal() {
    let config = Config {
        max_requests_per_minute: 0,
        ..Config::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn zero_max_tokens_is_fatal() {
    let config = Config {
        max_tokens: 0,
        ..Config::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn zero_batch_size_is_fatal() {
    let config = Config {
        batch_size: 0,
        ..Config::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn chunk_budget_tracks_max_tokens() {
    let config = Config {
        max_tokens: 1000,
        ..Config::default()
    };
    assert_eq!(config.chunk_budget_bytes(), 4000);
}

#[test]
fn chunk_budget_is_capped() {
    let config = Config {
        max_tokens: u64::from(u32::MAX),
        ..Config::default()
    };
    assert_eq!(config.chunk_budget_bytes(), 512 * 1024);
}

#[test]
fn config_errors_are_not_retryable() {
    let err = VerdictError::Config("retry_attempts must be in 1..=10, got 0".to_string());
    assert!(!err.is_retryable());
}
