//! Integration tests for configuration validation

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::time::Duration;
use tracing::Level;
use ua_protocol::config::{
    ClientConfig, LogFormat, LoggingConfig, NetworkConfig, TransportConfig, MIN_BUFFER_SIZE,
};
use ua_protocol::error::ProtocolError;

#[test]
fn test_default_config_validates() {
    let config = NetworkConfig::default();
    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Default config should be valid, but got errors: {:?}",
        errors
    );
}

#[test]
fn test_empty_endpoint_url() {
    let mut config = NetworkConfig::default();
    config.client.endpoint_url = String::new();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("cannot be empty")));
}

#[test]
fn test_wrong_scheme() {
    let mut config = NetworkConfig::default();
    config.client.endpoint_url = "http://localhost:4840".to_string();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Invalid endpoint URL")));
}

#[test]
fn test_bad_port() {
    let mut config = NetworkConfig::default();
    config.client.endpoint_url = "opc.tcp://localhost:99999".to_string();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Invalid endpoint URL")));
}

#[test]
fn test_ipv6_endpoint_is_accepted() {
    let mut config = NetworkConfig::default();
    config.client.endpoint_url = "opc.tcp://[::1]:4841/UA/Server".to_string();
    assert!(config.validate().is_empty());
}

#[test]
fn test_short_connection_timeout() {
    let mut config = NetworkConfig::default();
    config.client.connection_timeout = Duration::from_millis(50);

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Connection timeout too short")));
}

#[test]
fn test_long_connection_timeout() {
    let mut config = NetworkConfig::default();
    config.client.connection_timeout = Duration::from_secs(400);

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Connection timeout too long")));
}

#[test]
fn test_short_request_timeout() {
    let mut config = NetworkConfig::default();
    config.client.request_timeout = Duration::from_millis(10);

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Request timeout too short")));
}

#[test]
fn test_session_timeout_must_be_positive() {
    for bad in [0.0, -5.0, f64::NAN, f64::INFINITY] {
        let mut config = NetworkConfig::default();
        config.client.requested_session_timeout_ms = bad;

        let errors = config.validate();
        assert!(
            errors.iter().any(|e| e.contains("Requested session timeout")),
            "{bad} should be rejected"
        );
    }
}

#[test]
fn test_missing_certificate_file() {
    let mut config = NetworkConfig::default();
    config.client.certificate_path = Some("/definitely/not/here.der".to_string());

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Certificate file does not exist")));
    assert!(matches!(
        config.client.load_certificate(),
        Err(ProtocolError::ConfigError(_))
    ));
}

#[test]
fn test_certificate_is_loaded() {
    let path = std::env::temp_dir().join(format!("ua-protocol-cert-{}.der", std::process::id()));
    std::fs::write(&path, [0x30, 0x82, 0x01, 0x0A]).unwrap();

    let config = ClientConfig {
        certificate_path: Some(path.to_string_lossy().into_owned()),
        ..ClientConfig::default()
    };
    assert!(config.validate().is_empty());
    assert_eq!(config.load_certificate().unwrap().as_bytes(), &[0x30, 0x82, 0x01, 0x0A]);

    std::fs::remove_file(path).ok();
}

#[test]
fn test_unsupported_protocol_version() {
    let mut config = NetworkConfig::default();
    config.transport.protocol_version = 1;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Unsupported protocol version")));
}

#[test]
fn test_tiny_buffers() {
    let mut config = NetworkConfig::default();
    config.transport.receive_buffer_size = MIN_BUFFER_SIZE - 1;
    config.transport.send_buffer_size = 1024;

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("receive_buffer_size too small")));
    assert!(errors.iter().any(|e| e.contains("send_buffer_size too small")));
}

#[test]
fn test_message_limit_below_buffer() {
    let mut config = NetworkConfig::default();
    config.transport.max_message_size = 10_000;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("smaller than receive_buffer_size")));
}

#[test]
fn test_zero_limits_mean_unlimited() {
    let mut config = NetworkConfig::default();
    config.transport.max_message_size = 0;
    config.transport.max_chunk_count = 0;
    config.client.max_response_message_size = 0;
    assert!(config.validate().is_empty());
}

#[test]
fn test_response_limit_exceeds_message_limit() {
    let mut config = NetworkConfig::default();
    config.transport.max_message_size = 1024 * 1024;
    config.client.max_response_message_size = 2 * 1024 * 1024;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("exceeds transport max_message_size")));
}

#[test]
fn test_empty_app_name() {
    let mut config = NetworkConfig::default();
    config.logging.app_name = String::new();

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Application name cannot be empty")));
}

#[test]
fn test_long_app_name() {
    let mut config = NetworkConfig::default();
    config.logging.app_name = "a".repeat(100);

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Application name too long")));
}

#[test]
fn test_validate_strict_with_valid_config() {
    let config = NetworkConfig::default();
    assert!(config.validate_strict().is_ok());
}

#[test]
fn test_validate_strict_with_invalid_config() {
    let mut config = NetworkConfig::default();
    config.client.endpoint_url = String::new();

    let result = config.validate_strict();
    assert!(result.is_err());

    if let Err(e) = result {
        let error_str = e.to_string();
        assert!(error_str.contains("Configuration validation failed"));
    }
}

#[test]
fn test_multiple_validation_errors() {
    let mut config = NetworkConfig::default();

    config.client.endpoint_url = String::new();
    config.client.session_name = String::new();
    config.transport.protocol_version = 7;
    config.transport.send_buffer_size = 0;
    config.logging.app_name = String::new();

    let errors = config.validate();
    assert!(
        errors.len() >= 5,
        "Expected at least 5 errors, got {}: {:?}",
        errors.len(),
        errors
    );
}

#[test]
fn test_valid_production_config() {
    let config = NetworkConfig {
        client: ClientConfig {
            endpoint_url: "opc.tcp://plc.example.com:4840/UA/Server".to_string(),
            connection_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            session_name: "historian".to_string(),
            requested_session_timeout_ms: 600_000.0,
            max_response_message_size: 4 * 1024 * 1024,
            certificate_path: None,
        },
        transport: TransportConfig {
            protocol_version: 0,
            receive_buffer_size: 131_072,
            send_buffer_size: 131_072,
            max_message_size: 16 * 1024 * 1024,
            max_chunk_count: 64,
        },
        logging: LoggingConfig {
            app_name: "historian".to_string(),
            log_level: Level::WARN,
            format: LogFormat::Json,
        },
    };

    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Production config should be valid, got: {:?}",
        errors
    );
}

#[test]
fn test_toml_sections_are_optional() {
    let config = NetworkConfig::from_toml(
        r#"
        [logging]
        app_name = "gateway"
        log_level = "debug"
        format = "compact"
        "#,
    )
    .unwrap();

    assert_eq!(config.logging.app_name, "gateway");
    assert_eq!(config.logging.log_level, Level::DEBUG);
    assert_eq!(config.logging.format, LogFormat::Compact);
    assert_eq!(config.client.endpoint_url, "opc.tcp://localhost:4840");
}

#[test]
fn test_toml_durations_are_milliseconds() {
    let config = NetworkConfig::from_toml(
        r#"
        [client]
        endpoint_url = "opc.tcp://10.0.0.5:4840"
        connection_timeout = 2500
        request_timeout = 15000
        session_name = "line-3"
        requested_session_timeout_ms = 60000.0
        max_response_message_size = 0
        "#,
    )
    .unwrap();

    assert_eq!(config.client.connection_timeout, Duration::from_millis(2500));
    assert_eq!(config.client.request_timeout, Duration::from_secs(15));
    assert!(config.client.certificate_path.is_none());
}

#[test]
fn test_toml_rejects_bad_level() {
    let result = NetworkConfig::from_toml(
        r#"
        [logging]
        app_name = "x"
        log_level = "loud"
        "#,
    );
    assert!(matches!(result, Err(ProtocolError::ConfigError(_))));
}

#[test]
fn test_save_and_reload() {
    let path = std::env::temp_dir().join(format!("ua-protocol-config-{}.toml", std::process::id()));
    let config = NetworkConfig::default_with_overrides(|c| {
        c.client.session_name = "saved".to_string();
        c.transport.max_chunk_count = 16;
    });

    config.save_to_file(&path).unwrap();
    let loaded = NetworkConfig::from_file(&path).unwrap();
    assert_eq!(loaded.client.session_name, "saved");
    assert_eq!(loaded.transport.max_chunk_count, 16);

    std::fs::remove_file(path).ok();
}

#[test]
fn test_missing_file() {
    assert!(matches!(
        NetworkConfig::from_file("/no/such/ua-protocol.toml"),
        Err(ProtocolError::ConfigError(_))
    ));
}
