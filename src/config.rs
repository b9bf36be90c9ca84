//! # Configuration Management
//!
//! Centralized configuration for the client encoding layer and its transport.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment-specific overrides via `from_env()`
//!
//! ## Notes
//! - Buffer sizes below 8192 bytes are rejected, the protocol minimum for HEL
//! - The client certificate is read from `certificate_path` on demand

use crate::error::{ProtocolError, Result};
use crate::transport::tcp::parse_endpoint;
use crate::types::ByteString;
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// UA TCP protocol version sent in HEL
pub const PROTOCOL_VERSION: u32 = 0;

/// Smallest buffer size a HEL may advertise
pub const MIN_BUFFER_SIZE: u32 = 8192;

/// Default advertised buffer size
pub const DEFAULT_BUFFER_SIZE: u32 = 65_536;

/// Default upper bound on a whole message (16 MB)
pub const DEFAULT_MAX_MESSAGE_SIZE: u32 = 16 * 1024 * 1024;

/// Settings for a client connection and the encoding layer around it
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct NetworkConfig {
    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl NetworkConfig {
    /// Read a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ProtocolError::ConfigError(format!("Cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml(&contents)
    }

    /// Parse a TOML document; missing sections take their defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Invalid TOML: {e}")))
    }

    /// Defaults overridden by `UA_PROTOCOL_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("UA_PROTOCOL_ENDPOINT_URL") {
            config.client.endpoint_url = url;
        }

        if let Ok(timeout) = std::env::var("UA_PROTOCOL_CONNECTION_TIMEOUT_MS") {
            let millis = timeout.parse::<u64>().map_err(|_| {
                ProtocolError::ConfigError(format!(
                    "UA_PROTOCOL_CONNECTION_TIMEOUT_MS is not a number: {timeout}"
                ))
            })?;
            config.client.connection_timeout = Duration::from_millis(millis);
        }

        if let Ok(path) = std::env::var("UA_PROTOCOL_CERTIFICATE_PATH") {
            config.client.certificate_path = Some(path);
        }

        Ok(config)
    }

    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// The default configuration rendered as TOML
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_default()
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Cannot serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Cannot write config: {e}")))?;

        Ok(())
    }

    /// Every problem found, one message each; empty when usable
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.client.validate());
        errors.extend(self.transport.validate());
        errors.extend(self.logging.validate());

        let max_response = self.client.max_response_message_size;
        let max_message = self.transport.max_message_size;
        if max_response != 0 && max_message != 0 && max_response > max_message {
            errors.push(format!(
                "max_response_message_size {max_response} exceeds transport max_message_size {max_message}"
            ));
        }

        errors
    }

    /// [`validate`](Self::validate) folded into a single `ConfigError`
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Client-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Server endpoint (`opc.tcp://host:port[/path]`)
    pub endpoint_url: String,

    /// Timeout for dialing and the HEL/ACK exchange
    #[serde(with = "duration_serde")]
    pub connection_timeout: Duration,

    /// Timeout for a single service request
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,

    /// Human readable session name sent in CreateSession
    pub session_name: String,

    /// Session timeout requested from the server, in milliseconds
    pub requested_session_timeout_ms: f64,

    /// Largest response the client accepts (0 = no limit)
    pub max_response_message_size: u32,

    /// DER encoded client certificate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_path: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint_url: String::from("opc.tcp://localhost:4840"),
            connection_timeout: timeout::DEFAULT_TIMEOUT,
            request_timeout: timeout::REQUEST_TIMEOUT,
            session_name: String::from("ua-protocol session"),
            requested_session_timeout_ms: 1_200_000.0,
            max_response_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            certificate_path: None,
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.endpoint_url.is_empty() {
            errors.push("Endpoint URL cannot be empty".to_string());
        } else if let Err(e) = parse_endpoint(&self.endpoint_url) {
            errors.push(format!("Invalid endpoint URL '{}': {e}", self.endpoint_url));
        }

        if self.connection_timeout.as_millis() < 100 {
            errors.push("Connection timeout too short (minimum: 100ms)".to_string());
        } else if self.connection_timeout.as_secs() > 300 {
            errors.push("Connection timeout too long (maximum: 300s)".to_string());
        }

        if self.request_timeout.as_millis() < 100 {
            errors.push("Request timeout too short (minimum: 100ms)".to_string());
        }

        if self.session_name.is_empty() {
            errors.push("Session name cannot be empty".to_string());
        }

        if !self.requested_session_timeout_ms.is_finite() || self.requested_session_timeout_ms <= 0.0 {
            errors.push(format!(
                "Requested session timeout must be a positive number of milliseconds, got {}",
                self.requested_session_timeout_ms
            ));
        }

        if let Some(ref path) = self.certificate_path {
            if !Path::new(path).is_file() {
                errors.push(format!("Certificate file does not exist: {path}"));
            }
        }

        errors
    }

    /// Read the client certificate; a null ByteString when none is configured
    pub fn load_certificate(&self) -> Result<ByteString> {
        match self.certificate_path {
            Some(ref path) => std::fs::read(path).map(ByteString::from).map_err(|e| {
                ProtocolError::ConfigError(format!("Failed to read certificate {path}: {e}"))
            }),
            None => Ok(ByteString::null()),
        }
    }
}

/// Transport configuration, advertised to the server in HEL
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    /// UA TCP protocol version
    pub protocol_version: u32,

    /// Largest chunk the client can receive
    pub receive_buffer_size: u32,

    /// Largest chunk the client will send
    pub send_buffer_size: u32,

    /// Largest whole message the client accepts (0 = no limit)
    pub max_message_size: u32,

    /// Most chunks per message (0 = no limit)
    pub max_chunk_count: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            receive_buffer_size: DEFAULT_BUFFER_SIZE,
            send_buffer_size: DEFAULT_BUFFER_SIZE,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_chunk_count: 0,
        }
    }
}

impl TransportConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.protocol_version != PROTOCOL_VERSION {
            errors.push(format!(
                "Unsupported protocol version: {} (supported: {PROTOCOL_VERSION})",
                self.protocol_version
            ));
        }

        for (name, size) in [
            ("receive_buffer_size", self.receive_buffer_size),
            ("send_buffer_size", self.send_buffer_size),
        ] {
            if size < MIN_BUFFER_SIZE {
                errors.push(format!(
                    "{name} too small: {size} bytes (minimum: {MIN_BUFFER_SIZE})"
                ));
            }
        }

        if self.max_message_size != 0 && self.max_message_size < self.receive_buffer_size {
            errors.push(format!(
                "max_message_size {} is smaller than receive_buffer_size {}",
                self.max_message_size, self.receive_buffer_size
            ));
        }

        errors
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Compact,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Name attached to every log line
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("ua-protocol"),
            log_level: Level::INFO,
            format: LogFormat::Text,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Durations as whole milliseconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Levels as lowercase names
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
