//! Configuration structures for komon.
//!
//! Configuration is loaded from TOML files; the embedding process may
//! override individual fields before constructing the tracker.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Kafka connection configuration
    pub kafka: KafkaConfig,

    /// Tracker poll-loop configuration
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Monitoring configuration
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// Kafka connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KafkaConfig {
    /// Kafka bootstrap servers
    pub bootstrap_servers: Vec<String>,

    /// Security configuration
    #[serde(default)]
    pub security: KafkaSecurityConfig,
}

/// Kafka security configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct KafkaSecurityConfig {
    /// Security protocol (PLAINTEXT, SSL, SASL_SSL, SASL_PLAINTEXT)
    pub protocol: Option<String>,

    /// SASL mechanism (PLAIN, SCRAM-SHA-256, SCRAM-SHA-512)
    pub sasl_mechanism: Option<String>,

    /// SASL username
    pub sasl_username: Option<String>,

    /// SASL password
    pub sasl_password: Option<String>,

    /// SSL CA certificate location
    pub ssl_ca_location: Option<PathBuf>,

    /// SSL client certificate location
    pub ssl_cert_location: Option<PathBuf>,

    /// SSL client key location
    pub ssl_key_location: Option<PathBuf>,
}

/// Poll-loop intervals, timeouts and consumer group ids.
///
/// Defaults: a 500 ms commit poll, 30 s metadata cycles under a 30 s
/// deadline, 10 s log-end cycles and a 30 s backoff after any poller
/// error.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackerConfig {
    /// Consumer group id for the commit listener
    #[serde(default = "default_commit_listener_group")]
    pub commit_listener_group: String,

    /// Consumer group id for the log-end poller
    #[serde(default = "default_log_end_group")]
    pub log_end_group: String,

    /// Commit listener poll timeout in milliseconds
    #[serde(default = "default_commit_poll_ms")]
    pub commit_poll_ms: u64,

    /// Session timeout in milliseconds for both consumers
    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u32,

    /// Sleep between group-metadata cycles in seconds
    #[serde(default = "default_metadata_interval_secs")]
    pub metadata_interval_secs: u64,

    /// Deadline for the list/describe work of one metadata cycle in seconds
    #[serde(default = "default_metadata_deadline_secs")]
    pub metadata_deadline_secs: u64,

    /// Sleep between log-end cycles in seconds
    #[serde(default = "default_log_end_interval_secs")]
    pub log_end_interval_secs: u64,

    /// Per-request timeout for broker metadata and watermark calls, in
    /// seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Sleep after a poller error before rebuilding its client, in seconds
    #[serde(default = "default_error_backoff_secs")]
    pub error_backoff_secs: u64,

    /// TTL for cached reverse-DNS results in seconds
    #[serde(default = "default_dns_cache_ttl_secs")]
    pub dns_cache_ttl_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            commit_listener_group: default_commit_listener_group(),
            log_end_group: default_log_end_group(),
            commit_poll_ms: default_commit_poll_ms(),
            session_timeout_ms: default_session_timeout_ms(),
            metadata_interval_secs: default_metadata_interval_secs(),
            metadata_deadline_secs: default_metadata_deadline_secs(),
            log_end_interval_secs: default_log_end_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            error_backoff_secs: default_error_backoff_secs(),
            dns_cache_ttl_secs: default_dns_cache_ttl_secs(),
        }
    }
}

/// Monitoring configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitoringConfig {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log format
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            log_format: LogFormat::default(),
        }
    }
}

/// Log level.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level
    Trace,
    /// Debug level
    Debug,
    /// Info level (default)
    #[default]
    Info,
    /// Warn level
    Warn,
    /// Error level
    Error,
}

/// Log format.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format (default)
    #[default]
    Json,
    /// Plain text format
    Text,
}

// Default value functions
fn default_commit_listener_group() -> String {
    "kafka-monitor-committedOffsetListener".to_string()
}
fn default_log_end_group() -> String {
    "kafka-monitor-LogEndOffsetGetter".to_string()
}
fn default_commit_poll_ms() -> u64 {
    500
}
fn default_session_timeout_ms() -> u32 {
    30000
}
fn default_metadata_interval_secs() -> u64 {
    30
}
fn default_metadata_deadline_secs() -> u64 {
    30
}
fn default_log_end_interval_secs() -> u64 {
    10
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_error_backoff_secs() -> u64 {
    30
}
fn default_dns_cache_ttl_secs() -> u64 {
    60
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if self.kafka.bootstrap_servers.is_empty() {
            return Err(crate::Error::Config(
                "At least one bootstrap server required".into(),
            ));
        }

        if self.tracker.commit_listener_group.is_empty() {
            return Err(crate::Error::Config(
                "Commit listener group id is required".into(),
            ));
        }

        if self.tracker.log_end_group.is_empty() {
            return Err(crate::Error::Config(
                "Log-end group id is required".into(),
            ));
        }

        if self.tracker.commit_listener_group == self.tracker.log_end_group {
            return Err(crate::Error::Config(
                "Commit listener and log-end consumers must use distinct group ids".into(),
            ));
        }

        if self.tracker.commit_poll_ms == 0 {
            return Err(crate::Error::Config(
                "Commit poll timeout must be non-zero".into(),
            ));
        }

        Ok(())
    }
}
