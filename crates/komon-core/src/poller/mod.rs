//! The three long-lived poll loops that feed the projections.
//!
//! Each poller owns its own Kafka client, retries forever on error (close,
//! null, rebuild on the next pass) and exits only when the shutdown
//! channel fires. No error escapes a poller's outer loop.

mod commit;
mod log_end;
mod metadata;

pub use commit::CommitListener;
pub use log_end::LogEndPoller;
pub use metadata::MetadataPoller;

use rdkafka::ClientConfig;

use crate::config::KafkaConfig;

/// Kafka's internal compacted topic storing all group commits and metadata.
pub const CONSUMER_OFFSETS_TOPIC: &str = "__consumer_offsets";

/// Assemble a client config from the shared connection settings.
///
/// A `group_id` is set for the consumers that join a group; the
/// admin-style metadata client passes `None` and gets a bare connection
/// config.
pub(crate) fn client_config(
    kafka: &KafkaConfig,
    group_id: Option<&str>,
    session_timeout_ms: u32,
) -> ClientConfig {
    let mut config = ClientConfig::new();
    config.set("bootstrap.servers", kafka.bootstrap_servers.join(","));

    if let Some(group_id) = group_id {
        config
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "latest")
            .set("session.timeout.ms", session_timeout_ms.to_string());
    }

    if let Some(ref protocol) = kafka.security.protocol {
        config.set("security.protocol", protocol);
    }
    if let Some(ref mechanism) = kafka.security.sasl_mechanism {
        config.set("sasl.mechanism", mechanism);
    }
    if let Some(ref username) = kafka.security.sasl_username {
        config.set("sasl.username", username);
    }
    if let Some(ref password) = kafka.security.sasl_password {
        config.set("sasl.password", password);
    }
    if let Some(ref path) = kafka.security.ssl_ca_location {
        config.set("ssl.ca.location", path.to_string_lossy().as_ref());
    }
    if let Some(ref path) = kafka.security.ssl_cert_location {
        config.set("ssl.certificate.location", path.to_string_lossy().as_ref());
    }
    if let Some(ref path) = kafka.security.ssl_key_location {
        config.set("ssl.key.location", path.to_string_lossy().as_ref());
    }

    config
}
