//! Consumer-group metadata poller.
//!
//! Enumerates consumer groups and their member assignments through an
//! admin-style broker client and replaces the Clients, TopicAndGroups and
//! ActiveTopicPartitions projections each cycle. Stale data is preferred
//! to empty data: projections are never cleared on error.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use rdkafka::consumer::{BaseConsumer, Consumer};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::decoder::decode_member_assignment;
use crate::dns::ReverseDnsCache;
use crate::error::{KafkaError, Result};
use crate::health::{HealthBoard, Poller, PollerHealth};
use crate::metrics::TrackerMetrics;
use crate::state::{ClientGroup, GroupMetadata, GroupMetadataSnapshot, TopicAndGroup};

use super::client_config;

/// Owns the write side of the Clients / TopicAndGroups /
/// ActiveTopicPartitions projections.
pub struct MetadataPoller {
    config: Config,
    group_metadata: Arc<GroupMetadata>,
    dns: Arc<ReverseDnsCache>,
    metrics: Arc<TrackerMetrics>,
    health: Arc<HealthBoard>,
    shutdown: broadcast::Receiver<()>,
}

impl MetadataPoller {
    pub fn new(
        config: Config,
        group_metadata: Arc<GroupMetadata>,
        dns: Arc<ReverseDnsCache>,
        metrics: Arc<TrackerMetrics>,
        health: Arc<HealthBoard>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            config,
            group_metadata,
            dns,
            metrics,
            health,
            shutdown,
        }
    }

    /// Run until the shutdown channel fires.
    ///
    /// The describe/list work of each cycle runs under a deadline; an
    /// overrun is the normal recovery path from a stuck broker, not a
    /// fatal condition. Client construction retries forever.
    pub async fn run(mut self) {
        let interval = Duration::from_secs(self.config.tracker.metadata_interval_secs);
        let deadline = Duration::from_secs(self.config.tracker.metadata_deadline_secs);
        let request_timeout = Duration::from_secs(self.config.tracker.request_timeout_secs);
        let error_backoff = Duration::from_secs(self.config.tracker.error_backoff_secs);
        let mut client: Option<Arc<BaseConsumer>> = None;

        info!("group metadata poller started");

        loop {
            if client.is_none() {
                match self.create_client() {
                    Ok(c) => client = Some(Arc::new(c)),
                    Err(e) => {
                        error!(error = %e, "failed to create admin client");
                        self.health.report(
                            Poller::GroupMetadata,
                            PollerHealth::Failing {
                                error: e.to_string(),
                            },
                        );
                        self.metrics.record_reconnect();
                        if self.sleep_or_shutdown(error_backoff).await {
                            break;
                        }
                        continue;
                    }
                }
            }

            let Some(admin) = client.clone() else { continue };
            let dns = Arc::clone(&self.dns);
            let work = tokio::task::spawn_blocking(move || {
                collect_group_metadata(admin.as_ref(), dns.as_ref(), request_timeout)
            });

            let outcome = tokio::select! {
                _ = self.shutdown.recv() => break,
                outcome = tokio::time::timeout(deadline, work) => outcome,
            };

            match outcome {
                Err(_) => {
                    warn!(
                        deadline_secs = deadline.as_secs(),
                        "group describe exceeded deadline, discarding admin client"
                    );
                    self.metrics.record_metadata_deadline();
                    self.health.report(
                        Poller::GroupMetadata,
                        PollerHealth::Stale {
                            reason: "describe deadline exceeded".to_string(),
                        },
                    );
                    client = None;
                }
                Ok(Err(e)) => {
                    error!(error = %e, "group metadata task failed to complete");
                    self.health.report(
                        Poller::GroupMetadata,
                        PollerHealth::Failing {
                            error: e.to_string(),
                        },
                    );
                    client = None;
                }
                Ok(Ok(Err(e))) => {
                    error!(error = %e, "group metadata cycle failed, rebuilding admin client");
                    self.health.report(
                        Poller::GroupMetadata,
                        PollerHealth::Failing {
                            error: e.to_string(),
                        },
                    );
                    self.metrics.record_reconnect();
                    client = None;
                }
                Ok(Ok(Ok(snapshot))) => {
                    let groups: HashSet<&str> =
                        snapshot.clients.iter().map(|c| c.group.as_str()).collect();
                    debug!(
                        groups = groups.len(),
                        clients = snapshot.clients.len(),
                        active_partitions = snapshot.active_partitions.len(),
                        "publishing group metadata"
                    );
                    self.metrics.set_active_groups(groups.len() as u64);
                    self.group_metadata.publish(snapshot);
                    self.metrics.record_metadata_cycle();
                    self.health.report(Poller::GroupMetadata, PollerHealth::Fresh);
                }
            }

            if self.sleep_or_shutdown(interval).await {
                break;
            }
        }

        info!("group metadata poller stopped");
    }

    fn create_client(&self) -> Result<BaseConsumer> {
        let client: BaseConsumer = client_config(
            &self.config.kafka,
            None,
            self.config.tracker.session_timeout_ms,
        )
        .create()
        .map_err(|e| KafkaError::ConnectionFailed {
            broker: self.config.kafka.bootstrap_servers.join(","),
            message: e.to_string(),
        })?;
        Ok(client)
    }

    async fn sleep_or_shutdown(&mut self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.shutdown.recv() => true,
            _ = tokio::time::sleep(duration) => false,
        }
    }
}

/// One blocking list-and-describe pass over all consumer groups.
fn collect_group_metadata(
    client: &BaseConsumer,
    dns: &ReverseDnsCache,
    timeout: Duration,
) -> Result<GroupMetadataSnapshot> {
    let group_list = client
        .fetch_group_list(None, timeout)
        .map_err(|e| KafkaError::GroupListing(e.to_string()))?;

    let mut snapshot = GroupMetadataSnapshot::default();

    for group in group_list.groups() {
        if group.protocol_type() != "consumer" {
            continue;
        }

        for member in group.members() {
            let assigned = match member.assignment() {
                Some(bytes) => match decode_member_assignment(bytes) {
                    Ok(partitions) => partitions,
                    Err(e) => {
                        error!(
                            group = %group.name(),
                            member = %member.id(),
                            error = %e,
                            "failed to decode member assignment"
                        );
                        continue;
                    }
                },
                None => Vec::new(),
            };

            for tp in &assigned {
                snapshot.topic_groups.insert(TopicAndGroup {
                    topic: tp.topic.clone(),
                    group: group.name().to_string(),
                });
                snapshot.active_partitions.insert(tp.clone());
            }

            snapshot.clients.push(ClientGroup {
                group: group.name().to_string(),
                client_id: member.client_id().to_string(),
                client_host: normalize_member_host(member.client_host(), dns),
                topic_partitions: assigned.into_iter().collect(),
            });
        }
    }

    Ok(snapshot)
}

/// Strip the leading slash from `/N.N.N.N` member hosts and reverse-resolve
/// the literal. Everything else, IPv6 literals included, passes through
/// verbatim.
fn normalize_member_host(raw: &str, dns: &ReverseDnsCache) -> String {
    if let Some(stripped) = raw.strip_prefix('/') {
        if stripped.parse::<std::net::Ipv4Addr>().is_ok() {
            return dns.resolve(stripped);
        }
    }
    raw.to_string()
}
