//! Log-end offset poller.
//!
//! Each cycle fetches cluster topic metadata, replaces the topic ->
//! partition-info projection wholesale, then records the high watermark of
//! every (topic, partition) into the log-ends projection. Log-end entries
//! are never removed: a deleted topic's partition lingers at its last
//! observed value.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rdkafka::consumer::{BaseConsumer, Consumer};
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::{KafkaError, Result};
use crate::health::{HealthBoard, Poller, PollerHealth};
use crate::metrics::TrackerMetrics;
use crate::state::{ClusterPartitions, LogEnds, PartitionInfo, TopicPartition};

use super::client_config;

/// Owns the write side of the LogEnds and topic-partition projections.
pub struct LogEndPoller {
    config: Config,
    log_ends: Arc<LogEnds>,
    cluster_partitions: Arc<ClusterPartitions>,
    metrics: Arc<TrackerMetrics>,
    health: Arc<HealthBoard>,
    shutdown: broadcast::Receiver<()>,
}

impl LogEndPoller {
    pub fn new(
        config: Config,
        log_ends: Arc<LogEnds>,
        cluster_partitions: Arc<ClusterPartitions>,
        metrics: Arc<TrackerMetrics>,
        health: Arc<HealthBoard>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            config,
            log_ends,
            cluster_partitions,
            metrics,
            health,
            shutdown,
        }
    }

    /// Run until the shutdown channel fires.
    ///
    /// The error-path sleep is longer than the success-path sleep to avoid
    /// hot-looping against a down broker.
    pub async fn run(mut self) {
        let interval = Duration::from_secs(self.config.tracker.log_end_interval_secs);
        let error_backoff = Duration::from_secs(self.config.tracker.error_backoff_secs);
        let request_timeout = Duration::from_secs(self.config.tracker.request_timeout_secs);
        let mut client: Option<Arc<BaseConsumer>> = None;

        info!("log end poller started");

        loop {
            if client.is_none() {
                match self.create_consumer() {
                    Ok(c) => client = Some(Arc::new(c)),
                    Err(e) => {
                        error!(error = %e, "failed to create log end consumer");
                        self.health.report(
                            Poller::LogEnd,
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

            let Some(consumer) = client.clone() else { continue };
            let log_ends = Arc::clone(&self.log_ends);
            let cluster_partitions = Arc::clone(&self.cluster_partitions);
            let work = tokio::task::spawn_blocking(move || {
                refresh_log_ends(
                    consumer.as_ref(),
                    cluster_partitions.as_ref(),
                    log_ends.as_ref(),
                    request_timeout,
                )
            });

            let outcome = tokio::select! {
                _ = self.shutdown.recv() => break,
                outcome = work => outcome,
            };

            match outcome {
                Err(e) => {
                    error!(error = %e, "log end task failed to complete");
                    self.health.report(
                        Poller::LogEnd,
                        PollerHealth::Failing {
                            error: e.to_string(),
                        },
                    );
                    client = None;
                    if self.sleep_or_shutdown(error_backoff).await {
                        break;
                    }
                }
                Ok(Err(e)) => {
                    error!(error = %e, "log end cycle failed, rebuilding consumer");
                    self.health.report(
                        Poller::LogEnd,
                        PollerHealth::Failing {
                            error: e.to_string(),
                        },
                    );
                    self.metrics.record_reconnect();
                    client = None;
                    if self.sleep_or_shutdown(error_backoff).await {
                        break;
                    }
                }
                Ok(Ok(partitions)) => {
                    debug!(partitions, "log end cycle complete");
                    self.metrics.set_tracked_partitions(partitions as u64);
                    self.metrics.record_log_end_cycle();
                    self.health.report(Poller::LogEnd, PollerHealth::Fresh);
                    if self.sleep_or_shutdown(interval).await {
                        break;
                    }
                }
            }
        }

        info!("log end poller stopped");
    }

    fn create_consumer(&self) -> Result<BaseConsumer> {
        let consumer: BaseConsumer = client_config(
            &self.config.kafka,
            Some(&self.config.tracker.log_end_group),
            self.config.tracker.session_timeout_ms,
        )
        .create()
        .map_err(|e| KafkaError::ConnectionFailed {
            broker: self.config.kafka.bootstrap_servers.join(","),
            message: e.to_string(),
        })?;
        Ok(consumer)
    }

    async fn sleep_or_shutdown(&mut self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.shutdown.recv() => true,
            _ = tokio::time::sleep(duration) => false,
        }
    }
}

/// One blocking metadata-and-watermark pass over the cluster.
///
/// Publishes the topic map before reading watermarks, so a failure partway
/// through leaves fresh metadata and partially updated log ends rather
/// than nothing.
fn refresh_log_ends(
    consumer: &BaseConsumer,
    cluster_partitions: &ClusterPartitions,
    log_ends: &LogEnds,
    timeout: Duration,
) -> Result<usize> {
    let metadata = consumer
        .fetch_metadata(None, timeout)
        .map_err(|e| KafkaError::Metadata(e.to_string()))?;

    let brokers: HashMap<i32, (String, i32)> = metadata
        .brokers()
        .iter()
        .map(|b| (b.id(), (b.host().to_string(), b.port())))
        .collect();

    let mut topic_map: HashMap<String, Vec<PartitionInfo>> = HashMap::new();
    let mut pairs: Vec<TopicPartition> = Vec::new();

    for topic in metadata.topics() {
        let mut infos: Vec<PartitionInfo> = topic
            .partitions()
            .iter()
            .map(|p| {
                let (leader_host, leader_port) = brokers
                    .get(&p.leader())
                    .cloned()
                    .unwrap_or_else(|| (String::new(), -1));
                PartitionInfo {
                    topic: topic.name().to_string(),
                    partition: p.id(),
                    leader_host,
                    leader_port,
                    replicas: p.replicas().to_vec(),
                    isr: p.isr().to_vec(),
                }
            })
            .collect();
        infos.sort_by_key(|info| info.partition);

        pairs.extend(
            infos
                .iter()
                .map(|info| TopicPartition::new(info.topic.clone(), info.partition)),
        );
        topic_map.insert(topic.name().to_string(), infos);
    }

    cluster_partitions.publish(topic_map);

    let count = pairs.len();
    for tp in pairs {
        let (_low, high) = consumer
            .fetch_watermarks(&tp.topic, tp.partition, timeout)
            .map_err(|e| KafkaError::Watermarks {
                topic: tp.topic.clone(),
                partition: tp.partition,
                message: e.to_string(),
            })?;
        log_ends.record(tp, high);
    }

    Ok(count)
}
