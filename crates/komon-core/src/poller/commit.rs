//! Listener for the `__consumer_offsets` commit topic.
//!
//! Maintains the committed-offsets projection. The consumer never commits
//! its own offsets and always starts from `latest`: history before
//! start-up is not recovered.

use std::sync::Arc;
use std::time::Duration;

use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::decoder;
use crate::error::{KafkaError, Result};
use crate::health::{HealthBoard, Poller, PollerHealth};
use crate::metrics::TrackerMetrics;
use crate::state::CommittedOffsets;

use super::{client_config, CONSUMER_OFFSETS_TOPIC};

/// Owns the write side of the committed-offsets projection.
pub struct CommitListener {
    config: Config,
    committed: Arc<CommittedOffsets>,
    metrics: Arc<TrackerMetrics>,
    health: Arc<HealthBoard>,
    shutdown: broadcast::Receiver<()>,
}

impl CommitListener {
    pub fn new(
        config: Config,
        committed: Arc<CommittedOffsets>,
        metrics: Arc<TrackerMetrics>,
        health: Arc<HealthBoard>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            config,
            committed,
            metrics,
            health,
            shutdown,
        }
    }

    /// Run until the shutdown channel fires.
    ///
    /// Any consumer error drops the consumer; the next pass rebuilds and
    /// resubscribes it. The loop itself never terminates on error.
    pub async fn run(mut self) {
        let poll_timeout = Duration::from_millis(self.config.tracker.commit_poll_ms);
        let error_backoff = Duration::from_secs(self.config.tracker.error_backoff_secs);
        let mut consumer: Option<StreamConsumer> = None;

        info!("commit listener started");

        loop {
            if consumer.is_none() {
                match self.create_consumer() {
                    Ok(c) => {
                        info!(
                            topic = CONSUMER_OFFSETS_TOPIC,
                            group = %self.config.tracker.commit_listener_group,
                            "commit consumer subscribed"
                        );
                        self.health.report(Poller::CommitListener, PollerHealth::Fresh);
                        consumer = Some(c);
                    }
                    Err(e) => {
                        error!(error = %e, "failed to create commit consumer");
                        self.health.report(
                            Poller::CommitListener,
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

            let polled = {
                let Some(c) = consumer.as_ref() else { continue };
                tokio::select! {
                    _ = self.shutdown.recv() => break,
                    polled = poll_once(c, poll_timeout) => polled,
                }
            };

            match polled {
                Ok(Some((key, value))) => {
                    self.metrics.record_record();
                    self.handle_record(key.as_deref(), value.as_deref());
                }
                Ok(None) => {}
                Err(e) => {
                    error!(error = %e, "commit consumer poll failed, rebuilding consumer");
                    self.health.report(
                        Poller::CommitListener,
                        PollerHealth::Failing {
                            error: e.to_string(),
                        },
                    );
                    self.metrics.record_reconnect();
                    consumer = None;
                    if self.sleep_or_shutdown(error_backoff).await {
                        break;
                    }
                }
            }
        }

        info!("commit listener stopped");
    }

    fn handle_record(&self, key: Option<&[u8]>, value: Option<&[u8]>) {
        match decoder::decode(key, value) {
            Some((gtp, record)) => {
                self.metrics.record_offset_commit();
                let offset = record.offset;
                if self.committed.record(gtp.clone(), record) {
                    self.metrics.record_commit_write();
                    debug!(
                        group = %gtp.group,
                        topic = %gtp.topic,
                        partition = gtp.partition,
                        offset,
                        "committed offset updated"
                    );
                }
            }
            None => self.metrics.record_skipped(),
        }
    }

    fn create_consumer(&self) -> Result<StreamConsumer> {
        let consumer: StreamConsumer = client_config(
            &self.config.kafka,
            Some(&self.config.tracker.commit_listener_group),
            self.config.tracker.session_timeout_ms,
        )
        .create()
        .map_err(|e| KafkaError::ConnectionFailed {
            broker: self.config.kafka.bootstrap_servers.join(","),
            message: e.to_string(),
        })?;

        consumer
            .subscribe(&[CONSUMER_OFFSETS_TOPIC])
            .map_err(|e| KafkaError::Subscribe(e.to_string()))?;

        Ok(consumer)
    }

    /// Returns true when shutdown fired during the sleep.
    async fn sleep_or_shutdown(&mut self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.shutdown.recv() => true,
            _ = tokio::time::sleep(duration) => false,
        }
    }
}

type RawRecord = (Option<Vec<u8>>, Option<Vec<u8>>);

/// Block up to `timeout` for one record. `Ok(None)` is a quiet poll.
async fn poll_once(consumer: &StreamConsumer, timeout: Duration) -> Result<Option<RawRecord>> {
    use futures::StreamExt;

    let stream = consumer.stream();
    tokio::pin!(stream);

    match tokio::time::timeout(timeout, stream.next()).await {
        Ok(Some(Ok(msg))) => Ok(Some((
            msg.key().map(|k| k.to_vec()),
            msg.payload().map(|v| v.to_vec()),
        ))),
        Ok(Some(Err(e))) => Err(KafkaError::Poll(e.to_string()).into()),
        Ok(None) => Ok(None),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{KafkaConfig, KafkaSecurityConfig, MonitoringConfig, TrackerConfig};
    use crate::state::GroupTopicPartition;
    use bytes::BufMut;

    fn test_config() -> Config {
        Config {
            kafka: KafkaConfig {
                bootstrap_servers: vec!["localhost:9092".into()],
                security: KafkaSecurityConfig::default(),
            },
            tracker: TrackerConfig::default(),
            monitoring: MonitoringConfig::default(),
        }
    }

    fn listener() -> (CommitListener, Arc<CommittedOffsets>, Arc<TrackerMetrics>) {
        let committed = Arc::new(CommittedOffsets::default());
        let metrics = Arc::new(TrackerMetrics::new());
        let health = Arc::new(HealthBoard::new());
        let (_tx, rx) = broadcast::channel(1);
        let listener = CommitListener::new(
            test_config(),
            Arc::clone(&committed),
            Arc::clone(&metrics),
            health,
            rx,
        );
        (listener, committed, metrics)
    }

    fn commit_key(group: &str, topic: &str, partition: i32) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.put_i16(1);
        buf.put_i16(group.len() as i16);
        buf.put_slice(group.as_bytes());
        buf.put_i16(topic.len() as i16);
        buf.put_slice(topic.as_bytes());
        buf.put_i32(partition);
        buf
    }

    fn commit_value(offset: i64, commit_ts: i64, expire_ts: i64) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.put_i16(1);
        buf.put_i64(offset);
        buf.put_i16(0);
        buf.put_i64(commit_ts);
        buf.put_i64(expire_ts);
        buf
    }

    #[test]
    fn test_handle_record_applies_write_rule() {
        let (listener, committed, metrics) = listener();
        let key = commit_key("g1", "t1", 0);

        for (i, offset) in [5i64, 5, 7, 7, 4].iter().enumerate() {
            let value = commit_value(*offset, i as i64, i as i64);
            listener.handle_record(Some(&key), Some(&value));
        }

        let stored = committed
            .get(&GroupTopicPartition::new("g1", "t1", 0))
            .unwrap();
        assert_eq!(stored.offset, 4);
        assert_eq!(metrics.records_skipped_total(), 0);
        assert_eq!(metrics.offset_commits_total(), 5);
        assert_eq!(metrics.commit_writes_total(), 3);
    }

    #[test]
    fn test_handle_record_skips_undecodable() {
        let (listener, committed, metrics) = listener();

        listener.handle_record(None, None);
        listener.handle_record(Some(&[0x00]), Some(&[0x01]));

        assert!(committed.is_empty());
        assert_eq!(metrics.records_skipped_total(), 2);
        assert_eq!(metrics.commit_writes_total(), 0);
    }

    #[test]
    fn test_handle_record_skips_tombstone() {
        let (listener, committed, metrics) = listener();
        let key = commit_key("g1", "t1", 0);

        listener.handle_record(Some(&key), None);

        assert!(committed.is_empty());
        assert_eq!(metrics.records_skipped_total(), 1);
    }
}
