//! Integration tests for komon-core.
//!
//! These tests require Docker to be running and are marked with #[ignore]
//! to avoid running them in normal test runs.
//!
//! Run with: cargo test --test integration_tests -- --ignored

use komon_core::config::{Config, KafkaConfig, KafkaSecurityConfig, MonitoringConfig, TrackerConfig};
use komon_core::Tracker;
use std::time::Duration;

mod kafka_integration {
    use super::*;
    use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
    use rdkafka::client::DefaultClientContext;
    use rdkafka::config::ClientConfig;
    use rdkafka::consumer::{BaseConsumer, CommitMode, Consumer};
    use rdkafka::producer::{FutureProducer, FutureRecord};
    use rdkafka::{Offset, TopicPartitionList};
    use testcontainers::runners::AsyncRunner;
    use testcontainers_modules::kafka::Kafka;

    fn tracker_config(bootstrap_servers: &str) -> Config {
        Config {
            kafka: KafkaConfig {
                bootstrap_servers: vec![bootstrap_servers.to_string()],
                security: KafkaSecurityConfig::default(),
            },
            tracker: TrackerConfig {
                // Tighten the cycles so the test converges quickly.
                metadata_interval_secs: 2,
                log_end_interval_secs: 1,
                error_backoff_secs: 1,
                request_timeout_secs: 10,
                metadata_deadline_secs: 10,
                ..TrackerConfig::default()
            },
            monitoring: MonitoringConfig::default(),
        }
    }

    /// End to end: produce records, commit an offset from a throwaway
    /// group, and wait for the tracker to report the lag.
    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_tracker_reports_lag() {
        let kafka = Kafka::default()
            .start()
            .await
            .expect("Failed to start Kafka container");
        let bootstrap_servers = format!(
            "127.0.0.1:{}",
            kafka
                .get_host_port_ipv4(9093)
                .await
                .expect("Failed to get Kafka port")
        );

        // Create the observed topic.
        let admin: AdminClient<DefaultClientContext> = ClientConfig::new()
            .set("bootstrap.servers", &bootstrap_servers)
            .create()
            .expect("Failed to create admin client");
        let topic = NewTopic::new("orders", 1, TopicReplication::Fixed(1));
        admin
            .create_topics(&[topic], &AdminOptions::new())
            .await
            .expect("Failed to create topic");

        // Produce five records so the log end moves to 5.
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &bootstrap_servers)
            .set("message.timeout.ms", "5000")
            .create()
            .expect("Failed to create producer");
        for i in 0..5 {
            let key = format!("key-{}", i);
            let payload = format!("payload-{}", i);
            producer
                .send(
                    FutureRecord::to("orders").key(&key).payload(&payload),
                    Duration::from_secs(5),
                )
                .await
                .expect("Failed to produce");
        }

        // Start the tracker before committing: the commit listener reads
        // the commit topic from `latest`.
        let tracker = Tracker::new(tracker_config(&bootstrap_servers)).expect("config");
        let handles = tracker.spawn();
        tokio::time::sleep(Duration::from_secs(5)).await;

        // Commit offset 3 for a throwaway group, repeatedly, until the
        // tracker has observed it.
        let committer: BaseConsumer = ClientConfig::new()
            .set("bootstrap.servers", &bootstrap_servers)
            .set("group.id", "g-orders")
            .set("enable.auto.commit", "false")
            .create()
            .expect("Failed to create committing consumer");
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset("orders", 0, Offset::Offset(3))
            .expect("tpl");

        let query = tracker.query();
        let mut observed = None;
        for _ in 0..60 {
            committer
                .commit(&tpl, CommitMode::Sync)
                .expect("Failed to commit offset");
            if let Some(info) = query.partition_offset_info("g-orders", "orders", 0) {
                observed = Some(info);
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        let info = observed.expect("tracker never observed the commit");
        assert_eq!(info.offset, 3);

        // The log-end poller needs a cycle or two to see the topic.
        let mut log_size = info.log_size;
        for _ in 0..30 {
            if log_size == 5 {
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
            if let Some(info) = query.partition_offset_info("g-orders", "orders", 0) {
                log_size = info.log_size;
            }
        }
        assert_eq!(log_size, 5);

        let topics = query.list_topics();
        assert!(topics.contains(&"orders".to_string()));

        let topology = query.cluster_topology();
        assert_eq!(topology.name, "KafkaCluster");
        assert!(!topology.children.is_empty());

        tracker.shutdown();
        for handle in handles {
            tokio::time::timeout(Duration::from_secs(30), handle)
                .await
                .expect("poller did not stop")
                .expect("poller panicked");
        }
    }

    /// The tracker comes up cleanly against an empty cluster and shuts
    /// down without touching any projection.
    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_tracker_idle_cluster() {
        let kafka = Kafka::default()
            .start()
            .await
            .expect("Failed to start Kafka container");
        let bootstrap_servers = format!(
            "127.0.0.1:{}",
            kafka
                .get_host_port_ipv4(9093)
                .await
                .expect("Failed to get Kafka port")
        );

        let tracker = Tracker::new(tracker_config(&bootstrap_servers)).expect("config");
        let handles = tracker.spawn();

        // Give every poller at least one full cycle.
        tokio::time::sleep(Duration::from_secs(5)).await;

        let query = tracker.query();
        assert!(query.list_groups().is_empty());
        assert!(query.partition_offset_info("none", "none", 0).is_none());
        // At minimum one metadata and one log-end cycle completed.
        assert!(tracker.metrics().metadata_cycles_total() >= 1);
        assert!(tracker.metrics().log_end_cycles_total() >= 1);

        tracker.shutdown();
        for handle in handles {
            tokio::time::timeout(Duration::from_secs(30), handle)
                .await
                .expect("poller did not stop")
                .expect("poller panicked");
        }
    }
}
