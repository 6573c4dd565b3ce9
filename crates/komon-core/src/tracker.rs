//! Tracker orchestration.
//!
//! Wires the three pollers to the projections they write and hands the
//! query layer the whole state read-only. Single-writer-per-projection is
//! enforced by construction: each poller receives only the field(s) it
//! owns.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::Config;
use crate::dns::ReverseDnsCache;
use crate::health::HealthBoard;
use crate::metrics::TrackerMetrics;
use crate::poller::{CommitListener, LogEndPoller, MetadataPoller};
use crate::query::TrackerQuery;
use crate::state::TrackerState;
use crate::Result;

/// A configured offset tracker.
pub struct Tracker {
    config: Config,
    state: Arc<TrackerState>,
    metrics: Arc<TrackerMetrics>,
    health: Arc<HealthBoard>,
    dns: Arc<ReverseDnsCache>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Tracker {
    /// Validate the configuration and build empty projections.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let state = Arc::new(TrackerState::new());
        let metrics = Arc::new(TrackerMetrics::new());
        let health = Arc::new(HealthBoard::new());

        let dns = Arc::new(ReverseDnsCache::new(Duration::from_secs(
            config.tracker.dns_cache_ttl_secs,
        )));

        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            config,
            state,
            metrics,
            health,
            dns,
            shutdown_tx,
        })
    }

    /// Spawn the three poller tasks. Each runs until [`shutdown`] fires.
    ///
    /// [`shutdown`]: Self::shutdown
    pub fn spawn(&self) -> Vec<JoinHandle<()>> {
        let listener = CommitListener::new(
            self.config.clone(),
            Arc::clone(&self.state.committed),
            Arc::clone(&self.metrics),
            Arc::clone(&self.health),
            self.shutdown_tx.subscribe(),
        );

        let metadata = MetadataPoller::new(
            self.config.clone(),
            Arc::clone(&self.state.group_metadata),
            Arc::clone(&self.dns),
            Arc::clone(&self.metrics),
            Arc::clone(&self.health),
            self.shutdown_tx.subscribe(),
        );

        let log_end = LogEndPoller::new(
            self.config.clone(),
            Arc::clone(&self.state.log_ends),
            Arc::clone(&self.state.cluster_partitions),
            Arc::clone(&self.metrics),
            Arc::clone(&self.health),
            self.shutdown_tx.subscribe(),
        );

        info!(
            brokers = %self.config.kafka.bootstrap_servers.join(","),
            "starting offset tracker"
        );

        vec![
            tokio::spawn(listener.run()),
            tokio::spawn(metadata.run()),
            tokio::spawn(log_end.run()),
        ]
    }

    /// Signal all pollers to finish their current iteration and exit.
    pub fn shutdown(&self) {
        info!("shutdown requested");
        let _ = self.shutdown_tx.send(());
    }

    /// A read-only query handle over the projections.
    pub fn query(&self) -> TrackerQuery {
        TrackerQuery::new(Arc::clone(&self.state))
    }

    pub fn state(&self) -> &Arc<TrackerState> {
        &self.state
    }

    pub fn metrics(&self) -> &Arc<TrackerMetrics> {
        &self.metrics
    }

    pub fn health(&self) -> &Arc<HealthBoard> {
        &self.health
    }
}
