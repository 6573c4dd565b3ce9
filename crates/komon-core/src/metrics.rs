//! Tracker metrics: counters and gauges over the poll loops.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for the three poll loops and the decoder.
///
/// All counters are monotonic for the process lifetime; gauges reflect the
/// most recent completed cycle of their writer.
pub struct TrackerMetrics {
    // === COUNTERS ===
    /// Records consumed from the commit topic
    records_total: AtomicU64,

    /// Records that decoded to an offset commit
    offset_commits_total: AtomicU64,

    /// Records skipped (tombstones, group metadata, unknown variants,
    /// parse failures)
    records_skipped_total: AtomicU64,

    /// Writes into the committed-offsets projection (repeat-offset commits
    /// are not writes)
    commit_writes_total: AtomicU64,

    /// Consumer/client rebuilds after an error, across all pollers
    reconnects_total: AtomicU64,

    /// Completed group-metadata cycles
    metadata_cycles_total: AtomicU64,

    /// Group-metadata cycles that hit the deadline
    metadata_deadline_total: AtomicU64,

    /// Completed log-end cycles
    log_end_cycles_total: AtomicU64,

    // === GAUGES ===
    /// Active consumer groups seen in the last metadata cycle
    active_groups: AtomicU64,

    /// Distinct (topic, partition) pairs seen in the last log-end cycle
    tracked_partitions: AtomicU64,
}

impl TrackerMetrics {
    pub fn new() -> Self {
        Self {
            records_total: AtomicU64::new(0),
            offset_commits_total: AtomicU64::new(0),
            records_skipped_total: AtomicU64::new(0),
            commit_writes_total: AtomicU64::new(0),
            reconnects_total: AtomicU64::new(0),
            metadata_cycles_total: AtomicU64::new(0),
            metadata_deadline_total: AtomicU64::new(0),
            log_end_cycles_total: AtomicU64::new(0),
            active_groups: AtomicU64::new(0),
            tracked_partitions: AtomicU64::new(0),
        }
    }

    // === COUNTER RECORDING ===

    pub fn record_record(&self) {
        self.records_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_offset_commit(&self) {
        self.offset_commits_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.records_skipped_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_commit_write(&self) {
        self.commit_writes_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconnect(&self) {
        self.reconnects_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_metadata_cycle(&self) {
        self.metadata_cycles_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_metadata_deadline(&self) {
        self.metadata_deadline_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_log_end_cycle(&self) {
        self.log_end_cycles_total.fetch_add(1, Ordering::Relaxed);
    }

    // === GAUGE UPDATES ===

    pub fn set_active_groups(&self, count: u64) {
        self.active_groups.store(count, Ordering::Relaxed);
    }

    pub fn set_tracked_partitions(&self, count: u64) {
        self.tracked_partitions.store(count, Ordering::Relaxed);
    }

    // === GETTERS ===

    pub fn records_total(&self) -> u64 {
        self.records_total.load(Ordering::Relaxed)
    }

    pub fn offset_commits_total(&self) -> u64 {
        self.offset_commits_total.load(Ordering::Relaxed)
    }

    pub fn records_skipped_total(&self) -> u64 {
        self.records_skipped_total.load(Ordering::Relaxed)
    }

    pub fn commit_writes_total(&self) -> u64 {
        self.commit_writes_total.load(Ordering::Relaxed)
    }

    pub fn reconnects_total(&self) -> u64 {
        self.reconnects_total.load(Ordering::Relaxed)
    }

    pub fn metadata_cycles_total(&self) -> u64 {
        self.metadata_cycles_total.load(Ordering::Relaxed)
    }

    pub fn metadata_deadline_total(&self) -> u64 {
        self.metadata_deadline_total.load(Ordering::Relaxed)
    }

    pub fn log_end_cycles_total(&self) -> u64 {
        self.log_end_cycles_total.load(Ordering::Relaxed)
    }

    pub fn active_groups(&self) -> u64 {
        self.active_groups.load(Ordering::Relaxed)
    }

    pub fn tracked_partitions(&self) -> u64 {
        self.tracked_partitions.load(Ordering::Relaxed)
    }
}

impl Default for TrackerMetrics {
    fn default() -> Self {
        Self::new()
    }
}
