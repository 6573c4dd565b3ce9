//! In-memory projections maintained by the pollers and read by the query
//! layer.
//!
//! Each projection has exactly one writer. The per-key maps use `DashMap`
//! so single-key reads and writes are atomic without an external lock; the
//! wholesale-replaced projections publish an immutable `Arc` snapshot
//! behind an `RwLock`, so readers see either the old snapshot or the new
//! one, never a partial merge.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Key into the committed-offsets projection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupTopicPartition {
    pub group: String,
    pub topic: String,
    pub partition: i32,
}

impl GroupTopicPartition {
    pub fn new(group: impl Into<String>, topic: impl Into<String>, partition: i32) -> Self {
        Self {
            group: group.into(),
            topic: topic.into(),
            partition,
        }
    }

    /// The (topic, partition) half of the key.
    pub fn topic_partition(&self) -> TopicPartition {
        TopicPartition {
            topic: self.topic.clone(),
            partition: self.partition,
        }
    }
}

/// A decoded offset-commit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetRecord {
    pub offset: i64,
    pub metadata: String,
    /// Commit timestamp in milliseconds since epoch
    pub commit_timestamp: i64,
    /// Expire timestamp in milliseconds since epoch
    pub expire_timestamp: i64,
}

/// A (topic, partition) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TopicPartition {
    pub topic: String,
    pub partition: i32,
}

impl TopicPartition {
    pub fn new(topic: impl Into<String>, partition: i32) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }
}

/// A (topic, group) membership pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicAndGroup {
    pub topic: String,
    pub group: String,
}

/// One active consumer instance and its partition assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientGroup {
    pub group: String,
    pub client_id: String,
    pub client_host: String,
    pub topic_partitions: HashSet<TopicPartition>,
}

/// Cluster-metadata snapshot for one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionInfo {
    pub topic: String,
    pub partition: i32,
    pub leader_host: String,
    pub leader_port: i32,
    pub replicas: Vec<i32>,
    pub isr: Vec<i32>,
}

/// Committed offsets, keyed by (group, topic, partition).
///
/// Writer: the commit listener. Keys grow monotonically during uptime; a
/// value is overwritten only when a commit arrives with a different offset.
#[derive(Debug, Default)]
pub struct CommittedOffsets {
    inner: DashMap<GroupTopicPartition, OffsetRecord>,
}

impl CommittedOffsets {
    /// Apply the write-if-changed rule: a commit is written only when the
    /// key is absent or its stored offset differs from the new offset.
    /// Commits that repeat the same offset with only a timestamp change
    /// are dropped. Returns whether a write happened.
    pub fn record(&self, key: GroupTopicPartition, record: OffsetRecord) -> bool {
        match self.inner.entry(key) {
            Entry::Occupied(entry) if entry.get().offset == record.offset => false,
            Entry::Occupied(mut entry) => {
                entry.insert(record);
                true
            }
            Entry::Vacant(entry) => {
                entry.insert(record);
                true
            }
        }
    }

    pub fn get(&self, key: &GroupTopicPartition) -> Option<OffsetRecord> {
        self.inner.get(key).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Log-end offsets keyed by (topic, partition).
///
/// Writer: the log-end poller. Entries are added but never removed; a
/// deleted topic's partition lingers at its last observed value.
#[derive(Debug, Default)]
pub struct LogEnds {
    inner: DashMap<TopicPartition, i64>,
}

impl LogEnds {
    pub fn record(&self, key: TopicPartition, log_end: i64) {
        self.inner.insert(key, log_end);
    }

    pub fn get(&self, key: &TopicPartition) -> Option<i64> {
        self.inner.get(key).map(|v| *v.value())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// The three projections owned by the metadata poller, replaced wholesale
/// each cycle.
#[derive(Debug, Default)]
pub struct GroupMetadata {
    clients: RwLock<Arc<Vec<ClientGroup>>>,
    topic_groups: RwLock<Arc<HashSet<TopicAndGroup>>>,
    active_partitions: RwLock<Arc<HashSet<TopicPartition>>>,
}

/// One metadata cycle's freshly built sets, published together.
#[derive(Debug, Default)]
pub struct GroupMetadataSnapshot {
    pub clients: Vec<ClientGroup>,
    pub topic_groups: HashSet<TopicAndGroup>,
    pub active_partitions: HashSet<TopicPartition>,
}

impl GroupMetadata {
    /// Replace all three sets. Each individual projection is swapped by a
    /// single atomic assignment; cross-projection readers may still observe
    /// sets from different cycles.
    pub fn publish(&self, snapshot: GroupMetadataSnapshot) {
        *self.clients.write() = Arc::new(snapshot.clients);
        *self.topic_groups.write() = Arc::new(snapshot.topic_groups);
        *self.active_partitions.write() = Arc::new(snapshot.active_partitions);
    }

    pub fn clients(&self) -> Arc<Vec<ClientGroup>> {
        self.clients.read().clone()
    }

    pub fn topic_groups(&self) -> Arc<HashSet<TopicAndGroup>> {
        self.topic_groups.read().clone()
    }

    pub fn active_partitions(&self) -> Arc<HashSet<TopicPartition>> {
        self.active_partitions.read().clone()
    }
}

/// Topic -> ordered partition metadata, replaced wholesale by the log-end
/// poller each cycle.
#[derive(Debug, Default)]
pub struct ClusterPartitions {
    inner: RwLock<Arc<HashMap<String, Vec<PartitionInfo>>>>,
}

impl ClusterPartitions {
    pub fn publish(&self, map: HashMap<String, Vec<PartitionInfo>>) {
        *self.inner.write() = Arc::new(map);
    }

    pub fn snapshot(&self) -> Arc<HashMap<String, Vec<PartitionInfo>>> {
        self.inner.read().clone()
    }
}

/// All projections of one tracker instance.
///
/// Each field is individually `Arc`ed so the tracker can hand every poller
/// only the projection(s) it writes; the query layer receives the whole
/// state read-only.
#[derive(Debug, Default)]
pub struct TrackerState {
    pub committed: Arc<CommittedOffsets>,
    pub log_ends: Arc<LogEnds>,
    pub group_metadata: Arc<GroupMetadata>,
    pub cluster_partitions: Arc<ClusterPartitions>,
}

impl TrackerState {
    pub fn new() -> Self {
        Self::default()
    }
}
