//! Read-only joins over the tracker projections.
//!
//! Queries never block on the pollers and never trigger a refresh. Each
//! call samples the projections it needs; results across calls may reflect
//! different wall-clock moments.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use crate::state::{GroupTopicPartition, TopicPartition, TrackerState};

/// A node in the cluster topology tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub name: String,
    pub children: Vec<Node>,
}

impl Node {
    pub fn leaf(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }
}

/// Per-partition offset information for one consumer group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetInfo {
    pub group: String,
    pub topic: String,
    pub partition: i32,
    /// Last committed offset
    pub offset: i64,
    /// Log-end offset, adjusted so it is never below `offset`
    pub log_size: i64,
    /// `"<clientId> / <clientHost>"` of the owning client, or `"NA"`
    pub owner: String,
    /// Expire timestamp of the commit, milliseconds since epoch
    pub creation: i64,
    /// Commit timestamp, milliseconds since epoch
    pub modified: i64,
}

impl OffsetInfo {
    /// Log-end minus committed offset.
    pub fn lag(&self) -> i64 {
        self.log_size - self.offset
    }
}

/// Read-only view over one tracker's projections.
#[derive(Clone)]
pub struct TrackerQuery {
    state: Arc<TrackerState>,
}

impl TrackerQuery {
    pub fn new(state: Arc<TrackerState>) -> Self {
        Self { state }
    }

    /// Sorted list of distinct consumer groups with active members.
    pub fn list_groups(&self) -> Vec<String> {
        let topic_groups = self.state.group_metadata.topic_groups();
        let groups: BTreeSet<&String> = topic_groups.iter().map(|tg| &tg.group).collect();
        groups.into_iter().cloned().collect()
    }

    /// Sorted list of distinct topics consumed by a group.
    pub fn list_topics_of_group(&self, group: &str) -> Vec<String> {
        let topic_groups = self.state.group_metadata.topic_groups();
        let topics: BTreeSet<&String> = topic_groups
            .iter()
            .filter(|tg| tg.group == group)
            .map(|tg| &tg.topic)
            .collect();
        topics.into_iter().cloned().collect()
    }

    /// Alias of [`list_topics_of_group`](Self::list_topics_of_group); both
    /// names are part of the public query surface.
    pub fn list_active_topics_of_group(&self, group: &str) -> Vec<String> {
        self.list_topics_of_group(group)
    }

    /// Topic -> sorted list of groups consuming it.
    pub fn topic_to_groups(&self) -> HashMap<String, Vec<String>> {
        let topic_groups = self.state.group_metadata.topic_groups();
        let mut grouped: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for tg in topic_groups.iter() {
            grouped
                .entry(tg.topic.clone())
                .or_default()
                .insert(tg.group.clone());
        }
        grouped
            .into_iter()
            .map(|(topic, groups)| (topic, groups.into_iter().collect()))
            .collect()
    }

    /// Sorted list of all topics on the cluster.
    pub fn list_topics(&self) -> Vec<String> {
        let snapshot = self.state.cluster_partitions.snapshot();
        let mut topics: Vec<String> = snapshot.keys().cloned().collect();
        topics.sort();
        topics
    }

    /// Tree rooted at "KafkaCluster" with one child per distinct leader
    /// `host:port`, drawn from the first partition of each topic, sorted
    /// and de-duplicated.
    pub fn cluster_topology(&self) -> Node {
        let snapshot = self.state.cluster_partitions.snapshot();
        let mut leaders: BTreeSet<String> = BTreeSet::new();
        for partitions in snapshot.values() {
            if let Some(first) = partitions.first() {
                if !first.leader_host.is_empty() {
                    leaders.insert(format!("{}:{}", first.leader_host, first.leader_port));
                }
            }
        }
        Node {
            name: "KafkaCluster".to_string(),
            children: leaders.into_iter().map(Node::leaf).collect(),
        }
    }

    /// Join the committed offset, log end and owning client for one
    /// (group, topic, partition). Absent commit means absent result.
    pub fn partition_offset_info(
        &self,
        group: &str,
        topic: &str,
        partition: i32,
    ) -> Option<OffsetInfo> {
        let key = GroupTopicPartition::new(group, topic, partition);
        let record = self.state.committed.get(&key)?;

        let tp = TopicPartition::new(topic, partition);
        // A log end that has not been observed yet is taken to equal the
        // committed offset: zero lag rather than a fabricated value.
        let log_end = self.state.log_ends.get(&tp).unwrap_or(record.offset);

        let lag = log_end - record.offset;
        // A stale log end may trail the commit; report committed + |lag|
        // so log_size never drops below the committed offset.
        let log_size = if lag < 0 { record.offset - lag } else { log_end };

        let owner = self
            .state
            .group_metadata
            .clients()
            .iter()
            .find(|c| c.group == group && c.topic_partitions.contains(&tp))
            .map(|c| format!("{} / {}", c.client_id, c.client_host))
            .unwrap_or_else(|| "NA".to_string());

        Some(OffsetInfo {
            group: group.to_string(),
            topic: topic.to_string(),
            partition,
            offset: record.offset,
            log_size,
            owner,
            creation: record.expire_timestamp,
            modified: record.commit_timestamp,
        })
    }
}
