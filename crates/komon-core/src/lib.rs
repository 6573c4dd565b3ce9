//! komon core - Kafka consumer-group offset tracker
//!
//! Continuously observes a Kafka cluster and maintains a live, queryable
//! picture of consumer-group progress: for every (group, topic, partition)
//! it reports the last committed offset, the current log-end offset, the
//! resulting lag, the owning client and the commit/expire timestamps.
//!
//! Three independent poll loops feed concurrently-readable in-memory
//! projections:
//!
//! - the commit listener decodes Kafka's internal `__consumer_offsets`
//!   topic into committed offsets
//! - the metadata poller enumerates consumer groups and member assignments
//! - the log-end poller records high watermarks and cluster topology
//!
//! The query layer joins the projections on demand; it never blocks on the
//! pollers. All state is in memory and rebuilt from the cluster after a
//! restart.

pub mod config;
pub mod decoder;
pub mod dns;
pub mod error;
pub mod health;
pub mod metrics;
pub mod poller;
pub mod query;
pub mod state;
pub mod tracker;

// Re-export commonly used types
pub use config::Config;
pub use error::{DecodeError, Error, KafkaError, Result};
pub use query::{Node, OffsetInfo, TrackerQuery};
pub use state::TrackerState;
pub use tracker::Tracker;
