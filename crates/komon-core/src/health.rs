//! Poller health board.
//!
//! The only user-visible failure mode of the tracker is staleness: every
//! poller retries forever, so a broken broker connection never stops the
//! process, it just freezes the projection that poller writes. The board
//! records, per poller, whether its projection is fresh, stale, or stuck
//! behind a failing client. Slots exist by construction; there is no
//! registration step.

use parking_lot::RwLock;

/// The three poll loops, used as health-slot keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poller {
    CommitListener,
    GroupMetadata,
    LogEnd,
}

impl Poller {
    pub const ALL: [Poller; 3] = [
        Poller::CommitListener,
        Poller::GroupMetadata,
        Poller::LogEnd,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Poller::CommitListener => "commit_listener",
            Poller::GroupMetadata => "group_metadata",
            Poller::LogEnd => "log_end",
        }
    }
}

/// Health of one poller's projection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PollerHealth {
    /// No cycle has completed since startup; the projection is empty
    #[default]
    Starting,
    /// The last cycle completed and the projection is current
    Fresh,
    /// The poller is running but its projection may lag, e.g. after a
    /// deadline overrun
    Stale { reason: String },
    /// The last attempt errored; the poller is backing off before it
    /// rebuilds its client
    Failing { error: String },
}

/// Worst-of rollup over all pollers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// Every projection is current
    Fresh,
    /// At least one projection is stale or still warming up
    Stale,
    /// At least one poller cannot reach the cluster
    Failing,
}

/// Shared health board, written by the pollers and read by embedders.
pub struct HealthBoard {
    slots: [RwLock<PollerHealth>; 3],
}

impl HealthBoard {
    pub fn new() -> Self {
        Self {
            slots: Default::default(),
        }
    }

    fn slot(&self, poller: Poller) -> &RwLock<PollerHealth> {
        &self.slots[poller as usize]
    }

    /// Overwrite a poller's health. Called by the owning poller only.
    pub fn report(&self, poller: Poller, health: PollerHealth) {
        *self.slot(poller).write() = health;
    }

    /// Current health of one poller.
    pub fn of(&self, poller: Poller) -> PollerHealth {
        self.slot(poller).read().clone()
    }

    /// Every poller with its current health, in [`Poller::ALL`] order.
    pub fn snapshot(&self) -> Vec<(&'static str, PollerHealth)> {
        Poller::ALL
            .iter()
            .map(|p| (p.name(), self.of(*p)))
            .collect()
    }

    /// Worst condition across the board. A poller that has not finished
    /// its first cycle counts as stale: its projection exists but is
    /// empty.
    pub fn condition(&self) -> Condition {
        let mut worst = Condition::Fresh;
        for poller in Poller::ALL {
            match self.of(poller) {
                PollerHealth::Failing { .. } => return Condition::Failing,
                PollerHealth::Stale { .. } | PollerHealth::Starting => {
                    worst = Condition::Stale;
                }
                PollerHealth::Fresh => {}
            }
        }
        worst
    }
}

impl Default for HealthBoard {
    fn default() -> Self {
        Self::new()
    }
}
