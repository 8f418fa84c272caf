//! Bank configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::history::HISTORY_CAPACITY;

/// Configuration for a [`Bank`](crate::ledger::Bank) instance.
///
/// Defaults mirror the simulated bank's production cadence: a
/// commission sweep every 3 seconds, a maintenance tick (snapshot +
/// queued request application) every 500 ms, and a 120-deep snapshot
/// history. Tests shrink the intervals or push them out of reach.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankConfig {
    /// Number of worker threads in the VIP lane pool.
    pub vip_workers: usize,

    /// Interval between commission sweeps.
    pub commission_interval: Duration,

    /// Interval between maintenance ticks (snapshot, then queued
    /// closure/restore application).
    pub maintenance_interval: Duration,

    /// Capacity of the snapshot ring buffer.
    pub history_capacity: usize,

    /// Seed for the commission percentage RNG.
    pub rng_seed: u64,

    /// Pacing delay between a terminal's commands, also used as the
    /// gap before a persistent command's second attempt.
    pub command_pacing: Duration,

    /// Secret of the house (commission sink) account.
    pub house_secret: String,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            vip_workers: 1,
            commission_interval: Duration::from_secs(3),
            maintenance_interval: Duration::from_millis(500),
            history_capacity: HISTORY_CAPACITY,
            rng_seed: 42,
            command_pacing: Duration::from_millis(100),
            house_secret: "house_secret".to_string(),
        }
    }
}

impl BankConfig {
    /// Config variant whose daemons effectively never fire, for tests
    /// that drive sweeps and maintenance ticks manually.
    pub fn manual() -> Self {
        Self {
            commission_interval: Duration::from_secs(3600),
            maintenance_interval: Duration::from_secs(3600),
            command_pacing: Duration::from_millis(1),
            ..Self::default()
        }
    }
}
