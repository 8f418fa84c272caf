//! Snapshot history: bounded, in-memory rollback support.
//!
//! Each maintenance tick captures a full deep copy of every account and
//! appends it to a fixed-capacity ring buffer, overwriting the oldest
//! slot once full. A rollback distance `R` addresses the snapshot taken
//! `R` ticks ago (`R = 1` is the most recent). The count of snapshots
//! taken so far saturates at capacity and never shrinks, so a rollback
//! distance validated at submission time stays valid until applied.
//!
//! History does not survive a process restart; persistence is out of
//! scope.

use crate::models::{Account, AccountId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default ring-buffer depth.
pub const HISTORY_CAPACITY: usize = 120;

/// Deep copy of one account at an instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub id: AccountId,
    pub secret: String,
    pub balance: i64,
}

impl From<&Account> for AccountSnapshot {
    fn from(account: &Account) -> Self {
        let state = account.read();
        Self {
            id: account.id(),
            secret: state.secret().to_string(),
            balance: state.balance(),
        }
    }
}

/// Full-ledger snapshot: every account present at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub accounts: BTreeMap<AccountId, AccountSnapshot>,
}

impl LedgerSnapshot {
    pub fn balance_of(&self, id: AccountId) -> Option<i64> {
        self.accounts.get(&id).map(|snapshot| snapshot.balance)
    }

    pub fn contains(&self, id: AccountId) -> bool {
        self.accounts.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

/// Fixed-capacity circular buffer of ledger snapshots.
#[derive(Debug, Clone)]
pub struct History {
    slots: Vec<LedgerSnapshot>,
    cursor: usize,
    taken: usize,
}

impl History {
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "history capacity must be positive");
        Self {
            slots: vec![LedgerSnapshot::default(); capacity],
            cursor: 0,
            taken: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Snapshots recorded so far, saturating at capacity. This bounds
    /// the valid rollback distances.
    pub fn taken(&self) -> usize {
        self.taken
    }

    /// Whether a rollback of `steps_back` ticks addresses a recorded
    /// snapshot (`1 <= steps_back <= taken`).
    pub fn is_valid_distance(&self, steps_back: usize) -> bool {
        (1..=self.taken).contains(&steps_back)
    }

    /// Append a snapshot, overwriting the oldest slot when full.
    pub fn record(&mut self, snapshot: LedgerSnapshot) {
        self.cursor = (self.cursor + 1) % self.capacity();
        self.slots[self.cursor] = snapshot;
        self.taken = (self.taken + 1).min(self.capacity());
    }

    /// The snapshot taken `steps_back` recordings ago (`1` = newest), or
    /// `None` for a distance that was never recorded.
    pub fn state_at(&self, steps_back: usize) -> Option<LedgerSnapshot> {
        if !self.is_valid_distance(steps_back) {
            return None;
        }
        let capacity = self.capacity();
        let index = (self.cursor + capacity + 1 - steps_back) % capacity;
        Some(self.slots[index].clone())
    }
}
