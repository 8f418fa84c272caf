//! Account model.
//!
//! An account is a balance-holding entity guarded by its own
//! reader-writer lock; every balance mutation happens under that lock's
//! write side. Money is i64 currency units, and balances are allowed to
//! go negative only through the commission sweep (customer-facing
//! withdrawals check funds first).
//!
//! The second, separate `log_lock` serializes log emission referencing
//! this specific account. Its purpose is narrower than the bank-wide
//! emission lock; the two are deliberately kept distinct rather than
//! merged, matching the scoping the system has always had.

use crate::models::AccountId;
use crate::sync::{ReadGuard, ReadWriteLock, WriteGuard};

/// The mutable part of an account: credential and balance.
#[derive(Debug)]
pub struct AccountState {
    secret: String,
    balance: i64,
}

impl AccountState {
    /// Compare the stored secret for equality. Secrets are opaque
    /// strings; they are never hashed.
    pub fn verify_secret(&self, candidate: &str) -> bool {
        self.secret == candidate
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn balance(&self) -> i64 {
        self.balance
    }

    pub fn deposit(&mut self, amount: i64) {
        self.balance += amount;
    }

    pub fn withdraw(&mut self, amount: i64) {
        self.balance -= amount;
    }

    pub fn set_balance(&mut self, balance: i64) {
        self.balance = balance;
    }
}

/// A bank account: immutable id plus locked state.
#[derive(Debug)]
pub struct Account {
    id: AccountId,
    state: ReadWriteLock<AccountState>,
    log_lock: ReadWriteLock<()>,
}

impl Account {
    pub fn new(id: AccountId, secret: String, balance: i64) -> Self {
        Self {
            id,
            state: ReadWriteLock::new(AccountState { secret, balance }),
            log_lock: ReadWriteLock::new(()),
        }
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    /// Shared access for balance-only inquiry.
    pub fn read(&self) -> ReadGuard<'_, AccountState> {
        self.state.read()
    }

    /// Exclusive access for balance mutation.
    pub fn write(&self) -> WriteGuard<'_, AccountState> {
        self.state.write()
    }

    /// The per-account log-emission lock (see module docs).
    pub fn log_lock(&self) -> &ReadWriteLock<()> {
        &self.log_lock
    }
}
