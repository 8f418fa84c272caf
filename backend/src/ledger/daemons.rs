//! Background daemons: the commission sweep and the maintenance tick.
//!
//! Both run as dedicated threads owned by the bank and park on the
//! shared shutdown token between rounds, so shutdown interrupts a
//! sleep immediately. The maintenance tick does three things in a fixed
//! order: record a snapshot, apply queued terminal closures, apply
//! queued restores. Keeping closures ahead of restores means a restore
//! requested by a terminal that was just closed still applies; the
//! request outlives its requester.

use super::{Bank, BankError, ClosureRequest, LogMode};
use crate::models::BankEvent;
use std::sync::Arc;

pub(super) fn commission_loop(bank: Arc<Bank>) {
    let interval = bank.config.commission_interval;
    while !bank.shutdown_token().wait_timeout(interval) {
        bank.charge_commission();
    }
}

pub(super) fn maintenance_loop(bank: Arc<Bank>) {
    let interval = bank.config.maintenance_interval;
    while !bank.shutdown_token().wait_timeout(interval) {
        bank.maintenance_tick();
    }
}

impl Bank {
    /// One commission round: draw a percentage in 1..=5, then debit
    /// every customer account and credit the house.
    ///
    /// The membership is pinned first (account `Arc`s cloned under the
    /// map read lock); the sweep itself holds only one account lock at
    /// a time, so it never blocks the whole ledger. An account deleted
    /// mid-sweep is still charged through its pinned handle.
    pub fn charge_commission(&self) {
        let percent = self.rng.lock().range(1, 6);
        let accounts: Vec<_> = self.accounts.read().values().cloned().collect();
        for account in accounts {
            let mut state = account.write();
            let amount = (state.balance() as f64 * percent as f64 / 100.0).round() as i64;
            state.withdraw(amount);
            drop(state);
            self.house.write().deposit(amount);
            self.emit(BankEvent::CommissionCharged {
                account: account.id(),
                percent,
                amount,
            });
        }
    }

    /// One maintenance round: snapshot, then closures, then restores.
    pub fn maintenance_tick(&self) {
        self.save_state();
        self.process_closures();
        self.process_restores();
    }

    /// Record the current ledger state into the snapshot ring.
    pub fn save_state(&self) {
        let snapshot = self.current_snapshot();
        self.history.write().record(snapshot);
    }

    /// Drain the closure queue, applying each request in FIFO order.
    pub fn process_closures(&self) {
        loop {
            let request = self.closure_requests.write().pop_front();
            match request {
                Some(request) => self.apply_closure(request),
                None => break,
            }
        }
    }

    fn apply_closure(&self, request: ClosureRequest) {
        // Mark closed and take what we need under the registry lock,
        // then release it before the gate acquisition and the join.
        let taken = {
            let mut registry = self.registry.write();
            match registry.get_mut(request.target) {
                Some(slot) if slot.open => {
                    slot.open = false;
                    slot.stop.cancel();
                    Some((Arc::clone(&slot.gate), slot.handle.take()))
                }
                _ => None,
            }
        };
        match taken {
            Some((gate, handle)) => {
                // Wait out a command already in flight on that terminal.
                drop(gate.write());
                if let Some(handle) = handle {
                    if handle.join().is_err() {
                        log::error!("terminal {} panicked during closure", request.target);
                    }
                }
                self.emit(BankEvent::TerminalClosed {
                    terminal: request.target,
                });
            }
            None => {
                // Raced with another closure request or the terminal
                // never existed; report to the requester.
                let _ = self.report(
                    request.requester,
                    LogMode::Logged,
                    BankError::TerminalAlreadyClosed {
                        terminal: request.target,
                    },
                );
            }
        }
    }

    /// Drain the restore queue, applying each request in FIFO order.
    pub fn process_restores(&self) {
        loop {
            let request = self.restore_requests.write().pop_front();
            match request {
                Some(request) => self.apply_restore(request.steps_back, request.requester),
                None => break,
            }
        }
    }

    /// Roll the ledger back to a recorded snapshot. Survivor accounts
    /// get their balance overwritten in place (their locks and any
    /// pinned handles stay valid), deleted accounts are recreated, and
    /// accounts born after the snapshot are removed.
    fn apply_restore(&self, steps_back: usize, requester: crate::models::TerminalId) {
        let snapshot = self.history.read().state_at(steps_back);
        let snapshot = match snapshot {
            Some(snapshot) => snapshot,
            None => {
                // Validated at submission and the count never shrinks;
                // only a capacity misconfiguration can land here.
                log::error!("restore point {steps_back} is no longer addressable");
                return;
            }
        };
        let mut map = self.accounts.write();
        for (id, saved) in &snapshot.accounts {
            match map.get(id) {
                Some(account) => account.write().set_balance(saved.balance),
                None => {
                    map.insert(
                        *id,
                        Arc::new(crate::models::Account::new(
                            *id,
                            saved.secret.clone(),
                            saved.balance,
                        )),
                    );
                }
            }
        }
        map.retain(|id, _| snapshot.contains(*id));
        drop(map);
        self.emit(BankEvent::RestoreCompleted {
            terminal: requester,
            steps_back,
        });
    }
}
