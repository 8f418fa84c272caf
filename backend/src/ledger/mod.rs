//! The bank: account map, terminal registry, request queues, and the
//! background daemons.
//!
//! # Locking protocol
//!
//! Two levels. The account map is guarded by one reader-writer lock;
//! each account carries its own. Lookups take the map lock on the read
//! side, clone the account's `Arc`, acquire the account lock, and only
//! then release the map lock, so the account cannot be deleted out from
//! under an in-flight operation. Structural changes (open, close,
//! restore) take the map lock on the write side for their whole
//! duration.
//!
//! # Critical Invariants
//!
//! - Transfers between distinct accounts lock both sides in ascending
//!   id order. Opposite-direction transfers therefore cannot deadlock.
//! - Validation order is fixed: existence, then credential, then funds.
//!   The first failure is the one reported.
//! - Every completed operation emits exactly one event, serialized
//!   through the bank-wide emission lock.
//! - A rollback distance is validated against the snapshot count at
//!   submission time; the count never shrinks, so the queued request
//!   stays valid until the maintenance daemon applies it.

mod daemons;
mod error;

pub use error::BankError;

use crate::config::BankConfig;
use crate::history::{AccountSnapshot, History, LedgerSnapshot};
use crate::models::{Account, AccountId, BankEvent, EventSink, TerminalId};
use crate::rng::RngManager;
use crate::scheduler::{TaskQueue, Thunk, WorkerPool};
use crate::sync::{ReadWriteLock, ShutdownToken};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Reserved id of the house account that collects commissions. It
/// lives outside the customer map and is not addressable by commands.
pub const HOUSE_ACCOUNT_ID: AccountId = 0;

/// Whether a failed operation reports through the event stream.
///
/// The first attempt of a persistent command runs `Suppressed`; its
/// failure leaves no trace. Everything else runs `Logged`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    Logged,
    Suppressed,
}

/// Handed to a terminal at registration; carries its id, its private
/// stop signal, and the gate the closure protocol synchronizes on.
pub struct TerminalSeed {
    pub id: TerminalId,
    pub(crate) stop: ShutdownToken,
    pub(crate) gate: Arc<ReadWriteLock<()>>,
}

struct TerminalSlot {
    open: bool,
    stop: ShutdownToken,
    gate: Arc<ReadWriteLock<()>>,
    handle: Option<JoinHandle<()>>,
}

struct ClosureRequest {
    /// Terminal to be closed.
    target: TerminalId,
    /// Terminal that asked for the closure.
    requester: TerminalId,
}

struct RestoreRequest {
    steps_back: usize,
    requester: TerminalId,
}

/// The shared bank core. Construct with [`Bank::start`], which spawns
/// the commission and maintenance daemons; stop with [`Bank::shutdown`].
pub struct Bank {
    config: BankConfig,
    accounts: ReadWriteLock<HashMap<AccountId, Arc<Account>>>,
    house: Arc<Account>,
    registry: ReadWriteLock<Vec<TerminalSlot>>,
    closure_requests: ReadWriteLock<VecDeque<ClosureRequest>>,
    restore_requests: ReadWriteLock<VecDeque<RestoreRequest>>,
    history: ReadWriteLock<History>,
    rng: Mutex<RngManager>,
    sink: Arc<dyn EventSink>,
    /// Bank-wide emission lock: one event hits the sink at a time.
    emission_lock: ReadWriteLock<()>,
    shutdown: ShutdownToken,
    vip_queue: Arc<TaskQueue>,
    vip_pool: Mutex<Option<WorkerPool>>,
    daemons: Mutex<Vec<JoinHandle<()>>>,
}

impl Bank {
    /// Build the bank and spawn its two daemons.
    pub fn start(config: BankConfig, sink: Arc<dyn EventSink>) -> Arc<Self> {
        let vip_queue = Arc::new(TaskQueue::new());
        let house = Arc::new(Account::new(
            HOUSE_ACCOUNT_ID,
            config.house_secret.clone(),
            0,
        ));
        let history = History::new(config.history_capacity);
        let rng = RngManager::new(config.rng_seed);
        let vip_workers = config.vip_workers;

        let bank = Arc::new(Self {
            config,
            accounts: ReadWriteLock::new(HashMap::new()),
            house,
            registry: ReadWriteLock::new(Vec::new()),
            closure_requests: ReadWriteLock::new(VecDeque::new()),
            restore_requests: ReadWriteLock::new(VecDeque::new()),
            history: ReadWriteLock::new(history),
            rng: Mutex::new(rng),
            sink,
            emission_lock: ReadWriteLock::new(()),
            shutdown: ShutdownToken::new(),
            vip_queue: Arc::clone(&vip_queue),
            vip_pool: Mutex::new(None),
            daemons: Mutex::new(Vec::new()),
        });

        *bank.vip_pool.lock() = Some(WorkerPool::new(vip_queue, vip_workers));

        let mut daemons = bank.daemons.lock();
        daemons.push(spawn_daemon("commission-daemon", {
            let bank = Arc::clone(&bank);
            move || daemons::commission_loop(bank)
        }));
        daemons.push(spawn_daemon("maintenance-daemon", {
            let bank = Arc::clone(&bank);
            move || daemons::maintenance_loop(bank)
        }));
        drop(daemons);

        bank
    }

    /// Stop the daemons and the VIP pool, joining every thread. Queued
    /// VIP work still drains before the workers exit.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        let handles: Vec<_> = self.daemons.lock().drain(..).collect();
        for handle in handles {
            if handle.join().is_err() {
                log::error!("bank daemon panicked");
            }
        }
        let pool = self.vip_pool.lock().take();
        drop(pool);
    }

    pub fn config(&self) -> &BankConfig {
        &self.config
    }

    pub(crate) fn shutdown_token(&self) -> &ShutdownToken {
        &self.shutdown
    }

    /// Queue a job on the VIP lane. Numerically smaller priority runs
    /// first; equal priorities run in submission order.
    pub fn submit_vip(&self, priority: i32, job: Thunk) {
        self.vip_queue.push(priority, job);
    }

    // ------------------------------------------------------------------
    // Account operations
    // ------------------------------------------------------------------

    /// Open a new account. Fails if the id is already taken.
    pub fn create_account(
        &self,
        id: AccountId,
        secret: &str,
        balance: i64,
        terminal: TerminalId,
        mode: LogMode,
    ) -> Result<(), BankError> {
        let mut map = self.accounts.write();
        if map.contains_key(&id) {
            drop(map);
            return Err(self.report(terminal, mode, BankError::DuplicateAccount { id }));
        }
        map.insert(id, Arc::new(Account::new(id, secret.to_string(), balance)));
        drop(map);
        self.emit(BankEvent::AccountOpened {
            terminal,
            account: id,
            secret: secret.to_string(),
            balance,
        });
        Ok(())
    }

    /// Remove an account. Takes the map lock on the write side for the
    /// whole operation, which waits out every in-flight lookup before
    /// the account can disappear.
    pub fn delete_account(
        &self,
        id: AccountId,
        secret: &str,
        terminal: TerminalId,
        mode: LogMode,
    ) -> Result<(), BankError> {
        let mut map = self.accounts.write();
        let account = match map.get(&id) {
            Some(account) => Arc::clone(account),
            None => {
                drop(map);
                return Err(self.report(terminal, mode, BankError::AccountNotFound { id }));
            }
        };
        let final_balance = {
            let state = account.write();
            if !state.verify_secret(secret) {
                drop(state);
                drop(map);
                return Err(self.report(terminal, mode, BankError::AuthenticationFailed { id }));
            }
            state.balance()
        };
        map.remove(&id);
        drop(map);
        self.emit(BankEvent::AccountClosed {
            terminal,
            account: id,
            final_balance,
        });
        Ok(())
    }

    pub fn deposit(
        &self,
        id: AccountId,
        secret: &str,
        amount: i64,
        terminal: TerminalId,
        mode: LogMode,
    ) -> Result<(), BankError> {
        let account = self.lookup(id, terminal, mode)?;
        let mut state = account.write();
        if !state.verify_secret(secret) {
            drop(state);
            return Err(self.report(terminal, mode, BankError::AuthenticationFailed { id }));
        }
        state.deposit(amount);
        let new_balance = state.balance();
        drop(state);
        self.emit(BankEvent::Deposited {
            terminal,
            account: id,
            amount,
            new_balance,
        });
        Ok(())
    }

    pub fn withdraw(
        &self,
        id: AccountId,
        secret: &str,
        amount: i64,
        terminal: TerminalId,
        mode: LogMode,
    ) -> Result<(), BankError> {
        let account = self.lookup(id, terminal, mode)?;
        let mut state = account.write();
        if !state.verify_secret(secret) {
            drop(state);
            return Err(self.report(terminal, mode, BankError::AuthenticationFailed { id }));
        }
        if state.balance() < amount {
            drop(state);
            return Err(self.report(terminal, mode, BankError::InsufficientFunds { id, amount }));
        }
        state.withdraw(amount);
        let new_balance = state.balance();
        drop(state);
        self.emit(BankEvent::Withdrawn {
            terminal,
            account: id,
            amount,
            new_balance,
        });
        Ok(())
    }

    /// Balance inquiry. Emission happens under the account's own log
    /// lock in addition to the bank-wide one.
    pub fn get_balance(
        &self,
        id: AccountId,
        secret: &str,
        terminal: TerminalId,
        mode: LogMode,
    ) -> Result<i64, BankError> {
        let account = self.lookup(id, terminal, mode)?;
        let state = account.read();
        if !state.verify_secret(secret) {
            drop(state);
            return Err(self.report(terminal, mode, BankError::AuthenticationFailed { id }));
        }
        let balance = state.balance();
        drop(state);
        {
            let _account_log = account.log_lock().write();
            self.emit(BankEvent::BalanceChecked {
                terminal,
                account: id,
                balance,
            });
        }
        Ok(balance)
    }

    /// Atomic transfer. Both sides are locked for the whole move, in
    /// ascending id order; a transfer to self takes the single lock
    /// once and is a validated no-op.
    pub fn transfer(
        &self,
        source: AccountId,
        secret: &str,
        target: AccountId,
        amount: i64,
        terminal: TerminalId,
        mode: LogMode,
    ) -> Result<(), BankError> {
        let map = self.accounts.read();
        let src = match map.get(&source) {
            Some(account) => Arc::clone(account),
            None => {
                drop(map);
                return Err(self.report(terminal, mode, BankError::AccountNotFound { id: source }));
            }
        };
        let dst = match map.get(&target) {
            Some(account) => Arc::clone(account),
            None => {
                drop(map);
                return Err(self.report(terminal, mode, BankError::AccountNotFound { id: target }));
            }
        };

        if source == target {
            let state = src.write();
            drop(map);
            if !state.verify_secret(secret) {
                drop(state);
                return Err(self.report(
                    terminal,
                    mode,
                    BankError::AuthenticationFailed { id: source },
                ));
            }
            if state.balance() < amount {
                drop(state);
                return Err(self.report(
                    terminal,
                    mode,
                    BankError::InsufficientFunds { id: source, amount },
                ));
            }
            let balance = state.balance();
            drop(state);
            self.emit(BankEvent::Transferred {
                terminal,
                source,
                target,
                amount,
                source_balance: balance,
                target_balance: balance,
            });
            return Ok(());
        }

        let (mut src_state, mut dst_state) = if source < target {
            let s = src.write();
            let d = dst.write();
            (s, d)
        } else {
            let d = dst.write();
            let s = src.write();
            (s, d)
        };
        drop(map);

        if !src_state.verify_secret(secret) {
            drop(src_state);
            drop(dst_state);
            return Err(self.report(
                terminal,
                mode,
                BankError::AuthenticationFailed { id: source },
            ));
        }
        if src_state.balance() < amount {
            drop(src_state);
            drop(dst_state);
            return Err(self.report(
                terminal,
                mode,
                BankError::InsufficientFunds { id: source, amount },
            ));
        }
        src_state.withdraw(amount);
        dst_state.deposit(amount);
        let source_balance = src_state.balance();
        let target_balance = dst_state.balance();
        drop(src_state);
        drop(dst_state);
        self.emit(BankEvent::Transferred {
            terminal,
            source,
            target,
            amount,
            source_balance,
            target_balance,
        });
        Ok(())
    }

    /// Read-side lookup that pins the account via its `Arc` before the
    /// map lock is released.
    fn lookup(
        &self,
        id: AccountId,
        terminal: TerminalId,
        mode: LogMode,
    ) -> Result<Arc<Account>, BankError> {
        let map = self.accounts.read();
        match map.get(&id) {
            Some(account) => Ok(Arc::clone(account)),
            None => {
                drop(map);
                Err(self.report(terminal, mode, BankError::AccountNotFound { id }))
            }
        }
    }

    // ------------------------------------------------------------------
    // Deferred requests
    // ------------------------------------------------------------------

    /// Queue a rollback to the snapshot taken `steps_back` ticks ago.
    /// Validated now against the saturating snapshot count; applied on
    /// the next maintenance tick.
    pub fn request_restore(
        &self,
        steps_back: usize,
        terminal: TerminalId,
        mode: LogMode,
    ) -> Result<(), BankError> {
        let mut queue = self.restore_requests.write();
        let valid = self.history.read().is_valid_distance(steps_back);
        if !valid {
            drop(queue);
            return Err(self.report(terminal, mode, BankError::InvalidRestorePoint { steps_back }));
        }
        queue.push_back(RestoreRequest {
            steps_back,
            requester: terminal,
        });
        Ok(())
    }

    /// Queue a terminal closure. Closing an already-closed terminal is
    /// idempotent: the condition is reported but the call succeeds.
    pub fn request_terminal_closure(
        &self,
        target: TerminalId,
        terminal: TerminalId,
        mode: LogMode,
    ) -> Result<(), BankError> {
        let mut queue = self.closure_requests.write();
        let registry = self.registry.read();
        match registry.get(target) {
            None => {
                drop(registry);
                drop(queue);
                Err(self.report(terminal, mode, BankError::TerminalNotFound { terminal: target }))
            }
            Some(slot) if !slot.open => {
                drop(registry);
                drop(queue);
                let _ = self.report(
                    terminal,
                    mode,
                    BankError::TerminalAlreadyClosed { terminal: target },
                );
                Ok(())
            }
            Some(_) => {
                drop(registry);
                queue.push_back(ClosureRequest { target, requester: terminal });
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // Terminal registry
    // ------------------------------------------------------------------

    /// Reserve the next terminal slot. The returned seed is what
    /// `Terminal::spawn` consumes.
    pub fn register_terminal(&self) -> TerminalSeed {
        let mut registry = self.registry.write();
        let id = registry.len();
        let stop = ShutdownToken::new();
        let gate = Arc::new(ReadWriteLock::new(()));
        registry.push(TerminalSlot {
            open: true,
            stop: stop.clone(),
            gate: Arc::clone(&gate),
            handle: None,
        });
        TerminalSeed { id, stop, gate }
    }

    /// Record the spawned thread's handle so the closure protocol (or
    /// [`Bank::await_terminals`]) can join it.
    pub fn attach_terminal(&self, id: TerminalId, handle: JoinHandle<()>) {
        let mut registry = self.registry.write();
        match registry.get_mut(id) {
            Some(slot) => slot.handle = Some(handle),
            None => log::error!("attach_terminal: no slot for terminal {id}"),
        }
    }

    pub fn terminal_is_open(&self, id: TerminalId) -> bool {
        self.registry.read().get(id).map(|slot| slot.open).unwrap_or(false)
    }

    /// Join every terminal thread that has not already been joined by
    /// the closure protocol.
    pub fn await_terminals(&self) {
        let handles: Vec<_> = {
            let mut registry = self.registry.write();
            registry.iter_mut().filter_map(|slot| slot.handle.take()).collect()
        };
        for handle in handles {
            if handle.join().is_err() {
                log::error!("terminal thread panicked");
            }
        }
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Deep copy of every customer account right now.
    pub fn current_snapshot(&self) -> LedgerSnapshot {
        let map = self.accounts.read();
        let accounts = map
            .values()
            .map(|account| (account.id(), AccountSnapshot::from(account.as_ref())))
            .collect();
        LedgerSnapshot { accounts }
    }

    pub fn house_balance(&self) -> i64 {
        self.house.read().balance()
    }

    /// Snapshots recorded so far (saturates at history capacity).
    pub fn snapshots_taken(&self) -> usize {
        self.history.read().taken()
    }

    // ------------------------------------------------------------------
    // Event emission
    // ------------------------------------------------------------------

    fn emit(&self, event: BankEvent) {
        let _guard = self.emission_lock.write();
        self.sink.emit(event);
    }

    /// Report a failure through the event stream unless suppressed,
    /// handing the error back for propagation.
    fn report(&self, terminal: TerminalId, mode: LogMode, error: BankError) -> BankError {
        if mode == LogMode::Logged {
            self.emit(BankEvent::OperationFailed {
                terminal,
                error: error.clone(),
            });
        }
        error
    }
}

fn spawn_daemon(name: &str, body: impl FnOnce() + Send + 'static) -> JoinHandle<()> {
    thread::Builder::new()
        .name(name.to_string())
        .spawn(body)
        .unwrap_or_else(|err| panic!("failed to spawn {name}: {err}"))
}
