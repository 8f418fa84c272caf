//! Bank Simulator Core - Rust Engine
//!
//! Concurrent bank ledger simulator with scripted ATM terminals.
//!
//! # Architecture
//!
//! - **sync**: Custom reader-writer lock and shutdown signaling
//! - **models**: Domain types (Account, Command, BankEvent)
//! - **ledger**: The bank core, its daemons, and the error taxonomy
//! - **history**: Snapshot ring buffer for rollback
//! - **scheduler**: VIP priority queue and worker pool
//! - **terminal**: ATM command-replay threads
//! - **rng**: Deterministic random number generation
//!
//! # Critical Invariants
//!
//! 1. All money values are i64 (currency units)
//! 2. All randomness is deterministic (seeded RNG)
//! 3. Per-command failures are reported, never fatal

// Module declarations
pub mod config;
pub mod history;
pub mod ledger;
pub mod models;
pub mod rng;
pub mod scheduler;
pub mod sync;
pub mod terminal;

// Re-exports for convenience
pub use config::BankConfig;
pub use history::{AccountSnapshot, History, LedgerSnapshot, HISTORY_CAPACITY};
pub use ledger::{Bank, BankError, LogMode, TerminalSeed, HOUSE_ACCOUNT_ID};
pub use models::{
    parse_line, Account, AccountId, BankEvent, Command, CommandRecord, EventSink, MemorySink,
    TerminalId,
};
pub use rng::RngManager;
pub use scheduler::{TaskQueue, Thunk, WorkerPool};
pub use sync::{ReadWriteLock, ShutdownToken};
pub use terminal::{run_command_with_retry, Terminal};
