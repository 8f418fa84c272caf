//! Domain models for the bank simulator.

pub mod account;
pub mod command;
pub mod event;

// Re-exports
pub use account::{Account, AccountState};
pub use command::{parse_line, Command, CommandRecord};
pub use event::{BankEvent, EventSink, MemorySink};

/// Caller-chosen account identifier (unique while present in the ledger).
pub type AccountId = u32;

/// Index of a terminal in the bank's registry.
pub type TerminalId = usize;
