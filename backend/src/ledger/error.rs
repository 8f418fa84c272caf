//! Typed outcomes for ledger operations.

use crate::models::{AccountId, TerminalId};
use thiserror::Error;

/// Every way a bank operation can fail.
///
/// These are returned as values, never thrown across a component
/// boundary; per-command failures are recoverable and reported, they
/// never crash the process. `TerminalAlreadyClosed` exists for event
/// reporting only: a closure request for an already-closed terminal is
/// treated as success at the call site (closure is idempotent).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BankError {
    #[error("account id {id} does not exist")]
    AccountNotFound { id: AccountId },

    #[error("password for account id {id} is incorrect")]
    AuthenticationFailed { id: AccountId },

    #[error("account id {id} balance is lower than {amount}")]
    InsufficientFunds { id: AccountId, amount: i64 },

    #[error("account with the same id ({id}) exists")]
    DuplicateAccount { id: AccountId },

    #[error("terminal id {terminal} does not exist")]
    TerminalNotFound { terminal: TerminalId },

    #[error("terminal id {terminal} is already in a closed state")]
    TerminalAlreadyClosed { terminal: TerminalId },

    #[error("rollback of {steps_back} iterations is not available")]
    InvalidRestorePoint { steps_back: usize },

    #[error("unknown command: {line}")]
    UnknownCommand { line: String },
}
