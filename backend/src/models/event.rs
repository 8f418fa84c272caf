//! Structured log events emitted by the bank core.
//!
//! Every ledger operation emits exactly one event per attempt (failures
//! are swallowed during the suppressed first attempt of a persistent
//! command). The core only produces the events; formatting and writing
//! them to a human-readable sink is a collaborator concern, wired in
//! through [`EventSink`].

use crate::ledger::BankError;
use crate::models::{AccountId, TerminalId};
use parking_lot::Mutex;

/// A state change or inquiry outcome, tagged with the acting terminal.
#[derive(Debug, Clone, PartialEq)]
pub enum BankEvent {
    /// New account created.
    AccountOpened {
        terminal: TerminalId,
        account: AccountId,
        secret: String,
        balance: i64,
    },

    /// Account removed from the ledger.
    AccountClosed {
        terminal: TerminalId,
        account: AccountId,
        final_balance: i64,
    },

    Deposited {
        terminal: TerminalId,
        account: AccountId,
        amount: i64,
        new_balance: i64,
    },

    Withdrawn {
        terminal: TerminalId,
        account: AccountId,
        amount: i64,
        new_balance: i64,
    },

    /// Balance inquiry result.
    BalanceChecked {
        terminal: TerminalId,
        account: AccountId,
        balance: i64,
    },

    Transferred {
        terminal: TerminalId,
        source: AccountId,
        target: AccountId,
        amount: i64,
        source_balance: i64,
        target_balance: i64,
    },

    /// Commission sweep debited one account and credited the house.
    CommissionCharged {
        account: AccountId,
        percent: i64,
        amount: i64,
    },

    /// A queued closure request was applied and the terminal's thread
    /// has exited.
    TerminalClosed { terminal: TerminalId },

    /// A queued restore request was applied.
    RestoreCompleted {
        terminal: TerminalId,
        steps_back: usize,
    },

    /// An operation attempt failed; `terminal` is the requester.
    OperationFailed {
        terminal: TerminalId,
        error: BankError,
    },
}

/// Destination for the structured event stream.
///
/// Implementations must be safe to call from any thread; the bank
/// serializes calls through its emission lock.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: BankEvent);
}

/// In-memory sink collecting events for inspection. Used by tests and
/// as the default when no collaborator sink is supplied.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<BankEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far, in order.
    pub fn events(&self) -> Vec<BankEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: BankEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_preserves_order() {
        let sink = MemorySink::new();
        sink.emit(BankEvent::TerminalClosed { terminal: 0 });
        sink.emit(BankEvent::TerminalClosed { terminal: 1 });
        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], BankEvent::TerminalClosed { terminal: 0 });
        assert_eq!(events[1], BankEvent::TerminalClosed { terminal: 1 });
    }
}
