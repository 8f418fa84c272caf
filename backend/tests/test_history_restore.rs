//! Snapshot history and rollback tests, driven through manual
//! maintenance ticks for determinism.

use bank_simulator_core_rs::{
    Bank, BankConfig, BankError, BankEvent, EventSink, LogMode, MemorySink,
};
use std::sync::Arc;

fn bank_with_history(capacity: usize) -> (Arc<Bank>, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let config = BankConfig {
        history_capacity: capacity,
        ..BankConfig::manual()
    };
    let bank = Bank::start(config, Arc::clone(&sink) as Arc<dyn EventSink>);
    (bank, sink)
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_rollback_rejected_before_any_snapshot_exists() {
    let (bank, sink) = bank_with_history(120);
    assert_eq!(
        bank.request_restore(1, 0, LogMode::Logged),
        Err(BankError::InvalidRestorePoint { steps_back: 1 })
    );
    assert!(sink.events().iter().any(|event| matches!(
        event,
        BankEvent::OperationFailed {
            error: BankError::InvalidRestorePoint { steps_back: 1 },
            ..
        }
    )));
    bank.shutdown();
}

#[test]
fn test_rollback_distance_bounded_by_snapshots_taken() {
    let (bank, _sink) = bank_with_history(120);
    bank.save_state();
    bank.save_state();

    assert!(bank.request_restore(2, 0, LogMode::Logged).is_ok());
    assert_eq!(
        bank.request_restore(3, 0, LogMode::Logged),
        Err(BankError::InvalidRestorePoint { steps_back: 3 })
    );
    assert_eq!(
        bank.request_restore(0, 0, LogMode::Logged),
        Err(BankError::InvalidRestorePoint { steps_back: 0 })
    );
    bank.shutdown();
}

// ============================================================================
// Ring-buffer wrap
// ============================================================================

#[test]
fn test_history_wraps_and_keeps_only_the_newest_snapshots() {
    let (bank, _sink) = bank_with_history(3);
    bank.create_account(1, "pw", 0, 0, LogMode::Logged).unwrap();

    // Five snapshots into a 3-deep ring: balances 1..=5 recorded,
    // only 3, 4, 5 survive.
    for round in 1..=5 {
        bank.deposit(1, "pw", 1, 0, LogMode::Logged).unwrap();
        bank.save_state();
        assert!(round <= 3 || bank.snapshots_taken() == 3);
    }

    bank.request_restore(3, 0, LogMode::Logged).unwrap();
    bank.process_restores();
    assert_eq!(bank.get_balance(1, "pw", 0, LogMode::Logged).unwrap(), 3);

    assert_eq!(
        bank.request_restore(4, 0, LogMode::Logged),
        Err(BankError::InvalidRestorePoint { steps_back: 4 })
    );
    bank.shutdown();
}

// ============================================================================
// Application through the maintenance tick
// ============================================================================

#[test]
fn test_restore_applies_on_the_next_maintenance_tick() {
    let (bank, sink) = bank_with_history(120);
    bank.create_account(1, "pw", 500, 0, LogMode::Logged).unwrap();
    bank.maintenance_tick(); // snapshot: balance 500
    bank.withdraw(1, "pw", 400, 0, LogMode::Logged).unwrap();

    // The request sits queued until a tick drains it. The tick records
    // the mutated state first, so distance 2 addresses the pre-withdraw
    // snapshot when the queue drains.
    bank.request_restore(1, 0, LogMode::Logged).unwrap();
    assert_eq!(bank.get_balance(1, "pw", 0, LogMode::Logged).unwrap(), 100);
    bank.maintenance_tick();

    // Distance 1 at application time is the snapshot this tick just
    // recorded (balance 100).
    assert_eq!(bank.get_balance(1, "pw", 0, LogMode::Logged).unwrap(), 100);
    assert!(sink.events().iter().any(|event| matches!(
        event,
        BankEvent::RestoreCompleted { steps_back: 1, .. }
    )));
    bank.shutdown();
}

#[test]
fn test_restore_rewinds_opens_closes_and_balances_together() {
    let (bank, _sink) = bank_with_history(120);
    bank.create_account(1, "a", 100, 0, LogMode::Logged).unwrap();
    bank.create_account(2, "b", 200, 0, LogMode::Logged).unwrap();
    bank.save_state();

    bank.delete_account(1, "a", 0, LogMode::Logged).unwrap();
    bank.create_account(3, "c", 300, 0, LogMode::Logged).unwrap();
    bank.deposit(2, "b", 1, 0, LogMode::Logged).unwrap();

    bank.request_restore(1, 0, LogMode::Logged).unwrap();
    bank.process_restores();

    let ledger = bank.current_snapshot();
    assert_eq!(ledger.balance_of(1), Some(100));
    assert_eq!(ledger.balance_of(2), Some(200));
    assert!(!ledger.contains(3));
    assert_eq!(ledger.len(), 2);
    bank.shutdown();
}

#[test]
fn test_queued_restores_apply_in_fifo_order() {
    let (bank, _sink) = bank_with_history(120);
    bank.create_account(1, "pw", 10, 0, LogMode::Logged).unwrap();
    bank.save_state(); // distance grows as more snapshots land
    bank.deposit(1, "pw", 10, 0, LogMode::Logged).unwrap();
    bank.save_state();

    // Two requests: first rewinds to balance 20, second to balance 10.
    // Applied in order, the second wins.
    bank.request_restore(1, 0, LogMode::Logged).unwrap();
    bank.request_restore(2, 0, LogMode::Logged).unwrap();
    bank.process_restores();

    assert_eq!(bank.get_balance(1, "pw", 0, LogMode::Logged).unwrap(), 10);
    bank.shutdown();
}
