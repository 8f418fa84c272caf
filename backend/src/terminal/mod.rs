//! Terminal (ATM) threads.
//!
//! Each terminal owns a scripted command list and replays it on its own
//! thread, pacing between commands. Before every command it checks its
//! stop signal and, if still open, executes the command while holding
//! the read side of its closure gate. The maintenance daemon closes a
//! terminal by cancelling the stop signal and then taking the gate's
//! write side, which cannot succeed while a command is mid-flight; the
//! gate therefore makes closure wait for at most one in-flight command.
//!
//! A `VIP=<p>` command is handed to the bank's priority pool instead of
//! running inline; the terminal does not wait for its completion. A
//! `PERSISTENT` command runs twice on failure: a suppressed attempt,
//! a pacing-sized delay, then a logged attempt, so transient failures
//! (e.g. a target account created in between) leave a single log line.

use crate::ledger::{Bank, LogMode, TerminalSeed};
use crate::models::{Command, CommandRecord, TerminalId};
use crate::sync::{ReadWriteLock, ShutdownToken};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Handle to a spawned terminal thread.
pub struct Terminal {
    id: TerminalId,
}

impl Terminal {
    /// Spawn the terminal's thread and attach its handle to the bank's
    /// registry. The seed must come from `Bank::register_terminal` on
    /// the same bank.
    pub fn spawn(bank: Arc<Bank>, seed: TerminalSeed, commands: Vec<CommandRecord>) -> Self {
        let TerminalSeed { id, stop, gate } = seed;
        let thread_bank = Arc::clone(&bank);
        let handle = thread::Builder::new()
            .name(format!("terminal-{id}"))
            .spawn(move || run(thread_bank, id, stop, gate, commands))
            .unwrap_or_else(|err| panic!("failed to spawn terminal {id}: {err}"));
        bank.attach_terminal(id, handle);
        Terminal { id }
    }

    pub fn id(&self) -> TerminalId {
        self.id
    }
}

fn run(
    bank: Arc<Bank>,
    id: TerminalId,
    stop: ShutdownToken,
    gate: Arc<ReadWriteLock<()>>,
    commands: Vec<CommandRecord>,
) {
    let pacing = bank.config().command_pacing;
    for record in commands {
        if stop.is_cancelled() {
            break;
        }
        {
            // Holding the gate keeps closure from completing while this
            // command is in flight.
            let _in_flight = gate.read();
            if stop.is_cancelled() {
                break;
            }
            dispatch(&bank, id, &stop, record);
        }
        if stop.wait_timeout(pacing) {
            break;
        }
    }
}

/// Route one command: VIP commands go to the priority pool (fire and
/// forget), everything else runs inline on the terminal's thread.
fn dispatch(bank: &Arc<Bank>, terminal: TerminalId, stop: &ShutdownToken, record: CommandRecord) {
    match record.vip {
        Some(priority) => {
            let retry_delay = bank.config().command_pacing;
            let job_bank = Arc::clone(bank);
            let stop = stop.clone();
            bank.submit_vip(
                priority,
                Box::new(move || {
                    run_command_with_retry(&job_bank, terminal, &stop, record, retry_delay);
                }),
            );
        }
        None => {
            let retry_delay = bank.config().command_pacing;
            run_command_with_retry(bank, terminal, stop, record, retry_delay);
        }
    }
}

/// Execute one command, honoring its `persistent` flag: a failed first
/// attempt is suppressed, then retried once after `retry_delay` with
/// normal reporting. The delay parks on the stop token so closure is
/// not held up by a pending retry.
pub fn run_command_with_retry(
    bank: &Arc<Bank>,
    terminal: TerminalId,
    stop: &ShutdownToken,
    record: CommandRecord,
    retry_delay: Duration,
) {
    if record.persistent {
        if execute(bank, terminal, &record.command, LogMode::Suppressed).is_ok() {
            return;
        }
        if stop.wait_timeout(retry_delay) {
            return;
        }
    }
    let _ = execute(bank, terminal, &record.command, LogMode::Logged);
}

fn execute(
    bank: &Arc<Bank>,
    terminal: TerminalId,
    command: &Command,
    mode: LogMode,
) -> Result<(), crate::ledger::BankError> {
    match command {
        Command::Open {
            account,
            secret,
            balance,
        } => bank.create_account(*account, secret, *balance, terminal, mode),
        Command::Close { account, secret } => {
            bank.delete_account(*account, secret, terminal, mode)
        }
        Command::Deposit {
            account,
            secret,
            amount,
        } => bank.deposit(*account, secret, *amount, terminal, mode),
        Command::Withdraw {
            account,
            secret,
            amount,
        } => bank.withdraw(*account, secret, *amount, terminal, mode),
        Command::Balance { account, secret } => {
            bank.get_balance(*account, secret, terminal, mode).map(|_| ())
        }
        Command::Transfer {
            source,
            secret,
            target,
            amount,
        } => bank.transfer(*source, secret, *target, *amount, terminal, mode),
        Command::RequestRestore { steps_back } => {
            bank.request_restore(*steps_back, terminal, mode)
        }
        Command::RequestClosure { terminal: target } => {
            bank.request_terminal_closure(*target, terminal, mode)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BankConfig;
    use crate::models::{BankEvent, EventSink, MemorySink};

    fn quiet_bank() -> (Arc<Bank>, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let bank = Bank::start(BankConfig::manual(), Arc::clone(&sink) as Arc<dyn EventSink>);
        (bank, sink)
    }

    #[test]
    fn test_persistent_failure_logs_exactly_once() {
        let (bank, sink) = quiet_bank();
        let stop = ShutdownToken::new();
        let record = CommandRecord {
            command: Command::Deposit {
                account: 404,
                secret: "pw".to_string(),
                amount: 5,
            },
            vip: None,
            persistent: true,
        };

        run_command_with_retry(&bank, 0, &stop, record, Duration::from_millis(1));

        let failures = sink
            .events()
            .iter()
            .filter(|event| matches!(event, BankEvent::OperationFailed { .. }))
            .count();
        assert_eq!(failures, 1, "suppressed first attempt, logged second");
        bank.shutdown();
    }

    #[test]
    fn test_persistent_success_between_attempts_logs_no_failure() {
        let (bank, sink) = quiet_bank();
        let stop = ShutdownToken::new();
        let record = CommandRecord {
            command: Command::Deposit {
                account: 1,
                secret: "pw".to_string(),
                amount: 5,
            },
            vip: None,
            persistent: true,
        };

        // The account exists by the time the retry runs, so the only
        // visible outcome is the successful deposit.
        let retry_delay = Duration::from_millis(200);
        let worker = {
            let bank = Arc::clone(&bank);
            let stop = stop.clone();
            thread::spawn(move || run_command_with_retry(&bank, 0, &stop, record, retry_delay))
        };
        thread::sleep(Duration::from_millis(50));
        bank.create_account(1, "pw", 0, 1, LogMode::Logged).unwrap();
        worker.join().unwrap();

        let events = sink.events();
        assert!(
            !events
                .iter()
                .any(|event| matches!(event, BankEvent::OperationFailed { .. })),
            "no failure should be reported"
        );
        assert!(events.iter().any(|event| matches!(
            event,
            BankEvent::Deposited { account: 1, amount: 5, .. }
        )));
        bank.shutdown();
    }

    #[test]
    fn test_cancelled_stop_skips_the_retry() {
        let (bank, sink) = quiet_bank();
        let stop = ShutdownToken::new();
        stop.cancel();
        let record = CommandRecord {
            command: Command::Withdraw {
                account: 404,
                secret: "pw".to_string(),
                amount: 5,
            },
            vip: None,
            persistent: true,
        };

        run_command_with_retry(&bank, 0, &stop, record, Duration::from_secs(3600));

        assert!(
            sink.is_empty(),
            "first attempt suppressed, retry abandoned on cancel"
        );
        bank.shutdown();
    }

    #[test]
    fn test_terminal_replays_script_and_exits() {
        let (bank, sink) = quiet_bank();
        let script = vec![
            CommandRecord::plain(Command::Open {
                account: 1,
                secret: "pw".to_string(),
                balance: 100,
            }),
            CommandRecord::plain(Command::Deposit {
                account: 1,
                secret: "pw".to_string(),
                amount: 25,
            }),
            CommandRecord::plain(Command::Balance {
                account: 1,
                secret: "pw".to_string(),
            }),
        ];
        let seed = bank.register_terminal();
        let _terminal = Terminal::spawn(Arc::clone(&bank), seed, script);
        bank.await_terminals();

        let events = sink.events();
        assert!(events.iter().any(|event| matches!(
            event,
            BankEvent::BalanceChecked { account: 1, balance: 125, .. }
        )));
        bank.shutdown();
    }
}
