//! Transaction log sink: formats bank events as human-readable lines
//! and appends them to the log file.

use bank_simulator_core_rs::{BankEvent, EventSink};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

pub struct FileSink {
    out: Mutex<BufWriter<File>>,
}

impl FileSink {
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            out: Mutex::new(BufWriter::new(file)),
        })
    }
}

impl EventSink for FileSink {
    fn emit(&self, event: BankEvent) {
        let line = format_event(&event);
        let mut out = self.out.lock();
        if writeln!(out, "{line}").and_then(|_| out.flush()).is_err() {
            log::error!("failed to write transaction log line: {line}");
        }
    }
}

fn format_event(event: &BankEvent) -> String {
    match event {
        BankEvent::AccountOpened {
            terminal,
            account,
            secret,
            balance,
        } => format!(
            "{terminal}: New account id is {account} with password {secret} and initial balance {balance}"
        ),
        BankEvent::AccountClosed {
            terminal,
            account,
            final_balance,
        } => format!("{terminal}: Account {account} is now closed. Balance was {final_balance}"),
        BankEvent::Deposited {
            terminal,
            account,
            amount,
            new_balance,
        } => format!(
            "{terminal}: Account {account} new balance is {new_balance} after {amount} $ was deposited"
        ),
        BankEvent::Withdrawn {
            terminal,
            account,
            amount,
            new_balance,
        } => format!(
            "{terminal}: Account {account} new balance is {new_balance} after {amount} $ was withdrawn"
        ),
        BankEvent::BalanceChecked {
            terminal,
            account,
            balance,
        } => format!("{terminal}: Account {account} balance is {balance}"),
        BankEvent::Transferred {
            terminal,
            source,
            target,
            amount,
            source_balance,
            target_balance,
        } => format!(
            "{terminal}: Transfer {amount} from account {source} to account {target} new account balance is {source_balance} new target account balance is {target_balance}"
        ),
        BankEvent::CommissionCharged {
            account,
            percent,
            amount,
        } => format!(
            "Bank: commissions of {percent} % were charged, bank gained {amount} from account {account}"
        ),
        BankEvent::TerminalClosed { terminal } => {
            format!("Bank: terminal {terminal} successfully closed")
        }
        BankEvent::RestoreCompleted {
            terminal,
            steps_back,
        } => format!(
            "{terminal}: Rollback to {steps_back} bank iterations ago was completed successfully"
        ),
        BankEvent::OperationFailed { terminal, error } => {
            format!("Error {terminal}: Your transaction failed - {error}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bank_simulator_core_rs::BankError;

    #[test]
    fn test_failure_lines_carry_the_requesting_terminal() {
        let line = format_event(&BankEvent::OperationFailed {
            terminal: 3,
            error: BankError::AccountNotFound { id: 9 },
        });
        assert_eq!(
            line,
            "Error 3: Your transaction failed - account id 9 does not exist"
        );
    }

    #[test]
    fn test_transfer_line_mentions_both_balances() {
        let line = format_event(&BankEvent::Transferred {
            terminal: 0,
            source: 1,
            target: 2,
            amount: 30,
            source_balance: 70,
            target_balance: 130,
        });
        assert_eq!(
            line,
            "0: Transfer 30 from account 1 to account 2 new account balance is 70 new target account balance is 130"
        );
    }
}
