//! Parsed terminal commands and the script-line parser.
//!
//! Grammar (whitespace-delimited tokens, case-sensitive op codes):
//!
//! ```text
//! O id secret balance        open account
//! Q id secret                close account
//! D id secret amount         deposit
//! W id secret amount         withdraw
//! B id secret                balance inquiry (non-VIP only)
//! T src secret dest amount   transfer
//! R stepsBack                request restore
//! C targetTerminalId         request terminal closure
//! ```
//!
//! A line may additionally carry a `VIP=<priority>` token (routes the
//! command to the priority scheduler) and a `PERSISTENT` token (enables
//! the two-attempt retry). Both are orthogonal modifiers, not op codes,
//! and may appear anywhere on the line.

use crate::ledger::BankError;
use crate::models::{AccountId, TerminalId};
use serde::{Deserialize, Serialize};

/// One banking operation, fully parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    Open {
        account: AccountId,
        secret: String,
        balance: i64,
    },
    Close {
        account: AccountId,
        secret: String,
    },
    Deposit {
        account: AccountId,
        secret: String,
        amount: i64,
    },
    Withdraw {
        account: AccountId,
        secret: String,
        amount: i64,
    },
    Balance {
        account: AccountId,
        secret: String,
    },
    Transfer {
        source: AccountId,
        secret: String,
        target: AccountId,
        amount: i64,
    },
    RequestRestore {
        steps_back: usize,
    },
    RequestClosure {
        terminal: TerminalId,
    },
}

/// A command plus its execution modifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub command: Command,
    /// `Some(priority)` routes the command through the VIP lane.
    pub vip: Option<i32>,
    /// Enables the suppressed-then-logged two-attempt retry.
    pub persistent: bool,
}

impl CommandRecord {
    pub fn plain(command: Command) -> Self {
        Self {
            command,
            vip: None,
            persistent: false,
        }
    }
}

fn unknown(line: &str) -> BankError {
    BankError::UnknownCommand {
        line: line.to_string(),
    }
}

fn parse_token<T: std::str::FromStr>(token: &str, line: &str) -> Result<T, BankError> {
    token.parse().map_err(|_| unknown(line))
}

/// Parse one script line into a [`CommandRecord`].
///
/// Malformed lines (bad op code, wrong arity, non-numeric fields, or a
/// `VIP=` tag on a balance inquiry) yield `UnknownCommand`.
pub fn parse_line(line: &str) -> Result<CommandRecord, BankError> {
    let mut vip = None;
    let mut persistent = false;
    let mut args: Vec<&str> = Vec::new();

    for token in line.split_whitespace() {
        if let Some(priority) = token.strip_prefix("VIP=") {
            vip = Some(parse_token::<i32>(priority, line)?);
        } else if token == "PERSISTENT" {
            persistent = true;
        } else {
            args.push(token);
        }
    }

    let (&op, rest) = args.split_first().ok_or_else(|| unknown(line))?;

    let command = match (op, rest) {
        ("O", [account, secret, balance]) => Command::Open {
            account: parse_token(account, line)?,
            secret: (*secret).to_string(),
            balance: parse_token(balance, line)?,
        },
        ("Q", [account, secret]) => Command::Close {
            account: parse_token(account, line)?,
            secret: (*secret).to_string(),
        },
        ("D", [account, secret, amount]) => Command::Deposit {
            account: parse_token(account, line)?,
            secret: (*secret).to_string(),
            amount: parse_token(amount, line)?,
        },
        ("W", [account, secret, amount]) => Command::Withdraw {
            account: parse_token(account, line)?,
            secret: (*secret).to_string(),
            amount: parse_token(amount, line)?,
        },
        ("B", [account, secret]) => {
            // Balance inquiry never rides the VIP lane.
            if vip.is_some() {
                return Err(unknown(line));
            }
            Command::Balance {
                account: parse_token(account, line)?,
                secret: (*secret).to_string(),
            }
        }
        ("T", [source, secret, target, amount]) => Command::Transfer {
            source: parse_token(source, line)?,
            secret: (*secret).to_string(),
            target: parse_token(target, line)?,
            amount: parse_token(amount, line)?,
        },
        ("R", [steps_back]) => Command::RequestRestore {
            steps_back: parse_token(steps_back, line)?,
        },
        ("C", [terminal]) => Command::RequestClosure {
            terminal: parse_token(terminal, line)?,
        },
        _ => return Err(unknown(line)),
    };

    Ok(CommandRecord {
        command,
        vip,
        persistent,
    })
}
