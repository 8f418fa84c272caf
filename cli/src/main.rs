mod args;
mod config;
mod sink;

use bank_simulator_core_rs::{parse_line, Bank, BankConfig, CommandRecord, EventSink, Terminal};
use sink::FileSink;
use std::fs;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

const LOG_FILE: &str = "log.txt";

fn main() -> ExitCode {
    if let Err(err) = config::configure_app() {
        eprintln!("failed to initialize logging: {err}");
        return ExitCode::FAILURE;
    }

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let cli = match args::parse(&argv) {
        Ok(cli) => cli,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::FAILURE;
        }
    };

    // Read and parse every script before any thread starts, so a bad
    // invocation cannot leave a half-started simulation behind.
    let mut scripts: Vec<Vec<CommandRecord>> = Vec::with_capacity(cli.scripts.len());
    for path in &cli.scripts {
        match load_script(path) {
            Ok(commands) => scripts.push(commands),
            Err(err) => {
                eprintln!("cannot read script file {}: {err}", path.display());
                return ExitCode::FAILURE;
            }
        }
    }

    let file_sink = match FileSink::create(Path::new(LOG_FILE)) {
        Ok(file_sink) => file_sink,
        Err(err) => {
            eprintln!("cannot open {LOG_FILE}: {err}");
            return ExitCode::FAILURE;
        }
    };

    let bank_config = BankConfig {
        vip_workers: cli.vip_workers,
        ..BankConfig::default()
    };
    let bank = Bank::start(bank_config, Arc::new(file_sink) as Arc<dyn EventSink>);

    for commands in scripts {
        let seed = bank.register_terminal();
        Terminal::spawn(Arc::clone(&bank), seed, commands);
    }

    // Wait for every script to finish (or its terminal to be closed),
    // then stop the daemons and drain the VIP lane.
    bank.await_terminals();
    bank.shutdown();

    ExitCode::SUCCESS
}

/// Parse one script file. Malformed lines are skipped with a warning;
/// they never abort the run.
fn load_script(path: &Path) -> std::io::Result<Vec<CommandRecord>> {
    let text = fs::read_to_string(path)?;
    let mut commands = Vec::new();
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(line) {
            Ok(record) => commands.push(record),
            Err(err) => log::warn!("{}:{}: skipping line: {err}", path.display(), index + 1),
        }
    }
    Ok(commands)
}
