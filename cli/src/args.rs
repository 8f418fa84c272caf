//! Command-line argument validation.
//!
//! Usage: `bank-simulator <vip-workers> <script>...`
//!
//! Everything is validated up front, before any thread is spawned: the
//! worker count must be a positive integer and every script file must
//! be readable. Any problem aborts the run with a usage message.

use std::path::PathBuf;

pub struct CliArgs {
    pub vip_workers: usize,
    pub scripts: Vec<PathBuf>,
}

pub fn parse(args: &[String]) -> Result<CliArgs, String> {
    let (workers, scripts) = match args {
        [workers, scripts @ ..] if !scripts.is_empty() => (workers, scripts),
        _ => return Err("usage: bank-simulator <vip-workers> <script>...".to_string()),
    };

    let vip_workers: usize = workers
        .parse()
        .map_err(|_| format!("invalid VIP worker count: {workers:?}"))?;
    if vip_workers == 0 {
        return Err("VIP worker count must be at least 1".to_string());
    }

    let scripts: Vec<PathBuf> = scripts.iter().map(PathBuf::from).collect();
    for script in &scripts {
        if !script.is_file() {
            return Err(format!("cannot read script file {}", script.display()));
        }
    }

    Ok(CliArgs {
        vip_workers,
        scripts,
    })
}
