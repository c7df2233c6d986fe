//! ledger-runner: headless driver for the ledger core.
//!
//! Usage:
//!   ledger-runner --db ledger.db --accrue 2026-01-15
//!   ledger-runner --db ledger.db --ipc-mode < requests.jsonl
//!
//! In IPC mode every stdin line is `{"identity": {...}, "request": {...}}`
//! and every stdout line is `{"ok": ...}` or `{"error": {...}}`.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use ledger_core::{
    clock::{LedgerClock, SystemClock},
    config::LedgerConfig,
    error::{ErrorKind, LedgerError},
    ledger::Ledger,
    model::Identity,
    request::LedgerRequest,
};
use std::env;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

#[derive(serde::Deserialize)]
struct IpcEnvelope {
    identity: Identity,
    request: LedgerRequest,
}

#[derive(serde::Serialize)]
struct IpcError {
    kind: ErrorKind,
    public_message: String,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let db = arg_value(&args, "--db").unwrap_or(":memory:");
    let data_dir = arg_value(&args, "--data-dir").unwrap_or("./data");
    let accrue = arg_value(&args, "--accrue")
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .with_context(|| format!("--accrue expects YYYY-MM-DD, got '{s}'"))
        })
        .transpose()?;

    let config = LedgerConfig::load(data_dir)?;

    if !ipc_mode {
        println!("ledger-runner");
        println!("  db:        {db}");
        println!("  data_dir:  {data_dir}");
        println!("  plans:     {}", config.plans.iter().count());
        println!();
    }

    let mut ledger = if db == ":memory:" {
        Ledger::in_memory(config, Arc::new(SystemClock))?
    } else {
        Ledger::open(db, config)?
    };

    if ipc_mode {
        run_ipc_loop(&mut ledger)?;
    } else {
        let as_of = accrue.unwrap_or_else(|| SystemClock.today());
        let reports = ledger.run_scheduled_jobs(as_of)?;
        for report in &reports {
            println!(
                "  {:<18} {as_of}  processed={:<6} applied={}",
                report.job, report.processed, report.applied
            );
        }
    }

    Ok(())
}

fn run_ipc_loop(ledger: &mut Ledger) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<IpcEnvelope>(&line) {
            Ok(envelope) => match ledger.handle(&envelope.identity, envelope.request) {
                Ok(value) => serde_json::json!({ "ok": value }),
                Err(err) => error_reply(&err),
            },
            Err(e) => serde_json::json!({
                "error": IpcError { kind: ErrorKind::Validation, public_message: e.to_string() }
            }),
        };

        writeln!(stdout, "{reply}")?;
        stdout.flush()?;
    }
    Ok(())
}

fn error_reply(err: &LedgerError) -> serde_json::Value {
    if matches!(err.kind(), ErrorKind::Storage | ErrorKind::Internal) {
        log::error!("request failed: {err}");
    }
    serde_json::json!({
        "error": IpcError { kind: err.kind(), public_message: err.public_message() }
    })
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}
