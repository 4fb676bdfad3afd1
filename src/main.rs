mod attendance;
mod config;
mod dashboard;
mod db;
mod error;
mod grades;
mod ipc;
mod logging;
mod model;
mod repo;
mod roster;
mod store;

use anyhow::Context;
use clap::Parser;
use std::io::{self, BufRead, Write};

fn main() -> anyhow::Result<()> {
    let args = config::CliArgs::parse();
    logging::init_logging(&args.logging())?;

    let mut state = ipc::AppState::default();
    if let Some(ws) = args.workspace.as_deref() {
        ipc::select_workspace(&mut state, ws)
            .with_context(|| format!("failed to open workspace {}", ws.display()))?;
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "stdin closed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => ipc::handle_request(&mut state, req),
            Err(e) => {
                tracing::warn!(error = %e, "malformed request line");
                serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                })
            }
        };
        writeln!(stdout, "{}", resp).context("write response")?;
        stdout.flush().context("flush response")?;
    }

    tracing::info!("stdin closed, exiting");
    Ok(())
}
