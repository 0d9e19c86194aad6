mod calc;
mod config;
mod db;
mod ipc;
mod store;

use clap::Parser;
use std::io::{self, BufRead, Write};

fn main() -> anyhow::Result<()> {
    let cli = config::Cli::parse();
    config::init_tracing(&cli);

    let mut state = ipc::AppState::default();
    if let Some(path) = cli.workspace.clone() {
        ipc::select_workspace(&mut state, path)?;
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "studentd ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "stdin read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                tracing::warn!(error = %e, "unparseable request line");
                writeln!(stdout, "{}", ipc::bad_json(e.to_string()))?;
                stdout.flush()?;
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        writeln!(stdout, "{}", resp)?;
        stdout.flush()?;
    }

    tracing::info!("stdin closed, shutting down");
    Ok(())
}
