use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Student records sidecar. Reads one JSON request per line on stdin and
/// writes one JSON response per line on stdout. Logs go to stderr.
#[derive(Debug, Parser)]
#[command(name = "studentd", version)]
pub struct Cli {
    /// Workspace directory to open at startup (same as `workspace.select`).
    #[arg(long, env = "STUDENTD_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Default log filter when RUST_LOG is unset.
    #[arg(long, env = "STUDENTD_LOG", default_value = "info")]
    pub log_level: String,

    /// Emit stderr logs as JSON lines.
    #[arg(long)]
    pub log_json: bool,
}

pub fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout carries the protocol, so every layer writes to stderr.
    let layer = if cli.log_json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_ansi(false)
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed()
    };

    let _ = tracing_subscriber::registry().with(layer).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags() {
        let cli = Cli::try_parse_from([
            "studentd",
            "--workspace",
            "/tmp/ws",
            "--log-level",
            "debug",
            "--log-json",
        ])
        .expect("parse");
        assert_eq!(cli.workspace, Some(PathBuf::from("/tmp/ws")));
        assert_eq!(cli.log_level, "debug");
        assert!(cli.log_json);
    }

    #[test]
    fn log_level_defaults_to_info() {
        std::env::remove_var("STUDENTD_LOG");
        std::env::remove_var("STUDENTD_WORKSPACE");
        let cli = Cli::try_parse_from(["studentd"]).expect("parse");
        assert_eq!(cli.log_level, "info");
        assert!(cli.workspace.is_none());
        assert!(!cli.log_json);
    }
}
