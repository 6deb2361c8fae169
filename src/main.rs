mod config;
mod detect;
mod process;
mod relay;
mod retry;
mod supervisor;

use std::path::PathBuf;
use std::time::Duration;

use clap::error::ErrorKind;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::config::{Target, WatcherConfig};
use crate::relay::OutputMode;
use crate::supervisor::Supervisor;

/// A Rust CLI tool that runs a binary, forwards its output, and restarts
/// it whenever the executable file changes on disk.
#[derive(Parser, Debug)]
#[command(name = "rekindle", version, about)]
pub struct Cli {
    /// Path to the binary to run and watch
    #[arg(value_name = "BINARY")]
    binary: PathBuf,

    /// Arguments passed through to the binary on every launch
    #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,

    /// Poll interval in milliseconds (default: 500)
    #[arg(long, value_name = "MS")]
    interval: Option<u64>,

    /// Delay between kill and relaunch in milliseconds (default: 500)
    #[arg(long, value_name = "MS")]
    grace: Option<u64>,

    /// Max retries when the new executable is still busy (default: 3)
    #[arg(long, value_name = "N")]
    retries: Option<u32>,

    /// Discard the child's output instead of forwarding it
    #[arg(long)]
    discard: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::try_parse().unwrap_or_else(|err| {
        // Usage errors exit 1; --help and --version are not errors.
        let _ = err.print();
        let code = match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
            _ => 1,
        };
        std::process::exit(code);
    });

    // Diagnostics go to stderr so the child's forwarded stdout stays clean.
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if !cli.binary.exists() {
        eprintln!("Path {} does not exist", cli.binary.display());
        std::process::exit(1);
    }

    let mut config = WatcherConfig::default();
    if let Some(ms) = cli.interval {
        if ms == 0 {
            eprintln!("--interval must be at least 1 millisecond");
            std::process::exit(1);
        }
        config.poll_interval = Duration::from_millis(ms);
    }
    if let Some(ms) = cli.grace {
        config.grace_period = Duration::from_millis(ms);
    }
    if let Some(n) = cli.retries {
        config.retry.max_attempts = n;
    }
    let output = if cli.discard {
        OutputMode::Discard
    } else {
        OutputMode::Forward
    };

    let target = Target::new(cli.binary, cli.args);
    let supervisor = Supervisor::new(target, config, output);
    if let Err(err) = supervisor.run().await {
        tracing::error!(error = %err, "supervision failed");
        std::process::exit(1);
    }
}
