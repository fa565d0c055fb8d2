use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use modforge::{Config, ModRunner};

/// Apply ordered Lua mods to a layered game-asset tree.
#[derive(Parser)]
#[command(name = "modforge", version)]
struct Cli {
    /// Configuration file.
    #[arg(long, default_value = "modforge.toml")]
    config: PathBuf,

    /// Log intended writes instead of performing them.
    #[arg(long)]
    dry_run: bool,

    /// Override the configured log level.
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", cli.config.display());
            eprintln!("Using default configuration.");
            Config::default()
        }
    };

    let level = cli
        .log_level
        .as_deref()
        .unwrap_or(&config.logging.level)
        .to_string();
    modforge::logging::init(&level);

    let runner = ModRunner::new(config, cli.dry_run);
    match runner.run() {
        Ok(report) if !report.failed() => {
            info!(
                "done: {} succeeded, {} skipped of {} mods",
                report.succeeded, report.skipped, report.total
            );
            ExitCode::SUCCESS
        }
        Ok(report) => {
            error!(
                "run failed: {} of {} mods unaccounted for",
                report.total - report.succeeded - report.skipped,
                report.total
            );
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("run aborted: {e}");
            ExitCode::FAILURE
        }
    }
}
