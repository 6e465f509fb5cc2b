// quire CLI entry point.

use clap::Parser;
use quire_daemon::config::GlobalConfig;
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_code;

use exit_code::ExitCode;

#[derive(Parser)]
#[command(name = "quire", version, about = "Edit markdown files in a local browser UI")]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,
}

fn main() {
    let cli = Cli::parse();
    let config = GlobalConfig::load();
    init_tracing(&config.log_filter);

    if let Err(error) = commands::run(cli.command, config) {
        eprintln!("error: {error:#}");
        std::process::exit(ExitCode::from_error(&error).code());
    }
}

/// `RUST_LOG` wins; otherwise the configured filter, falling back to `info`.
fn init_tracing(configured: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}
