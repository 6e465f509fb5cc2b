// CLI subcommand dispatch.

use std::path::PathBuf;

use clap::Subcommand;
use quire_daemon::config::GlobalConfig;
use thiserror::Error;

pub mod example;
pub mod open;

#[derive(Subcommand)]
pub enum Command {
    /// Open a markdown file or a folder of markdown files in the browser
    Open(open::OpenArgs),
    /// Write a showcase markdown file
    Example(example::ExampleArgs),
}

pub fn run(cmd: Command, config: GlobalConfig) -> anyhow::Result<()> {
    match cmd {
        Command::Open(args) => open::run(args, config),
        Command::Example(args) => example::run(args, config),
    }
}

/// Errors the CLI reports with a dedicated exit code.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("path does not exist: {}", .0.display())]
    NotFound(PathBuf),

    #[error("not a markdown file or a directory: {}", .0.display())]
    Unsupported(PathBuf),

    #[error("{} already exists (use --force to overwrite)", .0.display())]
    AlreadyExists(PathBuf),
}
