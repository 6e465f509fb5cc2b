// `quire example`: write the bundled showcase document.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use quire_daemon::config::GlobalConfig;

use super::open::{self, OpenArgs};
use super::CliError;

const TEMPLATE: &str = include_str!("../../templates/example.md");
const DEFAULT_FILE_NAME: &str = "example.md";

#[derive(Debug, Args)]
pub struct ExampleArgs {
    /// Output file, or a directory to place `example.md` in.
    #[arg(value_name = "OUTPUT", default_value = DEFAULT_FILE_NAME)]
    output: PathBuf,

    /// Open the generated file in the editor afterwards.
    #[arg(long)]
    open: bool,

    /// Overwrite an existing file.
    #[arg(long, short)]
    force: bool,
}

pub fn run(args: ExampleArgs, config: GlobalConfig) -> anyhow::Result<()> {
    let target = resolve_output_path(&args.output);
    write_example(&target, args.force)?;

    println!("Created example file: {}", target.display());
    if args.open {
        return open::run(OpenArgs::for_path(target), config);
    }
    println!("Next step:\n  quire open {}", target.display());
    Ok(())
}

fn resolve_output_path(output: &Path) -> PathBuf {
    if output.is_dir() {
        output.join(DEFAULT_FILE_NAME)
    } else {
        output.to_path_buf()
    }
}

fn write_example(target: &Path, force: bool) -> anyhow::Result<()> {
    if target.exists() && !force {
        return Err(CliError::AlreadyExists(target.to_path_buf()).into());
    }
    if let Some(parent) = target.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(target, TEMPLATE)
        .with_context(|| format!("failed to write example file {}", target.display()))
}
