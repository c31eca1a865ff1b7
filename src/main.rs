use anyhow::Context;
use clap::{Parser, Subcommand};
use maid::cli::{MaidCommand, OutputOptions, run_cli_with_config};
use std::path::PathBuf;

/// Classify, rename and restructure loosely-named documents and scripts.
#[derive(Debug, Parser)]
#[command(name = "maid", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Configuration file (default: <dir>/.maidrc.toml, then ~/.config/maid/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print the run report as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Rename files to canonical names, optionally grouping them by category
    Clean {
        /// Directory to clean
        #[arg(short, long, default_value = ".")]
        path: PathBuf,
        /// Descend into subdirectories
        #[arg(short = 'R', long)]
        recursive: bool,
        /// Move files into per-category directories
        #[arg(short, long)]
        restructure: bool,
        /// Show what would happen without changing anything
        #[arg(short, long)]
        dry_run: bool,
        /// Print every operation
        #[arg(short, long)]
        verbose: bool,
    },
    /// Move unimportant files into a recoverable trash run
    Keep {
        /// Directory to sort through
        #[arg(short, long, default_value = ".")]
        path: PathBuf,
        /// Descend into subdirectories
        #[arg(short = 'R', long)]
        recursive: bool,
        /// Show what would happen without changing anything
        #[arg(short, long)]
        dry_run: bool,
        /// Print every operation and keep decision
        #[arg(short, long)]
        verbose: bool,
    },
    /// Move a trash run back into place
    Restore {
        /// Directory holding the trash
        #[arg(short, long, default_value = ".")]
        path: PathBuf,
        /// Run to restore (default: the latest)
        #[arg(long, value_name = "ID")]
        run: Option<String>,
        /// List trash runs instead of restoring
        #[arg(long, conflicts_with = "run")]
        list: bool,
        /// Show what would happen without changing anything
        #[arg(short, long)]
        dry_run: bool,
        /// Print every operation
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let (command, path, verbose) = match cli.command {
        Command::Clean {
            path,
            recursive,
            restructure,
            dry_run,
            verbose,
        } => (
            MaidCommand::Clean {
                recursive,
                restructure,
                dry_run,
            },
            path,
            verbose,
        ),
        Command::Keep {
            path,
            recursive,
            dry_run,
            verbose,
        } => (MaidCommand::Keep { recursive, dry_run }, path, verbose),
        Command::Restore {
            path,
            run,
            list,
            dry_run,
            verbose,
        } => (MaidCommand::Restore { run, list, dry_run }, path, verbose),
    };

    let output = OutputOptions {
        verbose,
        json: cli.json,
    };

    run_cli_with_config(command, &path, cli.config.as_deref(), output)
        .with_context(|| format!("maid failed for {}", path.display()))?;
    Ok(())
}
