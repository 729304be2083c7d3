use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod completion;
mod dispatch;
mod prompts;
mod render;

use completion::CliCompletionShell;
use dispatch::run_cli;
use render::{current_output_style, render_error_line};

const LOG_ENV: &str = "ADDONKIT_LOG";

#[derive(Parser, Debug)]
#[command(name = "addonkit")]
#[command(about = "Install, update, back up and remove host application addons", long_about = None)]
struct Cli {
    /// Installation area root (default: $ADDONKIT_ROOT, then the current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Config file (default: <root>/addonkit.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log completed operations to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable status badges and styling
    #[arg(long, global = true)]
    plain: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Install the latest, a specific, or a backed-up package of an addon
    Install {
        name: String,
        #[arg(short, long)]
        password: Option<String>,
        /// Exact package version to install
        #[arg(short = 'r', long = "version")]
        version: Option<String>,
        /// Replace an existing installation without asking
        #[arg(short, long)]
        yes: bool,
        /// Install from `<name>.back.<id>.zip`
        #[arg(long)]
        backup_id: Option<String>,
    },
    /// Move an installed addon to the newest available version
    Update {
        name: String,
        #[arg(short, long)]
        password: Option<String>,
        #[arg(short, long)]
        yes: bool,
    },
    /// Uninstall a disabled addon
    Remove {
        name: String,
        #[arg(short, long)]
        yes: bool,
    },
    /// Snapshot an installed addon into a backup archive
    Backup {
        name: String,
        #[arg(short, long)]
        password: Option<String>,
        /// Output directory (default: the package directory)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Show installed addons and available packages
    List,
    /// Report drift between the ledger and installed addons, and stale locks
    Doctor,
    /// Print a shell completion script
    Completions {
        #[arg(value_enum)]
        shell: CliCompletionShell,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let style = current_output_style(cli.plain);

    if let Err(err) = run_cli(cli, style) {
        eprintln!("{}", render_error_line(style, &err));
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

#[cfg(test)]
mod tests;
