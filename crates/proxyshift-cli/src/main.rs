use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::builder::FalseyValueParser;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod completion;
mod flows;
mod render;

use completion::{write_completions_script, CliCompletionShell};
use flows::run_upgrade_command;
use render::{current_output_style, render_error_line};

#[derive(Parser, Debug)]
#[command(name = "proxyshift")]
#[command(about = "Upgrade proxy-fronted units and record the result", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Plan and apply the migration described by the run configuration.
    Upgrade(UpgradeArgs),
    /// Print a shell completion script.
    Completions {
        #[arg(value_enum)]
        shell: CliCompletionShell,
    },
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
struct UpgradeArgs {
    #[arg(long, default_value = "proxyshift.toml")]
    config: PathBuf,
    /// Input manifest with unit and library addresses.
    #[arg(long, env = "ABI")]
    manifest: Option<PathBuf>,
    /// Emit multisig instructions instead of committing upgrades.
    #[arg(long, env = "MULTISIG", value_parser = FalseyValueParser::new())]
    multisig: bool,
    #[arg(long)]
    network: Option<String>,
    #[arg(long)]
    rpc_url: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match dispatch(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", render_error_line(current_output_style(), &err));
            ExitCode::FAILURE
        }
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Upgrade(args) => run_upgrade_command(&args),
        Commands::Completions { shell } => {
            let mut stdout = std::io::stdout().lock();
            write_completions_script(shell, &mut stdout)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

#[cfg(test)]
mod tests;
