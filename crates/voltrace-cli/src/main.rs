mod commands;
mod summary;
mod synthetic;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "voltrace", about = "Single-neuron spike extraction from voltage imaging")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print or save the default extraction config
    Config(commands::config::ConfigArgs),
    /// Parse and validate an extraction config file
    Check(commands::check::CheckArgs),
    /// Extract spikes from a synthetic recording and report recall
    Demo(commands::demo::DemoArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Config(args) => commands::config::run(args),
        Commands::Check(args) => commands::check::run(args),
        Commands::Demo(args) => commands::demo::run(args),
    }
}
