mod commands;
mod progress;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "zstack", about = "Wavelet-domain focus stack fusion")]
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
    /// Print, save, or check a fusion config (TOML)
    Config(commands::config::ConfigArgs),
    /// Fuse a synthetic focus stack and report the result
    Synth(commands::synth::SynthArgs),
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
        Commands::Synth(args) => commands::synth::run(args),
    }
}
