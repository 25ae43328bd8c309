mod commands;

use clap::{Parser, Subcommand};
use commands::capabilities::CapabilitiesArgs;
use commands::check::CheckArgs;
use commands::plan::PlanArgs;
use commands::version::VersionArgs;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "uvm")]
#[command(about = "Validate and plan container utility VMs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate an options file and show the resolved memory backing
    Check(CheckArgs),

    /// Print the host document an options file resolves to
    Plan(PlanArgs),

    /// Show what a host capability profile allows
    Capabilities(CapabilitiesArgs),

    /// Show version information
    Version(VersionArgs),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {e:?}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check(args) => commands::check::run(args)?,
        Commands::Plan(args) => commands::plan::run(args)?,
        Commands::Capabilities(args) => commands::capabilities::run(args)?,
        Commands::Version(args) => commands::version::run(args),
    }

    Ok(())
}
