mod adapter;
mod cli;
mod clusters;
mod config;
mod script;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use clusters::ClusterRegistry;
use tracing::Level;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let dir = config::clusters_dir(cli.clusters_dir);
    let registry = ClusterRegistry::load(&dir)?;

    let line = match &cli.command {
        Commands::Submit(args) => cli::handle_submit(&registry, args)?,
        Commands::Status(args) => cli::handle_status(&registry, args)?,
        Commands::Delete(args) => cli::handle_delete(&registry, args)?,
    };
    println!("{line}");

    Ok(())
}

/// Log to stderr so stdout stays reserved for the result line.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}
