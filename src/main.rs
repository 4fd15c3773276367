//! lavalauncher — a launcher panel for Wayland desktops.
//!
//! Run with:  `RUST_LOG=info lavalauncher -c path/to/lavalauncher.conf`

use anyhow::{Context as _, Result};
use clap::Parser;
use lava_wayland::{Outcome, SignalPipe};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "lavalauncher", about = "A launcher panel for Wayland desktops", version)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Raise log verbosity (repeatable).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Structured logging — RUST_LOG overrides the -v default.
    let default_filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    tracing::info!("lavalauncher v{} starting", env!("CARGO_PKG_VERSION"));

    let config_path = match cli.config {
        Some(path) => path,
        None => lava_config::default_path()
            .context("no configuration file found in the default locations")?,
    };

    let signals = SignalPipe::install()?;

    // Reload tears down all Wayland state and goes again with a freshly
    // parsed config; anything else ends the process.
    loop {
        let config = lava_config::load(&config_path)?;
        match lava_wayland::run(config, &config_path, &signals)? {
            Outcome::Reload => {
                tracing::info!("Reinitialising");
                continue;
            }
            Outcome::Exit => break,
        }
    }

    tracing::info!("Clean shutdown");
    Ok(())
}
