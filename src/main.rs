//! Voxmouse - bridge daemon for AI-key voice mouse hardware
//!
//! Run with `voxmouse` or `voxmouse daemon` to start the daemon.
//! Use `voxmouse config` to print the effective configuration.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use voxmouse::platform::{NullHost, StaticProbe};

#[derive(Parser)]
#[command(name = "voxmouse")]
#[command(author, version, about = "Bridge daemon for AI-key voice mouse hardware")]
#[command(long_about = "
Voxmouse bridges an AI-key voice mouse/keyboard combo to its companion
application. It watches the vendor's HID devices, classifies AI-key presses
into clicks and long-press voice recordings, decodes the in-report mSBC
audio to PCM16, and streams everything to local TCP clients as framed JSON.

USAGE:
  Start the daemon, then point the companion app at 127.0.0.1:3395.
  Hold the AI key to record; release to stop.
")]
struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the event stream TCP port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run as daemon (default if no command specified)
    Daemon,

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("voxmouse={},warn", log_level))),
        )
        .with_target(false)
        .init();

    // Load configuration
    let mut config = voxmouse::config::load_config(cli.config.as_deref())?;

    // Apply CLI overrides
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    match cli.command.unwrap_or(Commands::Daemon) {
        Commands::Daemon => {
            run_daemon(config).await?;
        }

        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

async fn run_daemon(config: voxmouse::Config) -> anyhow::Result<()> {
    // HID backends (IOHIDManager on macOS, hidraw elsewhere) feed this
    // channel. The sender stays alive for the daemon's lifetime so the
    // server keeps serving clients while no backend is attached.
    let (_platform_tx, platform_rx) = tokio::sync::mpsc::unbounded_channel();

    let daemon = voxmouse::Daemon::new(config);
    daemon
        .run(platform_rx, Arc::new(NullHost), Arc::new(StaticProbe(true)))
        .await?;
    Ok(())
}
