//! # vfsx-cli
//!
//! Command-line tools around the VFSX bridge:
//! - `vfsx check`: ask the decision service about one operation
//! - `vfsx serve`: run a reference decision service with glob deny rules
//! - `vfsx log tail`: show recent entries of the bridge message log

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use vfsx_bridge::BridgeConfig;

/// VFSX bridge tools.
#[derive(Parser)]
#[command(name = "vfsx", version, about)]
struct Cli {
    /// Bridge config file (TOML). A missing file means defaults.
    #[arg(long, default_value = "/etc/vfsx/bridge.toml")]
    config: PathBuf,

    /// Rendezvous socket path (overrides the config file).
    #[arg(long)]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the decision service whether one operation may proceed.
    ///
    /// Exits 0 on proceed, 1 on denied, 2 on error.
    Check {
        /// Operation tag (open, mkdir, rename, ...).
        operation: String,
        user: String,
        /// Session origin path (the share root).
        origin: String,
        /// Path the operation acts on. Omit for connect/disconnect.
        target: Option<String>,
        /// Extra argument; numbers are sent as numbers. Repeatable.
        #[arg(long = "arg")]
        args: Vec<String>,
    },
    /// Run a reference decision service on the rendezvous socket.
    Serve {
        /// Deny any operation whose path matches this glob. Repeatable.
        #[arg(long)]
        deny: Vec<String>,
    },
    /// Inspect the message log.
    Log {
        #[command(subcommand)]
        command: commands::log::LogCommands,
    },
}

/// Log targets enabled at info level. Targets match by prefix, so a bare
/// "vfsx" would also cover every `vfsx_*` library.
const LOG_TARGETS: &[&str] = &["vfsx::commands", "vfsx_bridge", "vfsx_service"];

fn log_filter(mut filter: EnvFilter) -> anyhow::Result<EnvFilter> {
    for target in LOG_TARGETS {
        filter = filter.add_directive(format!("{}=info", target).parse()?);
    }
    Ok(filter)
}

fn main() -> anyhow::Result<ExitCode> {
    // Logs go to stderr so they don't mix with command output on stdout.
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(EnvFilter::from_default_env())?)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let mut config = BridgeConfig::load_or_default(&cli.config)?;
    if let Some(socket) = cli.socket {
        config.socket_path = socket;
    }

    match &cli.command {
        Commands::Check {
            operation,
            user,
            origin,
            target,
            args,
        } => {
            let decision =
                commands::check::execute(&config, operation, user, origin, target.as_deref(), args);
            Ok(commands::check::exit_code(decision))
        }
        Commands::Serve { deny } => {
            commands::serve::execute(&config, deny)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Log { command } => {
            commands::log::execute(command, &config)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
