// log.rs — Message log subcommands: tail.

use std::path::PathBuf;

use clap::Subcommand;
use vfsx_bridge::{BridgeConfig, MessageLog, MessageRecord};

#[derive(Subcommand)]
pub enum LogCommands {
    /// Show recent round trips.
    Tail {
        /// Path to the message log (defaults to `message_log` in the config).
        #[arg(long)]
        log: Option<PathBuf>,
        /// Number of records to show.
        #[arg(short, default_value = "10")]
        n: usize,
    },
}

pub fn execute(cmd: &LogCommands, config: &BridgeConfig) -> anyhow::Result<()> {
    match cmd {
        LogCommands::Tail { log, n } => {
            let Some(path) = log.clone().or_else(|| config.message_log.clone()) else {
                anyhow::bail!("no message log configured; pass --log or set message_log");
            };

            if !path.exists() {
                println!("No message log found at {}", path.display());
                return Ok(());
            }

            let records = MessageLog::read_all(&path)?;
            let recent = tail(&records, *n);

            if recent.is_empty() {
                println!("No messages.");
                return Ok(());
            }

            println!(
                "{:<20} {:>6} {:<10} {:<9} MESSAGE",
                "TIMESTAMP", "SEQ", "OPERATION", "DECISION"
            );
            println!("{}", "-".repeat(80));

            for record in recent {
                println!(
                    "{:<20} {:>6} {:<10} {:<9} {}",
                    record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    record.sequence,
                    record.operation,
                    record.decision.to_string(),
                    record
                        .error
                        .as_deref()
                        .or(record.message.as_deref())
                        .unwrap_or("-"),
                );
            }
        }
    }

    Ok(())
}

fn tail(records: &[MessageRecord], n: usize) -> &[MessageRecord] {
    &records[records.len().saturating_sub(n)..]
}
