// ABOUTME: Command-line surface over the gateway core: service / send / status verbs
// ABOUTME: Flags override config-file values, which override GatewayConfig::default()

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sms-gatewayd", version, about = "SMS gateway over a GSM modem")]
pub struct Cli {
    /// Path to a TOML config file layered under built-in defaults.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Serial device the modem is attached to.
    #[arg(long, global = true)]
    pub device: Option<String>,

    /// Serial baud rate.
    #[arg(long, global = true)]
    pub baud_rate: Option<u32>,

    /// Path to the outbound queue file.
    #[arg(long, global = true)]
    pub queue_file: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the dispatcher and reassembler until interrupted.
    Service,
    /// Append a message to the outbound queue and exit.
    Send {
        destination: String,
        /// Message text; multiple words are joined with single spaces.
        text: Vec<String>,
    },
    /// Report the number of entries currently queued.
    Status,
}

impl Cli {
    /// Applies `--device`/`--baud-rate`/`--queue-file` overrides on top of a
    /// loaded `GatewayConfig`.
    pub fn apply_overrides(&self, mut config: crate::config::GatewayConfig) -> crate::config::GatewayConfig {
        if let Some(device) = &self.device {
            config.device = device.clone();
        }
        if let Some(baud_rate) = self.baud_rate {
            config.baud_rate = baud_rate;
        }
        if let Some(queue_file) = &self.queue_file {
            config.queue_file = queue_file.clone();
        }
        config
    }
}
