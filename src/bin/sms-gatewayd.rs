// ABOUTME: Binary entry point: parses CLI args, loads configuration, and dispatches to the service/send/status verbs

use clap::Parser;
use sms_gateway::cli::{Cli, Command};
use sms_gateway::config::GatewayConfig;
use sms_gateway::service::GatewayService;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = match GatewayConfig::load(cli.config.as_ref()) {
        Ok(config) => cli.apply_overrides(config),
        Err(e) => {
            error!("config error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let service = GatewayService::new(config);

    let result = match &cli.command {
        Command::Service => run_service(&service),
        Command::Send { destination, text } => service.send(destination, &text.join(" ")).map(|_| ()),
        Command::Status => service.status().map(|count| println!("{count}")),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run_service(service: &GatewayService) -> sms_gateway::error::GatewayResult<()> {
    let stop = Arc::new(AtomicBool::new(false));
    let signal_stop = Arc::clone(&stop);
    let _ = ctrlc::set_handler(move || {
        info!("received interrupt, shutting down");
        signal_stop.store(true, std::sync::atomic::Ordering::SeqCst);
    });
    service.run(stop)
}
