//! Smart Fraud Detector - Main Entry Point
//!
//! Loads the fraud model, then scores transactions entered at the terminal.

use anyhow::Result;
use smart_fraud_detector::{app, config::AppConfig};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "Smart Fraud Detector stopped");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let config = AppConfig::load()?;
    init_logging(&config)?;

    info!("Starting Smart Fraud Detector");
    info!(
        model = %config.model.path,
        threshold = config.detection.threshold,
        output = ?config.output.format,
        "Configuration loaded"
    );

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    app::run(&config, stdin.lock(), stdout.lock())?;

    Ok(())
}

/// Logs go to stderr so they never interleave with the form on stdout.
fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive(
        format!("smart_fraud_detector={}", config.logging.level).parse()?,
    );

    match config.logging.format.as_str() {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        _ => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }

    Ok(())
}
