//! PDF Intake Server - Entry point
//!
//! An MCP server for PDF intake, QR code and GSTIN extraction.

use clap::Parser;
use pdf_intake_server::{run_server_with_config, ServerArgs, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ServerArgs::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdf_intake_server=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting PDF Intake Server");

    run_server_with_config(ServerConfig::from(args)).await
}
