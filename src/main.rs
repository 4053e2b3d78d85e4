//! `noesis` - a cognitive orchestration runtime for LLM-backed agents
//!
//! This binary wires the core runtime, starts the system governor, and
//! exposes the two network surfaces: the HTTP request API and the
//! analytics WebSocket broadcast.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use noesis_core::{Config, Runtime};
use tracing_subscriber::EnvFilter;

mod analytics_ws;
mod server;

/// noesis - cognitive orchestration runtime
#[derive(Parser)]
#[command(name = "noesis")]
#[command(about = "Cognitive orchestration runtime for LLM-backed agents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the server (default)
    Serve,
    /// Print the resolved configuration and exit
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::Serve => serve(config).await,
    }
}

async fn serve(config: Config) -> Result<()> {
    let runtime = Runtime::build(config)
        .await
        .context("failed to assemble the runtime")?;
    let runtime = std::sync::Arc::new(runtime);

    runtime.governor.start();

    let api = tokio::spawn(server::run(runtime.clone()));
    let analytics = tokio::spawn(analytics_ws::run(runtime.clone()));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for the shutdown signal")?;
    tracing::info!("shutdown signal received");

    runtime.governor.stop().await;
    runtime.sandbox.stop_sandbox();
    api.abort();
    analytics.abort();
    Ok(())
}
