mod api;
mod app;
mod error;

use crate::api::AppState;
use crate::app::{Services, spawn_reconciler};
use crate::error::{ErrorKind, Result};
use clap::{Parser, Subcommand};
use exn::ResultExt;
use golink_config::Config;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON), merged over the defaults.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP API and reconcile records in the background.
    Serve,
    /// Run a single reconciliation pass and exit.
    Reconcile,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("golink=info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    let services = Services::from_config(&config).await?;
    let result = match cli.command {
        Command::Serve => serve(&config, &services).await,
        Command::Reconcile => reconcile(&config, &services).await,
    };
    services.db.close().await;
    result
}

async fn serve(config: &Config, services: &Services) -> Result<()> {
    let reconciler = spawn_reconciler(services.reconciler.clone(), config.reconcile.clone());
    let app = api::router(AppState { coordinator: services.coordinator.clone(), mode: config.mode });
    let listener = tokio::net::TcpListener::bind(config.listen).await.or_raise(|| ErrorKind::Server)?;
    tracing::info!(listen = %config.listen, mode = config.mode.as_str(), "Serving");
    let served = axum::serve(listener, app).with_graceful_shutdown(shutdown()).await.or_raise(|| ErrorKind::Server);
    reconciler.abort();
    tracing::info!("Shut down");
    served
}

async fn shutdown() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

async fn reconcile(config: &Config, services: &Services) -> Result<()> {
    let report = services.reconciler.reconcile(config.reconcile.stale_after()).await.or_raise(|| ErrorKind::Reconcile)?;
    println!("{report}");
    Ok(())
}
