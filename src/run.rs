//! Process entrypoint shared by the binary: the HTTP server and the `probe` command.

use axum::Router;
use clap::Parser;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use crate::config::{CliArgs, Command, Config};
use crate::crm::CrmService;
use crate::handlers;
use crate::probe::Prober;
use crate::store::MemoryStore;
use crate::util::{SigDown, Telemetry};

/// Parses the command line and runs the requested mode.
///
/// - Loads `.env` variables.
/// - Initializes logging and, when configured, OpenTelemetry export.
/// - Without a subcommand, serves the CRM over HTTP on `HOST`:`PORT` until SIGTERM/SIGINT.
/// - With `probe <URL>`, prints the probe result and exits non-zero unless it succeeded.
pub async fn run() -> Result<ExitCode, Box<dyn std::error::Error>> {
    dotenv().ok();
    let cli_args = CliArgs::parse();

    let telemetry = Telemetry::new()
        .with_name(env!("CARGO_PKG_NAME"))
        .with_version(env!("CARGO_PKG_VERSION"))
        .register();

    let config = Config::load(&cli_args)?;
    let prober = Prober::new(config.probe_user_agent());

    if let Some(Command::Probe { url }) = &cli_args.command {
        let result = prober.probe(url).await;
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(if result.success {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let crm = CrmService::new(Arc::new(MemoryStore::new()), prober);
    let axum_state = Arc::new(crm);

    let http_endpoints = Router::new()
        .merge(handlers::routes().with_state(axum_state))
        .layer(telemetry.http_tracing())
        .layer(handlers::cors_layer());

    let addr = SocketAddr::new(config.host(), config.port());
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .inspect_err(|e| tracing::error!("Failed to bind to {}: {}", addr, e))?;

    let sig_down = SigDown::try_new()?;
    let axum_cancellation_token = sig_down.cancellation_token();
    let axum_graceful_shutdown = async move { axum_cancellation_token.cancelled().await };
    axum::serve(listener, http_endpoints)
        .with_graceful_shutdown(axum_graceful_shutdown)
        .await?;
    sig_down.recv().await;
    tracing::info!("Server stopped");

    Ok(ExitCode::SUCCESS)
}
