//! x402 CRM HTTP entrypoint.
//!
//! Serves the provider CRM over HTTP, or probes a single endpoint from the command line.
//!
//! Endpoints (mounted under both `/crm` and `/api`):
//! - `GET /` – All providers with a total count
//! - `POST /` – Add a provider
//! - `GET /leads` – Providers in the dashboard lead format
//! - `GET /stats` – Pipeline statistics
//! - `GET|PUT|DELETE /{provider_id}` – Read, update or remove a provider
//! - `GET /{provider_id}/history` – Verification history
//! - `POST /{provider_id}/verify` – Probe the provider's endpoint for x402 support
//!
//! Plus `GET /health`.
//!
//! Environment:
//! - `.env` values loaded at startup
//! - `HOST`, `PORT` control binding address
//! - `PROBE_USER_AGENT` overrides the prober's `User-Agent`
//! - `OTEL_*` variables enable tracing to systems like Honeycomb

use std::process::ExitCode;

use x402_crm::run;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
