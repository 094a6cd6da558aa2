//! Pipeline tracker for [x402](https://www.x402.org) endpoint operators.
//!
//! The crate does two things:
//!
//! - **Probing**: [`probe::Prober`] sends one GET to an endpoint and reports whether it
//!   answers with an x402 `402 Payment Required` challenge, which protocol shape it used
//!   ([`proto`]), what it asks for, and whether a Stacks network is accepted.
//! - **CRM**: [`crm::CrmService`] tracks providers through a sales pipeline, records
//!   verification attempts, and computes pipeline statistics. [`handlers`] exposes it
//!   over HTTP.
//!
//! # Modules
//!
//! - [`config`] - CLI arguments and server configuration.
//! - [`crm`] - Provider records, pipeline updates, verification and stats.
//! - [`error`] - Service errors and their HTTP rendering.
//! - [`handlers`] - Axum routes for the CRM.
//! - [`networks`] - Stacks network identifiers and sBTC/Stacks token recognition.
//! - [`probe`] - The endpoint prober and [`probe::ProbeResult`].
//! - [`proto`] - V1 and V2 shapes of the 402 response body.
//! - [`run`] - Process entrypoint.
//! - [`store`] - Storage traits and the in-memory store.
//! - [`util`] - Telemetry and signal handling.

pub mod config;
pub mod crm;
pub mod error;
pub mod handlers;
pub mod networks;
pub mod probe;
pub mod proto;
pub mod run;
pub mod store;
pub mod util;

pub use run::run;
