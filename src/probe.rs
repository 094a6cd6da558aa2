//! Endpoint prober: checks whether a URL answers with an x402 payment challenge.
//!
//! A probe is a single GET request. The endpoint passes when it responds with
//! `402 Payment Required` and a JSON body in one of the shapes understood by
//! [`crate::proto::PaymentRequired`]. Every failure is reported in the returned
//! [`ProbeResult`]; [`Prober::probe`] never fails.
//!
//! ## Example
//!
//! ```rust,no_run
//! # async fn run() {
//! use x402_crm::probe::Prober;
//!
//! let prober = Prober::new("x402-crm/0.2");
//! let result = prober.probe("api.example.com/paid").await;
//! if result.success {
//!     println!("x402 {:?}, pay {:?} to {:?}", result.version, result.amount, result.pay_to);
//! }
//! # }
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use reqwest::StatusCode;
use reqwest::header::USER_AGENT;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::error::Error;
use tracing::instrument;

use crate::proto::{PaymentRequired, ProtocolVersion};

/// Error reported when a 402 body matches neither protocol shape.
pub const UNRECOGNIZED_SHAPE_ERROR: &str = "could not parse 402 response as expected protocol";

static URI_SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://").expect("valid scheme regex"));

/// Outcome of probing a single endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<ProtocolVersion>,
    /// Observed HTTP status, `0` when no response was received.
    pub http_status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pay_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    pub has_stacks: bool,
    /// Parsed 402 body, kept for diagnostics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

impl ProbeResult {
    fn failure(http_status: u16, error: String, raw: Option<serde_json::Value>) -> Self {
        Self {
            success: false,
            version: None,
            http_status,
            error: Some(error),
            amount: None,
            pay_to: None,
            token_type: None,
            has_stacks: false,
            raw,
        }
    }

    /// The request could not be sent or no response arrived.
    pub fn unreachable(error: &reqwest::Error) -> Self {
        Self::failure(0, format!("request failed: {}", error_chain(error)), None)
    }

    /// The endpoint answered with something other than 402.
    pub fn unexpected_status(status: StatusCode) -> Self {
        Self::failure(
            status.as_u16(),
            format!(
                "expected HTTP {}, got {}",
                StatusCode::PAYMENT_REQUIRED.as_u16(),
                status.as_u16()
            ),
            None,
        )
    }

    /// Classifies the body of a 402 response.
    pub fn from_payment_required_body(body: &[u8]) -> Self {
        let status = StatusCode::PAYMENT_REQUIRED.as_u16();
        let raw: serde_json::Value = match serde_json::from_slice(body) {
            Ok(raw) => raw,
            Err(e) => {
                return Self::failure(status, format!("402 response body is not valid JSON: {e}"), None);
            }
        };
        match PaymentRequired::from_value(&raw) {
            Some(payment_required) => {
                let terms = payment_required.terms();
                Self {
                    success: true,
                    version: Some(payment_required.version()),
                    http_status: status,
                    error: None,
                    amount: Some(terms.amount),
                    pay_to: Some(terms.pay_to),
                    token_type: Some(terms.token_type),
                    has_stacks: terms.has_stacks,
                    raw: Some(raw),
                }
            }
            None => Self::failure(status, UNRECOGNIZED_SHAPE_ERROR.to_string(), Some(raw)),
        }
    }
}

/// Prefixes `https://` when the input has no URI scheme. The input is otherwise untouched.
pub fn normalize_url(url: &str) -> Cow<'_, str> {
    if URI_SCHEME.is_match(url) {
        Cow::Borrowed(url)
    } else {
        Cow::Owned(format!("https://{url}"))
    }
}

fn error_chain(error: &dyn Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Probes endpoints for x402 support over a shared HTTP client.
///
/// Stateless apart from the client, so one instance can serve concurrent probes.
#[derive(Clone, Debug)]
pub struct Prober {
    client: Client,
    user_agent: String,
}

impl Prober {
    pub fn new<S: Into<String>>(user_agent: S) -> Self {
        Self::with_client(Client::new(), user_agent)
    }

    pub fn with_client<S: Into<String>>(client: Client, user_agent: S) -> Self {
        Self {
            client,
            user_agent: user_agent.into(),
        }
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Sends one GET to `url` and classifies the response. No retries.
    #[instrument(name = "x402_crm.probe", skip(self), fields(http.status_code = tracing::field::Empty))]
    pub async fn probe(&self, url: &str) -> ProbeResult {
        let target = normalize_url(url);
        let response = self
            .client
            .get(target.as_ref())
            .header(USER_AGENT, self.user_agent.as_str())
            .send()
            .await;
        let response = match response {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(url = %target, error = %e, "Probe request failed");
                return ProbeResult::unreachable(&e);
            }
        };

        let status = response.status();
        tracing::Span::current().record("http.status_code", status.as_u16());
        if status != StatusCode::PAYMENT_REQUIRED {
            tracing::info!(url = %target, %status, "Endpoint did not ask for payment");
            return ProbeResult::unexpected_status(status);
        }

        let result = match response.bytes().await {
            Ok(body) => ProbeResult::from_payment_required_body(&body),
            Err(e) => ProbeResult::failure(
                status.as_u16(),
                format!("could not read 402 response body: {}", error_chain(&e)),
                None,
            ),
        };
        match &result.version {
            Some(version) => tracing::info!(url = %target, %version, has_stacks = result.has_stacks, "Endpoint speaks x402"),
            None => tracing::info!(url = %target, error = ?result.error, "Unrecognized 402 response"),
        }
        result
    }
}
