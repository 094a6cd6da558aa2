//! Shapes of the JSON body returned with an HTTP 402 Payment Required response.
//!
//! Two historical shapes exist:
//!
//! - **V1** ([`v1`]): a single requirement with `maxAmountRequired` / `payTo`, optionally
//!   nested under `payment`.
//! - **V2** ([`v2`]): `x402Version: 2` with an `accepts` list of options on CAIP-2 networks.
//!
//! [`PaymentRequired::from_value`] tries V2 first, then V1. A body matching neither is
//! unrecognized.

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod util;
pub mod v1;
pub mod v2;

/// Protocol version of a recognized 402 body.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolVersion {
    V1,
    V2,
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolVersion::V1 => write!(f, "v1"),
            ProtocolVersion::V2 => write!(f, "v2"),
        }
    }
}

/// Payment terms extracted from a recognized 402 body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentTerms {
    /// Requested amount as sent by the server, or empty.
    pub amount: String,
    /// Payment destination, or empty.
    pub pay_to: String,
    /// Token or currency identifier, e.g. `STX`, `sBTC`, `unknown`.
    pub token_type: String,
    /// Whether a Stacks network is accepted as a payment rail.
    pub has_stacks: bool,
}

/// A decoded 402 body in one of the supported shapes.
#[derive(Debug, Clone)]
pub enum PaymentRequired {
    V1(v1::PaymentRequired),
    V2(v2::PaymentRequired),
}

impl PaymentRequired {
    /// Decodes a parsed 402 body: V2 first, then V1.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        v2::PaymentRequired::from_value(value)
            .map(PaymentRequired::V2)
            .or_else(|| v1::PaymentRequired::from_value(value).map(PaymentRequired::V1))
    }

    pub fn version(&self) -> ProtocolVersion {
        match self {
            PaymentRequired::V1(_) => ProtocolVersion::V1,
            PaymentRequired::V2(_) => ProtocolVersion::V2,
        }
    }

    pub fn terms(&self) -> PaymentTerms {
        match self {
            PaymentRequired::V1(payment_required) => payment_required.terms(),
            PaymentRequired::V2(payment_required) => payment_required.terms(),
        }
    }
}
