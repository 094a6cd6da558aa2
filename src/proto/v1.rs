//! Protocol version 1 (V1) shape of an HTTP 402 response body.
//!
//! V1 bodies have no version marker and describe a single payment requirement, either at
//! the top level or nested under `payment`:
//!
//! ```json
//! {
//!   "maxAmountRequired": "500",
//!   "payTo": "SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7",
//!   "tokenType": "STX",
//!   "network": "mainnet"
//! }
//! ```
//!
//! Older servers use `price`, `recipient` and `token` in place of `maxAmountRequired`,
//! `payTo` and `tokenType`.

use serde::Deserialize;
use serde_with::{DefaultOnError, serde_as};

use crate::networks;
use crate::proto::PaymentTerms;
use crate::proto::util::lenient_string;

/// Token type assumed when a V1 body does not name one.
pub const DEFAULT_TOKEN_TYPE: &str = "STX";

/// Payment requirement fields of a V1 body.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    #[serde(default, deserialize_with = "lenient_string")]
    pub max_amount_required: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub price: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub pay_to: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub recipient: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub token_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub token: Option<String>,
}

impl PaymentRequirements {
    /// A V1 requirement is recognized by `maxAmountRequired` or `payTo`.
    fn is_recognized(&self) -> bool {
        self.max_amount_required.is_some() || self.pay_to.is_some()
    }

    pub fn token_type(&self) -> &str {
        self.token_type
            .as_deref()
            .or(self.token.as_deref())
            .unwrap_or(DEFAULT_TOKEN_TYPE)
    }

    pub fn amount(&self) -> &str {
        self.max_amount_required
            .as_deref()
            .or(self.price.as_deref())
            .unwrap_or_default()
    }

    pub fn pay_to(&self) -> &str {
        self.pay_to
            .as_deref()
            .or(self.recipient.as_deref())
            .unwrap_or_default()
    }
}

#[serde_as]
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    payment: Option<PaymentRequirements>,
    #[serde(default, deserialize_with = "lenient_string")]
    network: Option<String>,
}

/// HTTP 402 Payment Required response body for V1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequired {
    /// The requirement that matched: the nested `payment` object, or the body itself.
    pub requirements: PaymentRequirements,
    /// Top-level `network` value.
    pub network: Option<String>,
}

impl PaymentRequired {
    /// Decodes a V1 body. The nested `payment` object is checked first, then the body
    /// itself. Returns `None` when neither carries `maxAmountRequired` or `payTo`.
    ///
    /// Callers are expected to have ruled out the V2 shape already.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        let envelope = Envelope::deserialize(value).ok()?;
        let requirements = match envelope.payment {
            Some(nested) if nested.is_recognized() => nested,
            _ => PaymentRequirements::deserialize(value)
                .ok()
                .filter(PaymentRequirements::is_recognized)?,
        };
        Some(Self {
            requirements,
            network: envelope.network,
        })
    }

    pub fn terms(&self) -> PaymentTerms {
        let token_type = self.requirements.token_type();
        let has_stacks = networks::is_stacks_token_type(token_type)
            || self
                .network
                .as_deref()
                .is_some_and(networks::is_stacks_v1_network);
        PaymentTerms {
            amount: self.requirements.amount().to_string(),
            pay_to: self.requirements.pay_to().to_string(),
            token_type: token_type.to_string(),
            has_stacks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_top_level_requirements_with_defaults() {
        let body = json!({"maxAmountRequired": "500", "payTo": "0xABC", "network": "mainnet"});
        let terms = PaymentRequired::from_value(&body).unwrap().terms();
        assert_eq!(terms.amount, "500");
        assert_eq!(terms.pay_to, "0xABC");
        assert_eq!(terms.token_type, "STX");
        assert!(terms.has_stacks);
    }

    #[test]
    fn test_nested_payment_is_preferred() {
        let body = json!({
            "payTo": "outer",
            "payment": {"price": 42, "recipient": "inner", "token": "USDC", "payTo": "SPINNER"}
        });
        let decoded = PaymentRequired::from_value(&body).unwrap();
        let terms = decoded.terms();
        assert_eq!(terms.amount, "42");
        assert_eq!(terms.pay_to, "SPINNER");
        assert_eq!(terms.token_type, "USDC");
        assert!(!terms.has_stacks);
    }

    #[test]
    fn test_nested_payment_without_fields_falls_back_to_body() {
        let body = json!({"payment": {"note": "see docs"}, "maxAmountRequired": "7"});
        let terms = PaymentRequired::from_value(&body).unwrap().terms();
        assert_eq!(terms.amount, "7");
        assert_eq!(terms.pay_to, "");
    }

    #[test]
    fn test_token_type_marks_stacks() {
        let body = json!({"payTo": "SP1", "tokenType": "sBTC", "network": "base"});
        let terms = PaymentRequired::from_value(&body).unwrap().terms();
        assert_eq!(terms.token_type, "sBTC");
        assert!(terms.has_stacks);

        let body = json!({"payTo": "0x1", "tokenType": "USDC", "network": "base-sepolia"});
        assert!(!PaymentRequired::from_value(&body).unwrap().terms().has_stacks);

        let body = json!({"payTo": "0x1", "tokenType": "USDC", "network": "stacks-testnet"});
        assert!(PaymentRequired::from_value(&body).unwrap().terms().has_stacks);
    }

    #[test]
    fn test_not_v1() {
        assert!(PaymentRequired::from_value(&json!({"foo": "bar"})).is_none());
        assert!(PaymentRequired::from_value(&json!({"price": "1"})).is_none());
        assert!(PaymentRequired::from_value(&json!({"payTo": ""})).is_none());
        assert!(PaymentRequired::from_value(&json!(["payTo"])).is_none());
    }
}
