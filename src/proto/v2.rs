//! Protocol version 2 (V2) shape of an HTTP 402 response body.
//!
//! V2 bodies carry `x402Version: 2` and an `accepts` list of payment options, each on a
//! CAIP-2 network (e.g., `"stacks:1"`):
//!
//! ```json
//! {
//!   "x402Version": 2,
//!   "accepts": [
//!     {
//!       "network": "stacks:1",
//!       "asset": "SM3VDXK3WZZSA84XXFKAFAF15NNZX32CTSG82JFQ4.sbtc-token",
//!       "amount": "1000",
//!       "payTo": "SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7",
//!       "extra": { "tokenType": "sBTC" }
//!     }
//!   ]
//! }
//! ```

use serde::Deserialize;
use serde_with::{DefaultOnError, VecSkipError, serde_as};

use crate::networks;
use crate::proto::PaymentTerms;
use crate::proto::util::lenient_string;

/// Version marker value for x402 protocol version 2.
pub const X402_VERSION_2: u64 = 2;

/// HTTP 402 Payment Required response body for V2.
#[serde_as]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    /// Declared protocol version, kept untyped so other values do not fail the decode.
    #[serde(default)]
    pub x402_version: Option<serde_json::Value>,
    /// Acceptable payment options. `None` when the field is missing or not an array.
    /// Elements that are not objects are skipped.
    #[serde_as(as = "DefaultOnError<Option<VecSkipError<_>>>")]
    #[serde(default)]
    pub accepts: Option<Vec<PaymentOption>>,
}

/// A single payment option from the `accepts` list.
#[serde_as]
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOption {
    #[serde(default, deserialize_with = "lenient_string")]
    pub network: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub asset: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub amount: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub pay_to: Option<String>,
    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    pub extra: Option<PaymentOptionExtra>,
}

/// Scheme-specific hints attached to a payment option.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOptionExtra {
    #[serde(default, deserialize_with = "lenient_string")]
    pub token_type: Option<String>,
}

impl PaymentOption {
    /// Whether this option is on a known Stacks network.
    pub fn is_stacks(&self) -> bool {
        self.network
            .as_deref()
            .is_some_and(networks::is_stacks_network)
    }

    /// Whether this option pays in sBTC, by asset contract or by token type hint.
    pub fn is_sbtc(&self) -> bool {
        let by_asset = self.asset.as_deref().is_some_and(networks::is_sbtc_asset);
        let by_hint = self
            .extra
            .as_ref()
            .and_then(|extra| extra.token_type.as_deref())
            .is_some_and(networks::is_sbtc_token_type);
        by_asset || by_hint
    }
}

impl PaymentRequired {
    /// Decodes a V2 body. Returns `None` unless the body is an object with the version
    /// marker set to the integer `2` or with an `accepts` array. `2.0` and `"2"` are not
    /// version markers.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        let decoded = PaymentRequired::deserialize(value).ok()?;
        decoded.is_v2().then_some(decoded)
    }

    fn is_v2(&self) -> bool {
        let version_marker = self
            .x402_version
            .as_ref()
            .and_then(serde_json::Value::as_u64)
            == Some(X402_VERSION_2);
        version_marker || self.accepts.is_some()
    }

    pub fn accepts(&self) -> &[PaymentOption] {
        self.accepts.as_deref().unwrap_or_default()
    }

    /// First option on a known Stacks network.
    pub fn stacks_option(&self) -> Option<&PaymentOption> {
        self.accepts().iter().find(|option| option.is_stacks())
    }

    /// First option paying in sBTC. Chosen independently of [`Self::stacks_option`].
    pub fn sbtc_option(&self) -> Option<&PaymentOption> {
        self.accepts().iter().find(|option| option.is_sbtc())
    }

    pub fn terms(&self) -> PaymentTerms {
        let stacks = self.stacks_option();
        let sbtc = self.sbtc_option();
        let pick = |field: fn(&PaymentOption) -> Option<&String>| {
            stacks
                .and_then(field)
                .or_else(|| sbtc.and_then(field))
                .cloned()
                .unwrap_or_default()
        };
        let token_type = match (sbtc, stacks) {
            (Some(_), _) => "sBTC",
            (None, Some(_)) => "STX",
            (None, None) => "unknown",
        };
        PaymentTerms {
            amount: pick(|option| option.amount.as_ref()),
            pay_to: pick(|option| option.pay_to.as_ref()),
            token_type: token_type.to_string(),
            has_stacks: stacks.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_version_marker_without_accepts() {
        let decoded = PaymentRequired::from_value(&json!({"x402Version": 2})).unwrap();
        assert!(decoded.accepts().is_empty());
        let terms = decoded.terms();
        assert_eq!(terms.token_type, "unknown");
        assert_eq!(terms.amount, "");
        assert!(!terms.has_stacks);
    }

    #[test]
    fn test_accepts_array_without_version_marker() {
        let body = json!({"accepts": [{"network": "stacks:1", "amount": "5", "payTo": "SP1"}]});
        let terms = PaymentRequired::from_value(&body).unwrap().terms();
        assert_eq!(terms.token_type, "STX");
        assert_eq!(terms.amount, "5");
        assert_eq!(terms.pay_to, "SP1");
        assert!(terms.has_stacks);
    }

    #[test]
    fn test_not_v2() {
        assert!(PaymentRequired::from_value(&json!({"x402Version": 1})).is_none());
        assert!(PaymentRequired::from_value(&json!({"accepts": "stacks"})).is_none());
        assert!(PaymentRequired::from_value(&json!([{"x402Version": 2}])).is_none());
        assert!(PaymentRequired::from_value(&json!("x402Version")).is_none());
    }

    #[test]
    fn test_version_marker_must_be_integer_two() {
        assert!(PaymentRequired::from_value(&json!({"x402Version": 2.0})).is_none());
        assert!(PaymentRequired::from_value(&json!({"x402Version": "2"})).is_none());
        assert!(PaymentRequired::from_value(&json!({"x402Version": "2", "accepts": []})).is_some());
    }

    #[test]
    fn test_stacks_option_takes_precedence_for_amount_and_pay_to() {
        let body = json!({
            "x402Version": 2,
            "accepts": [
                {"network": "eip155:8453", "asset": "0xsbtc-token", "amount": "1", "payTo": "0xA"},
                {"network": "stacks:2147483648", "asset": "STX", "amount": "2", "payTo": "ST2"}
            ]
        });
        let terms = PaymentRequired::from_value(&body).unwrap().terms();
        assert_eq!(terms.amount, "2");
        assert_eq!(terms.pay_to, "ST2");
        assert_eq!(terms.token_type, "sBTC");
        assert!(terms.has_stacks);
    }

    #[test]
    fn test_sbtc_option_fills_in_without_stacks_network() {
        let body = json!({
            "x402Version": 2,
            "accepts": [
                {"network": "eip155:8453", "asset": "0xUSDC", "amount": "9", "payTo": "0xB"},
                {"network": "bitcoin", "asset": "btc", "amount": 3, "payTo": "bc1q", "extra": {"tokenType": "SBTC"}}
            ]
        });
        let terms = PaymentRequired::from_value(&body).unwrap().terms();
        assert_eq!(terms.amount, "3");
        assert_eq!(terms.pay_to, "bc1q");
        assert_eq!(terms.token_type, "sBTC");
        assert!(!terms.has_stacks);
    }

    #[test]
    fn test_unrecognized_network_prefix_is_not_stacks() {
        let body = json!({
            "x402Version": 2,
            "accepts": [{"network": "stacks:3", "asset": "STX", "amount": "7", "payTo": "SP3"}]
        });
        let terms = PaymentRequired::from_value(&body).unwrap().terms();
        assert!(!terms.has_stacks);
        assert_eq!(terms.token_type, "unknown");
        assert_eq!(terms.amount, "");
    }

    #[test]
    fn test_skips_malformed_options() {
        let body = json!({
            "x402Version": 2,
            "accepts": ["garbage", 42, {"network": "stacks:1", "amount": "10", "payTo": "SP", "extra": "none"}]
        });
        let decoded = PaymentRequired::from_value(&body).unwrap();
        assert_eq!(decoded.accepts().len(), 1);
        assert_eq!(decoded.accepts()[0].extra, None);
        assert_eq!(decoded.terms().amount, "10");
    }
}
