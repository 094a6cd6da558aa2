//! Known Stacks networks and asset identifiers used to classify x402 payment options.
//!
//! x402 v2 identifies networks with CAIP-2 chain IDs (`namespace:reference`). A payment
//! option is treated as a Stacks rail when its `network` starts with the full chain ID of
//! one of the [`KNOWN_STACKS_NETWORKS`], e.g. `stacks:1` for mainnet.
//!
//! Matching is done against the full chain ID, not just the `stacks` namespace, so an
//! option on an unlisted Stacks reference (`stacks:3`) is not recognized.

use once_cell::sync::Lazy;

/// CAIP-2 namespace of the Stacks blockchain family.
pub const STACKS_NAMESPACE: &str = "stacks";

/// Lower-cased substrings that identify an sBTC asset contract in a v2 `asset` field.
pub const SBTC_ASSET_IDENTIFIERS: &[&str] = &["sbtc-token", "token-sbtc"];

/// Lower-cased substring that identifies sBTC in a v2 `extra.tokenType` hint.
pub const SBTC_TOKEN_TYPE_HINT: &str = "sbtc";

/// Token types that mark a v1 payment challenge as payable on Stacks.
pub const STACKS_TOKEN_TYPES: &[&str] = &["STX", "sBTC", "USDCx"];

/// Substrings of a v1 top-level `network` value that mark a Stacks network.
pub const STACKS_V1_NETWORK_MARKERS: &[&str] = &["mainnet", "testnet"];

/// A known network definition with its chain ID components and human-readable name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInfo {
    /// Human-readable network name (e.g., "stacks-testnet")
    pub name: &'static str,
    /// CAIP-2 namespace
    pub namespace: &'static str,
    /// Chain reference (e.g., "1" for Stacks mainnet)
    pub reference: &'static str,
}

impl NetworkInfo {
    /// The CAIP-2 chain ID, `namespace:reference`.
    pub fn chain_id(&self) -> String {
        format!("{}:{}", self.namespace, self.reference)
    }
}

pub static KNOWN_STACKS_NETWORKS: &[NetworkInfo] = &[
    NetworkInfo {
        name: "stacks",
        namespace: STACKS_NAMESPACE,
        reference: "1",
    },
    NetworkInfo {
        name: "stacks-testnet",
        namespace: STACKS_NAMESPACE,
        reference: "2147483648",
    },
];

static STACKS_NETWORK_PREFIXES: Lazy<Vec<String>> = Lazy::new(|| {
    KNOWN_STACKS_NETWORKS
        .iter()
        .map(NetworkInfo::chain_id)
        .collect()
});

/// Chain ID prefixes a v2 `network` value is matched against.
pub fn stacks_network_prefixes() -> &'static [String] {
    &STACKS_NETWORK_PREFIXES
}

/// Whether a v2 `network` value belongs to a known Stacks network.
///
/// Case-sensitive prefix match against the full chain IDs of [`KNOWN_STACKS_NETWORKS`].
pub fn is_stacks_network(network: &str) -> bool {
    stacks_network_prefixes()
        .iter()
        .any(|prefix| network.starts_with(prefix.as_str()))
}

/// Whether a v2 `asset` value names an sBTC contract.
pub fn is_sbtc_asset(asset: &str) -> bool {
    let asset = asset.to_lowercase();
    SBTC_ASSET_IDENTIFIERS
        .iter()
        .any(|identifier| asset.contains(identifier))
}

/// Whether a v2 `extra.tokenType` hint names sBTC.
pub fn is_sbtc_token_type(token_type: &str) -> bool {
    token_type.to_lowercase().contains(SBTC_TOKEN_TYPE_HINT)
}

/// Whether a v1 token type is one of the Stacks-native tokens.
pub fn is_stacks_token_type(token_type: &str) -> bool {
    STACKS_TOKEN_TYPES.contains(&token_type)
}

/// Whether a v1 top-level `network` value names a Stacks network.
pub fn is_stacks_v1_network(network: &str) -> bool {
    STACKS_V1_NETWORK_MARKERS
        .iter()
        .any(|marker| network.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stacks_network_prefixes() {
        assert_eq!(
            stacks_network_prefixes(),
            &["stacks:1".to_string(), "stacks:2147483648".to_string()]
        );
    }

    #[test]
    fn test_is_stacks_network_known_chain_ids() {
        assert!(is_stacks_network("stacks:1"));
        assert!(is_stacks_network("stacks:2147483648"));
        assert!(!is_stacks_network("eip155:8453"));
        assert!(!is_stacks_network("STACKS:1"));
    }

    // Matching uses the full chain ID. Matching on the namespace alone would
    // accept `stacks:3` as well.
    #[test]
    fn test_is_stacks_network_requires_full_chain_id_prefix() {
        assert!(!is_stacks_network("stacks:3"));
        assert!(!is_stacks_network("stacks"));
        assert!("stacks:3".starts_with(STACKS_NAMESPACE));
    }

    #[test]
    fn test_is_sbtc_asset() {
        assert!(is_sbtc_asset(
            "SM3VDXK3WZZSA84XXFKAFAF15NNZX32CTSG82JFQ4.sbtc-token"
        ));
        assert!(is_sbtc_asset("TOKEN-SBTC"));
        assert!(!is_sbtc_asset("SP000000000000000000002Q6VF78.stx"));
    }

    #[test]
    fn test_v1_markers() {
        assert!(is_stacks_token_type("USDCx"));
        assert!(!is_stacks_token_type("stx"));
        assert!(is_stacks_v1_network("stacks-testnet"));
        assert!(!is_stacks_v1_network("base-sepolia"));
    }
}
