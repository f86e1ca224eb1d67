// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blockchain types and constants.

use alloy::primitives::{address, Address};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Deployed contracts of the three supported AMM families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmmDeployments {
    /// Uniswap V2 style factory (`getPair`)
    pub classic_factory: Address,
    /// Uniswap V2 style router (address-array paths)
    pub classic_router: Address,
    /// Solidly style factory (`getPool(a, b, stable)`)
    pub solidly_factory: Address,
    /// Solidly style router (`Route` hop descriptors)
    pub solidly_router: Address,
    /// Concentrated-liquidity factory (`getPool(a, b, fee)`)
    pub concentrated_factory: Address,
    /// Concentrated-liquidity swap router (`exactInputSingle`)
    pub concentrated_router: Address,
    /// Concentrated-liquidity quoter (`quoteExactInputSingle`)
    pub concentrated_quoter: Address,
}

/// EVM network configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Preset key accepted in configuration
    pub key: &'static str,
    /// Network name for display
    pub name: &'static str,
    /// Chain ID
    pub chain_id: u64,
    /// Native asset symbol
    pub native_symbol: &'static str,
    /// Public RPC endpoints used when none are configured
    pub default_rpc_urls: &'static [&'static str],
    /// Block explorer URL
    pub explorer_url: &'static str,
    /// Wrapped native asset, the common pairing leg for liquidity discovery
    pub wrapped_native: Address,
    /// Native/USD round-data oracle
    pub native_usd_feed: Address,
    /// AMM contract deployments
    pub amms: AmmDeployments,
}

impl NetworkConfig {
    /// Explorer link for a transaction hash.
    pub fn tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_url, tx_hash)
    }
}

/// Base mainnet configuration.
pub const BASE_MAINNET: NetworkConfig = NetworkConfig {
    key: "base",
    name: "Base",
    chain_id: 8453,
    native_symbol: "ETH",
    default_rpc_urls: &[
        "https://mainnet.base.org",
        "https://base-rpc.publicnode.com",
        "https://base.llamarpc.com",
    ],
    explorer_url: "https://basescan.org",
    wrapped_native: address!("0x4200000000000000000000000000000000000006"),
    native_usd_feed: address!("0x71041dddad3595F9CEd3DcCFBe3D1F4b0a16Bb70"),
    amms: AmmDeployments {
        classic_factory: address!("0x8909Dc15e40173Ff4699343b6eB8132c65e18eC6"),
        classic_router: address!("0x4752ba5DBc23f44D87826276BF6Fd6b1C372aD24"),
        solidly_factory: address!("0x420DD381b31aEf6683db6B902084cB0FFECe40Da"),
        solidly_router: address!("0xcF77a3Ba9A5CA399B7c97c74d54e5b1Beb874E43"),
        concentrated_factory: address!("0x33128a8fC17869897dcE68Ed026d694621f6FDfD"),
        concentrated_router: address!("0x2626664c2603336E57B271c5C0b26F421741e481"),
        concentrated_quoter: address!("0x3d4e44Eb1374240CE5F1B871ab261CD16335B76a"),
    },
};

/// Networks this build can target.
pub const SUPPORTED_NETWORKS: &[NetworkConfig] = &[BASE_MAINNET];

/// Resolve a network preset by key, rejecting anything unsupported.
pub fn ensure_supported_network(raw: Option<&str>) -> Result<NetworkConfig, String> {
    let value = raw.unwrap_or(BASE_MAINNET.key).trim().to_ascii_lowercase();
    SUPPORTED_NETWORKS
        .iter()
        .find(|n| n.key == value)
        .copied()
        .ok_or_else(|| format!("Network `{value}` is not supported in this build."))
}

/// Token metadata, cached by address for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TokenDescriptor {
    /// Checksummed contract address
    #[schema(value_type = String)]
    pub address: Address,
    /// Token name ("Unknown" if the lookup failed)
    pub name: String,
    /// Token symbol ("???" if the lookup failed)
    pub symbol: String,
    /// Decimal precision (18 if the lookup failed)
    pub decimals: u8,
}

impl TokenDescriptor {
    pub const UNKNOWN_NAME: &'static str = "Unknown";
    pub const UNKNOWN_SYMBOL: &'static str = "???";
    pub const DEFAULT_DECIMALS: u8 = 18;

    /// Build a descriptor, substituting defaults for any failed lookup.
    pub fn with_defaults(
        address: Address,
        name: Option<String>,
        symbol: Option<String>,
        decimals: Option<u8>,
    ) -> Self {
        Self {
            address,
            name: name.unwrap_or_else(|| Self::UNKNOWN_NAME.to_string()),
            symbol: symbol.unwrap_or_else(|| Self::UNKNOWN_SYMBOL.to_string()),
            decimals: decimals.unwrap_or(Self::DEFAULT_DECIMALS),
        }
    }
}

/// Token balance information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TokenBalance {
    /// Token symbol (e.g., "ETH", "USDC")
    pub symbol: String,
    /// Balance in smallest unit (wei for native, token decimals for ERC-20)
    pub balance_raw: String,
    /// Balance formatted with decimals
    pub balance_formatted: String,
    /// Number of decimals
    pub decimals: u8,
}
