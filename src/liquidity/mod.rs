// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Liquidity discovery across the supported AMM families.
//!
//! Families are probed in a fixed order and the first pool holding a
//! positive wrapped-native balance wins:
//!
//! 1. Classic V2 pair
//! 2. Solidly pool, volatile then stable
//! 3. Concentrated pool, fee tiers 0.3%, 1%, 0.05%
//!
//! Probe failures are logged and skipped; resolution itself never fails.

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::blockchain::AmmDeployments;
use crate::error::EngineResult;

/// Concentrated-liquidity fee tiers in probe order (hundredths of a bip).
pub const CONCENTRATED_FEE_TIERS: [u32; 3] = [3000, 10000, 500];

/// Supported AMM families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AmmFamily {
    /// Uniswap V2 style pair with an address-array router path
    ClassicV2,
    /// Solidly style pool with stable/volatile routes
    Solidly,
    /// Concentrated-liquidity pool keyed by fee tier
    Concentrated,
    /// No family has usable liquidity
    #[serde(rename = "none")]
    Unavailable,
}

/// One pool lookup performed during resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolProbe {
    Classic,
    Solidly { stable: bool },
    Concentrated { fee: u32 },
}

impl PoolProbe {
    /// Every probe, in resolution order.
    pub fn ordered() -> Vec<PoolProbe> {
        let mut probes = vec![
            PoolProbe::Classic,
            PoolProbe::Solidly { stable: false },
            PoolProbe::Solidly { stable: true },
        ];
        probes.extend(
            CONCENTRATED_FEE_TIERS
                .iter()
                .map(|&fee| PoolProbe::Concentrated { fee }),
        );
        probes
    }

    pub fn family(&self) -> AmmFamily {
        match self {
            PoolProbe::Classic => AmmFamily::ClassicV2,
            PoolProbe::Solidly { .. } => AmmFamily::Solidly,
            PoolProbe::Concentrated { .. } => AmmFamily::Concentrated,
        }
    }
}

/// Where a token can be traded against the wrapped native asset.
///
/// A fresh value is produced by every resolution; it is never patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LiquidityRoute {
    pub family: AmmFamily,
    /// Router that executes swaps for this pool
    #[schema(value_type = Option<String>)]
    pub router: Option<Address>,
    /// Pool or pair contract
    #[schema(value_type = Option<String>)]
    pub pair_address: Option<Address>,
    pub has_liquidity: bool,
    /// Concentrated pools only
    pub fee_tier: Option<u32>,
    /// Solidly pools only
    pub stable: Option<bool>,
    /// Solidly pools only; part of every route hop
    #[schema(value_type = Option<String>)]
    pub factory: Option<Address>,
}

impl LiquidityRoute {
    pub fn none() -> Self {
        Self {
            family: AmmFamily::Unavailable,
            router: None,
            pair_address: None,
            has_liquidity: false,
            fee_tier: None,
            stable: None,
            factory: None,
        }
    }

    /// Route for a pool confirmed to hold wrapped-native liquidity.
    pub fn found(probe: PoolProbe, pool: Address, amms: &AmmDeployments) -> Self {
        let (router, fee_tier, stable, factory) = match probe {
            PoolProbe::Classic => (amms.classic_router, None, None, None),
            PoolProbe::Solidly { stable } => (
                amms.solidly_router,
                None,
                Some(stable),
                Some(amms.solidly_factory),
            ),
            PoolProbe::Concentrated { fee } => (amms.concentrated_router, Some(fee), None, None),
        };
        Self {
            family: probe.family(),
            router: Some(router),
            pair_address: Some(pool),
            has_liquidity: true,
            fee_tier,
            stable,
            factory,
        }
    }

    /// Router and pool, present exactly when the route is tradeable.
    pub fn tradeable(&self) -> Option<(Address, Address)> {
        match (self.has_liquidity, self.router, self.pair_address) {
            (true, Some(router), Some(pool)) => Some((router, pool)),
            _ => None,
        }
    }
}

/// Factory lookups needed to resolve a route.
#[async_trait]
pub trait PoolDirectory: Send + Sync {
    /// Pool pairing `token` with the wrapped native asset for `probe`.
    /// The zero address means no such pool was deployed.
    async fn find_pool(&self, token: Address, probe: PoolProbe) -> EngineResult<Address>;

    /// Wrapped-native balance held by `pool`.
    async fn wrapped_native_balance(&self, pool: Address) -> EngineResult<U256>;
}

/// Find the first non-empty pool for `token`.
pub async fn resolve_route<D>(directory: &D, amms: &AmmDeployments, token: Address) -> LiquidityRoute
where
    D: PoolDirectory + ?Sized,
{
    for probe in PoolProbe::ordered() {
        let pool = match directory.find_pool(token, probe).await {
            Ok(pool) if !pool.is_zero() => pool,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(token = %token, ?probe, error = %e, "Pool lookup failed");
                continue;
            }
        };

        match directory.wrapped_native_balance(pool).await {
            Ok(balance) if !balance.is_zero() => {
                tracing::info!(token = %token, pool = %pool, ?probe, "Liquidity found");
                return LiquidityRoute::found(probe, pool, amms);
            }
            Ok(_) => {
                tracing::debug!(token = %token, pool = %pool, ?probe, "Pool is empty");
            }
            Err(e) => {
                tracing::debug!(pool = %pool, ?probe, error = %e, "Pool balance read failed");
            }
        }
    }

    tracing::info!(token = %token, "No liquidity in any supported family");
    LiquidityRoute::none()
}
