// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Fiat pricing.
//!
//! Prices are advisory. Every entry point here returns a plain `f64` and
//! degrades to the last good value or zero instead of failing.

pub mod format;

use std::time::Duration;

use alloy::primitives::{Address, I256, U256};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::blockchain::amounts::to_f64;
use crate::error::{EngineError, EngineResult};
use crate::liquidity::AmmFamily;

pub use format::format_fiat;

/// How long a native price is served from cache.
pub const PRICE_TTL: Duration = Duration::from_secs(30);

/// Decimals of the wrapped native asset.
pub const NATIVE_DECIMALS: u8 = 18;

/// Raw round data from the native/USD feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedAnswer {
    pub answer: I256,
    pub decimals: u8,
}

/// Reserves of a constant-product pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolReserves {
    pub token0: Address,
    pub reserve0: U256,
    pub reserve1: U256,
}

/// Current price of a concentrated-liquidity pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSqrtPrice {
    pub token0: Address,
    pub sqrt_price_x96: U256,
}

/// Reads the oracle needs.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn native_usd_feed(&self) -> EngineResult<FeedAnswer>;
    async fn pool_reserves(&self, pool: Address) -> EngineResult<PoolReserves>;
    async fn pool_sqrt_price(&self, pool: Address) -> EngineResult<PoolSqrtPrice>;
}

/// Native price plus when it was read.
#[derive(Debug, Clone, Copy)]
pub struct PriceSnapshot {
    pub usd: f64,
    pub fetched_at: Instant,
}

/// Native price cache, owned by the engine.
#[derive(Debug)]
pub struct PriceOracle {
    ttl: Duration,
    cached: Mutex<Option<PriceSnapshot>>,
}

impl Default for PriceOracle {
    fn default() -> Self {
        Self::new(PRICE_TTL)
    }
}

impl PriceOracle {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            cached: Mutex::new(None),
        }
    }

    /// Native asset price in USD.
    ///
    /// Served from cache within the TTL. On a failed read the last good
    /// value is returned, or zero if there never was one.
    pub async fn native_usd<S>(&self, source: &S) -> f64
    where
        S: PriceSource + ?Sized,
    {
        // Held across the read so concurrent callers share one fetch.
        let mut cached = self.cached.lock().await;
        if let Some(snapshot) = cached.as_ref() {
            if snapshot.fetched_at.elapsed() < self.ttl {
                return snapshot.usd;
            }
        }

        match read_native_usd(source).await {
            Ok(usd) => {
                *cached = Some(PriceSnapshot {
                    usd,
                    fetched_at: Instant::now(),
                });
                usd
            }
            Err(e) => {
                let fallback = cached.as_ref().map(|s| s.usd).unwrap_or(0.0);
                tracing::warn!(error = %e, fallback, "Native price read failed");
                fallback
            }
        }
    }

    /// Last good native price without touching the network.
    pub async fn last_native_usd(&self) -> Option<PriceSnapshot> {
        *self.cached.lock().await
    }

    /// Token price in USD derived from the pool it trades in.
    ///
    /// Zero when the pool is unknown or any read fails.
    pub async fn token_usd<S>(
        &self,
        source: &S,
        family: AmmFamily,
        pool: Address,
        token: Address,
        token_decimals: u8,
    ) -> f64
    where
        S: PriceSource + ?Sized,
    {
        if pool.is_zero() {
            return 0.0;
        }

        let native_per_token = match family {
            AmmFamily::ClassicV2 | AmmFamily::Solidly => source
                .pool_reserves(pool)
                .await
                .map(|r| native_per_token_from_reserves(&r, token, token_decimals)),
            AmmFamily::Concentrated => source
                .pool_sqrt_price(pool)
                .await
                .map(|p| native_per_token_from_sqrt_price(&p, token, token_decimals)),
            AmmFamily::Unavailable => return 0.0,
        };

        match native_per_token {
            Ok(ratio) if ratio > 0.0 && ratio.is_finite() => ratio * self.native_usd(source).await,
            Ok(_) => 0.0,
            Err(e) => {
                tracing::debug!(pool = %pool, error = %e, "Token price read failed");
                0.0
            }
        }
    }
}

async fn read_native_usd<S>(source: &S) -> EngineResult<f64>
where
    S: PriceSource + ?Sized,
{
    let feed = source.native_usd_feed().await?;
    if feed.answer <= I256::ZERO {
        return Err(EngineError::Contract(format!(
            "feed returned non-positive answer {}",
            feed.answer
        )));
    }
    Ok(to_f64(feed.answer.into_raw(), feed.decimals))
}

/// Native units per whole token from constant-product reserves.
pub fn native_per_token_from_reserves(reserves: &PoolReserves, token: Address, decimals: u8) -> f64 {
    let (token_reserve, native_reserve) = if reserves.token0 == token {
        (reserves.reserve0, reserves.reserve1)
    } else {
        (reserves.reserve1, reserves.reserve0)
    };
    if token_reserve.is_zero() {
        return 0.0;
    }
    to_f64(native_reserve, NATIVE_DECIMALS) / to_f64(token_reserve, decimals)
}

/// Native units per whole token from a Q64.96 square-root price.
pub fn native_per_token_from_sqrt_price(price: &PoolSqrtPrice, token: Address, decimals: u8) -> f64 {
    let sqrt = to_f64(price.sqrt_price_x96, 0) / 2f64.powi(96);
    // Raw token1 per raw token0
    let raw = sqrt * sqrt;
    if raw == 0.0 {
        return 0.0;
    }
    let scale = 10f64.powi(decimals as i32 - NATIVE_DECIMALS as i32);
    if price.token0 == token {
        raw * scale
    } else {
        scale / raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockChain, TOKEN, WETH};
    use alloy::primitives::address;

    const POOL: Address = address!("0x00000000000000000000000000000000000000a1");

    fn eth(n: u64) -> U256 {
        U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
    }

    #[tokio::test(start_paused = true)]
    async fn native_price_is_cached_for_ttl() {
        let chain = MockChain::new();
        chain.set_native_usd(2_500_00000000, 8);
        let oracle = PriceOracle::default();

        assert_eq!(oracle.native_usd(&chain).await, 2500.0);
        chain.set_native_usd(2_600_00000000, 8);
        assert_eq!(oracle.native_usd(&chain).await, 2500.0);
        assert_eq!(chain.feed_reads(), 1);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(oracle.native_usd(&chain).await, 2600.0);
        assert_eq!(chain.feed_reads(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_read_returns_last_good_value() {
        let chain = MockChain::new();
        let oracle = PriceOracle::default();

        chain.fail_all_reads();
        assert_eq!(oracle.native_usd(&chain).await, 0.0);

        chain.restore_reads();
        chain.set_native_usd(3_000_00000000, 8);
        assert_eq!(oracle.native_usd(&chain).await, 3000.0);

        tokio::time::advance(Duration::from_secs(31)).await;
        chain.fail_all_reads();
        assert_eq!(oracle.native_usd(&chain).await, 3000.0);
    }

    #[tokio::test]
    async fn non_positive_answer_is_a_failed_read() {
        let chain = MockChain::new();
        chain.set_native_usd(0, 8);
        let oracle = PriceOracle::default();
        assert_eq!(oracle.native_usd(&chain).await, 0.0);
        assert!(oracle.last_native_usd().await.is_none());
    }

    #[test]
    fn reserves_ratio_respects_token_order_and_decimals() {
        // 10 WETH against 20,000 tokens of 6 decimals
        let token_first = PoolReserves {
            token0: TOKEN,
            reserve0: U256::from(20_000_000_000u64),
            reserve1: eth(10),
        };
        let ratio = native_per_token_from_reserves(&token_first, TOKEN, 6);
        assert!((ratio - 0.0005).abs() < 1e-12);

        let native_first = PoolReserves {
            token0: WETH,
            reserve0: eth(10),
            reserve1: U256::from(20_000_000_000u64),
        };
        assert!((native_per_token_from_reserves(&native_first, TOKEN, 6) - 0.0005).abs() < 1e-12);
    }

    #[test]
    fn zero_token_reserve_prices_at_zero() {
        let reserves = PoolReserves {
            token0: TOKEN,
            reserve0: U256::ZERO,
            reserve1: eth(1),
        };
        assert_eq!(native_per_token_from_reserves(&reserves, TOKEN, 18), 0.0);
    }

    #[test]
    fn sqrt_price_both_orderings() {
        // sqrtPriceX96 = 2^96 means one raw unit of token1 per raw token0
        let one = U256::from(1u64) << 96;
        let token_first = PoolSqrtPrice {
            token0: TOKEN,
            sqrt_price_x96: one,
        };
        assert!((native_per_token_from_sqrt_price(&token_first, TOKEN, 18) - 1.0).abs() < 1e-12);

        // 4 raw tokens per raw native with token as token1
        let native_first = PoolSqrtPrice {
            token0: WETH,
            sqrt_price_x96: U256::from(2u64) << 96,
        };
        assert!((native_per_token_from_sqrt_price(&native_first, TOKEN, 18) - 0.25).abs() < 1e-12);

        let empty = PoolSqrtPrice {
            token0: TOKEN,
            sqrt_price_x96: U256::ZERO,
        };
        assert_eq!(native_per_token_from_sqrt_price(&empty, TOKEN, 18), 0.0);
    }

    #[tokio::test]
    async fn token_price_multiplies_native_price() {
        let chain = MockChain::new();
        chain.set_native_usd(2_000_00000000, 8);
        chain.set_reserves(
            POOL,
            PoolReserves {
                token0: TOKEN,
                reserve0: eth(1_000),
                reserve1: eth(1),
            },
        );
        let oracle = PriceOracle::default();

        let usd = oracle
            .token_usd(&chain, AmmFamily::ClassicV2, POOL, TOKEN, 18)
            .await;
        assert!((usd - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn concentrated_pool_is_priced_from_slot0() {
        let chain = MockChain::new();
        chain.set_native_usd(2_000_00000000, 8);
        let oracle = PriceOracle::default();

        // No slot0 for POOL yet: the read fails
        assert_eq!(
            oracle
                .token_usd(&chain, AmmFamily::Concentrated, POOL, TOKEN, 18)
                .await,
            0.0
        );

        // Four tokens per WETH, WETH as token0
        chain.set_sqrt_price(
            POOL,
            PoolSqrtPrice {
                token0: WETH,
                sqrt_price_x96: U256::from(2u64) << 96,
            },
        );
        let usd = oracle
            .token_usd(&chain, AmmFamily::Concentrated, POOL, TOKEN, 18)
            .await;
        assert!((usd - 500.0).abs() < 1e-9);

        chain.fail_all_reads();
        assert_eq!(
            oracle
                .token_usd(&chain, AmmFamily::Concentrated, POOL, TOKEN, 18)
                .await,
            0.0
        );
    }

    #[tokio::test]
    async fn token_price_is_zero_without_pool_or_on_failure() {
        let chain = MockChain::new();
        chain.set_native_usd(2_000_00000000, 8);
        let oracle = PriceOracle::default();

        assert_eq!(
            oracle
                .token_usd(&chain, AmmFamily::ClassicV2, Address::ZERO, TOKEN, 18)
                .await,
            0.0
        );
        // No reserves registered for POOL: the read fails
        assert_eq!(
            oracle
                .token_usd(&chain, AmmFamily::Solidly, POOL, TOKEN, 18)
                .await,
            0.0
        );
        assert_eq!(
            oracle
                .token_usd(&chain, AmmFamily::Unavailable, POOL, TOKEN, 18)
                .await,
            0.0
        );
    }
}
