// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Live chain access for the engine.
//!
//! [`ChainClient`] serves every read through the weighted [`RpcPool`].
//! [`LiveTradeBackend`] adds the wallet-bound operations: it estimates,
//! signs and submits through a single signing endpoint and waits for
//! receipts there.

use std::sync::Arc;

use alloy::{
    primitives::{aliases::U24, Address, TxHash, U256},
    providers::{DynProvider, PendingTransactionBuilder, Provider},
    rpc::types::{BlockId, TransactionRequest},
    signers::local::PrivateKeySigner,
    sol_types::decode_revert_reason,
};
use async_trait::async_trait;
use url::Url;

use super::contracts::{
    IAggregatorV3, IClassicFactory, IClassicRouter, IConcentratedFactory, IConcentratedPool,
    IQuoterV2, IReservePool, ISolidlyFactory, ISolidlyRouter, IERC20,
};
use super::rpc::{signing_provider, RpcPool};
use super::types::{NetworkConfig, TokenDescriptor};
use crate::error::{EngineError, EngineResult};
use crate::liquidity::{AmmFamily, LiquidityRoute, PoolDirectory, PoolProbe};
use crate::pricing::{FeedAnswer, PoolReserves, PoolSqrtPrice, PriceSource};
use crate::session::ChainAccess;
use crate::trading::calls::solidly_route;
use crate::trading::{FeeData, Inclusion, SwapLeg, TradeBackend};

/// Read-side chain client shared by the engine.
#[derive(Debug, Clone)]
pub struct ChainClient {
    network: NetworkConfig,
    reads: Arc<RpcPool>,
    signing_url: Url,
}

impl ChainClient {
    pub fn new(network: NetworkConfig, reads: RpcPool, signing_url: Url) -> Self {
        Self {
            network,
            reads: Arc::new(reads),
            signing_url,
        }
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    /// Latest block number, used for health reporting.
    pub async fn block_number(&self) -> EngineResult<u64> {
        self.reads
            .read("eth_blockNumber", |ep| {
                let p = ep.provider().clone();
                async move { p.get_block_number().await }
            })
            .await
    }
}

async fn erc20_balance(reads: &RpcPool, token: Address, owner: Address) -> EngineResult<U256> {
    reads
        .read("balanceOf", |ep| {
            let p = ep.provider().clone();
            async move { IERC20::new(token, p).balanceOf(owner).call().await }
        })
        .await
}

async fn native_balance(reads: &RpcPool, owner: Address) -> EngineResult<U256> {
    reads
        .read("eth_getBalance", |ep| {
            let p = ep.provider().clone();
            async move { p.get_balance(owner).await }
        })
        .await
}

#[async_trait]
impl PoolDirectory for ChainClient {
    async fn find_pool(&self, token: Address, probe: PoolProbe) -> EngineResult<Address> {
        let amms = self.network.amms;
        let weth = self.network.wrapped_native;
        match probe {
            PoolProbe::Classic => {
                self.reads
                    .read("getPair", |ep| {
                        let p = ep.provider().clone();
                        async move {
                            IClassicFactory::new(amms.classic_factory, p)
                                .getPair(token, weth)
                                .call()
                                .await
                        }
                    })
                    .await
            }
            PoolProbe::Solidly { stable } => {
                self.reads
                    .read("getPool(stable)", |ep| {
                        let p = ep.provider().clone();
                        async move {
                            ISolidlyFactory::new(amms.solidly_factory, p)
                                .getPool(token, weth, stable)
                                .call()
                                .await
                        }
                    })
                    .await
            }
            PoolProbe::Concentrated { fee } => {
                let fee = U24::try_from(fee)
                    .map_err(|_| EngineError::Contract(format!("fee tier {fee} out of range")))?;
                self.reads
                    .read("getPool(fee)", |ep| {
                        let p = ep.provider().clone();
                        async move {
                            IConcentratedFactory::new(amms.concentrated_factory, p)
                                .getPool(token, weth, fee)
                                .call()
                                .await
                        }
                    })
                    .await
            }
        }
    }

    async fn wrapped_native_balance(&self, pool: Address) -> EngineResult<U256> {
        erc20_balance(&self.reads, self.network.wrapped_native, pool).await
    }
}

#[async_trait]
impl PriceSource for ChainClient {
    async fn native_usd_feed(&self) -> EngineResult<FeedAnswer> {
        let feed = self.network.native_usd_feed;
        self.reads
            .read("latestRoundData", |ep| {
                let p = ep.provider().clone();
                async move {
                    let aggregator = IAggregatorV3::new(feed, p);
                    let decimals = aggregator.decimals().call().await?;
                    let round = aggregator.latestRoundData().call().await?;
                    Ok::<_, alloy::contract::Error>(FeedAnswer {
                        answer: round.answer,
                        decimals,
                    })
                }
            })
            .await
    }

    async fn pool_reserves(&self, pool: Address) -> EngineResult<PoolReserves> {
        self.reads
            .read("getReserves", |ep| {
                let p = ep.provider().clone();
                async move {
                    let pair = IReservePool::new(pool, p);
                    let token0 = pair.token0().call().await?;
                    let reserves = pair.getReserves().call().await?;
                    Ok::<_, alloy::contract::Error>(PoolReserves {
                        token0,
                        reserve0: reserves.reserve0,
                        reserve1: reserves.reserve1,
                    })
                }
            })
            .await
    }

    async fn pool_sqrt_price(&self, pool: Address) -> EngineResult<PoolSqrtPrice> {
        self.reads
            .read("slot0", |ep| {
                let p = ep.provider().clone();
                async move {
                    let concentrated = IConcentratedPool::new(pool, p);
                    let token0 = concentrated.token0().call().await?;
                    let slot0 = concentrated.slot0().call().await?;
                    Ok::<_, alloy::contract::Error>(PoolSqrtPrice {
                        token0,
                        sqrt_price_x96: U256::from(slot0.sqrtPriceX96),
                    })
                }
            })
            .await
    }
}

#[async_trait]
impl ChainAccess for ChainClient {
    async fn token_descriptor(&self, token: Address) -> EngineResult<TokenDescriptor> {
        let (name, symbol, decimals) = tokio::join!(
            self.reads.read("name", |ep| {
                let p = ep.provider().clone();
                async move { IERC20::new(token, p).name().call().await }
            }),
            self.reads.read("symbol", |ep| {
                let p = ep.provider().clone();
                async move { IERC20::new(token, p).symbol().call().await }
            }),
            self.reads.read("decimals", |ep| {
                let p = ep.provider().clone();
                async move { IERC20::new(token, p).decimals().call().await }
            }),
        );

        if let (Err(e), Err(_), Err(_)) = (&name, &symbol, &decimals) {
            return Err(e.clone());
        }
        for (field, error) in [
            ("name", name.as_ref().err()),
            ("symbol", symbol.as_ref().err()),
            ("decimals", decimals.as_ref().err()),
        ] {
            if let Some(e) = error {
                tracing::warn!(token = %token, field, error = %e, "Token metadata read failed, using default");
            }
        }

        Ok(TokenDescriptor::with_defaults(
            token,
            name.ok(),
            symbol.ok(),
            decimals.ok(),
        ))
    }

    async fn native_balance_of(&self, owner: Address) -> EngineResult<U256> {
        native_balance(&self.reads, owner).await
    }

    async fn token_balance_of(&self, token: Address, owner: Address) -> EngineResult<U256> {
        erc20_balance(&self.reads, token, owner).await
    }

    fn trade_backend(&self, signer: PrivateKeySigner) -> EngineResult<Arc<dyn TradeBackend>> {
        Ok(Arc::new(LiveTradeBackend {
            wallet: signer.address(),
            network: self.network,
            reads: self.reads.clone(),
            signer: signing_provider(self.signing_url.clone(), signer),
        }))
    }
}

/// Trade operations for one wallet.
pub struct LiveTradeBackend {
    wallet: Address,
    network: NetworkConfig,
    reads: Arc<RpcPool>,
    signer: DynProvider,
}

impl LiveTradeBackend {
    /// Replay a failed transaction on its parent block to recover the
    /// revert message.
    async fn revert_reason(&self, tx_hash: TxHash, block_number: Option<u64>) -> Option<String> {
        let parent = block_number?.checked_sub(1)?;
        let tx = match self.signer.get_transaction_by_hash(tx_hash).await {
            Ok(Some(tx)) => tx,
            Ok(None) => return None,
            Err(e) => {
                tracing::debug!(tx_hash = %tx_hash, error = %e, "Could not fetch reverted transaction");
                return None;
            }
        };

        match self
            .signer
            .call(tx.into_request())
            .block(BlockId::number(parent))
            .await
        {
            // Succeeds on replay: the revert depended on in-block state.
            Ok(_) => None,
            Err(e) => {
                let payload = e.as_error_resp()?;
                Some(
                    payload
                        .as_revert_data()
                        .and_then(|data| decode_revert_reason(&data))
                        .unwrap_or_else(|| payload.message.to_string()),
                )
            }
        }
    }
}

#[async_trait]
impl TradeBackend for LiveTradeBackend {
    fn wallet(&self) -> Address {
        self.wallet
    }

    async fn native_balance(&self) -> EngineResult<U256> {
        native_balance(&self.reads, self.wallet).await
    }

    async fn token_balance(&self, token: Address) -> EngineResult<U256> {
        erc20_balance(&self.reads, token, self.wallet).await
    }

    async fn allowance(&self, token: Address, spender: Address) -> EngineResult<U256> {
        let owner = self.wallet;
        self.reads
            .read("allowance", |ep| {
                let p = ep.provider().clone();
                async move { IERC20::new(token, p).allowance(owner, spender).call().await }
            })
            .await
    }

    async fn quote(
        &self,
        route: &LiquidityRoute,
        leg: SwapLeg,
        amount_in: U256,
    ) -> EngineResult<U256> {
        let (router, _) = route.tradeable().ok_or(EngineError::NoLiquidity)?;

        match route.family {
            AmmFamily::ClassicV2 => {
                let path = vec![leg.token_in, leg.token_out];
                let amounts = self
                    .reads
                    .read("getAmountsOut", |ep| {
                        let p = ep.provider().clone();
                        let path = path.clone();
                        async move {
                            IClassicRouter::new(router, p)
                                .getAmountsOut(amount_in, path)
                                .call()
                                .await
                        }
                    })
                    .await?;
                Ok(amounts.last().copied().unwrap_or_default())
            }
            AmmFamily::Solidly => {
                let hop = solidly_route(route, leg)?;
                let amounts = self
                    .reads
                    .read("getAmountsOut(routes)", |ep| {
                        let p = ep.provider().clone();
                        let hop = hop.clone();
                        async move {
                            ISolidlyRouter::new(router, p)
                                .getAmountsOut(amount_in, vec![hop])
                                .call()
                                .await
                        }
                    })
                    .await?;
                Ok(amounts.last().copied().unwrap_or_default())
            }
            AmmFamily::Concentrated => {
                let fee = route
                    .fee_tier
                    .and_then(|fee| U24::try_from(fee).ok())
                    .ok_or_else(|| {
                        EngineError::InvalidTrade("concentrated route without fee tier".into())
                    })?;
                let quoter = self.network.amms.concentrated_quoter;
                self.reads
                    .read("quoteExactInputSingle", |ep| {
                        let p = ep.provider().clone();
                        async move {
                            let params = IQuoterV2::QuoteExactInputSingleParams {
                                tokenIn: leg.token_in,
                                tokenOut: leg.token_out,
                                amountIn: amount_in,
                                fee,
                                sqrtPriceLimitX96: Default::default(),
                            };
                            IQuoterV2::new(quoter, p)
                                .quoteExactInputSingle(params)
                                .call()
                                .await
                                .map(|quote| quote.amountOut)
                        }
                    })
                    .await
            }
            AmmFamily::Unavailable => Err(EngineError::NoLiquidity),
        }
    }

    async fn estimate_gas(&self, tx: &TransactionRequest) -> EngineResult<u64> {
        self.signer
            .estimate_gas(tx.clone().from(self.wallet))
            .await
            .map_err(|e| EngineError::Contract(format!("gas estimation failed: {e}")))
    }

    async fn suggested_fees(&self) -> EngineResult<FeeData> {
        let estimate = self
            .signer
            .estimate_eip1559_fees()
            .await
            .map_err(|e| EngineError::NetworkUnavailable(format!("fee estimation: {e}")))?;
        Ok(FeeData {
            max_fee_per_gas: estimate.max_fee_per_gas,
            max_priority_fee_per_gas: estimate.max_priority_fee_per_gas,
        })
    }

    async fn send(&self, tx: TransactionRequest) -> EngineResult<TxHash> {
        let pending = self
            .signer
            .send_transaction(tx.from(self.wallet))
            .await
            .map_err(|e| EngineError::TransactionReverted {
                tx_hash: None,
                reason: format!("broadcast failed: {e}"),
            })?;
        let tx_hash = *pending.tx_hash();
        tracing::info!(
            tx_hash = %tx_hash,
            explorer = %self.network.tx_url(&tx_hash.to_string()),
            "Transaction broadcast"
        );
        Ok(tx_hash)
    }

    async fn wait_for_inclusion(&self, tx_hash: TxHash) -> EngineResult<Inclusion> {
        // No engine-side timeout: inclusion is left to the chain.
        let receipt = PendingTransactionBuilder::new(self.signer.root().clone(), tx_hash)
            .get_receipt()
            .await
            .map_err(|e| {
                EngineError::NetworkUnavailable(format!("waiting for {tx_hash}: {e}"))
            })?;

        let success = receipt.status();
        let revert_reason = if success {
            None
        } else {
            self.revert_reason(tx_hash, receipt.block_number).await
        };

        Ok(Inclusion {
            tx_hash,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
            success,
            revert_reason,
        })
    }
}
