// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Engine facade.
//!
//! [`Engine`] owns all process-scoped state (price cache, token cache, the
//! current token and route, the wallet session) and is the only entry point
//! the HTTP layer uses. It is shared as `Arc<Engine>`.
//!
//! At most one trade runs at a time; a second request while one is in
//! flight fails with `TradeInProgress`. Each trade runs on its own task, so
//! a caller that goes away does not interrupt it.

pub mod poller;
pub mod snapshot;
pub mod token_cache;

use std::future::Future;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use alloy::{
    primitives::{Address, U256},
    signers::local::PrivateKeySigner,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use zeroize::Zeroizing;

use crate::blockchain::amounts::{format_amount_display, to_f64};
use crate::blockchain::fees::FeePolicy;
use crate::blockchain::{NetworkConfig, TokenBalance, TokenDescriptor};
use crate::custody::{self, KeyStore};
use crate::error::{EngineError, EngineResult};
use crate::liquidity::{resolve_route, LiquidityRoute, PoolDirectory};
use crate::pricing::{format_fiat, PriceOracle, PriceSource, NATIVE_DECIMALS};
use crate::trading::{
    TradeBackend, TradeDirection, TradeEvent, TradeExecutor, TradeReceipt, TradeRequest,
};

pub use poller::{BalancePoller, DEFAULT_REFRESH_INTERVAL};
pub use snapshot::{
    EngineSnapshot, Operation, OperationStatus, Operations, TokenView, ValuedBalance,
    WalletStatus,
};
pub use token_cache::TokenCache;

/// Capacity of the trade event channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

static TOKEN_ADDRESS_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b0x[0-9a-fA-F]{40}\b").ok());

/// Pull the first 40-hex address out of a raw address, URL or free text.
pub fn extract_token_address(reference: &str) -> EngineResult<Address> {
    let found = TOKEN_ADDRESS_PATTERN
        .as_ref()
        .and_then(|pattern| pattern.find(reference))
        .ok_or(EngineError::NoAddressFound)?;
    Address::from_str(found.as_str()).map_err(|_| EngineError::NoAddressFound)
}

/// Everything the engine reads from the chain.
#[async_trait]
pub trait ChainAccess: PoolDirectory + PriceSource + Send + Sync {
    /// Token metadata with defaults for fields that failed to load.
    /// Fails only when nothing at all could be read.
    async fn token_descriptor(&self, token: Address) -> EngineResult<TokenDescriptor>;

    async fn native_balance_of(&self, owner: Address) -> EngineResult<U256>;

    async fn token_balance_of(&self, token: Address, owner: Address) -> EngineResult<U256>;

    /// Trading operations signed by `signer`.
    fn trade_backend(&self, signer: PrivateKeySigner) -> EngineResult<Arc<dyn TradeBackend>>;
}

/// Engine construction parameters.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub network: NetworkConfig,
    pub data_dir: PathBuf,
    pub refresh_interval: Duration,
    pub fee_policy: FeePolicy,
}

#[derive(Debug, Default)]
struct MarketState {
    token: Option<TokenDescriptor>,
    route: Option<LiquidityRoute>,
    token_price_usd: f64,
}

#[derive(Debug, Default, Clone, Copy)]
struct WalletBalances {
    native: Option<U256>,
    token: Option<(Address, U256)>,
    updated_at: Option<DateTime<Utc>>,
}

/// A connected wallet. Dropping it stops its poller.
struct WalletSession {
    address: Address,
    backend: Arc<dyn TradeBackend>,
    balances: WalletBalances,
    poller: CancellationToken,
}

impl Drop for WalletSession {
    fn drop(&mut self) {
        self.poller.cancel();
    }
}

/// Process-wide trading engine.
pub struct Engine {
    chain: Arc<dyn ChainAccess>,
    network: NetworkConfig,
    key_store: KeyStore,
    oracle: PriceOracle,
    tokens: TokenCache,
    executor: TradeExecutor,
    refresh_interval: Duration,
    market: RwLock<MarketState>,
    wallet: RwLock<Option<WalletSession>>,
    operations: RwLock<Operations>,
    trade_lock: Arc<Mutex<()>>,
}

impl Engine {
    pub fn new(chain: Arc<dyn ChainAccess>, settings: EngineSettings) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            chain,
            network: settings.network,
            key_store: KeyStore::new(&settings.data_dir),
            oracle: PriceOracle::default(),
            tokens: TokenCache::default(),
            executor: TradeExecutor::new(
                settings.network.wrapped_native,
                settings.fee_policy,
                events,
            ),
            refresh_interval: settings.refresh_interval,
            market: RwLock::new(MarketState::default()),
            wallet: RwLock::new(None),
            operations: RwLock::new(Operations::default()),
            trade_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    /// Trade progress events.
    pub fn subscribe(&self) -> broadcast::Receiver<TradeEvent> {
        self.executor.subscribe()
    }

    async fn track<T>(
        &self,
        op: Operation,
        work: impl Future<Output = EngineResult<T>>,
    ) -> EngineResult<T> {
        *self.operations.write().await.get_mut(op) = OperationStatus::loading();
        let result = work.await;
        *self.operations.write().await.get_mut(op) = match &result {
            Ok(_) => OperationStatus::default(),
            Err(e) => OperationStatus::failed(e),
        };
        result
    }

    // ========== Token ==========

    /// Load a token from a reference string and discover its liquidity.
    ///
    /// The new route replaces the previous one. A token without liquidity
    /// still loads; its route reports `has_liquidity == false`.
    pub async fn fetch_token(&self, reference: &str) -> EngineResult<TokenView> {
        self.track(Operation::Fetch, async {
            let address = extract_token_address(reference)?;
            let token = self.token_descriptor(address).await?;
            let route = resolve_route(self.chain.as_ref(), &self.network.amms, address).await;
            let price_usd = self.token_price(&token, &route).await;

            {
                let mut market = self.market.write().await;
                *market = MarketState {
                    token: Some(token.clone()),
                    route: Some(route.clone()),
                    token_price_usd: price_usd,
                };
            }
            tracing::info!(
                token = %address,
                symbol = %token.symbol,
                family = ?route.family,
                has_liquidity = route.has_liquidity,
                "Token loaded"
            );

            self.refresh_balances().await;

            Ok(TokenView {
                token,
                route,
                price_usd,
                price_display: format_fiat(price_usd),
            })
        })
        .await
    }

    /// Forget the current token and route.
    pub async fn reset(&self) {
        *self.market.write().await = MarketState::default();
        *self.operations.write().await.get_mut(Operation::Fetch) = OperationStatus::default();
        if let Some(session) = self.wallet.write().await.as_mut() {
            session.balances.token = None;
        }
    }

    async fn token_descriptor(&self, address: Address) -> EngineResult<TokenDescriptor> {
        if let Some(cached) = self.tokens.get(&address) {
            return Ok(cached);
        }
        let descriptor = self.chain.token_descriptor(address).await?;
        self.tokens.put(descriptor.clone());
        Ok(descriptor)
    }

    async fn token_price(&self, token: &TokenDescriptor, route: &LiquidityRoute) -> f64 {
        match route.tradeable() {
            Some((_, pool)) => {
                self.oracle
                    .token_usd(
                        self.chain.as_ref(),
                        route.family,
                        pool,
                        token.address,
                        token.decimals,
                    )
                    .await
            }
            None => 0.0,
        }
    }

    // ========== Wallet ==========

    pub fn has_stored_wallet(&self) -> bool {
        self.key_store.exists()
    }

    /// Import a raw key: seal it under `password`, persist it and start a
    /// session.
    pub async fn connect(
        self: &Arc<Self>,
        private_key: Zeroizing<String>,
        password: Zeroizing<String>,
    ) -> EngineResult<Address> {
        self.track(Operation::Connect, async {
            let signer = custody::signer_from_hex(&private_key)?;
            let blob = custody::seal(private_key, password).await?;
            self.key_store.persist(&blob)?;
            self.start_session(signer).await
        })
        .await
    }

    /// Open the stored key with `password` and start a session.
    pub async fn unlock(self: &Arc<Self>, password: Zeroizing<String>) -> EngineResult<Address> {
        self.track(Operation::Unlock, async {
            let blob = self.key_store.load()?.ok_or(EngineError::NoStoredWallet)?;
            let raw_key = custody::open(blob, password).await?;
            let signer = custody::signer_from_hex(&raw_key)?;
            self.start_session(signer).await
        })
        .await
    }

    async fn start_session(self: &Arc<Self>, signer: PrivateKeySigner) -> EngineResult<Address> {
        let address = signer.address();
        let backend = self.chain.trade_backend(signer)?;
        let stop = CancellationToken::new();

        {
            let mut wallet = self.wallet.write().await;
            // Replacing a session drops it, which stops its poller.
            *wallet = Some(WalletSession {
                address,
                backend,
                balances: WalletBalances::default(),
                poller: stop.clone(),
            });
        }
        tracing::info!(address = %address, "Wallet session started");

        self.refresh().await;
        let poller = BalancePoller::new(Arc::downgrade(self), self.refresh_interval);
        tokio::spawn(poller.run(stop));

        Ok(address)
    }

    /// End the wallet session. Returns whether one was active.
    pub async fn disconnect(&self) -> bool {
        self.executor.cancel_pending();
        let session = self.wallet.write().await.take();
        match session {
            Some(session) => {
                tracing::info!(address = %session.address, "Wallet disconnected");
                true
            }
            None => false,
        }
    }

    /// Disconnect and delete the stored key blob.
    pub async fn forget_wallet(&self) -> EngineResult<()> {
        self.disconnect().await;
        self.key_store.clear()?;
        Ok(())
    }

    // ========== Trading ==========

    /// Run a trade against the current token and route.
    ///
    /// The trade runs on a spawned task holding the trade lock. Dropping the
    /// returned future does not stop it; it still reaches `Settled` or
    /// `Failed` and releases the lock.
    pub async fn trade(
        self: &Arc<Self>,
        direction: TradeDirection,
        amount: &str,
        slippage: &str,
    ) -> EngineResult<TradeReceipt> {
        let trade_guard = self
            .trade_lock
            .clone()
            .try_lock_owned()
            .map_err(|_| EngineError::TradeInProgress)?;

        let engine = Arc::clone(self);
        let amount = amount.to_string();
        let slippage = slippage.to_string();
        let task = tokio::spawn(async move {
            let _trade_guard = trade_guard;
            let result = engine
                .track(
                    Operation::Trade,
                    engine.run_trade(direction, &amount, &slippage),
                )
                .await;
            if result.is_ok() {
                engine.refresh().await;
            }
            result
        });

        task.await
            .map_err(|e| EngineError::Internal(format!("trade task failed: {e}")))?
    }

    async fn run_trade(
        &self,
        direction: TradeDirection,
        amount: &str,
        slippage: &str,
    ) -> EngineResult<TradeReceipt> {
        let (backend, known_token_balance) = self
            .wallet
            .read()
            .await
            .as_ref()
            .map(|s| (s.backend.clone(), s.balances.token))
            .ok_or(EngineError::WalletNotConnected)?;

        let (token, route) = {
            let market = self.market.read().await;
            let token = market
                .token
                .clone()
                .ok_or_else(|| EngineError::InvalidTrade("no token loaded".to_string()))?;
            (token, market.route.clone().unwrap_or_else(LiquidityRoute::none))
        };

        // A sell against a balance already known to be zero never reaches the chain.
        if direction == TradeDirection::Sell {
            if let Some((held, balance)) = known_token_balance {
                if held == token.address && balance.is_zero() {
                    return Err(EngineError::InsufficientBalance(format!(
                        "no {} to sell",
                        token.symbol
                    )));
                }
            }
        }

        let request = TradeRequest::from_input(direction, amount, slippage, token, route)?;
        let cancel = CancellationToken::new();
        self.executor
            .execute(backend.as_ref(), request, &cancel)
            .await
    }

    /// Cancel the in-flight trade if it has not been broadcast yet.
    pub async fn cancel_trade(&self) -> bool {
        self.executor.cancel_pending()
    }

    // ========== Refresh & snapshot ==========

    /// Refresh prices and balances. Failures keep previous values.
    pub async fn refresh(&self) {
        self.oracle.native_usd(self.chain.as_ref()).await;

        let (token, route) = {
            let market = self.market.read().await;
            (market.token.clone(), market.route.clone())
        };
        if let (Some(token), Some(route)) = (token, route) {
            let price = self.token_price(&token, &route).await;
            let mut market = self.market.write().await;
            if market.token.as_ref().map(|t| t.address) == Some(token.address) {
                market.token_price_usd = price;
            }
        }

        self.refresh_balances().await;
    }

    async fn refresh_balances(&self) {
        let Some(address) = self.wallet.read().await.as_ref().map(|s| s.address) else {
            return;
        };
        let token = self.market.read().await.token.as_ref().map(|t| t.address);

        let native = self.chain.native_balance_of(address).await;
        let token_balance = match token {
            Some(token) => Some(
                self.chain
                    .token_balance_of(token, address)
                    .await
                    .map(|b| (token, b)),
            ),
            None => None,
        };

        let mut wallet = self.wallet.write().await;
        let Some(session) = wallet.as_mut().filter(|s| s.address == address) else {
            return;
        };
        match native {
            Ok(balance) => session.balances.native = Some(balance),
            Err(e) => tracing::warn!(address = %address, error = %e, "Native balance refresh failed"),
        }
        match token_balance {
            Some(Ok(balance)) => session.balances.token = Some(balance),
            Some(Err(e)) => tracing::warn!(address = %address, error = %e, "Token balance refresh failed"),
            None => session.balances.token = None,
        }
        session.balances.updated_at = Some(Utc::now());
    }

    /// Current state for rendering. Performs no network I/O.
    pub async fn snapshot(&self) -> EngineSnapshot {
        let native_price_usd = self
            .oracle
            .last_native_usd()
            .await
            .map(|s| s.usd)
            .unwrap_or(0.0);

        let (token, route, token_price_usd) = {
            let market = self.market.read().await;
            (market.token.clone(), market.route.clone(), market.token_price_usd)
        };

        let mut wallet_status = WalletStatus {
            stored: self.has_stored_wallet(),
            ..WalletStatus::default()
        };
        if let Some(session) = self.wallet.read().await.as_ref() {
            wallet_status.connected = true;
            wallet_status.address = Some(session.address.to_string());
            wallet_status.balances_updated_at = session.balances.updated_at;
            wallet_status.native_balance = session.balances.native.map(|raw| {
                valued(
                    raw,
                    self.network.native_symbol,
                    NATIVE_DECIMALS,
                    native_price_usd,
                )
            });
            wallet_status.token_balance = match (&token, session.balances.token) {
                (Some(t), Some((addr, raw))) if t.address == addr => {
                    Some(valued(raw, &t.symbol, t.decimals, token_price_usd))
                }
                _ => None,
            };
        }

        EngineSnapshot {
            network: self.network.name.to_string(),
            chain_id: self.network.chain_id,
            token,
            route,
            native_price_usd,
            native_price_display: format_fiat(native_price_usd),
            token_price_usd,
            token_price_display: format_fiat(token_price_usd),
            wallet: wallet_status,
            operations: self.operations.read().await.clone(),
            last_trade_event: self.executor.last_event(),
        }
    }
}

fn valued(raw: U256, symbol: &str, decimals: u8, unit_price_usd: f64) -> ValuedBalance {
    let value_usd = to_f64(raw, decimals) * unit_price_usd;
    ValuedBalance {
        balance: TokenBalance {
            symbol: symbol.to_string(),
            balance_raw: raw.to_string(),
            balance_formatted: format_amount_display(raw, decimals),
            decimals,
        },
        value_usd,
        value_display: format_fiat(value_usd),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::BASE_MAINNET;
    use crate::error::EngineError;
    use crate::liquidity::{AmmFamily, PoolProbe};
    use crate::pricing::PoolReserves;
    use crate::test_utils::{test_engine, MockChain, TEST_KEY, TOKEN, WALLET};
    use crate::trading::TradeState;
    use alloy::primitives::address;
    use tempfile::TempDir;

    const POOL: Address = address!("0x00000000000000000000000000000000000000a1");

    fn ether(n: u64) -> U256 {
        U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
    }

    fn z(s: &str) -> Zeroizing<String> {
        Zeroizing::new(s.to_string())
    }

    fn liquid_chain() -> MockChain {
        let chain = MockChain::new();
        chain.set_pool(PoolProbe::Classic, POOL, ether(10));
        chain.set_native_usd(2_000_00000000, 8);
        chain.set_reserves(
            POOL,
            PoolReserves {
                token0: TOKEN,
                reserve0: ether(10_000),
                reserve1: ether(10),
            },
        );
        chain.set_native_balance(ether(1));
        chain.set_token_balance(ether(250));
        chain
    }

    #[test]
    fn extracts_checksummed_address_from_text() {
        let addr = extract_token_address(
            "https://dexscreener.com/base/0x833589fcd6edb6e08f4c7c32d4f71b54bda02913?ref=x",
        )
        .unwrap();
        assert_eq!(
            addr.to_string(),
            "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"
        );
    }

    #[test]
    fn text_without_address_fails() {
        assert_eq!(
            extract_token_address("not a token").unwrap_err(),
            EngineError::NoAddressFound
        );
        // 64-hex hashes are not addresses
        let tx_hash = format!("0x{}", "ab".repeat(32));
        assert_eq!(
            extract_token_address(&tx_hash).unwrap_err(),
            EngineError::NoAddressFound
        );
    }

    #[tokio::test]
    async fn fetch_token_resolves_route_and_price() {
        let dir = TempDir::new().unwrap();
        let engine = test_engine(liquid_chain(), dir.path());

        let view = engine.fetch_token(&format!("{TOKEN}")).await.unwrap();

        assert_eq!(view.route.family, AmmFamily::ClassicV2);
        assert!(view.route.has_liquidity);
        // 10 native per 10,000 tokens at $2,000
        assert!((view.price_usd - 2.0).abs() < 1e-9);
        assert_eq!(view.price_display, "$2.00");

        let snapshot = engine.snapshot().await;
        assert_eq!(snapshot.token.unwrap().address, TOKEN);
        assert_eq!(snapshot.route.unwrap().pair_address, Some(POOL));
        assert!(!snapshot.operations.fetch.loading);
        assert!(snapshot.operations.fetch.error.is_none());
    }

    #[tokio::test]
    async fn fetch_records_error_state() {
        let dir = TempDir::new().unwrap();
        let engine = test_engine(MockChain::new(), dir.path());

        let err = engine.fetch_token("hello").await.unwrap_err();
        assert_eq!(err, EngineError::NoAddressFound);

        let snapshot = engine.snapshot().await;
        assert_eq!(
            snapshot.operations.fetch.error_code.as_deref(),
            Some("no_address_found")
        );
    }

    #[tokio::test]
    async fn token_metadata_is_cached() {
        let dir = TempDir::new().unwrap();
        let chain = liquid_chain();
        let engine = test_engine(chain.clone(), dir.path());

        engine.fetch_token(&TOKEN.to_string()).await.unwrap();
        engine.fetch_token(&TOKEN.to_string()).await.unwrap();

        assert_eq!(chain.descriptor_reads(), 1);
    }

    #[tokio::test]
    async fn reset_clears_token() {
        let dir = TempDir::new().unwrap();
        let engine = test_engine(liquid_chain(), dir.path());
        engine.fetch_token(&TOKEN.to_string()).await.unwrap();

        engine.reset().await;

        let snapshot = engine.snapshot().await;
        assert!(snapshot.token.is_none());
        assert!(snapshot.route.is_none());
        assert_eq!(snapshot.token_price_display, "$0.00");
    }

    #[tokio::test]
    async fn connect_persists_blob_and_unlock_restores_session() {
        let dir = TempDir::new().unwrap();
        let engine = test_engine(liquid_chain(), dir.path());
        assert!(!engine.has_stored_wallet());

        let address = engine.connect(z(TEST_KEY), z("pw")).await.unwrap();
        assert_eq!(address, WALLET);
        assert!(engine.has_stored_wallet());

        let snapshot = engine.snapshot().await;
        assert!(snapshot.wallet.connected);
        assert_eq!(
            snapshot.wallet.native_balance.unwrap().balance.balance_formatted,
            "1"
        );

        assert!(engine.disconnect().await);
        assert!(!engine.snapshot().await.wallet.connected);

        assert_eq!(
            engine.unlock(z("wrong")).await.unwrap_err(),
            EngineError::InvalidPassword
        );
        assert_eq!(engine.unlock(z("pw")).await.unwrap(), WALLET);
    }

    #[tokio::test]
    async fn malformed_key_is_rejected_without_persisting() {
        let dir = TempDir::new().unwrap();
        let engine = test_engine(MockChain::new(), dir.path());

        let err = engine.connect(z("0x1234"), z("pw")).await.unwrap_err();

        assert_eq!(err, EngineError::InvalidKeyFormat);
        assert!(!engine.has_stored_wallet());
        assert_eq!(
            engine.snapshot().await.operations.connect.error_code.as_deref(),
            Some("invalid_key_format")
        );
    }

    #[tokio::test]
    async fn unlock_without_blob_fails() {
        let dir = TempDir::new().unwrap();
        let engine = test_engine(MockChain::new(), dir.path());
        assert_eq!(
            engine.unlock(z("pw")).await.unwrap_err(),
            EngineError::NoStoredWallet
        );
    }

    #[tokio::test]
    async fn forget_wallet_removes_blob() {
        let dir = TempDir::new().unwrap();
        let engine = test_engine(liquid_chain(), dir.path());
        engine.connect(z(TEST_KEY), z("pw")).await.unwrap();

        engine.forget_wallet().await.unwrap();

        assert!(!engine.has_stored_wallet());
        assert!(!engine.snapshot().await.wallet.connected);
    }

    #[tokio::test]
    async fn trade_requires_wallet_and_token() {
        let dir = TempDir::new().unwrap();
        let engine = test_engine(liquid_chain(), dir.path());

        assert_eq!(
            engine.trade(TradeDirection::Buy, "0.1", "15").await.unwrap_err(),
            EngineError::WalletNotConnected
        );

        engine.connect(z(TEST_KEY), z("pw")).await.unwrap();
        assert!(matches!(
            engine.trade(TradeDirection::Buy, "0.1", "15").await.unwrap_err(),
            EngineError::InvalidTrade(_)
        ));
    }

    #[tokio::test]
    async fn buy_through_facade_settles_and_refreshes() {
        let dir = TempDir::new().unwrap();
        let chain = liquid_chain();
        chain.set_quote(U256::from(90_000u64));
        let engine = test_engine(chain.clone(), dir.path());
        let mut events = engine.subscribe();

        engine.connect(z(TEST_KEY), z("pw")).await.unwrap();
        engine.fetch_token(&TOKEN.to_string()).await.unwrap();
        let receipt = engine.trade(TradeDirection::Buy, "0.1", "15").await.unwrap();

        assert_eq!(receipt.min_amount_out, "76500");
        let mut last = None;
        while let Ok(event) = events.try_recv() {
            last = Some(event.state);
        }
        assert_eq!(last, Some(TradeState::Settled));

        let snapshot = engine.snapshot().await;
        assert_eq!(
            snapshot.last_trade_event.map(|e| e.state),
            Some(TradeState::Settled)
        );
        assert!(!snapshot.operations.trade.loading);
        assert_eq!(
            snapshot.wallet.token_balance.unwrap().balance.balance_formatted,
            "250"
        );
    }

    #[tokio::test]
    async fn trade_on_illiquid_token_fails_with_no_liquidity() {
        let dir = TempDir::new().unwrap();
        let chain = MockChain::new();
        chain.set_native_balance(ether(1));
        let engine = test_engine(chain, dir.path());

        engine.connect(z(TEST_KEY), z("pw")).await.unwrap();
        let view = engine.fetch_token(&TOKEN.to_string()).await.unwrap();
        assert!(!view.route.has_liquidity);

        assert_eq!(
            engine.trade(TradeDirection::Buy, "0.1", "15").await.unwrap_err(),
            EngineError::NoLiquidity
        );
    }

    #[tokio::test]
    async fn concurrent_trade_is_rejected() {
        let dir = TempDir::new().unwrap();
        let engine = test_engine(liquid_chain(), dir.path());
        let _held = engine.trade_lock.clone().try_lock_owned().unwrap();

        assert_eq!(
            engine.trade(TradeDirection::Buy, "0.1", "15").await.unwrap_err(),
            EngineError::TradeInProgress
        );
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_trade_still_settles() {
        let dir = TempDir::new().unwrap();
        let chain = liquid_chain();
        chain.set_inclusion_delay(Duration::from_secs(5));
        let engine = test_engine(chain.clone(), dir.path());

        engine.connect(z(TEST_KEY), z("pw")).await.unwrap();
        engine.fetch_token(&TOKEN.to_string()).await.unwrap();

        // Caller gives up while the swap is waiting for inclusion
        let abandoned = tokio::time::timeout(
            Duration::from_secs(1),
            engine.trade(TradeDirection::Buy, "0.1", "15"),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(chain.sent().len(), 1);
        assert!(!engine.cancel_trade().await);

        tokio::time::sleep(Duration::from_secs(60)).await;

        let snapshot = engine.snapshot().await;
        assert_eq!(
            snapshot.last_trade_event.map(|e| e.state),
            Some(TradeState::Settled)
        );
        assert!(!snapshot.operations.trade.loading);
        assert!(engine.trade_lock.clone().try_lock_owned().is_ok());
        assert_eq!(chain.sent().len(), 1);
    }

    #[tokio::test]
    async fn sell_of_known_zero_balance_makes_no_calls() {
        let dir = TempDir::new().unwrap();
        let chain = liquid_chain();
        chain.set_token_balance(U256::ZERO);
        chain.set_native_balance(U256::ZERO);
        let engine = test_engine(chain.clone(), dir.path());

        engine.connect(z(TEST_KEY), z("pw")).await.unwrap();
        engine.fetch_token(&TOKEN.to_string()).await.unwrap();

        let err = engine
            .trade(TradeDirection::Sell, "1", "15")
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::InsufficientBalance(_)));
        assert!(chain.calls().is_empty());
        assert!(chain.sent().is_empty());
        assert_eq!(
            engine.snapshot().await.operations.trade.error_code.as_deref(),
            Some("insufficient_balance")
        );
    }

    #[tokio::test]
    async fn cancel_without_trade_is_noop() {
        let dir = TempDir::new().unwrap();
        let engine = test_engine(MockChain::new(), dir.path());
        assert!(!engine.cancel_trade().await);
    }

    #[tokio::test]
    async fn refresh_without_network_keeps_going() {
        let dir = TempDir::new().unwrap();
        let chain = MockChain::new();
        chain.fail_all_reads();
        let engine = test_engine(chain, dir.path());

        engine.refresh().await;
        let snapshot = engine.snapshot().await;
        assert_eq!(snapshot.native_price_display, "$0.00");
        assert_eq!(snapshot.network, BASE_MAINNET.name);
    }
}
