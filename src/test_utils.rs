// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory chain used by unit tests.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use alloy::{
    primitives::{address, Address, TxHash, B256, I256, U256},
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
};
use async_trait::async_trait;

use crate::blockchain::fees::FeePolicy;
use crate::blockchain::{TokenDescriptor, BASE_MAINNET};
use crate::error::{EngineError, EngineResult};
use crate::liquidity::{LiquidityRoute, PoolDirectory, PoolProbe};
use crate::pricing::{FeedAnswer, PoolReserves, PoolSqrtPrice, PriceSource};
use crate::session::{ChainAccess, Engine, EngineSettings};
use crate::trading::{FeeData, Inclusion, SwapLeg, TradeBackend};

pub const TOKEN: Address = address!("0x1000000000000000000000000000000000000001");
pub const WETH: Address = BASE_MAINNET.wrapped_native;
/// Address of [`TEST_KEY`].
pub const WALLET: Address = address!("0x2c7536E3605D9C16a7a3D7b1898e529396a65c23");
pub const TEST_KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

#[derive(Debug)]
struct MockState {
    reads_fail: bool,
    pools: Vec<(PoolProbe, Address, U256)>,
    failing_probes: Vec<PoolProbe>,
    probes: Vec<PoolProbe>,
    feed: Option<FeedAnswer>,
    feed_reads: usize,
    reserves: HashMap<Address, PoolReserves>,
    sqrt_prices: HashMap<Address, PoolSqrtPrice>,
    descriptor_reads: usize,
    native_balance: U256,
    token_balance: U256,
    allowance: U256,
    quote: U256,
    quoted_amounts: Vec<U256>,
    gas_estimate: Option<u64>,
    inclusion_success: VecDeque<bool>,
    inclusion_delay: Option<Duration>,
    revert_reason: Option<String>,
    calls: Vec<&'static str>,
    sent: Vec<TransactionRequest>,
    hashes: Vec<TxHash>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            reads_fail: false,
            pools: Vec::new(),
            failing_probes: Vec::new(),
            probes: Vec::new(),
            feed: None,
            feed_reads: 0,
            reserves: HashMap::new(),
            sqrt_prices: HashMap::new(),
            descriptor_reads: 0,
            native_balance: U256::ZERO,
            token_balance: U256::ZERO,
            allowance: U256::ZERO,
            quote: U256::from(1_000u64),
            quoted_amounts: Vec::new(),
            gas_estimate: Some(200_000),
            inclusion_success: VecDeque::new(),
            inclusion_delay: None,
            revert_reason: None,
            calls: Vec::new(),
            sent: Vec::new(),
            hashes: Vec::new(),
        }
    }
}

/// Scriptable chain implementing every engine seam. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockChain {
    state: Arc<Mutex<MockState>>,
}

fn offline<T>() -> EngineResult<T> {
    Err(EngineError::NetworkUnavailable("mock: reads disabled".into()))
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn fail_all_reads(&self) {
        self.state().reads_fail = true;
    }

    pub fn restore_reads(&self) {
        self.state().reads_fail = false;
    }

    pub fn set_pool(&self, probe: PoolProbe, pool: Address, wrapped_native: U256) {
        self.state().pools.push((probe, pool, wrapped_native));
    }

    pub fn fail_probe(&self, probe: PoolProbe) {
        self.state().failing_probes.push(probe);
    }

    pub fn probes(&self) -> Vec<PoolProbe> {
        self.state().probes.clone()
    }

    pub fn set_native_usd(&self, answer: i64, decimals: u8) {
        self.state().feed = Some(FeedAnswer {
            answer: I256::try_from(answer).unwrap(),
            decimals,
        });
    }

    pub fn feed_reads(&self) -> usize {
        self.state().feed_reads
    }

    pub fn set_reserves(&self, pool: Address, reserves: PoolReserves) {
        self.state().reserves.insert(pool, reserves);
    }

    pub fn set_sqrt_price(&self, pool: Address, price: PoolSqrtPrice) {
        self.state().sqrt_prices.insert(pool, price);
    }

    pub fn descriptor_reads(&self) -> usize {
        self.state().descriptor_reads
    }

    pub fn set_native_balance(&self, balance: U256) {
        self.state().native_balance = balance;
    }

    pub fn set_token_balance(&self, balance: U256) {
        self.state().token_balance = balance;
    }

    pub fn set_allowance(&self, allowance: U256) {
        self.state().allowance = allowance;
    }

    pub fn set_quote(&self, quote: U256) {
        self.state().quote = quote;
    }

    /// `None` makes gas simulation fail.
    pub fn set_gas_estimate(&self, gas: Option<u64>) {
        self.state().gas_estimate = gas;
    }

    /// Outcomes for successive inclusions; later ones succeed.
    pub fn set_inclusion_success(&self, outcomes: Vec<bool>) {
        self.state().inclusion_success = outcomes.into();
    }

    /// Inclusion waits take `delay` to return.
    pub fn set_inclusion_delay(&self, delay: Duration) {
        self.state().inclusion_delay = Some(delay);
    }

    /// Reason reported for reverted transactions.
    pub fn set_revert_reason(&self, reason: &str) {
        self.state().revert_reason = Some(reason.to_string());
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.state().calls.clone()
    }

    pub fn sent(&self) -> Vec<TransactionRequest> {
        self.state().sent.clone()
    }

    pub fn quoted_amounts(&self) -> Vec<U256> {
        self.state().quoted_amounts.clone()
    }

    pub fn last_tx_hash(&self) -> Option<TxHash> {
        self.state().hashes.last().copied()
    }
}

#[async_trait]
impl PoolDirectory for MockChain {
    async fn find_pool(&self, _token: Address, probe: PoolProbe) -> EngineResult<Address> {
        let mut state = self.state();
        state.probes.push(probe);
        if state.reads_fail || state.failing_probes.contains(&probe) {
            return offline();
        }
        Ok(state
            .pools
            .iter()
            .find(|(p, _, _)| *p == probe)
            .map(|(_, pool, _)| *pool)
            .unwrap_or(Address::ZERO))
    }

    async fn wrapped_native_balance(&self, pool: Address) -> EngineResult<U256> {
        let state = self.state();
        if state.reads_fail {
            return offline();
        }
        Ok(state
            .pools
            .iter()
            .find(|(_, p, _)| *p == pool)
            .map(|(_, _, balance)| *balance)
            .unwrap_or(U256::ZERO))
    }
}

#[async_trait]
impl PriceSource for MockChain {
    async fn native_usd_feed(&self) -> EngineResult<FeedAnswer> {
        let mut state = self.state();
        state.feed_reads += 1;
        if state.reads_fail {
            return offline();
        }
        state
            .feed
            .ok_or_else(|| EngineError::Contract("mock: no feed".into()))
    }

    async fn pool_reserves(&self, pool: Address) -> EngineResult<PoolReserves> {
        let state = self.state();
        if state.reads_fail {
            return offline();
        }
        state
            .reserves
            .get(&pool)
            .copied()
            .ok_or_else(|| EngineError::Contract("mock: no reserves".into()))
    }

    async fn pool_sqrt_price(&self, pool: Address) -> EngineResult<PoolSqrtPrice> {
        let state = self.state();
        if state.reads_fail {
            return offline();
        }
        state
            .sqrt_prices
            .get(&pool)
            .copied()
            .ok_or_else(|| EngineError::Contract("mock: no slot0".into()))
    }
}

#[async_trait]
impl ChainAccess for MockChain {
    async fn token_descriptor(&self, token: Address) -> EngineResult<TokenDescriptor> {
        let mut state = self.state();
        state.descriptor_reads += 1;
        if state.reads_fail {
            return offline();
        }
        Ok(TokenDescriptor::with_defaults(
            token,
            Some("Mock Token".into()),
            Some("MOCK".into()),
            Some(18),
        ))
    }

    async fn native_balance_of(&self, _owner: Address) -> EngineResult<U256> {
        let state = self.state();
        if state.reads_fail {
            return offline();
        }
        Ok(state.native_balance)
    }

    async fn token_balance_of(&self, _token: Address, _owner: Address) -> EngineResult<U256> {
        let state = self.state();
        if state.reads_fail {
            return offline();
        }
        Ok(state.token_balance)
    }

    fn trade_backend(&self, _signer: PrivateKeySigner) -> EngineResult<Arc<dyn TradeBackend>> {
        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl TradeBackend for MockChain {
    fn wallet(&self) -> Address {
        WALLET
    }

    async fn native_balance(&self) -> EngineResult<U256> {
        let mut state = self.state();
        state.calls.push("native_balance");
        Ok(state.native_balance)
    }

    async fn token_balance(&self, _token: Address) -> EngineResult<U256> {
        let mut state = self.state();
        state.calls.push("token_balance");
        Ok(state.token_balance)
    }

    async fn allowance(&self, _token: Address, _spender: Address) -> EngineResult<U256> {
        let mut state = self.state();
        state.calls.push("allowance");
        Ok(state.allowance)
    }

    async fn quote(
        &self,
        _route: &LiquidityRoute,
        _leg: SwapLeg,
        amount_in: U256,
    ) -> EngineResult<U256> {
        let mut state = self.state();
        state.calls.push("quote");
        state.quoted_amounts.push(amount_in);
        Ok(state.quote)
    }

    async fn estimate_gas(&self, _tx: &TransactionRequest) -> EngineResult<u64> {
        let mut state = self.state();
        state.calls.push("estimate_gas");
        state
            .gas_estimate
            .ok_or_else(|| EngineError::Contract("mock: execution reverted".into()))
    }

    async fn suggested_fees(&self) -> EngineResult<FeeData> {
        self.state().calls.push("suggested_fees");
        Ok(FeeData {
            max_fee_per_gas: 2_000_000_000,
            max_priority_fee_per_gas: 1_500_000_000,
        })
    }

    async fn send(&self, tx: TransactionRequest) -> EngineResult<TxHash> {
        let mut state = self.state();
        state.calls.push("send");
        state.sent.push(tx);
        let hash = B256::with_last_byte(state.sent.len() as u8);
        state.hashes.push(hash);
        Ok(hash)
    }

    async fn wait_for_inclusion(&self, tx_hash: TxHash) -> EngineResult<Inclusion> {
        let delay = {
            let mut state = self.state();
            state.calls.push("wait_for_inclusion");
            state.inclusion_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        let success = state.inclusion_success.pop_front().unwrap_or(true);
        Ok(Inclusion {
            tx_hash,
            block_number: Some(1),
            gas_used: 150_000,
            success,
            revert_reason: if success {
                None
            } else {
                state.revert_reason.clone()
            },
        })
    }
}

/// Engine over `chain` storing its key blob under `data_dir`.
pub fn test_engine(chain: MockChain, data_dir: &Path) -> Arc<Engine> {
    Engine::new(
        Arc::new(chain),
        EngineSettings {
            network: BASE_MAINNET,
            data_dir: data_dir.to_path_buf(),
            refresh_interval: Duration::from_secs(3600),
            fee_policy: FeePolicy::default(),
        },
    )
}
