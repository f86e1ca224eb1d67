// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Buy/sell execution.
//!
//! A trade moves strictly forward through [`TradeState`]:
//!
//! ```text
//! Idle -> Validating -> EnsuringApproval (sell) -> EstimatingMinimumOutput
//!      -> EstimatingGas -> Broadcasting -> Confirming -> Settled | Failed
//! ```
//!
//! Chain access goes through [`TradeBackend`], bound to one signing wallet.

pub mod calls;
pub mod executor;
pub mod types;

use alloy::{
    primitives::{Address, TxHash, U256},
    rpc::types::TransactionRequest,
};
use async_trait::async_trait;

use crate::error::EngineResult;
use crate::liquidity::LiquidityRoute;

pub use executor::{minimum_output, TradeExecutor, APPROVAL_THRESHOLD, MIN_GAS_RESERVE_WEI};
pub use types::{
    FeeData, Inclusion, SwapLeg, TradeDirection, TradeEvent, TradeReceipt, TradeRequest,
    TradeState,
};

/// Chain operations for one connected wallet.
///
/// Reads may go through the endpoint pool; `send` and
/// `wait_for_inclusion` use the dedicated signing endpoint.
#[async_trait]
pub trait TradeBackend: Send + Sync {
    fn wallet(&self) -> Address;

    async fn native_balance(&self) -> EngineResult<U256>;

    async fn token_balance(&self, token: Address) -> EngineResult<U256>;

    async fn allowance(&self, token: Address, spender: Address) -> EngineResult<U256>;

    /// Expected output of swapping `amount_in` along `leg` on `route`.
    async fn quote(&self, route: &LiquidityRoute, leg: SwapLeg, amount_in: U256) -> EngineResult<U256>;

    /// Simulated gas units for `tx`.
    async fn estimate_gas(&self, tx: &TransactionRequest) -> EngineResult<u64>;

    /// Fee suggestion from the endpoint, before the fee policy applies.
    async fn suggested_fees(&self) -> EngineResult<FeeData>;

    /// Sign and submit.
    async fn send(&self, tx: TransactionRequest) -> EngineResult<TxHash>;

    /// Block until `tx_hash` is included.
    async fn wait_for_inclusion(&self, tx_hash: TxHash) -> EngineResult<Inclusion>;
}
