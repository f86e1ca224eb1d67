// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Trade request, progress and outcome types.

use alloy::primitives::{Address, TxHash, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::blockchain::TokenDescriptor;
use crate::error::{EngineError, EngineResult};
use crate::liquidity::LiquidityRoute;

/// Accepted slippage range for user input, in whole percent.
pub const SLIPPAGE_RANGE: std::ops::RangeInclusive<u32> = 1..=50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TradeDirection {
    /// Native asset in, token out
    Buy,
    /// Token in, native asset out
    Sell,
}

/// One user trade, consumed once by the executor.
#[derive(Debug, Clone)]
pub struct TradeRequest {
    pub direction: TradeDirection,
    /// Human-entered amount of the input asset
    pub amount: String,
    pub slippage_percent: u32,
    pub token: TokenDescriptor,
    /// Route in effect when the request was made
    pub route: LiquidityRoute,
}

impl TradeRequest {
    /// Build a request from form input, parsing the slippage string.
    pub fn from_input(
        direction: TradeDirection,
        amount: impl Into<String>,
        slippage: &str,
        token: TokenDescriptor,
        route: LiquidityRoute,
    ) -> EngineResult<Self> {
        let slippage_percent: u32 = slippage
            .trim()
            .trim_end_matches('%')
            .parse()
            .map_err(|_| EngineError::InvalidTrade(format!("invalid slippage `{slippage}`")))?;
        if !SLIPPAGE_RANGE.contains(&slippage_percent) {
            return Err(EngineError::InvalidTrade(format!(
                "slippage must be between {}% and {}%",
                SLIPPAGE_RANGE.start(),
                SLIPPAGE_RANGE.end()
            )));
        }

        Ok(Self {
            direction,
            amount: amount.into(),
            slippage_percent,
            token,
            route,
        })
    }
}

/// Executor state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TradeState {
    Idle,
    Validating,
    /// Sell only
    EnsuringApproval,
    EstimatingMinimumOutput,
    EstimatingGas,
    Broadcasting,
    Confirming,
    Settled,
    Failed,
}

impl TradeState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TradeState::Settled | TradeState::Failed)
    }
}

/// Progress notification published on every transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TradeEvent {
    pub trade_id: Uuid,
    pub state: TradeState,
    /// Set once the swap is broadcast
    pub tx_hash: Option<String>,
    /// Error text for `failed`, inclusion details for `settled`
    pub detail: Option<String>,
    pub at: DateTime<Utc>,
}

/// Suggested or final EIP-1559 fee parameters, in wei.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeData {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

/// Result of waiting for a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inclusion {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    pub success: bool,
    /// Decoded revert message of a failed transaction, when the chain gives one
    pub revert_reason: Option<String>,
}

/// Input and output legs of a swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapLeg {
    pub token_in: Address,
    pub token_out: Address,
}

/// A settled trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TradeReceipt {
    pub trade_id: Uuid,
    pub direction: TradeDirection,
    pub tx_hash: String,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    /// Input actually spent, smallest units
    pub amount_in: String,
    pub quoted_out: String,
    pub min_amount_out: String,
    /// True when a sell was reduced to the full token balance
    pub clamped: bool,
}

impl TradeReceipt {
    pub(crate) fn new(
        trade_id: Uuid,
        direction: TradeDirection,
        inclusion: &Inclusion,
        amount_in: U256,
        quoted_out: U256,
        min_amount_out: U256,
        clamped: bool,
    ) -> Self {
        Self {
            trade_id,
            direction,
            tx_hash: inclusion.tx_hash.to_string(),
            block_number: inclusion.block_number,
            gas_used: inclusion.gas_used,
            amount_in: amount_in.to_string(),
            quoted_out: quoted_out.to_string(),
            min_amount_out: min_amount_out.to_string(),
            clamped,
        }
    }
}
