// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Read-only views of engine state handed to the UI layer.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::blockchain::{TokenBalance, TokenDescriptor};
use crate::error::EngineError;
use crate::liquidity::LiquidityRoute;
use crate::trading::TradeEvent;

/// Loading/error state of one user-facing operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct OperationStatus {
    pub loading: bool,
    pub error: Option<String>,
    pub error_code: Option<String>,
}

impl OperationStatus {
    pub fn loading() -> Self {
        Self {
            loading: true,
            ..Self::default()
        }
    }

    pub fn failed(error: &EngineError) -> Self {
        Self {
            loading: false,
            error: Some(error.to_string()),
            error_code: Some(error.error_code().to_string()),
        }
    }
}

/// Operations whose progress the UI renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Fetch,
    Connect,
    Unlock,
    Trade,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct Operations {
    pub fetch: OperationStatus,
    pub connect: OperationStatus,
    pub unlock: OperationStatus,
    pub trade: OperationStatus,
}

impl Operations {
    pub fn get_mut(&mut self, op: Operation) -> &mut OperationStatus {
        match op {
            Operation::Fetch => &mut self.fetch,
            Operation::Connect => &mut self.connect,
            Operation::Unlock => &mut self.unlock,
            Operation::Trade => &mut self.trade,
        }
    }
}

/// Result of loading a token.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TokenView {
    pub token: TokenDescriptor,
    pub route: LiquidityRoute,
    pub price_usd: f64,
    /// e.g. "$1.23K"
    pub price_display: String,
}

/// A balance with its fiat value.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ValuedBalance {
    #[serde(flatten)]
    pub balance: TokenBalance,
    pub value_usd: f64,
    pub value_display: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct WalletStatus {
    /// An encrypted key blob is persisted
    pub stored: bool,
    pub connected: bool,
    pub address: Option<String>,
    pub native_balance: Option<ValuedBalance>,
    pub token_balance: Option<ValuedBalance>,
    pub balances_updated_at: Option<DateTime<Utc>>,
}

/// Everything the UI needs to render, in one read.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct EngineSnapshot {
    pub network: String,
    pub chain_id: u64,
    pub token: Option<TokenDescriptor>,
    pub route: Option<LiquidityRoute>,
    pub native_price_usd: f64,
    pub native_price_display: String,
    pub token_price_usd: f64,
    pub token_price_display: String,
    pub wallet: WalletStatus,
    pub operations: Operations,
    /// Most recent trade progress event
    pub last_trade_event: Option<TradeEvent>,
}
