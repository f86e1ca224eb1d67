// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Engine error taxonomy and its HTTP mapping.
//!
//! Safety-relevant operations (trade execution, key decryption) return
//! [`EngineResult`]. Advisory reads (prices, display balances) never surface
//! these errors; they degrade to cached or zero values instead.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Errors surfaced by the trading engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// Every configured read endpoint failed or timed out.
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("Invalid private key format (expected 64 hex characters, optional 0x prefix)")]
    InvalidKeyFormat,

    #[error("Invalid password or corrupted key blob")]
    InvalidPassword,

    #[error("No token address found in input")]
    NoAddressFound,

    #[error("No liquidity available for this token")]
    NoLiquidity,

    #[error("Insufficient native balance for gas: have {available}, need {required}")]
    InsufficientGas { available: String, required: String },

    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),

    #[error("Token approval failed: {0}")]
    ApprovalFailed(String),

    #[error("Transaction reverted{}: {reason}", hash_suffix(.tx_hash))]
    TransactionReverted {
        tx_hash: Option<String>,
        reason: String,
    },

    #[error("No wallet connected")]
    WalletNotConnected,

    #[error("No stored wallet found")]
    NoStoredWallet,

    #[error("Invalid trade request: {0}")]
    InvalidTrade(String),

    #[error("Another trade is already in progress for this wallet")]
    TradeInProgress,

    #[error("Trade cancelled before broadcast")]
    TradeCancelled,

    #[error("Contract call failed: {0}")]
    Contract(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Stable machine-readable code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            EngineError::NetworkUnavailable(_) => "network_unavailable",
            EngineError::InvalidKeyFormat => "invalid_key_format",
            EngineError::InvalidPassword => "invalid_password",
            EngineError::NoAddressFound => "no_address_found",
            EngineError::NoLiquidity => "no_liquidity",
            EngineError::InsufficientGas { .. } => "insufficient_gas",
            EngineError::InsufficientBalance(_) => "insufficient_balance",
            EngineError::ApprovalFailed(_) => "approval_failed",
            EngineError::TransactionReverted { .. } => "transaction_reverted",
            EngineError::WalletNotConnected => "wallet_not_connected",
            EngineError::NoStoredWallet => "no_stored_wallet",
            EngineError::InvalidTrade(_) => "invalid_trade",
            EngineError::TradeInProgress => "trade_in_progress",
            EngineError::TradeCancelled => "trade_cancelled",
            EngineError::Contract(_) => "contract_error",
            EngineError::Storage(_) => "storage_error",
            EngineError::Config(_) => "config_error",
            EngineError::Internal(_) => "internal_error",
        }
    }

    /// HTTP status used when this error reaches the API surface.
    pub fn status_code(&self) -> StatusCode {
        match self {
            EngineError::NetworkUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::InvalidKeyFormat
            | EngineError::NoAddressFound
            | EngineError::InvalidTrade(_) => StatusCode::BAD_REQUEST,
            EngineError::InvalidPassword => StatusCode::UNAUTHORIZED,
            EngineError::WalletNotConnected | EngineError::NoStoredWallet => {
                StatusCode::PRECONDITION_FAILED
            }
            EngineError::TradeInProgress => StatusCode::CONFLICT,
            EngineError::NoLiquidity
            | EngineError::InsufficientGas { .. }
            | EngineError::InsufficientBalance(_)
            | EngineError::ApprovalFailed(_)
            | EngineError::TransactionReverted { .. }
            | EngineError::TradeCancelled
            | EngineError::Contract(_) => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::Storage(_) | EngineError::Config(_) | EngineError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

fn hash_suffix(tx_hash: &Option<String>) -> String {
    tx_hash
        .as_deref()
        .map(|h| format!(" ({h})"))
        .unwrap_or_default()
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    error_code: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        Self::new(e.status_code(), e.error_code(), e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            error_code: self.code.to_string(),
        });
        (self.status, body).into_response()
    }
}
