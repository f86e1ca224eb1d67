// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Trade endpoints.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    error::ApiError,
    state::AppState,
    trading::{TradeDirection, TradeReceipt},
};

/// Buy or sell the loaded token.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TradeRequestBody {
    pub direction: TradeDirection,
    /// Human amount: native units for buys, token units for sells
    pub amount: String,
    /// Percent, 1 to 50; a trailing `%` is accepted
    #[serde(default = "default_slippage")]
    pub slippage: String,
}

fn default_slippage() -> String {
    "15".to_string()
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CancelTradeResponse {
    /// A trade was in flight, not yet broadcast, and has been signalled
    pub cancelled: bool,
}

/// Execute a trade and wait for it to settle.
///
/// The trade keeps running if the client disconnects; its outcome then shows
/// up in the snapshot.
#[utoipa::path(
    post,
    path = "/v1/trade",
    tag = "Trade",
    request_body = TradeRequestBody,
    responses(
        (status = 200, description = "Trade settled", body = TradeReceipt),
        (status = 400, description = "Invalid amount or slippage"),
        (status = 409, description = "Another trade is in progress"),
        (status = 412, description = "No wallet connected"),
        (status = 422, description = "Trade failed"),
        (status = 500, description = "Trade task aborted"),
        (status = 503, description = "Network unavailable")
    )
)]
pub async fn execute_trade(
    State(state): State<AppState>,
    Json(request): Json<TradeRequestBody>,
) -> Result<Json<TradeReceipt>, ApiError> {
    let receipt = state
        .engine
        .trade(request.direction, &request.amount, &request.slippage)
        .await?;
    Ok(Json(receipt))
}

/// Cancel the in-flight trade if it has not been broadcast yet.
#[utoipa::path(
    post,
    path = "/v1/trade/cancel",
    tag = "Trade",
    responses(
        (status = 200, description = "Cancellation signalled", body = CancelTradeResponse)
    )
)]
pub async fn cancel_trade(State(state): State<AppState>) -> Json<CancelTradeResponse> {
    Json(CancelTradeResponse {
        cancelled: state.engine.cancel_trade().await,
    })
}
