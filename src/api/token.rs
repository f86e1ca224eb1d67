// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token loading and engine snapshot endpoints.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    error::ApiError,
    session::{EngineSnapshot, TokenView},
    state::AppState,
};

/// Request to load a token.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct FetchTokenRequest {
    /// Token address, explorer URL or any text containing an address.
    pub reference: String,
}

/// Current engine state.
///
/// Served from memory; never touches the network.
#[utoipa::path(
    get,
    path = "/v1/snapshot",
    tag = "Token",
    responses(
        (status = 200, description = "Engine snapshot", body = EngineSnapshot)
    )
)]
pub async fn get_snapshot(State(state): State<AppState>) -> Json<EngineSnapshot> {
    Json(state.engine.snapshot().await)
}

/// Load a token and discover where it trades.
///
/// A token without liquidity still loads; its route reports
/// `has_liquidity: false`.
#[utoipa::path(
    post,
    path = "/v1/token",
    tag = "Token",
    request_body = FetchTokenRequest,
    responses(
        (status = 200, description = "Token loaded", body = TokenView),
        (status = 400, description = "No address found in reference"),
        (status = 503, description = "Network unavailable")
    )
)]
pub async fn fetch_token(
    State(state): State<AppState>,
    Json(request): Json<FetchTokenRequest>,
) -> Result<Json<TokenView>, ApiError> {
    let view = state.engine.fetch_token(&request.reference).await?;
    Ok(Json(view))
}

/// Forget the current token and route.
#[utoipa::path(
    post,
    path = "/v1/token/reset",
    tag = "Token",
    responses(
        (status = 204, description = "Token cleared")
    )
)]
pub async fn reset_token(State(state): State<AppState>) -> StatusCode {
    state.engine.reset().await;
    StatusCode::NO_CONTENT
}
