// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

/// Liveness response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    /// Target network name
    pub network: String,
    pub chain_id: u64,
}

/// Liveness probe.
///
/// Always returns 200 while the process is running; performs no chain I/O.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let network = state.engine.network();
    Json(HealthResponse {
        status: "ok".to_string(),
        network: network.name.to_string(),
        chain_id: network.chain_id,
    })
}
