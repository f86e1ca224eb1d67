// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Hot-wallet endpoints.
//!
//! Raw keys and passwords are moved into zeroizing buffers as soon as the
//! request body is parsed and are never logged or echoed back.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use zeroize::Zeroizing;

use crate::{error::ApiError, state::AppState};

/// Import a raw private key.
#[derive(Deserialize, ToSchema)]
pub struct ConnectWalletRequest {
    /// 64 hex characters, optional `0x` prefix
    pub private_key: String,
    /// Password the key is encrypted under at rest
    pub password: String,
}

/// Unlock the stored key.
#[derive(Deserialize, ToSchema)]
pub struct UnlockWalletRequest {
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WalletAddressResponse {
    /// Checksummed wallet address
    pub address: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StoredWalletResponse {
    /// An encrypted key blob exists
    pub stored: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DisconnectResponse {
    /// A session was active and has ended
    pub disconnected: bool,
}

/// Whether an encrypted key is stored.
#[utoipa::path(
    get,
    path = "/v1/wallet/stored",
    tag = "Wallet",
    responses(
        (status = 200, description = "Stored key status", body = StoredWalletResponse)
    )
)]
pub async fn stored_wallet(State(state): State<AppState>) -> Json<StoredWalletResponse> {
    Json(StoredWalletResponse {
        stored: state.engine.has_stored_wallet(),
    })
}

/// Encrypt and store a raw key, then start a session.
#[utoipa::path(
    post,
    path = "/v1/wallet/connect",
    tag = "Wallet",
    request_body = ConnectWalletRequest,
    responses(
        (status = 200, description = "Wallet connected", body = WalletAddressResponse),
        (status = 400, description = "Malformed private key"),
        (status = 500, description = "Key could not be stored")
    )
)]
pub async fn connect_wallet(
    State(state): State<AppState>,
    Json(request): Json<ConnectWalletRequest>,
) -> Result<Json<WalletAddressResponse>, ApiError> {
    let ConnectWalletRequest {
        private_key,
        password,
    } = request;
    let address = state
        .engine
        .connect(Zeroizing::new(private_key), Zeroizing::new(password))
        .await?;
    Ok(Json(WalletAddressResponse {
        address: address.to_string(),
    }))
}

/// Decrypt the stored key and start a session.
#[utoipa::path(
    post,
    path = "/v1/wallet/unlock",
    tag = "Wallet",
    request_body = UnlockWalletRequest,
    responses(
        (status = 200, description = "Wallet unlocked", body = WalletAddressResponse),
        (status = 401, description = "Wrong password or corrupted blob"),
        (status = 412, description = "No stored wallet")
    )
)]
pub async fn unlock_wallet(
    State(state): State<AppState>,
    Json(request): Json<UnlockWalletRequest>,
) -> Result<Json<WalletAddressResponse>, ApiError> {
    let address = state
        .engine
        .unlock(Zeroizing::new(request.password))
        .await?;
    Ok(Json(WalletAddressResponse {
        address: address.to_string(),
    }))
}

/// End the session. The stored key is kept.
#[utoipa::path(
    post,
    path = "/v1/wallet/disconnect",
    tag = "Wallet",
    responses(
        (status = 200, description = "Session ended", body = DisconnectResponse)
    )
)]
pub async fn disconnect_wallet(State(state): State<AppState>) -> Json<DisconnectResponse> {
    Json(DisconnectResponse {
        disconnected: state.engine.disconnect().await,
    })
}

/// Disconnect and delete the stored key.
#[utoipa::path(
    delete,
    path = "/v1/wallet",
    tag = "Wallet",
    responses(
        (status = 204, description = "Stored key removed"),
        (status = 500, description = "Key file could not be removed")
    )
)]
pub async fn forget_wallet(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.engine.forget_wallet().await?;
    Ok(StatusCode::NO_CONTENT)
}
