// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    blockchain::{TokenBalance, TokenDescriptor},
    liquidity::{AmmFamily, LiquidityRoute},
    session::{
        EngineSnapshot, OperationStatus, Operations, TokenView, ValuedBalance, WalletStatus,
    },
    state::AppState,
    trading::{TradeDirection, TradeEvent, TradeReceipt, TradeState},
};

pub mod health;
pub mod token;
pub mod trade;
pub mod wallet;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/snapshot", get(token::get_snapshot))
        .route("/token", post(token::fetch_token))
        .route("/token/reset", post(token::reset_token))
        .route("/wallet", delete(wallet::forget_wallet))
        .route("/wallet/stored", get(wallet::stored_wallet))
        .route("/wallet/connect", post(wallet::connect_wallet))
        .route("/wallet/unlock", post(wallet::unlock_wallet))
        .route("/wallet/disconnect", post(wallet::disconnect_wallet))
        .route("/trade", post(trade::execute_trade))
        .route("/trade/cancel", post(trade::cancel_trade));

    Router::new()
        .route("/health", get(health::health))
        .nest("/v1", v1_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        token::get_snapshot,
        token::fetch_token,
        token::reset_token,
        wallet::stored_wallet,
        wallet::connect_wallet,
        wallet::unlock_wallet,
        wallet::disconnect_wallet,
        wallet::forget_wallet,
        trade::execute_trade,
        trade::cancel_trade
    ),
    components(
        schemas(
            health::HealthResponse,
            token::FetchTokenRequest,
            wallet::ConnectWalletRequest,
            wallet::UnlockWalletRequest,
            wallet::WalletAddressResponse,
            wallet::StoredWalletResponse,
            wallet::DisconnectResponse,
            trade::TradeRequestBody,
            trade::CancelTradeResponse,
            EngineSnapshot,
            TokenView,
            TokenDescriptor,
            TokenBalance,
            LiquidityRoute,
            AmmFamily,
            WalletStatus,
            ValuedBalance,
            Operations,
            OperationStatus,
            TradeDirection,
            TradeState,
            TradeEvent,
            TradeReceipt
        )
    ),
    tags(
        (name = "Health", description = "Liveness"),
        (name = "Token", description = "Token loading, liquidity and prices"),
        (name = "Wallet", description = "Hot-wallet custody and sessions"),
        (name = "Trade", description = "Buy/sell execution")
    )
)]
struct ApiDoc;
