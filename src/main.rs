// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use relational_trader::{
    api::router,
    blockchain::{fees::FeePolicy, rpc::RpcPool, ChainClient},
    config::{EngineConfig, LogFormat, DEFAULT_LOG_FILTER},
    session::{Engine, EngineSettings},
    state::AppState,
};
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(env_filter)
            .init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() {
    let config = EngineConfig::from_env().expect("Invalid configuration");
    init_tracing(config.log_format);

    let reads = RpcPool::new(config.endpoints.clone(), config.quorum, config.request_timeout)
        .expect("Invalid RPC endpoint configuration");
    tracing::info!(
        network = config.network.name,
        chain_id = config.network.chain_id,
        endpoints = reads.endpoints().len(),
        quorum = config.quorum,
        signing_rpc = %config.signing_url,
        "RPC pool ready"
    );

    let chain = ChainClient::new(config.network, reads, config.signing_url.clone());
    let engine = Engine::new(
        Arc::new(chain),
        EngineSettings {
            network: config.network,
            data_dir: config.data_dir.clone(),
            refresh_interval: config.refresh_interval,
            fee_policy: FeePolicy::default(),
        },
    );
    if engine.has_stored_wallet() {
        tracing::info!(data_dir = %config.data_dir.display(), "Encrypted wallet found, unlock to trade");
    }

    let app = router(AppState::new(engine.clone()));

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .expect("Failed to bind listener");
    tracing::info!(addr = %config.bind, "Relational Trader listening (docs at /docs)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("HTTP server failed");

    engine.disconnect().await;
}
