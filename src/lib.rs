// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational Trader - Self-custodial AMM Trading Engine
//!
//! Resolves where a token trades across three AMM families on one EVM
//! network, prices it in fiat and executes slippage-protected swaps signed
//! by a locally encrypted hot key.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `blockchain` - Quorum RPC pool, contract bindings, fee policy
//! - `custody` - Password-encrypted key storage
//! - `liquidity` - Pool discovery across AMM families
//! - `pricing` - Native and token fiat prices
//! - `session` - Engine facade and wallet sessions
//! - `trading` - Buy/sell state machine

pub mod api;
pub mod blockchain;
pub mod config;
pub mod custody;
pub mod error;
pub mod liquidity;
pub mod pricing;
pub mod session;
pub mod state;
pub mod trading;

#[cfg(test)]
pub(crate) mod test_utils;
