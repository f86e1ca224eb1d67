// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! EVM network integration.
//!
//! This module provides:
//! - A weighted quorum pool of read endpoints and a signing provider
//! - Contract bindings for tokens, the price feed and the AMM families
//! - Fixed-point amount parsing and formatting
//! - The gas fee policy

pub mod amounts;
pub mod client;
pub mod contracts;
pub mod fees;
pub mod rpc;
pub mod types;

pub use client::{ChainClient, LiveTradeBackend};
pub use types::*;
