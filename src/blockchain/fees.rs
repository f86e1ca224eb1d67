// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Gas fee policy.
//!
//! The endpoint's max-fee suggestion is kept; its priority tip is replaced
//! with a fixed minimal value.

use crate::trading::FeeData;

/// Fixed priority fee: 0.001 gwei.
pub const MIN_PRIORITY_FEE_WEI: u128 = 1_000_000;

/// Gas units added on top of a successful simulation, in percent.
pub const GAS_BUFFER_PERCENT: u64 = 30;

/// Gas limit used when simulation fails.
pub const FALLBACK_GAS_LIMIT: u64 = 500_000;

/// Fee parameters used for every broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeePolicy {
    priority_fee: u128,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self {
            priority_fee: MIN_PRIORITY_FEE_WEI,
        }
    }
}

impl FeePolicy {
    pub fn with_priority_fee(priority_fee: u128) -> Self {
        Self { priority_fee }
    }

    pub fn priority_fee(&self) -> u128 {
        self.priority_fee
    }

    /// Replace the suggested tip; the max fee never drops below the tip.
    pub fn apply(&self, suggested: FeeData) -> FeeData {
        FeeData {
            max_fee_per_gas: suggested.max_fee_per_gas.max(self.priority_fee),
            max_priority_fee_per_gas: self.priority_fee,
        }
    }
}

/// Simulated gas plus the safety buffer.
pub fn buffered_gas_limit(simulated: u64) -> u64 {
    simulated.saturating_mul(100 + GAS_BUFFER_PERCENT) / 100
}
