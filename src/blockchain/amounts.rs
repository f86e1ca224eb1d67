// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Fixed-point conversion between human-entered amounts and on-chain units.

use alloy::primitives::U256;

use crate::error::{EngineError, EngineResult};

/// Maximum fractional digits shown by [`format_amount_display`].
const DISPLAY_DECIMALS: usize = 6;

/// Parse a human-readable amount to the token's smallest unit.
///
/// # Arguments
/// * `amount` - Amount as a string (e.g., "1.5")
/// * `decimals` - Number of decimals (18 for ETH, 6 for USDC)
///
/// # Returns
/// * `Ok(U256)` - Amount in smallest unit
/// * `Err(InvalidTrade)` - If the string is not a plain non-negative decimal
pub fn parse_amount(amount: &str, decimals: u8) -> EngineResult<U256> {
    let amount = amount.trim();
    let parts: Vec<&str> = amount.split('.').collect();

    if amount.is_empty() || parts.len() > 2 {
        return Err(EngineError::InvalidTrade("Invalid amount format".to_string()));
    }

    let whole_str = if parts[0].is_empty() { "0" } else { parts[0] };
    if !whole_str.chars().all(|c| c.is_ascii_digit()) {
        return Err(EngineError::InvalidTrade("Invalid whole number".to_string()));
    }
    let whole = U256::from_str_radix(whole_str, 10)
        .map_err(|_| EngineError::InvalidTrade("Invalid whole number".to_string()))?;

    let decimal_part = if parts.len() == 2 {
        let dec_str = parts[1];
        if !dec_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(EngineError::InvalidTrade("Invalid decimal".to_string()));
        }
        if dec_str.len() > decimals as usize {
            return Err(EngineError::InvalidTrade(format!(
                "Too many decimal places (max {})",
                decimals
            )));
        }
        // Pad with zeros to match decimals
        let padded = format!("{:0<width$}", dec_str, width = decimals as usize);
        if padded.is_empty() {
            U256::ZERO
        } else {
            U256::from_str_radix(&padded, 10)
                .map_err(|_| EngineError::InvalidTrade("Invalid decimal".to_string()))?
        }
    } else {
        U256::ZERO
    };

    let multiplier = U256::from(10u64).pow(U256::from(decimals));
    whole
        .checked_mul(multiplier)
        .and_then(|w| w.checked_add(decimal_part))
        .ok_or_else(|| EngineError::InvalidTrade("Amount overflow".to_string()))
}

/// Format smallest units to a human-readable amount (full precision).
pub fn format_amount(amount: U256, decimals: u8) -> String {
    format_with_limit(amount, decimals, usize::MAX)
}

/// Format smallest units for display, truncated to 6 fractional digits.
pub fn format_amount_display(amount: U256, decimals: u8) -> String {
    format_with_limit(amount, decimals, DISPLAY_DECIMALS)
}

fn format_with_limit(amount: U256, decimals: u8, max_fraction: usize) -> String {
    if amount.is_zero() {
        return "0".to_string();
    }

    let divisor = U256::from(10u64).pow(U256::from(decimals));
    let whole = amount / divisor;
    let remainder = amount % divisor;

    if remainder.is_zero() {
        return whole.to_string();
    }

    let decimal_str = format!("{:0>width$}", remainder, width = decimals as usize);
    let trimmed = decimal_str.trim_end_matches('0');
    let shown = &trimmed[..trimmed.len().min(max_fraction)];
    let shown = shown.trim_end_matches('0');
    if shown.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, shown)
    }
}

/// Lossy conversion of smallest units to a floating value, for pricing only.
pub fn to_f64(amount: U256, decimals: u8) -> f64 {
    let raw: f64 = amount.to_string().parse().unwrap_or(0.0);
    raw / 10f64.powi(decimals as i32)
}
