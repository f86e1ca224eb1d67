// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Fiat display formatting.

/// Format a USD value with bounded precision.
///
/// Zero (or anything non-positive) renders as `$0.00`, sub-cent values as
/// `<$0.01`, thousands and millions with a `K`/`M` suffix. The suffix is
/// chosen after rounding, so 999.996 renders as `$1.00K`.
pub fn format_fiat(value: f64) -> String {
    if !value.is_finite() || value <= 0.0 {
        return "$0.00".to_string();
    }
    if value < 0.01 {
        return "<$0.01".to_string();
    }

    let (units, shown) = two_decimals(value);
    if shown < 1_000.0 {
        return format!("${units}");
    }
    let (thousands, shown) = two_decimals(value / 1_000.0);
    if shown < 1_000.0 {
        return format!("${thousands}K");
    }
    let (millions, _) = two_decimals(value / 1_000_000.0);
    format!("${millions}M")
}

/// `value` rendered with two decimals, and the number that text shows.
fn two_decimals(value: f64) -> (String, f64) {
    let text = format!("{value:.2}");
    let shown = text.parse().unwrap_or(value);
    (text, shown)
}
