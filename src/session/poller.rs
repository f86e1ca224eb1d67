// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Balance Poller
//!
//! Background task that refreshes balances and prices for the connected
//! wallet at a fixed interval.
//!
//! Each tick runs to completion before the next one is considered; ticks
//! that fall due while a refresh is still running are skipped rather than
//! queued. One poller exists per wallet session and stops when the
//! session's `CancellationToken` is cancelled on disconnect.

use std::sync::Weak;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::Engine;

/// Default interval between refreshes.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(15);

/// Periodic balance/price refresher for one wallet session.
pub struct BalancePoller {
    engine: Weak<Engine>,
    interval: Duration,
}

impl BalancePoller {
    pub fn new(engine: Weak<Engine>, interval: Duration) -> Self {
        Self { engine, interval }
    }

    /// Run until `stop` is cancelled or the engine is dropped.
    ///
    /// ```rust,ignore
    /// tokio::spawn(poller.run(session_token.clone()));
    /// ```
    pub async fn run(self, stop: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "Balance poller starting");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The session refreshes once on connect; skip the immediate tick.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {},
                _ = stop.cancelled() => {
                    info!("Balance poller shutting down");
                    return;
                }
            }

            let Some(engine) = self.engine.upgrade() else {
                debug!("Engine dropped, balance poller exiting");
                return;
            };

            tokio::select! {
                _ = engine.refresh() => {},
                _ = stop.cancelled() => {
                    info!("Balance poller shutting down");
                    return;
                }
            }
        }
    }
}
