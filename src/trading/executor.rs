// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Trade state machine.

use std::future::Future;
use std::sync::Mutex;

use alloy::{
    primitives::{Address, TxHash, U256},
    rpc::types::TransactionRequest,
};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::calls::{approval_transaction, swap_deadline, swap_leg, swap_transaction, SwapParams};
use super::types::{TradeDirection, TradeEvent, TradeReceipt, TradeRequest, TradeState};
use super::TradeBackend;
use crate::blockchain::amounts::{format_amount_display, parse_amount};
use crate::blockchain::fees::{buffered_gas_limit, FeePolicy, FALLBACK_GAS_LIMIT};
use crate::error::{EngineError, EngineResult};
use crate::pricing::NATIVE_DECIMALS;

/// Allowances below half of `U256::MAX` are topped up to the maximum.
pub const APPROVAL_THRESHOLD: U256 =
    U256::from_limbs([u64::MAX, u64::MAX, u64::MAX, u64::MAX >> 1]);

/// Native balance a sell requires up front: 0.0001 ETH.
pub const MIN_GAS_RESERVE_WEI: U256 = U256::from_limbs([100_000_000_000_000, 0, 0, 0]);

/// Lowest acceptable output: `quoted * (100 - slippage) / 100`, floored.
pub fn minimum_output(quoted: U256, slippage_percent: u32) -> U256 {
    let keep = U256::from(100u32.saturating_sub(slippage_percent));
    let hundred = U256::from(100u32);
    // Split to keep the multiplication in range for any quote.
    (quoted / hundred) * keep + (quoted % hundred) * keep / hundred
}

/// Runs trades and publishes their progress.
#[derive(Debug)]
pub struct TradeExecutor {
    wrapped_native: Address,
    fee_policy: FeePolicy,
    events: broadcast::Sender<TradeEvent>,
    latest: Mutex<Option<TradeEvent>>,
    /// Cancellation handle of the running trade until its swap is broadcast.
    pending: Mutex<Option<CancellationToken>>,
}

impl TradeExecutor {
    pub fn new(
        wrapped_native: Address,
        fee_policy: FeePolicy,
        events: broadcast::Sender<TradeEvent>,
    ) -> Self {
        Self {
            wrapped_native,
            fee_policy,
            events,
            latest: Mutex::new(None),
            pending: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TradeEvent> {
        self.events.subscribe()
    }

    /// Most recent event of any trade.
    pub fn last_event(&self) -> Option<TradeEvent> {
        self.latest.lock().ok().and_then(|latest| latest.clone())
    }

    /// Cancel the running trade if it has not been broadcast yet.
    ///
    /// Returns whether a cancellation was signalled.
    pub fn cancel_pending(&self) -> bool {
        match self.take_pending() {
            Some(cancel) => {
                cancel.cancel();
                true
            }
            None => false,
        }
    }

    fn take_pending(&self) -> Option<CancellationToken> {
        self.pending.lock().ok().and_then(|mut pending| pending.take())
    }

    fn record(&self, event: TradeEvent) {
        if let Ok(mut latest) = self.latest.lock() {
            *latest = Some(event.clone());
        }
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Execute one trade to a terminal state.
    ///
    /// `cancel` is honoured until the swap is broadcast; afterwards the trade
    /// always runs to settlement.
    pub async fn execute<B>(
        &self,
        backend: &B,
        request: TradeRequest,
        cancel: &CancellationToken,
    ) -> EngineResult<TradeReceipt>
    where
        B: TradeBackend + ?Sized,
    {
        if let Ok(mut pending) = self.pending.lock() {
            *pending = Some(cancel.clone());
        }
        let mut run = TradeRun {
            executor: self,
            backend,
            cancel,
            trade_id: Uuid::new_v4(),
            tx_hash: None,
        };

        let outcome = run.drive(request).await;
        self.take_pending();

        match outcome {
            Ok(receipt) => {
                tracing::info!(
                    trade_id = %receipt.trade_id,
                    tx_hash = %receipt.tx_hash,
                    gas_used = receipt.gas_used,
                    "Trade settled"
                );
                run.publish(
                    TradeState::Settled,
                    Some(format!(
                        "included in block {}, gas used {}",
                        receipt
                            .block_number
                            .map(|b| b.to_string())
                            .unwrap_or_else(|| "?".to_string()),
                        receipt.gas_used
                    )),
                );
                Ok(receipt)
            }
            Err(e) => {
                tracing::warn!(trade_id = %run.trade_id, error = %e, "Trade failed");
                run.publish(TradeState::Failed, Some(e.to_string()));
                Err(e)
            }
        }
    }
}

struct TradeRun<'a, B: ?Sized> {
    executor: &'a TradeExecutor,
    backend: &'a B,
    cancel: &'a CancellationToken,
    trade_id: Uuid,
    tx_hash: Option<TxHash>,
}

impl<B> TradeRun<'_, B>
where
    B: TradeBackend + ?Sized,
{
    fn publish(&self, state: TradeState, detail: Option<String>) {
        self.executor.record(TradeEvent {
            trade_id: self.trade_id,
            state,
            tx_hash: self.tx_hash.map(|h| h.to_string()),
            detail,
            at: chrono::Utc::now(),
        });
    }

    fn enter(&self, state: TradeState) {
        tracing::debug!(trade_id = %self.trade_id, ?state, "Trade transition");
        self.publish(state, None);
    }

    /// Await a pre-broadcast step, aborting it on cancellation.
    async fn guard<T>(&self, step: impl Future<Output = EngineResult<T>>) -> EngineResult<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(EngineError::TradeCancelled),
            result = step => result,
        }
    }

    async fn drive(&mut self, request: TradeRequest) -> EngineResult<TradeReceipt> {
        self.enter(TradeState::Validating);

        let route = &request.route;
        let (router, _) = route.tradeable().ok_or(EngineError::NoLiquidity)?;
        if request.slippage_percent == 0 || request.slippage_percent > 100 {
            return Err(EngineError::InvalidTrade(format!(
                "slippage {}% is outside (0, 100]",
                request.slippage_percent
            )));
        }

        let token = request.token.address;
        let input_decimals = match request.direction {
            TradeDirection::Buy => NATIVE_DECIMALS,
            TradeDirection::Sell => request.token.decimals,
        };
        let requested = parse_amount(&request.amount, input_decimals)?;
        if requested.is_zero() {
            return Err(EngineError::InvalidTrade("amount must be positive".to_string()));
        }

        let (amount_in, clamped) = match request.direction {
            TradeDirection::Buy => (self.check_buy_funds(requested).await?, false),
            TradeDirection::Sell => self.sell_amount(&request, requested).await?,
        };

        if request.direction == TradeDirection::Sell {
            self.enter(TradeState::EnsuringApproval);
            self.ensure_approval(token, router).await?;
        }

        self.enter(TradeState::EstimatingMinimumOutput);
        let leg = swap_leg(request.direction, token, self.executor.wrapped_native);
        let quoted = self.guard(self.backend.quote(route, leg, amount_in)).await?;
        if quoted.is_zero() {
            return Err(EngineError::NoLiquidity);
        }
        let min_amount_out = minimum_output(quoted, request.slippage_percent);
        tracing::info!(
            trade_id = %self.trade_id,
            direction = ?request.direction,
            family = ?route.family,
            amount_in = %amount_in,
            quoted = %quoted,
            min_amount_out = %min_amount_out,
            "Quote received"
        );

        self.enter(TradeState::EstimatingGas);
        let swap = swap_transaction(
            route,
            &SwapParams {
                direction: request.direction,
                token,
                wrapped_native: self.executor.wrapped_native,
                wallet: self.backend.wallet(),
                amount_in,
                min_amount_out,
                deadline: swap_deadline(),
            },
        )?;
        let swap = self.finalize(swap).await?;

        // Past this point the trade cannot be cancelled.
        self.executor.take_pending();
        if self.cancel.is_cancelled() {
            return Err(EngineError::TradeCancelled);
        }

        self.enter(TradeState::Broadcasting);
        let tx_hash = self.backend.send(swap).await?;
        self.tx_hash = Some(tx_hash);
        tracing::info!(trade_id = %self.trade_id, tx_hash = %tx_hash, "Swap broadcast");

        self.enter(TradeState::Confirming);
        let inclusion = self.backend.wait_for_inclusion(tx_hash).await?;
        if !inclusion.success {
            return Err(EngineError::TransactionReverted {
                tx_hash: Some(tx_hash.to_string()),
                reason: inclusion
                    .revert_reason
                    .unwrap_or_else(|| "execution reverted".to_string()),
            });
        }

        Ok(TradeReceipt::new(
            self.trade_id,
            request.direction,
            &inclusion,
            amount_in,
            quoted,
            min_amount_out,
            clamped,
        ))
    }

    /// Buys never clamp: the native input must be covered.
    async fn check_buy_funds(&self, amount: U256) -> EngineResult<U256> {
        let balance = self.guard(self.backend.native_balance()).await?;
        if amount > balance {
            return Err(EngineError::InsufficientBalance(format!(
                "buy of {} exceeds native balance {}",
                format_amount_display(amount, NATIVE_DECIMALS),
                format_amount_display(balance, NATIVE_DECIMALS)
            )));
        }
        Ok(amount)
    }

    /// Token balance and gas reserve checks, then clamp to the balance.
    async fn sell_amount(&self, request: &TradeRequest, requested: U256) -> EngineResult<(U256, bool)> {
        let token = &request.token;
        let balance = self.guard(self.backend.token_balance(token.address)).await?;
        if balance.is_zero() {
            return Err(EngineError::InsufficientBalance(format!(
                "no {} to sell",
                token.symbol
            )));
        }

        let native = self.guard(self.backend.native_balance()).await?;
        if native < MIN_GAS_RESERVE_WEI {
            return Err(EngineError::InsufficientGas {
                available: format_amount_display(native, NATIVE_DECIMALS),
                required: format_amount_display(MIN_GAS_RESERVE_WEI, NATIVE_DECIMALS),
            });
        }

        if requested > balance {
            tracing::warn!(
                trade_id = %self.trade_id,
                token = %token.address,
                requested = %format_amount_display(requested, token.decimals),
                clamped_to = %format_amount_display(balance, token.decimals),
                "Sell amount exceeds balance, clamping to full balance"
            );
            return Ok((balance, true));
        }
        Ok((requested, false))
    }

    async fn ensure_approval(&self, token: Address, router: Address) -> EngineResult<()> {
        let allowance = self
            .guard(self.backend.allowance(token, router))
            .await?;
        if allowance >= APPROVAL_THRESHOLD {
            tracing::debug!(token = %token, router = %router, "Allowance sufficient");
            return Ok(());
        }

        let approve = approval_transaction(self.backend.wallet(), token, router, U256::MAX);
        let approve = self.finalize(approve).await?;
        if self.cancel.is_cancelled() {
            return Err(EngineError::TradeCancelled);
        }

        let tx_hash = self
            .backend
            .send(approve)
            .await
            .map_err(|e| EngineError::ApprovalFailed(e.to_string()))?;
        tracing::info!(trade_id = %self.trade_id, tx_hash = %tx_hash, token = %token, "Approval broadcast");

        let inclusion = self
            .backend
            .wait_for_inclusion(tx_hash)
            .await
            .map_err(|e| EngineError::ApprovalFailed(e.to_string()))?;
        if !inclusion.success {
            return Err(EngineError::ApprovalFailed(match inclusion.revert_reason {
                Some(reason) => format!("approval {tx_hash} reverted: {reason}"),
                None => format!("approval {tx_hash} reverted"),
            }));
        }
        Ok(())
    }

    /// Attach the gas limit and policy fees.
    async fn finalize(&self, tx: TransactionRequest) -> EngineResult<TransactionRequest> {
        let gas_limit = match self.guard(self.backend.estimate_gas(&tx)).await {
            Ok(simulated) => buffered_gas_limit(simulated),
            Err(EngineError::TradeCancelled) => return Err(EngineError::TradeCancelled),
            Err(e) => {
                tracing::warn!(
                    trade_id = %self.trade_id,
                    error = %e,
                    fallback = FALLBACK_GAS_LIMIT,
                    "Gas simulation failed, using fallback limit"
                );
                FALLBACK_GAS_LIMIT
            }
        };

        let suggested = self.guard(self.backend.suggested_fees()).await?;
        let fees = self.executor.fee_policy.apply(suggested);

        Ok(tx
            .gas_limit(gas_limit)
            .max_fee_per_gas(fees.max_fee_per_gas)
            .max_priority_fee_per_gas(fees.max_priority_fee_per_gas))
    }
}
