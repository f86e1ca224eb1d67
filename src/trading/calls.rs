// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Route-specific transaction construction.

use alloy::{
    primitives::{aliases::U24, Address, Bytes, U256},
    rpc::types::TransactionRequest,
    sol_types::SolCall,
};

use super::types::{SwapLeg, TradeDirection};
use crate::blockchain::contracts::{IClassicRouter, ISolidlyRouter, ISwapRouter02, IERC20};
use crate::error::{EngineError, EngineResult};
use crate::liquidity::{AmmFamily, LiquidityRoute};

/// Seconds until a swap with a deadline expires.
pub const SWAP_DEADLINE_SECS: i64 = 20 * 60;

/// Everything needed to encode one swap.
#[derive(Debug, Clone, Copy)]
pub struct SwapParams {
    pub direction: TradeDirection,
    pub token: Address,
    pub wrapped_native: Address,
    pub wallet: Address,
    pub amount_in: U256,
    pub min_amount_out: U256,
    pub deadline: U256,
}

impl SwapParams {
    pub fn leg(&self) -> SwapLeg {
        swap_leg(self.direction, self.token, self.wrapped_native)
    }
}

pub fn swap_leg(direction: TradeDirection, token: Address, wrapped_native: Address) -> SwapLeg {
    match direction {
        TradeDirection::Buy => SwapLeg {
            token_in: wrapped_native,
            token_out: token,
        },
        TradeDirection::Sell => SwapLeg {
            token_in: token,
            token_out: wrapped_native,
        },
    }
}

/// Unix deadline `SWAP_DEADLINE_SECS` from now.
pub fn swap_deadline() -> U256 {
    let deadline = chrono::Utc::now().timestamp() + SWAP_DEADLINE_SECS;
    U256::from(deadline.max(0) as u64)
}

/// `approve(spender, amount)` on `token`.
pub fn approval_transaction(
    wallet: Address,
    token: Address,
    spender: Address,
    amount: U256,
) -> TransactionRequest {
    let data = IERC20::approveCall { spender, amount }.abi_encode();
    TransactionRequest::default()
        .from(wallet)
        .to(token)
        .input(data.into())
}

/// Solidly hop descriptor for a leg.
pub fn solidly_route(route: &LiquidityRoute, leg: SwapLeg) -> EngineResult<ISolidlyRouter::Route> {
    let factory = route
        .factory
        .ok_or_else(|| EngineError::InvalidTrade("Solidly route without factory".into()))?;
    Ok(ISolidlyRouter::Route {
        from: leg.token_in,
        to: leg.token_out,
        stable: route.stable.unwrap_or(false),
        factory,
    })
}

/// The swap transaction for `route`.
///
/// Buys carry the input as native value; sells spend an approved token.
pub fn swap_transaction(route: &LiquidityRoute, params: &SwapParams) -> EngineResult<TransactionRequest> {
    let (router, _) = route.tradeable().ok_or(EngineError::NoLiquidity)?;
    let leg = params.leg();

    let data: Vec<u8> = match (route.family, params.direction) {
        (AmmFamily::ClassicV2, TradeDirection::Buy) => {
            IClassicRouter::swapExactETHForTokensSupportingFeeOnTransferTokensCall {
                amountOutMin: params.min_amount_out,
                path: vec![leg.token_in, leg.token_out],
                to: params.wallet,
                deadline: params.deadline,
            }
            .abi_encode()
        }
        (AmmFamily::ClassicV2, TradeDirection::Sell) => {
            IClassicRouter::swapExactTokensForETHSupportingFeeOnTransferTokensCall {
                amountIn: params.amount_in,
                amountOutMin: params.min_amount_out,
                path: vec![leg.token_in, leg.token_out],
                to: params.wallet,
                deadline: params.deadline,
            }
            .abi_encode()
        }
        (AmmFamily::Solidly, TradeDirection::Buy) => {
            ISolidlyRouter::swapExactETHForTokensSupportingFeeOnTransferTokensCall {
                amountOutMin: params.min_amount_out,
                routes: vec![solidly_route(route, leg)?],
                to: params.wallet,
                deadline: params.deadline,
            }
            .abi_encode()
        }
        (AmmFamily::Solidly, TradeDirection::Sell) => {
            ISolidlyRouter::swapExactTokensForETHSupportingFeeOnTransferTokensCall {
                amountIn: params.amount_in,
                amountOutMin: params.min_amount_out,
                routes: vec![solidly_route(route, leg)?],
                to: params.wallet,
                deadline: params.deadline,
            }
            .abi_encode()
        }
        (AmmFamily::Concentrated, direction) => {
            concentrated_swap_calldata(route, router, leg, direction, params)?
        }
        (AmmFamily::Unavailable, _) => return Err(EngineError::NoLiquidity),
    };

    let mut tx = TransactionRequest::default()
        .from(params.wallet)
        .to(router)
        .input(data.into());
    if params.direction == TradeDirection::Buy {
        tx = tx.value(params.amount_in);
    }
    Ok(tx)
}

fn concentrated_swap_calldata(
    route: &LiquidityRoute,
    router: Address,
    leg: SwapLeg,
    direction: TradeDirection,
    params: &SwapParams,
) -> EngineResult<Vec<u8>> {
    let fee = route
        .fee_tier
        .and_then(|fee| U24::try_from(fee).ok())
        .ok_or_else(|| EngineError::InvalidTrade("concentrated route without fee tier".into()))?;

    let single = |recipient: Address| ISwapRouter02::ExactInputSingleParams {
        tokenIn: leg.token_in,
        tokenOut: leg.token_out,
        fee,
        recipient,
        amountIn: params.amount_in,
        amountOutMinimum: params.min_amount_out,
        sqrtPriceLimitX96: Default::default(),
    };

    Ok(match direction {
        TradeDirection::Buy => ISwapRouter02::exactInputSingleCall {
            params: single(params.wallet),
        }
        .abi_encode(),
        // Output lands on the router as WETH, then is unwrapped to the wallet.
        TradeDirection::Sell => {
            let swap = ISwapRouter02::exactInputSingleCall {
                params: single(router),
            }
            .abi_encode();
            let unwrap = ISwapRouter02::unwrapWETH9Call {
                amountMinimum: params.min_amount_out,
                recipient: params.wallet,
            }
            .abi_encode();
            ISwapRouter02::multicallCall {
                data: vec![Bytes::from(swap), Bytes::from(unwrap)],
            }
            .abi_encode()
        }
    })
}
