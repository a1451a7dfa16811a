//! Tranche Calculator
//!
//! Pure fixed-point math for mint and pool deposit quotes. No async, no chain.
//!
//! All rates are 10^18 fixed point and every division truncates, matching the
//! contracts' own arithmetic:
//!   net    = input * (1e18 - fee_rate) / 1e18
//!   minted = net * scale / 1e18            (principal == yield)
//!   required_underlying = desired * reserve_underlying / reserve_pool_token

use split_core::constants::{BPS_DENOM, WAD};
use split_core::Wei;

use crate::state::{MintQuote, PoolDepositQuote, TrancheError};

/// a * b / denom, floor. `denom` must be non-zero.
fn mul_div(a: Wei, b: Wei, denom: Wei) -> Result<Wei, TrancheError> {
    a.checked_mul(b)
        .map(|product| product / denom)
        .ok_or(TrancheError::AmountOverflow)
}

/// Split tokens minted for `input` underlying.
///
/// A zero `scale` yields a zero quote; substituting a live scale is the
/// caller's job.
pub fn compute_mint_quote(input: Wei, fee_rate: Wei, scale: Wei) -> Result<MintQuote, TrancheError> {
    if fee_rate > WAD {
        return Err(TrancheError::InvalidAmount(format!(
            "issuance fee rate {fee_rate} exceeds 1e18"
        )));
    }

    // Net rounds down and the fee takes the remainder. The fee-first form
    // (input - input * fee_rate / WAD) can be one wei higher; a quote must
    // not exceed what issueFromUnderlying mints.
    let net = mul_div(input, WAD - fee_rate, WAD)?;
    let minted = mul_div(net, scale, WAD)?;

    Ok(MintQuote {
        minted_principal: minted,
        minted_yield: minted,
        fee: input - net,
        net_underlying: net,
    })
}

/// Underlying required to receive `desired` pool tokens at current reserves
pub fn compute_pool_deposit_quote(
    desired: Wei,
    reserve_underlying: Wei,
    reserve_pool_token: Wei,
) -> Result<PoolDepositQuote, TrancheError> {
    if reserve_pool_token.is_zero() {
        return Err(TrancheError::DivisionByZeroReserve);
    }

    Ok(PoolDepositQuote {
        required_underlying: mul_div(desired, reserve_underlying, reserve_pool_token)?,
        expected_pool_tokens: desired,
    })
}

/// 1:1 quote for seeding an empty pool
pub fn compute_seed_quote(desired: Wei) -> PoolDepositQuote {
    PoolDepositQuote {
        required_underlying: desired,
        expected_pool_tokens: desired,
    }
}

/// Relative move from `quoted` to `current` in basis points, saturating
pub fn quote_drift_bps(quoted: Wei, current: Wei) -> u64 {
    let diff = if current > quoted {
        current - quoted
    } else {
        quoted - current
    };
    if diff.is_zero() {
        return 0;
    }
    if quoted.is_zero() {
        return u64::MAX;
    }
    diff.checked_mul(Wei::from(BPS_DENOM))
        .map(|scaled| scaled / quoted)
        .map(|bps| u64::try_from(bps).unwrap_or(u64::MAX))
        .unwrap_or(u64::MAX)
}
