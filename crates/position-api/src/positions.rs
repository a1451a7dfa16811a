//! Position handlers
//!
//! Each handler snapshots the session and address book, reads what it needs
//! fresh from the chain, and returns a DTO. Pipeline failures are reported in
//! the returned status, not as handler errors; only misuse (wrong state,
//! unknown position, bad input) is an `Err`.

use split_core::units::to_wei;
use tranche::{fetch, PositionKey, StepRequest, TrancheError, UnderlyingSymbol, YieldSource};

use crate::dto::{
    BalanceView, ConfirmRequest, MintPreview, OpenPositionRequest, PipelineStatusView,
    PoolDepositPreview,
};
use crate::{ApiError, AppState};

/// Get the signer's balance of an underlying token
pub async fn get_underlying_balance(
    state: &AppState,
    symbol: UnderlyingSymbol,
) -> Result<BalanceView, ApiError> {
    let (ctx, record) = state.snapshot().await?;
    let balance = fetch::fetch_underlying_balance(&ctx, &record, symbol).await?;
    Ok(balance.into())
}

/// Preview minting principal + yield tokens for a decimal amount
pub async fn preview_mint(
    state: &AppState,
    symbol: UnderlyingSymbol,
    source: YieldSource,
    amount: &str,
) -> Result<MintPreview, ApiError> {
    let input = to_wei(amount)?;
    let key = PositionKey::new(symbol, source);
    let (ctx, record) = state.snapshot().await?;

    let quote = fetch::quote_mint(&ctx, &record, key, input).await?;
    Ok(MintPreview::new(key, amount, quote))
}

/// Preview the underlying needed for `desired` pool tokens.
///
/// An empty pool is quoted 1:1 and flagged as seeding.
pub async fn preview_pool_deposit(
    state: &AppState,
    desired: &str,
) -> Result<PoolDepositPreview, ApiError> {
    let desired = to_wei(desired)?;
    let (ctx, record) = state.snapshot().await?;

    match fetch::quote_pool_deposit(&ctx, &record, desired).await {
        Ok(quote) => Ok(PoolDepositPreview::new(quote, false)),
        Err(TrancheError::DivisionByZeroReserve) => {
            tracing::info!("Pool has no liquidity, quoting 1:1 seed");
            Ok(PoolDepositPreview::new(
                tranche::compute_seed_quote(desired),
                true,
            ))
        }
        Err(e) => Err(e.into()),
    }
}

/// Preview using the pool contract's own quote
pub async fn preview_pool_amount_in(
    state: &AppState,
    symbol: UnderlyingSymbol,
    source: YieldSource,
    desired: &str,
) -> Result<PoolDepositPreview, ApiError> {
    let desired = to_wei(desired)?;
    let (ctx, record) = state.snapshot().await?;

    let quote = fetch::quote_pool_amount_in(&ctx, &record, PositionKey::new(symbol, source), desired)
        .await?;
    Ok(PoolDepositPreview::new(quote, false))
}

/// Open a new position pipeline in `Idle`
pub async fn open_position(
    state: &AppState,
    request: OpenPositionRequest,
) -> Result<PipelineStatusView, ApiError> {
    state.session().await?;
    let id = state
        .open_pipeline(PositionKey::new(request.symbol, request.source), request.flow)
        .await;
    position_status(state, &id).await
}

/// Step 1: approve the underlying for a position
pub async fn approve_position(
    state: &AppState,
    position_id: &str,
    amount: &str,
) -> Result<PipelineStatusView, ApiError> {
    let amount = to_wei(amount)?;
    let (ctx, record) = state.snapshot().await?;
    let pipeline = state.pipeline(position_id).await?;

    let mut pipeline = pipeline.lock().await;
    match pipeline.approve(&ctx, &record, amount).await {
        Err(e @ TrancheError::InvalidTransition { .. }) => return Err(e.into()),
        Err(e) => tracing::debug!(position_id, "Approve failed: {}", e),
        Ok(()) => {}
    }
    Ok(PipelineStatusView::from(&*pipeline))
}

/// Step 2: mint (and deposit) for a position
pub async fn confirm_position(
    state: &AppState,
    request: ConfirmRequest,
) -> Result<PipelineStatusView, ApiError> {
    let mut step = StepRequest::new(to_wei(&request.amount)?);
    if let Some(quote) = request.quote {
        step = step.with_quote(quote);
    }
    let (ctx, record) = state.snapshot().await?;
    let pipeline = state.pipeline(&request.position_id).await?;

    let mut pipeline = pipeline.lock().await;
    match pipeline.confirm(&ctx, &record, step).await {
        Err(e @ TrancheError::InvalidTransition { .. }) => return Err(e.into()),
        Err(e) => tracing::debug!(position_id = %request.position_id, "Confirm failed: {}", e),
        Ok(tx_hash) => tracing::info!(position_id = %request.position_id, %tx_hash, "Position settled"),
    }
    Ok(PipelineStatusView::from(&*pipeline))
}

/// Return a failed or settled position to `Idle`
pub async fn reset_position(
    state: &AppState,
    position_id: &str,
) -> Result<PipelineStatusView, ApiError> {
    let pipeline = state.pipeline(position_id).await?;
    let mut pipeline = pipeline.lock().await;
    pipeline.reset()?;
    Ok(PipelineStatusView::from(&*pipeline))
}

pub async fn position_status(
    state: &AppState,
    position_id: &str,
) -> Result<PipelineStatusView, ApiError> {
    let pipeline = state.pipeline(position_id).await?;
    let pipeline = pipeline.lock().await;
    Ok(PipelineStatusView::from(&*pipeline))
}
