//! Remote Reads
//!
//! Everything a quote needs from the chain: split-token resolution, fee and
//! scale, pool discovery and reserves. Nothing here is cached; each quote
//! reads fresh state through the session context.

use std::sync::Arc;

use chain_client::{AdapterContract, SessionContext};
use serde::{Deserialize, Serialize};
use split_core::{Address, Wei};

use crate::address_book::{AddressBookRecord, ContractRole};
use crate::calculator;
use crate::state::{MintQuote, PoolDepositQuote, PositionKey, TrancheError, UnderlyingSymbol};

/// Signer's underlying balance for the "Available" line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnderlyingBalance {
    pub token: Address,
    pub symbol: String,
    pub balance: Wei,
}

/// Split-token address for a position
pub async fn resolve_split_token(
    ctx: &SessionContext,
    record: &AddressBookRecord,
    key: PositionKey,
) -> Result<Address, TrancheError> {
    let slot = key.split_token_slot()?;
    let splitter = ctx.splitter(record.require(ContractRole::Splitter)?);
    let split_tokens = ctx.call(splitter.split_token_addresses()).await?;

    match split_tokens.get(slot) {
        Some(address) if address.is_configured() && !address.is_zero() => {
            tracing::debug!(%key, split_token = %address, "Resolved split token");
            Ok(address.clone())
        }
        _ => Err(TrancheError::UnknownYieldSourceForSymbol { key }),
    }
}

async fn series_adapter(
    ctx: &SessionContext,
    record: &AddressBookRecord,
    split_token: &Address,
) -> Result<Arc<dyn AdapterContract>, TrancheError> {
    let splitter = ctx.splitter(record.require(ContractRole::Splitter)?);
    let series = ctx.call(splitter.series_info(split_token)).await?;
    Ok(ctx.adapter(&series.adapter))
}

/// Issuance fee rate of the series' adapter (10^18 fixed point)
pub async fn fetch_fee_rate(
    ctx: &SessionContext,
    record: &AddressBookRecord,
    split_token: &Address,
) -> Result<Wei, TrancheError> {
    let adapter = series_adapter(ctx, record, split_token).await?;
    Ok(ctx.call(adapter.issuance_fee_rate()).await?)
}

/// Scale for the signer's next issuance.
///
/// The splitter stores a per-holder scale at issuance; a holder who never
/// issued has zero there, so the adapter's last stored scale is used instead.
pub async fn fetch_scale(
    ctx: &SessionContext,
    record: &AddressBookRecord,
    split_token: &Address,
) -> Result<Wei, TrancheError> {
    let splitter = ctx.splitter(record.require(ContractRole::Splitter)?);
    let stored = ctx
        .call(splitter.stored_scale(split_token, ctx.signer()))
        .await?;
    if !stored.is_zero() {
        return Ok(stored);
    }

    let adapter = series_adapter(ctx, record, split_token).await?;
    let scale = ctx.call(adapter.scale_stored()).await?;
    tracing::debug!(split_token = %split_token, %scale, "No stored scale for signer, using adapter scale");
    Ok(scale)
}

/// Fresh mint quote for `input` underlying
pub async fn quote_mint(
    ctx: &SessionContext,
    record: &AddressBookRecord,
    key: PositionKey,
    input: Wei,
) -> Result<MintQuote, TrancheError> {
    let split_token = resolve_split_token(ctx, record, key).await?;
    let fee_rate = fetch_fee_rate(ctx, record, &split_token).await?;
    let scale = fetch_scale(ctx, record, &split_token).await?;

    let quote = calculator::compute_mint_quote(input, fee_rate, scale)?;
    tracing::debug!(
        %key,
        %input,
        %fee_rate,
        %scale,
        minted = %quote.minted_principal,
        "Mint quote"
    );
    Ok(quote)
}

/// Pool selection policy: the first usable address in creation order
pub fn select_pool(pools: &[Address]) -> Option<&Address> {
    pools
        .iter()
        .find(|pool| pool.is_configured() && !pool.is_zero())
}

/// Pool the pipeline deposits into
pub async fn resolve_pool(
    ctx: &SessionContext,
    record: &AddressBookRecord,
) -> Result<Address, TrancheError> {
    let factory_address = record.require(ContractRole::PoolFactory)?;
    let factory = ctx.pool_factory(factory_address);
    let pools = ctx.call(factory.list_pools()).await?;

    if pools.len() > 1 {
        tracing::debug!(count = pools.len(), "Factory lists several pools, taking the first");
    }

    select_pool(&pools)
        .cloned()
        .ok_or_else(|| TrancheError::NoPoolForToken {
            factory: factory_address.clone(),
        })
}

/// Underlying required for `desired` pool tokens, from fresh reserves
pub async fn quote_pool_deposit(
    ctx: &SessionContext,
    record: &AddressBookRecord,
    desired: Wei,
) -> Result<PoolDepositQuote, TrancheError> {
    let pool = ctx.pool(&resolve_pool(ctx, record).await?);
    let reserves = ctx.call(pool.reserves()).await?;
    calculator::compute_pool_deposit_quote(desired, reserves.underlying, reserves.pool_token)
}

/// The pool contract's own amount-in quote
pub async fn quote_pool_amount_in(
    ctx: &SessionContext,
    record: &AddressBookRecord,
    key: PositionKey,
    desired: Wei,
) -> Result<PoolDepositQuote, TrancheError> {
    let split_token = resolve_split_token(ctx, record, key).await?;
    let pool = ctx.pool(&resolve_pool(ctx, record).await?);
    let (required_underlying, expected_pool_tokens) = ctx
        .call(pool.quote_amount_in(&split_token, ctx.signer(), desired))
        .await?;

    Ok(PoolDepositQuote {
        required_underlying,
        expected_pool_tokens,
    })
}

pub async fn fetch_underlying_balance(
    ctx: &SessionContext,
    record: &AddressBookRecord,
    symbol: UnderlyingSymbol,
) -> Result<UnderlyingBalance, TrancheError> {
    let token_address = record.require(ContractRole::Underlying(symbol))?;
    let token = ctx.token(token_address);
    let balance = ctx.call(token.balance_of(ctx.signer())).await?;
    let token_symbol = ctx.call(token.symbol()).await?;

    Ok(UnderlyingBalance {
        token: token_address.clone(),
        symbol: token_symbol,
        balance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::YieldSource;
    use crate::testing::{ether, Fixture};
    use split_core::constants::WAD;
    use split_core::CallError;

    fn dai(source: YieldSource) -> PositionKey {
        PositionKey::new(UnderlyingSymbol::Dai, source)
    }

    #[tokio::test]
    async fn test_resolve_split_token_by_source() {
        let fx = Fixture::builder().build();
        for (i, source) in YieldSource::ALL.into_iter().enumerate() {
            let split = resolve_split_token(&fx.ctx, &fx.record, dai(source))
                .await
                .unwrap();
            assert_eq!(split, fx.split_tokens[i]);
        }
    }

    #[tokio::test]
    async fn test_resolve_split_token_missing_slot() {
        let fx = Fixture::builder().split_token_count(2).build();
        let key = dai(YieldSource::Euler);
        let err = resolve_split_token(&fx.ctx, &fx.record, key).await.unwrap_err();
        assert_eq!(err, TrancheError::UnknownYieldSourceForSymbol { key });
    }

    #[tokio::test]
    async fn test_quote_mint_reads_fee_and_scale() {
        let fx = Fixture::builder()
            .fee_rate(WAD / Wei::from(100u64))
            .stored_scale(YieldSource::Aave, Wei::from(1_100_000_000_000_000_000u64))
            .build();

        let quote = quote_mint(&fx.ctx, &fx.record, dai(YieldSource::Aave), ether(100))
            .await
            .unwrap();
        assert_eq!(quote.fee, ether(1));
        assert_eq!(
            quote.minted_principal,
            Wei::from(1089u64) * WAD / Wei::from(10u64)
        );
    }

    #[tokio::test]
    async fn test_zero_stored_scale_falls_back_to_adapter() {
        let adapter_scale = Wei::from(1_020_000_000_000_000_000u64);
        let fx = Fixture::builder().adapter_scale(adapter_scale).build();
        let split = fx.split_tokens[0].clone();

        let scale = fetch_scale(&fx.ctx, &fx.record, &split).await.unwrap();
        assert_eq!(scale, adapter_scale);

        let quote = quote_mint(&fx.ctx, &fx.record, dai(YieldSource::Compound), ether(100))
            .await
            .unwrap();
        assert_eq!(quote.minted_principal, ether(102));
    }

    #[tokio::test]
    async fn test_stored_scale_preferred() {
        let stored = Wei::from(1_500_000_000_000_000_000u64);
        let fx = Fixture::builder()
            .stored_scale(YieldSource::Compound, stored)
            .build();
        let scale = fetch_scale(&fx.ctx, &fx.record, &fx.split_tokens[0])
            .await
            .unwrap();
        assert_eq!(scale, stored);
    }

    #[test]
    fn test_select_pool_skips_empty_entries() {
        let first = Address::new("0x00000000000000000000000000000000000000a1");
        let pools = vec![
            Address::unconfigured(),
            Address::new("0x0000000000000000000000000000000000000000"),
            first.clone(),
            Address::new("0x00000000000000000000000000000000000000a2"),
        ];
        assert_eq!(select_pool(&pools), Some(&first));
        assert_eq!(select_pool(&[]), None);
    }

    #[tokio::test]
    async fn test_resolve_pool_without_pools() {
        let fx = Fixture::builder().no_pools().build();
        let err = resolve_pool(&fx.ctx, &fx.record).await.unwrap_err();
        assert!(matches!(err, TrancheError::NoPoolForToken { .. }));
        assert_eq!(err.error_code(), "no_pool_for_token");
    }

    #[tokio::test]
    async fn test_pool_deposit_quote_from_reserves() {
        let fx = Fixture::builder().reserves(ether(1000), ether(500)).build();
        let quote = quote_pool_deposit(&fx.ctx, &fx.record, ether(50)).await.unwrap();
        assert_eq!(quote.required_underlying, ether(100));
        assert_eq!(quote.expected_pool_tokens, ether(50));

        let onchain = quote_pool_amount_in(&fx.ctx, &fx.record, dai(YieldSource::Aave), ether(50))
            .await
            .unwrap();
        assert_eq!(onchain, quote);
    }

    #[tokio::test]
    async fn test_pool_deposit_quote_empty_pool() {
        let fx = Fixture::builder().reserves(Wei::ZERO, Wei::ZERO).build();
        let err = quote_pool_deposit(&fx.ctx, &fx.record, ether(50)).await.unwrap_err();
        assert_eq!(err, TrancheError::DivisionByZeroReserve);
    }

    #[tokio::test]
    async fn test_underlying_balance() {
        let fx = Fixture::builder().build();
        let balance = fetch_underlying_balance(&fx.ctx, &fx.record, UnderlyingSymbol::Dai)
            .await
            .unwrap();
        assert_eq!(balance.symbol, "DAI");
        assert_eq!(balance.balance, ether(1000));

        let err = fetch_underlying_balance(&fx.ctx, &fx.record, UnderlyingSymbol::Usdc)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "unconfigured_address");
    }

    #[tokio::test]
    async fn test_read_on_unknown_network_never_calls_out() {
        let fx = Fixture::builder().network(split_core::NetworkId(5)).build();
        let err = quote_mint(&fx.ctx, &fx.record, dai(YieldSource::Aave), ether(1))
            .await
            .unwrap_err();
        assert!(matches!(err, TrancheError::UnconfiguredAddress { .. }));
        assert!(!matches!(err, TrancheError::RemoteRead(CallError::Rpc { .. })));
    }
}
