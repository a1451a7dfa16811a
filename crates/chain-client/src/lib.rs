//! chain-client: Contract capability traits with a timed session context
//!
//! The orchestration layer never talks to a provider directly. Every remote
//! read and every on-chain call goes through the traits below, bound to an
//! address by a [`ContractProvider`] and bounded by the session's timeout.

#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod session;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use split_core::{Address, CallError, NetworkId, TxHash, Wei};

pub use session::SessionContext;

/// Result type for chain calls
pub type Result<T> = std::result::Result<T, CallError>;

/// Final status of a mined transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ReceiptStatus {
    Confirmed,
    Reverted { reason: Option<String> },
}

/// Receipt returned by state-changing calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    #[serde(flatten)]
    pub status: ReceiptStatus,
}

impl TxReceipt {
    pub fn is_confirmed(&self) -> bool {
        matches!(self.status, ReceiptStatus::Confirmed)
    }

    /// Collapse a reverted receipt into `CallError::Reverted`
    pub fn into_confirmed(self) -> Result<TxReceipt> {
        match &self.status {
            ReceiptStatus::Confirmed => Ok(self),
            ReceiptStatus::Reverted { reason } => Err(CallError::Reverted {
                reason: reason.clone(),
            }),
        }
    }
}

/// Series metadata kept by the splitting contract per split token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesInfo {
    pub adapter: Address,
}

/// Pool reserves as (underlying, pool token)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolReserves {
    pub underlying: Wei,
    pub pool_token: Wei,
}

/// ERC-20 token
#[async_trait]
pub trait TokenContract: Send + Sync {
    fn address(&self) -> &Address;
    async fn balance_of(&self, owner: &Address) -> Result<Wei>;
    async fn symbol(&self) -> Result<String>;
    async fn allowance(&self, owner: &Address, spender: &Address) -> Result<Wei>;
    async fn approve(&self, spender: &Address, amount: Wei) -> Result<TxReceipt>;
}

/// Tranche (splitting) contract: issues principal + yield tokens
#[async_trait]
pub trait SplittingContract: Send + Sync {
    fn address(&self) -> &Address;
    /// Split tokens, one per yield source, in the contract's fixed order
    async fn split_token_addresses(&self) -> Result<Vec<Address>>;
    async fn series_info(&self, split_token: &Address) -> Result<SeriesInfo>;
    /// Scale recorded for `owner` at their last issuance (zero if never issued)
    async fn stored_scale(&self, split_token: &Address, owner: &Address) -> Result<Wei>;
    async fn issue_from_underlying(&self, split_token: &Address, amount: Wei) -> Result<TxReceipt>;
}

/// Yield-source adapter behind a series
#[async_trait]
pub trait AdapterContract: Send + Sync {
    fn address(&self) -> &Address;
    async fn issuance_fee_rate(&self) -> Result<Wei>;
    /// Last scale the adapter stored on-chain
    async fn scale_stored(&self) -> Result<Wei>;
}

/// AMM pool factory
#[async_trait]
pub trait PoolFactory: Send + Sync {
    fn address(&self) -> &Address;
    /// Pools in creation order
    async fn list_pools(&self) -> Result<Vec<Address>>;
}

/// AMM pool pairing underlying with principal tokens
#[async_trait]
pub trait Pool: Send + Sync {
    fn address(&self) -> &Address;
    /// Contract-side quote: (underlying required, pool tokens expected)
    async fn quote_amount_in(
        &self,
        split_token: &Address,
        owner: &Address,
        desired: Wei,
    ) -> Result<(Wei, Wei)>;
    async fn reserves(&self) -> Result<PoolReserves>;
    async fn add_liquidity_from_underlying(
        &self,
        split_token: &Address,
        recipient: &Address,
        amount: Wei,
        min_out: Wei,
        deadline: u64,
    ) -> Result<TxReceipt>;
}

/// Connected wallet session
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn network_id(&self) -> Result<NetworkId>;
    async fn signer_address(&self) -> Result<Address>;
}

/// Binds contract addresses to capabilities
pub trait ContractProvider: Send + Sync {
    fn token(&self, address: &Address) -> Arc<dyn TokenContract>;
    fn splitter(&self, address: &Address) -> Arc<dyn SplittingContract>;
    fn adapter(&self, address: &Address) -> Arc<dyn AdapterContract>;
    fn pool_factory(&self, address: &Address) -> Arc<dyn PoolFactory>;
    fn pool(&self, address: &Address) -> Arc<dyn Pool>;
}

/// Run a chain call with a timeout.
pub async fn timed_call<T>(
    timeout: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| CallError::Timeout {
            secs: timeout.as_secs(),
        })?
}
