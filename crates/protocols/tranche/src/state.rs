//! Tranche State Types
//!
//! Position keys, quotes, transaction steps, and errors.

use std::fmt;

use serde::{Deserialize, Serialize};
use split_core::{Address, CallError, NetworkId, TxHash, Wei};
use thiserror::Error;

use crate::address_book::ContractRole;
use crate::constants::SPLIT_TOKEN_COUNT;

/// Lending/vault protocol behind a split-token series.
///
/// Declaration order is the order of the splitting contract's split-token
/// list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YieldSource {
    Compound,
    Yearn,
    Aave,
    Euler,
}

impl YieldSource {
    pub const ALL: [YieldSource; SPLIT_TOKEN_COUNT] = [
        YieldSource::Compound,
        YieldSource::Yearn,
        YieldSource::Aave,
        YieldSource::Euler,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compound => "compound",
            Self::Yearn => "yearn",
            Self::Aave => "aave",
            Self::Euler => "euler",
        }
    }
}

impl fmt::Display for YieldSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Underlying asset a user deposits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UnderlyingSymbol {
    Dai,
    Usdc,
}

impl UnderlyingSymbol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dai => "DAI",
            Self::Usdc => "USDC",
        }
    }
}

impl fmt::Display for UnderlyingSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A position is identified by what is deposited and where it earns yield
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionKey {
    pub symbol: UnderlyingSymbol,
    pub source: YieldSource,
}

impl PositionKey {
    pub fn new(symbol: UnderlyingSymbol, source: YieldSource) -> Self {
        Self { symbol, source }
    }

    /// Index into the splitting contract's split-token list.
    ///
    /// This is the single place that decides which (symbol, source) pairs
    /// have a series.
    pub fn split_token_slot(&self) -> Result<usize, TrancheError> {
        match (self.symbol, self.source) {
            (UnderlyingSymbol::Dai, YieldSource::Compound) => Ok(0),
            (UnderlyingSymbol::Dai, YieldSource::Yearn) => Ok(1),
            (UnderlyingSymbol::Dai, YieldSource::Aave) => Ok(2),
            (UnderlyingSymbol::Dai, YieldSource::Euler) => Ok(3),
            (UnderlyingSymbol::Usdc, _) => {
                Err(TrancheError::UnknownYieldSourceForSymbol { key: *self })
            }
        }
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.symbol, self.source)
    }
}

/// Split tokens minted for an underlying deposit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintQuote {
    pub minted_principal: Wei,
    /// Always equal to `minted_principal`
    pub minted_yield: Wei,
    /// Issuance fee withheld from the input
    pub fee: Wei,
    /// Input after the fee
    pub net_underlying: Wei,
}

/// Underlying needed for a target amount of pool tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolDepositQuote {
    pub required_underlying: Wei,
    pub expected_pool_tokens: Wei,
}

/// A quote as shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PositionQuote {
    Mint(MintQuote),
    PoolDeposit(PoolDepositQuote),
}

/// An on-chain call issued by the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TransactionStep {
    Approve {
        token: Address,
        spender: Address,
        amount: Wei,
    },
    Mint {
        splitter: Address,
        split_token: Address,
        amount: Wei,
    },
    MintAndDeposit {
        pool: Address,
        split_token: Address,
        recipient: Address,
        amount: Wei,
        min_out: Wei,
        deadline: u64,
    },
}

impl TransactionStep {
    pub fn kind(&self) -> StepKind {
        match self {
            Self::Approve { .. } => StepKind::Approve,
            Self::Mint { .. } => StepKind::Mint,
            Self::MintAndDeposit { .. } => StepKind::Deposit,
        }
    }
}

/// Which user-facing step an error or call belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepKind {
    Approve,
    Mint,
    Deposit,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Mint => "mint",
            Self::Deposit => "deposit",
        }
    }
}

/// Outcome of an issued step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum StepStatus {
    Pending,
    Confirmed { tx_hash: TxHash },
    Failed { reason: String },
}

/// Issued step with its status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub step: TransactionStep,
    pub status: StepStatus,
}

/// Error categories surfaced to the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCategory {
    Configuration,
    ArithmeticPrecondition,
    RemoteCallFailure,
    StaleQuote,
    Usage,
}

/// Tranche protocol errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrancheError {
    #[error("No split-token series for {key}")]
    UnknownYieldSourceForSymbol { key: PositionKey },

    #[error("{role} is not deployed on network {network}")]
    UnconfiguredAddress { role: ContractRole, network: NetworkId },

    #[error("Pool factory {factory} lists no pool")]
    NoPoolForToken { factory: Address },

    #[error("Pool has zero pool-token reserve")]
    DivisionByZeroReserve,

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Amount overflows 256 bits")]
    AmountOverflow,

    #[error("Approval rejected: {0}")]
    ApprovalRejected(String),

    #[error("Approval reverted{}", fmt_reason(.reason))]
    ApprovalReverted { reason: Option<String> },

    #[error("Mint rejected: {0}")]
    MintRejected(String),

    #[error("Mint reverted{}", fmt_reason(.reason))]
    MintReverted { reason: Option<String> },

    #[error("Deposit rejected: {0}")]
    DepositRejected(String),

    #[error("Deposit reverted{}", fmt_reason(.reason))]
    DepositReverted { reason: Option<String> },

    #[error("Call timed out after {secs}s")]
    CallTimedOut { secs: u64 },

    #[error("Remote read failed: {0}")]
    RemoteRead(CallError),

    #[error("Quote moved {drift_bps} bps (tolerance {tolerance_bps} bps)")]
    QuoteStale { drift_bps: u64, tolerance_bps: u32 },

    #[error("Cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },
}

fn fmt_reason(reason: &Option<String>) -> String {
    reason
        .as_deref()
        .map(|r| format!(": {r}"))
        .unwrap_or_default()
}

impl TrancheError {
    /// Map a failed on-chain call to the error of the step that issued it
    pub fn from_step(step: StepKind, err: CallError) -> Self {
        match (step, err) {
            (_, CallError::Timeout { secs }) => Self::CallTimedOut { secs },
            (_, err @ CallError::Rpc { .. }) => Self::RemoteRead(err),
            (StepKind::Approve, CallError::Rejected { message }) => Self::ApprovalRejected(message),
            (StepKind::Approve, CallError::Reverted { reason }) => Self::ApprovalReverted { reason },
            (StepKind::Mint, CallError::Rejected { message }) => Self::MintRejected(message),
            (StepKind::Mint, CallError::Reverted { reason }) => Self::MintReverted { reason },
            (StepKind::Deposit, CallError::Rejected { message }) => Self::DepositRejected(message),
            (StepKind::Deposit, CallError::Reverted { reason }) => Self::DepositReverted { reason },
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownYieldSourceForSymbol { .. }
            | Self::UnconfiguredAddress { .. }
            | Self::NoPoolForToken { .. } => ErrorCategory::Configuration,
            Self::DivisionByZeroReserve | Self::InvalidAmount(_) | Self::AmountOverflow => {
                ErrorCategory::ArithmeticPrecondition
            }
            Self::ApprovalRejected(_)
            | Self::ApprovalReverted { .. }
            | Self::MintRejected(_)
            | Self::MintReverted { .. }
            | Self::DepositRejected(_)
            | Self::DepositReverted { .. }
            | Self::CallTimedOut { .. }
            | Self::RemoteRead(_) => ErrorCategory::RemoteCallFailure,
            Self::QuoteStale { .. } => ErrorCategory::StaleQuote,
            Self::InvalidTransition { .. } => ErrorCategory::Usage,
        }
    }

    /// Get an HTTP-friendly error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownYieldSourceForSymbol { .. } => "unknown_yield_source_for_symbol",
            Self::UnconfiguredAddress { .. } => "unconfigured_address",
            Self::NoPoolForToken { .. } => "no_pool_for_token",
            Self::DivisionByZeroReserve => "division_by_zero_reserve",
            Self::InvalidAmount(_) => "invalid_amount",
            Self::AmountOverflow => "amount_overflow",
            Self::ApprovalRejected(_) => "approval_rejected",
            Self::ApprovalReverted { .. } => "approval_reverted",
            Self::MintRejected(_) => "mint_rejected",
            Self::MintReverted { .. } => "mint_reverted",
            Self::DepositRejected(_) => "deposit_rejected",
            Self::DepositReverted { .. } => "deposit_reverted",
            Self::CallTimedOut { .. } => "call_timed_out",
            Self::RemoteRead(_) => "remote_read_failed",
            Self::QuoteStale { .. } => "quote_stale",
            Self::InvalidTransition { .. } => "invalid_transition",
        }
    }

    /// True when the user declined a wallet prompt (as opposed to a chain failure)
    pub fn is_user_rejection(&self) -> bool {
        matches!(
            self,
            Self::ApprovalRejected(_) | Self::MintRejected(_) | Self::DepositRejected(_)
        )
    }
}

/// Remote reads: a timeout keeps its own variant, anything else is a read failure
impl From<CallError> for TrancheError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Timeout { secs } => Self::CallTimedOut { secs },
            other => Self::RemoteRead(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_token_slots_follow_source_order() {
        for (i, source) in YieldSource::ALL.into_iter().enumerate() {
            let key = PositionKey::new(UnderlyingSymbol::Dai, source);
            assert_eq!(key.split_token_slot().unwrap(), i);
        }
    }

    #[test]
    fn test_usdc_has_no_series() {
        let key = PositionKey::new(UnderlyingSymbol::Usdc, YieldSource::Aave);
        let err = key.split_token_slot().unwrap_err();
        assert_eq!(err, TrancheError::UnknownYieldSourceForSymbol { key });
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.to_string(), "No split-token series for USDC/aave");
    }

    #[test]
    fn test_step_error_mapping() {
        let rejected = CallError::Rejected {
            message: "User denied transaction signature".into(),
        };
        let err = TrancheError::from_step(StepKind::Approve, rejected.clone());
        assert!(matches!(err, TrancheError::ApprovalRejected(_)));
        assert!(err.is_user_rejection());

        let err = TrancheError::from_step(StepKind::Deposit, rejected);
        assert_eq!(err.error_code(), "deposit_rejected");

        let err = TrancheError::from_step(
            StepKind::Mint,
            CallError::Reverted {
                reason: Some("paused".into()),
            },
        );
        assert_eq!(err.to_string(), "Mint reverted: paused");
        assert!(!err.is_user_rejection());

        let err = TrancheError::from_step(StepKind::Mint, CallError::Timeout { secs: 3 });
        assert_eq!(err, TrancheError::CallTimedOut { secs: 3 });
        assert_eq!(err.category(), ErrorCategory::RemoteCallFailure);
    }

    #[test]
    fn test_quote_serialization_is_tagged() {
        let quote = PositionQuote::PoolDeposit(PoolDepositQuote {
            required_underlying: Wei::from(2u64),
            expected_pool_tokens: Wei::from(1u64),
        });
        let json = serde_json::to_value(quote).unwrap();
        assert_eq!(json["kind"], "poolDeposit");
        assert!(json.get("requiredUnderlying").is_some());
    }
}
