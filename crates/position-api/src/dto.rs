//! Data Transfer Objects for position requests and responses

use serde::{Deserialize, Serialize};
use split_core::units::from_wei;
use tranche::{
    ErrorCategory, Flow, MintQuote, PipelineState, PoolDepositQuote, PositionKey, PositionQuote,
    StepRecord, StepStatus, TransactionPipeline, UnderlyingBalance, UnderlyingSymbol, YieldSource,
};

use crate::ApiError;

/// Underlying balance for the "Available" line
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceView {
    pub token: String,
    pub symbol: String,
    /// Decimal amount (e.g. "1000.0")
    pub balance: String,
    /// Raw wei, used for the MAX button
    pub balance_wei: String,
}

impl From<UnderlyingBalance> for BalanceView {
    fn from(b: UnderlyingBalance) -> Self {
        Self {
            token: b.token.to_string(),
            symbol: b.symbol,
            balance: from_wei(b.balance),
            balance_wei: b.balance.to_string(),
        }
    }
}

/// Preview for minting principal + yield tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintPreview {
    pub symbol: UnderlyingSymbol,
    pub source: YieldSource,
    pub input: String,
    pub fee: String,
    pub net_underlying: String,
    pub principal_out: String,
    pub yield_out: String,
    /// Echo back on confirm for the stale-quote check
    pub quote: PositionQuote,
}

impl MintPreview {
    pub fn new(key: PositionKey, input: &str, quote: MintQuote) -> Self {
        Self {
            symbol: key.symbol,
            source: key.source,
            input: input.trim().to_string(),
            fee: from_wei(quote.fee),
            net_underlying: from_wei(quote.net_underlying),
            principal_out: from_wei(quote.minted_principal),
            yield_out: from_wei(quote.minted_yield),
            quote: PositionQuote::Mint(quote),
        }
    }
}

/// Preview for supplying liquidity from underlying
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolDepositPreview {
    pub required_underlying: String,
    pub expected_pool_tokens: String,
    /// True when the pool is empty and the quote is the 1:1 seed
    pub seeding: bool,
    pub quote: PositionQuote,
}

impl PoolDepositPreview {
    pub fn new(quote: PoolDepositQuote, seeding: bool) -> Self {
        Self {
            required_underlying: from_wei(quote.required_underlying),
            expected_pool_tokens: from_wei(quote.expected_pool_tokens),
            seeding,
            quote: PositionQuote::PoolDeposit(quote),
        }
    }
}

/// Open a position pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPositionRequest {
    pub symbol: UnderlyingSymbol,
    pub source: YieldSource,
    pub flow: Flow,
}

/// Confirm (step 2) of a position
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    pub position_id: String,
    /// Decimal underlying amount
    pub amount: String,
    /// Quote from the preview the user confirmed
    #[serde(default)]
    pub quote: Option<PositionQuote>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepView {
    /// "approve" | "mint" | "deposit"
    pub kind: String,
    /// "pending" | "confirmed" | "failed"
    pub status: String,
    pub tx_hash: Option<String>,
    pub reason: Option<String>,
}

impl From<&StepRecord> for StepView {
    fn from(record: &StepRecord) -> Self {
        let kind = record.step.kind().as_str().to_string();
        match &record.status {
            StepStatus::Pending => Self {
                kind,
                status: "pending".to_string(),
                tx_hash: None,
                reason: None,
            },
            StepStatus::Confirmed { tx_hash } => Self {
                kind,
                status: "confirmed".to_string(),
                tx_hash: Some(tx_hash.to_string()),
                reason: None,
            },
            StepStatus::Failed { reason } => Self {
                kind,
                status: "failed".to_string(),
                tx_hash: None,
                reason: Some(reason.clone()),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureView {
    pub step: String,
    pub code: String,
    pub message: String,
    /// Declined in the wallet rather than failed on chain
    pub user_rejected: bool,
}

/// Pipeline status for one position
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStatusView {
    pub position_id: String,
    pub symbol: UnderlyingSymbol,
    pub source: YieldSource,
    pub flow: Flow,
    pub state: String,
    pub failure: Option<FailureView>,
    pub steps: Vec<StepView>,
    pub history: Vec<String>,
}

impl From<&TransactionPipeline> for PipelineStatusView {
    fn from(pipeline: &TransactionPipeline) -> Self {
        let key = pipeline.key();
        let failure = match pipeline.state() {
            PipelineState::Failed(f) => Some(FailureView {
                step: f.step.as_str().to_string(),
                code: f.error.error_code().to_string(),
                message: f.error.to_string(),
                user_rejected: f.error.is_user_rejection(),
            }),
            _ => None,
        };

        Self {
            position_id: pipeline.id().to_string(),
            symbol: key.symbol,
            source: key.source,
            flow: pipeline.flow(),
            state: pipeline.state().name().to_string(),
            failure,
            steps: pipeline.steps().iter().map(StepView::from).collect(),
            history: pipeline
                .history()
                .iter()
                .map(|s| s.name().to_string())
                .collect(),
        }
    }
}

/// Error body returned to the UI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub code: String,
    pub category: Option<ErrorCategory>,
    pub message: String,
}

impl From<&ApiError> for ErrorResponse {
    fn from(err: &ApiError) -> Self {
        let category = match err {
            ApiError::Tranche(e) => Some(e.category()),
            _ => None,
        };
        Self {
            code: err.error_code().to_string(),
            category,
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use split_core::units::to_wei;

    #[test]
    fn test_mint_preview_wire_format() {
        let quote = tranche::compute_mint_quote(
            to_wei("100").unwrap(),
            split_core::Wei::ZERO,
            split_core::constants::WAD,
        )
        .unwrap();
        let preview = MintPreview::new(
            PositionKey::new(UnderlyingSymbol::Dai, YieldSource::Aave),
            " 100 ",
            quote,
        );

        let json = serde_json::to_value(&preview).unwrap();
        assert_eq!(json["symbol"], "DAI");
        assert_eq!(json["source"], "aave");
        assert_eq!(json["input"], "100");
        assert!(json["principalOut"].as_str().unwrap().starts_with("100"));
        assert_eq!(json["quote"]["kind"], "mint");
    }

    #[test]
    fn test_confirm_request_quote_optional() {
        let req: ConfirmRequest =
            serde_json::from_str(r#"{"positionId":"abc","amount":"1.5"}"#).unwrap();
        assert_eq!(req.position_id, "abc");
        assert!(req.quote.is_none());
    }

    #[test]
    fn test_error_response_category() {
        let err = ApiError::Tranche(tranche::TrancheError::DivisionByZeroReserve);
        let body = ErrorResponse::from(&err);
        assert_eq!(body.code, err.error_code());
        assert!(body.category.is_some());

        let body = ErrorResponse::from(&ApiError::NotConnected);
        assert_eq!(body.code, "not_connected");
        assert!(body.category.is_none());
    }
}
