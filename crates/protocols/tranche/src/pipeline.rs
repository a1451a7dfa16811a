//! Transaction Pipeline
//!
//! Finite state machine driving the on-chain calls for one position:
//!
//!   Idle → Approving → Minting → [DepositingLiquidity] → Settled
//!
//! with `Failed` reachable from every non-terminal state. Each transition
//! issues at most one on-chain call and awaits it before the next; the
//! methods take `&mut self`, so one pipeline never has two calls in flight.

use std::time::{SystemTime, UNIX_EPOCH};

use chain_client::SessionContext;
use serde::{Deserialize, Serialize};
use split_core::config::{ApprovalPolicy, PipelineConfig};
use split_core::{TxHash, Wei};

use crate::address_book::{AddressBookRecord, ContractRole};
use crate::calculator;
use crate::fetch;
use crate::state::{
    PositionKey, PositionQuote, StepKind, StepRecord, StepStatus, TransactionStep, TrancheError,
};

/// What the pipeline does after approval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Flow {
    /// approve → issueFromUnderlying
    MintOnly,
    /// approve → addLiquidityFromUnderlying
    MintAndDeposit,
}

/// Why a pipeline stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineFailure {
    pub step: StepKind,
    pub error: TrancheError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    /// Allowance granted, waiting for the user to confirm
    Approving,
    Minting,
    DepositingLiquidity,
    Settled,
    Failed(PipelineFailure),
}

impl PipelineState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Approving => "approving",
            Self::Minting => "minting",
            Self::DepositingLiquidity => "depositingLiquidity",
            Self::Settled => "settled",
            Self::Failed(_) => "failed",
        }
    }

    pub fn failure(&self) -> Option<&PipelineFailure> {
        match self {
            Self::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Input to the confirm step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRequest {
    /// Underlying amount to deposit (wei)
    pub amount: Wei,
    /// Quote the user was shown, checked against fresh state when a
    /// tolerance is configured
    pub quote: Option<PositionQuote>,
}

impl StepRequest {
    pub fn new(amount: Wei) -> Self {
        Self {
            amount,
            quote: None,
        }
    }

    pub fn with_quote(mut self, quote: PositionQuote) -> Self {
        self.quote = Some(quote);
        self
    }
}

pub struct TransactionPipeline {
    id: String,
    key: PositionKey,
    flow: Flow,
    config: PipelineConfig,
    state: PipelineState,
    /// Allowance the spender holds after the last successful approve
    approved: Option<Wei>,
    steps: Vec<StepRecord>,
    history: Vec<PipelineState>,
}

impl TransactionPipeline {
    pub fn new(key: PositionKey, flow: Flow, config: PipelineConfig) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            key,
            flow,
            config,
            state: PipelineState::Idle,
            approved: None,
            steps: Vec::new(),
            history: vec![PipelineState::Idle],
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn key(&self) -> PositionKey {
        self.key
    }

    pub fn flow(&self) -> Flow {
        self.flow
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Every issued step with its status, oldest first
    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    /// Every state entered, starting with `Idle`
    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    /// Step 1: grant the spender an allowance over the underlying.
    ///
    /// Allowed from `Idle` and `Failed`. While `Approving`, a repeat for an
    /// amount the granted allowance already covers is a no-op; a larger
    /// amount raises the allowance.
    pub async fn approve(
        &mut self,
        ctx: &SessionContext,
        record: &AddressBookRecord,
        amount: Wei,
    ) -> Result<(), TrancheError> {
        match self.state {
            PipelineState::Idle | PipelineState::Failed(_) => {}
            PipelineState::Approving if self.approved.is_some_and(|granted| amount <= granted) => {
                tracing::debug!(pipeline_id = %self.id, "Approval already granted, ignoring repeat");
                return Ok(());
            }
            PipelineState::Approving => {
                tracing::info!(pipeline_id = %self.id, %amount, "Raising approval");
            }
            _ => return Err(self.invalid("approve")),
        }

        match self.run_approve(ctx, record, amount).await {
            Ok(granted) => {
                self.approved = Some(granted);
                if self.state != PipelineState::Approving {
                    self.transition(PipelineState::Approving);
                }
                Ok(())
            }
            Err(e) => {
                self.approved = None;
                Err(self.fail(StepKind::Approve, e))
            }
        }
    }

    /// Returns the allowance the spender holds afterwards
    async fn run_approve(
        &mut self,
        ctx: &SessionContext,
        record: &AddressBookRecord,
        amount: Wei,
    ) -> Result<Wei, TrancheError> {
        if amount.is_zero() {
            return Err(TrancheError::InvalidAmount("amount must be positive".to_string()));
        }

        let token = record.require(ContractRole::Underlying(self.key.symbol))?.clone();
        let spender = match self.flow {
            Flow::MintOnly => record.require(ContractRole::Splitter)?.clone(),
            Flow::MintAndDeposit => fetch::resolve_pool(ctx, record).await?,
        };

        let current = ctx
            .call(ctx.token(&token).allowance(ctx.signer(), &spender))
            .await?;
        if current >= amount {
            tracing::info!(
                pipeline_id = %self.id,
                spender = %spender,
                allowance = %current,
                "Allowance already sufficient, skipping approve call"
            );
            return Ok(current);
        }

        let approval = match self.config.approval {
            ApprovalPolicy::Unlimited => Wei::MAX,
            ApprovalPolicy::Exact => amount,
        };
        self.submit(
            ctx,
            TransactionStep::Approve {
                token,
                spender,
                amount: approval,
            },
        )
        .await?;
        Ok(approval)
    }

    /// Step 2: mint, or mint and deposit, from `Approving`
    pub async fn confirm(
        &mut self,
        ctx: &SessionContext,
        record: &AddressBookRecord,
        request: StepRequest,
    ) -> Result<TxHash, TrancheError> {
        if self.state != PipelineState::Approving {
            return Err(self.invalid("confirm"));
        }

        self.transition(PipelineState::Minting);
        let step = match self.flow {
            Flow::MintOnly => StepKind::Mint,
            Flow::MintAndDeposit => StepKind::Deposit,
        };

        match self.run_confirm(ctx, record, &request).await {
            Ok(tx_hash) => {
                self.transition(PipelineState::Settled);
                Ok(tx_hash)
            }
            Err(e) => Err(self.fail(step, e)),
        }
    }

    async fn run_confirm(
        &mut self,
        ctx: &SessionContext,
        record: &AddressBookRecord,
        request: &StepRequest,
    ) -> Result<TxHash, TrancheError> {
        if request.amount.is_zero() {
            return Err(TrancheError::InvalidAmount("amount must be positive".to_string()));
        }
        let granted = self.approved.unwrap_or_default();
        if request.amount > granted {
            return Err(TrancheError::InvalidAmount(format!(
                "amount {} exceeds approved allowance {granted}",
                request.amount
            )));
        }

        let split_token = fetch::resolve_split_token(ctx, record, self.key).await?;
        self.check_quote(ctx, record, request).await?;

        match self.flow {
            Flow::MintOnly => {
                let splitter = record.require(ContractRole::Splitter)?.clone();
                self.submit(
                    ctx,
                    TransactionStep::Mint {
                        splitter,
                        split_token,
                        amount: request.amount,
                    },
                )
                .await
            }
            Flow::MintAndDeposit => {
                let pool = fetch::resolve_pool(ctx, record).await?;
                let min_out = self
                    .config
                    .min_liquidity_out()
                    .map_err(|e| TrancheError::InvalidAmount(e.to_string()))?;
                let deadline = self.deadline()?;
                self.transition(PipelineState::DepositingLiquidity);
                self.submit(
                    ctx,
                    TransactionStep::MintAndDeposit {
                        pool,
                        split_token,
                        recipient: ctx.signer().clone(),
                        amount: request.amount,
                        min_out,
                        deadline,
                    },
                )
                .await
            }
        }
    }

    /// Return a failed or settled pipeline to `Idle`
    pub fn reset(&mut self) -> Result<(), TrancheError> {
        match self.state {
            PipelineState::Failed(_) | PipelineState::Settled => {
                self.approved = None;
                self.transition(PipelineState::Idle);
                Ok(())
            }
            _ => Err(self.invalid("reset")),
        }
    }

    /// Abort with `QuoteStale` when the quote the user saw has drifted
    async fn check_quote(
        &self,
        ctx: &SessionContext,
        record: &AddressBookRecord,
        request: &StepRequest,
    ) -> Result<(), TrancheError> {
        let (Some(tolerance_bps), Some(quoted)) = (self.config.quote_tolerance_bps, request.quote)
        else {
            return Ok(());
        };

        let (shown, current) = match quoted {
            PositionQuote::Mint(shown) => {
                let fresh = fetch::quote_mint(ctx, record, self.key, request.amount).await?;
                (shown.minted_principal, fresh.minted_principal)
            }
            PositionQuote::PoolDeposit(shown) => {
                let fresh =
                    fetch::quote_pool_deposit(ctx, record, shown.expected_pool_tokens).await?;
                (shown.required_underlying, fresh.required_underlying)
            }
        };

        let drift_bps = calculator::quote_drift_bps(shown, current);
        if drift_bps > u64::from(tolerance_bps) {
            return Err(TrancheError::QuoteStale {
                drift_bps,
                tolerance_bps,
            });
        }
        Ok(())
    }

    /// Issue one on-chain call and record its outcome
    async fn submit(
        &mut self,
        ctx: &SessionContext,
        step: TransactionStep,
    ) -> Result<TxHash, TrancheError> {
        let kind = step.kind();
        tracing::info!(pipeline_id = %self.id, step = kind.as_str(), "Submitting transaction");

        self.steps.push(StepRecord {
            step: step.clone(),
            status: StepStatus::Pending,
        });
        let index = self.steps.len() - 1;

        let result = match &step {
            TransactionStep::Approve {
                token,
                spender,
                amount,
            } => ctx.call(ctx.token(token).approve(spender, *amount)).await,
            TransactionStep::Mint {
                splitter,
                split_token,
                amount,
            } => {
                ctx.call(ctx.splitter(splitter).issue_from_underlying(split_token, *amount))
                    .await
            }
            TransactionStep::MintAndDeposit {
                pool,
                split_token,
                recipient,
                amount,
                min_out,
                deadline,
            } => {
                ctx.call(ctx.pool(pool).add_liquidity_from_underlying(
                    split_token,
                    recipient,
                    *amount,
                    *min_out,
                    *deadline,
                ))
                .await
            }
        };

        match result.and_then(|receipt| receipt.into_confirmed()) {
            Ok(receipt) => {
                tracing::info!(
                    pipeline_id = %self.id,
                    step = kind.as_str(),
                    tx_hash = %receipt.tx_hash,
                    "Transaction confirmed"
                );
                self.steps[index].status = StepStatus::Confirmed {
                    tx_hash: receipt.tx_hash.clone(),
                };
                Ok(receipt.tx_hash)
            }
            Err(e) => {
                let err = TrancheError::from_step(kind, e);
                self.steps[index].status = StepStatus::Failed {
                    reason: err.to_string(),
                };
                Err(err)
            }
        }
    }

    fn deadline(&self) -> Result<u64, TrancheError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        now.checked_add(self.config.deadline_window_secs)
            .ok_or_else(|| {
                TrancheError::InvalidAmount(format!(
                    "deadline window {}s overflows",
                    self.config.deadline_window_secs
                ))
            })
    }

    fn transition(&mut self, next: PipelineState) {
        tracing::info!(
            pipeline_id = %self.id,
            position = %self.key,
            from = self.state.name(),
            to = next.name(),
            "Pipeline transition"
        );
        self.history.push(next.clone());
        self.state = next;
    }

    fn fail(&mut self, step: StepKind, error: TrancheError) -> TrancheError {
        tracing::warn!(
            pipeline_id = %self.id,
            step = step.as_str(),
            code = error.error_code(),
            "Pipeline failed: {}",
            error
        );
        self.transition(PipelineState::Failed(PipelineFailure {
            step,
            error: error.clone(),
        }));
        error
    }

    fn invalid(&self, action: &'static str) -> TrancheError {
        TrancheError::InvalidTransition {
            action,
            state: self.state.name(),
        }
    }
}
