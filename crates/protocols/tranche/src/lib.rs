//! Tranche Protocol Implementation
//!
//! Tranche splits a yield-bearing deposit into principal and yield tokens.
//! Users deposit underlying (DAI) against a yield source and receive equal
//! amounts of both split tokens, optionally supplying the result straight
//! into an AMM pool in the same call.

pub mod address_book;
pub mod calculator;
pub mod constants;
pub mod fetch;
pub mod pipeline;
pub mod state;

#[cfg(test)]
mod testing;

// Re-exports
pub use address_book::{AddressBook, AddressBookRecord, ContractRole, Feature};
pub use calculator::{compute_mint_quote, compute_pool_deposit_quote, compute_seed_quote};
pub use fetch::{quote_mint, quote_pool_amount_in, quote_pool_deposit, UnderlyingBalance};
pub use pipeline::{Flow, PipelineFailure, PipelineState, StepRequest, TransactionPipeline};
pub use state::{
    ErrorCategory, MintQuote, PoolDepositQuote, PositionKey, PositionQuote, StepKind, StepRecord,
    StepStatus, TrancheError, TransactionStep, UnderlyingSymbol, YieldSource,
};
