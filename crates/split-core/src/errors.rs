//! Error types for splitwell

use thiserror::Error;

/// Core errors that can occur in splitwell
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Failure of a single remote read or on-chain call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// The wallet declined the signing prompt
    #[error("Rejected by wallet: {message}")]
    Rejected { message: String },

    #[error("Call reverted{}", .reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default())]
    Reverted { reason: Option<String> },

    #[error("Call timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("RPC error: {message}")]
    Rpc { message: String },
}

impl CallError {
    /// Raw revert text, when the chain returned one
    pub fn revert_reason(&self) -> Option<&str> {
        match self {
            Self::Reverted { reason } => reason.as_deref(),
            _ => None,
        }
    }
}

/// Protocol-level input errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Invalid amount: {message}")]
    InvalidAmount { message: String },
}

impl ProtocolError {
    /// Get an HTTP-friendly error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidAmount { .. } => "invalid_amount",
        }
    }
}
