//! Configuration types for splitwell

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, NetworkId, Wei};

/// RPC connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// JSON-RPC URL (e.g., "http://127.0.0.1:8545")
    pub url: String,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8545".to_string(),
        }
    }
}

/// How much allowance the approve step grants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalPolicy {
    /// Max uint256, so later positions skip the approve step
    Unlimited,
    /// Exactly the amount being deposited
    Exact,
}

/// Transaction pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Timeout for each remote read or on-chain call
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Liquidity deadline is now + this many seconds
    #[serde(default = "default_deadline_window_secs")]
    pub deadline_window_secs: u64,

    #[serde(default = "default_approval")]
    pub approval: ApprovalPolicy,

    /// Minimum pool tokens accepted by the liquidity call (wei, decimal string)
    #[serde(default)]
    pub min_liquidity_out: String,

    /// Abort with QuoteStale when a displayed quote drifted more than this
    #[serde(default)]
    pub quote_tolerance_bps: Option<u32>,
}

fn default_call_timeout_secs() -> u64 {
    120
}

fn default_deadline_window_secs() -> u64 {
    10 * 60
}

fn default_approval() -> ApprovalPolicy {
    ApprovalPolicy::Unlimited
}

impl PipelineConfig {
    /// Parsed `min_liquidity_out`; empty means zero
    pub fn min_liquidity_out(&self) -> Result<Wei, Error> {
        let raw = self.min_liquidity_out.trim();
        if raw.is_empty() {
            return Ok(Wei::ZERO);
        }
        raw.parse::<Wei>()
            .map_err(|e| Error::Config(format!("min_liquidity_out {raw:?}: {e}")))
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            call_timeout_secs: default_call_timeout_secs(),
            deadline_window_secs: default_deadline_window_secs(),
            approval: default_approval(),
            min_liquidity_out: String::new(),
            quote_tolerance_bps: None,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub rpc: RpcConfig,

    /// Network the app expects to connect to
    #[serde(default = "default_network_id")]
    pub network_id: NetworkId,

    #[serde(default)]
    pub pipeline: PipelineConfig,
}

fn default_network_id() -> NetworkId {
    NetworkId::LOCAL
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rpc: RpcConfig::default(),
            network_id: default_network_id(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from a JSON document; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        let pipeline = &self.pipeline;
        if pipeline.call_timeout_secs == 0 {
            return Err(Error::Config("call_timeout_secs must be positive".to_string()));
        }
        if pipeline.deadline_window_secs == 0 {
            return Err(Error::Config("deadline_window_secs must be positive".to_string()));
        }
        pipeline.min_liquidity_out()?;
        Ok(())
    }
}
