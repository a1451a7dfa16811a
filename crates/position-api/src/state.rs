//! Application state shared across position handlers

use std::collections::HashMap;
use std::sync::Arc;

use chain_client::{ContractProvider, SessionContext, SessionProvider};
use split_core::{AppConfig, CallError, NetworkId, ProtocolError};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tranche::{AddressBook, AddressBookRecord, Flow, PositionKey, TrancheError, TransactionPipeline};

/// Errors that can occur in the API layer
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Wallet not connected")]
    NotConnected,

    #[error("Position not found: {0}")]
    PositionNotFound(String),

    #[error(transparent)]
    Tranche(#[from] TrancheError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("Wallet session error: {0}")]
    Session(#[from] CallError),
}

impl ApiError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotConnected => "not_connected",
            Self::PositionNotFound(_) => "not_found",
            Self::Tranche(e) => e.error_code(),
            Self::Protocol(e) => e.error_code(),
            Self::Session(_) => "session_error",
        }
    }
}

struct Wallet {
    session: Arc<dyn SessionProvider>,
    contracts: Arc<dyn ContractProvider>,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: RwLock<AppConfig>,
    wallet: RwLock<Option<Wallet>>,
    /// Session and the address book record resolved for its network
    session: RwLock<Option<(SessionContext, AddressBookRecord)>>,
    pipelines: RwLock<HashMap<String, Arc<Mutex<TransactionPipeline>>>>,
}

impl AppState {
    /// Create a new application state with default config
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    /// Create with a specific config
    pub fn with_config(config: AppConfig) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config: RwLock::new(config),
                wallet: RwLock::new(None),
                session: RwLock::new(None),
                pipelines: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Get current config
    pub async fn config(&self) -> AppConfig {
        self.inner.config.read().await.clone()
    }

    /// Attach a wallet and read its network and signer
    pub async fn connect(
        &self,
        session: Arc<dyn SessionProvider>,
        contracts: Arc<dyn ContractProvider>,
    ) -> Result<SessionContext, ApiError> {
        {
            let mut wallet = self.inner.wallet.write().await;
            *wallet = Some(Wallet { session, contracts });
        }
        self.refresh_network().await
    }

    /// Re-read network and signer from the wallet.
    ///
    /// The session and address book record are replaced wholesale. Pipelines
    /// opened on another network are dropped.
    pub async fn refresh_network(&self) -> Result<SessionContext, ApiError> {
        let call_timeout = self.inner.config.read().await.pipeline.call_timeout();
        let ctx = {
            let wallet = self.inner.wallet.read().await;
            let wallet = wallet.as_ref().ok_or(ApiError::NotConnected)?;
            SessionContext::connect(wallet.session.as_ref(), wallet.contracts.clone(), call_timeout)
                .await?
        };

        let mut session = self.inner.session.write().await;
        let previous = session.as_ref().map(|(s, _)| s.network_id());
        if previous.is_some_and(|network| network != ctx.network_id()) {
            let mut pipelines = self.inner.pipelines.write().await;
            tracing::info!(
                dropped = pipelines.len(),
                network = %ctx.network_id(),
                "Network changed, dropping open positions"
            );
            pipelines.clear();
        }

        let expected = self.inner.config.read().await.network_id;
        if expected != ctx.network_id() {
            tracing::warn!(
                expected = %expected,
                network = %ctx.network_id(),
                "Wallet is on a different network than configured"
            );
        }

        let record = AddressBook::resolve(ctx.network_id());
        if record.configured_roles().is_empty() {
            tracing::warn!(network = %ctx.network_id(), "No deployment for network");
        }

        *session = Some((ctx.clone(), record));
        Ok(ctx)
    }

    /// Drop the wallet, session and every open position
    pub async fn disconnect(&self) {
        *self.inner.wallet.write().await = None;
        *self.inner.session.write().await = None;
        self.inner.pipelines.write().await.clear();
    }

    /// Current session
    pub async fn session(&self) -> Result<SessionContext, ApiError> {
        Ok(self.snapshot().await?.0)
    }

    /// Address book record for the connected network, or the configured
    /// one while disconnected
    pub async fn record(&self) -> AddressBookRecord {
        match self.inner.session.read().await.as_ref() {
            Some((_, record)) => record.clone(),
            None => AddressBook::resolve(self.inner.config.read().await.network_id),
        }
    }

    pub async fn network(&self) -> Option<NetworkId> {
        self.inner
            .session
            .read()
            .await
            .as_ref()
            .map(|(s, _)| s.network_id())
    }

    /// Session and record captured together for one handler call
    pub async fn snapshot(&self) -> Result<(SessionContext, AddressBookRecord), ApiError> {
        self.inner
            .session
            .read()
            .await
            .clone()
            .ok_or(ApiError::NotConnected)
    }

    /// Register a new pipeline and return its id
    pub async fn open_pipeline(&self, key: PositionKey, flow: Flow) -> String {
        let config = self.inner.config.read().await.pipeline.clone();
        let pipeline = TransactionPipeline::new(key, flow, config);
        let id = pipeline.id().to_string();
        tracing::info!(pipeline_id = %id, position = %key, ?flow, "Opened position");

        self.inner
            .pipelines
            .write()
            .await
            .insert(id.clone(), Arc::new(Mutex::new(pipeline)));
        id
    }

    pub async fn pipeline(&self, id: &str) -> Result<Arc<Mutex<TransactionPipeline>>, ApiError> {
        self.inner
            .pipelines
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| ApiError::PositionNotFound(id.to_string()))
    }

    pub async fn close_pipeline(&self, id: &str) -> Result<(), ApiError> {
        self.inner
            .pipelines
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ApiError::PositionNotFound(id.to_string()))
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_client::mock::MockChain;
    use split_core::Address;
    use tranche::{UnderlyingSymbol, YieldSource};

    fn chain(network: NetworkId) -> MockChain {
        MockChain::builder(network, Address::new("0x70997970C51812dc3A010C7d01b50e0d17dc79C8"))
            .build()
    }

    #[tokio::test]
    async fn test_not_connected() {
        let state = AppState::new();
        let err = state.session().await.unwrap_err();
        assert_eq!(err.error_code(), "not_connected");
        assert!(matches!(state.refresh_network().await, Err(ApiError::NotConnected)));
    }

    #[tokio::test]
    async fn test_connect_resolves_record() {
        let state = AppState::new();
        let chain = chain(NetworkId::LOCAL);
        let ctx = state
            .connect(Arc::new(chain.clone()), Arc::new(chain))
            .await
            .unwrap();

        assert_eq!(ctx.network_id(), NetworkId::LOCAL);
        assert!(state.record().await.tranche.is_configured());
        assert_eq!(state.network().await, Some(NetworkId::LOCAL));
    }

    #[tokio::test]
    async fn test_network_switch_replaces_record_and_drops_positions() {
        let state = AppState::new();
        let chain = chain(NetworkId::LOCAL);
        state
            .connect(Arc::new(chain.clone()), Arc::new(chain.clone()))
            .await
            .unwrap();
        let id = state
            .open_pipeline(
                PositionKey::new(UnderlyingSymbol::Dai, YieldSource::Aave),
                Flow::MintOnly,
            )
            .await;
        assert!(state.pipeline(&id).await.is_ok());

        chain.switch_network(NetworkId::MAINNET).await;
        state.refresh_network().await.unwrap();

        let (ctx, record) = state.snapshot().await.unwrap();
        assert_eq!(ctx.network_id(), NetworkId::MAINNET);
        assert_eq!(record, AddressBook::resolve(NetworkId::MAINNET));
        assert!(!record.tranche.is_configured());
        assert!(matches!(
            state.pipeline(&id).await,
            Err(ApiError::PositionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_close_pipeline() {
        let state = AppState::new();
        let id = state
            .open_pipeline(
                PositionKey::new(UnderlyingSymbol::Dai, YieldSource::Compound),
                Flow::MintAndDeposit,
            )
            .await;
        state.close_pipeline(&id).await.unwrap();
        assert!(state.close_pipeline(&id).await.is_err());
    }

    #[tokio::test]
    async fn test_snapshot_pairs_session_with_its_record() {
        let state = AppState::with_config(AppConfig {
            network_id: NetworkId::MAINNET,
            ..Default::default()
        });
        assert!(!state.record().await.tranche.is_configured());

        let chain = chain(NetworkId::LOCAL);
        state
            .connect(Arc::new(chain.clone()), Arc::new(chain))
            .await
            .unwrap();
        let (ctx, record) = state.snapshot().await.unwrap();
        assert_eq!(ctx.network_id(), NetworkId::LOCAL);
        assert_eq!(record.network_id, NetworkId::LOCAL);
        assert!(record.tranche.is_configured());

        state.disconnect().await;
        assert!(matches!(state.snapshot().await, Err(ApiError::NotConnected)));
    }
}
