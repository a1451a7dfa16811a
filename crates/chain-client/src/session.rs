//! Session context
//!
//! Snapshot of the connected wallet (network + signer) together with the
//! contract bindings. A network change produces a new context; an existing
//! one is never mutated.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use split_core::{Address, NetworkId};

use crate::{
    timed_call, AdapterContract, ContractProvider, Pool, PoolFactory, Result, SessionProvider,
    SplittingContract, TokenContract,
};

/// Explicit session passed into every operation needing network or signer
#[derive(Clone)]
pub struct SessionContext {
    network_id: NetworkId,
    signer: Address,
    contracts: Arc<dyn ContractProvider>,
    call_timeout: Duration,
}

impl SessionContext {
    /// Read network id and signer from the wallet once
    pub async fn connect(
        session: &dyn SessionProvider,
        contracts: Arc<dyn ContractProvider>,
        call_timeout: Duration,
    ) -> Result<Self> {
        let network_id = timed_call(call_timeout, session.network_id()).await?;
        let signer = timed_call(call_timeout, session.signer_address()).await?;

        tracing::info!(network = %network_id, signer = %signer, "Session connected");

        Ok(Self::new(network_id, signer, contracts, call_timeout))
    }

    pub fn new(
        network_id: NetworkId,
        signer: Address,
        contracts: Arc<dyn ContractProvider>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            network_id,
            signer,
            contracts,
            call_timeout,
        }
    }

    pub fn network_id(&self) -> NetworkId {
        self.network_id
    }

    pub fn signer(&self) -> &Address {
        &self.signer
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Await a chain call under this session's timeout
    pub async fn call<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        timed_call(self.call_timeout, fut).await
    }

    pub fn token(&self, address: &Address) -> Arc<dyn TokenContract> {
        self.contracts.token(address)
    }

    pub fn splitter(&self, address: &Address) -> Arc<dyn SplittingContract> {
        self.contracts.splitter(address)
    }

    pub fn adapter(&self, address: &Address) -> Arc<dyn AdapterContract> {
        self.contracts.adapter(address)
    }

    pub fn pool_factory(&self, address: &Address) -> Arc<dyn PoolFactory> {
        self.contracts.pool_factory(address)
    }

    pub fn pool(&self, address: &Address) -> Arc<dyn Pool> {
        self.contracts.pool(address)
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("network_id", &self.network_id)
            .field("signer", &self.signer)
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}
