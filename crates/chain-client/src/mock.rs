//! In-memory chain for tests and demos
//!
//! `MockChain` implements every capability trait over shared state. It
//! records each state-changing call so tests can assert call ordering, and
//! lets a test script one-shot failures (wallet rejection, reverts).
//! Allowances are enforced the way an ERC-20 would: issuing or depositing
//! without a sufficient approval reverts.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use split_core::{Address, CallError, NetworkId, TxHash, Wei};
use tokio::sync::Mutex;

use crate::{
    AdapterContract, ContractProvider, Pool, PoolFactory, PoolReserves, ReceiptStatus, Result,
    SeriesInfo, SessionProvider, SplittingContract, TokenContract, TxReceipt,
};

/// State-changing entry points that can be scripted to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockMethod {
    Approve,
    IssueFromUnderlying,
    AddLiquidity,
}

/// Scripted result for the next call to a [`MockMethod`]
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// The call fails before a receipt exists (wallet rejection, RPC error)
    Error(CallError),
    /// The transaction is mined but reverts
    RevertedReceipt(Option<String>),
}

/// A state-changing call observed by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    Approve {
        token: Address,
        spender: Address,
        amount: Wei,
    },
    IssueFromUnderlying {
        splitter: Address,
        split_token: Address,
        amount: Wei,
    },
    AddLiquidityFromUnderlying {
        pool: Address,
        split_token: Address,
        recipient: Address,
        amount: Wei,
        min_out: Wei,
        deadline: u64,
    },
}

#[derive(Debug, Default)]
struct TokenState {
    symbol: String,
    balances: HashMap<Address, Wei>,
    allowances: HashMap<(Address, Address), Wei>,
}

#[derive(Debug, Default)]
struct SplitterState {
    underlying: Address,
    split_tokens: Vec<Address>,
    series: HashMap<Address, Address>,
    stored_scales: HashMap<(Address, Address), Wei>,
}

#[derive(Debug, Default)]
struct AdapterState {
    fee_rate: Wei,
    scale_stored: Wei,
}

#[derive(Debug)]
struct PoolState {
    underlying: Address,
    reserves: PoolReserves,
}

#[derive(Debug)]
struct MockState {
    network_id: NetworkId,
    signer: Address,
    tokens: HashMap<Address, TokenState>,
    splitters: HashMap<Address, SplitterState>,
    adapters: HashMap<Address, AdapterState>,
    factories: HashMap<Address, Vec<Address>>,
    pools: HashMap<Address, PoolState>,
    failures: HashMap<MockMethod, MockOutcome>,
    write_delay: Option<Duration>,
    calls: Vec<RecordedCall>,
    next_tx: u64,
}

impl MockState {
    fn take_failure(&mut self, method: MockMethod) -> Option<MockOutcome> {
        self.failures.remove(&method)
    }

    fn next_receipt(&mut self, status: ReceiptStatus) -> TxReceipt {
        self.next_tx += 1;
        TxReceipt {
            tx_hash: TxHash::new(format!("0x{:064x}", self.next_tx)),
            block_number: Some(self.next_tx),
            status,
        }
    }

    /// Apply a scripted failure, if any. Recorded calls are kept only for
    /// transactions that reach the chain.
    fn scripted(&mut self, method: MockMethod, call: RecordedCall) -> Option<Result<TxReceipt>> {
        match self.take_failure(method)? {
            MockOutcome::Error(err) => Some(Err(err)),
            MockOutcome::RevertedReceipt(reason) => {
                self.calls.push(call);
                Some(Ok(self.next_receipt(ReceiptStatus::Reverted { reason })))
            }
        }
    }

    /// Move `amount` of `token` from `owner` using `spender`'s allowance
    fn spend(
        &mut self,
        token: &Address,
        owner: &Address,
        spender: &Address,
        amount: Wei,
    ) -> std::result::Result<(), String> {
        let state = self
            .tokens
            .get_mut(token)
            .ok_or_else(|| format!("no token at {token}"))?;

        let key = (owner.clone(), spender.clone());
        let allowance = state.allowances.get(&key).copied().unwrap_or_default();
        if allowance < amount {
            return Err("ERC20: insufficient allowance".to_string());
        }
        let balance = state.balances.get(owner).copied().unwrap_or_default();
        if balance < amount {
            return Err("ERC20: transfer amount exceeds balance".to_string());
        }

        if allowance != Wei::MAX {
            state.allowances.insert(key, allowance - amount);
        }
        state.balances.insert(owner.clone(), balance - amount);
        Ok(())
    }
}

fn missing(kind: &str, address: &Address) -> CallError {
    CallError::Rpc {
        message: format!("no {kind} contract at {address}"),
    }
}

/// In-memory chain implementing every capability
#[derive(Clone)]
pub struct MockChain {
    state: Arc<Mutex<MockState>>,
}

/// Builder for [`MockChain`]
pub struct MockChainBuilder {
    state: MockState,
}

impl MockChainBuilder {
    /// Deploy an ERC-20 and credit `signer_balance` to the session signer
    pub fn token(mut self, address: &Address, symbol: &str, signer_balance: Wei) -> Self {
        let mut token = TokenState {
            symbol: symbol.to_string(),
            ..Default::default()
        };
        token
            .balances
            .insert(self.state.signer.clone(), signer_balance);
        self.state.tokens.insert(address.clone(), token);
        self
    }

    /// Pre-existing allowance from the signer
    pub fn allowance(mut self, token: &Address, spender: &Address, amount: Wei) -> Self {
        if let Some(state) = self.state.tokens.get_mut(token) {
            state
                .allowances
                .insert((self.state.signer.clone(), spender.clone()), amount);
        }
        self
    }

    /// Deploy a splitting contract over `underlying`
    pub fn splitter(mut self, address: &Address, underlying: &Address, split_tokens: Vec<Address>) -> Self {
        self.state.splitters.insert(
            address.clone(),
            SplitterState {
                underlying: underlying.clone(),
                split_tokens,
                ..Default::default()
            },
        );
        self
    }

    /// Register a series (split token → adapter) on a splitter
    pub fn series(mut self, splitter: &Address, split_token: &Address, adapter: &Address) -> Self {
        if let Some(state) = self.state.splitters.get_mut(splitter) {
            state.series.insert(split_token.clone(), adapter.clone());
        }
        self
    }

    /// Signer's stored scale for a split token
    pub fn stored_scale(mut self, splitter: &Address, split_token: &Address, scale: Wei) -> Self {
        let signer = self.state.signer.clone();
        if let Some(state) = self.state.splitters.get_mut(splitter) {
            state
                .stored_scales
                .insert((split_token.clone(), signer), scale);
        }
        self
    }

    pub fn adapter(mut self, address: &Address, fee_rate: Wei, scale_stored: Wei) -> Self {
        self.state.adapters.insert(
            address.clone(),
            AdapterState {
                fee_rate,
                scale_stored,
            },
        );
        self
    }

    pub fn factory(mut self, address: &Address, pools: Vec<Address>) -> Self {
        self.state.factories.insert(address.clone(), pools);
        self
    }

    pub fn pool(mut self, address: &Address, underlying: &Address, reserves: PoolReserves) -> Self {
        self.state.pools.insert(
            address.clone(),
            PoolState {
                underlying: underlying.clone(),
                reserves,
            },
        );
        self
    }

    /// Script the next call to `method`
    pub fn fail(mut self, method: MockMethod, outcome: MockOutcome) -> Self {
        self.state.failures.insert(method, outcome);
        self
    }

    /// Delay every state-changing call (for timeout tests)
    pub fn write_delay(mut self, delay: Duration) -> Self {
        self.state.write_delay = Some(delay);
        self
    }

    pub fn build(self) -> MockChain {
        MockChain {
            state: Arc::new(Mutex::new(self.state)),
        }
    }
}

impl MockChain {
    pub fn builder(network_id: NetworkId, signer: Address) -> MockChainBuilder {
        MockChainBuilder {
            state: MockState {
                network_id,
                signer,
                tokens: HashMap::new(),
                splitters: HashMap::new(),
                adapters: HashMap::new(),
                factories: HashMap::new(),
                pools: HashMap::new(),
                failures: HashMap::new(),
                write_delay: None,
                calls: Vec::new(),
                next_tx: 0,
            },
        }
    }

    /// State-changing calls that reached the chain, in order
    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn fail_next(&self, method: MockMethod, outcome: MockOutcome) {
        self.state.lock().await.failures.insert(method, outcome);
    }

    /// Simulate the wallet switching networks
    pub async fn switch_network(&self, network_id: NetworkId) {
        self.state.lock().await.network_id = network_id;
    }

    pub async fn set_fee_rate(&self, adapter: &Address, fee_rate: Wei) {
        if let Some(state) = self.state.lock().await.adapters.get_mut(adapter) {
            state.fee_rate = fee_rate;
        }
    }

    pub async fn set_reserves(&self, pool: &Address, reserves: PoolReserves) {
        if let Some(state) = self.state.lock().await.pools.get_mut(pool) {
            state.reserves = reserves;
        }
    }

    pub async fn token_balance(&self, token: &Address, owner: &Address) -> Wei {
        let state = self.state.lock().await;
        state
            .tokens
            .get(token)
            .and_then(|t| t.balances.get(owner).copied())
            .unwrap_or_default()
    }

    async fn write_delay(&self) {
        let delay = self.state.lock().await.write_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl SessionProvider for MockChain {
    async fn network_id(&self) -> Result<NetworkId> {
        Ok(self.state.lock().await.network_id)
    }

    async fn signer_address(&self) -> Result<Address> {
        Ok(self.state.lock().await.signer.clone())
    }
}

impl ContractProvider for MockChain {
    fn token(&self, address: &Address) -> Arc<dyn TokenContract> {
        Arc::new(MockContract::new(address, self))
    }

    fn splitter(&self, address: &Address) -> Arc<dyn SplittingContract> {
        Arc::new(MockContract::new(address, self))
    }

    fn adapter(&self, address: &Address) -> Arc<dyn AdapterContract> {
        Arc::new(MockContract::new(address, self))
    }

    fn pool_factory(&self, address: &Address) -> Arc<dyn PoolFactory> {
        Arc::new(MockContract::new(address, self))
    }

    fn pool(&self, address: &Address) -> Arc<dyn Pool> {
        Arc::new(MockContract::new(address, self))
    }
}

/// Contract handle bound to one address on the mock chain
struct MockContract {
    address: Address,
    chain: MockChain,
}

impl MockContract {
    fn new(address: &Address, chain: &MockChain) -> Self {
        Self {
            address: address.clone(),
            chain: chain.clone(),
        }
    }
}

#[async_trait]
impl TokenContract for MockContract {
    fn address(&self) -> &Address {
        &self.address
    }

    async fn balance_of(&self, owner: &Address) -> Result<Wei> {
        let state = self.chain.state.lock().await;
        let token = state
            .tokens
            .get(&self.address)
            .ok_or_else(|| missing("token", &self.address))?;
        Ok(token.balances.get(owner).copied().unwrap_or_default())
    }

    async fn symbol(&self) -> Result<String> {
        let state = self.chain.state.lock().await;
        let token = state
            .tokens
            .get(&self.address)
            .ok_or_else(|| missing("token", &self.address))?;
        Ok(token.symbol.clone())
    }

    async fn allowance(&self, owner: &Address, spender: &Address) -> Result<Wei> {
        let state = self.chain.state.lock().await;
        let token = state
            .tokens
            .get(&self.address)
            .ok_or_else(|| missing("token", &self.address))?;
        Ok(token
            .allowances
            .get(&(owner.clone(), spender.clone()))
            .copied()
            .unwrap_or_default())
    }

    async fn approve(&self, spender: &Address, amount: Wei) -> Result<TxReceipt> {
        self.chain.write_delay().await;
        let mut state = self.chain.state.lock().await;
        if !state.tokens.contains_key(&self.address) {
            return Err(missing("token", &self.address));
        }

        let call = RecordedCall::Approve {
            token: self.address.clone(),
            spender: spender.clone(),
            amount,
        };
        if let Some(result) = state.scripted(MockMethod::Approve, call.clone()) {
            return result;
        }

        let owner = state.signer.clone();
        if let Some(token) = state.tokens.get_mut(&self.address) {
            token.allowances.insert((owner, spender.clone()), amount);
        }
        state.calls.push(call);
        Ok(state.next_receipt(ReceiptStatus::Confirmed))
    }
}

#[async_trait]
impl SplittingContract for MockContract {
    fn address(&self) -> &Address {
        &self.address
    }

    async fn split_token_addresses(&self) -> Result<Vec<Address>> {
        let state = self.chain.state.lock().await;
        let splitter = state
            .splitters
            .get(&self.address)
            .ok_or_else(|| missing("splitter", &self.address))?;
        Ok(splitter.split_tokens.clone())
    }

    async fn series_info(&self, split_token: &Address) -> Result<SeriesInfo> {
        let state = self.chain.state.lock().await;
        let splitter = state
            .splitters
            .get(&self.address)
            .ok_or_else(|| missing("splitter", &self.address))?;
        let adapter = splitter
            .series
            .get(split_token)
            .cloned()
            .ok_or_else(|| CallError::Reverted {
                reason: Some("series not found".to_string()),
            })?;
        Ok(SeriesInfo { adapter })
    }

    async fn stored_scale(&self, split_token: &Address, owner: &Address) -> Result<Wei> {
        let state = self.chain.state.lock().await;
        let splitter = state
            .splitters
            .get(&self.address)
            .ok_or_else(|| missing("splitter", &self.address))?;
        Ok(splitter
            .stored_scales
            .get(&(split_token.clone(), owner.clone()))
            .copied()
            .unwrap_or_default())
    }

    async fn issue_from_underlying(&self, split_token: &Address, amount: Wei) -> Result<TxReceipt> {
        self.chain.write_delay().await;
        let mut state = self.chain.state.lock().await;
        let (underlying, known) = {
            let splitter = state
                .splitters
                .get(&self.address)
                .ok_or_else(|| missing("splitter", &self.address))?;
            (
                splitter.underlying.clone(),
                splitter.split_tokens.contains(split_token),
            )
        };

        let call = RecordedCall::IssueFromUnderlying {
            splitter: self.address.clone(),
            split_token: split_token.clone(),
            amount,
        };
        if let Some(result) = state.scripted(MockMethod::IssueFromUnderlying, call.clone()) {
            return result;
        }

        state.calls.push(call);
        if !known {
            return Ok(state.next_receipt(ReceiptStatus::Reverted {
                reason: Some("unknown series".to_string()),
            }));
        }
        let signer = state.signer.clone();
        let status = match state.spend(&underlying, &signer, &self.address, amount) {
            Ok(()) => ReceiptStatus::Confirmed,
            Err(reason) => ReceiptStatus::Reverted {
                reason: Some(reason),
            },
        };
        Ok(state.next_receipt(status))
    }
}

#[async_trait]
impl AdapterContract for MockContract {
    fn address(&self) -> &Address {
        &self.address
    }

    async fn issuance_fee_rate(&self) -> Result<Wei> {
        let state = self.chain.state.lock().await;
        state
            .adapters
            .get(&self.address)
            .map(|a| a.fee_rate)
            .ok_or_else(|| missing("adapter", &self.address))
    }

    async fn scale_stored(&self) -> Result<Wei> {
        let state = self.chain.state.lock().await;
        state
            .adapters
            .get(&self.address)
            .map(|a| a.scale_stored)
            .ok_or_else(|| missing("adapter", &self.address))
    }
}

#[async_trait]
impl PoolFactory for MockContract {
    fn address(&self) -> &Address {
        &self.address
    }

    async fn list_pools(&self) -> Result<Vec<Address>> {
        let state = self.chain.state.lock().await;
        state
            .factories
            .get(&self.address)
            .cloned()
            .ok_or_else(|| missing("pool factory", &self.address))
    }
}

#[async_trait]
impl Pool for MockContract {
    fn address(&self) -> &Address {
        &self.address
    }

    async fn quote_amount_in(
        &self,
        _split_token: &Address,
        _owner: &Address,
        desired: Wei,
    ) -> Result<(Wei, Wei)> {
        let state = self.chain.state.lock().await;
        let pool = state
            .pools
            .get(&self.address)
            .ok_or_else(|| missing("pool", &self.address))?;
        if pool.reserves.pool_token.is_zero() {
            return Err(CallError::Reverted {
                reason: Some("pool has no liquidity".to_string()),
            });
        }
        let required = desired
            .checked_mul(pool.reserves.underlying)
            .map(|n| n / pool.reserves.pool_token)
            .ok_or_else(|| CallError::Reverted {
                reason: Some("arithmetic overflow".to_string()),
            })?;
        Ok((required, desired))
    }

    async fn reserves(&self) -> Result<PoolReserves> {
        let state = self.chain.state.lock().await;
        state
            .pools
            .get(&self.address)
            .map(|p| p.reserves)
            .ok_or_else(|| missing("pool", &self.address))
    }

    async fn add_liquidity_from_underlying(
        &self,
        split_token: &Address,
        recipient: &Address,
        amount: Wei,
        min_out: Wei,
        deadline: u64,
    ) -> Result<TxReceipt> {
        self.chain.write_delay().await;
        let mut state = self.chain.state.lock().await;
        let underlying = state
            .pools
            .get(&self.address)
            .map(|p| p.underlying.clone())
            .ok_or_else(|| missing("pool", &self.address))?;

        let call = RecordedCall::AddLiquidityFromUnderlying {
            pool: self.address.clone(),
            split_token: split_token.clone(),
            recipient: recipient.clone(),
            amount,
            min_out,
            deadline,
        };
        if let Some(result) = state.scripted(MockMethod::AddLiquidity, call.clone()) {
            return result;
        }

        state.calls.push(call);
        let signer = state.signer.clone();
        let status = match state.spend(&underlying, &signer, &self.address, amount) {
            Ok(()) => {
                if let Some(pool) = state.pools.get_mut(&self.address) {
                    pool.reserves.underlying += amount;
                }
                ReceiptStatus::Confirmed
            }
            Err(reason) => ReceiptStatus::Reverted {
                reason: Some(reason),
            },
        };
        Ok(state.next_receipt(status))
    }
}
