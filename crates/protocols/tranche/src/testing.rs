//! Shared test fixture: the local deployment on a mock chain

use std::sync::Arc;
use std::time::Duration;

use chain_client::mock::{MockChain, MockChainBuilder};
use chain_client::{PoolReserves, SessionContext};
use split_core::constants::WAD;
use split_core::{Address, NetworkId, Wei};

use crate::address_book::{AddressBook, AddressBookRecord};
use crate::constants::{local, SPLIT_TOKEN_COUNT};
use crate::state::{PositionKey, UnderlyingSymbol, YieldSource};

pub fn ether(n: u64) -> Wei {
    Wei::from(n) * WAD
}

pub fn signer() -> Address {
    Address::new("0x70997970C51812dc3A010C7d01b50e0d17dc79C8")
}

pub struct Fixture {
    pub chain: MockChain,
    pub ctx: SessionContext,
    pub record: AddressBookRecord,
    pub split_tokens: Vec<Address>,
    pub pool: Address,
}

type ChainHook = Box<dyn FnOnce(MockChainBuilder) -> MockChainBuilder>;

pub struct FixtureBuilder {
    network: NetworkId,
    fee_rate: Wei,
    adapter_scale: Wei,
    stored_scales: Vec<(YieldSource, Wei)>,
    split_token_count: usize,
    with_pool: bool,
    reserves: (Wei, Wei),
    call_timeout: Duration,
    hooks: Vec<ChainHook>,
}

impl Fixture {
    pub fn builder() -> FixtureBuilder {
        FixtureBuilder {
            network: NetworkId::LOCAL,
            fee_rate: Wei::ZERO,
            adapter_scale: WAD,
            stored_scales: Vec::new(),
            split_token_count: SPLIT_TOKEN_COUNT,
            with_pool: true,
            reserves: (ether(1000), ether(500)),
            call_timeout: Duration::from_secs(30),
            hooks: Vec::new(),
        }
    }

    pub fn dai(&self) -> Address {
        Address::new(local::DAI)
    }

    pub fn tranche(&self) -> Address {
        Address::new(local::TRANCHE)
    }
}

impl FixtureBuilder {
    pub fn network(mut self, network: NetworkId) -> Self {
        self.network = network;
        self
    }

    pub fn fee_rate(mut self, fee_rate: Wei) -> Self {
        self.fee_rate = fee_rate;
        self
    }

    pub fn adapter_scale(mut self, scale: Wei) -> Self {
        self.adapter_scale = scale;
        self
    }

    pub fn stored_scale(mut self, source: YieldSource, scale: Wei) -> Self {
        self.stored_scales.push((source, scale));
        self
    }

    pub fn split_token_count(mut self, count: usize) -> Self {
        self.split_token_count = count;
        self
    }

    pub fn no_pools(mut self) -> Self {
        self.with_pool = false;
        self
    }

    pub fn reserves(mut self, underlying: Wei, pool_token: Wei) -> Self {
        self.reserves = (underlying, pool_token);
        self
    }

    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Extra mock setup (scripted failures, allowances, delays)
    pub fn chain(mut self, hook: impl FnOnce(MockChainBuilder) -> MockChainBuilder + 'static) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    pub fn build(self) -> Fixture {
        let dai = Address::new(local::DAI);
        let tranche = Address::new(local::TRANCHE);
        let adapter = Address::new(local::AAVE_V2_ADAPTER);
        let factory = Address::new(local::POOL_FACTORY);
        let pool = Address::new("0x00000000000000000000000000000000000000b1");
        let split_tokens: Vec<Address> = (0..self.split_token_count)
            .map(|i| Address::new(format!("0x{:040x}", 0xc0 + i)))
            .collect();

        let mut builder = MockChain::builder(self.network, signer())
            .token(&dai, "DAI", ether(1000))
            .splitter(&tranche, &dai, split_tokens.clone())
            .adapter(&adapter, self.fee_rate, self.adapter_scale)
            .factory(
                &factory,
                if self.with_pool { vec![pool.clone()] } else { Vec::new() },
            )
            .pool(
                &pool,
                &dai,
                PoolReserves {
                    underlying: self.reserves.0,
                    pool_token: self.reserves.1,
                },
            );
        for split in &split_tokens {
            builder = builder.series(&tranche, split, &adapter);
        }
        for (source, scale) in self.stored_scales {
            let slot = PositionKey::new(UnderlyingSymbol::Dai, source).split_token_slot();
            if let Some(split) = slot.ok().and_then(|i| split_tokens.get(i)) {
                builder = builder.stored_scale(&tranche, split, scale);
            }
        }
        for hook in self.hooks {
            builder = hook(builder);
        }

        let chain = builder.build();
        let ctx = SessionContext::new(
            self.network,
            signer(),
            Arc::new(chain.clone()),
            self.call_timeout,
        );

        Fixture {
            chain,
            ctx,
            record: AddressBook::resolve(self.network),
            split_tokens,
            pool,
        }
    }
}
