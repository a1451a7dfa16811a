//! Per-network contract addresses
//!
//! A record is resolved once per session and replaced wholesale when the
//! wallet switches networks. Unknown networks resolve to an all-empty record
//! so that feature gating, not a lookup failure, decides what the UI offers.

use std::fmt;

use serde::{Deserialize, Serialize};
use split_core::{Address, NetworkId};

use crate::constants::local;
use crate::state::{TrancheError, UnderlyingSymbol};

static UNCONFIGURED: Address = Address(String::new());

/// Logical contract roles in a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContractRole {
    /// Underlying ERC-20 for a symbol
    Underlying(UnderlyingSymbol),
    /// Interest-bearing wrapper of the underlying (aDAI)
    InterestBearing,
    PoolFactory,
    YieldAdapter,
    /// Tranche (splitting) contract
    Splitter,
}

impl fmt::Display for ContractRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Underlying(symbol) => write!(f, "{symbol} token"),
            Self::InterestBearing => f.write_str("interest-bearing token"),
            Self::PoolFactory => f.write_str("pool factory"),
            Self::YieldAdapter => f.write_str("yield adapter"),
            Self::Splitter => f.write_str("tranche contract"),
        }
    }
}

/// User-facing capabilities gated on the deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Feature {
    MintOnly,
    MintAndDeposit,
}

impl Feature {
    fn required_roles(&self) -> &'static [ContractRole] {
        match self {
            Self::MintOnly => &[
                ContractRole::Underlying(UnderlyingSymbol::Dai),
                ContractRole::Splitter,
            ],
            Self::MintAndDeposit => &[
                ContractRole::Underlying(UnderlyingSymbol::Dai),
                ContractRole::Splitter,
                ContractRole::PoolFactory,
            ],
        }
    }
}

/// Contract addresses for one network. Empty string means unconfigured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressBookRecord {
    pub network_id: NetworkId,
    pub dai: Address,
    pub adai: Address,
    pub pool_factory: Address,
    pub aave_v2_adapter: Address,
    pub tranche: Address,
}

impl AddressBookRecord {
    /// Record with every role unconfigured
    pub fn unconfigured(network_id: NetworkId) -> Self {
        Self {
            network_id,
            dai: Address::unconfigured(),
            adai: Address::unconfigured(),
            pool_factory: Address::unconfigured(),
            aave_v2_adapter: Address::unconfigured(),
            tranche: Address::unconfigured(),
        }
    }

    /// Address for a role, possibly empty
    pub fn get(&self, role: ContractRole) -> &Address {
        match role {
            ContractRole::Underlying(UnderlyingSymbol::Dai) => &self.dai,
            ContractRole::Underlying(UnderlyingSymbol::Usdc) => &UNCONFIGURED,
            ContractRole::InterestBearing => &self.adai,
            ContractRole::PoolFactory => &self.pool_factory,
            ContractRole::YieldAdapter => &self.aave_v2_adapter,
            ContractRole::Splitter => &self.tranche,
        }
    }

    /// Address for a role that must be deployed before calling it
    pub fn require(&self, role: ContractRole) -> Result<&Address, TrancheError> {
        let address = self.get(role);
        if address.is_configured() {
            Ok(address)
        } else {
            Err(TrancheError::UnconfiguredAddress {
                role,
                network: self.network_id,
            })
        }
    }

    pub fn supports(&self, feature: Feature) -> bool {
        feature
            .required_roles()
            .iter()
            .all(|role| self.get(*role).is_configured())
    }

    pub fn configured_roles(&self) -> Vec<ContractRole> {
        [
            ContractRole::Underlying(UnderlyingSymbol::Dai),
            ContractRole::InterestBearing,
            ContractRole::PoolFactory,
            ContractRole::YieldAdapter,
            ContractRole::Splitter,
        ]
        .into_iter()
        .filter(|role| self.get(*role).is_configured())
        .collect()
    }
}

/// Network → deployment lookup
pub struct AddressBook;

impl AddressBook {
    /// Resolve the deployment for a network. Never fails.
    pub fn resolve(network_id: NetworkId) -> AddressBookRecord {
        match network_id {
            NetworkId::LOCAL => AddressBookRecord {
                network_id,
                dai: Address::new(local::DAI),
                adai: Address::new(local::ADAI),
                pool_factory: Address::new(local::POOL_FACTORY),
                aave_v2_adapter: Address::new(local::AAVE_V2_ADAPTER),
                tranche: Address::new(local::TRANCHE),
            },
            other => AddressBookRecord::unconfigured(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_local() {
        let record = AddressBook::resolve(NetworkId::LOCAL);
        assert_eq!(record.tranche.as_str(), local::TRANCHE);
        assert!(record.supports(Feature::MintOnly));
        assert!(record.supports(Feature::MintAndDeposit));
        assert_eq!(record.configured_roles().len(), 5);
        assert!(record.dai.is_valid() && record.tranche.is_valid());
    }

    #[test]
    fn test_resolve_unknown_network_is_empty() {
        let record = AddressBook::resolve(NetworkId(424242));
        assert_eq!(record, AddressBookRecord::unconfigured(NetworkId(424242)));
        assert!(record.configured_roles().is_empty());
        assert!(!record.supports(Feature::MintOnly));

        let err = record.require(ContractRole::Splitter).unwrap_err();
        assert_eq!(
            err,
            TrancheError::UnconfiguredAddress {
                role: ContractRole::Splitter,
                network: NetworkId(424242),
            }
        );
        assert_eq!(err.to_string(), "tranche contract is not deployed on network 424242");
    }

    #[test]
    fn test_usdc_underlying_is_unconfigured() {
        let record = AddressBook::resolve(NetworkId::LOCAL);
        let role = ContractRole::Underlying(UnderlyingSymbol::Usdc);
        assert!(!record.get(role).is_configured());
        assert!(record.require(role).is_err());
    }

    #[test]
    fn test_resolve_is_deterministic() {
        assert_eq!(
            AddressBook::resolve(NetworkId::LOCAL),
            AddressBook::resolve(NetworkId::LOCAL)
        );
        assert_eq!(
            AddressBook::resolve(NetworkId::MAINNET),
            AddressBookRecord::unconfigured(NetworkId::MAINNET)
        );
    }
}
