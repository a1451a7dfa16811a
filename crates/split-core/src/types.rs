//! Core type definitions for splitwell

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// EVM contract or account address (`0x`-prefixed hex).
///
/// An empty string is the "unconfigured" sentinel: the role exists but no
/// contract is deployed for it on the current network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub String);

impl Address {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    /// The unconfigured sentinel
    pub fn unconfigured() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when a contract address is present (non-empty)
    pub fn is_configured(&self) -> bool {
        !self.0.is_empty()
    }

    /// True for `0x0000000000000000000000000000000000000000`
    pub fn is_zero(&self) -> bool {
        self.0
            .strip_prefix("0x")
            .is_some_and(|h| !h.is_empty() && h.bytes().all(|b| b == b'0'))
    }

    /// Check `0x` + 40 hex characters
    pub fn is_valid(&self) -> bool {
        match self.0.strip_prefix("0x") {
            Some(h) => h.len() == 40 && hex::decode(h).is_ok(),
            None => false,
        }
    }

    /// Case-insensitive comparison (checksummed vs lowercase spellings)
    pub fn same_as(&self, other: &Address) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "<unconfigured>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Transaction hash (32 bytes, hex-encoded)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(pub String);

impl TxHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// EVM chain id of the connected network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkId(pub u64);

impl NetworkId {
    /// Local fork network (hardhat / anvil default)
    pub const LOCAL: NetworkId = NetworkId(1337);
    pub const MAINNET: NetworkId = NetworkId(1);

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NetworkId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Token amount in base units, 10^18 fixed point
pub type Wei = U256;

/// Constants
pub mod constants {
    use super::Wei;

    /// 1.0 in 10^18 fixed point
    pub const WAD: Wei = Wei::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

    /// Basis points in 100%
    pub const BPS_DENOM: u64 = 10_000;
}

/// Conversions between user-entered decimal strings and wei
pub mod units {
    use alloy_primitives::utils::{format_ether, parse_ether};

    use super::Wei;
    use crate::ProtocolError;

    /// Parse a decimal token amount ("12.5") into wei
    pub fn to_wei(amount: &str) -> Result<Wei, ProtocolError> {
        let trimmed = amount.trim();
        if trimmed.is_empty() {
            return Err(ProtocolError::InvalidAmount {
                message: "amount is empty".to_string(),
            });
        }
        parse_ether(trimmed).map_err(|e| ProtocolError::InvalidAmount {
            message: format!("{trimmed:?}: {e}"),
        })
    }

    /// Format wei as a decimal token amount
    pub fn from_wei(amount: Wei) -> String {
        format_ether(amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_sentinel() {
        let empty = Address::unconfigured();
        assert!(!empty.is_configured());
        assert_eq!(empty.to_string(), "<unconfigured>");

        let dai = Address::new("0x6B175474E89094C44Da98b954EedeAC495271d0F");
        assert!(dai.is_configured());
        assert!(dai.is_valid());
        assert!(!dai.is_zero());
    }

    #[test]
    fn test_address_zero_and_case() {
        let zero = Address::new("0x0000000000000000000000000000000000000000");
        assert!(zero.is_zero());
        assert!(!Address::unconfigured().is_zero());

        let upper = Address::new("0x6B175474E89094C44Da98b954EedeAC495271d0F");
        let lower = Address::new("0x6b175474e89094c44da98b954eedeac495271d0f");
        assert!(upper.same_as(&lower));
        assert!(!Address::new("0x1234").is_valid());
    }

    #[test]
    fn test_wad_constant() {
        assert_eq!(constants::WAD, Wei::from(10u64).pow(Wei::from(18u64)));
    }

    #[test]
    fn test_units_roundtrip_values() {
        assert_eq!(units::to_wei("100").unwrap(), Wei::from(100u64) * constants::WAD);
        assert_eq!(
            units::to_wei("0.5").unwrap(),
            Wei::from(500_000_000_000_000_000u64)
        );
        assert!(units::to_wei("").is_err());
        assert!(units::to_wei("abc").is_err());
        assert!(units::from_wei(constants::WAD).starts_with("1.0"));
    }

    #[test]
    fn test_network_display() {
        assert_eq!(NetworkId::LOCAL.to_string(), "1337");
        assert_eq!(NetworkId::from(5).as_u64(), 5);
    }
}
