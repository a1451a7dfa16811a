//! Tranche Constants
//!
//! Deployment addresses and split-token layout.

/// Split tokens exposed by the splitting contract, one per yield source
pub const SPLIT_TOKEN_COUNT: usize = 4;

/// Local fork deployment (chain id 1337)
pub mod local {
    /// DAI (forked from mainnet)
    pub const DAI: &str = "0x6B175474E89094C44Da98b954EedeAC495271d0F";
    /// Aave v2 aDAI (forked from mainnet)
    pub const ADAI: &str = "0x028171bCA77440897B824Ca71D1c56caC55b68A3";
    pub const AAVE_V2_ADAPTER: &str = "0xAD2935E147b61175D5dc3A9e7bDa93B0975A43BA";
    pub const POOL_FACTORY: &str = "0x4951A1C579039EbfCBA0BE33D2cd3A6D30b0f802";
    pub const TRANCHE: &str = "0x2e8880cAdC08E9B438c6052F5ce3869FBd6cE513";
}
