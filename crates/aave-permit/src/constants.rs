use alloy::primitives::{address, Address};
use serde::{Deserialize, Serialize};

/// Ethereum mainnet chain ID.
pub const MAINNET_CHAIN_ID: u64 = 1;

/// Sepolia testnet chain ID.
pub const SEPOLIA_CHAIN_ID: u64 = 11155111;

/// Local anvil/ganache development chain ID.
pub const DEVELOPMENT_CHAIN_ID: u64 = 31337;

/// Local node endpoint used by `development` and forked networks.
pub const LOCAL_RPC_URL: &str = "http://127.0.0.1:8545";

/// Aave reports account data in a USD base currency with 8 decimals.
pub const USD_DECIMALS: u8 = 8;

/// Referral codes are no longer paid out by Aave; always submit zero.
pub const REFERRAL_CODE: u16 = 0;

/// Default permit validity window used by the scripts.
pub const DEFAULT_PERMIT_VALIDITY_SECS: i64 = 30;

/// Windows shorter than this risk expiring before the transaction is mined.
pub const MIN_RECOMMENDED_VALIDITY_SECS: i64 = 15;

/// Default timeout for read-only token calls.
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 30;

/// Well-known anvil/hardhat account #0 private key, for local networks only.
///
/// **NOT A SECRET**: this key is published in the anvil and hardhat sources.
/// Never use it for real assets.
pub const DEV_PRIVATE_KEY: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Network names the scripts know presets for.
pub const KNOWN_NETWORKS: &[&str] = &["mainnet", "mainnet-fork", "sepolia", "development"];

/// Runtime network configuration. Passed explicitly into every component that
/// needs chain or contract addresses; nothing is looked up globally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub name: String,
    pub chain_id: u64,
    pub rpc_url: String,
    /// Aave V3 pool proxy.
    pub pool: Address,
    pub weth_token: Address,
    pub dai_token: Address,
    /// Chainlink DAI/USD aggregator.
    pub dai_usd_price_feed: Address,
    /// Local fork of a public chain: test funds come from wrapping ETH.
    pub forked: bool,
    /// Local development chain (anvil/ganache).
    pub local: bool,
}

impl NetworkConfig {
    /// Ethereum mainnet Aave V3 market.
    pub fn mainnet() -> Self {
        Self {
            name: "mainnet".to_string(),
            chain_id: MAINNET_CHAIN_ID,
            rpc_url: "https://eth.llamarpc.com".to_string(),
            pool: address!("87870Bca3F3fD6335C3F4ce8392D69350B4fA4E2"),
            weth_token: address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"),
            dai_token: address!("6B175474E89094C44Da98b954EedeAC495271d0F"),
            dai_usd_price_feed: address!("Aed0c38402a5d19df6E4c03F4E2DceD6e29c1ee9"),
            forked: false,
            local: false,
        }
    }

    /// Mainnet forked onto a local node. Same contracts, local endpoint.
    pub fn mainnet_fork() -> Self {
        Self {
            name: "mainnet-fork".to_string(),
            rpc_url: LOCAL_RPC_URL.to_string(),
            forked: true,
            local: true,
            ..Self::mainnet()
        }
    }

    /// Sepolia Aave V3 testnet market.
    pub fn sepolia() -> Self {
        Self {
            name: "sepolia".to_string(),
            chain_id: SEPOLIA_CHAIN_ID,
            rpc_url: "https://ethereum-sepolia-rpc.publicnode.com".to_string(),
            pool: address!("6Ae43d3271ff6888e7Fc43Fd7321a503ff738951"),
            weth_token: address!("C558DBdd856501FCd9aaF1E62eae57A9F0629a3c"),
            dai_token: address!("FF34B3d4Aee8ddCd6F9AFFFB6Fe49bD371b8a357"),
            dai_usd_price_feed: address!("14866185B1962B63C3Ea9E03Bc1da838bab34C19"),
            forked: false,
            local: false,
        }
    }

    /// Local development chain. Contract addresses must be supplied through
    /// overrides once mocks are deployed.
    pub fn development() -> Self {
        Self {
            name: "development".to_string(),
            chain_id: DEVELOPMENT_CHAIN_ID,
            rpc_url: LOCAL_RPC_URL.to_string(),
            pool: Address::ZERO,
            weth_token: Address::ZERO,
            dai_token: Address::ZERO,
            dai_usd_price_feed: Address::ZERO,
            forked: false,
            local: true,
        }
    }

    /// Look up a preset by network name.
    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "mainnet" => Some(Self::mainnet()),
            "mainnet-fork" => Some(Self::mainnet_fork()),
            "sepolia" => Some(Self::sepolia()),
            "development" => Some(Self::development()),
            _ => None,
        }
    }

    /// Names of the contract addresses that are still unset.
    pub fn missing_contracts(&self) -> Vec<&'static str> {
        [
            ("pool", self.pool),
            ("weth_token", self.weth_token),
            ("dai_token", self.dai_token),
            ("dai_usd_price_feed", self.dai_usd_price_feed),
        ]
        .into_iter()
        .filter(|(_, addr)| *addr == Address::ZERO)
        .map(|(name, _)| name)
        .collect()
    }
}

impl Default for NetworkConfig {
    /// Defaults to the Sepolia market.
    fn default() -> Self {
        Self::sepolia()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_known_network_has_a_preset() {
        for name in KNOWN_NETWORKS {
            let config = NetworkConfig::by_name(name).unwrap();
            assert_eq!(config.name, *name);
        }
        assert!(NetworkConfig::by_name("ropsten").is_none());
    }

    #[test]
    fn test_fork_reuses_mainnet_contracts() {
        let fork = NetworkConfig::mainnet_fork();
        let main = NetworkConfig::mainnet();
        assert_eq!(fork.chain_id, MAINNET_CHAIN_ID);
        assert_eq!(fork.pool, main.pool);
        assert_eq!(fork.dai_token, main.dai_token);
        assert_eq!(fork.rpc_url, LOCAL_RPC_URL);
        assert!(fork.forked && fork.local);
        assert!(!main.forked);
    }

    #[test]
    fn test_missing_contracts() {
        assert!(NetworkConfig::sepolia().missing_contracts().is_empty());
        let dev = NetworkConfig::development();
        assert_eq!(
            dev.missing_contracts(),
            vec!["pool", "weth_token", "dai_token", "dai_usd_price_feed"]
        );
    }
}
