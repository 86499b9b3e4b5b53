//! Script settings, read from the environment (and `.env` via dotenvy).

use alloy::primitives::utils::parse_ether;
use alloy::primitives::{Address, U256};

use aave_permit::{
    InterestRateMode, NetworkConfig, PermitError, DEFAULT_PERMIT_VALIDITY_SECS, DEV_PRIVATE_KEY,
    KNOWN_NETWORKS,
};

const DEFAULT_NETWORK: &str = "sepolia";
const DEFAULT_BORROW_FRACTION_BPS: u32 = 5_000;
const DEFAULT_WETH_TOPUP: &str = "0.1";

pub struct Settings {
    pub network: NetworkConfig,
    pub private_key: String,
    /// Repay through `repayWithPermit` instead of approve + repay.
    pub use_permit: bool,
    pub permit_validity_secs: i64,
    /// Share of the borrowable amount to borrow, in basis points.
    pub borrow_fraction_bps: u32,
    /// ETH wrapped before supplying, forked networks only.
    pub weth_topup: U256,
    pub interest_rate_mode: InterestRateMode,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("network", &self.network.name)
            .field("private_key", &"<redacted>")
            .field("use_permit", &self.use_permit)
            .field("permit_validity_secs", &self.permit_validity_secs)
            .field("borrow_fraction_bps", &self.borrow_fraction_bps)
            .field("weth_topup", &self.weth_topup)
            .field("interest_rate_mode", &self.interest_rate_mode)
            .finish()
    }
}

impl Settings {
    /// Load from the process environment, after reading `.env` if present.
    pub fn from_env() -> Result<Self, PermitError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PermitError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let name = lookup("NETWORK").unwrap_or_else(|| DEFAULT_NETWORK.to_string());
        let mut network = NetworkConfig::by_name(&name).ok_or_else(|| {
            PermitError::ConfigError(format!(
                "unknown NETWORK '{name}', expected one of: {}",
                KNOWN_NETWORKS.join(", ")
            ))
        })?;

        if let Some(url) = lookup("RPC_URL") {
            network.rpc_url = url;
        }
        override_address(&lookup, "POOL_ADDRESS", &mut network.pool)?;
        override_address(&lookup, "WETH_TOKEN", &mut network.weth_token)?;
        override_address(&lookup, "DAI_TOKEN", &mut network.dai_token)?;
        override_address(&lookup, "DAI_USD_PRICE_FEED", &mut network.dai_usd_price_feed)?;

        let missing = network.missing_contracts();
        if !missing.is_empty() {
            return Err(PermitError::ConfigError(format!(
                "network '{}' has no address for: {}",
                network.name,
                missing.join(", ")
            )));
        }

        let private_key = match lookup("PRIVATE_KEY") {
            Some(key) => key,
            None if network.local => {
                tracing::warn!(network = %network.name, "PRIVATE_KEY unset, using the well-known dev key");
                DEV_PRIVATE_KEY.to_string()
            }
            None => {
                return Err(PermitError::ConfigError(format!(
                    "PRIVATE_KEY is required on network '{}'",
                    network.name
                )))
            }
        };

        let use_permit = match lookup("USE_PERMIT").as_deref().map(str::trim) {
            None | Some("") | Some("0") => false,
            Some("1") => true,
            Some(other) => {
                return Err(PermitError::ConfigError(format!(
                    "USE_PERMIT must be 0 or 1, got '{other}'"
                )))
            }
        };

        let permit_validity_secs =
            parse_or(&lookup, "PERMIT_VALIDITY_SECS", DEFAULT_PERMIT_VALIDITY_SECS)?;
        let borrow_fraction_bps =
            parse_or(&lookup, "BORROW_FRACTION_BPS", DEFAULT_BORROW_FRACTION_BPS)?;
        if borrow_fraction_bps == 0 || borrow_fraction_bps > 10_000 {
            return Err(PermitError::ConfigError(format!(
                "BORROW_FRACTION_BPS must be in 1..=10000, got {borrow_fraction_bps}"
            )));
        }

        let topup = lookup("WETH_TOPUP").unwrap_or_else(|| DEFAULT_WETH_TOPUP.to_string());
        let weth_topup = parse_ether(&topup)
            .map_err(|e| PermitError::ConfigError(format!("invalid WETH_TOPUP '{topup}': {e}")))?;

        let interest_rate_mode = InterestRateMode::try_from(parse_or(&lookup, "INTEREST_RATE_MODE", 2u8)?)?;

        Ok(Self {
            network,
            private_key,
            use_permit,
            permit_validity_secs,
            borrow_fraction_bps,
            weth_topup,
            interest_rate_mode,
        })
    }
}

fn override_address<F>(lookup: &F, key: &str, slot: &mut Address) -> Result<(), PermitError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(key) {
        *slot = raw
            .parse::<Address>()
            .map_err(|e| PermitError::ConfigError(format!("invalid {key} '{raw}': {e}")))?;
    }
    Ok(())
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, PermitError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| PermitError::ConfigError(format!("invalid {key} '{raw}': {e}"))),
        None => Ok(default),
    }
}
