use alloy::primitives::utils::format_units;
use alloy::primitives::{Address, U256};
use alloy::providers::Provider;
use serde::{Deserialize, Serialize};

use crate::{AggregatorV3Interface, PermitError, USD_DECIMALS};

/// Latest answer of a Chainlink aggregator, as a fixed-point integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetPrice {
    pub answer: U256,
    pub decimals: u8,
}

impl std::fmt::Display for AssetPrice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match format_units(self.answer, self.decimals) {
            Ok(s) => f.write_str(&s),
            Err(_) => write!(f, "{}e-{}", self.answer, self.decimals),
        }
    }
}

/// Read `latestRoundData()` and `decimals()` from a price feed.
pub async fn latest_price<P: Provider>(provider: &P, feed: Address) -> Result<AssetPrice, PermitError> {
    let contract = AggregatorV3Interface::new(feed, provider);
    let round = contract
        .latestRoundData()
        .call()
        .await
        .map_err(|e| PermitError::ChainError(format!("latestRoundData failed: {e}")))?;
    let decimals = contract
        .decimals()
        .call()
        .await
        .map_err(|e| PermitError::ChainError(format!("decimals failed: {e}")))?;

    if round.answer.is_negative() || round.answer.is_zero() {
        return Err(PermitError::ChainError(format!(
            "price feed {feed} returned non-positive answer {}",
            round.answer
        )));
    }

    let price = AssetPrice {
        answer: round.answer.into_raw(),
        decimals,
    };
    tracing::debug!(%feed, %price, "price feed read");
    Ok(price)
}

/// Token amount worth `fraction_bps` / 10 000 of `available_base` (USD, 8
/// decimals) at `price` (USD per token), in the token's smallest unit.
pub fn borrow_amount(
    available_base: U256,
    fraction_bps: u32,
    price: &AssetPrice,
    token_decimals: u8,
) -> Result<U256, PermitError> {
    if price.answer.is_zero() {
        return Err(PermitError::ChainError("price must be non-zero".to_string()));
    }
    if fraction_bps > 10_000 {
        return Err(PermitError::ConfigError(format!(
            "borrow fraction {fraction_bps} bps exceeds 10000"
        )));
    }

    let ten = U256::from(10u64);
    let numerator = available_base
        .checked_mul(U256::from(fraction_bps))
        .and_then(|v| v.checked_mul(ten.pow(U256::from(price.decimals))))
        .and_then(|v| v.checked_mul(ten.pow(U256::from(token_decimals))))
        .ok_or_else(|| PermitError::ChainError("borrow amount overflow".to_string()))?;
    let denominator = U256::from(10_000u64)
        .checked_mul(price.answer)
        .and_then(|v| v.checked_mul(ten.pow(U256::from(USD_DECIMALS))))
        .ok_or_else(|| PermitError::ChainError(format!("price {} overflows", price.answer)))?;

    Ok(numerator / denominator)
}
