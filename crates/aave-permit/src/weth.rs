use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::Provider;
use serde::{Deserialize, Serialize};

use crate::tx::{confirm, decode_event};
use crate::{PermitError, IWETH};

/// A confirmed wrap or unwrap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WethReceipt {
    pub transaction: TxHash,
    /// `wad` of the `Deposit` / `Withdrawal` event.
    pub wad: Option<U256>,
}

/// Wrap `amount` wei of ETH into WETH.
pub async fn deposit<P: Provider>(
    provider: &P,
    weth: Address,
    amount: U256,
) -> Result<WethReceipt, PermitError> {
    let contract = IWETH::new(weth, provider);
    let call = contract.deposit().value(amount);
    let receipt = confirm("deposit", call.send()).await?;

    let wad = decode_event::<IWETH::Deposit>(&receipt).map(|e| e.wad);
    tracing::info!(%weth, %amount, ?wad, tx = %receipt.transaction_hash, "wrapped ETH");
    Ok(WethReceipt {
        transaction: receipt.transaction_hash,
        wad,
    })
}

/// Burn `amount` WETH back into ETH.
pub async fn withdraw<P: Provider>(
    provider: &P,
    weth: Address,
    amount: U256,
) -> Result<WethReceipt, PermitError> {
    let contract = IWETH::new(weth, provider);
    let call = contract.withdraw(amount);
    let receipt = confirm("withdraw", call.send()).await?;

    let wad = decode_event::<IWETH::Withdrawal>(&receipt).map(|e| e.wad);
    tracing::info!(%weth, %amount, ?wad, tx = %receipt.transaction_hash, "unwrapped WETH");
    Ok(WethReceipt {
        transaction: receipt.transaction_hash,
        wad,
    })
}
