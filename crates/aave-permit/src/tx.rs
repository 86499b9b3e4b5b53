//! Sending transactions and reading their receipts.

use std::future::Future;
use std::time::Duration;

use alloy::network::Ethereum;
use alloy::providers::PendingTransactionBuilder;
use alloy::rpc::types::TransactionReceipt;
use alloy::sol_types::SolEvent;

use crate::PermitError;

pub(crate) const SEND_TIMEOUT: Duration = Duration::from_secs(30);
pub(crate) const RECEIPT_TIMEOUT: Duration = Duration::from_secs(60);

/// Send and wait for the receipt, whatever its status.
pub(crate) async fn mine<F>(label: &str, send: F) -> Result<TransactionReceipt, PermitError>
where
    F: Future<Output = Result<PendingTransactionBuilder<Ethereum>, alloy::contract::Error>>,
{
    let pending = tokio::time::timeout(SEND_TIMEOUT, send)
        .await
        .map_err(|_| PermitError::ChainError(format!("{label} send timed out after 30s")))?
        .map_err(|e| PermitError::ChainError(format!("{label} send failed: {e}")))?;

    tokio::time::timeout(RECEIPT_TIMEOUT, pending.get_receipt())
        .await
        .map_err(|_| PermitError::ChainError(format!("{label} receipt timed out after 60s")))?
        .map_err(|e| PermitError::ChainError(format!("{label} receipt failed: {e}")))
}

/// Wait for a sent transaction to be mined and require success.
pub(crate) async fn confirm<F>(label: &str, send: F) -> Result<TransactionReceipt, PermitError>
where
    F: Future<Output = Result<PendingTransactionBuilder<Ethereum>, alloy::contract::Error>>,
{
    let receipt = mine(label, send).await?;
    if !receipt.status() {
        return Err(PermitError::ChainError(format!("{label} reverted")));
    }
    Ok(receipt)
}

/// First log in the receipt that decodes as `E`.
pub(crate) fn decode_event<E: SolEvent>(receipt: &TransactionReceipt) -> Option<E> {
    receipt
        .inner
        .logs()
        .iter()
        .find_map(|log| log.log_decode::<E>().ok())
        .map(|decoded| decoded.inner.data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IWETH;
    use alloy::primitives::{address, b256, Address, U256};
    use serde_json::json;

    const WETH: Address = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
    const HOLDER: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

    fn receipt_with_log(topics: Vec<String>, data: String) -> TransactionReceipt {
        let tx = b256!("1111111111111111111111111111111111111111111111111111111111111111");
        let block = b256!("2222222222222222222222222222222222222222222222222222222222222222");
        let bloom = format!("0x{}", "0".repeat(512));
        serde_json::from_value(json!({
            "type": "0x2",
            "status": "0x1",
            "cumulativeGasUsed": "0xb411",
            "logsBloom": bloom,
            "logs": [{
                "address": WETH,
                "topics": topics,
                "data": data,
                "blockHash": block,
                "blockNumber": "0x10",
                "transactionHash": tx,
                "transactionIndex": "0x0",
                "logIndex": "0x0",
                "removed": false
            }],
            "transactionHash": tx,
            "transactionIndex": "0x0",
            "blockHash": block,
            "blockNumber": "0x10",
            "gasUsed": "0xb411",
            "effectiveGasPrice": "0x3b9aca00",
            "from": HOLDER,
            "to": WETH,
            "contractAddress": null
        }))
        .unwrap()
    }

    #[test]
    fn test_decode_event_reads_withdrawal_wad() {
        let wad = U256::from(250_000_000_000_000_000u64);
        let receipt = receipt_with_log(
            vec![
                IWETH::Withdrawal::SIGNATURE_HASH.to_string(),
                HOLDER.into_word().to_string(),
            ],
            format!("0x{:064x}", wad),
        );

        let event = decode_event::<IWETH::Withdrawal>(&receipt).unwrap();
        assert_eq!(event.src, HOLDER);
        assert_eq!(event.wad, wad);
        assert!(decode_event::<IWETH::Deposit>(&receipt).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirm_times_out_on_stalled_send() {
        let stalled = std::future::pending::<
            Result<PendingTransactionBuilder<Ethereum>, alloy::contract::Error>,
        >();
        let err = confirm("approve", stalled).await.unwrap_err();
        assert!(matches!(err, PermitError::ChainError(m) if m == "approve send timed out after 30s"));
    }
}
