use std::future::Future;
use std::time::Duration;

use alloy::primitives::{Address, TxHash, B256, U256};
use alloy::providers::Provider;

use crate::eip712::{TokenDomain, DEFAULT_DOMAIN_VERSION};
use crate::tx::confirm;
use crate::{IERC20Permit, NetworkConfig, PermitError, DEFAULT_READ_TIMEOUT_SECS};

/// Read-only view of a permit-capable token, as needed to build a permit.
///
/// [`ProviderTokenReader`] implements it over an alloy provider; tests use
/// in-memory implementations.
pub trait TokenReader: Send + Sync {
    /// Resolve the EIP-712 domain the token uses for its permit separator.
    fn domain(
        &self,
        token: Address,
    ) -> impl Future<Output = Result<TokenDomain, PermitError>> + Send;

    /// Current permit nonce of `owner` on `token`.
    fn nonce(
        &self,
        token: Address,
        owner: Address,
    ) -> impl Future<Output = Result<U256, PermitError>> + Send;
}

/// [`TokenReader`] backed by `eth_call`s through an alloy provider.
pub struct ProviderTokenReader<P> {
    provider: P,
    chain_id: u64,
    read_timeout: Duration,
}

impl<P> ProviderTokenReader<P> {
    pub fn new(provider: P, network: &NetworkConfig) -> Self {
        Self {
            provider,
            chain_id: network.chain_id,
            read_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
        }
    }

    /// Bound every token read by `timeout`.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }
}

impl<P> ProviderTokenReader<P>
where
    P: Provider + Send + Sync,
{
    async fn read_eip5267(&self, token: Address) -> Result<TokenDomain, PermitError> {
        let contract = IERC20Permit::new(token, &self.provider);
        let d = tokio::time::timeout(self.read_timeout, contract.eip712Domain().call())
            .await
            .map_err(|_| PermitError::NonceFetchFailed("eip712Domain timed out".to_string()))?
            .map_err(|e| PermitError::NonceFetchFailed(format!("eip712Domain failed: {e}")))?;

        TokenDomain::from_eip5267(
            d.fields[0],
            d.name,
            d.version,
            d.chainId,
            d.verifyingContract,
            d.salt,
            &d.extensions,
        )
    }

    async fn read_legacy(&self, token: Address) -> Result<TokenDomain, PermitError> {
        let contract = IERC20Permit::new(token, &self.provider);
        let name = tokio::time::timeout(self.read_timeout, contract.name().call())
            .await
            .map_err(|_| PermitError::NonceFetchFailed("name timed out".to_string()))?
            .map_err(|e| PermitError::NonceFetchFailed(format!("name failed: {e}")))?;

        // Plenty of EIP-2612 tokens never expose version(); they hash "1".
        let version = match tokio::time::timeout(self.read_timeout, contract.version().call()).await {
            Ok(Ok(version)) => version,
            Ok(Err(e)) if is_missing_function(&e) => {
                tracing::debug!(%token, error = %e, "version() unavailable, assuming \"1\"");
                DEFAULT_DOMAIN_VERSION.to_string()
            }
            Ok(Err(e)) => return Err(PermitError::NonceFetchFailed(format!("version failed: {e}"))),
            Err(_) => {
                return Err(PermitError::NonceFetchFailed(
                    "version timed out".to_string(),
                ))
            }
        };

        Ok(TokenDomain::standard(name, version, self.chain_id, token))
    }

    async fn read_separator(&self, token: Address) -> Option<B256> {
        let contract = IERC20Permit::new(token, &self.provider);
        match tokio::time::timeout(self.read_timeout, contract.DOMAIN_SEPARATOR().call()).await {
            Ok(Ok(separator)) => Some(separator),
            _ => None,
        }
    }
}

/// The node answered, but the call reverted or returned nothing decodable.
/// Transport failures are not in this set.
fn is_missing_function(err: &alloy::contract::Error) -> bool {
    match err {
        alloy::contract::Error::TransportError(e) => e.is_error_resp(),
        alloy::contract::Error::AbiError(_) | alloy::contract::Error::ZeroData(..) => true,
        _ => false,
    }
}

impl<P> TokenReader for ProviderTokenReader<P>
where
    P: Provider + Send + Sync,
{
    async fn domain(&self, token: Address) -> Result<TokenDomain, PermitError> {
        let domain = match self.read_eip5267(token).await {
            Ok(domain) => domain,
            Err(PermitError::UnsupportedDomain(reason)) => {
                return Err(PermitError::UnsupportedDomain(reason))
            }
            Err(e) => {
                tracing::debug!(%token, error = %e, "eip712Domain unavailable, using name()/version()");
                self.read_legacy(token).await?
            }
        };

        Ok(match self.read_separator(token).await {
            Some(separator) => domain.with_onchain_separator(separator),
            None => domain,
        })
    }

    async fn nonce(&self, token: Address, owner: Address) -> Result<U256, PermitError> {
        let contract = IERC20Permit::new(token, &self.provider);
        let nonce = tokio::time::timeout(self.read_timeout, contract.nonces(owner).call())
            .await
            .map_err(|_| PermitError::NonceFetchFailed("nonces timed out".to_string()))?
            .map_err(|e| PermitError::NonceFetchFailed(format!("nonces failed: {e}")))?;
        Ok(nonce)
    }
}

/// Query the ERC-20 balance of `owner`.
pub async fn balance_of<P: Provider>(
    provider: &P,
    token: Address,
    owner: Address,
) -> Result<U256, PermitError> {
    let contract = IERC20Permit::new(token, provider);
    let balance = contract
        .balanceOf(owner)
        .call()
        .await
        .map_err(|e| PermitError::ChainError(format!("balanceOf failed: {e}")))?;
    Ok(balance)
}

/// Query the ERC-20 allowance that `owner` has granted to `spender`.
pub async fn allowance<P: Provider>(
    provider: &P,
    token: Address,
    owner: Address,
    spender: Address,
) -> Result<U256, PermitError> {
    let contract = IERC20Permit::new(token, provider);
    let remaining = contract
        .allowance(owner, spender)
        .call()
        .await
        .map_err(|e| PermitError::ChainError(format!("allowance failed: {e}")))?;
    Ok(remaining)
}

pub async fn decimals<P: Provider>(provider: &P, token: Address) -> Result<u8, PermitError> {
    let contract = IERC20Permit::new(token, provider);
    contract
        .decimals()
        .call()
        .await
        .map_err(|e| PermitError::ChainError(format!("decimals failed: {e}")))
}

pub async fn symbol<P: Provider>(provider: &P, token: Address) -> Result<String, PermitError> {
    let contract = IERC20Permit::new(token, provider);
    contract
        .symbol()
        .call()
        .await
        .map_err(|e| PermitError::ChainError(format!("symbol failed: {e}")))
}

/// Approve `spender` for `amount` unless `owner`'s allowance already covers
/// it. Returns the approval transaction hash, if one was sent.
pub async fn ensure_allowance<P: Provider>(
    provider: &P,
    token: Address,
    owner: Address,
    spender: Address,
    amount: U256,
) -> Result<Option<TxHash>, PermitError> {
    let current = allowance(provider, token, owner, spender).await?;
    if current >= amount {
        tracing::debug!(%token, %spender, %current, "allowance sufficient, skipping approve");
        return Ok(None);
    }
    approve(provider, token, spender, amount).await.map(Some)
}

/// Execute `approve(spender, amount)` on the token. Returns the transaction hash.
pub async fn approve<P: Provider>(
    provider: &P,
    token: Address,
    spender: Address,
    amount: U256,
) -> Result<TxHash, PermitError> {
    tracing::info!(%token, %spender, %amount, "approving token transfer");
    let contract = IERC20Permit::new(token, provider);
    let call = contract.approve(spender, amount);
    let receipt = confirm("approve", call.send()).await?;
    Ok(receipt.transaction_hash)
}
