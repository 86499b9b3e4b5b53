use alloy::primitives::{Address, B256, U256};
use thiserror::Error;

/// Errors returned by permit and pool operations.
///
/// None of these are fatal to the calling process. The library never retries;
/// see [`PermitError::requires_resign`] for the kinds a caller resolves by
/// signing a fresh permit.
#[derive(Debug, Error)]
pub enum PermitError {
    #[error("no EIP-712 capable signer attached for {0}")]
    SignerUnavailable(Address),

    #[error("token read failed: {0}")]
    NonceFetchFailed(String),

    #[error("validity window must be positive, got {0}s")]
    InvalidValidityWindow(i64),

    #[error("permit expired: deadline {deadline}, chain time {chain_time}")]
    PermitExpired { deadline: u64, chain_time: u64 },

    #[error("permit invalidated: signed with nonce {signed}, owner nonce is now {current}")]
    PermitInvalidated { signed: U256, current: U256 },

    #[error("domain separator mismatch: token reports {onchain}, computed {computed}")]
    DomainMismatch { onchain: B256, computed: B256 },

    #[error("unsupported EIP-712 domain: {0}")]
    UnsupportedDomain(String),

    #[error("signature error: {0}")]
    SignatureError(String),

    #[error("chain error: {0}")]
    ChainError(String),

    #[error("config error: {0}")]
    ConfigError(String),

    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

impl PermitError {
    /// True when the permit itself is unusable and `create_permit` must be
    /// called again.
    pub fn requires_resign(&self) -> bool {
        matches!(
            self,
            PermitError::PermitExpired { .. } | PermitError::PermitInvalidated { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_resign() {
        assert!(PermitError::PermitExpired {
            deadline: 10,
            chain_time: 11
        }
        .requires_resign());
        assert!(PermitError::PermitInvalidated {
            signed: U256::from(5u64),
            current: U256::from(6u64)
        }
        .requires_resign());
        assert!(!PermitError::NonceFetchFailed("timeout".to_string()).requires_resign());
        assert!(!PermitError::InvalidValidityWindow(0).requires_resign());
    }

    #[test]
    fn test_display() {
        let err = PermitError::InvalidValidityWindow(-3);
        assert_eq!(err.to_string(), "validity window must be positive, got -3s");
    }
}
