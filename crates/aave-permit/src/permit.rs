//! EIP-2612 permit creation.
//!
//! A permit moves through `UNSIGNED -> SIGNED -> {CONSUMED | EXPIRED | INVALIDATED}`.
//! [`PermitSigner::create_permit`] produces the signed state. Submission
//! helpers in [`crate::pool`] take the [`SignedPermit`] by value, and the
//! token enforces single use through the nonce. Expired or invalidated
//! permits are never revived; the caller signs a new one.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use alloy::signers::Signer;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::eip712::{permit_signing_hash, verify_permit_signature, PermitSignature, TokenDomain};
use crate::keyring::Keyring;
use crate::token::TokenReader;
use crate::{Permit, PermitError, MIN_RECOMMENDED_VALIDITY_SECS};

/// The signed EIP-2612 payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPermitMessage {
    pub owner: Address,
    pub spender: Address,
    pub value: U256,
    pub nonce: U256,
    pub deadline: u64,
}

impl TokenPermitMessage {
    pub fn to_permit(&self) -> Permit {
        Permit {
            owner: self.owner,
            spender: self.spender,
            value: self.value,
            nonce: self.nonce,
            deadline: U256::from(self.deadline),
        }
    }
}

/// Where a signed permit stands against the current chain state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermitStatus {
    Usable,
    Expired,
    /// The owner's nonce moved on; another permit or approval consumed it.
    Invalidated,
}

/// A permit ready for submission, together with the domain and message it
/// was signed over. Not `Clone`; it is serializable for hand-off, and a
/// replayed copy fails on chain once the nonce is spent.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedPermit {
    pub token: Address,
    pub domain: TokenDomain,
    pub message: TokenPermitMessage,
    pub signature: PermitSignature,
}

impl SignedPermit {
    pub fn deadline(&self) -> u64 {
        self.message.deadline
    }

    pub fn signature(&self) -> PermitSignature {
        self.signature
    }

    /// Classify the permit given the latest chain time and the owner's
    /// current nonce. The deadline must be strictly after chain time.
    pub fn status(&self, chain_time: u64, current_nonce: U256) -> PermitStatus {
        if chain_time >= self.message.deadline {
            PermitStatus::Expired
        } else if current_nonce != self.message.nonce {
            PermitStatus::Invalidated
        } else {
            PermitStatus::Usable
        }
    }

    /// Preflight run before broadcasting a permit-bearing transaction.
    pub fn ensure_submittable(&self, chain_time: u64, current_nonce: U256) -> Result<(), PermitError> {
        match self.status(chain_time, current_nonce) {
            PermitStatus::Usable => Ok(()),
            PermitStatus::Expired => Err(PermitError::PermitExpired {
                deadline: self.message.deadline,
                chain_time,
            }),
            PermitStatus::Invalidated => Err(PermitError::PermitInvalidated {
                signed: self.message.nonce,
                current: current_nonce,
            }),
        }
    }

    /// Recover the signer under the recorded domain and message.
    pub fn recover_signer(&self) -> Result<Address, PermitError> {
        verify_permit_signature(
            &self.message.to_permit(),
            &self.signature.as_bytes(),
            &self.domain,
        )
    }

    pub fn to_json(&self) -> Result<String, PermitError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Seconds since the UNIX epoch.
pub fn unix_now() -> Result<u64, PermitError> {
    Ok(std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_err(|e| PermitError::ConfigError(format!("system time error: {e}")))?
        .as_secs())
}

type LockKey = (Address, Address);

/// Builds and signs EIP-2612 permits.
///
/// The nonce read and the signature for one `(token, owner)` pair form a
/// critical section: concurrent calls for the same pair are serialized so
/// they never interleave between reading the nonce and signing.
pub struct PermitSigner<R, S> {
    reader: R,
    keyring: Keyring<S>,
    locks: Arc<DashMap<LockKey, Arc<Mutex<()>>>>,
}

impl<R, S> PermitSigner<R, S>
where
    R: TokenReader,
    S: Signer + Send + Sync,
{
    /// Idle locks are pruned once the map grows past this.
    const PRUNE_THRESHOLD: usize = 1_024;

    pub fn new(reader: R, keyring: Keyring<S>) -> Self {
        Self {
            reader,
            keyring,
            locks: Arc::new(DashMap::new()),
        }
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn keyring(&self) -> &Keyring<S> {
        &self.keyring
    }

    /// Sign a permit letting `spender` pull `value` of `token` from `owner`,
    /// valid for `validity_seconds` from now.
    ///
    /// Fails before any I/O when the window is not positive or `owner` has
    /// no signer attached. Read errors surface as `NonceFetchFailed`. Nothing
    /// is submitted on-chain.
    pub async fn create_permit(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
        value: U256,
        validity_seconds: i64,
    ) -> Result<SignedPermit, PermitError> {
        if validity_seconds <= 0 {
            return Err(PermitError::InvalidValidityWindow(validity_seconds));
        }
        if validity_seconds < MIN_RECOMMENDED_VALIDITY_SECS {
            tracing::warn!(
                validity_seconds,
                "short permit window, it may expire before inclusion"
            );
        }

        let signer = self
            .keyring
            .get(&owner)
            .ok_or(PermitError::SignerUnavailable(owner))?;

        let lock = self.lock_for(token, owner);
        let _guard = lock.lock().await;

        let domain = self.reader.domain(token).await?;
        domain.check_onchain_separator()?;
        let nonce = self.reader.nonce(token, owner).await?;

        let deadline = unix_now()? + validity_seconds as u64;
        let message = TokenPermitMessage {
            owner,
            spender,
            value,
            nonce,
            deadline,
        };

        let hash = permit_signing_hash(&message.to_permit(), &domain);
        let sig = signer
            .sign_hash(&hash)
            .await
            .map_err(|e| PermitError::SignatureError(format!("signing failed: {e}")))?;

        tracing::info!(
            %token,
            %owner,
            %spender,
            %value,
            %nonce,
            deadline,
            "permit signed"
        );

        Ok(SignedPermit {
            token,
            domain,
            message,
            signature: PermitSignature::from_signature(&sig),
        })
    }

    fn lock_for(&self, token: Address, owner: Address) -> Arc<Mutex<()>> {
        if self.locks.len() >= Self::PRUNE_THRESHOLD {
            self.prune_idle_locks();
        }
        self.locks
            .entry((token, owner))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop locks nobody holds or waits on. Returns how many were removed.
    ///
    /// Checks both the Arc count and try_lock so a caller that cloned the
    /// Arc but has not locked yet keeps its entry.
    pub fn prune_idle_locks(&self) -> usize {
        let before = self.locks.len();
        self.locks
            .retain(|_, lock| Arc::strong_count(lock) > 1 || lock.try_lock().is_err());
        let removed = before - self.locks.len();
        if removed > 0 {
            tracing::debug!(removed, "pruned idle permit locks");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;
    use alloy::signers::local::PrivateKeySigner;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TOKEN: Address = address!("FF34B3d4Aee8ddCd6F9AFFFB6Fe49bD371b8a357");
    const POOL: Address = address!("6Ae43d3271ff6888e7Fc43Fd7321a503ff738951");

    struct FixedReader {
        nonce: U256,
        reads: AtomicUsize,
        fail: bool,
    }

    impl FixedReader {
        fn new(nonce: u64) -> Self {
            Self {
                nonce: U256::from(nonce),
                reads: AtomicUsize::new(0),
                fail: false,
            }
        }
    }

    impl TokenReader for FixedReader {
        async fn domain(&self, token: Address) -> Result<TokenDomain, PermitError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(TokenDomain::standard("Dai Stablecoin", "1", 11155111, token))
        }

        async fn nonce(&self, _token: Address, _owner: Address) -> Result<U256, PermitError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PermitError::NonceFetchFailed("nonces failed: rpc down".to_string()));
            }
            Ok(self.nonce)
        }
    }

    fn signer_with_owner(reader: FixedReader) -> (PermitSigner<FixedReader, PrivateKeySigner>, Address) {
        let mut keyring = Keyring::new();
        let owner = keyring.insert(PrivateKeySigner::random());
        (PermitSigner::new(reader, keyring), owner)
    }

    #[tokio::test]
    async fn test_replayed_copy_is_invalidated_once_nonce_is_spent() {
        let (signer, owner) = signer_with_owner(FixedReader::new(9));
        let permit = signer
            .create_permit(TOKEN, owner, POOL, U256::from(1u64), 30)
            .await
            .unwrap();
        let copy: SignedPermit = serde_json::from_str(&permit.to_json().unwrap()).unwrap();
        let now = permit.deadline() - 1;

        assert_eq!(copy.status(now, U256::from(9u64)), PermitStatus::Usable);
        let err = copy.ensure_submittable(now, U256::from(10u64)).unwrap_err();
        assert!(err.requires_resign());
    }

    #[tokio::test]
    async fn test_create_permit_uses_fresh_nonce_and_deadline() {
        let (signer, owner) = signer_with_owner(FixedReader::new(5));
        let before = unix_now().unwrap();

        let permit = signer
            .create_permit(TOKEN, owner, POOL, U256::from(1_000u64), 30)
            .await
            .unwrap();

        let after = unix_now().unwrap();
        assert_eq!(permit.message.nonce, U256::from(5u64));
        assert!(permit.deadline() >= before + 30 && permit.deadline() <= after + 30);
        assert_eq!(permit.recover_signer().unwrap(), owner);
    }

    #[tokio::test]
    async fn test_non_positive_window_is_rejected_without_io() {
        let (signer, owner) = signer_with_owner(FixedReader::new(0));

        for window in [0, -1, i64::MIN] {
            let err = signer
                .create_permit(TOKEN, owner, POOL, U256::from(1u64), window)
                .await
                .unwrap_err();
            assert!(matches!(err, PermitError::InvalidValidityWindow(w) if w == window));
        }
        assert_eq!(signer.reader().reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_owner_is_rejected_without_io() {
        let (signer, _) = signer_with_owner(FixedReader::new(0));
        let stranger = PrivateKeySigner::random().address();

        let err = signer
            .create_permit(TOKEN, stranger, POOL, U256::from(1u64), 30)
            .await
            .unwrap_err();

        assert!(matches!(err, PermitError::SignerUnavailable(a) if a == stranger));
        assert_eq!(signer.reader().reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_read_failure_surfaces_as_nonce_fetch_failed() {
        let mut reader = FixedReader::new(0);
        reader.fail = true;
        let (signer, owner) = signer_with_owner(reader);

        let err = signer
            .create_permit(TOKEN, owner, POOL, U256::from(1u64), 30)
            .await
            .unwrap_err();
        assert!(matches!(err, PermitError::NonceFetchFailed(_)));
    }

    #[test]
    fn test_status_transitions() {
        let permit = SignedPermit {
            token: TOKEN,
            domain: TokenDomain::standard("Dai Stablecoin", "1", 1, TOKEN),
            message: TokenPermitMessage {
                owner: Address::ZERO,
                spender: POOL,
                value: U256::from(1u64),
                nonce: U256::from(5u64),
                deadline: 1_000,
            },
            signature: PermitSignature {
                v: 27,
                r: Default::default(),
                s: Default::default(),
            },
        };

        assert_eq!(permit.status(999, U256::from(5u64)), PermitStatus::Usable);
        assert_eq!(permit.status(1_000, U256::from(5u64)), PermitStatus::Expired);
        assert_eq!(permit.status(999, U256::from(6u64)), PermitStatus::Invalidated);
        assert!(permit.ensure_submittable(999, U256::from(5u64)).is_ok());
        assert!(matches!(
            permit.ensure_submittable(1_031, U256::from(5u64)),
            Err(PermitError::PermitExpired { deadline: 1_000, chain_time: 1_031 })
        ));
    }

    #[tokio::test]
    async fn test_prune_idle_locks() {
        let (signer, owner) = signer_with_owner(FixedReader::new(0));
        signer
            .create_permit(TOKEN, owner, POOL, U256::from(1u64), 30)
            .await
            .unwrap();

        let held = signer.lock_for(POOL, owner);
        let _guard = held.lock().await;

        assert_eq!(signer.prune_idle_locks(), 1);
        assert_eq!(signer.locks.len(), 1);
    }
}
