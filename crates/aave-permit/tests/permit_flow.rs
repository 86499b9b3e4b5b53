//! Permit lifecycle against an in-memory token: sign, check, consume.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use aave_permit::eip712::TokenDomain;
use aave_permit::permit::unix_now;
use aave_permit::{Keyring, PermitError, PermitSigner, PermitStatus, TokenReader};
use alloy::primitives::{address, Address, U256};
use alloy::signers::local::PrivateKeySigner;

const DAI: Address = address!("FF34B3d4Aee8ddCd6F9AFFFB6Fe49bD371b8a357");
const POOL: Address = address!("6Ae43d3271ff6888e7Fc43Fd7321a503ff738951");

/// Token whose nonce the test advances by hand, standing in for on-chain
/// permit consumption.
struct MockToken {
    nonce: Mutex<U256>,
    reads: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    read_delay: Duration,
}

impl MockToken {
    fn new(nonce: u64) -> Self {
        Self {
            nonce: Mutex::new(U256::from(nonce)),
            reads: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            read_delay: Duration::ZERO,
        }
    }

    fn consume(&self) {
        *self.nonce.lock().unwrap() += U256::from(1u64);
    }

    fn current(&self) -> U256 {
        *self.nonce.lock().unwrap()
    }
}

impl TokenReader for MockToken {
    async fn domain(&self, token: Address) -> Result<TokenDomain, PermitError> {
        let domain = TokenDomain::standard("Dai Stablecoin", "1", 11155111, token);
        let separator = domain.separator();
        Ok(domain.with_onchain_separator(separator))
    }

    async fn nonce(&self, _token: Address, _owner: Address) -> Result<U256, PermitError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.read_delay.is_zero() {
            tokio::time::sleep(self.read_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self.current())
    }
}

fn setup(token: MockToken) -> (PermitSigner<MockToken, PrivateKeySigner>, Address) {
    let mut keyring = Keyring::new();
    let owner = keyring.insert(PrivateKeySigner::random());
    (PermitSigner::new(token, keyring), owner)
}

fn dai(units: u64) -> U256 {
    U256::from(units) * U256::from(10u64).pow(U256::from(18u64))
}

#[tokio::test]
async fn dai_permit_expires_after_its_window() {
    let (signer, owner) = setup(MockToken::new(5));
    let start = unix_now().unwrap();

    let permit = signer
        .create_permit(DAI, owner, POOL, dai(1_000), 30)
        .await
        .unwrap();

    assert_eq!(permit.message.nonce, U256::from(5u64));
    assert_eq!(permit.message.value, dai(1_000));
    assert!(permit.deadline() > start);
    assert!(permit.deadline().abs_diff(start + 30) <= 1);

    let nonce = signer.reader().current();
    assert!(permit.ensure_submittable(start + 29, nonce).is_ok());

    let err = permit.ensure_submittable(start + 31, nonce).unwrap_err();
    assert!(matches!(err, PermitError::PermitExpired { .. }));
    assert!(err.requires_resign());
}

#[tokio::test]
async fn signature_recovers_to_owner() {
    let (signer, owner) = setup(MockToken::new(0));

    let permit = signer
        .create_permit(DAI, owner, POOL, U256::from(42u64), 60)
        .await
        .unwrap();

    assert_eq!(permit.recover_signer().unwrap(), owner);
    assert_eq!(permit.domain.verifying_contract, Some(DAI));
    assert_eq!(permit.message.spender, POOL);
}

#[tokio::test]
async fn second_permit_on_same_nonce_is_invalidated_after_first_is_consumed() {
    let (signer, owner) = setup(MockToken::new(7));

    let first = signer
        .create_permit(DAI, owner, POOL, dai(1), 60)
        .await
        .unwrap();
    let second = signer
        .create_permit(DAI, owner, POOL, dai(1), 90)
        .await
        .unwrap();

    assert_eq!(first.message.nonce, second.message.nonce);
    assert_eq!(first.message.owner, second.message.owner);
    assert_eq!(first.message.value, second.message.value);
    assert!(second.deadline() > first.deadline());
    assert_eq!(first.recover_signer().unwrap(), owner);
    assert_eq!(second.recover_signer().unwrap(), owner);

    let now = unix_now().unwrap();
    assert!(first.ensure_submittable(now, signer.reader().current()).is_ok());
    signer.reader().consume();

    let nonce = signer.reader().current();
    assert_eq!(second.status(now, nonce), PermitStatus::Invalidated);
    let err = second.ensure_submittable(now, nonce).unwrap_err();
    assert!(matches!(
        err,
        PermitError::PermitInvalidated { signed, current }
            if signed == U256::from(7u64) && current == U256::from(8u64)
    ));
}

#[tokio::test]
async fn zero_window_and_missing_signer_do_no_io() {
    let (signer, owner) = setup(MockToken::new(0));
    let stranger = PrivateKeySigner::random().address();

    let err = signer
        .create_permit(DAI, owner, POOL, dai(1), 0)
        .await
        .unwrap_err();
    assert!(matches!(err, PermitError::InvalidValidityWindow(0)));

    let err = signer
        .create_permit(DAI, stranger, POOL, dai(1), 30)
        .await
        .unwrap_err();
    assert!(matches!(err, PermitError::SignerUnavailable(a) if a == stranger));

    assert_eq!(signer.reader().reads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn concurrent_permits_for_same_owner_are_serialized() {
    let mut token = MockToken::new(0);
    token.read_delay = Duration::from_millis(20);
    let (signer, owner) = setup(token);

    let (a, b, c) = tokio::join!(
        signer.create_permit(DAI, owner, POOL, dai(1), 30),
        signer.create_permit(DAI, owner, POOL, dai(2), 30),
        signer.create_permit(DAI, owner, POOL, dai(3), 30),
    );

    assert!(a.is_ok() && b.is_ok() && c.is_ok());
    assert_eq!(signer.reader().reads.load(Ordering::SeqCst), 3);
    assert_eq!(signer.reader().max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn signed_permit_serializes_for_handoff() {
    let (signer, owner) = setup(MockToken::new(3));
    let permit = signer
        .create_permit(DAI, owner, POOL, dai(5), 30)
        .await
        .unwrap();

    let json = permit.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["message"]["deadline"], permit.deadline());
    assert!(value["signature"]["v"] == 27 || value["signature"]["v"] == 28);

    let back: aave_permit::SignedPermit = serde_json::from_str(&json).unwrap();
    assert_eq!(back, permit);
}
