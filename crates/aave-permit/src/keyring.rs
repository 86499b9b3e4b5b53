use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::Address;
use alloy::signers::Signer;

/// Signers able to produce EIP-712 signatures, indexed by the address they
/// sign for. Owners missing from the keyring cannot create permits.
pub struct Keyring<S> {
    signers: HashMap<Address, Arc<S>>,
}

impl<S: Signer + Send + Sync> Keyring<S> {
    pub fn new() -> Self {
        Self {
            signers: HashMap::new(),
        }
    }

    /// Attach a signer. Returns the address it signs for; a signer already
    /// attached for that address is replaced.
    pub fn insert(&mut self, signer: S) -> Address {
        let address = signer.address();
        self.signers.insert(address, Arc::new(signer));
        address
    }

    pub fn get(&self, owner: &Address) -> Option<Arc<S>> {
        self.signers.get(owner).cloned()
    }

    pub fn contains(&self, owner: &Address) -> bool {
        self.signers.contains_key(owner)
    }

    pub fn addresses(&self) -> impl Iterator<Item = &Address> {
        self.signers.keys()
    }

    pub fn len(&self) -> usize {
        self.signers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signers.is_empty()
    }
}

impl<S: Signer + Send + Sync> Default for Keyring<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Signer + Send + Sync> FromIterator<S> for Keyring<S> {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut keyring = Self::new();
        for signer in iter {
            keyring.insert(signer);
        }
        keyring
    }
}
