//! EIP-712 domains, permit signing hashes, and signature handling.
//!
//! Provides:
//! - [`TokenDomain`], the token-side domain, built either from EIP-5267
//!   `eip712Domain()` or from the classic `name()`/`version()` pair
//! - [`permit_signing_hash`] for the `Permit` struct under a token's domain
//! - [`PermitSignature`], the `(v, r, s)` triple the pool's permit entry points take
//! - [`verify_permit_signature`] with EIP-2 malleability protection

use std::borrow::Cow;

use alloy::primitives::{Address, Signature, B256, U256};
use alloy::sol_types::{Eip712Domain, SolStruct};
use serde::{Deserialize, Serialize};

use crate::{Permit, PermitError};

/// EIP-5267 `fields` bits.
pub const FIELD_NAME: u8 = 0x01;
pub const FIELD_VERSION: u8 = 0x02;
pub const FIELD_CHAIN_ID: u8 = 0x04;
pub const FIELD_VERIFYING_CONTRACT: u8 = 0x08;
pub const FIELD_SALT: u8 = 0x10;

/// Version assumed for tokens that expose no `version()`.
pub const DEFAULT_DOMAIN_VERSION: &str = "1";

/// The EIP-712 domain a token uses for its own permit separator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenDomain {
    pub name: Option<String>,
    pub version: Option<String>,
    pub chain_id: Option<u64>,
    pub verifying_contract: Option<Address>,
    pub salt: Option<B256>,
    /// `DOMAIN_SEPARATOR()` as reported by the token, when it has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onchain_separator: Option<B256>,
}

impl TokenDomain {
    /// Domain of a standard EIP-2612 token: name, version, chain id, token address.
    pub fn standard(
        name: impl Into<String>,
        version: impl Into<String>,
        chain_id: u64,
        token: Address,
    ) -> Self {
        Self {
            name: Some(name.into()),
            version: Some(version.into()),
            chain_id: Some(chain_id),
            verifying_contract: Some(token),
            salt: None,
            onchain_separator: None,
        }
    }

    /// Build a domain from the tuple returned by EIP-5267 `eip712Domain()`.
    /// Only the fields flagged in `fields` are kept.
    pub fn from_eip5267(
        fields: u8,
        name: String,
        version: String,
        chain_id: U256,
        verifying_contract: Address,
        salt: B256,
        extensions: &[U256],
    ) -> Result<Self, PermitError> {
        if !extensions.is_empty() {
            return Err(PermitError::UnsupportedDomain(format!(
                "{} EIP-5267 extension(s) declared",
                extensions.len()
            )));
        }

        let chain_id = if fields & FIELD_CHAIN_ID != 0 {
            Some(u64::try_from(chain_id).map_err(|_| {
                PermitError::UnsupportedDomain(format!("chain id {chain_id} does not fit in u64"))
            })?)
        } else {
            None
        };

        Ok(Self {
            name: (fields & FIELD_NAME != 0).then_some(name),
            version: (fields & FIELD_VERSION != 0).then_some(version),
            chain_id,
            verifying_contract: (fields & FIELD_VERIFYING_CONTRACT != 0).then_some(verifying_contract),
            salt: (fields & FIELD_SALT != 0).then_some(salt),
            onchain_separator: None,
        })
    }

    /// Attach the token's reported `DOMAIN_SEPARATOR()`.
    pub fn with_onchain_separator(mut self, separator: B256) -> Self {
        self.onchain_separator = Some(separator);
        self
    }

    pub fn to_eip712_domain(&self) -> Eip712Domain {
        Eip712Domain {
            name: self.name.clone().map(Cow::Owned),
            version: self.version.clone().map(Cow::Owned),
            chain_id: self.chain_id.map(U256::from),
            verifying_contract: self.verifying_contract,
            salt: self.salt,
        }
    }

    /// Locally computed domain separator.
    pub fn separator(&self) -> B256 {
        self.to_eip712_domain().separator()
    }

    /// Fail if the token reported a separator that differs from ours. A
    /// signature over a mismatching domain is always rejected on-chain.
    pub fn check_onchain_separator(&self) -> Result<(), PermitError> {
        match self.onchain_separator {
            Some(onchain) => {
                let computed = self.separator();
                if onchain != computed {
                    return Err(PermitError::DomainMismatch { onchain, computed });
                }
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// Compute the EIP-712 signing hash of a permit under the token's domain.
pub fn permit_signing_hash(permit: &Permit, domain: &TokenDomain) -> B256 {
    permit.eip712_signing_hash(&domain.to_eip712_domain())
}

/// secp256k1 curve order N / 2; signatures with s > this are malleable (EIP-2).
const SECP256K1_N_DIV_2: U256 = U256::from_limbs([
    0xBFD25E8CD0364140,
    0xBAAEDCE6AF48A03B,
    0xFFFFFFFFFFFFFFFE,
    0x7FFFFFFFFFFFFFFF,
]);

/// Verify a 65-byte permit signature and return the recovered signer.
/// Rejects high-s signatures (EIP-2).
pub fn verify_permit_signature(
    permit: &Permit,
    signature_bytes: &[u8],
    domain: &TokenDomain,
) -> Result<Address, PermitError> {
    if signature_bytes.len() != 65 {
        return Err(PermitError::SignatureError(format!(
            "signature must be 65 bytes, got {}",
            signature_bytes.len()
        )));
    }

    // from_raw accepts v in {0, 1, 27, 28}.
    let sig = Signature::from_raw(signature_bytes)
        .map_err(|e| PermitError::SignatureError(format!("invalid signature: {e}")))?;

    if sig.s() > SECP256K1_N_DIV_2 {
        return Err(PermitError::SignatureError(
            "high-s signature rejected (EIP-2 malleability)".to_string(),
        ));
    }

    let hash = permit_signing_hash(permit, domain);
    sig.recover_address_from_prehash(&hash)
        .map_err(|e| PermitError::SignatureError(format!("recovery failed: {e}")))
}

/// Permit signature split into the `(v, r, s)` arguments taken by
/// `permit`, `repayWithPermit` and `supplyWithPermit`.
///
/// `v` uses the 27/28 convention expected by `ecrecover`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitSignature {
    pub v: u8,
    pub r: B256,
    pub s: B256,
}

impl PermitSignature {
    pub fn from_signature(sig: &Signature) -> Self {
        Self {
            v: 27 + u8::from(sig.v()),
            r: B256::from(sig.r().to_be_bytes::<32>()),
            s: B256::from(sig.s().to_be_bytes::<32>()),
        }
    }

    /// Recovery id in the 0/1 convention.
    pub fn parity_v(&self) -> u8 {
        if self.v >= 27 {
            self.v - 27
        } else {
            self.v
        }
    }

    pub fn to_signature(&self) -> Result<Signature, PermitError> {
        let parity = match self.v {
            0 | 27 => false,
            1 | 28 => true,
            v => {
                return Err(PermitError::SignatureError(format!(
                    "invalid recovery id {v}"
                )))
            }
        };
        Ok(Signature::new(
            U256::from_be_slice(self.r.as_slice()),
            U256::from_be_slice(self.s.as_slice()),
            parity,
        ))
    }

    /// 65-byte `r || s || v` encoding.
    pub fn as_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[..32].copy_from_slice(self.r.as_slice());
        out[32..64].copy_from_slice(self.s.as_slice());
        out[64] = self.v;
        out
    }

    /// Hex string with 0x prefix (0x + 130 hex chars).
    pub fn to_hex(&self) -> String {
        format!("0x{}", alloy::hex::encode(self.as_bytes()))
    }
}
