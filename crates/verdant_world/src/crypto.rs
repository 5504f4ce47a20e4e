//! Hashing and signing primitives.
//!
//! Records are hashed as SHA-256 over their canonical CBOR encoding and
//! signed with ed25519. Addresses are the hex form of the signer's public
//! key, so the author field doubles as the verification key.

use std::fmt;

use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ChainError;

/// Account identity derived from an ed25519 public key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    pub fn from_public_key(key: &VerifyingKey) -> Self {
        Address(hex::encode(key.to_bytes()))
    }

    pub fn from_hex(hex_str: impl Into<String>) -> Result<Self, ChainError> {
        let hex_str = hex_str.into();
        let bytes = decode_hex_array::<32>(&hex_str, "address")?;
        VerifyingKey::from_bytes(&bytes).map_err(|_| ChainError::InvalidKey {
            reason: "address is not a valid ed25519 public key".to_string(),
        })?;
        Ok(Address(hex_str))
    }

    pub fn as_hex(&self) -> &str {
        &self.0
    }

    pub fn verifying_key(&self) -> Result<VerifyingKey, ChainError> {
        let bytes = decode_hex_array::<32>(&self.0, "address")?;
        VerifyingKey::from_bytes(&bytes).map_err(|_| ChainError::InvalidKey {
            reason: "address is not a valid ed25519 public key".to_string(),
        })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSignature(String);

impl RecordSignature {
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

/// Holds the node's signing key; the only component able to author records.
#[derive(Debug, Clone)]
pub struct Keyring {
    signing_key: SigningKey,
    address: Address,
}

impl Keyring {
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut rand_core::OsRng);
        let address = Address::from_public_key(&signing_key.verifying_key());
        Self {
            signing_key,
            address,
        }
    }

    pub fn from_seed_hex(seed_hex: &str) -> Result<Self, ChainError> {
        let seed = decode_hex_array::<32>(seed_hex, "ed25519 seed")?;
        let signing_key = SigningKey::from_bytes(&seed);
        let address = Address::from_public_key(&signing_key.verifying_key());
        Ok(Self {
            signing_key,
            address,
        })
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn sign_digest(&self, digest_hex: &str) -> Result<RecordSignature, ChainError> {
        let digest = hex::decode(digest_hex).map_err(|_| ChainError::InvalidKey {
            reason: "record hash is not valid hex".to_string(),
        })?;
        let signature = self.signing_key.sign(&digest);
        Ok(RecordSignature(hex::encode(signature.to_bytes())))
    }
}

/// Checks `signature` over the digest under `author`'s public key.
pub fn verify_digest(
    author: &Address,
    digest_hex: &str,
    signature: &RecordSignature,
) -> Result<bool, ChainError> {
    let verifying_key = author.verifying_key()?;
    let digest = match hex::decode(digest_hex) {
        Ok(digest) => digest,
        Err(_) => return Ok(false),
    };
    let signature_bytes = match decode_hex_array::<64>(signature.as_hex(), "signature") {
        Ok(bytes) => bytes,
        Err(_) => return Ok(false),
    };
    let signature = DalekSignature::from_bytes(&signature_bytes);
    Ok(verifying_key.verify(&digest, &signature).is_ok())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Canonical CBOR encoding used as hashing input; deterministic for a given
/// value regardless of in-memory representation.
pub fn to_canonical_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, ChainError> {
    let mut buf = Vec::with_capacity(256);
    let canonical_value = serde_cbor::value::to_value(value)?;
    let mut serializer = serde_cbor::ser::Serializer::new(&mut buf);
    serializer.self_describe()?;
    canonical_value.serialize(&mut serializer)?;
    Ok(buf)
}

fn decode_hex_array<const N: usize>(input: &str, field: &str) -> Result<[u8; N], ChainError> {
    let bytes = hex::decode(input).map_err(|_| ChainError::InvalidKey {
        reason: format!("{field} must be valid hex"),
    })?;
    bytes.try_into().map_err(|_| ChainError::InvalidKey {
        reason: format!("{field} must be {N}-byte hex"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keyring_signs_and_verifies() {
        let keyring = Keyring::generate();
        let digest = sha256_hex(b"payload");
        let signature = keyring.sign_digest(&digest).expect("sign");
        assert!(verify_digest(keyring.address(), &digest, &signature).expect("verify"));
    }

    #[test]
    fn verify_rejects_wrong_author() {
        let keyring = Keyring::generate();
        let other = Keyring::generate();
        let digest = sha256_hex(b"payload");
        let signature = keyring.sign_digest(&digest).expect("sign");
        assert!(!verify_digest(other.address(), &digest, &signature).expect("verify"));
    }

    #[test]
    fn seed_keyring_is_deterministic() {
        let seed = hex::encode([7_u8; 32]);
        let first = Keyring::from_seed_hex(&seed).expect("keyring");
        let second = Keyring::from_seed_hex(&seed).expect("keyring");
        assert_eq!(first.address(), second.address());
    }

    #[test]
    fn canonical_cbor_is_stable() {
        #[derive(Serialize)]
        struct Sample {
            a: u32,
            b: String,
        }
        let sample = Sample {
            a: 1,
            b: "x".to_string(),
        };
        let first = to_canonical_cbor(&sample).expect("encode");
        let second = to_canonical_cbor(&sample).expect("encode");
        assert_eq!(first, second);
    }

    #[test]
    fn bad_seed_hex_is_rejected() {
        let err = Keyring::from_seed_hex("zz").expect_err("must fail");
        assert!(matches!(err, ChainError::InvalidKey { .. }));
    }
}
