//! Record model: one action at each stage of trust.
//!
//! `RawRecord` is pre-hash content and never transmitted. Hashing produces a
//! `HashedRecord`, signing produces a `SignedRecord` (the unit stored on a
//! chain), and `Candidate` wraps a signed record that has not yet passed
//! verification.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::action::RecordContent;
use crate::crypto::{sha256_hex, to_canonical_cbor, Address, Keyring, RecordSignature};
use crate::error::ChainError;

/// Milliseconds since epoch; totally ordered.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|duration| duration.as_millis() as i64)
            .unwrap_or(0);
        Timestamp(millis)
    }

    pub fn millis(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord<T> {
    pub timestamp: Timestamp,
    pub author: Address,
    pub content: T,
}

impl<T: Serialize + Clone> RawRecord<T> {
    pub fn new(timestamp: Timestamp, author: Address, content: T) -> Self {
        Self {
            timestamp,
            author,
            content,
        }
    }

    /// Computes the record digest over the canonical encoding of the raw
    /// fields. Deterministic: the same input always yields the same hash.
    pub fn into_hashed(self) -> Result<HashedRecord<T>, ChainError> {
        let digest = sha256_hex(&to_canonical_cbor(&self)?);
        Ok(HashedRecord {
            timestamp: self.timestamp,
            author: self.author,
            content: self.content,
            hash: digest,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashedRecord<T> {
    pub timestamp: Timestamp,
    pub author: Address,
    pub content: T,
    pub hash: String,
}

impl<T: Serialize + Clone> HashedRecord<T> {
    /// Signs the digest with the supplied keyring. Fails when the keyring's
    /// derived address is not the record's author, so a foreign-key signature
    /// never reaches the network.
    pub fn into_signed(self, keyring: &Keyring) -> Result<SignedRecord<T>, ChainError> {
        if keyring.address() != &self.author {
            return Err(ChainError::KeyMismatch {
                expected: self.author.as_hex().to_string(),
                actual: keyring.address().as_hex().to_string(),
            });
        }
        let signature = keyring.sign_digest(&self.hash)?;
        Ok(SignedRecord {
            timestamp: self.timestamp,
            author: self.author,
            content: self.content,
            hash: self.hash,
            signature,
        })
    }
}

/// A fully attested record; the unit stored on a chain once committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedRecord<T> {
    pub timestamp: Timestamp,
    pub author: Address,
    pub content: T,
    pub hash: String,
    pub signature: RecordSignature,
}

impl<T: Serialize + Clone> SignedRecord<T> {
    /// Recomputes the digest from the raw fields; the wire value is never
    /// trusted.
    pub fn recompute_hash(&self) -> Result<String, ChainError> {
        let raw = RawRecord {
            timestamp: self.timestamp,
            author: self.author.clone(),
            content: self.content.clone(),
        };
        let bytes = to_canonical_cbor(&raw)?;
        Ok(sha256_hex(&bytes))
    }

    pub fn into_candidate(self) -> Candidate<T> {
        Candidate { record: self }
    }
}

/// A signed record not yet accepted into a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate<T> {
    pub record: SignedRecord<T>,
}

pub type ActionRecord = SignedRecord<RecordContent>;
pub type ActionCandidate = Candidate<RecordContent>;

/// Builds a signed record for `content` in one step.
pub fn seal_record<T: Serialize + Clone>(
    timestamp: Timestamp,
    keyring: &Keyring,
    content: T,
) -> Result<SignedRecord<T>, ChainError> {
    RawRecord::new(timestamp, keyring.address().clone(), content)
        .into_hashed()?
        .into_signed(keyring)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::verify_digest;

    fn sample_record(keyring: &Keyring) -> SignedRecord<String> {
        seal_record(Timestamp(42), keyring, "payload".to_string()).expect("seal")
    }

    #[test]
    fn hashing_is_deterministic() {
        let keyring = Keyring::generate();
        let raw = RawRecord::new(Timestamp(1), keyring.address().clone(), "x".to_string());
        let first = raw.clone().into_hashed().expect("hash");
        let second = raw.into_hashed().expect("hash");
        assert_eq!(first.hash, second.hash);
    }

    #[test]
    fn signed_record_verifies_under_author_key() {
        let keyring = Keyring::generate();
        let record = sample_record(&keyring);
        assert_eq!(record.recompute_hash().expect("recompute"), record.hash);
        assert!(verify_digest(&record.author, &record.hash, &record.signature).expect("verify"));
    }

    #[test]
    fn tampered_content_changes_the_recomputed_hash() {
        let keyring = Keyring::generate();
        let mut record = sample_record(&keyring);
        record.content = "qayload".to_string();
        assert_ne!(record.recompute_hash().expect("recompute"), record.hash);
    }

    #[test]
    fn signing_with_foreign_key_fails_key_mismatch() {
        let author = Keyring::generate();
        let stranger = Keyring::generate();
        let hashed = RawRecord::new(Timestamp(7), author.address().clone(), "x".to_string())
            .into_hashed()
            .expect("hash");
        let err = hashed.into_signed(&stranger).expect_err("must fail");
        assert!(matches!(err, ChainError::KeyMismatch { .. }));
    }

    #[test]
    fn candidate_wraps_without_changing_the_record() {
        let keyring = Keyring::generate();
        let record = sample_record(&keyring);
        let candidate = record.clone().into_candidate();
        assert_eq!(candidate.record, record);
    }
}
