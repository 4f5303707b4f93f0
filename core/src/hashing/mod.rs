// Domain-separated BLAKE2b-256 hashing.
//
// Each writer is a keyed BLAKE2b state whose key is the raw ASCII bytes of
// the purpose name, so digests from different purposes can never be
// cross-interpreted.
use blake2::digest::consts::U32;
use blake2::digest::{FixedOutput, KeyInit, Update};
use blake2::Blake2bMac;
use sha2::{Digest, Sha256};

use crate::hash::Hash;

pub mod sighash;
pub mod sighash_type;
pub mod tx;

/// Full transaction body hash (includes signature scripts).
pub const TRANSACTION_HASH_DOMAIN: &[u8] = b"TransactionHash";
/// Canonical transaction id (signature scripts replaced with empty).
pub const TRANSACTION_ID_DOMAIN: &[u8] = b"TransactionID";
/// Schnorr signing pre-image.
pub const TRANSACTION_SIGNING_HASH_DOMAIN: &[u8] = b"TransactionSigningHash";
/// Outer SHA-256 domain for the ECDSA signing hash.
pub const TRANSACTION_SIGNING_HASH_ECDSA_DOMAIN: &[u8] = b"TransactionSigningHashECDSA";
/// Off-chain personal message signing.
pub const PERSONAL_MESSAGE_SIGNING_HASH_DOMAIN: &[u8] = b"PersonalMessageSigningHash";

/// A keyed BLAKE2b-256 writer. Field encodings are little-endian; variable
/// length byte runs are prefixed with their u64 length.
#[derive(Clone)]
pub struct HashWriter(Blake2bMac<U32>);

impl HashWriter {
    pub fn new(domain: &[u8]) -> Self {
        Self(Blake2bMac::new_from_slice(domain).expect("domain key fits the blake2b key size"))
    }

    pub fn update(&mut self, data: impl AsRef<[u8]>) -> &mut Self {
        Update::update(&mut self.0, data.as_ref());
        self
    }

    pub fn write_u8(&mut self, v: u8) -> &mut Self {
        self.update([v])
    }

    pub fn write_u16(&mut self, v: u16) -> &mut Self {
        self.update(v.to_le_bytes())
    }

    pub fn write_u32(&mut self, v: u32) -> &mut Self {
        self.update(v.to_le_bytes())
    }

    pub fn write_u64(&mut self, v: u64) -> &mut Self {
        self.update(v.to_le_bytes())
    }

    pub fn write_len(&mut self, len: usize) -> &mut Self {
        self.write_u64(len as u64)
    }

    pub fn write_var_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.write_len(bytes.len()).update(bytes)
    }

    pub fn finalize(self) -> Hash {
        Hash::from_slice(&self.0.finalize_fixed())
    }
}

/// Applies the outer SHA-256 wrap that turns a Schnorr signing digest into
/// the digest signed with ECDSA: `SHA256(SHA256(domain) || digest)`.
pub fn ecdsa_signing_digest(signing_hash: Hash) -> Hash {
    let domain_hash = Sha256::digest(TRANSACTION_SIGNING_HASH_ECDSA_DOMAIN);
    let mut hasher = Sha256::new();
    Digest::update(&mut hasher, domain_hash);
    Digest::update(&mut hasher, signing_hash.as_bytes());
    Hash::from_slice(&hasher.finalize())
}

/// Digest for off-chain personal message signing.
pub fn personal_message_hash(message: &[u8]) -> Hash {
    let mut writer = HashWriter::new(PERSONAL_MESSAGE_SIGNING_HASH_DOMAIN);
    writer.update(message);
    writer.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domains_separate() {
        let mut a = HashWriter::new(TRANSACTION_HASH_DOMAIN);
        let mut b = HashWriter::new(TRANSACTION_ID_DOMAIN);
        a.update([1, 2, 3]);
        b.update([1, 2, 3]);
        assert_ne!(a.finalize(), b.finalize());
    }

    #[test]
    fn test_var_bytes_framing() {
        // An empty var-bytes write is a length prefix, not a no-op.
        let plain = HashWriter::new(TRANSACTION_HASH_DOMAIN).finalize();
        let mut framed = HashWriter::new(TRANSACTION_HASH_DOMAIN);
        framed.write_var_bytes(&[]);
        assert_ne!(plain, framed.finalize());
    }
}
