// Schnorr/ECDSA keypair on secp256k1.
//
// Any subset of {secret key, compressed ECDSA public key, x-only Schnorr
// public key} may be populated, depending on how the keypair was built:
// watch-only keypairs carry public material only.
use secp256k1::{Message, SECP256K1};

use crate::address::{Address, Prefix, Version};
use crate::error::CoreError;
use crate::hash::Hash;

/// A 64-byte signature tagged with the scheme that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signature {
    Schnorr([u8; 64]),
    Ecdsa([u8; 64]),
}

impl Signature {
    pub fn as_bytes(&self) -> &[u8; 64] {
        match self {
            Signature::Schnorr(bytes) => bytes,
            Signature::Ecdsa(bytes) => bytes,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Keypair {
    secret: Option<secp256k1::Keypair>,
    public: Option<secp256k1::PublicKey>,
    x_only: Option<secp256k1::XOnlyPublicKey>,
}

impl Keypair {
    /// Builds a fully populated keypair from a 32-byte secret key.
    pub fn from_secret_slice(secret: &[u8]) -> Result<Self, CoreError> {
        let keypair = secp256k1::Keypair::from_seckey_slice(SECP256K1, secret)?;
        let public = keypair.public_key();
        Ok(Self { secret: Some(keypair), public: Some(public), x_only: Some(public.x_only_public_key().0) })
    }

    /// Watch-only keypair from a 33-byte compressed public key.
    pub fn from_public_key_slice(public: &[u8]) -> Result<Self, CoreError> {
        let public = secp256k1::PublicKey::from_slice(public)?;
        Ok(Self { secret: None, public: Some(public), x_only: Some(public.x_only_public_key().0) })
    }

    /// Watch-only keypair from a 32-byte x-only public key. ECDSA address
    /// derivation is unavailable for such keypairs (the parity is unknown).
    pub fn from_x_only_public_key_slice(x_only: &[u8]) -> Result<Self, CoreError> {
        let x_only = secp256k1::XOnlyPublicKey::from_slice(x_only)?;
        Ok(Self { secret: None, public: None, x_only: Some(x_only) })
    }

    /// Fresh random keypair.
    pub fn random() -> Self {
        let keypair = secp256k1::Keypair::new(SECP256K1, &mut secp256k1::rand::thread_rng());
        let public = keypair.public_key();
        Self { secret: Some(keypair), public: Some(public), x_only: Some(public.x_only_public_key().0) }
    }

    pub fn has_secret_key(&self) -> bool {
        self.secret.is_some()
    }

    pub fn secret_bytes(&self) -> Result<[u8; 32], CoreError> {
        Ok(self.secret.as_ref().ok_or(CoreError::MissingPrivateKey)?.secret_bytes())
    }

    /// The 33-byte compressed ECDSA public key.
    pub fn public_key_bytes(&self) -> Result<[u8; 33], CoreError> {
        Ok(self.public.ok_or(CoreError::MissingEcdsaPublicKey)?.serialize())
    }

    /// The 32-byte x-only Schnorr public key.
    pub fn x_only_public_key_bytes(&self) -> Result<[u8; 32], CoreError> {
        Ok(self.x_only.ok_or(CoreError::MissingXOnlyPublicKey)?.serialize())
    }

    /// Signs a 32-byte digest with Schnorr.
    pub fn sign_schnorr(&self, digest: Hash) -> Result<Signature, CoreError> {
        let keypair = self.secret.as_ref().ok_or(CoreError::MissingPrivateKey)?;
        let message = Message::from_digest_slice(digest.as_bytes())?;
        Ok(Signature::Schnorr(*keypair.sign_schnorr(message).as_ref()))
    }

    /// Signs a 32-byte digest with deterministic-k ECDSA (compact form).
    pub fn sign_ecdsa(&self, digest: Hash) -> Result<Signature, CoreError> {
        let keypair = self.secret.as_ref().ok_or(CoreError::MissingPrivateKey)?;
        let message = Message::from_digest_slice(digest.as_bytes())?;
        Ok(Signature::Ecdsa(keypair.secret_key().sign_ecdsa(message).serialize_compact()))
    }

    /// Version-0 (Schnorr) address for this keypair.
    pub fn to_address(&self, prefix: Prefix) -> Result<Address, CoreError> {
        let payload = self.x_only_public_key_bytes()?;
        Address::new(prefix, Version::PubKey, &payload).map_err(|e| CoreError::Address(e.to_string()))
    }

    /// Version-1 (ECDSA) address for this keypair.
    pub fn to_address_ecdsa(&self, prefix: Prefix) -> Result<Address, CoreError> {
        let payload = self.public_key_bytes()?;
        Address::new(prefix, Version::PubKeyEcdsa, &payload).map_err(|e| CoreError::Address(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addresses_for_both_schemes() {
        let keypair = Keypair::random();
        let schnorr = keypair.to_address(Prefix::Mainnet).unwrap();
        assert_eq!(schnorr.version, Version::PubKey);
        assert_eq!(schnorr.payload.len(), 32);

        let ecdsa = keypair.to_address_ecdsa(Prefix::Mainnet).unwrap();
        assert_eq!(ecdsa.version, Version::PubKeyEcdsa);
        assert_eq!(ecdsa.payload.len(), 33);
    }

    #[test]
    fn test_watch_only_cannot_sign() {
        let full = Keypair::random();
        let watch = Keypair::from_x_only_public_key_slice(&full.x_only_public_key_bytes().unwrap()).unwrap();
        assert!(matches!(watch.sign_schnorr(Hash::from_bytes([1; 32])), Err(CoreError::MissingPrivateKey)));
        assert!(matches!(watch.to_address_ecdsa(Prefix::Mainnet), Err(CoreError::MissingEcdsaPublicKey)));
        assert_eq!(watch.to_address(Prefix::Mainnet).unwrap(), full.to_address(Prefix::Mainnet).unwrap());
    }

    #[test]
    fn test_signatures_verify() {
        let keypair = Keypair::random();
        let digest = Hash::from_bytes([7; 32]);
        let message = Message::from_digest_slice(digest.as_bytes()).unwrap();

        let Signature::Schnorr(sig) = keypair.sign_schnorr(digest).unwrap() else { panic!() };
        let sig = secp256k1::schnorr::Signature::from_slice(&sig).unwrap();
        let x_only =
            secp256k1::XOnlyPublicKey::from_slice(&keypair.x_only_public_key_bytes().unwrap()).unwrap();
        assert!(sig.verify(&message, &x_only).is_ok());

        let Signature::Ecdsa(sig) = keypair.sign_ecdsa(digest).unwrap() else { panic!() };
        let sig = secp256k1::ecdsa::Signature::from_compact(&sig).unwrap();
        let public = secp256k1::PublicKey::from_slice(&keypair.public_key_bytes().unwrap()).unwrap();
        assert!(sig.verify(&message, &public).is_ok());
    }
}
