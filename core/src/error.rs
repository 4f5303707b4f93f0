// Error types for the core primitives and signing paths
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid hash length: {0} (expected 32)")]
    InvalidHashLength(usize),

    #[error("Invalid subnetwork id length: {0} (expected 20)")]
    InvalidSubnetworkIdLength(usize),

    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    #[error("Invalid sighash type: {0:#04x}")]
    InvalidSigHashType(u8),

    #[error("Input index {0} is out of range (transaction has {1} inputs)")]
    InputIndexOutOfRange(usize, usize),

    #[error("UTXO entry for input {0} is not populated")]
    MissingUtxoEntry(usize),

    #[error("Keypair is missing the private key")]
    MissingPrivateKey,

    #[error("Keypair is missing the x-only public key")]
    MissingXOnlyPublicKey,

    #[error("Keypair is missing the ECDSA public key")]
    MissingEcdsaPublicKey,

    #[error("The transaction is partially signed")]
    PartiallySigned,

    #[error("The transaction is fully signed")]
    FullySigned,

    #[error("Signature verification failed for input {0}: {1}")]
    SignatureVerification(usize, String),

    #[error("Secp256k1 error: {0}")]
    Secp256k1(String),

    #[error("Address error: {0}")]
    Address(String),

    #[error("Invalid network type: {0}")]
    InvalidNetworkType(String),

    #[error("Invalid network id: {0}")]
    InvalidNetworkId(String),
}

impl From<hex::FromHexError> for CoreError {
    fn from(err: hex::FromHexError) -> Self {
        CoreError::InvalidHex(err.to_string())
    }
}

impl From<secp256k1::Error> for CoreError {
    fn from(err: secp256k1::Error) -> Self {
        CoreError::Secp256k1(err.to_string())
    }
}
