// Sompi core - primitive types, domain-separated hashing, signing-hash
// construction and keypair operations for the Kaspa block-DAG network.
//
// Everything in this crate is a pure in-memory computation; network I/O
// belongs to external collaborators.

pub mod address;
pub mod error;
pub mod hash;
pub mod hashing;
pub mod keypair;
pub mod network;
pub mod sign;
pub mod subnets;
pub mod tx;

pub use address::{Address, AddressError, Prefix, Version};
pub use error::CoreError;
pub use hash::{Hash, ZERO_HASH};
pub use keypair::{Keypair, Signature};
pub use network::{NetworkId, NetworkType};
pub use subnets::{SubnetworkId, SUBNETWORK_ID_COINBASE, SUBNETWORK_ID_NATIVE, SUBNETWORK_ID_REGISTRY};
pub use tx::{
    ScriptPublicKey, SignableTransaction, Transaction, TransactionId, TransactionInput, TransactionOutpoint,
    TransactionOutput, UtxoEntry, VerifiableTransaction, MAX_SOMPI, TX_VERSION, UNACCEPTED_DAA_SCORE,
};
