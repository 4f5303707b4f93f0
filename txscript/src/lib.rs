// Sompi txscript - the script virtual machine, script builder and standard
// script tooling for the Kaspa block-DAG network.

pub mod caches;
pub mod data_stack;
pub mod engine;
pub mod error;
pub mod opcodes;
pub mod script_builder;
pub mod script_class;

pub use caches::{SigCache, SigCacheKey};
pub use engine::TxScriptEngine;
pub use error::TxScriptError;
pub use script_builder::{ScriptBuilder, ScriptBuilderError, ScriptBuilderResult};
pub use script_class::{
    extract_script_pub_key_address, get_sig_op_count, is_pay_to_pubkey, is_pay_to_pubkey_ecdsa,
    is_pay_to_script_hash, multisig_redeem_script, pay_to_address_script, pay_to_script_hash_script,
    pay_to_script_hash_signature_script, ScriptClass,
};

/// Script public key versions above this are unknown to the engine.
pub const MAX_SCRIPT_PUBLIC_KEY_VERSION: u16 = 0;
/// Combined data + alt stack entry bound.
pub const MAX_STACK_SIZE: usize = 244;
/// Maximum script byte size.
pub const MAX_SCRIPTS_SIZE: usize = 10_000;
/// Maximum size of one stack element.
pub const MAX_SCRIPT_ELEMENT_SIZE: usize = 520;
/// Countable (non-push) opcodes allowed per script.
pub const MAX_OPS_PER_SCRIPT: i32 = 201;
/// Sequence value marking an input as finalized.
pub const MAX_TX_IN_SEQUENCE_NUM: u64 = u64::MAX;
/// Sequence bit disabling relative lock-time semantics.
pub const SEQUENCE_LOCK_TIME_DISABLED: u64 = 1 << 63;
/// Low bits of the sequence carrying the relative lock.
pub const SEQUENCE_LOCK_TIME_MASK: u64 = 0x0000_0000_ffff_ffff;
/// Absolute lock-time values below this are DAA scores, above are
/// millisecond timestamps.
pub const LOCK_TIME_THRESHOLD: u64 = 500_000_000_000;
/// Key-count bound for CHECKMULTISIG.
pub const MAX_PUB_KEYS_PER_MULTISIG: i64 = 20;
/// The last opcode byte that does not count toward the operation limit.
pub const NO_COST_OPCODE: u8 = 0x60;
