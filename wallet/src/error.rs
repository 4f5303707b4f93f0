// Wallet-level error types.
use thiserror::Error;

use sompi_core::{AddressError, CoreError};
use sompi_txscript::{ScriptBuilderError, TxScriptError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("Insufficient funds: {additional_needed} additional sompi needed to cover {target} sompi")]
    InsufficientFunds { target: u64, additional_needed: u64 },

    #[error("Storage mass exceeds maximum")]
    StorageMassExceedsMaximum,

    #[error("Transaction mass {0} exceeds the maximum of {1}")]
    MassLimitExceeded(u64, u64),

    #[error("Priority UTXO entries do not fit the final transaction")]
    PriorityUtxoConflict,

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Transactions do not refer to the same underlying transaction")]
    PsktMismatch,

    #[error("Input {0} has no signatures to finalize")]
    PsktMissingSignatures(usize),

    #[error("Script verification failed for input {0}: {1}")]
    ScriptVerification(usize, String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    TxScript(#[from] TxScriptError),

    #[error(transparent)]
    ScriptBuilder(#[from] ScriptBuilderError),
}

pub type WalletResult<T> = Result<T, WalletError>;
