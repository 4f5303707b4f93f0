// Script execution failure reasons. The set is closed: verification code
// matches on these, and user-facing tooling matches on the messages.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TxScriptError {
    #[error("malformed push: opcode {0:#04x} declares {1} bytes but {2} remain")]
    MalformedPush(u8, usize, usize),

    #[error("attempt to execute disabled opcode {0:#04x}")]
    OpcodeDisabled(u8),

    #[error("attempt to execute reserved opcode {0:#04x}")]
    OpcodeReserved(u8),

    #[error("attempt to execute invalid opcode {0:#04x}")]
    InvalidOpcode(u8),

    #[error("attempt to read from empty stack")]
    EmptyStack,

    #[error("stack underflow: operation requires {0} items, stack has {1}")]
    StackUnderflow(usize, usize),

    #[error("combined stack size {0} exceeds the limit of {1}")]
    StackSizeExceeded(usize, usize),

    #[error("element size {0} exceeds the limit of {1}")]
    ElementTooBig(usize, usize),

    #[error("exceeded the limit of {0} operations per script")]
    TooManyOperations(i32),

    #[error("push is not minimally encoded: {0}")]
    NotMinimalData(String),

    #[error("number exceeds {0} bytes")]
    NumberTooBig(usize),

    #[error("expected boolean")]
    NotABoolean,

    #[error("unbalanced conditional")]
    UnbalancedConditional,

    #[error("false stack entry at end of script execution")]
    EvalFalse,

    #[error("script returned early")]
    EarlyReturn,

    #[error("verify failed")]
    VerifyFailed,

    #[error("stack contains {0} unexpected extra items after script execution")]
    CleanStack(usize),

    #[error("not all signatures are empty on a failed checkmultisig")]
    NullFail,

    #[error("invalid signature length {0}")]
    SigLength(usize),

    #[error("unsupported public key format")]
    PubKeyFormat,

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("invalid sighash type {0:#04x}")]
    InvalidSigHashType(u8),

    #[error("invalid public key count {0} in multisig")]
    InvalidPubKeyCount(i64),

    #[error("invalid signature count {0} in multisig")]
    InvalidSignatureCount(i64),

    #[error("transaction input index {0} is out of range (>= {1})")]
    InvalidIndex(usize, usize),

    #[error("input {0} is out of range for introspection (transaction has {1} inputs)")]
    InvalidInputIndex(i64, usize),

    #[error("output {0} is out of range for introspection (transaction has {1} outputs)")]
    InvalidOutputIndex(i64, usize),

    #[error("opcode requires a transaction input context")]
    NotATransactionInput,

    #[error("unsatisfied lock time: {0}")]
    UnsatisfiedLockTime(String),

    #[error("sig op count exceeded: used {0} of budget {1}")]
    SigOpCountExceeded(u32, u32),

    #[error("no scripts to execute")]
    NoScripts,

    #[error("signature script is not push only")]
    SignatureScriptNotPushOnly,

    #[error("script of size {0} exceeds the limit of {1}")]
    ScriptTooBig(usize, usize),

    #[error("error computing signing hash: {0}")]
    SigningHash(String),
}
