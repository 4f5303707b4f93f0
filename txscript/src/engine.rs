// The script virtual machine: dual data/alt stacks, a conditional stack,
// flat opcode dispatch, signature verification and P2SH re-execution.
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use secp256k1::Message;
use sha2::Sha256;
use tracing::warn;

use sompi_core::hashing::sighash::{calc_ecdsa_signature_hash, calc_schnorr_signature_hash, SigHashReusedValues};
use sompi_core::hashing::sighash_type::SigHashType;
use sompi_core::tx::{TransactionInput, UtxoEntry, VerifiableTransaction};

use crate::caches::{SigCache, SigCacheKey};
use crate::data_stack::{deserialize_i64, to_bool, DataStack, Stack, EXTENDED_SCRIPT_NUM_LEN};
use crate::error::TxScriptError;
use crate::opcodes::codes::*;
use crate::opcodes::{is_push_only, ParsedOpcode, ScriptIter};
use crate::{
    LOCK_TIME_THRESHOLD, MAX_OPS_PER_SCRIPT, MAX_PUB_KEYS_PER_MULTISIG, MAX_SCRIPTS_SIZE, MAX_SCRIPT_ELEMENT_SIZE,
    MAX_SCRIPT_PUBLIC_KEY_VERSION, MAX_STACK_SIZE, MAX_TX_IN_SEQUENCE_NUM, NO_COST_OPCODE, SEQUENCE_LOCK_TIME_DISABLED,
    SEQUENCE_LOCK_TIME_MASK,
};

type Blake2b256 = Blake2b<U32>;

/// Conditional-stack frame: the state of one IF/ELSE/ENDIF nesting level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpCond {
    False,
    True,
    Skip,
}

enum ScriptSource<'a, T: VerifiableTransaction> {
    TxInput { tx: &'a T, input: &'a TransactionInput, id: usize, utxo_entry: &'a UtxoEntry, is_p2sh: bool },
    StandAloneScripts(Vec<&'a [u8]>),
}

pub struct TxScriptEngine<'a, T: VerifiableTransaction> {
    dstack: Stack,
    astack: Stack,

    script_source: ScriptSource<'a, T>,

    // Shared caches handed in by the caller: sub-hash memo per transaction,
    // signature-verification cache per engine lifetime.
    reused_values: &'a mut SigHashReusedValues,
    sig_cache: &'a mut SigCache,

    cond_stack: Vec<OpCond>,

    num_ops: i32,
    sig_ops_used: u32,
}

impl<'a, T: VerifiableTransaction> TxScriptEngine<'a, T> {
    pub fn new(reused_values: &'a mut SigHashReusedValues, sig_cache: &'a mut SigCache) -> Self {
        Self {
            dstack: vec![],
            astack: vec![],
            script_source: ScriptSource::StandAloneScripts(vec![]),
            reused_values,
            sig_cache,
            cond_stack: vec![],
            num_ops: 0,
            sig_ops_used: 0,
        }
    }

    pub fn from_transaction_input(
        tx: &'a T,
        input: &'a TransactionInput,
        id: usize,
        utxo_entry: &'a UtxoEntry,
        reused_values: &'a mut SigHashReusedValues,
        sig_cache: &'a mut SigCache,
    ) -> Result<Self, TxScriptError> {
        let pubkey_script = utxo_entry.script_public_key.script();
        let is_p2sh = (pubkey_script.len() == 35)
            && (pubkey_script[0] == OpBlake2b)
            && (pubkey_script[1] == OpData32)
            && (pubkey_script[34] == OpEqual);
        if id >= tx.tx().inputs.len() {
            return Err(TxScriptError::InvalidIndex(id, tx.tx().inputs.len()));
        }
        Ok(Self {
            dstack: Default::default(),
            astack: Default::default(),
            script_source: ScriptSource::TxInput { tx, input, id, utxo_entry, is_p2sh },
            reused_values,
            sig_cache,
            cond_stack: Default::default(),
            num_ops: 0,
            sig_ops_used: 0,
        })
    }

    pub fn from_script(
        script: &'a [u8],
        reused_values: &'a mut SigHashReusedValues,
        sig_cache: &'a mut SigCache,
    ) -> Self {
        Self {
            dstack: Default::default(),
            astack: Default::default(),
            script_source: ScriptSource::StandAloneScripts(vec![script]),
            reused_values,
            sig_cache,
            cond_stack: Default::default(),
            num_ops: 0,
            sig_ops_used: 0,
        }
    }

    #[inline]
    fn is_executing(&self) -> bool {
        self.cond_stack.iter().all(|cond| *cond == OpCond::True)
    }

    pub fn execute(&mut self) -> Result<(), TxScriptError> {
        let (scripts, is_p2sh) = match &self.script_source {
            ScriptSource::TxInput { input, utxo_entry, is_p2sh, .. } => {
                if utxo_entry.script_public_key.version() > MAX_SCRIPT_PUBLIC_KEY_VERSION {
                    warn!(
                        version = utxo_entry.script_public_key.version(),
                        "script public key version is newer than the engine; treating the output as spendable"
                    );
                    return Ok(());
                }
                if !is_push_only(&input.signature_script)? {
                    return Err(TxScriptError::SignatureScriptNotPushOnly);
                }
                (vec![input.signature_script.as_slice(), utxo_entry.script_public_key.script()], *is_p2sh)
            }
            ScriptSource::StandAloneScripts(scripts) => (scripts.clone(), false),
        };

        // Both scripts empty means the stack would end empty, which is
        // equivalent to a false final entry.
        if scripts.is_empty() {
            return Err(TxScriptError::NoScripts);
        }
        if scripts.iter().all(|s| s.is_empty()) {
            return Err(TxScriptError::EvalFalse);
        }

        let mut saved_stack: Option<Stack> = None;
        for (idx, script) in scripts.iter().enumerate().filter(|(_, s)| !s.is_empty()) {
            // The stack produced by the signature script is replayed
            // against the redeem script for P2SH.
            if is_p2sh && idx == 1 {
                saved_stack = Some(self.dstack.clone());
            }
            self.execute_script(script)?;
        }

        if is_p2sh {
            self.check_error_condition(false)?;
            self.dstack = saved_stack.ok_or(TxScriptError::EmptyStack)?;
            let redeem_script = self.dstack.pop().ok_or(TxScriptError::EmptyStack)?;
            self.execute_script(&redeem_script)?;
        }

        self.check_error_condition(true)
    }

    /// Runs one script to completion. Alt stack and op counter do not
    /// persist across scripts; the conditional stack must balance.
    fn execute_script(&mut self, script: &[u8]) -> Result<(), TxScriptError> {
        let result = (|| {
            if script.len() > MAX_SCRIPTS_SIZE {
                return Err(TxScriptError::ScriptTooBig(script.len(), MAX_SCRIPTS_SIZE));
            }
            for opcode in ScriptIter::new(script) {
                let opcode = opcode?;

                // Disabled opcodes poison the script wherever they appear,
                // executed or not; so do the VERIF variants.
                if opcode.is_disabled() {
                    return Err(TxScriptError::OpcodeDisabled(opcode.code));
                }
                if opcode.code == OpVerIf || opcode.code == OpVerNotIf {
                    return Err(TxScriptError::OpcodeReserved(opcode.code));
                }

                if opcode.code > NO_COST_OPCODE {
                    self.num_ops += 1;
                    if self.num_ops > MAX_OPS_PER_SCRIPT {
                        return Err(TxScriptError::TooManyOperations(MAX_OPS_PER_SCRIPT));
                    }
                } else if opcode.data.len() > MAX_SCRIPT_ELEMENT_SIZE {
                    return Err(TxScriptError::ElementTooBig(opcode.data.len(), MAX_SCRIPT_ELEMENT_SIZE));
                }

                if self.is_executing() || opcode.is_conditional() {
                    if opcode.code > 0 && opcode.code <= OpPushData4 {
                        opcode.check_minimal_data_push()?;
                    }
                    self.execute_opcode(&opcode)?;
                }

                let combined_size = self.astack.len() + self.dstack.len();
                if combined_size > MAX_STACK_SIZE {
                    return Err(TxScriptError::StackSizeExceeded(combined_size, MAX_STACK_SIZE));
                }
            }
            if !self.cond_stack.is_empty() {
                return Err(TxScriptError::UnbalancedConditional);
            }
            Ok(())
        })();

        self.astack.clear();
        self.num_ops = 0;

        result
    }

    /// Called at every script-chunk boundary: on the final chunk the stack
    /// must hold exactly one truthy entry.
    fn check_error_condition(&mut self, final_script: bool) -> Result<(), TxScriptError> {
        if final_script {
            if self.dstack.len() > 1 {
                return Err(TxScriptError::CleanStack(self.dstack.len() - 1));
            }
            if self.dstack.is_empty() {
                return Err(TxScriptError::EmptyStack);
            }
        }
        match self.dstack.pop_bool()? {
            true => Ok(()),
            false => Err(TxScriptError::EvalFalse),
        }
    }

    fn execute_opcode(&mut self, opcode: &ParsedOpcode) -> Result<(), TxScriptError> {
        match opcode.code {
            // ---- pushes ------------------------------------------------
            OpFalse => {
                self.dstack.push(vec![]);
                Ok(())
            }
            OpData1..=OpPushData4 => {
                self.dstack.push(opcode.data.to_vec());
                Ok(())
            }
            Op1Negate => {
                self.dstack.push(vec![0x81]);
                Ok(())
            }
            Op1..=Op16 => {
                self.dstack.push(vec![opcode.code - Op1 + 1]);
                Ok(())
            }

            // ---- flow control ------------------------------------------
            OpNop => Ok(()),
            OpIf => self.op_if(false),
            OpNotIf => self.op_if(true),
            OpElse => match self.cond_stack.last_mut() {
                Some(cond) => {
                    *cond = match cond {
                        OpCond::True => OpCond::False,
                        OpCond::False => OpCond::True,
                        OpCond::Skip => OpCond::Skip,
                    };
                    Ok(())
                }
                None => Err(TxScriptError::UnbalancedConditional),
            },
            OpEndIf => match self.cond_stack.pop() {
                Some(_) => Ok(()),
                None => Err(TxScriptError::UnbalancedConditional),
            },
            OpVerify => match self.dstack.pop_bool()? {
                true => Ok(()),
                false => Err(TxScriptError::VerifyFailed),
            },
            OpReturn => Err(TxScriptError::EarlyReturn),

            // ---- alt stack ---------------------------------------------
            OpToAltStack => {
                let [item] = self.dstack.pop_raw::<1>()?;
                self.astack.push(item);
                Ok(())
            }
            OpFromAltStack => {
                let item = self.astack.pop().ok_or(TxScriptError::EmptyStack)?;
                self.dstack.push(item);
                Ok(())
            }

            // ---- stack manipulation ------------------------------------
            Op2Drop => self.dstack.pop_raw::<2>().map(|_| ()),
            Op2Dup => self.dstack.dup_items::<2>(),
            Op3Dup => self.dstack.dup_items::<3>(),
            Op2Over => self.dstack.over_items::<2>(),
            Op2Rot => self.dstack.rot_items::<2>(),
            Op2Swap => self.dstack.swap_items::<2>(),
            OpIfDup => {
                let [item] = self.dstack.peek_raw::<1>()?;
                if to_bool(&item) {
                    self.dstack.push(item);
                }
                Ok(())
            }
            OpDepth => {
                self.dstack.push_i64(self.dstack.len() as i64);
                Ok(())
            }
            OpDrop => self.dstack.pop_raw::<1>().map(|_| ()),
            OpDup => self.dstack.dup_items::<1>(),
            OpNip => {
                let [_, top] = self.dstack.pop_raw::<2>()?;
                self.dstack.push(top);
                Ok(())
            }
            OpOver => self.dstack.over_items::<1>(),
            OpPick => {
                let [n] = self.dstack.pop_i64s::<1>()?;
                let depth = self.dstack.len();
                if n < 0 || n as usize >= depth {
                    return Err(TxScriptError::StackUnderflow(n.max(0) as usize + 1, depth));
                }
                let item = self.dstack[depth - 1 - n as usize].clone();
                self.dstack.push(item);
                Ok(())
            }
            OpRoll => {
                let [n] = self.dstack.pop_i64s::<1>()?;
                let depth = self.dstack.len();
                if n < 0 || n as usize >= depth {
                    return Err(TxScriptError::StackUnderflow(n.max(0) as usize + 1, depth));
                }
                let item = self.dstack.remove(depth - 1 - n as usize);
                self.dstack.push(item);
                Ok(())
            }
            OpRot => self.dstack.rot_items::<1>(),
            OpSwap => self.dstack.swap_items::<1>(),
            OpTuck => {
                let [below, top] = self.dstack.pop_raw::<2>()?;
                self.dstack.push(top.clone());
                self.dstack.push(below);
                self.dstack.push(top);
                Ok(())
            }
            OpSize => {
                let [item] = self.dstack.peek_raw::<1>()?;
                self.dstack.push_i64(item.len() as i64);
                Ok(())
            }

            // ---- byte-wise comparison ----------------------------------
            OpEqual => {
                let [a, b] = self.dstack.pop_raw::<2>()?;
                self.dstack.push_bool(a == b);
                Ok(())
            }
            OpEqualVerify => {
                let [a, b] = self.dstack.pop_raw::<2>()?;
                match a == b {
                    true => Ok(()),
                    false => Err(TxScriptError::VerifyFailed),
                }
            }

            // ---- arithmetic (4-byte operands) --------------------------
            Op1Add => self.unary_num_op(|v| v + 1),
            Op1Sub => self.unary_num_op(|v| v - 1),
            OpNegate => self.unary_num_op(|v| -v),
            OpAbs => self.unary_num_op(|v| v.abs()),
            OpNot => self.unary_num_op(|v| (v == 0) as i64),
            Op0NotEqual => self.unary_num_op(|v| (v != 0) as i64),
            OpAdd => self.binary_num_op(|a, b| a + b),
            OpSub => self.binary_num_op(|a, b| a - b),
            OpBoolAnd => self.binary_num_op(|a, b| (a != 0 && b != 0) as i64),
            OpBoolOr => self.binary_num_op(|a, b| (a != 0 || b != 0) as i64),
            OpNumEqual => self.binary_num_op(|a, b| (a == b) as i64),
            OpNumEqualVerify => {
                let [a, b] = self.dstack.pop_i64s::<2>()?;
                match a == b {
                    true => Ok(()),
                    false => Err(TxScriptError::VerifyFailed),
                }
            }
            OpNumNotEqual => self.binary_num_op(|a, b| (a != b) as i64),
            OpLessThan => self.binary_num_op(|a, b| (a < b) as i64),
            OpGreaterThan => self.binary_num_op(|a, b| (a > b) as i64),
            OpLessThanOrEqual => self.binary_num_op(|a, b| (a <= b) as i64),
            OpGreaterThanOrEqual => self.binary_num_op(|a, b| (a >= b) as i64),
            OpMin => self.binary_num_op(|a, b| a.min(b)),
            OpMax => self.binary_num_op(|a, b| a.max(b)),
            OpWithin => {
                let [x, min, max] = self.dstack.pop_i64s::<3>()?;
                self.dstack.push_bool(min <= x && x < max);
                Ok(())
            }

            // ---- hashing -----------------------------------------------
            OpSHA256 => {
                let [item] = self.dstack.pop_raw::<1>()?;
                self.dstack.push(Sha256::digest(&item).to_vec());
                Ok(())
            }
            OpBlake2b => {
                let [item] = self.dstack.pop_raw::<1>()?;
                self.dstack.push(Blake2b256::digest(&item).to_vec());
                Ok(())
            }

            // ---- signature checks --------------------------------------
            OpCheckSig => {
                let result = self.op_check_sig(false)?;
                self.dstack.push_bool(result);
                Ok(())
            }
            OpCheckSigECDSA => {
                let result = self.op_check_sig(true)?;
                self.dstack.push_bool(result);
                Ok(())
            }
            OpCheckSigVerify => match self.op_check_sig(false)? {
                true => Ok(()),
                false => Err(TxScriptError::VerifyFailed),
            },
            OpCheckMultiSig => {
                let result = self.op_check_multisig(false)?;
                self.dstack.push_bool(result);
                Ok(())
            }
            OpCheckMultiSigECDSA => {
                let result = self.op_check_multisig(true)?;
                self.dstack.push_bool(result);
                Ok(())
            }
            OpCheckMultiSigVerify => match self.op_check_multisig(false)? {
                true => Ok(()),
                false => Err(TxScriptError::VerifyFailed),
            },

            // ---- lock times --------------------------------------------
            OpCheckLockTimeVerify => self.op_check_lock_time_verify(),
            OpCheckSequenceVerify => self.op_check_sequence_verify(),

            // ---- transaction introspection -----------------------------
            OpTxInputCount => {
                let tx = self.tx_source()?;
                self.dstack.push_i64(tx.inputs().len() as i64);
                Ok(())
            }
            OpTxOutputCount => {
                let tx = self.tx_source()?;
                self.dstack.push_i64(tx.outputs().len() as i64);
                Ok(())
            }
            OpTxInputIndex => match &self.script_source {
                ScriptSource::TxInput { id, .. } => {
                    let id = *id;
                    self.dstack.push_i64(id as i64);
                    Ok(())
                }
                _ => Err(TxScriptError::NotATransactionInput),
            },
            OpTxInputAmount => {
                let [idx] = self.dstack.pop_i64s::<1>()?;
                let tx = self.tx_source()?;
                let index = usize::try_from(idx).map_err(|_| TxScriptError::InvalidInputIndex(idx, tx.inputs().len()))?;
                if index >= tx.inputs().len() {
                    return Err(TxScriptError::InvalidInputIndex(idx, tx.inputs().len()));
                }
                let amount = tx.populated_input(index).1.amount;
                self.dstack.push_i64(amount as i64);
                Ok(())
            }
            OpTxInputSpk => {
                let [idx] = self.dstack.pop_i64s::<1>()?;
                let tx = self.tx_source()?;
                let index = usize::try_from(idx).map_err(|_| TxScriptError::InvalidInputIndex(idx, tx.inputs().len()))?;
                if index >= tx.inputs().len() {
                    return Err(TxScriptError::InvalidInputIndex(idx, tx.inputs().len()));
                }
                let spk = tx.populated_input(index).1.script_public_key.to_bytes();
                self.dstack.push(spk);
                Ok(())
            }
            OpTxOutputAmount => {
                let [idx] = self.dstack.pop_i64s::<1>()?;
                let tx = self.tx_source()?;
                let index = usize::try_from(idx).map_err(|_| TxScriptError::InvalidOutputIndex(idx, tx.outputs().len()))?;
                if index >= tx.outputs().len() {
                    return Err(TxScriptError::InvalidOutputIndex(idx, tx.outputs().len()));
                }
                let value = tx.outputs()[index].value;
                self.dstack.push_i64(value as i64);
                Ok(())
            }
            OpTxOutputSpk => {
                let [idx] = self.dstack.pop_i64s::<1>()?;
                let tx = self.tx_source()?;
                let index = usize::try_from(idx).map_err(|_| TxScriptError::InvalidOutputIndex(idx, tx.outputs().len()))?;
                if index >= tx.outputs().len() {
                    return Err(TxScriptError::InvalidOutputIndex(idx, tx.outputs().len()));
                }
                let spk = tx.outputs()[index].script_public_key.to_bytes();
                self.dstack.push(spk);
                Ok(())
            }

            // ---- reserved ----------------------------------------------
            OpReserved | OpVer | OpReserved1 | OpReserved2 => Err(TxScriptError::OpcodeReserved(opcode.code)),

            // Everything else is an unassigned position.
            _ => Err(TxScriptError::InvalidOpcode(opcode.code)),
        }
    }

    fn op_if(&mut self, negate: bool) -> Result<(), TxScriptError> {
        let cond = if self.is_executing() {
            let [raw] = self.dstack.pop_raw::<1>()?;
            // IF requires a minimally-encoded boolean.
            let value = match raw.as_slice() {
                [] => false,
                [1] => true,
                _ => return Err(TxScriptError::NotABoolean),
            };
            if value != negate {
                OpCond::True
            } else {
                OpCond::False
            }
        } else {
            OpCond::Skip
        };
        self.cond_stack.push(cond);
        Ok(())
    }

    fn unary_num_op(&mut self, op: impl FnOnce(i64) -> i64) -> Result<(), TxScriptError> {
        let [value] = self.dstack.pop_i64s::<1>()?;
        self.dstack.push_i64(op(value));
        Ok(())
    }

    fn binary_num_op(&mut self, op: impl FnOnce(i64, i64) -> i64) -> Result<(), TxScriptError> {
        let [a, b] = self.dstack.pop_i64s::<2>()?;
        self.dstack.push_i64(op(a, b));
        Ok(())
    }

    fn tx_source(&self) -> Result<&'a T, TxScriptError> {
        match &self.script_source {
            ScriptSource::TxInput { tx, .. } => Ok(*tx),
            _ => Err(TxScriptError::NotATransactionInput),
        }
    }

    fn count_sig_ops(&mut self, count: u32) -> Result<(), TxScriptError> {
        self.sig_ops_used += count;
        if let ScriptSource::TxInput { input, .. } = &self.script_source {
            let budget = input.sig_op_count as u32;
            if self.sig_ops_used > budget {
                return Err(TxScriptError::SigOpCountExceeded(self.sig_ops_used, budget));
            }
        }
        Ok(())
    }

    /// Common CHECKSIG body. An empty signature yields false; a present but
    /// invalid signature aborts the script.
    fn op_check_sig(&mut self, ecdsa: bool) -> Result<bool, TxScriptError> {
        let [sig, key] = self.dstack.pop_raw::<2>()?;
        self.count_sig_ops(1)?;
        if sig.is_empty() {
            return Ok(false);
        }
        let typ = *sig.last().expect("checked non-empty");
        let hash_type = SigHashType::from_u8(typ).map_err(|_| TxScriptError::InvalidSigHashType(typ))?;
        match self.verify_signature(hash_type, &key, &sig[..sig.len() - 1], ecdsa)? {
            true => Ok(true),
            false => Err(TxScriptError::InvalidSignature("signature verification failed".to_string())),
        }
    }

    fn op_check_multisig(&mut self, ecdsa: bool) -> Result<bool, TxScriptError> {
        let [num_keys] = self.dstack.pop_i64s::<1>()?;
        if num_keys < 0 || num_keys > MAX_PUB_KEYS_PER_MULTISIG {
            return Err(TxScriptError::InvalidPubKeyCount(num_keys));
        }
        let num_keys = num_keys as usize;

        // Public keys count toward both budgets.
        self.num_ops += num_keys as i32;
        if self.num_ops > MAX_OPS_PER_SCRIPT {
            return Err(TxScriptError::TooManyOperations(MAX_OPS_PER_SCRIPT));
        }
        self.count_sig_ops(num_keys as u32)?;

        if self.dstack.len() < num_keys {
            return Err(TxScriptError::StackUnderflow(num_keys, self.dstack.len()));
        }
        let keys = self.dstack.split_off(self.dstack.len() - num_keys);

        let [num_sigs] = self.dstack.pop_i64s::<1>()?;
        if num_sigs < 0 || num_sigs > keys.len() as i64 {
            return Err(TxScriptError::InvalidSignatureCount(num_sigs));
        }
        let num_sigs = num_sigs as usize;
        if self.dstack.len() < num_sigs {
            return Err(TxScriptError::StackUnderflow(num_sigs, self.dstack.len()));
        }
        let signatures = self.dstack.split_off(self.dstack.len() - num_sigs);

        if signatures.is_empty() {
            return Ok(true);
        }

        // Ordered matching: each signature must verify against a key
        // further down the list than the previous match.
        let mut failed = false;
        let mut key_iter = keys.into_iter();
        'signatures: for sig in signatures.iter() {
            if sig.is_empty() {
                failed = true;
                continue;
            }
            let typ = *sig.last().expect("checked non-empty");
            let hash_type = SigHashType::from_u8(typ).map_err(|_| TxScriptError::InvalidSigHashType(typ))?;
            let sig_bytes = &sig[..sig.len() - 1];
            loop {
                let Some(key) = key_iter.next() else {
                    failed = true;
                    break 'signatures;
                };
                if self.verify_signature(hash_type, &key, sig_bytes, ecdsa)? {
                    continue 'signatures;
                }
            }
        }

        if failed {
            if signatures.iter().all(|sig| sig.is_empty()) {
                // All-null signature sets are an explicit abstention.
                Ok(false)
            } else {
                Err(TxScriptError::NullFail)
            }
        } else {
            Ok(true)
        }
    }

    /// Cache-aware curve verification. Malformed keys abort; a wrong
    /// signature reports false.
    fn verify_signature(&mut self, hash_type: SigHashType, key: &[u8], sig: &[u8], ecdsa: bool) -> Result<bool, TxScriptError> {
        let ScriptSource::TxInput { tx, id, .. } = &self.script_source else {
            return Err(TxScriptError::NotATransactionInput);
        };
        let (tx, id) = (*tx, *id);
        if sig.len() != 64 {
            return Err(TxScriptError::SigLength(sig.len()));
        }
        let expected_key_len = if ecdsa { 33 } else { 32 };
        if key.len() != expected_key_len {
            return Err(TxScriptError::PubKeyFormat);
        }

        let sig_hash = if ecdsa {
            calc_ecdsa_signature_hash(tx, id, hash_type, self.reused_values)
        } else {
            calc_schnorr_signature_hash(tx, id, hash_type, self.reused_values)
        }
        .map_err(|e| TxScriptError::SigningHash(e.to_string()))?;

        let cache_key = SigCacheKey { message: sig_hash, public_key: key.to_vec(), signature: sig.to_vec() };
        if let Some(valid) = self.sig_cache.get(&cache_key) {
            return Ok(valid);
        }

        let message = Message::from_digest_slice(sig_hash.as_bytes()).expect("digest is 32 bytes");
        let valid = if ecdsa {
            let pk = secp256k1::PublicKey::from_slice(key).map_err(|e| TxScriptError::InvalidSignature(e.to_string()))?;
            let signature = secp256k1::ecdsa::Signature::from_compact(sig)
                .map_err(|e| TxScriptError::InvalidSignature(e.to_string()))?;
            signature.verify(&message, &pk).is_ok()
        } else {
            let pk = secp256k1::XOnlyPublicKey::from_slice(key).map_err(|e| TxScriptError::InvalidSignature(e.to_string()))?;
            let signature = secp256k1::schnorr::Signature::from_slice(sig)
                .map_err(|e| TxScriptError::InvalidSignature(e.to_string()))?;
            signature.verify(&message, &pk).is_ok()
        };
        self.sig_cache.insert(cache_key, valid);
        Ok(valid)
    }

    fn op_check_lock_time_verify(&mut self) -> Result<(), TxScriptError> {
        let ScriptSource::TxInput { tx, input, .. } = &self.script_source else {
            return Err(TxScriptError::NotATransactionInput);
        };
        let (tx_lock_time, sequence) = (tx.tx().lock_time, input.sequence);
        // Peek, not pop: the operand stays for the surrounding script.
        let [raw] = self.dstack.peek_raw::<1>()?;
        let lock_time = deserialize_i64(&raw, EXTENDED_SCRIPT_NUM_LEN)?;
        if lock_time < 0 {
            return Err(TxScriptError::UnsatisfiedLockTime(format!("negative lock time {lock_time}")));
        }
        let lock_time = lock_time as u64;
        if (lock_time < LOCK_TIME_THRESHOLD) != (tx_lock_time < LOCK_TIME_THRESHOLD) {
            return Err(TxScriptError::UnsatisfiedLockTime(format!(
                "mismatched lock time semantics: stack {lock_time}, transaction {tx_lock_time}"
            )));
        }
        if lock_time > tx_lock_time {
            return Err(TxScriptError::UnsatisfiedLockTime(format!(
                "lock time {lock_time} not reached (transaction at {tx_lock_time})"
            )));
        }
        if sequence == MAX_TX_IN_SEQUENCE_NUM {
            return Err(TxScriptError::UnsatisfiedLockTime("transaction input is finalized".to_string()));
        }
        Ok(())
    }

    fn op_check_sequence_verify(&mut self) -> Result<(), TxScriptError> {
        let ScriptSource::TxInput { input, .. } = &self.script_source else {
            return Err(TxScriptError::NotATransactionInput);
        };
        let input_sequence = input.sequence;
        let [raw] = self.dstack.peek_raw::<1>()?;
        let stack_sequence = deserialize_i64(&raw, EXTENDED_SCRIPT_NUM_LEN)?;
        if stack_sequence < 0 {
            return Err(TxScriptError::UnsatisfiedLockTime(format!("negative sequence {stack_sequence}")));
        }
        // The disabled flag on the operand makes the opcode a no-op.
        if stack_sequence as u64 & SEQUENCE_LOCK_TIME_DISABLED != 0 {
            return Ok(());
        }
        if input_sequence & SEQUENCE_LOCK_TIME_DISABLED != 0 {
            return Err(TxScriptError::UnsatisfiedLockTime(
                "input sequence has relative lock times disabled".to_string(),
            ));
        }
        if stack_sequence as u64 & SEQUENCE_LOCK_TIME_MASK > input_sequence & SEQUENCE_LOCK_TIME_MASK {
            return Err(TxScriptError::UnsatisfiedLockTime(format!(
                "relative lock of {} not reached (input sequence {})",
                stack_sequence as u64 & SEQUENCE_LOCK_TIME_MASK,
                input_sequence & SEQUENCE_LOCK_TIME_MASK
            )));
        }
        Ok(())
    }
}
