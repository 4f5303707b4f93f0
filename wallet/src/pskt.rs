// Partially-signed transaction envelope with compile-time role tracking.
//
// Each role is a distinct type parameter and exposes exactly the operations
// that role permits; illegal transitions do not exist at the type level.
// The flow is Creator -> Constructor -> Updater -> Signer -> Combiner ->
// Finalizer -> Extractor.
use std::collections::BTreeMap;
use std::marker::PhantomData;

use sompi_core::hashing::sighash::{calc_schnorr_signature_hash, SigHashReusedValues};
use sompi_core::hashing::sighash_type::{SigHashType, SIG_HASH_ALL};
use sompi_core::{
    Keypair, ScriptPublicKey, SignableTransaction, Signature, Transaction, TransactionInput, TransactionOutpoint,
    TransactionOutput, UtxoEntry, SUBNETWORK_ID_NATIVE, TX_VERSION,
};
use sompi_txscript::ScriptBuilder;

use crate::error::{WalletError, WalletResult};

pub struct Creator;
pub struct Constructor;
pub struct Updater;
pub struct Signer;
pub struct Combiner;
pub struct Finalizer;
pub struct Extractor;

/// One input under construction: the outpoint, its resolved entry, and the
/// signatures collected so far, keyed by the x-only public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PsktInput {
    pub previous_outpoint: TransactionOutpoint,
    pub utxo_entry: UtxoEntry,
    pub sequence: u64,
    pub sig_op_count: u8,
    pub sighash_type: SigHashType,
    pub redeem_script: Option<Vec<u8>>,
    pub partial_sigs: BTreeMap<[u8; 32], [u8; 64]>,
    pub signature_script: Option<Vec<u8>>,
}

impl PsktInput {
    fn new(previous_outpoint: TransactionOutpoint, utxo_entry: UtxoEntry) -> Self {
        Self {
            previous_outpoint,
            utxo_entry,
            sequence: 0,
            sig_op_count: 1,
            sighash_type: SIG_HASH_ALL,
            redeem_script: None,
            partial_sigs: BTreeMap::new(),
            signature_script: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct PsktInner {
    version: u16,
    lock_time: u64,
    inputs: Vec<PsktInput>,
    outputs: Vec<TransactionOutput>,
}

pub struct Pskt<Role> {
    inner: PsktInner,
    _role: PhantomData<Role>,
}

impl<Role> Pskt<Role> {
    fn transition<Next>(self) -> Pskt<Next> {
        Pskt { inner: self.inner, _role: PhantomData }
    }

    pub fn inputs(&self) -> &[PsktInput] {
        &self.inner.inputs
    }

    pub fn outputs(&self) -> &[TransactionOutput] {
        &self.inner.outputs
    }

    /// The unsigned transaction the envelope describes, with resolved
    /// entries.
    fn unsigned_transaction(&self) -> SignableTransaction {
        let inputs = self
            .inner
            .inputs
            .iter()
            .map(|input| {
                TransactionInput::new(input.previous_outpoint, vec![], input.sequence, input.sig_op_count)
            })
            .collect();
        let tx = Transaction::new(
            self.inner.version,
            inputs,
            self.inner.outputs.clone(),
            self.inner.lock_time,
            SUBNETWORK_ID_NATIVE,
            0,
            vec![],
        );
        let entries = self.inner.inputs.iter().map(|input| input.utxo_entry.clone()).collect();
        SignableTransaction::with_entries(tx, entries)
    }
}

impl Default for Pskt<Creator> {
    fn default() -> Self {
        Self::new()
    }
}

impl Pskt<Creator> {
    pub fn new() -> Self {
        Pskt { inner: PsktInner { version: TX_VERSION, ..Default::default() }, _role: PhantomData }
    }

    pub fn constructor(self) -> Pskt<Constructor> {
        self.transition()
    }
}

impl Pskt<Constructor> {
    pub fn add_input(mut self, previous_outpoint: TransactionOutpoint, utxo_entry: UtxoEntry) -> Self {
        self.inner.inputs.push(PsktInput::new(previous_outpoint, utxo_entry));
        self
    }

    pub fn add_output(mut self, value: u64, script_public_key: ScriptPublicKey) -> Self {
        self.inner.outputs.push(TransactionOutput::new(value, script_public_key));
        self
    }

    pub fn updater(self) -> Pskt<Updater> {
        self.transition()
    }
}

impl Pskt<Updater> {
    pub fn set_lock_time(mut self, lock_time: u64) -> Self {
        self.inner.lock_time = lock_time;
        self
    }

    pub fn set_sequence(mut self, input_index: usize, sequence: u64) -> Self {
        self.inner.inputs[input_index].sequence = sequence;
        self
    }

    pub fn set_sighash_type(mut self, input_index: usize, sighash_type: SigHashType) -> Self {
        self.inner.inputs[input_index].sighash_type = sighash_type;
        self
    }

    pub fn set_redeem_script(mut self, input_index: usize, redeem_script: Vec<u8>) -> Self {
        self.inner.inputs[input_index].redeem_script = Some(redeem_script);
        self
    }

    pub fn set_sig_op_count(mut self, input_index: usize, sig_op_count: u8) -> Self {
        self.inner.inputs[input_index].sig_op_count = sig_op_count;
        self
    }

    pub fn signer(self) -> Pskt<Signer> {
        self.transition()
    }
}

impl Pskt<Signer> {
    /// Signs every input with the keypair, recording the signature under
    /// the keypair's x-only public key.
    pub fn sign(mut self, keypair: &Keypair) -> WalletResult<Self> {
        let unsigned = self.unsigned_transaction();
        let verifiable = unsigned.as_verifiable();
        let reused = &mut SigHashReusedValues::new();
        let public_key = keypair.x_only_public_key_bytes()?;
        for (index, input) in self.inner.inputs.iter_mut().enumerate() {
            let digest = calc_schnorr_signature_hash(&verifiable, index, input.sighash_type, reused)?;
            let Signature::Schnorr(signature) = keypair.sign_schnorr(digest)? else { unreachable!() };
            input.partial_sigs.insert(public_key, signature);
        }
        Ok(self)
    }

    pub fn combiner(self) -> Pskt<Combiner> {
        self.transition()
    }
}

impl Pskt<Combiner> {
    /// Merges another envelope over the same underlying transaction,
    /// unioning partial signatures. Outputs compare by value and script
    /// public key; inputs by outpoint.
    pub fn combine(mut self, other: Pskt<Combiner>) -> WalletResult<Self> {
        let same_shape = self.inner.version == other.inner.version
            && self.inner.lock_time == other.inner.lock_time
            && self.inner.inputs.len() == other.inner.inputs.len()
            && self.inner.outputs == other.inner.outputs
            && self
                .inner
                .inputs
                .iter()
                .zip(other.inner.inputs.iter())
                .all(|(a, b)| a.previous_outpoint == b.previous_outpoint);
        if !same_shape {
            return Err(WalletError::PsktMismatch);
        }
        for (input, other_input) in self.inner.inputs.iter_mut().zip(other.inner.inputs) {
            input.partial_sigs.extend(other_input.partial_sigs);
            if input.redeem_script.is_none() {
                input.redeem_script = other_input.redeem_script;
            }
        }
        Ok(self)
    }

    pub fn finalizer(self) -> Pskt<Finalizer> {
        self.transition()
    }
}

impl Pskt<Finalizer> {
    /// Materializes signature scripts: every collected signature is pushed
    /// (with the sighash-type byte appended), followed by the redeem script
    /// for P2SH inputs.
    pub fn finalize(mut self) -> WalletResult<Pskt<Extractor>> {
        for (index, input) in self.inner.inputs.iter_mut().enumerate() {
            if input.partial_sigs.is_empty() {
                return Err(WalletError::PsktMissingSignatures(index));
            }
            let mut builder = ScriptBuilder::new();
            for signature in input.partial_sigs.values() {
                let mut push = Vec::with_capacity(65);
                push.extend_from_slice(signature);
                push.push(input.sighash_type.to_u8());
                builder.add_data(&push)?;
            }
            if let Some(redeem_script) = &input.redeem_script {
                builder.add_data(redeem_script)?;
            }
            input.signature_script = Some(builder.drain());
        }
        Ok(self.transition())
    }
}

impl Pskt<Extractor> {
    /// The signed transaction with resolved entries.
    pub fn extract_tx(self) -> WalletResult<SignableTransaction> {
        let mut signable = self.unsigned_transaction();
        for (index, input) in self.inner.inputs.iter().enumerate() {
            signable.tx.inputs[index].signature_script =
                input.signature_script.clone().ok_or(WalletError::PsktMissingSignatures(index))?;
        }
        Ok(signable)
    }
}
