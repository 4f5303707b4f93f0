// Transaction model: outpoints, inputs, outputs, UTXO entries and the
// verifiable/signable wrappers used by signing and script verification.
use std::fmt::{self, Display};

use crate::hash::Hash;
use crate::hashing;
use crate::subnets::{SubnetworkId, SUBNETWORK_ID_COINBASE};

pub type TransactionId = Hash;

/// The version all generated transactions carry.
pub const TX_VERSION: u16 = 0;

/// Marker DAA score for outputs that have not been accepted by the DAG yet
/// (used when chaining generator outputs into the next transaction).
pub const UNACCEPTED_DAA_SCORE: u64 = u64::MAX;

/// Maximum supply in sompi (29 billion KAS).
pub const MAX_SOMPI: u64 = 29_000_000_000 * 100_000_000;

/// A script public key: a versioned spending condition attached to an output.
/// Version 0 is the only version with standard script classes; higher
/// versions are non-standard but remain spendable under consensus.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ScriptPublicKey {
    version: u16,
    script: Vec<u8>,
}

impl ScriptPublicKey {
    pub fn new(version: u16, script: Vec<u8>) -> Self {
        Self { version, script }
    }

    pub fn version(&self) -> u16 {
        self.version
    }

    pub fn script(&self) -> &[u8] {
        &self.script
    }

    /// Canonical byte form: version as u16 little-endian followed by the
    /// raw script. This is the form pushed by the introspection opcodes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + self.script.len());
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.script);
        out
    }
}

/// Identifies one output of one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TransactionOutpoint {
    pub transaction_id: TransactionId,
    pub index: u32,
}

impl TransactionOutpoint {
    pub fn new(transaction_id: TransactionId, index: u32) -> Self {
        Self { transaction_id, index }
    }
}

impl Display for TransactionOutpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.transaction_id, self.index)
    }
}

/// A UTXO entry: the resolved data behind an outpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UtxoEntry {
    pub amount: u64,
    pub script_public_key: ScriptPublicKey,
    pub block_daa_score: u64,
    pub is_coinbase: bool,
}

impl UtxoEntry {
    pub fn new(amount: u64, script_public_key: ScriptPublicKey, block_daa_score: u64, is_coinbase: bool) -> Self {
        Self { amount, script_public_key, block_daa_score, is_coinbase }
    }
}

#[derive(Clone, PartialEq, Eq, Default)]
pub struct TransactionInput {
    pub previous_outpoint: TransactionOutpoint,
    /// Empty until the input is signed.
    pub signature_script: Vec<u8>,
    pub sequence: u64,
    pub sig_op_count: u8,
}

impl TransactionInput {
    pub fn new(previous_outpoint: TransactionOutpoint, signature_script: Vec<u8>, sequence: u64, sig_op_count: u8) -> Self {
        Self { previous_outpoint, signature_script, sequence, sig_op_count }
    }
}

impl fmt::Debug for TransactionInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionInput")
            .field("previous_outpoint", &self.previous_outpoint)
            .field("signature_script", &hex::encode(&self.signature_script))
            .field("sequence", &self.sequence)
            .field("sig_op_count", &self.sig_op_count)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransactionOutput {
    pub value: u64,
    pub script_public_key: ScriptPublicKey,
}

impl TransactionOutput {
    pub fn new(value: u64, script_public_key: ScriptPublicKey) -> Self {
        Self { value, script_public_key }
    }
}

/// A transaction. The id is cached on construction and excludes signature
/// scripts (and the cached mass); `finalize` recomputes it after any field
/// mutation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transaction {
    pub version: u16,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub lock_time: u64,
    pub subnetwork_id: SubnetworkId,
    pub gas: u64,
    pub payload: Vec<u8>,

    mass: u64,

    // Cached id; read through `id()`.
    id: TransactionId,
}

impl Transaction {
    pub fn new(
        version: u16,
        inputs: Vec<TransactionInput>,
        outputs: Vec<TransactionOutput>,
        lock_time: u64,
        subnetwork_id: SubnetworkId,
        gas: u64,
        payload: Vec<u8>,
    ) -> Self {
        let mut tx = Self::new_non_finalized(version, inputs, outputs, lock_time, subnetwork_id, gas, payload);
        tx.finalize();
        tx
    }

    pub fn new_non_finalized(
        version: u16,
        inputs: Vec<TransactionInput>,
        outputs: Vec<TransactionOutput>,
        lock_time: u64,
        subnetwork_id: SubnetworkId,
        gas: u64,
        payload: Vec<u8>,
    ) -> Self {
        Self { version, inputs, outputs, lock_time, subnetwork_id, gas, payload, mass: 0, id: Default::default() }
    }

    pub fn is_coinbase(&self) -> bool {
        self.subnetwork_id == SUBNETWORK_ID_COINBASE
    }

    /// Recompute and cache the id from the current fields.
    pub fn finalize(&mut self) {
        self.id = hashing::tx::id(self);
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// The cached contextual mass. Not part of the id.
    pub fn mass(&self) -> u64 {
        self.mass
    }

    pub fn set_mass(&mut self, mass: u64) {
        self.mass = mass;
    }

    pub fn with_mass(mut self, mass: u64) -> Self {
        self.mass = mass;
        self
    }
}

impl AsRef<Transaction> for Transaction {
    fn as_ref(&self) -> &Transaction {
        self
    }
}

/// A transaction whose inputs all carry resolved UTXO entry data, ready for
/// signing-hash construction and script verification.
pub trait VerifiableTransaction {
    fn tx(&self) -> &Transaction;

    /// Returns the `i`'th input together with its resolved UTXO entry.
    fn populated_input(&self, index: usize) -> (&TransactionInput, &UtxoEntry);

    fn populated_inputs(&self) -> PopulatedInputIterator<'_, Self>
    where
        Self: Sized,
    {
        PopulatedInputIterator::new(self)
    }

    fn inputs(&self) -> &[TransactionInput] {
        &self.tx().inputs
    }

    fn outputs(&self) -> &[TransactionOutput] {
        &self.tx().outputs
    }

    fn id(&self) -> TransactionId {
        self.tx().id()
    }
}

pub struct PopulatedInputIterator<'a, T: VerifiableTransaction> {
    tx: &'a T,
    range: std::ops::Range<usize>,
}

impl<'a, T: VerifiableTransaction> PopulatedInputIterator<'a, T> {
    pub fn new(tx: &'a T) -> Self {
        Self { tx, range: 0..tx.inputs().len() }
    }
}

impl<'a, T: VerifiableTransaction> Iterator for PopulatedInputIterator<'a, T> {
    type Item = (&'a TransactionInput, &'a UtxoEntry);

    fn next(&mut self) -> Option<Self::Item> {
        self.range.next().map(|i| self.tx.populated_input(i))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.range.size_hint()
    }
}

impl<'a, T: VerifiableTransaction> ExactSizeIterator for PopulatedInputIterator<'a, T> {}

/// A read-only transaction reference with fully populated UTXO entries.
pub struct PopulatedTransaction<'a> {
    pub tx: &'a Transaction,
    pub entries: Vec<UtxoEntry>,
}

impl<'a> PopulatedTransaction<'a> {
    pub fn new(tx: &'a Transaction, entries: Vec<UtxoEntry>) -> Self {
        assert_eq!(tx.inputs.len(), entries.len());
        Self { tx, entries }
    }
}

impl VerifiableTransaction for PopulatedTransaction<'_> {
    fn tx(&self) -> &Transaction {
        self.tx
    }

    fn populated_input(&self, index: usize) -> (&TransactionInput, &UtxoEntry) {
        (&self.tx.inputs[index], &self.entries[index])
    }
}

/// An owned transaction with partially filled UTXO entry data. This is the
/// carrier handed to signing: `tx.inputs[i].signature_script` is the only
/// field mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignableTransaction {
    pub tx: Transaction,
    pub entries: Vec<Option<UtxoEntry>>,
}

impl SignableTransaction {
    pub fn new(tx: Transaction) -> Self {
        let num_inputs = tx.inputs.len();
        Self { tx, entries: vec![None; num_inputs] }
    }

    pub fn with_entries(tx: Transaction, entries: Vec<UtxoEntry>) -> Self {
        assert_eq!(tx.inputs.len(), entries.len());
        Self { tx, entries: entries.into_iter().map(Some).collect() }
    }

    pub fn id(&self) -> TransactionId {
        self.tx.id()
    }

    pub fn is_verifiable(&self) -> bool {
        self.entries.len() == self.tx.inputs.len() && self.entries.iter().all(|e| e.is_some())
    }

    /// Iterates the outpoints whose UTXO entries are still missing.
    pub fn missing_outpoints(&self) -> impl Iterator<Item = TransactionOutpoint> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, entry)| entry.is_none().then(|| self.tx.inputs[i].previous_outpoint))
    }

    /// Wraps the transaction as a [`VerifiableTransaction`]. Panics unless
    /// every UTXO entry is populated.
    pub fn as_verifiable(&self) -> impl VerifiableTransaction + '_ {
        assert!(self.is_verifiable(), "all UTXO entries must be populated");
        SignableTransactionVerifiableWrapper { inner: self }
    }
}

struct SignableTransactionVerifiableWrapper<'a> {
    inner: &'a SignableTransaction,
}

impl VerifiableTransaction for SignableTransactionVerifiableWrapper<'_> {
    fn tx(&self) -> &Transaction {
        &self.inner.tx
    }

    fn populated_input(&self, index: usize) -> (&TransactionInput, &UtxoEntry) {
        (
            &self.inner.tx.inputs[index],
            self.inner.entries[index].as_ref().expect("entries are fully populated"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subnets::SUBNETWORK_ID_NATIVE;

    fn test_transaction() -> Transaction {
        Transaction::new(
            TX_VERSION,
            vec![TransactionInput::new(
                TransactionOutpoint::new(Hash::from_bytes([0x11; 32]), 0),
                vec![1, 2, 3],
                0,
                1,
            )],
            vec![TransactionOutput::new(1000, ScriptPublicKey::new(0, vec![0x51]))],
            0,
            SUBNETWORK_ID_NATIVE,
            0,
            vec![],
        )
    }

    #[test]
    fn test_id_ignores_signature_script() {
        let tx = test_transaction();
        let mut cleared = tx.clone();
        cleared.inputs[0].signature_script = vec![];
        cleared.finalize();
        assert_eq!(tx.id(), cleared.id());
    }

    #[test]
    fn test_missing_outpoints() {
        let tx = test_transaction();
        let signable = SignableTransaction::new(tx);
        assert!(!signable.is_verifiable());
        assert_eq!(signable.missing_outpoints().count(), 1);
    }

    #[test]
    fn test_spk_to_bytes() {
        let spk = ScriptPublicKey::new(0x0102, vec![0xaa, 0xbb]);
        assert_eq!(spk.to_bytes(), vec![0x02, 0x01, 0xaa, 0xbb]);
    }
}
