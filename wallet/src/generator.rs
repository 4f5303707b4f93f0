// The transaction generator: a streaming UTXO-selection engine that emits a
// chain of ready-to-sign transactions.
//
// Each call to `generate_transaction` either finalizes the payment (kind
// Final) or collapses accumulated UTXOs into a single merge output on the
// change address (kind Batch) that the next call consumes. Priority UTXOs
// are reserved for the final transaction and placed at its front.
use std::collections::VecDeque;
use std::iter::Peekable;

use tracing::debug;

use sompi_core::hashing::sighash::SigHashReusedValues;
use sompi_core::hashing::sighash_type::SigHashType;
use sompi_core::sign::{sign_input, sign_with_multiple, Signed};
use sompi_core::{
    Address, Keypair, NetworkId, ScriptPublicKey, SignableTransaction, Transaction, TransactionId,
    TransactionInput, TransactionOutpoint, TransactionOutput, UtxoEntry, VerifiableTransaction,
    SUBNETWORK_ID_NATIVE, TX_VERSION, UNACCEPTED_DAA_SCORE,
};
use sompi_txscript::{pay_to_address_script, SigCache, TxScriptEngine};

use crate::error::{WalletError, WalletResult};
use crate::fees::Fees;
use crate::mass::MassCalculator;
use crate::params::Params;
use crate::utxo::UtxoEntryReference;

/// One requested payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentOutput {
    pub address: Address,
    pub amount: u64,
}

impl PaymentOutput {
    pub fn new(address: Address, amount: u64) -> Self {
        Self { address, amount }
    }
}

/// Inputs to a [`Generator`].
pub struct GeneratorSettings {
    pub network_id: NetworkId,
    /// Lazy source of spendable UTXOs, consumed front to back.
    pub utxo_iterator: Box<dyn Iterator<Item = UtxoEntryReference>>,
    /// UTXOs that must appear in the final transaction, ahead of all other
    /// inputs (commit/reveal flows pin the committed UTXO this way).
    pub priority_utxo_entries: Vec<UtxoEntryReference>,
    pub change_address: Address,
    /// Payment outputs; empty means "sweep everything to the change
    /// address".
    pub final_outputs: Vec<PaymentOutput>,
    pub priority_fee: Fees,
    pub payload: Vec<u8>,
    /// Declared sig-op count of every input.
    pub sig_op_count: u8,
}

/// What role an emitted transaction plays in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    /// Merges UTXOs into the change address for the next stage.
    Batch,
    /// Carries the payment outputs (or the sweep).
    Final,
}

/// A generated, ready-to-sign transaction along with its accounting.
#[derive(Debug)]
pub struct PendingTransaction {
    signable: SignableTransaction,
    utxo_entries: Vec<UtxoEntryReference>,
    kind: DataKind,
    aggregate_input_value: u64,
    aggregate_output_value: u64,
    payment_value: Option<u64>,
    change_output_index: Option<usize>,
    change_output_value: u64,
    fees: u64,
    mass: u64,
}

impl PendingTransaction {
    pub fn id(&self) -> TransactionId {
        self.signable.id()
    }

    pub fn transaction(&self) -> &Transaction {
        &self.signable.tx
    }

    pub fn signable_transaction(&self) -> &SignableTransaction {
        &self.signable
    }

    pub fn utxo_entries(&self) -> &[UtxoEntryReference] {
        &self.utxo_entries
    }

    pub fn is_final(&self) -> bool {
        self.kind == DataKind::Final
    }

    pub fn is_batch(&self) -> bool {
        self.kind == DataKind::Batch
    }

    pub fn aggregate_input_value(&self) -> u64 {
        self.aggregate_input_value
    }

    pub fn aggregate_output_value(&self) -> u64 {
        self.aggregate_output_value
    }

    pub fn payment_value(&self) -> Option<u64> {
        self.payment_value
    }

    pub fn change_output_index(&self) -> Option<usize> {
        self.change_output_index
    }

    pub fn change_value(&self) -> u64 {
        self.change_output_value
    }

    pub fn fees(&self) -> u64 {
        self.fees
    }

    pub fn mass(&self) -> u64 {
        self.mass
    }

    /// Signs every input whose script public key matches one of the keys
    /// (pay-to-pubkey form). Fails if any input remains unsigned.
    pub fn try_sign_with_keys(&mut self, privkeys: &[[u8; 32]]) -> WalletResult<()> {
        let signed = sign_with_multiple(self.signable.clone(), privkeys)?;
        match signed {
            Signed::Fully(tx) => {
                self.signable = tx;
                Ok(())
            }
            Signed::Partially(_) => Err(WalletError::Core(sompi_core::CoreError::PartiallySigned)),
        }
    }

    /// Signs every input with one keypair using SIGHASH_ALL.
    pub fn sign_with_keypair(&mut self, keypair: &Keypair) -> WalletResult<()> {
        self.signable = sompi_core::sign::sign(self.signable.clone(), keypair)?;
        Ok(())
    }

    /// Produces a signature script for one input without applying it.
    pub fn create_input_signature(
        &self,
        input_index: usize,
        private_key: &[u8; 32],
        hash_type: SigHashType,
    ) -> WalletResult<Vec<u8>> {
        Ok(sign_input(&self.signable.as_verifiable(), input_index, private_key, hash_type)?)
    }

    /// Installs a signature script on one input.
    pub fn fill_input(&mut self, input_index: usize, signature_script: Vec<u8>) {
        self.signable.tx.inputs[input_index].signature_script = signature_script;
    }

    /// Runs the script engine over every input of the signed transaction.
    pub fn verify_scripts(&self) -> WalletResult<()> {
        let verifiable = self.signable.as_verifiable();
        let mut sig_cache = SigCache::default();
        for index in 0..self.signable.tx.inputs.len() {
            let mut reused = SigHashReusedValues::new();
            let (input, entry) = verifiable.populated_input(index);
            let mut vm = TxScriptEngine::from_transaction_input(&verifiable, input, index, entry, &mut reused, &mut sig_cache)
                .map_err(|e| WalletError::ScriptVerification(index, e.to_string()))?;
            vm.execute().map_err(|e| WalletError::ScriptVerification(index, e.to_string()))?;
        }
        Ok(())
    }
}

/// Aggregate report over a finished generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorSummary {
    pub network_id: NetworkId,
    pub aggregated_utxos: usize,
    pub aggregate_fees: u64,
    pub aggregate_input_value: u64,
    pub aggregate_output_value: u64,
    pub number_of_generated_transactions: usize,
    pub final_transaction_amount: Option<u64>,
    pub final_transaction_id: Option<TransactionId>,
    pub final_change_value: u64,
}

impl std::fmt::Display for GeneratorSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} transactions, {} UTXOs, {} KAS in, {} KAS fees",
            self.number_of_generated_transactions,
            self.aggregated_utxos,
            crate::utils::sompi_to_kaspa_string(self.aggregate_input_value),
            crate::utils::sompi_to_kaspa_string(self.aggregate_fees),
        )?;
        if let Some(id) = self.final_transaction_id {
            write!(f, ", final {id}")?;
        }
        Ok(())
    }
}

struct FinalOutput {
    script_public_key: ScriptPublicKey,
    amount: u64,
}

pub struct Generator {
    calc: MassCalculator,
    network_id: NetworkId,
    change_script_public_key: ScriptPublicKey,
    final_outputs: Vec<FinalOutput>,
    /// None means sweep.
    payment_value: Option<u64>,
    priority_fee: Fees,
    payload: Vec<u8>,
    sig_op_count: u8,

    utxo_iterator: Peekable<Box<dyn Iterator<Item = UtxoEntryReference>>>,
    priority_utxos: VecDeque<UtxoEntryReference>,
    priority_value: u64,
    /// Output of the previous batch transaction, consumed next.
    merge_utxo: Option<UtxoEntryReference>,

    finished: bool,
    aggregated_utxos: usize,
    aggregate_fees: u64,
    aggregate_input_value: u64,
    aggregate_output_value: u64,
    number_of_generated_transactions: usize,
    final_transaction_id: Option<TransactionId>,
    final_change_value: u64,
}

/// Internal outcome of a finalization attempt: storage-mass pressure is
/// retriable by absorbing further inputs.
enum FinalizeOutcome {
    Built(PendingTransaction),
    StorageMassExceeded,
}

impl Generator {
    pub fn new(settings: GeneratorSettings) -> Self {
        let params = Params::from_network(settings.network_id);
        let change_script_public_key = pay_to_address_script(&settings.change_address);
        let final_outputs = settings
            .final_outputs
            .iter()
            .map(|output| FinalOutput {
                script_public_key: pay_to_address_script(&output.address),
                amount: output.amount,
            })
            .collect::<Vec<_>>();
        let payment_value = match final_outputs.is_empty() {
            true => None,
            false => Some(final_outputs.iter().map(|o| o.amount).sum()),
        };
        let priority_value = settings.priority_utxo_entries.iter().map(|u| u.amount()).sum();
        Self {
            calc: MassCalculator::new(&params),
            network_id: settings.network_id,
            change_script_public_key,
            final_outputs,
            payment_value,
            priority_fee: settings.priority_fee,
            payload: settings.payload,
            sig_op_count: settings.sig_op_count,
            utxo_iterator: settings.utxo_iterator.peekable(),
            priority_utxos: settings.priority_utxo_entries.into(),
            priority_value,
            merge_utxo: None,
            finished: false,
            aggregated_utxos: 0,
            aggregate_fees: 0,
            aggregate_input_value: 0,
            aggregate_output_value: 0,
            number_of_generated_transactions: 0,
            final_transaction_id: None,
            final_change_value: 0,
        }
    }

    pub fn network_id(&self) -> NetworkId {
        self.network_id
    }

    /// The next transaction in the chain, or `None` once the run is
    /// complete.
    pub fn generate_transaction(&mut self) -> WalletResult<Option<PendingTransaction>> {
        if self.finished {
            return Ok(None);
        }

        let max_inputs = self.maximum_inputs_per_transaction();
        if self.priority_utxos.len() + 1 > max_inputs {
            return Err(WalletError::PriorityUtxoConflict);
        }

        // Regular inputs accumulated for this stage; the merge output of
        // the previous batch always re-enters first.
        let mut selected: Vec<UtxoEntryReference> = Vec::new();
        let mut selected_value: u64 = 0;
        if let Some(merge) = self.merge_utxo.take() {
            selected_value += merge.amount();
            selected.push(merge);
        }

        loop {
            let num_inputs = selected.len() + self.priority_utxos.len();
            let total_value = selected_value + self.priority_value;

            if num_inputs <= max_inputs && num_inputs > 0 {
                match self.payment_value {
                    Some(payment_value) => {
                        let fee = self.final_fee_estimate(num_inputs as u64);
                        if total_value >= payment_value + fee {
                            match self.try_finalize(&selected, total_value, fee)? {
                                FinalizeOutcome::Built(pending) => return Ok(Some(pending)),
                                FinalizeOutcome::StorageMassExceeded => {
                                    // Pull further inputs to relax the
                                    // storage formula if any remain.
                                    if num_inputs >= max_inputs || self.utxo_iterator.peek().is_none() {
                                        return Err(WalletError::StorageMassExceedsMaximum);
                                    }
                                    debug!("storage mass exceeded, widening the input set");
                                }
                            }
                        }
                    }
                    None => {
                        // Sweep: finalize once the source is exhausted.
                        if self.utxo_iterator.peek().is_none() {
                            let fee = self.final_fee_estimate(num_inputs as u64);
                            match self.try_finalize(&selected, total_value, fee)? {
                                FinalizeOutcome::Built(pending) => return Ok(Some(pending)),
                                FinalizeOutcome::StorageMassExceeded => {
                                    return Err(WalletError::StorageMassExceedsMaximum)
                                }
                            }
                        }
                    }
                }
            }

            if num_inputs >= max_inputs {
                // This stage cannot be final: merge what we have. Priority
                // UTXOs never enter a batch.
                if selected.len() < 2 {
                    return Err(WalletError::PriorityUtxoConflict);
                }
                let pending = self.emit_batch(selected, selected_value)?;
                return Ok(Some(pending));
            }

            match self.utxo_iterator.next() {
                Some(utxo) => {
                    selected_value += utxo.amount();
                    self.aggregated_utxos += 1;
                    self.aggregate_input_value += utxo.amount();
                    selected.push(utxo);
                }
                None => {
                    let payment_value = self.payment_value.unwrap_or(0);
                    let fee = self.final_fee_estimate((selected.len() + self.priority_utxos.len()).max(1) as u64);
                    let target = payment_value + fee;
                    return Err(WalletError::InsufficientFunds {
                        target,
                        additional_needed: target.saturating_sub(selected_value + self.priority_value).max(1),
                    });
                }
            }
        }
    }

    /// Must be called after the terminal `None`.
    pub fn summary(&self) -> GeneratorSummary {
        GeneratorSummary {
            network_id: self.network_id,
            aggregated_utxos: self.aggregated_utxos,
            aggregate_fees: self.aggregate_fees,
            aggregate_input_value: self.aggregate_input_value,
            aggregate_output_value: self.aggregate_output_value,
            number_of_generated_transactions: self.number_of_generated_transactions,
            final_transaction_amount: self.payment_value,
            final_transaction_id: self.final_transaction_id,
            final_change_value: self.final_change_value,
        }
    }

    /// Upper bound on inputs per transaction, derived from the mass ceiling
    /// with all final outputs plus a change output in place.
    fn maximum_inputs_per_transaction(&self) -> usize {
        let outputs = self.final_outputs_with_change_placeholder();
        let fixed_mass = self.calc.calc_compute_mass_for_parts(0, self.sig_op_count, &outputs, self.payload.len() as u64);
        let per_input_mass = self
            .calc
            .calc_compute_mass_for_parts(1, self.sig_op_count, &[], 0)
            .saturating_sub(self.calc.calc_compute_mass_for_parts(0, self.sig_op_count, &[], 0));
        let budget = self.calc.max_transaction_mass().saturating_sub(fixed_mass);
        ((budget / per_input_mass.max(1)) as usize).max(1)
    }

    fn final_outputs_with_change_placeholder(&self) -> Vec<TransactionOutput> {
        let mut outputs: Vec<TransactionOutput> = self
            .final_outputs
            .iter()
            .map(|output| TransactionOutput::new(output.amount, output.script_public_key.clone()))
            .collect();
        outputs.push(TransactionOutput::new(0, self.change_script_public_key.clone()));
        outputs
    }

    /// Relay plus priority fee for a final transaction with `num_inputs`
    /// inputs.
    fn final_fee_estimate(&self, num_inputs: u64) -> u64 {
        let outputs = self.final_outputs_with_change_placeholder();
        let mass = self.calc.calc_compute_mass_for_parts(num_inputs, self.sig_op_count, &outputs, self.payload.len() as u64);
        self.calc.minimum_relay_fee(mass) + self.priority_fee.additional(mass)
    }

    fn try_finalize(
        &mut self,
        selected: &[UtxoEntryReference],
        total_value: u64,
        fee: u64,
    ) -> WalletResult<FinalizeOutcome> {
        let payment_value = self.payment_value.unwrap_or(0);
        let mut fees = fee;
        let target = payment_value + fee;
        let mut change_value = total_value.checked_sub(target).ok_or(WalletError::InsufficientFunds {
            target,
            additional_needed: target.saturating_sub(total_value),
        })?;

        let mut outputs: Vec<TransactionOutput> = self
            .final_outputs
            .iter()
            .map(|output| TransactionOutput::new(output.amount, output.script_public_key.clone()))
            .collect();

        // A sweep pays everything to the change address; otherwise change
        // below the dust threshold is absorbed into fees outright.
        let sweep = self.payment_value.is_none();
        let mut absorb_change_to_fees = false;
        let change_output = TransactionOutput::new(change_value, self.change_script_public_key.clone());
        if sweep {
            if change_value == 0 {
                return Err(WalletError::InsufficientFunds { target: fee, additional_needed: 1 });
            }
            outputs.push(change_output);
        } else if change_value == 0 || self.calc.is_output_dust(&change_output) {
            absorb_change_to_fees = true;
            fees += change_value;
            change_value = 0;
        } else {
            outputs.push(change_output);
        }

        let input_values: Vec<u64> =
            self.priority_utxos.iter().chain(selected.iter()).map(|u| u.amount()).collect();

        let mut storage_mass = self
            .calc
            .calc_storage_mass(input_values.iter().copied(), outputs.iter().map(|o| o.value));
        if !sweep && !absorb_change_to_fees && storage_mass.map_or(true, |m| m > self.calc.max_transaction_mass()) {
            // Retry with the change collapsed into fees.
            outputs.pop();
            absorb_change_to_fees = true;
            fees += change_value;
            change_value = 0;
            storage_mass = self
                .calc
                .calc_storage_mass(input_values.iter().copied(), outputs.iter().map(|o| o.value));
            debug!(fees, "absorbing change into fees under storage-mass pressure");
        }
        let storage_mass = match storage_mass {
            Some(mass) if mass <= self.calc.max_transaction_mass() => mass,
            _ => return Ok(FinalizeOutcome::StorageMassExceeded),
        };

        // Priority UTXOs come first so that pinned inputs sit at known
        // indexes.
        let priority_count = self.priority_utxos.len();
        let utxo_entries: Vec<UtxoEntryReference> =
            self.priority_utxos.drain(..).chain(selected.iter().cloned()).collect();
        self.aggregated_utxos += priority_count;
        self.aggregate_input_value += self.priority_value;
        self.priority_value = 0;
        let inputs: Vec<TransactionInput> =
            utxo_entries.iter().map(|utxo| utxo.to_input(self.sig_op_count)).collect();
        let entries: Vec<UtxoEntry> = utxo_entries.iter().map(|utxo| utxo.entry.clone()).collect();

        let mut tx = Transaction::new(
            TX_VERSION,
            inputs,
            outputs,
            0,
            SUBNETWORK_ID_NATIVE,
            0,
            self.payload.clone(),
        );
        let compute_mass = self.calc.calc_compute_mass_for_unsigned_transaction(&tx);
        let contextual_mass = compute_mass.max(storage_mass);
        if contextual_mass > self.calc.max_transaction_mass() {
            return Err(WalletError::MassLimitExceeded(contextual_mass, self.calc.max_transaction_mass()));
        }
        tx.set_mass(contextual_mass);

        let aggregate_output_value = tx.outputs.iter().map(|o| o.value).sum::<u64>();
        let change_output_index = (change_value > 0 || sweep).then(|| tx.outputs.len() - 1);

        self.finished = true;
        self.number_of_generated_transactions += 1;
        self.aggregate_fees += fees;
        self.aggregate_output_value += aggregate_output_value;
        self.final_transaction_id = Some(tx.id());
        self.final_change_value = change_value;
        if sweep {
            self.final_change_value = aggregate_output_value;
        }

        debug!(
            id = %tx.id(),
            inputs = tx.inputs.len(),
            mass = contextual_mass,
            fees,
            "final transaction generated"
        );

        Ok(FinalizeOutcome::Built(PendingTransaction {
            signable: SignableTransaction::with_entries(tx, entries),
            utxo_entries,
            kind: DataKind::Final,
            aggregate_input_value: total_value,
            aggregate_output_value,
            payment_value: self.payment_value,
            change_output_index,
            change_output_value: change_value,
            fees,
            mass: contextual_mass,
        }))
    }

    fn emit_batch(&mut self, selected: Vec<UtxoEntryReference>, selected_value: u64) -> WalletResult<PendingTransaction> {
        let change_placeholder = TransactionOutput::new(0, self.change_script_public_key.clone());
        let mass = self.calc.calc_compute_mass_for_parts(
            selected.len() as u64,
            self.sig_op_count,
            std::slice::from_ref(&change_placeholder),
            0,
        );
        let fee = self.calc.minimum_relay_fee(mass);
        if selected_value <= fee {
            return Err(WalletError::InsufficientFunds {
                target: fee,
                additional_needed: fee - selected_value + 1,
            });
        }
        let merge_value = selected_value - fee;

        let inputs: Vec<TransactionInput> = selected.iter().map(|utxo| utxo.to_input(self.sig_op_count)).collect();
        let entries: Vec<UtxoEntry> = selected.iter().map(|utxo| utxo.entry.clone()).collect();
        let outputs = vec![TransactionOutput::new(merge_value, self.change_script_public_key.clone())];

        let mut tx = Transaction::new(TX_VERSION, inputs, outputs, 0, SUBNETWORK_ID_NATIVE, 0, vec![]);
        tx.set_mass(mass);

        self.merge_utxo = Some(UtxoEntryReference::new(
            None,
            TransactionOutpoint::new(tx.id(), 0),
            UtxoEntry::new(merge_value, self.change_script_public_key.clone(), UNACCEPTED_DAA_SCORE, false),
        ));
        self.number_of_generated_transactions += 1;
        self.aggregate_fees += fee;

        debug!(id = %tx.id(), inputs = tx.inputs.len(), merge_value, fee, "batch transaction generated");

        Ok(PendingTransaction {
            signable: SignableTransaction::with_entries(tx, entries),
            utxo_entries: selected,
            kind: DataKind::Batch,
            aggregate_input_value: selected_value,
            aggregate_output_value: merge_value,
            payment_value: None,
            change_output_index: Some(0),
            change_output_value: merge_value,
            fees: fee,
            mass,
        })
    }
}
