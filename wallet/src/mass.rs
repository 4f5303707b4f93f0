// Mass calculation: the compute-mass linear form and the storage-mass
// harmonic form, both bounded by the network ceiling.
use sompi_core::{Transaction, TransactionOutput};

use crate::params::Params;

/// Estimated byte size of a pay-to-pubkey signature script (one 65-byte
/// push of signature plus sighash-type byte), used for unsigned inputs.
pub const SIGNATURE_SCRIPT_SIZE_ESTIMATE: u64 = 66;

#[derive(Debug, Clone, Copy)]
pub struct MassCalculator {
    mass_per_tx_byte: u64,
    mass_per_script_pub_key_byte: u64,
    mass_per_sig_op: u64,
    storage_mass_parameter: u64,
    minimum_relay_transaction_fee: u64,
    max_transaction_mass: u64,
}

impl MassCalculator {
    pub fn new(params: &Params) -> Self {
        Self {
            mass_per_tx_byte: params.mass_per_tx_byte,
            mass_per_script_pub_key_byte: params.mass_per_script_pub_key_byte,
            mass_per_sig_op: params.mass_per_sig_op,
            storage_mass_parameter: params.storage_mass_parameter,
            minimum_relay_transaction_fee: params.minimum_relay_transaction_fee,
            max_transaction_mass: params.max_transaction_mass,
        }
    }

    pub fn max_transaction_mass(&self) -> u64 {
        self.max_transaction_mass
    }

    /// Serialized size of one input carrying a signature script of
    /// `signature_script_len` bytes: outpoint + script framing + sequence +
    /// sig-op count.
    pub fn transaction_input_serialized_size(signature_script_len: u64) -> u64 {
        32 + 4 + 8 + signature_script_len + 8 + 1
    }

    /// Serialized size of one output: value + script version + script
    /// framing.
    pub fn transaction_output_serialized_size(output: &TransactionOutput) -> u64 {
        8 + 2 + 8 + output.script_public_key.script().len() as u64
    }

    fn transaction_base_serialized_size(tx: &Transaction) -> u64 {
        // version + both counts + lock time + subnetwork + gas + payload
        // framing.
        2 + 8 + 8 + 8 + 20 + 8 + 8 + tx.payload.len() as u64
    }

    /// Serialized byte size of the transaction as-is (empty signature
    /// scripts count as empty).
    pub fn transaction_serialized_size(tx: &Transaction) -> u64 {
        Self::transaction_base_serialized_size(tx)
            + tx.inputs
                .iter()
                .map(|input| Self::transaction_input_serialized_size(input.signature_script.len() as u64))
                .sum::<u64>()
            + tx.outputs.iter().map(Self::transaction_output_serialized_size).sum::<u64>()
    }

    /// Serialized byte size with unsigned inputs replaced by the standard
    /// signature-script estimate.
    pub fn transaction_estimated_serialized_size(tx: &Transaction) -> u64 {
        Self::transaction_base_serialized_size(tx)
            + tx.inputs
                .iter()
                .map(|input| {
                    let len = match input.signature_script.is_empty() {
                        true => SIGNATURE_SCRIPT_SIZE_ESTIMATE,
                        false => input.signature_script.len() as u64,
                    };
                    Self::transaction_input_serialized_size(len)
                })
                .sum::<u64>()
            + tx.outputs.iter().map(Self::transaction_output_serialized_size).sum::<u64>()
    }

    fn compute_mass_from_size(&self, byte_size: u64, tx: &Transaction) -> u64 {
        let script_public_key_size: u64 =
            tx.outputs.iter().map(|output| 2 + output.script_public_key.script().len() as u64).sum();
        let sig_op_count: u64 = tx.inputs.iter().map(|input| input.sig_op_count as u64).sum();
        byte_size * self.mass_per_tx_byte
            + script_public_key_size * self.mass_per_script_pub_key_byte
            + sig_op_count * self.mass_per_sig_op
    }

    /// Compute mass of a fully signed transaction.
    pub fn calc_compute_mass_for_signed_transaction(&self, tx: &Transaction) -> u64 {
        self.compute_mass_from_size(Self::transaction_serialized_size(tx), tx)
    }

    /// Compute mass of an unsigned transaction, with signature scripts
    /// estimated at their standard size.
    pub fn calc_compute_mass_for_unsigned_transaction(&self, tx: &Transaction) -> u64 {
        self.compute_mass_from_size(Self::transaction_estimated_serialized_size(tx), tx)
    }

    /// Compute mass of a prospective transaction described by its parts:
    /// `num_inputs` unsigned inputs carrying `sig_op_count` sig-ops each,
    /// the given outputs, and a payload of `payload_len` bytes.
    pub fn calc_compute_mass_for_parts(
        &self,
        num_inputs: u64,
        sig_op_count: u8,
        outputs: &[TransactionOutput],
        payload_len: u64,
    ) -> u64 {
        let base_size = 2 + 8 + 8 + 8 + 20 + 8 + 8 + payload_len;
        let inputs_size = num_inputs * Self::transaction_input_serialized_size(SIGNATURE_SCRIPT_SIZE_ESTIMATE);
        let outputs_size: u64 = outputs.iter().map(Self::transaction_output_serialized_size).sum();
        let script_public_key_size: u64 =
            outputs.iter().map(|output| 2 + output.script_public_key.script().len() as u64).sum();
        (base_size + inputs_size + outputs_size) * self.mass_per_tx_byte
            + script_public_key_size * self.mass_per_script_pub_key_byte
            + num_inputs * sig_op_count as u64 * self.mass_per_sig_op
    }

    /// Storage mass: `max(0, C·|O|/H(O) − C·|I|/A(I))`, where H is the
    /// harmonic and A the arithmetic mean. Returns `None` on overflow (an
    /// output value of zero).
    pub fn calc_storage_mass(
        &self,
        input_values: impl ExactSizeIterator<Item = u64>,
        output_values: impl Iterator<Item = u64>,
    ) -> Option<u64> {
        let ins_len = input_values.len() as u64;
        if ins_len == 0 {
            return Some(0);
        }
        let sum_ins: u64 = input_values.sum();
        let mean_ins = sum_ins / ins_len;
        if mean_ins == 0 {
            return None;
        }
        // C·|O|/H(O) is the sum of C/v over the output values.
        let harmonic_outs = output_values
            .map(|value| self.storage_mass_parameter.checked_div(value))
            .sum::<Option<u64>>()?;
        let arithmetic_ins = ins_len.saturating_mul(self.storage_mass_parameter / mean_ins);
        Some(harmonic_outs.saturating_sub(arithmetic_ins))
    }

    /// The minimum fee for a transaction of the given mass to be relayed.
    pub fn minimum_relay_fee(&self, mass: u64) -> u64 {
        let fee = mass * self.minimum_relay_transaction_fee / 1000;
        fee.max(self.minimum_relay_transaction_fee)
    }

    /// Whether spending this output would cost the network more than the
    /// value it carries: value scaled per kilobyte against a third of the
    /// relay fee, assuming a standard 148-byte redeeming input.
    pub fn is_output_dust(&self, output: &TransactionOutput) -> bool {
        let total_serialized_size = Self::transaction_output_serialized_size(output) + 148;
        match output.value.checked_mul(1000) {
            Some(value_1000) => value_1000 / (3 * total_serialized_size) < self.minimum_relay_transaction_fee,
            None => {
                (output.value as u128 * 1000 / (3 * total_serialized_size as u128))
                    < self.minimum_relay_transaction_fee as u128
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Params;
    use sompi_core::{
        NetworkId, NetworkType, ScriptPublicKey, Transaction, TransactionInput, TransactionOutpoint,
    };

    fn calculator() -> MassCalculator {
        MassCalculator::new(&Params::from_network(NetworkId::new(NetworkType::Mainnet)))
    }

    fn p2pk_output(value: u64) -> TransactionOutput {
        TransactionOutput::new(value, ScriptPublicKey::new(0, [&[0x20][..], &[0xaa; 32], &[0xac]].concat()))
    }

    #[test]
    fn test_compute_mass_linear_form() {
        let calc = calculator();
        let tx = Transaction::new(
            0,
            vec![TransactionInput::new(TransactionOutpoint::default(), vec![], 0, 1)],
            vec![p2pk_output(10_000)],
            0,
            Default::default(),
            0,
            vec![],
        );
        // base 62 + input (53 + 66 estimated) + output 52 = 233 bytes;
        // spk bytes 36 * 10; one sig op * 1000.
        let mass = calc.calc_compute_mass_for_unsigned_transaction(&tx);
        assert_eq!(mass, 233 + 360 + 1000);
    }

    #[test]
    fn test_storage_mass_clamped_for_plump_outputs() {
        let calc = calculator();
        // Two large inputs paying two equally large outputs: the relief
        // term cancels the harmonic term.
        let mass = calc.calc_storage_mass([2_000_000_000u64, 2_000_000_000].into_iter(), [2_000_000_000u64, 2_000_000_000].into_iter());
        assert_eq!(mass, Some(0));
        // A mildly smaller output leaves only a small residue.
        let mass = calc
            .calc_storage_mass([2_000_000_000u64, 2_000_000_000].into_iter(), [1_900_000_000u64, 2_000_000_000].into_iter())
            .unwrap();
        assert!(mass < 100);
    }

    #[test]
    fn test_storage_mass_punishes_dust_outputs() {
        let calc = calculator();
        // One healthy input split into a thousand-sompi output: C/1000 is a
        // billion-scale term.
        let mass = calc.calc_storage_mass([100_000_000u64].into_iter(), [1000u64].into_iter()).unwrap();
        assert!(mass > MAXIMUM_STANDARD_TRANSACTION_MASS_FOR_TEST);
        // Zero-valued outputs overflow the formula.
        assert_eq!(calc.calc_storage_mass([100u64].into_iter(), [0u64].into_iter()), None);
    }

    const MAXIMUM_STANDARD_TRANSACTION_MASS_FOR_TEST: u64 = 100_000;

    #[test]
    fn test_relay_fee_floor() {
        let calc = calculator();
        assert_eq!(calc.minimum_relay_fee(10), 1000);
        assert_eq!(calc.minimum_relay_fee(2500), 2500);
    }

    #[test]
    fn test_dust_threshold() {
        let calc = calculator();
        assert!(calc.is_output_dust(&p2pk_output(500)));
        assert!(!calc.is_output_dust(&p2pk_output(100_000)));
    }
}
