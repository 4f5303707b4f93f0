// Signing-hash construction: the domain-separated digest a signature
// commits to, for a given (transaction, input index, sighash type) triple.
use super::sighash_type::SigHashType;
use super::{ecdsa_signing_digest, HashWriter, TRANSACTION_SIGNING_HASH_DOMAIN};
use crate::error::CoreError;
use crate::hash::{Hash, ZERO_HASH};
use crate::tx::{ScriptPublicKey, TransactionOutpoint, TransactionOutput, VerifiableTransaction};

/// Per-transaction memo for the sub-hashes that are shared across inputs.
/// One instance must not outlive changes to the fields it commits to; the
/// signing flows create one per transaction.
#[derive(Debug, Default, Clone)]
pub struct SigHashReusedValues {
    previous_outputs_hash: Option<Hash>,
    sequences_hash: Option<Hash>,
    sig_op_counts_hash: Option<Hash>,
    outputs_hash: Option<Hash>,
    payload_hash: Option<Hash>,
}

impl SigHashReusedValues {
    pub fn new() -> Self {
        Self::default()
    }
}

fn previous_outputs_hash(tx: &impl VerifiableTransaction, hash_type: SigHashType, reused: &mut SigHashReusedValues) -> Hash {
    if hash_type.is_sighash_anyone_can_pay() {
        return ZERO_HASH;
    }
    *reused.previous_outputs_hash.get_or_insert_with(|| {
        let mut writer = HashWriter::new(TRANSACTION_SIGNING_HASH_DOMAIN);
        for input in tx.inputs() {
            write_outpoint(&mut writer, &input.previous_outpoint);
        }
        writer.finalize()
    })
}

fn sequences_hash(tx: &impl VerifiableTransaction, hash_type: SigHashType, reused: &mut SigHashReusedValues) -> Hash {
    if hash_type.is_sighash_single() || hash_type.is_sighash_anyone_can_pay() || hash_type.is_sighash_none() {
        return ZERO_HASH;
    }
    *reused.sequences_hash.get_or_insert_with(|| {
        let mut writer = HashWriter::new(TRANSACTION_SIGNING_HASH_DOMAIN);
        for input in tx.inputs() {
            writer.write_u64(input.sequence);
        }
        writer.finalize()
    })
}

fn sig_op_counts_hash(tx: &impl VerifiableTransaction, hash_type: SigHashType, reused: &mut SigHashReusedValues) -> Hash {
    if hash_type.is_sighash_anyone_can_pay() {
        return ZERO_HASH;
    }
    *reused.sig_op_counts_hash.get_or_insert_with(|| {
        let mut writer = HashWriter::new(TRANSACTION_SIGNING_HASH_DOMAIN);
        for input in tx.inputs() {
            writer.write_u8(input.sig_op_count);
        }
        writer.finalize()
    })
}

fn outputs_hash(
    tx: &impl VerifiableTransaction,
    hash_type: SigHashType,
    input_index: usize,
    reused: &mut SigHashReusedValues,
) -> Hash {
    if hash_type.is_sighash_none() {
        return ZERO_HASH;
    }
    if hash_type.is_sighash_single() {
        // SINGLE commits to the output at the input's index only; a missing
        // counterpart output degrades to the zero hash.
        if input_index >= tx.outputs().len() {
            return ZERO_HASH;
        }
        let mut writer = HashWriter::new(TRANSACTION_SIGNING_HASH_DOMAIN);
        write_output(&mut writer, &tx.outputs()[input_index]);
        return writer.finalize();
    }
    *reused.outputs_hash.get_or_insert_with(|| {
        let mut writer = HashWriter::new(TRANSACTION_SIGNING_HASH_DOMAIN);
        for output in tx.outputs() {
            write_output(&mut writer, output);
        }
        writer.finalize()
    })
}

fn payload_hash(tx: &impl VerifiableTransaction, reused: &mut SigHashReusedValues) -> Hash {
    if tx.tx().subnetwork_id.is_native() && tx.tx().payload.is_empty() {
        return ZERO_HASH;
    }
    *reused.payload_hash.get_or_insert_with(|| {
        let mut writer = HashWriter::new(TRANSACTION_SIGNING_HASH_DOMAIN);
        writer.write_var_bytes(&tx.tx().payload);
        writer.finalize()
    })
}

fn write_outpoint(writer: &mut HashWriter, outpoint: &TransactionOutpoint) {
    writer.update(outpoint.transaction_id.as_bytes()).write_u32(outpoint.index);
}

fn write_output(writer: &mut HashWriter, output: &TransactionOutput) {
    writer.write_u64(output.value);
    write_script_public_key(writer, &output.script_public_key);
}

fn write_script_public_key(writer: &mut HashWriter, script_public_key: &ScriptPublicKey) {
    writer.write_u16(script_public_key.version()).write_var_bytes(script_public_key.script());
}

/// The Schnorr signing digest for one input.
pub fn calc_schnorr_signature_hash(
    tx: &impl VerifiableTransaction,
    input_index: usize,
    hash_type: SigHashType,
    reused: &mut SigHashReusedValues,
) -> Result<Hash, CoreError> {
    if input_index >= tx.inputs().len() {
        return Err(CoreError::InputIndexOutOfRange(input_index, tx.inputs().len()));
    }
    let (input, utxo) = tx.populated_input(input_index);
    let body = tx.tx();

    let mut writer = HashWriter::new(TRANSACTION_SIGNING_HASH_DOMAIN);
    writer
        .write_u16(body.version)
        .update(previous_outputs_hash(tx, hash_type, reused).as_bytes())
        .update(sequences_hash(tx, hash_type, reused).as_bytes())
        .update(sig_op_counts_hash(tx, hash_type, reused).as_bytes());
    write_outpoint(&mut writer, &input.previous_outpoint);
    write_script_public_key(&mut writer, &utxo.script_public_key);
    writer.write_u64(utxo.amount).write_u64(input.sequence).write_u8(input.sig_op_count);
    writer
        .update(outputs_hash(tx, hash_type, input_index, reused).as_bytes())
        .write_u64(body.lock_time)
        .update(body.subnetwork_id.as_bytes())
        .write_u64(body.gas)
        .update(payload_hash(tx, reused).as_bytes())
        .write_u8(hash_type.to_u8());
    Ok(writer.finalize())
}

/// The ECDSA signing digest: the Schnorr digest with the outer SHA-256 wrap.
pub fn calc_ecdsa_signature_hash(
    tx: &impl VerifiableTransaction,
    input_index: usize,
    hash_type: SigHashType,
    reused: &mut SigHashReusedValues,
) -> Result<Hash, CoreError> {
    let hash = calc_schnorr_signature_hash(tx, input_index, hash_type, reused)?;
    Ok(ecdsa_signing_digest(hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::sighash_type::SIG_HASH_ALL;
    use crate::subnets::SUBNETWORK_ID_NATIVE;
    use crate::tx::{
        PopulatedTransaction, Transaction, TransactionInput, TransactionOutput, UtxoEntry,
    };

    fn reference_setup(signature_scripts: bool, payload: Vec<u8>) -> (Transaction, Vec<UtxoEntry>) {
        let prev_id = "880eb9819a31821d9d2399e2f35e2433b72637e393d71ecc9b8d0250f49153c3".parse().unwrap();
        let spk_in = ScriptPublicKey::new(0, [&[0x20][..], &[0xaa; 32], &[0xac]].concat());
        let spk_out = ScriptPublicKey::new(0, [&[0x20][..], &[0xbb; 32], &[0xac]].concat());
        let inputs = (0..3)
            .map(|i| {
                TransactionInput::new(
                    TransactionOutpoint::new(prev_id, i as u32),
                    if signature_scripts { vec![0x41; 66] } else { vec![] },
                    i as u64,
                    1,
                )
            })
            .collect();
        let outputs = vec![
            TransactionOutput::new(300, spk_out.clone()),
            TransactionOutput::new(300, spk_out),
        ];
        let tx = Transaction::new(0, inputs, outputs, 1615462089000, SUBNETWORK_ID_NATIVE, 0, payload);
        let entries = (0..3u64).map(|i| UtxoEntry::new((i + 1) * 100, spk_in.clone(), 0, false)).collect();
        (tx, entries)
    }

    #[test]
    fn test_signing_hash_vectors() {
        // (name, input index, hash type, expected digest)
        let vectors = [
            ("all", 0, 0x01, "d59e22d326129e8174da3a453ccb6bc8a840252c595bf7abb49379260afc70ed"),
            ("all", 1, 0x01, "e09a0c4c80cd9360a5400046cebc46c426f387db28633f94760b3e3d7b2a67bc"),
            ("all", 2, 0x01, "a8d8ba3121e472fefd5fdefa5e248fd8def582742c028014d8f50ff5315a1fce"),
            ("none", 0, 0x02, "948ffa3a54c6df65f2350a79a6865b65c03386b54e0e89542309cb62004a5fa6"),
            ("none", 1, 0x02, "e18c5a0b19cb8294c1490e4c227961b4a7dfbf30531d360dd34d8e2606273c3d"),
            ("none", 2, 0x02, "a64e63ef1cab43f8d6a1e59e4139f7f033c7e18de9d728c71b0a59e7387e6534"),
            ("single", 0, 0x04, "9e8175ffa0f3750fded731eb61c162274963254261596818c10c0bf1eb4840a7"),
            ("single", 1, 0x04, "f791a199b9c747ebc2e8d5ff28f74f6e131fad038bad4f80daf3685845bdd037"),
            ("single", 2, 0x04, "a5a15fceb2db9d72fb9766358873f4f933fc2380c48db21dcb45ae9ec0aead5e"),
            ("all-acp", 0, 0x81, "8b7fae5b4b1a40f3ed968ecff54cda5d0ad1990b69eff387792c8c9dcb749f99"),
            ("all-acp", 1, 0x81, "2d7a459754054dbee9e598124209d70c7303cd7167f78a81a44baaa880c8bd11"),
            ("all-acp", 2, 0x81, "5889ff4f7f42e3e441061d48a3ecafe300e110795faa6822605dfb2bb18a2397"),
            ("none-acp", 0, 0x82, "4b8760ee360e179556d29165f7a28404e7510cc17668d931d982a6d4e427cf04"),
            ("none-acp", 1, 0x82, "c0265c9d6cb3f5665e122ff963594f5a0931b6be07be328f431058e1d8192d99"),
            ("none-acp", 2, 0x82, "49cbfa9821bb27c2e04a1b178aebfe54f73dd3ff4a4f1799eb08aa8c202a8b5d"),
            ("single-acp", 0, 0x84, "4aed32003e59449910e7dca8ef7420689af6e908d3b2d9c023cde7b53ba99902"),
            ("single-acp", 1, 0x84, "4a2ce01a69206d66e6ba3633dc8d4b5cb360d55d5d8e35094a9747cfb3c05795"),
            ("single-acp", 2, 0x84, "03e663cd4b651aa46b0cb0f20e353b2620da8e9451eb8f71e44ee716d87b538e"),
        ];

        let (tx, entries) = reference_setup(false, vec![]);
        let populated = PopulatedTransaction::new(&tx, entries);
        for (name, input_index, hash_type, expected) in vectors {
            let mut reused = SigHashReusedValues::new();
            let hash_type = SigHashType::from_u8(hash_type).unwrap();
            let digest = calc_schnorr_signature_hash(&populated, input_index, hash_type, &mut reused).unwrap();
            assert_eq!(digest.to_hex(), expected, "vector {name}-{input_index}");
        }
    }

    #[test]
    fn test_signing_hash_ignores_signature_scripts() {
        let (tx, entries) = reference_setup(false, vec![]);
        let (tx_signed, entries_signed) = reference_setup(true, vec![]);
        let populated = PopulatedTransaction::new(&tx, entries);
        let populated_signed = PopulatedTransaction::new(&tx_signed, entries_signed);
        for input_index in 0..3 {
            let mut reused = SigHashReusedValues::new();
            let mut reused_signed = SigHashReusedValues::new();
            assert_eq!(
                calc_schnorr_signature_hash(&populated, input_index, SIG_HASH_ALL, &mut reused)
                    .unwrap(),
                calc_schnorr_signature_hash(
                    &populated_signed,
                    input_index,
                    SIG_HASH_ALL,
                    &mut reused_signed
                )
                .unwrap(),
            );
        }
    }

    #[test]
    fn test_payload_commits_for_native_subnetwork() {
        let (tx, entries) = reference_setup(false, vec![1, 2, 3]);
        let populated = PopulatedTransaction::new(&tx, entries);
        let mut reused = SigHashReusedValues::new();
        let digest = calc_schnorr_signature_hash(
            &populated,
            0,
            SIG_HASH_ALL,
            &mut reused,
        )
        .unwrap();
        assert_eq!(digest.to_hex(), "395aea0031f7caa982ebf1843b8ba02cd30e13d3a24f0423ecfc9fc2e90da808");
    }

    #[test]
    fn test_ecdsa_wrap_vector() {
        let (tx, entries) = reference_setup(false, vec![]);
        let populated = PopulatedTransaction::new(&tx, entries);
        let mut reused = SigHashReusedValues::new();
        let digest = calc_ecdsa_signature_hash(
            &populated,
            0,
            SIG_HASH_ALL,
            &mut reused,
        )
        .unwrap();
        assert_eq!(digest.to_hex(), "a31001d73c30f7cf5af3f54ea95e57d3d08759c2650b2bcdc813a479ce5817f2");
    }

    #[test]
    fn test_out_of_range_input() {
        let (tx, entries) = reference_setup(false, vec![]);
        let populated = PopulatedTransaction::new(&tx, entries);
        let mut reused = SigHashReusedValues::new();
        assert!(matches!(
            calc_schnorr_signature_hash(&populated, 3, SIG_HASH_ALL, &mut reused),
            Err(CoreError::InputIndexOutOfRange(3, 3))
        ));
    }
}
