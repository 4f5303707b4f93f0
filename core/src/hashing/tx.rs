// Transaction body serialization for the id and full-body hashes.
use super::{HashWriter, TRANSACTION_HASH_DOMAIN, TRANSACTION_ID_DOMAIN};
use crate::hash::Hash;
use crate::tx::{Transaction, TransactionId, TransactionInput, TransactionOutput};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Encoding {
    /// Includes signature scripts, sig-op counts and the payload.
    Full,
    /// Signature scripts are replaced with empty runs, sig-op counts are
    /// omitted, and the payload is omitted for the native subnetwork.
    Id,
}

/// The canonical transaction id: excludes signature scripts, except for
/// coinbase transactions which hash their full encoding.
pub fn id(tx: &Transaction) -> TransactionId {
    let encoding = if tx.is_coinbase() { Encoding::Full } else { Encoding::Id };
    let mut writer = HashWriter::new(TRANSACTION_ID_DOMAIN);
    write_transaction(&mut writer, tx, encoding);
    writer.finalize()
}

/// The full body hash, committing to signature scripts as well.
pub fn hash(tx: &Transaction) -> Hash {
    let mut writer = HashWriter::new(TRANSACTION_HASH_DOMAIN);
    write_transaction(&mut writer, tx, Encoding::Full);
    writer.finalize()
}

fn write_transaction(writer: &mut HashWriter, tx: &Transaction, encoding: Encoding) {
    writer.write_u16(tx.version).write_len(tx.inputs.len());
    for input in tx.inputs.iter() {
        write_input(writer, input, encoding);
    }

    writer.write_len(tx.outputs.len());
    for output in tx.outputs.iter() {
        write_output(writer, output);
    }

    writer.write_u64(tx.lock_time);
    writer.update(tx.subnetwork_id.as_bytes());
    writer.write_u64(tx.gas);

    // The native-subnetwork id omits the payload entirely; every other
    // combination hashes it with a length prefix.
    if encoding == Encoding::Full || !tx.subnetwork_id.is_native() {
        writer.write_var_bytes(&tx.payload);
    }
}

fn write_input(writer: &mut HashWriter, input: &TransactionInput, encoding: Encoding) {
    write_outpoint(writer, input);
    match encoding {
        Encoding::Full => {
            writer.write_var_bytes(&input.signature_script).write_u8(input.sig_op_count);
        }
        Encoding::Id => {
            writer.write_var_bytes(&[]);
        }
    }
    writer.write_u64(input.sequence);
}

fn write_outpoint(writer: &mut HashWriter, input: &TransactionInput) {
    writer.update(input.previous_outpoint.transaction_id.as_bytes()).write_u32(input.previous_outpoint.index);
}

fn write_output(writer: &mut HashWriter, output: &TransactionOutput) {
    writer
        .write_u64(output.value)
        .write_u16(output.script_public_key.version())
        .write_var_bytes(output.script_public_key.script());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subnets::{SubnetworkId, SUBNETWORK_ID_COINBASE, SUBNETWORK_ID_NATIVE};
    use crate::tx::{ScriptPublicKey, TransactionOutpoint};

    // The coinbase-subnetwork serialization vector from the consensus
    // implementation: full signature scripts and payload are hashed.
    #[test]
    fn test_consensus_coinbase_vector() {
        let script_public_key = ScriptPublicKey::new(
            0,
            vec![
                0x76, 0xa9, 0x21, 0x03, 0x2f, 0x7e, 0x43, 0x0a, 0xa4, 0xc9, 0xd1, 0x59, 0x43, 0x7e, 0x84, 0xb9, 0x75,
                0xdc, 0x76, 0xd9, 0x00, 0x3b, 0xf0, 0x92, 0x2c, 0xf3, 0xaa, 0x45, 0x28, 0x46, 0x4b, 0xab, 0x78, 0x0d,
                0xba, 0x5e,
            ],
        );
        let tx = Transaction::new(
            1,
            vec![
                TransactionInput::new(
                    TransactionOutpoint::new(
                        "165e38e8b3914595d9c641f3b8eec2f34611896b821a683b7a4edefe2c000000".parse().unwrap(),
                        0xfffffffa,
                    ),
                    (0x00..0x20).collect(),
                    2,
                    3,
                ),
                TransactionInput::new(
                    TransactionOutpoint::new(
                        "4bb07535dfd58e0b3cd64fd7155280872a0471bcf83095526ace0e38c6000000".parse().unwrap(),
                        0xfffffffb,
                    ),
                    (0x20..0x40).collect(),
                    4,
                    5,
                ),
            ],
            vec![
                TransactionOutput::new(6, script_public_key.clone()),
                TransactionOutput::new(7, script_public_key),
            ],
            8,
            SUBNETWORK_ID_COINBASE,
            9,
            (0..100).collect(),
        );
        assert_eq!(tx.id().to_hex(), "4592c14062312d004d20197a4d0fd3fc3dd252b127997f21bcac8a26434bf1b0");
    }

    fn reference_transaction() -> Transaction {
        Transaction::new(
            2,
            vec![TransactionInput::new(
                TransactionOutpoint::new(
                    "0000000000000000000000000000000000000000000000000000000000000001".parse().unwrap(),
                    2,
                ),
                vec![1, 2],
                7,
                5,
            )],
            vec![TransactionOutput::new(1564, ScriptPublicKey::new(7, vec![1, 2, 3, 4, 5]))],
            54,
            SUBNETWORK_ID_NATIVE,
            3,
            vec![],
        )
    }

    #[test]
    fn test_id_and_hash_vectors() {
        let tx = reference_transaction();
        assert_eq!(id(&tx).to_hex(), "de6d497b69312c49059a093df257336ca81a90e0726ad4a4cc5cf83989c16ca2");
        assert_eq!(hash(&tx).to_hex(), "54713499aa829378feb80ea6679e489680b8ba828e3bc5234af01f560a2ad0ca");
    }

    #[test]
    fn test_id_ignores_payload_for_native_subnetwork() {
        let mut tx = reference_transaction();
        tx.payload = vec![9, 9, 9];
        tx.finalize();
        assert_eq!(id(&tx).to_hex(), "de6d497b69312c49059a093df257336ca81a90e0726ad4a4cc5cf83989c16ca2");
        // The full hash still commits to it.
        assert_eq!(hash(&tx).to_hex(), "e032875aac4b3ed1385e1bb5a200ec75e5900c6aa0efe03bd34d96988bb2b5b4");

        // Flipping the subnetwork pulls the payload into the id.
        tx.subnetwork_id = SubnetworkId::from_byte(3);
        tx.finalize();
        assert_eq!(id(&tx).to_hex(), "83898ff83b4f75d822ff458aa54c04368345ff0618b0de19d12c51e84bf750b8");
    }

    #[test]
    fn test_hash_commits_to_signature_script() {
        let tx = reference_transaction();
        let mut other = tx.clone();
        other.inputs[0].signature_script = vec![3, 4];
        other.finalize();
        assert_eq!(id(&tx), id(&other));
        assert_ne!(hash(&tx), hash(&other));
    }
}
