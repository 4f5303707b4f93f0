// Whole-transaction signing helpers.
use std::collections::BTreeMap;

use secp256k1::{Message, SECP256K1};

use crate::error::CoreError;
use crate::hashing::sighash::{calc_schnorr_signature_hash, SigHashReusedValues};
use crate::hashing::sighash_type::{SigHashType, SIG_HASH_ALL};
use crate::keypair::Keypair;
use crate::tx::{SignableTransaction, VerifiableTransaction};

/// A transaction together with its signing completeness state.
pub enum Signed {
    Fully(SignableTransaction),
    Partially(SignableTransaction),
}

impl Signed {
    /// Returns the transaction if it is fully signed, an error otherwise.
    pub fn fully_signed(self) -> Result<SignableTransaction, CoreError> {
        match self {
            Signed::Fully(tx) => Ok(tx),
            Signed::Partially(_) => Err(CoreError::PartiallySigned),
        }
    }

    /// Returns the transaction regardless of completeness.
    pub fn unwrap(self) -> SignableTransaction {
        match self {
            Signed::Fully(tx) | Signed::Partially(tx) => tx,
        }
    }

    pub fn is_fully_signed(&self) -> bool {
        matches!(self, Signed::Fully(_))
    }
}

/// Builds the canonical signature script for a 64-byte signature plus
/// sighash-type byte: a single 65-byte data push.
pub fn signature_script(signature: &[u8; 64], hash_type: SigHashType) -> Vec<u8> {
    std::iter::once(65u8).chain(signature.iter().copied()).chain([hash_type.to_u8()]).collect()
}

/// Signs every input with the supplied keypair using SIGHASH_ALL.
pub fn sign(mut signable_tx: SignableTransaction, keypair: &Keypair) -> Result<SignableTransaction, CoreError> {
    let reused = &mut SigHashReusedValues::new();
    for i in 0..signable_tx.tx.inputs.len() {
        let sig_hash = calc_schnorr_signature_hash(&signable_tx.as_verifiable(), i, SIG_HASH_ALL, reused)?;
        let signature = keypair.sign_schnorr(sig_hash)?;
        signable_tx.tx.inputs[i].signature_script = signature_script(signature.as_bytes(), SIG_HASH_ALL);
    }
    Ok(signable_tx)
}

/// Signs the inputs whose script public keys match one of the supplied
/// private keys (pay-to-pubkey form). Returns the transaction wrapped in its
/// completeness state.
pub fn sign_with_multiple(mut mutable_tx: SignableTransaction, privkeys: &[[u8; 32]]) -> Result<Signed, CoreError> {
    let mut map = BTreeMap::new();
    for privkey in privkeys {
        let schnorr_key = secp256k1::Keypair::from_seckey_slice(SECP256K1, privkey)?;
        let x_only = schnorr_key.public_key().x_only_public_key().0.serialize();
        // Pay-to-pubkey script form: OP_DATA_32 <key> OP_CHECKSIG.
        let script = std::iter::once(0x20u8).chain(x_only).chain(std::iter::once(0xacu8)).collect::<Vec<_>>();
        map.insert(script, schnorr_key);
    }

    let reused = &mut SigHashReusedValues::new();
    let mut additional_signatures_required = false;
    for i in 0..mutable_tx.tx.inputs.len() {
        let script = mutable_tx.entries[i]
            .as_ref()
            .ok_or(CoreError::MissingUtxoEntry(i))?
            .script_public_key
            .script()
            .to_vec();
        let Some(schnorr_key) = map.get(&script) else {
            additional_signatures_required = true;
            continue;
        };
        let sig_hash = calc_schnorr_signature_hash(&mutable_tx.as_verifiable(), i, SIG_HASH_ALL, reused)?;
        let message = Message::from_digest_slice(sig_hash.as_bytes())?;
        let signature: [u8; 64] = *schnorr_key.sign_schnorr(message).as_ref();
        mutable_tx.tx.inputs[i].signature_script = signature_script(&signature, SIG_HASH_ALL);
    }

    if additional_signatures_required {
        Ok(Signed::Partially(mutable_tx))
    } else {
        Ok(Signed::Fully(mutable_tx))
    }
}

/// Produces the signature script for one input with the given sighash type,
/// without mutating the transaction.
pub fn sign_input(
    tx: &impl VerifiableTransaction,
    input_index: usize,
    private_key: &[u8; 32],
    hash_type: SigHashType,
) -> Result<Vec<u8>, CoreError> {
    let reused = &mut SigHashReusedValues::new();
    let sig_hash = calc_schnorr_signature_hash(tx, input_index, hash_type, reused)?;
    let message = Message::from_digest_slice(sig_hash.as_bytes())?;
    let schnorr_key = secp256k1::Keypair::from_seckey_slice(SECP256K1, private_key)?;
    let signature: [u8; 64] = *schnorr_key.sign_schnorr(message).as_ref();
    Ok(signature_script(&signature, hash_type))
}

/// Signs an off-chain personal message with the keypair's Schnorr key.
pub fn sign_message(message: &[u8], keypair: &Keypair) -> Result<[u8; 64], CoreError> {
    let digest = crate::hashing::personal_message_hash(message);
    match keypair.sign_schnorr(digest)? {
        crate::keypair::Signature::Schnorr(signature) => Ok(signature),
        crate::keypair::Signature::Ecdsa(_) => unreachable!("schnorr signing produces schnorr signatures"),
    }
}

/// Verifies an off-chain personal message signature against an x-only key.
pub fn verify_message(message: &[u8], signature: &[u8; 64], x_only_public_key: &[u8; 32]) -> Result<(), CoreError> {
    let digest = crate::hashing::personal_message_hash(message);
    let pk = secp256k1::XOnlyPublicKey::from_slice(x_only_public_key)?;
    let sig = secp256k1::schnorr::Signature::from_slice(signature)?;
    let msg = Message::from_digest_slice(digest.as_bytes())?;
    sig.verify(&msg, &pk).map_err(|e| CoreError::SignatureVerification(0, e.to_string()))
}

/// Cheap pay-to-pubkey verification of a fully signed transaction: checks
/// every input's Schnorr signature against the key embedded in its script
/// public key. Use the script engine for full consensus verification.
pub fn verify(tx: &impl VerifiableTransaction) -> Result<(), CoreError> {
    let reused = &mut SigHashReusedValues::new();
    for (i, (input, entry)) in tx.populated_inputs().enumerate() {
        if input.signature_script.is_empty() {
            return Err(CoreError::SignatureVerification(i, "signature script is empty".to_string()));
        }
        let script = entry.script_public_key.script();
        if script.len() < 34 || input.signature_script.len() < 66 {
            return Err(CoreError::SignatureVerification(i, "not a pay-to-pubkey input".to_string()));
        }
        let pk = secp256k1::XOnlyPublicKey::from_slice(&script[1..33])?;
        let sig = secp256k1::schnorr::Signature::from_slice(&input.signature_script[1..65])?;
        let sig_hash = calc_schnorr_signature_hash(tx, i, SIG_HASH_ALL, reused)?;
        let message = Message::from_digest_slice(sig_hash.as_bytes())?;
        sig.verify(&message, &pk).map_err(|e| CoreError::SignatureVerification(i, e.to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Hash;
    use crate::subnets::SubnetworkId;
    use crate::tx::{
        ScriptPublicKey, Transaction, TransactionInput, TransactionOutpoint, TransactionOutput, UtxoEntry,
    };

    fn p2pk_script(x_only: &[u8; 32]) -> Vec<u8> {
        std::iter::once(0x20u8).chain(x_only.iter().copied()).chain(std::iter::once(0xacu8)).collect()
    }

    #[test]
    fn test_sign_and_verify() {
        let key1 = Keypair::random();
        let key2 = Keypair::random();
        let spk1 = ScriptPublicKey::new(0, p2pk_script(&key1.x_only_public_key_bytes().unwrap()));
        let spk2 = ScriptPublicKey::new(0, p2pk_script(&key2.x_only_public_key_bytes().unwrap()));

        let prev_tx_id: Hash = "880eb9819a31821d9d2399e2f35e2433b72637e393d71ecc9b8d0250f49153c3".parse().unwrap();
        let unsigned_tx = Transaction::new(
            0,
            (0..3)
                .map(|i| {
                    TransactionInput::new(TransactionOutpoint::new(prev_tx_id, i as u32), vec![], i as u64, 1)
                })
                .collect(),
            vec![
                TransactionOutput::new(300, spk1.clone()),
                TransactionOutput::new(300, spk1.clone()),
            ],
            1615462089000,
            SubnetworkId::from_bytes([1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]),
            0,
            vec![],
        );
        let entries = vec![
            UtxoEntry::new(100, spk1.clone(), 0, false),
            UtxoEntry::new(200, spk1, 0, false),
            UtxoEntry::new(300, spk2, 0, false),
        ];

        let signed = sign_with_multiple(
            SignableTransaction::with_entries(unsigned_tx, entries),
            &[key1.secret_bytes().unwrap(), key2.secret_bytes().unwrap()],
        )
        .unwrap();
        assert!(signed.is_fully_signed());
        let tx = signed.unwrap();
        assert!(verify(&tx.as_verifiable()).is_ok());
    }

    #[test]
    fn test_partial_signing() {
        let key1 = Keypair::random();
        let stranger = Keypair::random();
        let spk1 = ScriptPublicKey::new(0, p2pk_script(&key1.x_only_public_key_bytes().unwrap()));
        let spk2 = ScriptPublicKey::new(0, p2pk_script(&stranger.x_only_public_key_bytes().unwrap()));

        let unsigned_tx = Transaction::new(
            0,
            (0..2)
                .map(|i| TransactionInput::new(TransactionOutpoint::new(Hash::from_bytes([3; 32]), i), vec![], 0, 1))
                .collect(),
            vec![TransactionOutput::new(100, spk1.clone())],
            0,
            Default::default(),
            0,
            vec![],
        );
        let entries = vec![UtxoEntry::new(100, spk1, 0, false), UtxoEntry::new(100, spk2, 0, false)];

        let signed = sign_with_multiple(
            SignableTransaction::with_entries(unsigned_tx, entries),
            &[key1.secret_bytes().unwrap()],
        )
        .unwrap();
        assert!(!signed.is_fully_signed());
        assert!(matches!(signed.fully_signed(), Err(CoreError::PartiallySigned)));
    }

    #[test]
    fn test_message_signing_round_trip() {
        let keypair = Keypair::random();
        let message = b"Hello Kaspa!";
        let signature = sign_message(message, &keypair).unwrap();
        let x_only = keypair.x_only_public_key_bytes().unwrap();
        assert!(verify_message(message, &signature, &x_only).is_ok());
        assert!(verify_message(b"Hello Kaspa?", &signature, &x_only).is_err());
    }

    #[test]
    fn test_signature_script_shape() {
        let script = signature_script(&[0x55; 64], SIG_HASH_ALL);
        assert_eq!(script.len(), 66);
        assert_eq!(script[0], 65);
        assert_eq!(*script.last().unwrap(), SIG_HASH_ALL.to_u8());
    }
}
