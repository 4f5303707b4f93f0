// Standard script classification and the address <-> script conversions.
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};

use sompi_core::{Address, Prefix, ScriptPublicKey, Version};

use crate::error::TxScriptError;
use crate::opcodes::codes::*;
use crate::opcodes::{parse_push_only, ScriptIter};
use crate::MAX_SCRIPT_PUBLIC_KEY_VERSION;

type Blake2b256 = Blake2b<U32>;

/// The standard script classes of version-0 script public keys. Everything
/// else is non-standard (but still spendable if its script validates).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptClass {
    NonStandard,
    PubKey,
    PubKeyECDSA,
    ScriptHash,
}

impl ScriptClass {
    pub fn from_script(script_public_key: &ScriptPublicKey) -> Self {
        if script_public_key.version() > MAX_SCRIPT_PUBLIC_KEY_VERSION {
            return ScriptClass::NonStandard;
        }
        let script = script_public_key.script();
        if is_pay_to_pubkey(script) {
            ScriptClass::PubKey
        } else if is_pay_to_pubkey_ecdsa(script) {
            ScriptClass::PubKeyECDSA
        } else if is_pay_to_script_hash(script) {
            ScriptClass::ScriptHash
        } else {
            ScriptClass::NonStandard
        }
    }
}

/// `<32-byte x-only key> OP_CHECKSIG`
pub fn is_pay_to_pubkey(script: &[u8]) -> bool {
    script.len() == 34 && script[0] == OpData32 && script[33] == OpCheckSig
}

/// `<33-byte compressed key> OP_CHECKSIG_ECDSA`
pub fn is_pay_to_pubkey_ecdsa(script: &[u8]) -> bool {
    script.len() == 35 && script[0] == OpData33 && script[34] == OpCheckSigECDSA
}

/// `OP_BLAKE2B <32-byte hash> OP_EQUAL`
pub fn is_pay_to_script_hash(script: &[u8]) -> bool {
    script.len() == 35 && script[0] == OpBlake2b && script[1] == OpData32 && script[34] == OpEqual
}

/// Locking script for an address.
pub fn pay_to_address_script(address: &Address) -> ScriptPublicKey {
    let script = match address.version {
        Version::PubKey => {
            let mut script = Vec::with_capacity(34);
            script.push(OpData32);
            script.extend_from_slice(&address.payload);
            script.push(OpCheckSig);
            script
        }
        Version::PubKeyEcdsa => {
            let mut script = Vec::with_capacity(35);
            script.push(OpData33);
            script.extend_from_slice(&address.payload);
            script.push(OpCheckSigECDSA);
            script
        }
        Version::ScriptHash => {
            let mut script = Vec::with_capacity(35);
            script.push(OpBlake2b);
            script.push(OpData32);
            script.extend_from_slice(&address.payload);
            script.push(OpEqual);
            script
        }
    };
    ScriptPublicKey::new(0, script)
}

/// Locking script committing to a redeem script's BLAKE2b hash.
pub fn pay_to_script_hash_script(redeem_script: &[u8]) -> ScriptPublicKey {
    let hash = Blake2b256::digest(redeem_script);
    let mut script = Vec::with_capacity(35);
    script.push(OpBlake2b);
    script.push(OpData32);
    script.extend_from_slice(&hash);
    script.push(OpEqual);
    ScriptPublicKey::new(0, script)
}

/// Unlocking script for a P2SH spend: the unlock prefix followed by the
/// pushed redeem script.
pub fn pay_to_script_hash_signature_script(
    redeem_script: &[u8],
    signature: &[u8],
) -> crate::script_builder::ScriptBuilderResult<Vec<u8>> {
    let mut builder = crate::script_builder::ScriptBuilder::new();
    builder.add_data(signature)?;
    builder.add_data(redeem_script)?;
    Ok(builder.drain())
}

/// A CHECKMULTISIG redeem script requiring `required` of the given x-only
/// keys. Keys are sorted for a canonical script.
pub fn multisig_redeem_script(
    keys: &[[u8; 32]],
    required: usize,
) -> crate::script_builder::ScriptBuilderResult<Vec<u8>> {
    let mut sorted = keys.to_vec();
    sorted.sort_unstable();
    let mut builder = crate::script_builder::ScriptBuilder::new();
    builder.add_i64(required as i64)?;
    for key in &sorted {
        builder.add_data(key)?;
    }
    builder.add_i64(sorted.len() as i64)?;
    builder.add_op(OpCheckMultiSig)?;
    Ok(builder.drain())
}

/// Recovers the address a standard script public key pays to.
pub fn extract_script_pub_key_address(script_public_key: &ScriptPublicKey, prefix: Prefix) -> Result<Address, TxScriptError> {
    let script = script_public_key.script();
    let (version, payload) = match ScriptClass::from_script(script_public_key) {
        ScriptClass::PubKey => (Version::PubKey, &script[1..33]),
        ScriptClass::PubKeyECDSA => (Version::PubKeyEcdsa, &script[1..34]),
        ScriptClass::ScriptHash => (Version::ScriptHash, &script[2..34]),
        ScriptClass::NonStandard => {
            return Err(TxScriptError::PubKeyFormat);
        }
    };
    Address::new(prefix, version, payload).map_err(|_| TxScriptError::PubKeyFormat)
}

/// Statically counts the signature operations a spend of `script_public_key`
/// executes. For P2SH the count is taken from the redeem script (the last
/// push of the signature script).
pub fn get_sig_op_count(signature_script: &[u8], script_public_key: &ScriptPublicKey) -> u64 {
    if !is_pay_to_script_hash(script_public_key.script()) {
        return count_sig_ops(script_public_key.script());
    }
    match parse_push_only(signature_script) {
        Ok(pushes) => match pushes.last() {
            Some(redeem_script) if !redeem_script.is_empty() => count_sig_ops(redeem_script),
            _ => 0,
        },
        Err(_) => 0,
    }
}

fn count_sig_ops(script: &[u8]) -> u64 {
    let mut count = 0u64;
    let mut previous_code: Option<u8> = None;
    for opcode in ScriptIter::new(script) {
        let Ok(opcode) = opcode else { break };
        match opcode.code {
            OpCheckSig | OpCheckSigVerify | OpCheckSigECDSA => count += 1,
            OpCheckMultiSig | OpCheckMultiSigVerify | OpCheckMultiSigECDSA => {
                // A preceding small-int push pins the key count; otherwise
                // assume the maximum.
                count += match previous_code {
                    Some(code) if (Op1..=Op16).contains(&code) => (code - Op1 + 1) as u64,
                    _ => crate::MAX_PUB_KEYS_PER_MULTISIG as u64,
                }
            }
            _ => {}
        }
        previous_code = Some(opcode.code);
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let p2pk = ScriptPublicKey::new(0, [&[OpData32][..], &[0x11; 32], &[OpCheckSig]].concat());
        assert_eq!(ScriptClass::from_script(&p2pk), ScriptClass::PubKey);

        let p2pk_ecdsa = ScriptPublicKey::new(0, [&[OpData33][..], &[0x22; 33], &[OpCheckSigECDSA]].concat());
        assert_eq!(ScriptClass::from_script(&p2pk_ecdsa), ScriptClass::PubKeyECDSA);

        let p2sh = pay_to_script_hash_script(&[OpTrue]);
        assert_eq!(ScriptClass::from_script(&p2sh), ScriptClass::ScriptHash);

        let unknown_version = ScriptPublicKey::new(1, p2pk.script().to_vec());
        assert_eq!(ScriptClass::from_script(&unknown_version), ScriptClass::NonStandard);

        let garbage = ScriptPublicKey::new(0, vec![OpTrue, OpTrue]);
        assert_eq!(ScriptClass::from_script(&garbage), ScriptClass::NonStandard);
    }

    #[test]
    fn test_address_script_round_trip() {
        for (version, len) in [(Version::PubKey, 32), (Version::PubKeyEcdsa, 33), (Version::ScriptHash, 32)] {
            let address = Address::new(Prefix::Mainnet, version, &vec![0x37; len]).unwrap();
            let script = pay_to_address_script(&address);
            let recovered = extract_script_pub_key_address(&script, Prefix::Mainnet).unwrap();
            assert_eq!(recovered, address);
        }
    }

    #[test]
    fn test_p2sh_script_shape() {
        let redeem = vec![OpTrue];
        let spk = pay_to_script_hash_script(&redeem);
        assert_eq!(spk.script().len(), 35);
        assert!(is_pay_to_script_hash(spk.script()));
        // BLAKE2b-256 of [OpTrue] committed in the middle.
        let hash = Blake2b256::digest(&redeem);
        assert_eq!(&spk.script()[2..34], hash.as_slice());
    }

    #[test]
    fn test_multisig_redeem_script_shape() {
        let keys = [[0xcc; 32], [0xaa; 32], [0xbb; 32]];
        let script = multisig_redeem_script(&keys, 2).unwrap();
        assert_eq!(script[0], Op2);
        // Keys are sorted into the script.
        assert_eq!(&script[2..34], [0xaa; 32].as_slice());
        assert_eq!(&script[35..67], [0xbb; 32].as_slice());
        assert_eq!(script[script.len() - 2], Op3);
        assert_eq!(script[script.len() - 1], OpCheckMultiSig);
    }

    #[test]
    fn test_sig_op_counting() {
        let p2pk = ScriptPublicKey::new(0, [&[OpData32][..], &[0x11; 32], &[OpCheckSig]].concat());
        assert_eq!(get_sig_op_count(&[], &p2pk), 1);

        // 2-of-3 multisig redeem script behind P2SH.
        let mut redeem = vec![Op2];
        for _ in 0..3 {
            redeem.push(OpData32);
            redeem.extend_from_slice(&[0x55; 32]);
        }
        redeem.push(Op3);
        redeem.push(OpCheckMultiSig);
        let spk = pay_to_script_hash_script(&redeem);
        let sig_script = pay_to_script_hash_signature_script(&redeem, &[0x01; 66]).unwrap();
        assert_eq!(get_sig_op_count(&sig_script, &spk), 3);
    }
}
