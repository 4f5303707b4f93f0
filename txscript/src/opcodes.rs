// Opcode byte table, script parsing and opcode classification.
use crate::error::TxScriptError;

/// Opcode byte constants. Names follow the network's opcode vocabulary.
#[allow(non_upper_case_globals)]
pub mod codes {
    pub const OpFalse: u8 = 0x00;
    pub const OpData1: u8 = 0x01;
    pub const OpData32: u8 = 0x20;
    pub const OpData33: u8 = 0x21;
    pub const OpData75: u8 = 0x4b;
    pub const OpPushData1: u8 = 0x4c;
    pub const OpPushData2: u8 = 0x4d;
    pub const OpPushData4: u8 = 0x4e;
    pub const Op1Negate: u8 = 0x4f;
    pub const OpReserved: u8 = 0x50;
    pub const OpTrue: u8 = 0x51;
    pub const Op1: u8 = 0x51;
    pub const Op2: u8 = 0x52;
    pub const Op3: u8 = 0x53;
    pub const Op4: u8 = 0x54;
    pub const Op5: u8 = 0x55;
    pub const Op6: u8 = 0x56;
    pub const Op7: u8 = 0x57;
    pub const Op8: u8 = 0x58;
    pub const Op9: u8 = 0x59;
    pub const Op10: u8 = 0x5a;
    pub const Op11: u8 = 0x5b;
    pub const Op12: u8 = 0x5c;
    pub const Op13: u8 = 0x5d;
    pub const Op14: u8 = 0x5e;
    pub const Op15: u8 = 0x5f;
    pub const Op16: u8 = 0x60;
    pub const OpNop: u8 = 0x61;
    pub const OpVer: u8 = 0x62;
    pub const OpIf: u8 = 0x63;
    pub const OpNotIf: u8 = 0x64;
    pub const OpVerIf: u8 = 0x65;
    pub const OpVerNotIf: u8 = 0x66;
    pub const OpElse: u8 = 0x67;
    pub const OpEndIf: u8 = 0x68;
    pub const OpVerify: u8 = 0x69;
    pub const OpReturn: u8 = 0x6a;
    pub const OpToAltStack: u8 = 0x6b;
    pub const OpFromAltStack: u8 = 0x6c;
    pub const Op2Drop: u8 = 0x6d;
    pub const Op2Dup: u8 = 0x6e;
    pub const Op3Dup: u8 = 0x6f;
    pub const Op2Over: u8 = 0x70;
    pub const Op2Rot: u8 = 0x71;
    pub const Op2Swap: u8 = 0x72;
    pub const OpIfDup: u8 = 0x73;
    pub const OpDepth: u8 = 0x74;
    pub const OpDrop: u8 = 0x75;
    pub const OpDup: u8 = 0x76;
    pub const OpNip: u8 = 0x77;
    pub const OpOver: u8 = 0x78;
    pub const OpPick: u8 = 0x79;
    pub const OpRoll: u8 = 0x7a;
    pub const OpRot: u8 = 0x7b;
    pub const OpSwap: u8 = 0x7c;
    pub const OpTuck: u8 = 0x7d;
    pub const OpCat: u8 = 0x7e;
    pub const OpSubStr: u8 = 0x7f;
    pub const OpLeft: u8 = 0x80;
    pub const OpRight: u8 = 0x81;
    pub const OpSize: u8 = 0x82;
    pub const OpInvert: u8 = 0x83;
    pub const OpAnd: u8 = 0x84;
    pub const OpOr: u8 = 0x85;
    pub const OpXor: u8 = 0x86;
    pub const OpEqual: u8 = 0x87;
    pub const OpEqualVerify: u8 = 0x88;
    pub const OpReserved1: u8 = 0x89;
    pub const OpReserved2: u8 = 0x8a;
    pub const Op1Add: u8 = 0x8b;
    pub const Op1Sub: u8 = 0x8c;
    pub const Op2Mul: u8 = 0x8d;
    pub const Op2Div: u8 = 0x8e;
    pub const OpNegate: u8 = 0x8f;
    pub const OpAbs: u8 = 0x90;
    pub const OpNot: u8 = 0x91;
    pub const Op0NotEqual: u8 = 0x92;
    pub const OpAdd: u8 = 0x93;
    pub const OpSub: u8 = 0x94;
    pub const OpMul: u8 = 0x95;
    pub const OpDiv: u8 = 0x96;
    pub const OpMod: u8 = 0x97;
    pub const OpLShift: u8 = 0x98;
    pub const OpRShift: u8 = 0x99;
    pub const OpBoolAnd: u8 = 0x9a;
    pub const OpBoolOr: u8 = 0x9b;
    pub const OpNumEqual: u8 = 0x9c;
    pub const OpNumEqualVerify: u8 = 0x9d;
    pub const OpNumNotEqual: u8 = 0x9e;
    pub const OpLessThan: u8 = 0x9f;
    pub const OpGreaterThan: u8 = 0xa0;
    pub const OpLessThanOrEqual: u8 = 0xa1;
    pub const OpGreaterThanOrEqual: u8 = 0xa2;
    pub const OpMin: u8 = 0xa3;
    pub const OpMax: u8 = 0xa4;
    pub const OpWithin: u8 = 0xa5;
    pub const OpUnknown166: u8 = 0xa6;
    pub const OpUnknown167: u8 = 0xa7;
    pub const OpSHA256: u8 = 0xa8;
    pub const OpCheckMultiSigECDSA: u8 = 0xa9;
    pub const OpBlake2b: u8 = 0xaa;
    pub const OpCheckSigECDSA: u8 = 0xab;
    pub const OpCheckSig: u8 = 0xac;
    pub const OpCheckSigVerify: u8 = 0xad;
    pub const OpCheckMultiSig: u8 = 0xae;
    pub const OpCheckMultiSigVerify: u8 = 0xaf;
    pub const OpCheckLockTimeVerify: u8 = 0xb0;
    pub const OpCheckSequenceVerify: u8 = 0xb1;
    pub const OpTxVersion: u8 = 0xb2;
    pub const OpTxInputCount: u8 = 0xb3;
    pub const OpTxOutputCount: u8 = 0xb4;
    pub const OpTxLockTime: u8 = 0xb5;
    pub const OpTxSubnetId: u8 = 0xb6;
    pub const OpTxGas: u8 = 0xb7;
    pub const OpTxPayload: u8 = 0xb8;
    pub const OpTxInputIndex: u8 = 0xb9;
    pub const OpOutpointTxId: u8 = 0xba;
    pub const OpOutpointIndex: u8 = 0xbb;
    pub const OpTxInputScriptSig: u8 = 0xbc;
    pub const OpTxInputSeq: u8 = 0xbd;
    pub const OpTxInputAmount: u8 = 0xbe;
    pub const OpTxInputSpk: u8 = 0xbf;
    pub const OpTxInputBlockDaaScore: u8 = 0xc0;
    pub const OpTxInputIsCoinbase: u8 = 0xc1;
    pub const OpTxOutputAmount: u8 = 0xc2;
    pub const OpTxOutputSpk: u8 = 0xc3;
}

use codes::*;

/// A decoded opcode: its byte value and the data it pushes (empty for
/// non-push opcodes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedOpcode<'a> {
    pub code: u8,
    pub data: &'a [u8],
}

impl ParsedOpcode<'_> {
    /// Push opcodes are everything up to and including Op16.
    pub fn is_push(&self) -> bool {
        self.code <= Op16
    }

    /// Whether the opcode participates in conditional-flow bookkeeping and
    /// therefore executes even inside a skipped branch.
    pub fn is_conditional(&self) -> bool {
        (OpIf..=OpEndIf).contains(&self.code)
    }

    /// Disabled opcodes abort the script wherever they appear, including
    /// unexecuted branches.
    pub fn is_disabled(&self) -> bool {
        matches!(
            self.code,
            OpCat | OpSubStr | OpLeft | OpRight | OpInvert | OpAnd | OpOr | OpXor | Op2Mul | Op2Div | OpMul
                | OpDiv | OpMod | OpLShift | OpRShift
        )
    }

    /// Enforces the canonical-push rule: the value must use the shortest
    /// possible push opcode.
    pub fn check_minimal_data_push(&self) -> Result<(), TxScriptError> {
        let len = self.data.len();
        let minimal = match len {
            0 => self.code == OpFalse,
            1 if (1..=16).contains(&self.data[0]) => false, // must use Op1..Op16
            1 if self.data[0] == 0x81 => false,             // must use Op1Negate
            1..=75 => self.code == len as u8,
            76..=255 => self.code == OpPushData1,
            256..=65535 => self.code == OpPushData2,
            _ => self.code == OpPushData4,
        };
        if minimal {
            Ok(())
        } else {
            Err(TxScriptError::NotMinimalData(format!(
                "data of length {} pushed with opcode {:#04x}",
                len, self.code
            )))
        }
    }
}

/// Iterates over a script, decoding one opcode (with its payload) at a time.
pub struct ScriptIter<'a> {
    script: &'a [u8],
    offset: usize,
}

impl<'a> ScriptIter<'a> {
    pub fn new(script: &'a [u8]) -> Self {
        Self { script, offset: 0 }
    }

    fn take(&mut self, len: usize, code: u8) -> Result<&'a [u8], TxScriptError> {
        let remaining = self.script.len() - self.offset;
        if len > remaining {
            return Err(TxScriptError::MalformedPush(code, len, remaining));
        }
        let data = &self.script[self.offset..self.offset + len];
        self.offset += len;
        Ok(data)
    }
}

impl<'a> Iterator for ScriptIter<'a> {
    type Item = Result<ParsedOpcode<'a>, TxScriptError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.script.len() {
            return None;
        }
        let code = self.script[self.offset];
        self.offset += 1;

        let result = match code {
            OpData1..=OpData75 => self.take(code as usize, code),
            OpPushData1 => self
                .take(1, code)
                .and_then(|len| self.take(len[0] as usize, code)),
            OpPushData2 => self.take(2, code).and_then(|len| {
                self.take(u16::from_le_bytes([len[0], len[1]]) as usize, code)
            }),
            OpPushData4 => self.take(4, code).and_then(|len| {
                self.take(u32::from_le_bytes([len[0], len[1], len[2], len[3]]) as usize, code)
            }),
            _ => Ok(&self.script[self.offset..self.offset]),
        };
        Some(result.map(|data| ParsedOpcode { code, data }))
    }
}

/// Whether every opcode in the script is a push opcode. Signature scripts
/// must satisfy this.
pub fn is_push_only(script: &[u8]) -> Result<bool, TxScriptError> {
    for opcode in ScriptIter::new(script) {
        if !opcode?.is_push() {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Returns the data pushes of a push-only script, in order.
pub fn parse_push_only(script: &[u8]) -> Result<Vec<Vec<u8>>, TxScriptError> {
    let mut pushes = Vec::new();
    for opcode in ScriptIter::new(script) {
        let opcode = opcode?;
        if !opcode.is_push() {
            return Err(TxScriptError::SignatureScriptNotPushOnly);
        }
        pushes.push(push_value(&opcode));
    }
    Ok(pushes)
}

/// The stack value a push opcode produces.
pub fn push_value(opcode: &ParsedOpcode) -> Vec<u8> {
    match opcode.code {
        OpFalse => vec![],
        Op1Negate => vec![0x81],
        Op1..=Op16 => vec![opcode.code - Op1 + 1],
        OpReserved => vec![], // never executed, placeholder for push-only scans
        _ => opcode.data.to_vec(),
    }
}
