// Canonical byte-level script assembly.
use thiserror::Error;

use crate::data_stack::serialize_i64;
use crate::opcodes::codes::*;
use crate::{MAX_SCRIPTS_SIZE, MAX_SCRIPT_ELEMENT_SIZE};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptBuilderError {
    #[error("adding opcode {0:#04x} would exceed the maximum script size of {1}")]
    OpCodeRejected(u8, usize),

    #[error("adding {0} bytes of opcodes would exceed the maximum script size of {1}")]
    OpCodesRejected(usize, usize),

    #[error("adding {0} bytes of data would exceed the maximum script size of {1}")]
    DataRejected(usize, usize),

    #[error("data element of size {0} exceeds the maximum element size of {1}")]
    ElementExceedsMaxSize(usize, usize),
}

pub type ScriptBuilderResult<T> = Result<T, ScriptBuilderError>;

/// Assembles scripts while enforcing the canonical-push rules and the
/// overall script size limit.
#[derive(Debug, Default)]
pub struct ScriptBuilder {
    script: Vec<u8>,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        Self { script: Vec::new() }
    }

    pub fn script(&self) -> &[u8] {
        &self.script
    }

    /// Consumes the accumulated script.
    pub fn drain(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.script)
    }

    pub fn add_op(&mut self, opcode: u8) -> ScriptBuilderResult<&mut Self> {
        if self.script.len() + 1 > MAX_SCRIPTS_SIZE {
            return Err(ScriptBuilderError::OpCodeRejected(opcode, MAX_SCRIPTS_SIZE));
        }
        self.script.push(opcode);
        Ok(self)
    }

    pub fn add_ops(&mut self, opcodes: &[u8]) -> ScriptBuilderResult<&mut Self> {
        if self.script.len() + opcodes.len() > MAX_SCRIPTS_SIZE {
            return Err(ScriptBuilderError::OpCodesRejected(opcodes.len(), MAX_SCRIPTS_SIZE));
        }
        self.script.extend_from_slice(opcodes);
        Ok(self)
    }

    /// The serialized size of a canonical push of `data`.
    pub fn canonical_data_size(data: &[u8]) -> usize {
        let len = data.len();
        // Values that collapse to a single opcode carry no payload.
        if len == 0 || (len == 1 && (data[0] <= 16 || data[0] == 0x81)) {
            return 1;
        }
        len + if len <= OpData75 as usize {
            1
        } else if len <= u8::MAX as usize {
            2
        } else if len <= u16::MAX as usize {
            3
        } else {
            5
        }
    }

    /// Pushes data using the shortest encoding: empty and one-byte small
    /// values collapse to their dedicated opcodes, then OpData1..75,
    /// OpPushData1/2/4 by length.
    pub fn add_data(&mut self, data: &[u8]) -> ScriptBuilderResult<&mut Self> {
        let len = data.len();
        if len > MAX_SCRIPT_ELEMENT_SIZE {
            return Err(ScriptBuilderError::ElementExceedsMaxSize(len, MAX_SCRIPT_ELEMENT_SIZE));
        }
        if self.script.len() + Self::canonical_data_size(data) > MAX_SCRIPTS_SIZE {
            return Err(ScriptBuilderError::DataRejected(len, MAX_SCRIPTS_SIZE));
        }

        if len == 0 {
            self.script.push(OpFalse);
        } else if len == 1 && data[0] <= 16 {
            if data[0] == 0 {
                self.script.push(OpFalse);
            } else {
                self.script.push(Op1 + data[0] - 1);
            }
        } else if len == 1 && data[0] == 0x81 {
            self.script.push(Op1Negate);
        } else if len <= OpData75 as usize {
            self.script.push(len as u8);
            self.script.extend_from_slice(data);
        } else if len <= u8::MAX as usize {
            self.script.push(OpPushData1);
            self.script.push(len as u8);
            self.script.extend_from_slice(data);
        } else if len <= u16::MAX as usize {
            self.script.push(OpPushData2);
            self.script.extend_from_slice(&(len as u16).to_le_bytes());
            self.script.extend_from_slice(data);
        } else {
            self.script.push(OpPushData4);
            self.script.extend_from_slice(&(len as u32).to_le_bytes());
            self.script.extend_from_slice(data);
        }
        Ok(self)
    }

    /// Pushes an integer with minimal numeric encoding; 0, 1..16 and -1
    /// collapse to single opcodes.
    pub fn add_i64(&mut self, value: i64) -> ScriptBuilderResult<&mut Self> {
        if value == 0 {
            return self.add_op(OpFalse);
        }
        if value == -1 {
            return self.add_op(Op1Negate);
        }
        if (1..=16).contains(&value) {
            return self.add_op(Op1 + value as u8 - 1);
        }
        let bytes = serialize_i64(value);
        self.add_data(&bytes)
    }

    /// Pushes an unsigned 64-bit value (lock times and sequences), encoded
    /// as its minimal unsigned little-endian run.
    pub fn add_u64(&mut self, value: u64) -> ScriptBuilderResult<&mut Self> {
        if value <= i64::MAX as u64 {
            return self.add_i64(value as i64);
        }
        // Top bit occupied: the magnitude needs a trailing sign byte.
        let mut bytes: Vec<u8> = value.to_le_bytes().into();
        bytes.push(0);
        self.add_data(&bytes)
    }

    pub fn add_lock_time(&mut self, lock_time: u64) -> ScriptBuilderResult<&mut Self> {
        self.add_u64(lock_time)
    }

    pub fn add_sequence(&mut self, sequence: u64) -> ScriptBuilderResult<&mut Self> {
        self.add_u64(sequence)
    }
}
