//! Instruction and mnemonic records.
//!
//! Instructions reference their mnemonic and operands by table index and
//! carry their encoded bytes verbatim. Addresses use implicit delta
//! sequencing: an instruction stores its address only when it does not
//! immediately follow its predecessor, and the first instruction of the
//! table always stores one.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A unique mnemonic literal, interned so hot mnemonics are stored once.
///
/// Producers should arrange for the most frequent mnemonic to land at index
/// 0, which encodes as an omitted field on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mnemonic {
    pub name: String,
}

impl Mnemonic {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A single disassembled instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instruction {
    /// Absolute address; stored only when the instruction does not start at
    /// `previous.address + previous.raw_bytes.len()`.
    pub address: Option<u64>,
    /// Addresses of the functions (tail-)called by this instruction.
    pub call_target: Vec<u64>,
    /// Index into the mnemonic table.
    pub mnemonic_index: u32,
    /// Indices into the operand table, in operand order.
    pub operand_index: Vec<u32>,
    /// Encoded bytes, verbatim.
    pub raw_bytes: Vec<u8>,
    /// Indices into the comment table.
    pub comment_index: Vec<u32>,
}

impl Instruction {
    /// Encoded length in bytes, the increment of the implicit address rule.
    pub fn byte_len(&self) -> u64 {
        self.raw_bytes.len() as u64
    }

    pub fn is_call(&self) -> bool {
        !self.call_target.is_empty()
    }
}
