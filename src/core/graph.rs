//! The top-level interchange container.
//!
//! `BinaryGraph` owns every table; all cross-references are indices between
//! sibling tables, so the container moves as a unit and can be handed to a
//! consumer read-only after validation. Built incrementally by
//! [`crate::builder::GraphBuilder`], frozen at the serialization boundary.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::annotation::{Comment, DataReference, ExpressionSubstitution, StringReference};
use crate::core::basic_block::BasicBlock;
use crate::core::call_graph::CallGraph;
use crate::core::expression::{Expression, Operand};
use crate::core::flow_graph::FlowGraph;
use crate::core::instruction::{Instruction, Mnemonic};
use crate::core::section::{Library, MdIndex, Module, Section};
use crate::error::{BinGraphError, Result, Table};

/// Provenance of the exported binary.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Meta {
    /// Input file name, without path.
    pub executable_name: Option<String>,
    /// Stable content identifier, typically a hash of the input.
    pub executable_id: Option<String>,
    /// Producer-defined architecture label, e.g. `x86-64`.
    pub architecture_name: Option<String>,
    /// Export time, seconds since the epoch.
    pub timestamp: Option<i64>,
}

impl Meta {
    pub fn is_empty(&self) -> bool {
        self.executable_name.is_none()
            && self.executable_id.is_none()
            && self.architecture_name.is_none()
            && self.timestamp.is_none()
    }
}

/// The decoded/encoded model: every table of the interchange format.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BinaryGraph {
    pub meta: Meta,
    pub expression: Vec<Expression>,
    pub operand: Vec<Operand>,
    pub mnemonic: Vec<Mnemonic>,
    pub instruction: Vec<Instruction>,
    pub basic_block: Vec<BasicBlock>,
    pub flow_graph: Vec<FlowGraph>,
    pub call_graph: CallGraph,
    pub string_table: Vec<String>,
    pub comment: Vec<Comment>,
    pub string_reference: Vec<StringReference>,
    pub expression_substitution: Vec<ExpressionSubstitution>,
    pub section: Vec<Section>,
    pub library: Vec<Library>,
    pub data_reference: Vec<DataReference>,
    pub module: Vec<Module>,
    pub md_index: Vec<MdIndex>,
}

impl BinaryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absolute address of every instruction, derived from the implicit
    /// sequencing rule: an absent address means the instruction starts where
    /// its predecessor ended.
    ///
    /// Fails if the first instruction does not carry an explicit address.
    pub fn instruction_addresses(&self) -> Result<Vec<u64>> {
        let mut addresses = Vec::with_capacity(self.instruction.len());
        let mut next = 0u64;
        for (index, insn) in self.instruction.iter().enumerate() {
            let address = match insn.address {
                Some(address) => address,
                None if index == 0 => {
                    return Err(BinGraphError::integrity(
                        Table::Instruction,
                        0,
                        "address",
                        "first instruction must carry an explicit address",
                    ));
                }
                None => next,
            };
            addresses.push(address);
            next = address.wrapping_add(insn.byte_len());
        }
        Ok(addresses)
    }

    /// Address of a basic block: the address of its first instruction.
    pub fn basic_block_address(&self, block_index: u32, addresses: &[u64]) -> Option<u64> {
        let block = self.basic_block.get(block_index as usize)?;
        let first = block.first_instruction()?;
        addresses.get(first as usize).copied()
    }

    /// Run the full index-integrity pass over this graph.
    pub fn validate(&self) -> Result<()> {
        crate::codec::validate::validate(self)
    }

    /// Mnemonic text of an instruction, if both indices resolve.
    pub fn instruction_mnemonic(&self, instruction_index: u32) -> Option<&str> {
        let insn = self.instruction.get(instruction_index as usize)?;
        self.mnemonic
            .get(insn.mnemonic_index as usize)
            .map(|mnemonic| mnemonic.name.as_str())
    }
}

impl fmt::Display for BinaryGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BinaryGraph(instructions={}, blocks={}, flow_graphs={}, vertices={}, strings={})",
            self.instruction.len(),
            self.basic_block.len(),
            self.flow_graph.len(),
            self.call_graph.vertex_count(),
            self.string_table.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insn(address: Option<u64>, raw_bytes: Vec<u8>) -> Instruction {
        Instruction {
            address,
            call_target: Vec::new(),
            mnemonic_index: 0,
            operand_index: Vec::new(),
            raw_bytes,
            comment_index: Vec::new(),
        }
    }

    #[test]
    fn test_addresses_accumulate_over_byte_lengths() {
        let mut graph = BinaryGraph::new();
        graph.mnemonic.push(Mnemonic::new("nop"));
        graph.instruction.push(insn(Some(0x1000), vec![0x90]));
        graph.instruction.push(insn(None, vec![0x90, 0x90]));
        graph.instruction.push(insn(None, vec![0x90]));
        // Gap: explicit address restarts the accumulation.
        graph.instruction.push(insn(Some(0x2000), vec![0x90]));
        graph.instruction.push(insn(None, vec![0x90]));

        let addresses = graph.instruction_addresses().unwrap();
        assert_eq!(addresses, vec![0x1000, 0x1001, 0x1003, 0x2000, 0x2001]);
    }

    #[test]
    fn test_first_instruction_requires_address() {
        let mut graph = BinaryGraph::new();
        graph.instruction.push(insn(None, vec![0x90]));
        let err = graph.instruction_addresses().unwrap_err();
        assert!(matches!(
            err,
            BinGraphError::DataIntegrity {
                table: Table::Instruction,
                index: 0,
                field: "address",
                ..
            }
        ));
    }

    #[test]
    fn test_empty_graph_has_no_addresses() {
        let graph = BinaryGraph::new();
        assert!(graph.instruction_addresses().unwrap().is_empty());
    }

    #[test]
    fn test_serde_round_trip_preserves_structure() {
        let mut graph = BinaryGraph::new();
        graph.meta.executable_name = Some("sample.bin".to_string());
        graph.mnemonic.push(Mnemonic::new("ret"));
        graph.instruction.push(insn(Some(0x40_0000), vec![0xc3]));
        let json = serde_json::to_string(&graph).unwrap();
        let back: BinaryGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(graph, back);
    }
}
