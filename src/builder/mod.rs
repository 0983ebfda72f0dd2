//! Incremental graph assembly.
//!
//! [`GraphBuilder`] owns the interning tables and the growing record tables,
//! and keeps the format invariants true by construction: implicit instruction
//! addressing, minimal basic-block ranges, sorted flow-graph members with
//! computed back edges, and the two-pass call graph. `finish` freezes
//! everything into a [`BinaryGraph`].

pub mod call_graph;
pub(crate) mod dominator;
pub mod expression;
pub mod flow_graph;

pub use call_graph::CallGraphBuilder;
pub use expression::{ExprId, ExprNode, OperandBuilder};
pub use flow_graph::Branch;

use tracing::debug;

use crate::core::annotation::{
    Comment, CommentKind, DataReference, ExpressionSubstitution, StringReference,
};
use crate::core::basic_block::{BasicBlock, IndexRange};
use crate::core::call_graph::Vertex;
use crate::core::expression::{Expression, Operand};
use crate::core::flow_graph::FlowGraph;
use crate::core::graph::{BinaryGraph, Meta};
use crate::core::instruction::{Instruction, Mnemonic};
use crate::core::section::{Library, MdIndex, Module, Section};
use crate::error::{BinGraphError, Result, Table};
use crate::intern::{Interner, MAX_TABLE_LEN};

/// Assembles a [`BinaryGraph`] from a disassembly producer's events.
pub struct GraphBuilder {
    meta: Meta,
    strings: Interner<String>,
    mnemonics: Interner<Mnemonic>,
    pub(crate) expressions: Interner<Expression>,
    pub(crate) operands: Interner<Operand>,
    basic_blocks: Interner<BasicBlock>,
    instructions: Vec<Instruction>,
    /// Resolved absolute address per instruction, the source of block
    /// addresses during flow-graph assembly.
    addresses: Vec<u64>,
    next_address: u64,
    flow_graphs: Vec<FlowGraph>,
    call_graph: CallGraphBuilder,
    comments: Vec<Comment>,
    string_references: Vec<StringReference>,
    expression_substitutions: Vec<ExpressionSubstitution>,
    data_references: Vec<DataReference>,
    sections: Vec<Section>,
    libraries: Vec<Library>,
    modules: Vec<Module>,
    md_indexes: Vec<MdIndex>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            meta: Meta::default(),
            strings: Interner::new(Table::StringTable),
            mnemonics: Interner::new(Table::Mnemonic),
            expressions: Interner::new(Table::Expression),
            operands: Interner::new(Table::Operand),
            basic_blocks: Interner::new(Table::BasicBlock),
            instructions: Vec::new(),
            addresses: Vec::new(),
            next_address: 0,
            flow_graphs: Vec::new(),
            call_graph: CallGraphBuilder::new(),
            comments: Vec::new(),
            string_references: Vec::new(),
            expression_substitutions: Vec::new(),
            data_references: Vec::new(),
            sections: Vec::new(),
            libraries: Vec::new(),
            modules: Vec::new(),
            md_indexes: Vec::new(),
        }
    }

    pub fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }

    /// Pre-populate the mnemonic table so the hottest mnemonics land at the
    /// smallest indices; index 0 encodes as an omitted field on the wire.
    pub fn seed_mnemonics<I, S>(&mut self, mnemonics: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in mnemonics {
            self.mnemonics.intern(Mnemonic::new(name))?;
        }
        Ok(())
    }

    /// Intern a string-table entry, e.g. annotation text.
    pub fn intern_string(&mut self, value: impl Into<String>) -> Result<u32> {
        self.strings.intern(value.into())
    }

    /// Start building one operand's expression tree.
    pub fn operand(&mut self) -> OperandBuilder<'_> {
        OperandBuilder::new(self)
    }

    /// Append one instruction, storing its address only when it does not
    /// immediately follow its predecessor. Raw bytes are kept verbatim.
    pub fn add_instruction(
        &mut self,
        address: u64,
        mnemonic: &str,
        operand_index: Vec<u32>,
        raw_bytes: Vec<u8>,
        call_target: Vec<u64>,
    ) -> Result<u32> {
        let record = self.instructions.len();
        if record >= MAX_TABLE_LEN {
            return Err(BinGraphError::CapacityExceeded {
                table: Table::Instruction,
                limit: MAX_TABLE_LEN,
            });
        }
        for &operand in &operand_index {
            if operand as usize >= self.operands.len() {
                return Err(BinGraphError::integrity(
                    Table::Instruction,
                    record,
                    "operand_index",
                    format!(
                        "index {operand} out of bounds for operand table of length {}",
                        self.operands.len()
                    ),
                ));
            }
        }
        let mnemonic_index = self.mnemonics.intern(Mnemonic::new(mnemonic))?;
        let stored_address = if record == 0 || address != self.next_address {
            Some(address)
        } else {
            None
        };
        self.next_address = address.wrapping_add(raw_bytes.len() as u64);
        self.addresses.push(address);
        self.instructions.push(Instruction {
            address: stored_address,
            call_target,
            mnemonic_index,
            operand_index,
            raw_bytes,
            comment_index: Vec::new(),
        });
        Ok(record as u32)
    }

    /// Group instructions into a basic block, compressing runs of contiguous
    /// indices into the minimal range list. Identical blocks intern to one
    /// table entry.
    pub fn add_basic_block(&mut self, instruction_indices: &[u32]) -> Result<u32> {
        let record = self.basic_blocks.len();
        if instruction_indices.is_empty() {
            return Err(BinGraphError::integrity(
                Table::BasicBlock,
                record,
                "instruction_index",
                "basic block has no instructions",
            ));
        }
        for &index in instruction_indices {
            if index as usize >= self.instructions.len() {
                return Err(BinGraphError::integrity(
                    Table::BasicBlock,
                    record,
                    "instruction_index",
                    format!(
                        "index {index} out of bounds for instruction table of length {}",
                        self.instructions.len()
                    ),
                ));
            }
        }
        let mut ranges: Vec<IndexRange> = Vec::new();
        for &index in instruction_indices {
            match ranges.last_mut() {
                Some(range) if range.end == index => range.end = index + 1,
                _ => ranges.push(IndexRange::new(index, index + 1)),
            }
        }
        self.basic_blocks.intern(BasicBlock::new(ranges))
    }

    /// Assemble one function's flow graph from member blocks and branches.
    pub fn add_flow_graph(
        &mut self,
        entry_address: u64,
        blocks: &[u32],
        branches: &[Branch],
    ) -> Result<u32> {
        let record = self.flow_graphs.len();
        if record >= MAX_TABLE_LEN {
            return Err(BinGraphError::CapacityExceeded {
                table: Table::FlowGraph,
                limit: MAX_TABLE_LEN,
            });
        }
        let mut members = Vec::with_capacity(blocks.len());
        for &block in blocks {
            let address = self
                .basic_blocks
                .get(block)
                .and_then(BasicBlock::first_instruction)
                .and_then(|first| self.addresses.get(first as usize).copied())
                .ok_or_else(|| {
                    BinGraphError::integrity(
                        Table::FlowGraph,
                        record,
                        "basic_block_index",
                        format!(
                            "index {block} out of bounds for basic_block table of length {}",
                            self.basic_blocks.len()
                        ),
                    )
                })?;
            members.push((block, address));
        }
        let graph = flow_graph::build(record, entry_address, &members, branches)?;
        self.flow_graphs.push(graph);
        Ok(record as u32)
    }

    /// Register a function vertex. First insertion per address wins.
    pub fn add_vertex(&mut self, vertex: Vertex) -> Result<()> {
        self.call_graph.add_vertex(vertex)
    }

    /// Record a call relationship between two function addresses.
    pub fn add_call(&mut self, source_address: u64, target_address: u64) -> Result<()> {
        self.call_graph.add_call(source_address, target_address)
    }

    /// Attach a comment to a code location and back-link it from the
    /// instruction.
    pub fn add_comment(
        &mut self,
        instruction_index: u32,
        operand_position: u32,
        expression_position: u32,
        text: &str,
        kind: CommentKind,
        repeatable: bool,
    ) -> Result<u32> {
        let record = self.comments.len();
        if record >= MAX_TABLE_LEN {
            return Err(BinGraphError::CapacityExceeded {
                table: Table::Comment,
                limit: MAX_TABLE_LEN,
            });
        }
        self.check_location(
            Table::Comment,
            record,
            instruction_index,
            operand_position,
            expression_position,
        )?;
        let string_table_index = self.strings.intern(text.to_string())?;
        self.comments.push(Comment {
            instruction_index,
            instruction_operand_index: operand_position,
            operand_expression_index: expression_position,
            string_table_index,
            repeatable,
            kind,
        });
        self.instructions[instruction_index as usize]
            .comment_index
            .push(record as u32);
        Ok(record as u32)
    }

    /// Tie a code location to a string-table entry.
    pub fn add_string_reference(
        &mut self,
        instruction_index: u32,
        operand_position: u32,
        expression_position: u32,
        text: &str,
    ) -> Result<u32> {
        let record = self.string_references.len();
        if record >= MAX_TABLE_LEN {
            return Err(BinGraphError::CapacityExceeded {
                table: Table::StringReference,
                limit: MAX_TABLE_LEN,
            });
        }
        self.check_location(
            Table::StringReference,
            record,
            instruction_index,
            operand_position,
            expression_position,
        )?;
        let string_table_index = self.strings.intern(text.to_string())?;
        self.string_references.push(StringReference {
            instruction_index,
            instruction_operand_index: operand_position,
            operand_expression_index: expression_position,
            string_table_index,
        });
        Ok(record as u32)
    }

    /// Record that an instruction touches a data address.
    pub fn add_data_reference(&mut self, instruction_index: u32, address: u64) -> Result<u32> {
        let record = self.data_references.len();
        if instruction_index as usize >= self.instructions.len() {
            return Err(BinGraphError::integrity(
                Table::DataReference,
                record,
                "instruction_index",
                format!(
                    "index {instruction_index} out of bounds for instruction table of length {}",
                    self.instructions.len()
                ),
            ));
        }
        self.data_references.push(DataReference {
            instruction_index,
            address,
        });
        Ok(record as u32)
    }

    /// Override the display text of one expression node at one location.
    pub fn add_expression_substitution(
        &mut self,
        instruction_index: u32,
        operand_position: u32,
        expression_index: u32,
        replacement: &str,
    ) -> Result<u32> {
        let record = self.expression_substitutions.len();
        self.check_location(
            Table::ExpressionSubstitution,
            record,
            instruction_index,
            operand_position,
            0,
        )?;
        if expression_index as usize >= self.expressions.len() {
            return Err(BinGraphError::integrity(
                Table::ExpressionSubstitution,
                record,
                "expression_index",
                format!(
                    "index {expression_index} out of bounds for expression table of length {}",
                    self.expressions.len()
                ),
            ));
        }
        let replacement_string_table_index = self.strings.intern(replacement.to_string())?;
        self.expression_substitutions.push(ExpressionSubstitution {
            instruction_index,
            operand_index: operand_position,
            expression_index,
            replacement_string_table_index,
        });
        Ok(record as u32)
    }

    pub fn add_section(&mut self, section: Section) -> u32 {
        let record = self.sections.len();
        self.sections.push(section);
        record as u32
    }

    pub fn add_library(&mut self, library: Library) -> Result<u32> {
        let record = self.libraries.len();
        if record >= MAX_TABLE_LEN {
            return Err(BinGraphError::CapacityExceeded {
                table: Table::Library,
                limit: MAX_TABLE_LEN,
            });
        }
        self.libraries.push(library);
        Ok(record as u32)
    }

    pub fn add_module(&mut self, module: Module) -> Result<u32> {
        let record = self.modules.len();
        if record >= MAX_TABLE_LEN {
            return Err(BinGraphError::CapacityExceeded {
                table: Table::Module,
                limit: MAX_TABLE_LEN,
            });
        }
        self.modules.push(module);
        Ok(record as u32)
    }

    /// Attach an opaque extension record; the payload is never interpreted.
    pub fn add_md_index(&mut self, key: impl Into<String>, payload: Vec<u8>) -> u32 {
        let record = self.md_indexes.len();
        self.md_indexes.push(MdIndex {
            key: key.into(),
            payload,
        });
        record as u32
    }

    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    /// Validate an `(instruction, operand position, expression position)`
    /// location tuple. Position 0 stands for "the whole instruction" when it
    /// has no operands.
    fn check_location(
        &self,
        table: Table,
        record: usize,
        instruction_index: u32,
        operand_position: u32,
        expression_position: u32,
    ) -> Result<()> {
        let insn = self.instructions.get(instruction_index as usize).ok_or_else(|| {
            BinGraphError::integrity(
                table,
                record,
                "instruction_index",
                format!(
                    "index {instruction_index} out of bounds for instruction table of length {}",
                    self.instructions.len()
                ),
            )
        })?;
        if insn.operand_index.is_empty() {
            if operand_position != 0 || expression_position != 0 {
                return Err(BinGraphError::integrity(
                    table,
                    record,
                    "instruction_operand_index",
                    format!(
                        "position {operand_position} on an instruction with no operands"
                    ),
                ));
            }
            return Ok(());
        }
        let operand = insn
            .operand_index
            .get(operand_position as usize)
            .and_then(|&index| self.operands.get(index))
            .ok_or_else(|| {
                BinGraphError::integrity(
                    table,
                    record,
                    "instruction_operand_index",
                    format!(
                        "position {operand_position} out of bounds for an instruction with {} operands",
                        insn.operand_index.len()
                    ),
                )
            })?;
        if expression_position as usize >= operand.expression_index.len() {
            return Err(BinGraphError::integrity(
                table,
                record,
                "operand_expression_index",
                format!(
                    "position {expression_position} out of bounds for an operand with {} nodes",
                    operand.expression_index.len()
                ),
            ));
        }
        Ok(())
    }

    /// Freeze the builder into a validated-by-construction graph: finalize
    /// the call graph, then move every table into the container.
    pub fn finish(mut self) -> Result<BinaryGraph> {
        let call_graph = self.call_graph.finalize();
        let graph = BinaryGraph {
            meta: self.meta,
            expression: self.expressions.into_values(),
            operand: self.operands.into_values(),
            mnemonic: self.mnemonics.into_values(),
            instruction: self.instructions,
            basic_block: self.basic_blocks.into_values(),
            flow_graph: self.flow_graphs,
            call_graph,
            string_table: self.strings.into_values(),
            comment: self.comments,
            string_reference: self.string_references,
            expression_substitution: self.expression_substitutions,
            section: self.sections,
            library: self.libraries,
            data_reference: self.data_references,
            module: self.modules,
            md_index: self.md_indexes,
        };
        debug!(
            instructions = graph.instruction.len(),
            basic_blocks = graph.basic_block.len(),
            flow_graphs = graph.flow_graph.len(),
            vertices = graph.call_graph.vertex_count(),
            "graph assembly finished"
        );
        Ok(graph)
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}
