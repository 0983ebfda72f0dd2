//! Full index-integrity validation over a [`BinaryGraph`].
//!
//! Run on every decode before a caller sees the graph, and again before
//! encode. Checks are exhaustive and fail-whole: no index is ever exposed to
//! a consumer without having been proven in-bounds here, and no violation is
//! ever repaired or skipped.

use std::collections::HashSet;

use crate::core::graph::BinaryGraph;
use crate::error::{BinGraphError, Result, Table};
use crate::intern::MAX_TABLE_LEN;

/// Out-of-bounds index error with a uniform reason string.
fn bad_index(
    table: Table,
    record: usize,
    field: &'static str,
    index: u32,
    target: Table,
    target_len: usize,
) -> BinGraphError {
    BinGraphError::integrity(
        table,
        record,
        field,
        format!("index {index} out of bounds for {target} table of length {target_len}"),
    )
}

fn ensure_index(
    table: Table,
    record: usize,
    field: &'static str,
    index: u32,
    target: Table,
    target_len: usize,
) -> Result<()> {
    if (index as usize) < target_len {
        Ok(())
    } else {
        Err(bad_index(table, record, field, index, target, target_len))
    }
}

pub fn validate(graph: &BinaryGraph) -> Result<()> {
    check_capacities(graph)?;
    check_expressions(graph)?;
    check_operands(graph)?;
    check_instructions(graph)?;
    let addresses = graph.instruction_addresses()?;
    check_basic_blocks(graph)?;
    check_flow_graphs(graph, &addresses)?;
    check_call_graph(graph)?;
    check_annotations(graph)?;
    Ok(())
}

fn check_capacities(graph: &BinaryGraph) -> Result<()> {
    let lengths = [
        (Table::StringTable, graph.string_table.len()),
        (Table::Expression, graph.expression.len()),
        (Table::Operand, graph.operand.len()),
        (Table::Mnemonic, graph.mnemonic.len()),
        (Table::Instruction, graph.instruction.len()),
        (Table::BasicBlock, graph.basic_block.len()),
        (Table::FlowGraph, graph.flow_graph.len()),
        (Table::CallGraphVertex, graph.call_graph.vertex.len()),
        (Table::Comment, graph.comment.len()),
        (Table::StringReference, graph.string_reference.len()),
        (
            Table::ExpressionSubstitution,
            graph.expression_substitution.len(),
        ),
        (Table::DataReference, graph.data_reference.len()),
        (Table::Section, graph.section.len()),
        (Table::Library, graph.library.len()),
        (Table::Module, graph.module.len()),
    ];
    for (table, len) in lengths {
        if len > MAX_TABLE_LEN {
            return Err(BinGraphError::CapacityExceeded {
                table,
                limit: MAX_TABLE_LEN,
            });
        }
    }
    Ok(())
}

fn check_expressions(graph: &BinaryGraph) -> Result<()> {
    for (record, expression) in graph.expression.iter().enumerate() {
        if let Some(parent) = expression.parent_index {
            ensure_index(
                Table::Expression,
                record,
                "parent_index",
                parent,
                Table::Expression,
                graph.expression.len(),
            )?;
        }
    }
    Ok(())
}

/// Per operand: indices resolve, the distinct member set has exactly one
/// parentless node, every parent is a member, and parent chains terminate.
/// Duplicate list entries are legal (identical siblings share one node).
fn check_operands(graph: &BinaryGraph) -> Result<()> {
    let mut members = HashSet::new();
    for (record, operand) in graph.operand.iter().enumerate() {
        if operand.expression_index.is_empty() {
            return Err(BinGraphError::integrity(
                Table::Operand,
                record,
                "expression_index",
                "operand has no expressions",
            ));
        }
        members.clear();
        for &index in &operand.expression_index {
            ensure_index(
                Table::Operand,
                record,
                "expression_index",
                index,
                Table::Expression,
                graph.expression.len(),
            )?;
            members.insert(index);
        }

        let mut roots = 0usize;
        for &index in &members {
            let expression = &graph.expression[index as usize];
            match expression.parent_index {
                None => roots += 1,
                Some(parent) => {
                    if !members.contains(&parent) {
                        return Err(BinGraphError::integrity(
                            Table::Operand,
                            record,
                            "expression_index",
                            format!(
                                "expression {index} has parent {parent} outside this operand"
                            ),
                        ));
                    }
                }
            }
        }
        if roots != 1 {
            return Err(BinGraphError::integrity(
                Table::Operand,
                record,
                "expression_index",
                format!("operand has {roots} parentless expressions, expected exactly 1"),
            ));
        }

        // Parent chains must reach the root within |members| steps.
        for &start in &members {
            let mut cursor = start;
            let mut steps = 0usize;
            while let Some(parent) = graph.expression[cursor as usize].parent_index {
                cursor = parent;
                steps += 1;
                if steps > members.len() {
                    return Err(BinGraphError::integrity(
                        Table::Operand,
                        record,
                        "expression_index",
                        format!("expression {start} is part of a parent cycle"),
                    ));
                }
            }
        }
    }
    Ok(())
}

fn check_instructions(graph: &BinaryGraph) -> Result<()> {
    for (record, insn) in graph.instruction.iter().enumerate() {
        ensure_index(
            Table::Instruction,
            record,
            "mnemonic_index",
            insn.mnemonic_index,
            Table::Mnemonic,
            graph.mnemonic.len(),
        )?;
        for &operand in &insn.operand_index {
            ensure_index(
                Table::Instruction,
                record,
                "operand_index",
                operand,
                Table::Operand,
                graph.operand.len(),
            )?;
        }
        for &comment in &insn.comment_index {
            ensure_index(
                Table::Instruction,
                record,
                "comment_index",
                comment,
                Table::Comment,
                graph.comment.len(),
            )?;
        }
    }
    Ok(())
}

fn check_basic_blocks(graph: &BinaryGraph) -> Result<()> {
    let instruction_len = graph.instruction.len();
    for (record, block) in graph.basic_block.iter().enumerate() {
        if block.instruction_index.is_empty() {
            return Err(BinGraphError::integrity(
                Table::BasicBlock,
                record,
                "instruction_index",
                "basic block has no instruction ranges",
            ));
        }
        for range in &block.instruction_index {
            if range.begin >= range.end {
                return Err(BinGraphError::integrity(
                    Table::BasicBlock,
                    record,
                    "instruction_index",
                    format!("empty or inverted range {range}"),
                ));
            }
            if range.end as usize > instruction_len {
                return Err(BinGraphError::integrity(
                    Table::BasicBlock,
                    record,
                    "instruction_index",
                    format!(
                        "range {range} exceeds instruction table of length {instruction_len}"
                    ),
                ));
            }
        }
    }
    Ok(())
}

fn check_flow_graphs(graph: &BinaryGraph, addresses: &[u64]) -> Result<()> {
    for (record, flow) in graph.flow_graph.iter().enumerate() {
        if flow.basic_block_index.is_empty() {
            return Err(BinGraphError::integrity(
                Table::FlowGraph,
                record,
                "basic_block_index",
                "flow graph has no basic blocks",
            ));
        }

        let mut seen = HashSet::with_capacity(flow.basic_block_index.len());
        let mut previous_address = None;
        for &block in &flow.basic_block_index {
            ensure_index(
                Table::FlowGraph,
                record,
                "basic_block_index",
                block,
                Table::BasicBlock,
                graph.basic_block.len(),
            )?;
            if !seen.insert(block) {
                return Err(BinGraphError::integrity(
                    Table::FlowGraph,
                    record,
                    "basic_block_index",
                    format!("duplicate basic block {block}"),
                ));
            }
            // Block address: first instruction of the first range. Ranges
            // were bounds-checked above, so the lookups cannot miss.
            let address = graph
                .basic_block_address(block, addresses)
                .unwrap_or_default();
            if let Some(previous) = previous_address {
                if address < previous {
                    return Err(BinGraphError::integrity(
                        Table::FlowGraph,
                        record,
                        "basic_block_index",
                        format!(
                            "block {block} at {address:#x} breaks the ascending address order"
                        ),
                    ));
                }
            }
            previous_address = Some(address);
        }

        let member_count = flow.basic_block_index.len();
        if flow.entry_block as usize >= member_count {
            return Err(BinGraphError::integrity(
                Table::FlowGraph,
                record,
                "entry_basic_block_index",
                format!(
                    "position {} out of bounds for a member list of length {member_count}",
                    flow.entry_block
                ),
            ));
        }
        for edge in &flow.edges {
            for (field, position) in [("edge.source", edge.source), ("edge.target", edge.target)] {
                if position as usize >= member_count {
                    return Err(BinGraphError::integrity(
                        Table::FlowGraph,
                        record,
                        field,
                        format!(
                            "position {position} out of bounds for a member list of length {member_count}"
                        ),
                    ));
                }
            }
        }
    }
    Ok(())
}

fn check_call_graph(graph: &BinaryGraph) -> Result<()> {
    let vertices = &graph.call_graph.vertex;
    for (record, pair) in vertices.windows(2).enumerate() {
        if pair[0].address > pair[1].address {
            return Err(BinGraphError::OrderingViolation { index: record + 1 });
        }
    }
    for (record, vertex) in vertices.iter().enumerate() {
        if let Some(library) = vertex.library_index {
            ensure_index(
                Table::CallGraphVertex,
                record,
                "library_index",
                library,
                Table::Library,
                graph.library.len(),
            )?;
        }
        if let Some(module) = vertex.module_index {
            ensure_index(
                Table::CallGraphVertex,
                record,
                "module_index",
                module,
                Table::Module,
                graph.module.len(),
            )?;
        }
    }
    for (record, edge) in graph.call_graph.edge.iter().enumerate() {
        ensure_index(
            Table::CallGraphEdge,
            record,
            "source_vertex_index",
            edge.source_vertex_index,
            Table::CallGraphVertex,
            vertices.len(),
        )?;
        ensure_index(
            Table::CallGraphEdge,
            record,
            "target_vertex_index",
            edge.target_vertex_index,
            Table::CallGraphVertex,
            vertices.len(),
        )?;
    }
    Ok(())
}

/// Validate an `(instruction, operand position, expression position)`
/// location tuple. The zero positions are legal on an instruction with no
/// operands, standing for "the instruction itself".
fn check_location(
    graph: &BinaryGraph,
    table: Table,
    record: usize,
    instruction_index: u32,
    operand_position: u32,
    expression_position: u32,
) -> Result<()> {
    ensure_index(
        table,
        record,
        "instruction_index",
        instruction_index,
        Table::Instruction,
        graph.instruction.len(),
    )?;
    let insn = &graph.instruction[instruction_index as usize];
    if insn.operand_index.is_empty() {
        if operand_position != 0 || expression_position != 0 {
            return Err(BinGraphError::integrity(
                table,
                record,
                "instruction_operand_index",
                format!("position {operand_position} on an instruction with no operands"),
            ));
        }
        return Ok(());
    }
    let Some(&operand_index) = insn.operand_index.get(operand_position as usize) else {
        return Err(BinGraphError::integrity(
            table,
            record,
            "instruction_operand_index",
            format!(
                "position {operand_position} out of bounds for an instruction with {} operands",
                insn.operand_index.len()
            ),
        ));
    };
    // In-bounds per check_instructions, which runs first.
    let operand = &graph.operand[operand_index as usize];
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

fn check_annotations(graph: &BinaryGraph) -> Result<()> {
    let strings = graph.string_table.len();
    for (record, comment) in graph.comment.iter().enumerate() {
        check_location(
            graph,
            Table::Comment,
            record,
            comment.instruction_index,
            comment.instruction_operand_index,
            comment.operand_expression_index,
        )?;
        ensure_index(
            Table::Comment,
            record,
            "string_table_index",
            comment.string_table_index,
            Table::StringTable,
            strings,
        )?;
    }
    for (record, reference) in graph.string_reference.iter().enumerate() {
        check_location(
            graph,
            Table::StringReference,
            record,
            reference.instruction_index,
            reference.instruction_operand_index,
            reference.operand_expression_index,
        )?;
        ensure_index(
            Table::StringReference,
            record,
            "string_table_index",
            reference.string_table_index,
            Table::StringTable,
            strings,
        )?;
    }
    for (record, substitution) in graph.expression_substitution.iter().enumerate() {
        check_location(
            graph,
            Table::ExpressionSubstitution,
            record,
            substitution.instruction_index,
            substitution.operand_index,
            0,
        )?;
        ensure_index(
            Table::ExpressionSubstitution,
            record,
            "expression_index",
            substitution.expression_index,
            Table::Expression,
            graph.expression.len(),
        )?;
        ensure_index(
            Table::ExpressionSubstitution,
            record,
            "replacement_string_table_index",
            substitution.replacement_string_table_index,
            Table::StringTable,
            strings,
        )?;
    }
    for (record, reference) in graph.data_reference.iter().enumerate() {
        ensure_index(
            Table::DataReference,
            record,
            "instruction_index",
            reference.instruction_index,
            Table::Instruction,
            graph.instruction.len(),
        )?;
    }
    Ok(())
}
