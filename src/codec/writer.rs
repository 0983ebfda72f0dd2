//! Serialization: model to wire, omitting every default-valued field.
//!
//! Default omission is a format rule, not a compression nicety: readers
//! reconstruct absent fields as exactly their defaults, so the mapping here
//! and the one in the reader must stay inverses. Fields whose absence is
//! semantic (instruction addresses, expression parents, library load
//! addresses, vertex names) pass through as-is: a present zero is encoded.

use prost::Message;
use tracing::debug;

use crate::codec::{validate, wire};
use crate::core::annotation::CommentKind;
use crate::core::call_graph::VertexKind;
use crate::core::expression::ExpressionKind;
use crate::core::flow_graph::FlowEdgeKind;
use crate::core::graph::BinaryGraph;
use crate::error::Result;

/// Validate and serialize a graph into one length-delimited message.
pub fn encode(graph: &BinaryGraph) -> Result<Vec<u8>> {
    validate::validate(graph)?;
    let wire = lower(graph);
    let bytes = wire.encode_length_delimited_to_vec();
    debug!(
        instructions = graph.instruction.len(),
        bytes = bytes.len(),
        "encoded binary graph"
    );
    Ok(bytes)
}

fn opt_u64(value: u64) -> Option<u64> {
    (value != 0).then_some(value)
}

fn opt_index(value: u32) -> Option<i32> {
    (value != 0).then_some(value as i32)
}

fn opt_bool(value: bool) -> Option<bool> {
    value.then_some(true)
}

fn opt_string(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn indices(values: &[u32]) -> Vec<i32> {
    values.iter().map(|&value| value as i32).collect()
}

fn expression_type(kind: ExpressionKind) -> wire::ExpressionType {
    match kind {
        ExpressionKind::Symbol => wire::ExpressionType::Symbol,
        ExpressionKind::ImmediateInt => wire::ExpressionType::ImmediateInt,
        ExpressionKind::ImmediateFloat => wire::ExpressionType::ImmediateFloat,
        ExpressionKind::Operator => wire::ExpressionType::Operator,
        ExpressionKind::Register => wire::ExpressionType::Register,
        ExpressionKind::SizePrefix => wire::ExpressionType::SizePrefix,
        ExpressionKind::Dereference => wire::ExpressionType::Dereference,
    }
}

fn edge_type(kind: FlowEdgeKind) -> wire::FlowGraphEdgeType {
    match kind {
        FlowEdgeKind::ConditionTrue => wire::FlowGraphEdgeType::ConditionTrue,
        FlowEdgeKind::ConditionFalse => wire::FlowGraphEdgeType::ConditionFalse,
        FlowEdgeKind::Unconditional => wire::FlowGraphEdgeType::Unconditional,
        FlowEdgeKind::Switch => wire::FlowGraphEdgeType::Switch,
    }
}

fn vertex_type(kind: VertexKind) -> wire::VertexType {
    match kind {
        VertexKind::Normal => wire::VertexType::Normal,
        VertexKind::Library => wire::VertexType::Library,
        VertexKind::Imported => wire::VertexType::Imported,
        VertexKind::Thunk => wire::VertexType::Thunk,
        VertexKind::Invalid => wire::VertexType::Invalid,
    }
}

fn comment_type(kind: CommentKind) -> wire::CommentType {
    match kind {
        CommentKind::Plain => wire::CommentType::Plain,
        CommentKind::Anterior => wire::CommentType::Anterior,
        CommentKind::Posterior => wire::CommentType::Posterior,
        CommentKind::Function => wire::CommentType::Function,
        CommentKind::Enumeration => wire::CommentType::Enumeration,
        CommentKind::Location => wire::CommentType::Location,
        CommentKind::GlobalReference => wire::CommentType::GlobalReference,
        CommentKind::LocalReference => wire::CommentType::LocalReference,
        CommentKind::Structure => wire::CommentType::Structure,
    }
}

pub(crate) fn lower(graph: &BinaryGraph) -> wire::BinaryGraph {
    let meta_information = (!graph.meta.is_empty()).then(|| wire::Meta {
        executable_name: graph.meta.executable_name.clone(),
        executable_id: graph.meta.executable_id.clone(),
        architecture_name: graph.meta.architecture_name.clone(),
        timestamp: graph.meta.timestamp,
    });

    let expression = graph
        .expression
        .iter()
        .map(|expression| wire::Expression {
            r#type: (expression.kind != ExpressionKind::ImmediateInt)
                .then(|| expression_type(expression.kind) as i32),
            symbol: expression.symbol.clone(),
            immediate: expression.immediate,
            parent_index: expression.parent_index.map(|parent| parent as i32),
            is_relocation: opt_bool(expression.is_relocation),
        })
        .collect();

    let operand = graph
        .operand
        .iter()
        .map(|operand| wire::Operand {
            expression_index: indices(&operand.expression_index),
        })
        .collect();

    let mnemonic = graph
        .mnemonic
        .iter()
        .map(|mnemonic| wire::Mnemonic {
            name: opt_string(&mnemonic.name),
        })
        .collect();

    let instruction = graph
        .instruction
        .iter()
        .map(|insn| wire::Instruction {
            address: insn.address,
            call_target: insn.call_target.clone(),
            mnemonic_index: opt_index(insn.mnemonic_index),
            operand_index: indices(&insn.operand_index),
            raw_bytes: (!insn.raw_bytes.is_empty()).then(|| insn.raw_bytes.clone()),
            comment_index: indices(&insn.comment_index),
        })
        .collect();

    let basic_block = graph
        .basic_block
        .iter()
        .map(|block| wire::BasicBlock {
            instruction_index: block
                .instruction_index
                .iter()
                .map(|range| wire::IndexRange {
                    begin_index: opt_index(range.begin),
                    end_index: (range.end != range.begin + 1).then_some(range.end as i32),
                })
                .collect(),
        })
        .collect();

    let flow_graph = graph
        .flow_graph
        .iter()
        .map(|flow| wire::FlowGraph {
            basic_block_index: indices(&flow.basic_block_index),
            edge: flow
                .edges
                .iter()
                .map(|edge| wire::FlowGraphEdge {
                    source_basic_block_index: opt_index(edge.source),
                    target_basic_block_index: opt_index(edge.target),
                    r#type: (edge.kind != FlowEdgeKind::Unconditional)
                        .then(|| edge_type(edge.kind) as i32),
                    is_back_edge: opt_bool(edge.is_back_edge),
                })
                .collect(),
            entry_basic_block_index: opt_index(flow.entry_block),
        })
        .collect();

    let call_graph = (!graph.call_graph.vertex.is_empty() || !graph.call_graph.edge.is_empty())
        .then(|| wire::CallGraph {
            vertex: graph
                .call_graph
                .vertex
                .iter()
                .map(|vertex| wire::Vertex {
                    address: opt_u64(vertex.address),
                    r#type: (vertex.kind != VertexKind::Normal)
                        .then(|| vertex_type(vertex.kind) as i32),
                    mangled_name: vertex.mangled_name.clone(),
                    demangled_name: vertex.demangled_name.clone(),
                    library_index: vertex.library_index.map(|library| library as i32),
                    module_index: vertex.module_index.map(|module| module as i32),
                })
                .collect(),
            edge: graph
                .call_graph
                .edge
                .iter()
                .map(|edge| wire::CallGraphEdge {
                    source_vertex_index: opt_index(edge.source_vertex_index),
                    target_vertex_index: opt_index(edge.target_vertex_index),
                })
                .collect(),
        });

    let comment = graph
        .comment
        .iter()
        .map(|comment| wire::Comment {
            instruction_index: opt_index(comment.instruction_index),
            instruction_operand_index: opt_index(comment.instruction_operand_index),
            operand_expression_index: opt_index(comment.operand_expression_index),
            string_table_index: opt_index(comment.string_table_index),
            repeatable: opt_bool(comment.repeatable),
            r#type: (comment.kind != CommentKind::Plain)
                .then(|| comment_type(comment.kind) as i32),
        })
        .collect();

    let string_reference = graph
        .string_reference
        .iter()
        .map(|reference| wire::Reference {
            instruction_index: opt_index(reference.instruction_index),
            instruction_operand_index: opt_index(reference.instruction_operand_index),
            operand_expression_index: opt_index(reference.operand_expression_index),
            string_table_index: opt_index(reference.string_table_index),
        })
        .collect();

    let expression_substitution = graph
        .expression_substitution
        .iter()
        .map(|substitution| wire::ExpressionSubstitution {
            instruction_index: opt_index(substitution.instruction_index),
            operand_index: opt_index(substitution.operand_index),
            expression_index: opt_index(substitution.expression_index),
            replacement_string_table_index: opt_index(
                substitution.replacement_string_table_index,
            ),
        })
        .collect();

    let section = graph
        .section
        .iter()
        .map(|section| wire::Section {
            address: opt_u64(section.address),
            size: opt_u64(section.size),
            flag_r: opt_bool(section.flag_r),
            flag_w: opt_bool(section.flag_w),
            flag_x: opt_bool(section.flag_x),
        })
        .collect();

    let library = graph
        .library
        .iter()
        .map(|library| wire::Library {
            name: opt_string(&library.name),
            is_static: opt_bool(library.is_static),
            load_address: library.load_address,
        })
        .collect();

    let data_reference = graph
        .data_reference
        .iter()
        .map(|reference| wire::DataReference {
            instruction_index: opt_index(reference.instruction_index),
            address: opt_u64(reference.address),
        })
        .collect();

    let module = graph
        .module
        .iter()
        .map(|module| wire::Module {
            name: opt_string(&module.name),
        })
        .collect();

    let md_index = graph
        .md_index
        .iter()
        .map(|record| wire::MdIndex {
            key: opt_string(&record.key),
            payload: (!record.payload.is_empty()).then(|| record.payload.clone()),
        })
        .collect();

    wire::BinaryGraph {
        meta_information,
        expression,
        operand,
        mnemonic,
        instruction,
        basic_block,
        flow_graph,
        call_graph,
        string_table: graph.string_table.clone(),
        comment,
        string_reference,
        expression_substitution,
        section,
        library,
        data_reference,
        module,
        md_index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::instruction::{Instruction, Mnemonic};

    #[test]
    fn test_default_fields_are_omitted() {
        let mut graph = BinaryGraph::new();
        graph.mnemonic.push(Mnemonic::new("mov"));
        graph.instruction.push(Instruction {
            address: Some(0x1000),
            call_target: Vec::new(),
            mnemonic_index: 0,
            operand_index: Vec::new(),
            raw_bytes: vec![0x90],
            comment_index: Vec::new(),
        });
        let wire = lower(&graph);
        // Index 0 is the declared default and must not be stored.
        assert_eq!(wire.instruction[0].mnemonic_index, None);
        assert_eq!(wire.instruction[0].address, Some(0x1000));
        assert!(wire.meta_information.is_none());
        assert!(wire.call_graph.is_none());
    }

    #[test]
    fn test_single_instruction_range_omits_end() {
        use crate::core::basic_block::{BasicBlock, IndexRange};
        let mut graph = BinaryGraph::new();
        graph.mnemonic.push(Mnemonic::new("nop"));
        for i in 0..3u64 {
            graph.instruction.push(Instruction {
                address: if i == 0 { Some(0x1000) } else { None },
                call_target: Vec::new(),
                mnemonic_index: 0,
                operand_index: Vec::new(),
                raw_bytes: vec![0x90],
                comment_index: Vec::new(),
            });
        }
        graph
            .basic_block
            .push(BasicBlock::new(vec![IndexRange::new(1, 2)]));
        graph
            .basic_block
            .push(BasicBlock::new(vec![IndexRange::new(0, 3)]));
        let wire = lower(&graph);
        let single = &wire.basic_block[0].instruction_index[0];
        assert_eq!(single.begin_index, Some(1));
        assert_eq!(single.end_index, None);
        let run = &wire.basic_block[1].instruction_index[0];
        assert_eq!(run.begin_index, None);
        assert_eq!(run.end_index, Some(3));
    }

    #[test]
    fn test_explicit_zero_address_is_kept() {
        let mut graph = BinaryGraph::new();
        graph.mnemonic.push(Mnemonic::new("nop"));
        graph.instruction.push(Instruction {
            address: Some(0),
            call_target: Vec::new(),
            mnemonic_index: 0,
            operand_index: Vec::new(),
            raw_bytes: vec![0x90],
            comment_index: Vec::new(),
        });
        let wire = lower(&graph);
        assert_eq!(wire.instruction[0].address, Some(0));
    }
}
