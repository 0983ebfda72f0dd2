//! Deserialization: wire to model, restoring declared defaults.
//!
//! Lifting is the inverse of the writer's lowering: every absent field
//! becomes exactly its declared default, negative wire indices are rejected
//! on the spot, and unknown enum values are integrity violations. The lifted
//! graph then goes through the full validation pass before any caller sees
//! it; a corrupt or adversarial file is rejected wholesale.

use prost::Message;
use tracing::debug;

use crate::codec::{validate, wire};
use crate::core::annotation::{
    Comment, CommentKind, DataReference, ExpressionSubstitution, StringReference,
};
use crate::core::basic_block::{BasicBlock, IndexRange};
use crate::core::call_graph::{CallEdge, CallGraph, Vertex, VertexKind};
use crate::core::expression::{Expression, ExpressionKind, Operand};
use crate::core::flow_graph::{FlowEdge, FlowEdgeKind, FlowGraph};
use crate::core::graph::{BinaryGraph, Meta};
use crate::core::instruction::{Instruction, Mnemonic};
use crate::core::section::{Library, MdIndex, Module, Section};
use crate::error::{BinGraphError, Result, Table};

/// Parse one length-delimited message and validate the whole graph.
pub fn decode(bytes: &[u8]) -> Result<BinaryGraph> {
    let wire = wire::BinaryGraph::decode_length_delimited(bytes)?;
    let graph = lift(wire)?;
    validate::validate(&graph)?;
    debug!(
        instructions = graph.instruction.len(),
        bytes = bytes.len(),
        "decoded binary graph"
    );
    Ok(graph)
}

/// Reject negative wire indices; everything else fits in u32.
fn lift_index(table: Table, record: usize, field: &'static str, value: i32) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        BinGraphError::integrity(table, record, field, format!("negative index {value}"))
    })
}

fn lift_indices(
    table: Table,
    record: usize,
    field: &'static str,
    values: &[i32],
) -> Result<Vec<u32>> {
    values
        .iter()
        .map(|&value| lift_index(table, record, field, value))
        .collect()
}

fn expression_kind(table_record: usize, raw: Option<i32>) -> Result<ExpressionKind> {
    let raw = match raw {
        None => return Ok(ExpressionKind::ImmediateInt),
        Some(raw) => raw,
    };
    let kind = wire::ExpressionType::try_from(raw).map_err(|_| {
        BinGraphError::integrity(
            Table::Expression,
            table_record,
            "type",
            format!("unknown expression type {raw}"),
        )
    })?;
    Ok(match kind {
        wire::ExpressionType::Symbol => ExpressionKind::Symbol,
        wire::ExpressionType::ImmediateInt => ExpressionKind::ImmediateInt,
        wire::ExpressionType::ImmediateFloat => ExpressionKind::ImmediateFloat,
        wire::ExpressionType::Operator => ExpressionKind::Operator,
        wire::ExpressionType::Register => ExpressionKind::Register,
        wire::ExpressionType::SizePrefix => ExpressionKind::SizePrefix,
        wire::ExpressionType::Dereference => ExpressionKind::Dereference,
    })
}

fn edge_kind(record: usize, raw: Option<i32>) -> Result<FlowEdgeKind> {
    let raw = match raw {
        None => return Ok(FlowEdgeKind::Unconditional),
        Some(raw) => raw,
    };
    let kind = wire::FlowGraphEdgeType::try_from(raw).map_err(|_| {
        BinGraphError::integrity(
            Table::FlowGraph,
            record,
            "edge.type",
            format!("unknown edge type {raw}"),
        )
    })?;
    Ok(match kind {
        wire::FlowGraphEdgeType::ConditionTrue => FlowEdgeKind::ConditionTrue,
        wire::FlowGraphEdgeType::ConditionFalse => FlowEdgeKind::ConditionFalse,
        wire::FlowGraphEdgeType::Unconditional => FlowEdgeKind::Unconditional,
        wire::FlowGraphEdgeType::Switch => FlowEdgeKind::Switch,
    })
}

fn vertex_kind(record: usize, raw: Option<i32>) -> Result<VertexKind> {
    let raw = match raw {
        None => return Ok(VertexKind::Normal),
        Some(raw) => raw,
    };
    let kind = wire::VertexType::try_from(raw).map_err(|_| {
        BinGraphError::integrity(
            Table::CallGraphVertex,
            record,
            "type",
            format!("unknown vertex type {raw}"),
        )
    })?;
    Ok(match kind {
        wire::VertexType::Normal => VertexKind::Normal,
        wire::VertexType::Library => VertexKind::Library,
        wire::VertexType::Imported => VertexKind::Imported,
        wire::VertexType::Thunk => VertexKind::Thunk,
        wire::VertexType::Invalid => VertexKind::Invalid,
    })
}

fn comment_kind(record: usize, raw: Option<i32>) -> Result<CommentKind> {
    let raw = match raw {
        None => return Ok(CommentKind::Plain),
        Some(raw) => raw,
    };
    let kind = wire::CommentType::try_from(raw).map_err(|_| {
        BinGraphError::integrity(
            Table::Comment,
            record,
            "type",
            format!("unknown comment type {raw}"),
        )
    })?;
    Ok(match kind {
        wire::CommentType::Plain => CommentKind::Plain,
        wire::CommentType::Anterior => CommentKind::Anterior,
        wire::CommentType::Posterior => CommentKind::Posterior,
        wire::CommentType::Function => CommentKind::Function,
        wire::CommentType::Enumeration => CommentKind::Enumeration,
        wire::CommentType::Location => CommentKind::Location,
        wire::CommentType::GlobalReference => CommentKind::GlobalReference,
        wire::CommentType::LocalReference => CommentKind::LocalReference,
        wire::CommentType::Structure => CommentKind::Structure,
    })
}

pub(crate) fn lift(wire: wire::BinaryGraph) -> Result<BinaryGraph> {
    let meta = wire
        .meta_information
        .map(|meta| Meta {
            executable_name: meta.executable_name,
            executable_id: meta.executable_id,
            architecture_name: meta.architecture_name,
            timestamp: meta.timestamp,
        })
        .unwrap_or_default();

    let mut expression = Vec::with_capacity(wire.expression.len());
    for (record, raw) in wire.expression.into_iter().enumerate() {
        expression.push(Expression {
            kind: expression_kind(record, raw.r#type)?,
            symbol: raw.symbol,
            immediate: raw.immediate,
            parent_index: raw
                .parent_index
                .map(|parent| lift_index(Table::Expression, record, "parent_index", parent))
                .transpose()?,
            is_relocation: raw.is_relocation.unwrap_or(false),
        });
    }

    let mut operand = Vec::with_capacity(wire.operand.len());
    for (record, raw) in wire.operand.into_iter().enumerate() {
        operand.push(Operand::new(lift_indices(
            Table::Operand,
            record,
            "expression_index",
            &raw.expression_index,
        )?));
    }

    let mnemonic = wire
        .mnemonic
        .into_iter()
        .map(|raw| Mnemonic {
            name: raw.name.unwrap_or_default(),
        })
        .collect();

    let mut instruction = Vec::with_capacity(wire.instruction.len());
    for (record, raw) in wire.instruction.into_iter().enumerate() {
        instruction.push(Instruction {
            address: raw.address,
            call_target: raw.call_target,
            mnemonic_index: lift_index(
                Table::Instruction,
                record,
                "mnemonic_index",
                raw.mnemonic_index.unwrap_or(0),
            )?,
            operand_index: lift_indices(
                Table::Instruction,
                record,
                "operand_index",
                &raw.operand_index,
            )?,
            raw_bytes: raw.raw_bytes.unwrap_or_default(),
            comment_index: lift_indices(
                Table::Instruction,
                record,
                "comment_index",
                &raw.comment_index,
            )?,
        });
    }

    let mut basic_block = Vec::with_capacity(wire.basic_block.len());
    for (record, raw) in wire.basic_block.into_iter().enumerate() {
        let mut ranges = Vec::with_capacity(raw.instruction_index.len());
        for range in raw.instruction_index {
            let begin = lift_index(
                Table::BasicBlock,
                record,
                "instruction_index",
                range.begin_index.unwrap_or(0),
            )?;
            let end = match range.end_index {
                // Absent end means a single-instruction range.
                None => begin.saturating_add(1),
                Some(end) => lift_index(Table::BasicBlock, record, "instruction_index", end)?,
            };
            ranges.push(IndexRange::new(begin, end));
        }
        basic_block.push(BasicBlock::new(ranges));
    }

    let mut flow_graph = Vec::with_capacity(wire.flow_graph.len());
    for (record, raw) in wire.flow_graph.into_iter().enumerate() {
        let mut edges = Vec::with_capacity(raw.edge.len());
        for edge in raw.edge {
            edges.push(FlowEdge {
                source: lift_index(
                    Table::FlowGraph,
                    record,
                    "edge.source",
                    edge.source_basic_block_index.unwrap_or(0),
                )?,
                target: lift_index(
                    Table::FlowGraph,
                    record,
                    "edge.target",
                    edge.target_basic_block_index.unwrap_or(0),
                )?,
                kind: edge_kind(record, edge.r#type)?,
                is_back_edge: edge.is_back_edge.unwrap_or(false),
            });
        }
        flow_graph.push(FlowGraph {
            basic_block_index: lift_indices(
                Table::FlowGraph,
                record,
                "basic_block_index",
                &raw.basic_block_index,
            )?,
            entry_block: lift_index(
                Table::FlowGraph,
                record,
                "entry_basic_block_index",
                raw.entry_basic_block_index.unwrap_or(0),
            )?,
            edges,
        });
    }

    let call_graph = match wire.call_graph {
        None => CallGraph::new(),
        Some(raw) => {
            let mut vertex = Vec::with_capacity(raw.vertex.len());
            for (record, v) in raw.vertex.into_iter().enumerate() {
                vertex.push(Vertex {
                    address: v.address.unwrap_or(0),
                    kind: vertex_kind(record, v.r#type)?,
                    mangled_name: v.mangled_name,
                    demangled_name: v.demangled_name,
                    library_index: v
                        .library_index
                        .map(|library| {
                            lift_index(Table::CallGraphVertex, record, "library_index", library)
                        })
                        .transpose()?,
                    module_index: v
                        .module_index
                        .map(|module| {
                            lift_index(Table::CallGraphVertex, record, "module_index", module)
                        })
                        .transpose()?,
                });
            }
            let mut edge = Vec::with_capacity(raw.edge.len());
            for (record, e) in raw.edge.into_iter().enumerate() {
                edge.push(CallEdge {
                    source_vertex_index: lift_index(
                        Table::CallGraphEdge,
                        record,
                        "source_vertex_index",
                        e.source_vertex_index.unwrap_or(0),
                    )?,
                    target_vertex_index: lift_index(
                        Table::CallGraphEdge,
                        record,
                        "target_vertex_index",
                        e.target_vertex_index.unwrap_or(0),
                    )?,
                });
            }
            CallGraph { vertex, edge }
        }
    };

    let mut comment = Vec::with_capacity(wire.comment.len());
    for (record, raw) in wire.comment.into_iter().enumerate() {
        comment.push(Comment {
            instruction_index: lift_index(
                Table::Comment,
                record,
                "instruction_index",
                raw.instruction_index.unwrap_or(0),
            )?,
            instruction_operand_index: lift_index(
                Table::Comment,
                record,
                "instruction_operand_index",
                raw.instruction_operand_index.unwrap_or(0),
            )?,
            operand_expression_index: lift_index(
                Table::Comment,
                record,
                "operand_expression_index",
                raw.operand_expression_index.unwrap_or(0),
            )?,
            string_table_index: lift_index(
                Table::Comment,
                record,
                "string_table_index",
                raw.string_table_index.unwrap_or(0),
            )?,
            repeatable: raw.repeatable.unwrap_or(false),
            kind: comment_kind(record, raw.r#type)?,
        });
    }

    let mut string_reference = Vec::with_capacity(wire.string_reference.len());
    for (record, raw) in wire.string_reference.into_iter().enumerate() {
        string_reference.push(StringReference {
            instruction_index: lift_index(
                Table::StringReference,
                record,
                "instruction_index",
                raw.instruction_index.unwrap_or(0),
            )?,
            instruction_operand_index: lift_index(
                Table::StringReference,
                record,
                "instruction_operand_index",
                raw.instruction_operand_index.unwrap_or(0),
            )?,
            operand_expression_index: lift_index(
                Table::StringReference,
                record,
                "operand_expression_index",
                raw.operand_expression_index.unwrap_or(0),
            )?,
            string_table_index: lift_index(
                Table::StringReference,
                record,
                "string_table_index",
                raw.string_table_index.unwrap_or(0),
            )?,
        });
    }

    let mut expression_substitution = Vec::with_capacity(wire.expression_substitution.len());
    for (record, raw) in wire.expression_substitution.into_iter().enumerate() {
        expression_substitution.push(ExpressionSubstitution {
            instruction_index: lift_index(
                Table::ExpressionSubstitution,
                record,
                "instruction_index",
                raw.instruction_index.unwrap_or(0),
            )?,
            operand_index: lift_index(
                Table::ExpressionSubstitution,
                record,
                "operand_index",
                raw.operand_index.unwrap_or(0),
            )?,
            expression_index: lift_index(
                Table::ExpressionSubstitution,
                record,
                "expression_index",
                raw.expression_index.unwrap_or(0),
            )?,
            replacement_string_table_index: lift_index(
                Table::ExpressionSubstitution,
                record,
                "replacement_string_table_index",
                raw.replacement_string_table_index.unwrap_or(0),
            )?,
        });
    }

    let section = wire
        .section
        .into_iter()
        .map(|raw| Section {
            address: raw.address.unwrap_or(0),
            size: raw.size.unwrap_or(0),
            flag_r: raw.flag_r.unwrap_or(false),
            flag_w: raw.flag_w.unwrap_or(false),
            flag_x: raw.flag_x.unwrap_or(false),
        })
        .collect();

    let library = wire
        .library
        .into_iter()
        .map(|raw| Library {
            name: raw.name.unwrap_or_default(),
            is_static: raw.is_static.unwrap_or(false),
            load_address: raw.load_address,
        })
        .collect();

    let mut data_reference = Vec::with_capacity(wire.data_reference.len());
    for (record, raw) in wire.data_reference.into_iter().enumerate() {
        data_reference.push(DataReference {
            instruction_index: lift_index(
                Table::DataReference,
                record,
                "instruction_index",
                raw.instruction_index.unwrap_or(0),
            )?,
            address: raw.address.unwrap_or(0),
        });
    }

    let module = wire
        .module
        .into_iter()
        .map(|raw| Module {
            name: raw.name.unwrap_or_default(),
        })
        .collect();

    let md_index = wire
        .md_index
        .into_iter()
        .map(|raw| MdIndex {
            key: raw.key.unwrap_or_default(),
            payload: raw.payload.unwrap_or_default(),
        })
        .collect();

    Ok(BinaryGraph {
        meta,
        expression,
        operand,
        mnemonic,
        instruction,
        basic_block,
        flow_graph,
        call_graph,
        string_table: wire.string_table,
        comment,
        string_reference,
        expression_substitution,
        section,
        library,
        data_reference,
        module,
        md_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_fields_lift_to_defaults() {
        let raw = wire::BinaryGraph {
            mnemonic: vec![wire::Mnemonic { name: None }],
            instruction: vec![wire::Instruction {
                address: Some(0x1000),
                raw_bytes: Some(vec![0x90]),
                ..Default::default()
            }],
            ..Default::default()
        };
        let graph = lift(raw).unwrap();
        assert_eq!(graph.instruction[0].mnemonic_index, 0);
        assert!(graph.instruction[0].call_target.is_empty());
        assert!(graph.meta.is_empty());
        assert_eq!(graph.call_graph.vertex_count(), 0);
    }

    #[test]
    fn test_negative_index_is_rejected_at_lift() {
        let raw = wire::BinaryGraph {
            operand: vec![wire::Operand {
                expression_index: vec![-1],
            }],
            ..Default::default()
        };
        let err = lift(raw).unwrap_err();
        assert!(matches!(
            err,
            BinGraphError::DataIntegrity {
                table: Table::Operand,
                field: "expression_index",
                ..
            }
        ));
    }

    #[test]
    fn test_absent_range_end_means_single_instruction() {
        let raw = wire::BinaryGraph {
            basic_block: vec![wire::BasicBlock {
                instruction_index: vec![wire::IndexRange {
                    begin_index: Some(4),
                    end_index: None,
                }],
            }],
            ..Default::default()
        };
        let graph = lift(raw).unwrap();
        assert_eq!(graph.basic_block[0].instruction_index[0], IndexRange::new(4, 5));
    }

    #[test]
    fn test_unknown_vertex_type_is_rejected() {
        let raw = wire::BinaryGraph {
            call_graph: Some(wire::CallGraph {
                vertex: vec![wire::Vertex {
                    address: Some(0x1000),
                    r#type: Some(42),
                    ..Default::default()
                }],
                edge: Vec::new(),
            }),
            ..Default::default()
        };
        let err = lift(raw).unwrap_err();
        assert!(matches!(
            err,
            BinGraphError::DataIntegrity {
                table: Table::CallGraphVertex,
                field: "type",
                ..
            }
        ));
    }
}
