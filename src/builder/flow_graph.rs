//! Flow-graph assembly: block ordering, entry resolution, edge
//! classification, and back-edge marking.

use std::collections::HashMap;

use crate::builder::dominator::{dominates, immediate_dominators, is_reachable};
use crate::core::flow_graph::{FlowEdge, FlowEdgeKind, FlowGraph};
use crate::error::{BinGraphError, Result, Table};

/// One branch supplied by the producer, endpoints as global block indices.
#[derive(Debug, Clone, Copy)]
pub struct Branch {
    pub source_block: u32,
    pub target_block: u32,
    pub kind: FlowEdgeKind,
}

impl Branch {
    pub fn new(source_block: u32, target_block: u32, kind: FlowEdgeKind) -> Self {
        Self {
            source_block,
            target_block,
            kind,
        }
    }
}

/// Assemble one function's flow graph.
///
/// `members` pairs each global block index with the address of its first
/// instruction. Blocks are sorted ascending by that address, branch endpoints
/// are resolved to positions in the sorted member list, and every edge gets
/// its back-edge flag from the dominator tree rooted at the entry block
/// (Lengauer-Tarjan): an edge retreats iff its target dominates its source.
pub(crate) fn build(
    record: usize,
    entry_address: u64,
    members: &[(u32, u64)],
    branches: &[Branch],
) -> Result<FlowGraph> {
    if members.is_empty() {
        return Err(BinGraphError::integrity(
            Table::FlowGraph,
            record,
            "basic_block_index",
            "flow graph has no basic blocks",
        ));
    }

    let mut ordered: Vec<(u32, u64)> = members.to_vec();
    ordered.sort_by_key(|&(block, address)| (address, block));

    let mut position_by_block: HashMap<u32, u32> = HashMap::with_capacity(ordered.len());
    for (position, &(block, _)) in ordered.iter().enumerate() {
        if position_by_block.insert(block, position as u32).is_some() {
            return Err(BinGraphError::integrity(
                Table::FlowGraph,
                record,
                "basic_block_index",
                format!("duplicate basic block {block}"),
            ));
        }
    }

    let entry_block = ordered
        .iter()
        .position(|&(_, address)| address == entry_address)
        .ok_or_else(|| {
            BinGraphError::integrity(
                Table::FlowGraph,
                record,
                "entry_basic_block_index",
                format!("no basic block starts at entry address {entry_address:#x}"),
            )
        })? as u32;

    let mut edges = Vec::with_capacity(branches.len());
    for branch in branches {
        let resolve = |block: u32| {
            position_by_block.get(&block).copied().ok_or_else(|| {
                BinGraphError::integrity(
                    Table::FlowGraph,
                    record,
                    "edge",
                    format!("edge endpoint block {block} is not a member of this flow graph"),
                )
            })
        };
        edges.push(FlowEdge {
            source: resolve(branch.source_block)?,
            target: resolve(branch.target_block)?,
            kind: branch.kind,
            is_back_edge: false,
        });
    }

    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); ordered.len()];
    for edge in &edges {
        successors[edge.source as usize].push(edge.target as usize);
    }
    let root = entry_block as usize;
    let idom = immediate_dominators(&successors, root);
    for edge in &mut edges {
        let source = edge.source as usize;
        let target = edge.target as usize;
        edge.is_back_edge = is_reachable(&idom, root, source)
            && is_reachable(&idom, root, target)
            && dominates(&idom, root, target, source);
    }

    Ok(FlowGraph {
        basic_block_index: ordered.into_iter().map(|(block, _)| block).collect(),
        entry_block,
        edges,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_are_sorted_by_address_and_entry_located() {
        let members = [(7u32, 0x1010u64), (3, 0x1000), (9, 0x1020)];
        let graph = build(0, 0x1000, &members, &[]).unwrap();
        assert_eq!(graph.basic_block_index, vec![3, 7, 9]);
        assert_eq!(graph.entry_block, 0);
        assert_eq!(graph.entry_block_index(), Some(3));
    }

    #[test]
    fn test_duplicate_member_is_rejected() {
        let members = [(3u32, 0x1000u64), (3, 0x1000)];
        let err = build(0, 0x1000, &members, &[]).unwrap_err();
        assert!(matches!(
            err,
            BinGraphError::DataIntegrity {
                table: Table::FlowGraph,
                field: "basic_block_index",
                ..
            }
        ));
    }

    #[test]
    fn test_missing_entry_block_is_rejected() {
        let members = [(3u32, 0x1000u64)];
        let err = build(0, 0x2000, &members, &[]).unwrap_err();
        assert!(matches!(
            err,
            BinGraphError::DataIntegrity {
                field: "entry_basic_block_index",
                ..
            }
        ));
    }

    #[test]
    fn test_foreign_edge_endpoint_is_rejected() {
        let members = [(3u32, 0x1000u64)];
        let branches = [Branch::new(3, 4, FlowEdgeKind::Unconditional)];
        let err = build(0, 0x1000, &members, &branches).unwrap_err();
        assert!(matches!(
            err,
            BinGraphError::DataIntegrity {
                field: "edge",
                ..
            }
        ));
    }

    #[test]
    fn test_three_block_loop_marks_exactly_one_back_edge() {
        // A -> B -> A, B -> C at ascending addresses.
        let members = [(0u32, 0x1000u64), (1, 0x1010), (2, 0x1020)];
        let branches = [
            Branch::new(0, 1, FlowEdgeKind::Unconditional),
            Branch::new(1, 0, FlowEdgeKind::ConditionTrue),
            Branch::new(1, 2, FlowEdgeKind::ConditionFalse),
        ];
        let graph = build(0, 0x1000, &members, &branches).unwrap();
        let flags: Vec<bool> = graph.edges.iter().map(|edge| edge.is_back_edge).collect();
        assert_eq!(flags, vec![false, true, false]);
    }

    #[test]
    fn test_self_loop_is_a_back_edge() {
        let members = [(0u32, 0x1000u64)];
        let branches = [Branch::new(0, 0, FlowEdgeKind::ConditionTrue)];
        let graph = build(0, 0x1000, &members, &branches).unwrap();
        assert!(graph.edges[0].is_back_edge);
    }

    #[test]
    fn test_unreachable_cycle_is_not_marked() {
        // Entry A; B and C cycle between themselves with no path from A.
        let members = [(0u32, 0x1000u64), (1, 0x1010), (2, 0x1020)];
        let branches = [
            Branch::new(1, 2, FlowEdgeKind::Unconditional),
            Branch::new(2, 1, FlowEdgeKind::Unconditional),
        ];
        let graph = build(0, 0x1000, &members, &branches).unwrap();
        assert!(graph.edges.iter().all(|edge| !edge.is_back_edge));
    }

    #[test]
    fn test_forward_edge_into_loop_head_is_not_a_back_edge() {
        // 0 -> 1 -> 2 -> 1; also 0 -> 2. Only 2 -> 1 retreats.
        let members = [(0u32, 0x1000u64), (1, 0x1010), (2, 0x1020)];
        let branches = [
            Branch::new(0, 1, FlowEdgeKind::ConditionTrue),
            Branch::new(0, 2, FlowEdgeKind::ConditionFalse),
            Branch::new(1, 2, FlowEdgeKind::Unconditional),
            Branch::new(2, 1, FlowEdgeKind::ConditionTrue),
        ];
        let graph = build(0, 0x1000, &members, &branches).unwrap();
        let back: Vec<(u32, u32)> = graph
            .edges
            .iter()
            .filter(|edge| edge.is_back_edge)
            .map(|edge| (edge.source, edge.target))
            .collect();
        assert!(back.is_empty());
    }
}
