//! Per-function control-flow graphs over shared basic blocks.
//!
//! A flow graph lists the global indices of its member blocks, sorted by
//! block address, and its edges in terms of *positions within that member
//! list*. Keeping edge endpoints local to the owning graph means a corrupt
//! edge can never reach across into another function's blocks.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Control-flow edge classification, derived from branch semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowEdgeKind {
    /// Taken branch of a conditional.
    ConditionTrue,
    /// Fall-through branch of a conditional.
    ConditionFalse,
    /// Unconditional transfer, including plain fall-through.
    Unconditional,
    /// One arm of a jump-table dispatch.
    Switch,
}

impl FlowEdgeKind {
    pub fn value(&self) -> &str {
        match self {
            FlowEdgeKind::ConditionTrue => "condition_true",
            FlowEdgeKind::ConditionFalse => "condition_false",
            FlowEdgeKind::Unconditional => "unconditional",
            FlowEdgeKind::Switch => "switch",
        }
    }
}

impl fmt::Display for FlowEdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value())
    }
}

/// One control-flow edge between two member blocks of the same graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowEdge {
    /// Position of the source block in the owning graph's member list.
    pub source: u32,
    /// Position of the target block in the owning graph's member list.
    pub target: u32,
    pub kind: FlowEdgeKind,
    /// True when the target dominates the source (a loop edge).
    pub is_back_edge: bool,
}

impl fmt::Display for FlowEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} ({}{})",
            self.source,
            self.target,
            self.kind,
            if self.is_back_edge { ", back" } else { "" }
        )
    }
}

/// Control flow of a single function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowGraph {
    /// Global basic-block indices, sorted ascending by block address, with no
    /// duplicates.
    pub basic_block_index: Vec<u32>,
    /// Position of the entry block in `basic_block_index`.
    pub entry_block: u32,
    pub edges: Vec<FlowEdge>,
}

impl FlowGraph {
    pub fn block_count(&self) -> usize {
        self.basic_block_index.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Global index of the entry basic block.
    pub fn entry_block_index(&self) -> Option<u32> {
        self.basic_block_index.get(self.entry_block as usize).copied()
    }

    /// Successor positions of the block at the given member position.
    pub fn successors(&self, position: u32) -> Vec<u32> {
        self.edges
            .iter()
            .filter(|edge| edge.source == position)
            .map(|edge| edge.target)
            .collect()
    }

    /// Predecessor positions of the block at the given member position.
    pub fn predecessors(&self, position: u32) -> Vec<u32> {
        self.edges
            .iter()
            .filter(|edge| edge.target == position)
            .map(|edge| edge.source)
            .collect()
    }

    /// Edges flagged as loop edges.
    pub fn back_edges(&self) -> impl Iterator<Item = &FlowEdge> {
        self.edges.iter().filter(|edge| edge.is_back_edge)
    }
}

impl fmt::Display for FlowGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FlowGraph(blocks={}, edges={}, entry={})",
            self.block_count(),
            self.edge_count(),
            self.entry_block
        )
    }
}
