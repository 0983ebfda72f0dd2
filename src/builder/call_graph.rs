//! Two-pass call-graph assembly.
//!
//! Edges reference vertices by position in the final address-sorted array, so
//! no index may be handed out before the sort is fixed. The builder collects
//! vertices and symbolic call targets first; `finalize` sorts, resolves, and
//! seals. Inserting into a sealed builder is an ordering violation: the
//! builder fails instead of silently resorting under a consumer that already
//! holds indices.

use std::collections::HashSet;

use tracing::warn;

use crate::core::call_graph::{CallEdge, CallGraph, Vertex};
use crate::error::{BinGraphError, Result, Table};
use crate::intern::MAX_TABLE_LEN;

#[derive(Debug, Default)]
pub struct CallGraphBuilder {
    vertices: Vec<Vertex>,
    seen_addresses: HashSet<u64>,
    pending_calls: Vec<(u64, u64)>,
    sealed: bool,
}

impl CallGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pass 1: collect one vertex per distinct function address.
    ///
    /// The first insertion for an address wins; later inserts at the same
    /// address are ignored.
    pub fn add_vertex(&mut self, vertex: Vertex) -> Result<()> {
        if self.sealed {
            return Err(BinGraphError::OrderingViolation {
                index: self.vertices.len(),
            });
        }
        if !self.seen_addresses.insert(vertex.address) {
            return Ok(());
        }
        if self.vertices.len() >= MAX_TABLE_LEN {
            return Err(BinGraphError::CapacityExceeded {
                table: Table::CallGraphVertex,
                limit: MAX_TABLE_LEN,
            });
        }
        self.vertices.push(vertex);
        Ok(())
    }

    /// Record a call relationship by address. Resolution to vertex indices
    /// happens at `finalize`, once the sorted order is fixed.
    pub fn add_call(&mut self, source_address: u64, target_address: u64) -> Result<()> {
        if self.sealed {
            return Err(BinGraphError::OrderingViolation {
                index: self.vertices.len(),
            });
        }
        self.pending_calls.push((source_address, target_address));
        Ok(())
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Pass 2: sort vertices ascending by address, resolve the pending calls
    /// against the sorted array, and seal the builder.
    ///
    /// Calls whose endpoints never became vertices are dropped with a
    /// warning; a producer may legitimately observe calls into addresses it
    /// did not accept as functions.
    pub fn finalize(&mut self) -> CallGraph {
        self.sealed = true;
        let mut vertices = std::mem::take(&mut self.vertices);
        vertices.sort_by_key(|vertex| vertex.address);

        let mut graph = CallGraph {
            vertex: vertices,
            edge: Vec::new(),
        };
        for (source, target) in self.pending_calls.drain(..) {
            let (Some(source_index), Some(target_index)) = (
                graph.vertex_index_by_address(source),
                graph.vertex_index_by_address(target),
            ) else {
                warn!(source, target, "dropping call edge with no vertex");
                continue;
            };
            graph.edge.push(CallEdge {
                source_vertex_index: source_index,
                target_vertex_index: target_index,
            });
        }
        graph
    }
}
