//! Call graph: one vertex per function, edges per call relationship.
//!
//! The vertex list is sorted ascending by address. That ordering is a hard
//! format invariant: every consumer locates functions by binary search, so
//! an unsorted list silently corrupts lookups everywhere downstream. Edges
//! are call-site instances, never interned; recursion and repeated call
//! sites legitimately produce self and duplicate edges.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Origin evidence for a function vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VertexKind {
    /// Regular function with full disassembly.
    Normal,
    /// Recognized statically linked library function.
    Library,
    /// Imported from a shared object or DLL.
    Imported,
    /// Thunk forwarding its work via an unconditional jump.
    Thunk,
    /// Considered invalid by producer heuristics.
    Invalid,
}

impl VertexKind {
    pub fn value(&self) -> &str {
        match self {
            VertexKind::Normal => "normal",
            VertexKind::Library => "library",
            VertexKind::Imported => "imported",
            VertexKind::Thunk => "thunk",
            VertexKind::Invalid => "invalid",
        }
    }
}

impl fmt::Display for VertexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value())
    }
}

/// One function in the call graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vertex {
    pub address: u64,
    pub kind: VertexKind,
    /// Linker-level name, if any.
    pub mangled_name: Option<String>,
    /// Demangled display name, if it differs from the mangled one.
    pub demangled_name: Option<String>,
    /// Index into the library table for imported/library functions.
    pub library_index: Option<u32>,
    /// Index into the module table, for object-oriented targets.
    pub module_index: Option<u32>,
}

impl Vertex {
    pub fn new(address: u64, kind: VertexKind) -> Self {
        Self {
            address,
            kind,
            mangled_name: None,
            demangled_name: None,
            library_index: None,
            module_index: None,
        }
    }

    pub fn with_mangled_name(mut self, name: impl Into<String>) -> Self {
        self.mangled_name = Some(name.into());
        self
    }

    pub fn with_demangled_name(mut self, name: impl Into<String>) -> Self {
        self.demangled_name = Some(name.into());
        self
    }

    /// Best human-readable name: demangled, then mangled.
    pub fn display_name(&self) -> Option<&str> {
        self.demangled_name
            .as_deref()
            .or(self.mangled_name.as_deref())
    }
}

impl fmt::Display for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.display_name() {
            Some(name) => write!(f, "{:#x} {} ({})", self.address, name, self.kind),
            None => write!(f, "{:#x} ({})", self.address, self.kind),
        }
    }
}

/// One call relationship between two vertices, by position in the sorted
/// vertex list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallEdge {
    pub source_vertex_index: u32,
    pub target_vertex_index: u32,
}

/// Inter-procedural call graph.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CallGraph {
    pub vertex: Vec<Vertex>,
    pub edge: Vec<CallEdge>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge.len()
    }

    /// Check the ascending-address sort invariant.
    pub fn is_sorted_by_address(&self) -> bool {
        self.vertex
            .windows(2)
            .all(|pair| pair[0].address <= pair[1].address)
    }

    /// Locate a vertex by address. Requires the sort invariant.
    pub fn vertex_index_by_address(&self, address: u64) -> Option<u32> {
        self.vertex
            .binary_search_by_key(&address, |vertex| vertex.address)
            .ok()
            .map(|index| index as u32)
    }

    /// Target positions of every edge leaving the given vertex, duplicates
    /// preserved.
    pub fn callees(&self, vertex_index: u32) -> Vec<u32> {
        self.edge
            .iter()
            .filter(|edge| edge.source_vertex_index == vertex_index)
            .map(|edge| edge.target_vertex_index)
            .collect()
    }

    /// Source positions of every edge entering the given vertex.
    pub fn callers(&self, vertex_index: u32) -> Vec<u32> {
        self.edge
            .iter()
            .filter(|edge| edge.target_vertex_index == vertex_index)
            .map(|edge| edge.source_vertex_index)
            .collect()
    }
}

impl fmt::Display for CallGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CallGraph(vertices={}, edges={})",
            self.vertex_count(),
            self.edge_count()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_graph() -> CallGraph {
        CallGraph {
            vertex: vec![
                Vertex::new(0x1000, VertexKind::Normal),
                Vertex::new(0x2000, VertexKind::Thunk),
                Vertex::new(0x3000, VertexKind::Imported).with_mangled_name("memcpy"),
            ],
            edge: vec![
                CallEdge {
                    source_vertex_index: 0,
                    target_vertex_index: 1,
                },
                CallEdge {
                    source_vertex_index: 0,
                    target_vertex_index: 2,
                },
                CallEdge {
                    source_vertex_index: 0,
                    target_vertex_index: 2,
                },
            ],
        }
    }

    #[test]
    fn test_sort_invariant_check() {
        let mut graph = sample_graph();
        assert!(graph.is_sorted_by_address());
        graph.vertex.swap(0, 2);
        assert!(!graph.is_sorted_by_address());
    }

    #[test]
    fn test_binary_search_by_address() {
        let graph = sample_graph();
        assert_eq!(graph.vertex_index_by_address(0x2000), Some(1));
        assert_eq!(graph.vertex_index_by_address(0x2500), None);
    }

    #[test]
    fn test_duplicate_edges_are_preserved() {
        let graph = sample_graph();
        assert_eq!(graph.callees(0), vec![1, 2, 2]);
        assert_eq!(graph.callers(2), vec![0, 0]);
    }

    #[test]
    fn test_vertex_display_prefers_demangled() {
        let vertex = Vertex::new(0x1000, VertexKind::Normal)
            .with_mangled_name("_Zfoo")
            .with_demangled_name("foo()");
        assert_eq!(vertex.display_name(), Some("foo()"));
        assert_eq!(vertex.to_string(), "0x1000 foo() (normal)");
    }
}
