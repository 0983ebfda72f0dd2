//! Operand expression trees stored as parent-indexed forests.
//!
//! An operand like `[ebx+12]` is a small syntax tree. Instead of owning child
//! pointers, every node records the global index of its parent, and the
//! operand lists its nodes in pre-order; sibling rendering order is the list
//! order itself. Nodes are content-addressed, so identical subtrees in
//! identical contexts collapse to the same table entries.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Syntactic role of one expression node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpressionKind {
    /// Named symbol, e.g. a label or imported function name.
    Symbol,
    /// Integer immediate.
    ImmediateInt,
    /// Floating-point immediate, carried as raw bits.
    ImmediateFloat,
    /// Operator joining child expressions, e.g. `+` or `*`.
    Operator,
    /// Machine register, by name.
    Register,
    /// Memory access width hint, e.g. `dword`.
    SizePrefix,
    /// Memory dereference, rendered as brackets.
    Dereference,
}

impl ExpressionKind {
    pub fn value(&self) -> &str {
        match self {
            ExpressionKind::Symbol => "symbol",
            ExpressionKind::ImmediateInt => "immediate_int",
            ExpressionKind::ImmediateFloat => "immediate_float",
            ExpressionKind::Operator => "operator",
            ExpressionKind::Register => "register",
            ExpressionKind::SizePrefix => "size_prefix",
            ExpressionKind::Dereference => "dereference",
        }
    }
}

impl fmt::Display for ExpressionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value())
    }
}

/// One node of an operand's expression tree.
///
/// Identity includes the parent link: a node is only shared between operands
/// when its whole ancestor chain matches too, which keeps the forest
/// invariant intact under deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Expression {
    pub kind: ExpressionKind,
    /// Symbol text for symbol, operator, register, and size-prefix nodes.
    pub symbol: Option<String>,
    /// Immediate payload for immediate nodes.
    pub immediate: Option<u64>,
    /// Global index of the parent node; the tree root has none.
    pub parent_index: Option<u32>,
    /// Set when a relocation rewrites this node's value at load time.
    pub is_relocation: bool,
}

impl Expression {
    pub fn is_root(&self) -> bool {
        self.parent_index.is_none()
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.symbol, self.immediate) {
            (Some(symbol), _) => write!(f, "{}({})", self.kind, symbol),
            (None, Some(immediate)) => write!(f, "{}({:#x})", self.kind, immediate),
            (None, None) => write!(f, "{}", self.kind),
        }
    }
}

/// One operand: the pre-order node list of a single expression tree.
///
/// The list must contain exactly one root; every other entry's parent is also
/// a member of the list. An empty operand is invalid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Operand {
    /// Indices into the global expression table.
    pub expression_index: Vec<u32>,
}

impl Operand {
    pub fn new(expression_index: Vec<u32>) -> Self {
        Self { expression_index }
    }

    pub fn node_count(&self) -> usize {
        self.expression_index.len()
    }
}
