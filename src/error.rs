//! Error types for the bingraph interchange codec.
//!
//! Every failure surfaced by the codec, builders, and validator is a
//! structured [`BinGraphError`]. Integrity violations always name the
//! offending table, record, and field so a rejected file can be diagnosed
//! without re-parsing it.

use std::fmt;
use thiserror::Error;

/// Tables of the interchange container.
///
/// Used to pinpoint which table an integrity or capacity violation occurred
/// in. The display form matches the wire-level field names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    StringTable,
    Expression,
    Operand,
    Mnemonic,
    Instruction,
    BasicBlock,
    FlowGraph,
    CallGraphVertex,
    CallGraphEdge,
    Comment,
    StringReference,
    ExpressionSubstitution,
    DataReference,
    Section,
    Library,
    Module,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::StringTable => "string_table",
            Table::Expression => "expression",
            Table::Operand => "operand",
            Table::Mnemonic => "mnemonic",
            Table::Instruction => "instruction",
            Table::BasicBlock => "basic_block",
            Table::FlowGraph => "flow_graph",
            Table::CallGraphVertex => "call_graph.vertex",
            Table::CallGraphEdge => "call_graph.edge",
            Table::Comment => "comment",
            Table::StringReference => "string_reference",
            Table::ExpressionSubstitution => "expression_substitution",
            Table::DataReference => "data_reference",
            Table::Section => "section",
            Table::Library => "library",
            Table::Module => "module",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for bingraph operations.
#[derive(Debug, Error)]
pub enum BinGraphError {
    /// An index is out of range or a record is structurally inconsistent.
    ///
    /// The reader never repairs or truncates: a single violation rejects the
    /// whole message.
    #[error("integrity violation in table {table}, record {index}, field {field}: {reason}")]
    DataIntegrity {
        table: Table,
        index: usize,
        field: &'static str,
        reason: String,
    },

    /// Call-graph vertices are not sorted ascending by address, or a vertex
    /// was inserted after indices were already handed out.
    #[error("call graph vertex {index} breaks the ascending address order")]
    OrderingViolation { index: usize },

    /// A table grew past the addressable range of its index fields.
    #[error("table {table} exceeded its addressable capacity of {limit} entries")]
    CapacityExceeded { table: Table, limit: usize },

    /// The byte stream is not a well-formed message.
    #[error("malformed message: {0}")]
    Decode(#[from] prost::DecodeError),
}

impl BinGraphError {
    pub(crate) fn integrity(
        table: Table,
        index: usize,
        field: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        BinGraphError::DataIntegrity {
            table,
            index,
            field,
            reason: reason.into(),
        }
    }
}

/// Result type alias for bingraph operations.
pub type Result<T> = std::result::Result<T, BinGraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrity_display_names_table_record_and_field() {
        let err = BinGraphError::integrity(
            Table::Operand,
            3,
            "expression_index",
            "index 999 out of bounds for expression table of length 10",
        );
        assert_eq!(
            err.to_string(),
            "integrity violation in table operand, record 3, field expression_index: \
             index 999 out of bounds for expression table of length 10"
        );
    }

    #[test]
    fn test_ordering_display() {
        let err = BinGraphError::OrderingViolation { index: 7 };
        assert_eq!(
            err.to_string(),
            "call graph vertex 7 breaks the ascending address order"
        );
    }

    #[test]
    fn test_table_display_matches_wire_names() {
        assert_eq!(Table::Operand.to_string(), "operand");
        assert_eq!(Table::CallGraphVertex.to_string(), "call_graph.vertex");
        assert_eq!(Table::StringTable.to_string(), "string_table");
    }
}
