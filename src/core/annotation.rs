//! Annotation tables tying code locations to string-table entries.
//!
//! Comments, string references, and expression substitutions form an N:M
//! incidence relation between `(instruction, operand position, expression
//! position)` tuples and interned text. They are the weakest-invariant
//! entities in the model: validation only requires their indices to resolve.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Placement and semantics of a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommentKind {
    /// Regular instruction comment.
    Plain,
    /// Rendered on its own line before the instruction.
    Anterior,
    /// Rendered on its own line after the instruction.
    Posterior,
    /// Function-level comment, attached to the entry point.
    Function,
    /// Names an enumeration value.
    Enumeration,
    /// Location name, e.g. a local label.
    Location,
    /// Named reference to a global location.
    GlobalReference,
    /// Named reference to a local (stack) location.
    LocalReference,
    /// Structure field annotation.
    Structure,
}

impl CommentKind {
    pub fn value(&self) -> &str {
        match self {
            CommentKind::Plain => "plain",
            CommentKind::Anterior => "anterior",
            CommentKind::Posterior => "posterior",
            CommentKind::Function => "function",
            CommentKind::Enumeration => "enumeration",
            CommentKind::Location => "location",
            CommentKind::GlobalReference => "global_reference",
            CommentKind::LocalReference => "local_reference",
            CommentKind::Structure => "structure",
        }
    }
}

impl fmt::Display for CommentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value())
    }
}

/// A comment attached to a code location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Comment {
    /// Index into the instruction table.
    pub instruction_index: u32,
    /// Position of the operand within that instruction's operand list.
    pub instruction_operand_index: u32,
    /// Position of the expression within that operand's node list.
    pub operand_expression_index: u32,
    /// Index into the string table.
    pub string_table_index: u32,
    /// Repeatable comments re-render at every location referencing the same
    /// target.
    pub repeatable: bool,
    pub kind: CommentKind,
}

/// A reference from a code location to a string-table entry, e.g. an
/// instruction operand pointing at a string literal in the image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StringReference {
    pub instruction_index: u32,
    pub instruction_operand_index: u32,
    pub operand_expression_index: u32,
    pub string_table_index: u32,
}

/// A reference from an instruction to a data address in the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataReference {
    pub instruction_index: u32,
    pub address: u64,
}

/// Display-text override for one expression node, e.g. a recognized stack
/// variable name replacing a raw displacement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExpressionSubstitution {
    pub instruction_index: u32,
    /// Position of the operand within the instruction's operand list.
    pub operand_index: u32,
    /// Index into the global expression table.
    pub expression_index: u32,
    pub replacement_string_table_index: u32,
}
