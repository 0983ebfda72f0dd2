//! Wire-format message definitions.
//!
//! Hand-maintained prost messages. Field numbers and declared defaults are
//! load-bearing: an absent field always reads back as exactly its default,
//! so changing either silently changes what every existing file means.
//! Semantics follow the original schema: every scalar field is optional,
//! repeated scalars are not packed, and index fields are `int32` (negative
//! values never occur in well-formed data and are rejected by the reader).

/// Provenance of the exported binary.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Meta {
    #[prost(string, optional, tag = "1")]
    pub executable_name: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub executable_id: Option<String>,
    #[prost(string, optional, tag = "3")]
    pub architecture_name: Option<String>,
    #[prost(int64, optional, tag = "4")]
    pub timestamp: Option<i64>,
}

/// Node kind of an operand expression. Default: `ImmediateInt`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ExpressionType {
    Symbol = 1,
    ImmediateInt = 2,
    ImmediateFloat = 3,
    Operator = 4,
    Register = 5,
    SizePrefix = 6,
    Dereference = 7,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Expression {
    #[prost(enumeration = "ExpressionType", optional, tag = "1")]
    pub r#type: Option<i32>,
    #[prost(string, optional, tag = "2")]
    pub symbol: Option<String>,
    #[prost(uint64, optional, tag = "3")]
    pub immediate: Option<u64>,
    /// Absence marks the tree root; presence is semantic, not a default.
    #[prost(int32, optional, tag = "4")]
    pub parent_index: Option<i32>,
    #[prost(bool, optional, tag = "5")]
    pub is_relocation: Option<bool>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Operand {
    #[prost(int32, repeated, packed = "false", tag = "1")]
    pub expression_index: Vec<i32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Mnemonic {
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Instruction {
    /// Absence means the instruction starts where its predecessor ended;
    /// presence is semantic, so an explicit 0 is encoded, never omitted.
    #[prost(uint64, optional, tag = "1")]
    pub address: Option<u64>,
    #[prost(uint64, repeated, packed = "false", tag = "2")]
    pub call_target: Vec<u64>,
    /// Default 0: producers put the most frequent mnemonic at index 0.
    #[prost(int32, optional, tag = "3")]
    pub mnemonic_index: Option<i32>,
    #[prost(int32, repeated, packed = "false", tag = "4")]
    pub operand_index: Vec<i32>,
    #[prost(bytes = "vec", optional, tag = "5")]
    pub raw_bytes: Option<Vec<u8>>,
    #[prost(int32, repeated, packed = "false", tag = "6")]
    pub comment_index: Vec<i32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IndexRange {
    #[prost(int32, optional, tag = "1")]
    pub begin_index: Option<i32>,
    /// Omitted for single-instruction ranges: absent means `begin + 1`.
    #[prost(int32, optional, tag = "2")]
    pub end_index: Option<i32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BasicBlock {
    #[prost(message, repeated, tag = "1")]
    pub instruction_index: Vec<IndexRange>,
}

/// Flow-graph edge kind. Default: `Unconditional`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum FlowGraphEdgeType {
    ConditionTrue = 1,
    ConditionFalse = 2,
    Unconditional = 3,
    Switch = 4,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FlowGraphEdge {
    #[prost(int32, optional, tag = "1")]
    pub source_basic_block_index: Option<i32>,
    #[prost(int32, optional, tag = "2")]
    pub target_basic_block_index: Option<i32>,
    #[prost(enumeration = "FlowGraphEdgeType", optional, tag = "3")]
    pub r#type: Option<i32>,
    #[prost(bool, optional, tag = "4")]
    pub is_back_edge: Option<bool>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FlowGraph {
    /// Global basic-block indices, sorted by block address.
    #[prost(int32, repeated, packed = "false", tag = "1")]
    pub basic_block_index: Vec<i32>,
    #[prost(message, repeated, tag = "2")]
    pub edge: Vec<FlowGraphEdge>,
    /// Position in `basic_block_index`, as are the edge endpoints.
    #[prost(int32, optional, tag = "3")]
    pub entry_basic_block_index: Option<i32>,
}

/// Function origin evidence. Default: `Normal`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum VertexType {
    Normal = 0,
    Library = 1,
    Imported = 2,
    Thunk = 3,
    Invalid = 4,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Vertex {
    #[prost(uint64, optional, tag = "1")]
    pub address: Option<u64>,
    #[prost(enumeration = "VertexType", optional, tag = "2")]
    pub r#type: Option<i32>,
    #[prost(string, optional, tag = "3")]
    pub mangled_name: Option<String>,
    #[prost(string, optional, tag = "4")]
    pub demangled_name: Option<String>,
    #[prost(int32, optional, tag = "5")]
    pub library_index: Option<i32>,
    #[prost(int32, optional, tag = "6")]
    pub module_index: Option<i32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CallGraphEdge {
    #[prost(int32, optional, tag = "1")]
    pub source_vertex_index: Option<i32>,
    #[prost(int32, optional, tag = "2")]
    pub target_vertex_index: Option<i32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CallGraph {
    /// Sorted ascending by address; consumers binary-search this list.
    #[prost(message, repeated, tag = "1")]
    pub vertex: Vec<Vertex>,
    #[prost(message, repeated, tag = "2")]
    pub edge: Vec<CallGraphEdge>,
}

/// Comment placement and semantics. Default: `Plain`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum CommentType {
    Plain = 0,
    Anterior = 1,
    Posterior = 2,
    Function = 3,
    Enumeration = 4,
    Location = 5,
    GlobalReference = 6,
    LocalReference = 7,
    Structure = 8,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Comment {
    #[prost(int32, optional, tag = "1")]
    pub instruction_index: Option<i32>,
    #[prost(int32, optional, tag = "2")]
    pub instruction_operand_index: Option<i32>,
    #[prost(int32, optional, tag = "3")]
    pub operand_expression_index: Option<i32>,
    #[prost(int32, optional, tag = "4")]
    pub string_table_index: Option<i32>,
    #[prost(bool, optional, tag = "5")]
    pub repeatable: Option<bool>,
    #[prost(enumeration = "CommentType", optional, tag = "6")]
    pub r#type: Option<i32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Reference {
    #[prost(int32, optional, tag = "1")]
    pub instruction_index: Option<i32>,
    #[prost(int32, optional, tag = "2")]
    pub instruction_operand_index: Option<i32>,
    #[prost(int32, optional, tag = "3")]
    pub operand_expression_index: Option<i32>,
    #[prost(int32, optional, tag = "4")]
    pub string_table_index: Option<i32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExpressionSubstitution {
    #[prost(int32, optional, tag = "1")]
    pub instruction_index: Option<i32>,
    #[prost(int32, optional, tag = "2")]
    pub operand_index: Option<i32>,
    #[prost(int32, optional, tag = "3")]
    pub expression_index: Option<i32>,
    #[prost(int32, optional, tag = "4")]
    pub replacement_string_table_index: Option<i32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Section {
    #[prost(uint64, optional, tag = "1")]
    pub address: Option<u64>,
    #[prost(uint64, optional, tag = "2")]
    pub size: Option<u64>,
    #[prost(bool, optional, tag = "3")]
    pub flag_r: Option<bool>,
    #[prost(bool, optional, tag = "4")]
    pub flag_w: Option<bool>,
    #[prost(bool, optional, tag = "5")]
    pub flag_x: Option<bool>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Library {
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
    #[prost(bool, optional, tag = "2")]
    pub is_static: Option<bool>,
    /// Absence means "not loaded at a known address"; presence is semantic.
    #[prost(uint64, optional, tag = "3")]
    pub load_address: Option<u64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DataReference {
    #[prost(int32, optional, tag = "1")]
    pub instruction_index: Option<i32>,
    #[prost(uint64, optional, tag = "2")]
    pub address: Option<u64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Module {
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
}

/// Opaque extension record; the payload is carried, never interpreted.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MdIndex {
    #[prost(string, optional, tag = "1")]
    pub key: Option<String>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub payload: Option<Vec<u8>>,
}

/// The top-level message: every table of the interchange container.
///
/// Tables occupy fields 1 through 17. Field 10 carried an address-keyed
/// comment list in an older revision and its tag stays unused. The extension
/// sideband sits at a fixed high tag, clear of the table range.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BinaryGraph {
    #[prost(message, optional, tag = "1")]
    pub meta_information: Option<Meta>,
    #[prost(message, repeated, tag = "2")]
    pub expression: Vec<Expression>,
    #[prost(message, repeated, tag = "3")]
    pub operand: Vec<Operand>,
    #[prost(message, repeated, tag = "4")]
    pub mnemonic: Vec<Mnemonic>,
    #[prost(message, repeated, tag = "5")]
    pub instruction: Vec<Instruction>,
    #[prost(message, repeated, tag = "6")]
    pub basic_block: Vec<BasicBlock>,
    #[prost(message, repeated, tag = "7")]
    pub flow_graph: Vec<FlowGraph>,
    #[prost(message, optional, tag = "8")]
    pub call_graph: Option<CallGraph>,
    #[prost(string, repeated, tag = "9")]
    pub string_table: Vec<String>,
    #[prost(message, repeated, tag = "11")]
    pub comment: Vec<Comment>,
    #[prost(message, repeated, tag = "12")]
    pub string_reference: Vec<Reference>,
    #[prost(message, repeated, tag = "13")]
    pub expression_substitution: Vec<ExpressionSubstitution>,
    #[prost(message, repeated, tag = "14")]
    pub section: Vec<Section>,
    #[prost(message, repeated, tag = "15")]
    pub library: Vec<Library>,
    #[prost(message, repeated, tag = "16")]
    pub data_reference: Vec<DataReference>,
    #[prost(message, repeated, tag = "17")]
    pub module: Vec<Module>,
    #[prost(message, repeated, tag = "5000")]
    pub md_index: Vec<MdIndex>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_absent_fields_decode_as_defaults() {
        let empty = Instruction::default();
        let bytes = empty.encode_to_vec();
        assert!(bytes.is_empty());
        let back = Instruction::decode(bytes.as_slice()).unwrap();
        assert_eq!(back.mnemonic_index, None);
        assert_eq!(back.address, None);
    }

    #[test]
    fn test_present_zero_is_preserved() {
        // An explicit address of 0 is presence, not a default.
        let insn = Instruction {
            address: Some(0),
            ..Default::default()
        };
        let bytes = insn.encode_to_vec();
        assert!(!bytes.is_empty());
        let back = Instruction::decode(bytes.as_slice()).unwrap();
        assert_eq!(back.address, Some(0));
    }

    #[test]
    fn test_unknown_enum_values_survive_the_raw_layer() {
        // The raw field is an open i32; range checking happens in the reader.
        let expr = Expression {
            r#type: Some(99),
            ..Default::default()
        };
        let back = Expression::decode(expr.encode_to_vec().as_slice()).unwrap();
        assert_eq!(back.r#type, Some(99));
        assert!(ExpressionType::try_from(99).is_err());
    }
}
