//! Codec: between the in-memory model and the compact wire form.
//!
//! [`encode`] validates and serializes a [`crate::BinaryGraph`] into a single
//! length-delimited message; [`decode`] parses bytes and runs the full
//! index-integrity pass before returning the graph. Both directions are pure
//! functions over their inputs; transport framing, compression, and file
//! naming belong to the caller.

pub mod reader;
pub mod validate;
pub mod wire;
pub mod writer;

pub use reader::decode;
pub use writer::encode;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graph::BinaryGraph;
    use crate::core::instruction::{Instruction, Mnemonic};
    use crate::error::{BinGraphError, Table};

    fn one_instruction_graph() -> BinaryGraph {
        let mut graph = BinaryGraph::new();
        graph.mnemonic.push(Mnemonic::new("nop"));
        graph.instruction.push(Instruction {
            address: Some(0x1000),
            call_target: Vec::new(),
            mnemonic_index: 0,
            operand_index: Vec::new(),
            raw_bytes: vec![0x90],
            comment_index: Vec::new(),
        });
        graph
    }

    #[test]
    fn test_round_trip_is_structural_identity() {
        let graph = one_instruction_graph();
        let bytes = encode(&graph).unwrap();
        let back = decode(&bytes).unwrap();
        assert_eq!(graph, back);
    }

    #[test]
    fn test_encode_rejects_invalid_graphs() {
        let mut graph = one_instruction_graph();
        graph.instruction[0].mnemonic_index = 5;
        let err = encode(&graph).unwrap_err();
        assert!(matches!(
            err,
            BinGraphError::DataIntegrity {
                table: Table::Instruction,
                field: "mnemonic_index",
                ..
            }
        ));
    }

    #[test]
    fn test_truncated_bytes_are_a_decode_error() {
        let bytes = encode(&one_instruction_graph()).unwrap();
        let err = decode(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(matches!(err, BinGraphError::Decode(_)));
    }

    #[test]
    fn test_garbage_bytes_are_a_decode_error() {
        let err = decode(&[0xff, 0xff, 0xff, 0xff]).unwrap_err();
        assert!(matches!(err, BinGraphError::Decode(_)));
    }
}
