//! Compact, deduplicated interchange codec for disassembled binaries.
//!
//! The crate models a disassembled executable as a set of append-only tables
//! (strings, mnemonics, expressions, operands, instructions, basic blocks,
//! flow graphs, one call graph, and auxiliary annotation records) in which
//! every cross-reference is a plain integer index into a sibling table. Deep
//! structural sharing comes from interning: repeated substructures are stored
//! once and referenced many times, so adversarially repetitive input costs
//! O(distinct content) storage.
//!
//! Three layers:
//!
//! - [`core`] holds the validated in-memory model ([`BinaryGraph`] and its
//!   table record types);
//! - [`builder`] assembles a model incrementally from a disassembly producer,
//!   maintaining the dedup and ordering invariants by construction;
//! - [`codec`] moves between the model and the compact length-delimited wire
//!   form, running a full index-integrity pass on every decode before any
//!   caller sees the graph.

/// Core data model: tables, records, and the top-level container.
pub mod core;

/// Incremental graph assembly on top of the interning layer.
pub mod builder;

/// Wire-format encoding, decoding, and validation.
pub mod codec;

/// Structured error taxonomy.
pub mod error;

/// Canonicalizing insert-or-find tables.
pub mod intern;

/// Logging and tracing infrastructure.
pub mod logging;

pub use crate::builder::GraphBuilder;
pub use crate::codec::{decode, encode};
pub use crate::core::graph::BinaryGraph;
pub use crate::error::{BinGraphError, Result, Table};
