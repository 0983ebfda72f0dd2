//! Core data types for the bingraph interchange model.
//!
//! One file per table entity. All cross-references between entities are
//! 0-based `u32` indices into sibling tables of the owning
//! [`graph::BinaryGraph`] container, never pointers, so the whole graph can
//! be moved or handed out read-only as a unit.

pub mod annotation;
pub mod basic_block;
pub mod call_graph;
pub mod expression;
pub mod flow_graph;
pub mod graph;
pub mod instruction;
pub mod section;
