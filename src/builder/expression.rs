//! Operand assembly: flattening expression trees through the interner.
//!
//! The producer appends one root and then children referencing
//! already-appended parents, which is exactly pre-order; append order doubles
//! as sibling rendering order. `finish` resolves local parent handles to
//! global expression-table indices, interning every node on the way, so
//! identical subtrees in identical contexts collapse to identical entries.

use crate::builder::GraphBuilder;
use crate::core::expression::{Expression, ExpressionKind, Operand};
use crate::error::{BinGraphError, Result, Table};

/// Payload of one expression node, before interning.
#[derive(Debug, Clone)]
pub struct ExprNode {
    kind: ExpressionKind,
    symbol: Option<String>,
    immediate: Option<u64>,
    is_relocation: bool,
}

impl ExprNode {
    fn new(kind: ExpressionKind) -> Self {
        Self {
            kind,
            symbol: None,
            immediate: None,
            is_relocation: false,
        }
    }

    pub fn symbol(name: impl Into<String>) -> Self {
        let mut node = Self::new(ExpressionKind::Symbol);
        node.symbol = Some(name.into());
        node
    }

    pub fn immediate_int(value: u64) -> Self {
        let mut node = Self::new(ExpressionKind::ImmediateInt);
        node.immediate = Some(value);
        node
    }

    pub fn immediate_float(bits: u64) -> Self {
        let mut node = Self::new(ExpressionKind::ImmediateFloat);
        node.immediate = Some(bits);
        node
    }

    pub fn operator(symbol: impl Into<String>) -> Self {
        let mut node = Self::new(ExpressionKind::Operator);
        node.symbol = Some(symbol.into());
        node
    }

    pub fn register(name: impl Into<String>) -> Self {
        let mut node = Self::new(ExpressionKind::Register);
        node.symbol = Some(name.into());
        node
    }

    pub fn size_prefix(symbol: impl Into<String>) -> Self {
        let mut node = Self::new(ExpressionKind::SizePrefix);
        node.symbol = Some(symbol.into());
        node
    }

    pub fn dereference() -> Self {
        let mut node = Self::new(ExpressionKind::Dereference);
        node.symbol = Some("[".to_string());
        node
    }

    pub fn relocated(mut self) -> Self {
        self.is_relocation = true;
        self
    }
}

/// Handle to a node appended to one [`OperandBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExprId(usize);

/// Builds one operand's expression tree.
///
/// Obtained from [`GraphBuilder::operand`]; call [`OperandBuilder::finish`]
/// to intern the tree and get the operand index back.
pub struct OperandBuilder<'g> {
    graph: &'g mut GraphBuilder,
    nodes: Vec<(ExprNode, Option<usize>)>,
}

impl<'g> OperandBuilder<'g> {
    pub(crate) fn new(graph: &'g mut GraphBuilder) -> Self {
        Self {
            graph,
            nodes: Vec::new(),
        }
    }

    fn record(&self) -> usize {
        self.graph.operands.len()
    }

    /// Append the tree root. Exactly one root per operand.
    pub fn root(&mut self, node: ExprNode) -> Result<ExprId> {
        if !self.nodes.is_empty() {
            return Err(BinGraphError::integrity(
                Table::Operand,
                self.record(),
                "expression_index",
                "operand already has a root expression",
            ));
        }
        self.nodes.push((node, None));
        Ok(ExprId(0))
    }

    /// Append a child of an already-appended node.
    pub fn child(&mut self, parent: ExprId, node: ExprNode) -> Result<ExprId> {
        if parent.0 >= self.nodes.len() {
            return Err(BinGraphError::integrity(
                Table::Operand,
                self.record(),
                "expression_index",
                format!("parent handle {} does not name an appended node", parent.0),
            ));
        }
        let id = ExprId(self.nodes.len());
        self.nodes.push((node, Some(parent.0)));
        Ok(id)
    }

    /// Intern every node and the operand itself, returning the operand index.
    pub fn finish(self) -> Result<u32> {
        if self.nodes.is_empty() {
            return Err(BinGraphError::integrity(
                Table::Operand,
                self.record(),
                "expression_index",
                "operand has no expressions",
            ));
        }
        let mut global = Vec::with_capacity(self.nodes.len());
        for (node, parent) in self.nodes {
            let expression = Expression {
                kind: node.kind,
                symbol: node.symbol,
                immediate: node.immediate,
                parent_index: parent.map(|local| global[local]),
                is_relocation: node.is_relocation,
            };
            global.push(self.graph.expressions.intern(expression)?);
        }
        self.graph.operands.intern(Operand::new(global))
    }
}
