//! # Node Factory
//!
//! Typed constructors bound to a graph and an optional scope. Every
//! constructor allocates a node, draws a fresh id from the root, registers
//! the node with the bound scope chain, and hands back the handle; nodes
//! cannot exist outside a graph.

use crate::graph::{Graph, ScopeId};
use crate::node::{NodeKind, NodeRef};

/// Short-lived builder for nodes of one graph.
pub struct Factory<'g> {
    graph: &'g mut Graph,
    scope: Option<ScopeId>,
}

impl Graph {
    /// A factory registering into the given scope (or the root only).
    pub fn factory(&mut self, scope: Option<ScopeId>) -> Factory<'_> {
        Factory { graph: self, scope }
    }
}

impl Factory<'_> {
    fn node(&mut self, kind: NodeKind) -> NodeRef {
        self.graph.add_node(kind, self.scope)
    }

    pub fn identity(&mut self) -> NodeRef {
        self.node(NodeKind::Identity)
    }

    pub fn constant(&mut self, value: f64) -> NodeRef {
        self.node(NodeKind::Constant { value, label: None })
    }

    /// A constant carrying a display label (weights, biases, truths).
    pub fn labeled_constant(&mut self, value: f64, label: &str) -> NodeRef {
        self.node(NodeKind::Constant {
            value,
            label: Some(label.to_string()),
        })
    }

    pub fn add(&mut self) -> NodeRef {
        self.node(NodeKind::Add)
    }

    pub fn sub(&mut self) -> NodeRef {
        self.node(NodeKind::Sub)
    }

    pub fn unary_sub(&mut self) -> NodeRef {
        self.node(NodeKind::UnarySub)
    }

    pub fn mult(&mut self) -> NodeRef {
        self.node(NodeKind::Mult)
    }

    pub fn divide(&mut self) -> NodeRef {
        self.node(NodeKind::Divide)
    }

    pub fn cte_mult(&mut self, factor: f64) -> NodeRef {
        self.node(NodeKind::CteMult(factor))
    }

    pub fn cte_divide(&mut self, divisor: f64) -> NodeRef {
        self.node(NodeKind::CteDivide(divisor))
    }

    pub fn cte_power(&mut self, power: i32) -> NodeRef {
        self.node(NodeKind::CtePower(power))
    }

    pub fn power(&mut self) -> NodeRef {
        self.node(NodeKind::Power)
    }

    pub fn exp(&mut self) -> NodeRef {
        self.node(NodeKind::Exp)
    }

    pub fn ln(&mut self) -> NodeRef {
        self.node(NodeKind::Ln)
    }

    pub fn abs(&mut self) -> NodeRef {
        self.node(NodeKind::Abs)
    }

    pub fn invert(&mut self) -> NodeRef {
        self.node(NodeKind::Invert)
    }

    pub fn relu(&mut self) -> NodeRef {
        self.node(NodeKind::ReLU)
    }

    pub fn sigmoid(&mut self) -> NodeRef {
        self.node(NodeKind::Sigmoid)
    }

    pub fn avg(&mut self) -> NodeRef {
        self.node(NodeKind::Avg)
    }
}
