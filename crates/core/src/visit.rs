//! # Traversal Visitors
//!
//! Hooks for walking every node reachable from a starting point, used by
//! external emitters (textual rendering, statistics) that should not care
//! about the pool representation.
//!
//! Two directions are offered: [`walk_forward`] follows input bindings
//! (the nodes a value depends on), [`walk_backward`] follows consumers
//! (the nodes a change propagates to). Either way each node is visited
//! exactly once per traversal, identified by its stable id and kind.

use std::collections::HashSet;

use crate::error::GraphError;
use crate::graph::Graph;
use crate::node::{NodeId, NodeKind, NodeRef};

/// Per-node hook invoked during a traversal.
pub trait Visitor {
    fn visit(&mut self, id: NodeId, kind: &NodeKind);
}

/// Blanket impl so plain closures can be used as visitors.
impl<F: FnMut(NodeId, &NodeKind)> Visitor for F {
    fn visit(&mut self, id: NodeId, kind: &NodeKind) {
        self(id, kind)
    }
}

/// Walk the input adjacency from `start`, depth first.
pub fn walk_forward(g: &Graph, start: NodeRef, v: &mut impl Visitor) -> Result<(), GraphError> {
    walk(g, start, v, |g, n| {
        g.inputs_of(n)
            .map(|inputs| inputs.into_iter().map(|(_, src)| src).collect())
    })
}

/// Walk the output adjacency from `start`, depth first.
pub fn walk_backward(g: &Graph, start: NodeRef, v: &mut impl Visitor) -> Result<(), GraphError> {
    walk(g, start, v, Graph::outputs_of)
}

fn walk(
    g: &Graph,
    start: NodeRef,
    v: &mut impl Visitor,
    next: impl Fn(&Graph, NodeRef) -> Result<Vec<NodeRef>, GraphError>,
) -> Result<(), GraphError> {
    let mut seen: HashSet<NodeId> = HashSet::new();
    let mut stack = vec![start];
    while let Some(n) = stack.pop() {
        if !seen.insert(n.id()) {
            continue;
        }
        let kind = g.kind(n)?;
        v.visit(n.id(), kind);
        stack.extend(next(g, n)?);
    }
    Ok(())
}
