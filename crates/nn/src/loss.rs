//! # Loss Sub-Graphs
//!
//! A loss accumulates (predicted, truth) pairs incrementally and exposes
//! one scalar output node:
//!
//! - **L2**: per pair `truth - predicted`, squared, into a running sum.
//! - **MSE**: L2 followed by a constant division whose divisor is bumped
//!   to the pair count as pairs are added (a build-time divisor, not a
//!   per-evaluation one).
//! - **L1**: per pair `predicted - truth`, absolute value, into the sum.
//!
//! The loss owns every node it creates; adding pairs extends its scope.

use gradgraph_core::{Graph, GraphError, NodeRef, ScopeId};

/// Which reduction the loss applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossKind {
    /// Sum of absolute differences.
    L1,
    /// Sum of squared differences.
    L2,
    /// Mean of squared differences.
    Mse,
}

/// An incrementally built loss expression.
#[derive(Debug)]
pub struct Loss {
    kind: LossKind,
    scope: ScopeId,
    sum: NodeRef,
    mean: Option<NodeRef>,
    pairs: usize,
}

impl Loss {
    pub fn new(g: &mut Graph, parent: Option<ScopeId>, kind: LossKind) -> Result<Self, GraphError> {
        let scope = g.create_scope(parent);
        let sum = g.factory(Some(scope)).add();
        let mean = match kind {
            LossKind::Mse => {
                let div = g.factory(Some(scope)).cte_divide(0.0);
                g.create_edge(Some(scope), sum, div, None)?;
                Some(div)
            }
            _ => None,
        };
        Ok(Self {
            kind,
            scope,
            sum,
            mean,
            pairs: 0,
        })
    }

    /// Extend the loss with one (predicted, truth) pair.
    pub fn add_pair(
        &mut self,
        g: &mut Graph,
        predicted: NodeRef,
        truth: NodeRef,
    ) -> Result<(), GraphError> {
        let scope = Some(self.scope);
        match self.kind {
            LossKind::L2 | LossKind::Mse => {
                let (sub, squared) = {
                    let mut f = g.factory(scope);
                    (f.sub(), f.cte_power(2))
                };
                g.create_edge(scope, truth, sub, Some(0))?;
                g.create_edge(scope, predicted, sub, Some(1))?;
                g.create_edge(scope, sub, squared, Some(0))?;
                g.create_edge(scope, squared, self.sum, None)?;
            }
            LossKind::L1 => {
                let (sub, magnitude) = {
                    let mut f = g.factory(scope);
                    (f.sub(), f.abs())
                };
                g.create_edge(scope, predicted, sub, Some(0))?;
                g.create_edge(scope, truth, sub, Some(1))?;
                g.create_edge(scope, sub, magnitude, Some(0))?;
                g.create_edge(scope, magnitude, self.sum, None)?;
            }
        }
        self.pairs += 1;
        if let Some(mean) = self.mean {
            g.set_cte_divide(mean, self.pairs as f64)?;
        }
        Ok(())
    }

    /// The scalar node carrying the current total (or mean) loss.
    pub fn output(&self) -> NodeRef {
        self.mean.unwrap_or(self.sum)
    }

    pub fn kind(&self) -> LossKind {
        self.kind
    }

    /// How many pairs have been attached.
    pub fn nb_pairs(&self) -> usize {
        self.pairs
    }

    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    /// Drop every node the loss created.
    pub fn release(self, g: &mut Graph) {
        g.release_scope(self.scope);
    }
}
