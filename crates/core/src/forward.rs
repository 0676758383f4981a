//! # Forward Evaluation
//!
//! Demand-driven evaluation with memoised results. `value` recurses over
//! a node's inputs in slot-ascending order, applies the operator's forward
//! rule, and caches the scalar on the node. A cached value is returned as
//! is, so repeated evaluation of an unchanged graph is a table lookup.
//!
//! Dirty flags raised by [`Graph::invalidate`](crate::Graph::invalidate)
//! (or by any structural or payload mutation) are lowered lazily here:
//! the first read of a dirty node drops both caches before recomputing.

use petgraph::stable_graph::NodeIndex;

use crate::error::GraphError;
use crate::graph::Graph;
use crate::node::NodeRef;

impl Graph {
    /// Lower the dirty flag, dropping stale caches.
    pub(crate) fn lower_dirty(&mut self, i: NodeIndex) {
        let data = &mut self.pool[i];
        if data.dirty {
            data.dirty = false;
            data.clear_caches();
        }
    }

    /// Evaluate a node, reusing cached results where valid.
    ///
    /// Numeric domain faults are not intercepted: `ln(-1)` evaluates to
    /// NaN and division by zero to ±∞, and both propagate to consumers.
    pub fn value(&mut self, n: NodeRef) -> Result<f64, GraphError> {
        let i = self.resolve(n)?;
        self.value_at(i)
    }

    pub(crate) fn value_at(&mut self, i: NodeIndex) -> Result<f64, GraphError> {
        self.lower_dirty(i);
        if let Some(v) = self.pool[i].value {
            return Ok(v);
        }
        let inputs = self.sorted_inputs(i);
        let mut values = Vec::with_capacity(inputs.len());
        for (_, j) in inputs {
            values.push(self.value_at(j)?);
        }
        let v = self.pool[i].kind.forward(&values)?;
        self.pool[i].value = Some(v);
        Ok(v)
    }

    /// Values of a node's bound inputs, slot-ascending.
    pub(crate) fn input_values(&mut self, i: NodeIndex) -> Result<Vec<f64>, GraphError> {
        let inputs = self.sorted_inputs(i);
        let mut values = Vec::with_capacity(inputs.len());
        for (_, j) in inputs {
            values.push(self.value_at(j)?);
        }
        Ok(values)
    }
}
