//! # Backward Pass - Reverse-Mode Accumulation
//!
//! `grad` computes the partial derivative of the expression's terminal
//! node with respect to the queried node, by walking the output adjacency
//! instead of replaying the whole tape:
//!
//! - a node with no consumers seeds itself with 1.0, so asking for the
//!   gradient of a weight inside a loss expression yields ∂loss/∂weight
//!   without naming the loss;
//! - any other node sums, over each consumer wiring,
//!   `grad(consumer) · ∂consumer/∂slot`.
//!
//! Results are cached next to the forward values and dropped by the same
//! dirty-flag mechanism, so one backward sweep prices every weight and a
//! weight update invalidates exactly the affected region.

use petgraph::stable_graph::NodeIndex;

use crate::error::GraphError;
use crate::graph::Graph;
use crate::node::NodeRef;

impl Graph {
    /// Accumulated upstream gradient of a node.
    ///
    /// Consumers are visited in wiring-insertion order; with a consumer
    /// wired at several slots each wiring contributes its own term.
    pub fn grad(&mut self, n: NodeRef) -> Result<f64, GraphError> {
        let i = self.resolve(n)?;
        self.grad_at(i)
    }

    fn grad_at(&mut self, i: NodeIndex) -> Result<f64, GraphError> {
        self.lower_dirty(i);
        if let Some(g) = self.pool[i].grad {
            return Ok(g);
        }
        let consumers = self.output_edges(i);
        let mut g = if consumers.is_empty() { 1.0 } else { 0.0 };
        for (consumer, slot) in consumers {
            g += self.grad_at(consumer)? * self.partial_at(consumer, slot)?;
        }
        self.pool[i].grad = Some(g);
        Ok(g)
    }

    /// Local partial derivative of a node with respect to the input bound
    /// at `slot`.
    pub fn partial(&mut self, n: NodeRef, slot: u32) -> Result<f64, GraphError> {
        let i = self.resolve(n)?;
        self.partial_at(i, slot)
    }

    fn partial_at(&mut self, i: NodeIndex, slot: u32) -> Result<f64, GraphError> {
        let inputs = self.sorted_inputs(i);
        // Slots need not be contiguous; the rule wants the position of the
        // binding among the bound inputs.
        let position = inputs
            .iter()
            .position(|(s, _)| *s == slot)
            .ok_or(GraphError::SlotVacant {
                op: self.pool[i].kind.op_name(),
                slot,
            })?;
        let values = self.input_values(i)?;
        self.pool[i].kind.partial(&values, position)
    }

    /// Central-difference estimate of ∂`output`/∂`constant`.
    ///
    /// Perturbs the Constant by ±h, re-evaluates, and restores the
    /// original value (invalidating the touched region each time). Meant
    /// for validating analytic gradients in tests.
    pub fn central_difference(
        &mut self,
        output: NodeRef,
        constant: NodeRef,
        h: f64,
    ) -> Result<f64, GraphError> {
        let base = self.constant_value(constant)?;
        self.set_constant(constant, base + h)?;
        let above = self.value(output)?;
        self.set_constant(constant, base - h)?;
        let below = self.value(output)?;
        self.set_constant(constant, base)?;
        Ok((above - below) / (2.0 * h))
    }
}
