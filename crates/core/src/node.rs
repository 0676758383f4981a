//! # Operator Nodes
//!
//! This module defines [`NodeKind`], the closed set of scalar operators a
//! compute graph is built from. Each kind knows how to:
//!
//! - Execute forward (compute its value from its input values)
//! - Differentiate locally (the partial derivative with respect to one
//!   input slot, used by reverse-mode accumulation)
//!
//! ## Operators
//!
//! | Kind | Arity | Forward | ∂/∂input\[i\] |
//! |------|-------|---------|---------------|
//! | Identity | 1 | x₀ | 1 |
//! | Constant(v) | 0 | v | n/a |
//! | Add | n≥1 | Σxⱼ | 1 |
//! | Sub | 2 | x₀−x₁ | +1 / −1 |
//! | UnarySub | 1 | −x₀ | −1 |
//! | Mult | n≥2 | Πxⱼ | Πⱼ≠ᵢ xⱼ |
//! | Divide | 2 | x₀/x₁ | 1/x₁ / −x₀/x₁² |
//! | CteMult(c) | 1 | c·x₀ | c |
//! | CteDivide(c) | 1 | x₀/c | 1/c |
//! | CtePower(p) | 1 | x₀ᵖ | p·x₀ᵖ⁻¹ |
//! | Power | 2 | x₀^x₁ | x₁·x₀^(x₁−1) / x₀^x₁·ln x₁ |
//! | Exp | 1 | eˣ⁰ | eˣ⁰ |
//! | Ln | 1 | ln x₀ | 1/x₀ |
//! | Abs | 1 | \|x₀\| | sign(x₀), 0 at 0 |
//! | Invert | 1 | 1/x₀ | −1/x₀² |
//! | ReLU | 1 | max(0, x₀) | 0 if x₀≤0 else 1 |
//! | Sigmoid | 1 | σ(x₀) | σ·(1−σ) |
//! | Avg | n≥1 | (Σxⱼ)/n | 1/n |
//!
//! Arity is checked before any input value is read; violations surface as
//! [`GraphError::Arity`] instead of an out-of-bounds access. Domain faults
//! (`ln` of non-positives, division by zero) are not checked here: the
//! rules produce IEEE-754 non-finite values and let them propagate.

use std::fmt;

use petgraph::stable_graph::NodeIndex;

use crate::error::GraphError;

/// Stable identifier of a node, unique and monotonically increasing within
/// one root graph's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle to a node in a graph's pool.
///
/// Carries both the storage index and the node's stable id. Every graph
/// operation that resolves a handle checks the stored id against the pool,
/// so a handle kept across the node's removal is detected rather than
/// silently aliasing whatever reused the storage slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub(crate) index: NodeIndex,
    pub(crate) id: NodeId,
}

impl NodeRef {
    /// The node's stable identifier.
    pub fn id(&self) -> NodeId {
        self.id
    }
}

/// How many inputs an operator admits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// No inputs (constants).
    Nullary,
    /// Exactly one input.
    Unary,
    /// Exactly two inputs, slot order is significant.
    Binary,
    /// Any number of inputs from the given minimum up.
    AtLeast(usize),
}

impl Arity {
    /// Whether `n` bound inputs satisfy this arity.
    pub fn admits(self, n: usize) -> bool {
        match self {
            Arity::Nullary => n == 0,
            Arity::Unary => n == 1,
            Arity::Binary => n == 2,
            Arity::AtLeast(min) => n >= min,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Nullary => write!(f, "no"),
            Arity::Unary => write!(f, "exactly 1"),
            Arity::Binary => write!(f, "exactly 2"),
            Arity::AtLeast(min) => write!(f, "at least {}", min),
        }
    }
}

/// The operator a node applies to its inputs.
///
/// The set is closed; a tagged enum with central `forward` and `partial`
/// rules keeps the per-operator logic in one place instead of spreading it
/// over a type hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Passes its single input through unchanged.
    Identity,

    /// A leaf holding a mutable scalar. Weights and network inputs are
    /// constants whose value is rewritten between evaluations.
    Constant {
        value: f64,
        /// Optional display label (weights are tagged `W`, biases `B`).
        label: Option<String>,
    },

    /// Sum of all inputs.
    Add,

    /// `x₀ − x₁`.
    Sub,

    /// `−x₀`.
    UnarySub,

    /// Product of all inputs.
    Mult,

    /// `x₀ / x₁`.
    Divide,

    /// Multiplication by a fixed factor.
    CteMult(f64),

    /// Division by a fixed divisor.
    CteDivide(f64),

    /// Raise to a fixed integer exponent.
    CtePower(i32),

    /// `x₀ ^ x₁` with both operands in the graph.
    Power,

    /// `e ^ x₀`.
    Exp,

    /// Natural logarithm.
    Ln,

    /// Absolute value.
    Abs,

    /// `1 / x₀`.
    Invert,

    /// Rectified linear unit, `max(0, x₀)`.
    ReLU,

    /// Logistic sigmoid, `1 / (1 + e^−x₀)`.
    Sigmoid,

    /// Arithmetic mean of all inputs.
    Avg,
}

impl NodeKind {
    /// Short lowercase name used in error messages.
    pub fn op_name(&self) -> &'static str {
        match self {
            NodeKind::Identity => "identity",
            NodeKind::Constant { .. } => "constant",
            NodeKind::Add => "add",
            NodeKind::Sub => "sub",
            NodeKind::UnarySub => "unary-sub",
            NodeKind::Mult => "mult",
            NodeKind::Divide => "divide",
            NodeKind::CteMult(_) => "cte-mult",
            NodeKind::CteDivide(_) => "cte-divide",
            NodeKind::CtePower(_) => "cte-power",
            NodeKind::Power => "power",
            NodeKind::Exp => "exp",
            NodeKind::Ln => "ln",
            NodeKind::Abs => "abs",
            NodeKind::Invert => "invert",
            NodeKind::ReLU => "relu",
            NodeKind::Sigmoid => "sigmoid",
            NodeKind::Avg => "avg",
        }
    }

    /// Display label, as drawn by graph emitters.
    pub fn label(&self) -> String {
        match self {
            NodeKind::Identity => "Id".to_string(),
            NodeKind::Constant { value, label } => match label {
                Some(l) => l.clone(),
                None => format!("{}", value),
            },
            NodeKind::Add => "+".to_string(),
            NodeKind::Sub | NodeKind::UnarySub => "-".to_string(),
            NodeKind::Mult => "*".to_string(),
            NodeKind::Divide => "/".to_string(),
            NodeKind::CteMult(c) => format!("*{}", c),
            NodeKind::CteDivide(c) => format!("/{}", c),
            NodeKind::CtePower(p) => format!("^{}", p),
            NodeKind::Power => "^".to_string(),
            NodeKind::Exp => "exp".to_string(),
            NodeKind::Ln => "ln".to_string(),
            NodeKind::Abs => "abs".to_string(),
            NodeKind::Invert => "1/x".to_string(),
            NodeKind::ReLU => "ReLU".to_string(),
            NodeKind::Sigmoid => "Sigmoid".to_string(),
            NodeKind::Avg => "avg".to_string(),
        }
    }

    /// How many inputs this operator admits.
    pub fn arity(&self) -> Arity {
        match self {
            NodeKind::Constant { .. } => Arity::Nullary,
            NodeKind::Identity
            | NodeKind::UnarySub
            | NodeKind::CteMult(_)
            | NodeKind::CteDivide(_)
            | NodeKind::CtePower(_)
            | NodeKind::Exp
            | NodeKind::Ln
            | NodeKind::Abs
            | NodeKind::Invert
            | NodeKind::ReLU
            | NodeKind::Sigmoid => Arity::Unary,
            NodeKind::Sub | NodeKind::Divide | NodeKind::Power => Arity::Binary,
            NodeKind::Add | NodeKind::Avg => Arity::AtLeast(1),
            NodeKind::Mult => Arity::AtLeast(2),
        }
    }

    fn check_arity(&self, got: usize) -> Result<(), GraphError> {
        let expected = self.arity();
        if expected.admits(got) {
            Ok(())
        } else {
            Err(GraphError::Arity {
                op: self.op_name(),
                expected,
                got,
            })
        }
    }

    /// Execute the forward rule on the given input values.
    ///
    /// `inputs` holds the values of the bound input slots in slot-ascending
    /// order.
    pub fn forward(&self, inputs: &[f64]) -> Result<f64, GraphError> {
        self.check_arity(inputs.len())?;
        let v = match self {
            NodeKind::Identity => inputs[0],
            NodeKind::Constant { value, .. } => *value,
            NodeKind::Add => inputs.iter().sum(),
            NodeKind::Sub => inputs[0] - inputs[1],
            NodeKind::UnarySub => -inputs[0],
            NodeKind::Mult => inputs.iter().product(),
            NodeKind::Divide => inputs[0] / inputs[1],
            NodeKind::CteMult(c) => c * inputs[0],
            NodeKind::CteDivide(c) => inputs[0] / c,
            NodeKind::CtePower(p) => inputs[0].powi(*p),
            NodeKind::Power => inputs[0].powf(inputs[1]),
            NodeKind::Exp => inputs[0].exp(),
            NodeKind::Ln => inputs[0].ln(),
            NodeKind::Abs => inputs[0].abs(),
            NodeKind::Invert => 1.0 / inputs[0],
            NodeKind::ReLU => inputs[0].max(0.0),
            NodeKind::Sigmoid => 1.0 / (1.0 + (-inputs[0]).exp()),
            NodeKind::Avg => inputs.iter().sum::<f64>() / inputs.len() as f64,
        };
        Ok(v)
    }

    /// Partial derivative of the forward rule with respect to the input at
    /// position `slot` (an index into `inputs`, which is slot-ascending).
    ///
    /// Constants return 0.0: gradient never flows into a leaf's inputs
    /// because there are none.
    pub fn partial(&self, inputs: &[f64], slot: usize) -> Result<f64, GraphError> {
        self.check_arity(inputs.len())?;
        if !matches!(self, NodeKind::Constant { .. }) && slot >= inputs.len() {
            return Err(GraphError::SlotVacant {
                op: self.op_name(),
                slot: slot as u32,
            });
        }
        let d = match self {
            NodeKind::Identity => 1.0,
            NodeKind::Constant { .. } => 0.0,
            NodeKind::Add => 1.0,
            NodeKind::Sub => {
                if slot == 0 {
                    1.0
                } else {
                    -1.0
                }
            }
            NodeKind::UnarySub => -1.0,
            NodeKind::Mult => inputs
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != slot)
                .map(|(_, v)| v)
                .product(),
            NodeKind::Divide => {
                if slot == 0 {
                    1.0 / inputs[1]
                } else {
                    -inputs[0] / (inputs[1] * inputs[1])
                }
            }
            NodeKind::CteMult(c) => *c,
            NodeKind::CteDivide(c) => 1.0 / c,
            NodeKind::CtePower(p) => f64::from(*p) * inputs[0].powi(p - 1),
            NodeKind::Power => {
                if slot == 0 {
                    inputs[1] * inputs[0].powf(inputs[1] - 1.0)
                } else {
                    inputs[0].powf(inputs[1]) * inputs[1].ln()
                }
            }
            NodeKind::Exp => inputs[0].exp(),
            NodeKind::Ln => 1.0 / inputs[0],
            NodeKind::Abs => {
                let x = inputs[0];
                if x == 0.0 {
                    0.0
                } else if x < 0.0 {
                    -1.0
                } else {
                    1.0
                }
            }
            NodeKind::Invert => -1.0 / (inputs[0] * inputs[0]),
            NodeKind::ReLU => {
                if inputs[0] <= 0.0 {
                    0.0
                } else {
                    1.0
                }
            }
            NodeKind::Sigmoid => {
                let s = 1.0 / (1.0 + (-inputs[0]).exp());
                s * (1.0 - s)
            }
            NodeKind::Avg => 1.0 / inputs.len() as f64,
        };
        Ok(d)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Per-node state stored in the graph's pool.
///
/// Caches are populated lazily by `value`/`grad` and invalidated through
/// the dirty flag; the owner count tracks how many scopes (plus the root)
/// registered the node.
#[derive(Debug, Clone)]
pub(crate) struct NodeData {
    pub(crate) id: NodeId,
    pub(crate) kind: NodeKind,
    pub(crate) value: Option<f64>,
    pub(crate) grad: Option<f64>,
    pub(crate) dirty: bool,
    pub(crate) owners: u32,
}

impl NodeData {
    pub(crate) fn new(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            kind,
            value: None,
            grad: None,
            dirty: false,
            owners: 0,
        }
    }

    pub(crate) fn clear_caches(&mut self) {
        self.value = None;
        self.grad = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_basic_arithmetic() {
        assert_eq!(NodeKind::Add.forward(&[1.0, 2.0, 3.0]).unwrap(), 6.0);
        assert_eq!(NodeKind::Sub.forward(&[5.0, 2.0]).unwrap(), 3.0);
        assert_eq!(NodeKind::UnarySub.forward(&[4.0]).unwrap(), -4.0);
        assert_eq!(NodeKind::Mult.forward(&[2.0, 3.0, 4.0]).unwrap(), 24.0);
        assert_eq!(NodeKind::Divide.forward(&[6.0, 2.0]).unwrap(), 3.0);
        assert_eq!(NodeKind::Avg.forward(&[1.0, 2.0, 3.0]).unwrap(), 2.0);
    }

    #[test]
    fn forward_parameterised_kinds() {
        assert_eq!(NodeKind::CteMult(3.0).forward(&[2.0]).unwrap(), 6.0);
        assert_eq!(NodeKind::CteDivide(4.0).forward(&[2.0]).unwrap(), 0.5);
        assert_eq!(NodeKind::CtePower(3).forward(&[2.0]).unwrap(), 8.0);
        assert_eq!(NodeKind::Power.forward(&[2.0, 3.0]).unwrap(), 8.0);
        let c = NodeKind::Constant {
            value: 7.5,
            label: None,
        };
        assert_eq!(c.forward(&[]).unwrap(), 7.5);
    }

    #[test]
    fn forward_transcendental() {
        assert!((NodeKind::Exp.forward(&[1.0]).unwrap() - std::f64::consts::E).abs() < 1e-12);
        assert!((NodeKind::Ln.forward(&[std::f64::consts::E]).unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(NodeKind::Sigmoid.forward(&[0.0]).unwrap(), 0.5);
        assert_eq!(NodeKind::ReLU.forward(&[-2.0]).unwrap(), 0.0);
        assert_eq!(NodeKind::ReLU.forward(&[2.0]).unwrap(), 2.0);
        assert_eq!(NodeKind::Abs.forward(&[-3.0]).unwrap(), 3.0);
        assert_eq!(NodeKind::Invert.forward(&[4.0]).unwrap(), 0.25);
    }

    #[test]
    fn forward_arity_is_checked_before_reads() {
        // A divide with a single bound input must fail cleanly.
        let err = NodeKind::Divide.forward(&[1.0]).unwrap_err();
        assert!(matches!(err, GraphError::Arity { op: "divide", got: 1, .. }));

        let err = NodeKind::Mult.forward(&[1.0]).unwrap_err();
        assert!(matches!(err, GraphError::Arity { op: "mult", .. }));

        let err = NodeKind::Add.forward(&[]).unwrap_err();
        assert!(matches!(err, GraphError::Arity { op: "add", .. }));
    }

    #[test]
    fn partial_linear_kinds() {
        assert_eq!(NodeKind::Add.partial(&[1.0, 2.0], 0).unwrap(), 1.0);
        assert_eq!(NodeKind::Sub.partial(&[1.0, 2.0], 0).unwrap(), 1.0);
        assert_eq!(NodeKind::Sub.partial(&[1.0, 2.0], 1).unwrap(), -1.0);
        assert_eq!(NodeKind::UnarySub.partial(&[3.0], 0).unwrap(), -1.0);
        assert_eq!(NodeKind::CteMult(2.5).partial(&[9.0], 0).unwrap(), 2.5);
        assert_eq!(NodeKind::CteDivide(4.0).partial(&[9.0], 0).unwrap(), 0.25);
        assert_eq!(NodeKind::Avg.partial(&[1.0, 2.0, 3.0, 4.0], 2).unwrap(), 0.25);
    }

    #[test]
    fn partial_mult_excludes_own_slot() {
        // d(x*y*z)/dy = x*z
        let d = NodeKind::Mult.partial(&[2.0, 5.0, 3.0], 1).unwrap();
        assert_eq!(d, 6.0);
    }

    #[test]
    fn partial_divide() {
        // d(x/y)/dx = 1/y, d(x/y)/dy = -x/y^2
        assert_eq!(NodeKind::Divide.partial(&[6.0, 2.0], 0).unwrap(), 0.5);
        assert_eq!(NodeKind::Divide.partial(&[6.0, 2.0], 1).unwrap(), -1.5);
    }

    #[test]
    fn partial_powers() {
        // d(x^3)/dx = 3x^2 = 12 at x=2
        assert_eq!(NodeKind::CtePower(3).partial(&[2.0], 0).unwrap(), 12.0);
        // d(x^y)/dx = y*x^(y-1) = 3*4 = 12 at (2, 3)
        assert_eq!(NodeKind::Power.partial(&[2.0, 3.0], 0).unwrap(), 12.0);
    }

    #[test]
    fn partial_activations() {
        assert_eq!(NodeKind::ReLU.partial(&[-1.0], 0).unwrap(), 0.0);
        assert_eq!(NodeKind::ReLU.partial(&[0.0], 0).unwrap(), 0.0);
        assert_eq!(NodeKind::ReLU.partial(&[1.0], 0).unwrap(), 1.0);
        // sigma(0) = 0.5, so sigma' = 0.25
        assert_eq!(NodeKind::Sigmoid.partial(&[0.0], 0).unwrap(), 0.25);
    }

    #[test]
    fn partial_abs_sign() {
        assert_eq!(NodeKind::Abs.partial(&[-2.0], 0).unwrap(), -1.0);
        assert_eq!(NodeKind::Abs.partial(&[0.0], 0).unwrap(), 0.0);
        assert_eq!(NodeKind::Abs.partial(&[2.0], 0).unwrap(), 1.0);
    }

    #[test]
    fn numeric_faults_propagate_as_non_finite() {
        assert!(NodeKind::Divide.forward(&[1.0, 0.0]).unwrap().is_infinite());
        assert!(NodeKind::Ln.forward(&[-1.0]).unwrap().is_nan());
        assert!(NodeKind::Invert.forward(&[0.0]).unwrap().is_infinite());
    }

    #[test]
    fn labels() {
        assert_eq!(NodeKind::Add.label(), "+");
        assert_eq!(NodeKind::CteMult(2.0).label(), "*2");
        assert_eq!(NodeKind::CtePower(2).label(), "^2");
        let w = NodeKind::Constant {
            value: 1.0,
            label: Some("W".to_string()),
        };
        assert_eq!(w.label(), "W");
        let plain = NodeKind::Constant {
            value: 2.5,
            label: None,
        };
        assert_eq!(plain.label(), "2.5");
    }
}
