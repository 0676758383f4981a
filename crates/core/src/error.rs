//! # Error Types
//!
//! Errors in the graph engine are structural: they report attempts to read
//! through a handle that no longer resolves, or to apply an operator rule
//! to a node whose input bindings cannot satisfy it.
//!
//! Numeric faults (division by zero, `ln` of a non-positive value) are not
//! errors at this level. The engine lets IEEE-754 non-finite values
//! propagate and leaves finiteness checks to callers.

use thiserror::Error;

use crate::node::Arity;

/// Errors raised by graph construction and evaluation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GraphError {
    /// A handle referred to a node that has been removed from the pool,
    /// or whose storage slot has since been reused.
    #[error("node {id} is not in the graph")]
    NodeNotFound { id: u32 },

    /// A scope identifier referred to a scope that was already released.
    #[error("scope {index} has been released or never existed")]
    ScopeNotFound { index: usize },

    /// An operator was evaluated with the wrong number of inputs.
    #[error("`{op}` expects {expected} input(s), got {got}")]
    Arity {
        op: &'static str,
        expected: Arity,
        got: usize,
    },

    /// A partial derivative was requested for a slot with no binding.
    #[error("`{op}` has no input bound at slot {slot}")]
    SlotVacant { op: &'static str, slot: u32 },

    /// A payload setter was applied to a node of the wrong kind.
    #[error("expected a `{expected}` node, found `{got}`")]
    KindMismatch {
        expected: &'static str,
        got: &'static str,
    },
}
