//! # gradgraph-core - Scalar Compute Graphs with Autodiff
//!
//! A dynamic compute-graph engine for scalar arithmetic: expressions are
//! directed acyclic graphs of typed operator nodes, evaluated with
//! memoised forward caches and differentiated by reverse-mode
//! accumulation over the same structure.
//!
//! ## Modules
//!
//! - [`node`] - the closed set of operator kinds with forward and
//!   partial-derivative rules
//! - [`graph`] - node pool, slot-indexed edges, scoped ownership with
//!   cascade deletion
//! - [`factory`] - typed node constructors bound to a graph and scope
//! - [`forward`] / [`backward`] - cached evaluation, gradients, cache
//!   invalidation, central-difference checking
//! - [`visit`] - reachability traversals for external emitters
//! - [`error`] - structural error types
//!
//! ## Example
//!
//! ```rust
//! use gradgraph_core::Graph;
//!
//! // m = (a + b) * a with a = 2, b = 3
//! let mut g = Graph::new();
//! let (a, b, s, m) = {
//!     let mut f = g.factory(None);
//!     (f.constant(2.0), f.constant(3.0), f.add(), f.mult())
//! };
//! g.create_edge(None, a, s, None).unwrap();
//! g.create_edge(None, b, s, None).unwrap();
//! g.create_edge(None, s, m, None).unwrap();
//! g.create_edge(None, a, m, None).unwrap();
//!
//! assert_eq!(g.value(m).unwrap(), 10.0);
//! // dm/da = (a + b) + a, with the terminal seeding itself at 1.
//! assert_eq!(g.grad(a).unwrap(), 7.0);
//!
//! // Rewriting a constant invalidates exactly the affected caches.
//! g.set_constant(a, 4.0).unwrap();
//! assert_eq!(g.value(m).unwrap(), 28.0);
//! ```
//!
//! The engine is single threaded and mutation happens in place; a `Graph`
//! and everything reachable from it form one resource bounded by the
//! graph's lifetime.

pub mod backward;
pub mod error;
pub mod factory;
pub mod forward;
pub mod graph;
pub mod node;
pub mod visit;

// Re-export key types at crate root for convenience
pub use error::GraphError;
pub use factory::Factory;
pub use graph::{Edge, Graph, ScopeId};
pub use node::{Arity, NodeId, NodeKind, NodeRef};
pub use visit::{walk_backward, walk_forward, Visitor};
