//! # gradgraph-nn - Networks over Scalar Compute Graphs
//!
//! Structural builders that compose `gradgraph-core` operator nodes into
//! feed-forward networks, plus the loss expressions and gradient-descent
//! optimisers that train them. Every builder is a scoped view over one
//! shared graph: it registers the nodes it creates and releases exactly
//! those on teardown.
//!
//! ## Modules
//!
//! - [`dataset`] - row-major input/output tables
//! - [`neuron`] - aggregation, activation and single-neuron builders
//! - [`layer`] - neuron rows, He initialisation, layer wiring
//! - [`mlp`] - validated network construction and the weight interface
//! - [`loss`] - L1, L2 and MSE sub-graphs built pair by pair
//! - [`optim`] - full-batch and stochastic gradient descent with
//!   classical and Nesterov momentum
//! - [`train`] - epoch driver with a loss history
//! - [`error`] - network-level error types
//!
//! ## Example
//!
//! ```rust
//! use gradgraph_core::Graph;
//! use gradgraph_nn::dataset::{DataSet, DataTable};
//! use gradgraph_nn::layer::LayerSpec;
//! use gradgraph_nn::loss::LossKind;
//! use gradgraph_nn::mlp::MlpBuilder;
//! use gradgraph_nn::neuron::ActivationKind;
//! use gradgraph_nn::optim::{Optimizer, SgdOptimizer};
//!
//! let mut g = Graph::new();
//! let mlp = MlpBuilder::new()
//!     .layer(LayerSpec::new(1, ActivationKind::Identity, false))
//!     .seed(1)
//!     .build(&mut g)
//!     .unwrap();
//!
//! let mut opt = SgdOptimizer::new(&mut g, &mlp, LossKind::Mse, 0.1, 0.0).unwrap();
//! opt.reseed(1);
//! let data = DataSet::new(
//!     DataTable::new(1, vec![2.0]),
//!     DataTable::new(1, vec![5.0]),
//! );
//! opt.set_dataset(&mlp, data).unwrap();
//!
//! // One step over the single example crosses the epoch boundary.
//! assert!(!opt.step(&mut g, &mlp).unwrap());
//! assert_eq!(opt.last_loss(), 9.0);
//! ```

pub mod dataset;
pub mod error;
pub mod layer;
pub mod loss;
pub mod mlp;
pub mod neuron;
pub mod optim;
pub mod train;

// Re-export key types at crate root for convenience
pub use dataset::{DataSet, DataTable};
pub use error::NetError;
pub use layer::{Layer, LayerSpec};
pub use loss::{Loss, LossKind};
pub use mlp::{Mlp, MlpBuilder};
pub use neuron::{Activation, ActivationKind, Aggregate, AggregateKind, Neuron};
pub use optim::{BatchOptimizer, Optimizer, RunningMean, SgdOptimizer};
pub use train::TrainingSession;
