//! # Error Types
//!
//! Network-level failures: shape disagreements between a dataset and the
//! network it is bound to, invalid network descriptions, and anything the
//! underlying graph engine reports.

use thiserror::Error;

use gradgraph_core::GraphError;

/// Errors raised by network construction and training.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NetError {
    /// A graph-engine failure during construction or evaluation.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Dataset column counts disagree with the network's interface.
    #[error(
        "dataset shape mismatch: network takes {expected_in} inputs and \
         {expected_out} outputs, tables have {got_in} and {got_out} columns"
    )]
    DatasetShape {
        expected_in: usize,
        expected_out: usize,
        got_in: usize,
        got_out: usize,
    },

    /// A network was described with no layers.
    #[error("a network needs at least one layer")]
    EmptyNetwork,

    /// A layer was described with zero neurons.
    #[error("layer {index} has size 0")]
    ZeroLayer { index: usize },

    /// Training produced a non-finite loss; the run should be aborted.
    #[error("loss became non-finite during epoch {epoch}")]
    NonFiniteLoss { epoch: usize },
}
