//! # Training Sessions
//!
//! A thin driver that runs an optimiser for whole epochs and keeps the
//! mean loss of each one. The engine itself never inspects loss values;
//! the session is the caller that checks finiteness and aborts a run
//! whose loss degenerated to NaN or infinity.

use gradgraph_core::Graph;

use crate::error::NetError;
use crate::mlp::Mlp;
use crate::optim::{Optimizer, RunningMean};

/// Epoch driver with a per-epoch loss history.
#[derive(Debug)]
pub struct TrainingSession<O> {
    optimizer: O,
    history: Vec<f64>,
}

impl<O: Optimizer> TrainingSession<O> {
    pub fn new(optimizer: O) -> Self {
        Self {
            optimizer,
            history: Vec::new(),
        }
    }

    /// Run exactly one epoch and record its mean loss.
    pub fn run_epoch(&mut self, g: &mut Graph, mlp: &Mlp) -> Result<f64, NetError> {
        let mut epoch_loss = RunningMean::default();
        loop {
            let in_progress = self.optimizer.step(g, mlp)?;
            epoch_loss.push(self.optimizer.last_loss());
            if !in_progress {
                break;
            }
        }
        let mean = epoch_loss.mean();
        self.history.push(mean);
        if !mean.is_finite() {
            return Err(NetError::NonFiniteLoss {
                epoch: self.history.len() - 1,
            });
        }
        Ok(mean)
    }

    /// Run several epochs, stopping early on a degenerate loss.
    pub fn run(&mut self, g: &mut Graph, mlp: &Mlp, epochs: usize) -> Result<&[f64], NetError> {
        for _ in 0..epochs {
            self.run_epoch(g, mlp)?;
        }
        Ok(&self.history)
    }

    /// Mean loss per completed epoch.
    pub fn history(&self) -> &[f64] {
        &self.history
    }

    /// Access the optimiser, e.g. to adjust the learning rate mid-run.
    pub fn optimizer_mut(&mut self) -> &mut O {
        &mut self.optimizer
    }

    pub fn into_optimizer(self) -> O {
        self.optimizer
    }
}
