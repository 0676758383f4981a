//! # Gradient-Descent Optimisers
//!
//! An optimiser owns a small harness sub-graph: one truth constant per
//! network output, paired with that output in a [`Loss`]. Each step pulls
//! one dataset row, pushes the features and truths into their constants,
//! evaluates the loss (forward), reads every weight gradient (backward),
//! and applies its update rule. `step` returns `true` while the epoch is
//! in progress and `false` exactly when the call crossed the epoch
//! boundary.
//!
//! Two strategies are provided:
//!
//! - [`BatchOptimizer`] sweeps rows in order, folds each gradient into a
//!   running mean per weight, and applies one momentum update per epoch.
//! - [`SgdOptimizer`] visits rows through a shuffled permutation and
//!   updates immediately per example, with classical or Nesterov
//!   momentum.
//!
//! `learning_rate`, `momentum` and (for SGD) `nesterov` are public fields
//! and may be adjusted between steps.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use gradgraph_core::{Graph, GraphError, NodeRef};

use crate::dataset::DataSet;
use crate::error::NetError;
use crate::loss::{Loss, LossKind};
use crate::mlp::Mlp;

/// Incremental mean, folded one sample at a time.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunningMean {
    value: f64,
    count: usize,
}

impl RunningMean {
    pub fn push(&mut self, sample: f64) {
        if self.count == 0 {
            self.value = sample;
        } else {
            self.value = (self.count as f64 * self.value + sample) / (self.count as f64 + 1.0);
        }
        self.count += 1;
    }

    pub fn mean(&self) -> f64 {
        self.value
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// The truth constants and loss attached to a network's outputs.
#[derive(Debug)]
struct LossHead {
    truths: Vec<NodeRef>,
    loss: Loss,
}

impl LossHead {
    fn new(g: &mut Graph, mlp: &Mlp, kind: LossKind) -> Result<Self, GraphError> {
        let scope = g.create_scope(None);
        let mut loss = Loss::new(g, Some(scope), kind)?;
        let mut truths = Vec::with_capacity(mlp.nb_outputs());
        for i in 0..mlp.nb_outputs() {
            let truth = g.factory(Some(scope)).labeled_constant(0.0, "T");
            loss.add_pair(g, mlp.output_node(i), truth)?;
            truths.push(truth);
        }
        Ok(Self { truths, loss })
    }

    /// Push one dataset row and evaluate the loss.
    fn forward(
        &self,
        g: &mut Graph,
        mlp: &Mlp,
        dataset: &DataSet,
        row: usize,
    ) -> Result<f64, GraphError> {
        for col in 0..dataset.inputs().width() {
            mlp.set_input(g, dataset.inputs().get(row, col), col)?;
        }
        for col in 0..dataset.outputs().width() {
            g.set_constant(self.truths[col], dataset.outputs().get(row, col))?;
        }
        g.value(self.loss.output())
    }
}

fn check_shape(mlp: &Mlp, dataset: &DataSet) -> Result<(), NetError> {
    assert!(!dataset.is_empty(), "cannot train on an empty dataset");
    if dataset.inputs().width() != mlp.nb_inputs()
        || dataset.outputs().width() != mlp.nb_outputs()
    {
        return Err(NetError::DatasetShape {
            expected_in: mlp.nb_inputs(),
            expected_out: mlp.nb_outputs(),
            got_in: dataset.inputs().width(),
            got_out: dataset.outputs().width(),
        });
    }
    Ok(())
}

/// One training step; shared by the concrete strategies and the training
/// session driver.
pub trait Optimizer {
    /// Run one step. `Ok(false)` marks the epoch boundary.
    fn step(&mut self, g: &mut Graph, mlp: &Mlp) -> Result<bool, NetError>;

    /// Loss of the most recent step (NaN before the first).
    fn last_loss(&self) -> f64;
}

/// Full-batch gradient descent: gradients averaged over the epoch, one
/// momentum update at each epoch boundary.
#[derive(Debug)]
pub struct BatchOptimizer {
    pub learning_rate: f64,
    pub momentum: f64,
    head: LossHead,
    dataset: Option<DataSet>,
    cursor: usize,
    velocities: Vec<f64>,
    mean_grads: Vec<RunningMean>,
    last_loss: f64,
}

impl BatchOptimizer {
    pub fn new(
        g: &mut Graph,
        mlp: &Mlp,
        loss: LossKind,
        learning_rate: f64,
        momentum: f64,
    ) -> Result<Self, NetError> {
        Ok(Self {
            learning_rate,
            momentum,
            head: LossHead::new(g, mlp, loss)?,
            dataset: None,
            cursor: 0,
            velocities: Vec::new(),
            mean_grads: Vec::new(),
            last_loss: f64::NAN,
        })
    }

    /// Bind the training data. Column counts must match the network.
    pub fn set_dataset(&mut self, mlp: &Mlp, dataset: DataSet) -> Result<(), NetError> {
        check_shape(mlp, &dataset)?;
        self.dataset = Some(dataset);
        self.cursor = 0;
        self.velocities = vec![0.0; mlp.nb_weights()];
        self.mean_grads = vec![RunningMean::default(); mlp.nb_weights()];
        Ok(())
    }

    /// The scalar node carrying the harness loss.
    pub fn loss_output(&self) -> NodeRef {
        self.head.loss.output()
    }

    fn next_row(&self) -> usize {
        self.cursor
    }
}

impl Optimizer for BatchOptimizer {
    fn step(&mut self, g: &mut Graph, mlp: &Mlp) -> Result<bool, NetError> {
        let dataset = self
            .dataset
            .as_ref()
            .expect("optimizer stepped before set_dataset");

        let row = self.next_row();
        self.last_loss = self.head.forward(g, mlp, dataset, row)?;
        let grads = mlp.diff(g)?;
        for (mean, grad) in self.mean_grads.iter_mut().zip(&grads) {
            mean.push(*grad);
        }

        self.cursor += 1;
        if self.cursor < dataset.len() {
            return Ok(true);
        }
        self.cursor = 0;
        for i in 0..self.velocities.len() {
            self.velocities[i] =
                self.momentum * self.velocities[i] - self.learning_rate * self.mean_grads[i].mean();
            let updated = mlp.weight(g, i)? + self.velocities[i];
            mlp.set_weight(g, updated, i)?;
            self.mean_grads[i].reset();
        }
        Ok(false)
    }

    fn last_loss(&self) -> f64 {
        self.last_loss
    }
}

/// Stochastic gradient descent over a reshuffled permutation, updating
/// after every example.
#[derive(Debug)]
pub struct SgdOptimizer {
    pub learning_rate: f64,
    pub momentum: f64,
    pub nesterov: bool,
    head: LossHead,
    dataset: Option<DataSet>,
    cursor: usize,
    order: Vec<usize>,
    velocities: Vec<f64>,
    rng: StdRng,
    last_loss: f64,
}

impl SgdOptimizer {
    pub fn new(
        g: &mut Graph,
        mlp: &Mlp,
        loss: LossKind,
        learning_rate: f64,
        momentum: f64,
    ) -> Result<Self, NetError> {
        Ok(Self {
            learning_rate,
            momentum,
            nesterov: false,
            head: LossHead::new(g, mlp, loss)?,
            dataset: None,
            cursor: 0,
            order: Vec::new(),
            velocities: Vec::new(),
            rng: StdRng::from_entropy(),
            last_loss: f64::NAN,
        })
    }

    /// Replace the shuffling RNG with a seeded one, for reproducible
    /// visiting order. Call before `set_dataset`.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Bind the training data and shuffle the first epoch's permutation.
    pub fn set_dataset(&mut self, mlp: &Mlp, dataset: DataSet) -> Result<(), NetError> {
        check_shape(mlp, &dataset)?;
        self.order = (0..dataset.len()).collect();
        self.order.shuffle(&mut self.rng);
        self.dataset = Some(dataset);
        self.cursor = 0;
        self.velocities = vec![0.0; mlp.nb_weights()];
        Ok(())
    }

    /// The scalar node carrying the harness loss.
    pub fn loss_output(&self) -> NodeRef {
        self.head.loss.output()
    }

    /// The dataset row the next step will use.
    pub fn next_row(&self) -> usize {
        self.order[self.cursor]
    }
}

impl Optimizer for SgdOptimizer {
    fn step(&mut self, g: &mut Graph, mlp: &Mlp) -> Result<bool, NetError> {
        let dataset = self
            .dataset
            .as_ref()
            .expect("optimizer stepped before set_dataset");

        let row = self.order[self.cursor];
        self.last_loss = self.head.forward(g, mlp, dataset, row)?;
        let grads = mlp.diff(g)?;

        for (i, grad) in grads.iter().enumerate() {
            let velocity = self.momentum * self.velocities[i] - self.learning_rate * grad;
            let weight = mlp.weight(g, i)?;
            let updated = if self.nesterov {
                // Look ahead along the fresh velocity.
                weight + self.momentum * velocity - self.learning_rate * grad
            } else {
                weight + velocity
            };
            self.velocities[i] = velocity;
            mlp.set_weight(g, updated, i)?;
        }

        self.cursor += 1;
        if self.cursor < dataset.len() {
            return Ok(true);
        }
        self.cursor = 0;
        self.order.shuffle(&mut self.rng);
        Ok(false)
    }

    fn last_loss(&self) -> f64 {
        self.last_loss
    }
}
