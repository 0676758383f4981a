//! # Multilayer Perceptron
//!
//! [`MlpBuilder`] validates an ordered list of [`LayerSpec`]s and wires
//! the network inside a graph:
//!
//! 1. build every layer in order; the first layer's size is the input
//!    dimension;
//! 2. create one Constant(0) feed per first-layer neuron and wire feed i
//!    into neuron i with a unit weight;
//! 3. fully connect each consecutive layer pair with He-initialised
//!    weights;
//! 4. collect every weight, layer-major then neuron-major in insertion
//!    order (a layer's bias weights precede weights of later wiring);
//! 5. collect the last layer's outputs.
//!
//! The result borrows nothing: it holds handles plus its scope, and every
//! operation takes the graph explicitly.

use rand::rngs::StdRng;
use rand::SeedableRng;

use gradgraph_core::{Graph, GraphError, NodeRef, ScopeId};

use crate::error::NetError;
use crate::layer::{Layer, LayerSpec};

/// Validating builder for [`Mlp`].
#[derive(Debug, Clone, Default)]
pub struct MlpBuilder {
    layers: Vec<LayerSpec>,
    seed: Option<u64>,
}

impl MlpBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a layer description.
    pub fn layer(mut self, spec: LayerSpec) -> Self {
        self.layers.push(spec);
        self
    }

    /// Fix the weight-initialisation seed (tests want reproducible nets).
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validate the description and build the network.
    pub fn build(&self, g: &mut Graph) -> Result<Mlp, NetError> {
        if self.layers.is_empty() {
            return Err(NetError::EmptyNetwork);
        }
        if let Some(index) = self.layers.iter().position(|l| l.size == 0) {
            return Err(NetError::ZeroLayer { index });
        }
        let mut rng = match self.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Mlp::new(g, &self.layers, &mut rng)
    }
}

/// A feed-forward network as one sub-graph: input constants, chained
/// layers, and the flat weight list the optimisers index.
#[derive(Debug)]
pub struct Mlp {
    scope: ScopeId,
    layers: Vec<Layer>,
    inputs: Vec<NodeRef>,
    weights: Vec<NodeRef>,
    outputs: Vec<NodeRef>,
}

impl Mlp {
    fn new(g: &mut Graph, specs: &[LayerSpec], rng: &mut StdRng) -> Result<Self, NetError> {
        let scope = g.create_scope(None);

        let mut layers = Vec::with_capacity(specs.len());
        for spec in specs {
            layers.push(spec.build(g, Some(scope), rng)?);
        }

        // Feature feeds: constant i into neuron i, unit weight.
        let mut inputs = Vec::with_capacity(layers[0].len());
        for i in 0..layers[0].len() {
            let feed = g.factory(Some(scope)).labeled_constant(0.0, "X");
            layers[0].neuron_mut(i).add_input(g, feed, Some(1.0))?;
            inputs.push(feed);
        }

        for i in 0..layers.len().saturating_sub(1) {
            let (head, tail) = layers.split_at_mut(i + 1);
            head[i].connect_to_layer(g, &mut tail[0], rng)?;
        }

        let mut weights = Vec::new();
        for layer in &layers {
            for k in 0..layer.nb_weights() {
                weights.push(layer.weight(k));
            }
        }
        let last = layers.last().expect("validated non-empty");
        let outputs = (0..last.len()).map(|i| last.neuron(i).output()).collect();

        Ok(Self {
            scope,
            layers,
            inputs,
            weights,
            outputs,
        })
    }

    /// Input dimension (= first layer size).
    pub fn nb_inputs(&self) -> usize {
        self.inputs.len()
    }

    /// Output dimension (= last layer size).
    pub fn nb_outputs(&self) -> usize {
        self.outputs.len()
    }

    /// The i-th output node (for loss attachment).
    pub fn output_node(&self, index: usize) -> NodeRef {
        self.outputs[index]
    }

    /// Write one input feature.
    pub fn set_input(&self, g: &mut Graph, value: f64, index: usize) -> Result<(), GraphError> {
        g.set_constant(self.inputs[index], value)
    }

    /// Evaluate the i-th output.
    pub fn output(&self, g: &mut Graph, index: usize) -> Result<f64, GraphError> {
        g.value(self.outputs[index])
    }

    pub fn nb_weights(&self) -> usize {
        self.weights.len()
    }

    /// Overwrite one weight.
    pub fn set_weight(&self, g: &mut Graph, value: f64, index: usize) -> Result<(), GraphError> {
        g.set_constant(self.weights[index], value)
    }

    /// Current value of one weight.
    pub fn weight(&self, g: &Graph, index: usize) -> Result<f64, GraphError> {
        g.constant_value(self.weights[index])
    }

    /// Gradient of the attached objective with respect to one weight.
    pub fn weight_grad(&self, g: &mut Graph, index: usize) -> Result<f64, GraphError> {
        g.grad(self.weights[index])
    }

    /// Force a forward pass over every output.
    pub fn eval(&self, g: &mut Graph) -> Result<Vec<f64>, GraphError> {
        self.outputs.iter().map(|&o| g.value(o)).collect()
    }

    /// Force a backward pass over every weight, returning the gradients
    /// in weight order.
    pub fn diff(&self, g: &mut Graph) -> Result<Vec<f64>, GraphError> {
        self.weights.iter().map(|&w| g.grad(w)).collect()
    }

    pub fn layer(&self, index: usize) -> &Layer {
        &self.layers[index]
    }

    pub fn nb_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    /// Drop the whole network from the graph.
    pub fn release(self, g: &mut Graph) {
        g.release_scope(self.scope);
    }
}
