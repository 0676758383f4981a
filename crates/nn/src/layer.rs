//! # Layers
//!
//! A layer is a fixed-size row of neurons sharing one activation kind.
//! Wiring helpers fan an upstream node (or a whole upstream layer) into
//! every neuron, each time with an independent weight drawn from the He
//! distribution `N(0, sqrt(2 / fan_in))`.
//!
//! Weight enumeration is neuron-major: all weights of neuron 0 in their
//! insertion order, then neuron 1, and so on. An optional bias is a
//! single Constant(1.0) fed to every neuron through `add_input`, so it
//! contributes exactly one extra weight per neuron, inserted before any
//! later connections.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use gradgraph_core::{Graph, GraphError, NodeRef, ScopeId};

use crate::error::NetError;
use crate::neuron::{ActivationKind, AggregateKind, Neuron};

fn he_normal(fan_in: usize) -> Normal<f64> {
    let sigma = (2.0 / fan_in.max(1) as f64).sqrt();
    Normal::new(0.0, sigma).expect("He standard deviation is finite and positive")
}

/// Value-type description of one layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerSpec {
    pub size: usize,
    pub activation: ActivationKind,
    pub bias: bool,
}

impl LayerSpec {
    pub fn new(size: usize, activation: ActivationKind, bias: bool) -> Self {
        Self {
            size,
            activation,
            bias,
        }
    }

    /// Materialise the layer inside a graph.
    pub fn build(
        &self,
        g: &mut Graph,
        parent: Option<ScopeId>,
        rng: &mut impl Rng,
    ) -> Result<Layer, NetError> {
        Layer::new(g, parent, *self, rng)
    }
}

/// A row of neurons of one activation kind.
#[derive(Debug)]
pub struct Layer {
    scope: ScopeId,
    activation: ActivationKind,
    neurons: Vec<Neuron>,
    bias: Option<NodeRef>,
}

impl Layer {
    fn new(
        g: &mut Graph,
        parent: Option<ScopeId>,
        spec: LayerSpec,
        rng: &mut impl Rng,
    ) -> Result<Self, NetError> {
        if spec.size == 0 {
            return Err(NetError::ZeroLayer { index: 0 });
        }
        let scope = g.create_scope(parent);
        let mut neurons = Vec::with_capacity(spec.size);
        for _ in 0..spec.size {
            neurons.push(Neuron::new(
                g,
                Some(scope),
                AggregateKind::Sum,
                spec.activation,
            )?);
        }
        let mut layer = Self {
            scope,
            activation: spec.activation,
            neurons,
            bias: None,
        };
        if spec.bias {
            let bias = g.factory(Some(scope)).labeled_constant(1.0, "B");
            layer.add_input(g, bias, rng)?;
            layer.bias = Some(bias);
        }
        Ok(layer)
    }

    /// Feed one upstream node into every neuron, each with its own
    /// freshly sampled weight.
    pub fn add_input(
        &mut self,
        g: &mut Graph,
        node: NodeRef,
        rng: &mut impl Rng,
    ) -> Result<(), GraphError> {
        let dist = he_normal(self.neurons.len());
        for neuron in &mut self.neurons {
            let w = dist.sample(rng);
            neuron.add_input(g, node, Some(w))?;
        }
        Ok(())
    }

    /// Fully connect this layer into the next: every (source neuron,
    /// destination neuron) pair gets an independent weight, with fan-in
    /// taken from this layer's size.
    pub fn connect_to_layer(
        &self,
        g: &mut Graph,
        other: &mut Layer,
        rng: &mut impl Rng,
    ) -> Result<(), GraphError> {
        let dist = he_normal(self.neurons.len());
        for source in &self.neurons {
            for destination in other.neurons.iter_mut() {
                let w = dist.sample(rng);
                destination.add_input(g, source.output(), Some(w))?;
            }
        }
        Ok(())
    }

    pub fn neuron(&self, index: usize) -> &Neuron {
        &self.neurons[index]
    }

    pub fn neuron_mut(&mut self, index: usize) -> &mut Neuron {
        &mut self.neurons[index]
    }

    /// Number of neurons.
    pub fn len(&self) -> usize {
        self.neurons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neurons.is_empty()
    }

    pub fn activation(&self) -> ActivationKind {
        self.activation
    }

    /// The bias constant, when the layer was built with one.
    pub fn bias(&self) -> Option<NodeRef> {
        self.bias
    }

    /// The k-th weight, counting neuron-major and inside each neuron in
    /// insertion order. Out-of-range indices panic.
    pub fn weight(&self, index: usize) -> NodeRef {
        let mut base = 0;
        for neuron in &self.neurons {
            if index < base + neuron.nb_weights() {
                return neuron.weight(index - base);
            }
            base += neuron.nb_weights();
        }
        panic!("weight index {} out of {}", index, base);
    }

    pub fn nb_weights(&self) -> usize {
        self.neurons.iter().map(Neuron::nb_weights).sum()
    }

    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    /// Drop the layer, its neurons and their weights from the graph.
    pub fn release(self, g: &mut Graph) {
        g.release_scope(self.scope);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn zero_sized_layers_are_rejected() {
        let mut g = Graph::new();
        let spec = LayerSpec::new(0, ActivationKind::ReLU, false);
        assert_eq!(
            spec.build(&mut g, None, &mut rng()).unwrap_err(),
            NetError::ZeroLayer { index: 0 }
        );
    }

    #[test]
    fn bias_adds_one_weight_per_neuron() {
        let mut g = Graph::new();
        let layer = LayerSpec::new(3, ActivationKind::Identity, true)
            .build(&mut g, None, &mut rng())
            .unwrap();
        assert_eq!(layer.len(), 3);
        assert_eq!(layer.nb_weights(), 3);
        assert!(layer.bias().is_some());

        let plain = LayerSpec::new(3, ActivationKind::Identity, false)
            .build(&mut g, None, &mut rng())
            .unwrap();
        assert_eq!(plain.nb_weights(), 0);
        assert!(plain.bias().is_none());
    }

    #[test]
    fn shared_input_gets_independent_weights() {
        let mut g = Graph::new();
        let x = g.factory(None).constant(1.0);
        let mut layer = LayerSpec::new(4, ActivationKind::Identity, false)
            .build(&mut g, None, &mut rng())
            .unwrap();
        layer.add_input(&mut g, x, &mut rng()).unwrap();

        assert_eq!(layer.nb_weights(), 4);
        let w0 = layer.weight(0);
        let w3 = layer.weight(3);
        assert_ne!(w0, w3);
        // He samples almost surely differ.
        assert_ne!(
            g.constant_value(w0).unwrap(),
            g.constant_value(w3).unwrap()
        );
    }

    #[test]
    fn full_connection_creates_size_product_weights() {
        let mut g = Graph::new();
        let first = LayerSpec::new(2, ActivationKind::ReLU, false)
            .build(&mut g, None, &mut rng())
            .unwrap();
        let mut second = LayerSpec::new(3, ActivationKind::Identity, false)
            .build(&mut g, None, &mut rng())
            .unwrap();
        first
            .connect_to_layer(&mut g, &mut second, &mut rng())
            .unwrap();

        assert_eq!(second.nb_weights(), 6);
        for i in 0..second.len() {
            assert_eq!(
                g.nb_inputs(second.neuron(i).output()).unwrap(),
                1,
                "activation keeps a single operand"
            );
        }
    }

    #[test]
    fn weight_enumeration_is_neuron_major() {
        let mut g = Graph::new();
        let x = g.factory(None).constant(1.0);
        let y = g.factory(None).constant(2.0);
        let mut layer = LayerSpec::new(2, ActivationKind::Identity, false)
            .build(&mut g, None, &mut rng())
            .unwrap();
        layer.add_input(&mut g, x, &mut rng()).unwrap();
        layer.add_input(&mut g, y, &mut rng()).unwrap();

        assert_eq!(layer.nb_weights(), 4);
        assert_eq!(layer.weight(0), layer.neuron(0).weight(0));
        assert_eq!(layer.weight(1), layer.neuron(0).weight(1));
        assert_eq!(layer.weight(2), layer.neuron(1).weight(0));
        assert_eq!(layer.weight(3), layer.neuron(1).weight(1));
    }

    #[test]
    fn releasing_a_layer_restores_the_node_count() {
        let mut g = Graph::new();
        let x = g.factory(None).constant(1.0);
        let before = g.node_count();

        let mut layer = LayerSpec::new(3, ActivationKind::Sigmoid, true)
            .build(&mut g, None, &mut rng())
            .unwrap();
        layer.add_input(&mut g, x, &mut rng()).unwrap();
        assert!(g.node_count() > before);

        layer.release(&mut g);
        assert_eq!(g.node_count(), before);
        assert_eq!(g.edge_count(), 0);
        assert_eq!(g.nb_outputs(x).unwrap(), 0);
    }
}
