//! # Neurons
//!
//! The smallest structural builders: an aggregation node, an activation
//! node, and the neuron that wires one into the other. Each builder opens
//! its own scope in the graph, so tearing a neuron down releases exactly
//! the nodes it created, weights included.
//!
//! A weighted input is materialised as `input * weight -> aggregate`,
//! where the weight is a Constant the optimisers rewrite in place.

use gradgraph_core::{Graph, GraphError, NodeRef, ScopeId};

/// How a neuron folds its inputs into one scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateKind {
    /// Plain sum.
    Sum,
    /// Arithmetic mean.
    Average,
}

/// A sub-graph holding a single aggregation node.
#[derive(Debug)]
pub struct Aggregate {
    kind: AggregateKind,
    scope: ScopeId,
    node: NodeRef,
}

impl Aggregate {
    pub fn new(g: &mut Graph, parent: Option<ScopeId>, kind: AggregateKind) -> Self {
        let scope = g.create_scope(parent);
        let node = match kind {
            AggregateKind::Sum => g.factory(Some(scope)).add(),
            AggregateKind::Average => g.factory(Some(scope)).avg(),
        };
        Self { kind, scope, node }
    }

    /// Append one more term.
    pub fn add_input(&self, g: &mut Graph, input: NodeRef) -> Result<(), GraphError> {
        g.create_edge(Some(self.scope), input, self.node, None)?;
        Ok(())
    }

    pub fn kind(&self) -> AggregateKind {
        self.kind
    }

    pub fn output(&self) -> NodeRef {
        self.node
    }
}

/// The nonlinearity applied after aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationKind {
    ReLU,
    Sigmoid,
    Identity,
}

/// A sub-graph holding a single activation node.
#[derive(Debug)]
pub struct Activation {
    kind: ActivationKind,
    scope: ScopeId,
    node: NodeRef,
}

impl Activation {
    pub fn new(g: &mut Graph, parent: Option<ScopeId>, kind: ActivationKind) -> Self {
        let scope = g.create_scope(parent);
        let node = match kind {
            ActivationKind::ReLU => g.factory(Some(scope)).relu(),
            ActivationKind::Sigmoid => g.factory(Some(scope)).sigmoid(),
            ActivationKind::Identity => g.factory(Some(scope)).identity(),
        };
        Self { kind, scope, node }
    }

    /// Bind the activation's single operand at slot 0.
    pub fn set_input(&self, g: &mut Graph, input: NodeRef) -> Result<(), GraphError> {
        g.create_edge(Some(self.scope), input, self.node, Some(0))?;
        Ok(())
    }

    pub fn kind(&self) -> ActivationKind {
        self.kind
    }

    pub fn output(&self) -> NodeRef {
        self.node
    }
}

/// One neuron: aggregate feeding an activation, plus the weights created
/// for its inputs, in insertion order.
#[derive(Debug)]
pub struct Neuron {
    scope: ScopeId,
    aggregate: Aggregate,
    activation: Activation,
    weights: Vec<NodeRef>,
}

impl Neuron {
    pub fn new(
        g: &mut Graph,
        parent: Option<ScopeId>,
        aggregate: AggregateKind,
        activation: ActivationKind,
    ) -> Result<Self, GraphError> {
        let scope = g.create_scope(parent);
        let aggregate = Aggregate::new(g, Some(scope), aggregate);
        let activation = Activation::new(g, Some(scope), activation);
        activation.set_input(g, aggregate.output())?;
        Ok(Self {
            scope,
            aggregate,
            activation,
            weights: Vec::new(),
        })
    }

    /// The activation node, i.e. the neuron's result.
    pub fn output(&self) -> NodeRef {
        self.activation.output()
    }

    /// Feed a node into this neuron.
    ///
    /// With `weight: Some(w)` a Constant weight is created at value `w`
    /// and the product `input * weight` joins the aggregation; with `None`
    /// the input joins directly and no parameter is created.
    pub fn add_input(
        &mut self,
        g: &mut Graph,
        input: NodeRef,
        weight: Option<f64>,
    ) -> Result<(), GraphError> {
        match weight {
            None => self.aggregate.add_input(g, input),
            Some(w) => {
                let (weight_node, product) = {
                    let mut f = g.factory(Some(self.scope));
                    (f.labeled_constant(w, "W"), f.mult())
                };
                g.create_edge(Some(self.scope), weight_node, product, None)?;
                g.create_edge(Some(self.scope), input, product, None)?;
                self.aggregate.add_input(g, product)?;
                self.weights.push(weight_node);
                Ok(())
            }
        }
    }

    /// Feed this neuron's output into another, with a unit weight.
    pub fn connect_to(&self, g: &mut Graph, other: &mut Neuron) -> Result<(), GraphError> {
        other.add_input(g, self.output(), Some(1.0))
    }

    /// The i-th weight in insertion order. Out-of-range indices are a
    /// bounds violation and panic.
    pub fn weight(&self, index: usize) -> NodeRef {
        self.weights[index]
    }

    pub fn nb_weights(&self) -> usize {
        self.weights.len()
    }

    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    /// Drop the neuron's nodes from the graph.
    pub fn release(self, g: &mut Graph) {
        g.release_scope(self.scope);
    }
}
