//! # Graph and Scopes
//!
//! A [`Graph`] owns every node of one expression DAG: the node pool, the
//! edge set, and the id counter. Construction code never owns nodes
//! directly; it holds [`NodeRef`] handles and, for bounded construction
//! and teardown, a [`ScopeId`] naming a scope inside the graph.
//!
//! ## Scopes
//!
//! A scope is a view over a subset of the graph: it records the nodes and
//! edges created through it and may have a parent scope. Registration
//! walks the parent chain, so a node created inside a nested scope is
//! known to every enclosing scope and its owner count reflects the number
//! of holders. Releasing a scope releases its children first, then drops
//! its hold on every node it registered; a node is physically deleted when
//! the last holder lets go. This gives reference-counted cascade deletion
//! through arbitrarily nested builders.
//!
//! ## Slots
//!
//! Inputs of a node are bound to numbered slots; the slot index is the
//! edge weight. Operators read their inputs in slot-ascending order, and
//! reverse-mode accumulation reads consumers in edge-insertion order, so
//! floating-point summation is reproducible.

use std::fmt;

use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::error::GraphError;
use crate::node::{NodeData, NodeId, NodeKind, NodeRef};

/// Edge weight: the input slot this edge feeds at its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Slot(pub(crate) u32);

/// An edge record: source, destination and the destination slot.
///
/// Equality is by the full triple; the same pair of nodes may be wired at
/// several slots and each wiring is a distinct edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub src: NodeRef,
    pub dst: NodeRef,
    pub slot: u32,
}

/// Identifier of a scope inside a [`Graph`]. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub(crate) usize);

#[derive(Debug, Default)]
struct ScopeData {
    parent: Option<ScopeId>,
    children: Vec<ScopeId>,
    nodes: Vec<NodeRef>,
    edges: Vec<Edge>,
}

/// Owner of a compute DAG: node pool, edge set, scope table, id counter.
#[derive(Debug, Default)]
pub struct Graph {
    pub(crate) pool: StableDiGraph<NodeData, Slot>,
    next_id: u32,
    scopes: Vec<Option<ScopeData>>,
}

impl Graph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    fn new_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Resolve a handle, verifying the stored id against the pool.
    pub(crate) fn resolve(&self, n: NodeRef) -> Result<NodeIndex, GraphError> {
        match self.pool.node_weight(n.index) {
            Some(d) if d.id == n.id => Ok(n.index),
            _ => Err(GraphError::NodeNotFound { id: n.id.0 }),
        }
    }

    pub(crate) fn make_ref(&self, index: NodeIndex) -> NodeRef {
        NodeRef {
            index,
            id: self.pool[index].id,
        }
    }

    // ========================================================================
    // Scopes
    // ========================================================================

    /// Open a new scope, optionally nested inside a parent scope.
    pub fn create_scope(&mut self, parent: Option<ScopeId>) -> ScopeId {
        if let Some(p) = parent {
            assert!(
                self.scopes.get(p.0).map_or(false, Option::is_some),
                "parent scope {} was released",
                p.0
            );
        }
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Some(ScopeData {
            parent,
            ..ScopeData::default()
        }));
        if let Some(p) = parent {
            self.scopes[p.0]
                .as_mut()
                .expect("parent checked above")
                .children
                .push(id);
        }
        id
    }

    fn scope_mut(&mut self, s: ScopeId) -> &mut ScopeData {
        self.scopes
            .get_mut(s.0)
            .and_then(Option::as_mut)
            .unwrap_or_else(|| panic!("scope {} was released", s.0))
    }

    /// Nodes registered directly or through children of this scope.
    pub fn scope_nodes(&self, s: ScopeId) -> Result<&[NodeRef], GraphError> {
        self.scopes
            .get(s.0)
            .and_then(Option::as_ref)
            .map(|d| d.nodes.as_slice())
            .ok_or(GraphError::ScopeNotFound { index: s.0 })
    }

    /// Edge records held by this scope.
    pub fn scope_edges(&self, s: ScopeId) -> Result<&[Edge], GraphError> {
        self.scopes
            .get(s.0)
            .and_then(Option::as_ref)
            .map(|d| d.edges.as_slice())
            .ok_or(GraphError::ScopeNotFound { index: s.0 })
    }

    /// Release a scope: children first, then every node it registered.
    ///
    /// Each registered node loses this scope's hold and is asked to leave
    /// the parent chain; nodes whose owner count reaches zero are deleted
    /// together with their incident edges. Releasing an already-released
    /// scope is a no-op.
    pub fn release_scope(&mut self, scope: ScopeId) {
        let Some(Some(data)) = self.scopes.get(scope.0) else {
            return;
        };
        let children = data.children.clone();
        for c in children {
            self.release_scope(c);
        }
        let data = self.scopes[scope.0].take().expect("checked above");
        for n in data.nodes {
            let Ok(i) = self.resolve(n) else {
                continue;
            };
            self.pool[i].owners -= 1;
            self.remove_node(data.parent, n);
        }
        if let Some(p) = data.parent {
            if let Some(pd) = self.scopes.get_mut(p.0).and_then(Option::as_mut) {
                pd.children.retain(|c| *c != scope);
            }
        }
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    /// Allocate a node of the given kind and register it with the scope
    /// chain (every ancestor of `scope`, plus the root, takes a hold).
    pub(crate) fn add_node(&mut self, kind: NodeKind, scope: Option<ScopeId>) -> NodeRef {
        let id = self.new_id();
        let index = self.pool.add_node(NodeData::new(id, kind));
        self.pool[index].owners = 1;
        let r = NodeRef { index, id };
        let mut cur = scope;
        while let Some(s) = cur {
            let data = self.scope_mut(s);
            data.nodes.push(r);
            cur = data.parent;
            self.pool[index].owners += 1;
        }
        r
    }

    /// Remove a node: sever its connections, erase its records from every
    /// registry, drop the holds along the scope chain and the root's hold,
    /// and delete it when nobody holds it any more.
    ///
    /// Removing a node that is no longer present is a no-op.
    pub fn remove_node(&mut self, scope: Option<ScopeId>, n: NodeRef) {
        let Ok(i) = self.resolve(n) else {
            return;
        };
        self.clear_connections(n);

        let mut cur = scope;
        while let Some(s) = cur {
            let data = self
                .scopes
                .get_mut(s.0)
                .and_then(Option::as_mut)
                .unwrap_or_else(|| panic!("scope {} was released", s.0));
            if let Some(pos) = data.nodes.iter().position(|r| *r == n) {
                data.nodes.remove(pos);
                self.pool[i].owners -= 1;
            }
            cur = data.parent;
        }
        for sd in self.scopes.iter_mut().flatten() {
            sd.edges.retain(|e| e.src != n && e.dst != n);
        }

        // The root's hold goes last.
        self.pool[i].owners = self.pool[i].owners.saturating_sub(1);
        if self.pool[i].owners == 0 {
            self.pool.remove_node(i);
            for sd in self.scopes.iter_mut().flatten() {
                sd.nodes.retain(|r| *r != n);
            }
        }
    }

    /// Number of live nodes in the pool.
    pub fn node_count(&self) -> usize {
        self.pool.node_count()
    }

    /// Whether the handle still resolves.
    pub fn contains(&self, n: NodeRef) -> bool {
        self.resolve(n).is_ok()
    }

    /// Handles of every live node.
    pub fn nodes(&self) -> Vec<NodeRef> {
        self.pool.node_indices().map(|i| self.make_ref(i)).collect()
    }

    /// The operator of a node.
    pub fn kind(&self, n: NodeRef) -> Result<&NodeKind, GraphError> {
        let i = self.resolve(n)?;
        Ok(&self.pool[i].kind)
    }

    /// How many scopes (plus the root) currently hold the node.
    pub fn owners(&self, n: NodeRef) -> Result<u32, GraphError> {
        let i = self.resolve(n)?;
        Ok(self.pool[i].owners)
    }

    // ========================================================================
    // Payload setters (all invalidate the node's cache region)
    // ========================================================================

    /// Overwrite a Constant's value.
    pub fn set_constant(&mut self, n: NodeRef, v: f64) -> Result<(), GraphError> {
        let i = self.resolve(n)?;
        match &mut self.pool[i].kind {
            NodeKind::Constant { value, .. } => *value = v,
            k => {
                return Err(GraphError::KindMismatch {
                    expected: "constant",
                    got: k.op_name(),
                })
            }
        }
        self.invalidate_at(i);
        Ok(())
    }

    /// Read a Constant's value without evaluating.
    pub fn constant_value(&self, n: NodeRef) -> Result<f64, GraphError> {
        let i = self.resolve(n)?;
        match &self.pool[i].kind {
            NodeKind::Constant { value, .. } => Ok(*value),
            k => Err(GraphError::KindMismatch {
                expected: "constant",
                got: k.op_name(),
            }),
        }
    }

    /// Attach or replace a Constant's display label.
    pub fn set_label(&mut self, n: NodeRef, new: &str) -> Result<(), GraphError> {
        let i = self.resolve(n)?;
        match &mut self.pool[i].kind {
            NodeKind::Constant { label, .. } => *label = Some(new.to_string()),
            k => {
                return Err(GraphError::KindMismatch {
                    expected: "constant",
                    got: k.op_name(),
                })
            }
        }
        Ok(())
    }

    /// Overwrite a CteMult's factor.
    pub fn set_cte_mult(&mut self, n: NodeRef, c: f64) -> Result<(), GraphError> {
        let i = self.resolve(n)?;
        match &mut self.pool[i].kind {
            NodeKind::CteMult(factor) => *factor = c,
            k => {
                return Err(GraphError::KindMismatch {
                    expected: "cte-mult",
                    got: k.op_name(),
                })
            }
        }
        self.invalidate_at(i);
        Ok(())
    }

    /// Overwrite a CteDivide's divisor.
    pub fn set_cte_divide(&mut self, n: NodeRef, c: f64) -> Result<(), GraphError> {
        let i = self.resolve(n)?;
        match &mut self.pool[i].kind {
            NodeKind::CteDivide(divisor) => *divisor = c,
            k => {
                return Err(GraphError::KindMismatch {
                    expected: "cte-divide",
                    got: k.op_name(),
                })
            }
        }
        self.invalidate_at(i);
        Ok(())
    }

    /// Overwrite a CtePower's exponent.
    pub fn set_cte_power(&mut self, n: NodeRef, p: i32) -> Result<(), GraphError> {
        let i = self.resolve(n)?;
        match &mut self.pool[i].kind {
            NodeKind::CtePower(power) => *power = p,
            k => {
                return Err(GraphError::KindMismatch {
                    expected: "cte-power",
                    got: k.op_name(),
                })
            }
        }
        self.invalidate_at(i);
        Ok(())
    }

    // ========================================================================
    // Slot queries
    // ========================================================================

    /// Bound inputs of a node as `(slot, source)` pairs, slot-ascending.
    pub fn inputs_of(&self, n: NodeRef) -> Result<Vec<(u32, NodeRef)>, GraphError> {
        let i = self.resolve(n)?;
        Ok(self
            .sorted_inputs(i)
            .into_iter()
            .map(|(slot, j)| (slot, self.make_ref(j)))
            .collect())
    }

    /// Consumers of a node, in edge-insertion order. A consumer wired at
    /// several slots appears once per wiring.
    pub fn outputs_of(&self, n: NodeRef) -> Result<Vec<NodeRef>, GraphError> {
        let i = self.resolve(n)?;
        Ok(self
            .output_edges(i)
            .into_iter()
            .map(|(j, _)| self.make_ref(j))
            .collect())
    }

    /// The source bound at a slot, if any.
    pub fn input_at(&self, n: NodeRef, slot: u32) -> Result<Option<NodeRef>, GraphError> {
        let i = self.resolve(n)?;
        Ok(self
            .pool
            .edges_directed(i, Direction::Incoming)
            .find(|e| e.weight().0 == slot)
            .map(|e| self.make_ref(e.source())))
    }

    /// The slot at which `src` feeds `dst` (the lowest, if wired twice).
    pub fn slot_of(&self, dst: NodeRef, src: NodeRef) -> Result<Option<u32>, GraphError> {
        let di = self.resolve(dst)?;
        let si = self.resolve(src)?;
        let mut slots: Vec<u32> = self
            .pool
            .edges_directed(di, Direction::Incoming)
            .filter(|e| e.source() == si)
            .map(|e| e.weight().0)
            .collect();
        slots.sort_unstable();
        Ok(slots.first().copied())
    }

    /// Number of bound input slots.
    pub fn nb_inputs(&self, n: NodeRef) -> Result<usize, GraphError> {
        let i = self.resolve(n)?;
        Ok(self.pool.edges_directed(i, Direction::Incoming).count())
    }

    /// Number of consumers (one per wiring).
    pub fn nb_outputs(&self, n: NodeRef) -> Result<usize, GraphError> {
        let i = self.resolve(n)?;
        Ok(self.pool.edges_directed(i, Direction::Outgoing).count())
    }

    pub(crate) fn sorted_inputs(&self, i: NodeIndex) -> Vec<(u32, NodeIndex)> {
        let mut v: Vec<(u32, NodeIndex)> = self
            .pool
            .edges_directed(i, Direction::Incoming)
            .map(|e| (e.weight().0, e.source()))
            .collect();
        v.sort_by_key(|(slot, _)| *slot);
        v
    }

    /// Outgoing wirings as `(consumer, slot at consumer)`, in insertion
    /// order (edge indices are assigned monotonically).
    pub(crate) fn output_edges(&self, i: NodeIndex) -> Vec<(NodeIndex, u32)> {
        let mut v: Vec<(EdgeIndex, NodeIndex, u32)> = self
            .pool
            .edges_directed(i, Direction::Outgoing)
            .map(|e| (e.id(), e.target(), e.weight().0))
            .collect();
        v.sort_by_key(|(eid, _, _)| *eid);
        v.into_iter().map(|(_, j, slot)| (j, slot)).collect()
    }

    // ========================================================================
    // Wiring
    // ========================================================================

    /// Wire `src` into `dst`. With an explicit slot the binding replaces
    /// whatever was there; without one it appends at a slot equal to the
    /// current number of bound inputs. Returns the slot used.
    ///
    /// Both endpoints' cache regions are invalidated.
    pub fn connect(
        &mut self,
        src: NodeRef,
        dst: NodeRef,
        slot: Option<u32>,
    ) -> Result<u32, GraphError> {
        let si = self.resolve(src)?;
        let di = self.resolve(dst)?;
        let slot = match slot {
            Some(s) => {
                let existing = self
                    .pool
                    .edges_directed(di, Direction::Incoming)
                    .find(|e| e.weight().0 == s)
                    .map(|e| e.id());
                if let Some(eid) = existing {
                    self.pool.remove_edge(eid);
                }
                s
            }
            None => self.pool.edges_directed(di, Direction::Incoming).count() as u32,
        };
        self.pool.add_edge(si, di, Slot(slot));
        self.invalidate_at(si);
        self.invalidate_at(di);
        Ok(slot)
    }

    /// Sever every wiring from `src` into `dst`. A pair that is not wired
    /// (or whose handles no longer resolve) is a no-op.
    pub fn disconnect(&mut self, src: NodeRef, dst: NodeRef) {
        let (Ok(si), Ok(di)) = (self.resolve(src), self.resolve(dst)) else {
            return;
        };
        // Invalidate while the edges still exist so the propagation
        // crosses them.
        self.invalidate_at(si);
        self.invalidate_at(di);
        loop {
            let eid = self
                .pool
                .edges_directed(si, Direction::Outgoing)
                .find(|e| e.target() == di)
                .map(|e| e.id());
            match eid {
                Some(e) => {
                    self.pool.remove_edge(e);
                }
                None => break,
            }
        }
    }

    /// Unbind a single input slot. A vacant slot is a no-op.
    pub fn unbind_slot(&mut self, dst: NodeRef, slot: u32) {
        let Ok(di) = self.resolve(dst) else {
            return;
        };
        let found = self
            .pool
            .edges_directed(di, Direction::Incoming)
            .find(|e| e.weight().0 == slot)
            .map(|e| (e.id(), e.source()));
        if let Some((eid, si)) = found {
            self.invalidate_at(si);
            self.invalidate_at(di);
            self.pool.remove_edge(eid);
        }
    }

    /// Unbind every input slot, leaving the node's consumers intact.
    pub fn clear_inputs(&mut self, n: NodeRef) {
        let Ok(sources) = self.inputs_of(n) else {
            return;
        };
        for (_, src) in sources {
            self.disconnect(src, n);
        }
    }

    /// Detach the node from every consumer, leaving its inputs intact.
    pub fn clear_outputs(&mut self, n: NodeRef) {
        let Ok(consumers) = self.outputs_of(n) else {
            return;
        };
        for dst in consumers {
            self.disconnect(n, dst);
        }
    }

    /// Leave the node fully stand-alone.
    pub fn clear_connections(&mut self, n: NodeRef) {
        self.clear_inputs(n);
        self.clear_outputs(n);
    }

    // ========================================================================
    // Edge registry
    // ========================================================================

    /// Wire `src` into `dst` and record the edge with the given scope and
    /// every enclosing scope. Returns the edge record.
    pub fn create_edge(
        &mut self,
        scope: Option<ScopeId>,
        src: NodeRef,
        dst: NodeRef,
        slot: Option<u32>,
    ) -> Result<Edge, GraphError> {
        let slot = self.connect(src, dst, slot)?;
        let edge = Edge { src, dst, slot };
        let mut cur = scope;
        while let Some(s) = cur {
            let data = self.scope_mut(s);
            if !data.edges.contains(&edge) {
                data.edges.push(edge.clone());
            }
            cur = data.parent;
        }
        Ok(edge)
    }

    /// Drop an edge record from the scope chain and sever the wiring at
    /// the recorded slot. An absent edge is a no-op.
    pub fn remove_edge(&mut self, scope: Option<ScopeId>, edge: &Edge) {
        let mut cur = scope;
        while let Some(s) = cur {
            let data = self.scope_mut(s);
            data.edges.retain(|e| e != edge);
            cur = data.parent;
        }
        let (Ok(si), Ok(di)) = (self.resolve(edge.src), self.resolve(edge.dst)) else {
            return;
        };
        let eid = self
            .pool
            .edges_directed(si, Direction::Outgoing)
            .find(|e| e.target() == di && e.weight().0 == edge.slot)
            .map(|e| e.id());
        if let Some(e) = eid {
            self.invalidate_at(si);
            self.invalidate_at(di);
            self.pool.remove_edge(e);
        }
    }

    /// The root's edge registry, as records.
    pub fn edges(&self) -> Vec<Edge> {
        self.pool
            .edge_indices()
            .filter_map(|e| {
                let (si, di) = self.pool.edge_endpoints(e)?;
                Some(Edge {
                    src: self.make_ref(si),
                    dst: self.make_ref(di),
                    slot: self.pool[e].0,
                })
            })
            .collect()
    }

    /// Number of edges in the root registry.
    pub fn edge_count(&self) -> usize {
        self.pool.edge_count()
    }

    // ========================================================================
    // Cache invalidation
    // ========================================================================

    /// Mark the node and everything reachable through inputs or outputs as
    /// dirty. Caches are cleared lazily at the next `value` or `grad`.
    pub fn invalidate(&mut self, n: NodeRef) -> Result<(), GraphError> {
        let i = self.resolve(n)?;
        self.invalidate_at(i);
        Ok(())
    }

    /// The dirty flag doubles as the visited marker: a node already dirty
    /// does not propagate again, which bounds the walk on DAGs with shared
    /// sub-expressions.
    pub(crate) fn invalidate_at(&mut self, i: NodeIndex) {
        if self.pool[i].dirty {
            return;
        }
        self.pool[i].dirty = true;
        let mut neighbours: Vec<NodeIndex> = self
            .pool
            .neighbors_directed(i, Direction::Outgoing)
            .collect();
        neighbours.extend(self.pool.neighbors_directed(i, Direction::Incoming));
        for j in neighbours {
            self.invalidate_at(j);
        }
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Graph({} nodes, {} edges)",
            self.node_count(),
            self.edge_count()
        )
    }
}
