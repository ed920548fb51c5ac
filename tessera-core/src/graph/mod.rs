//! Compute Graph
//!
//! This module implements the operator graph that every compiler pass works
//! on.
//!
//! # Overview
//!
//! A [`ComputeGraph`] holds three views of the same structure:
//!
//! - The node sequence: a doubly linked list threaded through the nodes,
//!   giving the current execution order.
//! - The fan-in and fan-out chains: per-node linked lists of the arcs that
//!   enter and leave it.
//! - The flat collections: the node and arc arenas, which own the entities.
//!
//! Values are owned by the [`Module`] the graph borrows. The graph records
//! which slots produce and consume each value, and keeps those records in
//! step with its own arcs.
//!
//! # Design Decisions
//!
//! 1. Links are generational handles into arenas rather than pointers. An
//!    erase cascade removes many entities in one call, and any handle left
//!    behind simply stops resolving.
//!
//! 2. All link rewriting happens on the graph type. Nodes and arcs expose
//!    read accessors only, so the three views are kept in sync in one place.
//!
//! 3. The sequence order is whatever passes made it until
//!    [`ComputeGraph::topological_sort`] is called, which relinks it into a
//!    stable dependency order.

mod erase;
mod node;
mod scheduler;
mod traverse;
mod verify;

pub use node::{Arc, ArcId, Node, NodeId};
pub use traverse::{Bfs, Chain, Dfs, Nodes, NodesMut};

use serde_json::json;

use crate::arena::Arena;
use crate::config::GraphConfig;
use crate::error::{Error, Result, SlotKind};
use crate::module::{Define, Module, Use, Value, ValueId};

/// An operator graph over the values of a borrowed [`Module`].
pub struct ComputeGraph<'m> {
    name: String,
    module: &'m mut Module,
    config: GraphConfig,

    head: Option<NodeId>,
    tail: Option<NodeId>,

    nodes: Arena<Node>,
    arcs: Arena<Arc>,
}

impl<'m> ComputeGraph<'m> {
    /// Create an empty graph over `module` with the default config.
    pub fn new(name: impl Into<String>, module: &'m mut Module) -> Self {
        Self::with_config(name, module, GraphConfig::default())
    }

    /// Create an empty graph over `module` with an explicit config.
    pub fn with_config(
        name: impl Into<String>,
        module: &'m mut Module,
        config: GraphConfig,
    ) -> Self {
        Self {
            name: name.into(),
            module,
            config,
            head: None,
            tail: None,
            nodes: Arena::new(),
            arcs: Arena::new(),
        }
    }

    /// Graph name, used in logs and the dump.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Active config.
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// The borrowed module.
    pub fn module(&self) -> &Module {
        &*self.module
    }

    /// Number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of arcs in the graph.
    pub fn arc_count(&self) -> usize {
        self.arcs.len()
    }

    /// First node of the sequence.
    pub fn head(&self) -> Option<NodeId> {
        self.head
    }

    /// Last node of the sequence.
    pub fn tail(&self) -> Option<NodeId> {
        self.tail
    }

    /// Get a reference to a node.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Get a mutable reference to a node.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// Get a reference to an arc.
    pub fn arc(&self, id: ArcId) -> Option<&Arc> {
        self.arcs.get(id)
    }

    /// Get a value from the borrowed module.
    pub fn value(&self, id: ValueId) -> Option<&Value> {
        self.module.value(id)
    }

    /// Whether `id` is a live node of this graph.
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains(id)
    }

    /// Whether `id` is a live arc of this graph.
    pub fn contains_arc(&self, id: ArcId) -> bool {
        self.arcs.contains(id)
    }

    /// Successor of `id` in the sequence.
    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|node| node.next)
    }

    /// Predecessor of `id` in the sequence.
    pub fn prev(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|node| node.prev)
    }

    /// The flat arc collection.
    pub fn arcs(&self) -> impl Iterator<Item = (ArcId, &Arc)> + '_ {
        self.arcs.iter()
    }

    /// Append a new node at the tail of the sequence.
    pub fn add_node(&mut self, kind: impl Into<String>, num_inputs: usize) -> NodeId {
        let id = self.nodes.insert(Node::new(kind, num_inputs));
        match self.tail {
            Some(tail) => {
                self.node_at_mut(tail).next = Some(id);
                self.node_at_mut(id).prev = Some(tail);
            }
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        tracing::trace!(graph = %self.name, node = ?id, "added node");
        id
    }

    /// Register a new value in the module, produced by the next output slot of `node`.
    pub fn add_output(&mut self, node: NodeId, value_name: impl Into<String>) -> Result<ValueId> {
        if !self.nodes.contains(node) {
            return Err(Error::StaleNode(node));
        }
        let value = self.module.add_value(value_name)?;
        self.define_output(node, value);
        Ok(value)
    }

    /// Make an existing, producer-less value the next output of `node`.
    ///
    /// Slots that already read the value through [`set_input`](Self::set_input)
    /// are connected to the new producer with arcs. Returns the output slot index.
    pub fn bind_output(&mut self, node: NodeId, value: ValueId) -> Result<usize> {
        if !self.nodes.contains(node) {
            return Err(Error::StaleNode(node));
        }
        let existing = self.module.value(value).ok_or(Error::ValueNotFound(value))?;
        if existing.has_producer() {
            return Err(Error::AlreadyDefined(existing.name().to_string()));
        }
        let consumers = existing.uses().to_vec();

        let output = self.define_output(node, value);
        for user in consumers {
            let id = self.arcs.insert(Arc::new(node, output, user.node, user.input, value));
            self.link_arc(id, node, user.node);
        }
        tracing::trace!(graph = %self.name, ?node, ?value, "bound output");

        self.verify_if_configured();
        Ok(output)
    }

    fn define_output(&mut self, node: NodeId, value: ValueId) -> usize {
        let output = self.node_at_mut(node).push_output(value);
        self.value_at_mut(value).set_define(Some(Define { node, output }));
        output
    }

    /// Bind `value` to an input slot without an arc.
    ///
    /// Only for values that no node produces, such as graph inputs and
    /// weights. A produced value is rejected with [`Error::AlreadyDefined`];
    /// wire it with [`connect`](Self::connect) so the dependency has an arc.
    pub fn set_input(&mut self, node: NodeId, input: usize, value: ValueId) -> Result<()> {
        self.check_free_input(node, input)?;
        let bound = self.module.value(value).ok_or(Error::ValueNotFound(value))?;
        if bound.has_producer() {
            return Err(Error::AlreadyDefined(bound.name().to_string()));
        }
        self.node_at_mut(node).bind_input(input, value);
        self.value_at_mut(value).add_use(Use { node, input });
        self.verify_if_configured();
        Ok(())
    }

    /// Connect output slot `output` of `source` to input slot `input` of `target`.
    ///
    /// The target slot is bound to the source's output value and a new arc is
    /// appended to both chains.
    pub fn connect(
        &mut self,
        source: NodeId,
        output: usize,
        target: NodeId,
        input: usize,
    ) -> Result<ArcId> {
        let source_node = self.nodes.get(source).ok_or(Error::StaleNode(source))?;
        let value = source_node.output(output).ok_or_else(|| Error::SlotOutOfRange {
            node: source_node.name().to_string(),
            kind: SlotKind::Output,
            slot: output,
            len: source_node.num_outputs(),
        })?;
        self.check_free_input(target, input)?;

        self.node_at_mut(target).bind_input(input, value);
        self.value_at_mut(value).add_use(Use { node: target, input });

        let id = self.arcs.insert(Arc::new(source, output, target, input, value));
        self.link_arc(id, source, target);
        tracing::trace!(graph = %self.name, arc = ?id, ?source, ?target, "connected");

        self.verify_if_configured();
        Ok(id)
    }

    fn check_free_input(&self, node: NodeId, input: usize) -> Result<()> {
        let target = self.nodes.get(node).ok_or(Error::StaleNode(node))?;
        if input >= target.num_inputs() {
            return Err(Error::SlotOutOfRange {
                node: target.name().to_string(),
                kind: SlotKind::Input,
                slot: input,
                len: target.num_inputs(),
            });
        }
        if target.input(input).is_some() {
            return Err(Error::InputAlreadyBound {
                node: target.name().to_string(),
                slot: input,
            });
        }
        Ok(())
    }

    /// Append `id` to the tail of the source's fan-out chain and the target's fan-in chain.
    fn link_arc(&mut self, id: ArcId, source: NodeId, target: NodeId) {
        let last_out = self.fan_out(source).last();
        match last_out {
            Some(last) => {
                self.arc_at_mut(last).next_out = Some(id);
                self.arc_at_mut(id).prev_out = Some(last);
            }
            None => self.node_at_mut(source).first_out = Some(id),
        }
        let last_in = self.fan_in(target).last();
        match last_in {
            Some(last) => {
                self.arc_at_mut(last).next_in = Some(id);
                self.arc_at_mut(id).prev_in = Some(last);
            }
            None => self.node_at_mut(target).first_in = Some(id),
        }
    }

    /// Drop every node and arc at once.
    ///
    /// Unlike [`erase_node`](Self::erase_node) this does not unlink chains one by one.
    /// Values the graph bound are detached so the module stays consistent.
    pub fn clear(&mut self) {
        let mut detached = 0usize;
        for (id, node) in self.nodes.iter() {
            for (input, slot) in node.inputs().iter().enumerate() {
                let Some(value) = *slot else { continue };
                if let Some(value) = self.module.value_mut(value) {
                    value.remove_use(Use { node: id, input });
                    detached += 1;
                }
            }
            for (output, value) in node.outputs().iter().enumerate() {
                if let Some(value) = self.module.value_mut(*value) {
                    if value.define() == Some(Define { node: id, output }) {
                        value.set_define(None);
                        detached += 1;
                    }
                }
            }
        }

        self.head = None;
        self.tail = None;
        let (nodes, arcs) = (self.nodes.len(), self.arcs.len());
        self.nodes.clear();
        self.arcs.clear();
        tracing::debug!(graph = %self.name, nodes, arcs, detached, "cleared graph");
    }

    /// Emit the graph as a document, one entry per node in sequence order.
    pub fn print(&self) -> serde_json::Value {
        let nodes: Vec<_> = self.iter().map(|(_, node)| node.print(self.module())).collect();
        json!({
            "name": self.name,
            "nodes": nodes,
        })
    }

    fn verify_if_configured(&self) {
        if self.config.verify_mutations {
            if let Err(err) = self.verify() {
                panic!("graph `{}` corrupted after mutation: {}", self.name, err);
            }
        }
    }

    fn node_at(&self, id: NodeId) -> &Node {
        self.nodes
            .get(id)
            .unwrap_or_else(|| panic!("stale node handle {id:?} in graph `{}`", self.name))
    }

    fn node_at_mut(&mut self, id: NodeId) -> &mut Node {
        let name = &self.name;
        self.nodes
            .get_mut(id)
            .unwrap_or_else(|| panic!("stale node handle {id:?} in graph `{name}`"))
    }

    fn arc_at(&self, id: ArcId) -> &Arc {
        self.arcs
            .get(id)
            .unwrap_or_else(|| panic!("stale arc handle {id:?} in graph `{}`", self.name))
    }

    fn arc_at_mut(&mut self, id: ArcId) -> &mut Arc {
        let name = &self.name;
        self.arcs
            .get_mut(id)
            .unwrap_or_else(|| panic!("stale arc handle {id:?} in graph `{name}`"))
    }

    /// Values bound by this graph must stay alive; only `erase_value` frees them.
    fn value_at_mut(&mut self, id: ValueId) -> &mut Value {
        self.module
            .value_mut(id)
            .unwrap_or_else(|| panic!("value {id:?} freed while still bound"))
    }
}

impl Drop for ComputeGraph<'_> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl std::fmt::Debug for ComputeGraph<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputeGraph")
            .field("name", &self.name)
            .field("nodes", &self.nodes.len())
            .field("arcs", &self.arcs.len())
            .field("head", &self.head)
            .field("tail", &self.tail)
            .finish()
    }
}
