//! Graph Nodes
//!
//! This module defines the operator nodes and data arcs that live in a
//! [`ComputeGraph`](super::ComputeGraph).
//!
//! Both carry intrusive links: a node knows its neighbours in the graph's
//! sequence and the first arc of its fan-in and fan-out chains, and an arc
//! knows its neighbours in both chains. The links are handles, not
//! pointers, and only the graph rewrites them.

use indexmap::IndexMap;
use serde_json::json;
use smallvec::SmallVec;

use crate::arena::Id;
use crate::module::{Module, ValueId};

/// Handle to a node in a compute graph.
pub type NodeId = Id<Node>;

/// Handle to an arc in a compute graph.
pub type ArcId = Id<Arc>;

/// An operator: a unit of computation with ordered input and output slots.
#[derive(Debug)]
pub struct Node {
    /// Operator type, e.g. `Conv` or `Relu`.
    kind: String,

    /// Display name. Defaults to the kind.
    name: String,

    /// Input slots; `None` until something is bound.
    inputs: SmallVec<[Option<ValueId>; 4]>,

    /// Slots whose arc was erased. The sort no longer waits on them.
    severed: SmallVec<[bool; 4]>,

    /// Output slots, each producing one value.
    outputs: SmallVec<[ValueId; 2]>,

    attributes: IndexMap<String, serde_json::Value>,

    pub(super) prev: Option<NodeId>,
    pub(super) next: Option<NodeId>,
    pub(super) first_in: Option<ArcId>,
    pub(super) first_out: Option<ArcId>,
}

impl Node {
    /// Create an unlinked node with `num_inputs` empty input slots.
    pub(crate) fn new(kind: impl Into<String>, num_inputs: usize) -> Self {
        let kind = kind.into();
        Self {
            name: kind.clone(),
            kind,
            inputs: SmallVec::from_elem(None, num_inputs),
            severed: SmallVec::from_elem(false, num_inputs),
            outputs: SmallVec::new(),
            attributes: IndexMap::new(),
            prev: None,
            next: None,
            first_in: None,
            first_out: None,
        }
    }

    /// Operator type.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the node.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Number of declared input slots, bound or not.
    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    /// Number of output slots.
    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    /// The value bound to input slot `index`, if any.
    pub fn input(&self, index: usize) -> Option<ValueId> {
        self.inputs.get(index).copied().flatten()
    }

    /// The value produced by output slot `index`.
    pub fn output(&self, index: usize) -> Option<ValueId> {
        self.outputs.get(index).copied()
    }

    /// Whether input slot `index` lost its binding to an erase.
    ///
    /// A severed slot is unbound but no longer counts as a pending dependency.
    pub fn is_severed(&self, index: usize) -> bool {
        self.severed.get(index).copied().unwrap_or(false)
    }

    /// All input slots in order.
    pub fn inputs(&self) -> &[Option<ValueId>] {
        &self.inputs
    }

    /// All output values in slot order.
    pub fn outputs(&self) -> &[ValueId] {
        &self.outputs
    }

    /// Look up an attribute by key.
    pub fn attribute(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.get(key)
    }

    /// Insert or replace an attribute. A replaced key keeps its position.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Attributes in insertion order.
    pub fn attributes(&self) -> &IndexMap<String, serde_json::Value> {
        &self.attributes
    }

    pub(super) fn bind_input(&mut self, index: usize, value: ValueId) {
        self.inputs[index] = Some(value);
        self.severed[index] = false;
    }

    pub(super) fn sever_input(&mut self, index: usize) {
        self.inputs[index] = None;
        self.severed[index] = true;
    }

    /// Append an output slot. Returns its index.
    pub(super) fn push_output(&mut self, value: ValueId) -> usize {
        self.outputs.push(value);
        self.outputs.len() - 1
    }

    /// Emit this node's structure as a document.
    ///
    /// Slots are rendered by value name; unbound inputs become `null`.
    pub fn print(&self, module: &Module) -> serde_json::Value {
        let name_of = |id: ValueId| {
            module
                .value(id)
                .map(|value| serde_json::Value::from(value.name()))
                .unwrap_or(serde_json::Value::Null)
        };

        let inputs: Vec<_> = self
            .inputs
            .iter()
            .map(|slot| slot.map(name_of).unwrap_or(serde_json::Value::Null))
            .collect();
        let outputs: Vec<_> = self.outputs.iter().map(|id| name_of(*id)).collect();
        let attributes: serde_json::Map<_, _> = self
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        json!({
            "kind": self.kind,
            "name": self.name,
            "inputs": inputs,
            "outputs": outputs,
            "attributes": attributes,
        })
    }
}

/// A data edge from one node's output slot to another node's input slot.
#[derive(Debug)]
pub struct Arc {
    source: NodeId,
    output: usize,
    target: NodeId,
    input: usize,
    value: ValueId,

    pub(super) prev_out: Option<ArcId>,
    pub(super) next_out: Option<ArcId>,
    pub(super) prev_in: Option<ArcId>,
    pub(super) next_in: Option<ArcId>,
}

impl Arc {
    pub(super) fn new(
        source: NodeId,
        output: usize,
        target: NodeId,
        input: usize,
        value: ValueId,
    ) -> Self {
        Self {
            source,
            output,
            target,
            input,
            value,
            prev_out: None,
            next_out: None,
            prev_in: None,
            next_in: None,
        }
    }

    /// Producing node.
    pub fn source(&self) -> NodeId {
        self.source
    }

    /// Output slot on the source.
    pub fn output(&self) -> usize {
        self.output
    }

    /// Consuming node.
    pub fn target(&self) -> NodeId {
        self.target
    }

    /// Input slot on the target.
    pub fn input(&self) -> usize {
        self.input
    }

    /// The value carried along this arc.
    pub fn value(&self) -> ValueId {
        self.value
    }
}
