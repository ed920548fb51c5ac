//! Error types for tessera-core.

use thiserror::Error;

use crate::graph::NodeId;
use crate::module::ValueId;

/// Result type for tessera-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Which side of a node a slot index refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Input,
    Output,
}

impl std::fmt::Display for SlotKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlotKind::Input => f.write_str("input"),
            SlotKind::Output => f.write_str("output"),
        }
    }
}

/// Errors reported by the graph engine and its module boundary.
#[derive(Debug, Error)]
pub enum Error {
    /// A value with this name is already registered in the module.
    #[error("value `{0}` already exists in the module")]
    DuplicateValue(String),

    /// The value handle does not resolve in the module.
    #[error("value not found: {0:?}")]
    ValueNotFound(ValueId),

    /// The value still has a producer or consumers and cannot be erased.
    #[error("value `{name}` is still in use (producer: {has_producer}, consumers: {consumers})")]
    ValueInUse {
        name: String,
        has_producer: bool,
        consumers: usize,
    },

    /// The value is already produced by another node.
    #[error("value `{0}` already has a producer")]
    AlreadyDefined(String),

    /// Topological sort could not schedule every node.
    #[error("graph contains a cycle: scheduled {} of {total} nodes", .partial.len())]
    CyclicGraph {
        /// Nodes that were scheduled before the sort stalled.
        partial: Vec<NodeId>,
        total: usize,
    },

    /// An input slot was never bound, so its node can never be scheduled.
    #[error("input slot {slot} of `{node}` is unbound; the graph cannot be scheduled")]
    UnboundInput { node: String, slot: usize },

    /// The node handle does not resolve in this graph.
    #[error("node not found: {0:?}")]
    StaleNode(NodeId),

    /// A slot index past the end of a node's inputs or outputs.
    #[error("{kind} slot {slot} out of range for `{node}` ({len} slots)")]
    SlotOutOfRange {
        node: String,
        kind: SlotKind,
        slot: usize,
        len: usize,
    },

    /// The input slot is already bound to a value.
    #[error("input slot {slot} of `{node}` is already bound")]
    InputAlreadyBound { node: String, slot: usize },

    /// A structural consistency check failed.
    #[error("graph invariant violated: {0}")]
    Corrupted(String),

    /// Failed to parse a configuration document.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}
