//! Structural Mutation
//!
//! Erasing a node or arc has to keep three views consistent: the node
//! sequence, the fan-in/fan-out chains, and the flat arenas. Value
//! producer/consumer records in the module are updated in the same step.
//!
//! Erasing a handle that does not resolve is a contract violation and
//! panics before anything is unlinked.

use crate::error::{Error, Result};
use crate::module::{Define, Use, ValueId};

use super::node::{ArcId, NodeId};
use super::ComputeGraph;

impl ComputeGraph<'_> {
    /// Remove `node` and every arc touching it.
    ///
    /// The node's output values lose their producer and its input values
    /// lose the corresponding uses. Values themselves stay in the module.
    ///
    /// # Panics
    ///
    /// If `node` is not a live node of this graph.
    pub fn erase_node(&mut self, node: NodeId) {
        let (prev, next) = {
            let n = self.node_at(node);
            (n.prev, n.next)
        };

        // 1. Splice out of the sequence.
        match next {
            Some(next) => self.node_at_mut(next).prev = prev,
            None => self.tail = prev,
        }
        match prev {
            Some(prev) => self.node_at_mut(prev).next = next,
            None => self.head = next,
        }

        // 2. Fan-in arcs. Read the successor before the current arc is freed.
        let mut arcs = 0usize;
        let mut cursor = self.node_at(node).first_in;
        while let Some(arc) = cursor {
            cursor = self.arc_at(arc).next_in;
            self.unlink_arc(arc);
            arcs += 1;
        }

        // 3. Fan-out arcs. Re-read the head: a self-loop is already gone.
        let mut cursor = self.node_at(node).first_out;
        while let Some(arc) = cursor {
            cursor = self.arc_at(arc).next_out;
            self.unlink_arc(arc);
            arcs += 1;
        }

        // 4. Inputs bound without arcs, and produced values.
        let Some(removed) = self.nodes.remove(node) else {
            unreachable!("node {node:?} vanished during erase");
        };
        for (input, slot) in removed.inputs().iter().enumerate() {
            if let Some(value) = *slot {
                self.value_at_mut(value).remove_use(Use { node, input });
            }
        }
        for (output, value) in removed.outputs().iter().enumerate() {
            let value = self.value_at_mut(*value);
            if value.define() == Some(Define { node, output }) {
                value.set_define(None);
            }
        }

        tracing::debug!(graph = %self.name, ?node, arcs, "erased node");
        self.verify_if_configured();
    }

    /// Remove a single arc from both chains and the arc collection.
    ///
    /// The target's input slot is severed and its use of the value dropped.
    ///
    /// # Panics
    ///
    /// If `arc` is not in this graph's arc collection.
    pub fn erase_arc(&mut self, arc: ArcId) {
        self.unlink_arc(arc);
        tracing::debug!(graph = %self.name, ?arc, "erased arc");
        self.verify_if_configured();
    }

    fn unlink_arc(&mut self, id: ArcId) {
        // Membership is checked before any link is touched, so a missing arc
        // can never leave the chains and the collection out of step.
        let arc = self.arcs.get(id).unwrap_or_else(|| {
            panic!("arc {id:?} is not in the arc collection of graph `{}`", self.name)
        });
        let (source, target) = (arc.source(), arc.target());
        let (input, value) = (arc.input(), arc.value());
        let (prev_out, next_out) = (arc.prev_out, arc.next_out);
        let (prev_in, next_in) = (arc.prev_in, arc.next_in);

        // 1. Fan-out chain of the source.
        match prev_out {
            Some(prev) => self.arc_at_mut(prev).next_out = next_out,
            None => self.node_at_mut(source).first_out = next_out,
        }
        if let Some(next) = next_out {
            self.arc_at_mut(next).prev_out = prev_out;
        }

        // 2. Fan-in chain of the target.
        match prev_in {
            Some(prev) => self.arc_at_mut(prev).next_in = next_in,
            None => self.node_at_mut(target).first_in = next_in,
        }
        if let Some(next) = next_in {
            self.arc_at_mut(next).prev_in = prev_in;
        }

        // 3. The binding the arc stood for.
        self.node_at_mut(target).sever_input(input);
        let removed = self.value_at_mut(value).remove_use(Use { node: target, input });
        debug_assert!(removed, "arc {id:?} had no matching use record");

        // 4. The flat collection.
        self.arcs.remove(id);
    }

    /// Remove a value from the module.
    ///
    /// Rejected with [`Error::ValueInUse`] while the value still has a
    /// producer or any consumer.
    pub fn erase_value(&mut self, id: ValueId) -> Result<()> {
        let value = self.module.value(id).ok_or(Error::ValueNotFound(id))?;
        if value.has_producer() || value.is_used() {
            return Err(Error::ValueInUse {
                name: value.name().to_string(),
                has_producer: value.has_producer(),
                consumers: value.uses().len(),
            });
        }
        self.module.remove_value(id);
        tracing::debug!(graph = %self.name, value = ?id, "erased value");
        Ok(())
    }
}
