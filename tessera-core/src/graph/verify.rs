//! Consistency check over the three views of a graph and its value records.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::module::{Define, Use};

use super::node::{ArcId, NodeId};
use super::ComputeGraph;

fn corrupted(msg: String) -> Error {
    Error::Corrupted(msg)
}

impl ComputeGraph<'_> {
    /// Check every structural invariant of the graph.
    ///
    /// - The sequence runs from head to tail through every node exactly once,
    ///   with `prev` and `next` agreeing.
    /// - Every arc sits exactly once in its source's fan-out chain and its
    ///   target's fan-in chain, with consistent back-links.
    /// - Node slots, arcs, and value producer/consumer records agree, and an
    ///   input reading a value produced here is fed by an arc.
    pub fn verify(&self) -> Result<()> {
        self.verify_sequence()?;
        self.verify_chains()?;
        self.verify_values()
    }

    fn verify_sequence(&self) -> Result<()> {
        let mut seen = HashSet::new();
        let mut prev: Option<NodeId> = None;
        let mut cursor = self.head;
        while let Some(id) = cursor {
            let node = self
                .nodes
                .get(id)
                .ok_or_else(|| corrupted(format!("sequence reaches stale node {id:?}")))?;
            if !seen.insert(id) {
                return Err(corrupted(format!("sequence revisits node {id:?}")));
            }
            if node.prev != prev {
                return Err(corrupted(format!(
                    "node {id:?} has prev {:?}, expected {prev:?}",
                    node.prev
                )));
            }
            prev = Some(id);
            cursor = node.next;
        }
        if prev != self.tail {
            return Err(corrupted(format!(
                "sequence ends at {prev:?} but tail is {:?}",
                self.tail
            )));
        }
        if seen.len() != self.nodes.len() {
            return Err(corrupted(format!(
                "sequence covers {} of {} nodes",
                seen.len(),
                self.nodes.len()
            )));
        }
        Ok(())
    }

    fn verify_chains(&self) -> Result<()> {
        let mut in_seen: HashSet<ArcId> = HashSet::new();
        let mut out_seen: HashSet<ArcId> = HashSet::new();

        for (id, node) in self.nodes.iter() {
            let mut prev = None;
            let mut cursor = node.first_out;
            while let Some(arc_id) = cursor {
                let arc = self.arcs.get(arc_id).ok_or_else(|| {
                    corrupted(format!("fan-out of {id:?} reaches freed arc {arc_id:?}"))
                })?;
                if arc.source() != id || arc.prev_out != prev || !out_seen.insert(arc_id) {
                    return Err(corrupted(format!(
                        "fan-out chain of {id:?} broken at {arc_id:?}"
                    )));
                }
                prev = Some(arc_id);
                cursor = arc.next_out;
            }

            let mut prev = None;
            let mut cursor = node.first_in;
            while let Some(arc_id) = cursor {
                let arc = self.arcs.get(arc_id).ok_or_else(|| {
                    corrupted(format!("fan-in of {id:?} reaches freed arc {arc_id:?}"))
                })?;
                if arc.target() != id || arc.prev_in != prev || !in_seen.insert(arc_id) {
                    return Err(corrupted(format!(
                        "fan-in chain of {id:?} broken at {arc_id:?}"
                    )));
                }
                prev = Some(arc_id);
                cursor = arc.next_in;
            }
        }

        if out_seen.len() != self.arcs.len() || in_seen.len() != self.arcs.len() {
            return Err(corrupted(format!(
                "{} arcs in the collection, {} in fan-out chains, {} in fan-in chains",
                self.arcs.len(),
                out_seen.len(),
                in_seen.len()
            )));
        }

        for (id, arc) in self.arcs.iter() {
            let source = self.nodes.get(arc.source());
            let target = self.nodes.get(arc.target());
            let (Some(source), Some(target)) = (source, target) else {
                return Err(corrupted(format!("arc {id:?} touches a freed node")));
            };
            if source.output(arc.output()) != Some(arc.value())
                || target.input(arc.input()) != Some(arc.value())
            {
                return Err(corrupted(format!("arc {id:?} disagrees with its slots")));
            }
        }
        Ok(())
    }

    fn verify_values(&self) -> Result<()> {
        for (id, node) in self.nodes.iter() {
            for (output, value) in node.outputs().iter().enumerate() {
                let define = self.module.value(*value).and_then(|v| v.define());
                if define != Some(Define { node: id, output }) {
                    return Err(corrupted(format!(
                        "output {output} of {id:?} is not the producer of {value:?}"
                    )));
                }
            }
            for (input, slot) in node.inputs().iter().enumerate() {
                let Some(value_id) = *slot else { continue };
                let Some(value) = self.module.value(value_id) else {
                    return Err(corrupted(format!(
                        "input {input} of {id:?} holds freed value {value_id:?}"
                    )));
                };
                if !value.uses().contains(&Use { node: id, input }) {
                    return Err(corrupted(format!(
                        "input {input} of {id:?} is not recorded as a use of {value_id:?}"
                    )));
                }
                let produced = value
                    .define()
                    .is_some_and(|define| self.nodes.contains(define.node));
                if produced && !self.fan_in(id).any(|arc| self.arc_at(arc).input() == input) {
                    return Err(corrupted(format!(
                        "input {input} of {id:?} reads `{}` without an arc",
                        value.name()
                    )));
                }
            }
        }

        for (value_id, value) in self.module.values() {
            if let Some(define) = value.define() {
                if let Some(node) = self.nodes.get(define.node) {
                    if node.output(define.output) != Some(value_id) {
                        return Err(corrupted(format!(
                            "value `{}` names a producer slot that does not hold it",
                            value.name()
                        )));
                    }
                }
            }
            for user in value.uses() {
                if let Some(node) = self.nodes.get(user.node) {
                    if node.input(user.input) != Some(value_id) {
                        return Err(corrupted(format!(
                            "value `{}` names a consumer slot that does not hold it",
                            value.name()
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::GraphConfig;
    use crate::error::Error;
    use crate::graph::ComputeGraph;
    use crate::module::{Module, Use};

    #[test]
    fn fresh_graph_verifies() {
        let mut module = Module::new();
        let mut graph = ComputeGraph::new("g", &mut module);
        let a = graph.add_node("A", 0);
        let b = graph.add_node("B", 1);
        graph.add_output(a, "x").unwrap();
        graph.connect(a, 0, b, 0).unwrap();

        assert!(graph.verify().is_ok());
    }

    #[test]
    fn detects_broken_sequence() {
        let mut module = Module::new();
        let config = GraphConfig { verify_mutations: false };
        let mut graph = ComputeGraph::with_config("g", &mut module, config);
        let a = graph.add_node("A", 0);
        let b = graph.add_node("B", 0);

        graph.node_at_mut(b).prev = None;
        let err = graph.verify().unwrap_err();
        assert!(matches!(err, Error::Corrupted(_)));

        graph.node_at_mut(b).prev = Some(a);
        graph.tail = Some(a);
        assert!(graph.verify().is_err());
    }

    #[test]
    fn detects_arc_missing_from_chain() {
        let mut module = Module::new();
        let config = GraphConfig { verify_mutations: false };
        let mut graph = ComputeGraph::with_config("g", &mut module, config);
        let a = graph.add_node("A", 0);
        let b = graph.add_node("B", 1);
        graph.add_output(a, "x").unwrap();
        graph.connect(a, 0, b, 0).unwrap();

        graph.node_at_mut(a).first_out = None;
        let err = graph.verify().unwrap_err();
        assert!(err.to_string().contains("fan-out chains"));
    }

    #[test]
    fn detects_produced_input_without_arc() {
        let mut module = Module::new();
        let config = GraphConfig { verify_mutations: false };
        let mut graph = ComputeGraph::with_config("g", &mut module, config);
        let p = graph.add_node("P", 0);
        let c = graph.add_node("C", 1);
        let v = graph.add_output(p, "v").unwrap();

        // Bind the slot the way `set_input` would, bypassing its check.
        graph.node_at_mut(c).bind_input(0, v);
        graph
            .module
            .value_mut(v)
            .unwrap()
            .add_use(Use { node: c, input: 0 });

        let err = graph.verify().unwrap_err();
        assert!(err.to_string().contains("without an arc"));
    }
}
