//! Stable Topological Sort
//!
//! Reorders the node sequence so every producer precedes its consumers.
//!
//! # Algorithm
//!
//! Kahn's algorithm with a min-priority frontier keyed by each node's
//! position in the sequence before the sort:
//!
//! 1. Stamp every node with its current position and compute its in-degree:
//!    the number of input slots it declares, minus slots bound to values no
//!    node here produces and slots severed by an erase.
//! 2. Seed the frontier with every node of in-degree zero.
//! 3. Pop the node with the smallest original position, append it to the
//!    output, and decrement the in-degree of every consumer of each of its
//!    output values. Consumers that reach zero join the frontier.
//! 4. Relink the sequence to match the output.
//!
//! Among nodes that are ready at the same time, the one that came first
//! before the sort is scheduled first, so sorting an already sorted graph
//! is a no-op and emitted code does not vary between runs.
//!
//! If the output is shorter than the graph, the sequence is left untouched.
//! A stalled node with a slot that was never bound is reported as
//! [`Error::UnboundInput`]; otherwise the stall is a cycle and
//! [`Error::CyclicGraph`] is returned.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::error::{Error, Result};
use crate::module::ValueId;

use super::node::{Node, NodeId};
use super::ComputeGraph;

impl ComputeGraph<'_> {
    /// Number of input slots of `node` the sort waits on.
    ///
    /// Every declared slot counts except those bound to a value no node in
    /// this graph produces and those severed by an erase. An unbound slot is
    /// never satisfied, so its node cannot be scheduled.
    pub fn in_degree(&self, node: NodeId) -> Option<usize> {
        let node = self.nodes.get(node)?;
        Some(
            (0..node.num_inputs())
                .filter(|slot| match node.input(*slot) {
                    Some(value) => self.producer_in_graph(value).is_some(),
                    None => !node.is_severed(*slot),
                })
                .count(),
        )
    }

    fn producer_in_graph(&self, value: ValueId) -> Option<NodeId> {
        self.module
            .value(value)
            .and_then(|v| v.define())
            .map(|define| define.node)
            .filter(|node| self.nodes.contains(*node))
    }

    /// Compute the stable topological order without changing the graph.
    pub fn topological_order(&self) -> Result<Vec<NodeId>> {
        let order: Vec<NodeId> = self.iter().map(|(id, _)| id).collect();
        let position: HashMap<NodeId, usize> =
            order.iter().enumerate().map(|(index, id)| (*id, index)).collect();

        let mut in_degree: Vec<usize> = order
            .iter()
            .map(|id| self.in_degree(*id).unwrap_or(0))
            .collect();
        let mut queue: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree == 0)
            .map(|(index, _)| Reverse(index))
            .collect();

        let mut result = Vec::with_capacity(order.len());
        let mut scheduled = vec![false; order.len()];
        while let Some(Reverse(index)) = queue.pop() {
            let id = order[index];
            scheduled[index] = true;
            for value in self.node_at(id).outputs() {
                let Some(value) = self.module.value(*value) else {
                    continue;
                };
                for user in value.uses() {
                    let Some(&consumer) = position.get(&user.node) else {
                        continue;
                    };
                    in_degree[consumer] = in_degree[consumer].saturating_sub(1);
                    if in_degree[consumer] == 0 {
                        queue.push(Reverse(consumer));
                    }
                }
            }
            result.push(id);
        }

        if result.len() < order.len() {
            let unbound = order
                .iter()
                .zip(&scheduled)
                .filter(|(_, done)| !**done)
                .find_map(|(id, _)| {
                    let node = self.node_at(*id);
                    open_slot(node).map(|slot| (node, slot))
                });
            if let Some((node, slot)) = unbound {
                tracing::warn!(
                    graph = %self.name,
                    node = node.name(),
                    slot,
                    "topological sort stalled on an unbound input"
                );
                return Err(Error::UnboundInput {
                    node: node.name().to_string(),
                    slot,
                });
            }

            tracing::warn!(
                graph = %self.name,
                scheduled = result.len(),
                total = order.len(),
                "topological sort stalled on a cycle"
            );
            return Err(Error::CyclicGraph {
                partial: result,
                total: order.len(),
            });
        }
        Ok(result)
    }

    /// Relink the node sequence into stable topological order.
    ///
    /// On a cycle the sequence is left as it was.
    pub fn topological_sort(&mut self) -> Result<()> {
        let order = self.topological_order()?;

        for (index, id) in order.iter().enumerate() {
            let prev = index.checked_sub(1).map(|p| order[p]);
            let next = order.get(index + 1).copied();
            let node = self.node_at_mut(*id);
            node.prev = prev;
            node.next = next;
        }
        self.head = order.first().copied();
        self.tail = order.last().copied();

        tracing::debug!(graph = %self.name, nodes = order.len(), "sorted graph");
        self.verify_if_configured();
        Ok(())
    }
}

/// First input slot that was never bound and not severed.
fn open_slot(node: &Node) -> Option<usize> {
    (0..node.num_inputs()).find(|slot| node.input(*slot).is_none() && !node.is_severed(*slot))
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::graph::{ComputeGraph, NodeId};
    use crate::module::Module;

    fn names(graph: &ComputeGraph<'_>) -> Vec<String> {
        graph.iter().map(|(_, node)| node.name().to_string()).collect()
    }

    fn node(graph: &mut ComputeGraph<'_>, name: &str, num_inputs: usize) -> NodeId {
        let id = graph.add_node("Op", num_inputs);
        graph.node_mut(id).unwrap().set_name(name);
        graph.add_output(id, name.to_lowercase()).unwrap();
        id
    }

    #[test]
    fn diamond_sorts_with_stable_middle() {
        let mut module = Module::new();
        let mut graph = ComputeGraph::new("g", &mut module);

        // Insert out of dependency order: D, C, A, B.
        let d = node(&mut graph, "D", 2);
        let c = node(&mut graph, "C", 1);
        let a = node(&mut graph, "A", 0);
        let b = node(&mut graph, "B", 1);
        graph.connect(a, 0, b, 0).unwrap();
        graph.connect(a, 0, c, 0).unwrap();
        graph.connect(b, 0, d, 0).unwrap();
        graph.connect(c, 0, d, 1).unwrap();

        assert_eq!(graph.in_degree(a), Some(0));
        assert_eq!(graph.in_degree(b), Some(1));
        assert_eq!(graph.in_degree(c), Some(1));
        assert_eq!(graph.in_degree(d), Some(2));

        graph.topological_sort().unwrap();
        // C preceded B before the sort, so it still does.
        assert_eq!(names(&graph), vec!["A", "C", "B", "D"]);
        assert_eq!(graph.head(), Some(a));
        assert_eq!(graph.tail(), Some(d));
    }

    #[test]
    fn ties_break_on_original_position_not_readiness_time() {
        let mut module = Module::new();
        let mut graph = ComputeGraph::new("g", &mut module);

        let x = node(&mut graph, "X", 0);
        let p = node(&mut graph, "P", 1);
        let y = node(&mut graph, "Y", 0);
        let q = node(&mut graph, "Q", 1);
        graph.connect(y, 0, p, 0).unwrap();
        graph.connect(x, 0, q, 0).unwrap();

        // Q becomes ready before P, but P came first.
        graph.topological_sort().unwrap();
        assert_eq!(names(&graph), vec!["X", "Y", "P", "Q"]);
    }

    #[test]
    fn sorting_twice_is_idempotent() {
        let mut module = Module::new();
        let mut graph = ComputeGraph::new("g", &mut module);

        let c = node(&mut graph, "C", 2);
        let a = node(&mut graph, "A", 0);
        let b = node(&mut graph, "B", 1);
        graph.connect(a, 0, b, 0).unwrap();
        graph.connect(a, 0, c, 0).unwrap();
        graph.connect(b, 0, c, 1).unwrap();

        graph.topological_sort().unwrap();
        let first = names(&graph);
        graph.topological_sort().unwrap();
        assert_eq!(names(&graph), first);
        assert_eq!(first, vec!["A", "B", "C"]);
    }

    #[test]
    fn two_cycle_is_reported() {
        let mut module = Module::new();
        let mut graph = ComputeGraph::new("g", &mut module);

        let x = node(&mut graph, "X", 1);
        let y = node(&mut graph, "Y", 1);
        graph.connect(x, 0, y, 0).unwrap();
        graph.connect(y, 0, x, 0).unwrap();

        match graph.topological_sort() {
            Err(Error::CyclicGraph { partial, total }) => {
                assert!(partial.len() < 2);
                assert_eq!(total, 2);
            }
            other => panic!("expected a cycle error, got {other:?}"),
        }
        // The sequence is untouched.
        assert_eq!(names(&graph), vec!["X", "Y"]);
    }

    #[test]
    fn cycle_behind_a_valid_prefix_keeps_prefix() {
        let mut module = Module::new();
        let mut graph = ComputeGraph::new("g", &mut module);

        let s = node(&mut graph, "S", 0);
        let x = node(&mut graph, "X", 2);
        let y = node(&mut graph, "Y", 1);
        graph.connect(s, 0, x, 0).unwrap();
        graph.connect(x, 0, y, 0).unwrap();
        graph.connect(y, 0, x, 1).unwrap();

        let err = graph.topological_order().unwrap_err();
        assert!(matches!(err, Error::CyclicGraph { ref partial, total: 3 } if partial == &vec![s]));
        assert!(err.to_string().contains("scheduled 1 of 3"));
    }

    #[test]
    fn producerless_inputs_do_not_block() {
        let mut module = Module::new();
        let weight = module.add_value("weight").unwrap();
        let mut graph = ComputeGraph::new("g", &mut module);

        let conv = node(&mut graph, "Conv", 2);
        let input = node(&mut graph, "Input", 0);
        graph.connect(input, 0, conv, 0).unwrap();
        graph.set_input(conv, 1, weight).unwrap();

        assert_eq!(graph.in_degree(conv), Some(1));
        graph.topological_sort().unwrap();
        assert_eq!(names(&graph), vec!["Input", "Conv"]);
    }

    #[test]
    fn unbound_input_blocks_the_sort() {
        let mut module = Module::new();
        let mut graph = ComputeGraph::new("g", &mut module);

        let add = node(&mut graph, "Add", 2);
        let a = node(&mut graph, "A", 0);
        graph.connect(a, 0, add, 0).unwrap();

        assert_eq!(graph.in_degree(add), Some(2));
        match graph.topological_sort() {
            Err(Error::UnboundInput { node, slot }) => {
                assert_eq!(node, "Add");
                assert_eq!(slot, 1);
            }
            other => panic!("expected an unbound input error, got {other:?}"),
        }
        assert_eq!(names(&graph), vec!["Add", "A"]);
    }

    #[test]
    fn severed_input_stops_counting() {
        let mut module = Module::new();
        let mut graph = ComputeGraph::new("g", &mut module);

        let add = node(&mut graph, "Add", 2);
        let a = node(&mut graph, "A", 0);
        let b = node(&mut graph, "B", 0);
        graph.connect(a, 0, add, 0).unwrap();
        let arc = graph.connect(b, 0, add, 1).unwrap();
        assert_eq!(graph.in_degree(add), Some(2));

        graph.erase_arc(arc);
        assert_eq!(graph.in_degree(add), Some(1));
        graph.topological_sort().unwrap();
        assert_eq!(names(&graph), vec!["A", "Add", "B"]);

        // Reconnecting the slot makes it count again.
        graph.connect(b, 0, add, 1).unwrap();
        assert_eq!(graph.in_degree(add), Some(2));
        graph.topological_sort().unwrap();
        assert_eq!(names(&graph), vec!["A", "B", "Add"]);
    }

    #[test]
    fn value_consumed_twice_by_one_node() {
        let mut module = Module::new();
        let mut graph = ComputeGraph::new("g", &mut module);

        let mul = node(&mut graph, "Mul", 2);
        let x = node(&mut graph, "X", 0);
        graph.connect(x, 0, mul, 0).unwrap();
        graph.connect(x, 0, mul, 1).unwrap();

        assert_eq!(graph.in_degree(mul), Some(2));
        graph.topological_sort().unwrap();
        assert_eq!(names(&graph), vec!["X", "Mul"]);
    }

    #[test]
    fn empty_graph_sorts() {
        let mut module = Module::new();
        let mut graph = ComputeGraph::new("g", &mut module);

        graph.topological_sort().unwrap();
        assert!(graph.is_empty());
        assert_eq!(graph.head(), None);
    }
}
