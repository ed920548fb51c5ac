//! Traversal
//!
//! Sequential, depth-first, and breadth-first walks over a compute graph,
//! plus the fan-in/fan-out chain walks they are built on.
//!
//! Every iterator borrows the graph, so the graph cannot be restructured
//! while one is live. The mutable forms hand out `&mut Node` for editing
//! names and attributes only; links stay private to the graph.

use std::collections::{HashSet, VecDeque};

use crate::arena::{Arena, IterMutIn};

use super::node::{Arc, ArcId, Node, NodeId};
use super::ComputeGraph;

/// Mutable traversal in a precomputed order.
pub type NodesMut<'g> = IterMutIn<'g, Node>;

impl ComputeGraph<'_> {
    /// Nodes in current sequence order, head to tail.
    pub fn iter(&self) -> Nodes<'_> {
        Nodes {
            nodes: &self.nodes,
            front: self.head,
            back: self.tail,
            remaining: self.nodes.len(),
        }
    }

    /// Mutable nodes in current sequence order.
    pub fn iter_mut(&mut self) -> NodesMut<'_> {
        let order = self.iter().map(|(id, _)| id).collect();
        self.nodes.iter_mut_in(order)
    }

    /// Depth-first preorder from the head, following fan-out arcs in chain order.
    pub fn dfs(&self) -> Dfs<'_> {
        Dfs {
            nodes: &self.nodes,
            arcs: &self.arcs,
            start: self.head,
            stack: Vec::new(),
            visited: HashSet::new(),
        }
    }

    /// Mutable nodes in depth-first preorder.
    pub fn dfs_mut(&mut self) -> NodesMut<'_> {
        let order = self.dfs().map(|(id, _)| id).collect();
        self.nodes.iter_mut_in(order)
    }

    /// Breadth-first order from the head, following fan-out arcs in chain order.
    pub fn bfs(&self) -> Bfs<'_> {
        let mut queue = VecDeque::new();
        let mut visited = HashSet::new();
        if let Some(head) = self.head {
            queue.push_back(head);
            visited.insert(head);
        }
        Bfs {
            nodes: &self.nodes,
            arcs: &self.arcs,
            queue,
            visited,
        }
    }

    /// Mutable nodes in breadth-first order.
    pub fn bfs_mut(&mut self) -> NodesMut<'_> {
        let order = self.bfs().map(|(id, _)| id).collect();
        self.nodes.iter_mut_in(order)
    }

    /// Arcs entering `node`, in chain order. Empty for a stale handle.
    pub fn fan_in(&self, node: NodeId) -> Chain<'_> {
        Chain {
            arcs: &self.arcs,
            cursor: self.nodes.get(node).and_then(|n| n.first_in),
            direction: Direction::In,
        }
    }

    /// Arcs leaving `node`, in chain order. Empty for a stale handle.
    pub fn fan_out(&self, node: NodeId) -> Chain<'_> {
        Chain {
            arcs: &self.arcs,
            cursor: self.nodes.get(node).and_then(|n| n.first_out),
            direction: Direction::Out,
        }
    }
}

/// Sequential iterator returned by [`ComputeGraph::iter`].
pub struct Nodes<'g> {
    nodes: &'g Arena<Node>,
    front: Option<NodeId>,
    back: Option<NodeId>,
    remaining: usize,
}

impl<'g> Iterator for Nodes<'g> {
    type Item = (NodeId, &'g Node);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let id = self.front?;
        let node = self.nodes.get(id)?;
        self.front = node.next;
        self.remaining -= 1;
        Some((id, node))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

impl DoubleEndedIterator for Nodes<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let id = self.back?;
        let node = self.nodes.get(id)?;
        self.back = node.prev;
        self.remaining -= 1;
        Some((id, node))
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    In,
    Out,
}

/// Walk along a fan-in or fan-out chain.
pub struct Chain<'g> {
    arcs: &'g Arena<Arc>,
    cursor: Option<ArcId>,
    direction: Direction,
}

impl Iterator for Chain<'_> {
    type Item = ArcId;

    fn next(&mut self) -> Option<ArcId> {
        let id = self.cursor?;
        let arc = self.arcs.get(id)?;
        self.cursor = match self.direction {
            Direction::In => arc.next_in,
            Direction::Out => arc.next_out,
        };
        Some(id)
    }
}

/// Depth-first iterator returned by [`ComputeGraph::dfs`].
pub struct Dfs<'g> {
    nodes: &'g Arena<Node>,
    arcs: &'g Arena<Arc>,
    start: Option<NodeId>,
    /// One cursor per open node: the next fan-out arc still to descend.
    stack: Vec<Option<ArcId>>,
    visited: HashSet<NodeId>,
}

impl<'g> Dfs<'g> {
    fn enter(&mut self, id: NodeId) -> Option<(NodeId, &'g Node)> {
        let node = self.nodes.get(id)?;
        self.visited.insert(id);
        self.stack.push(node.first_out);
        Some((id, node))
    }
}

impl<'g> Iterator for Dfs<'g> {
    type Item = (NodeId, &'g Node);

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(start) = self.start.take() {
            return self.enter(start);
        }
        loop {
            let cursor = self.stack.last_mut()?;
            let Some(arc_id) = *cursor else {
                self.stack.pop();
                continue;
            };
            let arc = self.arcs.get(arc_id)?;
            *cursor = arc.next_out;
            if !self.visited.contains(&arc.target()) {
                return self.enter(arc.target());
            }
        }
    }
}

/// Breadth-first iterator returned by [`ComputeGraph::bfs`].
pub struct Bfs<'g> {
    nodes: &'g Arena<Node>,
    arcs: &'g Arena<Arc>,
    queue: VecDeque<NodeId>,
    visited: HashSet<NodeId>,
}

impl<'g> Iterator for Bfs<'g> {
    type Item = (NodeId, &'g Node);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.queue.pop_front()?;
        let node = self.nodes.get(id)?;

        let mut cursor = node.first_out;
        while let Some(arc_id) = cursor {
            let Some(arc) = self.arcs.get(arc_id) else {
                break;
            };
            if self.visited.insert(arc.target()) {
                self.queue.push_back(arc.target());
            }
            cursor = arc.next_out;
        }
        Some((id, node))
    }
}
