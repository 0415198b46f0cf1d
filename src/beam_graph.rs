//! Undirected connectivity graph shared by all topologies
//!
//! Edges are always inserted into and removed from both endpoint sets
//! together, and self-loops are refused, so the adjacency stays symmetric.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use hashbrown::HashSet;

use crate::beam_interface::NodeId;

/// One step of a flood: `from` relays to the newly reached `to`
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Hop {
    pub from: NodeId,
    pub to: NodeId,
    /// Distance of `to` from the flood origin
    pub depth: usize,
}

#[derive(Debug, Default, Clone)]
pub struct AdjacencyGraph {
    nodes: Vec<NodeId>,
    adjacency: BTreeMap<NodeId, BTreeSet<NodeId>>,
}

impl AdjacencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node. Returns false if it was already known.
    pub fn add_node(&mut self, id: NodeId) -> bool {
        if self.adjacency.contains_key(&id) {
            return false;
        }
        self.nodes.push(id);
        self.adjacency.insert(id, BTreeSet::new());
        true
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.adjacency.contains_key(&id)
    }

    /// Nodes in registration order
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add the edge a-b. Returns true only if a new edge was created.
    pub fn connect(&mut self, a: NodeId, b: NodeId) -> bool {
        if a == b || !self.contains(a) || !self.contains(b) {
            return false;
        }
        let added = self.adjacency.get_mut(&a).map_or(false, |set| set.insert(b));
        if let Some(set) = self.adjacency.get_mut(&b) {
            set.insert(a);
        }
        added
    }

    pub fn disconnect(&mut self, a: NodeId, b: NodeId) -> bool {
        let removed = self
            .adjacency
            .get_mut(&a)
            .map_or(false, |set| set.remove(&b));
        if let Some(set) = self.adjacency.get_mut(&b) {
            set.remove(&a);
        }
        removed
    }

    pub fn are_connected(&self, a: NodeId, b: NodeId) -> bool {
        self.adjacency
            .get(&a)
            .map_or(false, |set| set.contains(&b))
    }

    pub fn neighbors(&self, id: NodeId) -> Option<&BTreeSet<NodeId>> {
        self.adjacency.get(&id)
    }

    pub fn degree(&self, id: NodeId) -> usize {
        self.adjacency.get(&id).map_or(0, |set| set.len())
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(|set| set.len()).sum::<usize>() / 2
    }

    /// Breadth-first, visit-once relay plan starting at `origin`.
    ///
    /// Every node of the origin's connected component (other than the origin)
    /// appears exactly once as a `to`, reached from the node that discovered it.
    pub fn flood(&self, origin: NodeId) -> Vec<Hop> {
        let mut hops = Vec::new();
        if !self.contains(origin) {
            return hops;
        }

        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut queue = VecDeque::new();
        visited.insert(origin);
        queue.push_back((origin, 0usize));

        while let Some((current, depth)) = queue.pop_front() {
            let Some(neighbors) = self.adjacency.get(&current) else {
                continue;
            };
            for &next in neighbors {
                if visited.insert(next) {
                    hops.push(Hop {
                        from: current,
                        to: next,
                        depth: depth + 1,
                    });
                    queue.push_back((next, depth + 1));
                }
            }
        }
        hops
    }

    /// Check the symmetry and no-self-loop invariants
    pub fn is_consistent(&self) -> bool {
        self.adjacency.iter().all(|(id, set)| {
            !set.contains(id)
                && set
                    .iter()
                    .all(|other| self.adjacency.get(other).map_or(false, |s| s.contains(id)))
        })
    }
}
