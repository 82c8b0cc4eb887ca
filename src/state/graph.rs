// src/state/graph.rs

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::errors::{Result, StateError};

/// Internal node structure: both directions of the wait relation for one task.
#[derive(Debug, Clone, Default)]
struct WaitNode {
    /// Tasks this one waits for.
    waits: Vec<String>,
    /// Tasks waiting for this one. Maintained only by [`WaitGraph::add_edge`]
    /// and [`WaitGraph::remove_task`].
    halts: Vec<String>,
}

/// The wait relation between tasks of one state.
///
/// There is one logical edge set; `halts` is its inverse, updated in the same
/// call that changes `waits`, so `u ∈ waits(t) ⇔ t ∈ halts(u)` holds after
/// every public call.
#[derive(Debug, Clone, Default)]
pub(crate) struct WaitGraph {
    nodes: HashMap<String, WaitNode>,
}

impl WaitGraph {
    /// Record that `waiter` waits for `target`. Duplicate edges are ignored.
    pub fn add_edge(&mut self, waiter: &str, target: &str) {
        let node = self.nodes.entry(waiter.to_string()).or_default();
        if node.waits.iter().any(|t| t == target) {
            return;
        }
        node.waits.push(target.to_string());

        self.nodes
            .entry(target.to_string())
            .or_default()
            .halts
            .push(waiter.to_string());
    }

    /// Drop a task and every edge touching it.
    pub fn remove_task(&mut self, id: &str) {
        let Some(node) = self.nodes.remove(id) else {
            return;
        };

        for target in &node.waits {
            if let Some(other) = self.nodes.get_mut(target) {
                other.halts.retain(|t| t != id);
            }
        }
        for waiter in &node.halts {
            if let Some(other) = self.nodes.get_mut(waiter) {
                other.waits.retain(|t| t != id);
            }
        }
    }

    pub fn waits_of(&self, id: &str) -> &[String] {
        self.nodes
            .get(id)
            .map(|n| n.waits.as_slice())
            .unwrap_or(&[])
    }

    pub fn halts_of(&self, id: &str) -> &[String] {
        self.nodes
            .get(id)
            .map(|n| n.halts.as_slice())
            .unwrap_or(&[])
    }

    /// Order `ids` so every task comes after the tasks it waits for.
    ///
    /// Only edges between members of `ids` are considered.
    pub fn order(&self, ids: &[String]) -> Result<Vec<String>> {
        // Edge direction: target -> waiter.
        let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();
        let index: HashMap<&str, usize> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        for i in 0..ids.len() {
            graph.add_node(i);
        }
        for (i, id) in ids.iter().enumerate() {
            for target in self.waits_of(id) {
                if let Some(&j) = index.get(target.as_str()) {
                    graph.add_edge(j, i, ());
                }
            }
        }

        match toposort(&graph, None) {
            Ok(order) => Ok(order.into_iter().map(|i| ids[i].clone()).collect()),
            Err(cycle) => Err(StateError::WaitCycle(ids[cycle.node_id()].clone())),
        }
    }
}
