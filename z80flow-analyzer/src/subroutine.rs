//! Subroutine closure and call graph
//!
//! Used by call-graph and flow-chart emitters; label assignment does not
//! depend on it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use z80flow_spec::Address;

use crate::error::Result;
use crate::graph::FlowGraph;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subroutine {
    pub start: Address,
    /// Nodes reachable from `start` over branch edges
    pub nodes: BTreeSet<Address>,
    /// Call targets of those nodes
    pub callees: BTreeSet<Address>,
    /// Bytes covered by the nodes
    pub size: usize,
}

impl Subroutine {
    /// Closure of the node at `start`
    pub fn new(graph: &FlowGraph, start: Address) -> Result<Self> {
        graph.node(start)?;

        let mut nodes = BTreeSet::from([start]);
        let mut callees = BTreeSet::new();
        let mut size = 0;
        let mut queue = VecDeque::from([start]);
        while let Some(address) = queue.pop_front() {
            let Some(node) = graph.get(address) else {
                continue;
            };
            size += node.length;
            callees.extend(node.callee);
            for &next in &node.branch_nodes {
                if nodes.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        Ok(Subroutine {
            start,
            nodes,
            callees,
            size,
        })
    }
}

/// Subroutines transitively called from `entries`, keyed by start address.
/// Entries without a node are skipped.
pub fn call_graph(graph: &FlowGraph, entries: &[Address]) -> BTreeMap<Address, Subroutine> {
    let mut result = BTreeMap::new();
    let mut queue: VecDeque<Address> = entries.iter().copied().collect();
    while let Some(start) = queue.pop_front() {
        if result.contains_key(&start) {
            continue;
        }
        let Ok(sub) = Subroutine::new(graph, start) else {
            continue;
        };
        queue.extend(sub.callees.iter().copied());
        result.insert(start, sub);
    }
    result
}
