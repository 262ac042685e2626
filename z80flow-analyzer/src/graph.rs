//! Address-keyed node table
//!
//! All nodes of one analysis run live in a single map. Edges are stored on
//! both ends (`branch_nodes`/`predecessors`, `callee`/`callers`) and are
//! only ever added through [`FlowGraph`], which keeps the two ends in sync.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use z80flow_spec::Address;

use crate::diagnostics::Diagnostic;
use crate::error::{AnalyzerError, Result};
use crate::node::AsmNode;

#[derive(Debug, Clone, Default)]
pub struct FlowGraph {
    nodes: BTreeMap<Address, AsmNode>,
}

impl FlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, address: Address) -> Option<&AsmNode> {
        self.nodes.get(&address)
    }

    pub fn get_mut(&mut self, address: Address) -> Option<&mut AsmNode> {
        self.nodes.get_mut(&address)
    }

    /// Node at `address`, or `UnknownNode`
    pub fn node(&self, address: Address) -> Result<&AsmNode> {
        self.get(address).ok_or(AnalyzerError::UnknownNode(address))
    }

    pub fn contains(&self, address: Address) -> bool {
        self.nodes.contains_key(&address)
    }

    /// Node at `address`, created empty if missing. Returns true if created.
    pub fn ensure(&mut self, address: Address) -> bool {
        if self.nodes.contains_key(&address) {
            return false;
        }
        self.nodes.insert(address, AsmNode::new(address));
        true
    }

    /// Nodes in ascending address order
    pub fn nodes(&self) -> impl Iterator<Item = &AsmNode> {
        self.nodes.values()
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut AsmNode> {
        self.nodes.values_mut()
    }

    pub fn addresses(&self) -> Vec<Address> {
        self.nodes.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Branch or fallthrough edge `from -> to`. Both nodes are created if
    /// missing; a repeated edge is stored once.
    pub fn add_branch(&mut self, from: Address, to: Address) {
        self.ensure(from);
        self.ensure(to);
        if let Some(node) = self.nodes.get_mut(&from) {
            if !node.branch_nodes.contains(&to) {
                node.branch_nodes.push(to);
            }
        }
        if let Some(node) = self.nodes.get_mut(&to) {
            if !node.predecessors.contains(&from) {
                node.predecessors.push(from);
            }
        }
    }

    /// Call edge `from -> to`, replacing an earlier callee of `from`.
    pub fn set_callee(&mut self, from: Address, to: Address) {
        self.ensure(from);
        self.ensure(to);
        let previous = self
            .nodes
            .get_mut(&from)
            .and_then(|node| node.callee.replace(to));
        if let Some(old) = previous.filter(|&old| old != to) {
            if let Some(node) = self.nodes.get_mut(&old) {
                node.callers.retain(|&c| c != from);
            }
        }
        if let Some(node) = self.nodes.get_mut(&to) {
            if !node.callers.contains(&from) {
                node.callers.push(from);
            }
        }
    }
}

/// Serializable copy of one node, for external graph emitters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub start: Address,
    pub length: usize,
    pub label: Option<String>,
    pub is_subroutine: bool,
    pub stop: bool,
    pub branch_nodes: Vec<Address>,
    pub predecessors: Vec<Address>,
    pub callee: Option<Address>,
    pub callers: Vec<Address>,
    pub data_refs: Vec<Address>,
    /// Rendered instruction text
    pub instructions: Vec<String>,
}

/// Serializable copy of a complete analysis result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<NodeSnapshot>,
    /// Leader address of every block
    pub blocks: Vec<Address>,
    /// Labels that do not name a node (data and mid-code references)
    pub other_labels: BTreeMap<Address, String>,
    pub diagnostics: Vec<Diagnostic>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure() {
        let mut graph = FlowGraph::new();
        assert!(graph.ensure(0x8000));
        assert!(!graph.ensure(0x8000));
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.node(0x8000).unwrap().start, 0x8000);
        assert!(matches!(
            graph.node(0x8001),
            Err(AnalyzerError::UnknownNode(0x8001))
        ));
    }

    #[test]
    fn test_branch_edges_are_symmetric() {
        let mut graph = FlowGraph::new();
        graph.add_branch(0x8000, 0x8010);
        graph.add_branch(0x8000, 0x8010);
        graph.add_branch(0x8005, 0x8010);

        assert_eq!(graph.get(0x8000).unwrap().branch_nodes, vec![0x8010]);
        assert_eq!(graph.get(0x8010).unwrap().predecessors, vec![0x8000, 0x8005]);
    }

    #[test]
    fn test_set_callee_replaces() {
        let mut graph = FlowGraph::new();
        graph.set_callee(0x8000, 0x9000);
        graph.set_callee(0x8000, 0x9100);

        assert_eq!(graph.get(0x8000).unwrap().callee, Some(0x9100));
        assert!(graph.get(0x9000).unwrap().callers.is_empty());
        assert_eq!(graph.get(0x9100).unwrap().callers, vec![0x8000]);
    }

    #[test]
    fn test_nodes_in_address_order() {
        let mut graph = FlowGraph::new();
        for a in [0x9000, 0x0038, 0x8000] {
            graph.ensure(a);
        }
        assert_eq!(graph.addresses(), vec![0x0038, 0x8000, 0x9000]);
        graph.clear();
        assert!(graph.is_empty());
    }
}
