//! Subroutine marking and block partitioning
//!
//! A block is a contiguous run of nodes that starts at a leader and only
//! continues through nodes reachable from that leader by branches, never
//! through a call target. Every address covered by a node maps to the leader
//! of its block; local label scoping is based on that map.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use z80flow_spec::{Address, MEMORY_SIZE};

use crate::graph::FlowGraph;

/// Propagate `is_subroutine` backwards over branch edges.
///
/// Seeds are nodes that end in a return; every predecessor of a seed, and
/// of a node marked from it, belongs to the same subroutine. Nodes with
/// callers are marked afterwards and do not mark their predecessors.
pub fn mark_subroutines(graph: &mut FlowGraph) {
    let mut work: Vec<Address> = graph
        .nodes()
        .filter(|node| node.is_subroutine)
        .map(|node| node.start)
        .collect();

    while let Some(address) = work.pop() {
        let predecessors = match graph.get(address) {
            Some(node) => node.predecessors.clone(),
            None => continue,
        };
        for p in predecessors {
            if let Some(pred) = graph.get_mut(p) {
                if !pred.is_subroutine {
                    pred.is_subroutine = true;
                    work.push(p);
                }
            }
        }
    }

    for node in graph.nodes_mut() {
        if !node.callers.is_empty() {
            node.is_subroutine = true;
        }
    }
}

/// Block partition of the address space.
#[derive(Debug, Clone)]
pub struct BlockMap {
    /// Leader of the block covering each address
    owner: Vec<Option<Address>>,
    /// Leader -> member nodes in address order
    blocks: BTreeMap<Address, Vec<Address>>,
}

impl Default for BlockMap {
    fn default() -> Self {
        BlockMap {
            owner: vec![None; MEMORY_SIZE],
            blocks: BTreeMap::new(),
        }
    }
}

impl BlockMap {
    /// Leader of the block covering `address`
    pub fn leader_of(&self, address: Address) -> Option<Address> {
        self.owner[address as usize]
    }

    /// Node is the leader of its block
    pub fn is_leader(&self, address: Address) -> bool {
        self.blocks.contains_key(&address)
    }

    /// Member nodes of the block led by `leader`, leader first
    pub fn members(&self, leader: Address) -> &[Address] {
        self.blocks.get(&leader).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn leaders(&self) -> impl Iterator<Item = Address> + '_ {
        self.blocks.keys().copied()
    }

    pub fn blocks(&self) -> impl Iterator<Item = (Address, &[Address])> {
        self.blocks.iter().map(|(&l, m)| (l, m.as_slice()))
    }

    /// Both addresses are covered by the same block
    pub fn same_block(&self, a: Address, b: Address) -> bool {
        match (self.leader_of(a), self.leader_of(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Partition the nodes into blocks, in ascending address order.
pub fn partition_blocks(graph: &FlowGraph) -> BlockMap {
    let mut map = BlockMap::default();
    let mut leader: Option<Address> = None;
    let mut closure = BTreeSet::new();
    let mut previous_end = usize::MAX;

    for node in graph.nodes() {
        let continues = leader.is_some()
            && node.callers.is_empty()
            && !node.is_placeholder()
            && node.start as usize == previous_end
            && closure.contains(&node.start);

        let current = match leader {
            Some(current) if continues => current,
            _ => {
                closure = branch_closure(graph, node.start);
                leader = Some(node.start);
                node.start
            }
        };

        map.blocks.entry(current).or_default().push(node.start);
        let end = node.end().min(MEMORY_SIZE);
        for slot in &mut map.owner[node.start as usize..end] {
            *slot = Some(current);
        }
        previous_end = node.end();
    }

    tracing::debug!("partitioned {} nodes into {} blocks", graph.len(), map.len());
    map
}

/// Nodes reachable from `leader` over branch edges without entering a call
/// target.
fn branch_closure(graph: &FlowGraph, leader: Address) -> BTreeSet<Address> {
    let mut seen = BTreeSet::from([leader]);
    let mut queue = VecDeque::from([leader]);
    while let Some(address) = queue.pop_front() {
        let Some(node) = graph.get(address) else {
            continue;
        };
        for &next in &node.branch_nodes {
            let enters_call_target = graph
                .get(next)
                .map_or(true, |n| !n.callers.is_empty());
            if !enters_call_target && seen.insert(next) {
                queue.push_back(next);
            }
        }
    }
    seen
}
