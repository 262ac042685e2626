//! Flow graph node

use z80flow_spec::{Address, Instruction};

/// Straight-line run of instructions between control-flow decisions.
///
/// Edges are addresses into the owning [`FlowGraph`](crate::FlowGraph);
/// a node never owns another node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsmNode {
    /// Start address, also the key in the node table
    pub start: Address,
    /// Length in bytes. Placeholder nodes on unassigned memory have length 0.
    pub length: usize,
    pub instructions: Vec<Instruction>,
    pub label: Option<String>,
    /// Addresses of data referenced by the instructions
    pub data_refs: Vec<Address>,
    pub is_subroutine: bool,
    /// Execution cannot fall through past the end of the node
    pub stop: bool,
    /// Successors by branch or fallthrough
    pub branch_nodes: Vec<Address>,
    /// Inverse of `branch_nodes`
    pub predecessors: Vec<Address>,
    /// Target of the (single) CALL made from this node
    pub callee: Option<Address>,
    /// Inverse of `callee`
    pub callers: Vec<Address>,
}

impl AsmNode {
    pub fn new(start: Address) -> Self {
        AsmNode {
            start,
            length: 0,
            instructions: Vec::new(),
            label: None,
            data_refs: Vec::new(),
            is_subroutine: false,
            stop: false,
            branch_nodes: Vec::new(),
            predecessors: Vec::new(),
            callee: None,
            callers: Vec::new(),
        }
    }

    /// First address after the node (may be 0x10000)
    #[inline]
    pub fn end(&self) -> usize {
        self.start as usize + self.length
    }

    /// Node covers `address`
    #[inline]
    pub fn contains(&self, address: Address) -> bool {
        (self.start as usize..self.end()).contains(&(address as usize))
    }

    /// Node was synthesized for a branch into memory that holds no code
    pub fn is_placeholder(&self) -> bool {
        self.length == 0 && self.instructions.is_empty()
    }

    /// `self` continues into `next` without a jump
    #[inline]
    pub fn falls_through_to(&self, next: &AsmNode) -> bool {
        !self.stop && self.end() == next.start as usize
    }

    /// Node is referenced by any branch, fallthrough or call
    pub fn is_referenced(&self) -> bool {
        !self.callers.is_empty() || !self.predecessors.is_empty()
    }
}
