//! Flow graph construction
//!
//! Three passes over a loaded [`Memory`]:
//!
//! 1. **Discovery** walks every candidate address with an explicit queue,
//!    marks decoded bytes `FLOW_ANALYZED | CODE` (`CODE_FIRST` on the first
//!    byte of each instruction) and creates a node at every walk start.
//! 2. **Label seeding** (1b) adds nodes at externally labeled instruction
//!    starts; every other label is kept aside as an "other" label.
//! 3. **Fill** decodes each node up to its first control-flow decision and
//!    records edges, the callee and data references.
//!
//! Conflicting instruction alignments and branches into unassigned memory
//! are recorded as diagnostics; they end the affected walk only.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use z80flow_disassembler::Decoder;
use z80flow_spec::{
    Address, Instruction, MemAttribute, Memory, ValueKind, MAX_INSTRUCTION_LEN, MEMORY_SIZE,
};

use crate::diagnostics::Diagnostics;
use crate::graph::FlowGraph;

/// Outcome of trying to decode a new instruction in pass 1
enum Claim {
    Claimed(Instruction),
    Unassigned,
    Ambiguous,
}

/// Result of a complete build
#[derive(Debug, Clone, Default)]
pub struct BuildResult {
    pub graph: FlowGraph,
    /// Labels that do not start an instruction
    pub other_labels: BTreeMap<Address, String>,
    pub diagnostics: Diagnostics,
}

pub struct FlowGraphBuilder<'a> {
    memory: &'a mut Memory,
    decoder: Decoder,
    /// Bytes of inline data following a call, keyed by return address
    skips: &'a BTreeMap<Address, u16>,
    graph: FlowGraph,
    diagnostics: Diagnostics,
    /// Pass 2 work-list
    pending: VecDeque<Address>,
    filled: BTreeSet<Address>,
}

impl<'a> FlowGraphBuilder<'a> {
    pub fn new(memory: &'a mut Memory, decoder: Decoder, skips: &'a BTreeMap<Address, u16>) -> Self {
        FlowGraphBuilder {
            memory,
            decoder,
            skips,
            graph: FlowGraph::new(),
            diagnostics: Diagnostics::new(),
            pending: VecDeque::new(),
            filled: BTreeSet::new(),
        }
    }

    /// Run all passes.
    pub fn build(mut self, entries: &[Address], labels: &BTreeMap<Address, String>) -> BuildResult {
        self.pass1(entries);
        let other_labels = self.pass1b(labels);
        self.pass2();
        let (graph, diagnostics) = self.finish();
        BuildResult {
            graph,
            other_labels,
            diagnostics,
        }
    }

    pub fn finish(self) -> (FlowGraph, Diagnostics) {
        (self.graph, self.diagnostics)
    }

    pub fn graph(&self) -> &FlowGraph {
        &self.graph
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    // ========== Pass 1 ==========

    /// Discover nodes from the candidate addresses.
    pub fn pass1(&mut self, entries: &[Address]) {
        let mut sorted = entries.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let mut queue: VecDeque<Address> = sorted.into();
        let mut walks = 0usize;
        while let Some(address) = queue.pop_front() {
            walks += 1;
            self.walk(address, &mut queue);
        }

        tracing::debug!(
            "pass 1: {} walks, {} nodes, {} diagnostics",
            walks,
            self.graph.len(),
            self.diagnostics.len()
        );
    }

    fn walk(&mut self, start: Address, queue: &mut VecDeque<Address>) {
        tracing::trace!("pass 1 walk from {:04X}h", start);
        let mut address = start as usize;
        loop {
            if address >= MEMORY_SIZE {
                return;
            }
            let addr = address as Address;
            let attr = self.memory.get_attribute_at(address);
            if !attr.contains(MemAttribute::ASSIGNED) {
                return;
            }
            if attr.contains(MemAttribute::FLOW_ANALYZED) {
                if attr.contains(MemAttribute::CODE_FIRST) {
                    // Joined code decoded earlier: that instruction starts a node
                    self.graph.ensure(addr);
                } else {
                    self.diagnostics.add_ambiguous(addr);
                }
                return;
            }

            let instr = match self.claim(addr) {
                Claim::Claimed(instr) => instr,
                Claim::Unassigned => return,
                Claim::Ambiguous => {
                    self.diagnostics.add_ambiguous(addr);
                    return;
                }
            };
            if addr == start {
                self.graph.ensure(start);
            }

            let next = address + instr.length as usize;
            if let Some(target) = instr.branch_target() {
                queue.push_back(target);
                if instr.is_call() {
                    match self.skip_adjusted(next) {
                        Some(ret) if ret as usize == next => {
                            address = next;
                            continue;
                        }
                        Some(ret) => queue.push_back(ret),
                        None => {}
                    }
                } else if !instr.is_stop() {
                    if let Some(fallthrough) = self.skip_adjusted(next) {
                        queue.push_back(fallthrough);
                    }
                }
                return;
            }

            if instr.is_ret() {
                if instr.is_conditional() && next < MEMORY_SIZE {
                    queue.push_back(next as Address);
                }
                return;
            }
            if instr.is_stop() {
                return;
            }
            address = next;
        }
    }

    /// Decode at `address` and mark the instruction's bytes, unless a byte
    /// is unassigned or was already decoded with another alignment.
    fn claim(&mut self, address: Address) -> Claim {
        let instr = self.decoder.decode(self.memory, address);
        let start = address as usize;
        let end = start + instr.length as usize;
        if end > MEMORY_SIZE {
            return Claim::Unassigned;
        }
        for a in start..end {
            let attr = self.memory.get_attribute_at(a);
            if !attr.contains(MemAttribute::ASSIGNED) {
                return Claim::Unassigned;
            }
            if attr.contains(MemAttribute::FLOW_ANALYZED) {
                return Claim::Ambiguous;
            }
        }
        self.memory.add_attributes_at(
            start,
            end - start,
            MemAttribute::FLOW_ANALYZED | MemAttribute::CODE,
        );
        self.memory.add_attribute_at(start, MemAttribute::CODE_FIRST);
        Claim::Claimed(instr)
    }

    /// Return address after skipping inline data; `None` past the top of
    /// memory.
    fn skip_adjusted(&self, next: usize) -> Option<Address> {
        let mut address = next;
        loop {
            if address >= MEMORY_SIZE {
                return None;
            }
            match self.skips.get(&(address as Address)) {
                Some(&len) if len > 0 => address += len as usize,
                _ => return Some(address as Address),
            }
        }
    }

    // ========== Pass 1b ==========

    /// Split nodes at labeled instruction starts. Returns the labels that
    /// do not start an instruction.
    pub fn pass1b(&mut self, labels: &BTreeMap<Address, String>) -> BTreeMap<Address, String> {
        let mut other = BTreeMap::new();
        for (&address, name) in labels {
            let attr = self.memory.get_attribute_at(address as usize);
            if attr.contains(MemAttribute::CODE_FIRST) {
                self.graph.ensure(address);
                if let Some(node) = self.graph.get_mut(address) {
                    node.label = Some(name.clone());
                }
            } else {
                other.insert(address, name.clone());
            }
        }
        tracing::debug!(
            "pass 1b: {} nodes, {} other labels",
            self.graph.len(),
            other.len()
        );
        other
    }

    // ========== Pass 2 ==========

    /// Fill every node, including nodes created while filling.
    pub fn pass2(&mut self) {
        self.pending.extend(self.graph.addresses());
        while let Some(start) = self.pending.pop_front() {
            if self.filled.insert(start) {
                self.fill(start);
            }
        }
        tracing::debug!(
            "pass 2: {} nodes, {} diagnostics",
            self.graph.len(),
            self.diagnostics.len()
        );
    }

    fn fill(&mut self, start: Address) {
        tracing::trace!("pass 2 fill {:04X}h", start);
        let mut address = start as usize;
        let mut instructions = Vec::new();
        let mut data_refs: Vec<Address> = Vec::new();
        let mut callee = None;
        let mut has_call = false;
        let mut edges: Vec<Address> = Vec::new();
        let mut stop = false;
        let mut returns = false;

        while address < MEMORY_SIZE {
            let addr = address as Address;
            if addr != start && self.graph.contains(addr) {
                edges.push(addr);
                break;
            }
            if !self
                .memory
                .get_attribute_at(address)
                .contains(MemAttribute::CODE_FIRST)
            {
                break;
            }

            let instr = self.decoder.decode(self.memory, addr);
            if instr.is_call() && has_call {
                // One callee per node: the second call starts a new node
                self.graph.ensure(addr);
                self.pending.push_back(addr);
                edges.push(addr);
                break;
            }

            if instr.kind == ValueKind::DataLabel {
                if let Some(target) = instr.target() {
                    let reference = self.data_ref(target);
                    if !data_refs.contains(&reference) {
                        data_refs.push(reference);
                    }
                }
            }

            let next = address + instr.length as usize;
            let branch_target = instr.branch_target();
            let (is_call, is_stop, is_ret, conditional) = (
                instr.is_call(),
                instr.is_stop(),
                instr.is_ret(),
                instr.is_conditional(),
            );
            instructions.push(instr);
            address = next;

            if let Some(target) = branch_target {
                if is_call {
                    has_call = true;
                    callee = self.resolve_target(target).or(callee);
                    match self.skip_adjusted(next) {
                        Some(ret) if ret as usize == next && self.continues_at(next) => continue,
                        Some(ret) => edges.extend(self.resolve_target(ret)),
                        None => {}
                    }
                    break;
                }
                edges.extend(self.resolve_target(target));
                if is_stop {
                    stop = true;
                } else if let Some(fallthrough) = self.skip_adjusted(next) {
                    edges.extend(self.resolve_target(fallthrough));
                }
                break;
            }

            if is_ret {
                self.memory
                    .add_attribute_at(addr as usize, MemAttribute::RET_ANALYZED);
                returns = true;
                if conditional {
                    if next < MEMORY_SIZE {
                        edges.extend(self.resolve_target(next as Address));
                    }
                } else {
                    stop = true;
                }
                break;
            }
            if is_stop {
                stop = true;
                break;
            }
        }

        if let Some(node) = self.graph.get_mut(start) {
            node.length = address - start as usize;
            node.instructions = instructions;
            node.data_refs = data_refs;
            node.stop = stop;
            node.is_subroutine |= returns;
        }
        if let Some(target) = callee {
            self.graph.set_callee(start, target);
        }
        for target in edges {
            self.graph.add_branch(start, target);
        }
    }

    /// Node for a branch target, created when needed. `None` when the
    /// target is loaded but does not start an instruction.
    fn resolve_target(&mut self, target: Address) -> Option<Address> {
        if self.graph.contains(target) {
            return Some(target);
        }
        let attr = self.memory.get_attribute_at(target as usize);
        if attr.contains(MemAttribute::CODE_FIRST) {
            self.graph.ensure(target);
            self.pending.push_back(target);
            Some(target)
        } else if attr.contains(MemAttribute::FLOW_ANALYZED) || !self.runs_off_image(target) {
            self.diagnostics.add_ambiguous(target);
            None
        } else {
            // Placeholder, never filled
            self.diagnostics.add_unassigned(target);
            self.graph.ensure(target);
            self.filled.insert(target);
            Some(target)
        }
    }

    /// True when the instruction at `address` is not fully loaded.
    fn runs_off_image(&self, address: Address) -> bool {
        if !self
            .memory
            .get_attribute_at(address as usize)
            .contains(MemAttribute::ASSIGNED)
        {
            return true;
        }
        let start = address as usize;
        let end = start + self.decoder.decode(self.memory, address).length as usize;
        end > MEMORY_SIZE
            || (start..end).any(|a| {
                !self
                    .memory
                    .get_attribute_at(a)
                    .contains(MemAttribute::ASSIGNED)
            })
    }

    /// A node keeps decoding at `address` only when pass 1 decoded an
    /// instruction there.
    fn continues_at(&self, address: usize) -> bool {
        self.memory
            .get_attribute_at(address)
            .contains(MemAttribute::CODE_FIRST)
    }

    /// Data reference target: references into code are moved to the start
    /// of the instruction they hit.
    fn data_ref(&mut self, target: Address) -> Address {
        let attr = self.memory.get_attribute_at(target as usize);
        self.memory
            .add_attribute_at(target as usize, MemAttribute::DATA);
        if attr.contains(MemAttribute::CODE) {
            self.memory
                .instruction_start(target, MAX_INSTRUCTION_LEN - 1)
                .unwrap_or(target)
        } else {
            target
        }
    }
}
