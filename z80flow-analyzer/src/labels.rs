//! Label synthesis and resolution
//!
//! ## Naming
//!
//! - Block leaders that are called or branched to get a global name:
//!   `RST_xx` for a subroutine on a restart vector, `SUB_xxxx` for any other
//!   subroutine, `LBL_xxxx` otherwise.
//! - Interior nodes entered by anything but plain fallthrough get a local
//!   name under the block label: `.LOOP`/`.LOOPn` for loop roots, `.Ln` for
//!   the rest. In a block without a label they get `LBL_xxxx` instead.
//! - Data references get `DATA_xxxx`, or `CODE_xxxx` when they point into
//!   code (scoped under the owning block label when there is one).
//!
//! ## Resolution
//!
//! External label, node label, other label, in that order. A reference into
//! the middle of an instruction resolves to `label+N` of the instruction.

use std::collections::BTreeMap;

use z80flow_disassembler::LabelResolver;
use z80flow_spec::{
    Address, LabelPrefixes, MemAttribute, Memory, ValueKind, LOCAL_SEPARATOR, MAX_INSTRUCTION_LEN,
};

use crate::graph::FlowGraph;
use crate::partition::BlockMap;

/// Restart vectors are the only addresses with no bits outside 0b00111000
const RST_MASK: Address = !0b0011_1000;

/// Assign global, local and data labels. `other` receives the synthesized
/// data labels.
pub fn assign_labels(
    graph: &mut FlowGraph,
    blocks: &BlockMap,
    memory: &Memory,
    external: &BTreeMap<Address, String>,
    other: &mut BTreeMap<Address, String>,
    prefixes: &LabelPrefixes,
) {
    assign_global_labels(graph, blocks, prefixes);
    assign_local_labels(graph, blocks, prefixes);
    assign_data_labels(graph, blocks, memory, external, other, prefixes);
    tracing::debug!(
        "labels: {} nodes labeled, {} other labels",
        graph.nodes().filter(|n| n.label.is_some()).count(),
        other.len()
    );
}

/// Global name of a block leader
pub fn global_label(address: Address, is_subroutine: bool, prefixes: &LabelPrefixes) -> String {
    if is_subroutine && address & RST_MASK == 0 {
        format!("{}{:02X}", prefixes.rst, address)
    } else if is_subroutine {
        format!("{}{:04X}", prefixes.sub, address)
    } else {
        format!("{}{:04X}", prefixes.lbl, address)
    }
}

fn assign_global_labels(graph: &mut FlowGraph, blocks: &BlockMap, prefixes: &LabelPrefixes) {
    for leader in blocks.leaders() {
        if let Some(node) = graph.get_mut(leader) {
            if node.label.is_none() && node.is_referenced() {
                node.label = Some(global_label(leader, node.is_subroutine, prefixes));
            }
        }
    }
}

fn assign_local_labels(graph: &mut FlowGraph, blocks: &BlockMap, prefixes: &LabelPrefixes) {
    let mut assigned: Vec<(Address, String)> = Vec::new();

    for (leader, members) in blocks.blocks() {
        let block_label = graph.get(leader).and_then(|n| n.label.clone());
        let mut loop_roots = Vec::new();
        let mut referenced = Vec::new();

        for &address in members.iter().skip(1) {
            let Some(node) = graph.get(address) else {
                continue;
            };
            if node.label.is_some() {
                continue;
            }
            let mut is_referenced = !node.callers.is_empty();
            let mut is_loop_root = false;
            for &p in &node.predecessors {
                let Some(pred) = graph.get(p) else {
                    continue;
                };
                if pred.falls_through_to(node) {
                    continue;
                }
                is_referenced = true;
                if p >= address && blocks.same_block(p, address) {
                    is_loop_root = true;
                }
            }
            if is_loop_root {
                loop_roots.push(address);
            } else if is_referenced {
                referenced.push(address);
            }
        }

        match block_label {
            Some(block) => {
                let single_loop = loop_roots.len() == 1;
                for (i, &address) in loop_roots.iter().enumerate() {
                    let local = if single_loop {
                        prefixes.local_loop.clone()
                    } else {
                        format!("{}{}", prefixes.local_loop, i + 1)
                    };
                    assigned.push((address, format!("{}{}{}", block, LOCAL_SEPARATOR, local)));
                }
                for (i, &address) in referenced.iter().enumerate() {
                    assigned.push((
                        address,
                        format!("{}{}{}{}", block, LOCAL_SEPARATOR, prefixes.local, i + 1),
                    ));
                }
            }
            None => {
                for &address in loop_roots.iter().chain(&referenced) {
                    assigned.push((address, format!("{}{:04X}", prefixes.lbl, address)));
                }
            }
        }
    }

    for (address, label) in assigned {
        if let Some(node) = graph.get_mut(address) {
            node.label = Some(label);
        }
    }
}

fn assign_data_labels(
    graph: &FlowGraph,
    blocks: &BlockMap,
    memory: &Memory,
    external: &BTreeMap<Address, String>,
    other: &mut BTreeMap<Address, String>,
    prefixes: &LabelPrefixes,
) {
    for node in graph.nodes() {
        for &address in &node.data_refs {
            let named = external.contains_key(&address)
                || other.contains_key(&address)
                || graph.get(address).is_some_and(|n| n.label.is_some());
            if named {
                continue;
            }
            let label = if memory
                .get_attribute_at(address as usize)
                .contains(MemAttribute::CODE)
            {
                let block_label = blocks
                    .leader_of(address)
                    .and_then(|leader| graph.get(leader))
                    .and_then(|leader| leader.label.as_deref());
                match block_label {
                    Some(block) => format!(
                        "{}{}{}{:04X}",
                        block, LOCAL_SEPARATOR, prefixes.code, address
                    ),
                    None => format!("{}{:04X}", prefixes.code, address),
                }
            } else {
                format!("{}{:04X}", prefixes.data, address)
            };
            other.insert(address, label);
        }
    }
}

/// Read-only label lookup over a finished analysis.
#[derive(Debug, Clone, Copy)]
pub struct LabelLookup<'a> {
    pub external: &'a BTreeMap<Address, String>,
    pub graph: &'a FlowGraph,
    pub other: &'a BTreeMap<Address, String>,
    pub blocks: &'a BlockMap,
    pub memory: &'a Memory,
}

impl<'a> LabelLookup<'a> {
    /// Label defined exactly at `address`
    pub fn exact(&self, address: Address) -> Option<&'a str> {
        self.external
            .get(&address)
            .map(String::as_str)
            .or_else(|| self.graph.get(address).and_then(|n| n.label.as_deref()))
            .or_else(|| self.other.get(&address).map(String::as_str))
    }

    /// Exact label, or `label+N` for an address inside an instruction.
    pub fn best(&self, address: Address) -> Option<String> {
        if let Some(label) = self.exact(address) {
            return Some(label.to_string());
        }
        let attr = self.memory.get_attribute_at(address as usize);
        if !attr.contains(MemAttribute::CODE) || attr.contains(MemAttribute::CODE_FIRST) {
            return None;
        }
        let start = self
            .memory
            .instruction_start(address, MAX_INSTRUCTION_LEN - 1)?;
        let label = self.exact(start)?;
        Some(format!("{}+{}", label, address - start))
    }

    /// Best label, with the block part removed when `from` is in the same
    /// block as `address`.
    pub fn local(&self, address: Address, from: Address) -> Option<String> {
        let label = self.best(address)?;
        if !self.blocks.same_block(address, from) {
            return Some(label);
        }
        let block_label = self
            .blocks
            .leader_of(address)
            .and_then(|leader| self.graph.get(leader))
            .and_then(|leader| leader.label.as_deref());
        match block_label {
            Some(block) => match label.strip_prefix(block) {
                Some(rest) if rest.starts_with(LOCAL_SEPARATOR) => Some(rest.to_string()),
                _ => Some(label),
            },
            None => Some(label),
        }
    }
}

impl LabelResolver for LabelLookup<'_> {
    fn resolve(&self, target: Address, kind: ValueKind, from: Address) -> Option<String> {
        match kind {
            // Constants only take a label that names the exact address
            ValueKind::Word | ValueKind::WordBigEndian => self.exact(target).map(str::to_string),
            _ => self.local(target, from),
        }
    }
}
