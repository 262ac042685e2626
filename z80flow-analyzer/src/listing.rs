//! Listing renderer
//!
//! One label line per labeled node and one line per instruction:
//!
//! ```text
//! SUB_8010:
//!     8010  3E 05        LD A,05h
//!     8012  C9           RET
//! ```

use std::fmt;

use z80flow_disassembler::formatter;
use z80flow_spec::{Address, DisassemblerConfig, Instruction, Memory};

use crate::graph::FlowGraph;
use crate::labels::LabelLookup;
use crate::node::AsmNode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingLine {
    Label {
        address: Address,
        name: String,
    },
    Instruction {
        address: Address,
        bytes: Vec<u8>,
        text: String,
    },
}

impl fmt::Display for ListingLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListingLine::Label { name, .. } => write!(f, "{}:", name),
            ListingLine::Instruction {
                address,
                bytes,
                text,
            } => {
                let hex: Vec<String> = bytes.iter().map(|b| format!("{:02X}", b)).collect();
                write!(f, "    {:04X}  {:<12} {}", address, hex.join(" "), text)
            }
        }
    }
}

/// Text of every instruction of `node`, with labels reduced to their local
/// form where the reference stays inside the node's block.
pub fn render_node(
    node: &AsmNode,
    lookup: &LabelLookup<'_>,
    config: &DisassemblerConfig,
) -> Vec<String> {
    node.instructions
        .iter()
        .map(|instr| formatter::format(instr, lookup, config))
        .collect()
}

fn instruction_line(
    instr: &Instruction,
    memory: &Memory,
    lookup: &LabelLookup<'_>,
    config: &DisassemblerConfig,
) -> ListingLine {
    ListingLine::Instruction {
        address: instr.address,
        bytes: memory.get_data(instr.address, instr.length as usize),
        text: formatter::format(instr, lookup, config),
    }
}

/// Listing of all nodes in address order. Placeholder nodes are skipped.
pub fn listing(
    graph: &FlowGraph,
    memory: &Memory,
    lookup: &LabelLookup<'_>,
    config: &DisassemblerConfig,
) -> Vec<ListingLine> {
    let mut lines = Vec::new();
    for node in graph.nodes().filter(|n| !n.is_placeholder()) {
        if let Some(name) = lookup.local(node.start, node.start) {
            lines.push(ListingLine::Label {
                address: node.start,
                name,
            });
        }
        lines.extend(
            node.instructions
                .iter()
                .map(|instr| instruction_line(instr, memory, lookup, config)),
        );
    }
    lines
}
