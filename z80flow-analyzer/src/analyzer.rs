//! Analysis run

use std::collections::{BTreeMap, BTreeSet};

use z80flow_disassembler::Decoder;
use z80flow_spec::{Address, DisassemblerConfig, MemAttribute, Memory, Z80Error};

use crate::builder::FlowGraphBuilder;
use crate::diagnostics::Diagnostics;
use crate::error::{AnalyzerError, Result};
use crate::graph::{FlowGraph, GraphSnapshot, NodeSnapshot};
use crate::labels::{assign_labels, LabelLookup};
use crate::listing::{self, ListingLine};
use crate::node::AsmNode;
use crate::partition::{mark_subroutines, partition_blocks, BlockMap};
use crate::subroutine::{self, Subroutine};

/// Z80 flow analyzer
///
/// Owns the memory image and the inputs of an analysis (entry addresses,
/// known labels, skip table). [`Analyzer::get_flow_graph`] rebuilds the
/// whole result from these inputs; there is no incremental update.
pub struct Analyzer {
    config: DisassemblerConfig,
    decoder: Decoder,
    memory: Memory,

    /// Candidate entry addresses
    entries: BTreeSet<Address>,

    /// Externally supplied labels
    labels: BTreeMap<Address, String>,

    /// Inline data after calls: return address -> byte count
    skips: BTreeMap<Address, u16>,

    graph: FlowGraph,
    blocks: BlockMap,

    /// Labels that do not name a node
    other_labels: BTreeMap<Address, String>,

    diagnostics: Diagnostics,
}

impl Analyzer {
    /// Create an analyzer with a validated configuration
    pub fn new(config: DisassemblerConfig) -> Result<Self> {
        config.validate().map_err(Z80Error::from)?;
        Ok(Analyzer {
            decoder: Decoder::new(config.z80n),
            config,
            memory: Memory::new(),
            entries: BTreeSet::new(),
            labels: BTreeMap::new(),
            skips: BTreeMap::new(),
            graph: FlowGraph::new(),
            blocks: BlockMap::default(),
            other_labels: BTreeMap::new(),
            diagnostics: Diagnostics::new(),
        })
    }

    pub fn config(&self) -> &DisassemblerConfig {
        &self.config
    }

    /// Load a region of the program image
    pub fn set_memory(&mut self, origin: Address, data: &[u8]) -> Result<()> {
        self.memory.set_memory(origin, data)?;
        Ok(())
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn add_entry_address(&mut self, address: Address) {
        self.entries.insert(address);
    }

    /// Known label, e.g. from a symbol file. Replaces an earlier label at the
    /// same address.
    pub fn set_label(&mut self, address: Address, name: impl Into<String>) {
        self.labels.insert(address, name.into());
    }

    /// `len` bytes of inline data follow a call that returns to `address`.
    pub fn set_skip(&mut self, address: Address, len: u16) -> Result<()> {
        if len == 0 {
            return Err(AnalyzerError::InvalidSkip { address });
        }
        self.skips.insert(address, len);
        Ok(())
    }

    /// Run the complete analysis from the registered entry addresses plus
    /// `entries`.
    pub fn get_flow_graph(&mut self, entries: &[Address]) -> &FlowGraph {
        self.entries.extend(entries.iter().copied());
        self.reset();

        let entries: Vec<Address> = self.entries.iter().copied().collect();
        let result = FlowGraphBuilder::new(&mut self.memory, self.decoder, &self.skips)
            .build(&entries, &self.labels);
        self.graph = result.graph;
        self.other_labels = result.other_labels;
        self.diagnostics = result.diagnostics;

        mark_subroutines(&mut self.graph);
        self.blocks = partition_blocks(&self.graph);
        assign_labels(
            &mut self.graph,
            &self.blocks,
            &self.memory,
            &self.labels,
            &mut self.other_labels,
            &self.config.labels,
        );

        tracing::debug!(
            "analysis done: {} nodes, {} blocks, {} diagnostics",
            self.graph.len(),
            self.blocks.len(),
            self.diagnostics.len()
        );
        &self.graph
    }

    /// Forget everything learned by a previous run; the image stays loaded.
    fn reset(&mut self) {
        self.memory
            .reset_attribute_flag(MemAttribute::all().difference(MemAttribute::ASSIGNED));
        self.graph.clear();
        self.blocks = BlockMap::default();
        self.other_labels.clear();
        self.diagnostics.clear();
    }

    pub fn graph(&self) -> &FlowGraph {
        &self.graph
    }

    pub fn node(&self, address: Address) -> Result<&AsmNode> {
        self.graph.node(address)
    }

    pub fn blocks(&self) -> &BlockMap {
        &self.blocks
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn other_labels(&self) -> &BTreeMap<Address, String> {
        &self.other_labels
    }

    pub fn label_lookup(&self) -> LabelLookup<'_> {
        LabelLookup {
            external: &self.labels,
            graph: &self.graph,
            other: &self.other_labels,
            blocks: &self.blocks,
            memory: &self.memory,
        }
    }

    /// Full label of `address`, `label+N` inside an instruction
    pub fn best_label(&self, address: Address) -> Option<String> {
        self.label_lookup().best(address)
    }

    /// Label of `address` as written in code at `from`
    pub fn local_label(&self, address: Address, from: Address) -> Option<String> {
        self.label_lookup().local(address, from)
    }

    /// Render the instructions of a node and store the text in them.
    pub fn disassemble_node(&mut self, address: Address) -> Result<Vec<String>> {
        let texts =
            listing::render_node(self.node(address)?, &self.label_lookup(), &self.config);
        if let Some(node) = self.graph.get_mut(address) {
            for (instr, text) in node.instructions.iter_mut().zip(&texts) {
                instr.text = Some(text.clone());
            }
        }
        Ok(texts)
    }

    pub fn listing(&self) -> Vec<ListingLine> {
        listing::listing(&self.graph, &self.memory, &self.label_lookup(), &self.config)
    }

    pub fn subroutine(&self, start: Address) -> Result<Subroutine> {
        Subroutine::new(&self.graph, start)
    }

    pub fn call_graph(&self, entries: &[Address]) -> BTreeMap<Address, Subroutine> {
        subroutine::call_graph(&self.graph, entries)
    }

    /// Serializable copy of the current result
    pub fn snapshot(&self) -> GraphSnapshot {
        let lookup = self.label_lookup();
        let nodes = self
            .graph
            .nodes()
            .map(|node| NodeSnapshot {
                start: node.start,
                length: node.length,
                label: node.label.clone(),
                is_subroutine: node.is_subroutine,
                stop: node.stop,
                branch_nodes: node.branch_nodes.clone(),
                predecessors: node.predecessors.clone(),
                callee: node.callee,
                callers: node.callers.clone(),
                data_refs: node.data_refs.clone(),
                instructions: listing::render_node(node, &lookup, &self.config),
            })
            .collect();

        GraphSnapshot {
            nodes,
            blocks: self.blocks.leaders().collect(),
            other_labels: self.other_labels.clone(),
            diagnostics: self.diagnostics.to_sorted_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer(origin: Address, bytes: &[u8]) -> Analyzer {
        let mut analyzer = Analyzer::new(DisassemblerConfig::default()).unwrap();
        analyzer.set_memory(origin, bytes).unwrap();
        analyzer
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = DisassemblerConfig::default();
        config.labels.sub = String::new();
        assert!(matches!(
            Analyzer::new(config),
            Err(AnalyzerError::Spec(_))
        ));
    }

    #[test]
    fn test_invalid_skip_rejected() {
        let mut a = analyzer(0, &[0xC9]);
        assert!(matches!(
            a.set_skip(0x0003, 0),
            Err(AnalyzerError::InvalidSkip { address: 0x0003 })
        ));
        assert!(a.set_skip(0x0003, 1).is_ok());
    }

    #[test]
    fn test_image_out_of_range() {
        let mut a = Analyzer::new(DisassemblerConfig::default()).unwrap();
        assert!(a.set_memory(0xFFFF, &[0, 0]).is_err());
    }

    #[test]
    fn test_rebuild_resets_attributes() {
        let mut a = analyzer(0x8000, &[0x00, 0xC9]);
        a.get_flow_graph(&[0x8000]);
        assert!(a.memory().get_attribute_at(0x8001).contains(MemAttribute::CODE_FIRST));

        // Second run from the misaligned address only
        a.entries.clear();
        a.get_flow_graph(&[0x8001]);
        assert_eq!(a.graph().addresses(), vec![0x8001]);
        assert!(!a.memory().get_attribute_at(0x8000).contains(MemAttribute::CODE));
        assert!(a.memory().get_attribute_at(0x8000).contains(MemAttribute::ASSIGNED));
        assert!(a.diagnostics().is_empty());
    }

    #[test]
    fn test_disassemble_node_stores_text() {
        let mut bytes = vec![0xCD, 0x10, 0x80, 0xC9];
        bytes.resize(0x10, 0);
        bytes.extend([0x3E, 0x05, 0xC9]);
        let mut a = analyzer(0x8000, &bytes);
        a.get_flow_graph(&[0x8000]);

        let texts = a.disassemble_node(0x8000).unwrap();
        assert_eq!(texts, vec!["CALL SUB_8010", "RET"]);
        assert_eq!(
            a.node(0x8000).unwrap().instructions[0].text.as_deref(),
            Some("CALL SUB_8010")
        );
        assert!(matches!(
            a.disassemble_node(0x8001),
            Err(AnalyzerError::UnknownNode(0x8001))
        ));
    }

    #[test]
    fn test_external_label_wins() {
        let mut bytes = vec![0xCD, 0x10, 0x80, 0xC9];
        bytes.resize(0x10, 0);
        bytes.extend([0xC9]);
        let mut a = analyzer(0x8000, &bytes);
        a.set_label(0x8010, "print");
        a.get_flow_graph(&[0x8000]);
        assert_eq!(a.best_label(0x8010).as_deref(), Some("print"));
        assert_eq!(a.disassemble_node(0x8000).unwrap()[0], "CALL print");
    }
}
