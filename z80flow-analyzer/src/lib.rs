//! # Z80 Flow Analyzer
//!
//! Reconstruct the control-flow graph of a Z80 memory image, group it into
//! subroutines and blocks, and synthesize labels for rendering.
//!
//! ## Pipeline
//!
//! 1. [`FlowGraphBuilder`] discovers instruction starts from the entry
//!    addresses, seeds nodes from known labels and fills in every node's
//!    instructions and edges.
//! 2. [`mark_subroutines`] propagates subroutine membership backwards and
//!    [`partition_blocks`] maps every code address to the leader of its block.
//! 3. [`assign_labels`] names referenced leaders, local targets inside
//!    blocks and data references.
//!
//! [`Analyzer`] runs the pipeline and answers queries on the result.
//!
//! ## Example
//!
//! ```rust
//! use z80flow_analyzer::Analyzer;
//! use z80flow_spec::DisassemblerConfig;
//!
//! let mut analyzer = Analyzer::new(DisassemblerConfig::default()).unwrap();
//! // CALL 8004h ; RET ; LD A,05h ; RET
//! analyzer
//!     .set_memory(0x8000, &[0xCD, 0x04, 0x80, 0xC9, 0x3E, 0x05, 0xC9])
//!     .unwrap();
//!
//! let graph = analyzer.get_flow_graph(&[0x8000]);
//! assert_eq!(graph.addresses(), vec![0x8000, 0x8004]);
//! assert_eq!(analyzer.best_label(0x8004).as_deref(), Some("SUB_8004"));
//! assert_eq!(analyzer.disassemble_node(0x8000).unwrap()[0], "CALL SUB_8004");
//! ```

pub mod analyzer;
pub mod builder;
pub mod diagnostics;
pub mod error;
pub mod graph;
pub mod labels;
pub mod listing;
pub mod node;
pub mod partition;
pub mod subroutine;

pub use analyzer::Analyzer;
pub use builder::{BuildResult, FlowGraphBuilder};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use error::{AnalyzerError, Result};
pub use graph::{FlowGraph, GraphSnapshot, NodeSnapshot};
pub use labels::{assign_labels, global_label, LabelLookup};
pub use listing::ListingLine;
pub use node::AsmNode;
pub use partition::{mark_subroutines, partition_blocks, BlockMap};
pub use subroutine::{call_graph, Subroutine};

use z80flow_spec::{Address, DisassemblerConfig};

/// Analyze an image loaded at `origin` from a single entry address and
/// return the listing text.
pub fn disassemble(origin: Address, image: &[u8], entry: Address) -> Result<Vec<String>> {
    let mut analyzer = Analyzer::new(DisassemblerConfig::default())?;
    analyzer.set_memory(origin, image)?;
    analyzer.get_flow_graph(&[entry]);
    Ok(analyzer.listing().iter().map(ToString::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disassemble_helper() {
        let lines = disassemble(0x8000, &[0x18, 0x00, 0xC9], 0x8000).unwrap();
        assert_eq!(
            lines,
            vec![
                "    8000  18 00        JR LBL_8002",
                "LBL_8002:",
                "    8002  C9           RET",
            ]
        );
    }

    #[test]
    fn test_disassemble_rejects_oversized_image() {
        assert!(disassemble(0xFFFF, &[0, 0], 0xFFFF).is_err());
    }
}
