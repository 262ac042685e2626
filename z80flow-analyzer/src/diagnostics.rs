//! Diagnostics sink
//!
//! Soft warnings about the analyzed program. Malformed or ambiguous target
//! code never aborts an analysis run; it ends up here instead.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use z80flow_spec::Address;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// Same bytes reached with two different instruction alignments
    AmbiguousDisassembly,
    /// Branch into memory that was never loaded
    UnassignedMemory,
    /// Access across a memory bank border. No banking model exists, so this
    /// kind is never produced.
    DifferentBank,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiagnosticKind::AmbiguousDisassembly => "ambiguous disassembly",
            DiagnosticKind::UnassignedMemory => "unassigned memory",
            DiagnosticKind::DifferentBank => "different bank",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub address: Address,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}h: {}", self.address, self.message)
    }
}

/// Diagnostics of one analysis run, at most one per (address, kind).
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
    seen: BTreeSet<(Address, DiagnosticKind)>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic. Returns false if one of the same kind already
    /// exists for the address.
    pub fn add(&mut self, kind: DiagnosticKind, address: Address, message: String) -> bool {
        if !self.seen.insert((address, kind)) {
            return false;
        }
        tracing::debug!("diagnostic at {:04X}h: {}", address, message);
        self.entries.push(Diagnostic {
            address,
            kind,
            message,
        });
        true
    }

    pub fn add_ambiguous(&mut self, address: Address) -> bool {
        self.add(
            DiagnosticKind::AmbiguousDisassembly,
            address,
            format!(
                "Ambiguous disassembly: {:04X}h was already analyzed with a different instruction alignment",
                address
            ),
        )
    }

    pub fn add_unassigned(&mut self, address: Address) -> bool {
        self.add(
            DiagnosticKind::UnassignedMemory,
            address,
            format!("Branch into unassigned memory at {:04X}h", address),
        )
    }

    /// In insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn at(&self, address: Address) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.address == address)
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.seen.clear();
    }

    /// Sorted by address, then kind
    pub fn to_sorted_vec(&self) -> Vec<Diagnostic> {
        let mut all = self.entries.clone();
        all.sort_by_key(|d| (d.address, d.kind));
        all
    }
}
