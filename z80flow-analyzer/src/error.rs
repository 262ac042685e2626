//! Analyzer error types

use thiserror::Error;
use z80flow_spec::Z80Error;

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("Spec error: {0}")]
    Spec(#[from] Z80Error),

    #[error("No node at address {0:#06x}")]
    UnknownNode(u16),

    #[error("Invalid skip at {address:#06x}: length must be at least 1")]
    InvalidSkip { address: u16 },
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;
