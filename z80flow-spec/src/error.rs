//! # Error Types for the Z80 flow analyzer

use crate::config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Z80Error {
    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    // Memory image errors
    #[error("Memory region out of range: origin {origin:#06x} with {len} bytes exceeds 64K")]
    RegionOutOfRange { origin: u16, len: usize },
}

pub type Result<T> = std::result::Result<T, Z80Error>;
