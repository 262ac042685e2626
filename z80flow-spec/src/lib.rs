//! # Z80 flow analysis - core types
//!
//! Shared building blocks of the Z80 static analyzer.
//!
//! ## Key Features
//! - Flat 64K byte image with per-address analysis attributes
//! - Declarative decode tables for the base, `CB`, `ED`, `DD`/`FD` and
//!   `DDCB`/`FDCB` opcode sets (optionally with the ZX Spectrum Next extensions)
//! - Typed operand classification driving decode and rendering
//! - Explicit configuration of label prefixes and number format

pub mod config;
pub mod error;
pub mod instruction;
pub mod memory;
pub mod opcode;
pub mod tables;

pub use config::{ConfigError, DisassemblerConfig, LabelPrefixes, NumberFormat, LOCAL_SEPARATOR};
pub use error::{Result, Z80Error};
pub use instruction::Instruction;
pub use memory::{MemAttribute, Memory};
pub use opcode::{OpcodeDef, OpcodeFlags, ValueKind};
pub use tables::{DecodeTables, IndexRegister, MainEntry, Prefix};

/// Z80 address (64K address space)
pub type Address = u16;

/// Size of the address space in bytes
pub const MEMORY_SIZE: usize = 0x10000;

/// Longest Z80 instruction in bytes
pub const MAX_INSTRUCTION_LEN: usize = 4;
