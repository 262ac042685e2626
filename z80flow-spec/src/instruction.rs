//! # Decoded Z80 instruction
//!
//! The record produced by the decoder for one address. It is immutable
//! apart from `text`, which is filled in when the instruction is rendered.

use crate::opcode::{OpcodeFlags, ValueKind};
use crate::Address;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Address of the first byte
    pub address: Address,
    /// Opcode including prefixes, e.g. `0xCD`, `0xED4D`, `0xDDCB06`.
    /// The index displacement is not part of it.
    pub code: u32,
    /// Mnemonic template, see [`crate::opcode`]
    pub template: &'static str,
    /// Length in bytes (1-4)
    pub length: u8,
    pub flags: OpcodeFlags,
    pub kind: ValueKind,
    /// Primary operand value. Relative jumps hold the absolute target,
    /// index displacements the signed offset.
    pub value: i32,
    /// Secondary immediate byte
    pub extra: Option<u8>,
    /// Rendered text, set by the formatter
    pub text: Option<String>,
}

impl Instruction {
    /// Address following the instruction
    #[inline]
    pub fn next_address(&self) -> Address {
        self.address.wrapping_add(self.length as Address)
    }

    /// Address operand, if the operand is one
    pub fn target(&self) -> Option<Address> {
        self.kind.is_address().then_some(self.value as Address)
    }

    /// Branch, call or restart target
    pub fn branch_target(&self) -> Option<Address> {
        if self.flags.contains(OpcodeFlags::BRANCH_ADDRESS) {
            self.target()
        } else {
            None
        }
    }

    #[inline]
    pub fn is_branch(&self) -> bool {
        self.flags.contains(OpcodeFlags::BRANCH_ADDRESS)
    }

    #[inline]
    pub fn is_call(&self) -> bool {
        self.flags.contains(OpcodeFlags::CALL)
    }

    #[inline]
    pub fn is_stop(&self) -> bool {
        self.flags.contains(OpcodeFlags::STOP)
    }

    #[inline]
    pub fn is_ret(&self) -> bool {
        self.flags.contains(OpcodeFlags::RET)
    }

    #[inline]
    pub fn is_conditional(&self) -> bool {
        self.flags.contains(OpcodeFlags::CONDITIONAL)
    }

    /// Mnemonic without operands, e.g. `LD` or `JR`
    pub fn mnemonic(&self) -> &'static str {
        self.template.split(' ').next().unwrap_or(self.template)
    }
}
