//! # Z80 opcode descriptors
//!
//! An [`OpcodeDef`] is one entry of a decode table: a mnemonic template,
//! the classification of its operand and its control-flow flags. The tables
//! themselves live in [`crate::tables`].
//!
//! ## Templates
//!
//! A template holds one `#` per operand. The first `#` receives the primary
//! value, the second one (if any) the secondary byte:
//!
//! - `LD A,#` with [`ValueKind::Byte`]
//! - `LD (IX#),#` with [`ValueKind::RelativeIndex`] and a secondary byte
//! - `CALL NZ,#` with [`ValueKind::CodeSubroutine`]

use bitflags::bitflags;

bitflags! {
    /// Control-flow properties of an instruction
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct OpcodeFlags: u8 {
        /// Instruction carries an absolute or relative branch target
        const BRANCH_ADDRESS = 0x01;
        /// Branch returns to the following instruction (CALL, RST)
        const CALL = 0x02;
        /// Execution never falls through to the following instruction
        const STOP = 0x04;
        /// Return from subroutine
        const RET = 0x08;
        /// Branch or return depends on a condition
        const CONDITIONAL = 0x10;
    }
}

/// Classification of the operand value.
///
/// Address classifications come last and are ordered by naming priority:
/// a reference that is both data and a call target is named as a call
/// target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueKind {
    /// No operand
    None,
    /// 8-bit immediate
    Byte,
    /// 16-bit little-endian immediate
    Word,
    /// 16-bit big-endian immediate (Z80N `PUSH nn`)
    WordBigEndian,
    /// Signed index displacement, `(IX+d)`
    RelativeIndex,
    /// 8-bit port number, `IN A,(n)`
    Port,
    /// 16-bit address of data, `LD A,(nn)`
    DataLabel,
    /// Relative jump displacement, stored as absolute target after decode
    CodeRelative,
    /// Absolute jump target, `JP nn`
    CodeLabel,
    /// Subroutine call target, `CALL nn`
    CodeSubroutine,
    /// Restart vector, taken from bits 3-5 of the opcode
    CodeRst,
}

impl ValueKind {
    /// Number of operand bytes encoded in the instruction stream
    pub const fn operand_len(self) -> u8 {
        match self {
            ValueKind::None | ValueKind::CodeRst => 0,
            ValueKind::Byte
            | ValueKind::RelativeIndex
            | ValueKind::Port
            | ValueKind::CodeRelative => 1,
            ValueKind::Word
            | ValueKind::WordBigEndian
            | ValueKind::DataLabel
            | ValueKind::CodeLabel
            | ValueKind::CodeSubroutine => 2,
        }
    }

    /// Operand is an address that can carry a label
    pub const fn is_address(self) -> bool {
        matches!(
            self,
            ValueKind::DataLabel
                | ValueKind::CodeRelative
                | ValueKind::CodeLabel
                | ValueKind::CodeSubroutine
                | ValueKind::CodeRst
        )
    }

    /// Operand is the address of code (branch, call or restart target)
    pub const fn is_code_address(self) -> bool {
        matches!(
            self,
            ValueKind::CodeRelative
                | ValueKind::CodeLabel
                | ValueKind::CodeSubroutine
                | ValueKind::CodeRst
        )
    }
}

/// One decode table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpcodeDef {
    /// Mnemonic with one `#` per operand
    pub template: String,
    pub kind: ValueKind,
    pub flags: OpcodeFlags,
    /// A second immediate byte follows the primary operand
    pub extra_byte: bool,
}

impl OpcodeDef {
    /// Plain instruction without flow flags
    pub fn new(template: impl Into<String>, kind: ValueKind) -> Self {
        OpcodeDef {
            template: template.into(),
            kind,
            flags: OpcodeFlags::empty(),
            extra_byte: false,
        }
    }

    /// Instruction with control-flow flags
    pub fn flow(template: impl Into<String>, kind: ValueKind, flags: OpcodeFlags) -> Self {
        OpcodeDef {
            flags,
            ..Self::new(template, kind)
        }
    }

    /// Instruction with a secondary immediate byte
    pub fn with_extra_byte(mut self) -> Self {
        self.extra_byte = true;
        self
    }

    /// Operand bytes following the opcode bytes
    pub fn operand_len(&self) -> u8 {
        self.kind.operand_len() + self.extra_byte as u8
    }

    /// Check the entry against its own classification.
    ///
    /// Returns a description of the first inconsistency, if any.
    pub fn inconsistency(&self) -> Option<String> {
        let placeholders = self.template.matches('#').count();
        let operands = (self.kind.operand_len() > 0 || self.kind == ValueKind::CodeRst) as usize
            + self.extra_byte as usize;
        if placeholders != operands {
            return Some(format!(
                "'{}' has {} placeholders for {} operands",
                self.template, placeholders, operands
            ));
        }
        if self.flags.contains(OpcodeFlags::BRANCH_ADDRESS) && !self.kind.is_code_address() {
            return Some(format!(
                "'{}' is flagged BRANCH_ADDRESS without a code address operand",
                self.template
            ));
        }
        if self.kind.is_code_address() && !self.flags.contains(OpcodeFlags::BRANCH_ADDRESS) {
            return Some(format!(
                "'{}' has a code address operand but is not flagged BRANCH_ADDRESS",
                self.template
            ));
        }
        if self.flags.contains(OpcodeFlags::CALL) && self.flags.contains(OpcodeFlags::STOP) {
            return Some(format!("'{}' is flagged both CALL and STOP", self.template));
        }
        None
    }
}
