//! # Z80 decode tables
//!
//! Declarative opcode tables, built once per instruction-set variant:
//!
//! - main table (first byte), with prefix entries for `CB`, `ED`, `DD`, `FD`
//! - `CB` bit/rotate table
//! - `ED` extended table (plus the ZX Spectrum Next additions when enabled)
//! - `DD`/`FD` index tables, declared side by side for IX and IY
//! - `DDCB`/`FDCB` index bit tables
//!
//! Regular blocks (`LD r,r'`, the ALU block, the `CB` table) are composed from
//! register and operation name arrays. Every entry is checked with
//! [`OpcodeDef::inconsistency`] when the tables are built; an inconsistent
//! entry is a bug in this file and panics.

use lazy_static::lazy_static;
use std::fmt;

use crate::opcode::{OpcodeDef, OpcodeFlags, ValueKind as K};

type Row = (&'static str, K, OpcodeFlags);

const NONE: OpcodeFlags = OpcodeFlags::empty();
const JUMP: OpcodeFlags = OpcodeFlags::BRANCH_ADDRESS.union(OpcodeFlags::STOP);
const JUMP_CC: OpcodeFlags = OpcodeFlags::BRANCH_ADDRESS.union(OpcodeFlags::CONDITIONAL);
const CALL: OpcodeFlags = OpcodeFlags::BRANCH_ADDRESS.union(OpcodeFlags::CALL);
const CALL_CC: OpcodeFlags = CALL.union(OpcodeFlags::CONDITIONAL);
const RET: OpcodeFlags = OpcodeFlags::RET.union(OpcodeFlags::STOP);
const RET_CC: OpcodeFlags = OpcodeFlags::RET.union(OpcodeFlags::CONDITIONAL);
const STOP: OpcodeFlags = OpcodeFlags::STOP;

/// Mnemonic of undefined `ED xx` opcodes and of ignored `DD`/`FD` prefixes
pub const INVALID_MNEMONIC: &str = "[NOP]";

const REGS: [&str; 8] = ["B", "C", "D", "E", "H", "L", "(HL)", "A"];
const ALU: [&str; 8] = ["ADD A,", "ADC A,", "SUB ", "SBC A,", "AND ", "XOR ", "OR ", "CP "];
const ROT: [&str; 8] = ["RLC", "RRC", "RL", "RR", "SLA", "SRA", "SLL", "SRL"];
const RP: [&str; 4] = ["BC", "DE", "HL", "SP"];
const IM: [&str; 8] = ["0", "0/1", "1", "2", "0", "0/1", "1", "2"];
const ED_MISC: [&str; 8] = ["LD I,A", "LD R,A", "LD A,I", "LD A,R", "RRD", "RLD", INVALID_MNEMONIC, INVALID_MNEMONIC];

/// Opcodes 0x00-0x3F
const MAIN_LOW: [Row; 64] = [
    ("NOP", K::None, NONE),
    ("LD BC,#", K::Word, NONE),
    ("LD (BC),A", K::None, NONE),
    ("INC BC", K::None, NONE),
    ("INC B", K::None, NONE),
    ("DEC B", K::None, NONE),
    ("LD B,#", K::Byte, NONE),
    ("RLCA", K::None, NONE),
    ("EX AF,AF'", K::None, NONE),
    ("ADD HL,BC", K::None, NONE),
    ("LD A,(BC)", K::None, NONE),
    ("DEC BC", K::None, NONE),
    ("INC C", K::None, NONE),
    ("DEC C", K::None, NONE),
    ("LD C,#", K::Byte, NONE),
    ("RRCA", K::None, NONE),
    // 0x10
    ("DJNZ #", K::CodeRelative, JUMP_CC),
    ("LD DE,#", K::Word, NONE),
    ("LD (DE),A", K::None, NONE),
    ("INC DE", K::None, NONE),
    ("INC D", K::None, NONE),
    ("DEC D", K::None, NONE),
    ("LD D,#", K::Byte, NONE),
    ("RLA", K::None, NONE),
    ("JR #", K::CodeRelative, JUMP),
    ("ADD HL,DE", K::None, NONE),
    ("LD A,(DE)", K::None, NONE),
    ("DEC DE", K::None, NONE),
    ("INC E", K::None, NONE),
    ("DEC E", K::None, NONE),
    ("LD E,#", K::Byte, NONE),
    ("RRA", K::None, NONE),
    // 0x20
    ("JR NZ,#", K::CodeRelative, JUMP_CC),
    ("LD HL,#", K::Word, NONE),
    ("LD (#),HL", K::DataLabel, NONE),
    ("INC HL", K::None, NONE),
    ("INC H", K::None, NONE),
    ("DEC H", K::None, NONE),
    ("LD H,#", K::Byte, NONE),
    ("DAA", K::None, NONE),
    ("JR Z,#", K::CodeRelative, JUMP_CC),
    ("ADD HL,HL", K::None, NONE),
    ("LD HL,(#)", K::DataLabel, NONE),
    ("DEC HL", K::None, NONE),
    ("INC L", K::None, NONE),
    ("DEC L", K::None, NONE),
    ("LD L,#", K::Byte, NONE),
    ("CPL", K::None, NONE),
    // 0x30
    ("JR NC,#", K::CodeRelative, JUMP_CC),
    ("LD SP,#", K::Word, NONE),
    ("LD (#),A", K::DataLabel, NONE),
    ("INC SP", K::None, NONE),
    ("INC (HL)", K::None, NONE),
    ("DEC (HL)", K::None, NONE),
    ("LD (HL),#", K::Byte, NONE),
    ("SCF", K::None, NONE),
    ("JR C,#", K::CodeRelative, JUMP_CC),
    ("ADD HL,SP", K::None, NONE),
    ("LD A,(#)", K::DataLabel, NONE),
    ("DEC SP", K::None, NONE),
    ("INC A", K::None, NONE),
    ("DEC A", K::None, NONE),
    ("LD A,#", K::Byte, NONE),
    ("CCF", K::None, NONE),
];

/// Opcodes 0xC0-0xFF. Prefix slots (CB, DD, ED, FD) are empty rows.
const MAIN_HIGH: [Row; 64] = [
    ("RET NZ", K::None, RET_CC),
    ("POP BC", K::None, NONE),
    ("JP NZ,#", K::CodeLabel, JUMP_CC),
    ("JP #", K::CodeLabel, JUMP),
    ("CALL NZ,#", K::CodeSubroutine, CALL_CC),
    ("PUSH BC", K::None, NONE),
    ("ADD A,#", K::Byte, NONE),
    ("RST #", K::CodeRst, CALL),
    ("RET Z", K::None, RET_CC),
    ("RET", K::None, RET),
    ("JP Z,#", K::CodeLabel, JUMP_CC),
    ("", K::None, NONE),
    ("CALL Z,#", K::CodeSubroutine, CALL_CC),
    ("CALL #", K::CodeSubroutine, CALL),
    ("ADC A,#", K::Byte, NONE),
    ("RST #", K::CodeRst, CALL),
    // 0xD0
    ("RET NC", K::None, RET_CC),
    ("POP DE", K::None, NONE),
    ("JP NC,#", K::CodeLabel, JUMP_CC),
    ("OUT (#),A", K::Port, NONE),
    ("CALL NC,#", K::CodeSubroutine, CALL_CC),
    ("PUSH DE", K::None, NONE),
    ("SUB #", K::Byte, NONE),
    ("RST #", K::CodeRst, CALL),
    ("RET C", K::None, RET_CC),
    ("EXX", K::None, NONE),
    ("JP C,#", K::CodeLabel, JUMP_CC),
    ("IN A,(#)", K::Port, NONE),
    ("CALL C,#", K::CodeSubroutine, CALL_CC),
    ("", K::None, NONE),
    ("SBC A,#", K::Byte, NONE),
    ("RST #", K::CodeRst, CALL),
    // 0xE0
    ("RET PO", K::None, RET_CC),
    ("POP HL", K::None, NONE),
    ("JP PO,#", K::CodeLabel, JUMP_CC),
    ("EX (SP),HL", K::None, NONE),
    ("CALL PO,#", K::CodeSubroutine, CALL_CC),
    ("PUSH HL", K::None, NONE),
    ("AND #", K::Byte, NONE),
    ("RST #", K::CodeRst, CALL),
    ("RET PE", K::None, RET_CC),
    ("JP (HL)", K::None, STOP),
    ("JP PE,#", K::CodeLabel, JUMP_CC),
    ("EX DE,HL", K::None, NONE),
    ("CALL PE,#", K::CodeSubroutine, CALL_CC),
    ("", K::None, NONE),
    ("XOR #", K::Byte, NONE),
    ("RST #", K::CodeRst, CALL),
    // 0xF0
    ("RET P", K::None, RET_CC),
    ("POP AF", K::None, NONE),
    ("JP P,#", K::CodeLabel, JUMP_CC),
    ("DI", K::None, NONE),
    ("CALL P,#", K::CodeSubroutine, CALL_CC),
    ("PUSH AF", K::None, NONE),
    ("OR #", K::Byte, NONE),
    ("RST #", K::CodeRst, CALL),
    ("RET M", K::None, RET_CC),
    ("LD SP,HL", K::None, NONE),
    ("JP M,#", K::CodeLabel, JUMP_CC),
    ("EI", K::None, NONE),
    ("CALL M,#", K::CodeSubroutine, CALL_CC),
    ("", K::None, NONE),
    ("CP #", K::Byte, NONE),
    ("RST #", K::CodeRst, CALL),
];

/// Block transfer and search instructions, `ED A0`-`ED BB`
const ED_BLOCK: &[(u8, &str)] = &[
    (0xA0, "LDI"),
    (0xA1, "CPI"),
    (0xA2, "INI"),
    (0xA3, "OUTI"),
    (0xA8, "LDD"),
    (0xA9, "CPD"),
    (0xAA, "IND"),
    (0xAB, "OUTD"),
    (0xB0, "LDIR"),
    (0xB1, "CPIR"),
    (0xB2, "INIR"),
    (0xB3, "OTIR"),
    (0xB8, "LDDR"),
    (0xB9, "CPDR"),
    (0xBA, "INDR"),
    (0xBB, "OTDR"),
];

/// ZX Spectrum Next additions to the `ED` table
const ED_Z80N: &[(u8, &str, K, OpcodeFlags, bool)] = &[
    (0x23, "SWAPNIB", K::None, NONE, false),
    (0x24, "MIRROR A", K::None, NONE, false),
    (0x27, "TEST #", K::Byte, NONE, false),
    (0x28, "BSLA DE,B", K::None, NONE, false),
    (0x29, "BSRA DE,B", K::None, NONE, false),
    (0x2A, "BSRL DE,B", K::None, NONE, false),
    (0x2B, "BSRF DE,B", K::None, NONE, false),
    (0x2C, "BRLC DE,B", K::None, NONE, false),
    (0x30, "MUL D,E", K::None, NONE, false),
    (0x31, "ADD HL,A", K::None, NONE, false),
    (0x32, "ADD DE,A", K::None, NONE, false),
    (0x33, "ADD BC,A", K::None, NONE, false),
    (0x34, "ADD HL,#", K::Word, NONE, false),
    (0x35, "ADD DE,#", K::Word, NONE, false),
    (0x36, "ADD BC,#", K::Word, NONE, false),
    (0x8A, "PUSH #", K::WordBigEndian, NONE, false),
    (0x90, "OUTINB", K::None, NONE, false),
    (0x91, "NEXTREG #,#", K::Byte, NONE, true),
    (0x92, "NEXTREG #,A", K::Byte, NONE, false),
    (0x93, "PIXELDN", K::None, NONE, false),
    (0x94, "PIXELAD", K::None, NONE, false),
    (0x95, "SETAE", K::None, NONE, false),
    (0x98, "JP (C)", K::None, STOP, false),
    (0xA4, "LDIX", K::None, NONE, false),
    (0xA5, "LDWS", K::None, NONE, false),
    (0xAC, "LDDX", K::None, NONE, false),
    (0xB4, "LDIRX", K::None, NONE, false),
    (0xB7, "LDPIRX", K::None, NONE, false),
    (0xBC, "LDDRX", K::None, NONE, false),
];

/// `DD xx` / `FD xx` entries: opcode, IX form, IY form, operand, flags,
/// secondary byte.
const INDEX_ROWS: &[(u8, &str, &str, K, OpcodeFlags, bool)] = &[
    (0x09, "ADD IX,BC", "ADD IY,BC", K::None, NONE, false),
    (0x19, "ADD IX,DE", "ADD IY,DE", K::None, NONE, false),
    (0x21, "LD IX,#", "LD IY,#", K::Word, NONE, false),
    (0x22, "LD (#),IX", "LD (#),IY", K::DataLabel, NONE, false),
    (0x23, "INC IX", "INC IY", K::None, NONE, false),
    (0x24, "INC IXH", "INC IYH", K::None, NONE, false),
    (0x25, "DEC IXH", "DEC IYH", K::None, NONE, false),
    (0x26, "LD IXH,#", "LD IYH,#", K::Byte, NONE, false),
    (0x29, "ADD IX,IX", "ADD IY,IY", K::None, NONE, false),
    (0x2A, "LD IX,(#)", "LD IY,(#)", K::DataLabel, NONE, false),
    (0x2B, "DEC IX", "DEC IY", K::None, NONE, false),
    (0x2C, "INC IXL", "INC IYL", K::None, NONE, false),
    (0x2D, "DEC IXL", "DEC IYL", K::None, NONE, false),
    (0x2E, "LD IXL,#", "LD IYL,#", K::Byte, NONE, false),
    (0x34, "INC (IX#)", "INC (IY#)", K::RelativeIndex, NONE, false),
    (0x35, "DEC (IX#)", "DEC (IY#)", K::RelativeIndex, NONE, false),
    (0x36, "LD (IX#),#", "LD (IY#),#", K::RelativeIndex, NONE, true),
    (0x39, "ADD IX,SP", "ADD IY,SP", K::None, NONE, false),
    (0x44, "LD B,IXH", "LD B,IYH", K::None, NONE, false),
    (0x45, "LD B,IXL", "LD B,IYL", K::None, NONE, false),
    (0x46, "LD B,(IX#)", "LD B,(IY#)", K::RelativeIndex, NONE, false),
    (0x4C, "LD C,IXH", "LD C,IYH", K::None, NONE, false),
    (0x4D, "LD C,IXL", "LD C,IYL", K::None, NONE, false),
    (0x4E, "LD C,(IX#)", "LD C,(IY#)", K::RelativeIndex, NONE, false),
    (0x54, "LD D,IXH", "LD D,IYH", K::None, NONE, false),
    (0x55, "LD D,IXL", "LD D,IYL", K::None, NONE, false),
    (0x56, "LD D,(IX#)", "LD D,(IY#)", K::RelativeIndex, NONE, false),
    (0x5C, "LD E,IXH", "LD E,IYH", K::None, NONE, false),
    (0x5D, "LD E,IXL", "LD E,IYL", K::None, NONE, false),
    (0x5E, "LD E,(IX#)", "LD E,(IY#)", K::RelativeIndex, NONE, false),
    (0x60, "LD IXH,B", "LD IYH,B", K::None, NONE, false),
    (0x61, "LD IXH,C", "LD IYH,C", K::None, NONE, false),
    (0x62, "LD IXH,D", "LD IYH,D", K::None, NONE, false),
    (0x63, "LD IXH,E", "LD IYH,E", K::None, NONE, false),
    (0x64, "LD IXH,IXH", "LD IYH,IYH", K::None, NONE, false),
    (0x65, "LD IXH,IXL", "LD IYH,IYL", K::None, NONE, false),
    (0x66, "LD H,(IX#)", "LD H,(IY#)", K::RelativeIndex, NONE, false),
    (0x67, "LD IXH,A", "LD IYH,A", K::None, NONE, false),
    (0x68, "LD IXL,B", "LD IYL,B", K::None, NONE, false),
    (0x69, "LD IXL,C", "LD IYL,C", K::None, NONE, false),
    (0x6A, "LD IXL,D", "LD IYL,D", K::None, NONE, false),
    (0x6B, "LD IXL,E", "LD IYL,E", K::None, NONE, false),
    (0x6C, "LD IXL,IXH", "LD IYL,IYH", K::None, NONE, false),
    (0x6D, "LD IXL,IXL", "LD IYL,IYL", K::None, NONE, false),
    (0x6E, "LD L,(IX#)", "LD L,(IY#)", K::RelativeIndex, NONE, false),
    (0x6F, "LD IXL,A", "LD IYL,A", K::None, NONE, false),
    (0x70, "LD (IX#),B", "LD (IY#),B", K::RelativeIndex, NONE, false),
    (0x71, "LD (IX#),C", "LD (IY#),C", K::RelativeIndex, NONE, false),
    (0x72, "LD (IX#),D", "LD (IY#),D", K::RelativeIndex, NONE, false),
    (0x73, "LD (IX#),E", "LD (IY#),E", K::RelativeIndex, NONE, false),
    (0x74, "LD (IX#),H", "LD (IY#),H", K::RelativeIndex, NONE, false),
    (0x75, "LD (IX#),L", "LD (IY#),L", K::RelativeIndex, NONE, false),
    (0x77, "LD (IX#),A", "LD (IY#),A", K::RelativeIndex, NONE, false),
    (0x7C, "LD A,IXH", "LD A,IYH", K::None, NONE, false),
    (0x7D, "LD A,IXL", "LD A,IYL", K::None, NONE, false),
    (0x7E, "LD A,(IX#)", "LD A,(IY#)", K::RelativeIndex, NONE, false),
    (0x84, "ADD A,IXH", "ADD A,IYH", K::None, NONE, false),
    (0x85, "ADD A,IXL", "ADD A,IYL", K::None, NONE, false),
    (0x86, "ADD A,(IX#)", "ADD A,(IY#)", K::RelativeIndex, NONE, false),
    (0x8C, "ADC A,IXH", "ADC A,IYH", K::None, NONE, false),
    (0x8D, "ADC A,IXL", "ADC A,IYL", K::None, NONE, false),
    (0x8E, "ADC A,(IX#)", "ADC A,(IY#)", K::RelativeIndex, NONE, false),
    (0x94, "SUB IXH", "SUB IYH", K::None, NONE, false),
    (0x95, "SUB IXL", "SUB IYL", K::None, NONE, false),
    (0x96, "SUB (IX#)", "SUB (IY#)", K::RelativeIndex, NONE, false),
    (0x9C, "SBC A,IXH", "SBC A,IYH", K::None, NONE, false),
    (0x9D, "SBC A,IXL", "SBC A,IYL", K::None, NONE, false),
    (0x9E, "SBC A,(IX#)", "SBC A,(IY#)", K::RelativeIndex, NONE, false),
    (0xA4, "AND IXH", "AND IYH", K::None, NONE, false),
    (0xA5, "AND IXL", "AND IYL", K::None, NONE, false),
    (0xA6, "AND (IX#)", "AND (IY#)", K::RelativeIndex, NONE, false),
    (0xAC, "XOR IXH", "XOR IYH", K::None, NONE, false),
    (0xAD, "XOR IXL", "XOR IYL", K::None, NONE, false),
    (0xAE, "XOR (IX#)", "XOR (IY#)", K::RelativeIndex, NONE, false),
    (0xB4, "OR IXH", "OR IYH", K::None, NONE, false),
    (0xB5, "OR IXL", "OR IYL", K::None, NONE, false),
    (0xB6, "OR (IX#)", "OR (IY#)", K::RelativeIndex, NONE, false),
    (0xBC, "CP IXH", "CP IYH", K::None, NONE, false),
    (0xBD, "CP IXL", "CP IYL", K::None, NONE, false),
    (0xBE, "CP (IX#)", "CP (IY#)", K::RelativeIndex, NONE, false),
    (0xE1, "POP IX", "POP IY", K::None, NONE, false),
    (0xE3, "EX (SP),IX", "EX (SP),IY", K::None, NONE, false),
    (0xE5, "PUSH IX", "PUSH IY", K::None, NONE, false),
    (0xE9, "JP (IX)", "JP (IY)", K::None, STOP, false),
    (0xF9, "LD SP,IX", "LD SP,IY", K::None, NONE, false),
];

/// Index register selected by a `DD` or `FD` prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexRegister {
    Ix,
    Iy,
}

impl IndexRegister {
    pub const fn prefix(self) -> u8 {
        match self {
            IndexRegister::Ix => 0xDD,
            IndexRegister::Iy => 0xFD,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            IndexRegister::Ix => "IX",
            IndexRegister::Iy => "IY",
        }
    }

    const fn slot(self) -> usize {
        match self {
            IndexRegister::Ix => 0,
            IndexRegister::Iy => 1,
        }
    }
}

impl fmt::Display for IndexRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Prefix byte that defers to a secondary table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prefix {
    Cb,
    Ed,
    Index(IndexRegister),
}

/// Entry of the primary table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MainEntry {
    Op(OpcodeDef),
    Prefix(Prefix),
}

/// All decode tables of one instruction-set variant.
#[derive(Debug)]
pub struct DecodeTables {
    main: Vec<MainEntry>,
    cb: Vec<OpcodeDef>,
    ed: Vec<OpcodeDef>,
    index: [Vec<Option<OpcodeDef>>; 2],
    index_bit: [Vec<OpcodeDef>; 2],
    prefix_nop: OpcodeDef,
    z80n: bool,
}

lazy_static! {
    static ref STANDARD: DecodeTables = DecodeTables::build(false);
    static ref Z80N: DecodeTables = DecodeTables::build(true);
}

impl DecodeTables {
    /// Tables for the given variant, built on first use.
    pub fn get(z80n: bool) -> &'static DecodeTables {
        if z80n {
            &Z80N
        } else {
            &STANDARD
        }
    }

    /// Plain Z80 tables
    pub fn standard() -> &'static DecodeTables {
        Self::get(false)
    }

    pub fn is_z80n(&self) -> bool {
        self.z80n
    }

    pub fn main(&self, opcode: u8) -> &MainEntry {
        &self.main[opcode as usize]
    }

    pub fn cb(&self, opcode: u8) -> &OpcodeDef {
        &self.cb[opcode as usize]
    }

    pub fn ed(&self, opcode: u8) -> &OpcodeDef {
        &self.ed[opcode as usize]
    }

    /// `DD xx` / `FD xx` entry; `None` when the opcode has no index form.
    pub fn index(&self, reg: IndexRegister, opcode: u8) -> Option<&OpcodeDef> {
        self.index[reg.slot()][opcode as usize].as_ref()
    }

    /// `DD CB d xx` / `FD CB d xx` entry
    pub fn index_bit(&self, reg: IndexRegister, opcode: u8) -> &OpcodeDef {
        &self.index_bit[reg.slot()][opcode as usize]
    }

    /// One-byte no-op used for a prefix that has nothing to modify
    pub fn prefix_nop(&self) -> &OpcodeDef {
        &self.prefix_nop
    }

    fn build(z80n: bool) -> Self {
        let tables = DecodeTables {
            main: build_main(),
            cb: build_cb(),
            ed: build_ed(z80n),
            index: [build_index(IndexRegister::Ix), build_index(IndexRegister::Iy)],
            index_bit: [
                build_index_bit(IndexRegister::Ix),
                build_index_bit(IndexRegister::Iy),
            ],
            prefix_nop: OpcodeDef::new(INVALID_MNEMONIC, K::None),
            z80n,
        };
        tables.check();
        tables
    }

    fn check(&self) {
        let mut entries: Vec<(u32, &OpcodeDef)> = Vec::new();
        for (op, entry) in self.main.iter().enumerate() {
            if let MainEntry::Op(def) = entry {
                entries.push((op as u32, def));
            }
        }
        for op in 0..256usize {
            entries.push((0xCB00 | op as u32, &self.cb[op]));
            entries.push((0xED00 | op as u32, &self.ed[op]));
            for reg in [IndexRegister::Ix, IndexRegister::Iy] {
                let prefix = (reg.prefix() as u32) << 8;
                if let Some(def) = &self.index[reg.slot()][op] {
                    entries.push((prefix | op as u32, def));
                }
                entries.push((
                    (prefix << 8) | 0xCB00 | op as u32,
                    &self.index_bit[reg.slot()][op],
                ));
            }
        }
        for (code, def) in entries {
            if let Some(problem) = def.inconsistency() {
                panic!("decode table entry {:#x}: {}", code, problem);
            }
        }
    }
}

fn row(&(template, kind, flags): &Row) -> OpcodeDef {
    OpcodeDef::flow(template, kind, flags)
}

fn build_main() -> Vec<MainEntry> {
    let mut main = Vec::with_capacity(256);
    main.extend(MAIN_LOW.iter().map(|r| MainEntry::Op(row(r))));

    // 0x40-0x7F: LD r,r' with HALT in place of LD (HL),(HL)
    for dst in REGS {
        for src in REGS {
            let template = if dst == "(HL)" && src == "(HL)" {
                "HALT".to_string()
            } else {
                format!("LD {},{}", dst, src)
            };
            main.push(MainEntry::Op(OpcodeDef::new(template, K::None)));
        }
    }

    // 0x80-0xBF: ALU A,r
    for op in ALU {
        for src in REGS {
            main.push(MainEntry::Op(OpcodeDef::new(format!("{}{}", op, src), K::None)));
        }
    }

    for (i, r) in MAIN_HIGH.iter().enumerate() {
        let entry = match 0xC0 + i {
            0xCB => MainEntry::Prefix(Prefix::Cb),
            0xDD => MainEntry::Prefix(Prefix::Index(IndexRegister::Ix)),
            0xED => MainEntry::Prefix(Prefix::Ed),
            0xFD => MainEntry::Prefix(Prefix::Index(IndexRegister::Iy)),
            _ => MainEntry::Op(row(r)),
        };
        main.push(entry);
    }

    debug_assert_eq!(main.len(), 256);
    main
}

fn build_cb() -> Vec<OpcodeDef> {
    (0..=255u8)
        .map(|op| {
            let y = ((op >> 3) & 7) as usize;
            let reg = REGS[(op & 7) as usize];
            let template = match op >> 6 {
                0 => format!("{} {}", ROT[y], reg),
                1 => format!("BIT {},{}", y, reg),
                2 => format!("RES {},{}", y, reg),
                _ => format!("SET {},{}", y, reg),
            };
            OpcodeDef::new(template, K::None)
        })
        .collect()
}

fn build_ed(z80n: bool) -> Vec<OpcodeDef> {
    let mut ed: Vec<OpcodeDef> = (0..256)
        .map(|_| OpcodeDef::new(INVALID_MNEMONIC, K::None))
        .collect();

    // 0x40-0x7F
    for op in 0x40..=0x7Fu8 {
        let y = ((op >> 3) & 7) as usize;
        let p = y >> 1;
        let q = y & 1;
        let def = match op & 7 {
            0 if y == 6 => OpcodeDef::new("IN F,(C)", K::None),
            0 => OpcodeDef::new(format!("IN {},(C)", REGS[y]), K::None),
            1 if y == 6 => OpcodeDef::new("OUT (C),0", K::None),
            1 => OpcodeDef::new(format!("OUT (C),{}", REGS[y]), K::None),
            2 if q == 0 => OpcodeDef::new(format!("SBC HL,{}", RP[p]), K::None),
            2 => OpcodeDef::new(format!("ADC HL,{}", RP[p]), K::None),
            3 if q == 0 => OpcodeDef::new(format!("LD (#),{}", RP[p]), K::DataLabel),
            3 => OpcodeDef::new(format!("LD {},(#)", RP[p]), K::DataLabel),
            4 => OpcodeDef::new("NEG", K::None),
            5 if y == 1 => OpcodeDef::flow("RETI", K::None, RET),
            5 => OpcodeDef::flow("RETN", K::None, RET),
            6 => OpcodeDef::new(format!("IM {}", IM[y]), K::None),
            _ => OpcodeDef::new(ED_MISC[y], K::None),
        };
        ed[op as usize] = def;
    }

    for &(op, name) in ED_BLOCK {
        ed[op as usize] = OpcodeDef::new(name, K::None);
    }

    if z80n {
        for &(op, template, kind, flags, extra) in ED_Z80N {
            let def = OpcodeDef::flow(template, kind, flags);
            ed[op as usize] = if extra { def.with_extra_byte() } else { def };
        }
    }

    ed
}

fn build_index(reg: IndexRegister) -> Vec<Option<OpcodeDef>> {
    let mut table: Vec<Option<OpcodeDef>> = vec![None; 256];
    for &(op, ix, iy, kind, flags, extra) in INDEX_ROWS {
        let template = match reg {
            IndexRegister::Ix => ix,
            IndexRegister::Iy => iy,
        };
        let def = OpcodeDef::flow(template, kind, flags);
        table[op as usize] = Some(if extra { def.with_extra_byte() } else { def });
    }
    table
}

fn build_index_bit(reg: IndexRegister) -> Vec<OpcodeDef> {
    (0..=255u8)
        .map(|op| {
            let y = ((op >> 3) & 7) as usize;
            let z = (op & 7) as usize;
            let mem = format!("({}#)", reg);
            // z != 6 also copies the result into a register (undocumented)
            let copy = if z == 6 {
                String::new()
            } else {
                format!(",{}", REGS[z])
            };
            let template = match op >> 6 {
                0 => format!("{} {}{}", ROT[y], mem, copy),
                1 => format!("BIT {},{}", y, mem),
                2 => format!("RES {},{}{}", y, mem, copy),
                _ => format!("SET {},{}{}", y, mem, copy),
            };
            OpcodeDef::new(template, K::RelativeIndex)
        })
        .collect()
}
