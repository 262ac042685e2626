//! Instruction decoder
//!
//! Turns the bytes at an address into an [`Instruction`] by walking the
//! layered decode tables: the main table either holds the instruction or
//! names a prefix whose table is indexed by the following byte.
//!
//! `DD CB d op` / `FD CB d op` carry the displacement *before* the final
//! opcode byte. The index-bit decoder is handed the position of that final
//! byte and reads the displacement backwards from it.

use z80flow_spec::tables::INVALID_MNEMONIC;
use z80flow_spec::{
    Address, DecodeTables, IndexRegister, Instruction, MainEntry, Memory, OpcodeDef, Prefix,
    ValueKind,
};

/// Decoder bound to one instruction-set variant.
#[derive(Debug, Clone, Copy)]
pub struct Decoder {
    tables: &'static DecodeTables,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new(false)
    }
}

impl Decoder {
    /// Decoder for plain Z80 (`z80n = false`) or Z80 plus the Spectrum Next
    /// extensions.
    pub fn new(z80n: bool) -> Self {
        Decoder {
            tables: DecodeTables::get(z80n),
        }
    }

    pub fn tables(&self) -> &'static DecodeTables {
        self.tables
    }

    /// Decode the instruction starting at `address`. Reads past the top of
    /// memory wrap to 0x0000.
    pub fn decode(&self, memory: &Memory, address: Address) -> Instruction {
        let first = memory.get_value_at(address);
        match self.tables.main(first) {
            MainEntry::Op(def) => terminal(memory, address, def, first as u32, 1),
            MainEntry::Prefix(Prefix::Cb) => {
                let op = memory.get_value_at(address.wrapping_add(1));
                terminal(memory, address, self.tables.cb(op), 0xCB00 | op as u32, 2)
            }
            MainEntry::Prefix(Prefix::Ed) => {
                let op = memory.get_value_at(address.wrapping_add(1));
                terminal(memory, address, self.tables.ed(op), 0xED00 | op as u32, 2)
            }
            MainEntry::Prefix(Prefix::Index(reg)) => self.decode_index(memory, address, *reg),
        }
    }

    fn decode_index(&self, memory: &Memory, address: Address, reg: IndexRegister) -> Instruction {
        let prefix = reg.prefix() as u32;
        let op = memory.get_value_at(address.wrapping_add(1));
        match op {
            // Prefix followed by another prefix: only the first byte is consumed
            0xDD | 0xFD | 0xED => self.prefix_nop(address, prefix),
            0xCB => self.decode_index_bit(memory, address, reg, address.wrapping_add(3)),
            _ => match self.tables.index(reg, op) {
                Some(def) => terminal(memory, address, def, (prefix << 8) | op as u32, 2),
                None => self.prefix_nop(address, prefix),
            },
        }
    }

    /// `opcode_at` is the position of the final opcode byte; the
    /// displacement sits immediately before it.
    fn decode_index_bit(
        &self,
        memory: &Memory,
        address: Address,
        reg: IndexRegister,
        opcode_at: Address,
    ) -> Instruction {
        let op = memory.get_value_at(opcode_at);
        let displacement = memory.get_value_at(opcode_at.wrapping_sub(1)) as i8;
        let def = self.tables.index_bit(reg, op);
        debug_assert_eq!(def.kind, ValueKind::RelativeIndex);
        Instruction {
            address,
            code: ((reg.prefix() as u32) << 16) | 0xCB00 | op as u32,
            template: def.template.as_str(),
            length: 4,
            flags: def.flags,
            kind: def.kind,
            value: displacement as i32,
            extra: None,
            text: None,
        }
    }

    fn prefix_nop(&self, address: Address, prefix: u32) -> Instruction {
        let def = self.tables.prefix_nop();
        debug_assert_eq!(def.template, INVALID_MNEMONIC);
        Instruction {
            address,
            code: prefix,
            template: def.template.as_str(),
            length: 1,
            flags: def.flags,
            kind: def.kind,
            value: 0,
            extra: None,
            text: None,
        }
    }
}

/// Decode with the plain Z80 tables
pub fn decode(memory: &Memory, address: Address) -> Instruction {
    Decoder::default().decode(memory, address)
}

/// Build the instruction for a table entry whose opcode occupies
/// `opcode_len` bytes starting at `address`.
fn terminal(
    memory: &Memory,
    address: Address,
    def: &'static OpcodeDef,
    code: u32,
    opcode_len: u8,
) -> Instruction {
    let length = opcode_len + def.operand_len();
    let operand_at = address.wrapping_add(opcode_len as u16);
    let value = decode_value(memory, address, operand_at, length, code, def.kind);
    let extra = def.extra_byte.then(|| {
        memory.get_value_at(operand_at.wrapping_add(def.kind.operand_len() as u16))
    });

    Instruction {
        address,
        code,
        template: def.template.as_str(),
        length,
        flags: def.flags,
        kind: def.kind,
        value,
        extra,
        text: None,
    }
}

fn decode_value(
    memory: &Memory,
    address: Address,
    operand_at: Address,
    length: u8,
    code: u32,
    kind: ValueKind,
) -> i32 {
    match kind {
        ValueKind::None => 0,
        ValueKind::Byte | ValueKind::Port => memory.get_value_at(operand_at) as i32,
        ValueKind::Word
        | ValueKind::DataLabel
        | ValueKind::CodeLabel
        | ValueKind::CodeSubroutine => memory.get_word_at(operand_at) as i32,
        ValueKind::WordBigEndian => memory.get_big_endian_word_at(operand_at) as i32,
        ValueKind::RelativeIndex => memory.get_value_at(operand_at) as i8 as i32,
        ValueKind::CodeRelative => {
            let displacement = memory.get_value_at(operand_at) as i8 as i16;
            address
                .wrapping_add(length as u16)
                .wrapping_add(displacement as u16) as i32
        }
        ValueKind::CodeRst => (code & 0b0011_1000) as i32,
    }
}
