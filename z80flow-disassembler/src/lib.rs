//! # Z80 Disassembler
//!
//! Decode Z80 machine code from a [`Memory`](z80flow_spec::Memory) image and
//! render it as assembly text.
//!
//! ## Decoding
//!
//! [`Decoder`] resolves the `CB`, `ED`, `DD`/`FD` and `DDCB`/`FDCB` prefix
//! chains through the declarative tables of [`z80flow_spec::tables`]. Every
//! byte sequence decodes to something: undefined `ED` opcodes become a
//! two-byte `[NOP]`, a `DD`/`FD` prefix that modifies nothing becomes a
//! one-byte `[NOP]`.
//!
//! ## Rendering
//!
//! [`disassemble_opcode`] fills in the text of a decoded instruction. Address
//! operands are named by a [`LabelResolver`]; unnamed operands fall back to
//! hex in the configured [`NumberFormat`](z80flow_spec::NumberFormat).
//!
//! ## Example
//!
//! ```rust
//! use z80flow_spec::{DisassemblerConfig, Memory};
//! use z80flow_disassembler::{decode, disassemble_opcode, NoLabels};
//!
//! let mut memory = Memory::new();
//! memory.set_memory(0x8000, &[0xCD, 0x10, 0x80]).unwrap();
//!
//! let mut instr = decode(&memory, 0x8000);
//! assert_eq!(instr.length, 3);
//! let text = disassemble_opcode(&mut instr, &NoLabels, &DisassemblerConfig::default());
//! assert_eq!(text, "CALL 8010h");
//! ```

pub mod decoder;
pub mod formatter;

pub use decoder::{decode, Decoder};
pub use formatter::{disassemble_opcode, format, LabelResolver, NoLabels};
