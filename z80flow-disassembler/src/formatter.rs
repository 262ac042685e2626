//! Instruction formatting to assembly text
//!
//! Operands are substituted into the mnemonic template. Address operands are
//! named through a [`LabelResolver`] supplied by the caller; anything the
//! resolver cannot name is rendered as hex.

use z80flow_spec::{Address, DisassemblerConfig, Instruction, ValueKind};

/// Names addresses referenced by instruction operands.
pub trait LabelResolver {
    /// Label for `target` as referenced by the instruction at `from`.
    fn resolve(&self, target: Address, kind: ValueKind, from: Address) -> Option<String>;
}

impl<F> LabelResolver for F
where
    F: Fn(Address, ValueKind, Address) -> Option<String>,
{
    fn resolve(&self, target: Address, kind: ValueKind, from: Address) -> Option<String> {
        self(target, kind, from)
    }
}

/// Resolver that knows no labels
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLabels;

impl LabelResolver for NoLabels {
    fn resolve(&self, _target: Address, _kind: ValueKind, _from: Address) -> Option<String> {
        None
    }
}

/// Render `instr` and store the text in it.
pub fn disassemble_opcode<'a>(
    instr: &'a mut Instruction,
    labels: &dyn LabelResolver,
    config: &DisassemblerConfig,
) -> &'a str {
    let text = format(instr, labels, config);
    instr.text.insert(text).as_str()
}

/// Format instruction as assembly text
pub fn format(instr: &Instruction, labels: &dyn LabelResolver, config: &DisassemblerConfig) -> String {
    let template = if config.lowercase_mnemonics {
        instr.template.to_lowercase()
    } else {
        instr.template.to_string()
    };

    let mut operands = Vec::with_capacity(2);
    if instr.kind != ValueKind::None {
        operands.push(format_value(instr, labels, config));
    }
    if let Some(extra) = instr.extra {
        operands.push(config.numbers.byte(extra));
    }

    substitute(&template, &operands)
}

fn format_value(instr: &Instruction, labels: &dyn LabelResolver, config: &DisassemblerConfig) -> String {
    let numbers = &config.numbers;
    let value = instr.value;
    match instr.kind {
        ValueKind::None => String::new(),
        ValueKind::Byte | ValueKind::Port => numbers.byte(value as u8),
        ValueKind::RelativeIndex => format!("{:+}", value),
        ValueKind::Word | ValueKind::WordBigEndian => {
            let word = value as u16;
            // Small constants are almost never addresses
            if word < 0x100 {
                numbers.word(word)
            } else {
                labels
                    .resolve(word, instr.kind, instr.address)
                    .unwrap_or_else(|| numbers.word(word))
            }
        }
        ValueKind::CodeRst => labels
            .resolve(value as u16, instr.kind, instr.address)
            .unwrap_or_else(|| numbers.byte(value as u8)),
        ValueKind::DataLabel
        | ValueKind::CodeRelative
        | ValueKind::CodeLabel
        | ValueKind::CodeSubroutine => labels
            .resolve(value as u16, instr.kind, instr.address)
            .unwrap_or_else(|| numbers.word(value as u16)),
    }
}

/// Replace the `#` placeholders in order
fn substitute(template: &str, operands: &[String]) -> String {
    let mut out = String::with_capacity(template.len() + 16);
    let mut operands = operands.iter();
    for c in template.chars() {
        match (c == '#').then(|| operands.next()).flatten() {
            Some(op) => out.push_str(op),
            None => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::decode;
    use z80flow_spec::{Memory, NumberFormat};

    fn decoded(bytes: &[u8]) -> Instruction {
        let mut mem = Memory::new();
        mem.set_memory(0x8000, bytes).unwrap();
        decode(&mem, 0x8000)
    }

    fn text(bytes: &[u8]) -> String {
        format(&decoded(bytes), &NoLabels, &DisassemblerConfig::default())
    }

    #[test]
    fn test_format_plain() {
        assert_eq!(text(&[0x00]), "NOP");
        assert_eq!(text(&[0x3E, 0x05]), "LD A,05h");
        assert_eq!(text(&[0x21, 0x34, 0x12]), "LD HL,1234h");
        assert_eq!(text(&[0xDB, 0xFE]), "IN A,(0FEh)");
    }

    #[test]
    fn test_format_small_word_is_raw_hex() {
        let labels = |_: Address, _: ValueKind, _: Address| Some("NEVER".to_string());
        let instr = decoded(&[0x01, 0x10, 0x00]);
        assert_eq!(format(&instr, &labels, &DisassemblerConfig::default()), "LD BC,0010h");

        let instr = decoded(&[0x01, 0x00, 0x90]);
        assert_eq!(format(&instr, &labels, &DisassemblerConfig::default()), "LD BC,NEVER");
    }

    #[test]
    fn test_format_relative_index() {
        assert_eq!(text(&[0xDD, 0x7E, 0x03]), "LD A,(IX+3)");
        assert_eq!(text(&[0xFD, 0x7E, 0xFB]), "LD A,(IY-5)");
        assert_eq!(text(&[0xDD, 0x36, 0x00, 0x42]), "LD (IX+0),42h");
        assert_eq!(text(&[0xDD, 0xCB, 0x02, 0x16]), "RL (IX+2)");
    }

    #[test]
    fn test_format_labels() {
        let labels = |target: Address, kind: ValueKind, from: Address| {
            assert_eq!(from, 0x8000);
            match (target, kind) {
                (0x8010, ValueKind::CodeSubroutine) => Some("SUB_8010".to_string()),
                (0x0020, ValueKind::CodeRst) => Some("RST_20".to_string()),
                _ => None,
            }
        };
        let config = DisassemblerConfig::default();
        assert_eq!(format(&decoded(&[0xCD, 0x10, 0x80]), &labels, &config), "CALL SUB_8010");
        assert_eq!(format(&decoded(&[0xE7]), &labels, &config), "RST RST_20");
        assert_eq!(format(&decoded(&[0xC3, 0x00, 0x90]), &labels, &config), "JP 9000h");
        assert_eq!(format(&decoded(&[0xEF]), &labels, &config), "RST 28h");
    }

    #[test]
    fn test_format_relative_jump() {
        assert_eq!(text(&[0x18, 0xFE]), "JR 8000h");
        assert_eq!(text(&[0x10, 0x02]), "DJNZ 8004h");
    }

    #[test]
    fn test_format_lowercase_keeps_label_case() {
        let labels = |_: Address, _: ValueKind, _: Address| Some("SUB_8010".to_string());
        let config = DisassemblerConfig {
            lowercase_mnemonics: true,
            numbers: NumberFormat {
                lowercase: true,
                ..NumberFormat::default()
            },
            ..DisassemblerConfig::default()
        };
        assert_eq!(format(&decoded(&[0xCD, 0x10, 0x80]), &labels, &config), "call SUB_8010");
        assert_eq!(format(&decoded(&[0x3E, 0xAB]), &NoLabels, &config), "ld a,0abh");
    }

    #[test]
    fn test_disassemble_opcode_stores_text() {
        let mut instr = decoded(&[0xC9]);
        assert_eq!(instr.text, None);
        let text = disassemble_opcode(&mut instr, &NoLabels, &DisassemblerConfig::default());
        assert_eq!(text, "RET");
        assert_eq!(instr.text.as_deref(), Some("RET"));
    }

    #[test]
    fn test_substitute() {
        let ops = vec!["07h".to_string(), "03h".to_string()];
        assert_eq!(substitute("NEXTREG #,#", &ops), "NEXTREG 07h,03h");
        assert_eq!(substitute("NOP", &[]), "NOP");
    }
}
