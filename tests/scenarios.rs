//! Reference scenarios for the flow analysis
//!
//! Each test loads a small hand-assembled image, runs the full pipeline and
//! checks nodes, edges, labels and diagnostics.

use z80flow_analyzer::{Analyzer, DiagnosticKind};
use z80flow_disassembler::decode;
use z80flow_spec::{Address, DisassemblerConfig, MemAttribute, Memory, OpcodeFlags, ValueKind};

fn analyze(regions: &[(Address, &[u8])], entries: &[Address]) -> Analyzer {
    let mut analyzer = Analyzer::new(DisassemblerConfig::default()).unwrap();
    for &(origin, bytes) in regions {
        analyzer.set_memory(origin, bytes).unwrap();
    }
    analyzer.get_flow_graph(entries);
    analyzer
}

// ============================================================================
// Call and return
// ============================================================================

#[test]
fn test_call_continues_node() {
    // 8000: CALL 8010h ; RET
    // 8010: LD A,05h ; RET
    let a = analyze(
        &[
            (0x8000, &[0xCD, 0x10, 0x80, 0xC9]),
            (0x8010, &[0x3E, 0x05, 0xC9]),
        ],
        &[0x8000],
    );

    let caller = a.node(0x8000).unwrap();
    assert_eq!(caller.length, 4);
    assert_eq!(caller.instructions.len(), 2);
    assert_eq!(caller.callee, Some(0x8010));
    assert!(caller.stop);
    assert_eq!(caller.label, None);

    let callee = a.node(0x8010).unwrap();
    assert!(callee.is_subroutine);
    assert_eq!(callee.callers, vec![0x8000]);
    assert_eq!(callee.label.as_deref(), Some("SUB_8010"));

    assert!(a
        .memory()
        .get_attribute_at(0x8003)
        .contains(MemAttribute::RET_ANALYZED));
    assert!(a.diagnostics().is_empty());
}

// ============================================================================
// Restart vectors
// ============================================================================

#[test]
fn test_rst_decode_and_label() {
    let mut memory = Memory::new();
    memory.set_memory(0x8000, &[0xE7]).unwrap();
    let instr = decode(&memory, 0x8000);
    assert_eq!(instr.value, 0x20);
    assert_eq!(instr.length, 1);
    assert_eq!(instr.kind, ValueKind::CodeRst);
    assert!(instr
        .flags
        .contains(OpcodeFlags::CALL | OpcodeFlags::BRANCH_ADDRESS));

    // 0020: RET        8000: RST 20h ; RET
    let mut a = analyze(&[(0x0020, &[0xC9]), (0x8000, &[0xE7, 0xC9])], &[0x8000]);
    assert_eq!(a.node(0x8000).unwrap().callee, Some(0x0020));
    assert_eq!(a.node(0x0020).unwrap().label.as_deref(), Some("RST_20"));
    assert_eq!(a.disassemble_node(0x8000).unwrap(), vec!["RST RST_20", "RET"]);
}

#[test]
fn test_rst_name_depends_only_on_address() {
    // CALL 0030h names the target like a restart vector
    let a = analyze(
        &[(0x0030, &[0xC9]), (0x8000, &[0xCD, 0x30, 0x00, 0xC9])],
        &[0x8000],
    );
    assert_eq!(a.best_label(0x0030).as_deref(), Some("RST_30"));
}

// ============================================================================
// Ambiguous alignment
// ============================================================================

#[test]
fn test_misaligned_branch_is_ambiguous() {
    // 8000: LD A,05h ; JR NZ,8001h ; RET
    let a = analyze(&[(0x8000, &[0x3E, 0x05, 0x20, 0xFD, 0xC9])], &[0x8000]);

    let diagnostics: Vec<_> = a.diagnostics().iter().collect();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].address, 0x8001);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::AmbiguousDisassembly);

    assert!(!a.graph().contains(0x8001));
    assert_eq!(a.graph().addresses(), vec![0x8000, 0x8004]);
    assert_eq!(a.node(0x8000).unwrap().branch_nodes, vec![0x8004]);
}

#[test]
fn test_misaligned_entry_is_ambiguous() {
    // Second entry points into the operand of LD A,05h
    let a = analyze(&[(0x8000, &[0x3E, 0x05, 0xC9])], &[0x8001, 0x8000]);

    assert_eq!(a.diagnostics().len(), 1);
    assert_eq!(a.diagnostics().at(0x8001).count(), 1);
    assert_eq!(a.graph().addresses(), vec![0x8000]);
}

#[test]
fn test_backward_branch_into_operand_is_ambiguous() {
    // 7FFF: 3Eh loaded just below the entry
    // 8000: NOP ; JR 7FFFh
    // LD A,n at 7FFF would overlap the NOP, so 7FFF never starts an instruction
    let a = analyze(&[(0x7FFF, &[0x3E]), (0x8000, &[0x00, 0x18, 0xFC])], &[0x8000]);

    let diagnostics: Vec<_> = a.diagnostics().iter().collect();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].address, 0x7FFF);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::AmbiguousDisassembly);

    assert_eq!(a.graph().addresses(), vec![0x8000]);
    assert!(a.node(0x8000).unwrap().branch_nodes.is_empty());
    assert!(a.node(0x8000).unwrap().stop);
    assert!(a.graph().get(0x7FFF).is_none());
}

// ============================================================================
// Unassigned memory
// ============================================================================

#[test]
fn test_branch_into_unassigned_memory() {
    // JP 9000h, nothing loaded there
    let mut a = analyze(&[(0x8000, &[0xC3, 0x00, 0x90])], &[0x8000]);

    let placeholder = a.node(0x9000).unwrap();
    assert!(placeholder.is_placeholder());
    assert_eq!(placeholder.predecessors, vec![0x8000]);

    let diagnostics: Vec<_> = a
        .diagnostics()
        .of_kind(DiagnosticKind::UnassignedMemory)
        .collect();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].address, 0x9000);
    assert_eq!(
        diagnostics[0].to_string(),
        "9000h: Branch into unassigned memory at 9000h"
    );

    assert_eq!(a.disassemble_node(0x8000).unwrap(), vec!["JP LBL_9000"]);
}

#[test]
fn test_call_as_last_loaded_instruction() {
    // 8000: CALL 8010h and the image ends; 8010: RET
    let a = analyze(&[(0x8000, &[0xCD, 0x10, 0x80]), (0x8010, &[0xC9])], &[0x8000]);

    assert_eq!(a.graph().addresses(), vec![0x8000, 0x8003, 0x8010]);
    let call = a.node(0x8000).unwrap();
    assert_eq!(call.callee, Some(0x8010));
    assert_eq!(call.branch_nodes, vec![0x8003]);
    assert!(!call.stop);
    assert!(a.node(0x8003).unwrap().is_placeholder());

    let diagnostics: Vec<_> = a.diagnostics().iter().collect();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].address, 0x8003);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::UnassignedMemory);
}

#[test]
fn test_unassigned_entry_is_silent() {
    let a = analyze(&[(0x8000, &[0xC9])], &[0x4000, 0x8000]);
    assert_eq!(a.graph().addresses(), vec![0x8000]);
    assert!(a.diagnostics().is_empty());
}

#[test]
fn test_instruction_crossing_image_end() {
    // LD HL,nn with only one operand byte loaded
    let a = analyze(&[(0x8000, &[0x21, 0x00])], &[0x8000]);
    assert!(a.graph().is_empty());
    assert!(a.diagnostics().is_empty());
    assert!(!a.memory().get_attribute_at(0x8000).contains(MemAttribute::CODE));
}
