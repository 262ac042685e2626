//! Integration tests for the analysis pipeline

use std::collections::BTreeSet;

use z80flow_analyzer::{Analyzer, DiagnosticKind, GraphSnapshot, ListingLine};
use z80flow_spec::{Address, DisassemblerConfig, MemAttribute};

fn analyzer(regions: &[(Address, &[u8])]) -> Analyzer {
    let mut analyzer = Analyzer::new(DisassemblerConfig::default()).unwrap();
    for &(origin, bytes) in regions {
        analyzer.set_memory(origin, bytes).unwrap();
    }
    analyzer
}

// ============================================================================
// Skip table
// ============================================================================

#[test]
fn test_inline_data_after_call_is_skipped() {
    // CALL 8010h ; DB 01h,02h ; RET        8010: RET
    let mut a = analyzer(&[
        (0x8000, &[0xCD, 0x10, 0x80, 0x01, 0x02, 0xC9]),
        (0x8010, &[0xC9]),
    ]);
    a.set_skip(0x8003, 2).unwrap();
    a.get_flow_graph(&[0x8000]);

    let node = a.node(0x8000).unwrap();
    assert_eq!(node.length, 3);
    assert_eq!(node.callee, Some(0x8010));
    assert_eq!(node.branch_nodes, vec![0x8005]);

    assert!(!a.memory().get_attribute_at(0x8003).contains(MemAttribute::CODE));
    assert!(!a.memory().get_attribute_at(0x8004).contains(MemAttribute::CODE));
    assert_eq!(a.graph().addresses(), vec![0x8000, 0x8005, 0x8010]);
    assert_eq!(a.best_label(0x8005).as_deref(), Some("SUB_8005"));
}

#[test]
fn test_chained_skips() {
    // RST 08h is followed by one data byte, which is followed by another
    let mut a = analyzer(&[(0x0008, &[0xC9]), (0x8000, &[0xCF, 0xAA, 0xBB, 0xC9])]);
    a.set_skip(0x8001, 1).unwrap();
    a.set_skip(0x8002, 1).unwrap();
    a.get_flow_graph(&[0x8000]);

    assert_eq!(a.node(0x8000).unwrap().branch_nodes, vec![0x8003]);
    assert_eq!(a.node(0x8000).unwrap().callee, Some(0x0008));
    assert_eq!(a.best_label(0x0008).as_deref(), Some("RST_08"));
    assert!(a.diagnostics().is_empty());
}

// ============================================================================
// Data references
// ============================================================================

#[test]
fn test_data_and_self_modifying_references() {
    // LD A,(9000h) ; LD (8007h),A ; LD A,05h ; RET
    let mut a = analyzer(&[(
        0x8000,
        &[0x3A, 0x00, 0x90, 0x32, 0x07, 0x80, 0x3E, 0x05, 0xC9],
    )]);
    a.get_flow_graph(&[0x8000]);

    let node = a.node(0x8000).unwrap();
    assert_eq!(node.data_refs, vec![0x9000, 0x8006]);
    assert!(a.memory().get_attribute_at(0x9000).contains(MemAttribute::DATA));
    assert!(a.memory().get_attribute_at(0x8007).contains(MemAttribute::DATA));

    assert_eq!(a.other_labels()[&0x9000], "DATA_9000");
    assert_eq!(a.other_labels()[&0x8006], "CODE_8006");

    let text = a.disassemble_node(0x8000).unwrap();
    assert_eq!(text[0], "LD A,(DATA_9000)");
    assert_eq!(text[1], "LD (CODE_8006+1),A");
}

#[test]
fn test_code_reference_scoped_under_block_label() {
    // 8000: CALL 8010h ; RET
    // 8010: LD (8014h),A ; LD A,00h ; RET
    let mut a = analyzer(&[
        (0x8000, &[0xCD, 0x10, 0x80, 0xC9]),
        (0x8010, &[0x32, 0x14, 0x80, 0x3E, 0x00, 0xC9]),
    ]);
    a.get_flow_graph(&[0x8000]);

    assert_eq!(a.other_labels()[&0x8013], "SUB_8010.CODE_8013");
    let text = a.disassemble_node(0x8010).unwrap();
    assert_eq!(text[0], "LD (.CODE_8013+1),A");
}

// ============================================================================
// Known labels
// ============================================================================

#[test]
fn test_known_labels_split_nodes() {
    // NOP ; NOP ; NOP ; RET
    let mut a = analyzer(&[(0x8000, &[0x00, 0x00, 0x00, 0xC9])]);
    a.set_label(0x8002, "middle");
    a.set_label(0x9000, "buffer");
    a.get_flow_graph(&[0x8000]);

    assert_eq!(a.graph().addresses(), vec![0x8000, 0x8002]);
    assert_eq!(a.node(0x8000).unwrap().length, 2);
    assert_eq!(a.node(0x8000).unwrap().branch_nodes, vec![0x8002]);
    assert_eq!(a.node(0x8002).unwrap().label.as_deref(), Some("middle"));
    assert_eq!(a.other_labels()[&0x9000], "buffer");

    let lines: Vec<String> = a.listing().iter().map(ToString::to_string).collect();
    assert_eq!(
        lines,
        vec![
            "    8000  00           NOP",
            "    8001  00           NOP",
            "middle:",
            "    8002  00           NOP",
            "    8003  C9           RET",
        ]
    );
}

#[test]
fn test_label_inside_instruction_is_other_label() {
    // LD A,05h ; RET
    let mut a = analyzer(&[(0x8000, &[0x3E, 0x05, 0xC9])]);
    a.set_label(0x8001, "operand");
    a.get_flow_graph(&[0x8000]);

    assert_eq!(a.graph().len(), 1);
    assert_eq!(a.other_labels()[&0x8001], "operand");
    assert_eq!(a.best_label(0x8001).as_deref(), Some("operand"));
}

// ============================================================================
// Rendering
// ============================================================================

#[test]
fn test_local_loop_rendering() {
    // 8000: CALL 8010h ; RET
    // 8010: LD B,04h ; loop: DEC A ; DJNZ loop ; RET
    let mut a = analyzer(&[
        (0x8000, &[0xCD, 0x10, 0x80, 0xC9]),
        (0x8010, &[0x06, 0x04, 0x3D, 0x10, 0xFD, 0xC9]),
    ]);
    a.get_flow_graph(&[0x8000]);

    assert_eq!(a.node(0x8012).unwrap().label.as_deref(), Some("SUB_8010.LOOP"));
    assert_eq!(a.local_label(0x8012, 0x8013).as_deref(), Some(".LOOP"));
    assert_eq!(a.local_label(0x8012, 0x8000).as_deref(), Some("SUB_8010.LOOP"));

    let lines: Vec<String> = a.listing().iter().map(ToString::to_string).collect();
    assert!(lines.contains(&".LOOP:".to_string()));
    assert!(lines.contains(&"    8013  10 FD        DJNZ .LOOP".to_string()));
}

#[test]
fn test_lowercase_mnemonics() {
    let config = DisassemblerConfig {
        lowercase_mnemonics: true,
        ..DisassemblerConfig::default()
    };
    let mut a = Analyzer::new(config).unwrap();
    a.set_memory(0x8000, &[0xCD, 0x04, 0x80, 0xC9, 0xC9]).unwrap();
    a.get_flow_graph(&[0x8000]);
    assert_eq!(a.disassemble_node(0x8000).unwrap(), vec!["call SUB_8004", "ret"]);
}

#[test]
fn test_listing_skips_placeholders() {
    // JP 4000h into memory that was never loaded
    let mut a = analyzer(&[(0x8000, &[0xC3, 0x00, 0x40])]);
    a.get_flow_graph(&[0x8000]);

    assert!(a.node(0x4000).unwrap().is_placeholder());
    let listing = a.listing();
    assert_eq!(listing.len(), 1);
    assert!(matches!(
        &listing[0],
        ListingLine::Instruction { address: 0x8000, text, .. } if text == "JP LBL_4000"
    ));
}

// ============================================================================
// Queries
// ============================================================================

#[test]
fn test_call_graph_and_subroutine() {
    // 8000: CALL 8010h ; CALL 8020h ; RET
    // 8010: CALL 8020h ; RET
    // 8020: RET
    let mut a = analyzer(&[
        (0x8000, &[0xCD, 0x10, 0x80, 0xCD, 0x20, 0x80, 0xC9]),
        (0x8010, &[0xCD, 0x20, 0x80, 0xC9]),
        (0x8020, &[0xC9]),
    ]);
    a.get_flow_graph(&[0x8000]);

    // The second call starts its own node
    assert_eq!(a.node(0x8000).unwrap().branch_nodes, vec![0x8003]);

    let sub = a.subroutine(0x8000).unwrap();
    assert_eq!(sub.nodes, BTreeSet::from([0x8000, 0x8003]));
    assert_eq!(sub.callees, BTreeSet::from([0x8010, 0x8020]));
    assert_eq!(sub.size, 7);

    let calls = a.call_graph(&[0x8000]);
    let starts: Vec<Address> = calls.keys().copied().collect();
    assert_eq!(starts, vec![0x8000, 0x8010, 0x8020]);
    assert!(a.subroutine(0x8001).is_err());
}

#[test]
fn test_snapshot_json() {
    // CALL 8006h ; JP 4000h ; RET
    let mut a = analyzer(&[(0x8000, &[0xCD, 0x06, 0x80, 0xC3, 0x00, 0x40, 0xC9])]);
    a.get_flow_graph(&[0x8000]);

    let snapshot = a.snapshot();
    assert_eq!(snapshot.diagnostics.len(), 1);
    assert_eq!(snapshot.diagnostics[0].kind, DiagnosticKind::UnassignedMemory);

    let json = serde_json::to_string(&snapshot).unwrap();
    let back: GraphSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(back, snapshot);

    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    // The placeholder at 4000h sorts first
    assert_eq!(value["nodes"][0]["length"], 0);
    assert_eq!(value["nodes"][1]["start"], 0x8000);
    assert_eq!(value["nodes"][1]["instructions"][0], "CALL SUB_8006");
    assert_eq!(value["nodes"][1]["instructions"][1], "JP LBL_4000");
}

#[test]
fn test_entries_accumulate() {
    let mut a = analyzer(&[(0x8000, &[0xC9]), (0x9000, &[0xC9])]);
    a.add_entry_address(0x9000);
    a.get_flow_graph(&[0x8000]);
    assert_eq!(a.graph().addresses(), vec![0x8000, 0x9000]);

    a.get_flow_graph(&[]);
    assert_eq!(a.graph().addresses(), vec![0x8000, 0x9000]);
}
