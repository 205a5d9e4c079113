//! Classification, execution binding and disassembly agree on every opcode.

#![allow(clippy::pedantic, clippy::nursery)]

use log as _;
use pdp11_core::{
    classify_opcode, disassemble_word, Decoder, Machine, MachineConfig, OpcodeEncoding,
    StepOutcome, Thunk, TranslationCache, TrapKind, DISPATCH_LAYERS,
};
use proptest as _;
use rstest::rstest;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

#[test]
fn every_mov_class_word_selects_mov() {
    for word in 0o010000_u16..0o020000 {
        assert_eq!(classify_opcode(word), OpcodeEncoding::Mov, "{word:06o}");
        assert_eq!(Thunk::compile(word).encoding(), OpcodeEncoding::Mov);
        assert_eq!(disassemble_word(word).mnemonic, "mov");
    }
}

#[test]
fn every_word_agrees_across_paths() {
    for word in 0_u16..=u16::MAX {
        let encoding = classify_opcode(word);
        assert_eq!(Decoder::decode(word).encoding, encoding, "{word:06o}");
        assert_eq!(Thunk::compile(word).encoding(), encoding, "{word:06o}");

        let row = disassemble_word(word);
        assert_eq!(row.encoding, encoding, "{word:06o}");
        assert_eq!(row.is_illegal, encoding == OpcodeEncoding::Unknown);
        if encoding != OpcodeEncoding::ConditionCode {
            assert_eq!(row.mnemonic, encoding.mnemonic(), "{word:06o}");
        }
    }
}

#[test]
fn unimplemented_encodings_trap_on_both_paths() {
    let config = MachineConfig {
        core_bytes: 0o2000,
        ..MachineConfig::default()
    };
    let encodings: Vec<OpcodeEncoding> = DISPATCH_LAYERS
        .iter()
        .flat_map(|layer| layer.cases.iter().map(|(_, encoding)| *encoding))
        .filter(|encoding| !encoding.is_implemented())
        .collect();
    assert!(encodings.contains(&OpcodeEncoding::Halt));

    for encoding in encodings {
        let word = encoding.base_opcode().unwrap();
        let mut interpreted = Machine::with_config(&config);
        interpreted.load_image(0o1000, &word.to_le_bytes()).unwrap();
        interpreted.set_pc(0o1000);
        let mut cached = Machine::with_config(&config);
        cached.load_image(0o1000, &word.to_le_bytes()).unwrap();
        cached.set_pc(0o1000);
        let mut cache = TranslationCache::for_machine(&cached);

        let expected = interpreted.step();
        assert_eq!(cache.step(&mut cached), expected, "{}", encoding.mnemonic());
        let StepOutcome::Trapped(report) = expected else {
            panic!("{} retired", encoding.mnemonic());
        };
        assert_eq!(report.kind, TrapKind::IllegalInstruction);
        assert_eq!(report.opcode, Some(word));
    }
}

#[rstest]
#[case(0o010102, "mov r1, r2")]
#[case(0o110102, "movb r1, r2")]
#[case(0o020102, "cmp r1, r2")]
#[case(0o030102, "bit r1, r2")]
#[case(0o040102, "bic r1, r2")]
#[case(0o050102, "bis r1, r2")]
#[case(0o060102, "add r1, r2")]
#[case(0o160102, "sub r1, r2")]
#[case(0o005000, "clr r0")]
#[case(0o105112, "comb (r2)")]
#[case(0o005224, "inc (r4)+")]
#[case(0o005345, "dec -(r5)")]
#[case(0o105712, "tstb (r2)")]
#[case(0o000407, "br .+20")]
#[case(0o004767, "jsr pc, X(pc)")]
#[case(0o000137, "jmp @#X")]
#[case(0o070327, "mul #X, r3")]
#[case(0o072027, "ash #X, r0")]
#[case(0o006203, "asr r3")]
#[case(0o077305, "sob r3, .-10")]
#[case(0o104000, "emt 0")]
#[case(0o000230, "spl 0")]
#[case(0o000002, "rti")]
#[case(0o000000, "halt")]
#[case(0o170011, "setd")]
#[case(0o170002, "seti")]
#[case(0o170000, ".word 170000")]
fn representative_disassembly(#[case] word: u16, #[case] text: &str) {
    assert_eq!(disassemble_word(word).to_string(), text);
}
