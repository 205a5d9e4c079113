//! Instruction-level behavior through the public machine API.

#![allow(clippy::pedantic, clippy::nursery, clippy::cast_possible_truncation)]

use log as _;
use pdp11_core::execute::branch_taken;
use pdp11_core::state::{PSW_C, PSW_N, PSW_V, PSW_Z};
use pdp11_core::{
    classify_opcode, GeneralRegister, Machine, MachineConfig, StepOutcome, TrapKind,
    TranslationCache, Word,
};
use proptest::prelude::*;
use rstest::rstest;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

const CODE_BASE: u16 = 0o1000;

fn machine_with(words: &[u16]) -> Machine {
    let mut machine = Machine::with_config(&MachineConfig::default());
    let bytes: Vec<u8> = words.iter().flat_map(|word| word.to_le_bytes()).collect();
    machine.load_image(CODE_BASE, &bytes).unwrap();
    machine.set_pc(CODE_BASE);
    machine
}

fn flags(machine: &Machine) -> (bool, bool, bool, bool) {
    let psw = machine.registers.psw();
    (psw.n(), psw.z(), psw.v(), psw.c())
}

#[test]
fn add_signed_overflow_sets_v_and_n() {
    let mut machine = machine_with(&[0o060100]); // add r1, r0
    machine.registers.set_gpr(GeneralRegister::R0, 0x7FFF);
    machine.registers.set_gpr(GeneralRegister::R1, 0x0001);
    assert_eq!(machine.step(), StepOutcome::Retired);
    assert_eq!(machine.registers.gpr(GeneralRegister::R0), 0x8000);
    assert_eq!(flags(&machine), (true, false, true, false));
}

#[test]
fn sub_borrow_sets_c_and_n() {
    let mut machine = machine_with(&[0o160100]); // sub r1, r0
    machine.registers.set_gpr(GeneralRegister::R1, 0x0001);
    assert_eq!(machine.step(), StepOutcome::Retired);
    assert_eq!(machine.registers.gpr(GeneralRegister::R0), 0xFFFF);
    assert_eq!(flags(&machine), (true, false, false, true));
}

#[test]
fn index_mode_effective_address() {
    let mut machine = machine_with(&[0o016100, 4]); // mov 4(r1), r0
    machine.registers.set_gpr(GeneralRegister::R1, 0x1000);
    machine.memory.store::<Word>(0x1004, 0o1234).unwrap();
    assert_eq!(machine.step(), StepOutcome::Retired);
    assert_eq!(machine.registers.gpr(GeneralRegister::R0), 0o1234);
    assert_eq!(machine.registers.pc(), CODE_BASE + 4);
}

#[rstest]
#[case::byte_autoincrement(0o112100, GeneralRegister::R1, 1)]
#[case::word_autoincrement(0o012100, GeneralRegister::R1, 2)]
#[case::byte_autoincrement_sp(0o112600, GeneralRegister::SP, 2)]
#[case::byte_autodecrement(0o114100, GeneralRegister::R1, -1)]
#[case::byte_autodecrement_sp(0o114600, GeneralRegister::SP, -2)]
#[case::byte_autoincrement_deferred(0o113100, GeneralRegister::R1, 2)]
#[case::word_autodecrement_deferred(0o015100, GeneralRegister::R1, -2)]
fn autoincrement_and_autodecrement_step(
    #[case] opcode: u16,
    #[case] reg: GeneralRegister,
    #[case] delta: i16,
) {
    let mut machine = machine_with(&[opcode]);
    for addr in [0o17776, 0o20000] {
        machine.memory.store::<Word>(addr, 0o20100).unwrap();
    }
    machine.registers.set_gpr(reg, 0o20000);
    assert_eq!(machine.step(), StepOutcome::Retired);
    assert_eq!(
        machine.registers.gpr(reg),
        0o20000_u16.wrapping_add_signed(delta)
    );
}

#[test]
fn odd_word_load_traps_and_leaves_destination() {
    let mut machine = machine_with(&[0o011100]); // mov (r1), r0
    machine.registers.set_gpr(GeneralRegister::R0, 0o5555);
    machine.registers.set_gpr(GeneralRegister::R1, 0o20001);
    let StepOutcome::Trapped(report) = machine.step() else {
        panic!("expected a trap");
    };
    assert_eq!(report.kind, TrapKind::OddAddress);
    assert_eq!(report.vector(), 0o4);
    assert_eq!(machine.registers.gpr(GeneralRegister::R0), 0o5555);
}

#[rstest]
#[case::load(&[0o013700, 0o160000])] // mov @#160000, r0
#[case::store(&[0o005037, 0o177776])] // clr @#177776
#[case::past_small_core(&[0o005037, 0o40000])] // clr @#40000
fn unbacked_address_raises_memory_management(#[case] program: &[u16]) {
    let mut machine = Machine::with_config(&MachineConfig {
        core_bytes: 0o40000,
        ..MachineConfig::default()
    });
    let bytes: Vec<u8> = program.iter().flat_map(|word| word.to_le_bytes()).collect();
    machine.load_image(CODE_BASE, &bytes).unwrap();
    machine.set_pc(CODE_BASE);

    let StepOutcome::Trapped(report) = machine.step() else {
        panic!("expected a trap");
    };
    assert_eq!(report.kind, TrapKind::MemoryManagement);
    assert_eq!(report.vector(), 0o250);
    assert_eq!(report.pc, CODE_BASE);
}

#[test]
fn jsr_to_register_is_illegal_and_pushes_nothing() {
    let mut machine = machine_with(&[0o004701]); // jsr pc, r1
    machine.registers.set_sp(0o1000);
    let StepOutcome::Trapped(report) = machine.step() else {
        panic!("expected a trap");
    };
    assert_eq!(report.kind, TrapKind::IllegalInstruction);
    assert_eq!(machine.registers.sp(), 0o1000);
    assert_eq!(machine.memory.load::<Word>(0o776), Ok(0));
}

#[test]
fn jsr_and_rts_round_trip() {
    let mut machine = machine_with(&[0o004737, 0o1100]); // jsr pc, @#1100
    machine.memory.store::<Word>(0o1100, 0o000207).unwrap(); // rts pc
    machine.registers.set_sp(0o1000);

    assert_eq!(machine.step(), StepOutcome::Retired);
    assert_eq!(machine.registers.pc(), 0o1100);
    assert_eq!(machine.registers.sp(), 0o776);
    assert_eq!(machine.memory.load::<Word>(0o776), Ok(0o1004));

    assert_eq!(machine.step(), StepOutcome::Retired);
    assert_eq!(machine.registers.pc(), 0o1004);
    assert_eq!(machine.registers.sp(), 0o1000);
}

#[test]
fn jsr_through_link_register() {
    // jsr r5, @#1100 saves r5 on the stack and leaves the return address in r5
    let mut machine = machine_with(&[0o004537, 0o1100]);
    machine.registers.set_sp(0o1000);
    machine.registers.set_gpr(GeneralRegister::R5, 0o4321);

    assert_eq!(machine.step(), StepOutcome::Retired);
    assert_eq!(machine.registers.gpr(GeneralRegister::R5), 0o1004);
    assert_eq!(machine.memory.load::<Word>(0o776), Ok(0o4321));
}

#[rstest]
#[case::fits(3, 0xFFFE, 0xFFFF, 0xFFFA, false)]
#[case::overflows_word(0o400, 0o400, 1, 0, true)]
fn mul_splits_product_across_register_pair(
    #[case] lhs: u16,
    #[case] rhs: u16,
    #[case] high: u16,
    #[case] low: u16,
    #[case] carry: bool,
) {
    let mut machine = machine_with(&[0o070027, rhs]); // mul #rhs, r0
    machine.registers.set_gpr(GeneralRegister::R0, lhs);
    assert_eq!(machine.step(), StepOutcome::Retired);
    assert_eq!(machine.registers.gpr(GeneralRegister::R0), high);
    assert_eq!(machine.registers.gpr(GeneralRegister::R1), low);
    assert_eq!(machine.registers.psw().c(), carry);
    assert!(!machine.registers.psw().v());
}

#[test]
fn movb_to_register_sign_extends() {
    let mut machine = machine_with(&[0o112700, 0o200]); // movb #200, r0
    machine.registers.set_gpr(GeneralRegister::R0, 0o1234);
    assert_eq!(machine.step(), StepOutcome::Retired);
    assert_eq!(machine.registers.gpr(GeneralRegister::R0), 0o177600);
    assert!(machine.registers.psw().n());
}

#[rstest]
#[case::br(0o000400, 0, true)]
#[case::bne_clear(0o001000, 0, true)]
#[case::bne_set(0o001000, PSW_Z, false)]
#[case::beq(0o001400, PSW_Z, true)]
#[case::bge_equal_signs(0o002000, PSW_N | PSW_V, true)]
#[case::bge_negative(0o002000, PSW_N, false)]
#[case::blt(0o002400, PSW_V, true)]
#[case::bgt(0o003000, 0, true)]
#[case::bgt_zero(0o003000, PSW_Z, false)]
#[case::ble(0o003400, PSW_Z, true)]
#[case::bpl(0o100000, PSW_N, false)]
#[case::bmi(0o100400, PSW_N, true)]
#[case::bhi(0o101000, 0, true)]
#[case::bhi_carry(0o101000, PSW_C, false)]
#[case::blos(0o101400, PSW_C, true)]
#[case::bvc(0o102000, PSW_V, false)]
#[case::bvs(0o102400, PSW_V, true)]
#[case::bcc(0o103000, PSW_C, false)]
#[case::bcs(0o103400, PSW_C, true)]
fn branch_predicates(#[case] base: u16, #[case] psw: u16, #[case] taken: bool) {
    let opcode = base | 2;
    let mut machine = machine_with(&[opcode]);
    machine.registers.psw_mut().set_flag(psw, true);
    assert_eq!(
        branch_taken(classify_opcode(opcode), machine.registers.psw()),
        Some(taken)
    );

    assert_eq!(machine.step(), StepOutcome::Retired);
    let expected = if taken { CODE_BASE + 6 } else { CODE_BASE + 2 };
    assert_eq!(machine.registers.pc(), expected);
}

#[test]
fn condition_code_operators_touch_only_flags() {
    // sec; sen; clc
    let mut machine = machine_with(&[0o000261, 0o000270, 0o000241]);
    let mut cache = TranslationCache::for_machine(&machine);
    machine.registers.psw_mut().set_priority(5);
    for _ in 0..3 {
        assert_eq!(cache.step(&mut machine), StepOutcome::Retired);
    }
    assert_eq!(flags(&machine), (true, false, false, false));
    assert_eq!(machine.registers.psw().priority(), 5);
}

#[test]
fn flags_are_unchanged_when_the_store_traps() {
    let mut machine = machine_with(&[0o005011]); // clr (r1)
    machine.registers.set_gpr(GeneralRegister::R1, 0o20001);
    machine.registers.psw_mut().set_flag(PSW_N | PSW_C, true);
    assert!(machine.step().is_trap());
    assert_eq!(flags(&machine), (true, false, false, true));
}

proptest! {
    #[test]
    fn add_flags_match_reference(augend in any::<u16>(), addend in any::<u16>()) {
        let mut machine = machine_with(&[0o060100]); // add r1, r0
        machine.registers.set_gpr(GeneralRegister::R0, augend);
        machine.registers.set_gpr(GeneralRegister::R1, addend);
        prop_assert_eq!(machine.step(), StepOutcome::Retired);

        let result = augend.wrapping_add(addend);
        prop_assert_eq!(machine.registers.gpr(GeneralRegister::R0), result);
        prop_assert_eq!(
            flags(&machine),
            (
                (result as i16) < 0,
                result == 0,
                (augend as i16).checked_add(addend as i16).is_none(),
                augend.checked_add(addend).is_none(),
            )
        );
    }

    #[test]
    fn sub_flags_match_reference(minuend in any::<u16>(), subtrahend in any::<u16>()) {
        let mut machine = machine_with(&[0o160100]); // sub r1, r0
        machine.registers.set_gpr(GeneralRegister::R0, minuend);
        machine.registers.set_gpr(GeneralRegister::R1, subtrahend);
        prop_assert_eq!(machine.step(), StepOutcome::Retired);

        let result = minuend.wrapping_sub(subtrahend);
        prop_assert_eq!(machine.registers.gpr(GeneralRegister::R0), result);
        prop_assert_eq!(
            flags(&machine),
            (
                (result as i16) < 0,
                result == 0,
                (minuend as i16).checked_sub(subtrahend as i16).is_none(),
                minuend < subtrahend,
            )
        );
    }

    #[test]
    fn cmp_leaves_operands_and_sets_flags(src in any::<u16>(), dst in any::<u16>()) {
        let mut machine = machine_with(&[0o020001]); // cmp r0, r1
        machine.registers.set_gpr(GeneralRegister::R0, src);
        machine.registers.set_gpr(GeneralRegister::R1, dst);
        prop_assert_eq!(machine.step(), StepOutcome::Retired);

        let result = src.wrapping_sub(dst);
        prop_assert_eq!(machine.registers.gpr(GeneralRegister::R0), src);
        prop_assert_eq!(machine.registers.gpr(GeneralRegister::R1), dst);
        prop_assert_eq!(
            flags(&machine),
            (
                (result as i16) < 0,
                result == 0,
                (src as i16).checked_sub(dst as i16).is_none(),
                src < dst,
            )
        );
    }
}
