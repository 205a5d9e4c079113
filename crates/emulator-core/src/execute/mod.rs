//! Instruction execution.
//!
//! Every encoding maps to one [`Handler`]. A handler runs with the program
//! counter already past the opcode word, performs the instruction on the
//! machine and returns the trap to raise, if any. Register side effects of
//! operand resolution are not rolled back when a later access traps.
//!
//! Encodings that are decoded but not carried out map to a handler that
//! raises [`TrapKind::IllegalInstruction`].

mod flags;
mod helpers;
mod operand;

pub use flags::FlagsUpdate;
pub use helpers::{add_overflow, arithmetic_shift, multiply, sub_overflow, ShiftResult};
pub use operand::{step_size, Location};

use crate::api::Machine;
use crate::decoder::{branch_displacement, AddrOp};
use crate::encoding::{classify_opcode, OpcodeEncoding};
use crate::memory::{Byte, DataWidth, Word};
use crate::state::{GeneralRegister, Psw};
use crate::TrapKind;

/// Executes one instruction word against a machine.
pub type Handler = fn(&mut Machine, u16) -> Result<(), TrapKind>;

/// Returns the handler bound to `encoding`.
#[must_use]
pub fn handler_for(encoding: OpcodeEncoding) -> Handler {
    use OpcodeEncoding as E;

    match encoding {
        E::Mov => execute_mov::<Word>,
        E::Movb => execute_mov::<Byte>,
        E::Cmp => execute_cmp::<Word>,
        E::Cmpb => execute_cmp::<Byte>,
        E::Bit => execute_bit::<Word>,
        E::Bitb => execute_bit::<Byte>,
        E::Bic => execute_bic::<Word>,
        E::Bicb => execute_bic::<Byte>,
        E::Bis => execute_bis::<Word>,
        E::Bisb => execute_bis::<Byte>,
        E::Add => execute_add,
        E::Sub => execute_sub,
        E::Jsr => execute_jsr,
        E::Mul => execute_mul,
        E::Ash => execute_ash,
        E::Br => |machine, opcode| take_branch(machine, opcode, E::Br),
        E::Bne => |machine, opcode| take_branch(machine, opcode, E::Bne),
        E::Beq => |machine, opcode| take_branch(machine, opcode, E::Beq),
        E::Bge => |machine, opcode| take_branch(machine, opcode, E::Bge),
        E::Blt => |machine, opcode| take_branch(machine, opcode, E::Blt),
        E::Bgt => |machine, opcode| take_branch(machine, opcode, E::Bgt),
        E::Ble => |machine, opcode| take_branch(machine, opcode, E::Ble),
        E::Bpl => |machine, opcode| take_branch(machine, opcode, E::Bpl),
        E::Bmi => |machine, opcode| take_branch(machine, opcode, E::Bmi),
        E::Bhi => |machine, opcode| take_branch(machine, opcode, E::Bhi),
        E::Blos => |machine, opcode| take_branch(machine, opcode, E::Blos),
        E::Bvc => |machine, opcode| take_branch(machine, opcode, E::Bvc),
        E::Bvs => |machine, opcode| take_branch(machine, opcode, E::Bvs),
        E::Bcc => |machine, opcode| take_branch(machine, opcode, E::Bcc),
        E::Bcs => |machine, opcode| take_branch(machine, opcode, E::Bcs),
        E::Jmp => execute_jmp,
        E::Clr => execute_clr::<Word>,
        E::Clrb => execute_clr::<Byte>,
        E::Com => execute_com::<Word>,
        E::Comb => execute_com::<Byte>,
        E::Inc => execute_inc::<Word>,
        E::Incb => execute_inc::<Byte>,
        E::Dec => execute_dec::<Word>,
        E::Decb => execute_dec::<Byte>,
        E::Tst => execute_tst::<Word>,
        E::Tstb => execute_tst::<Byte>,
        E::ConditionCode => execute_condition_code,
        E::Rts => execute_rts,
        E::Setd => execute_setd,
        E::Seti => execute_seti,
        E::Div
        | E::Ashc
        | E::Xor
        | E::Sob
        | E::Emt
        | E::Trap
        | E::Swab
        | E::Neg
        | E::Negb
        | E::Adc
        | E::Adcb
        | E::Sbc
        | E::Sbcb
        | E::Ror
        | E::Rorb
        | E::Rol
        | E::Rolb
        | E::Asr
        | E::Asrb
        | E::Asl
        | E::Aslb
        | E::Mark
        | E::Mfpi
        | E::Mtpi
        | E::Mfpd
        | E::Mtpd
        | E::Sxt
        | E::Spl
        | E::Halt
        | E::Wait
        | E::Rti
        | E::Bpt
        | E::Iot
        | E::Reset
        | E::Rtt
        | E::Unknown => illegal_instruction,
    }
}

/// Classifies `opcode` and runs its handler.
///
/// # Errors
///
/// The trap raised by the instruction.
pub fn execute_instruction(machine: &mut Machine, opcode: u16) -> Result<(), TrapKind> {
    handler_for(classify_opcode(opcode))(machine, opcode)
}

/// Whether the branch `encoding` is taken under `psw`. `None` for non-branches.
///
/// The branch handlers bound by [`handler_for`] consult this table.
#[must_use]
pub const fn branch_taken(encoding: OpcodeEncoding, psw: Psw) -> Option<bool> {
    let (n, z, v, c) = (psw.n(), psw.z(), psw.v(), psw.c());
    let taken = match encoding {
        OpcodeEncoding::Br => true,
        OpcodeEncoding::Bne => !z,
        OpcodeEncoding::Beq => z,
        OpcodeEncoding::Bge => !(n ^ v),
        OpcodeEncoding::Blt => n ^ v,
        OpcodeEncoding::Bgt => !(z || (n ^ v)),
        OpcodeEncoding::Ble => z || (n ^ v),
        OpcodeEncoding::Bpl => !n,
        OpcodeEncoding::Bmi => n,
        OpcodeEncoding::Bhi => !(c || z),
        OpcodeEncoding::Blos => c || z,
        OpcodeEncoding::Bvc => !v,
        OpcodeEncoding::Bvs => v,
        OpcodeEncoding::Bcc => !c,
        OpcodeEncoding::Bcs => c,
        _ => return None,
    };
    Some(taken)
}

fn illegal_instruction(_machine: &mut Machine, _opcode: u16) -> Result<(), TrapKind> {
    Err(TrapKind::IllegalInstruction)
}

fn double_operands<W: DataWidth>(
    machine: &mut Machine,
    opcode: u16,
) -> Result<(Location, Location), TrapKind> {
    let src = AddrOp::from_field(opcode >> 6).resolve::<W>(machine)?;
    let dst = AddrOp::from_field(opcode).resolve::<W>(machine)?;
    Ok((src, dst))
}

fn execute_mov<W: DataWidth>(machine: &mut Machine, opcode: u16) -> Result<(), TrapKind> {
    let (src, dst) = double_operands::<W>(machine, opcode)?;
    let value = src.load::<W>(machine)?;
    match dst {
        // movb into a register sign-extends into the high byte
        Location::Register(_) if W::BYTES == 1 => {
            dst.store::<Word>(machine, W::sign_extend(value))?;
        }
        _ => dst.store::<W>(machine, value)?,
    }
    FlagsUpdate::nz::<W>(value)
        .with_v(false)
        .apply(machine.registers.psw_mut());
    Ok(())
}

fn execute_cmp<W: DataWidth>(machine: &mut Machine, opcode: u16) -> Result<(), TrapKind> {
    let (src, dst) = double_operands::<W>(machine, opcode)?;
    let lhs = src.load::<W>(machine)?;
    let rhs = dst.load::<W>(machine)?;
    let result = lhs.wrapping_sub(rhs) & W::MASK;
    FlagsUpdate::nz::<W>(result)
        .with_v(sub_overflow::<W>(lhs, rhs, result))
        .with_c(lhs < rhs)
        .apply(machine.registers.psw_mut());
    Ok(())
}

fn execute_bit<W: DataWidth>(machine: &mut Machine, opcode: u16) -> Result<(), TrapKind> {
    let (src, dst) = double_operands::<W>(machine, opcode)?;
    let result = src.load::<W>(machine)? & dst.load::<W>(machine)?;
    FlagsUpdate::nz::<W>(result)
        .with_v(false)
        .apply(machine.registers.psw_mut());
    Ok(())
}

fn execute_bic<W: DataWidth>(machine: &mut Machine, opcode: u16) -> Result<(), TrapKind> {
    let (src, dst) = double_operands::<W>(machine, opcode)?;
    let mask = src.load::<W>(machine)?;
    let result = !mask & dst.load::<W>(machine)?;
    dst.store::<W>(machine, result)?;
    FlagsUpdate::nz::<W>(result)
        .with_v(false)
        .apply(machine.registers.psw_mut());
    Ok(())
}

fn execute_bis<W: DataWidth>(machine: &mut Machine, opcode: u16) -> Result<(), TrapKind> {
    let (src, dst) = double_operands::<W>(machine, opcode)?;
    let result = src.load::<W>(machine)? | dst.load::<W>(machine)?;
    dst.store::<W>(machine, result)?;
    FlagsUpdate::nz::<W>(result)
        .with_v(false)
        .apply(machine.registers.psw_mut());
    Ok(())
}

fn execute_add(machine: &mut Machine, opcode: u16) -> Result<(), TrapKind> {
    let (src, dst) = double_operands::<Word>(machine, opcode)?;
    let addend = src.load::<Word>(machine)?;
    let augend = dst.load::<Word>(machine)?;
    let result = augend.wrapping_add(addend);
    dst.store::<Word>(machine, result)?;
    FlagsUpdate::nz::<Word>(result)
        .with_v(add_overflow::<Word>(addend, augend, result))
        .with_c(result < addend)
        .apply(machine.registers.psw_mut());
    Ok(())
}

fn execute_sub(machine: &mut Machine, opcode: u16) -> Result<(), TrapKind> {
    let (src, dst) = double_operands::<Word>(machine, opcode)?;
    let subtrahend = src.load::<Word>(machine)?;
    let minuend = dst.load::<Word>(machine)?;
    let result = minuend.wrapping_sub(subtrahend);
    dst.store::<Word>(machine, result)?;
    FlagsUpdate::nz::<Word>(result)
        .with_v(sub_overflow::<Word>(minuend, subtrahend, result))
        .with_c(minuend < subtrahend)
        .apply(machine.registers.psw_mut());
    Ok(())
}

fn push_word(machine: &mut Machine, value: u16) -> Result<(), TrapKind> {
    let sp = machine.registers.sp().wrapping_sub(2);
    machine.registers.set_sp(sp);
    machine.memory.store::<Word>(sp, value)
}

fn pop_word(machine: &mut Machine) -> Result<u16, TrapKind> {
    let sp = machine.registers.sp();
    let value = machine.memory.load::<Word>(sp)?;
    machine.registers.set_sp(sp.wrapping_add(2));
    Ok(value)
}

fn execute_jsr(machine: &mut Machine, opcode: u16) -> Result<(), TrapKind> {
    let link = GeneralRegister::from_field(opcode >> 6);
    let target = AddrOp::from_field(opcode)
        .resolve::<Word>(machine)?
        .address()
        .ok_or(TrapKind::IllegalInstruction)?;
    let saved = machine.registers.gpr(link);
    push_word(machine, saved)?;
    let pc = machine.registers.pc();
    machine.registers.set_gpr(link, pc);
    machine.registers.set_pc(target);
    Ok(())
}

fn execute_rts(machine: &mut Machine, opcode: u16) -> Result<(), TrapKind> {
    let link = GeneralRegister::from_field(opcode);
    machine.registers.set_pc(machine.registers.gpr(link));
    let saved = pop_word(machine)?;
    machine.registers.set_gpr(link, saved);
    Ok(())
}

fn execute_jmp(machine: &mut Machine, opcode: u16) -> Result<(), TrapKind> {
    let target = AddrOp::from_field(opcode)
        .resolve::<Word>(machine)?
        .address()
        .ok_or(TrapKind::IllegalInstruction)?;
    machine.registers.set_pc(target);
    Ok(())
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn execute_mul(machine: &mut Machine, opcode: u16) -> Result<(), TrapKind> {
    let reg = GeneralRegister::from_field(opcode >> 6);
    let src = AddrOp::from_field(opcode).resolve::<Word>(machine)?;
    let multiplier = src.load::<Word>(machine)?;
    let product = multiply(machine.registers.gpr(reg), multiplier);
    machine.registers.set_gpr(reg, (product >> 16) as u16);
    machine.registers.set_gpr(reg.odd_pair(), product as u16);
    FlagsUpdate {
        n: Some(product < 0),
        z: Some(product == 0),
        v: Some(false),
        c: Some(!(-0o100000..=0o77777).contains(&product)),
    }
    .apply(machine.registers.psw_mut());
    Ok(())
}

fn execute_ash(machine: &mut Machine, opcode: u16) -> Result<(), TrapKind> {
    let reg = GeneralRegister::from_field(opcode >> 6);
    let src = AddrOp::from_field(opcode).resolve::<Word>(machine)?;
    let count = src.load::<Word>(machine)?;
    let shifted = arithmetic_shift(machine.registers.gpr(reg), count);
    machine.registers.set_gpr(reg, shifted.value);
    FlagsUpdate::nz::<Word>(shifted.value)
        .with_v(shifted.overflow)
        .with_c(shifted.carry)
        .apply(machine.registers.psw_mut());
    Ok(())
}

fn take_branch(
    machine: &mut Machine,
    opcode: u16,
    encoding: OpcodeEncoding,
) -> Result<(), TrapKind> {
    if branch_taken(encoding, machine.registers.psw()) == Some(true) {
        let pc = machine.registers.pc();
        machine
            .registers
            .set_pc(pc.wrapping_add_signed(branch_displacement(opcode)));
    }
    Ok(())
}

fn execute_clr<W: DataWidth>(machine: &mut Machine, opcode: u16) -> Result<(), TrapKind> {
    let dst = AddrOp::from_field(opcode).resolve::<W>(machine)?;
    dst.store::<W>(machine, 0)?;
    FlagsUpdate::nz::<W>(0)
        .with_v(false)
        .with_c(false)
        .apply(machine.registers.psw_mut());
    Ok(())
}

fn execute_com<W: DataWidth>(machine: &mut Machine, opcode: u16) -> Result<(), TrapKind> {
    let dst = AddrOp::from_field(opcode).resolve::<W>(machine)?;
    let result = !dst.load::<W>(machine)? & W::MASK;
    dst.store::<W>(machine, result)?;
    FlagsUpdate::nz::<W>(result)
        .with_v(false)
        .with_c(true)
        .apply(machine.registers.psw_mut());
    Ok(())
}

fn execute_inc<W: DataWidth>(machine: &mut Machine, opcode: u16) -> Result<(), TrapKind> {
    let dst = AddrOp::from_field(opcode).resolve::<W>(machine)?;
    let result = dst.load::<W>(machine)?.wrapping_add(1) & W::MASK;
    dst.store::<W>(machine, result)?;
    FlagsUpdate::nz::<W>(result)
        .with_v(result == W::SIGN)
        .apply(machine.registers.psw_mut());
    Ok(())
}

fn execute_dec<W: DataWidth>(machine: &mut Machine, opcode: u16) -> Result<(), TrapKind> {
    let dst = AddrOp::from_field(opcode).resolve::<W>(machine)?;
    let result = dst.load::<W>(machine)?.wrapping_sub(1) & W::MASK;
    dst.store::<W>(machine, result)?;
    FlagsUpdate::nz::<W>(result)
        .with_v(result == W::SIGN - 1)
        .apply(machine.registers.psw_mut());
    Ok(())
}

fn execute_tst<W: DataWidth>(machine: &mut Machine, opcode: u16) -> Result<(), TrapKind> {
    let dst = AddrOp::from_field(opcode).resolve::<W>(machine)?;
    let value = dst.load::<W>(machine)?;
    FlagsUpdate::nz::<W>(value)
        .with_v(false)
        .with_c(false)
        .apply(machine.registers.psw_mut());
    Ok(())
}

fn execute_condition_code(machine: &mut Machine, opcode: u16) -> Result<(), TrapKind> {
    let set = opcode & 0o20 != 0;
    machine
        .registers
        .psw_mut()
        .set_flag(opcode & crate::state::PSW_CONDITION_MASK, set);
    Ok(())
}

fn execute_setd(machine: &mut Machine, _opcode: u16) -> Result<(), TrapKind> {
    machine.fpu.set_double_precision(true);
    Ok(())
}

fn execute_seti(machine: &mut Machine, _opcode: u16) -> Result<(), TrapKind> {
    machine.fpu.set_long_integers(false);
    Ok(())
}
