//! Operand resolution.
//!
//! Resolving an [`AddrOp`] applies the mode's register side effects and
//! yields a [`Location`]. Side effects already applied stay applied when a
//! later memory access traps.

use crate::api::Machine;
use crate::decoder::{AddrOp, AddressingMode};
use crate::memory::{DataWidth, Word};
use crate::state::GeneralRegister;
use crate::TrapKind;

/// Where a resolved operand lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    /// A general register.
    Register(GeneralRegister),
    /// A physical address.
    Memory(u16),
}

impl Location {
    /// Reads the operand at width `W`, zero-extended.
    ///
    /// # Errors
    ///
    /// Any trap raised by the memory access.
    pub fn load<W: DataWidth>(self, machine: &mut Machine) -> Result<u16, TrapKind> {
        match self {
            Self::Register(reg) => Ok(machine.registers.gpr(reg) & W::MASK),
            Self::Memory(addr) => machine.memory.load::<W>(addr),
        }
    }

    /// Writes the low `W` bits of `value`. A byte write to a register keeps
    /// the register's high byte.
    ///
    /// # Errors
    ///
    /// Any trap raised by the memory access.
    pub fn store<W: DataWidth>(self, machine: &mut Machine, value: u16) -> Result<(), TrapKind> {
        match self {
            Self::Register(reg) => {
                let old = machine.registers.gpr(reg);
                machine
                    .registers
                    .set_gpr(reg, (old & !W::MASK) | (value & W::MASK));
                Ok(())
            }
            Self::Memory(addr) => machine.memory.store::<W>(addr, value),
        }
    }

    /// Memory address, or `None` for a register.
    #[must_use]
    pub const fn address(self) -> Option<u16> {
        match self {
            Self::Register(_) => None,
            Self::Memory(addr) => Some(addr),
        }
    }
}

/// Autoincrement/decrement step: the access width, except that the stack
/// pointer and program counter always move by a word.
#[must_use]
pub fn step_size<W: DataWidth>(reg: GeneralRegister) -> u16 {
    match reg {
        GeneralRegister::R6 | GeneralRegister::R7 => 2,
        _ => W::BYTES,
    }
}

impl AddrOp {
    /// Computes the operand location for an access of width `W`.
    ///
    /// Index words are read from the program counter, which then advances.
    ///
    /// # Errors
    ///
    /// Any trap raised while reading an index word or a deferred pointer.
    pub fn resolve<W: DataWidth>(self, machine: &mut Machine) -> Result<Location, TrapKind> {
        let reg = self.reg;
        let value = machine.registers.gpr(reg);
        match self.mode {
            AddressingMode::Register => Ok(Location::Register(reg)),
            AddressingMode::RegisterDeferred => Ok(Location::Memory(value)),
            AddressingMode::Autoincrement => {
                machine
                    .registers
                    .set_gpr(reg, value.wrapping_add(step_size::<W>(reg)));
                Ok(Location::Memory(value))
            }
            AddressingMode::AutoincrementDeferred => {
                let addr = machine.memory.load::<Word>(value)?;
                machine.registers.set_gpr(reg, value.wrapping_add(2));
                Ok(Location::Memory(addr))
            }
            AddressingMode::Autodecrement => {
                let addr = value.wrapping_sub(step_size::<W>(reg));
                machine.registers.set_gpr(reg, addr);
                Ok(Location::Memory(addr))
            }
            AddressingMode::AutodecrementDeferred => {
                let pointer = value.wrapping_sub(2);
                machine.registers.set_gpr(reg, pointer);
                Ok(Location::Memory(machine.memory.load::<Word>(pointer)?))
            }
            AddressingMode::Index => {
                let index = machine.fetch_index_word()?;
                Ok(Location::Memory(
                    machine.registers.gpr(reg).wrapping_add(index),
                ))
            }
            AddressingMode::IndexDeferred => {
                let index = machine.fetch_index_word()?;
                let pointer = machine.registers.gpr(reg).wrapping_add(index);
                Ok(Location::Memory(machine.memory.load::<Word>(pointer)?))
            }
        }
    }
}
