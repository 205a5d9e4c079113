use std::fmt;

use super::psw::{ProcessorMode, Psw};

/// Number of architecturally visible general-purpose registers (`R0..R7`).
pub const GENERAL_REGISTER_COUNT: usize = 8;
/// Number of registers duplicated by the alternate register set (`R0..R5`).
pub const BANKED_REGISTER_COUNT: usize = 6;

/// Architecturally visible general-purpose register identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
#[allow(missing_docs)]
pub enum GeneralRegister {
    R0 = 0,
    R1 = 1,
    R2 = 2,
    R3 = 3,
    R4 = 4,
    R5 = 5,
    R6 = 6,
    R7 = 7,
}

impl GeneralRegister {
    /// Stack pointer alias.
    pub const SP: Self = Self::R6;
    /// Program counter alias.
    pub const PC: Self = Self::R7;

    /// Ordered list of all general-purpose registers.
    pub const ALL: [Self; GENERAL_REGISTER_COUNT] = [
        Self::R0,
        Self::R1,
        Self::R2,
        Self::R3,
        Self::R4,
        Self::R5,
        Self::R6,
        Self::R7,
    ];

    /// Returns the array index for this register (`0..=7`).
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Decodes the low three bits of an instruction field.
    #[must_use]
    pub const fn from_field(bits: u16) -> Self {
        Self::ALL[(bits & 0o7) as usize]
    }

    /// Register whose index is this one's with bit 0 set (`R0 -> R1`, `R1 -> R1`).
    #[must_use]
    pub const fn odd_pair(self) -> Self {
        Self::ALL[self.index() | 1]
    }

    /// Assembler name: `r0`..`r5`, `sp`, `pc`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::R0 => "r0",
            Self::R1 => "r1",
            Self::R2 => "r2",
            Self::R3 => "r3",
            Self::R4 => "r4",
            Self::R5 => "r5",
            Self::R6 => "sp",
            Self::R7 => "pc",
        }
    }
}

impl fmt::Display for GeneralRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// General registers, the shadow bank, per-mode stack pointers and the `PSW`.
///
/// `live` always holds the registers instructions see. Selecting the other
/// register set swaps `R0..R5` with `shadow`; changing the current mode parks
/// `R6` in `stack_pointers` and loads the new mode's stack pointer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RegisterFile {
    live: [u16; GENERAL_REGISTER_COUNT],
    shadow: [u16; BANKED_REGISTER_COUNT],
    stack_pointers: [u16; 4],
    psw: Psw,
}

impl RegisterFile {
    /// Creates a zeroed register file with the given initial status word.
    #[must_use]
    pub fn with_psw(raw: u16) -> Self {
        let mut regs = Self::default();
        regs.set_psw(raw);
        regs
    }

    /// Reads a general-purpose register.
    #[must_use]
    pub const fn gpr(&self, reg: GeneralRegister) -> u16 {
        self.live[reg.index()]
    }

    /// Writes a general-purpose register.
    pub const fn set_gpr(&mut self, reg: GeneralRegister, value: u16) {
        self.live[reg.index()] = value;
    }

    /// Reads the program counter.
    #[must_use]
    pub const fn pc(&self) -> u16 {
        self.live[GeneralRegister::PC.index()]
    }

    /// Writes the program counter.
    pub const fn set_pc(&mut self, value: u16) {
        self.live[GeneralRegister::PC.index()] = value;
    }

    /// Reads the stack pointer of the current mode.
    #[must_use]
    pub const fn sp(&self) -> u16 {
        self.live[GeneralRegister::SP.index()]
    }

    /// Writes the stack pointer of the current mode.
    pub const fn set_sp(&mut self, value: u16) {
        self.live[GeneralRegister::SP.index()] = value;
    }

    /// Processor status word.
    #[must_use]
    pub const fn psw(&self) -> Psw {
        self.psw
    }

    /// Mutable access to the condition codes and priority.
    ///
    /// Register-set and mode bits changed through this handle do not move the
    /// banks; use [`RegisterFile::set_psw`] for that.
    pub const fn psw_mut(&mut self) -> &mut Psw {
        &mut self.psw
    }

    /// Replaces the whole status word, switching register set and stack
    /// pointer when those fields change.
    pub fn set_psw(&mut self, raw: u16) {
        let next = Psw::from_raw(raw);
        self.select_register_set(next.register_set());
        self.switch_mode(next.current_mode());
        self.psw = next;
    }

    /// Selects the primary (`false`) or alternate (`true`) register set.
    pub fn select_register_set(&mut self, alternate: bool) {
        if self.psw.register_set() == alternate {
            return;
        }
        for (live, shadow) in self.live.iter_mut().zip(self.shadow.iter_mut()) {
            std::mem::swap(live, shadow);
        }
        self.psw.set_register_set(alternate);
    }

    /// Enters `mode`, banking the outgoing stack pointer.
    pub fn switch_mode(&mut self, mode: ProcessorMode) {
        let current = self.psw.current_mode();
        if current == mode {
            return;
        }
        self.stack_pointers[current.index()] = self.sp();
        self.set_sp(self.stack_pointers[mode.index()]);
        self.psw.set_current_mode(mode);
    }

    /// Banked stack pointer of `mode`. For the current mode this is the live `R6`.
    #[must_use]
    pub const fn stack_pointer(&self, mode: ProcessorMode) -> u16 {
        if mode as u8 == self.psw.current_mode() as u8 {
            self.sp()
        } else {
            self.stack_pointers[mode.index()]
        }
    }
}

impl fmt::Display for RegisterFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for reg in GeneralRegister::ALL {
            write!(f, "{}={:06o} ", reg.name(), self.gpr(reg))?;
        }
        write!(f, "psw={}", self.psw)
    }
}
