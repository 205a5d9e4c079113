use std::fmt;

/// `PSW` bit for carry/borrow.
pub const PSW_C: u16 = 1 << 0;
/// `PSW` bit for signed overflow.
pub const PSW_V: u16 = 1 << 1;
/// `PSW` bit for zero result.
pub const PSW_Z: u16 = 1 << 2;
/// `PSW` bit for negative result.
pub const PSW_N: u16 = 1 << 3;
/// `PSW` bit for trace trap enable.
pub const PSW_T: u16 = 1 << 4;
/// Mask of the four condition codes (`C/V/Z/N`).
pub const PSW_CONDITION_MASK: u16 = PSW_C | PSW_V | PSW_Z | PSW_N;
/// `PSW` bit selecting the alternate general register set.
pub const PSW_REGISTER_SET: u16 = 1 << 11;

const PRIORITY_SHIFT: u16 = 5;
const PRIORITY_MASK: u16 = 0o7 << PRIORITY_SHIFT;
const PREVIOUS_MODE_SHIFT: u16 = 12;
const PREVIOUS_MODE_MASK: u16 = 0b11 << PREVIOUS_MODE_SHIFT;
const CURRENT_MODE_SHIFT: u16 = 14;
const CURRENT_MODE_MASK: u16 = 0b11 << CURRENT_MODE_SHIFT;

/// Processor privilege mode, as stored in the two-bit `PSW` mode fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum ProcessorMode {
    /// Kernel mode.
    Kernel = 0,
    /// Supervisor mode.
    Supervisor = 1,
    /// Unused mode encoding. Keeps its own stack pointer.
    Reserved = 2,
    /// User mode.
    User = 3,
}

impl ProcessorMode {
    /// Decodes a two-bit mode field.
    #[must_use]
    pub const fn from_bits(bits: u16) -> Self {
        match bits & 0b11 {
            0 => Self::Kernel,
            1 => Self::Supervisor,
            2 => Self::Reserved,
            _ => Self::User,
        }
    }

    /// Index of the banked stack pointer for this mode.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Processor status word.
///
/// Layout, low to high: `C V Z N T`, three priority bits, three unused bits,
/// the register-set select bit, then the previous and current mode fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Psw(u16);

impl Psw {
    /// Wraps a raw status word.
    #[must_use]
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    /// Raw status word.
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Returns `true` when every bit of `mask` is set.
    #[must_use]
    pub const fn flag(self, mask: u16) -> bool {
        self.0 & mask == mask
    }

    /// Sets or clears the bits of `mask`.
    pub const fn set_flag(&mut self, mask: u16, enabled: bool) {
        if enabled {
            self.0 |= mask;
        } else {
            self.0 &= !mask;
        }
    }

    /// Carry flag.
    #[must_use]
    pub const fn c(self) -> bool {
        self.flag(PSW_C)
    }

    /// Overflow flag.
    #[must_use]
    pub const fn v(self) -> bool {
        self.flag(PSW_V)
    }

    /// Zero flag.
    #[must_use]
    pub const fn z(self) -> bool {
        self.flag(PSW_Z)
    }

    /// Negative flag.
    #[must_use]
    pub const fn n(self) -> bool {
        self.flag(PSW_N)
    }

    /// Trace flag.
    #[must_use]
    pub const fn t(self) -> bool {
        self.flag(PSW_T)
    }

    /// Processor priority, `0..=7`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn priority(self) -> u8 {
        ((self.0 & PRIORITY_MASK) >> PRIORITY_SHIFT) as u8
    }

    /// Replaces the priority field with the low three bits of `level`.
    pub const fn set_priority(&mut self, level: u8) {
        self.0 = (self.0 & !PRIORITY_MASK) | (((level as u16) << PRIORITY_SHIFT) & PRIORITY_MASK);
    }

    /// Whether the alternate register set is selected.
    #[must_use]
    pub const fn register_set(self) -> bool {
        self.flag(PSW_REGISTER_SET)
    }

    pub(crate) const fn set_register_set(&mut self, alternate: bool) {
        self.set_flag(PSW_REGISTER_SET, alternate);
    }

    /// Mode the processor is executing in.
    #[must_use]
    pub const fn current_mode(self) -> ProcessorMode {
        ProcessorMode::from_bits(self.0 >> CURRENT_MODE_SHIFT)
    }

    pub(crate) const fn set_current_mode(&mut self, mode: ProcessorMode) {
        self.0 = (self.0 & !CURRENT_MODE_MASK) | ((mode as u16) << CURRENT_MODE_SHIFT);
    }

    /// Mode the processor was in before the last mode change.
    #[must_use]
    pub const fn previous_mode(self) -> ProcessorMode {
        ProcessorMode::from_bits(self.0 >> PREVIOUS_MODE_SHIFT)
    }

    /// Replaces the previous mode field.
    pub const fn set_previous_mode(&mut self, mode: ProcessorMode) {
        self.0 = (self.0 & !PREVIOUS_MODE_MASK) | ((mode as u16) << PREVIOUS_MODE_SHIFT);
    }
}

impl fmt::Display for Psw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |set: bool, name: char| if set { name } else { '-' };
        write!(
            f,
            "{:06o} [{}{}{}{}{}]",
            self.0,
            flag(self.t(), 'T'),
            flag(self.n(), 'N'),
            flag(self.z(), 'Z'),
            flag(self.v(), 'V'),
            flag(self.c(), 'C'),
        )
    }
}
