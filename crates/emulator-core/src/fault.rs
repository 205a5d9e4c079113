use thiserror::Error;

/// Processor trap taxonomy. Each kind owns a fixed low-memory vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum TrapKind {
    /// Trap reserved for user devices.
    #[error("user device")]
    UserDevice,
    /// Word access or instruction fetch at an odd address.
    #[error("odd address")]
    OddAddress,
    /// Unknown, halting, or not-yet-implemented instruction.
    #[error("illegal instruction")]
    IllegalInstruction,
    /// Kernel stack pushed below its red zone.
    #[error("stack red zone")]
    StackRedZone,
    /// Reserved instruction encoding.
    #[error("reserved instruction")]
    ReservedInstruction,
    /// Breakpoint or trace trap.
    #[error("trace")]
    Trace,
    /// `iot` instruction.
    #[error("iot")]
    Iot,
    /// Power failure.
    #[error("power fail")]
    PowerFail,
    /// `emt` instruction.
    #[error("emt")]
    Emt,
    /// `trap` instruction.
    #[error("trap")]
    Trap,
    /// Access to an address backed by neither core nor a device.
    #[error("memory management")]
    MemoryManagement,
}

impl TrapKind {
    /// Every trap kind, in vector order.
    pub const ALL: [Self; 11] = [
        Self::UserDevice,
        Self::OddAddress,
        Self::IllegalInstruction,
        Self::StackRedZone,
        Self::ReservedInstruction,
        Self::Trace,
        Self::Iot,
        Self::PowerFail,
        Self::Emt,
        Self::Trap,
        Self::MemoryManagement,
    ];

    /// Returns the low-memory vector address serviced by this trap kind.
    ///
    /// Odd address, illegal instruction and stack red zone share the bus
    /// error vector.
    #[must_use]
    pub const fn vector(self) -> u16 {
        match self {
            Self::UserDevice => 0o000,
            Self::OddAddress | Self::IllegalInstruction | Self::StackRedZone => 0o004,
            Self::ReservedInstruction => 0o010,
            Self::Trace => 0o014,
            Self::Iot => 0o020,
            Self::PowerFail => 0o024,
            Self::Emt => 0o030,
            Self::Trap => 0o034,
            Self::MemoryManagement => 0o250,
        }
    }

    /// Returns the short diagnostic name of this trap kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::UserDevice => "user device",
            Self::OddAddress => "odd address",
            Self::IllegalInstruction => "illegal instruction",
            Self::StackRedZone => "stack red zone",
            Self::ReservedInstruction => "reserved instruction",
            Self::Trace => "trace",
            Self::Iot => "iot",
            Self::PowerFail => "power fail",
            Self::Emt => "emt",
            Self::Trap => "trap",
            Self::MemoryManagement => "memory management",
        }
    }
}

/// A raised trap together with the instruction that raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct TrapReport {
    /// Trap kind.
    pub kind: TrapKind,
    /// Address of the instruction that was executing.
    pub pc: u16,
    /// Opcode word, absent when the fetch itself trapped.
    pub opcode: Option<u16>,
}

impl TrapReport {
    /// Vector address serviced by this report's trap kind.
    #[must_use]
    pub const fn vector(&self) -> u16 {
        self.kind.vector()
    }
}

/// Holds at most one pending trap.
///
/// Once a trap is pending it stays latched until [`TrapController::clear`] is
/// called; further raises are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrapController {
    pending: Option<TrapReport>,
}

impl TrapController {
    /// Creates a controller with nothing pending.
    #[must_use]
    pub const fn new() -> Self {
        Self { pending: None }
    }

    /// Latches a trap and returns the pending report.
    ///
    /// When a trap is already pending the first one wins and is returned.
    pub fn raise(&mut self, kind: TrapKind, pc: u16, opcode: Option<u16>) -> TrapReport {
        if let Some(existing) = self.pending {
            log::warn!(
                "{} trap at {pc:06o} while {} is still pending",
                kind.name(),
                existing.kind.name()
            );
            return existing;
        }
        let report = TrapReport { kind, pc, opcode };
        self.pending = Some(report);
        report
    }

    /// Whether a trap is pending.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Pending trap report, if any.
    #[must_use]
    pub const fn pending(&self) -> Option<TrapReport> {
        self.pending
    }

    /// Pending trap kind, if any.
    #[must_use]
    pub fn pending_kind(&self) -> Option<TrapKind> {
        self.pending.map(|report| report.kind)
    }

    /// Clears and returns the pending trap.
    pub fn clear(&mut self) -> Option<TrapReport> {
        self.pending.take()
    }
}
