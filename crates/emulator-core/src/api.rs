//! Host-facing machine API: configuration, construction, stepping and running.

use crate::disasm::disassemble_word;
use crate::encoding::classify_opcode;
use crate::execute::handler_for;
use crate::memory::{AttachError, Device, ImageLoadError, Memory, Word, MAX_CORE_BYTES};
use crate::state::{FpuStatus, RegisterFile};
use crate::{TrapController, TrapKind, TrapReport};

/// Top-level configuration for a machine instance.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MachineConfig {
    /// Core memory size in bytes. Clamped to the start of the I/O page.
    pub core_bytes: usize,
    /// Status word loaded at construction.
    pub initial_psw: u16,
    /// Stop a run after this many retired instructions.
    pub step_limit: Option<u64>,
    /// Emits a `trace` log record for every instruction.
    pub tracing_enabled: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            core_bytes: MAX_CORE_BYTES,
            initial_psw: 0,
            step_limit: None,
            tracing_enabled: false,
        }
    }
}

/// Result of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepOutcome {
    /// The instruction completed.
    Retired,
    /// A trap is pending, either raised by this step or left from an earlier one.
    Trapped(TrapReport),
}

impl StepOutcome {
    /// Whether the step ended in a trap.
    #[must_use]
    pub const fn is_trap(&self) -> bool {
        matches!(self, Self::Trapped(_))
    }
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// A trap was raised.
    Trap(TrapReport),
    /// The configured step limit was reached.
    StepLimit,
}

/// Aggregated outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunOutcome {
    /// Instructions retired during this run.
    pub steps: u64,
    /// Why the run stopped.
    pub stop: StopReason,
}

impl RunOutcome {
    /// Trap that stopped the run, if any.
    #[must_use]
    pub const fn trap(&self) -> Option<TrapReport> {
        match self.stop {
            StopReason::Trap(report) => Some(report),
            StopReason::StepLimit => None,
        }
    }
}

/// One emulated processor with its memory and devices.
#[derive(Debug)]
pub struct Machine {
    /// Register file and status word.
    pub registers: RegisterFile,
    /// Core and attached devices.
    pub memory: Memory,
    /// Pending trap.
    pub traps: TrapController,
    /// Floating-point mode bits.
    pub fpu: FpuStatus,
    config: MachineConfig,
    retired: u64,
}

impl Default for Machine {
    fn default() -> Self {
        Self::with_config(&MachineConfig::default())
    }
}

impl Machine {
    /// Creates a machine with zeroed core and registers.
    #[must_use]
    pub fn with_config(config: &MachineConfig) -> Self {
        Self {
            registers: RegisterFile::with_psw(config.initial_psw),
            memory: Memory::new(config.core_bytes),
            traps: TrapController::new(),
            fpu: FpuStatus::default(),
            config: config.clone(),
            retired: 0,
        }
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Instructions retired since construction, across every execution path.
    #[must_use]
    pub const fn retired(&self) -> u64 {
        self.retired
    }

    /// Copies a program image into core at `base`.
    ///
    /// # Errors
    ///
    /// See [`Memory::load_image`].
    pub fn load_image(&mut self, base: u16, image: &[u8]) -> Result<(), ImageLoadError> {
        self.memory.load_image(base, image)?;
        log::debug!("loaded {} byte image at {base:06o}", image.len());
        Ok(())
    }

    /// Attaches a device to the I/O page.
    ///
    /// # Errors
    ///
    /// See [`crate::memory::DeviceRegistry::attach`].
    pub fn attach(
        &mut self,
        base: u16,
        len: u16,
        device: Box<dyn Device>,
    ) -> Result<(), AttachError> {
        self.memory.attach(base, len, device)
    }

    /// Sets the program counter.
    pub const fn set_pc(&mut self, pc: u16) {
        self.registers.set_pc(pc);
    }

    /// Reads the word at the program counter and advances past it.
    pub(crate) fn fetch_index_word(&mut self) -> Result<u16, TrapKind> {
        let pc = self.registers.pc();
        let word = self.memory.load::<Word>(pc)?;
        self.registers.set_pc(pc.wrapping_add(2));
        Ok(word)
    }

    /// Fetches the opcode at the program counter and advances past it.
    /// Returns the opcode's address with the opcode.
    pub(crate) fn fetch_opcode(&mut self) -> Result<(u16, u16), TrapReport> {
        let pc = self.registers.pc();
        match self.memory.load::<Word>(pc) {
            Ok(opcode) => {
                self.registers.set_pc(pc.wrapping_add(2));
                Ok((pc, opcode))
            }
            Err(kind) => Err(self.traps.raise(kind, pc, None)),
        }
    }

    /// Records the result of running the instruction fetched from `pc`.
    pub(crate) fn complete(
        &mut self,
        pc: u16,
        opcode: u16,
        result: Result<(), TrapKind>,
    ) -> StepOutcome {
        match result {
            Ok(()) => {
                self.retired += 1;
                StepOutcome::Retired
            }
            Err(kind) => StepOutcome::Trapped(self.traps.raise(kind, pc, Some(opcode))),
        }
    }

    pub(crate) fn trace(&self, pc: u16, opcode: u16) {
        if self.config.tracing_enabled && log::log_enabled!(log::Level::Trace) {
            let row = disassemble_word(opcode);
            log::trace!(
                "{pc:06o}: {opcode:06o} {:<6} {:<24} {}",
                row.mnemonic,
                row.operands,
                self.registers
            );
        }
    }

    /// Executes one instruction on the interpreter path.
    ///
    /// While a trap is pending nothing executes and the pending report is
    /// returned again.
    pub fn step(&mut self) -> StepOutcome {
        if let Some(report) = self.traps.pending() {
            return StepOutcome::Trapped(report);
        }
        let (pc, opcode) = match self.fetch_opcode() {
            Ok(fetched) => fetched,
            Err(report) => return StepOutcome::Trapped(report),
        };
        self.trace(pc, opcode);
        let result = handler_for(classify_opcode(opcode))(self, opcode);
        self.complete(pc, opcode, result)
    }

    /// Steps on the interpreter path until a trap or the step limit.
    pub fn run(&mut self) -> RunOutcome {
        let limit = self.config.step_limit;
        let mut steps = 0;
        loop {
            if limit.is_some_and(|limit| steps >= limit) {
                return self.stop_at_limit(steps);
            }
            match self.step() {
                StepOutcome::Retired => steps += 1,
                StepOutcome::Trapped(report) => return stop_on_trap(steps, report),
            }
        }
    }

    pub(crate) fn stop_at_limit(&self, steps: u64) -> RunOutcome {
        log::info!(
            "step limit reached after {steps} instructions at {:06o}",
            self.registers.pc()
        );
        RunOutcome {
            steps,
            stop: StopReason::StepLimit,
        }
    }
}

pub(crate) fn stop_on_trap(steps: u64, report: TrapReport) -> RunOutcome {
    log::info!(
        "{} trap (vector {:03o}) at {:06o} after {steps} instructions",
        report.kind.name(),
        report.vector(),
        report.pc
    );
    RunOutcome {
        steps,
        stop: StopReason::Trap(report),
    }
}
