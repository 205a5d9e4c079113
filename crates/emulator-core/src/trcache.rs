//! Lazy translation cache.
//!
//! One entry per aligned core word. An entry starts as [`Entry::Miss`]; the
//! first dispatch at that address classifies the opcode once and binds a
//! [`Thunk`] holding the resolved handler. Later dispatches at the same
//! address run the thunk directly. Entries are never invalidated, so code
//! that rewrites itself keeps running the instruction first bound there.
//!
//! Addresses without an entry (odd, beyond the cache, or not readable from
//! the machine's core) run through the interpreter path, where the opcode
//! fetch raises the trap.

use thiserror::Error;

use crate::api::{stop_on_trap, Machine, RunOutcome, StepOutcome};
use crate::encoding::{classify_opcode, OpcodeEncoding};
use crate::execute::{handler_for, Handler};
use crate::TrapReport;

/// An instruction bound to its handler.
#[derive(Clone, Copy)]
pub struct Thunk {
    encoding: OpcodeEncoding,
    handler: Handler,
}

impl std::fmt::Debug for Thunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Thunk")
            .field("encoding", &self.encoding)
            .finish_non_exhaustive()
    }
}

impl Thunk {
    /// Classifies `opcode` and binds its handler.
    #[must_use]
    pub fn compile(opcode: u16) -> Self {
        let encoding = classify_opcode(opcode);
        Self {
            encoding,
            handler: handler_for(encoding),
        }
    }

    /// Encoding the thunk was bound for.
    #[must_use]
    pub const fn encoding(&self) -> OpcodeEncoding {
        self.encoding
    }

    /// Fetches the opcode at the program counter and runs the bound handler.
    ///
    /// # Errors
    ///
    /// [`Escape`] carrying the trap raised by the fetch or the handler.
    pub fn invoke(&self, machine: &mut Machine) -> Result<(), Escape> {
        let (pc, opcode) = machine.fetch_opcode()?;
        machine.trace(pc, opcode);
        let result = (self.handler)(machine, opcode);
        match machine.complete(pc, opcode, result) {
            StepOutcome::Retired => Ok(()),
            StepOutcome::Trapped(report) => Err(Escape(report)),
        }
    }
}

/// Trap leaving cached execution for the driving loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[error("{} trap at {:06o}", .0.kind, .0.pc)]
pub struct Escape(pub TrapReport);

impl From<TrapReport> for Escape {
    fn from(report: TrapReport) -> Self {
        Self(report)
    }
}

/// Cache slot for one core word.
#[derive(Debug, Clone, Copy, Default)]
pub enum Entry {
    /// Not yet translated.
    #[default]
    Miss,
    /// Translated.
    Bound(Thunk),
}

/// Dispatch counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CacheStats {
    /// Dispatches that ran an already bound thunk.
    pub hits: u64,
    /// Dispatches that bound a new thunk.
    pub misses: u64,
    /// Dispatches at addresses without an entry.
    pub uncached: u64,
}

impl CacheStats {
    /// Entries bound so far. Every miss binds exactly one entry.
    #[must_use]
    pub const fn bound(&self) -> u64 {
        self.misses
    }
}

/// Translation cache covering a machine's core.
#[derive(Debug)]
pub struct TranslationCache {
    entries: Vec<Entry>,
    stats: CacheStats,
}

impl TranslationCache {
    /// Creates an empty cache sized to `machine`'s core.
    #[must_use]
    pub fn for_machine(machine: &Machine) -> Self {
        Self {
            entries: vec![Entry::Miss; machine.memory.core_len() / 2],
            stats: CacheStats::default(),
        }
    }

    /// Dispatch counters.
    #[must_use]
    pub const fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Encoding bound at `addr`, if that entry has been translated.
    #[must_use]
    pub fn bound_encoding(&self, addr: u16) -> Option<OpcodeEncoding> {
        match self.slot(addr).and_then(|slot| self.entries.get(slot)) {
            Some(Entry::Bound(thunk)) => Some(thunk.encoding()),
            _ => None,
        }
    }

    fn slot(&self, addr: u16) -> Option<usize> {
        let slot = usize::from(addr >> 1);
        (addr & 1 == 0 && slot < self.entries.len()).then_some(slot)
    }

    /// Runs the instruction at the program counter, binding it first on a miss.
    ///
    /// While a trap is pending nothing executes and the pending report escapes
    /// again. Addresses this cache has no entry for, or whose opcode cannot be
    /// read from core, run through [`Machine::step`] without binding.
    ///
    /// # Errors
    ///
    /// [`Escape`] when the instruction traps or a trap is already pending.
    pub fn dispatch(&mut self, machine: &mut Machine) -> Result<(), Escape> {
        if let Some(report) = machine.traps.pending() {
            return Err(Escape(report));
        }
        let pc = machine.registers.pc();
        let thunk = match self.slot(pc).map(|slot| (slot, self.entries[slot])) {
            Some((_, Entry::Bound(thunk))) => {
                self.stats.hits += 1;
                thunk
            }
            Some((slot, Entry::Miss)) => {
                let Some(opcode) = machine.memory.peek_word(pc) else {
                    return self.interpret(machine);
                };
                let thunk = Thunk::compile(opcode);
                log::debug!(
                    "bound {pc:06o}: {opcode:06o} {}",
                    thunk.encoding().mnemonic()
                );
                self.entries[slot] = Entry::Bound(thunk);
                self.stats.misses += 1;
                thunk
            }
            None => return self.interpret(machine),
        };
        thunk.invoke(machine)
    }

    fn interpret(&mut self, machine: &mut Machine) -> Result<(), Escape> {
        self.stats.uncached += 1;
        match machine.step() {
            StepOutcome::Retired => Ok(()),
            StepOutcome::Trapped(report) => Err(Escape(report)),
        }
    }

    /// Executes one instruction through the cache.
    ///
    /// While a trap is pending nothing executes and the pending report is
    /// returned again.
    pub fn step(&mut self, machine: &mut Machine) -> StepOutcome {
        match self.dispatch(machine) {
            Ok(()) => StepOutcome::Retired,
            Err(Escape(report)) => StepOutcome::Trapped(report),
        }
    }

    /// Dispatches until a trap escapes or the machine's step limit is reached.
    pub fn run(&mut self, machine: &mut Machine) -> RunOutcome {
        let limit = machine.config().step_limit;
        let mut steps = 0;
        loop {
            if limit.is_some_and(|limit| steps >= limit) {
                return machine.stop_at_limit(steps);
            }
            match self.dispatch(machine) {
                Ok(()) => steps += 1,
                Err(Escape(report)) => return stop_on_trap(steps, report),
            }
        }
    }
}
