//! Core emulator crate for a PDP-11-class 16-bit processor.
//!
//! [`Machine`] owns the register file, core memory and attached devices.
//! Instructions run either through the interpreter ([`Machine::step`],
//! [`Machine::run`]) or through a [`TranslationCache`], with identical
//! observable results.

/// Memory model: core, I/O page map and device registry.
pub mod memory;
pub use memory::{
    decode_memory_region, AttachError, Byte, DataWidth, Device, ImageLoadError, Memory,
    MemoryRegion, Word, IO_PAGE_START, MAX_CORE_BYTES,
};

/// Host-facing machine API.
pub mod api;
pub use api::{Machine, MachineConfig, RunOutcome, StepOutcome, StopReason};

/// Architectural state: registers and processor status word.
pub mod state;
pub use state::{FpuStatus, GeneralRegister, ProcessorMode, Psw, RegisterFile};

/// Opcode classification tables.
pub mod encoding;
pub use encoding::{classify_opcode, OpcodeEncoding, OperandFormat, DISPATCH_LAYERS};

/// Instruction decoder.
pub mod decoder;
pub use decoder::{AddrOp, AddressingMode, DecodedInstruction, Decoder, Operands};

/// Trap taxonomy and pending-trap latch.
pub mod fault;
pub use fault::{TrapController, TrapKind, TrapReport};

/// Instruction execution.
pub mod execute;
pub use execute::{execute_instruction, handler_for, FlagsUpdate, Handler, Location};

/// Lazy translation cache.
pub mod trcache;
pub use trcache::{CacheStats, Escape, Thunk, TranslationCache};

/// Disassembler.
pub mod disasm;
pub use disasm::{disassemble_one, disassemble_range, disassemble_word, DisassemblyRow};

/// I/O page devices.
pub mod peripherals;
pub use peripherals::{Dl11, DL11_BASE, DL11_LEN};

#[cfg(test)]
use proptest as _;
