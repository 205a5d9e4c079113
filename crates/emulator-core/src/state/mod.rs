//! Architectural CPU state model primitives.

/// Floating-point status word mode bits.
pub mod fpu;
/// Processor status word layout and accessors.
pub mod psw;
/// General register file with banked registers and stack pointers.
pub mod registers;

pub use fpu::{FpuStatus, FPS_FD, FPS_FL};
pub use psw::{
    ProcessorMode, Psw, PSW_C, PSW_CONDITION_MASK, PSW_N, PSW_REGISTER_SET, PSW_T, PSW_V, PSW_Z,
};
pub use registers::{GeneralRegister, RegisterFile, GENERAL_REGISTER_COUNT};
