//! A small 16-bit register machine.
//!
//! Each [`CpuState`] owns [`MEMORY_SIZE`] bytes of memory, sixteen 16-bit
//! registers (register 15 is the stack pointer) and a flag register with
//! zero, carry and sign bits. Flat binary images are loaded verbatim at an
//! origin and run by the fetch-decode-execute engine until they halt, fault,
//! exhaust a step budget or are cancelled. A [`ProcessTable`] holds up to
//! [`MAX_PROCESSES`] independent states.

pub mod cpu;
pub mod decoder;
pub mod dump;
pub mod exec;
pub mod isa;
pub mod memory;
pub mod process;
pub mod snapshot;

mod error;

pub use cpu::{CpuState, Cycle, Fault, Flag, Flags};
pub use decoder::{Op, Register};
pub use dump::Dump;
pub use error::VmError;
pub use exec::{CancelToken, ExecOptions, ExecResult, ExecStatus, LogTracer, TraceRecord, Tracer};
pub use memory::{Memory, MemoryError};
pub use process::{ProcessTable, SlotId};
pub use snapshot::CpuSnapshot;

/// Bytes of memory per CPU state.
pub const MEMORY_SIZE: usize = 16384;

/// General-purpose registers per CPU state.
pub const NUM_REGS: usize = 16;

/// Slots in a [`ProcessTable`].
pub const MAX_PROCESSES: usize = 64;
