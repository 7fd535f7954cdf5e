use thiserror::Error;

use crate::memory::MemoryError;

/// Errors reported synchronously by the loader, the process table and
/// snapshot handling. All of them are recoverable by the caller.
#[derive(Debug, Error)]
pub enum VmError {
    #[error("image of {len} bytes does not fit at {origin:#06x} ({available} bytes available)")]
    ImageTooLarge {
        len: usize,
        origin: u16,
        available: usize,
    },

    #[error("process table is full ({0} slots in use)")]
    CapacityExceeded(usize),

    #[error("memory image is {actual} bytes (expected {expected})")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("no process in slot {0}")]
    InvalidSlot(usize),

    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error("snapshot rejected: {0}")]
    Snapshot(String),

    #[error("snapshot encoding failed: {0}")]
    Encoding(#[from] bincode::Error),
}
