use thiserror::Error;

use crate::{MEMORY_SIZE, VmError};

/// Memory access errors.
///
/// These are mapped into engine faults (`Fault`) by the CPU and into
/// `VmError` by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("Out-of-bounds memory access at {0:#06x}")]
    OutOfBounds(u16),
}

/// Fixed-size guest memory owned by exactly one CPU state.
///
/// Every access is bounds-checked against [`MEMORY_SIZE`] and either
/// completes in full or fails without touching any byte. Multi-byte values
/// are little-endian and need no alignment.
pub struct Memory {
    data: Box<[u8]>,
}

impl Memory {
    /// Create a zero-initialised memory of [`MEMORY_SIZE`] bytes.
    pub fn new() -> Self {
        Self {
            data: vec![0; MEMORY_SIZE].into_boxed_slice(),
        }
    }

    /// Size of memory in bytes.
    #[inline(always)]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Byte range `[addr, addr + len)` as indices, or `None` if any byte lies
    /// outside memory.
    #[inline(always)]
    fn range(&self, addr: u16, len: usize) -> Option<std::ops::Range<usize>> {
        let start = addr as usize;
        let end = start.checked_add(len)?;
        if end <= self.data.len() {
            Some(start..end)
        } else {
            None
        }
    }

    // ========== READ METHODS ==========

    #[inline(always)]
    pub fn read_byte(&self, addr: u16) -> Result<u8, MemoryError> {
        self.data
            .get(addr as usize)
            .copied()
            .ok_or(MemoryError::OutOfBounds(addr))
    }

    /// Read a 16-bit little-endian value (data loads and stack slots).
    #[inline(always)]
    pub fn read_half(&self, addr: u16) -> Result<u16, MemoryError> {
        let r = self.range(addr, 2).ok_or(MemoryError::OutOfBounds(addr))?;
        let bytes = &self.data[r];
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Read a 32-bit little-endian word (instruction fetch).
    #[inline(always)]
    pub fn read_word(&self, addr: u16) -> Result<u32, MemoryError> {
        let r = self.range(addr, 4).ok_or(MemoryError::OutOfBounds(addr))?;
        let bytes = &self.data[r];
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    // ========== WRITE METHODS ==========

    #[inline(always)]
    pub fn write_byte(&mut self, addr: u16, value: u8) -> Result<(), MemoryError> {
        let slot = self
            .data
            .get_mut(addr as usize)
            .ok_or(MemoryError::OutOfBounds(addr))?;
        *slot = value;
        Ok(())
    }

    #[inline(always)]
    pub fn write_half(&mut self, addr: u16, value: u16) -> Result<(), MemoryError> {
        let r = self.range(addr, 2).ok_or(MemoryError::OutOfBounds(addr))?;
        self.data[r].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    #[inline(always)]
    pub fn write_word(&mut self, addr: u16, value: u32) -> Result<(), MemoryError> {
        let r = self.range(addr, 4).ok_or(MemoryError::OutOfBounds(addr))?;
        self.data[r].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Write an arbitrary slice into memory starting at `addr`.
    pub fn write_bytes(&mut self, addr: u16, bytes: &[u8]) -> Result<(), MemoryError> {
        let r = self
            .range(addr, bytes.len())
            .ok_or(MemoryError::OutOfBounds(addr))?;
        self.data[r].copy_from_slice(bytes);
        Ok(())
    }

    // ========== SNAPSHOT HELPERS ==========

    /// Whole memory contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Replace all memory contents (for snapshot restore).
    pub fn set_data(&mut self, data: &[u8]) -> Result<(), VmError> {
        if data.len() != self.data.len() {
            return Err(VmError::SizeMismatch {
                expected: self.data.len(),
                actual: data.len(),
            });
        }
        self.data.copy_from_slice(data);
        Ok(())
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}
