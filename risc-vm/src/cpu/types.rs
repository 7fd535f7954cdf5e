use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::memory::MemoryError;

/// Condition-code bits of the flag register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Flag {
    /// Result was zero.
    Zero = 1 << 0,
    /// Unsigned overflow or borrow.
    Carry = 1 << 1,
    /// High bit of the result was set.
    Sign = 1 << 2,
}

impl Flag {
    pub const ALL: [Flag; 3] = [Flag::Zero, Flag::Carry, Flag::Sign];

    #[inline]
    pub fn bit(self) -> u16 {
        self as u16
    }

    pub fn name(self) -> &'static str {
        match self {
            Flag::Zero => "zero",
            Flag::Carry => "carry",
            Flag::Sign => "sign",
        }
    }
}

/// 16-bit flag register. Only the bits named by [`Flag`] are ever set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flags(u16);

impl Flags {
    const DEFINED: u16 = Flag::Zero as u16 | Flag::Carry as u16 | Flag::Sign as u16;

    /// Build from raw bits; reserved bits are dropped.
    pub fn from_bits(bits: u16) -> Self {
        Flags(bits & Self::DEFINED)
    }

    /// Flags produced by an arithmetic result.
    pub fn from_result(result: u16, carry: bool) -> Self {
        let mut flags = Flags::default();
        flags.set(Flag::Zero, result == 0);
        flags.set(Flag::Sign, result & 0x8000 != 0);
        flags.set(Flag::Carry, carry);
        flags
    }

    #[inline]
    pub fn bits(self) -> u16 {
        self.0
    }

    #[inline]
    pub fn is_set(self, flag: Flag) -> bool {
        self.0 & flag.bit() != 0
    }

    pub fn set(&mut self, flag: Flag, on: bool) {
        if on {
            self.0 |= flag.bit();
        } else {
            self.0 &= !flag.bit();
        }
    }
}

impl std::fmt::Display for Flags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let z = if self.is_set(Flag::Zero) { 'Z' } else { '-' };
        let c = if self.is_set(Flag::Carry) { 'C' } else { '-' };
        let s = if self.is_set(Flag::Sign) { 'S' } else { '-' };
        write!(f, "{z}{c}{s}")
    }
}

/// Terminal fault raised by the fetch-decode-execute engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum Fault {
    #[error("out-of-bounds memory access at {0:#06x}")]
    OutOfBounds(u16),

    #[error("invalid register index {0}")]
    InvalidRegister(u8),

    #[error("invalid opcode {0:#04x}")]
    InvalidOpcode(u8),
}

impl From<MemoryError> for Fault {
    fn from(err: MemoryError) -> Self {
        match err {
            MemoryError::OutOfBounds(addr) => Fault::OutOfBounds(addr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_result_sets_zero_and_sign() {
        let f = Flags::from_result(0, false);
        assert!(f.is_set(Flag::Zero));
        assert!(!f.is_set(Flag::Sign));
        assert!(!f.is_set(Flag::Carry));

        let f = Flags::from_result(0x8001, true);
        assert!(!f.is_set(Flag::Zero));
        assert!(f.is_set(Flag::Sign));
        assert!(f.is_set(Flag::Carry));
    }

    #[test]
    fn reserved_bits_are_masked() {
        assert_eq!(Flags::from_bits(0xffff).bits(), 0b111);
    }

    #[test]
    fn display_marks_set_bits() {
        assert_eq!(Flags::from_bits(0b101).to_string(), "Z-S");
        assert_eq!(Flags::default().to_string(), "---");
    }
}
