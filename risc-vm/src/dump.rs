//! Post-mortem rendering of a CPU state.

use std::fmt;

use crate::cpu::{CpuState, Flag};
use crate::decoder::Register;
use crate::NUM_REGS;

const REGS_PER_ROW: usize = 4;

/// Read-only view that renders `pc`, `ir`, every register and the named
/// flags. The output is deterministic for a given state.
pub struct Dump<'a>(pub &'a CpuState);

impl fmt::Display for Dump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cpu = self.0;
        writeln!(f, "pc   {:#06x}  ir {:#010x}", cpu.pc(), cpu.ir())?;

        for row in 0..NUM_REGS / REGS_PER_ROW {
            for col in 0..REGS_PER_ROW {
                let index = row * REGS_PER_ROW + col;
                let reg = Register::from_u8(index as u8).ok_or(fmt::Error)?;
                if col > 0 {
                    write!(f, "  ")?;
                }
                write!(f, "{:<4} {:#06x}", reg.to_string(), cpu.read_reg(reg))?;
            }
            writeln!(f)?;
        }

        write!(f, "flags")?;
        for flag in Flag::ALL {
            let state = if cpu.flag(flag) { "set" } else { "clear" };
            write!(f, "  {}={}", flag.name(), state)?;
        }
        writeln!(f)
    }
}

impl CpuState {
    pub fn dump(&self) -> String {
        Dump(self).to_string()
    }
}
