//! Files seeded into the filesystem at start-up.
//!
//! Images use absolute jump targets, so they are built for the origin the
//! shell loads programs at.

use risc_vm::decoder::{AluOp, Cond, Op, Register};
use risc_vm::isa::{self, INSN_WIDTH};
use risc_vm::MEMORY_SIZE;

use crate::vfs::{FsError, Vfs};

const README: &str = "\
vunix: a toy single-user environment.

Programs are flat images of 32-bit little-endian instruction words
loaded at the shell's origin. Try:

  exec sum.out       adds 1..10 into r2 and halts
  exec -d sum.out    same, tracing every instruction
  exec spin.out      loops until the step limit
  exec fault.out     hits an invalid opcode
";

/// Address of instruction `n` in an image loaded at `origin`.
fn at(origin: u16, n: u16) -> u16 {
    origin.wrapping_add(n * INSN_WIDTH)
}

/// Sum 1..=10 into r2 through a subroutine.
pub fn sum(origin: u16) -> Vec<u8> {
    let program = [
        Op::Ldi { rd: Register::SP, imm: MEMORY_SIZE as u16 },
        Op::Ldi { rd: Register::R1, imm: 10 },
        Op::Ldi { rd: Register::R2, imm: 0 },
        Op::Call { target: at(origin, 6) },
        Op::Mov { rd: Register::R0, rs: Register::R2 },
        Op::Halt,
        // accumulate:
        Op::Alu { op: AluOp::Add, rd: Register::R2, rs1: Register::R2, rs2: Register::R1 },
        Op::AluImm { op: AluOp::Sub, rd: Register::R1, imm: 1 },
        Op::Jump { cond: Cond::NotZero, target: at(origin, 6) },
        Op::Ret,
    ];
    isa::image(&program).unwrap_or_default()
}

/// Jump to itself forever.
pub fn spin(origin: u16) -> Vec<u8> {
    isa::image(&[Op::Jump { cond: Cond::Always, target: origin }]).unwrap_or_default()
}

/// One good instruction followed by an undefined opcode.
pub fn fault() -> Vec<u8> {
    let mut bytes = isa::image(&[Op::Ldi { rd: Register::R1, imm: 0xbad }]).unwrap_or_default();
    bytes.extend_from_slice(&[0xff, 0, 0, 0]);
    bytes
}

pub fn install(vfs: &mut Vfs, origin: u16) -> Result<(), FsError> {
    vfs.create("readme", README)?;
    vfs.create("sum.out", sum(origin))?;
    vfs.create("spin.out", spin(origin))?;
    vfs.create("fault.out", fault())?;
    vfs.mkdir("bin")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use risc_vm::{CpuState, ExecStatus, Fault};

    fn run(image: &[u8], origin: u16) -> (CpuState, ExecStatus) {
        let mut cpu = CpuState::new(origin);
        cpu.load_image(image, origin).unwrap();
        let status = cpu
            .run(
                &risc_vm::ExecOptions {
                    max_steps: Some(10_000),
                    ..Default::default()
                },
                &mut risc_vm::LogTracer,
            )
            .status;
        (cpu, status)
    }

    #[test]
    fn sum_at_any_origin() {
        for origin in [0u16, 0x0200, 0x1000] {
            let (cpu, status) = run(&sum(origin), origin);
            assert_eq!(status, ExecStatus::Halted);
            assert_eq!(cpu.read_reg(Register::R2), 55);
            assert_eq!(cpu.read_reg(Register::R0), 55);
        }
    }

    #[test]
    fn spin_never_halts() {
        let (_, status) = run(&spin(0x40), 0x40);
        assert_eq!(status, ExecStatus::StepLimitExceeded);
    }

    #[test]
    fn fault_hits_invalid_opcode() {
        let (cpu, status) = run(&fault(), 0);
        assert_eq!(status, ExecStatus::Faulted(Fault::InvalidOpcode(0xff)));
        assert_eq!(cpu.pc(), 4);
    }
}
