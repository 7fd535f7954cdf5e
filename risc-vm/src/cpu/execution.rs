use super::core::{CpuState, check_target};
use super::types::{Fault, Flag, Flags};
use crate::decoder::{self, AluOp, Cond, Op, Register, Width};
use crate::exec::{ExecOptions, ExecResult, ExecStatus, LogTracer, TraceRecord, Tracer};
use crate::isa::INSN_WIDTH;

/// A completed fetch-decode-execute cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cycle {
    /// Program counter the instruction was fetched from.
    pub pc: u16,
    pub ir: u32,
    pub op: Op,
    pub halted: bool,
}

/// Apply an ALU operation, returning the result and the carry-out.
fn alu(op: AluOp, a: u16, b: u16) -> (u16, bool) {
    match op {
        AluOp::Add => a.overflowing_add(b),
        AluOp::Sub => a.overflowing_sub(b),
        AluOp::And => (a & b, false),
        AluOp::Or => (a | b, false),
        AluOp::Xor => (a ^ b, false),
        AluOp::Shl => {
            let n = (b & 0xf) as u32;
            if n == 0 {
                (a, false)
            } else {
                (a << n, (a >> (16 - n)) & 1 == 1)
            }
        }
        AluOp::Shr => {
            let n = (b & 0xf) as u32;
            if n == 0 {
                (a, false)
            } else {
                (a >> n, (a >> (n - 1)) & 1 == 1)
            }
        }
        AluOp::Mul => {
            let wide = a as u32 * b as u32;
            (wide as u16, wide >> 16 != 0)
        }
    }
}

impl CpuState {
    /// Run until halt, fault or cancellation with no step limit, tracing each
    /// cycle to the log when `debug` is set.
    pub fn exec(&mut self, debug: bool) -> ExecResult {
        let options = ExecOptions {
            debug,
            ..ExecOptions::default()
        };
        self.run(&options, &mut LogTracer)
    }

    /// Run the instruction cycle under `options`.
    ///
    /// Cancellation and the step budget are checked before every cycle. A
    /// fault stops the run immediately and is never skipped.
    pub fn run(&mut self, options: &ExecOptions, tracer: &mut dyn Tracer) -> ExecResult {
        let mut steps: u64 = 0;
        let finish = |status, steps| ExecResult { status, steps };

        loop {
            if let Some(cancel) = &options.cancel {
                if cancel.is_cancelled() {
                    log::info!("run cancelled at pc {:#06x} after {} steps", self.pc, steps);
                    return finish(ExecStatus::Cancelled, steps);
                }
            }
            if let Some(max) = options.max_steps {
                if steps >= max {
                    log::info!("step limit {} reached at pc {:#06x}", max, self.pc);
                    return finish(ExecStatus::StepLimitExceeded, steps);
                }
            }

            match self.step() {
                Ok(cycle) => {
                    steps += 1;
                    if options.debug {
                        tracer.record(&TraceRecord::new(&cycle, self.flags));
                    }
                    if cycle.halted {
                        log::debug!("halted at {:#06x} after {} steps", cycle.pc, steps);
                        return finish(ExecStatus::Halted, steps);
                    }
                }
                Err(fault) => {
                    log::warn!("fault at pc {:#06x} (ir {:#010x}): {}", self.pc, self.ir, fault);
                    return finish(ExecStatus::Faulted(fault), steps);
                }
            }
        }
    }

    /// Execute a single fetch-decode-execute cycle.
    ///
    /// On error nothing but `ir` has changed: `pc` still addresses the
    /// faulting instruction.
    pub fn step(&mut self) -> Result<Cycle, Fault> {
        let pc = self.pc;
        let insn = self.memory.read_word(pc)?;
        self.ir = insn;
        let op = decoder::decode(insn)?;

        let mut next_pc = pc.wrapping_add(INSN_WIDTH);
        let mut halted = false;

        match op {
            Op::Halt => halted = true,
            Op::Nop => {}
            Op::Ldi { rd, imm } => self.write_reg(rd, imm),
            Op::Mov { rd, rs } => {
                let val = self.read_reg(rs);
                self.write_reg(rd, val);
            }
            Op::Load { rd, base, offset, width } => {
                let addr = self.effective_address(base, offset);
                let val = match width {
                    Width::Byte => self.memory.read_byte(addr)? as u16,
                    Width::Half => self.memory.read_half(addr)?,
                };
                self.write_reg(rd, val);
            }
            Op::Store { rs, base, offset, width } => {
                let addr = self.effective_address(base, offset);
                let val = self.read_reg(rs);
                match width {
                    Width::Byte => self.memory.write_byte(addr, val as u8)?,
                    Width::Half => self.memory.write_half(addr, val)?,
                }
            }
            Op::Alu { op, rd, rs1, rs2 } => {
                let (result, carry) = alu(op, self.read_reg(rs1), self.read_reg(rs2));
                self.write_reg(rd, result);
                self.flags = Flags::from_result(result, carry);
            }
            Op::AluImm { op, rd, imm } => {
                let (result, carry) = alu(op, self.read_reg(rd), imm);
                self.write_reg(rd, result);
                self.flags = Flags::from_result(result, carry);
            }
            Op::Cmp { rs1, rs2 } => {
                let (result, borrow) = alu(AluOp::Sub, self.read_reg(rs1), self.read_reg(rs2));
                self.flags = Flags::from_result(result, borrow);
            }
            Op::CmpImm { rs1, imm } => {
                let (result, borrow) = alu(AluOp::Sub, self.read_reg(rs1), imm);
                self.flags = Flags::from_result(result, borrow);
            }
            Op::Jump { cond, target } => {
                if self.condition_holds(cond) {
                    check_target(target)?;
                    next_pc = target;
                }
            }
            Op::JumpReg { rs } => {
                let target = self.read_reg(rs);
                check_target(target)?;
                next_pc = target;
            }
            Op::Push { rs } => {
                let val = self.read_reg(rs);
                self.push(val)?;
            }
            Op::Pop { rd } => {
                let val = self.pop()?;
                self.write_reg(rd, val);
            }
            Op::Call { target } => {
                check_target(target)?;
                self.push(next_pc)?;
                next_pc = target;
            }
            Op::Ret => {
                let sp = self.sp();
                let target = self.memory.read_half(sp)?;
                check_target(target)?;
                self.set_sp(sp.wrapping_add(2));
                next_pc = target;
            }
        }

        self.pc = next_pc;
        Ok(Cycle {
            pc,
            ir: insn,
            op,
            halted,
        })
    }

    /// `base + offset` with 16-bit wrap-around; the bounds check happens on
    /// the access itself.
    #[inline]
    fn effective_address(&self, base: Register, offset: i8) -> u16 {
        self.read_reg(base).wrapping_add(offset as i16 as u16)
    }

    fn condition_holds(&self, cond: Cond) -> bool {
        match cond {
            Cond::Always => true,
            Cond::Zero => self.flag(Flag::Zero),
            Cond::NotZero => !self.flag(Flag::Zero),
            Cond::Carry => self.flag(Flag::Carry),
            Cond::NotCarry => !self.flag(Flag::Carry),
            Cond::Sign => self.flag(Flag::Sign),
            Cond::NotSign => !self.flag(Flag::Sign),
        }
    }

    /// The stack grows down in 16-bit slots. `sp` only moves once the slot
    /// has been written.
    fn push(&mut self, val: u16) -> Result<(), Fault> {
        let sp = self.sp().wrapping_sub(2);
        self.memory.write_half(sp, val)?;
        self.set_sp(sp);
        Ok(())
    }

    fn pop(&mut self) -> Result<u16, Fault> {
        let sp = self.sp();
        let val = self.memory.read_half(sp)?;
        self.set_sp(sp.wrapping_add(2));
        Ok(val)
    }
}
