//! Instruction decoding.
//!
//! Every instruction is a single little-endian 32-bit word. Byte 0 is the
//! opcode, bytes 1..3 are the operand bytes `a`, `b` and `c`. Immediate
//! forms read a 16-bit value from bytes 2..3 and memory forms read a signed
//! 8-bit offset from byte 3. Operand bytes an instruction does not use are
//! ignored. The opcode table lives in [`crate::isa`].

use crate::Fault;
use crate::isa::opcode;
use crate::NUM_REGS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    R0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
}

impl Register {
    /// Stack pointer by convention.
    pub const SP: Register = Register::R15;

    /// Register for a raw operand byte, or `None` when the index is not in
    /// `[0, 16)`.
    pub fn from_u8(v: u8) -> Option<Self> {
        let reg = match v {
            0 => Register::R0,
            1 => Register::R1,
            2 => Register::R2,
            3 => Register::R3,
            4 => Register::R4,
            5 => Register::R5,
            6 => Register::R6,
            7 => Register::R7,
            8 => Register::R8,
            9 => Register::R9,
            10 => Register::R10,
            11 => Register::R11,
            12 => Register::R12,
            13 => Register::R13,
            14 => Register::R14,
            15 => Register::R15,
            _ => return None,
        };
        debug_assert!((reg as usize) < NUM_REGS);
        Some(reg)
    }

    pub fn to_usize(&self) -> usize {
        *self as usize
    }

    pub fn to_u8(&self) -> u8 {
        *self as u8
    }
}

impl std::fmt::Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if *self == Register::SP {
            write!(f, "sp")
        } else {
            write!(f, "r{}", self.to_usize())
        }
    }
}

/// Two-operand ALU operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Sub,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Mul,
}

impl AluOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            AluOp::Add => "add",
            AluOp::Sub => "sub",
            AluOp::And => "and",
            AluOp::Or => "or",
            AluOp::Xor => "xor",
            AluOp::Shl => "shl",
            AluOp::Shr => "shr",
            AluOp::Mul => "mul",
        }
    }
}

/// Branch condition evaluated against the flag register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    Always,
    Zero,
    NotZero,
    Carry,
    NotCarry,
    Sign,
    NotSign,
}

impl Cond {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Cond::Always => "jmp",
            Cond::Zero => "jz",
            Cond::NotZero => "jnz",
            Cond::Carry => "jc",
            Cond::NotCarry => "jnc",
            Cond::Sign => "js",
            Cond::NotSign => "jns",
        }
    }
}

/// Width of a data load or store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    Byte,
    Half,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Halt,
    Nop,
    Ldi {
        rd: Register,
        imm: u16,
    },
    Mov {
        rd: Register,
        rs: Register,
    },
    Load {
        rd: Register,
        base: Register,
        offset: i8,
        width: Width,
    },
    Store {
        rs: Register,
        base: Register,
        offset: i8,
        width: Width,
    },
    Alu {
        op: AluOp,
        rd: Register,
        rs1: Register,
        rs2: Register,
    }, // R-type ALU
    AluImm {
        op: AluOp,
        rd: Register,
        imm: u16,
    }, // ADDI / SUBI, rd is both source and destination
    Cmp {
        rs1: Register,
        rs2: Register,
    },
    CmpImm {
        rs1: Register,
        imm: u16,
    },
    Jump {
        cond: Cond,
        target: u16,
    },
    JumpReg {
        rs: Register,
    },
    Push {
        rs: Register,
    },
    Pop {
        rd: Register,
    },
    Call {
        target: u16,
    },
    Ret,
}

impl Op {
    /// True for instructions that recompute the flag register.
    pub fn updates_flags(&self) -> bool {
        matches!(
            self,
            Op::Alu { .. } | Op::AluImm { .. } | Op::Cmp { .. } | Op::CmpImm { .. }
        )
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Op::Halt => write!(f, "halt"),
            Op::Nop => write!(f, "nop"),
            Op::Ldi { rd, imm } => write!(f, "ldi {rd}, {imm:#06x}"),
            Op::Mov { rd, rs } => write!(f, "mov {rd}, {rs}"),
            Op::Load { rd, base, offset, width } => {
                let m = if width == Width::Byte { "ldb" } else { "ld" };
                write!(f, "{m} {rd}, [{base}{offset:+}]")
            }
            Op::Store { rs, base, offset, width } => {
                let m = if width == Width::Byte { "stb" } else { "st" };
                write!(f, "{m} {rs}, [{base}{offset:+}]")
            }
            Op::Alu { op, rd, rs1, rs2 } => write!(f, "{} {rd}, {rs1}, {rs2}", op.mnemonic()),
            Op::AluImm { op, rd, imm } => write!(f, "{}i {rd}, {imm:#06x}", op.mnemonic()),
            Op::Cmp { rs1, rs2 } => write!(f, "cmp {rs1}, {rs2}"),
            Op::CmpImm { rs1, imm } => write!(f, "cmpi {rs1}, {imm:#06x}"),
            Op::Jump { cond, target } => write!(f, "{} {target:#06x}", cond.mnemonic()),
            Op::JumpReg { rs } => write!(f, "jr {rs}"),
            Op::Push { rs } => write!(f, "push {rs}"),
            Op::Pop { rd } => write!(f, "pop {rd}"),
            Op::Call { target } => write!(f, "call {target:#06x}"),
            Op::Ret => write!(f, "ret"),
        }
    }
}

#[inline(always)]
fn reg(v: u8) -> Result<Register, Fault> {
    Register::from_u8(v).ok_or(Fault::InvalidRegister(v))
}

pub fn decode(insn: u32) -> Result<Op, Fault> {
    let [op, a, b, c] = insn.to_le_bytes();
    let imm = (insn >> 16) as u16;
    let offset = c as i8;

    let alu = |alu_op| -> Result<Op, Fault> {
        Ok(Op::Alu {
            op: alu_op,
            rd: reg(a)?,
            rs1: reg(b)?,
            rs2: reg(c)?,
        })
    };
    let jump = |cond| Op::Jump { cond, target: imm };

    match op {
        opcode::HALT => Ok(Op::Halt),
        opcode::NOP => Ok(Op::Nop),

        opcode::LDI => Ok(Op::Ldi { rd: reg(a)?, imm }),
        opcode::MOV => Ok(Op::Mov {
            rd: reg(a)?,
            rs: reg(b)?,
        }),
        opcode::LD | opcode::LDB => Ok(Op::Load {
            rd: reg(a)?,
            base: reg(b)?,
            offset,
            width: if op == opcode::LDB { Width::Byte } else { Width::Half },
        }),
        opcode::ST | opcode::STB => Ok(Op::Store {
            rs: reg(a)?,
            base: reg(b)?,
            offset,
            width: if op == opcode::STB { Width::Byte } else { Width::Half },
        }),

        opcode::ADD => alu(AluOp::Add),
        opcode::SUB => alu(AluOp::Sub),
        opcode::AND => alu(AluOp::And),
        opcode::OR => alu(AluOp::Or),
        opcode::XOR => alu(AluOp::Xor),
        opcode::SHL => alu(AluOp::Shl),
        opcode::SHR => alu(AluOp::Shr),
        opcode::MUL => alu(AluOp::Mul),
        opcode::ADDI => Ok(Op::AluImm {
            op: AluOp::Add,
            rd: reg(a)?,
            imm,
        }),
        opcode::SUBI => Ok(Op::AluImm {
            op: AluOp::Sub,
            rd: reg(a)?,
            imm,
        }),
        opcode::CMP => Ok(Op::Cmp {
            rs1: reg(a)?,
            rs2: reg(b)?,
        }),
        opcode::CMPI => Ok(Op::CmpImm { rs1: reg(a)?, imm }),

        opcode::JMP => Ok(jump(Cond::Always)),
        opcode::JZ => Ok(jump(Cond::Zero)),
        opcode::JNZ => Ok(jump(Cond::NotZero)),
        opcode::JC => Ok(jump(Cond::Carry)),
        opcode::JNC => Ok(jump(Cond::NotCarry)),
        opcode::JS => Ok(jump(Cond::Sign)),
        opcode::JNS => Ok(jump(Cond::NotSign)),
        opcode::JR => Ok(Op::JumpReg { rs: reg(a)? }),

        opcode::PUSH => Ok(Op::Push { rs: reg(a)? }),
        opcode::POP => Ok(Op::Pop { rd: reg(a)? }),
        opcode::CALL => Ok(Op::Call { target: imm }),
        opcode::RET => Ok(Op::Ret),

        _ => Err(Fault::InvalidOpcode(op)),
    }
}
