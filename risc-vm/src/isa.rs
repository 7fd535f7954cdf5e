//! Opcode table and instruction encoding.
//!
//! The encoding is the binary contract between anything that produces
//! images and the engine; see [`crate::decoder`] for the field layout.

use crate::decoder::{AluOp, Cond, Op, Register, Width};

/// Width in bytes of every instruction.
pub const INSN_WIDTH: u16 = 4;

pub mod opcode {
    pub const HALT: u8 = 0x00;
    pub const NOP: u8 = 0x01;

    // Data movement
    pub const LDI: u8 = 0x10;
    pub const MOV: u8 = 0x11;
    pub const LD: u8 = 0x12;
    pub const ST: u8 = 0x13;
    pub const LDB: u8 = 0x14;
    pub const STB: u8 = 0x15;

    // Arithmetic and comparison
    pub const ADD: u8 = 0x20;
    pub const SUB: u8 = 0x21;
    pub const AND: u8 = 0x22;
    pub const OR: u8 = 0x23;
    pub const XOR: u8 = 0x24;
    pub const SHL: u8 = 0x25;
    pub const SHR: u8 = 0x26;
    pub const MUL: u8 = 0x27;
    pub const ADDI: u8 = 0x28;
    pub const SUBI: u8 = 0x29;
    pub const CMP: u8 = 0x2a;
    pub const CMPI: u8 = 0x2b;

    // Control flow
    pub const JMP: u8 = 0x30;
    pub const JZ: u8 = 0x31;
    pub const JNZ: u8 = 0x32;
    pub const JC: u8 = 0x33;
    pub const JNC: u8 = 0x34;
    pub const JS: u8 = 0x35;
    pub const JNS: u8 = 0x36;
    pub const JR: u8 = 0x37;

    // Stack
    pub const PUSH: u8 = 0x40;
    pub const POP: u8 = 0x41;
    pub const CALL: u8 = 0x42;
    pub const RET: u8 = 0x43;
}

/// Register-register form: `[op, a, b, c]`.
pub fn encode_rrr(op: u8, a: u8, b: u8, c: u8) -> u32 {
    u32::from_le_bytes([op, a, b, c])
}

/// Register-immediate form: `[op, a, imm_lo, imm_hi]`.
pub fn encode_ri(op: u8, a: u8, imm: u16) -> u32 {
    let [lo, hi] = imm.to_le_bytes();
    u32::from_le_bytes([op, a, lo, hi])
}

fn alu_opcode(op: AluOp) -> u8 {
    match op {
        AluOp::Add => opcode::ADD,
        AluOp::Sub => opcode::SUB,
        AluOp::And => opcode::AND,
        AluOp::Or => opcode::OR,
        AluOp::Xor => opcode::XOR,
        AluOp::Shl => opcode::SHL,
        AluOp::Shr => opcode::SHR,
        AluOp::Mul => opcode::MUL,
    }
}

fn jump_opcode(cond: Cond) -> u8 {
    match cond {
        Cond::Always => opcode::JMP,
        Cond::Zero => opcode::JZ,
        Cond::NotZero => opcode::JNZ,
        Cond::Carry => opcode::JC,
        Cond::NotCarry => opcode::JNC,
        Cond::Sign => opcode::JS,
        Cond::NotSign => opcode::JNS,
    }
}

/// Encode a decoded instruction back into its word.
///
/// Only `Add` and `Sub` have immediate forms, so any other `AluImm` has no
/// encoding and yields `None`.
pub fn encode(op: &Op) -> Option<u32> {
    let r = Register::to_u8;
    let word = match *op {
        Op::Halt => encode_rrr(opcode::HALT, 0, 0, 0),
        Op::Nop => encode_rrr(opcode::NOP, 0, 0, 0),
        Op::Ldi { rd, imm } => encode_ri(opcode::LDI, r(&rd), imm),
        Op::Mov { rd, rs } => encode_rrr(opcode::MOV, r(&rd), r(&rs), 0),
        Op::Load { rd, base, offset, width } => {
            let code = match width {
                Width::Byte => opcode::LDB,
                Width::Half => opcode::LD,
            };
            encode_rrr(code, r(&rd), r(&base), offset as u8)
        }
        Op::Store { rs, base, offset, width } => {
            let code = match width {
                Width::Byte => opcode::STB,
                Width::Half => opcode::ST,
            };
            encode_rrr(code, r(&rs), r(&base), offset as u8)
        }
        Op::Alu { op, rd, rs1, rs2 } => encode_rrr(alu_opcode(op), r(&rd), r(&rs1), r(&rs2)),
        Op::AluImm { op: AluOp::Add, rd, imm } => encode_ri(opcode::ADDI, r(&rd), imm),
        Op::AluImm { op: AluOp::Sub, rd, imm } => encode_ri(opcode::SUBI, r(&rd), imm),
        Op::AluImm { .. } => return None,
        Op::Cmp { rs1, rs2 } => encode_rrr(opcode::CMP, r(&rs1), r(&rs2), 0),
        Op::CmpImm { rs1, imm } => encode_ri(opcode::CMPI, r(&rs1), imm),
        Op::Jump { cond, target } => encode_ri(jump_opcode(cond), 0, target),
        Op::JumpReg { rs } => encode_rrr(opcode::JR, r(&rs), 0, 0),
        Op::Push { rs } => encode_rrr(opcode::PUSH, r(&rs), 0, 0),
        Op::Pop { rd } => encode_rrr(opcode::POP, r(&rd), 0, 0),
        Op::Call { target } => encode_ri(opcode::CALL, 0, target),
        Op::Ret => encode_rrr(opcode::RET, 0, 0, 0),
    };
    Some(word)
}

/// Flatten a sequence of instructions into a loadable image.
///
/// Returns `None` if any instruction has no encoding.
pub fn image(program: &[Op]) -> Option<Vec<u8>> {
    let mut bytes = Vec::with_capacity(program.len() * INSN_WIDTH as usize);
    for op in program {
        bytes.extend_from_slice(&encode(op)?.to_le_bytes());
    }
    Some(bytes)
}
