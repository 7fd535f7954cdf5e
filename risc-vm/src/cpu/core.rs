use crate::decoder::Register;
use crate::memory::{Memory, MemoryError};
use crate::{MEMORY_SIZE, NUM_REGS, VmError};

use super::types::{Fault, Flag, Flags};

/// Complete execution context of one virtual machine.
///
/// The state exclusively owns its memory; dropping it releases the memory.
pub struct CpuState {
    pub(crate) pc: u16,
    pub(crate) ir: u32,
    pub(crate) flags: Flags,
    pub(crate) regs: [u16; NUM_REGS],
    pub(crate) memory: Memory,
}

impl CpuState {
    /// Create a fresh state with zeroed memory and registers, cleared flags,
    /// and `pc` at `entry_point`.
    pub fn new(entry_point: u16) -> Self {
        Self {
            pc: entry_point,
            ir: 0,
            flags: Flags::default(),
            regs: [0; NUM_REGS],
            memory: Memory::new(),
        }
    }

    #[inline]
    pub fn pc(&self) -> u16 {
        self.pc
    }

    /// Move the program counter. The full instruction word at `pc` must lie
    /// inside memory.
    pub fn set_pc(&mut self, pc: u16) -> Result<(), Fault> {
        check_target(pc)?;
        self.pc = pc;
        Ok(())
    }

    /// Most recently fetched instruction word.
    #[inline]
    pub fn ir(&self) -> u32 {
        self.ir
    }

    #[inline]
    pub fn flags(&self) -> Flags {
        self.flags
    }

    #[inline]
    pub fn flag(&self, flag: Flag) -> bool {
        self.flags.is_set(flag)
    }

    pub fn set_flags(&mut self, flags: Flags) {
        self.flags = flags;
    }

    #[inline]
    pub fn read_reg(&self, reg: Register) -> u16 {
        self.regs[reg.to_usize()]
    }

    #[inline]
    pub fn write_reg(&mut self, reg: Register, val: u16) {
        self.regs[reg.to_usize()] = val;
    }

    /// Register by raw index; indices outside `[0, 16)` are rejected.
    pub fn reg(&self, index: u8) -> Result<u16, Fault> {
        let reg = Register::from_u8(index).ok_or(Fault::InvalidRegister(index))?;
        Ok(self.read_reg(reg))
    }

    pub fn set_reg(&mut self, index: u8, val: u16) -> Result<(), Fault> {
        let reg = Register::from_u8(index).ok_or(Fault::InvalidRegister(index))?;
        self.write_reg(reg, val);
        Ok(())
    }

    pub fn regs(&self) -> &[u16; NUM_REGS] {
        &self.regs
    }

    #[inline]
    pub fn sp(&self) -> u16 {
        self.read_reg(Register::SP)
    }

    pub fn set_sp(&mut self, val: u16) {
        self.write_reg(Register::SP, val);
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    /// Copy a flat image into memory at `origin` and point `pc` at it.
    ///
    /// The image is loaded verbatim; it may fill memory up to the last byte.
    pub fn load_image(&mut self, image: &[u8], origin: u16) -> Result<(), VmError> {
        if origin as usize >= MEMORY_SIZE {
            return Err(MemoryError::OutOfBounds(origin).into());
        }
        let available = MEMORY_SIZE - origin as usize;
        if image.len() > available {
            return Err(VmError::ImageTooLarge {
                len: image.len(),
                origin,
                available,
            });
        }
        self.memory.write_bytes(origin, image)?;
        self.pc = origin;
        log::info!(
            "loaded {} byte image at {:#06x} ({} bytes free above it)",
            image.len(),
            origin,
            available - image.len()
        );
        Ok(())
    }
}

/// A control transfer may only land where a whole instruction can be fetched.
#[inline]
pub(super) fn check_target(target: u16) -> Result<(), Fault> {
    if target as usize + crate::isa::INSN_WIDTH as usize > MEMORY_SIZE {
        Err(Fault::OutOfBounds(target))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_is_zeroed() {
        let cpu = CpuState::new(0x0100);
        assert_eq!(cpu.pc(), 0x0100);
        assert_eq!(cpu.ir(), 0);
        assert_eq!(cpu.flags(), Flags::default());
        assert!(cpu.regs().iter().all(|&r| r == 0));
        assert!(cpu.memory().as_slice().iter().all(|&b| b == 0));
        assert_eq!(cpu.memory().size(), MEMORY_SIZE);
    }

    #[test]
    fn register_index_is_bounds_checked() {
        let mut cpu = CpuState::new(0);
        cpu.set_reg(15, 0x4000).unwrap();
        assert_eq!(cpu.sp(), 0x4000);
        assert_eq!(cpu.reg(15), Ok(0x4000));
        assert_eq!(cpu.reg(16), Err(Fault::InvalidRegister(16)));
        assert_eq!(cpu.set_reg(200, 1), Err(Fault::InvalidRegister(200)));
    }

    #[test]
    fn image_filling_the_rest_of_memory_loads() {
        let origin = 0x0200u16;
        let mut cpu = CpuState::new(0);
        let image = vec![0xab; MEMORY_SIZE - origin as usize];
        cpu.load_image(&image, origin).unwrap();
        assert_eq!(cpu.pc(), origin);
        assert_eq!(cpu.memory().read_byte((MEMORY_SIZE - 1) as u16), Ok(0xab));
        assert_eq!(cpu.memory().read_byte(origin - 1), Ok(0));
    }

    #[test]
    fn image_one_byte_too_large_is_rejected() {
        let mut cpu = CpuState::new(0);
        let image = vec![0xab; MEMORY_SIZE + 1];
        let err = cpu.load_image(&image, 0).unwrap_err();
        assert!(matches!(
            err,
            VmError::ImageTooLarge { len, origin: 0, available } if len == MEMORY_SIZE + 1 && available == MEMORY_SIZE
        ));
        // Nothing was copied.
        assert_eq!(cpu.memory().read_byte(0), Ok(0));

        let image = vec![1; MEMORY_SIZE - 0x10 + 1];
        assert!(matches!(
            cpu.load_image(&image, 0x10),
            Err(VmError::ImageTooLarge { .. })
        ));
    }

    #[test]
    fn origin_outside_memory_is_rejected() {
        let mut cpu = CpuState::new(0);
        assert!(matches!(
            cpu.load_image(&[], MEMORY_SIZE as u16),
            Err(VmError::Memory(MemoryError::OutOfBounds(_)))
        ));
    }

    #[test]
    fn set_pc_rejects_partial_word() {
        let mut cpu = CpuState::new(0);
        assert!(cpu.set_pc((MEMORY_SIZE - 4) as u16).is_ok());
        assert_eq!(
            cpu.set_pc((MEMORY_SIZE - 3) as u16),
            Err(Fault::OutOfBounds((MEMORY_SIZE - 3) as u16))
        );
        assert_eq!(cpu.pc(), (MEMORY_SIZE - 4) as u16);
    }
}
