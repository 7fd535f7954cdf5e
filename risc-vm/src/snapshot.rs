use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::cpu::{CpuState, Fault, Flags};
use crate::{MEMORY_SIZE, NUM_REGS, VmError};

/// Version identifier for snapshot compatibility checks.
pub const SNAPSHOT_VERSION: &str = "1.0";

/// Serializable CPU state, used for core dumps after a fault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuSnapshot {
    pub version: String,
    pub pc: u16,
    pub ir: u32,
    pub flags: Flags,
    pub regs: [u16; NUM_REGS],
    pub memory: MemorySnapshot,
    /// Fault that ended the run, when the snapshot is a core dump.
    pub fault: Option<Fault>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub size: u32,
    /// Hex SHA-256 of `data`.
    pub hash: String,
    pub data: Vec<u8>,
}

fn digest(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

impl CpuSnapshot {
    pub fn to_bytes(&self) -> Result<Vec<u8>, VmError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VmError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

impl CpuState {
    pub fn snapshot(&self) -> CpuSnapshot {
        let data = self.memory().as_slice().to_vec();
        CpuSnapshot {
            version: SNAPSHOT_VERSION.to_string(),
            pc: self.pc(),
            ir: self.ir(),
            flags: self.flags(),
            regs: *self.regs(),
            memory: MemorySnapshot {
                size: data.len() as u32,
                hash: digest(&data),
                data,
            },
            fault: None,
        }
    }

    /// Snapshot taken after a run ended in `fault`.
    pub fn core_dump(&self, fault: Fault) -> CpuSnapshot {
        CpuSnapshot {
            fault: Some(fault),
            ..self.snapshot()
        }
    }

    /// Rebuild a state from a snapshot, checking version, size and digest.
    pub fn from_snapshot(snap: CpuSnapshot) -> Result<Self, VmError> {
        if snap.version != SNAPSHOT_VERSION {
            return Err(VmError::Snapshot(format!(
                "version {} (expected {})",
                snap.version, SNAPSHOT_VERSION
            )));
        }
        let mem = &snap.memory;
        if mem.size as usize != MEMORY_SIZE || mem.data.len() != MEMORY_SIZE {
            return Err(VmError::Snapshot(format!(
                "memory is {} bytes (expected {})",
                mem.data.len(),
                MEMORY_SIZE
            )));
        }
        let actual = digest(&mem.data);
        if actual != mem.hash {
            return Err(VmError::Snapshot(format!(
                "memory digest mismatch: {} != {}",
                actual, mem.hash
            )));
        }

        let mut cpu = CpuState::new(snap.pc);
        cpu.ir = snap.ir;
        cpu.flags = Flags::from_bits(snap.flags.bits());
        cpu.regs = snap.regs;
        cpu.memory.set_data(&mem.data)?;
        Ok(cpu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::Flag;
    use crate::decoder::Register;

    fn sample() -> CpuState {
        let mut cpu = CpuState::new(0x0040);
        cpu.write_reg(Register::R5, 0xdead);
        cpu.set_sp(0x3ffe);
        cpu.set_flags(Flags::from_bits(Flag::Zero.bit()));
        cpu.memory_mut().write_bytes(0x0040, &[1, 2, 3, 4]).unwrap();
        cpu
    }

    #[test]
    fn snapshot_roundtrip_preserves_state() {
        let cpu = sample();
        let bytes = cpu.snapshot().to_bytes().unwrap();
        let restored = CpuState::from_snapshot(CpuSnapshot::from_bytes(&bytes).unwrap()).unwrap();

        assert_eq!(restored.pc(), cpu.pc());
        assert_eq!(restored.regs(), cpu.regs());
        assert_eq!(restored.flags(), cpu.flags());
        assert_eq!(restored.memory().as_slice(), cpu.memory().as_slice());
        assert_eq!(restored.dump(), cpu.dump());
    }

    #[test]
    fn core_dump_records_the_fault() {
        let cpu = sample();
        assert_eq!(cpu.snapshot().fault, None);

        let core = cpu.core_dump(Fault::InvalidOpcode(0xee));
        let decoded = CpuSnapshot::from_bytes(&core.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.fault, Some(Fault::InvalidOpcode(0xee)));
        assert_eq!(decoded, core);
        assert!(CpuState::from_snapshot(decoded).is_ok());
    }

    #[test]
    fn tampered_memory_is_rejected() {
        let mut snap = sample().snapshot();
        snap.memory.data[0x40] ^= 0xff;
        assert!(matches!(CpuState::from_snapshot(snap), Err(VmError::Snapshot(_))));
    }

    #[test]
    fn wrong_version_is_rejected() {
        let mut snap = sample().snapshot();
        snap.version = "0.1".into();
        assert!(matches!(CpuState::from_snapshot(snap), Err(VmError::Snapshot(_))));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(matches!(
            CpuSnapshot::from_bytes(&[0xff, 0x01]),
            Err(VmError::Encoding(_))
        ));
    }
}
