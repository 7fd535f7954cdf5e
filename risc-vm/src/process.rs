//! Fixed-capacity table of independent CPU states.

use std::fmt;

use crate::cpu::CpuState;
use crate::isa::INSN_WIDTH;
use crate::memory::MemoryError;
use crate::{MAX_PROCESSES, MEMORY_SIZE, VmError};

/// Index of an occupied process slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(usize);

impl SlotId {
    pub fn new(index: usize) -> Self {
        SlotId(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Up to [`MAX_PROCESSES`] CPU states, each exclusively owned by its slot.
///
/// Freeing a slot drops its state and releases the memory.
pub struct ProcessTable {
    slots: Vec<Option<CpuState>>,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self {
            slots: (0..MAX_PROCESSES).map(|_| None).collect(),
        }
    }

    /// Create a fresh CPU state in the first empty slot.
    pub fn allocate(&mut self, entry_point: u16) -> Result<SlotId, VmError> {
        if entry_point as usize + INSN_WIDTH as usize > MEMORY_SIZE {
            return Err(MemoryError::OutOfBounds(entry_point).into());
        }
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(VmError::CapacityExceeded(MAX_PROCESSES))?;
        self.slots[index] = Some(CpuState::new(entry_point));
        log::info!("allocated process slot {} at entry {:#06x}", index, entry_point);
        Ok(SlotId(index))
    }

    pub fn free(&mut self, id: SlotId) -> Result<(), VmError> {
        let slot = self
            .slots
            .get_mut(id.0)
            .filter(|s| s.is_some())
            .ok_or(VmError::InvalidSlot(id.0))?;
        *slot = None;
        log::info!("freed process slot {}", id);
        Ok(())
    }

    pub fn get(&self, id: SlotId) -> Result<&CpuState, VmError> {
        self.slots
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(VmError::InvalidSlot(id.0))
    }

    pub fn get_mut(&mut self, id: SlotId) -> Result<&mut CpuState, VmError> {
        self.slots
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(VmError::InvalidSlot(id.0))
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Occupied slots in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &CpuState)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|cpu| (SlotId(i), cpu)))
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::Register;

    #[test]
    fn slot_id_honours_width() {
        let id = SlotId::new(3);
        assert_eq!(format!("[{id:<4}]"), "[3   ]");
        assert_eq!(format!("[{id:>3}]"), "[  3]");
        assert_eq!(id.to_string(), "3");
    }

    #[test]
    fn capacity_is_enforced_and_freed_slots_reused() {
        let mut table = ProcessTable::new();
        let ids: Vec<SlotId> = (0..MAX_PROCESSES)
            .map(|_| table.allocate(0).unwrap())
            .collect();
        assert_eq!(table.len(), MAX_PROCESSES);
        assert!(matches!(
            table.allocate(0),
            Err(VmError::CapacityExceeded(MAX_PROCESSES))
        ));

        table.free(ids[17]).unwrap();
        assert_eq!(table.allocate(0x40).unwrap(), ids[17]);
        assert!(matches!(table.allocate(0), Err(VmError::CapacityExceeded(_))));
    }

    #[test]
    fn slots_do_not_share_memory() {
        let mut table = ProcessTable::new();
        let a = table.allocate(0).unwrap();
        let b = table.allocate(0).unwrap();
        assert_ne!(a, b);

        table.get_mut(a).unwrap().memory_mut().write_byte(0x100, 0xaa).unwrap();
        table.get_mut(a).unwrap().write_reg(Register::R1, 1);

        let other = table.get(b).unwrap();
        assert_eq!(other.memory().read_byte(0x100), Ok(0));
        assert_eq!(other.read_reg(Register::R1), 0);
    }

    #[test]
    fn freed_slot_is_invalid() {
        let mut table = ProcessTable::new();
        let id = table.allocate(0x20).unwrap();
        assert_eq!(table.get(id).unwrap().pc(), 0x20);
        table.free(id).unwrap();
        assert!(matches!(table.get(id), Err(VmError::InvalidSlot(0))));
        assert!(matches!(table.free(id), Err(VmError::InvalidSlot(0))));
        assert!(matches!(
            table.get(SlotId::new(MAX_PROCESSES + 3)),
            Err(VmError::InvalidSlot(_))
        ));
        assert!(table.is_empty());
    }

    #[test]
    fn reallocation_starts_fresh() {
        let mut table = ProcessTable::new();
        let id = table.allocate(0).unwrap();
        table.get_mut(id).unwrap().write_reg(Register::R3, 9);
        table.free(id).unwrap();
        let id = table.allocate(0).unwrap();
        assert_eq!(table.get(id).unwrap().read_reg(Register::R3), 0);
    }

    #[test]
    fn entry_point_must_be_fetchable() {
        let mut table = ProcessTable::new();
        assert!(matches!(
            table.allocate((MEMORY_SIZE - 2) as u16),
            Err(VmError::Memory(_))
        ));
        assert!(table.is_empty());
    }

    #[test]
    fn iter_lists_occupied_slots_in_order() {
        let mut table = ProcessTable::new();
        let a = table.allocate(0).unwrap();
        let b = table.allocate(4).unwrap();
        let c = table.allocate(8).unwrap();
        table.free(b).unwrap();
        let listed: Vec<(SlotId, u16)> = table.iter().map(|(id, cpu)| (id, cpu.pc())).collect();
        assert_eq!(listed, vec![(a, 0), (c, 8)]);
    }
}
