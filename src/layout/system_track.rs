//! Staff slots of a system, top to bottom.

use super::staff_slot::StaffSlot;
use crate::error::{LayoutError, Result};

/// Contiguous staff slots plus a bottom sentinel.
///
/// Slots are created strictly in index order; the sentinel always exists and
/// its `relative_y` is the height of the system.
#[derive(Debug, Clone)]
pub struct SystemTrack {
    slots: Vec<StaffSlot>,
    bottom: StaffSlot,
}

impl Default for SystemTrack {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemTrack {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            bottom: StaffSlot::new(0),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// The slot at `index`, created with `seed` when `index` is the next one.
    pub fn get_or_create(
        &mut self,
        index: usize,
        seed: impl FnOnce() -> StaffSlot,
    ) -> Result<&mut StaffSlot> {
        if index > self.slots.len() {
            return Err(LayoutError::NonContiguousStaffSlot {
                requested: index,
                next: self.slots.len(),
            });
        }
        if index == self.slots.len() {
            self.slots.push(seed());
        }
        Ok(&mut self.slots[index])
    }

    pub fn slots(&self) -> &[StaffSlot] {
        &self.slots
    }

    pub fn slots_mut(&mut self) -> &mut [StaffSlot] {
        &mut self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn bottom(&self) -> &StaffSlot {
        &self.bottom
    }

    pub fn bottom_mut(&mut self) -> &mut StaffSlot {
        &mut self.bottom
    }

    pub fn index_of(&self, staff_n: u32) -> Option<usize> {
        self.slots.iter().position(|s| s.staff_n == staff_n)
    }

    pub fn slot(&self, staff_n: u32) -> Option<&StaffSlot> {
        self.slots.iter().find(|s| s.staff_n == staff_n)
    }

    pub fn slot_mut(&mut self, staff_n: u32) -> Option<&mut StaffSlot> {
        self.slots.iter_mut().find(|s| s.staff_n == staff_n)
    }

    pub fn height(&self) -> i32 {
        self.bottom.relative_y
    }
}
