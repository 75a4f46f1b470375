//! Vertical position and overflow of one staff within a system.

use crate::model::NodeId;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaffSlot {
    /// Staff number (`n`), `0` for the bottom sentinel.
    pub staff_n: u32,
    /// First staff instance seen in the system (lookup only).
    pub staff: Option<NodeId>,
    pub lines: u8,
    /// Staff size in percent.
    pub size: u16,
    /// Distance from the top to the bottom line.
    pub staff_height: i32,
    /// Top line, relative to the top of the system.
    pub relative_y: i32,
    /// Space inserted above this staff by shift integration.
    pub pending_shift_y: i32,
    pub overflow_above: i32,
    pub overflow_below: i32,
    /// Extra space injected by overlap resolution.
    pub overlap: i32,
    pub verse_count: u8,
    pub directive_above: bool,
    pub directive_below: bool,
}

impl StaffSlot {
    pub fn new(staff_n: u32) -> Self {
        Self {
            staff_n,
            size: 100,
            ..Self::default()
        }
    }

    pub fn set_overflow_above(&mut self, overflow: i32) {
        self.overflow_above = self.overflow_above.max(overflow);
    }

    pub fn set_overflow_below(&mut self, overflow: i32) {
        self.overflow_below = self.overflow_below.max(overflow);
    }

    pub fn set_verse_count(&mut self, count: u8) {
        self.verse_count = self.verse_count.max(count);
    }

    /// Position of the bottom line.
    pub fn bottom(&self) -> i32 {
        self.relative_y + self.staff_height
    }
}
