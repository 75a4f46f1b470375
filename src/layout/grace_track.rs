//! Grace groups.
//!
//! Grace notes are met left to right while walking a layer but are laid out
//! right to left from the principal note. A [`GraceTrack`] collects them on a
//! stack, is flushed once at the end of the voice (giving every grace note a
//! time before the principal note), then positioned.

use super::time_slot::{round_time, same_time, SlotCategory, SlotRef, TimeSlot};
use crate::error::{LayoutError, Result};
use crate::model::NodeId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraceEntry {
    pub node: NodeId,
    /// Nominal duration in beats.
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq)]
enum GraceState {
    Collecting(Vec<GraceEntry>),
    Flushed,
}

#[derive(Debug, Clone)]
pub struct GraceTrack {
    staff: u32,
    layer: u32,
    state: GraceState,
    slots: Vec<TimeSlot>,
    width: i32,
}

impl GraceTrack {
    pub fn new(staff: u32, layer: u32) -> Self {
        Self {
            staff,
            layer,
            state: GraceState::Collecting(Vec::new()),
            slots: Vec::new(),
            width: 0,
        }
    }

    pub fn push(&mut self, entry: GraceEntry) -> Result<()> {
        match &mut self.state {
            GraceState::Collecting(stack) => {
                stack.push(entry);
                Ok(())
            }
            GraceState::Flushed => Err(LayoutError::GraceGroupFlushed {
                staff: self.staff,
                layer: self.layer,
            }),
        }
    }

    pub fn is_flushed(&self) -> bool {
        self.state == GraceState::Flushed
    }

    /// Number of grace entries still waiting for the flush.
    pub fn pending(&self) -> usize {
        match &self.state {
            GraceState::Collecting(stack) => stack.len(),
            GraceState::Flushed => 0,
        }
    }

    /// Consume the stack from the last pushed entry backwards, giving each
    /// one a slot at a negative time relative to the principal note.
    pub fn flush(&mut self) -> Result<()> {
        let stack = match std::mem::replace(&mut self.state, GraceState::Flushed) {
            GraceState::Collecting(stack) => stack,
            GraceState::Flushed => {
                return Err(LayoutError::GraceGroupFlushed {
                    staff: self.staff,
                    layer: self.layer,
                })
            }
        };
        let mut time = 0.0;
        for entry in stack.iter().rev() {
            time = round_time(time - entry.duration);
            let index = match self
                .slots
                .iter()
                .position(|s| same_time(s.time, time) || s.time > time)
            {
                Some(i) if same_time(self.slots[i].time, time) => i,
                Some(i) => {
                    self.slots.insert(i, TimeSlot::new(time, SlotCategory::Default));
                    i
                }
                None => {
                    self.slots.push(TimeSlot::new(time, SlotCategory::Default));
                    self.slots.len() - 1
                }
            };
            self.slots[index].refs.push(SlotRef::Element {
                node: entry.node,
                staff: self.staff,
            });
        }
        Ok(())
    }

    pub fn slots(&self) -> &[TimeSlot] {
        &self.slots
    }

    pub fn slots_mut(&mut self) -> &mut [TimeSlot] {
        &mut self.slots
    }

    /// Position the slots from the right: the last one sits at 0 and every
    /// earlier one just left of its successor. Returns the group's
    /// `(left, right)` extent around position 0.
    pub fn align(&mut self, clearance: i32) -> (i32, i32) {
        let Some(last) = self.slots.len().checked_sub(1) else {
            self.width = 0;
            return (0, 0);
        };
        self.slots[last].relative_x = 0;
        for i in (0..last).rev() {
            let next = &self.slots[i + 1];
            let x = next.relative_x - next.left_extent() - clearance - self.slots[i].right_extent();
            self.slots[i].relative_x = x;
        }
        let left = self.slots[0].left_extent() - self.slots[0].relative_x;
        let right = self.slots[last].right_extent();
        self.width = left + right;
        (left, right)
    }

    pub fn width(&self) -> i32 {
        self.width
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::time_slot::{Extent, StaffKey};

    fn entry(n: u32) -> GraceEntry {
        GraceEntry {
            node: NodeId(n),
            duration: 0.5,
        }
    }

    fn node_of(slot: &TimeSlot) -> NodeId {
        slot.elements().next().map(|(node, _)| node).unwrap()
    }

    #[test]
    fn flush_assigns_times_backwards() {
        let mut track = GraceTrack::new(1, 1);
        for n in 1..=3 {
            track.push(entry(n)).unwrap();
        }
        track.flush().unwrap();
        let times: Vec<_> = track.slots().iter().map(|s| (node_of(s), s.time)).collect();
        assert_eq!(
            times,
            vec![(NodeId(1), -1.5), (NodeId(2), -1.0), (NodeId(3), -0.5)]
        );
    }

    #[test]
    fn push_after_flush_fails() {
        let mut track = GraceTrack::new(2, 1);
        track.push(entry(1)).unwrap();
        track.flush().unwrap();
        assert!(track.is_flushed());
        assert!(matches!(
            track.push(entry(2)),
            Err(LayoutError::GraceGroupFlushed { staff: 2, layer: 1 })
        ));
        assert!(track.flush().is_err());
    }

    #[test]
    fn align_places_notes_right_to_left_without_overlap() {
        let mut track = GraceTrack::new(1, 1);
        for n in 1..=3 {
            track.push(entry(n)).unwrap();
        }
        track.flush().unwrap();
        for slot in track.slots_mut() {
            slot.add_extent(StaffKey::Staff(1), Extent::new(0, 16, 0));
        }
        let (left, right) = track.align(3);
        let xs: Vec<_> = track.slots().iter().map(|s| s.relative_x).collect();
        assert_eq!(xs, vec![-38, -19, 0]);
        assert_eq!((left, right), (38, 16));
        for pair in track.slots().windows(2) {
            assert!(pair[0].relative_x + pair[0].right_extent() <= pair[1].relative_x - pair[1].left_extent());
        }
    }
}
