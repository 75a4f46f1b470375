//! The ordered sequence of time slots of one measure.

use std::collections::BTreeMap;

use super::time_slot::{round_time, same_time, SlotCategory, TimeSlot};
use crate::error::{LayoutError, Result};
use crate::model::Duration;

/// Time slots of a measure, ordered by `(time, category)`.
///
/// The track always starts with a `MeasureStart` slot at time 0 and ends
/// with a `MeasureEnd` slot at the measure duration.
#[derive(Debug, Clone)]
pub struct MeasureTrack {
    slots: Vec<TimeSlot>,
    layer_durations: Vec<f64>,
    longest_actual: Option<Duration>,
    staff_sizes: BTreeMap<u32, u16>,
}

impl Default for MeasureTrack {
    fn default() -> Self {
        Self::new()
    }
}

impl MeasureTrack {
    pub fn new() -> Self {
        Self {
            slots: vec![
                TimeSlot::new(0.0, SlotCategory::MeasureStart),
                TimeSlot::new(0.0, SlotCategory::MeasureEnd),
            ],
            layer_durations: Vec::new(),
            longest_actual: None,
            staff_sizes: BTreeMap::new(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn slots(&self) -> &[TimeSlot] {
        &self.slots
    }

    pub fn slots_mut(&mut self) -> &mut [TimeSlot] {
        &mut self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.len() <= 2
    }

    pub fn max_time(&self) -> f64 {
        self.slots.last().map_or(0.0, |s| s.time)
    }

    /// Natural width: the position of the right boundary.
    pub fn width(&self) -> i32 {
        self.slots.last().map_or(0, |s| s.relative_x)
    }

    /// Index of a slot, inserting it when missing.
    ///
    /// A non-trailing slot beyond the current duration extends the measure.
    /// Trailing slots always sit at the measure duration.
    pub fn insert_or_find(&mut self, time: f64, category: SlotCategory) -> Result<usize> {
        if category.is_boundary() {
            return Err(LayoutError::BoundarySlot(category));
        }
        let mut time = round_time(time.max(0.0));
        if category.is_trailing() {
            time = self.max_time();
        } else if time > self.max_time() && !same_time(time, self.max_time()) {
            self.set_max_time(time);
        }
        match self.slots.binary_search_by(|s| s.cmp_key(time, category)) {
            Ok(index) => Ok(index),
            Err(index) => {
                self.slots.insert(index, TimeSlot::new(time, category));
                Ok(index)
            }
        }
    }

    pub fn slot_at(&mut self, time: f64, category: SlotCategory) -> Result<&mut TimeSlot> {
        let index = self.insert_or_find(time, category)?;
        Ok(&mut self.slots[index])
    }

    pub fn find(&self, time: f64, category: SlotCategory) -> Option<usize> {
        self.slots
            .binary_search_by(|s| s.cmp_key(time, category))
            .ok()
    }

    /// Raise the measure duration; trailing slots follow the right boundary.
    pub fn set_max_time(&mut self, time: f64) {
        let time = round_time(time);
        if time <= self.max_time() {
            return;
        }
        for slot in self.slots.iter_mut().rev() {
            if !slot.category.is_trailing() {
                break;
            }
            slot.time = time;
        }
    }

    /// Record the total duration of one layer.
    pub fn report_layer_duration(&mut self, duration: f64) {
        self.layer_durations.push(round_time(duration));
        self.set_max_time(duration);
    }

    pub fn layer_durations(&self) -> &[f64] {
        &self.layer_durations
    }

    /// Layers disagree on the measure duration.
    pub fn has_multiple_layers(&self) -> bool {
        self.layer_durations
            .windows(2)
            .any(|w| !same_time(w[0], w[1]))
    }

    pub fn note_duration(&mut self, dur: Duration) {
        self.longest_actual = Some(match self.longest_actual {
            Some(longest) => longest.min(dur),
            None => dur,
        });
    }

    pub fn set_staff_size(&mut self, staff: u32, size: u16) {
        self.staff_sizes.insert(staff, size);
    }

    /// Size of a staff in percent, 100 when unknown.
    pub fn staff_size(&self, staff: u32) -> u16 {
        self.staff_sizes.get(&staff).copied().unwrap_or(100)
    }

    /// Longest written (undotted) duration seen in the measure.
    pub fn longest_actual(&self) -> Option<Duration> {
        self.longest_actual
    }

    /// Last slot of the leading region, the left reference for justification.
    pub fn left_ref(&self) -> usize {
        self.slots
            .iter()
            .rposition(|s| s.category.is_leading())
            .unwrap_or(0)
    }

    /// First slot of the trailing region, where the right barline is drawn.
    pub fn right_ref(&self) -> usize {
        self.slots
            .iter()
            .position(|s| s.category.is_trailing())
            .unwrap_or(self.slots.len().saturating_sub(1))
    }

    /// Width that justification may stretch.
    pub fn justifiable_width(&self) -> i32 {
        self.slots[self.right_ref()].relative_x - self.slots[self.left_ref()].relative_x
    }

    /// Slots are strictly ordered and the boundaries are in place.
    pub fn is_ordered(&self) -> bool {
        let boundaries = self.slots.first().map(|s| s.category) == Some(SlotCategory::MeasureStart)
            && self.slots.last().map(|s| s.category) == Some(SlotCategory::MeasureEnd)
            && self
                .slots
                .iter()
                .filter(|s| s.category.is_boundary())
                .count()
                == 2;
        boundaries
            && self
                .slots
                .windows(2)
                .all(|w| w[0].cmp_key(w[1].time, w[1].category).is_lt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_track_has_boundaries() {
        let track = MeasureTrack::new();
        assert_eq!(track.len(), 2);
        assert!(track.is_ordered());
        assert!(track.is_empty());
    }

    #[test]
    fn insert_or_find_deduplicates() {
        let mut track = MeasureTrack::new();
        let a = track.insert_or_find(1.0, SlotCategory::Default).unwrap();
        let b = track.insert_or_find(1.0, SlotCategory::Default).unwrap();
        assert_eq!(a, b);
        assert_eq!(track.len(), 3);
    }

    #[test]
    fn slots_are_ordered_by_time_then_category() {
        let mut track = MeasureTrack::new();
        track.insert_or_find(2.0, SlotCategory::Default).unwrap();
        track.insert_or_find(0.0, SlotCategory::Default).unwrap();
        track.insert_or_find(0.0, SlotCategory::Accid).unwrap();
        track.insert_or_find(0.0, SlotCategory::ScoreDefClef).unwrap();
        track.insert_or_find(1.0, SlotCategory::GraceNote).unwrap();
        track.insert_or_find(1.0, SlotCategory::Default).unwrap();
        assert!(track.is_ordered());
        let order: Vec<_> = track.slots().iter().map(|s| s.category).collect();
        assert_eq!(
            order,
            vec![
                SlotCategory::MeasureStart,
                SlotCategory::ScoreDefClef,
                SlotCategory::Accid,
                SlotCategory::Default,
                SlotCategory::GraceNote,
                SlotCategory::Default,
                SlotCategory::Default,
                SlotCategory::MeasureEnd,
            ]
        );
    }

    #[test]
    fn inserting_past_the_end_extends_the_measure() {
        let mut track = MeasureTrack::new();
        track.insert_or_find(0.0, SlotCategory::CautionKeySig).unwrap();
        track.insert_or_find(3.0, SlotCategory::Default).unwrap();
        assert_eq!(track.max_time(), 3.0);
        let last_two: Vec<_> = track.slots()[track.len() - 2..]
            .iter()
            .map(|s| (s.time, s.category))
            .collect();
        assert_eq!(
            last_two,
            vec![
                (3.0, SlotCategory::CautionKeySig),
                (3.0, SlotCategory::MeasureEnd)
            ]
        );
        assert!(track.is_ordered());
    }

    #[test]
    fn boundary_categories_are_rejected() {
        let mut track = MeasureTrack::new();
        assert!(matches!(
            track.insert_or_find(0.0, SlotCategory::MeasureStart),
            Err(LayoutError::BoundarySlot(SlotCategory::MeasureStart))
        ));
        assert!(track.insert_or_find(4.0, SlotCategory::MeasureEnd).is_err());
    }

    #[test]
    fn disagreeing_layers_keep_the_longest() {
        let mut track = MeasureTrack::new();
        track.report_layer_duration(4.0);
        track.report_layer_duration(3.0);
        assert!(track.has_multiple_layers());
        assert_eq!(track.max_time(), 4.0);
    }

    #[test]
    fn references_bracket_the_justifiable_region() {
        let mut track = MeasureTrack::new();
        track.insert_or_find(0.0, SlotCategory::ScoreDefClef).unwrap();
        track.insert_or_find(0.0, SlotCategory::Default).unwrap();
        track.report_layer_duration(1.0);
        track.insert_or_find(1.0, SlotCategory::CautionClef).unwrap();
        assert_eq!(track.slots()[track.left_ref()].category, SlotCategory::ScoreDefClef);
        assert_eq!(track.slots()[track.right_ref()].category, SlotCategory::CautionClef);
    }
}
