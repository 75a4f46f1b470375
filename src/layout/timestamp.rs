//! Anchors for control events attached to a beat rather than to a note.

use super::measure_track::MeasureTrack;
use super::time_slot::{round_time, same_time};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimestampAnchor {
    /// 1-based beat, as encoded.
    pub tstamp: f64,
    pub x: i32,
}

/// Deduplicated, ordered anchors of one measure.
#[derive(Debug, Clone)]
pub struct TimestampAnchors {
    anchors: Vec<TimestampAnchor>,
    /// Quarter beats per encoded beat, from the meter unit.
    pub beats_per_tstamp: f64,
}

impl Default for TimestampAnchors {
    fn default() -> Self {
        Self {
            anchors: Vec::new(),
            beats_per_tstamp: 1.0,
        }
    }
}

impl TimestampAnchors {
    pub fn new(beats_per_tstamp: f64) -> Self {
        Self {
            anchors: Vec::new(),
            beats_per_tstamp,
        }
    }

    pub fn reset(&mut self) {
        self.anchors.clear();
    }

    pub fn get_or_insert(&mut self, tstamp: f64) -> usize {
        let tstamp = round_time(tstamp.max(0.0));
        match self
            .anchors
            .iter()
            .position(|a| same_time(a.tstamp, tstamp) || a.tstamp > tstamp)
        {
            Some(i) if same_time(self.anchors[i].tstamp, tstamp) => i,
            Some(i) => {
                self.anchors.insert(i, TimestampAnchor { tstamp, x: 0 });
                i
            }
            None => {
                self.anchors.push(TimestampAnchor { tstamp, x: 0 });
                self.anchors.len() - 1
            }
        }
    }

    pub fn find(&self, tstamp: f64) -> Option<&TimestampAnchor> {
        self.anchors.iter().find(|a| same_time(a.tstamp, tstamp))
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimestampAnchor> {
        self.anchors.iter()
    }

    /// Place every anchor by interpolating between the slot columns of
    /// `track`.
    pub fn position(&mut self, track: &MeasureTrack) {
        let columns = columns(track);
        let left_x = track.slots()[track.left_ref()].relative_x;
        for anchor in &mut self.anchors {
            let time = (anchor.tstamp - 1.0) * self.beats_per_tstamp;
            anchor.x = if time < 0.0 {
                // between the left barline and the first beat
                let first = columns.first().map_or(left_x, |c| c.1);
                left_x + ((first - left_x) as f64 * anchor.tstamp.clamp(0.0, 1.0)).round() as i32
            } else {
                interpolate(&columns, time)
            };
        }
    }
}

/// One `(time, x)` point per distinct time of the justifiable region, plus
/// the right barline at the measure duration.
fn columns(track: &MeasureTrack) -> Vec<(f64, i32)> {
    let slots = track.slots();
    let mut out: Vec<(f64, i32)> = Vec::new();
    for slot in &slots[track.left_ref() + 1..track.right_ref()] {
        match out.last_mut() {
            Some(last) if same_time(last.0, slot.time) => last.1 = slot.relative_x,
            _ => out.push((slot.time, slot.relative_x)),
        }
    }
    let right = &slots[track.right_ref()];
    match out.last_mut() {
        Some(last) if same_time(last.0, right.time) => {}
        _ => out.push((right.time, right.relative_x)),
    }
    out
}

fn interpolate(columns: &[(f64, i32)], time: f64) -> i32 {
    let Some(&(last_time, last_x)) = columns.last() else {
        return 0;
    };
    if time >= last_time {
        return last_x;
    }
    for pair in columns.windows(2) {
        let (t0, x0) = pair[0];
        let (t1, x1) = pair[1];
        if time <= t1 {
            if time <= t0 || same_time(t0, t1) {
                return x0;
            }
            let ratio = (time - t0) / (t1 - t0);
            return x0 + ((x1 - x0) as f64 * ratio).round() as i32;
        }
    }
    columns[0].1
}
