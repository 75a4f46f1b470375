//! Time slots: one column of horizontally aligned content in a measure.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::grace_track::GraceTrack;
use crate::model::{BarRendition, NodeId};

/// Resolution of musical time, in quarter-note beats.
pub const TIME_RESOLUTION: f64 = 1e-6;

pub fn round_time(time: f64) -> f64 {
    (time / TIME_RESOLUTION).round() * TIME_RESOLUTION
}

pub fn same_time(a: f64, b: f64) -> bool {
    (a - b).abs() < TIME_RESOLUTION / 2.0
}

/// Kind of content a slot holds. The declaration order is the order of
/// slots sharing the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SlotCategory {
    MeasureStart,
    ScoreDefClef,
    ScoreDefKeySig,
    ScoreDefMensur,
    ScoreDefMeterSig,
    LeftBarLine,
    Clef,
    KeySig,
    Mensur,
    MeterSig,
    Dot,
    Accid,
    GraceNote,
    BarLine,
    Container,
    Default,
    CautionClef,
    CautionKeySig,
    CautionMensur,
    CautionMeterSig,
    MeasureEnd,
}

impl SlotCategory {
    /// Seeded by the track itself; never inserted on request.
    pub fn is_boundary(self) -> bool {
        matches!(self, SlotCategory::MeasureStart | SlotCategory::MeasureEnd)
    }

    /// Slots whose spacing is stretched by justification.
    pub fn is_justifiable(self) -> bool {
        matches!(
            self,
            SlotCategory::Dot
                | SlotCategory::Accid
                | SlotCategory::GraceNote
                | SlotCategory::Container
                | SlotCategory::Default
        )
    }

    /// Before the left barline: measure start and opening attributes.
    pub fn is_leading(self) -> bool {
        self <= SlotCategory::LeftBarLine
    }

    /// From the right barline on: cautionary attributes and measure end.
    pub fn is_trailing(self) -> bool {
        self >= SlotCategory::CautionClef
    }
}

/// Which staff an extent constrains. `All` is used by barlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StaffKey {
    All,
    Staff(u32),
}

/// Horizontal extent of the content of a slot on one staff, relative to the
/// slot position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Extent {
    /// Distance the content reaches to the left of the slot.
    pub left: i32,
    /// Distance the content reaches to the right of the slot.
    pub right: i32,
    /// Clearance required from content on the left.
    pub margin: i32,
}

impl Extent {
    pub fn new(left: i32, right: i32, margin: i32) -> Self {
        Self { left, right, margin }
    }

    pub fn merge(&mut self, other: Extent) {
        self.left = self.left.max(other.left);
        self.right = self.right.max(other.right);
        self.margin = self.margin.max(other.margin);
    }
}

/// What a slot positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SlotRef {
    /// A layer element, laid out on `staff`.
    Element { node: NodeId, staff: u32 },
    /// A clef, key, meter or mensur coming from the score definition.
    Attribute { staff: u32, width: i32 },
    /// A measure barline, shared by all staves.
    BarLine { form: BarRendition, width: i32 },
}

#[derive(Debug, Clone)]
pub struct TimeSlot {
    pub time: f64,
    pub category: SlotCategory,
    pub relative_x: i32,
    /// Clearance added to this slot by collision integration.
    pub pending_shift_x: i32,
    /// Rightmost extent of the slot content.
    pub max_width: i32,
    pub extents: BTreeMap<StaffKey, Extent>,
    pub refs: Vec<SlotRef>,
    /// Grace groups by voice (staff n, layer n), created on demand.
    pub grace_tracks: BTreeMap<(u32, u32), GraceTrack>,
}

impl TimeSlot {
    pub fn new(time: f64, category: SlotCategory) -> Self {
        Self {
            time: round_time(time),
            category,
            relative_x: 0,
            pending_shift_x: 0,
            max_width: 0,
            extents: BTreeMap::new(),
            refs: Vec::new(),
            grace_tracks: BTreeMap::new(),
        }
    }

    /// Order of this slot relative to a `(time, category)` key.
    pub fn cmp_key(&self, time: f64, category: SlotCategory) -> Ordering {
        if same_time(self.time, time) {
            self.category.cmp(&category)
        } else if self.time < time {
            Ordering::Less
        } else {
            Ordering::Greater
        }
    }

    pub fn grace_track_mut(&mut self, staff: u32, layer: u32) -> &mut GraceTrack {
        self.grace_tracks
            .entry((staff, layer))
            .or_insert_with(|| GraceTrack::new(staff, layer))
    }

    pub fn add_extent(&mut self, staff: StaffKey, extent: Extent) {
        self.extents.entry(staff).or_default().merge(extent);
    }

    pub fn left_extent(&self) -> i32 {
        self.extents.values().map(|e| e.left).max().unwrap_or(0)
    }

    pub fn right_extent(&self) -> i32 {
        self.extents.values().map(|e| e.right).max().unwrap_or(0)
    }

    pub fn elements(&self) -> impl Iterator<Item = (NodeId, u32)> + '_ {
        self.refs.iter().filter_map(|r| match r {
            SlotRef::Element { node, staff } => Some((*node, *staff)),
            _ => None,
        })
    }
}
