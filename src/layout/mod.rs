//! Layout passes. Elements are positioned horizontally by musical time and
//! vertically by staff, then systems and pages are justified.
//!
//! Horizontal passes, in order: time bucketing, natural spacing, collision
//! shift integration (with grace groups), justification. Vertical passes:
//! staff slot creation, overflow accumulation, shift integration, overlap
//! resolution and optional page justification.

pub(crate) mod attributes;
mod grace_track;
pub(crate) mod horizontal;
pub(crate) mod justify;
mod measure_track;
mod staff_slot;
mod system_track;
mod time_slot;
mod timestamp;
pub(crate) mod vertical;

pub use grace_track::{GraceEntry, GraceTrack};
pub use horizontal::duration_spacing;
pub use measure_track::MeasureTrack;
pub use staff_slot::StaffSlot;
pub use system_track::SystemTrack;
pub use time_slot::{
    round_time, same_time, Extent, SlotCategory, SlotRef, StaffKey, TimeSlot, TIME_RESOLUTION,
};
pub use timestamp::{TimestampAnchor, TimestampAnchors};

use crate::error::LayoutReport;
use crate::metrics::GlyphMetrics;
use crate::options::LayoutOptions;

/// Everything a pass needs besides the document.
pub(crate) struct LayoutContext<'a> {
    pub(crate) metrics: &'a dyn GlyphMetrics,
    pub(crate) options: &'a LayoutOptions,
    pub(crate) report: &'a mut LayoutReport,
}

impl LayoutContext<'_> {
    pub(crate) fn unit(&self) -> i32 {
        self.options.unit
    }

    /// `factor` drawing units, scaled by `size` percent.
    pub(crate) fn units(&self, factor: f64, size: u16) -> i32 {
        (factor * self.options.unit as f64 * size as f64 / 100.0).round() as i32
    }
}
