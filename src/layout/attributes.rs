//! Running clef, key, meter and mensur of every staff while walking a
//! document in order, and the widths of those attributes when drawn.

use super::time_slot::SlotCategory;
use crate::metrics::{Glyph, GlyphMetrics};
use crate::model::{Accidental, Clef, KeySig, Mensur, MeterSig, ScoreDef};

pub(crate) const DEFAULT_LINES: u8 = 5;
pub(crate) const DEFAULT_SCALE: u16 = 100;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StaffState {
    pub(crate) n: u32,
    pub(crate) lines: u8,
    pub(crate) scale: u16,
    pub(crate) clef: Clef,
    pub(crate) key: Option<KeySig>,
    pub(crate) meter: Option<MeterSig>,
    pub(crate) mensur: Option<Mensur>,
}

impl StaffState {
    fn new(n: u32) -> Self {
        Self {
            n,
            lines: DEFAULT_LINES,
            scale: DEFAULT_SCALE,
            clef: Clef::TREBLE,
            key: None,
            meter: None,
            mensur: None,
        }
    }

    /// Length of a measure in quarter beats under the current meter.
    pub(crate) fn measure_beats(&self) -> f64 {
        self.meter.map_or(4.0, |m| m.beats())
    }

    /// Quarter beats per encoded beat (`tstamp` unit).
    pub(crate) fn beats_per_tstamp(&self) -> f64 {
        match self.meter {
            Some(m) if m.unit > 0 => 4.0 / m.unit as f64,
            _ => 1.0,
        }
    }
}

/// Attributes that changed on one staff.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct StaffChanges {
    pub(crate) n: u32,
    pub(crate) clef: Option<Clef>,
    /// New key with the key it replaces.
    pub(crate) key: Option<(KeySig, Option<KeySig>)>,
    pub(crate) meter: Option<MeterSig>,
    pub(crate) mensur: Option<Mensur>,
}

impl StaffChanges {
    fn is_empty(&self) -> bool {
        self.clef.is_none() && self.key.is_none() && self.meter.is_none() && self.mensur.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ScoreState {
    pub(crate) staves: Vec<StaffState>,
}

impl ScoreState {
    pub(crate) fn is_empty(&self) -> bool {
        self.staves.is_empty()
    }

    pub(crate) fn staff(&self, n: u32) -> Option<&StaffState> {
        self.staves.iter().find(|s| s.n == n)
    }

    pub(crate) fn staff_mut(&mut self, n: u32) -> Option<&mut StaffState> {
        self.staves.iter_mut().find(|s| s.n == n)
    }

    /// Apply a score definition. Staves it declares for the first time are
    /// added in declaration order. Returns what actually changed.
    pub(crate) fn apply(&mut self, def: &ScoreDef) -> Vec<StaffChanges> {
        for staff_def in &def.staff_defs {
            if self.staff(staff_def.n).is_none() {
                self.staves.push(StaffState::new(staff_def.n));
            }
        }
        let mut changes = Vec::new();
        for staff in &mut self.staves {
            let staff_def = def.staff_defs.iter().find(|d| d.n == staff.n);
            let mut change = StaffChanges {
                n: staff.n,
                ..StaffChanges::default()
            };
            if let Some(lines) = staff_def.and_then(|d| d.lines) {
                staff.lines = lines;
            }
            if let Some(scale) = staff_def.and_then(|d| d.scale) {
                staff.scale = scale;
            }
            if let Some(clef) = staff_def.and_then(|d| d.clef) {
                if clef != staff.clef {
                    change.clef = Some(clef);
                }
                staff.clef = clef;
            }
            if let Some(key) = staff_def.and_then(|d| d.key).or(def.key) {
                if Some(key) != staff.key {
                    change.key = Some((key, staff.key));
                }
                staff.key = Some(key);
            }
            if let Some(meter) = staff_def.and_then(|d| d.meter).or(def.meter) {
                if Some(meter) != staff.meter {
                    change.meter = Some(meter);
                }
                staff.meter = Some(meter);
            }
            if let Some(mensur) = staff_def.and_then(|d| d.mensur).or(def.mensur) {
                if Some(mensur) != staff.mensur {
                    change.mensur = Some(mensur);
                }
                staff.mensur = Some(mensur);
            }
            if !change.is_empty() {
                changes.push(change);
            }
        }
        changes
    }

    /// Everything a system opens with, as changes from an empty state.
    pub(crate) fn opening(&self) -> Vec<StaffChanges> {
        self.staves
            .iter()
            .map(|s| StaffChanges {
                n: s.n,
                clef: Some(s.clef),
                key: s.key.filter(|k| k.fifths != 0).map(|k| (k, None)),
                meter: s.meter,
                mensur: s.mensur,
            })
            .collect()
    }
}

/// A drawn attribute: staff, slot category and width.
pub(crate) type AttributeItem = (u32, SlotCategory, i32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttributeRole {
    /// System opening or a change between measures.
    ScoreDef,
    /// Announcement at the end of the previous system.
    Caution,
}

/// Slot categories and widths for a set of changes.
pub(crate) fn attribute_items(
    changes: &[StaffChanges],
    state: &ScoreState,
    role: AttributeRole,
    metrics: &dyn GlyphMetrics,
    unit: i32,
) -> Vec<AttributeItem> {
    let category = |scoredef: SlotCategory, caution: SlotCategory| match role {
        AttributeRole::ScoreDef => scoredef,
        AttributeRole::Caution => caution,
    };
    let mut items = Vec::new();
    for change in changes {
        let scale = state.staff(change.n).map_or(DEFAULT_SCALE, |s| s.scale);
        if let Some(clef) = change.clef {
            items.push((
                change.n,
                category(SlotCategory::ScoreDefClef, SlotCategory::CautionClef),
                clef_width(clef, scale, metrics),
            ));
        }
        if let Some((key, previous)) = change.key {
            let width = key_width(key, previous, scale, metrics, unit);
            if width > 0 {
                items.push((
                    change.n,
                    category(SlotCategory::ScoreDefKeySig, SlotCategory::CautionKeySig),
                    width,
                ));
            }
        }
        if change.mensur.is_some() {
            items.push((
                change.n,
                category(SlotCategory::ScoreDefMensur, SlotCategory::CautionMensur),
                metrics.width(Glyph::Mensur, scale),
            ));
        }
        if let Some(meter) = change.meter {
            items.push((
                change.n,
                category(SlotCategory::ScoreDefMeterSig, SlotCategory::CautionMeterSig),
                meter_width(meter, scale, metrics),
            ));
        }
    }
    items
}

pub(crate) fn clef_width(clef: Clef, scale: u16, metrics: &dyn GlyphMetrics) -> i32 {
    metrics.width(Glyph::Clef(clef.shape), scale)
}

/// Width of a key signature; switching to C major draws cancelling naturals.
pub(crate) fn key_width(
    key: KeySig,
    previous: Option<KeySig>,
    scale: u16,
    metrics: &dyn GlyphMetrics,
    unit: i32,
) -> i32 {
    let (count, accid) = match key.fifths {
        f if f > 0 => (f as i32, Accidental::Sharp),
        f if f < 0 => (-(f as i32), Accidental::Flat),
        _ => (
            previous.map_or(0, |p| (p.fifths as i32).abs()),
            Accidental::Natural,
        ),
    };
    if count == 0 {
        return 0;
    }
    let gap = unit * scale as i32 / 100 / 2;
    count * (metrics.width(Glyph::KeyAccid(accid), scale) + gap) - gap
}

pub(crate) fn meter_width(meter: MeterSig, scale: u16, metrics: &dyn GlyphMetrics) -> i32 {
    if meter.symbol.is_some() {
        return metrics.width(Glyph::MeterSymbol, scale);
    }
    let digits = meter.count.to_string().len().max(meter.unit.to_string().len()) as i32;
    digits * metrics.width(Glyph::MeterDigit, scale)
}

/// Width of the clef, key and meter a system opens with, including margins.
pub(crate) fn opening_width(state: &ScoreState, metrics: &dyn GlyphMetrics, unit: i32) -> i32 {
    let items = attribute_items(&state.opening(), state, AttributeRole::ScoreDef, metrics, unit);
    let mut per_category: Vec<(SlotCategory, i32)> = Vec::new();
    for (_, category, width) in items {
        match per_category.iter_mut().find(|(c, _)| *c == category) {
            Some(entry) => entry.1 = entry.1.max(width),
            None => per_category.push((category, width)),
        }
    }
    per_category.iter().map(|(_, w)| w + unit).sum()
}
