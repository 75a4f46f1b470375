//! Horizontal layout of measures.
//!
//! Pass 1 buckets every layer element into the time slots of its measure,
//! pass 2 spaces the slots by duration, and pass 3 registers the extent of
//! every element and integrates the collision shifts from left to right.
//! Grace groups are positioned inside pass 3, before their slot is
//! integrated.

use std::collections::BTreeMap;

use super::attributes::{
    attribute_items, clef_width, key_width, meter_width, AttributeRole, ScoreState, StaffChanges,
    DEFAULT_SCALE,
};
use super::{
    Extent, GraceEntry, LayoutContext, MeasureTrack, SlotCategory, SlotRef, StaffKey,
    TimestampAnchors,
};
use crate::error::{LayoutError, LayoutWarning, Result};
use crate::metrics::Glyph;
use crate::model::{
    Accidental, Anchor, ControlKind, Document, DrawnAttribute, Duration, NodeId, NodeKind,
};
use crate::options::LayoutOptions;

// ── Clearances, in drawing units ────────────────────────────────────
const NOTE_MARGIN: f64 = 0.5;
const ACCID_GAP: f64 = 0.33;
const DOT_GAP: f64 = 0.5;
const ATTRIBUTE_MARGIN: f64 = 1.0;
const BARLINE_MARGIN: f64 = 1.0;
const GRACE_CLEARANCE: f64 = 0.33;
/// Width given to a measure without any duration.
const EMPTY_MEASURE_UNITS: f64 = 8.0;

/// Size of grace notes, in percent of their staff.
pub(crate) const GRACE_SIZE: u16 = 75;

/// Ticks in a whole note.
const WHOLE_NOTE_TICKS: f64 = 1024.0;
/// Drawing unit the spacing curve is calibrated for.
const REFERENCE_UNIT: f64 = 9.0;

/// Run the horizontal passes over every system of a page-based document.
/// Positions are natural (unjustified) afterwards.
pub(crate) fn layout_horizontal(doc: &mut Document, ctx: &mut LayoutContext) -> Result<()> {
    align_horizontally(doc, ctx)?;
    for system in doc.systems()? {
        for measure in doc.system_measures(system)? {
            layout_measure(doc, measure, ctx)?;
        }
        position_measures(doc, system)?;
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
// Pass 1: time bucketing
// ═══════════════════════════════════════════════════════════════════════

/// Position of the walk inside one layer.
struct LayerCursor {
    staff: u32,
    layer: u32,
    time: f64,
    /// Product of the ratios of the enclosing tuplets.
    ratio: f64,
    measure_beats: f64,
}

fn align_horizontally(doc: &mut Document, ctx: &mut LayoutContext) -> Result<()> {
    let mut state = ScoreState::default();
    let mut previous_last: Option<NodeId> = None;

    for system in doc.systems()? {
        let mut pending: Vec<StaffChanges> = Vec::new();
        let mut last: Option<NodeId> = None;
        for child in doc.children(system)?.to_vec() {
            match doc.kind(child)? {
                NodeKind::ScoreDef(def) => {
                    let def = def.clone();
                    let was_empty = state.is_empty();
                    let changes = state.apply(&def);
                    match (last, previous_last) {
                        (None, Some(previous)) if !was_empty => {
                            add_cautionary(doc, previous, &changes, &state, ctx)?;
                        }
                        (None, _) => {}
                        (Some(_), _) => merge_changes(&mut pending, changes),
                    }
                }
                NodeKind::Measure(_) => {
                    if state.is_empty() {
                        return Err(LayoutError::MissingScoreDef);
                    }
                    let attributes = match last {
                        None => state.opening(),
                        Some(_) => std::mem::take(&mut pending),
                    };
                    align_measure(doc, child, &mut state, &attributes, ctx)?;
                    last = Some(child);
                }
                _ => {}
            }
        }
        if last.is_some() {
            previous_last = last;
        }
    }
    Ok(())
}

/// Fold successive changes between two measures into one set.
fn merge_changes(pending: &mut Vec<StaffChanges>, changes: Vec<StaffChanges>) {
    for change in changes {
        match pending.iter_mut().find(|p| p.n == change.n) {
            Some(p) => {
                p.clef = change.clef.or(p.clef);
                p.key = change.key.or(p.key);
                p.meter = change.meter.or(p.meter);
                p.mensur = change.mensur.or(p.mensur);
            }
            None => pending.push(change),
        }
    }
}

/// Announce the changes opening a system at the end of the previous one.
fn add_cautionary(
    doc: &mut Document,
    measure: NodeId,
    changes: &[StaffChanges],
    state: &ScoreState,
    ctx: &LayoutContext,
) -> Result<()> {
    let items = attribute_items(changes, state, AttributeRole::Caution, ctx.metrics, ctx.unit());
    let track = &mut doc.measure_mut(measure)?.track;
    for (staff, category, width) in items {
        // trailing slots are placed at the measure duration
        track
            .slot_at(0.0, category)?
            .refs
            .push(SlotRef::Attribute { staff, width });
    }
    Ok(())
}

fn align_measure(
    doc: &mut Document,
    measure: NodeId,
    state: &mut ScoreState,
    attributes: &[StaffChanges],
    ctx: &mut LayoutContext,
) -> Result<()> {
    let mut track = MeasureTrack::new();
    let (measure_beats, beats_per_tstamp) = state
        .staves
        .first()
        .map_or((4.0, 1.0), |s| (s.measure_beats(), s.beats_per_tstamp()));
    let mut timestamps = TimestampAnchors::new(beats_per_tstamp);

    for staff in &state.staves {
        track.set_staff_size(staff.n, staff.scale);
    }
    for (staff, category, width) in
        attribute_items(attributes, state, AttributeRole::ScoreDef, ctx.metrics, ctx.unit())
    {
        track
            .slot_at(0.0, category)?
            .refs
            .push(SlotRef::Attribute { staff, width });
    }
    if let Some(form) = doc.measure(measure)?.left {
        let width = ctx.metrics.width(Glyph::BarLine(form), DEFAULT_SCALE);
        track
            .slot_at(0.0, SlotCategory::LeftBarLine)?
            .refs
            .push(SlotRef::BarLine { form, width });
    }

    for child in doc.children(measure)?.to_vec() {
        match doc.kind(child)? {
            NodeKind::Staff(staff) => {
                let n = staff.n;
                if state.staff(n).is_none() {
                    return Err(LayoutError::UndeclaredStaff(n));
                }
                for layer in doc.children(child)?.to_vec() {
                    let NodeKind::Layer(l) = doc.kind(layer)? else {
                        continue;
                    };
                    let mut cursor = LayerCursor {
                        staff: n,
                        layer: l.n,
                        time: 0.0,
                        ratio: 1.0,
                        measure_beats,
                    };
                    for element in doc.children(layer)?.to_vec() {
                        align_element(doc, element, &mut track, &mut cursor, state)?;
                    }
                    flush_graces(&mut track, cursor.staff, cursor.layer)?;
                    track.report_layer_duration(cursor.time);
                }
            }
            NodeKind::Control(event) => {
                for anchor in [Some(event.start), event.end].into_iter().flatten() {
                    if let Anchor::Tstamp(tstamp) = anchor {
                        timestamps.get_or_insert(tstamp);
                    }
                }
            }
            _ => {}
        }
    }

    if track.has_multiple_layers() {
        ctx.report.warn(LayoutWarning::MultipleLayers {
            measure,
            durations: track.layer_durations().to_vec(),
        });
    }
    if track.max_time() <= 0.0 {
        ctx.report.warn(LayoutWarning::EmptyMeasure { measure });
    }
    log::debug!(
        "measure {measure}: {} slots, duration {}",
        track.len(),
        track.max_time()
    );

    let m = doc.measure_mut(measure)?;
    m.track = track;
    m.timestamps = timestamps;
    Ok(())
}

fn align_element(
    doc: &mut Document,
    id: NodeId,
    track: &mut MeasureTrack,
    cursor: &mut LayerCursor,
    state: &mut ScoreState,
) -> Result<()> {
    let element = SlotRef::Element {
        node: id,
        staff: cursor.staff,
    };
    let clef = state
        .staff(cursor.staff)
        .map(|s| s.clef)
        .ok_or(LayoutError::UndeclaredStaff(cursor.staff))?;

    match doc.kind(id)? {
        NodeKind::Note(note) => {
            let (grace, dur, pitch) = (note.grace, note.dur, note.pitch);
            let length = dur.dotted_beats(note.dots);
            doc.note_mut(id)?.layout.loc = clef.loc(pitch);
            if grace {
                push_grace(track, cursor, id, length * cursor.ratio)?;
            } else {
                track.note_duration(dur);
                track.slot_at(cursor.time, SlotCategory::Default)?.refs.push(element);
                cursor.time += length * cursor.ratio;
            }
        }
        NodeKind::Chord(chord) => {
            let (grace, dur, length) = (chord.grace, chord.dur, chord.dur.dotted_beats(chord.dots));
            let mut notes = Vec::new();
            for child in doc.children(id)?.to_vec() {
                if let NodeKind::Note(note) = doc.kind(child)? {
                    let loc = clef.loc(note.pitch);
                    doc.note_mut(child)?.layout.loc = loc;
                    notes.push(child);
                }
            }
            if grace {
                // a grace chord is a single entry of the group
                push_grace(track, cursor, id, length * cursor.ratio)?;
            } else {
                track.note_duration(dur);
                track
                    .slot_at(cursor.time, SlotCategory::Container)?
                    .refs
                    .push(element);
                let slot = track.slot_at(cursor.time, SlotCategory::Default)?;
                for note in notes {
                    slot.refs.push(SlotRef::Element {
                        node: note,
                        staff: cursor.staff,
                    });
                }
                cursor.time += length * cursor.ratio;
            }
        }
        NodeKind::Rest(rest) => {
            let (dur, length) = (rest.dur, rest.dur.dotted_beats(rest.dots));
            track.note_duration(dur);
            track.slot_at(cursor.time, SlotCategory::Default)?.refs.push(element);
            cursor.time += length * cursor.ratio;
        }
        NodeKind::Space(space) => {
            let length = space.dur.dotted_beats(space.dots);
            track.slot_at(cursor.time, SlotCategory::Default)?.refs.push(element);
            cursor.time += length * cursor.ratio;
        }
        NodeKind::MRest => {
            track.slot_at(cursor.time, SlotCategory::Default)?.refs.push(element);
            cursor.time += cursor.measure_beats;
        }
        NodeKind::Beam => {
            track
                .slot_at(cursor.time, SlotCategory::Container)?
                .refs
                .push(element);
            for child in doc.children(id)?.to_vec() {
                align_element(doc, child, track, cursor, state)?;
            }
        }
        NodeKind::Tuplet(tuplet) => {
            if tuplet.num == 0 || tuplet.numbase == 0 {
                return Err(LayoutError::InvalidTuplet(id));
            }
            let ratio = tuplet.numbase as f64 / tuplet.num as f64;
            track
                .slot_at(cursor.time, SlotCategory::Container)?
                .refs
                .push(element);
            let outer = cursor.ratio;
            cursor.ratio *= ratio;
            for child in doc.children(id)?.to_vec() {
                align_element(doc, child, track, cursor, state)?;
            }
            cursor.ratio = outer;
        }
        NodeKind::Clef(new_clef) => {
            let new_clef = *new_clef;
            if let Some(staff) = state.staff_mut(cursor.staff) {
                staff.clef = new_clef;
            }
            track.slot_at(cursor.time, SlotCategory::Clef)?.refs.push(element);
        }
        NodeKind::KeySig(key) => {
            let key = *key;
            if let Some(staff) = state.staff_mut(cursor.staff) {
                staff.key = Some(key);
            }
            track.slot_at(cursor.time, SlotCategory::KeySig)?.refs.push(element);
        }
        NodeKind::MeterSig(meter) => {
            let meter = *meter;
            if let Some(staff) = state.staff_mut(cursor.staff) {
                staff.meter = Some(meter);
            }
            track
                .slot_at(cursor.time, SlotCategory::MeterSig)?
                .refs
                .push(element);
        }
        NodeKind::Mensur(mensur) => {
            let mensur = *mensur;
            if let Some(staff) = state.staff_mut(cursor.staff) {
                staff.mensur = Some(mensur);
            }
            track.slot_at(cursor.time, SlotCategory::Mensur)?.refs.push(element);
        }
        NodeKind::BarLine(_) => {
            track.slot_at(cursor.time, SlotCategory::BarLine)?.refs.push(element);
        }
        NodeKind::Accid { .. } => {
            track.slot_at(cursor.time, SlotCategory::Accid)?.refs.push(element);
        }
        NodeKind::Dot => {
            track.slot_at(cursor.time, SlotCategory::Dot)?.refs.push(element);
        }
        _ => {}
    }
    Ok(())
}

fn push_grace(
    track: &mut MeasureTrack,
    cursor: &LayerCursor,
    node: NodeId,
    duration: f64,
) -> Result<()> {
    track
        .slot_at(cursor.time, SlotCategory::GraceNote)?
        .grace_track_mut(cursor.staff, cursor.layer)
        .push(GraceEntry { node, duration })
}

/// Close the grace groups of one voice at the end of its layer.
fn flush_graces(track: &mut MeasureTrack, staff: u32, layer: u32) -> Result<()> {
    for slot in track.slots_mut() {
        if let Some(grace) = slot.grace_tracks.get_mut(&(staff, layer)) {
            if !grace.is_flushed() {
                grace.flush()?;
            }
        }
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
// Pass 2: natural spacing
// ═══════════════════════════════════════════════════════════════════════

/// Space for an interval of `beats` quarter beats.
///
/// `doublings` is how many times the longest duration of the measure
/// exceeds a whole note; long values then compress as if they were whole
/// notes.
pub fn duration_spacing(beats: f64, doublings: i32, options: &LayoutOptions) -> i32 {
    if beats <= 0.0 {
        return 0;
    }
    let ticks = beats / 4.0 * WHOLE_NOTE_TICKS / 2f64.powi(doublings);
    let space = ticks.powf(options.spacing_non_linear)
        * options.spacing_linear
        * 10.0
        * options.unit as f64
        / REFERENCE_UNIT;
    space.round() as i32
}

fn space_measure(track: &mut MeasureTrack, options: &LayoutOptions) {
    let doublings = track
        .longest_actual()
        .map_or(0, Duration::doublings_beyond_whole);
    let empty = track.max_time() <= 0.0;
    let empty_width = (EMPTY_MEASURE_UNITS * options.unit as f64).round() as i32;

    let mut previous_time = 0.0;
    let mut x = options.unit;
    let mut reached_trailing = false;
    let slots = track.slots_mut();
    for (i, slot) in slots.iter_mut().enumerate() {
        slot.pending_shift_x = 0;
        slot.max_width = 0;
        if i == 0 {
            slot.relative_x = 0;
            continue;
        }
        if slot.category.is_trailing() {
            if !reached_trailing {
                reached_trailing = true;
                x += if empty {
                    empty_width
                } else {
                    duration_spacing(slot.time - previous_time, doublings, options)
                };
                previous_time = slot.time;
            }
        } else if slot.time > previous_time {
            // a grace group shares the column of its principal note
            x += duration_spacing(slot.time - previous_time, doublings, options);
            previous_time = slot.time;
        }
        slot.relative_x = x;
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Pass 3: extents and shift integration
// ═══════════════════════════════════════════════════════════════════════

fn layout_measure(doc: &mut Document, measure: NodeId, ctx: &mut LayoutContext) -> Result<()> {
    let (mut track, mut timestamps) = {
        let m = doc.measure_mut(measure)?;
        (std::mem::take(&mut m.track), std::mem::take(&mut m.timestamps))
    };
    space_measure(&mut track, ctx.options);
    register_extents(doc, measure, &mut track, ctx)?;
    integrate(&mut track);
    push_containers_right(&mut track);
    timestamps.position(&track);
    log::debug!("measure {measure}: natural width {}", track.width());
    {
        let m = doc.measure_mut(measure)?;
        m.track = track;
        m.timestamps = timestamps;
    }
    write_positions(doc, measure, ctx)?;
    for control in place_controls(doc, measure, ctx)? {
        ctx.report.warn(LayoutWarning::UnresolvedAnchor { control });
    }
    Ok(())
}

fn register_extents(
    doc: &Document,
    measure: NodeId,
    track: &mut MeasureTrack,
    ctx: &LayoutContext,
) -> Result<()> {
    let form = doc.measure(measure)?.right;
    let right_ref = track.right_ref();
    track.slots_mut()[right_ref].refs.push(SlotRef::BarLine {
        form,
        width: ctx.metrics.width(Glyph::BarLine(form), DEFAULT_SCALE),
    });

    let sizes: BTreeMap<u32, u16> = track
        .slots()
        .iter()
        .flat_map(|s| s.refs.iter())
        .filter_map(|r| match r {
            SlotRef::Element { staff, .. } | SlotRef::Attribute { staff, .. } => Some(*staff),
            SlotRef::BarLine { .. } => None,
        })
        .map(|staff| (staff, track.staff_size(staff)))
        .collect();
    let size_of = |staff: u32| sizes.get(&staff).copied().unwrap_or(DEFAULT_SCALE);

    for slot in track.slots_mut() {
        let mut grace_extents = Vec::new();
        for (&(staff, _), grace) in slot.grace_tracks.iter_mut() {
            let size = grace_size(size_of(staff));
            for grace_slot in grace.slots_mut() {
                let elements: Vec<_> = grace_slot.elements().collect();
                for (node, staff) in elements {
                    if let Some(extent) = element_extent(doc, node, size, ctx)? {
                        grace_slot.add_extent(StaffKey::Staff(staff), extent);
                    }
                }
            }
            let (left, right) = grace.align(ctx.units(GRACE_CLEARANCE, size));
            grace_extents.push((
                staff,
                Extent::new(left, right, ctx.units(NOTE_MARGIN, size_of(staff))),
            ));
        }
        for (staff, extent) in grace_extents {
            slot.add_extent(StaffKey::Staff(staff), extent);
        }

        for slot_ref in slot.refs.clone() {
            match slot_ref {
                SlotRef::Element { node, staff } => {
                    if let Some(extent) = element_extent(doc, node, size_of(staff), ctx)? {
                        slot.add_extent(StaffKey::Staff(staff), extent);
                    }
                }
                SlotRef::Attribute { staff, width } => {
                    let margin = ctx.units(ATTRIBUTE_MARGIN, size_of(staff));
                    slot.add_extent(StaffKey::Staff(staff), Extent::new(0, width, margin));
                }
                SlotRef::BarLine { width, .. } => {
                    let margin = ctx.units(BARLINE_MARGIN, DEFAULT_SCALE);
                    slot.add_extent(StaffKey::All, Extent::new(0, width, margin));
                }
            }
        }
    }
    Ok(())
}

pub(crate) fn grace_size(staff_size: u16) -> u16 {
    (staff_size as u32 * GRACE_SIZE as u32 / 100) as u16
}

/// Duration, dots and accidental of a note, taking the first two from the
/// enclosing chord when there is one.
fn note_shape(doc: &Document, id: NodeId) -> Result<(Duration, u8, Option<Accidental>)> {
    let note = doc.note(id)?;
    if let Some(parent) = doc.parent(id)? {
        if let NodeKind::Chord(chord) = doc.kind(parent)? {
            return Ok((chord.dur, chord.dots.max(note.dots), note.accid));
        }
    }
    Ok((note.dur, note.dots, note.accid))
}

fn dots_width(dots: u8, size: u16, ctx: &LayoutContext) -> i32 {
    dots as i32 * (ctx.units(DOT_GAP, size) + ctx.metrics.width(Glyph::Dot, size))
}

fn accid_width(accid: Option<Accidental>, size: u16, ctx: &LayoutContext) -> i32 {
    accid.map_or(0, |a| {
        ctx.metrics.width(Glyph::Accid(a), size) + ctx.units(ACCID_GAP, size)
    })
}

fn note_extent(
    dur: Duration,
    dots: u8,
    accid: Option<Accidental>,
    size: u16,
    ctx: &LayoutContext,
) -> Extent {
    Extent::new(
        accid_width(accid, size, ctx),
        ctx.metrics.width(Glyph::Notehead(dur), size) + dots_width(dots, size, ctx),
        ctx.units(NOTE_MARGIN, size),
    )
}

/// Extent of one element around its slot, `None` for elements that take
/// no room of their own.
fn element_extent(
    doc: &Document,
    id: NodeId,
    size: u16,
    ctx: &LayoutContext,
) -> Result<Option<Extent>> {
    let metrics = ctx.metrics;
    let attribute_margin = ctx.units(ATTRIBUTE_MARGIN, size);
    let extent = match doc.kind(id)? {
        NodeKind::Note(_) => {
            let (dur, dots, accid) = note_shape(doc, id)?;
            note_extent(dur, dots, accid, size, ctx)
        }
        NodeKind::Chord(chord) if chord.grace => {
            let mut extent = Extent::new(0, 0, ctx.units(NOTE_MARGIN, size));
            for child in doc.children(id)? {
                if let NodeKind::Note(note) = doc.kind(*child)? {
                    extent.merge(note_extent(chord.dur, chord.dots, note.accid, size, ctx));
                }
            }
            extent
        }
        NodeKind::Rest(rest) => Extent::new(
            0,
            metrics.width(Glyph::Rest(rest.dur), size) + dots_width(rest.dots, size, ctx),
            ctx.units(NOTE_MARGIN, size),
        ),
        NodeKind::MRest => Extent::new(
            0,
            metrics.width(Glyph::Rest(Duration::Whole), size),
            ctx.units(NOTE_MARGIN, size),
        ),
        NodeKind::Clef(clef) => Extent::new(0, clef_width(*clef, size, metrics), attribute_margin),
        NodeKind::KeySig(key) => Extent::new(
            0,
            key_width(*key, None, size, metrics, ctx.unit()),
            attribute_margin,
        ),
        NodeKind::MeterSig(meter) => {
            Extent::new(0, meter_width(*meter, size, metrics), attribute_margin)
        }
        NodeKind::Mensur(_) => Extent::new(0, metrics.width(Glyph::Mensur, size), attribute_margin),
        NodeKind::BarLine(bar) => Extent::new(
            0,
            metrics.width(Glyph::BarLine(bar.form), size),
            ctx.units(BARLINE_MARGIN, size),
        ),
        NodeKind::Accid { accid } => Extent::new(
            accid_width(Some(*accid), size, ctx),
            0,
            ctx.units(NOTE_MARGIN, size),
        ),
        NodeKind::Dot => Extent::new(
            0,
            metrics.width(Glyph::Dot, size),
            ctx.units(DOT_GAP, size),
        ),
        _ => return Ok(None),
    };
    Ok(Some(extent))
}

/// Cumulative shift and the right edge reached so far on every staff.
struct ShiftAccumulator {
    shift: i32,
    edges: BTreeMap<StaffKey, i32>,
}

impl ShiftAccumulator {
    fn new() -> Self {
        Self {
            shift: 0,
            edges: BTreeMap::from([(StaffKey::All, 0)]),
        }
    }

    /// Right edge content on `key` must clear. Barlines clear every staff.
    fn edge(&self, key: StaffKey) -> i32 {
        let all = self.edges.get(&StaffKey::All).copied().unwrap_or(0);
        match key {
            StaffKey::All => self.edges.values().copied().max().unwrap_or(0),
            StaffKey::Staff(_) => self.edges.get(&key).copied().unwrap_or(all).max(all),
        }
    }

    fn record(&mut self, key: StaffKey, edge: i32) {
        let entry = self.edges.entry(key).or_insert(edge);
        *entry = (*entry).max(edge);
    }
}

fn integrate(track: &mut MeasureTrack) {
    let mut acc = ShiftAccumulator::new();
    for (i, slot) in track.slots_mut().iter_mut().enumerate() {
        if i > 0 {
            slot.relative_x += acc.shift;
        }
        let mut needed = slot
            .extents
            .iter()
            .map(|(key, e)| acc.edge(*key) + e.margin - (slot.relative_x - e.left))
            .max()
            .unwrap_or(0)
            .max(0);
        if slot.category == SlotCategory::MeasureEnd {
            needed = needed.max(acc.edge(StaffKey::All) - slot.relative_x);
        }
        slot.pending_shift_x = needed;
        slot.relative_x += needed;
        acc.shift += needed;
        for (key, extent) in &slot.extents {
            acc.record(*key, slot.relative_x + extent.right);
        }
        slot.max_width = slot.right_extent();
    }
}

/// Beams, tuplets and chords sit on the first content they enclose.
fn push_containers_right(track: &mut MeasureTrack) {
    let slots = track.slots_mut();
    for i in (0..slots.len()).rev() {
        if slots[i].category != SlotCategory::Container {
            continue;
        }
        if let Some(next) = slots[i + 1..]
            .iter()
            .find(|s| s.category != SlotCategory::Container)
        {
            slots[i].relative_x = next.relative_x;
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Write-back
// ═══════════════════════════════════════════════════════════════════════

/// Copy slot positions to the elements of a measure and refresh its
/// output fields.
pub(crate) fn write_positions(
    doc: &mut Document,
    measure: NodeId,
    ctx: &LayoutContext,
) -> Result<()> {
    let track = std::mem::take(&mut doc.measure_mut(measure)?.track);
    let placed = place_track(doc, &track, ctx);
    let width = track.width();
    let barline_x = track.slots()[track.right_ref()].relative_x;
    let m = doc.measure_mut(measure)?;
    m.track = track;
    m.attributes = placed?;
    m.width = width;
    m.barline_x = barline_x;
    Ok(())
}

fn place_track(
    doc: &mut Document,
    track: &MeasureTrack,
    ctx: &LayoutContext,
) -> Result<Vec<DrawnAttribute>> {
    let mut attributes = Vec::new();
    for slot in track.slots() {
        for slot_ref in &slot.refs {
            match *slot_ref {
                SlotRef::Element { node, staff } => {
                    place_element(doc, node, slot.relative_x, track.staff_size(staff), ctx)?;
                }
                SlotRef::Attribute { staff, width } => attributes.push(DrawnAttribute {
                    staff,
                    category: slot.category,
                    x_rel: slot.relative_x,
                    width,
                }),
                SlotRef::BarLine { .. } => {}
            }
        }
        for (&(staff, _), grace) in &slot.grace_tracks {
            let size = grace_size(track.staff_size(staff));
            for grace_slot in grace.slots() {
                for (node, _) in grace_slot.elements() {
                    let x = slot.relative_x + grace_slot.relative_x;
                    place_element(doc, node, x, size, ctx)?;
                }
            }
        }
    }
    Ok(attributes)
}

fn place_element(
    doc: &mut Document,
    id: NodeId,
    x: i32,
    size: u16,
    ctx: &LayoutContext,
) -> Result<()> {
    doc.set_x(id, x)?;
    let gap = ctx.units(DOT_GAP, size);
    match doc.kind(id)? {
        NodeKind::Note(_) => {
            let (dur, dots, accid) = note_shape(doc, id)?;
            let head = ctx.metrics.width(Glyph::Notehead(dur), size);
            let layout = &mut doc.note_mut(id)?.layout;
            layout.accid_x = accid.map(|_| x - accid_width(accid, size, ctx));
            layout.dots_x = (dots > 0).then_some(x + head + gap);
        }
        NodeKind::Chord(chord) => {
            let head = ctx.metrics.width(Glyph::Notehead(chord.dur), size);
            let (grace, dots) = (chord.grace, chord.dots);
            let notes = doc.children(id)?.to_vec();
            if let NodeKind::Chord(chord) = &mut doc.node_mut(id)?.kind {
                chord.dots_x = (dots > 0).then_some(x + head + gap);
            }
            // notes of regular chords have slot entries of their own
            if grace {
                for note in notes {
                    if matches!(doc.kind(note)?, NodeKind::Note(_)) {
                        place_element(doc, note, x, size, ctx)?;
                    }
                }
            }
        }
        NodeKind::Rest(rest) => {
            let dots_x = (rest.dots > 0)
                .then(|| x + ctx.metrics.width(Glyph::Rest(rest.dur), size) + gap);
            if let NodeKind::Rest(rest) = &mut doc.node_mut(id)?.kind {
                rest.dots_x = dots_x;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Glyph drawn for a control event, `None` for text.
pub(crate) fn control_glyph(kind: ControlKind) -> Option<Glyph> {
    match kind {
        ControlKind::Dir | ControlKind::Tempo => None,
        ControlKind::Dynam => Some(Glyph::Dynamic),
        ControlKind::Hairpin => Some(Glyph::Hairpin),
        ControlKind::Slur | ControlKind::Tie => Some(Glyph::Slur),
        ControlKind::Octave => Some(Glyph::Octave),
        ControlKind::Pedal => Some(Glyph::Pedal),
        ControlKind::Fermata => Some(Glyph::Fermata),
    }
}

fn intrinsic_width(kind: ControlKind, text: Option<&str>, ctx: &LayoutContext) -> i32 {
    match (text, control_glyph(kind)) {
        (Some(text), _) => ctx.metrics.text_width(text, DEFAULT_SCALE),
        (None, Some(glyph)) => ctx.metrics.width(glyph, DEFAULT_SCALE),
        (None, None) => 0,
    }
}

/// X of an anchor within `measure`, `None` when it cannot be resolved there.
fn anchor_x(doc: &Document, measure: NodeId, anchor: Anchor) -> Result<Option<i32>> {
    match anchor {
        Anchor::Tstamp(tstamp) => Ok(doc.measure(measure)?.timestamps.find(tstamp).map(|a| a.x)),
        Anchor::Element(id) => {
            let Some(node) = doc.get(id) else {
                return Ok(None);
            };
            let owner = doc.ancestor(id, NodeKind::is_measure)?;
            Ok((owner == Some(measure)).then_some(node.pos.x_rel))
        }
    }
}

/// Place the control events of a measure. Returns the events whose start
/// could not be resolved; they are left at the measure origin.
pub(crate) fn place_controls(
    doc: &mut Document,
    measure: NodeId,
    ctx: &LayoutContext,
) -> Result<Vec<NodeId>> {
    let barline_x = doc.measure(measure)?.barline_x;
    let mut unresolved = Vec::new();
    for child in doc.children(measure)?.to_vec() {
        let NodeKind::Control(event) = doc.kind(child)? else {
            continue;
        };
        let (kind, start, end) = (event.kind, event.start, event.end);
        let intrinsic = intrinsic_width(kind, event.text.as_deref(), ctx);
        let Some(start_x) = anchor_x(doc, measure, start)? else {
            unresolved.push(child);
            doc.set_x(child, 0)?;
            doc.control_mut(child)?.width = intrinsic;
            continue;
        };
        let width = match end {
            // an end in a later measure runs to the barline
            Some(end) => (anchor_x(doc, measure, end)?.unwrap_or(barline_x) - start_x).max(0),
            None => intrinsic,
        };
        doc.set_x(child, start_x)?;
        doc.control_mut(child)?.width = width;
    }
    Ok(unresolved)
}

/// Lay the measures of a system end to end.
pub(crate) fn position_measures(doc: &mut Document, system: NodeId) -> Result<()> {
    let mut x = 0;
    for measure in doc.system_measures(system)? {
        doc.set_x(measure, x)?;
        x += doc.measure(measure)?.width;
    }
    doc.system_mut(system)?.width = x;
    Ok(())
}
