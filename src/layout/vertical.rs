//! Vertical layout of systems.
//!
//! Every system gets one [`StaffSlot`] per declared staff. Noteheads, stems,
//! lyrics and floating control events widen the overflow of their staff;
//! the staves are then stacked top-down so that neighbouring overflows
//! never meet.

use std::collections::BTreeMap;

use super::attributes::ScoreState;
use super::horizontal::{control_glyph, grace_size};
use super::{LayoutContext, StaffSlot, SystemTrack};
use crate::error::{LayoutWarning, Result};
use crate::model::{Document, Duration, NodeId, NodeKind, Placement, StemDir};

/// Stem length in drawing units.
const STEM_UNITS: i32 = 7;
/// Clearance between a staff's content and its first floating object.
const CONTROL_MARGIN: f64 = 1.0;
/// Clearance between two stacked floating objects.
const CONTROL_GAP: f64 = 0.5;
/// Minimum distance from the staff to the first lyric line.
const LYRIC_MIN_MARGIN: f64 = 2.0;
/// Height of a staff without lines, in drawing units.
const MIN_STAFF_UNITS: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Side {
    Above,
    Below,
}

/// Floating objects with the same key are aligned on their outermost offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum GroupKey {
    Explicit(u32),
    /// Directives opening an ending.
    EndingStart(NodeId),
}

/// A control event placed beside its staff.
#[derive(Debug, Clone)]
struct FloatingBox {
    node: NodeId,
    staff: u32,
    side: Side,
    x0: i32,
    x1: i32,
    /// Distance from the staff edge (top line or bottom line).
    offset: i32,
    height: i32,
    group: Option<GroupKey>,
    directive: bool,
}

/// Lay out every system of a page-based document vertically. Horizontal
/// layout must have run: floating objects are stacked by their x span.
pub(crate) fn layout_vertical(doc: &mut Document, ctx: &mut LayoutContext) -> Result<()> {
    let mut state = ScoreState::default();
    for system in doc.systems()? {
        let mut measures = Vec::new();
        let mut ending_starts = Vec::new();
        let mut ending_open = false;
        for child in doc.children(system)?.to_vec() {
            match doc.kind(child)? {
                NodeKind::ScoreDef(def) => {
                    let def = def.clone();
                    state.apply(&def);
                }
                NodeKind::Ending(_) => ending_open = true,
                NodeKind::Measure(_) => {
                    if std::mem::take(&mut ending_open) {
                        ending_starts.push(child);
                    }
                    measures.push(child);
                }
                _ => {}
            }
        }

        let mut track = SystemTrack::new();
        create_slots(doc, &measures, &state, &mut track, ctx)?;
        for &measure in &measures {
            accumulate_note_overflow(doc, measure, &mut track, ctx)?;
        }
        add_lyrics(&mut track, ctx);
        let boxes = stack_controls(doc, &measures, &ending_starts, &mut track, ctx)?;
        integrate_shifts(&mut track, ctx.options.minimum_staff_spacing);
        resolve_overlaps(&mut track, ctx.options.minimum_staff_spacing);
        write_positions(doc, &measures, &track, &boxes, ctx)?;

        log::debug!(
            "system {system}: {} staves, height {}",
            track.len(),
            track.height()
        );
        let s = doc.system_mut(system)?;
        s.height = track.height();
        s.track = track;
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
// Pass 1: staff slots
// ═══════════════════════════════════════════════════════════════════════

pub(crate) fn staff_height(lines: u8, size: u16, unit: i32) -> i32 {
    let lines = if lines == 0 {
        MIN_STAFF_UNITS
    } else {
        (lines as i32 - 1) * 2
    };
    lines * unit * size as i32 / 100
}

fn first_staff_instance(doc: &Document, measures: &[NodeId], n: u32) -> Result<Option<NodeId>> {
    for &measure in measures {
        for &child in doc.children(measure)? {
            if matches!(doc.kind(child)?, NodeKind::Staff(s) if s.n == n) {
                return Ok(Some(child));
            }
        }
    }
    Ok(None)
}

fn verse_count(doc: &Document, staff: NodeId) -> Result<u8> {
    let mut verses = 0;
    for id in doc.descendants(staff)? {
        if let NodeKind::Note(note) = doc.kind(id)? {
            verses = verses.max(note.lyrics.len() as u8);
        }
    }
    Ok(verses)
}

fn create_slots(
    doc: &Document,
    measures: &[NodeId],
    state: &ScoreState,
    track: &mut SystemTrack,
    ctx: &mut LayoutContext,
) -> Result<()> {
    for (index, staff) in state.staves.iter().enumerate() {
        let instance = first_staff_instance(doc, measures, staff.n)?;
        let verses = match instance {
            Some(id) => verse_count(doc, id)?,
            None => 0,
        };
        if staff.lines == 0 {
            ctx.report.warn(LayoutWarning::NoStaffLines { staff: staff.n });
        }
        let height = staff_height(staff.lines, staff.scale, ctx.unit());
        track.get_or_create(index, || StaffSlot {
            staff: instance,
            lines: staff.lines,
            size: staff.scale,
            staff_height: height,
            verse_count: verses,
            ..StaffSlot::new(staff.n)
        })?;
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
// Pass 2: overflow
// ═══════════════════════════════════════════════════════════════════════

/// Stem direction: encoded on the note or its chord, otherwise away from
/// the middle line.
fn stem_direction(doc: &Document, note: NodeId, loc: i32, lines: u8) -> Result<StemDir> {
    let mut stem = doc.note(note)?.stem;
    if stem.is_none() {
        if let Some(parent) = doc.parent(note)? {
            if let NodeKind::Chord(chord) = doc.kind(parent)? {
                stem = chord.stem;
            }
        }
    }
    let middle = lines.max(1) as i32 - 1;
    Ok(stem.unwrap_or(if loc >= middle {
        StemDir::Down
    } else {
        StemDir::Up
    }))
}

/// Distance from the top line to a staff position.
fn loc_to_y(loc: i32, lines: u8, size: u16, unit: i32) -> i32 {
    let top = (lines.max(1) as i32 - 1) * 2;
    (top - loc) * unit * size as i32 / 100
}

fn accumulate_note_overflow(
    doc: &Document,
    measure: NodeId,
    track: &mut SystemTrack,
    ctx: &LayoutContext,
) -> Result<()> {
    let unit = ctx.unit();
    for &staff_node in doc.children(measure)? {
        let NodeKind::Staff(staff) = doc.kind(staff_node)? else {
            continue;
        };
        let Some(slot) = track.slot_mut(staff.n) else {
            continue;
        };
        for id in doc.descendants(staff_node)? {
            let NodeKind::Note(note) = doc.kind(id)? else {
                continue;
            };
            let size = if note.grace {
                grace_size(slot.size)
            } else {
                slot.size
            };
            let y = loc_to_y(note.layout.loc, slot.lines, slot.size, unit);
            let head = unit * size as i32 / 100;
            let stem = if note.dur <= Duration::Whole {
                0
            } else {
                STEM_UNITS * unit * size as i32 / 100
            };
            let (up, down) = match stem_direction(doc, id, note.layout.loc, slot.lines)? {
                StemDir::Up => (stem, 0),
                StemDir::Down => (0, stem),
            };
            slot.set_overflow_above(head + up - y);
            slot.set_overflow_below(y + head + down - slot.staff_height);
            slot.set_verse_count(note.lyrics.len() as u8);
        }
    }
    Ok(())
}

fn add_lyrics(track: &mut SystemTrack, ctx: &LayoutContext) {
    for slot in track.slots_mut() {
        if slot.verse_count == 0 {
            continue;
        }
        let margin = ctx.units(LYRIC_MIN_MARGIN, slot.size);
        let line = ctx.metrics.text_height(slot.size);
        slot.overflow_below = slot.overflow_below.max(margin) + slot.verse_count as i32 * line;
    }
}

fn stack_controls(
    doc: &Document,
    measures: &[NodeId],
    ending_starts: &[NodeId],
    track: &mut SystemTrack,
    ctx: &LayoutContext,
) -> Result<Vec<FloatingBox>> {
    let mut boxes: Vec<FloatingBox> = Vec::new();
    for &measure in measures {
        let measure_x = doc.node(measure)?.pos.x_rel;
        let ending_start = ending_starts.contains(&measure);
        for &child in doc.children(measure)? {
            let NodeKind::Control(event) = doc.kind(child)? else {
                continue;
            };
            let side = match event.placement() {
                Placement::Above => Side::Above,
                Placement::Below => Side::Below,
                Placement::Within => continue,
            };
            let Some(slot) = track.slot(event.staff) else {
                continue;
            };
            let height = match (&event.text, control_glyph(event.kind)) {
                (None, Some(glyph)) => ctx.metrics.height(glyph, slot.size),
                _ => ctx.metrics.text_height(slot.size),
            };
            let x0 = measure_x + doc.node(child)?.pos.x_rel;
            let x1 = x0 + event.width.max(1);
            let directive = event.kind.is_directive();
            let group = event.group.map(GroupKey::Explicit).or_else(|| {
                (ending_start && directive).then_some(GroupKey::EndingStart(measure))
            });
            let base = ctx.units(CONTROL_MARGIN, slot.size)
                + match side {
                    Side::Above => slot.overflow_above,
                    Side::Below => slot.overflow_below,
                };
            let gap = ctx.units(CONTROL_GAP, slot.size);
            let offset = boxes
                .iter()
                .filter(|b| b.staff == event.staff && b.side == side && b.x0 < x1 && x0 < b.x1)
                .map(|b| b.offset + b.height + gap)
                .fold(base, i32::max);
            boxes.push(FloatingBox {
                node: child,
                staff: event.staff,
                side,
                x0,
                x1,
                offset,
                height,
                group,
                directive,
            });
        }
    }

    let mut outermost: BTreeMap<(u32, Side, GroupKey), i32> = BTreeMap::new();
    for b in &boxes {
        if let Some(group) = b.group {
            let entry = outermost.entry((b.staff, b.side, group)).or_insert(b.offset);
            *entry = (*entry).max(b.offset);
        }
    }
    for b in &mut boxes {
        if let Some(&offset) = b.group.and_then(|g| outermost.get(&(b.staff, b.side, g))) {
            b.offset = offset;
        }
    }

    for b in &boxes {
        let Some(slot) = track.slot_mut(b.staff) else {
            continue;
        };
        match b.side {
            Side::Above => {
                slot.set_overflow_above(b.offset + b.height);
                slot.directive_above |= b.directive;
            }
            Side::Below => {
                slot.set_overflow_below(b.offset + b.height);
                slot.directive_below |= b.directive;
            }
        }
    }
    Ok(boxes)
}

// ═══════════════════════════════════════════════════════════════════════
// Passes 3 and 4: stacking
// ═══════════════════════════════════════════════════════════════════════

/// Place every staff below the previous one with room for both overflows.
pub(crate) fn integrate_shifts(track: &mut SystemTrack, spacing: i32) {
    let slots = track.slots_mut();
    for i in 0..slots.len() {
        if i == 0 {
            slots[0].pending_shift_y = slots[0].overflow_above;
            slots[0].relative_y = slots[0].pending_shift_y;
            continue;
        }
        let (upper, lower) = (&slots[i - 1], &slots[i]);
        let clearance = if upper.verse_count > 0 {
            upper.overflow_below + lower.overflow_above
        } else {
            upper.overflow_below.max(lower.overflow_above)
        };
        let pending = clearance + spacing;
        let y = upper.bottom() + pending;
        slots[i].pending_shift_y = pending;
        slots[i].relative_y = y;
    }
    update_bottom(track);
}

/// Inject the space still missing between two staves and carry it down to
/// every following staff.
pub(crate) fn resolve_overlaps(track: &mut SystemTrack, spacing: i32) {
    let slots = track.slots_mut();
    let mut carried = 0;
    for i in 1..slots.len() {
        slots[i].relative_y += carried;
        let gap = slots[i].relative_y - slots[i - 1].bottom();
        let needed = slots[i - 1].overflow_below + slots[i].overflow_above + spacing;
        if gap < needed {
            slots[i].overlap = needed - gap;
            slots[i].relative_y += needed - gap;
            carried += needed - gap;
        } else {
            slots[i].overlap = 0;
        }
    }
    update_bottom(track);
}

fn update_bottom(track: &mut SystemTrack) {
    let bottom = track
        .slots()
        .last()
        .map_or(0, |last| last.bottom() + last.overflow_below);
    track.bottom_mut().relative_y = bottom;
}

// ═══════════════════════════════════════════════════════════════════════
// Write-back
// ═══════════════════════════════════════════════════════════════════════

fn write_positions(
    doc: &mut Document,
    measures: &[NodeId],
    track: &SystemTrack,
    boxes: &[FloatingBox],
    ctx: &LayoutContext,
) -> Result<()> {
    let unit = ctx.unit();
    for &measure in measures {
        doc.set_y(measure, 0)?;
        for child in doc.children(measure)?.to_vec() {
            match doc.kind(child)? {
                NodeKind::Staff(staff) => {
                    let Some(slot) = track.slot(staff.n) else {
                        continue;
                    };
                    doc.set_y(child, slot.relative_y)?;
                    for id in doc.descendants(child)? {
                        let y = match doc.kind(id)? {
                            NodeKind::Note(note) => {
                                loc_to_y(note.layout.loc, slot.lines, slot.size, unit)
                            }
                            NodeKind::Rest(_) | NodeKind::MRest => slot.staff_height / 2,
                            _ => continue,
                        };
                        doc.set_y(id, y)?;
                    }
                }
                NodeKind::Control(event) => {
                    // events above or below are placed from their box
                    if event.placement() == Placement::Within {
                        if let Some(slot) = track.slot(event.staff) {
                            doc.set_y(child, slot.relative_y)?;
                        }
                    }
                }
                _ => {}
            }
        }
    }
    for b in boxes {
        let Some(slot) = track.slot(b.staff) else {
            continue;
        };
        let y = match b.side {
            Side::Above => slot.relative_y - b.offset - b.height,
            Side::Below => slot.bottom() + b.offset,
        };
        doc.set_y(b.node, y)?;
    }
    Ok(())
}
