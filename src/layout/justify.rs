//! Horizontal justification of systems and vertical justification of pages.

use std::collections::BTreeMap;

use super::horizontal::{place_controls, position_measures, write_positions};
use super::{LayoutContext, MeasureTrack};
use crate::error::{LayoutWarning, Result};
use crate::model::{Document, NodeId, NodeKind};

/// Natural widths of a system: `(justifiable, fixed)`.
pub(crate) fn system_widths(doc: &Document, system: NodeId) -> Result<(i32, i32)> {
    let mut justifiable = 0;
    let mut natural = 0;
    for measure in doc.system_measures(system)? {
        let track = &doc.measure(measure)?.track;
        justifiable += track.justifiable_width();
        natural += track.width();
    }
    Ok((justifiable, natural - justifiable))
}

/// Stretch a system to the system width. Returns the ratio applied.
///
/// `last` marks the final system of the document, which is left natural
/// when it would be stretched beyond `1 / min_last_justification`.
pub(crate) fn justify_system(
    doc: &mut Document,
    system: NodeId,
    last: bool,
    ctx: &mut LayoutContext,
) -> Result<f64> {
    let (justifiable, fixed) = system_widths(doc, system)?;
    if justifiable <= 0 {
        doc.system_mut(system)?.justification = 1.0;
        return Ok(1.0);
    }
    let target = ctx.options.system_width();
    let mut ratio = (target - fixed) as f64 / justifiable as f64;

    let min_last = ctx.options.min_last_justification;
    if last && min_last > 0.0 && ratio > 1.0 / min_last {
        log::debug!("system {system}: last system left natural (ratio {ratio:.3})");
        doc.system_mut(system)?.justification = 1.0;
        return Ok(1.0);
    }
    if ratio < 1.0 {
        ctx.report
            .warn(LayoutWarning::JustificationUnderflow { system, ratio });
        ratio = 1.0;
    }

    for measure in doc.system_measures(system)? {
        {
            let m = doc.measure_mut(measure)?;
            stretch_measure(&mut m.track, ratio);
            let track = &m.track;
            m.timestamps.position(track);
        }
        write_positions(doc, measure, ctx)?;
        // unresolved anchors were reported by the natural layout
        place_controls(doc, measure, ctx)?;
    }
    position_measures(doc, system)?;
    doc.system_mut(system)?.justification = ratio;
    log::debug!("system {system}: justified with ratio {ratio:.3}");
    Ok(ratio)
}

/// Scale the justifiable region of a measure by `ratio`. Leading slots stay
/// in place and trailing slots keep their distance to the right barline.
pub(crate) fn stretch_measure(track: &mut MeasureTrack, ratio: f64) {
    let left = track.left_ref();
    let right = track.right_ref();
    let slots = track.slots_mut();
    let left_x = slots[left].relative_x;
    let right_x = slots[right].relative_x;
    let stretch = |x: i32| left_x + ((x - left_x) as f64 * ratio).ceil() as i32;
    let stretched_right = stretch(right_x);
    for (i, slot) in slots.iter_mut().enumerate() {
        if i <= left {
            continue;
        }
        slot.relative_x = if i < right {
            stretch(slot.relative_x)
        } else {
            stretched_right + (slot.relative_x - right_x)
        };
    }
}

/// Spread the spare height of a page over its system and staff gaps.
///
/// Systems must already be stacked on the page with `Page::content_height`
/// set. Nothing moves above the first system.
pub(crate) fn justify_page(
    doc: &mut Document,
    page: NodeId,
    first: bool,
    last: bool,
    ctx: &LayoutContext,
) -> Result<()> {
    let options = ctx.options;
    let available = options.available_height(first);
    let content = doc.page(page)?.content_height;
    if content <= 0 {
        return Ok(());
    }
    if last && (content as f64) < available as f64 * options.min_last_justification {
        log::debug!("page {page}: last page left natural");
        return Ok(());
    }
    let cap = (options.justification_max_vertical * options.page_height as f64).round() as i32;
    let spare = (available - content).clamp(0, cap);
    if spare == 0 {
        return Ok(());
    }

    let systems: Vec<NodeId> = doc
        .children(page)?
        .iter()
        .copied()
        .filter(|c| matches!(doc.get(*c).map(|n| &n.kind), Some(NodeKind::System(_))))
        .collect();
    let system_gaps = systems.len().saturating_sub(1) as f64;
    let mut staff_gaps = 0.0;
    for &system in &systems {
        staff_gaps += doc.system(system)?.track.len().saturating_sub(1) as f64;
    }
    let total = system_gaps * options.justification_system + staff_gaps * options.justification_staff;
    if total <= 0.0 {
        return Ok(());
    }
    let per_weight = spare as f64 / total;

    let mut shift = 0.0;
    for (i, &system) in systems.iter().enumerate() {
        if i > 0 {
            shift += options.justification_system * per_weight;
        }
        let y = doc.node(system)?.pos.y_rel;
        doc.set_y(system, y + shift.round() as i32)?;

        let mut deltas = BTreeMap::new();
        let mut staff_shift = 0.0;
        {
            let s = doc.system_mut(system)?;
            for (k, slot) in s.track.slots_mut().iter_mut().enumerate() {
                if k > 0 {
                    staff_shift += options.justification_staff * per_weight;
                }
                let delta = staff_shift.round() as i32;
                slot.relative_y += delta;
                deltas.insert(slot.staff_n, delta);
            }
            let delta = staff_shift.round() as i32;
            s.track.bottom_mut().relative_y += delta;
            s.height = s.track.height();
        }
        shift_staff_content(doc, system, &deltas)?;
        shift += staff_shift;
    }
    doc.page_mut(page)?.content_height = content + shift.round() as i32;
    log::debug!("page {page}: distributed {spare} of spare height");
    Ok(())
}

/// Move staves and their floating events after their slot moved by `deltas`.
fn shift_staff_content(
    doc: &mut Document,
    system: NodeId,
    deltas: &BTreeMap<u32, i32>,
) -> Result<()> {
    for measure in doc.system_measures(system)? {
        for child in doc.children(measure)?.to_vec() {
            let staff = match doc.kind(child)? {
                NodeKind::Staff(staff) => staff.n,
                NodeKind::Control(event) => event.staff,
                _ => continue,
            };
            if let Some(delta) = deltas.get(&staff) {
                let y = doc.node(child)?.pos.y_rel;
                doc.set_y(child, y + delta)?;
            }
        }
    }
    Ok(())
}
