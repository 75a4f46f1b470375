//! Pagination: cutting one continuous system into systems and pages, and
//! the inverse operation.
//!
//! Cast-off always starts from a document holding a single page with a
//! single continuous system whose measures carry their natural widths.

pub mod milestones;

use crate::error::{LayoutError, LayoutWarning, Result};
use crate::layout::attributes::{opening_width, ScoreState};
use crate::layout::LayoutContext;
use crate::model::{Document, NodeId, NodeKind, Page, System};

pub use milestones::{convert_to_page_based, convert_to_score_based, record_open_milestones};

/// Where systems are broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SystemBreaks {
    /// By width; in smart mode encoded breaks are honoured once the system
    /// is full enough.
    Width { smart: bool },
    /// At encoded system and page breaks only.
    Encoded,
}

/// Concatenate the content of every system of every page into one
/// continuous system on one page.
pub fn uncast_off(doc: &mut Document) -> Result<()> {
    let container = doc.pages_container()?.ok_or(LayoutError::NotPageBased)?;
    let old_pages = doc.children(container)?.to_vec();
    let mut content = Vec::new();
    for &page in &old_pages {
        for system in doc.children(page)?.to_vec() {
            content.extend_from_slice(doc.children(system)?);
        }
    }
    let system = doc.alloc(NodeKind::System(System::default()));
    for node in content {
        doc.append(system, node)?;
    }
    for old in old_pages {
        doc.remove(old)?;
    }
    let page = doc.add(container, NodeKind::Page(Page::default()))?;
    doc.append(page, system)
}

/// The single continuous system, un-casting-off first when needed.
fn continuous_system(doc: &mut Document) -> Result<(NodeId, NodeId)> {
    if doc.systems()?.len() != 1 || doc.pages()?.len() != 1 {
        uncast_off(doc)?;
    }
    let page = doc.pages()?[0];
    let system = doc.systems()?[0];
    Ok((page, system))
}

struct CastOff {
    page: NodeId,
    system: NodeId,
    has_measure: bool,
    /// X of the first measure of the current system in the continuous one.
    shift: i32,
    pending: Vec<NodeId>,
    force_break: bool,
    systems: Vec<NodeId>,
}

impl CastOff {
    fn open_system(&mut self, doc: &mut Document) -> Result<()> {
        self.system = doc.add(self.page, NodeKind::System(System::default()))?;
        self.systems.push(self.system);
        self.has_measure = false;
        self.force_break = false;
        Ok(())
    }

    /// Append to the current system, or queue behind pending objects so the
    /// content order is kept.
    fn place(&mut self, doc: &mut Document, node: NodeId) -> Result<()> {
        if self.pending.is_empty() {
            doc.append(self.system, node)
        } else {
            self.pending.push(node);
            Ok(())
        }
    }

    fn attach_pending(&mut self, doc: &mut Document) -> Result<()> {
        for node in self.pending.drain(..) {
            doc.append(self.system, node)?;
        }
        Ok(())
    }
}

/// Distribute the measures of the continuous system over new systems.
pub(crate) fn cast_off_systems(
    doc: &mut Document,
    breaks: SystemBreaks,
    no_widow: bool,
    ctx: &mut LayoutContext,
) -> Result<()> {
    let (page, continuous) = continuous_system(doc)?;
    let content = doc.children(continuous)?.to_vec();
    let width = ctx.options.system_width();
    let mut state = ScoreState::default();
    let mut opening = 0;

    let mut cast = CastOff {
        page,
        system: continuous,
        has_measure: false,
        shift: 0,
        pending: Vec::new(),
        force_break: false,
        systems: Vec::new(),
    };
    cast.open_system(doc)?;

    for node in content {
        match doc.kind(node)? {
            NodeKind::Measure(measure) => {
                let x = doc.node(node)?.pos.x_rel;
                let measure_width = measure.width;
                let first_system = cast.systems.len() == 1;
                let extra = if first_system { 0 } else { opening };
                let overflow = x + measure_width + extra - cast.shift > width;
                let wants_break = match breaks {
                    SystemBreaks::Width { .. } => cast.force_break || overflow,
                    SystemBreaks::Encoded => cast.force_break,
                };
                if cast.has_measure && wants_break {
                    cast.open_system(doc)?;
                    cast.shift = x;
                }
                if !cast.has_measure {
                    let extra = if cast.systems.len() == 1 { 0 } else { opening };
                    if measure_width + extra > width {
                        ctx.report.warn(LayoutWarning::MeasureTooWide {
                            measure: node,
                            width: measure_width + extra,
                            available: width,
                        });
                    }
                    cast.shift = x;
                }
                cast.attach_pending(doc)?;
                doc.append(cast.system, node)?;
                cast.has_measure = true;
                cast.force_break = false;
            }
            NodeKind::ScoreDef(def) => {
                let def = def.clone();
                state.apply(&def);
                opening = opening_width(&state, ctx.metrics, ctx.unit());
                cast.pending.push(node);
            }
            NodeKind::Pb => {
                if breaks == SystemBreaks::Encoded {
                    cast.force_break = true;
                }
                cast.pending.push(node);
            }
            NodeKind::Sb => {
                cast.force_break = match breaks {
                    SystemBreaks::Encoded => true,
                    SystemBreaks::Width { smart: true } if cast.has_measure => {
                        let right = last_measure_right(doc, cast.system)?;
                        (right - cast.shift) as f64 > ctx.options.breaks_smart_sb * width as f64
                    }
                    SystemBreaks::Width { .. } => cast.force_break,
                };
                cast.place(doc, node)?;
            }
            kind if kind.milestone_kind().is_some() => cast.pending.push(node),
            _ => cast.place(doc, node)?,
        }
    }
    cast.attach_pending(doc)?;
    doc.remove(continuous)?;

    if no_widow && breaks != SystemBreaks::Encoded {
        merge_widow(doc, &mut cast.systems)?;
    }
    for &system in &cast.systems {
        if doc.system_measures(system)?.is_empty() {
            ctx.report.warn(LayoutWarning::EmptySystem { system });
        }
    }
    log::debug!("cast off {} systems", cast.systems.len());
    record_open_milestones(doc)
}

/// Right edge of the last measure of `system`, in continuous coordinates.
fn last_measure_right(doc: &Document, system: NodeId) -> Result<i32> {
    match doc.system_measures(system)?.last() {
        Some(&measure) => Ok(doc.node(measure)?.pos.x_rel + doc.measure(measure)?.width),
        None => Ok(0),
    }
}

/// Move a final system holding a single measure into the previous one.
fn merge_widow(doc: &mut Document, systems: &mut Vec<NodeId>) -> Result<()> {
    let [.., previous, last] = systems[..] else {
        return Ok(());
    };
    if doc.system_measures(last)?.len() != 1 {
        return Ok(());
    }
    for node in doc.children(last)?.to_vec() {
        doc.append(previous, node)?;
    }
    doc.remove(last)?;
    systems.pop();
    log::debug!("merged widow system {last} into {previous}");
    Ok(())
}

/// A system whose leading content carries an encoded page break.
fn starts_with_pb(doc: &Document, system: NodeId) -> Result<bool> {
    for &child in doc.children(system)? {
        match doc.kind(child)? {
            NodeKind::Pb => return Ok(true),
            NodeKind::Measure(_) => return Ok(false),
            _ => {}
        }
    }
    Ok(false)
}

/// Distribute the systems of the document over pages, by height or at
/// encoded page breaks.
pub(crate) fn cast_off_pages(doc: &mut Document, encoded: bool, ctx: &LayoutContext) -> Result<()> {
    let options = ctx.options;
    let container = doc.pages_container()?.ok_or(LayoutError::NotPageBased)?;
    let old_pages = doc.children(container)?.to_vec();
    let systems = doc.systems()?;

    let mut page = doc.add(container, NodeKind::Page(Page::default()))?;
    let mut first_page = true;
    let mut used = 0;
    let mut count = 0u32;
    for system in systems {
        let height = doc.system(system)?.height;
        let needed = if count > 0 {
            used + options.system_spacing + height
        } else {
            height
        };
        let new_page = if encoded {
            count > 0 && starts_with_pb(doc, system)?
        } else {
            let full = options.system_max_per_page > 0 && count >= options.system_max_per_page;
            count > 0 && (needed > options.available_height(first_page) || full)
        };
        if new_page {
            page = doc.add(container, NodeKind::Page(Page::default()))?;
            first_page = false;
            used = height;
            count = 0;
        } else {
            used = needed;
        }
        doc.append(page, system)?;
        count += 1;
    }
    for old in old_pages {
        doc.remove(old)?;
    }
    log::debug!("cast off {} pages", doc.pages()?.len());
    Ok(())
}

/// Stack the systems of every page from the top margin and record the
/// height they use.
pub(crate) fn position_systems(doc: &mut Document, ctx: &LayoutContext) -> Result<()> {
    let options = ctx.options;
    for (index, page) in doc.pages()?.into_iter().enumerate() {
        let top = options.content_top(index == 0);
        let mut y = top;
        let mut bottom = top;
        for system in doc.children(page)?.to_vec() {
            if !matches!(doc.kind(system)?, NodeKind::System(_)) {
                continue;
            }
            doc.set_pos(system, options.page_margin_left, y)?;
            bottom = y + doc.system(system)?.height;
            y = bottom + options.system_spacing;
        }
        doc.page_mut(page)?.content_height = bottom - top;
    }
    Ok(())
}
