//! Layout map: absolute page coordinates of every system, measure and staff
//! of a laid-out document.
//!
//! This is what a renderer or a playback cursor consumes: positions in the
//! document are relative to their parent, positions in the map are not.

use serde::Serialize;

use crate::error::Result;
use crate::model::{Document, NodeId, NodeKind};

#[derive(Debug, Clone, Serialize)]
pub struct LayoutMap {
    pub pages: Vec<PagePosition>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PagePosition {
    /// 0-based page index
    pub index: usize,
    /// Height used by the systems of the page
    pub content_height: i32,
    pub systems: Vec<SystemPosition>,
}

/// A system (line of music), top-left corner on the page.
#[derive(Debug, Clone, Serialize)]
pub struct SystemPosition {
    pub node: NodeId,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    /// Horizontal justification ratio applied
    pub justification: f64,
    pub measures: Vec<MeasurePosition>,
    pub staves: Vec<StaffPosition>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeasurePosition {
    pub node: NodeId,
    /// Measure number
    pub n: i32,
    /// X of the left edge on the page
    pub x: i32,
    pub width: i32,
    /// X of the right barline on the page
    pub barline_x: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct StaffPosition {
    pub n: u32,
    /// Y of the top staff line on the page
    pub y: i32,
    pub height: i32,
}

/// Collect the layout map of a page-based, laid-out document.
pub fn compute_layout_map(doc: &Document) -> Result<LayoutMap> {
    let mut pages = Vec::new();
    for (index, page) in doc.pages()?.into_iter().enumerate() {
        let mut systems = Vec::new();
        for &system in doc.children(page)? {
            if matches!(doc.kind(system)?, NodeKind::System(_)) {
                systems.push(system_position(doc, system)?);
            }
        }
        pages.push(PagePosition {
            index,
            content_height: doc.page(page)?.content_height,
            systems,
        });
    }
    Ok(LayoutMap { pages })
}

fn system_position(doc: &Document, id: NodeId) -> Result<SystemPosition> {
    let pos = doc.node(id)?.pos;
    let system = doc.system(id)?;

    let mut measures = Vec::new();
    for measure in doc.system_measures(id)? {
        let x = pos.x_rel + doc.node(measure)?.pos.x_rel;
        let m = doc.measure(measure)?;
        measures.push(MeasurePosition {
            node: measure,
            n: m.n,
            x,
            width: m.width,
            barline_x: x + m.barline_x,
        });
    }

    let staves = system
        .track
        .slots()
        .iter()
        .map(|slot| StaffPosition {
            n: slot.staff_n,
            y: pos.y_rel + slot.relative_y,
            height: slot.staff_height,
        })
        .collect();

    Ok(SystemPosition {
        node: id,
        x: pos.x_rel,
        y: pos.y_rel,
        width: system.width,
        height: system.height,
        justification: system.justification,
        measures,
        staves,
    })
}

/// Compute the layout map of a laid-out document as a JSON string.
pub fn layout_map_to_json(doc: &Document) -> Result<String> {
    let map = compute_layout_map(doc)?;
    Ok(serde_json::to_string(&map)?)
}
