//! Error and warning types for the layout engine.
//!
//! Structural problems (a broken tree, a misused track) abort the pass with a
//! [`LayoutError`]. Degenerate but drawable input is laid out with a fallback
//! and recorded as a [`LayoutWarning`] in the [`LayoutReport`].

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::layout::SlotCategory;
use crate::model::NodeId;

pub type Result<T> = std::result::Result<T, LayoutError>;

#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("staff slot {requested} requested before slot {next} was created")]
    NonContiguousStaffSlot { requested: usize, next: usize },

    #[error("boundary slot {0:?} is owned by the measure track and cannot be inserted")]
    BoundarySlot(SlotCategory),

    #[error("grace group for staff {staff} layer {layer} was already flushed")]
    GraceGroupFlushed { staff: u32, layer: u32 },

    #[error("node {0} does not exist")]
    DanglingNode(NodeId),

    #[error("node {id} is a {found}, expected {expected}")]
    UnexpectedNode {
        id: NodeId,
        expected: &'static str,
        found: &'static str,
    },

    #[error("tuplet {0} has a zero ratio")]
    InvalidTuplet(NodeId),

    #[error("milestone end {end} closes {found:?} but {expected:?} is open")]
    MismatchedMilestone {
        end: NodeId,
        expected: Option<NodeId>,
        found: NodeId,
    },

    #[error("milestone start {0} is never closed")]
    UnclosedMilestone(NodeId),

    #[error("document is not page-based")]
    NotPageBased,

    #[error("no initial score definition before the first measure")]
    MissingScoreDef,

    #[error("staff {0} is not declared in the score definition")]
    UndeclaredStaff(u32),

    #[error("{element} cannot be added outside of a {context}")]
    Misplaced {
        element: &'static str,
        context: &'static str,
    },

    #[error("invalid layout options: {0}")]
    InvalidOptions(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A non-fatal condition found while laying out a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LayoutWarning {
    /// Voices of a measure disagree on its total duration; the longest wins.
    MultipleLayers { measure: NodeId, durations: Vec<f64> },
    /// A measure without any duration received the minimum width.
    EmptyMeasure { measure: NodeId },
    /// A staff without lines received the minimum staff height.
    NoStaffLines { staff: u32 },
    /// A system with no measure was produced.
    EmptySystem { system: NodeId },
    /// A single measure is wider than the system budget.
    MeasureTooWide { measure: NodeId, width: i32, available: i32 },
    /// The natural width exceeds the target; justification was clamped to 1.0.
    JustificationUnderflow { system: NodeId, ratio: f64 },
    /// A control event points at a node that is not laid out in its measure.
    UnresolvedAnchor { control: NodeId },
}

impl fmt::Display for LayoutWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutWarning::MultipleLayers { measure, durations } => write!(
                f,
                "measure {measure}: layers have different durations {durations:?}, keeping the longest"
            ),
            LayoutWarning::EmptyMeasure { measure } => {
                write!(f, "measure {measure} has no duration, using the minimum width")
            }
            LayoutWarning::NoStaffLines { staff } => {
                write!(f, "staff {staff} has no lines, using the minimum height")
            }
            LayoutWarning::EmptySystem { system } => write!(f, "system {system} holds no measure"),
            LayoutWarning::MeasureTooWide {
                measure,
                width,
                available,
            } => write!(
                f,
                "measure {measure} is {width} wide but only {available} is available, placed alone"
            ),
            LayoutWarning::JustificationUnderflow { system, ratio } => write!(
                f,
                "system {system}: justification ratio {ratio:.3} clamped to 1.0"
            ),
            LayoutWarning::UnresolvedAnchor { control } => {
                write!(f, "control event {control} has no resolvable anchor")
            }
        }
    }
}

/// Summary of a layout run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LayoutReport {
    pub warnings: Vec<LayoutWarning>,
    pub pages: usize,
    pub systems: usize,
}

impl LayoutReport {
    /// Record a warning and forward it to the log. A warning raised again by
    /// a later pass over the same content is kept once.
    pub fn warn(&mut self, warning: LayoutWarning) {
        if self.warnings.contains(&warning) {
            return;
        }
        log::warn!("{warning}");
        self.warnings.push(warning);
    }

    pub fn has_warning(&self, pred: impl Fn(&LayoutWarning) -> bool) -> bool {
        self.warnings.iter().any(pred)
    }
}
