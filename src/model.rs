//! Data model for the symbolic document tree.
//!
//! The tree lives in an arena owned by [`Document`]; nodes refer to each
//! other by [`NodeId`]. Removing a node invalidates its id and every access
//! through it is checked.
//!
//! A document is either *score-based* (`Root → Score → Section/Ending/App →
//! Measure`) or *page-based* (`Root → Pages → Page → System → [markers,
//! ScoreDef, Measure, …]`). Layout operates on page-based documents.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{LayoutError, Result};
use crate::layout::{MeasureTrack, SlotCategory, SystemTrack, TimestampAnchors};

// ═══════════════════════════════════════════════════════════════════════
// Arena
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Position relative to the parent's origin, in layout units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x_rel: i32,
    pub y_rel: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    #[serde(default)]
    pub pos: Position,
}

/// Slots of removed nodes are reused by later allocations, so an id must
/// not be kept after its node was removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "DocumentData")]
pub struct Document {
    nodes: Vec<Option<Node>>,
    root: NodeId,
    #[serde(skip)]
    free: Vec<NodeId>,
}

#[derive(Deserialize)]
struct DocumentData {
    nodes: Vec<Option<Node>>,
    root: NodeId,
}

impl From<DocumentData> for Document {
    fn from(data: DocumentData) -> Self {
        let free = data
            .nodes
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, node)| node.is_none())
            .map(|(i, _)| NodeId(i as u32))
            .collect();
        Self {
            nodes: data.nodes,
            root: data.root,
            free,
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! payload_accessors {
    ($($get:ident, $get_mut:ident, $variant:ident, $ty:ty;)*) => {
        $(
            pub fn $get(&self, id: NodeId) -> Result<&$ty> {
                match &self.node(id)?.kind {
                    NodeKind::$variant(payload) => Ok(payload),
                    other => Err(LayoutError::UnexpectedNode {
                        id,
                        expected: stringify!($variant),
                        found: other.name(),
                    }),
                }
            }

            pub fn $get_mut(&mut self, id: NodeId) -> Result<&mut $ty> {
                match &mut self.node_mut(id)?.kind {
                    NodeKind::$variant(payload) => Ok(payload),
                    other => Err(LayoutError::UnexpectedNode {
                        id,
                        expected: stringify!($variant),
                        found: other.name(),
                    }),
                }
            }
        )*
    };
}

impl Document {
    pub fn new() -> Self {
        let root = Node {
            kind: NodeKind::Root,
            parent: None,
            children: Vec::new(),
            pos: Position::default(),
        };
        Self {
            nodes: vec![Some(root)],
            root: NodeId(0),
            free: Vec::new(),
        }
    }

    /// A document holding an empty score under its root.
    pub fn with_score(score: Score) -> (Self, NodeId) {
        let root = NodeId(0);
        let id = NodeId(1);
        let doc = Self {
            nodes: vec![
                Some(Node {
                    kind: NodeKind::Root,
                    parent: None,
                    children: vec![id],
                    pos: Position::default(),
                }),
                Some(Node {
                    kind: NodeKind::Score(score),
                    parent: Some(root),
                    children: Vec::new(),
                    pos: Position::default(),
                }),
            ],
            root,
            free: Vec::new(),
        };
        (doc, id)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize).and_then(Option::as_ref)
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.get(id).ok_or(LayoutError::DanglingNode(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(LayoutError::DanglingNode(id))
    }

    pub fn kind(&self, id: NodeId) -> Result<&NodeKind> {
        Ok(&self.node(id)?.kind)
    }

    pub fn children(&self, id: NodeId) -> Result<&[NodeId]> {
        Ok(&self.node(id)?.children)
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.node(id)?.parent)
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    /// Allocate a node as the last child of `parent`.
    pub fn add(&mut self, parent: NodeId, kind: NodeKind) -> Result<NodeId> {
        let id = self.alloc(kind);
        self.append(parent, id)?;
        Ok(id)
    }

    /// Allocate a detached node, reusing the slot of a removed one if any.
    pub fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let node = Node {
            kind,
            parent: None,
            children: Vec::new(),
            pos: Position::default(),
        };
        match self.free.pop() {
            Some(id) => {
                self.nodes[id.0 as usize] = Some(node);
                id
            }
            None => {
                let id = NodeId(self.nodes.len() as u32);
                self.nodes.push(Some(node));
                id
            }
        }
    }

    /// Move `child` (detaching it first) to the end of `parent`'s children.
    pub fn append(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.detach(child)?;
        self.node_mut(parent)?.children.push(child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Move `child` (detaching it first) to position `index` of `parent`.
    pub fn insert(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<()> {
        self.detach(child)?;
        let children = &mut self.node_mut(parent)?.children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Unlink a node from its parent, keeping its subtree alive.
    pub fn detach(&mut self, id: NodeId) -> Result<()> {
        if let Some(parent) = self.node(id)?.parent {
            self.node_mut(parent)?.children.retain(|c| *c != id);
            self.node_mut(id)?.parent = None;
        }
        Ok(())
    }

    /// Delete a node and its whole subtree.
    pub fn remove(&mut self, id: NodeId) -> Result<()> {
        self.detach(id)?;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(current.0 as usize).and_then(Option::take) {
                stack.extend(node.children);
                self.free.push(current);
            }
        }
        Ok(())
    }

    /// Preorder list of `id` and all its descendants.
    pub fn descendants(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = self.node(current)?;
            out.push(current);
            stack.extend(node.children.iter().rev());
        }
        Ok(out)
    }

    /// Closest ancestor (including `id` itself) matching `pred`.
    pub fn ancestor(&self, id: NodeId, pred: impl Fn(&NodeKind) -> bool) -> Result<Option<NodeId>> {
        let mut current = Some(id);
        while let Some(c) = current {
            let node = self.node(c)?;
            if pred(&node.kind) {
                return Ok(Some(c));
            }
            current = node.parent;
        }
        Ok(None)
    }

    pub fn set_pos(&mut self, id: NodeId, x_rel: i32, y_rel: i32) -> Result<()> {
        self.node_mut(id)?.pos = Position { x_rel, y_rel };
        Ok(())
    }

    pub fn set_x(&mut self, id: NodeId, x_rel: i32) -> Result<()> {
        self.node_mut(id)?.pos.x_rel = x_rel;
        Ok(())
    }

    pub fn set_y(&mut self, id: NodeId, y_rel: i32) -> Result<()> {
        self.node_mut(id)?.pos.y_rel = y_rel;
        Ok(())
    }

    payload_accessors! {
        measure, measure_mut, Measure, Measure;
        system, system_mut, System, System;
        page, page_mut, Page, Page;
        note, note_mut, Note, Note;
        control, control_mut, Control, ControlEvent;
        milestone_end, milestone_end_mut, MilestoneEnd, MilestoneEnd;
        score_def, score_def_mut, ScoreDef, ScoreDef;
    }

    // ── Page-based navigation ──────────────────────────────────────

    /// The `Pages` container if the document is page-based.
    pub fn pages_container(&self) -> Result<Option<NodeId>> {
        Ok(self
            .children(self.root)?
            .iter()
            .copied()
            .find(|c| matches!(self.get(*c).map(|n| &n.kind), Some(NodeKind::Pages))))
    }

    pub fn is_page_based(&self) -> bool {
        matches!(self.pages_container(), Ok(Some(_)))
    }

    pub fn pages(&self) -> Result<Vec<NodeId>> {
        let container = self.pages_container()?.ok_or(LayoutError::NotPageBased)?;
        Ok(self.children(container)?.to_vec())
    }

    /// All systems of all pages, in order.
    pub fn systems(&self) -> Result<Vec<NodeId>> {
        let mut out = Vec::new();
        for page in self.pages()? {
            out.extend(
                self.children(page)?
                    .iter()
                    .copied()
                    .filter(|c| matches!(self.get(*c).map(|n| &n.kind), Some(NodeKind::System(_)))),
            );
        }
        Ok(out)
    }

    /// Measures that are direct children of `system`.
    pub fn system_measures(&self, system: NodeId) -> Result<Vec<NodeId>> {
        Ok(self
            .children(system)?
            .iter()
            .copied()
            .filter(|c| matches!(self.get(*c).map(|n| &n.kind), Some(NodeKind::Measure(_))))
            .collect())
    }

    /// All measures in document order.
    pub fn measures(&self) -> Result<Vec<NodeId>> {
        Ok(self
            .descendants(self.root)?
            .into_iter()
            .filter(|c| matches!(self.get(*c).map(|n| &n.kind), Some(NodeKind::Measure(_))))
            .collect())
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Node kinds
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NodeKind {
    Root,
    Score(Score),
    Section(Section),
    Ending(Ending),
    App(App),
    /// A reading (lemma or variant) of an editorial alternative.
    Reading,
    MilestoneEnd(MilestoneEnd),
    Pages,
    Page(Page),
    System(System),
    ScoreDef(ScoreDef),
    /// Encoded system break.
    Sb,
    /// Encoded page break.
    Pb,
    Measure(Measure),
    Staff(Staff),
    Layer(Layer),
    Note(Note),
    Rest(Rest),
    /// Full-measure rest.
    MRest,
    Space(Space),
    Chord(Chord),
    Beam,
    Tuplet(Tuplet),
    Clef(Clef),
    KeySig(KeySig),
    MeterSig(MeterSig),
    Mensur(Mensur),
    BarLine(BarLine),
    /// Accidental written on its own in the layer.
    Accid { accid: Accidental },
    /// Dot of division.
    Dot,
    Control(ControlEvent),
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Root => "root",
            NodeKind::Score(_) => "score",
            NodeKind::Section(_) => "section",
            NodeKind::Ending(_) => "ending",
            NodeKind::App(_) => "app",
            NodeKind::Reading => "reading",
            NodeKind::MilestoneEnd(_) => "milestoneEnd",
            NodeKind::Pages => "pages",
            NodeKind::Page(_) => "page",
            NodeKind::System(_) => "system",
            NodeKind::ScoreDef(_) => "scoreDef",
            NodeKind::Sb => "sb",
            NodeKind::Pb => "pb",
            NodeKind::Measure(_) => "measure",
            NodeKind::Staff(_) => "staff",
            NodeKind::Layer(_) => "layer",
            NodeKind::Note(_) => "note",
            NodeKind::Rest(_) => "rest",
            NodeKind::MRest => "mRest",
            NodeKind::Space(_) => "space",
            NodeKind::Chord(_) => "chord",
            NodeKind::Beam => "beam",
            NodeKind::Tuplet(_) => "tuplet",
            NodeKind::Clef(_) => "clef",
            NodeKind::KeySig(_) => "keySig",
            NodeKind::MeterSig(_) => "meterSig",
            NodeKind::Mensur(_) => "mensur",
            NodeKind::BarLine(_) => "barLine",
            NodeKind::Accid { .. } => "accid",
            NodeKind::Dot => "dot",
            NodeKind::Control(_) => "control",
        }
    }

    /// Structural containers that become start markers in page-based form.
    pub fn milestone_kind(&self) -> Option<MilestoneKind> {
        match self {
            NodeKind::Score(_) => Some(MilestoneKind::Score),
            NodeKind::Section(_) => Some(MilestoneKind::Section),
            NodeKind::Ending(_) => Some(MilestoneKind::Ending),
            NodeKind::App(_) => Some(MilestoneKind::App),
            _ => None,
        }
    }

    pub fn is_measure(&self) -> bool {
        matches!(self, NodeKind::Measure(_))
    }
}

// ── Structure ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Score {
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Section {
    pub label: Option<String>,
}

/// A volta bracket.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ending {
    /// Ending number(s), e.g. "1" or "1, 2"
    pub n: Option<String>,
}

/// An editorial alternative; its children are readings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct App {
    /// Index of the reading laid out; the others stay hidden.
    pub visible: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MilestoneKind {
    Score,
    Section,
    Ending,
    App,
}

/// End marker of a flattened container.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneEnd {
    /// The start marker (the container node itself).
    pub start: NodeId,
    pub start_kind: MilestoneKind,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Page {
    /// Height used by the systems of the page (output).
    #[serde(default)]
    pub content_height: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct System {
    #[serde(skip)]
    pub track: SystemTrack,
    /// Total width after justification (output).
    #[serde(default)]
    pub width: i32,
    /// Natural height from the top of the first staff overflow (output).
    #[serde(default)]
    pub height: i32,
    /// Horizontal justification ratio applied (output).
    #[serde(default)]
    pub justification: f64,
    /// Milestones still open when the system starts (output).
    #[serde(default)]
    pub open_milestones: Vec<NodeId>,
}

// ── Score definition ────────────────────────────────────────────────

/// Clef, key, meter and staff definitions. The first one in a document
/// declares every staff; later ones only carry changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreDef {
    pub staff_defs: Vec<StaffDef>,
    /// Key for all staves
    pub key: Option<KeySig>,
    /// Meter for all staves
    pub meter: Option<MeterSig>,
    pub mensur: Option<Mensur>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffDef {
    pub n: u32,
    pub lines: Option<u8>,
    pub clef: Option<Clef>,
    pub key: Option<KeySig>,
    pub meter: Option<MeterSig>,
    pub mensur: Option<Mensur>,
    /// Staff size in percent
    pub scale: Option<u16>,
}

impl StaffDef {
    pub fn new(n: u32) -> Self {
        Self {
            n,
            lines: None,
            clef: None,
            key: None,
            meter: None,
            mensur: None,
            scale: None,
        }
    }
}

// ── Measure level ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measure {
    /// Measure number
    pub n: i32,
    /// Left barline, when the measure opens with one (e.g. a repeat start)
    pub left: Option<BarRendition>,
    pub right: BarRendition,
    #[serde(skip)]
    pub track: MeasureTrack,
    #[serde(skip)]
    pub timestamps: TimestampAnchors,
    /// Width after the last layout (output).
    #[serde(default)]
    pub width: i32,
    /// X of the right barline, relative to the measure (output).
    #[serde(default)]
    pub barline_x: i32,
    /// Opening, changed and cautionary attributes drawn in the measure (output).
    #[serde(default)]
    pub attributes: Vec<DrawnAttribute>,
}

impl Measure {
    pub fn new(n: i32) -> Self {
        Self {
            n,
            ..Self::default()
        }
    }
}

/// A clef, key or meter drawn from the score definition rather than from a
/// layer element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawnAttribute {
    pub staff: u32,
    pub category: SlotCategory,
    pub x_rel: i32,
    pub width: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BarRendition {
    #[default]
    Single,
    Double,
    End,
    RptStart,
    RptEnd,
    RptBoth,
    Dashed,
    Invis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Staff {
    pub n: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    pub n: u32,
}

// ── Layer elements ──────────────────────────────────────────────────

/// Written durations, longest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Duration {
    Maxima,
    Long,
    Breve,
    Whole,
    Half,
    Quarter,
    Eighth,
    Sixteenth,
    ThirtySecond,
    SixtyFourth,
    OneTwentyEighth,
}

impl Duration {
    fn index(self) -> i32 {
        self as i32
    }

    /// Length in quarter-note beats, without dots.
    pub fn beats(self) -> f64 {
        2f64.powi(Duration::Quarter.index() - self.index())
    }

    /// Length in quarter-note beats with `dots` augmentation dots.
    pub fn dotted_beats(self, dots: u8) -> f64 {
        self.beats() * (2.0 - 0.5f64.powi(dots as i32))
    }

    /// How many times the duration doubles a whole note (0 for whole and shorter).
    pub fn doublings_beyond_whole(self) -> i32 {
        (Duration::Whole.index() - self.index()).max(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Step {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl Step {
    pub fn index(self) -> i32 {
        self as i32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pitch {
    pub step: Step,
    pub octave: i8,
}

impl Pitch {
    pub fn new(step: Step, octave: i8) -> Self {
        Self { step, octave }
    }

    /// Diatonic position counted from C0.
    pub fn diatonic(self) -> i32 {
        self.octave as i32 * 7 + self.step.index()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Accidental {
    Sharp,
    Flat,
    Natural,
    DoubleSharp,
    DoubleFlat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StemDir {
    Up,
    Down,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub pitch: Pitch,
    pub dur: Duration,
    #[serde(default)]
    pub dots: u8,
    pub accid: Option<Accidental>,
    #[serde(default)]
    pub grace: bool,
    pub stem: Option<StemDir>,
    /// One syllable per verse
    #[serde(default)]
    pub lyrics: Vec<String>,
    #[serde(default)]
    pub layout: NoteLayout,
}

impl Note {
    pub fn new(pitch: Pitch, dur: Duration) -> Self {
        Self {
            pitch,
            dur,
            dots: 0,
            accid: None,
            grace: false,
            stem: None,
            lyrics: Vec::new(),
            layout: NoteLayout::default(),
        }
    }
}

/// Positions of a note's satellites, relative to the measure (output).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteLayout {
    /// Staff position: 0 is the bottom line, each step is half a space.
    pub loc: i32,
    pub accid_x: Option<i32>,
    pub dots_x: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rest {
    pub dur: Duration,
    #[serde(default)]
    pub dots: u8,
    #[serde(default)]
    pub dots_x: Option<i32>,
}

/// Invisible duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Space {
    pub dur: Duration,
    #[serde(default)]
    pub dots: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chord {
    pub dur: Duration,
    #[serde(default)]
    pub dots: u8,
    #[serde(default)]
    pub grace: bool,
    pub stem: Option<StemDir>,
    #[serde(default)]
    pub dots_x: Option<i32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Tuplet {
    pub num: u8,
    pub numbase: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClefShape {
    G,
    F,
    C,
    Perc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clef {
    pub shape: ClefShape,
    /// Staff line the clef sits on, counted from the bottom
    pub line: u8,
}

impl Clef {
    pub const TREBLE: Clef = Clef {
        shape: ClefShape::G,
        line: 2,
    };
    pub const BASS: Clef = Clef {
        shape: ClefShape::F,
        line: 4,
    };
    pub const ALTO: Clef = Clef {
        shape: ClefShape::C,
        line: 3,
    };

    /// Staff position of `pitch` under this clef (0 = bottom line).
    pub fn loc(&self, pitch: Pitch) -> i32 {
        let reference = match self.shape {
            ClefShape::F => 3 * 7 + Step::F.index(),
            ClefShape::C => 4 * 7 + Step::C.index(),
            ClefShape::G | ClefShape::Perc => 4 * 7 + Step::G.index(),
        };
        pitch.diatonic() - reference + (self.line as i32 - 1) * 2
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySig {
    /// Number of sharps (positive) or flats (negative)
    pub fifths: i8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MeterSymbol {
    Common,
    Cut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterSig {
    pub count: u8,
    pub unit: u8,
    pub symbol: Option<MeterSymbol>,
}

impl MeterSig {
    pub fn new(count: u8, unit: u8) -> Self {
        Self {
            count,
            unit,
            symbol: None,
        }
    }

    /// Measure length in quarter-note beats.
    pub fn beats(&self) -> f64 {
        if self.unit == 0 {
            return 0.0;
        }
        self.count as f64 * 4.0 / self.unit as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MensurSign {
    C,
    O,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mensur {
    pub sign: MensurSign,
    #[serde(default)]
    pub dot: bool,
    #[serde(default)]
    pub slash: u8,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BarLine {
    pub form: BarRendition,
}

// ── Control events ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ControlKind {
    Dir,
    Dynam,
    Tempo,
    Hairpin,
    Slur,
    Tie,
    Octave,
    Pedal,
    Fermata,
}

impl ControlKind {
    pub fn default_placement(self) -> Placement {
        match self {
            ControlKind::Dynam | ControlKind::Hairpin | ControlKind::Pedal => Placement::Below,
            ControlKind::Slur | ControlKind::Tie => Placement::Within,
            ControlKind::Dir | ControlKind::Tempo | ControlKind::Octave | ControlKind::Fermata => {
                Placement::Above
            }
        }
    }

    /// Textual directives that are grouped at the start of an ending.
    pub fn is_directive(self) -> bool {
        matches!(self, ControlKind::Dir | ControlKind::Tempo)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Placement {
    Above,
    Below,
    Within,
}

/// Where a control event attaches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Anchor {
    /// 1-based beat in the measure; 0 is the left barline.
    Tstamp(f64),
    Element(NodeId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlEvent {
    pub kind: ControlKind,
    pub staff: u32,
    pub place: Option<Placement>,
    pub start: Anchor,
    pub end: Option<Anchor>,
    /// Events sharing a group are aligned vertically
    pub group: Option<u32>,
    pub text: Option<String>,
    /// Horizontal extent from the start anchor (output).
    #[serde(default)]
    pub width: i32,
}

impl ControlEvent {
    pub fn new(kind: ControlKind, staff: u32, start: Anchor) -> Self {
        Self {
            kind,
            staff,
            place: None,
            start,
            end: None,
            group: None,
            text: None,
            width: 0,
        }
    }

    pub fn placement(&self) -> Placement {
        self.place.unwrap_or_else(|| self.kind.default_placement())
    }
}
