//! Score-based document construction.
//!
//! [`ScoreBuilder`] keeps a cursor into the tree it is building: the open
//! structural containers, the current measure, staff and layer, and the
//! groups (beams, tuplets, chords) open inside the layer.
//!
//! ```
//! use scorelayout::builder::ScoreBuilder;
//! use scorelayout::model::{Clef, Duration, MeterSig, Pitch, ScoreDef, StaffDef, Step};
//!
//! let mut b = ScoreBuilder::new();
//! let mut staff = StaffDef::new(1);
//! staff.clef = Some(Clef::TREBLE);
//! b.score_def(ScoreDef {
//!     staff_defs: vec![staff],
//!     meter: Some(MeterSig::new(4, 4)),
//!     ..ScoreDef::default()
//! })
//! .unwrap();
//! b.measure(1).unwrap();
//! b.staff(1).unwrap();
//! b.layer(1).unwrap();
//! b.note(Pitch::new(Step::C, 5), Duration::Whole).unwrap();
//! let doc = b.finish();
//! assert_eq!(doc.measures().unwrap().len(), 1);
//! ```

use crate::error::{LayoutError, Result};
use crate::model::{
    App, ControlEvent, Document, Duration, Ending, Layer, Measure, Note, NodeId, NodeKind, Pitch,
    Rest, Score, ScoreDef, Section, Staff,
};

#[derive(Debug)]
pub struct ScoreBuilder {
    doc: Document,
    containers: Vec<NodeId>,
    measure: Option<NodeId>,
    staff: Option<NodeId>,
    /// The layer followed by the groups open inside it.
    groups: Vec<NodeId>,
}

impl Default for ScoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoreBuilder {
    pub fn new() -> Self {
        Self::with_score(Score::default())
    }

    pub fn titled(title: &str) -> Self {
        Self::with_score(Score {
            title: Some(title.to_string()),
        })
    }

    fn with_score(score: Score) -> Self {
        let (doc, score) = Document::with_score(score);
        Self {
            doc,
            containers: vec![score],
            measure: None,
            staff: None,
            groups: Vec::new(),
        }
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    pub fn finish(self) -> Document {
        self.doc
    }

    fn container(&self) -> NodeId {
        self.containers.last().copied().unwrap_or_else(|| self.doc.root())
    }

    fn leave_measure(&mut self) {
        self.measure = None;
        self.staff = None;
        self.groups.clear();
    }

    /// Add a node at the level of measures in the current container.
    fn structural(&mut self, kind: NodeKind) -> Result<NodeId> {
        if matches!(self.doc.kind(self.container())?, NodeKind::App(_)) {
            return Err(LayoutError::Misplaced {
                element: kind.name(),
                context: "reading",
            });
        }
        self.leave_measure();
        let parent = self.container();
        self.doc.add(parent, kind)
    }

    fn open(&mut self, kind: NodeKind) -> Result<NodeId> {
        let id = self.structural(kind)?;
        self.containers.push(id);
        Ok(id)
    }

    pub fn score_def(&mut self, def: ScoreDef) -> Result<NodeId> {
        self.structural(NodeKind::ScoreDef(def))
    }

    pub fn section(&mut self) -> Result<NodeId> {
        self.open(NodeKind::Section(Section::default()))
    }

    pub fn ending(&mut self, n: &str) -> Result<NodeId> {
        self.open(NodeKind::Ending(Ending {
            n: Some(n.to_string()),
        }))
    }

    /// Open an editorial alternative; add its readings with [`Self::reading`].
    pub fn app(&mut self, visible: usize) -> Result<NodeId> {
        self.open(NodeKind::App(App { visible }))
    }

    /// Open the next reading of the current app, closing the previous one.
    pub fn reading(&mut self) -> Result<NodeId> {
        if matches!(self.doc.kind(self.container())?, NodeKind::Reading) {
            self.containers.pop();
        }
        let app = self.container();
        if !matches!(self.doc.kind(app)?, NodeKind::App(_)) {
            return Err(LayoutError::Misplaced {
                element: "reading",
                context: "app",
            });
        }
        self.leave_measure();
        let id = self.doc.add(app, NodeKind::Reading)?;
        self.containers.push(id);
        Ok(id)
    }

    /// Close the innermost open section, ending, app or reading.
    pub fn close(&mut self) -> Result<NodeId> {
        let [_, .., id] = self.containers[..] else {
            return Err(LayoutError::Misplaced {
                element: "close",
                context: "section, ending or app",
            });
        };
        self.leave_measure();
        self.containers.pop();
        Ok(id)
    }

    pub fn sb(&mut self) -> Result<NodeId> {
        self.structural(NodeKind::Sb)
    }

    pub fn pb(&mut self) -> Result<NodeId> {
        self.structural(NodeKind::Pb)
    }

    pub fn measure(&mut self, n: i32) -> Result<NodeId> {
        self.measure_with(Measure::new(n))
    }

    pub fn measure_with(&mut self, measure: Measure) -> Result<NodeId> {
        let id = self.structural(NodeKind::Measure(measure))?;
        self.measure = Some(id);
        Ok(id)
    }

    pub fn staff(&mut self, n: u32) -> Result<NodeId> {
        let measure = self.measure.ok_or(LayoutError::Misplaced {
            element: "staff",
            context: "measure",
        })?;
        let id = self.doc.add(measure, NodeKind::Staff(Staff { n }))?;
        self.staff = Some(id);
        self.groups.clear();
        Ok(id)
    }

    pub fn layer(&mut self, n: u32) -> Result<NodeId> {
        let staff = self.staff.ok_or(LayoutError::Misplaced {
            element: "layer",
            context: "staff",
        })?;
        let id = self.doc.add(staff, NodeKind::Layer(Layer { n }))?;
        self.groups = vec![id];
        Ok(id)
    }

    /// Add a layer element inside the innermost open group.
    pub fn element(&mut self, kind: NodeKind) -> Result<NodeId> {
        let parent = self.groups.last().copied().ok_or(LayoutError::Misplaced {
            element: kind.name(),
            context: "layer",
        })?;
        self.doc.add(parent, kind)
    }

    pub fn note(&mut self, pitch: Pitch, dur: Duration) -> Result<NodeId> {
        self.element(NodeKind::Note(Note::new(pitch, dur)))
    }

    /// Add a note and let `edit` adjust it before insertion.
    pub fn note_with(
        &mut self,
        pitch: Pitch,
        dur: Duration,
        edit: impl FnOnce(&mut Note),
    ) -> Result<NodeId> {
        let mut note = Note::new(pitch, dur);
        edit(&mut note);
        self.element(NodeKind::Note(note))
    }

    pub fn grace(&mut self, pitch: Pitch, dur: Duration) -> Result<NodeId> {
        self.note_with(pitch, dur, |note| note.grace = true)
    }

    pub fn rest(&mut self, dur: Duration) -> Result<NodeId> {
        self.element(NodeKind::Rest(Rest {
            dur,
            dots: 0,
            dots_x: None,
        }))
    }

    /// Open a beam, tuplet or chord; following elements go inside it.
    pub fn begin(&mut self, kind: NodeKind) -> Result<NodeId> {
        if !matches!(
            kind,
            NodeKind::Beam | NodeKind::Tuplet(_) | NodeKind::Chord(_)
        ) {
            return Err(LayoutError::Misplaced {
                element: kind.name(),
                context: "layer as a group",
            });
        }
        let id = self.element(kind)?;
        self.groups.push(id);
        Ok(id)
    }

    /// Close the innermost group opened with [`Self::begin`].
    pub fn end(&mut self) -> Result<NodeId> {
        let [_, .., id] = self.groups[..] else {
            return Err(LayoutError::Misplaced {
                element: "end",
                context: "beam, tuplet or chord",
            });
        };
        self.groups.pop();
        Ok(id)
    }

    /// Attach a control event to the current measure.
    pub fn control(&mut self, event: ControlEvent) -> Result<NodeId> {
        let measure = self.measure.ok_or(LayoutError::Misplaced {
            element: "control",
            context: "measure",
        })?;
        self.doc.add(measure, NodeKind::Control(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Chord, Step};
    use pretty_assertions::assert_eq;

    fn names(doc: &Document, id: NodeId) -> Vec<&'static str> {
        doc.children(id)
            .unwrap()
            .iter()
            .map(|c| doc.kind(*c).unwrap().name())
            .collect()
    }

    #[test]
    fn builds_nested_containers() {
        let mut b = ScoreBuilder::new();
        b.score_def(ScoreDef::default()).unwrap();
        let section = b.section().unwrap();
        b.measure(1).unwrap();
        let ending = b.ending("1").unwrap();
        b.measure(2).unwrap();
        b.close().unwrap();
        b.close().unwrap();
        b.measure(3).unwrap();
        let doc = b.finish();

        let score = doc.children(doc.root()).unwrap()[0];
        assert_eq!(names(&doc, score), vec!["scoreDef", "section", "measure"]);
        assert_eq!(names(&doc, section), vec!["measure", "ending"]);
        assert_eq!(names(&doc, ending), vec!["measure"]);
    }

    #[test]
    fn groups_receive_following_elements() {
        let mut b = ScoreBuilder::new();
        b.measure(1).unwrap();
        b.staff(1).unwrap();
        let layer = b.layer(1).unwrap();
        let beam = b.begin(NodeKind::Beam).unwrap();
        b.begin(NodeKind::Chord(Chord {
            dur: Duration::Eighth,
            dots: 0,
            grace: false,
            stem: None,
            dots_x: None,
        }))
        .unwrap();
        b.note(Pitch::new(Step::C, 5), Duration::Eighth).unwrap();
        b.note(Pitch::new(Step::E, 5), Duration::Eighth).unwrap();
        b.end().unwrap();
        b.note(Pitch::new(Step::D, 5), Duration::Eighth).unwrap();
        b.end().unwrap();
        b.rest(Duration::Quarter).unwrap();
        let doc = b.finish();

        assert_eq!(names(&doc, layer), vec!["beam", "rest"]);
        assert_eq!(names(&doc, beam), vec!["chord", "note"]);
    }

    #[test]
    fn readings_live_inside_apps() {
        let mut b = ScoreBuilder::new();
        let app = b.app(0).unwrap();
        assert!(b.measure(1).is_err());
        b.reading().unwrap();
        b.measure(1).unwrap();
        b.reading().unwrap();
        b.measure(1).unwrap();
        b.close().unwrap();
        b.close().unwrap();
        let doc = b.finish();
        assert_eq!(names(&doc, app), vec!["reading", "reading"]);
    }

    #[test]
    fn elements_need_a_layer() {
        let mut b = ScoreBuilder::new();
        b.measure(1).unwrap();
        let err = b.note(Pitch::new(Step::C, 4), Duration::Quarter).unwrap_err();
        assert_eq!(err.to_string(), "note cannot be added outside of a layer");
    }
}
