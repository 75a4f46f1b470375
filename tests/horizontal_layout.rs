//! Horizontal layout tests: time bucketing, spacing and collision integration
//! on whole documents.

mod common;

use common::*;
use pretty_assertions::assert_eq;
use scorelayout::layout::SlotCategory;
use scorelayout::{
    Accidental, Anchor, ControlEvent, ControlKind, Document, Duration, LayoutOptions,
    LayoutReport, LayoutWarning, NodeId, Pitch, Step,
};

fn natural(doc: &mut Document) -> LayoutReport {
    init_logger();
    let engine = engine(LayoutOptions::default());
    let mut report = LayoutReport::default();
    engine.prepare(doc).unwrap();
    engine.layout_horizontally(doc, &mut report).unwrap();
    report
}

fn is_score_def(category: SlotCategory) -> bool {
    matches!(
        category,
        SlotCategory::ScoreDefClef
            | SlotCategory::ScoreDefKeySig
            | SlotCategory::ScoreDefMensur
            | SlotCategory::ScoreDefMeterSig
    )
}

#[test]
fn four_quarters_make_six_slots() {
    let mut b = treble_builder();
    let (measure, notes) = quarters(&mut b, 1, 4);
    let mut doc = b.finish();
    let report = natural(&mut doc);
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);

    let m = doc.measure(measure).unwrap();
    let slots: Vec<_> = m
        .track
        .slots()
        .iter()
        .filter(|s| !is_score_def(s.category))
        .collect();
    let categories: Vec<_> = slots.iter().map(|s| s.category).collect();
    let times: Vec<_> = slots.iter().map(|s| s.time).collect();
    assert_eq!(
        categories,
        vec![
            SlotCategory::MeasureStart,
            SlotCategory::Default,
            SlotCategory::Default,
            SlotCategory::Default,
            SlotCategory::Default,
            SlotCategory::MeasureEnd,
        ]
    );
    assert_eq!(times, vec![0.0, 0.0, 1.0, 2.0, 3.0, 4.0]);
    for pair in slots.windows(2) {
        assert!(
            pair[0].relative_x < pair[1].relative_x,
            "{:?} at {} is not left of {:?} at {}",
            pair[0].category,
            pair[0].relative_x,
            pair[1].category,
            pair[1].relative_x
        );
    }
    assert_eq!(slots[5].relative_x, m.width);
    assert!(m.track.is_ordered());

    // every note sits on its slot
    for (note, slot) in notes.iter().zip(&slots[1..5]) {
        assert_eq!(doc.node(*note).unwrap().pos.x_rel, slot.relative_x);
    }
}

#[test]
fn opening_attributes_precede_the_first_note() {
    let mut b = treble_builder();
    let (measure, notes) = quarters(&mut b, 1, 4);
    let mut doc = b.finish();
    natural(&mut doc);

    let m = doc.measure(measure).unwrap();
    let categories: Vec<_> = m.attributes.iter().map(|a| a.category).collect();
    assert_eq!(
        categories,
        vec![SlotCategory::ScoreDefClef, SlotCategory::ScoreDefMeterSig]
    );
    let meter = &m.attributes[1];
    let first_note = doc.node(notes[0]).unwrap().pos.x_rel;
    assert!(meter.x_rel + meter.width < first_note);
}

#[test]
fn accidentals_and_dots_push_neighbours() {
    let plain_width = {
        let mut b = treble_builder();
        let (measure, _) = quarters(&mut b, 1, 4);
        let mut doc = b.finish();
        natural(&mut doc);
        doc.measure(measure).unwrap().width
    };

    let mut b = treble_builder();
    let measure = b.measure(1).unwrap();
    b.staff(1).unwrap();
    b.layer(1).unwrap();
    let mut sharps = Vec::new();
    for step in [Step::C, Step::D, Step::E, Step::F] {
        sharps.push(
            b.note_with(Pitch::new(step, 5), Duration::Quarter, |n| {
                n.accid = Some(Accidental::Sharp);
            })
            .unwrap(),
        );
    }
    let mut doc = b.finish();
    natural(&mut doc);

    assert!(doc.measure(measure).unwrap().width > plain_width);
    for note in sharps {
        let x = doc.node(note).unwrap().pos.x_rel;
        let accid_x = doc.note(note).unwrap().layout.accid_x.unwrap();
        assert!(accid_x < x);
    }
}

#[test]
fn grace_notes_stack_left_of_their_principal() {
    let mut b = treble_builder();
    let measure = b.measure(1).unwrap();
    b.staff(1).unwrap();
    b.layer(1).unwrap();
    let first = b.note(Pitch::new(Step::C, 5), Duration::Quarter).unwrap();
    let graces: Vec<NodeId> = [Step::E, Step::F, Step::G]
        .into_iter()
        .map(|step| b.grace(Pitch::new(step, 5), Duration::Sixteenth).unwrap())
        .collect();
    let principal = b.note(Pitch::new(Step::A, 5), Duration::Quarter).unwrap();
    b.note(Pitch::new(Step::B, 5), Duration::Half).unwrap();
    let mut doc = b.finish();
    natural(&mut doc);

    let x = |id: NodeId| doc.node(id).unwrap().pos.x_rel;
    assert!(x(first) < x(graces[0]));
    assert!(x(graces[0]) < x(graces[1]));
    assert!(x(graces[1]) < x(graces[2]));
    assert!(x(graces[2]) < x(principal));

    let track = &doc.measure(measure).unwrap().track;
    let grace_slot = track
        .slots()
        .iter()
        .find(|s| s.category == SlotCategory::GraceNote)
        .unwrap();
    assert_eq!(grace_slot.time, 1.0);
    let group = &grace_slot.grace_tracks[&(1, 1)];
    assert!(group.is_flushed());
}

#[test]
fn layers_of_different_length_keep_the_longest() {
    let mut b = treble_builder();
    let measure = b.measure(1).unwrap();
    b.staff(1).unwrap();
    b.layer(1).unwrap();
    b.note(Pitch::new(Step::C, 5), Duration::Whole).unwrap();
    b.layer(2).unwrap();
    b.note(Pitch::new(Step::C, 4), Duration::Half).unwrap();
    let mut doc = b.finish();
    let report = natural(&mut doc);

    assert_eq!(doc.measure(measure).unwrap().track.max_time(), 4.0);
    assert!(report.has_warning(|w| matches!(
        w,
        LayoutWarning::MultipleLayers { measure: m, .. } if *m == measure
    )));
}

#[test]
fn empty_measure_is_laid_out_with_a_warning() {
    let mut b = treble_builder();
    quarters(&mut b, 1, 4);
    let empty = b.measure(2).unwrap();
    let mut doc = b.finish();
    let report = natural(&mut doc);

    assert!(doc.measure(empty).unwrap().width > 0);
    assert_eq!(
        report.warnings,
        vec![LayoutWarning::EmptyMeasure { measure: empty }]
    );
}

#[test]
fn timestamp_controls_sit_between_notes() {
    let mut b = treble_builder();
    let (measure, notes) = quarters(&mut b, 1, 4);
    let on_beat = b
        .control(ControlEvent::new(ControlKind::Dynam, 1, Anchor::Tstamp(2.0)))
        .unwrap();
    let between = b
        .control(ControlEvent::new(ControlKind::Dynam, 1, Anchor::Tstamp(2.5)))
        .unwrap();
    let mut hairpin = ControlEvent::new(ControlKind::Hairpin, 1, Anchor::Element(notes[0]));
    hairpin.end = Some(Anchor::Element(notes[3]));
    let hairpin = b.control(hairpin).unwrap();
    let mut doc = b.finish();
    natural(&mut doc);

    let x = |id: NodeId| doc.node(id).unwrap().pos.x_rel;
    assert_eq!(x(on_beat), x(notes[1]));
    assert!(x(notes[1]) < x(between) && x(between) < x(notes[2]));
    assert_eq!(x(hairpin), x(notes[0]));
    assert_eq!(
        doc.control(hairpin).unwrap().width,
        x(notes[3]) - x(notes[0])
    );
    assert!(doc.measure(measure).unwrap().timestamps.len() >= 2);
}

#[test]
fn anchor_in_another_measure_is_reported() {
    let mut b = treble_builder();
    let (_, first_notes) = quarters(&mut b, 1, 4);
    quarters(&mut b, 2, 4);
    let stray = b
        .control(ControlEvent::new(
            ControlKind::Fermata,
            1,
            Anchor::Element(first_notes[0]),
        ))
        .unwrap();
    let mut doc = b.finish();
    let report = natural(&mut doc);
    assert_eq!(
        report.warnings,
        vec![LayoutWarning::UnresolvedAnchor { control: stray }]
    );
}

#[test]
fn relayout_is_idempotent() {
    let mut doc = four_quarter_score(3);
    natural(&mut doc);
    let positions = |doc: &Document| -> Vec<_> {
        doc.measures()
            .unwrap()
            .into_iter()
            .flat_map(|m| {
                let mut ids = vec![m];
                ids.extend(doc.descendants(m).unwrap());
                ids
            })
            .map(|id| (id, doc.node(id).unwrap().pos))
            .collect()
    };
    let first = positions(&doc);
    natural(&mut doc);
    assert_eq!(positions(&doc), first);
}

#[test]
fn measures_are_laid_end_to_end() {
    let mut doc = four_quarter_score(3);
    natural(&mut doc);
    let system = doc.systems().unwrap()[0];
    let mut expected = 0;
    for measure in doc.system_measures(system).unwrap() {
        assert_eq!(doc.node(measure).unwrap().pos.x_rel, expected);
        expected += doc.measure(measure).unwrap().width;
    }
    assert_eq!(doc.system(system).unwrap().width, expected);
}
