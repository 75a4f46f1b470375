//! Shared document builders for the integration tests.

#![allow(dead_code)]

use scorelayout::{
    Clef, Document, Duration, LayoutEngine, LayoutOptions, LayoutReport, MeterSig, NodeId, Pitch,
    ScoreBuilder, ScoreDef, StaffDef, Step,
};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Score definition with one staff per clef, in 4/4.
pub fn score_def(clefs: &[Clef]) -> ScoreDef {
    let staff_defs = clefs
        .iter()
        .enumerate()
        .map(|(i, clef)| {
            let mut def = StaffDef::new(i as u32 + 1);
            def.clef = Some(*clef);
            def
        })
        .collect();
    ScoreDef {
        staff_defs,
        meter: Some(MeterSig::new(4, 4)),
        ..ScoreDef::default()
    }
}

/// A single-staff treble builder with its score definition written.
pub fn treble_builder() -> ScoreBuilder {
    let mut b = ScoreBuilder::new();
    b.score_def(score_def(&[Clef::TREBLE])).unwrap();
    b
}

/// Add a measure of `count` quarter notes on staff 1, layer 1.
pub fn quarters(b: &mut ScoreBuilder, n: i32, count: usize) -> (NodeId, Vec<NodeId>) {
    let measure = b.measure(n).unwrap();
    b.staff(1).unwrap();
    b.layer(1).unwrap();
    let steps = [Step::C, Step::D, Step::E, Step::F, Step::G, Step::A, Step::B];
    let notes = (0..count)
        .map(|i| {
            b.note(Pitch::new(steps[i % steps.len()], 5), Duration::Quarter)
                .unwrap()
        })
        .collect();
    (measure, notes)
}

/// A treble score of `count` measures of four quarters.
pub fn four_quarter_score(count: usize) -> Document {
    let mut b = treble_builder();
    for n in 1..=count {
        quarters(&mut b, n as i32, 4);
    }
    b.finish()
}

pub fn engine(options: LayoutOptions) -> LayoutEngine {
    LayoutEngine::with_default_metrics(options).unwrap()
}

pub fn layout(doc: &mut Document, options: LayoutOptions) -> LayoutReport {
    init_logger();
    engine(options).layout(doc).unwrap()
}

/// Measure numbers of every system, in order.
pub fn measures_per_system(doc: &Document) -> Vec<Vec<i32>> {
    doc.systems()
        .unwrap()
        .into_iter()
        .map(|system| {
            doc.system_measures(system)
                .unwrap()
                .into_iter()
                .map(|m| doc.measure(m).unwrap().n)
                .collect()
        })
        .collect()
}
