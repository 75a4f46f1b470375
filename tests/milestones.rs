//! Structural containers across system breaks.

mod common;

use common::*;
use pretty_assertions::assert_eq;
use scorelayout::paginate::convert_to_score_based;
use scorelayout::{BreakPolicy, Document, LayoutOptions, NodeId, NodeKind};

struct Repeat {
    doc: Document,
    score: NodeId,
    section: NodeId,
    first: NodeId,
    second: NodeId,
}

/// `section { m1 m2 ending1 { m3 sb m4 } ending2 { m5 } }`
fn repeat() -> Repeat {
    let mut b = treble_builder();
    let section = b.section().unwrap();
    quarters(&mut b, 1, 4);
    quarters(&mut b, 2, 4);
    let first = b.ending("1").unwrap();
    quarters(&mut b, 3, 4);
    b.sb().unwrap();
    quarters(&mut b, 4, 4);
    b.close().unwrap();
    let second = b.ending("2").unwrap();
    quarters(&mut b, 5, 4);
    b.close().unwrap();
    b.close().unwrap();
    let doc = b.finish();
    let score = doc.children(doc.root()).unwrap()[0];
    Repeat {
        doc,
        score,
        section,
        first,
        second,
    }
}

fn line_breaks() -> LayoutOptions {
    LayoutOptions {
        breaks: BreakPolicy::Line,
        ..LayoutOptions::default()
    }
}

#[test]
fn systems_know_the_containers_open_at_their_start() {
    let Repeat {
        mut doc,
        score,
        section,
        first,
        ..
    } = repeat();
    layout(&mut doc, line_breaks());

    assert_eq!(measures_per_system(&doc), vec![vec![1, 2, 3], vec![4, 5]]);
    let systems = doc.systems().unwrap();
    assert_eq!(doc.system(systems[0]).unwrap().open_milestones, vec![]);
    assert_eq!(
        doc.system(systems[1]).unwrap().open_milestones,
        vec![score, section, first]
    );
}

#[test]
fn start_markers_travel_with_the_following_measure() {
    let Repeat {
        mut doc, second, ..
    } = repeat();
    layout(&mut doc, line_breaks());

    let systems = doc.systems().unwrap();
    let children = doc.children(systems[1]).unwrap();
    let m4 = children
        .iter()
        .position(|c| matches!(doc.kind(*c).unwrap(), NodeKind::Measure(m) if m.n == 4))
        .unwrap();
    let ending = children.iter().position(|c| *c == second).unwrap();
    assert!(m4 < ending);
    assert!(matches!(
        doc.kind(children[ending + 1]).unwrap(),
        NodeKind::Measure(m) if m.n == 5
    ));
}

#[test]
fn score_based_hierarchy_survives_layout() {
    let Repeat {
        mut doc,
        score,
        section,
        first,
        second,
    } = repeat();
    layout(&mut doc, line_breaks());
    convert_to_score_based(&mut doc).unwrap();

    assert!(!doc.is_page_based());
    assert_eq!(doc.children(doc.root()).unwrap(), &[score]);
    let in_section: Vec<_> = doc
        .children(section)
        .unwrap()
        .iter()
        .map(|c| doc.kind(*c).unwrap().name())
        .collect();
    assert_eq!(in_section, vec!["measure", "measure", "ending", "ending"]);
    let in_first: Vec<_> = doc
        .children(first)
        .unwrap()
        .iter()
        .map(|c| doc.kind(*c).unwrap().name())
        .collect();
    assert_eq!(in_first, vec!["measure", "sb", "measure"]);
    assert_eq!(doc.children(second).unwrap().len(), 1);
    assert!(doc
        .descendants(doc.root())
        .unwrap()
        .iter()
        .all(|c| !matches!(doc.kind(*c).unwrap(), NodeKind::MilestoneEnd(_))));
}

#[test]
fn only_the_visible_reading_is_laid_out() {
    let mut b = treble_builder();
    quarters(&mut b, 1, 4);
    let app = b.app(1).unwrap();
    b.reading().unwrap();
    let (hidden, _) = quarters(&mut b, 2, 4);
    b.reading().unwrap();
    let (shown, _) = quarters(&mut b, 2, 8);
    b.close().unwrap();
    b.close().unwrap();
    let mut doc = b.finish();
    layout(&mut doc, LayoutOptions::default());

    assert_eq!(measures_per_system(&doc), vec![vec![1, 2]]);
    let system = doc.systems().unwrap()[0];
    assert!(doc.system_measures(system).unwrap().contains(&shown));
    assert_eq!(doc.node(hidden).unwrap().pos.x_rel, 0);
    assert_eq!(doc.measure(hidden).unwrap().width, 0);

    convert_to_score_based(&mut doc).unwrap();
    assert_eq!(doc.children(app).unwrap().len(), 2);
}
