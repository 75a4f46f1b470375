//! Cast-off tests: systems, pages, justification and the layout map.

mod common;

use common::*;
use pretty_assertions::assert_eq;
use scorelayout::layout::SlotCategory;
use scorelayout::paginate::uncast_off;
use scorelayout::{
    compute_layout_map, document_from_json, document_to_json, layout_map_to_json, BreakPolicy,
    Document, LayoutOptions, LayoutWarning, MeterSig, ScoreDef,
};

fn with_breaks(breaks: BreakPolicy) -> LayoutOptions {
    LayoutOptions {
        breaks,
        ..LayoutOptions::default()
    }
}

#[test]
fn over_wide_measure_sits_alone() {
    let mut b = treble_builder();
    quarters(&mut b, 1, 4);
    let (wide, _) = quarters(&mut b, 2, 40);
    quarters(&mut b, 3, 4);
    let mut doc = b.finish();
    let report = layout(&mut doc, LayoutOptions::default());

    assert_eq!(measures_per_system(&doc), vec![vec![1], vec![2], vec![3]]);
    assert!(doc.measure(wide).unwrap().width > 2000);
    assert!(report.has_warning(|w| matches!(
        w,
        LayoutWarning::MeasureTooWide { measure, available: 2000, .. } if *measure == wide
    )));
    // stretching can only widen, so the over-wide system stays natural
    let systems = doc.systems().unwrap();
    assert_eq!(doc.system(systems[1]).unwrap().justification, 1.0);
    assert!(report.has_warning(|w| matches!(
        w,
        LayoutWarning::JustificationUnderflow { system, .. } if *system == systems[1]
    )));
}

#[test]
fn auto_breaks_fill_and_justify_systems() {
    let mut doc = four_quarter_score(20);
    let report = layout(&mut doc, LayoutOptions::default());

    let systems = doc.systems().unwrap();
    assert!(systems.len() > 2);
    assert_eq!(report.systems, systems.len());
    let numbers: Vec<i32> = measures_per_system(&doc).concat();
    assert_eq!(numbers, (1..=20).collect::<Vec<_>>());

    let (last, full) = systems.split_last().unwrap();
    for &system in full {
        let width = doc.system(system).unwrap().width;
        let measures = doc.system_measures(system).unwrap().len() as i32;
        assert!(
            (width - 2000).abs() <= measures,
            "system {system} is {width} wide"
        );
        assert!(doc.system(system).unwrap().justification >= 1.0);
    }
    // the short final system is left at its natural width
    let last = doc.system(*last).unwrap();
    assert_eq!(last.justification, 1.0);
    assert!(last.width < 2000);
}

#[test]
fn justification_keeps_leading_and_trailing_widths() {
    let mut doc = four_quarter_score(20);
    let engine = engine(LayoutOptions::default());
    let mut report = Default::default();
    engine.prepare(&mut doc).unwrap();
    engine.layout_horizontally(&mut doc, &mut report).unwrap();
    engine.cast_off_systems(&mut doc, &mut report).unwrap();
    engine.layout_horizontally(&mut doc, &mut report).unwrap();

    let system = doc.systems().unwrap()[0];
    let measure = doc.system_measures(system).unwrap()[0];
    let fixed = |doc: &Document| {
        let track = &doc.measure(measure).unwrap().track;
        let slots = track.slots();
        (
            slots[track.left_ref()].relative_x,
            track.width() - slots[track.right_ref()].relative_x,
        )
    };
    let before = fixed(&doc);
    let natural = doc.measure(measure).unwrap().track.justifiable_width();

    let ratios = engine.justify_systems(&mut doc, &mut report).unwrap();
    assert!(ratios[0] > 1.0);
    assert_eq!(fixed(&doc), before);
    let stretched = doc.measure(measure).unwrap().track.justifiable_width();
    assert!(stretched > natural);
    assert!(doc.measure(measure).unwrap().track.is_ordered());
}

#[test]
fn uncast_off_restores_the_continuous_sequence() {
    let mut doc = four_quarter_score(20);
    layout(&mut doc, LayoutOptions::default());
    let breaks = measures_per_system(&doc);
    let measures = doc.measures().unwrap();

    uncast_off(&mut doc).unwrap();
    assert_eq!(doc.pages().unwrap().len(), 1);
    let system = doc.systems().unwrap()[0];
    assert_eq!(doc.system_measures(system).unwrap(), measures);

    layout(&mut doc, LayoutOptions::default());
    assert_eq!(measures_per_system(&doc), breaks);
}

#[test]
fn uncast_off_restores_the_exact_child_order() {
    let mut b = treble_builder();
    quarters(&mut b, 1, 4);
    b.score_def(ScoreDef {
        meter: Some(MeterSig::new(3, 4)),
        ..ScoreDef::default()
    })
    .unwrap();
    b.sb().unwrap();
    quarters(&mut b, 2, 3);
    b.ending("1").unwrap();
    b.sb().unwrap();
    quarters(&mut b, 3, 3);
    b.close().unwrap();
    quarters(&mut b, 4, 3);
    let mut doc = b.finish();

    let options = with_breaks(BreakPolicy::Line);
    engine(options.clone()).prepare(&mut doc).unwrap();
    let continuous = doc.children(doc.systems().unwrap()[0]).unwrap().to_vec();

    layout(&mut doc, options);
    assert_eq!(measures_per_system(&doc), vec![vec![1], vec![2], vec![3, 4]]);
    uncast_off(&mut doc).unwrap();
    let system = doc.systems().unwrap()[0];
    assert_eq!(doc.children(system).unwrap(), &continuous[..]);
}

fn encoded_breaks() -> Document {
    let mut b = treble_builder();
    quarters(&mut b, 1, 4);
    quarters(&mut b, 2, 4);
    b.sb().unwrap();
    quarters(&mut b, 3, 4);
    quarters(&mut b, 4, 4);
    b.pb().unwrap();
    quarters(&mut b, 5, 4);
    quarters(&mut b, 6, 4);
    b.finish()
}

#[test]
fn line_policy_follows_encoded_system_breaks() {
    let mut doc = encoded_breaks();
    let report = layout(&mut doc, with_breaks(BreakPolicy::Line));
    assert_eq!(
        measures_per_system(&doc),
        vec![vec![1, 2], vec![3, 4], vec![5, 6]]
    );
    assert_eq!(report.pages, 1);
}

#[test]
fn encoded_policy_follows_page_breaks() {
    let mut doc = encoded_breaks();
    let report = layout(&mut doc, with_breaks(BreakPolicy::Encoded));
    assert_eq!(
        measures_per_system(&doc),
        vec![vec![1, 2], vec![3, 4], vec![5, 6]]
    );
    assert_eq!(report.pages, 2);
    let pages = doc.pages().unwrap();
    assert_eq!(doc.children(pages[1]).unwrap().len(), 1);
}

#[test]
fn auto_policy_ignores_encoded_breaks() {
    let mut doc = encoded_breaks();
    layout(&mut doc, LayoutOptions::default());
    assert_eq!(measures_per_system(&doc), vec![(1..=6).collect::<Vec<_>>()]);
}

fn score_with_sb_after(measure: i32, count: i32) -> Document {
    let mut b = treble_builder();
    for n in 1..=count {
        quarters(&mut b, n, 4);
        if n == measure {
            b.sb().unwrap();
        }
    }
    b.finish()
}

#[test]
fn smart_breaks_need_a_full_enough_system() {
    let mut auto = score_with_sb_after(1, 12);
    layout(&mut auto, LayoutOptions::default());
    let mut early = score_with_sb_after(1, 12);
    layout(&mut early, with_breaks(BreakPolicy::Smart));
    assert_eq!(measures_per_system(&early), measures_per_system(&auto));

    let auto_first = measures_per_system(&auto)[0].len();
    assert!(auto_first > 5, "first system holds {auto_first} measures");
    let mut late = score_with_sb_after(5, 12);
    layout(&mut late, with_breaks(BreakPolicy::Smart));
    assert_eq!(measures_per_system(&late)[0], vec![1, 2, 3, 4, 5]);
}

#[test]
fn no_widow_merges_a_lonely_last_measure() {
    let count = (7..=30)
        .find(|&count| {
            let mut doc = four_quarter_score(count);
            layout(&mut doc, LayoutOptions::default());
            measures_per_system(&doc).last().map(Vec::len) == Some(1)
        })
        .unwrap();

    let mut plain = four_quarter_score(count);
    layout(&mut plain, LayoutOptions::default());
    let plain = measures_per_system(&plain);

    let mut doc = four_quarter_score(count);
    let options = LayoutOptions {
        breaks_no_widow: true,
        ..LayoutOptions::default()
    };
    layout(&mut doc, options);
    let merged = measures_per_system(&doc);
    assert_eq!(merged.len(), plain.len() - 1);
    assert_eq!(merged.last().unwrap().len(), plain[plain.len() - 2].len() + 1);
}

fn small_pages() -> LayoutOptions {
    LayoutOptions {
        page_height: 600,
        ..LayoutOptions::default()
    }
}

#[test]
fn pages_fill_by_height() {
    let mut doc = four_quarter_score(40);
    let options = small_pages();
    let report = layout(&mut doc, options.clone());
    assert!(report.pages > 1);

    for (i, page) in doc.pages().unwrap().into_iter().enumerate() {
        let systems = doc.children(page).unwrap().to_vec();
        assert!(!systems.is_empty());
        assert!(doc.page(page).unwrap().content_height <= options.available_height(i == 0));

        let mut y = options.content_top(i == 0);
        for system in systems {
            let pos = doc.node(system).unwrap().pos;
            assert_eq!((pos.x_rel, pos.y_rel), (options.page_margin_left, y));
            y += doc.system(system).unwrap().height + options.system_spacing;
        }
    }
}

#[test]
fn system_limit_per_page() {
    let mut doc = four_quarter_score(20);
    let options = LayoutOptions {
        system_max_per_page: 1,
        ..LayoutOptions::default()
    };
    let report = layout(&mut doc, options);
    assert_eq!(report.pages, report.systems);
}

#[test]
fn vertical_justification_spreads_spare_height() {
    let options = LayoutOptions {
        min_last_justification: 0.0,
        ..LayoutOptions::default()
    };
    let mut natural = four_quarter_score(20);
    layout(&mut natural, options.clone());
    let mut doc = four_quarter_score(20);
    layout(
        &mut doc,
        LayoutOptions {
            justify_vertically: true,
            ..options.clone()
        },
    );

    let page = doc.pages().unwrap()[0];
    let before = natural.page(natural.pages().unwrap()[0]).unwrap().content_height;
    let after = doc.page(page).unwrap().content_height;
    let cap = (options.justification_max_vertical * options.page_height as f64) as i32;
    assert!(after > before);
    assert!(after <= options.available_height(true));
    assert!(after - before <= cap + 1);

    let first = |doc: &Document| doc.node(doc.systems().unwrap()[0]).unwrap().pos.y_rel;
    assert_eq!(first(&doc), first(&natural));
}

#[test]
fn unbroken_layout_keeps_one_system() {
    let mut doc = four_quarter_score(20);
    let report = layout(&mut doc, with_breaks(BreakPolicy::None));
    assert_eq!((report.pages, report.systems), (1, 1));
    let system = doc.systems().unwrap()[0];
    assert!(doc.system(system).unwrap().width > 2000);
}

#[test]
fn layout_map_reports_absolute_positions() {
    let mut doc = four_quarter_score(12);
    layout(&mut doc, LayoutOptions::default());
    let map = compute_layout_map(&doc).unwrap();

    assert_eq!(map.pages.len(), 1);
    let systems = &map.pages[0].systems;
    assert!(systems.len() >= 2);
    assert_eq!((systems[0].x, systems[0].y), (50, 50));
    for system in systems {
        assert_eq!(system.measures[0].x, system.x);
        for pair in system.measures.windows(2) {
            assert_eq!(pair[0].x + pair[0].width, pair[1].x);
        }
        assert_eq!(system.staves.len(), 1);
        assert!(system.staves[0].y >= system.y);
        assert_eq!(system.staves[0].height, 72);
    }
    assert!(systems[1].y > systems[0].y + systems[0].height);

    let json = layout_map_to_json(&doc).unwrap();
    assert!(json.contains("\"barline_x\""));
}

#[test]
fn json_round_trip_lays_out_identically() {
    let mut original = four_quarter_score(12);
    layout(&mut original, LayoutOptions::default());

    let json = document_to_json(&four_quarter_score(12)).unwrap();
    let mut doc = document_from_json(&json).unwrap();
    layout(&mut doc, LayoutOptions::default());
    assert_eq!(measures_per_system(&doc), measures_per_system(&original));
}

#[test]
fn meter_change_after_a_break_is_announced() {
    let mut b = treble_builder();
    quarters(&mut b, 1, 4);
    let (before, _) = quarters(&mut b, 2, 4);
    b.sb().unwrap();
    b.score_def(ScoreDef {
        meter: Some(MeterSig::new(3, 4)),
        ..ScoreDef::default()
    })
    .unwrap();
    let (after, _) = quarters(&mut b, 3, 3);
    let mut doc = b.finish();
    layout(&mut doc, with_breaks(BreakPolicy::Line));

    assert_eq!(measures_per_system(&doc), vec![vec![1, 2], vec![3]]);
    let has = |measure, category| {
        doc.measure(measure)
            .unwrap()
            .track
            .slots()
            .iter()
            .any(|s| s.category == category)
    };
    assert!(has(before, SlotCategory::CautionMeterSig));
    assert!(!has(before, SlotCategory::CautionClef));
    assert!(has(after, SlotCategory::ScoreDefMeterSig));
    assert_eq!(doc.measure(after).unwrap().track.max_time(), 3.0);
}
