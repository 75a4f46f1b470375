//! Conversion between score-based and page-based documents.
//!
//! In page-based form the structural containers (score, sections, endings,
//! apps) no longer enclose their measures. Each container node stays in the
//! flat content as its own start marker and a [`MilestoneEnd`] pointing back
//! at it closes the range.

use crate::error::{LayoutError, Result};
use crate::model::{Document, MilestoneEnd, NodeId, NodeKind, Page, System};

/// Flatten a score-based document into one page holding one continuous
/// system. Page-based documents are left untouched.
pub fn convert_to_page_based(doc: &mut Document) -> Result<()> {
    if doc.is_page_based() {
        return Ok(());
    }
    let root = doc.root();
    let content = doc.children(root)?.to_vec();
    let pages = doc.add(root, NodeKind::Pages)?;
    let page = doc.add(pages, NodeKind::Page(Page::default()))?;
    let system = doc.add(page, NodeKind::System(System::default()))?;
    for node in content {
        flatten(doc, node, system)?;
    }
    log::debug!(
        "converted to page-based: {} items in the continuous system",
        doc.children(system)?.len()
    );
    Ok(())
}

fn flatten(doc: &mut Document, node: NodeId, system: NodeId) -> Result<()> {
    let Some(start_kind) = doc.kind(node)?.milestone_kind() else {
        return doc.append(system, node);
    };
    let content = match doc.kind(node)? {
        // only the visible reading is laid out; its node stays in the app
        NodeKind::App(app) => match doc.children(node)?.get(app.visible) {
            Some(&reading) => doc.children(reading)?.to_vec(),
            None => Vec::new(),
        },
        _ => doc.children(node)?.to_vec(),
    };
    doc.append(system, node)?;
    for child in content {
        flatten(doc, child, system)?;
    }
    let end = doc.alloc(NodeKind::MilestoneEnd(MilestoneEnd {
        start: node,
        start_kind,
    }));
    doc.append(system, end)
}

enum Item {
    Start { inner: NodeId },
    End { start: NodeId },
    Content,
}

/// Rebuild the container hierarchy from start and end markers and drop the
/// page and system containers.
pub fn convert_to_score_based(doc: &mut Document) -> Result<()> {
    let container = doc.pages_container()?.ok_or(LayoutError::NotPageBased)?;
    let root = doc.root();
    let mut content = Vec::new();
    for page in doc.children(container)?.to_vec() {
        for system in doc.children(page)?.to_vec() {
            content.extend_from_slice(doc.children(system)?);
        }
    }

    // (start marker, node receiving its content)
    let mut open: Vec<(NodeId, NodeId)> = Vec::new();
    for node in content {
        let item = match doc.kind(node)? {
            NodeKind::MilestoneEnd(end) => Item::End { start: end.start },
            NodeKind::App(app) => Item::Start {
                inner: doc.children(node)?.get(app.visible).copied().unwrap_or(node),
            },
            kind if kind.milestone_kind().is_some() => Item::Start { inner: node },
            _ => Item::Content,
        };
        let target = open.last().map_or(root, |&(_, inner)| inner);
        match item {
            Item::Start { inner } => {
                doc.append(target, node)?;
                open.push((node, inner));
            }
            Item::End { start } => match open.pop() {
                Some((current, _)) if current == start => doc.remove(node)?,
                other => {
                    return Err(LayoutError::MismatchedMilestone {
                        end: node,
                        expected: other.map(|(current, _)| current),
                        found: start,
                    })
                }
            },
            Item::Content => doc.append(target, node)?,
        }
    }
    if let Some((start, _)) = open.pop() {
        return Err(LayoutError::UnclosedMilestone(start));
    }
    doc.remove(container)?;
    Ok(())
}

/// Record on every system the milestones still open where it starts.
pub fn record_open_milestones(doc: &mut Document) -> Result<()> {
    let mut open: Vec<NodeId> = Vec::new();
    for system in doc.systems()? {
        doc.system_mut(system)?.open_milestones = open.clone();
        for &child in doc.children(system)? {
            match doc.kind(child)? {
                NodeKind::MilestoneEnd(end) => {
                    if let Some(pos) = open.iter().rposition(|s| *s == end.start) {
                        open.truncate(pos);
                    }
                }
                kind if kind.milestone_kind().is_some() => open.push(child),
                _ => {}
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{App, Ending, Measure, MilestoneKind, Score, Section};

    fn score() -> (Document, Vec<NodeId>) {
        let mut doc = Document::new();
        let root = doc.root();
        let score = doc.add(root, NodeKind::Score(Score::default())).unwrap();
        let section = doc.add(score, NodeKind::Section(Section::default())).unwrap();
        let m1 = doc.add(section, NodeKind::Measure(Measure::new(1))).unwrap();
        let ending = doc.add(section, NodeKind::Ending(Ending::default())).unwrap();
        let m2 = doc.add(ending, NodeKind::Measure(Measure::new(2))).unwrap();
        (doc, vec![score, section, m1, ending, m2])
    }

    fn kinds(doc: &Document, system: NodeId) -> Vec<&'static str> {
        doc.children(system)
            .unwrap()
            .iter()
            .map(|c| doc.kind(*c).unwrap().name())
            .collect()
    }

    #[test]
    fn containers_become_marker_pairs() {
        let (mut doc, ids) = score();
        convert_to_page_based(&mut doc).unwrap();
        let system = doc.systems().unwrap()[0];
        assert_eq!(
            kinds(&doc, system),
            vec![
                "score",
                "section",
                "measure",
                "ending",
                "measure",
                "milestoneEnd",
                "milestoneEnd",
                "milestoneEnd"
            ]
        );
        let last = *doc.children(system).unwrap().last().unwrap();
        let end = doc.milestone_end(last).unwrap();
        assert_eq!(end.start, ids[0]);
        assert_eq!(end.start_kind, MilestoneKind::Score);
        assert!(doc.children(ids[1]).unwrap().is_empty());
    }

    #[test]
    fn round_trip_restores_hierarchy() {
        let (mut doc, ids) = score();
        convert_to_page_based(&mut doc).unwrap();
        convert_to_score_based(&mut doc).unwrap();
        let (score, section, m1, ending, m2) = (ids[0], ids[1], ids[2], ids[3], ids[4]);
        assert_eq!(doc.children(doc.root()).unwrap(), &[score]);
        assert_eq!(doc.children(score).unwrap(), &[section]);
        assert_eq!(doc.children(section).unwrap(), &[m1, ending]);
        assert_eq!(doc.children(ending).unwrap(), &[m2]);
        assert!(!doc.is_page_based());
    }

    #[test]
    fn hidden_readings_stay_in_the_app() {
        let mut doc = Document::new();
        let root = doc.root();
        let score = doc.add(root, NodeKind::Score(Score::default())).unwrap();
        let app = doc.add(score, NodeKind::App(App { visible: 1 })).unwrap();
        let lemma = doc.add(app, NodeKind::Reading).unwrap();
        let hidden = doc.add(lemma, NodeKind::Measure(Measure::new(1))).unwrap();
        let variant = doc.add(app, NodeKind::Reading).unwrap();
        let shown = doc.add(variant, NodeKind::Measure(Measure::new(1))).unwrap();

        convert_to_page_based(&mut doc).unwrap();
        assert_eq!(doc.measures().unwrap().len(), 2);
        assert_eq!(doc.children(lemma).unwrap(), &[hidden]);
        let system = doc.systems().unwrap()[0];
        assert_eq!(doc.system_measures(system).unwrap(), vec![shown]);

        convert_to_score_based(&mut doc).unwrap();
        assert_eq!(doc.children(variant).unwrap(), &[shown]);
    }

    #[test]
    fn mismatched_end_is_rejected() {
        let (mut doc, ids) = score();
        convert_to_page_based(&mut doc).unwrap();
        let system = doc.systems().unwrap()[0];
        // close the score before the section
        let score_end = *doc.children(system).unwrap().last().unwrap();
        doc.detach(score_end).unwrap();
        doc.insert(system, 6, score_end).unwrap();
        let err = convert_to_score_based(&mut doc).unwrap_err();
        assert!(
            matches!(
                err,
                LayoutError::MismatchedMilestone { end, expected: Some(e), found }
                    if end == score_end && e == ids[1] && found == ids[0]
            ),
            "got {err}"
        );
    }

    #[test]
    fn unclosed_start_is_rejected() {
        let (mut doc, ids) = score();
        convert_to_page_based(&mut doc).unwrap();
        let system = doc.systems().unwrap()[0];
        let last = *doc.children(system).unwrap().last().unwrap();
        doc.remove(last).unwrap();
        let err = convert_to_score_based(&mut doc).unwrap_err();
        assert!(matches!(err, LayoutError::UnclosedMilestone(id) if id == ids[0]));
    }
}
