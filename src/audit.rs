//! Consistency checks run after placement.
//!
//! Neither check changes text. [`flag_suspicious`] marks apparatus entries whose lemma shows up
//! again right after them, which usually means the entry grabbed an earlier occurrence than the
//! editor meant. [`failures_inside_markup`] tells apart failed entries whose lemma was swallowed
//! by other inserted markup from those that are simply absent from the page.

use serde::{Deserialize, Serialize};

use crate::{
    config::EditionConfig,
    pattern::LabelPattern,
    placement::{AnnotationKind, FailureRecord},
    tree::{DocumentTree, NodeId},
};

fn next_sibling(tree: &DocumentTree, id: NodeId) -> Option<NodeId> {
    let (parent, index) = tree.location(id).ok()?;
    tree.children(parent).get(index + 1).copied()
}

fn starts_with_lem(tree: &DocumentTree, id: NodeId) -> bool {
    tree.tag(id) == "app"
        && tree
            .children(id)
            .first()
            .is_some_and(|first| tree.tag(*first) == "lem")
}

/// Set `suspicious="yes"` on every `<app>` whose lemma text occurs in the tail of the app or of
/// a following sibling, up to the next apparatus entry. Returns how many were flagged.
pub fn flag_suspicious(tree: &mut DocumentTree) -> usize {
    let mut flagged = vec![];
    for lem in tree.find_all("lem") {
        let lemma = tree.text(lem);
        let Some(app) = tree.parent_of(lem) else {
            continue;
        };
        if lemma.trim().is_empty() {
            continue;
        }
        let mut current = Some(app);
        while let Some(node) = current {
            if tree.tail(node).contains(lemma) {
                flagged.push(app);
                break;
            }
            current = next_sibling(tree, node).filter(|next| !starts_with_lem(tree, *next));
        }
    }
    flagged.dedup();
    for app in &flagged {
        tree.set_attr(*app, "suspicious", "yes");
    }
    tracing::info!("Flagged {} suspicious critical app entries", flagged.len());
    flagged.len()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsideMarkup {
    /// Failed lemmas matching the text of an inserted `<lem>` or `<rdg>`
    pub inside_apparatus: usize,
    /// Failed lemmas matching the text wrapped by a gloss anchor
    pub inside_anchors: usize,
}

/// For failed apparatus entries, count lemma matches inside markup already inserted into the
/// paragraph of the entry's page anchor.
pub fn failures_inside_markup(
    tree: &DocumentTree,
    failures: &[FailureRecord],
    config: &EditionConfig,
) -> InsideMarkup {
    let anchors = tree.page_anchors(&config.page_anchor);
    let options = config.pattern_options();
    let mut counts = InsideMarkup::default();

    for failure in failures
        .iter()
        .filter(|f| f.kind == AnnotationKind::CriticalReading)
    {
        let Some(paragraph) = anchors
            .get(&failure.page)
            .and_then(|anchor| tree.parent_of(anchor))
        else {
            continue;
        };
        let pattern = LabelPattern::compile(&failure.annotation.label, &options);
        for child in tree.children(paragraph) {
            match tree.tag(*child) {
                "app" => {
                    let first = tree
                        .children(*child)
                        .iter()
                        .find(|n| matches!(tree.tag(**n), "lem" | "rdg"));
                    if first.is_some_and(|n| pattern.find(tree.text(*n)).is_some()) {
                        counts.inside_apparatus += 1;
                    }
                }
                "anchor" => {
                    if pattern.find(tree.tail(*child)).is_some() {
                        counts.inside_anchors += 1;
                    }
                }
                _ => {}
            }
        }
    }
    tracing::info!(
        "Found {} critical entries inside other critical entries",
        counts.inside_apparatus
    );
    tracing::info!("Found {} critical entries in anchors", counts.inside_anchors);
    counts
}
