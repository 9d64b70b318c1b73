//! Splitting a text field at a match and inserting markup there.
//!
//! The owning field is cut into `before | matched | after`. `before` stays where it was; new nodes
//! follow it in the order given by the [`Piece`] list, with [`Piece::Matched`] marking where the
//! matched text itself lands (it lands on the tail of the piece preceding it). `after` always ends
//! up immediately behind the last piece, so the visible text of the document only changes by what
//! the caller chose to consume or add.
//!
//! Three placements exist:
//!
//! - match in a **tail**: pieces become following siblings of the tail's owner;
//! - match in the **head of a simple node**: pieces become its first children;
//! - match in the **head of a styled run** (`<hi>`, `<foreign>`, ...): a run cannot be split
//!   by giving it children without changing the styling of the inserted markup, so the run is
//!   cloned. A clone carrying `before` goes in front, the run itself keeps only the matched text,
//!   a clone carrying `after` goes behind. The run's original tail moves to the last node placed
//!   after it.

use std::collections::BTreeSet;

use super::{cursor::TextSlot, DocumentTree, Field, NodeId};
use crate::error::ApparatusError;

/// A located occurrence of a label inside one text field. Offsets are byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub node: NodeId,
    pub field: Field,
    pub start: usize,
    pub end: usize,
}

impl Match {
    pub fn slot(&self) -> TextSlot {
        TextSlot {
            node: self.node,
            field: self.field,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Piece {
    /// A detached node to insert
    Node(NodeId),
    /// Where the matched text stays. Leaving it out removes the matched text from the field.
    Matched,
}

#[derive(Debug, Clone, Default)]
pub struct SpliceOptions {
    /// Tags cloned instead of receiving children when a match falls in their head text
    pub styled_run_tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpliceOutcome {
    /// The inserted piece nodes, in document order. Clones of a split run are not listed.
    pub inserted: Vec<NodeId>,
    /// The matched text, exactly as it appeared in the field
    pub matched: String,
    /// Where the matched text now starts its field, if it was kept
    pub matched_slot: Option<TextSlot>,
    /// The field now holding the text that followed the match
    pub after_owner: TextSlot,
}

fn validate(
    tree: &DocumentTree,
    at: &Match,
    pieces: &[Piece],
) -> Result<(String, String, String), ApparatusError> {
    if !tree.contains(at.node) {
        return Err(ApparatusError::Tree(format!("stale node id {}", at.node)));
    }
    if at.field == Field::Tail && tree.parent_of(at.node).is_none() {
        return Err(ApparatusError::Tree(format!(
            "cannot insert after detached node {}",
            at.node
        )));
    }
    let text = tree.field(at.node, at.field);
    if at.start > at.end
        || at.end > text.len()
        || !text.is_char_boundary(at.start)
        || !text.is_char_boundary(at.end)
    {
        return Err(ApparatusError::Tree(format!(
            "match {}..{} does not fit the {:?} field of {} ({} bytes)",
            at.start,
            at.end,
            at.field,
            at.node,
            text.len()
        )));
    }

    let mut seen = BTreeSet::new();
    let mut matched_pieces = 0;
    for piece in pieces {
        match piece {
            Piece::Matched => matched_pieces += 1,
            Piece::Node(node) => {
                if !tree.contains(*node)
                    || *node == tree.root()
                    || tree.parent_of(*node).is_some()
                    || !seen.insert(*node)
                {
                    return Err(ApparatusError::Tree(format!(
                        "piece {node} is not a fresh detached node"
                    )));
                }
            }
        }
    }
    if seen.is_empty() || matched_pieces > 1 {
        return Err(ApparatusError::Tree(
            "a splice needs at least one node and at most one matched marker".to_string(),
        ));
    }

    Ok((
        text[..at.start].to_string(),
        text[at.start..at.end].to_string(),
        text[at.end..].to_string(),
    ))
}

/// Split the field addressed by `at` and insert `pieces` at the match.
pub fn splice(
    tree: &mut DocumentTree,
    at: &Match,
    pieces: &[Piece],
    options: &SpliceOptions,
) -> Result<SpliceOutcome, ApparatusError> {
    let (before, matched, after) = validate(tree, at, pieces)?;

    let is_styled_run = at.field == Field::Head
        && options.styled_run_tags.iter().any(|t| t == tree.tag(at.node))
        && tree.children(at.node).is_empty()
        && tree.parent_of(at.node).is_some();

    if is_styled_run {
        return split_run(tree, at.node, pieces, before, matched, after);
    }

    tree.set_field(at.node, at.field, before);
    let mut text_slot = at.slot();
    let mut matched_slot = None;
    let mut inserted = vec![];
    for piece in pieces {
        match piece {
            Piece::Node(node) => {
                match inserted.last() {
                    Some(prev) => tree.insert_after(*prev, *node)?,
                    None if at.field == Field::Tail => tree.insert_after(at.node, *node)?,
                    None => tree.insert_child(at.node, 0, *node)?,
                }
                inserted.push(*node);
                text_slot = TextSlot::tail(*node);
            }
            Piece::Matched => {
                tree.push_field(text_slot.node, text_slot.field, &matched);
                matched_slot = Some(text_slot);
            }
        }
    }
    tree.push_field(text_slot.node, text_slot.field, &after);

    Ok(SpliceOutcome {
        inserted,
        matched,
        matched_slot,
        after_owner: text_slot,
    })
}

fn split_run(
    tree: &mut DocumentTree,
    run: NodeId,
    pieces: &[Piece],
    before: String,
    matched: String,
    after: String,
) -> Result<SpliceOutcome, ApparatusError> {
    let original_tail = tree.tail(run).to_string();
    let split = pieces.iter().position(|p| *p == Piece::Matched);
    let (leading, trailing) = match split {
        Some(index) => (&pieces[..index], &pieces[index + 1..]),
        None => (&pieces[..0], pieces),
    };
    let nodes = |ps: &[Piece]| {
        ps.iter()
            .filter_map(|p| match p {
                Piece::Node(node) => Some(*node),
                Piece::Matched => None,
            })
            .collect::<Vec<_>>()
    };
    let leading = nodes(leading);
    let trailing = nodes(trailing);

    if split.is_some() {
        if !before.is_empty() {
            let clone = tree.create_like(run);
            tree.set_text(clone, before);
            tree.insert_before(run, clone)?;
        }
        for node in &leading {
            tree.insert_before(run, *node)?;
        }
        tree.set_text(run, matched.clone());
    } else {
        tree.set_text(run, before);
    }

    tree.set_tail(run, "");
    let mut last = run;
    for node in &trailing {
        tree.insert_after(last, *node)?;
        last = *node;
    }
    let after_owner = if after.is_empty() {
        TextSlot::tail(last)
    } else {
        let clone = tree.create_like(run);
        tree.set_text(clone, after);
        tree.insert_after(last, clone)?;
        last = clone;
        TextSlot::head(clone)
    };
    tree.set_tail(last, original_tail);
    // the run held nothing but the consumed match
    if split.is_none() && tree.text(run).is_empty() {
        tree.detach(run)?;
    }

    Ok(SpliceOutcome {
        inserted: leading.into_iter().chain(trailing).collect(),
        matched,
        matched_slot: split.map(|_| TextSlot::head(run)),
        after_owner,
    })
}
