//! Resumable document-order walk over text slots.
//!
//! A [`TreeCursor`] yields every head and tail field from a starting point to the end of the
//! document: head text of a node, then its children's slots, then its tail, climbing back out
//! through the ancestors once a subtree is exhausted. It keeps an explicit work stack of node ids
//! and child indices; nothing in it survives a mutation of the tree, so callers build a fresh
//! cursor (from a page anchor or from a [`TextSlot`] returned by a splice) after every splice.

use serde::{Deserialize, Serialize};

use super::{AnchorKind, DocumentTree, Field, NodeId};

/// One text field of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextSlot {
    pub node: NodeId,
    pub field: Field,
}

impl TextSlot {
    pub fn head(node: NodeId) -> TextSlot {
        TextSlot {
            node,
            field: Field::Head,
        }
    }

    pub fn tail(node: NodeId) -> TextSlot {
        TextSlot {
            node,
            field: Field::Tail,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Slot(TextSlot),
    /// Reached the next page anchor of the scoping kind; the walk is over.
    Boundary(NodeId),
    End,
}

#[derive(Debug, Clone, Copy)]
enum Visit {
    Enter(NodeId),
    Head(NodeId),
    Tail(NodeId),
    /// Continue with `parent`'s children from index `next`
    Resume { parent: NodeId, next: usize },
}

#[derive(Debug, Clone)]
pub struct TreeCursor {
    todo: Vec<Visit>,
    scope: Option<(NodeId, AnchorKind)>,
    opaque: Vec<String>,
    last: Option<TextSlot>,
    finished: bool,
}

impl TreeCursor {
    /// Positioned so that the first slot yielded is `slot`.
    pub fn at(tree: &DocumentTree, slot: TextSlot) -> TreeCursor {
        // built in visiting order, then reversed into a stack
        let mut order = vec![];
        if slot.field == Field::Head {
            order.push(Visit::Head(slot.node));
            order.push(Visit::Resume {
                parent: slot.node,
                next: 0,
            });
        }
        order.push(Visit::Tail(slot.node));
        let mut current = slot.node;
        while let Ok((parent, index)) = tree.location(current) {
            order.push(Visit::Resume {
                parent,
                next: index + 1,
            });
            if parent != tree.root() {
                order.push(Visit::Tail(parent));
            }
            current = parent;
        }
        order.reverse();
        TreeCursor {
            todo: order,
            scope: None,
            opaque: vec![],
            last: None,
            finished: false,
        }
    }

    /// Positioned so that the first slot yielded is `node`'s tail.
    pub fn after(tree: &DocumentTree, node: NodeId) -> TreeCursor {
        TreeCursor::at(tree, TextSlot::tail(node))
    }

    /// Starts at the tail of `page_anchor` and stops at the next anchor of the same kind.
    pub fn scoped(tree: &DocumentTree, page_anchor: NodeId, kind: &AnchorKind) -> TreeCursor {
        TreeCursor::after(tree, page_anchor).within(page_anchor, kind)
    }

    /// Stop at the next anchor of the same kind as `page_anchor`, wherever the walk started.
    pub fn within(mut self, page_anchor: NodeId, kind: &AnchorKind) -> TreeCursor {
        self.scope = Some((page_anchor, kind.clone()));
        self
    }

    /// Also yield the head text of the anchor's parent first, when the anchor is that parent's
    /// first child. A page often breaks just after a paragraph opens.
    pub fn with_leading_head(mut self, tree: &DocumentTree) -> TreeCursor {
        if let Some((anchor, _)) = &self.scope {
            if let Ok((parent, 0)) = tree.location(*anchor) {
                self.todo.push(Visit::Head(parent));
            }
        }
        self
    }

    /// Tags whose head and children are skipped; their tail is still visited.
    pub fn opaque(mut self, tags: &[String]) -> TreeCursor {
        self.opaque = tags.to_vec();
        self
    }

    /// The slot most recently yielded.
    pub fn last_slot(&self) -> Option<TextSlot> {
        self.last
    }

    fn is_boundary(&self, tree: &DocumentTree, node: NodeId) -> bool {
        match &self.scope {
            Some((start, kind)) => {
                node != *start && kind.same_kind(tree.node(*start), tree.node(node))
            }
            None => false,
        }
    }

    pub fn next_slot(&mut self, tree: &DocumentTree) -> Step {
        if self.finished {
            return Step::End;
        }
        while let Some(visit) = self.todo.pop() {
            match visit {
                Visit::Head(node) => return self.yield_slot(TextSlot::head(node)),
                Visit::Tail(node) => return self.yield_slot(TextSlot::tail(node)),
                Visit::Resume { parent, next } => {
                    if let Some(child) = tree.children(parent).get(next) {
                        self.todo.push(Visit::Resume {
                            parent,
                            next: next + 1,
                        });
                        self.todo.push(Visit::Tail(*child));
                        self.todo.push(Visit::Enter(*child));
                    }
                }
                Visit::Enter(node) => {
                    if self.is_boundary(tree, node) {
                        self.finished = true;
                        self.todo.clear();
                        return Step::Boundary(node);
                    }
                    if self.opaque.iter().any(|t| t == tree.tag(node)) {
                        continue;
                    }
                    self.todo.push(Visit::Resume {
                        parent: node,
                        next: 0,
                    });
                    return self.yield_slot(TextSlot::head(node));
                }
            }
        }
        self.finished = true;
        Step::End
    }

    fn yield_slot(&mut self, slot: TextSlot) -> Step {
        self.last = Some(slot);
        Step::Slot(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::DocumentTree;
    use test_log::test;

    fn collect(tree: &DocumentTree, mut cursor: TreeCursor) -> (Vec<String>, Step) {
        let mut seen = vec![];
        loop {
            match cursor.next_slot(tree) {
                Step::Slot(slot) => {
                    let text = tree.field(slot.node, slot.field);
                    if !text.is_empty() {
                        seen.push(text.to_string());
                    }
                }
                other => return (seen, other),
            }
        }
    }

    /// body > [p1 > ("a", pb7, "b", hi("c"), "d", note("x"), "e"), p2 > ("f", pb8, "g")]
    fn pages() -> (DocumentTree, NodeId, NodeId) {
        let mut tree = DocumentTree::new("body");
        let p1 = tree.element("p", &[], Some("a"));
        tree.append_child(tree.root(), p1).unwrap();
        let pb7 = tree.element("pb", &[("n", "7"), ("ed", "DJAK03")], None);
        tree.append_child(p1, pb7).unwrap();
        tree.set_tail(pb7, "b");
        let hi = tree.element("hi", &[("rend", "italic")], Some("c"));
        tree.append_child(p1, hi).unwrap();
        tree.set_tail(hi, "d");
        let note = tree.element("note", &[], Some("x"));
        tree.append_child(p1, note).unwrap();
        tree.set_tail(note, "e");

        let p2 = tree.element("p", &[], Some("f"));
        tree.append_child(tree.root(), p2).unwrap();
        let pb8 = tree.element("pb", &[("n", "8"), ("ed", "DJAK03")], None);
        tree.append_child(p2, pb8).unwrap();
        tree.set_tail(pb8, "g");
        (tree, pb7, pb8)
    }

    #[test]
    fn test_scoped_walk_stops_at_next_anchor() {
        let (tree, pb7, pb8) = pages();
        let cursor = TreeCursor::scoped(&tree, pb7, &AnchorKind::default())
            .opaque(&["note".to_string()]);
        let (seen, end) = collect(&tree, cursor);
        assert_eq!(seen, vec!["b", "c", "d", "e", "f"]);
        assert_eq!(end, Step::Boundary(pb8));
    }

    #[test]
    fn test_leading_head_and_unscoped_walk() {
        let (tree, pb7, _pb8) = pages();
        let cursor = TreeCursor::scoped(&tree, pb7, &AnchorKind::default())
            .with_leading_head(&tree)
            .opaque(&["note".to_string()]);
        let (seen, _) = collect(&tree, cursor);
        assert_eq!(seen.first().map(String::as_str), Some("a"));

        let (seen, end) = collect(&tree, TreeCursor::after(&tree, pb7));
        assert_eq!(seen, vec!["b", "c", "d", "x", "e", "f", "g"]);
        assert_eq!(end, Step::End);
    }

    #[test]
    fn test_resume_from_head_slot() {
        let (tree, pb7, _pb8) = pages();
        let hi = tree.children(tree.parent_of(pb7).unwrap())[1];
        let mut cursor = TreeCursor::at(&tree, TextSlot::head(hi));
        assert_eq!(cursor.next_slot(&tree), Step::Slot(TextSlot::head(hi)));
        assert_eq!(cursor.next_slot(&tree), Step::Slot(TextSlot::tail(hi)));
        assert_eq!(cursor.last_slot(), Some(TextSlot::tail(hi)));
    }
}
