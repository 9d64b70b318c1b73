//! Mixed text/element document tree.
//!
//! The tree follows the XML data model used by TEI tooling: every [`Node`] owns an optional *head*
//! text (before its first child) and an optional *tail* text (after its closing tag, before the
//! next sibling). Concatenating head, then each child's rendering followed by its tail, reproduces
//! the visible text in document order (see [`DocumentTree::text_content`]).
//!
//! Nodes live in an append-only arena addressed by [`NodeId`]. Nothing is ever freed, so an id
//! handed out by a splice stays valid for identity comparisons for the lifetime of the tree.
//! Node values hold no ancestor links; the arena keeps a parent index so traversal can supply the
//! parent context.

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

use crate::error::ApparatusError;

pub mod cursor;
pub mod splice;
mod xml;

pub use cursor::{Step, TextSlot, TreeCursor};
pub use splice::{splice, Match, Piece, SpliceOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which text field of a node a position refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    /// Text immediately inside the node, before its first child
    Head,
    /// Text immediately after the node, before its next sibling
    Tail,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Node {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub text: Option<String>,
    pub tail: Option<String>,
    children: Vec<NodeId>,
}

impl Node {
    fn new(tag: &str) -> Node {
        Node {
            tag: tag.to_string(),
            ..Default::default()
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(entry) = self.attrs.iter_mut().find(|(key, _)| key == name) {
            entry.1 = value;
        } else {
            self.attrs.push((name.to_string(), value));
        }
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn field(&self, field: Field) -> &str {
        match field {
            Field::Head => self.text.as_deref().unwrap_or(""),
            Field::Tail => self.tail.as_deref().unwrap_or(""),
        }
    }
}

/// Identifies page anchors: zero-width nodes (`<pb n="12" ed="DJAK03"/>`) that scope the search
/// for the annotations recorded against a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorKind {
    pub tag: String,
    /// Attribute carrying the page identifier
    pub id_attr: String,
    /// Attribute naming the edition the page numbering belongs to
    pub edition_attr: String,
    /// Only anchors of this edition count; `None` accepts any edition
    pub edition: Option<String>,
}

impl Default for AnchorKind {
    fn default() -> Self {
        AnchorKind {
            tag: "pb".to_string(),
            id_attr: "n".to_string(),
            edition_attr: "ed".to_string(),
            edition: Some("DJAK03".to_string()),
        }
    }
}

impl AnchorKind {
    pub fn is_anchor(&self, node: &Node) -> bool {
        node.tag == self.tag
            && match &self.edition {
                Some(edition) => node.attr(&self.edition_attr) == Some(edition.as_str()),
                None => true,
            }
    }

    /// Whether `other` is an anchor of the same kind as `start` (same tag and edition).
    pub fn same_kind(&self, start: &Node, other: &Node) -> bool {
        other.tag == start.tag && other.attr(&self.edition_attr) == start.attr(&self.edition_attr)
    }
}

/// Page id -> page anchor node, built once per tree.
#[derive(Debug, Clone, Default)]
pub struct PageIndex(BTreeMap<String, NodeId>);

impl PageIndex {
    pub fn get(&self, page: &str) -> Option<NodeId> {
        self.0.get(page).copied()
    }

    pub fn contains(&self, page: &str) -> bool {
        self.0.contains_key(page)
    }

    pub fn pages(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct DocumentTree {
    nodes: Vec<Node>,
    parents: Vec<Option<NodeId>>,
    root: NodeId,
}

impl DocumentTree {
    pub fn new(root_tag: &str) -> DocumentTree {
        DocumentTree {
            nodes: vec![Node::new(root_tag)],
            parents: vec![None],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    /// Create a detached node. It becomes part of the document once inserted.
    pub fn create(&mut self, tag: &str) -> NodeId {
        self.nodes.push(Node::new(tag));
        self.parents.push(None);
        NodeId(self.nodes.len() - 1)
    }

    /// Create a detached node carrying the tag and attributes of `id`, but no text or children.
    pub fn create_like(&mut self, id: NodeId) -> NodeId {
        let mut node = Node::new(&self.nodes[id.0].tag);
        node.attrs = self.nodes[id.0].attrs.clone();
        self.nodes.push(node);
        self.parents.push(None);
        NodeId(self.nodes.len() - 1)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn tag(&self, id: NodeId) -> &str {
        &self.nodes[id.0].tag
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.parents.get(id.0).copied().flatten()
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent_of(id)?;
        self.nodes[parent.0].children.iter().position(|c| *c == id)
    }

    /// Whether the node is reachable from the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        while let Some(parent) = self.parent_of(current) {
            current = parent;
        }
        current == self.root
    }

    /// Nodes from the root down to `id`, inclusive.
    pub fn ancestry(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = vec![id];
        let mut current = id;
        while let Some(parent) = self.parent_of(current) {
            chain.push(parent);
            current = parent;
        }
        chain.reverse();
        chain
    }

    /// Child indices leading from the root to `id`; empty for the root.
    pub fn path_to(&self, id: NodeId) -> Vec<usize> {
        let mut path = vec![];
        let mut current = id;
        while let (Some(parent), Some(index)) =
            (self.parent_of(current), self.index_in_parent(current))
        {
            path.push(index);
            current = parent;
        }
        path.reverse();
        path
    }

    pub fn text(&self, id: NodeId) -> &str {
        self.nodes[id.0].field(Field::Head)
    }

    pub fn tail(&self, id: NodeId) -> &str {
        self.nodes[id.0].field(Field::Tail)
    }

    pub fn field(&self, id: NodeId, field: Field) -> &str {
        self.nodes[id.0].field(field)
    }

    pub fn set_field(&mut self, id: NodeId, field: Field, value: impl Into<String>) {
        let value = value.into();
        let value = if value.is_empty() { None } else { Some(value) };
        match field {
            Field::Head => self.nodes[id.0].text = value,
            Field::Tail => self.nodes[id.0].tail = value,
        }
    }

    pub fn set_text(&mut self, id: NodeId, value: impl Into<String>) {
        self.set_field(id, Field::Head, value);
    }

    pub fn set_tail(&mut self, id: NodeId, value: impl Into<String>) {
        self.set_field(id, Field::Tail, value);
    }

    /// Append to a text field without disturbing what is already there.
    pub fn push_field(&mut self, id: NodeId, field: Field, value: &str) {
        if value.is_empty() {
            return;
        }
        let slot = match field {
            Field::Head => &mut self.nodes[id.0].text,
            Field::Tail => &mut self.nodes[id.0].tail,
        };
        slot.get_or_insert_with(String::new).push_str(value);
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.nodes[id.0].attr(name)
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        self.nodes[id.0].set_attr(name, value);
    }

    fn check_insertable(&self, parent: NodeId, child: NodeId) -> Result<(), ApparatusError> {
        if !self.contains(parent) || !self.contains(child) {
            return Err(ApparatusError::Tree(format!(
                "unknown node in insertion of {child} under {parent}"
            )));
        }
        if child == self.root || self.parent_of(child).is_some() {
            return Err(ApparatusError::Tree(format!(
                "node {child} is already attached"
            )));
        }
        if self.ancestry(parent).contains(&child) {
            return Err(ApparatusError::Tree(format!(
                "inserting {child} under {parent} would create a cycle"
            )));
        }
        Ok(())
    }

    pub fn insert_child(
        &mut self,
        parent: NodeId,
        index: usize,
        child: NodeId,
    ) -> Result<(), ApparatusError> {
        self.check_insertable(parent, child)?;
        let children = &mut self.nodes[parent.0].children;
        if index > children.len() {
            return Err(ApparatusError::Tree(format!(
                "child index {index} out of range for {parent} with {} children",
                children.len()
            )));
        }
        children.insert(index, child);
        self.parents[child.0] = Some(parent);
        Ok(())
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), ApparatusError> {
        let index = self.children(parent).len();
        self.insert_child(parent, index, child)
    }

    /// Insert `node` as the sibling immediately after `sibling`.
    pub fn insert_after(&mut self, sibling: NodeId, node: NodeId) -> Result<(), ApparatusError> {
        let (parent, index) = self.location(sibling)?;
        self.insert_child(parent, index + 1, node)
    }

    /// Insert `node` as the sibling immediately before `sibling`.
    pub fn insert_before(&mut self, sibling: NodeId, node: NodeId) -> Result<(), ApparatusError> {
        let (parent, index) = self.location(sibling)?;
        self.insert_child(parent, index, node)
    }

    /// Unlink `id` from its parent. Its tail text goes with it; the node can be inserted again.
    pub fn detach(&mut self, id: NodeId) -> Result<(), ApparatusError> {
        let (parent, index) = self.location(id)?;
        self.nodes[parent.0].children.remove(index);
        self.parents[id.0] = None;
        Ok(())
    }

    /// Parent and child index of an attached, non-root node.
    pub fn location(&self, id: NodeId) -> Result<(NodeId, usize), ApparatusError> {
        let parent = self
            .parent_of(id)
            .ok_or_else(|| ApparatusError::Tree(format!("node {id} has no parent")))?;
        let index = self
            .index_in_parent(id)
            .ok_or_else(|| ApparatusError::Tree(format!("node {id} missing from its parent")))?;
        Ok((parent, index))
    }

    /// Convenience for building markup: a detached element with attributes and head text.
    pub fn element(&mut self, tag: &str, attrs: &[(&str, &str)], text: Option<&str>) -> NodeId {
        let id = self.create(tag);
        for (name, value) in attrs {
            self.set_attr(id, name, *value);
        }
        if let Some(text) = text {
            self.set_text(id, text);
        }
        id
    }

    /// Visible text of a node: head, then each child's content followed by its tail.
    /// The node's own tail is not included.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        out.push_str(self.text(id));
        for child in self.children(id) {
            self.collect_text(*child, out);
            out.push_str(self.tail(*child));
        }
    }

    /// Pre-order list of `id` and everything below it.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = vec![];
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev());
        }
        out
    }

    /// All attached nodes with the given tag, in document order.
    pub fn find_all(&self, tag: &str) -> Vec<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .filter(|id| self.tag(*id) == tag)
            .collect()
    }

    /// Index the page anchors of one edition. The first anchor carrying a page id wins.
    pub fn page_anchors(&self, kind: &AnchorKind) -> PageIndex {
        let mut index = BTreeMap::new();
        for id in self.descendants(self.root) {
            let node = self.node(id);
            if !kind.is_anchor(node) {
                continue;
            }
            if let Some(page) = node.attr(&kind.id_attr) {
                index.entry(page.to_string()).or_insert(id);
            }
        }
        tracing::debug!("Indexed {} page anchors", index.len());
        PageIndex(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn paragraph() -> (DocumentTree, NodeId, NodeId) {
        let mut tree = DocumentTree::new("p");
        tree.set_text(tree.root(), "sicut ");
        let hi = tree.element("hi", &[("rend", "italic")], Some("ait"));
        tree.append_child(tree.root(), hi).unwrap();
        tree.set_tail(hi, " Augustinus");
        let pb = tree.element("pb", &[("n", "7"), ("ed", "DJAK03")], None);
        tree.append_child(tree.root(), pb).unwrap();
        tree.set_tail(pb, " et alii");
        (tree, hi, pb)
    }

    #[test]
    fn test_text_content_invariant() {
        let (tree, hi, pb) = paragraph();
        assert_eq!(tree.text_content(tree.root()), "sicut ait Augustinus et alii");
        assert_eq!(tree.path_to(pb), vec![1]);
        assert!(tree.path_to(tree.root()).is_empty());
        assert_eq!(tree.text_content(hi), "ait");
        assert_eq!(tree.field(hi, Field::Tail), " Augustinus");
    }

    #[test]
    fn test_insertion_rules() {
        let (mut tree, hi, pb) = paragraph();
        let anchor = tree.create("anchor");
        tree.insert_after(hi, anchor).unwrap();
        assert_eq!(tree.children(tree.root()), &[hi, anchor, pb]);
        assert_eq!(tree.parent_of(anchor), Some(tree.root()));

        // already attached
        assert!(tree.insert_after(pb, anchor).is_err());
        // cycles are refused
        let outer = tree.create("div");
        tree.append_child(anchor, outer).unwrap();
        assert!(matches!(
            tree.insert_child(outer, 0, tree.root()),
            Err(ApparatusError::Tree(_))
        ));
        // out of range
        let loose = tree.create("note");
        assert!(tree.insert_child(hi, 5, loose).is_err());
    }

    #[test]
    fn test_detach() {
        let (mut tree, hi, pb) = paragraph();
        tree.detach(hi).unwrap();
        assert_eq!(tree.children(tree.root()), &[pb]);
        assert_eq!(tree.parent_of(hi), None);
        assert_eq!(tree.text_content(tree.root()), "sicut  et alii");
        assert!(tree.detach(hi).is_err());
        assert!(tree.detach(tree.root()).is_err());

        tree.insert_before(pb, hi).unwrap();
        assert_eq!(tree.children(tree.root()), &[hi, pb]);
    }

    #[test]
    fn test_page_index() {
        let (mut tree, _hi, pb) = paragraph();
        let other = tree.element("pb", &[("n", "8"), ("ed", "1633")], None);
        tree.append_child(tree.root(), other).unwrap();

        let index = tree.page_anchors(&AnchorKind::default());
        assert_eq!(index.get("7"), Some(pb));
        assert!(!index.contains("8"));

        let any = tree.page_anchors(&AnchorKind {
            edition: None,
            ..AnchorKind::default()
        });
        assert_eq!(any.len(), 2);
    }

    #[test]
    fn test_empty_fields_normalise_to_none() {
        let (mut tree, hi, _pb) = paragraph();
        tree.set_tail(hi, "");
        assert_eq!(tree.node(hi).tail, None);
        tree.push_field(hi, Field::Tail, "x");
        tree.push_field(hi, Field::Tail, "y");
        assert_eq!(tree.tail(hi), "xy");
    }
}
