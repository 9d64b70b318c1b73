//! XML reading and writing for [`DocumentTree`].
//!
//! Text and tails are kept verbatim, including whitespace between elements. Comments, processing
//! instructions and the XML declaration are dropped on read; nothing is pretty-printed on write.

use quick_xml::{
    escape::partial_escape,
    events::{BytesEnd, BytesStart, BytesText, Event},
    Reader, Writer,
};
use std::io::{Cursor, Write};

use super::{DocumentTree, Field, NodeId};
use crate::error::ApparatusError;

fn element_parts(start: &BytesStart) -> Result<(String, Vec<(String, String)>), ApparatusError> {
    let tag = String::from_utf8(start.name().as_ref().to_vec())?;
    let mut attrs = vec![];
    for attr in start.attributes() {
        let attr = attr?;
        let key = String::from_utf8(attr.key.as_ref().to_vec())?;
        attrs.push((key, attr.unescape_value()?.into_owned()));
    }
    Ok((tag, attrs))
}

struct TreeBuilder {
    tree: Option<DocumentTree>,
    open: Vec<NodeId>,
    /// Text read next belongs to this node's tail
    closed: Option<NodeId>,
}

impl TreeBuilder {
    fn open_element(&mut self, start: &BytesStart) -> Result<NodeId, ApparatusError> {
        let (tag, attrs) = element_parts(start)?;
        let Some(tree) = self.tree.as_mut() else {
            let mut tree = DocumentTree::new(&tag);
            let root = tree.root();
            tree.node_mut(root).attrs = attrs;
            self.tree = Some(tree);
            return Ok(root);
        };
        let parent = *self
            .open
            .last()
            .ok_or_else(|| ApparatusError::Xml(format!("second root element <{tag}>")))?;
        let id = tree.create(&tag);
        tree.append_child(parent, id)?;
        tree.node_mut(id).attrs = attrs;
        Ok(id)
    }

    fn text(&mut self, text: &str) {
        let (Some(tree), Some(parent)) = (self.tree.as_mut(), self.open.last()) else {
            // outside the root element
            return;
        };
        match self.closed {
            Some(node) => tree.push_field(node, Field::Tail, text),
            None => tree.push_field(*parent, Field::Head, text),
        }
    }
}

impl DocumentTree {
    pub fn from_xml(xml: &str) -> Result<DocumentTree, ApparatusError> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(false);
        let mut builder = TreeBuilder {
            tree: None,
            open: vec![],
            closed: None,
        };

        loop {
            match reader.read_event()? {
                Event::Start(start) => {
                    let id = builder.open_element(&start)?;
                    builder.open.push(id);
                    builder.closed = None;
                }
                Event::Empty(start) => {
                    let id = builder.open_element(&start)?;
                    builder.closed = Some(id);
                }
                Event::End(_) => {
                    builder.closed = builder.open.pop();
                }
                Event::Text(text) => builder.text(&text.unescape()?),
                Event::CData(data) => {
                    builder.text(&String::from_utf8(data.into_inner().into_owned())?)
                }
                Event::Eof => break,
                _ => {}
            }
        }

        let tree = builder
            .tree
            .ok_or_else(|| ApparatusError::Xml("document has no root element".to_string()))?;
        tracing::debug!("Read document tree with {} nodes", tree.len());
        Ok(tree)
    }

    /// Serialise the whole document.
    pub fn to_xml(&self) -> Result<String, ApparatusError> {
        self.fragment_xml(self.root())
    }

    /// Serialise one node and its subtree, without the node's tail.
    pub fn fragment_xml(&self, id: NodeId) -> Result<String, ApparatusError> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        self.write_node(&mut writer, id, false)?;
        Ok(String::from_utf8(writer.into_inner().into_inner())?)
    }

    fn write_node<W: Write>(
        &self,
        writer: &mut Writer<W>,
        id: NodeId,
        with_tail: bool,
    ) -> Result<(), ApparatusError> {
        let node = self.node(id);
        let mut start = BytesStart::new(node.tag.as_str());
        for (key, value) in &node.attrs {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        let head = self.text(id);
        if head.is_empty() && node.children().is_empty() {
            writer.write_event(Event::Empty(start))?;
        } else {
            writer.write_event(Event::Start(start))?;
            if !head.is_empty() {
                writer.write_event(Event::Text(BytesText::from_escaped(partial_escape(head))))?;
            }
            for child in node.children() {
                self.write_node(writer, *child, true)?;
            }
            writer.write_event(Event::End(BytesEnd::new(node.tag.as_str())))?;
        }

        let tail = self.tail(id);
        if with_tail && !tail.is_empty() {
            writer.write_event(Event::Text(BytesText::from_escaped(partial_escape(tail))))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<text><body><p>Na <hi rend="italic">počátku</hi> bylo <pb n="7" ed="DJAK03"/>Slovo &amp; &lt;FN_1&gt;</p><!-- x --></body></text>"#;

    #[test]
    fn test_read_preserves_text_and_tails() {
        let tree = DocumentTree::from_xml(SAMPLE).unwrap();
        assert_eq!(tree.tag(tree.root()), "text");
        assert_eq!(
            tree.text_content(tree.root()),
            "Na počátku bylo Slovo & <FN_1>"
        );
        let pb = tree.find_all("pb")[0];
        assert_eq!(tree.attr(pb, "n"), Some("7"));
        assert_eq!(tree.tail(pb), "Slovo & <FN_1>");
        let hi = tree.find_all("hi")[0];
        assert_eq!(tree.tail(hi), " bylo ");
    }

    #[test]
    fn test_write_round_trip() {
        let tree = DocumentTree::from_xml(SAMPLE).unwrap();
        let xml = tree.to_xml().unwrap();
        assert!(xml.starts_with("<text><body><p>Na <hi rend=\"italic\">počátku</hi>"));
        assert!(xml.contains("<pb n=\"7\" ed=\"DJAK03\"/>Slovo &amp; &lt;FN_1&gt;</p>"));
        let again = DocumentTree::from_xml(&xml).unwrap();
        assert_eq!(again.to_xml().unwrap(), xml);

        let hi = tree.find_all("hi")[0];
        assert_eq!(
            tree.fragment_xml(hi).unwrap(),
            "<hi rend=\"italic\">počátku</hi>"
        );
    }

    #[test]
    fn test_malformed_input() {
        assert!(matches!(
            DocumentTree::from_xml("<a><b></a>"),
            Err(ApparatusError::Xml(_))
        ));
        assert!(DocumentTree::from_xml("just text").is_err());
        assert!(DocumentTree::from_xml("<a/><b/>").is_err());
    }
}
