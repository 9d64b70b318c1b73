//! Markup inserted for each annotation kind.
//!
//! Builders create detached nodes in the target tree and return them in document order, ready for
//! [`splice`](crate::tree::splice). The `*_fragment` variants render the same markup into a
//! scratch tree for the failure side channel.

use crate::{
    apparatus::{ApparatusEntry, Citation, EditorialNote, Reading, WitnessRef},
    config::EditionConfig,
    error::ApparatusError,
    tree::{DocumentTree, NodeId, Piece},
};

/// Editorial notes that describe the reading itself ("misprinted as ...", "omitted") rather than
/// the witnesses; they are rendered inside the `<rdg>`.
const READING_REMARKS: [&str; 3] = ["omylem", "tištěno", "vynech"];

const PUNCTUATION: [char; 6] = ['.', ',', ':', ';', '?', '!'];

/// `<anchor xml:id="…"/>` matched text `<app from="#…"><note place="bottom" type="gloss">
/// <label>…</label> note</note></app>`
pub fn gloss(
    tree: &mut DocumentTree,
    config: &EditionConfig,
    sequence: usize,
    label: &str,
    note: &str,
) -> Result<Vec<Piece>, ApparatusError> {
    let (anchor, app) = gloss_nodes(tree, config, sequence, label, note)?;
    Ok(vec![Piece::Node(anchor), Piece::Matched, Piece::Node(app)])
}

fn gloss_nodes(
    tree: &mut DocumentTree,
    config: &EditionConfig,
    sequence: usize,
    label: &str,
    note: &str,
) -> Result<(NodeId, NodeId), ApparatusError> {
    let anchor = tree.element("anchor", &[("xml:id", config.anchor_id(sequence).as_str())], None);
    let app = tree.element("app", &[("from", config.anchor_ref(sequence).as_str())], None);
    let note_node = tree.element("note", &[("place", "bottom"), ("type", "gloss")], None);
    tree.append_child(app, note_node)?;
    let label_node = tree.element("label", &[], Some(label));
    tree.append_child(note_node, label_node)?;
    tree.set_tail(label_node, format!(" {}", note.trim()));
    Ok((anchor, app))
}

/// `<anchor xml:id="…"/><note place="bottom" type="commentary">…</note>`. The footnote marker
/// that was matched is consumed.
pub fn commentary(
    tree: &mut DocumentTree,
    config: &EditionConfig,
    sequence: usize,
    note: &str,
) -> Vec<Piece> {
    let (anchor, note_node) = commentary_nodes(tree, config, sequence, note);
    vec![Piece::Node(anchor), Piece::Node(note_node)]
}

fn commentary_nodes(
    tree: &mut DocumentTree,
    config: &EditionConfig,
    sequence: usize,
    note: &str,
) -> (NodeId, NodeId) {
    let anchor = tree.element("anchor", &[("xml:id", config.anchor_id(sequence).as_str())], None);
    let note_node = tree.element(
        "note",
        &[("place", "bottom"), ("type", "commentary")],
        Some(note),
    );
    (anchor, note_node)
}

/// How much of a critical match becomes the lemma: a trailing punctuation mark stays in the running
/// text unless the editor's lemma ends with it too.
pub fn lemma_extent(matched: &str, lemma_label: &str) -> usize {
    match matched.chars().last() {
        Some(last)
            if PUNCTUATION.contains(&last) && !lemma_label.trim().ends_with(last) =>
        {
            matched.len() - last.len_utf8()
        }
        _ => matched.len(),
    }
}

/// `<app><lem wit="…">lemma</lem> <rdg wit="…">…</rdg>…</app>`
pub fn critical(
    tree: &mut DocumentTree,
    config: &EditionConfig,
    entry: &ApparatusEntry,
    lemma_text: &str,
) -> Result<NodeId, ApparatusError> {
    let app = tree.create("app");
    let lemma_wit = match &entry.lemma.witnesses {
        Citation::Unparsed(_) => format!("#{}", config.edition_witness),
        cited => cited.wit_attribute(),
    };
    let lem = tree.element("lem", &[("wit", lemma_wit.as_str())], Some(lemma_text));
    tree.append_child(app, lem)?;
    tree.set_tail(lem, " ");
    if let Citation::Witnesses {
        refs,
        note: Some(note),
    } = &entry.lemma.witnesses
    {
        let note_node = editorial_note(tree, refs, note)?;
        tree.append_child(app, note_node)?;
    }

    for reading in &entry.readings {
        append_reading(tree, app, reading)?;
    }

    if let Citation::Unparsed(raw) = &entry.lemma.witnesses {
        let note_node = tree.element("note", &[("type", "unparsed")], Some(raw.as_str()));
        tree.append_child(app, note_node)?;
    }
    Ok(app)
}

fn append_reading(
    tree: &mut DocumentTree,
    app: NodeId,
    reading: &Reading,
) -> Result<(), ApparatusError> {
    let rdg = tree.element("rdg", &[("wit", reading.witnesses.wit_attribute().as_str())], None);
    tree.append_child(app, rdg)?;
    match &reading.witnesses {
        Citation::Witnesses {
            refs,
            note: Some(note),
        } => {
            let remark = refs.iter().all(WitnessRef::is_implied)
                && READING_REMARKS.iter().any(|r| note.before.contains(r));
            if remark {
                let hi = tree.element("hi", &[("rend", "italic")], Some(note.before.as_str()));
                tree.append_child(rdg, hi)?;
                let rest = if reading.text.is_empty() {
                    &note.after
                } else {
                    &reading.text
                };
                if !rest.is_empty() {
                    tree.set_tail(hi, format!(" {rest}"));
                }
            } else {
                tree.set_text(rdg, reading.text.as_str());
                let note_node = editorial_note(tree, refs, note)?;
                tree.insert_after(rdg, note_node)?;
            }
        }
        _ => tree.set_text(rdg, reading.text.as_str()),
    }
    Ok(())
}

/// `<note><hi rend="italic">before <ref target="#W">W</ref>, <ref …>…</ref> after</hi></note>`
fn editorial_note(
    tree: &mut DocumentTree,
    refs: &[WitnessRef],
    note: &EditorialNote,
) -> Result<NodeId, ApparatusError> {
    let cited = refs.iter().filter(|r| !r.is_implied()).collect::<Vec<_>>();
    let note_node = tree.create("note");
    let hi = tree.element("hi", &[("rend", "italic")], None);
    tree.append_child(note_node, hi)?;

    if cited.is_empty() {
        let text = [note.before.as_str(), note.after.as_str()]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ");
        tree.set_text(hi, text);
        return Ok(note_node);
    }

    if !note.before.is_empty() {
        tree.set_text(hi, format!("{} ", note.before));
    }
    for (i, witness) in cited.iter().enumerate() {
        let reference = tree.element(
            "ref",
            &[("target", witness.target().as_str())],
            Some(witness.display.as_str()),
        );
        tree.append_child(hi, reference)?;
        if i + 1 < cited.len() {
            tree.set_tail(reference, witness.separator.as_str());
        } else if !note.after.is_empty() {
            tree.set_tail(reference, format!(" {}", note.after));
        }
    }
    Ok(note_node)
}

pub fn gloss_fragment(
    config: &EditionConfig,
    sequence: usize,
    label: &str,
    note: &str,
) -> Result<String, ApparatusError> {
    let mut scratch = DocumentTree::new("fragment");
    let (anchor, app) = gloss_nodes(&mut scratch, config, sequence, label, note)?;
    Ok(format!(
        "{} {}",
        scratch.fragment_xml(anchor)?,
        scratch.fragment_xml(app)?
    ))
}

pub fn commentary_fragment(
    config: &EditionConfig,
    sequence: usize,
    note: &str,
) -> Result<String, ApparatusError> {
    let mut scratch = DocumentTree::new("fragment");
    let (anchor, note_node) = commentary_nodes(&mut scratch, config, sequence, note);
    Ok(format!(
        "{}{}",
        scratch.fragment_xml(anchor)?,
        scratch.fragment_xml(note_node)?
    ))
}

/// The apparatus entry with a blank lemma.
pub fn critical_fragment(
    config: &EditionConfig,
    entry: &ApparatusEntry,
) -> Result<String, ApparatusError> {
    let mut scratch = DocumentTree::new("fragment");
    let app = critical(&mut scratch, config, entry, " ")?;
    scratch.fragment_xml(app)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        apparatus::{Lemma, Role},
        tests::helpers::reconciler_with,
    };
    use test_log::test;

    fn entry(readings: Vec<Reading>) -> ApparatusEntry {
        ApparatusEntry {
            ordinal: 4,
            lemma: Lemma {
                text: "světa".to_string(),
                witnesses: Citation::implied("DJAK03", Role::Lemma),
            },
            readings,
        }
    }

    #[test]
    fn test_lemma_extent() {
        assert_eq!(lemma_extent("světa,", "světa"), "světa".len());
        assert_eq!(lemma_extent("světa,", "světa,"), "světa,".len());
        assert_eq!(lemma_extent("světa", "světa"), "světa".len());
    }

    #[test]
    fn test_gloss_fragment() {
        let config = EditionConfig::default();
        assert_eq!(
            gloss_fragment(&config, 3, "Augustinus", " cf. note ").unwrap(),
            "<anchor xml:id=\"djak3.a-3\"/> <app from=\"#djak3.a-3\">\
             <note place=\"bottom\" type=\"gloss\"><label>Augustinus</label> cf. note</note></app>"
        );
        assert_eq!(
            commentary_fragment(&config, 5, "A footnote.").unwrap(),
            "<anchor xml:id=\"djak3.a-5\"/>\
             <note place=\"bottom\" type=\"commentary\">A footnote.</note>"
        );
    }

    #[test]
    fn test_critical_with_cited_witnesses() {
        let reconciler = reconciler_with(&["W", "Sr", "St"], "St");
        let config = reconciler.config().clone();
        let readings = vec![
            Reading {
                text: "světu".to_string(),
                witnesses: reconciler.parse_citation("W, Sr", Role::Reading),
            },
            Reading {
                text: String::new(),
                witnesses: reconciler.parse_citation("vynech. ve St", Role::Reading),
            },
        ];
        let mut tree = DocumentTree::new("p");
        let app = critical(&mut tree, &config, &entry(readings), "světa").unwrap();
        assert_eq!(
            tree.fragment_xml(app).unwrap(),
            "<app><lem wit=\"#DJAK03\">světa</lem> \
             <rdg wit=\"#W #Sr\">světu</rdg>\
             <rdg wit=\"#St\"/>\
             <note><hi rend=\"italic\">vynech. ve <ref target=\"#St\">St</ref></hi></note></app>"
        );
    }

    #[test]
    fn test_critical_remark_inside_reading() {
        let reconciler = reconciler_with(&["W"], "W");
        let config = reconciler.config().clone();
        let readings = vec![Reading {
            text: "swěta".to_string(),
            witnesses: reconciler.parse_citation("omylem tištěno", Role::Reading),
        }];
        let fragment = critical_fragment(&config, &entry(readings)).unwrap();
        assert_eq!(
            fragment,
            "<app><lem wit=\"#DJAK03\"> </lem> \
             <rdg wit=\"#W\"><hi rend=\"italic\">omylem tištěno</hi> swěta</rdg></app>"
        );
    }

    #[test]
    fn test_unparsed_citations() {
        let config = EditionConfig::default();
        let mut unparsed = entry(vec![Reading {
            text: "lumen | W | lucem".to_string(),
            witnesses: Citation::Unparsed("lumen | W | lucem".to_string()),
        }]);
        unparsed.lemma.witnesses = Citation::Unparsed("xyz".to_string());
        let mut tree = DocumentTree::new("p");
        let app = critical(&mut tree, &config, &unparsed, "světa").unwrap();
        assert_eq!(
            tree.fragment_xml(app).unwrap(),
            "<app><lem wit=\"#DJAK03\">světa</lem> \
             <rdg wit=\"unparsed\">lumen | W | lucem</rdg>\
             <note type=\"unparsed\">xyz</note></app>"
        );
    }
}
