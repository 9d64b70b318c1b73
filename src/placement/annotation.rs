//! Queued annotations and the records they are built from.
//!
//! The extraction stage hands over plain records (a comment label and its note, a footnote number
//! and its text, an apparatus line as styled runs), keyed by the page they were found on.
//! [`AnnotationQueue::build`] turns them into [`Annotation`]s: apparatus lines are reconciled into
//! structured entries, footnotes get ids continuing the gloss numbering, and anything that cannot
//! be read becomes a diagnostic instead of an annotation.

use serde::{Deserialize, Deserializer, Serialize};
use std::{cmp::Ordering, collections::BTreeMap, fmt, fs::read_to_string, path::Path};

use super::report::PlacementDiagnostic;
use crate::{
    apparatus::{merge_witness_groups, ApparatusEntry, RawEntry, Reconciler, Segment},
    error::ApparatusError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AnnotationKind {
    Gloss,
    Commentary,
    CriticalReading,
}

impl AnnotationKind {
    pub fn plural(&self) -> &'static str {
        match self {
            AnnotationKind::Gloss => "comments",
            AnnotationKind::Commentary => "footnotes",
            AnnotationKind::CriticalReading => "critical app entries",
        }
    }
}

impl fmt::Display for AnnotationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnnotationKind::Gloss => "comment",
            AnnotationKind::Commentary => "footnote",
            AnnotationKind::CriticalReading => "critical app entry",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AnnotationBody {
    Gloss { note: String },
    Commentary { note: String },
    Critical(ApparatusEntry),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Input order; for glosses and footnotes also the number in the anchor id
    pub sequence: usize,
    pub ordinal: Option<u32>,
    /// The text searched for: comment label, apparatus lemma or footnote marker
    pub label: String,
    pub page: String,
    pub body: AnnotationBody,
}

impl Annotation {
    pub fn kind(&self) -> AnnotationKind {
        match self.body {
            AnnotationBody::Gloss { .. } => AnnotationKind::Gloss,
            AnnotationBody::Commentary { .. } => AnnotationKind::Commentary,
            AnnotationBody::Critical(_) => AnnotationKind::CriticalReading,
        }
    }

    pub fn entry(&self) -> Option<&ApparatusEntry> {
        match &self.body {
            AnnotationBody::Critical(entry) => Some(entry),
            _ => None,
        }
    }
}

/// Sort by ordinal (missing last), then longer labels first, then input order.
pub fn placement_order(annotations: &mut [Annotation]) {
    annotations.sort_by(|a, b| {
        let ordinal = |x: &Annotation| x.ordinal.unwrap_or(u32::MAX);
        ordinal(a)
            .cmp(&ordinal(b))
            .then_with(|| b.label.chars().count().cmp(&a.label.chars().count()))
            .then_with(|| a.sequence.cmp(&b.sequence))
    });
}

/// Pages compare numerically when both are numbers.
pub fn page_order(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// First run of digits in `text`.
fn leading_number(text: &str) -> Option<u32> {
    let digits = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect::<String>();
    digits.parse().ok()
}

fn page_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PageId {
        Number(u64),
        Text(String),
    }
    Ok(match PageId::deserialize(deserializer)? {
        PageId::Number(n) => n.to_string(),
        PageId::Text(text) => text,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRecord {
    #[serde(deserialize_with = "page_id")]
    pub page: String,
    /// Explicit sequence number; defaults to the position in the queue, counting from 1
    #[serde(default)]
    pub sequence: Option<usize>,
    /// Line reference as written by the editor, e.g. "12" or "12-13"
    #[serde(default)]
    pub number: Option<String>,
    pub label: String,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FootnoteRecord {
    #[serde(deserialize_with = "page_id")]
    pub page: String,
    pub number: u32,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApparatusRecord {
    #[serde(deserialize_with = "page_id")]
    pub page: String,
    /// Witness group letter, for documents recorded once per group
    #[serde(default)]
    pub group: Option<String>,
    pub segments: Vec<Segment>,
}

/// The raw queues as the extraction stage writes them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueRecords {
    pub comments: Vec<CommentRecord>,
    pub footnotes: Vec<FootnoteRecord>,
    pub apparatus: Vec<ApparatusRecord>,
}

impl QueueRecords {
    pub fn from_toml_str(content: &str) -> Result<Self, ApparatusError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_json_str(content: &str) -> Result<Self, ApparatusError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Read a `.json` or `.toml` queue file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ApparatusError> {
        let path = path.as_ref();
        let content = read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => QueueRecords::from_json_str(&content),
            Some("toml") => QueueRecords::from_toml_str(&content),
            other => Err(ApparatusError::Config(format!(
                "unknown annotation queue format {other:?} for {path:?}"
            ))),
        }
    }
}

/// Annotations waiting to be placed, per kind and page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationQueue {
    pub comments: BTreeMap<String, Vec<Annotation>>,
    pub footnotes: BTreeMap<String, Vec<Annotation>>,
    pub apparatus: BTreeMap<String, Vec<Annotation>>,
}

impl AnnotationQueue {
    /// Build the queue from raw records. With `grouped`, apparatus lines are read against the
    /// witness groups of the configuration and merged per page.
    pub fn build(
        records: &QueueRecords,
        reconciler: &Reconciler,
        grouped: bool,
    ) -> (AnnotationQueue, Vec<PlacementDiagnostic>) {
        let mut queue = AnnotationQueue::default();
        let mut diagnostics = vec![];

        let mut last_gloss = 0;
        for (index, record) in records.comments.iter().enumerate() {
            let sequence = record.sequence.unwrap_or(index + 1);
            last_gloss = last_gloss.max(sequence);
            queue
                .comments
                .entry(record.page.clone())
                .or_default()
                .push(Annotation {
                    sequence,
                    ordinal: record.number.as_deref().and_then(leading_number),
                    label: record.label.clone(),
                    page: record.page.clone(),
                    body: AnnotationBody::Gloss {
                        note: record.note.clone(),
                    },
                });
        }

        let mut footnotes = records.footnotes.iter().collect::<Vec<_>>();
        footnotes.sort_by(|a, b| page_order(&a.page, &b.page).then(a.number.cmp(&b.number)));
        for (offset, record) in footnotes.into_iter().enumerate() {
            queue
                .footnotes
                .entry(record.page.clone())
                .or_default()
                .push(Annotation {
                    sequence: last_gloss + offset + 1,
                    ordinal: Some(record.number),
                    label: reconciler
                        .config()
                        .footnote_token(&record.number.to_string()),
                    page: record.page.clone(),
                    body: AnnotationBody::Commentary {
                        note: record.note.clone(),
                    },
                });
        }

        let mut pages: BTreeMap<&str, Vec<&ApparatusRecord>> = BTreeMap::new();
        for record in &records.apparatus {
            pages.entry(record.page.as_str()).or_default().push(record);
        }
        let mut sequence = 0;
        for (page, lines) in pages {
            let mut entries = if grouped {
                grouped_entries(&lines, reconciler, &mut diagnostics)
            } else {
                lines
                    .iter()
                    .filter_map(|line| match RawEntry::from_segments(&line.segments) {
                        Ok(raw) => Some(reconciler.reconcile(&raw)),
                        Err(diagnostic) => {
                            tracing::warn!("Page {page}: {diagnostic}");
                            diagnostics.push(diagnostic);
                            None
                        }
                    })
                    .collect::<Vec<_>>()
            };
            if grouped {
                entries = merge_witness_groups(entries);
            }
            let annotations = queue.apparatus.entry(page.to_string()).or_default();
            for entry in entries {
                for raw in entry.unparsed_citations() {
                    diagnostics.push(PlacementDiagnostic::unparseable(entry.ordinal, raw));
                }
                sequence += 1;
                annotations.push(Annotation {
                    sequence,
                    ordinal: Some(entry.ordinal),
                    label: entry.lemma.text.clone(),
                    page: page.to_string(),
                    body: AnnotationBody::Critical(entry),
                });
            }
        }

        tracing::info!(
            "Queued {} comments, {} footnotes, {} critical app entries",
            queue.len_of(&queue.comments),
            queue.len_of(&queue.footnotes),
            queue.len_of(&queue.apparatus)
        );
        (queue, diagnostics)
    }

    fn len_of(&self, pages: &BTreeMap<String, Vec<Annotation>>) -> usize {
        pages.values().map(Vec::len).sum()
    }

    pub fn len(&self) -> usize {
        self.len_of(&self.comments) + self.len_of(&self.footnotes) + self.len_of(&self.apparatus)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every page with at least one queued annotation, in page order.
    pub fn pages(&self) -> Vec<&str> {
        let mut pages = self
            .comments
            .keys()
            .chain(self.footnotes.keys())
            .chain(self.apparatus.keys())
            .map(String::as_str)
            .collect::<Vec<_>>();
        pages.sort_by(|a, b| page_order(a, b));
        pages.dedup();
        pages
    }
}

/// Read one page of apparatus lines recorded per witness group. A group letter persists from line
/// to line until another one appears.
fn grouped_entries(
    lines: &[&ApparatusRecord],
    reconciler: &Reconciler,
    diagnostics: &mut Vec<PlacementDiagnostic>,
) -> Vec<ApparatusEntry> {
    let groups = &reconciler.config().witness_groups;
    let mut current: Option<String> = None;
    let mut entries = vec![];
    for line in lines {
        let mut segments = line.segments.as_slice();
        if let Some(letter) = &line.group {
            current = Some(letter.clone());
        } else if let Some(first) = segments.first() {
            let letter = first.text.trim();
            if groups.contains_key(letter) {
                current = Some(letter.to_string());
                segments = &segments[1..];
            }
        }

        let raw = match RawEntry::from_segments(segments) {
            Ok(raw) => raw,
            Err(diagnostic) => {
                tracing::warn!("Page {}: {diagnostic}", line.page);
                diagnostics.push(diagnostic);
                continue;
            }
        };
        match current.as_deref().and_then(|letter| groups.get(letter)) {
            Some(group) => entries.push(reconciler.reconcile_grouped(&raw, group)),
            None => entries.push(reconciler.reconcile(&raw)),
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::WitnessGroup, tests::helpers::reconciler_with};
    use test_log::test;

    fn comment(sequence: usize, ordinal: Option<u32>, label: &str) -> Annotation {
        Annotation {
            sequence,
            ordinal,
            label: label.to_string(),
            page: "1".to_string(),
            body: AnnotationBody::Gloss {
                note: String::new(),
            },
        }
    }

    #[test]
    fn test_placement_order() {
        let mut annotations = vec![
            comment(1, None, "lux"),
            comment(2, Some(5), "in tenebris"),
            comment(3, Some(3), "lux"),
            comment(4, Some(3), "lux aeterna"),
            comment(5, Some(3), "lux"),
        ];
        placement_order(&mut annotations);
        assert_eq!(
            annotations.iter().map(|a| a.sequence).collect::<Vec<_>>(),
            vec![4, 3, 5, 2, 1]
        );
    }

    #[test]
    fn test_page_order_and_numbers() {
        let mut pages = vec!["10", "7", "x", "100"];
        pages.sort_by(|a, b| page_order(a, b));
        assert_eq!(pages, vec!["7", "10", "100", "x"]);
        assert_eq!(leading_number("ř. 12-13"), Some(12));
        assert_eq!(leading_number("viz výše"), None);
    }

    #[test]
    fn test_build_from_toml() {
        let records = QueueRecords::from_toml_str(
            r#"
            [[comments]]
            page = 7
            number = "3"
            label = "Augustinus"
            note = "cf. note"

            [[comments]]
            page = "8"
            label = "lumen"
            note = "light"

            [[footnotes]]
            page = 7
            number = 1
            note = "A footnote."

            [[apparatus]]
            page = 7
            segments = [
                { text = "12 fidem" },
                { text = "]" },
                { text = "fide " },
                { style = "italic", text = "W" },
            ]

            [[apparatus]]
            page = 7
            segments = [{ text = "13 lumine" }]
            "#,
        )
        .unwrap();
        let reconciler = reconciler_with(&["W", "Sr"], "Sr");
        let (queue, diagnostics) = AnnotationQueue::build(&records, &reconciler, false);

        assert_eq!(queue.len(), 4);
        assert_eq!(queue.pages(), vec!["7", "8"]);
        assert_eq!(queue.comments["7"][0].ordinal, Some(3));
        assert_eq!(queue.comments["8"][0].sequence, 2);

        let footnote = &queue.footnotes["7"][0];
        assert_eq!(footnote.sequence, 3);
        assert_eq!(footnote.label, "<FN_1>");
        assert_eq!(footnote.kind(), AnnotationKind::Commentary);

        let critical = &queue.apparatus["7"][0];
        assert_eq!(critical.label, "fidem");
        assert_eq!(critical.ordinal, Some(12));
        assert_eq!(critical.entry().unwrap().readings[0].text, "fide");

        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].is_malformed());
    }

    #[test]
    fn test_grouped_lines_are_merged() {
        let mut reconciler_config = reconciler_with(&["RKP", "T1663"], "DJAK03").config().clone();
        reconciler_config.witness_groups.insert(
            "a".to_string(),
            WitnessGroup {
                lemma: "DJAK03".to_string(),
                reading: "T1663".to_string(),
            },
        );
        reconciler_config.witness_groups.insert(
            "b".to_string(),
            WitnessGroup {
                lemma: "DJAK03".to_string(),
                reading: "RKP".to_string(),
            },
        );
        let reconciler = Reconciler::new(&reconciler_config).unwrap();
        let line = |segments: Vec<Segment>| ApparatusRecord {
            page: "4".to_string(),
            group: None,
            segments,
        };
        let records = QueueRecords {
            apparatus: vec![
                line(vec![
                    Segment::plain("a"),
                    Segment::plain("1 světa"),
                    Segment::plain("]"),
                    Segment::plain("světu"),
                ]),
                line(vec![
                    Segment::plain("2 lidé"),
                    Segment::plain("]"),
                    Segment::plain("lid"),
                ]),
                line(vec![
                    Segment::plain("b"),
                    Segment::plain("1 světa"),
                    Segment::plain("]"),
                    Segment::plain("světu"),
                ]),
            ],
            ..QueueRecords::default()
        };
        let (queue, diagnostics) = AnnotationQueue::build(&records, &reconciler, true);
        assert!(diagnostics.is_empty());

        let entries = queue.apparatus["4"]
            .iter()
            .filter_map(Annotation::entry)
            .collect::<Vec<_>>();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].readings[0].witnesses.wit_attribute(), "#T1663 #RKP");
        assert_eq!(entries[1].readings[0].witnesses.wit_attribute(), "#T1663");
    }
}
