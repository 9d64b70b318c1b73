//! Critical apparatus reconciliation.
//!
//! An apparatus line arrives as styled runs, e.g.
//!
//! ```text
//! 12 fidem ] fide _W_ fidei _Sr, St_
//! ```
//!
//! [`RawEntry::from_segments`] splits it into ordinal, lemma side and reading side;
//! [`Reconciler::reconcile`] turns each side into text plus structured witness citations, using
//! the per-document sigla table of an [`EditionConfig`]. Reading sides that fit none of the
//! [`grammar::READING_GRAMMARS`] are kept verbatim as an unparsed reading rather than guessed at.

use serde::{Deserialize, Serialize};

use crate::{
    config::{EditionConfig, WitnessGroup},
    error::ApparatusError,
};

pub mod citation;
pub mod entry;
pub mod grammar;
pub mod merge;

pub use citation::{Citation, EditorialNote, Role, WitnessRef};
pub use entry::{repair_italics, RawEntry, Segment, SegmentStyle};
pub use merge::merge_witness_groups;

use citation::SiglaMatcher;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lemma {
    /// The lemma as the editor quoted it; this is the label searched for in the text
    pub text: String,
    pub witnesses: Citation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    /// Variant text. Empty when the reading is only a citation ("vynech. ve W").
    pub text: String,
    pub witnesses: Citation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApparatusEntry {
    pub ordinal: u32,
    pub lemma: Lemma,
    pub readings: Vec<Reading>,
}

impl ApparatusEntry {
    /// Raw text of every citation that could not be read.
    pub fn unparsed_citations(&self) -> Vec<&str> {
        std::iter::once(&self.lemma.witnesses)
            .chain(self.readings.iter().map(|r| &r.witnesses))
            .filter_map(|c| match c {
                Citation::Unparsed(raw) => Some(raw.as_str()),
                Citation::Witnesses { .. } => None,
            })
            .collect()
    }
}

/// Reads apparatus entries against one document's witness table.
#[derive(Debug, Clone)]
pub struct Reconciler {
    config: EditionConfig,
    sigla: SiglaMatcher,
}

impl Reconciler {
    pub fn new(config: &EditionConfig) -> Result<Reconciler, ApparatusError> {
        Ok(Reconciler {
            config: config.clone(),
            sigla: SiglaMatcher::new(config)?,
        })
    }

    pub fn config(&self) -> &EditionConfig {
        &self.config
    }

    /// A lone run is attributed to the edition itself; further runs cite additional witnesses,
    /// which are listed after the edition.
    pub fn lemma(&self, segments: &[Segment]) -> Lemma {
        let edition = &self.config.edition_witness;
        let text = segments
            .first()
            .map(|s| s.text.trim().to_string())
            .unwrap_or_default();
        if segments.len() <= 1 {
            return Lemma {
                text,
                witnesses: Citation::implied(edition, Role::Lemma),
            };
        }
        let cited = segments[1..]
            .iter()
            .map(|s| s.text.trim())
            .collect::<Vec<_>>()
            .join(" ");
        Lemma {
            text,
            witnesses: self
                .parse_citation(&cited, Role::Lemma)
                .with_leading(edition, Role::Lemma),
        }
    }

    pub fn readings(&self, segments: &[Segment]) -> Vec<Reading> {
        match segments {
            [] => vec![],
            [only] if !only.is_italic() => vec![Reading {
                text: only.text.trim().to_string(),
                witnesses: Citation::implied(&self.config.base_witness, Role::Reading),
            }],
            [only] => {
                let witnesses = self.parse_citation(&only.text, Role::Reading);
                let text = match &witnesses {
                    Citation::Unparsed(raw) => raw.clone(),
                    Citation::Witnesses { .. } => String::new(),
                };
                vec![Reading { text, witnesses }]
            }
            _ => {
                for (name, grammar) in grammar::READING_GRAMMARS {
                    if let Some(readings) = grammar(self, segments) {
                        tracing::debug!("Reading side parsed with {name}");
                        return readings;
                    }
                }
                tracing::warn!(
                    "Irregular reading side, keeping it verbatim: {:?}",
                    segments.iter().map(|s| s.to_string()).collect::<Vec<_>>()
                );
                vec![grammar::unparsed(segments)]
            }
        }
    }

    pub fn reconcile(&self, raw: &RawEntry) -> ApparatusEntry {
        let lemma = repair_italics(&raw.lemma);
        let readings = repair_italics(&raw.readings);
        ApparatusEntry {
            ordinal: raw.ordinal,
            lemma: self.lemma(&lemma),
            readings: self.readings(&readings),
        }
    }

    /// Witnesses come from the group; only the first lemma and reading runs are used as text.
    pub fn reconcile_grouped(&self, raw: &RawEntry, group: &WitnessGroup) -> ApparatusEntry {
        let first_text = |segments: &[Segment]| {
            repair_italics(segments)
                .first()
                .map(|s| s.text.trim().to_string())
                .unwrap_or_default()
        };
        ApparatusEntry {
            ordinal: raw.ordinal,
            lemma: Lemma {
                text: first_text(&raw.lemma),
                witnesses: Citation::implied(&group.lemma, Role::Lemma),
            },
            readings: vec![Reading {
                text: first_text(&raw.readings),
                witnesses: Citation::implied(&group.reading, Role::Reading),
            }],
        }
    }
}
