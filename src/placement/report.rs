//! Outcome of a placement run: counts, diagnostics and the failure side channel.

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, io::Write};

use super::annotation::{Annotation, AnnotationKind};
use crate::{error::ApparatusError, tree::TextSlot};

/// A non-fatal problem found while queueing or placing annotations.
///
/// None of these stops a run. They are collected in the [`PlacementReport`] so an editor can
/// triage them after the document has been written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlacementDiagnostic {
    /// No occurrence of the label was found on the annotation's page
    UnmatchedLabel {
        kind: AnnotationKind,
        page: String,
        label: String,
    },

    /// The queued annotation does not fit any known layout and was skipped
    MalformedAnnotation { message: String },

    /// A witness citation fit neither reading grammar and was kept verbatim
    UnparseableWitnessCitation { ordinal: u32, raw: String },

    /// An apparatus ordinal went down; the scan restarted from the page anchor
    AmbiguousOrdinalDrop {
        page: String,
        previous: u32,
        ordinal: u32,
    },
}

impl PlacementDiagnostic {
    pub fn unmatched(kind: AnnotationKind, page: impl Into<String>, label: impl Into<String>) -> Self {
        Self::UnmatchedLabel {
            kind,
            page: page.into(),
            label: label.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedAnnotation {
            message: message.into(),
        }
    }

    pub fn unparseable(ordinal: u32, raw: impl Into<String>) -> Self {
        Self::UnparseableWitnessCitation {
            ordinal,
            raw: raw.into(),
        }
    }

    pub fn ordinal_drop(page: impl Into<String>, previous: u32, ordinal: u32) -> Self {
        Self::AmbiguousOrdinalDrop {
            page: page.into(),
            previous,
            ordinal,
        }
    }

    pub fn is_unmatched(&self) -> bool {
        matches!(self, Self::UnmatchedLabel { .. })
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedAnnotation { .. })
    }

    pub fn is_unparseable(&self) -> bool {
        matches!(self, Self::UnparseableWitnessCitation { .. })
    }

    pub fn is_ordinal_drop(&self) -> bool {
        matches!(self, Self::AmbiguousOrdinalDrop { .. })
    }

    pub fn as_malformed(&self) -> Option<&str> {
        match self {
            Self::MalformedAnnotation { message } => Some(message),
            _ => None,
        }
    }

    pub fn as_unparseable(&self) -> Option<(u32, &str)> {
        match self {
            Self::UnparseableWitnessCitation { ordinal, raw } => Some((*ordinal, raw)),
            _ => None,
        }
    }
}

impl fmt::Display for PlacementDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnmatchedLabel { kind, page, label } => {
                write!(f, "{kind} \"{label}\" on page {page} not found")
            }
            Self::MalformedAnnotation { message } => write!(f, "Malformed annotation: {message}"),
            Self::UnparseableWitnessCitation { ordinal, raw } => {
                write!(f, "Unparsed witness citation in entry {ordinal}: {raw}")
            }
            Self::AmbiguousOrdinalDrop {
                page,
                previous,
                ordinal,
            } => write!(
                f,
                "Entry {ordinal} follows {previous} on page {page}; restarting from the page anchor"
            ),
        }
    }
}

/// An annotation that could not be placed. It never re-enters the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub kind: AnnotationKind,
    pub page: String,
    pub annotation: Annotation,
    /// The last text field the search looked at, if it looked at any
    pub last_position: Option<TextSlot>,
    /// Best-effort markup for a reviewer to merge by hand
    pub fragment: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindStats {
    pub total: usize,
    pub placed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlacementReport {
    pub stats: BTreeMap<AnnotationKind, KindStats>,
    pub diagnostics: Vec<PlacementDiagnostic>,
    pub failures: Vec<FailureRecord>,
}

impl PlacementReport {
    pub fn new() -> PlacementReport {
        PlacementReport::default()
    }

    pub fn stats(&self, kind: AnnotationKind) -> KindStats {
        self.stats.get(&kind).copied().unwrap_or_default()
    }

    pub(crate) fn record_placed(&mut self, kind: AnnotationKind) {
        let stats = self.stats.entry(kind).or_default();
        stats.total += 1;
        stats.placed += 1;
    }

    pub(crate) fn record_failure(&mut self, failure: FailureRecord) {
        let stats = self.stats.entry(failure.kind).or_default();
        stats.total += 1;
        stats.failed += 1;
        self.diagnostics.push(PlacementDiagnostic::unmatched(
            failure.kind,
            failure.page.clone(),
            failure.annotation.label.clone(),
        ));
        self.failures.push(failure);
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: PlacementReport) {
        for (kind, stats) in other.stats {
            let mine = self.stats.entry(kind).or_default();
            mine.total += stats.total;
            mine.placed += stats.placed;
            mine.failed += stats.failed;
        }
        self.diagnostics.extend(other.diagnostics);
        self.failures.extend(other.failures);
    }

    pub fn failures_of(&self, kind: AnnotationKind) -> impl Iterator<Item = &FailureRecord> {
        self.failures.iter().filter(move |f| f.kind == kind)
    }

    pub fn count_diagnostics(&self, predicate: impl Fn(&PlacementDiagnostic) -> bool) -> usize {
        self.diagnostics.iter().filter(|d| predicate(d)).count()
    }

    /// Human readable totals, one line per annotation kind plus a diagnostics line.
    pub fn summary(&self) -> Vec<String> {
        let mut lines = self
            .stats
            .iter()
            .map(|(kind, stats)| {
                format!(
                    "Failed to place {} {} out of {}",
                    stats.failed,
                    kind.plural(),
                    stats.total
                )
            })
            .collect::<Vec<_>>();
        lines.push(format!(
            "{} unmatched, {} malformed, {} unparsed citations, {} ordinal drops",
            self.count_diagnostics(PlacementDiagnostic::is_unmatched),
            self.count_diagnostics(PlacementDiagnostic::is_malformed),
            self.count_diagnostics(PlacementDiagnostic::is_unparseable),
            self.count_diagnostics(PlacementDiagnostic::is_ordinal_drop),
        ));
        lines
    }

    /// Write `Page N: <fragment>` for every failure of one kind.
    pub fn write_failures<W: Write>(
        &self,
        kind: AnnotationKind,
        writer: &mut W,
    ) -> Result<(), ApparatusError> {
        for failure in self.failures_of(kind) {
            writeln!(writer, "Page {}: {}", failure.page, failure.fragment)?;
        }
        Ok(())
    }

    /// Write every malformed-annotation diagnostic, one per line.
    pub fn write_problematic<W: Write>(&self, writer: &mut W) -> Result<(), ApparatusError> {
        for message in self.diagnostics.iter().filter_map(PlacementDiagnostic::as_malformed) {
            writeln!(writer, "{message}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placement::annotation::AnnotationBody;
    use test_log::test;

    fn failure(page: &str, label: &str) -> FailureRecord {
        FailureRecord {
            kind: AnnotationKind::Gloss,
            page: page.to_string(),
            annotation: Annotation {
                sequence: 1,
                ordinal: None,
                label: label.to_string(),
                page: page.to_string(),
                body: AnnotationBody::Gloss {
                    note: "n".to_string(),
                },
            },
            last_position: None,
            fragment: format!("<anchor/> {label}"),
        }
    }

    #[test]
    fn test_counts_and_summary() {
        let mut report = PlacementReport::new();
        report.record_placed(AnnotationKind::Gloss);
        report.record_failure(failure("7", "lux"));

        let mut other = PlacementReport::new();
        other.record_placed(AnnotationKind::CriticalReading);
        other
            .diagnostics
            .push(PlacementDiagnostic::malformed("no ] in apparatus line: 3 lux"));
        report.merge(other);

        assert_eq!(
            report.stats(AnnotationKind::Gloss),
            KindStats {
                total: 2,
                placed: 1,
                failed: 1
            }
        );
        assert_eq!(
            report.summary(),
            vec![
                "Failed to place 1 comments out of 2".to_string(),
                "Failed to place 0 critical app entries out of 1".to_string(),
                "1 unmatched, 1 malformed, 0 unparsed citations, 0 ordinal drops".to_string(),
            ]
        );
    }

    #[test]
    fn test_side_channel_lines() {
        let mut report = PlacementReport::new();
        report.record_failure(failure("7", "lux"));
        report
            .diagnostics
            .push(PlacementDiagnostic::malformed("no lemma"));

        let mut out = Vec::new();
        report
            .write_failures(AnnotationKind::Gloss, &mut out)
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Page 7: <anchor/> lux\n");

        let mut out = Vec::new();
        report
            .write_failures(AnnotationKind::Commentary, &mut out)
            .unwrap();
        assert!(out.is_empty());

        let mut out = Vec::new();
        report.write_problematic(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "no lemma\n");
    }

    #[test]
    fn test_diagnostic_display() {
        let diagnostic = PlacementDiagnostic::unmatched(AnnotationKind::CriticalReading, "9", "fidem");
        assert!(diagnostic.is_unmatched());
        assert_eq!(
            diagnostic.to_string(),
            "critical app entry \"fidem\" on page 9 not found"
        );
        assert_eq!(
            PlacementDiagnostic::unparseable(4, "x | y").as_unparseable(),
            Some((4, "x | y"))
        );
    }
}
