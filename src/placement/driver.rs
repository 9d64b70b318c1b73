use std::collections::BTreeMap;

use super::{
    annotation::{page_order, placement_order, Annotation, AnnotationBody, AnnotationKind},
    markup,
    report::{FailureRecord, PlacementDiagnostic, PlacementReport},
    AnnotationQueue,
};
use crate::{
    config::EditionConfig,
    error::ApparatusError,
    pattern::{LabelPattern, PatternOptions},
    tree::{
        splice, splice::SpliceOptions, DocumentTree, Match, NodeId, Piece, Step, TextSlot,
        TreeCursor,
    },
};

/// Places queued annotations into a document tree.
#[derive(Debug, Clone)]
pub struct Placer {
    config: EditionConfig,
    patterns: PatternOptions,
    splice_options: SpliceOptions,
}

/// Where a search stopped.
struct Search {
    found: Option<Match>,
    last_position: Option<TextSlot>,
}

impl Placer {
    pub fn new(config: &EditionConfig) -> Placer {
        Placer {
            config: config.clone(),
            patterns: config.pattern_options(),
            splice_options: SpliceOptions {
                styled_run_tags: config.styled_run_tags.clone(),
            },
        }
    }

    pub fn config(&self) -> &EditionConfig {
        &self.config
    }

    fn page_anchor(&self, tree: &DocumentTree, page: &str) -> Option<NodeId> {
        tree.page_anchors(&self.config.page_anchor).get(page)
    }

    /// A walk over one page, starting right after its anchor.
    fn page_cursor(&self, tree: &DocumentTree, anchor: NodeId) -> TreeCursor {
        TreeCursor::scoped(tree, anchor, &self.config.page_anchor).opaque(&self.config.opaque_tags)
    }

    /// A walk over the rest of one page, starting at `slot`.
    fn resumed_cursor(&self, tree: &DocumentTree, anchor: NodeId, slot: TextSlot) -> TreeCursor {
        TreeCursor::at(tree, slot)
            .within(anchor, &self.config.page_anchor)
            .opaque(&self.config.opaque_tags)
    }

    /// First acceptable match of `pattern` along the cursor. `skip` rejects a match, given its
    /// field and start offset; the search then continues behind it in the same field.
    fn search(
        tree: &DocumentTree,
        mut cursor: TreeCursor,
        pattern: &LabelPattern,
        skip: impl Fn(TextSlot, usize) -> bool,
    ) -> Search {
        if pattern.is_impossible() {
            return Search {
                found: None,
                last_position: None,
            };
        }
        while let Step::Slot(slot) = cursor.next_slot(tree) {
            let text = tree.field(slot.node, slot.field);
            let mut from = 0;
            while let Some(range) = pattern.find_from(text, from) {
                if !skip(slot, range.start) {
                    return Search {
                        found: Some(Match {
                            node: slot.node,
                            field: slot.field,
                            start: range.start,
                            end: range.end,
                        }),
                        last_position: Some(slot),
                    };
                }
                from = if range.end > range.start {
                    range.end
                } else {
                    match text[range.start..].chars().next() {
                        Some(c) => range.start + c.len_utf8(),
                        None => break,
                    }
                };
            }
        }
        Search {
            found: None,
            last_position: cursor.last_slot(),
        }
    }

    fn fail(
        &self,
        report: &mut PlacementReport,
        annotation: &Annotation,
        last_position: Option<TextSlot>,
    ) -> Result<(), ApparatusError> {
        let fragment = match &annotation.body {
            AnnotationBody::Gloss { note } => {
                markup::gloss_fragment(&self.config, annotation.sequence, &annotation.label, note)?
            }
            AnnotationBody::Commentary { note } => {
                markup::commentary_fragment(&self.config, annotation.sequence, note)?
            }
            AnnotationBody::Critical(entry) => markup::critical_fragment(&self.config, entry)?,
        };
        tracing::debug!(
            "{} \"{}\" on page {} not found",
            annotation.kind(),
            annotation.label,
            annotation.page
        );
        report.record_failure(FailureRecord {
            kind: annotation.kind(),
            page: annotation.page.clone(),
            annotation: annotation.clone(),
            last_position,
            fragment,
        });
        Ok(())
    }

    /// Every annotation of a page without an anchor fails.
    fn fail_all(
        &self,
        report: &mut PlacementReport,
        page: &str,
        annotations: &[Annotation],
    ) -> Result<(), ApparatusError> {
        tracing::warn!("Couldn't find page anchor {page}");
        for annotation in annotations {
            self.fail(report, annotation, None)?;
        }
        Ok(())
    }

    /// Insert glosses. Each comment is searched from the page anchor, longer and lower-numbered
    /// labels first; text that a gloss with the same label has just wrapped is skipped.
    pub fn place_comments(
        &self,
        tree: &mut DocumentTree,
        page: &str,
        annotations: &[Annotation],
    ) -> Result<PlacementReport, ApparatusError> {
        let anchor = self.page_anchor(tree, page);
        self.comments_on_page(tree, page, anchor, annotations)
    }

    #[tracing::instrument(skip_all)]
    fn comments_on_page(
        &self,
        tree: &mut DocumentTree,
        page: &str,
        anchor: Option<NodeId>,
        annotations: &[Annotation],
    ) -> Result<PlacementReport, ApparatusError> {
        let mut report = PlacementReport::new();
        let Some(anchor) = anchor else {
            self.fail_all(&mut report, page, annotations)?;
            return Ok(report);
        };

        let mut ordered = annotations.to_vec();
        placement_order(&mut ordered);
        // node holding wrapped text -> label it was wrapped for
        let mut created: BTreeMap<NodeId, String> = BTreeMap::new();

        for annotation in &ordered {
            let AnnotationBody::Gloss { note } = &annotation.body else {
                report.diagnostics.push(PlacementDiagnostic::malformed(format!(
                    "{} queued as a comment on page {page}",
                    annotation.kind()
                )));
                continue;
            };
            let pattern = LabelPattern::compile(&annotation.label, &self.patterns);
            let cursor = self.page_cursor(tree, anchor).with_leading_head(tree);
            let search = Placer::search(tree, cursor, &pattern, |slot, start| {
                start == 0 && created.get(&slot.node) == Some(&annotation.label)
            });
            let Some(at) = search.found else {
                self.fail(&mut report, annotation, search.last_position)?;
                continue;
            };

            tracing::debug!(
                "Found \"{}\" in \"{}\"",
                annotation.label,
                tree.field(at.node, at.field)
            );
            let pieces =
                markup::gloss(tree, &self.config, annotation.sequence, &annotation.label, note)?;
            let outcome = splice(tree, &at, &pieces, &self.splice_options)?;
            if let Some(slot) = outcome.matched_slot {
                created.insert(slot.node, annotation.label.clone());
            }
            report.record_placed(AnnotationKind::Gloss);
        }

        let stats = report.stats(AnnotationKind::Gloss);
        tracing::info!(
            "Page {page}: placed {} of {} comments",
            stats.placed,
            stats.total
        );
        Ok(report)
    }

    /// Replace footnote markers with an anchor and a commentary note.
    pub fn place_footnotes(
        &self,
        tree: &mut DocumentTree,
        page: &str,
        annotations: &[Annotation],
    ) -> Result<PlacementReport, ApparatusError> {
        let anchor = self.page_anchor(tree, page);
        self.footnotes_on_page(tree, page, anchor, annotations)
    }

    #[tracing::instrument(skip_all)]
    fn footnotes_on_page(
        &self,
        tree: &mut DocumentTree,
        page: &str,
        anchor: Option<NodeId>,
        annotations: &[Annotation],
    ) -> Result<PlacementReport, ApparatusError> {
        let mut report = PlacementReport::new();
        let Some(anchor) = anchor else {
            self.fail_all(&mut report, page, annotations)?;
            return Ok(report);
        };

        let mut ordered = annotations.to_vec();
        placement_order(&mut ordered);
        for annotation in &ordered {
            let AnnotationBody::Commentary { note } = &annotation.body else {
                report.diagnostics.push(PlacementDiagnostic::malformed(format!(
                    "{} queued as a footnote on page {page}",
                    annotation.kind()
                )));
                continue;
            };
            let pattern = LabelPattern::literal(&annotation.label);
            let cursor = self.page_cursor(tree, anchor).with_leading_head(tree);
            let search = Placer::search(tree, cursor, &pattern, |_, _| false);
            let Some(at) = search.found else {
                self.fail(&mut report, annotation, search.last_position)?;
                continue;
            };
            let pieces = markup::commentary(tree, &self.config, annotation.sequence, note);
            splice(tree, &at, &pieces, &self.splice_options)?;
            report.record_placed(AnnotationKind::Commentary);
        }

        let stats = report.stats(AnnotationKind::Commentary);
        tracing::info!(
            "Page {page}: placed {} of {} footnotes",
            stats.placed,
            stats.total
        );
        Ok(report)
    }

    /// Wrap apparatus lemmas in `<app>`. Entries are taken in input order; each search continues
    /// behind the previous insertion, and restarts from the page anchor when the ordinal goes down.
    /// A failed search leaves the position where it was.
    pub fn place_apparatus(
        &self,
        tree: &mut DocumentTree,
        page: &str,
        annotations: &[Annotation],
    ) -> Result<PlacementReport, ApparatusError> {
        let anchor = self.page_anchor(tree, page);
        self.apparatus_on_page(tree, page, anchor, annotations)
    }

    #[tracing::instrument(skip_all)]
    fn apparatus_on_page(
        &self,
        tree: &mut DocumentTree,
        page: &str,
        anchor: Option<NodeId>,
        annotations: &[Annotation],
    ) -> Result<PlacementReport, ApparatusError> {
        let mut report = PlacementReport::new();
        let Some(anchor) = anchor else {
            self.fail_all(&mut report, page, annotations)?;
            return Ok(report);
        };

        let mut ordered = annotations.to_vec();
        ordered.sort_by_key(|a| a.sequence);
        let mut resume: Option<TextSlot> = None;
        let mut previous: Option<u32> = None;

        for annotation in &ordered {
            let AnnotationBody::Critical(entry) = &annotation.body else {
                report.diagnostics.push(PlacementDiagnostic::malformed(format!(
                    "{} queued as a critical app entry on page {page}",
                    annotation.kind()
                )));
                continue;
            };
            if let Some(prev) = previous.filter(|prev| entry.ordinal < *prev) {
                tracing::debug!("Ordinal {} after {prev}, restarting page {page}", entry.ordinal);
                report
                    .diagnostics
                    .push(PlacementDiagnostic::ordinal_drop(page, prev, entry.ordinal));
                resume = None;
            }
            previous = Some(entry.ordinal);

            let pattern = LabelPattern::compile(&annotation.label, &self.patterns);
            let cursor = match resume {
                Some(slot) => self.resumed_cursor(tree, anchor, slot),
                None => self.page_cursor(tree, anchor),
            };
            let search = Placer::search(tree, cursor, &pattern, |_, _| false);
            let Some(mut at) = search.found else {
                self.fail(&mut report, annotation, search.last_position)?;
                continue;
            };

            let matched = &tree.field(at.node, at.field)[at.start..at.end];
            at.end = at.start + markup::lemma_extent(matched, &annotation.label);
            let lemma_text = tree.field(at.node, at.field)[at.start..at.end].to_string();
            let app = markup::critical(tree, &self.config, entry, &lemma_text)?;
            let outcome = splice(tree, &at, &[Piece::Node(app)], &self.splice_options)?;
            resume = Some(outcome.after_owner);
            report.record_placed(AnnotationKind::CriticalReading);
        }

        let stats = report.stats(AnnotationKind::CriticalReading);
        tracing::info!(
            "Page {page}: placed {} of {} critical app entries",
            stats.placed,
            stats.total
        );
        Ok(report)
    }

    /// Comments, then footnotes, then the critical apparatus, each page in ascending order.
    /// Page anchors are indexed once per pass; splicing never adds or moves one.
    pub fn place_all(
        &self,
        tree: &mut DocumentTree,
        queue: &AnnotationQueue,
    ) -> Result<PlacementReport, ApparatusError> {
        let mut report = PlacementReport::new();
        type Pass = fn(
            &Placer,
            &mut DocumentTree,
            &str,
            Option<NodeId>,
            &[Annotation],
        ) -> Result<PlacementReport, ApparatusError>;
        let passes: [(&BTreeMap<String, Vec<Annotation>>, Pass); 3] = [
            (&queue.comments, Placer::comments_on_page),
            (&queue.footnotes, Placer::footnotes_on_page),
            (&queue.apparatus, Placer::apparatus_on_page),
        ];
        for (pages, place) in passes {
            if pages.is_empty() {
                continue;
            }
            let index = tree.page_anchors(&self.config.page_anchor);
            let mut ordered = pages.iter().collect::<Vec<_>>();
            ordered.sort_by(|(a, _), (b, _)| page_order(a, b));
            for (page, annotations) in ordered {
                report.merge(place(self, tree, page, index.get(page), annotations)?);
            }
        }
        for line in report.summary() {
            tracing::info!("{line}");
        }
        Ok(report)
    }
}
