//! Annotation placement.
//!
//! For every page, queued annotations are searched for in the text following the page's anchor
//! and spliced in at the first acceptable occurrence:
//!
//! - **comments** (glosses) become `<anchor/>` + matched text + `<app>` with a gloss note;
//! - **footnotes** replace their marker token with `<anchor/>` + a commentary note;
//! - **critical apparatus** entries wrap the lemma in `<app><lem/><rdg/>…</app>`.
//!
//! Whatever cannot be placed is kept as a [`FailureRecord`] with a markup fragment for manual
//! merging; nothing is dropped and nothing aborts the run.

mod annotation;
mod driver;
pub mod markup;
mod report;

pub use annotation::{
    page_order, placement_order, Annotation, AnnotationBody, AnnotationKind, AnnotationQueue,
    ApparatusRecord, CommentRecord, FootnoteRecord, QueueRecords,
};
pub use driver::Placer;
pub use report::{FailureRecord, KindStats, PlacementDiagnostic, PlacementReport};
