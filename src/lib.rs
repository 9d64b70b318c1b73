//! # apparatus-core
//!
//! Places comments, footnotes and critical-apparatus entries into the text of a TEI critical
//! edition.
//!
//! ## Overview
//!
//! Editors record annotations against the printed page, not against the electronic text: a comment
//! is a label ("Augustinus") plus a note, an apparatus entry is an ordinal, a lemma and the variant
//! readings of other witnesses. apparatus-core finds where each of them belongs in an
//! already-built document tree and splices the markup in at that exact character offset.
//!
//! ### Key Features
//!
//! - **Tolerant label matching**: diacritics, re-wrapped whitespace, page-break tokens and ellipses
//!   inside a label do not prevent a match
//! - **Page-scoped, resumable search**: each page's annotations are looked for between its page
//!   anchor and the next one
//! - **In-place splicing**: text around the match is preserved; styled runs are split by cloning
//! - **Witness citation parsing**: free-text sigla lists become structured references, with an
//!   explicit "unparsed" fallback instead of guessing
//! - **Failure side channel**: anything that cannot be placed is kept as a markup fragment for an
//!   editor to merge by hand
//!
//! ## Architecture
//!
//! - **[`pattern`]**: label → [`pattern::LabelPattern`]
//! - **[`tree`]**: [`tree::DocumentTree`], the [`tree::TreeCursor`] walk and the [`tree::splice`]
//!   primitive
//! - **[`apparatus`]**: apparatus lines → [`apparatus::ApparatusEntry`] via the
//!   [`apparatus::Reconciler`]
//! - **[`placement`]**: the [`placement::Placer`] driving search and splice per annotation kind
//! - **[`audit`]**: post-placement checks
//! - **[`config`]**: per-document [`config::EditionConfig`]
//!
//! ## Quick Start
//!
//! ```rust
//! use apparatus_core::{
//!     apparatus::Reconciler,
//!     config::EditionConfig,
//!     placement::{AnnotationQueue, Placer, QueueRecords},
//!     tree::DocumentTree,
//! };
//!
//! # fn main() -> Result<(), apparatus_core::ApparatusError> {
//! let mut tree = DocumentTree::from_xml(
//!     r#"<body><p><pb n="7" ed="DJAK03"/>sicut ait Augustinus...</p></body>"#,
//! )?;
//! let records = QueueRecords::from_toml_str(
//!     r#"
//!     [[comments]]
//!     page = 7
//!     label = "Augustinus"
//!     note = "cf. note"
//!     "#,
//! )?;
//!
//! let config = EditionConfig::default();
//! let reconciler = Reconciler::new(&config)?;
//! let (queue, _diagnostics) = AnnotationQueue::build(&records, &reconciler, false);
//! let report = Placer::new(&config).place_all(&mut tree, &queue)?;
//!
//! assert!(report.failures.is_empty());
//! assert!(tree.to_xml()?.contains(r#"<anchor xml:id="djak3.a-1"/>Augustinus<app"#));
//! # Ok(())
//! # }
//! ```
//!
//! ## Diagnostics
//!
//! Nothing short of an I/O or tree-integrity error stops a run. Unmatched labels, malformed
//! apparatus lines, unreadable witness citations and ordinal drops are collected as
//! [`placement::PlacementDiagnostic`]s in the [`placement::PlacementReport`], together with
//! per-kind counts.

pub mod apparatus;
pub mod audit;
pub mod config;
pub mod error;
pub mod pattern;
pub mod placement;
#[cfg(test)]
mod tests;
pub mod tree;

pub use error::*;
