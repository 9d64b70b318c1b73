//! Reading-side grammars.
//!
//! A reading side with more than one run alternates plain text (the variant) with italic citations
//! (its witnesses). Editors use two layouts, tried in this order:
//!
//! 1. [`text_then_sigla`]: `fide` _W_ `fidei` _Sr, St_
//! 2. [`sigla_then_text`]: _W_ `fide` _Sr, St_ `fidei`
//!
//! Each grammar is a pure function from runs to readings, returning `None` when the runs do not
//! fit its layout.

use super::{
    citation::{Citation, Role},
    entry::{Segment, SegmentStyle},
    Reading, Reconciler,
};

pub type ReadingGrammar = fn(&Reconciler, &[Segment]) -> Option<Vec<Reading>>;

pub const READING_GRAMMARS: [(&str, ReadingGrammar); 2] = [
    ("text_then_sigla", text_then_sigla),
    ("sigla_then_text", sigla_then_text),
];

/// Runs alternate in style and there are as many plain runs as italic ones.
pub fn is_regular_alternation(segments: &[Segment]) -> bool {
    let alternates = segments.windows(2).all(|pair| pair[0].style != pair[1].style);
    let italic = segments.iter().filter(|s| s.is_italic()).count();
    alternates && italic * 2 == segments.len()
}

fn pairs(
    reconciler: &Reconciler,
    segments: &[Segment],
    first: SegmentStyle,
    text_index: usize,
) -> Option<Vec<Reading>> {
    if segments.first()?.style != first || !is_regular_alternation(segments) {
        return None;
    }
    Some(
        segments
            .chunks(2)
            .map(|pair| {
                let text = pair[text_index].text.trim();
                let citation = pair[1 - text_index].text.trim();
                Reading {
                    text: text.to_string(),
                    witnesses: reconciler.parse_citation(citation, Role::Reading),
                }
            })
            .collect(),
    )
}

pub fn text_then_sigla(reconciler: &Reconciler, segments: &[Segment]) -> Option<Vec<Reading>> {
    pairs(reconciler, segments, SegmentStyle::Plain, 0)
}

pub fn sigla_then_text(reconciler: &Reconciler, segments: &[Segment]) -> Option<Vec<Reading>> {
    pairs(reconciler, segments, SegmentStyle::Italic, 1)
}

/// The verbatim fallback: every run, joined with `" | "`.
pub fn unparsed(segments: &[Segment]) -> Reading {
    let raw = segments
        .iter()
        .map(|s| s.text.trim())
        .collect::<Vec<_>>()
        .join(" | ");
    Reading {
        text: raw.clone(),
        witnesses: Citation::Unparsed(raw),
    }
}
