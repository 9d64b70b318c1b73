//! Label patterns.
//!
//! Editors record the position of an annotation by quoting a few words of the text ("label"). The
//! quotation is noisy: accents get dropped or added, the transcription re-wraps lines and inserts
//! page-break tokens mid-word, long passages are elided with `...`, and Latin passages carry
//! explicit language delimiters. [`LabelPattern::compile`] turns such a label into a regex that
//! tolerates all of that, and matches against *folded* text (see [`fold_diacritics`]) while
//! reporting offsets into the original, unfolded text.

use regex::Regex;
use std::ops::Range;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Trailing punctuation tolerated after the last label character.
const TRAILING_PUNCTUATION: &str = "[,.:;?!]";
/// Opening quote marks tolerated before the first label character.
const LEADING_QUOTES: &str = "[„\"]?";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternOptions {
    /// Regex for a page-break token that may appear anywhere inside the matched text
    pub page_break_token: String,
    /// Language tags kept as literal anchors: `LAT` keeps `<LAT>` and `</LAT>`
    pub language_delimiters: Vec<String>,
}

impl Default for PatternOptions {
    fn default() -> Self {
        PatternOptions {
            page_break_token: r"\|?<PO_\d+>".to_string(),
            language_delimiters: vec!["LAT".to_string()],
        }
    }
}

/// Text with diacritics removed, plus the way back to the original byte offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldedText {
    folded: String,
    /// `offsets[i]` is the original byte offset of the character that produced folded byte `i`;
    /// the final entry maps `folded.len()` to the original length.
    offsets: Vec<usize>,
    lossy: bool,
}

impl FoldedText {
    pub fn as_str(&self) -> &str {
        &self.folded
    }

    /// Whether some letter did not fold to exactly one character.
    pub fn is_lossy(&self) -> bool {
        self.lossy
    }

    /// Original byte offset for a folded byte offset.
    pub fn original_offset(&self, folded: usize) -> usize {
        self.offsets[folded.min(self.offsets.len() - 1)]
    }

    /// Smallest folded offset whose original offset is at or after `original`.
    pub fn folded_offset(&self, original: usize) -> usize {
        self.offsets.partition_point(|o| *o < original)
    }

    pub fn original_range(&self, folded: Range<usize>) -> Range<usize> {
        self.original_offset(folded.start)..self.original_offset(folded.end)
    }
}

fn keeps_accents(c: char) -> bool {
    // Greek is quoted with its accents intact
    matches!(c, '\u{0370}'..='\u{03FF}' | '\u{1F00}'..='\u{1FFF}')
}

/// ASCII base letter of `c` under canonical decomposition, if it has exactly one.
fn canonical_base(c: char) -> Option<char> {
    let mut bases = c.nfd().filter(|d| !is_combining_mark(*d));
    match (bases.next(), bases.next()) {
        (Some(base), None) if base.is_ascii() => Some(base),
        _ => None,
    }
}

/// Fold each character to its base letters, dropping combining marks. Case is kept.
///
/// Letters without a single canonical base (`æ`, `œ`, `ø`, `ł`, `ß`) are transliterated, so `cælum`
/// folds to `caelum`. Punctuation and symbols are left alone. The result is lossy when a letter
/// folds to more or fewer than one character, or cannot be transliterated at all.
pub fn fold_diacritics(text: &str) -> FoldedText {
    let mut folded = String::with_capacity(text.len());
    let mut offsets = Vec::with_capacity(text.len() + 1);
    let mut lossy = false;
    let mut buf = [0u8; 4];

    let mut push = |folded: &mut String, start: usize, out: &str| {
        offsets.extend(std::iter::repeat(start).take(out.len()));
        folded.push_str(out);
    };

    for (start, c) in text.char_indices() {
        if c.is_ascii() || keeps_accents(c) {
            push(&mut folded, start, c.encode_utf8(&mut buf));
        } else if is_combining_mark(c) {
            // a lone combining mark folds away entirely
        } else if let Some(base) = canonical_base(c) {
            push(&mut folded, start, base.encode_utf8(&mut buf));
        } else if !c.is_alphabetic() {
            push(&mut folded, start, c.encode_utf8(&mut buf));
        } else {
            match deunicode::deunicode_char(c) {
                Some(out) => {
                    lossy |= out.chars().count() != 1;
                    push(&mut folded, start, out);
                }
                None => {
                    lossy = true;
                    push(&mut folded, start, c.encode_utf8(&mut buf));
                }
            }
        }
    }
    offsets.push(text.len());

    FoldedText {
        folded,
        offsets,
        lossy,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Part {
    Literal(String),
    /// Elided text; `word_end` when the ellipsis was glued to the preceding word
    Wildcard { word_end: bool },
    Delimiter(String),
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Split a folded label into literal text, ellipsis wildcards and language delimiters.
fn tokenize(label: &str, delimiters: &[String]) -> Vec<Part> {
    let tags = delimiters
        .iter()
        .flat_map(|d| [format!("<{d}>"), format!("</{d}>")])
        .collect::<Vec<_>>();
    let chars = label.char_indices().collect::<Vec<_>>();
    let mut parts = vec![];
    let mut literal = String::new();
    let mut i = 0;

    while i < chars.len() {
        let (at, c) = chars[i];
        if c == '<' {
            if let Some(tag) = tags.iter().find(|t| label[at..].starts_with(t.as_str())) {
                if !literal.is_empty() {
                    parts.push(Part::Literal(std::mem::take(&mut literal)));
                }
                parts.push(Part::Delimiter(tag.clone()));
                i += tag.chars().count();
                continue;
            }
        }
        if c == '.' {
            let mut periods = 0;
            let mut last_period = i;
            let mut j = i;
            while j < chars.len() && (chars[j].1 == '.' || chars[j].1 == ' ') {
                if chars[j].1 == '.' {
                    periods += 1;
                    last_period = j;
                }
                j += 1;
            }
            if periods >= 2 {
                let word_end = i > 0 && is_word_char(chars[i - 1].1);
                if !literal.is_empty() {
                    parts.push(Part::Literal(std::mem::take(&mut literal)));
                }
                parts.push(Part::Wildcard { word_end });
                // swallow spaces trailing the run
                i = last_period + 1;
                while i < chars.len() && chars[i].1 == ' ' {
                    i += 1;
                }
                continue;
            }
        }
        if !c.is_whitespace() {
            literal.push(c);
        }
        i += 1;
    }
    if !literal.is_empty() {
        parts.push(Part::Literal(literal));
    }
    parts
}

#[derive(Debug, Clone)]
enum Matcher {
    Regex(Regex),
    /// The label reduced to nothing; never matches.
    Impossible,
}

/// A compiled, stateless matcher for one label.
#[derive(Debug, Clone)]
pub struct LabelPattern {
    label: String,
    matcher: Matcher,
}

impl LabelPattern {
    /// Compile a label. Never fails: a label with no searchable characters yields a pattern that
    /// matches nothing.
    pub fn compile(label: &str, options: &PatternOptions) -> LabelPattern {
        let cleaned = label.trim().replace('\u{AD}', "");
        let folded = fold_diacritics(&cleaned);
        if folded.is_lossy() {
            tracing::warn!("Diacritic folding of label '{label}' is lossy");
        }
        let normalised = folded
            .as_str()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .replace('…', "...");

        let parts = tokenize(&normalised, &options.language_delimiters);
        if !parts.iter().any(|p| matches!(p, Part::Literal(_))) {
            tracing::debug!("Label '{label}' has nothing to search for");
            return LabelPattern::impossible(label);
        }

        let joiner = format!(r"(?:\s|{})*", options.page_break_token);
        let mut body = vec![];
        for part in &parts {
            body.push(match part {
                Part::Literal(text) => text
                    .chars()
                    .map(|c| regex::escape(c.encode_utf8(&mut [0u8; 4])))
                    .collect::<Vec<_>>()
                    .join(&joiner),
                Part::Wildcard { word_end: true } => r"\b.*?".to_string(),
                Part::Wildcard { word_end: false } => ".*?".to_string(),
                Part::Delimiter(tag) => regex::escape(tag),
            });
        }

        let last_literal_char = parts.iter().rev().find_map(|p| match p {
            Part::Literal(text) => text.chars().last(),
            _ => None,
        });
        let trailing = if parts.last().is_some_and(|p| matches!(p, Part::Literal(_)))
            && last_literal_char.is_some_and(is_word_char)
        {
            format!(r"\b(?:{TRAILING_PUNCTUATION}\b)?")
        } else {
            format!("{TRAILING_PUNCTUATION}?")
        };

        match parts.last() {
            Some(Part::Delimiter(tag)) if tag.starts_with("</") => {
                let closing = body.pop().unwrap_or_default();
                body.push(trailing);
                body.push(closing);
            }
            _ => body.push(trailing),
        }
        match parts.first() {
            Some(Part::Delimiter(tag)) if !tag.starts_with("</") => {
                body.insert(1, LEADING_QUOTES.to_string());
            }
            _ => body.insert(0, LEADING_QUOTES.to_string()),
        }

        let leading_boundary = if normalised.chars().next().is_some_and(is_word_char) {
            r"\b"
        } else {
            ""
        };
        let source = format!("(?i){leading_boundary}{}", body.concat());
        match Regex::new(&source) {
            Ok(regex) => LabelPattern {
                label: label.to_string(),
                matcher: Matcher::Regex(regex),
            },
            Err(e) => {
                tracing::warn!("Label '{label}' compiled to an invalid pattern: {e}");
                LabelPattern::impossible(label)
            }
        }
    }

    /// Matches an exact token, such as a footnote marker.
    pub fn literal(token: &str) -> LabelPattern {
        if token.is_empty() {
            return LabelPattern::impossible(token);
        }
        match Regex::new(&regex::escape(token)) {
            Ok(regex) => LabelPattern {
                label: token.to_string(),
                matcher: Matcher::Regex(regex),
            },
            Err(_) => LabelPattern::impossible(token),
        }
    }

    pub fn impossible(label: &str) -> LabelPattern {
        LabelPattern {
            label: label.to_string(),
            matcher: Matcher::Impossible,
        }
    }

    pub fn is_impossible(&self) -> bool {
        matches!(self.matcher, Matcher::Impossible)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn as_regex_str(&self) -> Option<&str> {
        match &self.matcher {
            Matcher::Regex(regex) => Some(regex.as_str()),
            Matcher::Impossible => None,
        }
    }

    /// First match in `haystack`, as a byte range into `haystack` itself.
    pub fn find(&self, haystack: &str) -> Option<Range<usize>> {
        self.find_from(haystack, 0)
    }

    /// First match starting at or after byte offset `from` of `haystack`.
    pub fn find_from(&self, haystack: &str, from: usize) -> Option<Range<usize>> {
        let Matcher::Regex(regex) = &self.matcher else {
            return None;
        };
        if from > haystack.len() {
            return None;
        }
        let folded = fold_diacritics(haystack);
        let start = folded.folded_offset(from);
        regex
            .find_at(folded.as_str(), start)
            .map(|m| folded.original_range(m.range()))
    }
}
