use serde::{Deserialize, Serialize};
use std::fmt;

use crate::placement::PlacementDiagnostic;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentStyle {
    #[default]
    Plain,
    Italic,
}

/// One styled run of an apparatus line. Italic runs carry witness citations and editorial
/// remarks; plain runs carry the text of the lemma and of the readings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    #[serde(default)]
    pub style: SegmentStyle,
    pub text: String,
}

impl Segment {
    pub fn plain(text: impl Into<String>) -> Segment {
        Segment {
            style: SegmentStyle::Plain,
            text: text.into(),
        }
    }

    pub fn italic(text: impl Into<String>) -> Segment {
        Segment {
            style: SegmentStyle::Italic,
            text: text.into(),
        }
    }

    pub fn is_italic(&self) -> bool {
        self.style == SegmentStyle::Italic
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.style {
            SegmentStyle::Plain => write!(f, "{}", self.text),
            SegmentStyle::Italic => write!(f, "_{}_", self.text),
        }
    }
}

/// An apparatus line split into `ordinal lemma-side ] reading-side`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntry {
    pub ordinal: u32,
    pub lemma: Vec<Segment>,
    pub readings: Vec<Segment>,
}

fn render(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Cut every segment at `]` so that the separator stands alone.
fn isolate_separators(segments: &[Segment]) -> Vec<Segment> {
    let mut out = vec![];
    for segment in segments {
        let mut rest = segment.text.as_str();
        while let Some(at) = rest.find(']') {
            if !rest[..at].trim().is_empty() {
                out.push(Segment {
                    style: segment.style,
                    text: rest[..at].to_string(),
                });
            }
            out.push(Segment::plain("]"));
            rest = &rest[at + 1..];
        }
        if !rest.is_empty() {
            out.push(Segment {
                style: segment.style,
                text: rest.to_string(),
            });
        }
    }
    out
}

impl RawEntry {
    pub fn from_segments(segments: &[Segment]) -> Result<RawEntry, PlacementDiagnostic> {
        let malformed =
            |reason: &str| PlacementDiagnostic::malformed(format!("{reason}: {}", render(segments)));

        let mut parts = isolate_separators(segments);
        let Some(first) = parts.first() else {
            return Err(malformed("empty apparatus line"));
        };

        // the ordinal is usually its own run but may be glued to the start of the lemma
        let head = first.text.trim().to_string();
        let (ordinal, glued) = match head.split_once(char::is_whitespace) {
            Some((number, rest)) => (number.to_string(), Some(rest.trim().to_string())),
            None => (head, None),
        };
        let ordinal = match ordinal.parse::<u32>() {
            Ok(ordinal) => ordinal,
            Err(_) => return Err(malformed("apparatus line does not start with a number")),
        };
        let style = first.style;
        parts.remove(0);
        if let Some(rest) = glued.filter(|r| !r.is_empty()) {
            parts.insert(0, Segment { style, text: rest });
        }

        let Some(split) = parts.iter().position(|p| p.text.trim() == "]") else {
            return Err(malformed("no ] in apparatus line"));
        };

        let lemma = parts[..split]
            .iter()
            .map(|p| Segment {
                style: p.style,
                text: p.text.trim().to_string(),
            })
            .filter(|p| !p.text.is_empty())
            .collect::<Vec<_>>();
        let mut readings = parts[split + 1..]
            .iter()
            .filter(|p| !p.text.is_empty())
            .cloned()
            .collect::<Vec<_>>();
        if let Some(first) = readings.first_mut() {
            first.text = first.text.trim_start().to_string();
        }
        if let Some(last) = readings.last_mut() {
            last.text = last.text.trim_end().to_string();
        }
        readings.retain(|p| !p.text.is_empty());

        if lemma.is_empty() {
            return Err(malformed("no lemma in apparatus line"));
        }
        if readings.is_empty() {
            return Err(malformed("no reading in apparatus line"));
        }

        Ok(RawEntry {
            ordinal,
            lemma,
            readings,
        })
    }
}

fn is_lone_punctuation(text: &str) -> bool {
    matches!(text, "," | "." | ", " | ". ")
}

/// Remove a single space in front of `,` and `.`.
fn tighten_punctuation(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ' ' && matches!(chars.peek(), Some(',') | Some('.')) {
            continue;
        }
        out.push(c);
    }
    out
}

/// Exactly one space after every `,` and `.`.
fn space_punctuation(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 4);
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        out.push(c);
        if c == ',' || c == '.' {
            while chars.peek() == Some(&' ') {
                chars.next();
            }
            out.push(' ');
        }
    }
    out
}

/// Glue together runs that a word processor split apart.
///
/// Italic runs separated by a lone space or a lone `,`/`.` become one italic run, consecutive plain
/// runs are joined with a space, a `, ` opening a plain run after an italic one moves into the
/// italic run, spacing after `,` and `.` is normalised, and a trailing blank run is dropped.
pub fn repair_italics(segments: &[Segment]) -> Vec<Segment> {
    let Some(first) = segments.first() else {
        return vec![];
    };
    let mut repaired = vec![];
    let mut current = first.clone();

    for (i, segment) in segments.iter().enumerate().skip(1) {
        let next_is_italic = segments.get(i + 1).is_some_and(Segment::is_italic);
        if current.is_italic() && !segment.is_italic() && segment.text == " " && next_is_italic {
            current.text.push(' ');
        } else if segment.is_italic() || is_lone_punctuation(&segment.text) {
            if current.is_italic() {
                current.text = tighten_punctuation(&format!("{} {}", current.text, segment.text));
            } else {
                repaired.push(std::mem::replace(&mut current, segment.clone()));
            }
        } else if current.is_italic() {
            let mut segment = segment.clone();
            if let Some(rest) = segment.text.strip_prefix(", ") {
                current.text.push_str(", ");
                segment.text = rest.to_string();
            }
            repaired.push(std::mem::replace(&mut current, segment));
        } else {
            current.text = format!("{} {}", current.text, segment.text);
        }
    }
    repaired.push(current);

    for segment in repaired.iter_mut() {
        segment.text = space_punctuation(&segment.text);
    }
    if repaired.last().is_some_and(|s| s.text.trim().is_empty()) {
        repaired.pop();
    }
    repaired
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_split_with_separate_ordinal() {
        let raw = RawEntry::from_segments(&[
            Segment::plain("12"),
            Segment::plain(" fidem "),
            Segment::plain("] "),
            Segment::plain("fide"),
            Segment::italic("W"),
        ])
        .unwrap();
        assert_eq!(raw.ordinal, 12);
        assert_eq!(raw.lemma, vec![Segment::plain("fidem")]);
        assert_eq!(
            raw.readings,
            vec![Segment::plain("fide"), Segment::italic("W")]
        );
    }

    #[test]
    fn test_split_with_glued_ordinal_and_inline_bracket() {
        let raw = RawEntry::from_segments(&[
            Segment::plain("3 světa] "),
            Segment::plain("světu "),
            Segment::italic("Sr, St"),
        ])
        .unwrap();
        assert_eq!(raw.ordinal, 3);
        assert_eq!(raw.lemma, vec![Segment::plain("světa")]);
        assert_eq!(raw.readings[0], Segment::plain("světu "));
    }

    #[test]
    fn test_malformed_lines() {
        let cases: Vec<Vec<Segment>> = vec![
            vec![],
            vec![Segment::plain("fidem ] fide")],
            vec![Segment::plain("12 fidem fide")],
            vec![Segment::plain("12 fidem ]")],
            vec![Segment::plain("12 ] fide")],
        ];
        for segments in cases {
            let err = RawEntry::from_segments(&segments).unwrap_err();
            assert!(err.is_malformed(), "{err}");
        }
    }

    #[test]
    fn test_repair_italics() {
        let repaired = repair_italics(&[
            Segment::italic("vynech."),
            Segment::plain(" "),
            Segment::italic("ve W"),
            Segment::plain(","),
            Segment::italic("Sr"),
        ]);
        assert_eq!(repaired, vec![Segment::italic("vynech. ve W, Sr")]);

        let repaired = repair_italics(&[
            Segment::plain("fide"),
            Segment::plain("m"),
            Segment::italic("W"),
            Segment::plain(", lumine"),
            Segment::italic("St"),
            Segment::plain(" "),
        ]);
        assert_eq!(
            repaired,
            vec![
                Segment::plain("fide m"),
                Segment::italic("W, "),
                Segment::plain("lumine"),
                Segment::italic("St"),
            ]
        );
        assert!(repair_italics(&[]).is_empty());
    }
}
