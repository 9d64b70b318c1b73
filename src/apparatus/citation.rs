//! Witness citations.
//!
//! Editors cite witnesses by siglum in free text: `W, Sr a St`, `vynech. ve W`, `T1619 (omylem)`.
//! [`Reconciler::parse_citation`] pulls out the run of known sigla and keeps whatever surrounds it
//! as an [`EditorialNote`]. Text with neither sigla nor an editorial marker stays
//! [`Citation::Unparsed`].

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use super::Reconciler;
use crate::{config::EditionConfig, error::ApparatusError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Lemma,
    Reading,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessRef {
    /// Canonical siglum id
    pub siglum: String,
    /// The keyword as the editor wrote it. Empty for an implied witness.
    pub display: String,
    pub role: Role,
    /// Text between this reference and the next one (`", "`, `" a "`)
    #[serde(default)]
    pub separator: String,
}

impl WitnessRef {
    pub fn implied(siglum: &str, role: Role) -> WitnessRef {
        WitnessRef {
            siglum: siglum.to_string(),
            display: String::new(),
            role,
            separator: String::new(),
        }
    }

    pub fn is_implied(&self) -> bool {
        self.display.is_empty()
    }

    /// Value used in `wit` and `target` attributes.
    pub fn target(&self) -> String {
        format!("#{}", self.siglum)
    }
}

/// Editorial remark around a witness citation, such as "vynech. ve" before `W`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorialNote {
    pub before: String,
    pub after: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Citation {
    Witnesses {
        refs: Vec<WitnessRef>,
        note: Option<EditorialNote>,
    },
    /// Citation text that could not be read; kept verbatim for a human.
    Unparsed(String),
}

impl Citation {
    pub fn implied(siglum: &str, role: Role) -> Citation {
        Citation::Witnesses {
            refs: vec![WitnessRef::implied(siglum, role)],
            note: None,
        }
    }

    pub fn is_unparsed(&self) -> bool {
        matches!(self, Citation::Unparsed(_))
    }

    pub fn refs(&self) -> &[WitnessRef] {
        match self {
            Citation::Witnesses { refs, .. } => refs,
            Citation::Unparsed(_) => &[],
        }
    }

    pub fn note(&self) -> Option<&EditorialNote> {
        match self {
            Citation::Witnesses { note, .. } => note.as_ref(),
            Citation::Unparsed(_) => None,
        }
    }

    /// Space separated `#siglum` list for a `wit` attribute.
    pub fn wit_attribute(&self) -> String {
        match self {
            Citation::Witnesses { refs, .. } => refs
                .iter()
                .map(WitnessRef::target)
                .collect::<Vec<_>>()
                .join(" "),
            Citation::Unparsed(_) => "unparsed".to_string(),
        }
    }

    /// Put an implied witness in front of whatever was cited.
    pub fn with_leading(self, siglum: &str, role: Role) -> Citation {
        match self {
            Citation::Witnesses { mut refs, note } => {
                if !refs.iter().any(|r| r.siglum == siglum) {
                    refs.insert(0, WitnessRef::implied(siglum, role));
                }
                Citation::Witnesses { refs, note }
            }
            unparsed => unparsed,
        }
    }
}

/// Regexes compiled from one edition's sigla table.
#[derive(Debug, Clone)]
pub(crate) struct SiglaMatcher {
    /// `ve`/`v` glued to a siglum: "veW"
    glued: Option<Regex>,
    /// before, run of sigla, after
    run: Option<Regex>,
    token: Option<Regex>,
}

impl SiglaMatcher {
    pub(crate) fn new(config: &EditionConfig) -> Result<SiglaMatcher, ApparatusError> {
        let keywords = config.sigla_longest_first();
        if keywords.is_empty() {
            return Ok(SiglaMatcher {
                glued: None,
                run: None,
                token: None,
            });
        }
        let alternation = keywords
            .iter()
            .map(|k| regex::escape(k))
            .collect::<Vec<_>>()
            .join("|");
        let siglum = format!(r"\b(?:{alternation})\b");
        let separator = r"(?:\s*[,;]\s*|\s+a\s+|\s+)";
        Ok(SiglaMatcher {
            glued: Some(Regex::new(&format!(r"\b(ve?)({alternation})\b"))?),
            run: Some(Regex::new(&format!(
                r"(?s)^(.*?)({siglum}(?:{separator}{siglum})*)(.*)$"
            ))?),
            token: Some(Regex::new(&siglum)?),
        })
    }

    fn repair_glued(&self, text: &str) -> String {
        let repaired = match &self.glued {
            Some(glued) => glued
                .replace_all(text, |caps: &Captures| format!("{} {}", &caps[1], &caps[2]))
                .into_owned(),
            None => text.to_string(),
        };
        repaired.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

impl Reconciler {
    /// Read a witness citation. Never fails: unreadable text comes back as [`Citation::Unparsed`].
    pub fn parse_citation(&self, text: &str, role: Role) -> Citation {
        let text = self.sigla.repair_glued(text.trim());

        if let Some((before, run, after)) = self.sigla.run.as_ref().and_then(|re| {
            re.captures(&text)
                .and_then(|c| Some((c.get(1)?, c.get(2)?, c.get(3)?)))
                .map(|(b, r, a)| (b.as_str(), r.as_str(), a.as_str()))
        }) {
            let refs = self.split_run(run, role);
            let (before, after) = (before.trim(), after.trim());
            let note = if before.is_empty() && after.is_empty() {
                None
            } else {
                Some(EditorialNote {
                    before: before.to_string(),
                    after: after.to_string(),
                })
            };
            return Citation::Witnesses { refs, note };
        }

        if self.is_editorial(&text) {
            let implied = match role {
                Role::Lemma => &self.config.edition_witness,
                Role::Reading => &self.config.base_witness,
            };
            return Citation::Witnesses {
                refs: vec![WitnessRef::implied(implied, role)],
                note: Some(EditorialNote {
                    before: text,
                    after: String::new(),
                }),
            };
        }

        tracing::debug!("No witness found in citation '{text}'");
        Citation::Unparsed(text)
    }

    fn split_run(&self, run: &str, role: Role) -> Vec<WitnessRef> {
        let Some(token) = &self.sigla.token else {
            return vec![];
        };
        let found = token.find_iter(run).collect::<Vec<_>>();
        found
            .iter()
            .enumerate()
            .map(|(i, m)| {
                let separator = match found.get(i + 1) {
                    Some(next) => run[m.end()..next.start()].to_string(),
                    None => String::new(),
                };
                WitnessRef {
                    siglum: self
                        .config
                        .siglum(m.as_str())
                        .unwrap_or(m.as_str())
                        .to_string(),
                    display: m.as_str().to_string(),
                    role,
                    separator,
                }
            })
            .collect()
    }

    fn is_editorial(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        let bracketed = (lowered.starts_with('(') && lowered.ends_with(')'))
            || (lowered.starts_with('[') && lowered.ends_with(']'));
        bracketed
            || self
                .config
                .editorial_markers
                .iter()
                .any(|marker| lowered.contains(&marker.to_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::helpers::reconciler_with;
    use test_log::test;

    #[test]
    fn test_witness_list_in_order() {
        let reconciler = reconciler_with(&["W", "Sr", "St"], "St");
        let citation = reconciler.parse_citation("W, Sr a St", Role::Reading);
        let refs = citation.refs();
        assert_eq!(
            refs.iter().map(|r| r.siglum.as_str()).collect::<Vec<_>>(),
            vec!["W", "Sr", "St"]
        );
        assert!(refs.iter().all(|r| r.role == Role::Reading));
        assert_eq!(refs[0].separator, ", ");
        assert_eq!(refs[1].separator, " a ");
        assert_eq!(citation.note(), None);
        assert_eq!(citation.wit_attribute(), "#W #Sr #St");
    }

    #[test]
    fn test_unknown_text_is_unparsed() {
        let reconciler = reconciler_with(&["W", "Sr", "St"], "St");
        assert_eq!(
            reconciler.parse_citation("xyz123", Role::Reading),
            Citation::Unparsed("xyz123".to_string())
        );
    }

    #[test]
    fn test_longest_siglum_wins() {
        let reconciler = reconciler_with(&["T", "T1619"], "T1619");
        let citation = reconciler.parse_citation("T1619", Role::Reading);
        assert_eq!(citation.refs().len(), 1);
        assert_eq!(citation.refs()[0].siglum, "T1619");
    }

    #[test]
    fn test_editorial_notes() {
        let reconciler = reconciler_with(&["W", "Sr", "St"], "St");
        let citation = reconciler.parse_citation("vynech. veW", Role::Reading);
        assert_eq!(citation.refs()[0].display, "W");
        assert_eq!(
            citation.note(),
            Some(&EditorialNote {
                before: "vynech. ve".to_string(),
                after: String::new(),
            })
        );

        let citation = reconciler.parse_citation("Sr (omylem)", Role::Reading);
        assert_eq!(citation.note().unwrap().after, "(omylem)");

        // a marker without sigla is attributed to the base witness
        let citation = reconciler.parse_citation("poškozená sazba", Role::Reading);
        assert_eq!(citation.refs()[0].siglum, "St");
        assert!(citation.refs()[0].is_implied());
        assert_eq!(citation.note().unwrap().before, "poškozená sazba");
    }

    #[test]
    fn test_with_leading_edition_witness() {
        let reconciler = reconciler_with(&["W"], "W");
        let citation = reconciler
            .parse_citation("W", Role::Lemma)
            .with_leading("DJAK03", Role::Lemma);
        assert_eq!(citation.wit_attribute(), "#DJAK03 #W");
    }
}
