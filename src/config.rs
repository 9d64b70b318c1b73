//! Per-document configuration.
//!
//! Every table the reconciliation needs (sigla keywords, default witnesses, markup id templates,
//! which tags are page anchors or styled runs) travels in an [`EditionConfig`] that callers pass
//! explicitly, so two documents can be processed side by side with different tables.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::read_to_string,
    path::Path,
};

use crate::{error::ApparatusError, pattern::PatternOptions, tree::AnchorKind};

/// Witness tables for the documents of the edition, keyed by two-digit document number.
const BUILTIN_EDITIONS: &str = include_str!("../config/editions.toml");

static BUILTIN_REGISTRY: Lazy<Result<BuiltinRegistry, ApparatusError>> =
    Lazy::new(|| toml::from_str::<BuiltinRegistry>(BUILTIN_EDITIONS).map_err(ApparatusError::from));

/// Group letter assignment used when the apparatus was recorded once per witness group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessGroup {
    /// Siglum id attributed to every lemma of the group
    pub lemma: String,
    /// Siglum id attributed to every reading of the group
    pub reading: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditionConfig {
    /// Document number this configuration was loaded for, if any
    pub document: Option<String>,
    /// Apparatus keyword -> canonical siglum id
    pub sigla: BTreeMap<String, String>,
    /// Siglum of the edition itself; the implicit witness of every lemma
    pub edition_witness: String,
    /// Siglum an unlabelled reading is attributed to
    pub base_witness: String,
    /// Phrases editors use for placeholders ("omitted", "misprinted", "illegible", ...)
    pub editorial_markers: Vec<String>,
    pub witness_groups: BTreeMap<String, WitnessGroup>,
    /// Anchors get the id `{id_prefix}{n}`
    pub id_prefix: String,
    pub page_anchor: AnchorKind,
    /// Tags whose head text is a styled run that gets split by cloning
    pub styled_run_tags: Vec<String>,
    /// Tags the search never descends into
    pub opaque_tags: Vec<String>,
    /// Regex for a page-break token tolerated anywhere inside a label match
    pub page_break_token: String,
    /// Language switch delimiters kept as literal anchors in labels (`LAT` -> `<LAT>`, `</LAT>`)
    pub language_delimiters: Vec<String>,
    /// Footnote marker template; `{}` is replaced with the footnote number
    pub footnote_marker: String,
}

impl Default for EditionConfig {
    fn default() -> Self {
        EditionConfig {
            document: None,
            sigla: BTreeMap::new(),
            edition_witness: "DJAK03".to_string(),
            base_witness: "DJAK03".to_string(),
            editorial_markers: [
                "celé vynech.",
                "vynech.",
                "vynech",
                "omylem tištěno",
                "omylem tíštěno",
                "tištěno",
                "omylem",
                "není",
                "nečitelné",
                "nezřetelné",
                "poškozená sazba",
                "viz výše",
            ]
            .iter()
            .map(|m| m.to_string())
            .collect(),
            witness_groups: BTreeMap::new(),
            id_prefix: "djak3.a-".to_string(),
            page_anchor: AnchorKind::default(),
            styled_run_tags: vec!["hi".to_string(), "foreign".to_string(), "add".to_string()],
            opaque_tags: vec!["app".to_string(), "note".to_string(), "anchor".to_string()],
            page_break_token: r"\|?<PO_\d+>".to_string(),
            language_delimiters: vec!["LAT".to_string()],
            footnote_marker: "<FN_{}>".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BuiltinEdition {
    base_witness: String,
    sigla: BTreeMap<String, String>,
    #[serde(default)]
    witness_groups: BTreeMap<String, WitnessGroup>,
}

#[derive(Debug, Deserialize)]
struct BuiltinRegistry {
    documents: BTreeMap<String, BuiltinEdition>,
}

impl EditionConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ApparatusError> {
        let config: EditionConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ApparatusError> {
        tracing::debug!("Reading edition config from {:?}", path.as_ref());
        EditionConfig::from_toml_str(&read_to_string(path)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ApparatusError> {
        Ok(toml::to_string(self)?)
    }

    /// Configuration for one of the built-in documents (`"01"` through `"10"`).
    pub fn builtin(document: &str) -> Result<Self, ApparatusError> {
        let registry = BUILTIN_REGISTRY.as_ref().map_err(Clone::clone)?;
        let edition = registry.documents.get(document).ok_or_else(|| {
            ApparatusError::NotFound(format!("no built-in witness table for document {document}"))
        })?;
        Ok(EditionConfig {
            document: Some(document.to_string()),
            sigla: edition.sigla.clone(),
            base_witness: edition.base_witness.clone(),
            witness_groups: edition.witness_groups.clone(),
            ..EditionConfig::default()
        })
    }

    /// Document numbers available through [`EditionConfig::builtin`].
    pub fn builtin_documents() -> Result<Vec<String>, ApparatusError> {
        let registry = BUILTIN_REGISTRY.as_ref().map_err(Clone::clone)?;
        Ok(registry.documents.keys().cloned().collect())
    }

    /// Checks the fields that are compiled into regexes later on.
    pub fn validate(&self) -> Result<(), ApparatusError> {
        Regex::new(&self.page_break_token)?;
        if !self.footnote_marker.contains("{}") {
            return Err(ApparatusError::Config(format!(
                "footnote_marker '{}' has no '{{}}' placeholder",
                self.footnote_marker
            )));
        }
        if self.edition_witness.is_empty() || self.base_witness.is_empty() {
            return Err(ApparatusError::Config(
                "edition_witness and base_witness must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn pattern_options(&self) -> PatternOptions {
        PatternOptions {
            page_break_token: self.page_break_token.clone(),
            language_delimiters: self.language_delimiters.clone(),
        }
    }

    pub fn anchor_id(&self, n: usize) -> String {
        format!("{}{n}", self.id_prefix)
    }

    pub fn anchor_ref(&self, n: usize) -> String {
        format!("#{}", self.anchor_id(n))
    }

    pub fn footnote_token(&self, number: &str) -> String {
        self.footnote_marker.replace("{}", number)
    }

    /// Canonical id for an apparatus keyword, if the keyword is a known siglum.
    pub fn siglum(&self, keyword: &str) -> Option<&str> {
        self.sigla.get(keyword).map(String::as_str)
    }

    /// Sigla keywords, longest first, so that `T1619` is tried before `T`.
    pub fn sigla_longest_first(&self) -> Vec<&str> {
        let mut keywords = self.sigla.keys().map(String::as_str).collect::<Vec<_>>();
        keywords.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));
        keywords
    }

    pub fn is_styled_run(&self, tag: &str) -> bool {
        self.styled_run_tags.iter().any(|t| t == tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_builtin_tables() {
        let config = EditionConfig::builtin("03").unwrap();
        assert_eq!(config.base_witness, "B");
        assert_eq!(config.siglum("S"), Some("St"));
        assert_eq!(config.edition_witness, "DJAK03");

        let grouped = EditionConfig::builtin("05").unwrap();
        assert_eq!(
            grouped.witness_groups.get("b"),
            Some(&WitnessGroup {
                lemma: "DJAK03".to_string(),
                reading: "RKP".to_string()
            })
        );

        assert!(matches!(
            EditionConfig::builtin("99"),
            Err(ApparatusError::NotFound(_))
        ));
        assert_eq!(EditionConfig::builtin_documents().unwrap().len(), 10);
    }

    #[test]
    fn test_sigla_longest_first() {
        let mut config = EditionConfig::default();
        for key in ["T", "T1619", "Sr", "S"] {
            config.sigla.insert(key.to_string(), key.to_string());
        }
        assert_eq!(config.sigla_longest_first(), vec!["T1619", "Sr", "S", "T"]);
    }

    #[test]
    fn test_toml_round_trip_and_validation() {
        let config = EditionConfig::builtin("01").unwrap();
        let text = config.to_toml_string().unwrap();
        assert_eq!(EditionConfig::from_toml_str(&text).unwrap(), config);

        let broken = "page_break_token = \"(unclosed\"\n";
        assert!(matches!(
            EditionConfig::from_toml_str(broken),
            Err(ApparatusError::Config(_))
        ));

        let partial = "base_witness = \"W\"\n[sigla]\nW = \"W\"\n";
        let config = EditionConfig::from_toml_str(partial).unwrap();
        assert_eq!(config.base_witness, "W");
        assert_eq!(config.footnote_token("4"), "<FN_4>");
        assert_eq!(config.anchor_ref(7), "#djak3.a-7");
    }
}
