//! Shared test utilities for placement and reconciliation tests

use crate::{
    apparatus::Reconciler,
    config::EditionConfig,
    tree::{DocumentTree, NodeId},
};

/// Initialize logging for tests
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// Configuration whose sigla table maps each keyword to itself.
pub fn config_with(sigla: &[&str], base: &str) -> EditionConfig {
    let mut config = EditionConfig::default();
    for siglum in sigla {
        config.sigla.insert(siglum.to_string(), siglum.to_string());
    }
    config.base_witness = base.to_string();
    config
}

pub fn reconciler_with(sigla: &[&str], base: &str) -> Reconciler {
    Reconciler::new(&config_with(sigla, base)).expect("test sigla compile")
}

/// `<body><p><pb n="{page}" ed="DJAK03"/>{text}</p>…</body>`, one paragraph per page.
pub fn pages(pages: &[(&str, &str)]) -> DocumentTree {
    init_logging();
    let body = pages
        .iter()
        .map(|(page, text)| format!("<p><pb n=\"{page}\" ed=\"DJAK03\"/>{text}</p>"))
        .collect::<String>();
    DocumentTree::from_xml(&format!("<body>{body}</body>")).expect("test document parses")
}

/// Serialised body content, without the `<body>` wrapper.
pub fn body_xml(tree: &DocumentTree) -> String {
    let xml = tree.to_xml().expect("tree serialises");
    xml.trim_start_matches("<body>")
        .trim_end_matches("</body>")
        .to_string()
}

/// The node with the given tag whose attribute `name` has `value`.
pub fn find_by_attr(tree: &DocumentTree, tag: &str, name: &str, value: &str) -> Option<NodeId> {
    tree.find_all(tag)
        .into_iter()
        .find(|id| tree.attr(*id, name) == Some(value))
}
