//! arXiv identifier extraction.

use std::sync::LazyLock;

use regex::Regex;

/// Canonical abstract-page prefix on the preprint server.
pub(crate) const ABS_PREFIX: &str = "https://arxiv.org/abs/";

/// Modern (`2310.12345`) or legacy (`hep-th/9901001`) identifier.
static ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4}\.\d{4,5}|[a-z\-]+/\d{7})").expect("valid regex")
});

/// Find the first arXiv identifier anywhere in `raw`. Version suffixes
/// (`v2`) are not part of the match.
pub fn extract_preprint_id(raw: &str) -> Option<String> {
    ID_RE.find(raw).map(|m| m.as_str().to_string())
}

/// Canonical abstract-page URL for an identifier.
pub(crate) fn abstract_url(id: &str) -> String {
    format!("{ABS_PREFIX}{id}")
}
