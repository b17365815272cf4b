//! Source-URL trust policy.
//!
//! Candidate papers come back from the search stage with whatever link the
//! model found. Before a link is shown to the user it is checked against a
//! fixed domain policy: trusted academic hosts keep their (normalized) URL,
//! preprint links are rewritten to the canonical abstract page, and
//! everything else, including internal AI-vendor tooling links, is replaced by
//! a generic search for the paper title.
//!
//! [`normalize_url`] is pure and total: it never panics and always returns a
//! well-formed absolute URL.

mod preprint;

use tracing::trace;
use url::Url;

pub use preprint::extract_preprint_id;

/// Search engine used for the fallback link.
const SEARCH_ENDPOINT: &str = "https://www.google.com/search";

/// Placeholder the extraction service emits when it has no link.
const MISSING_URL_PLACEHOLDER: &str = "N/A";

/// The preprint server whose links are rewritten to abstract pages.
const PREPRINT_DOMAIN: &str = "arxiv.org";

/// Hosts belonging to the AI vendor's own tooling. Never shown to users.
const EXCLUDED_DOMAINS: &[&str] = &[
    "aistudio.google.com",
    "googleapis.com",
    "vertexaisearch.cloud.google.com",
];

/// Academic and source-hosting domains whose links are kept.
const TRUSTED_DOMAINS: &[&str] = &[
    "arxiv.org",
    "openreview.net",
    "nature.com",
    "science.org",
    "neurips.cc",
    "iclr.cc",
    "acm.org",
    "ieee.org",
    "cvf.com",
    "aclweb.org",
    "github.com",
    "huggingface.co",
];

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// How the policy treats a parsed URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trust {
    /// Internal tooling host; replaced by the search fallback.
    Excluded,
    /// Preprint server; rewritten to the canonical abstract page.
    Preprint,
    /// Whitelisted host; kept in normalized form.
    Trusted,
    /// Anything else; replaced by the search fallback.
    Untrusted,
}

/// Classify a parsed URL against the domain policy.
pub fn classify(url: &Url) -> Trust {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Trust::Untrusted;
    }

    let host = match url.host_str() {
        Some(h) => h.trim_end_matches('.').to_ascii_lowercase(),
        None => return Trust::Untrusted,
    };

    if EXCLUDED_DOMAINS.iter().any(|d| host_matches(&host, d)) {
        Trust::Excluded
    } else if host_matches(&host, PREPRINT_DOMAIN) {
        Trust::Preprint
    } else if TRUSTED_DOMAINS.iter().any(|d| host_matches(&host, d)) {
        Trust::Trusted
    } else {
        Trust::Untrusted
    }
}

/// `host` is `domain` itself or one of its subdomains.
fn host_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Generic search-engine URL for a paper title.
pub fn search_fallback_url(title: &str) -> String {
    match Url::parse_with_params(SEARCH_ENDPOINT, &[("q", title.trim())]) {
        Ok(url) => url.to_string(),
        // SEARCH_ENDPOINT is a constant absolute URL, so this arm is unreachable
        // in practice; keep the function total anyway.
        Err(_) => SEARCH_ENDPOINT.to_string(),
    }
}

/// Rewrite a candidate source URL according to the trust policy.
pub fn normalize_url(raw_url: &str, title: &str) -> String {
    let raw = raw_url.trim();
    if raw.is_empty() || raw == MISSING_URL_PLACEHOLDER {
        return search_fallback_url(title);
    }

    let url = match Url::parse(raw) {
        Ok(url) => url,
        Err(e) => {
            trace!(raw, error = %e, "unparseable candidate url");
            return search_fallback_url(title);
        }
    };

    match classify(&url) {
        Trust::Preprint => match extract_preprint_id(url.as_str()) {
            Some(id) => preprint::abstract_url(&id),
            None => search_fallback_url(title),
        },
        Trust::Trusted => canonical_form(&url),
        Trust::Excluded | Trust::Untrusted => {
            trace!(raw, "untrusted candidate url replaced by search fallback");
            search_fallback_url(title)
        }
    }
}

/// Normalize a trusted URL for deduplication (strip fragment and a trailing
/// slash on non-root paths).
fn canonical_form(url: &Url) -> String {
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    let mut s = normalized.to_string();
    if s.ends_with('/') && normalized.path() != "/" && normalized.query().is_none() {
        s.pop();
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    const TITLE: &str = "Sparse Mixture of Experts";

    fn fallback() -> String {
        search_fallback_url(TITLE)
    }

    #[test]
    fn fallback_is_well_formed() {
        let url = Url::parse(&fallback()).expect("fallback parses");
        assert_eq!(url.host_str(), Some("www.google.com"));
        assert_eq!(fallback(), "https://www.google.com/search?q=Sparse+Mixture+of+Experts");
    }

    #[test]
    fn empty_and_placeholder_fall_back() {
        assert_eq!(normalize_url("", TITLE), fallback());
        assert_eq!(normalize_url("  ", TITLE), fallback());
        assert_eq!(normalize_url("N/A", TITLE), fallback());
    }

    #[test]
    fn malformed_urls_fall_back() {
        for raw in ["not a url", "http://", "://arxiv.org", "arxiv.org/abs/2310.12345", "%%%"] {
            let out = normalize_url(raw, TITLE);
            assert_eq!(out, fallback(), "input {raw:?}");
            assert!(Url::parse(&out).is_ok());
        }
    }

    #[test]
    fn preprint_rewritten_to_abstract_page() {
        assert_eq!(
            normalize_url("https://arxiv.org/pdf/2310.12345v2.pdf", TITLE),
            "https://arxiv.org/abs/2310.12345"
        );
        assert_eq!(
            normalize_url("http://export.arxiv.org/abs/2310.12345", TITLE),
            "https://arxiv.org/abs/2310.12345"
        );
        assert_eq!(
            normalize_url("https://arxiv.org/abs/cond-mat/0102536", TITLE),
            "https://arxiv.org/abs/cond-mat/0102536"
        );
    }

    #[test]
    fn preprint_without_id_falls_back() {
        assert_eq!(normalize_url("https://arxiv.org/list/cs.LG/recent", TITLE), fallback());
    }

    #[test]
    fn trusted_domains_kept() {
        assert_eq!(
            normalize_url("https://openreview.net/forum?id=abc123", TITLE),
            "https://openreview.net/forum?id=abc123"
        );
        assert_eq!(
            normalize_url("https://github.com/org/repo/#readme", TITLE),
            "https://github.com/org/repo"
        );
        assert_eq!(
            normalize_url("https://proceedings.neurips.cc/paper/2024/x.html", TITLE),
            "https://proceedings.neurips.cc/paper/2024/x.html"
        );
    }

    #[test]
    fn internal_tooling_hosts_excluded() {
        for raw in [
            "https://aistudio.google.com/app/prompts/123",
            "https://generativelanguage.googleapis.com/v1beta/files/abc",
            "https://vertexaisearch.cloud.google.com/grounding-api-redirect/XYZ",
        ] {
            assert_eq!(normalize_url(raw, TITLE), fallback(), "input {raw}");
        }
    }

    #[test]
    fn lookalike_hosts_are_untrusted() {
        assert_eq!(normalize_url("https://notarxiv.org/abs/2310.12345", TITLE), fallback());
        assert_eq!(normalize_url("https://github.com.evil.io/x", TITLE), fallback());
        assert_eq!(normalize_url("https://medium.com/@someone/post", TITLE), fallback());
    }

    #[test]
    fn non_http_schemes_are_untrusted() {
        assert_eq!(normalize_url("ftp://arxiv.org/abs/2310.12345", TITLE), fallback());
        assert_eq!(normalize_url("javascript:alert(1)", TITLE), fallback());
    }

    #[test]
    fn classification() {
        let c = |s: &str| classify(&Url::parse(s).unwrap());
        assert_eq!(c("https://aistudio.google.com/"), Trust::Excluded);
        assert_eq!(c("https://arxiv.org/abs/1"), Trust::Preprint);
        assert_eq!(c("https://dl.acm.org/doi/10.1145/1"), Trust::Trusted);
        assert_eq!(c("https://example.com/"), Trust::Untrusted);
    }

    #[test]
    fn deterministic() {
        let inputs = [
            "https://arxiv.org/abs/2310.12345",
            "garbage",
            "https://huggingface.co/papers/2310.12345",
            "https://example.com",
        ];
        for raw in inputs {
            assert_eq!(normalize_url(raw, TITLE), normalize_url(raw, TITLE));
        }
    }
}
