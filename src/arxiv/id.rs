//! arXiv identifier parsing.

use std::sync::OnceLock;

use regex::Regex;

fn new_style() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{4}\.\d{4,5})(v\d+)?").expect("valid regex"))
}

fn old_style() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([a-z][a-z\-]*(?:\.[A-Z]{2})?/\d{7})(v\d+)?").expect("valid regex")
    })
}

/// Extract an arXiv identifier (version suffix dropped) from a bare id or an
/// `arxiv.org/abs/…` / `arxiv.org/pdf/…` URL.
///
/// ```
/// use paper_axon::arxiv::extract_arxiv_id;
///
/// assert_eq!(extract_arxiv_id("2301.12345v2").as_deref(), Some("2301.12345"));
/// assert_eq!(
///     extract_arxiv_id("https://arxiv.org/pdf/2301.12345.pdf").as_deref(),
///     Some("2301.12345")
/// );
/// assert_eq!(extract_arxiv_id("not an id"), None);
/// ```
pub fn extract_arxiv_id(url_or_id: &str) -> Option<String> {
    let s = url_or_id.trim();
    if let Some(caps) = new_style().captures(s) {
        return Some(caps[1].to_string());
    }
    old_style().captures(s).map(|caps| caps[1].to_string())
}
