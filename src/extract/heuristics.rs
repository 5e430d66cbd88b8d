//! Text-layer heuristics: title, abstract, keywords and section headings.
//!
//! PDF text carries no reliable structure, so these rules are deliberately
//! simple:
//!
//! * **title** — first paragraph of the first page (≤ 500 chars).
//! * **abstract** — the paragraph(s) after an `Abstract` marker if one is
//!   present, otherwise paragraphs 2–4 of the first page, otherwise the
//!   first 3 000 chars of the document.
//! * **keywords** — a `Keywords:` / `Index Terms—` line split on `,` / `;`.
//! * **sections** — short numbered heading lines (`1 Introduction`,
//!   `3.2 Results`, `IV. Discussion`).

use std::sync::OnceLock;

use regex::Regex;

use crate::pipeline::Extraction;

const TITLE_MAX_CHARS: usize = 500;
const ABSTRACT_MAX_CHARS: usize = 3_000;
const RAW_TEXT_MAX_CHARS: usize = 50_000;
const HEADING_MAX_CHARS: usize = 80;

/// Build an [`Extraction`] from plain document text.
///
/// ```
/// use paper_axon::extract::structure_text;
///
/// let text = "Attention Is All You Need\n\nAbstract\nWe propose the Transformer.\n\n1 Introduction\nRecurrent models...";
/// let e = structure_text(text);
/// assert_eq!(e.title, "Attention Is All You Need");
/// assert!(e.abstract_text.starts_with("We propose"));
/// assert_eq!(e.sections, vec!["1 Introduction".to_string()]);
/// ```
pub fn structure_text(text: &str) -> Extraction {
    let text = text.replace("\r\n", "\n");
    let first_page = text.split('\u{c}').next().unwrap_or("");
    let paragraphs: Vec<&str> = first_page
        .trim()
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    let title = paragraphs
        .first()
        .map(|p| collapse_whitespace(p))
        .map(|p| truncate_chars(&p, TITLE_MAX_CHARS))
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| "Untitled".to_string());

    let mut abstract_text =
        find_marked_abstract(first_page).unwrap_or_else(|| leading_paragraphs(&paragraphs));
    if abstract_text.trim().is_empty() {
        abstract_text = text.trim().to_string();
    }

    Extraction {
        title,
        authors: String::new(),
        abstract_text: truncate_chars(abstract_text.trim(), ABSTRACT_MAX_CHARS),
        keywords: find_keywords(&text),
        sections: find_sections(&text),
        raw_text: truncate_chars(&text, RAW_TEXT_MAX_CHARS),
    }
}

/// Truncate to at most `max` characters (not bytes).
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Paragraphs 2–4, the usual home of the abstract when it is unmarked.
fn leading_paragraphs(paragraphs: &[&str]) -> String {
    paragraphs
        .iter()
        .skip(1)
        .take(3)
        .copied()
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn abstract_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?im)^\s*abstract\b\s*[:.\-—]?\s*").expect("valid regex"))
}

fn keywords_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?im)^\s*(?:keywords|key words|index terms)\s*[:.\-—]+\s*(.+)$")
            .expect("valid regex")
    })
}

fn heading_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:\d{1,2}(?:\.\d{1,2})*\.?|[IVX]{1,5}\.)\s+[A-Z][A-Za-z0-9 ,:&'\-]*$")
            .expect("valid regex")
    })
}

/// Text between an `Abstract` marker and the next blank line (or the first
/// numbered heading when the abstract runs straight into the body).
fn find_marked_abstract(page: &str) -> Option<String> {
    let m = abstract_marker().find(page)?;
    let rest = &page[m.end()..];
    let mut lines = Vec::new();
    for line in rest.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if lines.is_empty() {
                continue;
            }
            break;
        }
        if heading_line().is_match(trimmed) {
            break;
        }
        lines.push(trimmed);
    }
    let joined = lines.join(" ");
    (!joined.is_empty()).then_some(joined)
}

fn find_keywords(text: &str) -> Vec<String> {
    let Some(caps) = keywords_line().captures(text) else {
        return Vec::new();
    };
    caps[1]
        .split([',', ';', '·'])
        .map(|k| k.trim().trim_end_matches('.').trim().to_string())
        .filter(|k| !k.is_empty())
        .collect()
}

fn find_sections(text: &str) -> Vec<String> {
    let mut sections: Vec<String> = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.chars().count() > HEADING_MAX_CHARS || !heading_line().is_match(trimmed) {
            continue;
        }
        let heading = collapse_whitespace(trimmed);
        if sections.last() != Some(&heading) {
            sections.push(heading);
        }
    }
    sections
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
