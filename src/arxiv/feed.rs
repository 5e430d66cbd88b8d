//! Atom feed parsing for the arXiv query API.

use serde::Deserialize;

use crate::arxiv::client::ArxivError;

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(rename = "entry", default)]
    entries: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    published: Option<String>,
    #[serde(default)]
    updated: Option<String>,
    #[serde(rename = "author", default)]
    authors: Vec<RawAuthor>,
    #[serde(rename = "link", default)]
    links: Vec<RawLink>,
}

#[derive(Debug, Deserialize)]
struct RawAuthor {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawLink {
    #[serde(rename = "@href")]
    href: String,
    #[serde(rename = "@title", default)]
    title: Option<String>,
}

/// One paper from an arXiv Atom feed, whitespace-normalised.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArxivEntry {
    /// Canonical entry URL, e.g. `http://arxiv.org/abs/1706.03762v7`.
    pub entry_id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub summary: String,
    pub published: Option<String>,
    pub updated: Option<String>,
    pub pdf_url: Option<String>,
}

impl ArxivEntry {
    /// Identifier parsed from the canonical entry URL (version kept).
    pub fn arxiv_id(&self) -> &str {
        self.entry_id.rsplit('/').next().unwrap_or(&self.entry_id)
    }

    pub fn authors_joined(&self) -> String {
        self.authors.join(", ")
    }

    /// The advertised PDF link, or the conventional `arxiv.org/pdf/<id>`.
    pub fn pdf_url(&self) -> String {
        self.pdf_url
            .clone()
            .unwrap_or_else(|| format!("https://arxiv.org/pdf/{}", self.arxiv_id()))
    }
}

/// Parse an Atom response body into entries.
///
/// arXiv reports lookup errors as a single entry whose id points at
/// `/api/errors`; those are surfaced as [`ArxivError::Parse`] so callers
/// never mistake them for papers.
pub fn parse_feed(xml: &str) -> Result<Vec<ArxivEntry>, ArxivError> {
    let feed: Feed = quick_xml::de::from_str(xml).map_err(|e| ArxivError::Parse(e.to_string()))?;

    let mut entries = Vec::with_capacity(feed.entries.len());
    for raw in feed.entries {
        if raw.id.contains("/api/errors") {
            return Err(ArxivError::Parse(normalise(&raw.summary)));
        }
        let pdf_url = raw
            .links
            .iter()
            .find(|l| l.title.as_deref() == Some("pdf"))
            .map(|l| l.href.clone());
        entries.push(ArxivEntry {
            entry_id: raw.id.trim().to_string(),
            title: normalise(&raw.title),
            authors: raw.authors.into_iter().map(|a| normalise(&a.name)).collect(),
            summary: normalise(&raw.summary),
            published: raw.published.map(|s| s.trim().to_string()),
            updated: raw.updated.map(|s| s.trim().to_string()),
            pdf_url,
        });
    }
    Ok(entries)
}

fn normalise(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
