//! Unsubscribe link extraction from HTML bodies
//!
//! Candidates come from the `href` attribute of anchor tags. By default the
//! keyword may appear anywhere in the href, query string included: marketing
//! mail often only carries it in a tracking parameter. That also lets through
//! links that merely mention the keyword, so [`LinkPolicy::Path`] is available
//! for callers who prefer precision over recall.
//!
//! Only `&amp;` is decoded. Relative hrefs are returned unchanged.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::LazyLock;

/// Vocabulary that marks a link as an unsubscribe candidate
const KEYWORDS: &str = r"unsubscribe|abmelden|austragen|opt[-_\s]?out|manage\s+preferences|email\s+settings|newsletter\s+abbestellen|unsubscribe[-_\s]?here";

/// Substrings that mark a link as pointing at an invoice
const INVOICE_KEYWORDS: &[&str] = &["invoice", "rechnung", "bill", "statement"];

static UNSUBSCRIBE_ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r#"(?i)<a\s+[^>]*href="([^"]*?(?:{KEYWORDS})[^"]*)""#))
        .expect("unsubscribe anchor pattern is valid")
});

static KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("(?i){KEYWORDS}")).expect("keyword pattern is valid")
});

static ANY_ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<a\s+[^>]*href="([^"]*?)""#).expect("anchor pattern is valid")
});

/// Where in the href the unsubscribe keyword has to occur
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkPolicy {
    /// Anywhere in the href, including query string and fragment
    #[default]
    Href,
    /// Only before the first `?` or `#`
    Path,
}

impl FromStr for LinkPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "href" | "loose" => Ok(LinkPolicy::Href),
            "path" | "strict" => Ok(LinkPolicy::Path),
            other => Err(format!("unknown link policy '{other}' (expected href or path)")),
        }
    }
}

/// Finds unsubscribe candidates in HTML
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkExtractor {
    policy: LinkPolicy,
}

impl LinkExtractor {
    pub fn new(policy: LinkPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> LinkPolicy {
        self.policy
    }

    /// Lazily iterate candidate URLs in document order.
    ///
    /// The iterator borrows `html` and can be cloned to restart from the
    /// current position; calling `links` again starts from the top.
    pub fn links<'h>(&self, html: &'h str) -> Links<'h> {
        Links {
            html,
            pos: 0,
            policy: self.policy,
        }
    }
}

/// Iterator over unsubscribe candidates of one HTML document
#[derive(Debug, Clone)]
pub struct Links<'h> {
    html: &'h str,
    pos: usize,
    policy: LinkPolicy,
}

impl Iterator for Links<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            let caps = UNSUBSCRIBE_ANCHOR.captures_at(self.html, self.pos)?;
            let whole = caps.get(0)?;
            self.pos = whole.end();

            let href = caps.get(1)?.as_str();
            if self.policy == LinkPolicy::Path && !keyword_in_path(href) {
                continue;
            }
            return Some(decode_ampersands(href));
        }
    }
}

/// Convenience wrapper: collect all candidates with the default policy
pub fn extract_unsubscribe_links(html: &str) -> Vec<String> {
    LinkExtractor::default().links(html).collect()
}

/// Anchor targets that look like invoice downloads
pub fn extract_invoice_links(html: &str) -> Vec<String> {
    ANY_ANCHOR
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|m| decode_ampersands(m.as_str()))
        .filter(|link| {
            let lower = link.to_lowercase();
            INVOICE_KEYWORDS.iter().any(|k| lower.contains(k))
        })
        .collect()
}

fn keyword_in_path(href: &str) -> bool {
    let end = href.find(['?', '#']).unwrap_or(href.len());
    KEYWORD.is_match(&href[..end])
}

fn decode_ampersands(href: &str) -> String {
    href.replace("&amp;", "&")
}
