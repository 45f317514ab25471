//! Title resolution: a readable title and a safe file stem for each document.
//!
//! Upstream metadata is unreliable, so the title comes from the first rule
//! in [`RULES`] that yields something non-empty:
//!
//! 1. metadata `title`, `ogTitle`, `twitter:title`, `og:title` (left of `|`)
//! 2. the first `# Heading` line
//! 3. a setext heading underlined with `===`, then one underlined with `---`
//! 4. the first substantial body line that is not a link or image
//! 5. a generated `doc-{millis}-{token}` placeholder
//!
//! Rules 1–4 are plain functions so each can be tested in isolation.

use crate::document::Metadata;
use crate::naming::NameSource;
use once_cell::sync::Lazy;
use regex::Regex;

/// Metadata keys consulted for a title, in priority order.
pub const TITLE_KEYS: &[&str] = &["title", "ogTitle", "twitter:title", "og:title"];

/// Which rule produced a title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleRule {
    Metadata,
    AtxHeading,
    SetextHeading,
    FirstLine,
    Fallback,
}

/// A resolved title in both its forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTitle {
    /// Human-readable title for the front matter. Empty for placeholders.
    pub display: String,
    /// Sanitised file stem.
    pub stem: String,
    pub rule: TitleRule,
}

type Extractor = fn(&Metadata, &str) -> Option<String>;

/// The ordered cascade. The fallback is not listed; it cannot fail.
pub const RULES: &[(TitleRule, Extractor)] = &[
    (TitleRule::Metadata, from_metadata),
    (TitleRule::AtxHeading, from_atx_heading),
    (TitleRule::SetextHeading, from_setext_heading),
    (TitleRule::FirstLine, from_first_line),
];

/// Run the cascade.
pub fn resolve(metadata: &Metadata, body: &str, names: &dyn NameSource) -> ResolvedTitle {
    for (rule, extract) in RULES {
        if let Some(display) = extract(metadata, body) {
            return ResolvedTitle {
                stem: sanitize(&display),
                display,
                rule: *rule,
            };
        }
    }
    ResolvedTitle {
        display: String::new(),
        stem: sanitize(&names.fallback_name()),
        rule: TitleRule::Fallback,
    }
}

/// Longest stem [`sanitize`] produces. Leaves room under the 255-byte
/// file-name limit for a `-N` suffix, the extension and the temp-file dots.
pub const MAX_STEM_LEN: usize = 100;

/// Replace every char outside `[A-Za-z0-9-_]` with `-`, lower-case, and
/// cut to [`MAX_STEM_LEN`] chars.
///
/// Idempotent: the output alphabet is a subset of the kept alphabet.
pub fn sanitize(title: &str) -> String {
    title
        .chars()
        .take(MAX_STEM_LEN)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}

fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_string())
}

// ── Rule 1: metadata ─────────────────────────────────────────────────────

/// "Page Title | Site Name" → "Page Title".
pub fn from_metadata(metadata: &Metadata, _body: &str) -> Option<String> {
    TITLE_KEYS.iter().find_map(|key| {
        let value = metadata.get(key)?;
        let left = value.split('|').next().unwrap_or(value);
        non_empty(left)
    })
}

// ── Rule 2: ATX heading ──────────────────────────────────────────────────

static RE_ATX_H1: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*#[ \t]+(.+)$").unwrap());

pub fn from_atx_heading(_metadata: &Metadata, body: &str) -> Option<String> {
    RE_ATX_H1
        .captures_iter(body)
        .find_map(|caps| non_empty(&caps[1]))
}

// ── Rule 3: setext heading ───────────────────────────────────────────────

pub fn from_setext_heading(_metadata: &Metadata, body: &str) -> Option<String> {
    setext_with(body, '=').or_else(|| setext_with(body, '-'))
}

fn setext_with(body: &str, underline: char) -> Option<String> {
    let lines: Vec<&str> = body.lines().collect();
    lines.windows(2).find_map(|pair| {
        let under = pair[1].trim();
        let is_underline = under.chars().count() >= 2 && under.chars().all(|c| c == underline);
        if is_underline {
            non_empty(pair[0])
        } else {
            None
        }
    })
}

// ── Rule 4: first substantial line ───────────────────────────────────────

pub fn from_first_line(_metadata: &Metadata, body: &str) -> Option<String> {
    body.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .find(|l| !l.starts_with('[') && !l.starts_with('!') && l.chars().count() > 10)
        .map(String::from)
}
