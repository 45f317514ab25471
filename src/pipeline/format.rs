//! Best-effort markdown formatting.
//!
//! Formatting is cosmetic: a body that cannot be formatted is written
//! unformatted. [`beautify`] enforces that contract around any
//! [`MarkdownFormatter`], so the pipeline never fails because of it.
//!
//! ## What [`ProseFormatter`] does
//!
//! Applied in order:
//! 1. Normalise line endings (CRLF → LF)
//! 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
//! 3. Re-wrap top-level paragraphs to the print width
//! 4. Trim trailing whitespace per line, keeping two-space hard breaks
//! 5. Collapse runs of blank lines down to one
//! 6. Ensure the text ends with exactly one newline
//!
//! Code blocks and HTML blocks are never touched. After formatting, both
//! versions are parsed with pulldown-cmark and their rendered content
//! compared; any divergence is a [`FormatError::ContentChanged`].

use crate::error::FormatError;
use once_cell::sync::Lazy;
use pulldown_cmark::{Event, Options, Parser, Tag};
use regex::Regex;
use std::ops::Range;
use tracing::warn;

/// Reformats a markdown body for readability.
pub trait MarkdownFormatter: Send + Sync {
    fn format(&self, raw: &str) -> Result<String, FormatError>;
}

/// Format `raw`, falling back to it unchanged on any formatter error.
pub fn beautify(formatter: &dyn MarkdownFormatter, raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    match formatter.format(raw) {
        Ok(formatted) => formatted,
        Err(e) => {
            warn!(error = %e, "Markdown formatting failed, keeping the body as-is");
            raw.to_string()
        }
    }
}

/// Paragraph re-wrapping formatter.
#[derive(Debug, Clone, Copy)]
pub struct ProseFormatter {
    print_width: usize,
}

impl ProseFormatter {
    pub fn new(print_width: usize) -> Self {
        Self { print_width }
    }
}

impl Default for ProseFormatter {
    fn default() -> Self {
        Self::new(80)
    }
}

impl MarkdownFormatter for ProseFormatter {
    fn format(&self, raw: &str) -> Result<String, FormatError> {
        if raw.contains('\0') {
            return Err(FormatError::Rejected("input contains NUL bytes".into()));
        }

        let source = remove_invisible_chars(&normalise_line_endings(raw));
        let layout = Layout::scan(&source);

        let mut out = String::with_capacity(source.len());
        let mut cursor = 0;
        for block in &layout.blocks {
            if block.range.start < cursor {
                continue;
            }
            out.push_str(&trim_lines(&source, cursor..block.range.start, &layout.verbatim));
            if block.rewrap {
                out.push_str(&rewrap(&source[block.range.clone()], self.print_width));
            } else {
                out.push_str(&trim_lines(&source, block.range.clone(), &layout.verbatim));
            }
            cursor = block.range.end;
        }
        out.push_str(&trim_lines(&source, cursor..source.len(), &layout.verbatim));

        let out = ensure_final_newline(&collapse_blank_lines(&out));
        verify_same_content(&source, &out)?;
        Ok(out)
    }
}

fn parser_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES
}

// ── Document layout ──────────────────────────────────────────────────────

struct Block {
    range: Range<usize>,
    /// Top-level paragraph without hard breaks or inline HTML.
    rewrap: bool,
}

struct Layout {
    /// Top-level blocks in source order.
    blocks: Vec<Block>,
    /// Code and HTML blocks at any depth.
    verbatim: Vec<Range<usize>>,
}

impl Layout {
    fn scan(text: &str) -> Self {
        let mut blocks: Vec<Block> = Vec::new();
        let mut verbatim = Vec::new();
        let mut depth = 0usize;

        for (event, range) in Parser::new_ext(text, parser_options()).into_offset_iter() {
            match event {
                Event::Start(tag) => {
                    if matches!(tag, Tag::CodeBlock(_) | Tag::HtmlBlock) {
                        verbatim.push(range.clone());
                    }
                    if depth == 0 {
                        blocks.push(Block {
                            range,
                            rewrap: matches!(tag, Tag::Paragraph),
                        });
                    }
                    depth += 1;
                }
                Event::End(_) => depth = depth.saturating_sub(1),
                Event::HardBreak | Event::InlineHtml(_) | Event::Html(_) => {
                    if depth > 0 {
                        if let Some(block) = blocks.last_mut() {
                            block.rewrap = false;
                        }
                    }
                }
                _ if depth == 0 => blocks.push(Block {
                    range,
                    rewrap: false,
                }),
                _ => {}
            }
        }

        Self { blocks, verbatim }
    }
}

fn in_ranges(offset: usize, ranges: &[Range<usize>]) -> bool {
    ranges.iter().any(|r| r.contains(&offset))
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Remove invisible Unicode characters ──────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(['\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{2060}'], "")
}

// ── Rule 3: Re-wrap paragraphs ───────────────────────────────────────────

fn rewrap(paragraph: &str, width: usize) -> String {
    let tokens = tokenize(paragraph);
    if tokens.is_empty() {
        return paragraph.to_string();
    }

    let mut lines: Vec<String> = Vec::new();
    let mut line = String::new();
    let mut line_width = 0;
    for token in &tokens {
        let token_width = token.chars().count();
        if line.is_empty() {
            line.push_str(token);
            line_width = token_width;
        } else if line_width + 1 + token_width <= width || opens_block(token) {
            // Tokens that must not lead a line stay on the current one.
            line.push(' ');
            line.push_str(token);
            line_width += 1 + token_width;
        } else {
            lines.push(std::mem::take(&mut line));
            line.push_str(token);
            line_width = token_width;
        }
    }
    lines.push(line);

    let mut out = lines.join("\n");
    if paragraph.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// Split on whitespace, keeping code spans whole.
fn tokenize(text: &str) -> Vec<String> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut i = 0;

    while let Some(ch) = text[i..].chars().next() {
        if ch == '`' {
            let run = backtick_run(bytes, i);
            match closing_run(bytes, i + run, run) {
                Some(close) => {
                    current.push_str(&text[i..close + run].replace('\n', " "));
                    i = close + run;
                }
                None => {
                    current.push_str(&text[i..i + run]);
                    i += run;
                }
            }
            continue;
        }
        if ch.is_whitespace() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        } else {
            current.push(ch);
        }
        i += ch.len_utf8();
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn backtick_run(bytes: &[u8], start: usize) -> usize {
    bytes[start..].iter().take_while(|&&b| b == b'`').count()
}

fn closing_run(bytes: &[u8], from: usize, len: usize) -> Option<usize> {
    let mut i = from;
    while i < bytes.len() {
        if bytes[i] == b'`' {
            let run = backtick_run(bytes, i);
            if run == len {
                return Some(i);
            }
            i += run;
        } else {
            i += 1;
        }
    }
    None
}

/// Must this token stay off the start of a line? Covers block markers and
/// `@`, since lines opening with `@` are dropped as mentions.
fn opens_block(token: &str) -> bool {
    let Some(first) = token.chars().next() else {
        return false;
    };
    if matches!(first, '#' | '>' | '*' | '-' | '+' | '=' | '|' | '<' | '[' | '@') {
        return true;
    }
    if token.starts_with("```") || token.starts_with("~~~") || token.chars().all(|c| c == '_') {
        return true;
    }
    let digits = token.chars().take_while(char::is_ascii_digit).count();
    digits > 0 && matches!(token[digits..].chars().next(), Some('.') | Some(')'))
}

// ── Rule 4: Trim trailing whitespace per line ────────────────────────────

/// Trim every line of `source[range]` that does not start inside a
/// verbatim block. A trailing fragment that continues into the next block
/// is left alone.
fn trim_lines(source: &str, range: Range<usize>, verbatim: &[Range<usize>]) -> String {
    let segment = &source[range.clone()];
    let mut out = String::with_capacity(segment.len());
    let mut offset = range.start;

    for piece in segment.split_inclusive('\n') {
        let at_line_end = piece.ends_with('\n')
            || range.end == source.len()
            || source[range.end..].starts_with('\n');
        if in_ranges(offset, verbatim) || !at_line_end {
            out.push_str(piece);
        } else {
            let rest = &source[offset + piece.len()..];
            let next_blank = rest.split('\n').next().map_or(true, |l| l.trim().is_empty());
            out.push_str(&trim_line(piece, !next_blank));
        }
        offset += piece.len();
    }
    out
}

/// `keep_break` preserves a two-space hard break before a non-blank line.
fn trim_line(piece: &str, keep_break: bool) -> String {
    let (body, newline) = match piece.strip_suffix('\n') {
        Some(body) => (body, "\n"),
        None => (piece, ""),
    };
    let trimmed = body.trim_end();
    if keep_break && !trimmed.is_empty() && body.ends_with("  ") {
        format!("{trimmed}  {newline}")
    } else {
        format!("{trimmed}{newline}")
    }
}

// ── Rule 5: Collapse excessive blank lines ───────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    let verbatim = Layout::scan(input).verbatim;
    let mut out = String::with_capacity(input.len());
    let mut cursor = 0;
    for range in verbatim {
        if range.start < cursor {
            continue;
        }
        out.push_str(&RE_BLANK_LINES.replace_all(&input[cursor..range.start], "\n\n"));
        out.push_str(&input[range.clone()]);
        cursor = range.end;
    }
    out.push_str(&RE_BLANK_LINES.replace_all(&input[cursor..], "\n\n"));
    out
}

// ── Rule 6: Ensure file ends with single newline ─────────────────────────

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{}\n", trimmed)
    }
}

// ── Content check ────────────────────────────────────────────────────────

/// Rendered content with whitespace normalised.
fn content_signature(text: &str) -> String {
    let mut sig = String::with_capacity(text.len());
    for event in Parser::new_ext(text, parser_options()) {
        match event {
            Event::Text(t) => sig.push_str(&t),
            Event::Code(c) => {
                sig.push('`');
                sig.push_str(&c);
                sig.push('`');
            }
            Event::SoftBreak => sig.push(' '),
            other => {
                sig.push(' ');
                sig.push_str(&format!("{other:?}"));
                sig.push(' ');
            }
        }
    }
    sig.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn verify_same_content(before: &str, after: &str) -> Result<(), FormatError> {
    let a = content_signature(before);
    let b = content_signature(after);
    if a == b {
        return Ok(());
    }
    let at = a
        .char_indices()
        .zip(b.chars())
        .find(|((_, x), y)| x != y)
        .map(|((i, _), _)| i)
        .unwrap_or_else(|| a.len().min(b.len()));
    Err(FormatError::ContentChanged {
        near: a[at..].chars().take(40).collect(),
    })
}
