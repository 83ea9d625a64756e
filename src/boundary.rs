//! Description boundaries.
//!
//! Given the lines that follow a marker, decide which of them belong to the
//! task. Raw lines are kept verbatim so the task can be written back
//! unchanged; content lines are what a reader sees, without comment
//! decoration or `<card>` wrapper tags.
//!
//! Rules, first match wins:
//! 1. `<card>` right after the marker: everything up to `</card>`.
//! 2. Source files: the comment the marker lives in.
//! 3. Markdown: until another marker, a sibling checkbox or list item, the
//!    configured terminator, or two blank lines.

use crate::lang::Lang;
use crate::pattern::{self, Patterns, Spans};

/// Opening wrapper tag
pub const CARD_OPEN: &str = "<card>";

/// Closing wrapper tag
pub const CARD_CLOSE: &str = "</card>";

/// What the scanner needs to know about the marker line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkerContext {
    /// Indentation of the marker line when it is a checkbox
    pub checkbox_indent: Option<usize>,
    /// Indentation of the marker line when it is a list item
    pub list_indent: Option<usize>,
    /// A block comment is still open after the marker line
    pub in_block_comment: bool,
    /// Block comment delimiters opened on the marker line
    pub comment_opens: usize,
    /// Block comment delimiters closed on the marker line
    pub comment_closes: usize,
}

impl MarkerContext {
    /// Context for a markdown marker line
    pub fn for_text(line: &str, lang: &Lang) -> Self {
        let body = body(line);
        Self {
            checkbox_indent: pattern::checkbox_indent(body),
            list_indent: pattern::list_item_indent(body),
            in_block_comment: false,
            comment_opens: count(body, lang.block_start()),
            comment_closes: count(body, lang.block_end()),
        }
    }

    /// Context for a marker in a source comment
    pub fn for_code(in_block_comment: bool) -> Self {
        Self {
            in_block_comment,
            ..Self::default()
        }
    }
}

/// Lines belonging to one task
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Boundary {
    pub raw_lines: Vec<String>,
    pub content_lines: Vec<String>,
    /// Blank lines after the description that were left out of it
    pub trailing_blank_lines: usize,
    /// The description is wrapped in `<card>` tags
    pub wrapped: bool,
}

/// Scan the lines after a marker.
///
/// `offset` is the byte offset of `lines[0]` in the text `spans` covers.
pub fn scan(
    lines: &[&str],
    offset: usize,
    spans: &Spans,
    lang: &Lang,
    patterns: &Patterns,
    marker: &MarkerContext,
) -> Boundary {
    if lines
        .first()
        .is_some_and(|line| body(line).trim() == CARD_OPEN)
    {
        return scan_wrapped(lines);
    }
    if lang.is_markdown() {
        scan_text(lines, offset, spans, lang, patterns, marker)
    } else {
        scan_code(lines, offset, spans, lang, patterns, marker)
    }
}

fn scan_wrapped(lines: &[&str]) -> Boundary {
    let mut boundary = Boundary {
        wrapped: true,
        ..Boundary::default()
    };
    for (idx, line) in lines.iter().enumerate() {
        boundary.raw_lines.push((*line).to_string());
        if idx == 0 {
            continue;
        }
        if body(line).trim() == CARD_CLOSE {
            break;
        }
        boundary.content_lines.push(body(line).to_string());
    }
    boundary
}

fn scan_code(
    lines: &[&str],
    offset: usize,
    spans: &Spans,
    lang: &Lang,
    patterns: &Patterns,
    marker: &MarkerContext,
) -> Boundary {
    let end = lang.block_end();
    let ignore = lang.block_ignore();
    let mut boundary = Boundary::default();
    let mut line_offset = offset;

    for line in lines {
        let text = body(line);
        let trimmed = text.trim();
        if end.is_some_and(|end| trimmed == end) || ignore.is_some_and(|ignore| trimmed == ignore)
        {
            break;
        }
        if patterns.has_marker(line, line_offset, spans) {
            break;
        }

        let in_comment = marker.in_block_comment
            || (!lang.symbol.is_empty() && trimmed.starts_with(lang.symbol.as_str()));
        if !in_comment {
            break;
        }

        boundary.raw_lines.push((*line).to_string());
        boundary.content_lines.push(strip_comment(text, lang));
        line_offset += line.len() + 1;

        if marker.in_block_comment && end.is_some_and(|end| text.contains(end)) {
            break;
        }
    }
    boundary
}

fn scan_text(
    lines: &[&str],
    offset: usize,
    spans: &Spans,
    lang: &Lang,
    patterns: &Patterns,
    marker: &MarkerContext,
) -> Boundary {
    let terminator = patterns.config().tasks.card_terminator.as_deref();
    let mut opens = marker.comment_opens;
    let mut closes = marker.comment_closes;
    let mut in_fence = false;
    let mut kept: Vec<&str> = Vec::new();
    let mut trailing = 0;
    let mut line_offset = offset;

    for (idx, line) in lines.iter().enumerate() {
        let text = body(line);
        let this_offset = line_offset;
        line_offset += line.len() + 1;

        if in_fence || pattern::is_fence(text) {
            if pattern::is_fence(text) {
                in_fence = !in_fence;
            }
            kept.push(line);
            continue;
        }

        if text.trim().is_empty() {
            match lines.get(idx + 1) {
                None => {
                    trailing = 1;
                    break;
                }
                Some(next) if body(next).trim().is_empty() => {
                    trailing = 2;
                    break;
                }
                Some(_) => {
                    kept.push(line);
                    continue;
                }
            }
        }

        if let (Some(own), Some(indent)) = (marker.checkbox_indent, pattern::checkbox_indent(text)) {
            if indent <= own {
                break;
            }
        } else if patterns.has_marker(line, this_offset, spans) {
            break;
        }

        if let (Some(own), Some(indent)) = (marker.list_indent, pattern::list_item_indent(text)) {
            if indent <= own {
                break;
            }
        }

        if terminator.is_some_and(|terminator| text == terminator) {
            break;
        }

        opens += count(text, lang.block_start());
        closes += count(text, lang.block_end());
        kept.push(line);
    }

    while kept.last().is_some_and(|line| body(line).trim().is_empty()) {
        kept.pop();
        trailing += 1;
    }

    if let Some(close) = lang.block_end() {
        if opens != closes && kept.last().is_some_and(|line| body(line).trim() == close) {
            kept.pop();
            while kept.last().is_some_and(|line| body(line).trim().is_empty()) {
                kept.pop();
            }
        }
    }

    Boundary {
        raw_lines: kept.iter().map(|line| (*line).to_string()).collect(),
        content_lines: kept.iter().map(|line| body(line).to_string()).collect(),
        trailing_blank_lines: trailing,
        wrapped: false,
    }
}

/// Line without its trailing carriage return
pub fn body(line: &str) -> &str {
    line.strip_suffix('\r').unwrap_or(line)
}

fn count(text: &str, token: Option<&str>) -> usize {
    token
        .filter(|token| !token.is_empty())
        .map_or(0, |token| text.matches(token).count())
}

/// Split a source comment line into its decoration and its text.
///
/// The prefix covers indentation, the comment token and one space.
pub fn split_comment(line: &str, lang: &Lang) -> (usize, usize) {
    let text = body(line);
    let indent = text.len() - text.trim_start().len();
    let rest = &text[indent..];

    let mut tokens: Vec<&str> = Vec::new();
    if !lang.symbol.is_empty() {
        tokens.push(&lang.symbol);
    }
    if let Some(start) = lang.block_start() {
        tokens.push(start);
    }
    if let Some(ignore) = lang.block_ignore() {
        tokens.push(ignore);
    }
    // Longest first so `--[[` wins over `--`
    tokens.sort_by_key(|token| std::cmp::Reverse(token.len()));

    let mut prefix = indent;
    if let Some(token) = tokens.iter().find(|token| rest.starts_with(**token)) {
        prefix += token.len();
        let after = &text[prefix..];
        if let Some(ignore) = lang.block_ignore() {
            // `/**` continues with the ignore token
            if Some(*token) == lang.block_start() && after.starts_with(ignore) {
                prefix += ignore.len();
            }
        }
        if text[prefix..].starts_with(' ') {
            prefix += 1;
        }
    }

    let mut end = text.len();
    if let Some(close) = lang.block_end() {
        if let Some(pos) = text[prefix..].rfind(close) {
            end = prefix + text[prefix..pos + prefix].trim_end().len();
        }
    }
    (prefix, end.max(prefix))
}

/// Comment text of a source line
pub fn strip_comment(line: &str, lang: &Lang) -> String {
    let (start, end) = split_comment(line, lang);
    body(line)[start..end].trim_end().to_string()
}
