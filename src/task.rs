//! Task model
//!
//! A task is a marker line plus the description lines the boundary scanner
//! assigned to it. The raw lines are the source of truth; everything else
//! (metadata, tags, contexts, order, content) is derived from them by
//! [`Task::parse`] and recomputed after every edit.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::boundary::{self, Boundary, CARD_CLOSE};
use crate::lang::Lang;
use crate::pattern::{self, MarkerKind, MarkerMatch, Patterns, Spans};

/// Metadata key holding the task order
pub const ORDER_KEY: &str = "order";

/// Metadata key stamped when a task enters the done list
pub const COMPLETED_KEY: &str = "completed";

/// Session-unique task identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Tags, contexts and metadata every task in a file inherits
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefaults {
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub contexts: Vec<String>,
    #[serde(default)]
    pub meta: BTreeMap<String, Vec<String>>,
}

/// Everything the file scanner knows about a freshly matched task
pub(crate) struct Scanned<'a> {
    pub path: &'a Path,
    /// 1-based line of the marker
    pub line: usize,
    pub marker: MarkerMatch,
    pub boundary: Boundary,
    pub lang: &'a Lang,
    /// The marker sits inside a block comment
    pub in_block_comment: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Task {
    id: TaskId,
    path: PathBuf,
    marker: MarkerKind,
    list: String,
    order: Option<f64>,
    text: String,
    line: usize,
    last_line: usize,
    before_text: String,
    #[serde(skip)]
    after_text: String,
    #[serde(skip)]
    order_text: Option<String>,
    description: Vec<String>,
    content: String,
    interpreted_content: String,
    tags: Vec<String>,
    contexts: Vec<String>,
    meta: BTreeMap<String, Vec<String>>,
    topics: Vec<String>,
    #[serde(skip)]
    content_lines: Vec<String>,
    #[serde(skip)]
    wrapped: bool,
    #[serde(skip)]
    lang: Lang,
    /// Prefix for new description lines
    #[serde(skip)]
    continuation: String,
    /// Last description line closes the block comment
    #[serde(skip)]
    closes_block: bool,
    /// Marker line opens and closes a block comment
    #[serde(skip)]
    single_line_block: bool,
    #[serde(skip)]
    eol: &'static str,
    #[serde(skip)]
    defaults: TaskDefaults,
    /// Raw lines as last read from or written to the file
    #[serde(skip)]
    synced: Vec<String>,
}

impl Task {
    pub(crate) fn from_scan(scanned: Scanned<'_>, defaults: &TaskDefaults, patterns: &Patterns) -> Self {
        let Scanned {
            path,
            line,
            marker,
            boundary,
            lang,
            in_block_comment,
        } = scanned;

        let eol = if marker.after.ends_with('\r') { "\r" } else { "" };
        let continuation = continuation(&marker, &boundary, lang, in_block_comment);
        let closes_block = !lang.is_markdown()
            && in_block_comment
            && !boundary.wrapped
            && lang.block_end().is_some_and(|end| {
                boundary
                    .raw_lines
                    .last()
                    .is_some_and(|last| last.contains(end))
            });
        let single_line_block = !lang.is_markdown()
            && lang
                .block_end()
                .is_some_and(|end| marker.after.contains(end));

        let mut task = Self {
            id: TaskId::new(),
            path: path.to_path_buf(),
            marker: marker.kind,
            list: marker.list,
            order: None,
            text: marker.text,
            line,
            last_line: line + boundary.raw_lines.len(),
            before_text: marker.before,
            after_text: marker.after,
            order_text: marker.order,
            description: boundary.raw_lines,
            content: String::new(),
            interpreted_content: String::new(),
            tags: Vec::new(),
            contexts: Vec::new(),
            meta: BTreeMap::new(),
            topics: Vec::new(),
            content_lines: boundary.content_lines,
            wrapped: boundary.wrapped,
            lang: lang.clone(),
            continuation,
            closes_block,
            single_line_block,
            eol,
            defaults: defaults.clone(),
            synced: Vec::new(),
        };
        task.parse(patterns);
        task.synced = task.raw_lines(patterns);
        task
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn marker(&self) -> &MarkerKind {
        &self.marker
    }

    pub fn list(&self) -> &str {
        &self.list
    }

    pub fn order(&self) -> Option<f64> {
        self.order
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// 1-based line of the marker
    pub fn line(&self) -> usize {
        self.line
    }

    /// 1-based line of the last description line (the marker line when
    /// there is no description)
    pub fn last_line(&self) -> usize {
        self.last_line
    }

    pub fn before_text(&self) -> &str {
        &self.before_text
    }

    pub fn after_text(&self) -> &str {
        &self.after_text
    }

    /// Raw description lines, wrapper tags and comment decoration included
    pub fn description(&self) -> &[String] {
        &self.description
    }

    /// Logical description lines
    pub fn content_lines(&self) -> &[String] {
        &self.content_lines
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Title and description without metadata or comment delimiters
    pub fn interpreted_content(&self) -> &str {
        &self.interpreted_content
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn contexts(&self) -> &[String] {
        &self.contexts
    }

    pub fn meta(&self) -> &BTreeMap<String, Vec<String>> {
        &self.meta
    }

    /// First value of a metadata key
    pub fn meta_value(&self, key: &str) -> Option<&str> {
        self.meta.get(key)?.first().map(String::as_str)
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    pub fn is_wrapped(&self) -> bool {
        self.wrapped
    }

    pub fn lang(&self) -> &Lang {
        &self.lang
    }

    /// Number of lines the task occupies in its file
    pub fn line_count(&self) -> usize {
        1 + self.description.len()
    }

    /// Marker line as it is written to the file
    pub fn marker_line(&self, patterns: &Patterns) -> String {
        let marker = pattern::render_marker(
            &self.marker,
            &self.list,
            self.order_text.as_deref(),
            &self.text,
            &patterns.config().tasks.token_prefix,
        );
        format!("{}{}{}", self.before_text, marker, self.after_text)
    }

    /// Marker line followed by the raw description
    pub fn raw_lines(&self, patterns: &Patterns) -> Vec<String> {
        std::iter::once(self.marker_line(patterns))
            .chain(self.description.iter().cloned())
            .collect()
    }

    pub(crate) fn synced(&self) -> &[String] {
        &self.synced
    }

    /// Record that the file now holds this task at `line`
    pub(crate) fn mark_synced(&mut self, line: usize, patterns: &Patterns) {
        self.set_line(line);
        self.synced = self.raw_lines(patterns);
    }

    pub(crate) fn set_line(&mut self, line: usize) {
        self.line = line;
        self.last_line = line + self.description.len();
    }

    pub(crate) fn shift(&mut self, delta: isize) {
        self.set_line(self.line.saturating_add_signed(delta));
    }

    pub(crate) fn set_id(&mut self, id: TaskId) {
        self.id = id;
    }

    /// Recompute every derived field from the raw lines
    pub fn parse(&mut self, patterns: &Patterns) {
        let title_spans = Spans::scan(&self.text);
        let content = self.content_lines.join("\n");
        let content_spans = Spans::scan(&content);

        let mut tags = patterns.tags(&self.text, &title_spans);
        extend_unique(&mut tags, patterns.tags(&content, &content_spans));
        extend_unique(&mut tags, self.defaults.tags.iter().cloned());

        let mut contexts = patterns.contexts(&self.text, &title_spans);
        extend_unique(&mut contexts, patterns.contexts(&content, &content_spans));
        extend_unique(&mut contexts, self.defaults.contexts.iter().cloned());

        let mut meta: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let tokens = patterns
            .meta_tokens(&self.text, &title_spans)
            .into_iter()
            .chain(patterns.meta_tokens(&content, &content_spans));
        for token in tokens {
            meta.entry(token.key).or_default().push(token.value);
        }
        for (key, values) in &self.defaults.meta {
            extend_unique(meta.entry(key.clone()).or_default(), values.iter().cloned());
        }

        self.order = meta
            .get(ORDER_KEY)
            .and_then(|values| values.first())
            .and_then(|value| parse_order(value))
            .or_else(|| self.order_text.as_deref().and_then(parse_order));

        self.topics = topics(&tags);
        self.tags = tags;
        self.contexts = contexts;
        self.meta = meta;
        self.interpreted_content = self.interpret(patterns);
        self.content = content;
    }

    fn interpret(&self, patterns: &Patterns) -> String {
        let mut lines = Vec::with_capacity(1 + self.content_lines.len());
        for line in std::iter::once(&self.text).chain(&self.content_lines) {
            let mut cleaned = strip_meta(line, patterns, |_| true);
            for token in [self.lang.block_start(), self.lang.block_end()].into_iter().flatten() {
                cleaned = cleaned.replace(token, "");
            }
            if cleaned.trim().is_empty() && !line.trim().is_empty() {
                continue;
            }
            lines.push(cleaned.trim_end().to_string());
        }
        while lines.last().is_some_and(|line| line.is_empty()) {
            lines.pop();
        }
        lines.join("\n")
    }

    fn refresh(&mut self, patterns: &Patterns) {
        let body = self.body_range();
        self.content_lines = self.description[body]
            .iter()
            .map(|line| {
                if self.lang.is_markdown() {
                    boundary::body(line).to_string()
                } else {
                    boundary::strip_comment(line, &self.lang)
                }
            })
            .collect();
        self.last_line = self.line + self.description.len();
        self.parse(patterns);
    }

    /// Description lines between the wrapper tags
    fn body_range(&self) -> Range<usize> {
        if !self.wrapped || self.description.is_empty() {
            return 0..self.description.len();
        }
        let closed = self
            .description
            .last()
            .is_some_and(|line| boundary::body(line).trim() == CARD_CLOSE);
        let end = if closed && self.description.len() > 1 {
            self.description.len() - 1
        } else {
            self.description.len()
        };
        1..end
    }

    /// Replace the description with user-supplied text.
    ///
    /// Runs of blank lines collapse to one and a single trailing blank
    /// line is dropped. Source-file lines get the comment prefix back.
    pub fn update_from_content(&mut self, text: &str, patterns: &Patterns) {
        let lines = normalize_description(text);
        let mut rendered: Vec<String> = lines
            .iter()
            .map(|line| {
                let line = if self.lang.is_markdown() || self.wrapped {
                    line.clone()
                } else if line.is_empty() {
                    self.continuation.trim_end().to_string()
                } else {
                    format!("{}{line}", self.continuation)
                };
                format!("{line}{}", self.eol)
            })
            .collect();

        if self.closes_block {
            if let Some(end) = self.lang.block_end() {
                match rendered.last_mut() {
                    Some(last) => {
                        let body = boundary::body(last).to_string();
                        *last = format!("{body} {end}{}", self.eol);
                    }
                    None => {
                        let indent = leading_ws(&self.continuation);
                        rendered.push(format!("{indent} {end}{}", self.eol));
                    }
                }
            }
        }

        if self.wrapped {
            let body = self.body_range();
            let open = self.description[..body.start].to_vec();
            let close = self.description[body.end..].to_vec();
            self.description = open.into_iter().chain(rendered).chain(close).collect();
        } else {
            self.description = rendered;
        }
        self.refresh(patterns);
    }

    /// Set the order and write it where the configuration wants it
    pub fn set_order(&mut self, order: Option<f64>, patterns: &Patterns) {
        self.order = order.filter(|order| order.is_finite());
        self.update_order_meta(patterns);
    }

    /// Write the current order as metadata or inline, per configuration.
    ///
    /// Checkbox markers cannot carry an inline order, so they always use
    /// metadata.
    pub fn update_order_meta(&mut self, patterns: &Patterns) {
        let tasks = &patterns.config().tasks;
        let value = self.order.map(format_order);
        if tasks.order_meta || !self.marker.has_inline_order() {
            self.order_text = None;
            match value {
                Some(value) => self.write_meta(ORDER_KEY, &value, patterns),
                None => self.erase_meta(ORDER_KEY, patterns),
            }
        } else {
            self.erase_meta(ORDER_KEY, patterns);
            self.order_text = value;
        }
        if !tasks.keep_empty_priority {
            if let MarkerKind::Tag { has_colon, .. } = &mut self.marker {
                *has_colon = false;
            }
        }
        self.refresh(patterns);
    }

    /// Move the task to another list.
    ///
    /// Keeps checkbox state in step with the list and stamps or clears the
    /// completion time. The order is left alone; set it afterwards.
    pub fn move_to_list(&mut self, list: &str, patterns: &Patterns, now: DateTime<Utc>) {
        if self.list == list {
            return;
        }
        let tasks = &patterns.config().tasks;
        let into_done = list == tasks.done_list;
        let out_of_done = self.list == tasks.done_list;
        let into_default = list == tasks.default_list;
        self.list = list.to_string();

        match &mut self.marker {
            MarkerKind::Checkbox { bullet, mark } => {
                if into_done {
                    *mark = 'x';
                } else if into_default {
                    *mark = ' ';
                } else {
                    let bullet = *bullet;
                    self.before_text = format!("{}{bullet} [ ] ", self.before_text);
                    self.marker = MarkerKind::Tag {
                        has_colon: false,
                        gap: " ".to_string(),
                    };
                }
            }
            MarkerKind::Tag { .. } | MarkerKind::Link => {
                if into_done || out_of_done {
                    let mark = if into_done { "x" } else { " " };
                    if let Some((range, _)) = pattern::checkbox_prefix(&self.before_text) {
                        // `[-*+] [m] `: mark sits three bytes from the end
                        let at = range.end - 3;
                        self.before_text.replace_range(at..at + 1, mark);
                    }
                }
            }
        }

        if tasks.add_completed_meta {
            if into_done {
                let stamp = now.to_rfc3339_opts(SecondsFormat::Secs, true);
                self.write_meta(COMPLETED_KEY, &stamp, patterns);
            } else if out_of_done {
                self.erase_meta(COMPLETED_KEY, patterns);
            }
        }
        self.refresh(patterns);
    }

    /// Set a metadata value, replacing an existing token in place
    pub fn set_meta(&mut self, key: &str, value: &str, patterns: &Patterns) {
        self.write_meta(key, value, patterns);
        self.refresh(patterns);
    }

    /// Remove every token for `key`
    pub fn remove_meta(&mut self, key: &str, patterns: &Patterns) {
        self.erase_meta(key, patterns);
        self.refresh(patterns);
    }

    pub fn add_tag(&mut self, tag: &str, patterns: &Patterns) {
        if self.tags.iter().any(|existing| existing == tag) {
            return;
        }
        let token = format!("{}{tag}", patterns.config().tasks.tag_prefix);
        self.append_token(&token, patterns);
        self.refresh(patterns);
    }

    pub fn add_context(&mut self, context: &str, patterns: &Patterns) {
        if self.contexts.iter().any(|existing| existing == context) {
            return;
        }
        let token = format!("{}{context}", patterns.config().tasks.context_prefix);
        self.append_token(&token, patterns);
        self.refresh(patterns);
    }

    fn write_meta(&mut self, key: &str, value: &str, patterns: &Patterns) {
        let token = format!("{key}{}{}", patterns.meta_sep(), quote(value));

        let title_spans = Spans::scan(&self.text);
        if let Some(found) = patterns
            .meta_tokens(&self.text, &title_spans)
            .into_iter()
            .find(|found| found.key == key)
        {
            self.text.replace_range(found.range, &token);
            return;
        }

        for idx in self.body_range() {
            let (body, eol) = split_eol(&self.description[idx]);
            let spans = Spans::scan(body);
            if let Some(found) = patterns
                .meta_tokens(body, &spans)
                .into_iter()
                .find(|found| found.key == key)
            {
                let mut line = body.to_string();
                line.replace_range(found.range, &token);
                line.push_str(eol);
                self.description[idx] = line;
                return;
            }
        }

        self.append_token(&token, patterns);
    }

    fn erase_meta(&mut self, key: &str, patterns: &Patterns) {
        let title = strip_meta(&self.text, patterns, |found| found == key);
        let title = title.trim_end();
        if !title.trim().is_empty() {
            self.text = title.to_string();
        }

        let mut emptied = Vec::new();
        for idx in self.body_range() {
            let (body, eol) = split_eol(&self.description[idx]);
            let stripped = strip_meta(body, patterns, |found| found == key);
            if stripped == body {
                continue;
            }
            if self.is_blank_line(&stripped) {
                emptied.push(idx);
            } else {
                self.description[idx] = format!("{}{eol}", stripped.trim_end());
            }
        }
        for idx in emptied.into_iter().rev() {
            self.description.remove(idx);
        }
        self.prune_empty_comments();
    }

    /// Line holds nothing but decoration
    fn is_blank_line(&self, line: &str) -> bool {
        let trimmed = line.trim();
        if self.lang.is_markdown() {
            trimmed.is_empty() || is_empty_comment(trimmed)
        } else {
            let closes = self
                .lang
                .block_end()
                .is_some_and(|end| line.contains(end));
            boundary::strip_comment(line, &self.lang).is_empty() && !closes
        }
    }

    /// Drop `<!--` / `-->` pairs left with nothing between them
    fn prune_empty_comments(&mut self) {
        if !self.lang.is_markdown() {
            return;
        }
        loop {
            let body = self.body_range();
            let pair = body.clone().zip(body.clone().skip(1)).find(|&(open, close)| {
                boundary::body(&self.description[open]).trim() == "<!--"
                    && boundary::body(&self.description[close]).trim() == "-->"
            });
            match pair {
                Some((open, _)) => {
                    self.description.drain(open..open + 2);
                }
                None => break,
            }
        }
    }

    /// Append a token to the last comment of the task, creating one when
    /// the description has none.
    fn append_token(&mut self, token: &str, patterns: &Patterns) {
        if !self.lang.is_markdown() {
            self.append_code_token(token);
            return;
        }

        let meta_new_line = patterns.config().tasks.meta_new_line;
        let body = self.body_range();
        let last = body
            .clone()
            .rev()
            .find(|&idx| !boundary::body(&self.description[idx]).trim().is_empty());

        if let Some(idx) = last {
            let line = boundary::body(&self.description[idx]).trim_end().to_string();
            if line.ends_with("-->") {
                if line.trim_start() == "-->" {
                    let indent = leading_ws(&line);
                    self.description
                        .insert(idx, format!("{indent}{token}{}", self.eol));
                } else {
                    let head = line[..line.len() - 3].trim_end();
                    self.description[idx] = format!("{head} {token} -->{}", self.eol);
                }
                return;
            }
        }

        let at = last.map_or(body.start, |idx| idx + 1);
        let indent = self.continuation.clone();
        let block = if meta_new_line {
            vec![
                format!("{indent}<!--{}", self.eol),
                format!("{indent}{token}{}", self.eol),
                format!("{indent}-->{}", self.eol),
            ]
        } else {
            vec![format!("{indent}<!-- {token} -->{}", self.eol)]
        };
        self.description.splice(at..at, block);
    }

    fn append_code_token(&mut self, token: &str) {
        if self.description.is_empty() && self.single_line_block {
            self.text = format!("{} {token}", self.text);
            return;
        }
        let line = format!("{}{token}{}", self.continuation, self.eol);
        let body = self.body_range();
        if self.closes_block && !body.is_empty() {
            self.description.insert(body.end - 1, line);
        } else {
            self.description.insert(body.end, line);
        }
    }
}

/// Prefix new description lines get
fn continuation(marker: &MarkerMatch, boundary: &Boundary, lang: &Lang, in_block: bool) -> String {
    let first = boundary
        .raw_lines
        .iter()
        .skip(usize::from(boundary.wrapped))
        .find(|line| !boundary::body(line).trim().is_empty());

    if lang.is_markdown() {
        let marker_line = match &marker.kind {
            MarkerKind::Checkbox { bullet, .. } => format!("{}{bullet} [ ] ", marker.before),
            _ => marker.before.clone(),
        };
        if let Some(column) = pattern::list_content_column(&marker_line) {
            return " ".repeat(column);
        }
        return first.map(|line| leading_ws(line).to_string()).unwrap_or_default();
    }

    if let Some(line) = first {
        let (prefix, _) = boundary::split_comment(line, lang);
        let mut prefix = boundary::body(line)[..prefix].to_string();
        if !prefix.trim().is_empty() {
            if !prefix.ends_with(' ') {
                prefix.push(' ');
            }
            return prefix;
        }
    }

    let ws = leading_ws(&marker.before);
    let decoration = marker.before.trim_start();
    if in_block {
        let opens_here = lang
            .block_start()
            .is_some_and(|start| decoration.starts_with(start));
        match lang.block_ignore() {
            Some(ignore) if opens_here => format!("{ws} {ignore} "),
            Some(ignore) => format!("{ws}{ignore} "),
            None if opens_here => format!("{ws}   "),
            None => ws.to_string(),
        }
    } else if !lang.symbol.is_empty() {
        format!("{ws}{} ", lang.symbol)
    } else {
        ws.to_string()
    }
}

/// Render an order the way it is written back
pub fn format_order(order: f64) -> String {
    if order == 0.0 {
        "0".to_string()
    } else {
        format!("{order}")
    }
}

/// Parse a written order; non-finite values count as absent
pub fn parse_order(text: &str) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|order| order.is_finite())
}

fn quote(value: &str) -> String {
    if value.is_empty() || value.chars().any(char::is_whitespace) {
        format!("\"{value}\"")
    } else {
        value.to_string()
    }
}

fn split_eol(line: &str) -> (&str, &str) {
    match line.strip_suffix('\r') {
        Some(body) => (body, "\r"),
        None => (line, ""),
    }
}

fn leading_ws(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}

fn is_empty_comment(trimmed: &str) -> bool {
    trimmed.len() >= 7
        && trimmed.starts_with("<!--")
        && trimmed.ends_with("-->")
        && trimmed[4..trimmed.len() - 3].trim().is_empty()
}

/// Remove metadata tokens whose key passes `select`, with the whitespace
/// in front of each
fn strip_meta(text: &str, patterns: &Patterns, select: impl Fn(&str) -> bool) -> String {
    let spans = Spans::scan(text);
    let mut out = text.to_string();
    for found in patterns.meta_tokens(text, &spans).into_iter().rev() {
        if !select(&found.key) {
            continue;
        }
        let start = out[..found.range.start]
            .trim_end_matches([' ', '\t'])
            .len();
        out.replace_range(start..found.range.end, "");
    }
    out
}

fn normalize_description(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut previous_blank = false;
    for line in text.split('\n') {
        let line = boundary::body(line);
        let blank = line.trim().is_empty();
        if blank && previous_blank {
            continue;
        }
        previous_blank = blank;
        lines.push(if blank { String::new() } else { line.to_string() });
    }
    if lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }
    lines
}

fn extend_unique(target: &mut Vec<String>, items: impl IntoIterator<Item = String>) {
    for item in items {
        if !target.contains(&item) {
            target.push(item);
        }
    }
}

/// `a/b/c` yields `a`, `a/b` and `a/b/c`
fn topics(tags: &[String]) -> Vec<String> {
    let mut topics = Vec::new();
    for tag in tags {
        let mut prefix = String::new();
        for part in tag.split('/').filter(|part| !part.is_empty()) {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(part);
            if !topics.contains(&prefix) {
                topics.push(prefix.clone());
            }
        }
    }
    topics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::file;
    use chrono::TimeZone;

    fn patterns_with(edit: impl FnOnce(&mut Config)) -> Patterns {
        let mut config = Config::default();
        edit(&mut config);
        Patterns::new(&config).expect("patterns")
    }

    fn first_task(content: &str, patterns: &Patterns) -> Task {
        first_task_in("notes.md", content, patterns)
    }

    fn first_task_in(path: &str, content: &str, patterns: &Patterns) -> Task {
        file::extract(Path::new(path), content, patterns)
            .into_iter()
            .next()
            .expect("task")
    }

    fn render(task: &Task, patterns: &Patterns) -> String {
        task.raw_lines(patterns).join("\n")
    }

    #[test]
    fn parse_collects_derived_fields() {
        let p = patterns_with(|_| {});
        let task = first_task(
            "#DOING:20 Fix +parser/lexer @home due:2024-05-01\nMore on +docs\n<!-- owner:\"Ann Lee\" -->\n",
            &p,
        );
        assert_eq!(task.list(), "DOING");
        assert_eq!(task.order(), Some(20.0));
        assert_eq!(task.tags(), ["parser/lexer", "docs"]);
        assert_eq!(task.contexts(), ["home"]);
        assert_eq!(task.meta_value("due"), Some("2024-05-01"));
        assert_eq!(task.meta_value("owner"), Some("Ann Lee"));
        assert_eq!(task.topics(), ["parser", "parser/lexer", "docs"]);
        assert_eq!(task.interpreted_content(), "Fix +parser/lexer @home\nMore on +docs");
        assert_eq!(task.line(), 1);
        assert_eq!(task.last_line(), 3);
    }

    #[test]
    fn meta_order_wins_over_inline() {
        let p = patterns_with(|_| {});
        let task = first_task("#TODO:5 Task\n<!-- order:30 -->\n", &p);
        assert_eq!(task.order(), Some(30.0));
    }

    #[test]
    fn parse_is_idempotent() {
        let p = patterns_with(|_| {});
        let mut task = first_task("- [ ] Buy milk +errand\n  <!-- order:10 -->\n", &p);
        let before = (task.tags().to_vec(), task.meta().clone(), task.order(), task.content().to_string());
        task.parse(&p);
        task.parse(&p);
        let after = (task.tags().to_vec(), task.meta().clone(), task.order(), task.content().to_string());
        assert_eq!(before, after);
    }

    #[test]
    fn order_meta_appends_comment_block() {
        let p = patterns_with(|_| {});
        let mut task = first_task("#TODO A task\n", &p);
        task.set_order(Some(0.0), &p);
        assert_eq!(render(&task, &p), "#TODO A task\n<!-- order:0 -->");
        assert_eq!(task.order(), Some(0.0));
    }

    #[test]
    fn order_meta_updates_existing_token_in_place() {
        let p = patterns_with(|_| {});
        let mut task = first_task("#TODO A task\nnotes\n<!-- due:soon order:10 -->\n", &p);
        task.set_order(Some(25.0), &p);
        assert_eq!(
            render(&task, &p),
            "#TODO A task\nnotes\n<!-- due:soon order:25 -->"
        );
    }

    #[test]
    fn order_meta_joins_trailing_comment() {
        let p = patterns_with(|_| {});
        let mut task = first_task("#TODO A task\n<!-- due:soon -->\n", &p);
        task.set_order(Some(5.5), &p);
        assert_eq!(render(&task, &p), "#TODO A task\n<!-- due:soon order:5.5 -->");

        let p = patterns_with(|config| config.tasks.meta_new_line = true);
        let mut task = first_task("#TODO A task\n<!--\ndue:soon\n-->\n", &p);
        task.set_order(Some(1.0), &p);
        assert_eq!(render(&task, &p), "#TODO A task\n<!--\ndue:soon\norder:1\n-->");
    }

    #[test]
    fn inline_order_mode_strips_meta() {
        let p = patterns_with(|config| config.tasks.order_meta = false);
        let mut task = first_task("#TODO: A task\n<!-- order:10 -->\n", &p);
        task.set_order(Some(15.0), &p);
        assert_eq!(render(&task, &p), "#TODO:15 A task");

        task.set_order(None, &p);
        assert_eq!(render(&task, &p), "#TODO A task");
    }

    #[test]
    fn keep_empty_priority_keeps_colon() {
        let p = patterns_with(|config| {
            config.tasks.order_meta = false;
            config.tasks.keep_empty_priority = true;
        });
        let mut task = first_task("#TODO:10 A task\n", &p);
        task.set_order(None, &p);
        assert_eq!(render(&task, &p), "#TODO: A task");
    }

    #[test]
    fn checkbox_always_uses_meta() {
        let p = patterns_with(|config| config.tasks.order_meta = false);
        let mut task = first_task("- [ ] Buy milk\n", &p);
        task.set_order(Some(10.0), &p);
        assert_eq!(render(&task, &p), "- [ ] Buy milk\n  <!-- order:10 -->");
    }

    #[test]
    fn remove_meta_drops_emptied_lines() {
        let p = patterns_with(|_| {});
        let mut task = first_task("#TODO Task\ntext\n<!--\norder:10\n-->\n", &p);
        task.remove_meta(ORDER_KEY, &p);
        assert_eq!(render(&task, &p), "#TODO Task\ntext");

        let mut task = first_task("#TODO Task\n<!-- order:10 -->\n", &p);
        task.remove_meta(ORDER_KEY, &p);
        assert_eq!(render(&task, &p), "#TODO Task");
    }

    #[test]
    fn code_task_meta_goes_on_new_comment_line() {
        let p = patterns_with(|_| {});
        let mut task = first_task_in("src/lib.rs", "    // #TODO Fix it\n    // detail\nfn x() {}\n", &p);
        task.set_order(Some(10.0), &p);
        assert_eq!(
            render(&task, &p),
            "    // #TODO Fix it\n    // detail\n    // order:10"
        );

        let mut task = first_task_in("src/lib.rs", "/* #TODO Fix it */\nfn x() {}\n", &p);
        task.set_order(Some(10.0), &p);
        assert_eq!(render(&task, &p), "/* #TODO Fix it order:10 */");

        let mut task = first_task_in("src/lib.rs", "/* #TODO Fix it\n   closing detail */\n", &p);
        task.set_order(Some(10.0), &p);
        assert_eq!(
            render(&task, &p),
            "/* #TODO Fix it\n * order:10\n   closing detail */"
        );
    }

    #[test]
    fn update_from_content_collapses_blank_runs() {
        let p = patterns_with(|_| {});
        let mut task = first_task("#TODO Task\nold\n", &p);
        task.update_from_content("one\n\n\n\ntwo\n", &p);
        assert_eq!(task.description(), ["one", "", "two"]);
        assert_eq!(task.content(), "one\n\ntwo");
        assert_eq!(task.last_line(), task.line() + 3);
    }

    #[test]
    fn update_from_content_in_source_file() {
        let p = patterns_with(|_| {});
        let mut task = first_task_in("main.py", "# #TODO Task\n# old\nprint()\n", &p);
        task.update_from_content("new +tag\n\nsecond", &p);
        assert_eq!(task.description(), ["# new +tag", "#", "# second"]);
        assert_eq!(task.tags(), ["tag"]);
    }

    #[test]
    fn update_from_content_keeps_wrapper() {
        let p = patterns_with(|_| {});
        let mut task = first_task("#TODO Task\n<card>\nold\n</card>\n", &p);
        task.update_from_content("new", &p);
        assert_eq!(task.description(), ["<card>", "new", "</card>"]);
        assert_eq!(task.content(), "new");
    }

    #[test]
    fn move_checkbox_between_lists() {
        let p = patterns_with(|_| {});
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).single().expect("time");
        let mut task = first_task("- [ ] Buy milk\n", &p);

        task.move_to_list("DONE", &p, now);
        assert_eq!(
            render(&task, &p),
            "- [x] Buy milk\n  <!-- completed:2024-03-01T12:00:00Z -->"
        );
        assert_eq!(task.meta_value(COMPLETED_KEY), Some("2024-03-01T12:00:00Z"));

        task.move_to_list("TODO", &p, now);
        assert_eq!(render(&task, &p), "- [ ] Buy milk");

        task.move_to_list("DOING", &p, now);
        assert_eq!(render(&task, &p), "- [ ] #DOING Buy milk");
        assert_eq!(task.list(), "DOING");
    }

    #[test]
    fn move_tag_behind_checkbox_ticks_box() {
        let p = patterns_with(|config| config.tasks.add_completed_meta = false);
        let now = Utc::now();
        let mut task = first_task("- [ ] #DOING Ship it\n", &p);
        task.move_to_list("DONE", &p, now);
        assert_eq!(render(&task, &p), "- [x] #DONE Ship it");
        task.move_to_list("DOING", &p, now);
        assert_eq!(render(&task, &p), "- [ ] #DOING Ship it");
    }

    #[test]
    fn add_tag_and_context() {
        let p = patterns_with(|_| {});
        let mut task = first_task("#TODO Task\n", &p);
        task.add_tag("urgent", &p);
        task.add_context("work", &p);
        task.add_tag("urgent", &p);
        assert_eq!(render(&task, &p), "#TODO Task\n<!-- +urgent @work -->");
        assert_eq!(task.tags(), ["urgent"]);
        assert_eq!(task.contexts(), ["work"]);
    }

    #[test]
    fn defaults_are_unioned() {
        let p = patterns_with(|_| {});
        let defaults = TaskDefaults {
            tags: vec!["project".to_string()],
            contexts: vec!["office".to_string()],
            meta: BTreeMap::from([("owner".to_string(), vec!["sam".to_string()])]),
        };
        let tasks = file::extract_with_defaults(Path::new("a.md"), "#TODO Task +own\n", &defaults, &p);
        let task = &tasks[0];
        assert_eq!(task.tags(), ["own", "project"]);
        assert_eq!(task.contexts(), ["office"]);
        assert_eq!(task.meta_value("owner"), Some("sam"));
    }

    #[test]
    fn order_formatting() {
        assert_eq!(format_order(0.0), "0");
        assert_eq!(format_order(-0.0), "0");
        assert_eq!(format_order(25.0), "25");
        assert_eq!(format_order(12.5), "12.5");
        assert_eq!(parse_order("1e3"), Some(1000.0));
        assert_eq!(parse_order("NaN"), None);
        assert_eq!(parse_order("soon"), None);
    }
}
