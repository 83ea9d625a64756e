//! Recognizers for task markers and inline tokens.
//!
//! Three marker syntaxes start a task:
//! - tag style: `#TODO:10 Fix the parser`
//! - link style: `[Fix the parser](#TODO:10)`
//! - checkbox style: `- [ ] Fix the parser`
//!
//! Inside task text, `key:value` pairs are metadata, `+name` is a tag and
//! `@name` is a context. Nothing that starts inside a code span or fenced
//! block is recognized; tags inside a link label are skipped as well.

use std::collections::HashSet;
use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::Config;
use crate::error::{Error, Result};

const ORDER_PATTERN: &str = r"-?\d+(?:\.\d+)?(?:[eE][+-]?\d+)?";

static CHECKBOX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<indent>[ \t]*)(?P<bullet>[-*+]) \[(?P<mark>[ xX])\] (?P<text>\S.*)$")
        .expect("valid checkbox regex")
});

static CHECKBOX_PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<indent>[ \t]*)[-*+] \[(?P<mark>[ xX])\] ").expect("valid checkbox prefix regex")
});

static LIST_ITEM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<indent>[ \t]*)(?:[-*+]|\d+[.)])(?:[ \t]|$)").expect("valid list item regex")
});

static LINK_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[^\[\]\n]*\]\(").expect("valid link label regex"));

/// Marker syntax and the capture fields only that syntax carries
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarkerKind {
    Tag {
        has_colon: bool,
        /// Whitespace between the marker and the title
        gap: String,
    },
    Link,
    Checkbox {
        bullet: char,
        mark: char,
    },
}

impl MarkerKind {
    pub fn name(&self) -> &'static str {
        match self {
            MarkerKind::Tag { .. } => "tag",
            MarkerKind::Link => "link",
            MarkerKind::Checkbox { .. } => "checkbox",
        }
    }

    /// Order can be written into the marker itself
    pub fn has_inline_order(&self) -> bool {
        !matches!(self, MarkerKind::Checkbox { .. })
    }
}

/// A recognized task marker on one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerMatch {
    pub kind: MarkerKind,
    pub list: String,
    /// Order exactly as written, if any
    pub order: Option<String>,
    pub text: String,
    /// Everything on the line before the marker
    pub before: String,
    /// Everything on the line after the title
    pub after: String,
}

/// A `key<SEP>value` token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaToken {
    pub key: String,
    pub value: String,
    /// Byte range of the whole token, quotes included
    pub range: Range<usize>,
}

/// Byte ranges that recognizers must not look into
#[derive(Debug, Clone, Default)]
pub struct Spans {
    code: Vec<Range<usize>>,
    link_labels: Vec<Range<usize>>,
}

impl Spans {
    /// Compute fenced block, inline code and link label spans of `text`
    pub fn scan(text: &str) -> Self {
        let mut code = Vec::new();
        let mut fence_start: Option<usize> = None;
        let mut offset = 0;

        for line in text.split_inclusive('\n') {
            let end = offset + line.len();
            if is_fence(line) {
                match fence_start.take() {
                    Some(start) => code.push(start..end),
                    None => fence_start = Some(offset),
                }
            } else if fence_start.is_none() {
                inline_code(line, offset, &mut code);
            }
            offset = end;
        }
        if let Some(start) = fence_start {
            code.push(start..text.len());
        }

        let link_labels = LINK_LABEL_RE
            .find_iter(text)
            .map(|m| m.start()..m.end())
            .collect();

        Self { code, link_labels }
    }

    pub fn in_code(&self, offset: usize) -> bool {
        self.code.iter().any(|span| span.contains(&offset))
    }

    pub fn in_link_label(&self, offset: usize) -> bool {
        self.link_labels.iter().any(|span| span.contains(&offset))
    }
}

fn inline_code(line: &str, offset: usize, spans: &mut Vec<Range<usize>>) {
    let bytes = line.as_bytes();
    let mut idx = 0;
    while idx < bytes.len() {
        if bytes[idx] != b'`' {
            idx += 1;
            continue;
        }
        let open = idx;
        while idx < bytes.len() && bytes[idx] == b'`' {
            idx += 1;
        }
        let run = idx - open;
        let mut search = idx;
        let mut closed = None;
        while search < bytes.len() {
            if bytes[search] == b'`' {
                let close = search;
                while search < bytes.len() && bytes[search] == b'`' {
                    search += 1;
                }
                if search - close == run {
                    closed = Some(search);
                    break;
                }
            } else {
                search += 1;
            }
        }
        if let Some(end) = closed {
            spans.push(offset + open..offset + end);
            idx = end;
        }
    }
}

/// Line opens or closes a fenced code block
pub fn is_fence(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

/// Indentation of a checkbox line, if the line is one
pub fn checkbox_indent(line: &str) -> Option<usize> {
    CHECKBOX_PREFIX_RE
        .captures(line)
        .map(|caps| indent_width(&caps["indent"]))
}

/// Indentation of a markdown list item, if the line is one
pub fn list_item_indent(line: &str) -> Option<usize> {
    LIST_ITEM_RE
        .captures(line)
        .map(|caps| indent_width(&caps["indent"]))
}

/// Column where the text of a list item starts
pub fn list_content_column(line: &str) -> Option<usize> {
    LIST_ITEM_RE
        .find(line)
        .map(|found| found.as_str().chars().count())
}

/// Checkbox prefix (`  - [ ] `) at the start of `text`, with its mark
pub fn checkbox_prefix(text: &str) -> Option<(Range<usize>, char)> {
    let caps = CHECKBOX_PREFIX_RE.captures(text)?;
    let whole = caps.get(0)?;
    let mark = caps["mark"].chars().next()?;
    Some((whole.start()..whole.end(), mark))
}

fn indent_width(indent: &str) -> usize {
    indent.chars().map(|ch| if ch == '\t' { 4 } else { 1 }).sum()
}

/// Compiled recognizers for one configuration
#[derive(Debug, Clone)]
pub struct Patterns {
    config: Config,
    lists: HashSet<String>,
    tag_marker: Regex,
    link_marker: Regex,
    meta: Regex,
    tag: Regex,
    context: Regex,
}

impl Patterns {
    pub fn new(config: &Config) -> Result<Self> {
        let tasks = &config.tasks;
        let compile = |pattern: String| {
            Regex::new(&pattern)
                .map_err(|err| Error::InvalidConfig(format!("pattern '{pattern}': {err}")))
        };

        let tag_marker = compile(format!(
            r"(?:^|[^\w])(?P<prefix>{prefix})(?P<list>[A-Za-z][\w-]*)(?:(?P<colon>:)(?P<order>{ORDER_PATTERN})?)?(?P<gap>[ \t]+)(?P<text>\S.*)$",
            prefix = regex::escape(&tasks.token_prefix),
        ))?;
        let link_marker = compile(format!(
            r"\[(?P<text>[^\[\]]+)\]\(#(?P<list>[A-Za-z][\w-]*):(?P<order>{ORDER_PATTERN})?\)"
        ))?;
        let meta = compile(format!(
            r#"(?:^|\s)(?P<key>[A-Za-z][\w.-]*){sep}(?P<value>"[^"]*"|[^\s"]\S*)"#,
            sep = regex::escape(&tasks.meta_sep),
        ))?;
        let tag = compile(format!(
            r"(?:^|\s){}(?P<name>\w[\w/.-]*)",
            regex::escape(&tasks.tag_prefix)
        ))?;
        let context = compile(format!(
            r"(?:^|\s){}(?P<name>\w[\w/.-]*)",
            regex::escape(&tasks.context_prefix)
        ))?;

        let lists = config
            .lists
            .iter()
            .filter(|list| !list.ignore)
            .map(|list| list.name.clone())
            .collect();

        Ok(Self {
            config: config.clone(),
            lists,
            tag_marker,
            link_marker,
            meta,
            tag,
            context,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn meta_sep(&self) -> &str {
        &self.config.tasks.meta_sep
    }

    /// Find the task marker on `line`.
    ///
    /// `offset` is the byte offset of the line within the text `spans` was
    /// computed over. When `block_end` is given and the title contains it,
    /// the title stops before it and the token goes to `after`.
    pub fn match_marker(
        &self,
        line: &str,
        offset: usize,
        spans: &Spans,
        block_end: Option<&str>,
    ) -> Option<MarkerMatch> {
        let (body, eol) = match line.strip_suffix('\r') {
            Some(body) => (body, "\r"),
            None => (line, ""),
        };

        let tag = self.match_tag(body, offset, spans);
        let link = self.match_link(body, offset, spans);
        let found = match (tag, link) {
            (Some(tag), Some(link)) => Some(if link.0 < tag.0 { link } else { tag }),
            (tag, link) => tag.or(link),
        };

        let mut marker = match found {
            Some((_, marker)) => marker,
            None => self.match_checkbox(body, offset, spans)?,
        };

        if let Some(end) = block_end.filter(|end| !end.is_empty()) {
            if !matches!(marker.kind, MarkerKind::Link) {
                if let Some(pos) = marker.text.find(end) {
                    let head = marker.text[..pos].trim_end().to_string();
                    let tail = marker.text[head.len()..].to_string();
                    if !head.is_empty() {
                        marker.after = format!("{tail}{}", marker.after);
                        marker.text = head;
                    }
                }
            }
        }
        marker.after.push_str(eol);
        Some(marker)
    }

    /// Line carries a task marker
    pub fn has_marker(&self, line: &str, offset: usize, spans: &Spans) -> bool {
        self.match_marker(line, offset, spans, None).is_some()
    }

    fn match_tag(&self, body: &str, offset: usize, spans: &Spans) -> Option<(usize, MarkerMatch)> {
        let mut from = 0;
        while from < body.len() {
            let caps = self.tag_marker.captures_at(body, from)?;
            let prefix = caps.name("prefix")?;
            let list = &caps["list"];
            let start = prefix.start();
            if self.lists.contains(list) && !spans.in_code(offset + start) {
                let text = caps.name("text")?;
                return Some((
                    start,
                    MarkerMatch {
                        kind: MarkerKind::Tag {
                            has_colon: caps.name("colon").is_some(),
                            gap: caps["gap"].to_string(),
                        },
                        list: list.to_string(),
                        order: caps.name("order").map(|m| m.as_str().to_string()),
                        text: text.as_str().to_string(),
                        before: body[..start].to_string(),
                        after: String::new(),
                    },
                ));
            }
            from = prefix.end();
        }
        None
    }

    fn match_link(&self, body: &str, offset: usize, spans: &Spans) -> Option<(usize, MarkerMatch)> {
        self.link_marker.captures_iter(body).find_map(|caps| {
            let whole = caps.get(0)?;
            let list = &caps["list"];
            if !self.lists.contains(list) || spans.in_code(offset + whole.start()) {
                return None;
            }
            Some((
                whole.start(),
                MarkerMatch {
                    kind: MarkerKind::Link,
                    list: list.to_string(),
                    order: caps.name("order").map(|m| m.as_str().to_string()),
                    text: caps["text"].to_string(),
                    before: body[..whole.start()].to_string(),
                    after: body[whole.end()..].to_string(),
                },
            ))
        })
    }

    fn match_checkbox(&self, body: &str, offset: usize, spans: &Spans) -> Option<MarkerMatch> {
        let tasks = &self.config.tasks;
        if !tasks.checkbox_tasks {
            return None;
        }
        let caps = CHECKBOX_RE.captures(body)?;
        let bullet = caps.name("bullet")?;
        if spans.in_code(offset + bullet.start()) {
            return None;
        }
        let mark = caps["mark"].chars().next()?;
        let list = if mark == ' ' {
            &tasks.default_list
        } else {
            &tasks.done_list
        };
        if !self.lists.contains(list) {
            return None;
        }
        Some(MarkerMatch {
            kind: MarkerKind::Checkbox {
                bullet: bullet.as_str().chars().next()?,
                mark,
            },
            list: list.clone(),
            order: None,
            text: caps["text"].to_string(),
            before: caps["indent"].to_string(),
            after: String::new(),
        })
    }

    /// Metadata tokens in `text`, skipping code spans
    pub fn meta_tokens(&self, text: &str, spans: &Spans) -> Vec<MetaToken> {
        self.meta
            .captures_iter(text)
            .filter_map(|caps| {
                let key = caps.name("key")?;
                let value = caps.name("value")?;
                if spans.in_code(key.start()) || value.as_str().starts_with("//") {
                    return None;
                }
                let raw = value.as_str();
                let value = raw
                    .strip_prefix('"')
                    .and_then(|v| v.strip_suffix('"'))
                    .unwrap_or(raw);
                Some(MetaToken {
                    key: key.as_str().to_string(),
                    value: value.to_string(),
                    range: key.start()..caps.get(0)?.end(),
                })
            })
            .collect()
    }

    /// `+tag` names in `text`, skipping code spans and link labels
    pub fn tags(&self, text: &str, spans: &Spans) -> Vec<String> {
        names(&self.tag, text, |start| {
            spans.in_code(start) || spans.in_link_label(start)
        })
    }

    /// `@context` names in `text`, skipping code spans
    pub fn contexts(&self, text: &str, spans: &Spans) -> Vec<String> {
        names(&self.context, text, |start| spans.in_code(start))
    }
}

fn names(re: &Regex, text: &str, skip: impl Fn(usize) -> bool) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for caps in re.captures_iter(text) {
        let Some(name) = caps.name("name") else {
            continue;
        };
        if skip(name.start()) {
            continue;
        }
        let name = name.as_str().trim_end_matches(['.', '/']).to_string();
        if !name.is_empty() && !out.contains(&name) {
            out.push(name);
        }
    }
    out
}

/// Render the marker text for a task.
///
/// `order` is written inline only for syntaxes that support it. For tag
/// style the colon is written when an order is present or `has_colon` is
/// set.
pub fn render_marker(
    kind: &MarkerKind,
    list: &str,
    order: Option<&str>,
    text: &str,
    prefix: &str,
) -> String {
    match kind {
        MarkerKind::Tag { has_colon, gap } => {
            let gap = if gap.is_empty() { " " } else { gap.as_str() };
            match order {
                Some(order) => format!("{prefix}{list}:{order}{gap}{text}"),
                None if *has_colon => format!("{prefix}{list}:{gap}{text}"),
                None => format!("{prefix}{list}{gap}{text}"),
            }
        }
        MarkerKind::Link => format!("[{text}](#{list}:{})", order.unwrap_or_default()),
        MarkerKind::Checkbox { bullet, mark } => format!("{bullet} [{mark}] {text}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns() -> Patterns {
        Patterns::new(&Config::default()).expect("patterns")
    }

    fn marker(line: &str) -> Option<MarkerMatch> {
        patterns().match_marker(line, 0, &Spans::scan(line), None)
    }

    #[test]
    fn tag_marker_with_order() {
        let m = marker("// #TODO:10 Fix the parser").expect("marker");
        assert_eq!(m.list, "TODO");
        assert_eq!(m.order.as_deref(), Some("10"));
        assert_eq!(m.text, "Fix the parser");
        assert_eq!(m.before, "// ");
        assert_eq!(
            m.kind,
            MarkerKind::Tag {
                has_colon: true,
                gap: " ".to_string()
            }
        );
    }

    #[test]
    fn heading_prefix_is_before_text() {
        let m = marker("## #DOING Write docs").expect("marker");
        assert_eq!(m.before, "## ");
        assert_eq!(m.list, "DOING");
        assert!(m.order.is_none());
    }

    #[test]
    fn unknown_list_is_not_a_marker() {
        assert!(marker("#NOPE not a task").is_none());
        assert!(marker("#todo lowercase list").is_none());
        assert!(marker("issue#TODO glued to a word").is_none());
    }

    #[test]
    fn link_marker() {
        let m = marker("See [Ship it](#DONE:) soon").expect("marker");
        assert_eq!(m.kind, MarkerKind::Link);
        assert_eq!(m.list, "DONE");
        assert!(m.order.is_none());
        assert_eq!(m.text, "Ship it");
        assert_eq!(m.before, "See ");
        assert_eq!(m.after, " soon");

        let m = marker("[Ship it](#DONE:2.5)").expect("marker");
        assert_eq!(m.order.as_deref(), Some("2.5"));
    }

    #[test]
    fn checkbox_marker() {
        let m = marker("  - [ ] Buy milk").expect("marker");
        assert_eq!(m.list, "TODO");
        assert_eq!(m.before, "  ");
        assert_eq!(m.text, "Buy milk");
        let m = marker("* [x] Bought milk").expect("marker");
        assert_eq!(m.list, "DONE");
    }

    #[test]
    fn tag_behind_checkbox_wins() {
        let m = marker("- [ ] #DOING Buy milk").expect("marker");
        assert_eq!(m.list, "DOING");
        assert_eq!(m.before, "- [ ] ");
        assert!(matches!(m.kind, MarkerKind::Tag { .. }));
    }

    #[test]
    fn marker_in_inline_code_is_skipped() {
        assert!(marker("Use `#TODO text` to add a task").is_none());
    }

    #[test]
    fn marker_in_fence_is_skipped() {
        let text = "```\n#TODO inside fence\n```\n#TODO outside\n";
        let spans = Spans::scan(text);
        let p = patterns();
        assert!(p.match_marker("#TODO inside fence", 4, &spans, None).is_none());
        let offset = text.find("#TODO outside").expect("offset");
        assert!(p.match_marker("#TODO outside", offset, &spans, None).is_some());
    }

    #[test]
    fn block_end_moves_to_after() {
        let p = patterns();
        let line = "/* #TODO Fix it */\r";
        let m = p
            .match_marker(line, 0, &Spans::scan(line), Some("*/"))
            .expect("marker");
        assert_eq!(m.text, "Fix it");
        assert_eq!(m.after, " */\r");
    }

    #[test]
    fn meta_tokens_parse_quoted_and_skip_urls() {
        let p = patterns();
        let text = r#"due:2024-01-01 owner:"Ann Lee" see https://example.com `skip:me`"#;
        let tokens = p.meta_tokens(text, &Spans::scan(text));
        let pairs: Vec<_> = tokens
            .iter()
            .map(|t| (t.key.as_str(), t.value.as_str()))
            .collect();
        assert_eq!(pairs, vec![("due", "2024-01-01"), ("owner", "Ann Lee")]);
        assert_eq!(&text[tokens[1].range.clone()], r#"owner:"Ann Lee""#);
    }

    #[test]
    fn two_char_separator() {
        let mut config = Config::default();
        config.tasks.meta_sep = "::".to_string();
        let p = Patterns::new(&config).expect("patterns");
        let text = "order::10 plain:colon";
        let tokens = p.meta_tokens(text, &Spans::scan(text));
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].key, "order");
        assert_eq!(tokens[0].value, "10");
    }

    #[test]
    fn tags_and_contexts() {
        let p = patterns();
        let text = "Fix +parser/lexer @home [+not](x) mail a@b.c +parser/lexer.";
        let spans = Spans::scan(text);
        assert_eq!(p.tags(text, &spans), vec!["parser/lexer".to_string()]);
        assert_eq!(p.contexts(text, &spans), vec!["home".to_string()]);
    }

    #[test]
    fn render_marker_round_trips() {
        let p = patterns();
        for line in [
            "#TODO:10 Fix the parser",
            "#TODO: Fix the parser",
            "#TODO\tFix the parser",
            "[Ship it](#DONE:)",
            "[Ship it](#DONE:-1.5)",
            "- [X] Done thing",
        ] {
            let m = marker(line).expect("marker");
            let rendered = render_marker(
                &m.kind,
                &m.list,
                m.order.as_deref(),
                &m.text,
                &p.config().tasks.token_prefix,
            );
            assert_eq!(format!("{}{}{}", m.before, rendered, m.after), line);
        }
    }

    #[test]
    fn line_helpers() {
        assert_eq!(checkbox_indent("  - [ ] sub"), Some(2));
        assert_eq!(checkbox_indent("- item"), None);
        assert_eq!(list_item_indent("    1. item"), Some(4));
        assert_eq!(list_item_indent("-"), Some(0));
        assert_eq!(list_item_indent("--- rule"), None);
        assert!(is_fence("  ```rust"));
    }
}
