//! File model
//!
//! A [`File`] owns the text of one document and the tasks extracted from
//! it. Every mutation replaces exactly the lines of one task and shifts the
//! tasks after it, so the rest of the document is never touched.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::boundary::{self, MarkerContext};
use crate::error::{Error, Result};
use crate::lang::{self, Lang};
use crate::pattern::{self, MarkerKind, Patterns, Spans};
use crate::task::{Scanned, Task, TaskDefaults, TaskId};

const FRONT_MATTER_FENCE: &str = "---";

/// Result of removing a task from a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    /// Lines removed, blank lines collapsed around the task included
    pub removed_lines: usize,
    /// A markdown file has nothing but whitespace left
    pub file_empty: bool,
}

#[derive(Debug, Clone)]
pub struct File {
    path: PathBuf,
    lang: Lang,
    content: String,
    checksum: String,
    modified: bool,
    defaults: TaskDefaults,
    tasks: Vec<Task>,
}

impl File {
    pub fn new(path: impl Into<PathBuf>, lang: Lang, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            path: path.into(),
            lang,
            checksum: checksum(&content),
            content,
            modified: false,
            defaults: TaskDefaults::default(),
            tasks: Vec::new(),
        }
    }

    /// File with the language resolved from its extension
    pub fn for_path(path: impl Into<PathBuf>, content: impl Into<String>, patterns: &Patterns) -> Self {
        let path = path.into();
        let lang = lang_for(&path, patterns);
        Self::new(path, lang, content)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lang(&self) -> &Lang {
        &self.lang
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// SHA-256 of the content as last read or persisted
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    /// Content differs from what was last read or persisted
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn defaults(&self) -> &TaskDefaults {
        &self.defaults
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id() == id)
    }

    /// Task whose lines include the 1-based `line`
    pub fn task_at(&self, line: usize) -> Option<&Task> {
        self.tasks
            .iter()
            .find(|task| task.line() <= line && line <= task.last_line())
    }

    /// Record that the content has been written out
    pub fn mark_persisted(&mut self) {
        self.checksum = checksum(&self.content);
        self.modified = false;
    }

    /// Replace the content with what is on disk and re-extract
    pub fn reload(&mut self, content: impl Into<String>, patterns: &Patterns) -> &[Task] {
        self.content = content.into();
        self.mark_persisted();
        self.extract(patterns)
    }

    /// Find every task in the content.
    ///
    /// Tasks whose raw lines and position did not change keep their ids.
    pub fn extract(&mut self, patterns: &Patterns) -> &[Task] {
        let (defaults, skip) = if self.lang.is_markdown() {
            front_matter(&self.content, &self.path)
        } else {
            (TaskDefaults::default(), 0)
        };
        let mut tasks = scan(&self.path, &self.content, &self.lang, &defaults, skip, patterns);
        for task in &mut tasks {
            let previous = self
                .tasks
                .iter()
                .find(|old| old.line() == task.line() && old.synced() == task.synced());
            if let Some(previous) = previous {
                task.set_id(previous.id());
            }
        }
        debug!(path = %self.path.display(), tasks = tasks.len(), "extracted tasks");
        self.defaults = defaults;
        self.tasks = tasks;
        &self.tasks
    }

    /// Write a changed task back into the content.
    ///
    /// The task is found by the raw lines it was read with; when they are
    /// no longer at the recorded line a unique match elsewhere is accepted.
    pub fn modify_task(&mut self, task: &Task, patterns: &Patterns) -> Result<()> {
        let idx = self.record_index(task)?;
        let record = &self.tasks[idx];
        let id = record.id();
        let old_len = record.synced().len();
        let old_line = record.line();

        let lines: Vec<&str> = self.content.split('\n').collect();
        let start = self.locate(record, &lines)?;
        let replacement = task.raw_lines(patterns);
        let new_len = replacement.len();

        let content = lines[..start]
            .iter()
            .map(|line| (*line).to_string())
            .chain(replacement)
            .chain(lines[start + old_len..].iter().map(|line| (*line).to_string()))
            .collect::<Vec<_>>()
            .join("\n");
        self.content = content;
        self.modified = true;

        let delta = new_len as isize - old_len as isize;
        self.shift_after(old_line, delta);

        let mut updated = task.clone();
        updated.set_id(id);
        updated.mark_synced(start + 1, patterns);
        self.tasks[idx] = updated;

        debug!(
            path = %self.path.display(),
            line = start + 1,
            list = task.list(),
            delta,
            "modified task"
        );
        Ok(())
    }

    /// Replace a task's description with `text` and write it back
    pub fn modify_task_from_content(&mut self, task: &Task, text: &str, patterns: &Patterns) -> Result<()> {
        let mut updated = task.clone();
        updated.update_from_content(text, patterns);
        self.modify_task(&updated, patterns)
    }

    /// Remove a task, wrapper tags included, and collapse the blank lines
    /// left around it
    pub fn delete_task(&mut self, task: &Task, _patterns: &Patterns) -> Result<DeleteOutcome> {
        let idx = self.record_index(task)?;
        let record = &self.tasks[idx];
        let len = record.synced().len();
        let old_line = record.line();

        let lines: Vec<&str> = self.content.split('\n').collect();
        let start = self.locate(record, &lines)?;
        let mut kept: Vec<&str> = lines[..start]
            .iter()
            .chain(&lines[start + len..])
            .copied()
            .collect();

        let collapsed = collapse_seam(&mut kept, start);
        self.content = kept.join("\n");
        self.modified = true;

        let removed_lines = len + collapsed;
        self.tasks.remove(idx);
        self.shift_after(old_line, -(removed_lines as isize));

        let file_empty = self.lang.is_markdown() && self.content.trim().is_empty();
        debug!(
            path = %self.path.display(),
            line = old_line,
            removed_lines,
            file_empty,
            "deleted task"
        );
        Ok(DeleteOutcome {
            removed_lines,
            file_empty,
        })
    }

    /// Append a new tag-style task at the end of the file
    pub fn append_task(&mut self, list: &str, text: &str, patterns: &Patterns) -> Result<TaskId> {
        if !patterns.config().is_task_list(list) {
            return Err(Error::UnknownList(list.to_string()));
        }
        let text = text.trim();
        if text.is_empty() || text.contains('\n') {
            return Err(Error::InvalidArgument(
                "task text must be a single non-empty line".to_string(),
            ));
        }

        let marker = pattern::render_marker(
            &MarkerKind::Tag {
                has_colon: false,
                gap: " ".to_string(),
            },
            list,
            None,
            text,
            &patterns.config().tasks.token_prefix,
        );
        let line = if self.lang.is_markdown() {
            marker
        } else if !self.lang.symbol.is_empty() {
            format!("{} {marker}", self.lang.symbol)
        } else if let (Some(start), Some(end)) = (self.lang.block_start(), self.lang.block_end()) {
            format!("{start} {marker} {end}")
        } else {
            marker
        };

        let mut content = std::mem::take(&mut self.content);
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        let line_number = content.split('\n').count();
        content.push_str(&line);
        content.push('\n');
        self.content = content;
        self.modified = true;

        self.extract(patterns);
        self.tasks
            .iter()
            .find(|task| task.line() == line_number)
            .map(Task::id)
            .ok_or_else(|| {
                Error::OperationFailed(format!(
                    "appended task in {} was not recognized",
                    self.path.display()
                ))
            })
    }

    fn record_index(&self, task: &Task) -> Result<usize> {
        self.tasks
            .iter()
            .position(|record| record.id() == task.id())
            .or_else(|| {
                self.tasks.iter().position(|record| {
                    record.line() == task.line() && record.synced() == task.synced()
                })
            })
            .or_else(|| {
                let mut found = self
                    .tasks
                    .iter()
                    .enumerate()
                    .filter(|(_, record)| record.synced() == task.synced());
                match (found.next(), found.next()) {
                    (Some((idx, _)), None) => Some(idx),
                    _ => None,
                }
            })
            .ok_or_else(|| self.moved(task.line()))
    }

    /// 0-based line where the record's raw lines start
    fn locate(&self, record: &Task, lines: &[&str]) -> Result<usize> {
        let fingerprint = record.synced();
        let matches_at = |start: usize| {
            start + fingerprint.len() <= lines.len()
                && fingerprint
                    .iter()
                    .zip(&lines[start..])
                    .all(|(expected, actual)| expected == actual)
        };

        let expected = record.line().saturating_sub(1);
        if matches_at(expected) {
            return Ok(expected);
        }
        let mut found = (0..lines.len()).filter(|&start| matches_at(start));
        match (found.next(), found.next()) {
            (Some(start), None) => Ok(start),
            _ => {
                warn!(path = %self.path.display(), line = record.line(), "task no longer matches file");
                Err(self.moved(record.line()))
            }
        }
    }

    fn moved(&self, line: usize) -> Error {
        Error::TaskMoved {
            path: self.path.clone(),
            line,
        }
    }

    /// Shift every task that starts after `line` by `delta` lines
    fn shift_after(&mut self, line: usize, delta: isize) {
        if delta == 0 {
            return;
        }
        for task in self.tasks.iter_mut().filter(|task| task.line() > line) {
            task.shift(delta);
        }
    }
}

/// Remove surplus blank lines around the point where lines were cut out.
///
/// At the start of the file every blank line after the cut goes; at the
/// end every blank line before it. Elsewhere one blank line is kept.
fn collapse_seam(lines: &mut Vec<&str>, seam: usize) -> usize {
    // The final empty element is the trailing newline, not a blank line
    let limit = match lines.last() {
        Some(last) if last.is_empty() => lines.len() - 1,
        _ => lines.len(),
    };
    let seam = seam.min(limit);

    let before = lines[..seam].iter().rev().take_while(|line| is_blank(line)).count();
    let after = lines[seam..limit].iter().take_while(|line| is_blank(line)).count();
    let at_end = seam + after == limit;

    let (from, count) = if seam == 0 {
        (0, after)
    } else if at_end {
        (seam - before, before + after)
    } else if before + after > 1 {
        (seam - before, before + after - 1)
    } else {
        (seam, 0)
    };
    lines.drain(from..from + count);
    count
}

fn is_blank(line: &str) -> bool {
    boundary::body(line).trim().is_empty()
}

#[derive(Debug, Default, Deserialize)]
struct FrontMatter {
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default, alias = "context")]
    contexts: Vec<String>,
    #[serde(default)]
    meta: BTreeMap<String, serde_yaml::Value>,
}

/// Task defaults from a YAML front matter block, and the number of lines
/// the block spans
fn front_matter(content: &str, path: &Path) -> (TaskDefaults, usize) {
    let lines: Vec<&str> = content.split('\n').collect();
    if lines.first().map(|line| boundary::body(line).trim_end()) != Some(FRONT_MATTER_FENCE) {
        return (TaskDefaults::default(), 0);
    }
    let Some(close) = lines
        .iter()
        .skip(1)
        .position(|line| matches!(boundary::body(line).trim_end(), FRONT_MATTER_FENCE | "..."))
        .map(|idx| idx + 1)
    else {
        return (TaskDefaults::default(), 0);
    };

    let yaml = lines[1..close]
        .iter()
        .map(|line| boundary::body(line))
        .collect::<Vec<_>>()
        .join("\n");
    let parsed: FrontMatter = if yaml.trim().is_empty() {
        FrontMatter::default()
    } else {
        match serde_yaml::from_str(&yaml) {
            Ok(parsed) => parsed,
            Err(err) => {
                // Not front matter, most likely a pair of thematic breaks
                warn!(path = %path.display(), error = %err, "scanning unreadable front matter as text");
                return (TaskDefaults::default(), 0);
            }
        }
    };

    let defaults = TaskDefaults {
        tags: parsed.tags,
        contexts: parsed.contexts,
        meta: parsed
            .meta
            .into_iter()
            .map(|(key, value)| (key, yaml_values(value)))
            .collect(),
    };
    (defaults, close + 1)
}

fn yaml_values(value: serde_yaml::Value) -> Vec<String> {
    use serde_yaml::Value;
    match value {
        Value::Null => Vec::new(),
        Value::Bool(flag) => vec![flag.to_string()],
        Value::Number(number) => vec![number.to_string()],
        Value::String(text) => vec![text],
        Value::Sequence(items) => items.into_iter().flat_map(yaml_values).collect(),
        other => serde_yaml::to_string(&other)
            .map(|text| vec![text.trim().to_string()])
            .unwrap_or_default(),
    }
}

/// Block comment state after `text`, and whether `text` ends inside a line
/// comment
fn comment_state(text: &str, lang: &Lang, in_block: bool) -> (bool, bool) {
    let mut in_block = in_block;
    let mut rest = text;
    loop {
        if in_block {
            let Some(end) = lang.block_end() else {
                return (true, false);
            };
            match rest.find(end) {
                Some(pos) => {
                    in_block = false;
                    rest = &rest[pos + end.len()..];
                }
                None => return (true, false),
            }
        } else {
            let line = if lang.symbol.is_empty() {
                None
            } else {
                rest.find(lang.symbol.as_str())
            };
            let block = lang
                .block_start()
                .and_then(|start| rest.find(start).map(|pos| (pos, start.len())));
            match (line, block) {
                (Some(line), Some((block, _))) if line < block => return (false, true),
                (_, Some((block, len))) => {
                    in_block = true;
                    rest = &rest[block + len..];
                }
                (Some(_), None) => return (false, true),
                (None, None) => return (false, false),
            }
        }
    }
}

fn scan(
    path: &Path,
    content: &str,
    lang: &Lang,
    defaults: &TaskDefaults,
    skip: usize,
    patterns: &Patterns,
) -> Vec<Task> {
    let lines: Vec<&str> = content.split('\n').collect();
    let spans = Spans::scan(content);
    let mut offsets = Vec::with_capacity(lines.len());
    let mut offset = 0;
    for line in &lines {
        offsets.push(offset);
        offset += line.len() + 1;
    }

    let code = !lang.is_markdown();
    let mut tasks = Vec::new();
    let mut in_block = false;
    let mut idx = skip.min(lines.len());

    while idx < lines.len() {
        let line = lines[idx];
        let Some(marker) = patterns.match_marker(line, offsets[idx], &spans, lang.block_end()) else {
            if code {
                in_block = comment_state(line, lang, in_block).0;
            }
            idx += 1;
            continue;
        };

        let (marker_in_block, marker_in_comment) = if code {
            let at = marker.before.len();
            let cut = if !lang.symbol.is_empty() && line[at..].starts_with(lang.symbol.as_str()) {
                at + lang.symbol.len()
            } else {
                at
            };
            let (block, line_comment) = comment_state(&line[..cut], lang, in_block);
            (block, block || line_comment)
        } else {
            (false, true)
        };
        if !marker_in_comment {
            in_block = comment_state(line, lang, in_block).0;
            idx += 1;
            continue;
        }

        let context = if code {
            MarkerContext::for_code(comment_state(line, lang, in_block).0)
        } else {
            MarkerContext::for_text(line, lang)
        };
        let next = idx + 1;
        let boundary = boundary::scan(
            &lines[next..],
            offsets.get(next).copied().unwrap_or(content.len()),
            &spans,
            lang,
            patterns,
            &context,
        );
        let consumed = boundary.raw_lines.len();

        tasks.push(Task::from_scan(
            Scanned {
                path,
                line: idx + 1,
                marker,
                boundary,
                lang,
                in_block_comment: marker_in_block,
            },
            defaults,
            patterns,
        ));

        if code {
            for line in &lines[idx..next + consumed] {
                in_block = comment_state(line, lang, in_block).0;
            }
        }
        idx = next + consumed;
    }
    tasks
}

/// Language for a path; files with unknown extensions are read as text
pub fn lang_for(path: &Path, patterns: &Patterns) -> Lang {
    lang::for_path(path, &patterns.config().languages).unwrap_or_else(Lang::markdown)
}

/// SHA-256 hex digest of file content
pub fn checksum(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Tasks in `content`, reading front matter defaults from it
pub fn extract(path: &Path, content: &str, patterns: &Patterns) -> Vec<Task> {
    let mut file = File::for_path(path, content, patterns);
    file.extract(patterns);
    file.tasks
}

/// Tasks in `content` with explicit defaults
pub fn extract_with_defaults(
    path: &Path,
    content: &str,
    defaults: &TaskDefaults,
    patterns: &Patterns,
) -> Vec<Task> {
    let lang = lang_for(path, patterns);
    let skip = if lang.is_markdown() {
        front_matter(content, path).1
    } else {
        0
    };
    scan(path, content, &lang, defaults, skip, patterns)
}

/// `content` with `task` written back
pub fn modify_task(path: &Path, content: &str, task: &Task, patterns: &Patterns) -> Result<String> {
    let mut file = File::for_path(path, content, patterns);
    file.extract(patterns);
    file.modify_task(task, patterns)?;
    Ok(file.content)
}

/// `content` with the description of `task` replaced by `text`
pub fn modify_task_from_content(
    path: &Path,
    content: &str,
    task: &Task,
    text: &str,
    patterns: &Patterns,
) -> Result<String> {
    let mut file = File::for_path(path, content, patterns);
    file.extract(patterns);
    file.modify_task_from_content(task, text, patterns)?;
    Ok(file.content)
}

/// `content` without `task`
pub fn delete_task(path: &Path, content: &str, task: &Task, patterns: &Patterns) -> Result<String> {
    let mut file = File::for_path(path, content, patterns);
    file.extract(patterns);
    file.delete_task(task, patterns)?;
    Ok(file.content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use chrono::Utc;

    fn patterns() -> Patterns {
        Patterns::new(&Config::default()).expect("patterns")
    }

    fn file(path: &str, content: &str, p: &Patterns) -> File {
        let mut file = File::for_path(path, content, p);
        file.extract(p);
        file
    }

    const DOC: &str = "# Plan\n\n#TODO First task +a\nsome detail\n\n- [ ] Checkbox task\n  - [ ] nested step\n- [x] Finished\n\n[Linked](#DOING:)\n<!-- order:5 -->\n\n\ntrailing prose\n";

    #[test]
    fn extracts_every_marker_syntax() {
        let p = patterns();
        let f = file("plan.md", DOC, &p);
        let summary: Vec<(&str, &str, usize, usize)> = f
            .tasks()
            .iter()
            .map(|t| (t.list(), t.text(), t.line(), t.last_line()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("TODO", "First task +a", 3, 4),
                ("TODO", "Checkbox task", 6, 7),
                ("DONE", "Finished", 8, 8),
                ("DOING", "Linked", 10, 11),
            ]
        );
        assert_eq!(f.tasks()[3].order(), Some(5.0));
    }

    #[test]
    fn raw_lines_round_trip() {
        let p = patterns();
        for (path, content) in [
            ("plan.md", DOC),
            ("crlf.md", "#TODO:10 A\r\ndetail\r\n\r\n#DOING B\r\n"),
            ("lib.rs", "// #TODO fix\n// more\nfn x() {}\n/* #DOING:3 block\n * body\n */\n"),
            ("wrapped.md", "#TODO W\n<card>\nx\n\n\n<!-- a:b -->\n</card>\nafter\n"),
        ] {
            let f = file(path, content, &p);
            let lines: Vec<&str> = content.split('\n').collect();
            assert!(!f.tasks().is_empty(), "{path}");
            for task in f.tasks() {
                let expected = &lines[task.line() - 1..task.last_line()];
                assert_eq!(task.raw_lines(&p), expected, "{path}:{}", task.line());
            }
        }
    }

    #[test]
    fn re_extraction_is_stable() {
        let p = patterns();
        let mut f = file("plan.md", DOC, &p);
        let first: Vec<_> = f.tasks().iter().map(|t| (t.id(), t.line(), t.content().to_string())).collect();
        f.extract(&p);
        let second: Vec<_> = f.tasks().iter().map(|t| (t.id(), t.line(), t.content().to_string())).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn modify_touches_only_the_task_range() {
        let p = patterns();
        let mut f = file("plan.md", DOC, &p);
        let mut task = f.tasks()[0].clone();
        task.update_from_content("line one\nline two\nline three", &p);
        f.modify_task(&task, &p).expect("modify");

        let expected = DOC.replace("some detail\n", "line one\nline two\nline three\n");
        assert_eq!(f.content(), expected);
        assert!(f.is_modified());

        let lines: Vec<&str> = f.content().split('\n').collect();
        for task in f.tasks() {
            assert_eq!(task.raw_lines(&p), &lines[task.line() - 1..task.last_line()]);
        }
        assert_eq!(f.tasks()[1].line(), 8);
    }

    #[test]
    fn move_into_empty_list_writes_order_block() {
        let p = patterns();
        let mut f = file("a.md", "#TODO A task\n", &p);
        let mut task = f.tasks()[0].clone();
        task.move_to_list("DOING", &p, Utc::now());
        task.set_order(Some(0.0), &p);
        f.modify_task(&task, &p).expect("modify");
        assert_eq!(f.content(), "#DOING A task\n<!-- order:0 -->\n");
    }

    #[test]
    fn delete_wrapped_task_removes_wrapper_range() {
        let p = patterns();
        let content = "intro\n\n#TODO Wrapped\n<card>\ntext\n<!--\norder:10\n-->\n</card>\n\n#DOING Next\n";
        let mut f = file("a.md", content, &p);
        let task = f.tasks()[0].clone();
        let outcome = f.delete_task(&task, &p).expect("delete");
        assert_eq!(f.content(), "intro\n\n#DOING Next\n");
        assert_eq!(outcome.removed_lines, 8);
        assert!(!outcome.file_empty);
        assert_eq!(f.tasks().len(), 1);
        assert_eq!(f.tasks()[0].line(), 3);
    }

    #[test]
    fn delete_last_task_reports_empty_file() {
        let p = patterns();
        let mut f = file("a.md", "\n#TODO Only\nbody\n\n", &p);
        let task = f.tasks()[0].clone();
        let outcome = f.delete_task(&task, &p).expect("delete");
        assert!(outcome.file_empty);
        assert_eq!(f.content(), "");
    }

    #[test]
    fn delete_at_end_drops_blank_lines_before() {
        let p = patterns();
        let mut f = file("a.md", "#TODO a\n\n#TODO b\n", &p);
        let task = f.tasks()[1].clone();
        f.delete_task(&task, &p).expect("delete");
        assert_eq!(f.content(), "#TODO a\n");
    }

    #[test]
    fn stale_task_is_reported() {
        let p = patterns();
        let f = file("a.md", "#TODO a\n", &p);
        let task = f.tasks()[0].clone();
        let mut other = file("a.md", "#TODO changed\n", &p);
        let err = other.modify_task(&task, &p).expect_err("stale");
        assert!(matches!(err, Error::TaskMoved { line: 1, .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn task_found_after_lines_shift() {
        let p = patterns();
        let content = "#TODO a\n";
        let task = extract(Path::new("a.md"), content, &p).remove(0);
        let mut renamed = task.clone();
        renamed.set_meta("due", "soon", &p);
        let shifted = format!("inserted\nabove\n{content}");
        let out = modify_task(Path::new("a.md"), &shifted, &renamed, &p).expect("modify");
        assert_eq!(out, "inserted\nabove\n#TODO a\n<!-- due:soon -->\n");
    }

    #[test]
    fn free_functions_return_content() {
        let p = patterns();
        let content = "#TODO a\nold\n\n\n#TODO b\n";
        let task = extract(Path::new("a.md"), content, &p).remove(0);
        let out = modify_task_from_content(Path::new("a.md"), content, &task, "new\n", &p).expect("modify");
        assert_eq!(out, "#TODO a\nnew\n\n\n#TODO b\n");
        let out = delete_task(Path::new("a.md"), content, &task, &p).expect("delete");
        assert_eq!(out, "#TODO b\n");
    }

    #[test]
    fn code_markers_only_in_comments() {
        let p = patterns();
        let content = "let s = \"#TODO not a task\";\n/*\n * #TODO in block\n * detail\n */\nx(); // #DOING trailing\n";
        let f = file("a.rs", content, &p);
        let found: Vec<(&str, &str, &[String])> = f
            .tasks()
            .iter()
            .map(|t| (t.list(), t.text(), t.content_lines()))
            .collect();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].0, "TODO");
        assert_eq!(found[0].1, "in block");
        assert_eq!(found[0].2, ["detail".to_string()]);
        assert_eq!(found[1].0, "DOING");
    }

    #[test]
    fn python_hash_marker() {
        let p = patterns();
        let f = file("a.py", "x = 1  #TODO tidy\n# more\nprint(x)\n", &p);
        assert_eq!(f.tasks().len(), 1);
        assert_eq!(f.tasks()[0].content(), "more");
    }

    #[test]
    fn front_matter_defaults() {
        let p = patterns();
        let content = "---\ntags: [plan]\ncontext: [office]\nmeta:\n  owner: sam\n  points: 3\n---\n#TODO Task\n";
        let f = file("a.md", content, &p);
        let task = &f.tasks()[0];
        assert_eq!(task.line(), 8);
        assert_eq!(task.tags(), ["plan"]);
        assert_eq!(task.contexts(), ["office"]);
        assert_eq!(task.meta_value("owner"), Some("sam"));
        assert_eq!(task.meta_value("points"), Some("3"));
    }

    #[test]
    fn unreadable_front_matter_is_scanned_as_text() {
        let p = patterns();
        let f = file("a.md", "---\n- [ ] Buy milk: today\n#TODO Call home\n---\n", &p);
        let texts: Vec<&str> = f.tasks().iter().map(Task::text).collect();
        assert_eq!(texts.len(), 2, "{texts:?}");
        assert_eq!(f.tasks()[0].line(), 2);
        assert_eq!(f.tasks()[1].line(), 3);
        assert!(f.tasks()[1].tags().is_empty());
    }

    #[test]
    fn append_task_to_markdown_and_code() {
        let p = patterns();
        let mut f = file("a.md", "#TODO a", &p);
        let id = f.append_task("DOING", "New work", &p).expect("append");
        assert_eq!(f.content(), "#TODO a\n#DOING New work\n");
        assert_eq!(f.task(id).map(Task::line), Some(2));

        let mut f = file("a.rs", "", &p);
        f.append_task("TODO", "Port it", &p).expect("append");
        assert_eq!(f.content(), "// #TODO Port it\n");

        let err = f.append_task("NOPE", "x", &p).expect_err("unknown list");
        assert!(matches!(err, Error::UnknownList(_)));
    }

    #[test]
    fn checksum_tracks_persisted_content() {
        let p = patterns();
        let mut f = file("a.md", "#TODO a\n", &p);
        let original = f.checksum().to_string();
        assert_eq!(original.len(), 64);
        let mut task = f.tasks()[0].clone();
        task.set_meta("due", "now", &p);
        f.modify_task(&task, &p).expect("modify");
        assert_eq!(f.checksum(), original);
        f.mark_persisted();
        assert_ne!(f.checksum(), original);
        assert!(!f.is_modified());
    }
}
