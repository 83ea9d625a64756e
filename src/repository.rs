//! Repository orchestrator
//!
//! Holds every loaded [`File`], answers list queries across them and turns
//! a move into per-file rewrites. All I/O goes through a [`FileStore`].

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::{Config, ListConfig, UnorderedPosition, CONFIG_FILE};
use crate::error::{Error, Result};
use crate::file::{checksum, DeleteOutcome, File};
use crate::lang;
use crate::order::{self, OrderChange};
use crate::pattern::Patterns;
use crate::store::{FileStore, FsStore};
use crate::task::{Task, TaskId};

/// Files read and extracted at the same time
pub const LOAD_CONCURRENCY: usize = 8;

/// What a move rewrote
#[derive(Debug, Clone, Serialize)]
pub struct MoveReport {
    pub id: TaskId,
    pub list: String,
    pub order: f64,
    pub changes: Vec<OrderChange>,
    pub files: Vec<PathBuf>,
}

/// A task line that does not render back to itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckIssue {
    pub path: PathBuf,
    pub line: usize,
    pub expected: Vec<String>,
    pub actual: Vec<String>,
}

/// Sets the moving flag for as long as it lives
struct MoveGuard {
    flag: Arc<AtomicBool>,
}

impl MoveGuard {
    fn new(flag: &Arc<AtomicBool>) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self {
            flag: Arc::clone(flag),
        }
    }
}

impl Drop for MoveGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

pub struct Repository {
    root: PathBuf,
    patterns: Arc<Patterns>,
    store: Arc<dyn FileStore>,
    files: BTreeMap<PathBuf, File>,
    moving: Arc<AtomicBool>,
}

impl Repository {
    pub fn new(root: impl Into<PathBuf>, config: Config, store: Arc<dyn FileStore>) -> Result<Self> {
        Ok(Self {
            root: root.into(),
            patterns: Arc::new(Patterns::new(&config)?),
            store,
            files: BTreeMap::new(),
            moving: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Repository on disk, configured from `<root>/.marktask.toml` when it
    /// exists
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let config_path = root.join(CONFIG_FILE);
        let config = if config_path.exists() {
            Config::load(&config_path)?
        } else {
            Config::default()
        };
        let store = Arc::new(FsStore::new(&root).with_timeout(config.tasks.lock_timeout_ms));
        Self::new(root, config, store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        self.patterns.config()
    }

    pub fn patterns(&self) -> &Patterns {
        &self.patterns
    }

    pub fn files(&self) -> impl Iterator<Item = &File> {
        self.files.values()
    }

    pub fn file(&self, path: &Path) -> Option<&File> {
        self.files.get(path)
    }

    /// Whether the repository would load `path`
    pub fn accepts(&self, path: &Path) -> bool {
        !self.config().is_excluded(path)
            && lang::for_path(path, &self.config().languages).is_some()
    }

    /// Read and extract `paths` concurrently.
    ///
    /// Excluded paths and unknown extensions are skipped, as are files that
    /// cannot be read. Returns how many files were loaded.
    pub async fn load_paths(&mut self, paths: Vec<PathBuf>) -> Result<usize> {
        let semaphore = Arc::new(Semaphore::new(LOAD_CONCURRENCY));
        let mut set = JoinSet::new();

        for path in paths {
            if !self.accepts(&path) {
                debug!(path = %path.display(), "skipping path");
                continue;
            }
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| Error::OperationFailed(format!("load pool closed: {e}")))?;
            let store = Arc::clone(&self.store);
            let patterns = Arc::clone(&self.patterns);
            set.spawn_blocking(move || {
                let _permit = permit;
                match store.read(&path) {
                    Ok(content) => {
                        let mut file = File::for_path(&path, content, &patterns);
                        file.extract(&patterns);
                        Ok(file)
                    }
                    Err(err) => Err((path, err)),
                }
            });
        }

        let mut loaded = 0;
        while let Some(joined) = set.join_next().await {
            let result =
                joined.map_err(|e| Error::OperationFailed(format!("load task failed: {e}")))?;
            match result {
                Ok(file) => {
                    self.files.insert(file.path().to_path_buf(), file);
                    loaded += 1;
                }
                Err((path, err)) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable file");
                }
            }
        }
        info!(files = loaded, "loaded files");
        Ok(loaded)
    }

    /// Read and extract one file, replacing any loaded copy
    pub fn load_path(&mut self, path: impl Into<PathBuf>) -> Result<&File> {
        let path = path.into();
        let content = self.store.read(&path)?;
        let mut file = File::for_path(&path, content, &self.patterns);
        file.extract(&self.patterns);
        Ok(match self.files.entry(path) {
            Entry::Occupied(mut entry) => {
                entry.insert(file);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(file),
        })
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.files.values().flat_map(|file| file.tasks().iter())
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks().find(|task| task.id() == id)
    }

    /// Task covering `line` (1-based) of `path`
    pub fn find_by_location(&self, path: &Path, line: usize) -> Result<&Task> {
        self.files
            .get(path)
            .and_then(|file| file.task_at(line))
            .ok_or_else(|| Error::TaskNotFound(format!("{}:{line}", path.display())))
    }

    /// Tasks of one list in display order
    pub fn list(&self, name: &str) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self.tasks().filter(|task| task.list() == name).collect();
        order::sort_tasks(&mut tasks, self.config().tasks.unordered);
        tasks
    }

    /// Visible lists with their tasks, in configured order
    pub fn lists(&self) -> Vec<(&ListConfig, Vec<&Task>)> {
        self.config()
            .lists
            .iter()
            .filter(|list| !list.hidden && !list.ignore)
            .map(|list| (list, self.list(&list.name)))
            .collect()
    }

    pub fn is_moving(&self) -> bool {
        self.moving.load(Ordering::SeqCst)
    }

    /// Flag a file watcher can poll to skip the repository's own writes
    pub fn moving_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.moving)
    }

    /// Move a task to `list`, landing at `drop_index` of that list as it is
    /// currently displayed.
    ///
    /// Every rewritten task is written back file by file. The first failing
    /// file stops the move; files written before it keep their new content.
    pub fn move_task(&mut self, id: TaskId, list: &str, drop_index: usize) -> Result<MoveReport> {
        if !self.config().is_task_list(list) {
            return Err(Error::UnknownList(list.to_string()));
        }
        let task = self
            .task(id)
            .cloned()
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))?;

        let shown = self.list(list);
        let new_pos = match shown.iter().position(|other| other.id() == id) {
            Some(old) if old < drop_index => drop_index - 1,
            _ => drop_index,
        };
        let others: Vec<&Task> = shown.into_iter().filter(|other| other.id() != id).collect();
        let changes = order::compute_reorder(&task, &others, new_pos);
        let order = changes.first().map_or(0.0, |change| change.order);

        info!(
            path = %task.path().display(),
            line = task.line(),
            from = task.list(),
            list,
            order,
            "moving task"
        );
        let files = self.apply_changes(Some((id, list)), &changes)?;
        Ok(MoveReport {
            id,
            list: list.to_string(),
            order,
            changes,
            files,
        })
    }

    /// Replace a task's description and persist its file
    pub fn update_task_content(&mut self, id: TaskId, text: &str) -> Result<()> {
        let path = self.path_of(id)?;
        let task = self
            .task(id)
            .cloned()
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))?;
        let file = file_mut(&mut self.files, &path)?;
        file.modify_task_from_content(&task, text, &self.patterns)?;
        self.persist(&path)
    }

    /// Remove a task. A markdown file left empty is deleted.
    pub fn delete_task(&mut self, id: TaskId) -> Result<DeleteOutcome> {
        let path = self.path_of(id)?;
        let task = self
            .task(id)
            .cloned()
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))?;
        let file = file_mut(&mut self.files, &path)?;
        let outcome = file.delete_task(&task, &self.patterns)?;

        if outcome.file_empty {
            self.store
                .delete(&path)
                .map_err(|err| Error::persist(&path, err))?;
            self.files.remove(&path);
            info!(path = %path.display(), "removed empty file");
        } else {
            self.persist(&path)?;
        }
        Ok(outcome)
    }

    /// Append a task to `path`, creating the file when missing, and place
    /// it at the top or bottom of its list
    pub fn add_task(&mut self, path: impl Into<PathBuf>, list: &str, text: &str) -> Result<TaskId> {
        let path = path.into();
        if !self.config().is_task_list(list) {
            return Err(Error::UnknownList(list.to_string()));
        }

        let file = match self.files.entry(path.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let content = if self.store.exists(&path) {
                    self.store.read(&path)?
                } else {
                    String::new()
                };
                let mut file = File::for_path(&path, content, &self.patterns);
                file.extract(&self.patterns);
                entry.insert(file)
            }
        };
        let id = file.append_task(list, text, &self.patterns)?;
        self.persist(&path)?;

        let task = self
            .task(id)
            .cloned()
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))?;
        let others: Vec<&Task> = self
            .list(list)
            .into_iter()
            .filter(|other| other.id() != id)
            .collect();
        let top = self.config().tasks.add_new_cards_to_top;
        let needs_order = match (top, self.config().tasks.unordered) {
            (_, _) if others.is_empty() => false,
            // An absent order already sorts on this side
            (false, UnorderedPosition::Last) => others.last().is_some_and(|t| t.order().is_some()),
            (true, UnorderedPosition::First) => others.first().is_some_and(|t| t.order().is_some()),
            _ => true,
        };
        if needs_order {
            let new_pos = if top { 0 } else { others.len() };
            let changes = order::compute_reorder(&task, &others, new_pos);
            self.apply_changes(None, &changes)?;
        }
        info!(path = %path.display(), list, "added task");
        Ok(id)
    }

    /// React to an outside change of `path`.
    ///
    /// Ignored while a move is writing. Returns whether the loaded state
    /// changed.
    pub fn file_changed(&mut self, path: &Path) -> Result<bool> {
        if self.is_moving() {
            debug!(path = %path.display(), "ignoring change during move");
            return Ok(false);
        }
        if !self.store.exists(path) {
            return Ok(self.files.remove(path).is_some());
        }
        if !self.accepts(path) {
            return Ok(false);
        }
        let content = self.store.read(path)?;
        if let Some(file) = self.files.get_mut(path) {
            if file.checksum() == checksum(&content) {
                return Ok(false);
            }
            file.reload(content, &self.patterns);
            debug!(path = %path.display(), "reloaded file");
            return Ok(true);
        }
        let mut file = File::for_path(path, content, &self.patterns);
        file.extract(&self.patterns);
        self.files.insert(path.to_path_buf(), file);
        Ok(true)
    }

    /// Tasks whose rendered lines differ from the file content
    pub fn check(&self) -> Vec<CheckIssue> {
        let mut issues = Vec::new();
        for file in self.files.values() {
            let lines: Vec<&str> = file.content().split('\n').collect();
            for task in file.tasks() {
                let expected = task.raw_lines(&self.patterns);
                let start = task.line().saturating_sub(1);
                let end = (start + task.synced().len()).min(lines.len());
                let actual: Vec<String> = lines[start.min(end)..end]
                    .iter()
                    .map(|line| (*line).to_string())
                    .collect();
                if expected != actual {
                    issues.push(CheckIssue {
                        path: file.path().to_path_buf(),
                        line: task.line(),
                        expected,
                        actual,
                    });
                }
            }
        }
        issues
    }

    /// Rewrite the tasks named by `changes`, moving `moved` to its list
    /// first, and persist each touched file once
    fn apply_changes(
        &mut self,
        moved: Option<(TaskId, &str)>,
        changes: &[OrderChange],
    ) -> Result<Vec<PathBuf>> {
        let now = Utc::now();
        let mut by_file: BTreeMap<PathBuf, Vec<Task>> = BTreeMap::new();
        for change in changes {
            let Some(task) = self.task(change.id) else {
                return Err(Error::TaskNotFound(change.id.to_string()));
            };
            let mut updated = task.clone();
            if let Some((id, list)) = moved {
                if id == change.id {
                    updated.move_to_list(list, &self.patterns, now);
                }
            }
            updated.set_order(Some(change.order), &self.patterns);
            by_file
                .entry(updated.path().to_path_buf())
                .or_default()
                .push(updated);
        }

        let _guard = MoveGuard::new(&self.moving);
        let mut written = Vec::with_capacity(by_file.len());
        for (path, mut tasks) in by_file {
            tasks.sort_by(|a, b| b.line().cmp(&a.line()));
            let file = file_mut(&mut self.files, &path)?;
            for task in &tasks {
                file.modify_task(task, &self.patterns)
                    .map_err(|err| Error::persist(&path, err))?;
            }
            self.store
                .write(&path, file.content())
                .map_err(|err| Error::persist(&path, err))?;
            file.mark_persisted();
            debug!(path = %path.display(), tasks = tasks.len(), "persisted file");
            written.push(path);
        }
        Ok(written)
    }

    fn path_of(&self, id: TaskId) -> Result<PathBuf> {
        self.task(id)
            .map(|task| task.path().to_path_buf())
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))
    }

    fn persist(&mut self, path: &Path) -> Result<()> {
        let file = file_mut(&mut self.files, path)?;
        self.store
            .write(path, file.content())
            .map_err(|err| Error::persist(path, err))?;
        file.mark_persisted();
        Ok(())
    }
}

fn file_mut<'a>(files: &'a mut BTreeMap<PathBuf, File>, path: &Path) -> Result<&'a mut File> {
    files
        .get_mut(path)
        .ok_or_else(|| Error::TaskNotFound(path.display().to_string()))
}
