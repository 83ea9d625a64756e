//! Command-line interface for marktask
//!
//! This module defines the CLI structure using clap derive macros.
//! Each subcommand is implemented in its own submodule.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::error::{Error, Result};
use crate::output::OutputOptions;
use crate::repository::Repository;
use crate::store::FsStore;

mod add;
mod check;
mod init;
mod ls;
mod mv;
mod rm;
mod show;

/// Default glob when no `--glob` is given
pub const DEFAULT_GLOB: &str = "**/*.md";

/// marktask - tasks in markdown and source comments as a board
///
/// Reads `#TODO`-style markers, `[text](#TODO:10)` links and `- [ ]`
/// checkboxes from documents and code comments, and moves them between
/// lists by rewriting only the lines each task occupies.
#[derive(Parser, Debug)]
#[command(name = "marktask")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Board root (defaults to current directory)
    #[arg(long, global = true, env = "MARKTASK_ROOT")]
    pub root: Option<PathBuf>,

    /// Files to load, as globs relative to the root (repeatable)
    #[arg(long = "glob", global = true)]
    pub globs: Vec<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a default .marktask.toml
    Init,

    /// List tasks by list
    Ls {
        /// Only this list
        #[arg(long)]
        list: Option<String>,
    },

    /// Show one task
    Show {
        /// Task location as path:line
        task: String,
    },

    /// Move a task to a list position
    Mv {
        /// Task location as path:line
        task: String,

        /// Target list
        list: String,

        /// Position in the target list as currently shown (0 = top)
        #[arg(default_value_t = 0)]
        position: usize,
    },

    /// Append a task to a file
    Add {
        /// File to append to, relative to the root
        path: PathBuf,

        /// List of the new task
        list: String,

        /// Task text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Remove a task
    Rm {
        /// Task location as path:line
        task: String,
    },

    /// Verify that every task renders back to its file content
    Check,
}

/// Root, globs and output flags every command needs
#[derive(Debug, Clone)]
pub struct Context {
    pub root: PathBuf,
    pub globs: Vec<String>,
    pub output: OutputOptions,
}

impl Context {
    /// Open the repository at the root and load every matching file
    pub fn load(&self) -> Result<Repository> {
        let mut repository = Repository::open(&self.root)?;
        let paths = FsStore::new(&self.root).discover(&self.globs)?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        runtime.block_on(repository.load_paths(paths))?;
        Ok(repository)
    }
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let root = match self.root {
            Some(root) => root,
            None => std::env::current_dir()?,
        };
        let globs = if self.globs.is_empty() {
            vec![DEFAULT_GLOB.to_string()]
        } else {
            self.globs
        };
        let context = Context {
            root,
            globs,
            output: OutputOptions {
                json: self.json,
                quiet: self.quiet,
            },
        };

        match self.command {
            Commands::Init => init::run(&context),
            Commands::Ls { list } => ls::run(&context, list.as_deref()),
            Commands::Show { task } => show::run(&context, &task),
            Commands::Mv {
                task,
                list,
                position,
            } => mv::run(mv::MoveOptions {
                task,
                list,
                position,
                context,
            }),
            Commands::Add { path, list, text } => add::run(add::AddOptions {
                path,
                list,
                text: text.join(" "),
                context,
            }),
            Commands::Rm { task } => rm::run(&context, &task),
            Commands::Check => check::run(&context),
        }
    }
}

/// Split `path:line` into a root-relative path and a 1-based line
pub fn parse_location(location: &str, root: &Path) -> Result<(PathBuf, usize)> {
    let invalid = || Error::InvalidArgument(format!("expected path:line, got '{location}'"));
    let (path, line) = location.rsplit_once(':').ok_or_else(invalid)?;
    let line: usize = line.parse().map_err(|_| invalid())?;
    if path.is_empty() || line == 0 {
        return Err(invalid());
    }
    let path = Path::new(path);
    let path = match path.strip_prefix(root) {
        Ok(relative) => relative.to_path_buf(),
        Err(_) => path.strip_prefix("./").unwrap_or(path).to_path_buf(),
    };
    Ok((path, line))
}

/// `path:line` of a task for display
pub fn location(task: &crate::task::Task) -> String {
    format!("{}:{}", task.path().display(), task.line())
}

/// Warning for tasks landing in a list `ls` does not show
pub(crate) fn hidden_list_warning(repository: &Repository, list: &str) -> Option<String> {
    let config = repository.config().list(list)?;
    config
        .hidden
        .then(|| format!("{list} is hidden from marktask ls; use --list {list}"))
}
