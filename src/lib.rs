//! marktask - tasks kept in markdown files and source comments
//!
//! Finds task markers in text, works out which lines belong to each task,
//! and writes changes back by replacing only those lines. Lists are ordered
//! by a numeric `order` that is renumbered as little as possible when a
//! task moves.
//!
//! # Marker syntaxes
//!
//! - **Tag**: `#TODO text`, `#TODO:10 text`
//! - **Link**: `[text](#TODO:10)`
//! - **Checkbox**: `- [ ] text` (default list), `- [x] text` (done list)
//!
//! # Module Organization
//!
//! - `config`: Configuration loading from `.marktask.toml`
//! - `error`: Error types and result aliases
//! - `lang`: Comment syntax per file extension
//! - `pattern`: Marker, metadata, tag and context recognition
//! - `boundary`: Which lines after a marker belong to the task
//! - `task`: Task model, derived fields and edits
//! - `file`: One document and its tasks; targeted rewrites
//! - `order`: Order computation for moves
//! - `repository`: All loaded files; moves across them
//! - `store`: Where file content is read from and written to
//! - `lock`: File locking and atomic writes
//! - `output`: JSON and human output for the CLI
//! - `cli`: Command-line interface using clap

pub mod boundary;
pub mod cli;
pub mod config;
pub mod error;
pub mod file;
pub mod lang;
pub mod lock;
pub mod order;
pub mod output;
pub mod pattern;
pub mod repository;
pub mod store;
pub mod task;

pub use error::{Error, Result};
pub use file::{delete_task, extract, modify_task, modify_task_from_content, File};
pub use order::compute_reorder;
pub use pattern::render_marker;
pub use repository::Repository;
pub use task::{Task, TaskId};
