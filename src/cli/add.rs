//! marktask add command implementation

use std::path::PathBuf;

use serde::Serialize;

use crate::cli::ls::TaskRow;
use crate::cli::{hidden_list_warning, location, Context};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};

/// Options for the add command
pub struct AddOptions {
    pub path: PathBuf,
    pub list: String,
    pub text: String,
    pub context: Context,
}

#[derive(Serialize)]
struct AddReport<'a> {
    task: TaskRow<'a>,
}

pub fn run(options: AddOptions) -> Result<()> {
    let context = &options.context;
    let path = match options.path.strip_prefix(&context.root) {
        Ok(relative) => relative.to_path_buf(),
        Err(_) => options.path.clone(),
    };
    let mut repository = context.load()?;
    if !repository.accepts(&path) {
        return Err(Error::InvalidArgument(format!(
            "{} is excluded or has an unknown extension",
            path.display()
        )));
    }

    let id = repository.add_task(&path, &options.list, &options.text)?;
    let task = repository
        .task(id)
        .ok_or_else(|| Error::TaskNotFound(id.to_string()))?;

    let mut human = HumanOutput::new(format!("marktask add: {} {}", task.list(), task.text()));
    human.push_summary("location", location(task));
    if let Some(warning) = hidden_list_warning(&repository, task.list()) {
        human.push_warning(warning);
    }

    let report = AddReport {
        task: TaskRow::from(task),
    };
    emit_success(context.output, "add", &report, Some(&human))
}
