//! marktask ls command implementation

use std::collections::BTreeMap;

use serde::Serialize;

use crate::cli::{location, Context};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};
use crate::task::{format_order, Task};

#[derive(Serialize)]
struct ListReport<'a> {
    lists: Vec<ListRow<'a>>,
}

#[derive(Serialize)]
struct ListRow<'a> {
    name: &'a str,
    tasks: Vec<TaskRow<'a>>,
}

/// One task in list output
#[derive(Serialize)]
pub(crate) struct TaskRow<'a> {
    pub location: String,
    pub list: &'a str,
    pub order: Option<f64>,
    pub text: &'a str,
    pub tags: &'a [String],
    pub contexts: &'a [String],
    pub meta: &'a BTreeMap<String, Vec<String>>,
}

impl<'a> From<&'a Task> for TaskRow<'a> {
    fn from(task: &'a Task) -> Self {
        Self {
            location: location(task),
            list: task.list(),
            order: task.order(),
            text: task.text(),
            tags: task.tags(),
            contexts: task.contexts(),
            meta: task.meta(),
        }
    }
}

pub fn run(context: &Context, only: Option<&str>) -> Result<()> {
    let repository = context.load()?;

    let lists: Vec<(&str, Vec<&Task>)> = match only {
        Some(name) => {
            if repository.config().list(name).is_none() {
                return Err(Error::UnknownList(name.to_string()));
            }
            vec![(name, repository.list(name))]
        }
        None => repository
            .lists()
            .into_iter()
            .map(|(list, tasks)| (list.name.as_str(), tasks))
            .collect(),
    };

    let total: usize = lists.iter().map(|(_, tasks)| tasks.len()).sum();
    let mut human = HumanOutput::new(format!("marktask ls: {total} tasks"));
    for (name, tasks) in &lists {
        human.push_summary(*name, tasks.len().to_string());
        for (index, task) in tasks.iter().enumerate() {
            let order = task.order().map(format_order).unwrap_or_else(|| "-".to_string());
            human.push_detail(format!(
                "{name} {index} [{order}] {} ({})",
                task.text(),
                location(task)
            ));
        }
    }
    if total == 0 {
        human.push_next_step(format!(
            "marktask add <path> {} <text>",
            repository.config().tasks.default_list
        ));
    }

    let report = ListReport {
        lists: lists
            .iter()
            .map(|(name, tasks)| ListRow {
                name: *name,
                tasks: tasks.iter().map(|task| TaskRow::from(*task)).collect(),
            })
            .collect(),
    };
    emit_success(context.output, "ls", &report, Some(&human))
}
