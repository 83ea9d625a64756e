//! marktask mv command implementation

use crate::cli::{hidden_list_warning, parse_location, Context};
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};
use crate::task::format_order;

/// Options for the mv command
pub struct MoveOptions {
    pub task: String,
    pub list: String,
    pub position: usize,
    pub context: Context,
}

pub fn run(options: MoveOptions) -> Result<()> {
    let context = &options.context;
    let (path, line) = parse_location(&options.task, &context.root)?;
    let mut repository = context.load()?;
    let task = repository.find_by_location(&path, line)?;
    let id = task.id();
    let text = task.text().to_string();
    let from = task.list().to_string();

    let report = repository.move_task(id, &options.list, options.position)?;

    let mut human = HumanOutput::new(format!(
        "marktask mv: {from} -> {} \"{text}\"",
        report.list
    ));
    human.push_summary("order", format_order(report.order));
    human.push_summary("rewritten tasks", report.changes.len().to_string());
    for file in &report.files {
        human.push_detail(format!("wrote {}", file.display()));
    }
    if let Some(warning) = hidden_list_warning(&repository, &report.list) {
        human.push_warning(warning);
    }
    if let Some(task) = repository.task(id) {
        human.push_next_step(format!(
            "marktask show {}:{}",
            task.path().display(),
            task.line()
        ));
    }

    emit_success(context.output, "mv", &report, Some(&human))
}
