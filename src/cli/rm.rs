//! marktask rm command implementation

use serde::Serialize;

use crate::cli::{parse_location, Context};
use crate::error::Result;
use crate::file::DeleteOutcome;
use crate::output::{emit_success, HumanOutput};

#[derive(Serialize)]
struct RemoveReport {
    location: String,
    text: String,
    #[serde(flatten)]
    outcome: DeleteOutcome,
}

pub fn run(context: &Context, selector: &str) -> Result<()> {
    let (path, line) = parse_location(selector, &context.root)?;
    let mut repository = context.load()?;
    let task = repository.find_by_location(&path, line)?;
    let id = task.id();
    let report_location = format!("{}:{}", path.display(), task.line());
    let text = task.text().to_string();

    let outcome = repository.delete_task(id)?;

    let mut human = HumanOutput::new(format!("marktask rm: {text}"));
    human.push_summary("location", report_location.clone());
    human.push_summary("removed lines", outcome.removed_lines.to_string());
    if outcome.file_empty {
        human.push_detail(format!("deleted empty file {}", path.display()));
    }

    let report = RemoveReport {
        location: report_location,
        text,
        outcome,
    };
    emit_success(context.output, "rm", &report, Some(&human))
}
