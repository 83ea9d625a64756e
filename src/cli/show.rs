//! marktask show command implementation

use crate::cli::{location, parse_location, Context};
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};
use crate::task::format_order;

pub fn run(context: &Context, selector: &str) -> Result<()> {
    let (path, line) = parse_location(selector, &context.root)?;
    let repository = context.load()?;
    let task = repository.find_by_location(&path, line)?;

    let mut human = HumanOutput::new(format!("{} {}", task.list(), task.text()));
    human.push_summary("location", location(task));
    human.push_summary("lines", format!("{}-{}", task.line(), task.last_line()));
    human.push_summary("marker", task.marker().name());
    if let Some(order) = task.order() {
        human.push_summary("order", format_order(order));
    }
    if !task.tags().is_empty() {
        human.push_summary("tags", task.tags().join(", "));
    }
    if !task.contexts().is_empty() {
        human.push_summary("contexts", task.contexts().join(", "));
    }
    for (key, values) in task.meta() {
        human.push_summary(key.as_str(), values.join(", "));
    }
    for line in task.interpreted_content().lines().skip(1) {
        human.push_detail(line);
    }

    emit_success(context.output, "show", task, Some(&human))
}
