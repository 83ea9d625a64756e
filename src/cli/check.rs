//! marktask check command implementation
//!
//! Re-renders every task without changing it and compares the result with
//! the lines in the file. Any difference means a write would disturb text
//! the user did not touch.

use serde::Serialize;

use crate::cli::Context;
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};
use crate::repository::CheckIssue;

#[derive(Serialize)]
struct CheckReport {
    files: usize,
    tasks: usize,
    issues: Vec<CheckIssue>,
}

pub fn run(context: &Context) -> Result<()> {
    let repository = context.load()?;
    let issues = repository.check();
    let report = CheckReport {
        files: repository.files().count(),
        tasks: repository.tasks().count(),
        issues,
    };

    if !report.issues.is_empty() {
        for issue in &report.issues {
            tracing::warn!(
                path = %issue.path.display(),
                line = issue.line,
                "task does not render back to its lines"
            );
        }
        let first = &report.issues[0];
        return Err(Error::OperationFailed(format!(
            "{} task(s) do not round-trip, first at {}:{}",
            report.issues.len(),
            first.path.display(),
            first.line
        )));
    }

    let mut human = HumanOutput::new("marktask check: ok");
    human.push_summary("files", report.files.to_string());
    human.push_summary("tasks", report.tasks.to_string());
    emit_success(context.output, "check", &report, Some(&human))
}
