//! marktask init command implementation
//!
//! Writes a default `.marktask.toml`, creates the `.marktask/` state
//! directory and keeps it out of git.

use std::path::{Path, PathBuf};

use crate::cli::Context;
use crate::config::{Config, CONFIG_FILE};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};
use crate::store::STATE_DIR;

#[derive(serde::Serialize)]
struct InitReport {
    root: PathBuf,
    created_config: bool,
    created_state_dir: bool,
    updated_gitignore: bool,
}

pub fn run(context: &Context) -> Result<()> {
    let root = &context.root;
    let created_config = ensure_config(root)?;
    let created_state_dir = ensure_dir(&root.join(STATE_DIR))?;
    let updated_gitignore = ensure_gitignore(root)?;

    let report = InitReport {
        root: root.clone(),
        created_config,
        created_state_dir,
        updated_gitignore,
    };

    let mut changed = Vec::new();
    if created_config {
        changed.push(CONFIG_FILE.to_string());
    }
    if created_state_dir {
        changed.push(format!("{STATE_DIR}/"));
    }
    if updated_gitignore {
        changed.push(".gitignore".to_string());
    }

    let header = if changed.is_empty() {
        "marktask init: nothing to do"
    } else {
        "marktask init: initialized board"
    };
    let mut human = HumanOutput::new(header);
    human.push_summary("root", root.display().to_string());
    human.push_summary(
        "changed",
        if changed.is_empty() {
            "none".to_string()
        } else {
            changed.join(", ")
        },
    );
    human.push_next_step("marktask ls");

    emit_success(context.output, "init", &report, Some(&human))
}

fn ensure_config(root: &Path) -> Result<bool> {
    let config_path = root.join(CONFIG_FILE);
    if config_path.exists() {
        if !config_path.is_file() {
            return Err(Error::OperationFailed(format!(
                "{CONFIG_FILE} exists but is not a file: {}",
                config_path.display()
            )));
        }
        return Ok(false);
    }
    Config::default().save(&config_path)?;
    Ok(true)
}

fn ensure_gitignore(root: &Path) -> Result<bool> {
    let path = root.join(".gitignore");
    if path.exists() && !path.is_file() {
        return Err(Error::OperationFailed(format!(
            ".gitignore exists but is not a file: {}",
            path.display()
        )));
    }

    let existing = if path.exists() {
        std::fs::read_to_string(&path)?
    } else {
        String::new()
    };
    if has_state_ignore(&existing) {
        return Ok(false);
    }

    let mut updated = existing;
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    updated.push_str(STATE_DIR);
    updated.push_str("/\n");
    std::fs::write(&path, updated)?;
    Ok(true)
}

fn has_state_ignore(contents: &str) -> bool {
    contents.lines().any(|line| {
        let trimmed = line.trim().trim_start_matches('/');
        !trimmed.starts_with('#') && trimmed.trim_end_matches('/') == STATE_DIR
    })
}

fn ensure_dir(path: &Path) -> Result<bool> {
    if path.exists() {
        if !path.is_dir() {
            return Err(Error::OperationFailed(format!(
                "Expected directory at {}",
                path.display()
            )));
        }
        return Ok(false);
    }
    std::fs::create_dir_all(path)?;
    Ok(true)
}
