mod support;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use marktask::config::Config;
use marktask::store::{FileStore, FsStore, MemoryStore};
use marktask::{Error, Repository, Task};
use support::TestBoard;

fn texts(tasks: &[&Task]) -> Vec<String> {
    tasks.iter().map(|task| task.text().to_string()).collect()
}

async fn open(board: &TestBoard) -> Repository {
    let mut repository = Repository::open(board.path()).expect("open");
    let paths = FsStore::new(board.path())
        .discover(&["**/*.md".to_string(), "**/*.rs".to_string()])
        .expect("discover");
    repository.load_paths(paths).await.expect("load");
    repository
}

#[tokio::test]
async fn move_across_files_rewrites_only_task_lines() {
    let board = TestBoard::new();
    board.write_file(
        "notes/plan.md",
        "# Plan\n\nSome prose.\n\n#TODO Write the parser\nwith tests\n\n#DOING Ship it\n",
    );
    board.write_file("src/lib.rs", "// #TODO Remove this hack\nfn hack() {}\n");

    let mut repository = open(&board).await;
    assert_eq!(
        texts(&repository.list("TODO")),
        vec!["Remove this hack", "Write the parser"]
    );

    let id = repository
        .find_by_location(Path::new("src/lib.rs"), 1)
        .expect("task")
        .id();
    let report = repository.move_task(id, "DOING", 0).expect("move");
    assert_eq!(report.files, vec![PathBuf::from("src/lib.rs")]);

    let code = board.read_file("src/lib.rs");
    assert!(code.starts_with("// #DOING Remove this hack"), "{code}");
    assert!(code.contains("order:0"), "{code}");
    assert!(code.ends_with("\nfn hack() {}\n"), "{code}");
    assert_eq!(
        board.read_file("notes/plan.md"),
        "# Plan\n\nSome prose.\n\n#TODO Write the parser\nwith tests\n\n#DOING Ship it\n"
    );

    // A fresh load sees the same board
    let reloaded = open(&board).await;
    assert_eq!(
        texts(&reloaded.list("DOING")),
        vec!["Remove this hack", "Ship it"]
    );
    assert!(reloaded.check().is_empty());
}

#[tokio::test]
async fn move_into_done_ticks_checkbox_and_stamps_completion() {
    let board = TestBoard::new();
    board.write_file("todo.md", "- [ ] Buy milk\n- [ ] Call home\n");

    let mut repository = open(&board).await;
    let id = repository
        .find_by_location(Path::new("todo.md"), 2)
        .expect("task")
        .id();
    repository.move_task(id, "DONE", 0).expect("move");

    let content = board.read_file("todo.md");
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], "- [ ] Buy milk");
    assert!(lines[1].starts_with("- [x] Call home"), "{content}");
    assert!(content.contains("completed:"), "{content}");
    assert!(content.contains("order:0"), "{content}");

    let reloaded = open(&board).await;
    let done = reloaded.list("DONE");
    assert_eq!(texts(&done), vec!["Call home"]);
    assert!(done[0].meta_value("completed").is_some());
}

#[tokio::test]
async fn tie_run_renumbering_leaves_other_tasks_alone() {
    let board = TestBoard::new();
    let mut content = String::new();
    for index in 0..4 {
        content.push_str(&format!("#TODO zero {index}\n<!-- order:0 -->\n"));
    }
    for index in 0..6 {
        content.push_str(&format!("#TODO none {index}\n"));
    }
    board.write_file("board.md", &content);

    let mut repository = open(&board).await;
    let before: Vec<(String, Option<f64>)> = repository
        .list("TODO")
        .iter()
        .map(|task| (task.text().to_string(), task.order()))
        .collect();
    let moved = repository.list("TODO")[2].id();

    let report = repository.move_task(moved, "TODO", 7).expect("move");
    let after = repository.list("TODO");

    // Tasks ahead of the tie run keep their order
    for (text, order) in &before[..2] {
        let task = after
            .iter()
            .find(|task| task.text() == text)
            .expect("task kept");
        assert_eq!(task.order(), *order);
    }
    assert!(report.changes.len() < before.len());
    let orders: Vec<f64> = after.iter().map_while(|task| task.order()).collect();
    assert!(orders.windows(2).all(|pair| pair[0] <= pair[1]), "{orders:?}");
    assert_eq!(after[6].text(), "zero 2");
}

#[test]
fn unknown_list_and_missing_task_are_user_errors() {
    let store = Arc::new(MemoryStore::new().with_file("a.md", "#TODO a\n"));
    let mut repository =
        Repository::new("/board", Config::default(), Arc::clone(&store) as Arc<dyn FileStore>)
            .expect("repository");
    repository.load_path("a.md").expect("load");

    let err = repository
        .find_by_location(Path::new("a.md"), 5)
        .expect_err("no task");
    assert!(matches!(err, Error::TaskNotFound(_)));

    let id = repository.list("TODO")[0].id();
    let err = repository.move_task(id, "SOMEDAY", 0).expect_err("unknown list");
    assert_eq!(err.exit_code(), 2);
    assert_eq!(store.content("a.md").as_deref(), Some("#TODO a\n"));
}

#[test]
fn outside_edit_is_picked_up_by_file_changed() {
    let store = Arc::new(MemoryStore::new().with_file("a.md", "#TODO a\n"));
    let mut repository =
        Repository::new("/board", Config::default(), Arc::clone(&store) as Arc<dyn FileStore>)
            .expect("repository");
    repository.load_path("a.md").expect("load");
    let stale = repository.list("TODO")[0].id();

    store
        .write(Path::new("a.md"), "intro\n#TODO a\n")
        .expect("write");
    assert!(repository.file_changed(Path::new("a.md")).expect("reload"));
    assert!(repository.task(stale).is_none());

    let task = repository
        .find_by_location(Path::new("a.md"), 2)
        .expect("task");
    assert_eq!(task.text(), "a");
}
