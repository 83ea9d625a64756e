mod support;

use assert_cmd::Command;
use predicates::str::contains;
use support::TestBoard;

fn marktask(board: &TestBoard) -> Command {
    let mut cmd = Command::cargo_bin("marktask").expect("binary");
    cmd.env_remove("RUST_LOG").arg("--root").arg(board.path());
    cmd
}

#[test]
fn marktask_help_works() {
    Command::cargo_bin("marktask")
        .expect("binary")
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("marktask"));
}

#[test]
fn subcommand_help_works() {
    for cmd in ["init", "ls", "show", "mv", "add", "rm", "check"] {
        Command::cargo_bin("marktask")
            .expect("binary")
            .arg(cmd)
            .arg("--help")
            .assert()
            .success();
    }
}

#[test]
fn init_writes_config_and_ignore() {
    let board = TestBoard::new();
    marktask(&board).arg("init").assert().success();
    assert!(board.exists(".marktask.toml"));
    assert!(board.read_file(".gitignore").contains(".marktask/"));
    assert_eq!(board.config().list_names(), vec!["TODO", "DOING", "DONE"]);

    marktask(&board)
        .arg("init")
        .assert()
        .success()
        .stdout(contains("nothing to do"));
}

#[test]
fn ls_groups_tasks_by_list() {
    let board = TestBoard::new();
    board.write_file("notes.md", "#TODO Write docs\n\n#DOING Review PR\n- [x] Release\n");

    marktask(&board)
        .arg("ls")
        .assert()
        .success()
        .stdout(contains("3 tasks"))
        .stdout(contains("Write docs (notes.md:1)"))
        .stdout(contains("Review PR (notes.md:3)"));

    let output = marktask(&board)
        .args(["--json", "ls", "--list", "DONE"])
        .output()
        .expect("run");
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(json["schema_version"], "marktask.v1");
    assert_eq!(json["status"], "success");
    assert_eq!(json["data"]["lists"][0]["tasks"][0]["text"], "Release");
}

#[test]
fn mv_rewrites_the_file() {
    let board = TestBoard::new();
    board.write_file("notes.md", "intro\n\n#TODO A task\n");

    marktask(&board)
        .args(["mv", "notes.md:3", "DOING", "0"])
        .assert()
        .success()
        .stdout(contains("TODO -> DOING"));

    assert_eq!(
        board.read_file("notes.md"),
        "intro\n\n#DOING A task\n<!-- order:0 -->\n"
    );
}

#[test]
fn mv_into_hidden_list_warns() {
    let board = TestBoard::new();
    board.write_config(
        "[[lists]]\nname = \"TODO\"\n\n[[lists]]\nname = \"DONE\"\n\n[[lists]]\nname = \"ARCHIVE\"\nhidden = true\n",
    );
    board.write_file("notes.md", "#TODO Old idea\n");

    marktask(&board)
        .args(["mv", "notes.md:1", "ARCHIVE"])
        .assert()
        .success()
        .stdout(contains("Warnings:"))
        .stdout(contains("ARCHIVE is hidden from marktask ls"));

    let output = marktask(&board)
        .args(["--json", "add", "notes.md", "ARCHIVE", "Another", "idea"])
        .output()
        .expect("run");
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(
        json["warnings"][0],
        "ARCHIVE is hidden from marktask ls; use --list ARCHIVE"
    );
}

#[test]
fn add_show_and_rm() {
    let board = TestBoard::new();
    board.write_file("notes.md", "#TODO first\n");

    marktask(&board)
        .args(["add", "notes.md", "TODO", "second", "task"])
        .assert()
        .success();
    assert!(board.read_file("notes.md").contains("#TODO second task"));

    marktask(&board)
        .args(["show", "notes.md:2"])
        .assert()
        .success()
        .stdout(contains("TODO second task"));

    marktask(&board)
        .args(["rm", "notes.md:1"])
        .assert()
        .success();
    assert!(!board.read_file("notes.md").contains("first"));

    marktask(&board).args(["add", "fresh.md", "DOING", "new"]).assert().success();
    assert_eq!(board.read_file("fresh.md"), "#DOING new\n");
}

#[test]
fn errors_use_exit_codes() {
    let board = TestBoard::new();
    board.write_file("notes.md", "#TODO a\n");

    marktask(&board)
        .args(["mv", "notes.md:1", "SOMEDAY"])
        .assert()
        .code(2)
        .stderr(contains("Unknown list"));

    let output = marktask(&board)
        .args(["--json", "show", "notes.md:9"])
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(2));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(json["status"], "error");
    assert_eq!(json["kind"], "user_error");

    marktask(&board)
        .args(["show", "notes.md"])
        .assert()
        .code(2)
        .stderr(contains("path:line"));
}

#[test]
fn check_passes_on_untouched_board() {
    let board = TestBoard::new();
    board.write_file(
        "notes.md",
        "# Board\n\n- [ ] one\n  details\n\n[linked](#DOING:20)\n<!-- due:friday -->\n",
    );
    board.write_file("src/main.rs", "// #TODO tidy\nfn main() {}\n");

    marktask(&board)
        .args(["--glob", "**/*.md", "--glob", "src/**/*.rs", "check"])
        .assert()
        .success()
        .stdout(contains("marktask check: ok"))
        .stdout(contains("- tasks: 3"));
}
