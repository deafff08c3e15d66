mod common;

use common::init_repo;

#[test]
fn hook_session_start_returns_valid_json_on_stdout() {
    use std::io::Write;
    use std::process::Stdio;

    let repo = init_repo();
    let mut child = std::process::Command::new(env!("CARGO_BIN_EXE_catctl"))
        .args(["hook", "SessionStart"])
        .current_dir(repo.root())
        .env("CLAUDE_PROJECT_DIR", repo.root())
        .env("CLAUDE_SESSION_ID", "S1")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    child
        .stdin
        .take()
        .unwrap()
        .write_all(br#"{"hookEventName":"SessionStart","session_id":"S1","cwd":"."}"#)
        .unwrap();

    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    // A fresh session has no skill marker and no stashed worktree to
    // restore, so SessionStart should allow through with no complaint.
    assert!(value.get("decision").is_none());
}

#[test]
fn hook_with_unrecognized_event_still_emits_json_and_exits_zero() {
    use std::io::Write;
    use std::process::Stdio;

    let repo = init_repo();
    let mut child = std::process::Command::new(env!("CARGO_BIN_EXE_catctl"))
        .args(["hook", "NotARealEvent"])
        .current_dir(repo.root())
        .env("CLAUDE_PROJECT_DIR", repo.root())
        .env("CLAUDE_SESSION_ID", "S1")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    child.stdin.take().unwrap().write_all(b"{}").unwrap();

    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(value["systemMessage"].as_str().unwrap().contains("NotARealEvent"));
}

#[test]
fn hook_with_malformed_stdin_still_exits_zero_with_system_message() {
    use std::io::Write;
    use std::process::Stdio;

    let repo = init_repo();
    let mut child = std::process::Command::new(env!("CARGO_BIN_EXE_catctl"))
        .args(["hook", "PreToolUse"])
        .current_dir(repo.root())
        .env("CLAUDE_PROJECT_DIR", repo.root())
        .env("CLAUDE_SESSION_ID", "S1")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    child.stdin.take().unwrap().write_all(b"not json at all").unwrap();

    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(value.get("systemMessage").is_some());
}
