mod common;

use common::{init_repo, stdout_json};

#[test]
fn issue_lock_acquire_list_release_round_trip() {
    let repo = init_repo();

    let acquired = repo.run("S1", &["issue-lock", "acquire", "2.1-a"]);
    assert!(acquired.status.success());
    let value = stdout_json(&acquired);
    assert_eq!(value["status"], "ACQUIRED");

    let listed = repo.run("S1", &["issue-lock", "list"]);
    assert!(listed.status.success());
    let value = stdout_json(&listed);
    let locks = value["locks"].as_array().unwrap();
    assert_eq!(locks.len(), 1);
    assert_eq!(locks[0]["issue_id"], "2.1-a");
    assert_eq!(locks[0]["session_id"], "S1");

    let released = repo.run("S1", &["issue-lock", "release", "2.1-a"]);
    assert!(released.status.success());
    assert_eq!(stdout_json(&released)["status"], "RELEASED");

    let listed_after = repo.run("S1", &["issue-lock", "list"]);
    let value = stdout_json(&listed_after);
    assert!(value["locks"].as_array().unwrap().is_empty());
}

#[test]
fn issue_lock_acquire_is_contested_by_a_second_session() {
    let repo = init_repo();

    let first = repo.run("S1", &["issue-lock", "acquire", "2.1-a"]);
    assert!(first.status.success());

    let second = repo.run("S2", &["issue-lock", "acquire", "2.1-a"]);
    assert!(!second.status.success());
    let value: serde_json::Value = serde_json::from_slice(&second.stderr).unwrap();
    assert_eq!(value["status"], "LOCKED");
}

#[test]
fn issue_lock_force_release_clears_another_sessions_lock() {
    let repo = init_repo();

    let first = repo.run("S1", &["issue-lock", "acquire", "2.1-a"]);
    assert!(first.status.success());

    let forced = repo.run("S2", &["issue-lock", "force-release", "2.1-a"]);
    assert!(forced.status.success());

    let reacquired = repo.run("S2", &["issue-lock", "acquire", "2.1-a"]);
    assert!(reacquired.status.success());
}
