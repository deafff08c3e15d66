mod common;

use common::init_repo;

#[test]
fn skill_output_status_summarizes_open_and_closed_counts() {
    let repo = init_repo();
    repo.write_issue("2.1-a", "open", &[], common::simple_plan());
    repo.write_issue("2.1-b", "closed", &[], common::simple_plan());

    let output = repo.run("S1", &["skill-output", "status"]);
    assert!(output.status.success());
    let text = String::from_utf8(output.stdout).unwrap();
    assert!(text.starts_with("<output type=\"status\">"));
    assert!(text.contains("1 open, 0 in-progress, 1 closed, 0 decomposed"));
}

#[test]
fn skill_output_is_not_json_quoted() {
    let repo = init_repo();
    let output = repo.run("S1", &["skill-output", "locks"]);
    assert!(output.status.success());
    let text = String::from_utf8(output.stdout).unwrap();
    // Verbatim wrapped text, not `"<output ...>"` — a leading `"` would mean
    // the skill preprocessor's splice would carry stray quoting into markdown.
    assert!(!text.starts_with('"'));
    assert_eq!(text.trim_end(), "<output type=\"locks\">no active locks</output>");
}

#[test]
fn skill_output_deps_reports_unresolved_dependency() {
    let repo = init_repo();
    repo.write_issue("2.1-a", "open", &["2.1-missing"], common::simple_plan());

    let output = repo.run("S1", &["skill-output", "deps.2.1-a"]);
    assert!(output.status.success());
    let text = String::from_utf8(output.stdout).unwrap();
    assert!(text.contains("2.1-missing"));
}
