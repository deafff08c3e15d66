//! `amend-safe`: amend HEAD without silently rewriting a commit someone
//! else has already based work on.

use std::path::Path;
use std::process::Command;

use anyhow::Result;

use crate::errors::CatError;
use crate::process::{run_checked, run_git, run_git_check, run_git_single_line};

pub struct AmendInput<'a> {
    pub message: Option<&'a str>,
    pub no_edit: bool,
}

#[derive(Debug, Clone)]
pub enum AmendOutcome {
    Ok { old_head: String, new_head: String, race_detected: bool },
}

pub fn amend_safe(cwd: &Path, input: &AmendInput<'_>) -> Result<AmendOutcome, CatError> {
    // 1. READ_HEAD
    let old_head = run_git_single_line(cwd, &["rev-parse", "HEAD"]).map_err(to_error)?;

    // 2. CHECK_PUSHED
    let status = run_git(cwd, &["status", "-b", "--porcelain=v1"]).map_err(to_error)?;
    if let Some(branch_line) = status.lines().next()
        && branch_line.contains("...")
        && !branch_line.contains("[ahead")
    {
        return Err(CatError::AlreadyPushed { head: old_head });
    }

    // 3. AMEND
    let mut cmd = Command::new("git");
    cmd.current_dir(cwd).arg("commit").arg("--amend");
    if input.no_edit {
        cmd.arg("--no-edit");
    } else if let Some(message) = input.message {
        cmd.arg("-m").arg(message);
    }
    run_checked(&mut cmd, Some("git")).map_err(|e| CatError::other(e.to_string()))?;

    // 4. READ_NEW_HEAD
    let new_head = run_git_single_line(cwd, &["rev-parse", "HEAD"]).map_err(to_error)?;

    // 5. TOCTOU_CHECK (best-effort, network-free)
    if let Ok(true) = run_git_check(cwd, &["rev-parse", "--verify", "--quiet", "@{push}"]) {
        let is_ancestor = run_git_check(cwd, &["merge-base", "--is-ancestor", &old_head, "@{push}"])
            .unwrap_or(false);
        if is_ancestor {
            return Err(CatError::RaceDetected {
                old_head,
                new_head,
                recovery: "git push --force-with-lease".to_string(),
            });
        }
    }

    // 6. OK
    Ok(AmendOutcome::Ok {
        old_head,
        new_head,
        race_detected: false,
    })
}

fn to_error(e: anyhow::Error) -> CatError {
    CatError::other(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command as StdCommand;
    use tempfile::TempDir;

    fn init_repo() -> TempDir {
        let dir = TempDir::new().unwrap();
        let run = |args: &[&str]| {
            let status = StdCommand::new("git")
                .current_dir(dir.path())
                .args(args)
                .env("GIT_AUTHOR_NAME", "test")
                .env("GIT_AUTHOR_EMAIL", "test@example.com")
                .env("GIT_COMMITTER_NAME", "test")
                .env("GIT_COMMITTER_EMAIL", "test@example.com")
                .status()
                .unwrap();
            assert!(status.success());
        };
        run(&["init", "-q", "-b", "main"]);
        std::fs::write(dir.path().join("a.txt"), "one").unwrap();
        run(&["add", "."]);
        run(&["commit", "-q", "-m", "initial"]);
        dir
    }

    #[test]
    fn amend_without_upstream_succeeds() {
        let dir = init_repo();
        let input = AmendInput {
            message: Some("amended message"),
            no_edit: false,
        };
        let outcome = amend_safe(dir.path(), &input).unwrap();
        match outcome {
            AmendOutcome::Ok { old_head, new_head, race_detected } => {
                assert_ne!(old_head, new_head);
                assert!(!race_detected);
            }
        }
    }
}
