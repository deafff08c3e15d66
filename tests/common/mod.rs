//! Shared fixtures for the binary-level integration tests: a throwaway git
//! repository with a `.claude/cat/` tree, and a thin wrapper around
//! invoking the compiled `catctl` binary against it.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

pub struct Repo {
    pub dir: TempDir,
}

impl Repo {
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Run `catctl <args>` with `CLAUDE_PROJECT_DIR` and `CLAUDE_SESSION_ID`
    /// set, stdin/stdout/stderr captured.
    pub fn run(&self, session_id: &str, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_catctl"))
            .args(args)
            .current_dir(self.root())
            .env("CLAUDE_PROJECT_DIR", self.root())
            .env("CLAUDE_SESSION_ID", session_id)
            .env_remove("CAT_TEST_EPOCH")
            .output()
            .expect("catctl should spawn")
    }

    pub fn write_issue(&self, qualified: &str, status: &str, deps: &[&str], plan: &str) -> PathBuf {
        let issue_dir = self.root().join(".claude/cat/issues").join(qualified);
        std::fs::create_dir_all(&issue_dir).unwrap();
        let dep_list = deps.join(", ");
        std::fs::write(
            issue_dir.join("STATE.md"),
            format!(
                "- **Status:** {status}\n- **Progress:** 0%\n- **Last Updated:** 2026-01-01\n- **Dependencies:** [{dep_list}]\n"
            ),
        )
        .unwrap();
        std::fs::write(issue_dir.join("PLAN.md"), plan).unwrap();
        issue_dir
    }
}

pub fn init_repo() -> Repo {
    let dir = TempDir::new().unwrap();
    let git = |args: &[&str]| {
        let status = Command::new("git")
            .current_dir(dir.path())
            .args(args)
            .env("GIT_AUTHOR_NAME", "test")
            .env("GIT_AUTHOR_EMAIL", "test@example.com")
            .env("GIT_COMMITTER_NAME", "test")
            .env("GIT_COMMITTER_EMAIL", "test@example.com")
            .status()
            .unwrap();
        assert!(status.success(), "git {args:?} failed");
    };
    git(&["init", "-q", "-b", "main"]);
    std::fs::write(dir.path().join("README.md"), "hi\n").unwrap();
    git(&["add", "."]);
    git(&["commit", "-q", "-m", "initial"]);
    Repo { dir }
}

pub fn stdout_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout)
        .unwrap_or_else(|e| panic!("stdout was not JSON ({e}): {:?}", String::from_utf8_lossy(&output.stdout)))
}

#[allow(dead_code)]
pub fn simple_plan() -> &'static str {
    "## Goal\n\nDo the thing.\n\n## Pre-conditions\n\n- [x] repo exists\n\n## Files to Create\n\n- `src/thing.rs`\n\n## Files to Modify\n\n- `src/lib.rs`\n\n## Execution Steps\n\n1. write the thing\n2. wire it up\n"
}
