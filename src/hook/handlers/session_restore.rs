//! SessionStart (`source=resume`): if this session still holds a lock
//! whose worktree exists on disk, inject a `cd` instruction so the
//! assistant picks up exactly where it left off.

use std::path::Path;

use crate::hook::{HandlerOutput, HookInput};
use crate::lock::LockStore;
use crate::repository::Repository;

pub struct RestoreWorktreeOnResume;

impl crate::hook::Handler for RestoreWorktreeOnResume {
    fn name(&self) -> &'static str {
        "restore-worktree-on-resume"
    }

    fn handle(&self, input: &HookInput) -> anyhow::Result<HandlerOutput> {
        if input.hook_event_name != "SessionStart" || input.source.as_deref() != Some("resume") {
            return Ok(HandlerOutput::allow());
        }

        let cwd = Path::new(&input.cwd);
        let Ok(repo) = Repository::discover(cwd) else {
            return Ok(HandlerOutput::allow());
        };

        let locks = LockStore::new(repo.root());
        let Ok(entries) = locks.list() else {
            return Ok(HandlerOutput::allow());
        };

        for entry in entries {
            if entry.session_id != input.session_id {
                continue;
            }
            for path in entry.worktrees.keys() {
                if is_safe_worktree_path(path, repo.root()) && Path::new(path).is_dir() {
                    return Ok(HandlerOutput::context(format!("cd {path}")));
                }
            }
        }

        Ok(HandlerOutput::allow())
    }
}

/// Reject anything that isn't a clean absolute path inside the repository:
/// no `..` traversal, no control characters, must live under `repo_root`.
fn is_safe_worktree_path(path: &str, repo_root: &Path) -> bool {
    if path.contains("..") || path.chars().any(|c| c.is_control()) {
        return false;
    }
    let candidate = Path::new(path);
    candidate.is_absolute() && crate::path::is_inside_or_equal(repo_root, candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_id::AgentId;
    use crate::hook::Handler;
    use std::process::Command;
    use tempfile::TempDir;

    fn init_repo() -> TempDir {
        let dir = TempDir::new().unwrap();
        let run = |args: &[&str]| {
            let status = Command::new("git")
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
        std::fs::write(dir.path().join("README.md"), "hi").unwrap();
        run(&["add", "."]);
        run(&["commit", "-q", "-m", "initial"]);
        dir
    }

    fn input(cwd: &Path, session_id: &str, source: Option<&str>) -> HookInput {
        HookInput {
            hook_event_name: "SessionStart".to_string(),
            session_id: session_id.to_string(),
            cwd: cwd.to_string_lossy().to_string(),
            source: source.map(str::to_string),
            tool_name: None,
            tool_input: None,
            extra: serde_json::json!({}),
        }
    }

    #[test]
    fn non_resume_source_is_ignored() {
        let dir = init_repo();
        let handler = RestoreWorktreeOnResume;
        let out = handler.handle(&input(dir.path(), "S1", None)).unwrap();
        assert!(out.additional_context.is_none());
    }

    #[test]
    fn resume_with_live_worktree_injects_cd() {
        let dir = init_repo();
        let repo = Repository::at(dir.path());
        let worktree_path = repo.worktree_path("2.1-x");
        repo.create_worktree("2.1-x", &worktree_path, "main").unwrap();

        let locks = LockStore::new(repo.root());
        locks.acquire("2.1-x", "S1").unwrap();
        locks
            .update("2.1-x", "S1", &worktree_path.to_string_lossy(), &AgentId::main("S1"))
            .unwrap();

        let handler = RestoreWorktreeOnResume;
        let out = handler
            .handle(&input(dir.path(), "S1", Some("resume")))
            .unwrap();
        let ctx = out.additional_context.unwrap();
        assert!(ctx.contains(&worktree_path.to_string_lossy().to_string()));
    }

    #[test]
    fn resume_for_a_different_session_is_ignored() {
        let dir = init_repo();
        let repo = Repository::at(dir.path());
        let worktree_path = repo.worktree_path("2.1-x");
        repo.create_worktree("2.1-x", &worktree_path, "main").unwrap();

        let locks = LockStore::new(repo.root());
        locks.acquire("2.1-x", "S1").unwrap();
        locks
            .update("2.1-x", "S1", &worktree_path.to_string_lossy(), &AgentId::main("S1"))
            .unwrap();

        let handler = RestoreWorktreeOnResume;
        let out = handler
            .handle(&input(dir.path(), "S2", Some("resume")))
            .unwrap();
        assert!(out.additional_context.is_none());
    }
}
