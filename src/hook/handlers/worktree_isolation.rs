//! Pre-Write/Edit: block edits whose target file lies outside the
//! session's active worktree, suggesting the corrected in-worktree path.

use std::path::Path;

use crate::hook::{HandlerOutput, HookInput};
use crate::lock::LockStore;
use crate::path::{is_inside_or_equal, resolve_path};
use crate::repository::Repository;

pub struct EnforceWorktreePathIsolation;

impl crate::hook::Handler for EnforceWorktreePathIsolation {
    fn name(&self) -> &'static str {
        "enforce-worktree-path-isolation"
    }

    fn handle(&self, input: &HookInput) -> anyhow::Result<HandlerOutput> {
        if !matches!(input.tool_name.as_deref(), Some("Write") | Some("Edit") | Some("MultiEdit")) {
            return Ok(HandlerOutput::allow());
        }
        let Some(file_path) = input
            .tool_input
            .as_ref()
            .and_then(|v| v.get("file_path"))
            .and_then(|v| v.as_str())
        else {
            return Ok(HandlerOutput::allow());
        };

        let cwd = Path::new(&input.cwd);
        let Ok(repo) = Repository::discover(cwd) else {
            return Ok(HandlerOutput::allow());
        };

        let Some(worktree) = active_worktree_for_session(&repo, &input.session_id) else {
            return Ok(HandlerOutput::allow());
        };

        let target = resolve_path(file_path, cwd);
        if is_inside_or_equal(&worktree, &target) {
            return Ok(HandlerOutput::allow());
        }

        let Some(relative) = pathdiff::diff_paths(&target, repo.root()) else {
            return Ok(HandlerOutput::allow());
        };
        let corrected = worktree.join(relative);
        Ok(HandlerOutput::block(format!(
            "{file_path} is outside this session's active worktree; write to {} instead",
            corrected.display()
        )))
    }
}

/// The first worktree path whose tenant is `session_id`, per the
/// non-stale locks currently held.
fn active_worktree_for_session(repo: &Repository, session_id: &str) -> Option<std::path::PathBuf> {
    let locks = LockStore::new(repo.root());
    let entries = locks.list().ok()?;
    for entry in entries {
        if locks.read(&entry.issue_id).ok().flatten().map(|l| locks.is_stale(&l)).unwrap_or(true) {
            continue;
        }
        for (path, agent) in &entry.worktrees {
            if agent.session_id() == session_id {
                return Some(std::path::PathBuf::from(path));
            }
        }
    }
    None
}
