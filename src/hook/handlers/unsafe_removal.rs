//! The most consequential PreToolUse{Bash} handler: refuse to let a `rm
//! -rf` or `git worktree remove` reach outside its own turf.

use std::path::{Path, PathBuf};

use crate::agent_id::AgentId;
use crate::hook::{HandlerOutput, HookInput};
use crate::lock::LockStore;
use crate::path::{is_inside_or_equal, resolve_path};
use crate::repository::Repository;
use crate::shell_command::{detect_git_worktree_remove, detect_rm, strip_agent_id_prefix, tokenize};

pub struct UnsafeRemovalGuard;

struct Protected {
    path: PathBuf,
    reason: &'static str,
    holder: Option<AgentId>,
}

impl crate::hook::Handler for UnsafeRemovalGuard {
    fn name(&self) -> &'static str {
        "unsafe-removal-guard"
    }

    fn handle(&self, input: &HookInput) -> anyhow::Result<HandlerOutput> {
        let Some(command) = bash_command(input) else {
            return Ok(HandlerOutput::allow());
        };

        let (agent_id_raw, command) = strip_agent_id_prefix(&command);
        let tokens = tokenize(command);

        let targets: Vec<String> = if let Some(rm) = detect_rm(&tokens) {
            if !rm.recursive {
                return Ok(HandlerOutput::allow());
            }
            rm.targets
        } else if let Some(target) = detect_git_worktree_remove(&tokens) {
            vec![target]
        } else {
            return Ok(HandlerOutput::allow());
        };

        if targets.is_empty() {
            return Ok(HandlerOutput::allow());
        }

        let cwd = Path::new(&input.cwd);
        let protected = self.protected_paths(input, cwd, agent_id_raw.as_deref());

        for target in targets {
            let resolved = resolve_path(&target, cwd);
            // A protected path is at risk when the target equals it or is one
            // of its ancestors — removing the target would take the
            // protected path down with it. CURRENT_WORKING_DIRECTORY is
            // checked first: it blocks even the rightful owner, since
            // deleting one's own CWD still corrupts the shell.
            for p in &protected {
                if is_inside_or_equal(&resolved, &p.path) {
                    return Ok(HandlerOutput::block(recovery_message(p.reason, &p.path, p.holder.as_ref())));
                }
            }
        }

        Ok(HandlerOutput::allow())
    }
}

impl UnsafeRemovalGuard {
    fn protected_paths(&self, input: &HookInput, cwd: &Path, command_agent_id: Option<&str>) -> Vec<Protected> {
        let mut out = vec![Protected {
            path: cwd.to_path_buf(),
            reason: "CURRENT_WORKING_DIRECTORY",
            holder: None,
        }];

        if let Ok(repo) = Repository::discover(cwd) {
            out.push(Protected {
                path: repo.root().to_path_buf(),
                reason: "MAIN_WORKTREE",
                holder: None,
            });

            let command_agent_id: Option<AgentId> = command_agent_id.and_then(|s| s.parse().ok());

            let locks = LockStore::new(repo.root());
            if let Ok(entries) = locks.list() {
                for entry in entries {
                    if locks.read(&entry.issue_id).ok().flatten().map(|l| locks.is_stale(&l)).unwrap_or(false) {
                        continue;
                    }
                    for (path, holder) in &entry.worktrees {
                        let Some(reason) = classify_lock(holder, command_agent_id.as_ref(), &input.session_id)
                        else {
                            continue;
                        };
                        out.push(Protected {
                            path: PathBuf::from(path),
                            reason,
                            holder: Some(holder.clone()),
                        });
                    }
                }
            }
        }

        out
    }
}

/// `None` means the command's own agent owns this lock (not protected
/// against it). A different session always protects with
/// `LOCKED_BY_OTHER_AGENT`; the same session but an unresolved or
/// mismatched subagent fails safe with `UNKNOWN_AGENT` rather than
/// assuming ownership.
fn classify_lock(holder: &AgentId, command_agent_id: Option<&AgentId>, session_id: &str) -> Option<&'static str> {
    if !holder.same_session(&AgentId::main(session_id)) {
        return Some("LOCKED_BY_OTHER_AGENT");
    }
    match command_agent_id {
        Some(id) if id == holder => None,
        _ => Some("UNKNOWN_AGENT"),
    }
}

fn bash_command(input: &HookInput) -> Option<String> {
    if input.tool_name.as_deref() != Some("Bash") {
        return None;
    }
    input
        .tool_input
        .as_ref()?
        .get("command")?
        .as_str()
        .map(str::to_string)
}

fn recovery_message(reason: &str, path: &Path, holder: Option<&AgentId>) -> String {
    const HEADER: &str = "UNSAFE DIRECTORY REMOVAL BLOCKED";

    match reason {
        "CURRENT_WORKING_DIRECTORY" => format!(
            "{HEADER}\nrefusing to remove {}: it is the current working directory; cd elsewhere first",
            path.display()
        ),
        "MAIN_WORKTREE" => format!(
            "{HEADER}\nrefusing to remove {}: it is the main worktree root",
            path.display()
        ),
        "LOCKED_BY_OTHER_AGENT" => {
            let owner = holder.map(ToString::to_string).unwrap_or_else(|| "unknown".to_string());
            format!(
                "{HEADER}\nWorktree is locked by another agent: {}\nLock owner: {owner}\n\
                 If this is really your worktree, retry with: CAT_AGENT_ID=<your-agent-id> rm -rf …",
                path.display()
            )
        }
        "UNKNOWN_AGENT" => {
            let owner = holder.map(ToString::to_string).unwrap_or_else(|| "unknown".to_string());
            format!(
                "{HEADER}\nWorktree at {} is locked under this session but the command carries no \
                 CAT_AGENT_ID to verify which subagent owns it (failing safe)\nLock owner: {owner}\n\
                 If this is really your worktree, retry with: CAT_AGENT_ID=<your-agent-id> rm -rf …",
                path.display()
            )
        }
        _ => format!("{HEADER}\nrefusing to remove {}", path.display()),
    }
}
