//! Post-Bash advisory: warn when a `git rebase` lands on a ref other than
//! the issue branch's recorded fork-point.

use std::path::Path;

use crate::hook::{HandlerOutput, HookInput};
use crate::process::run_git_single_line;
use crate::repository::Repository;
use crate::shell_command::{Token, first_simple_command, strip_agent_id_prefix, tokenize};

pub struct ValidateRebaseTarget;

impl crate::hook::Handler for ValidateRebaseTarget {
    fn name(&self) -> &'static str {
        "validate-rebase-target"
    }

    fn handle(&self, input: &HookInput) -> anyhow::Result<HandlerOutput> {
        let Some(command) = bash_command(input) else {
            return Ok(HandlerOutput::allow());
        };
        let (_, command) = strip_agent_id_prefix(&command);
        let Some(target) = rebase_target(command) else {
            return Ok(HandlerOutput::allow());
        };

        let cwd = Path::new(&input.cwd);
        let Ok(repo) = Repository::discover(cwd) else {
            return Ok(HandlerOutput::allow());
        };
        let Ok(branch) = repo.current_branch(cwd) else {
            return Ok(HandlerOutput::allow());
        };
        let Ok(fork_point) = repo.read_branch_point(&branch) else {
            // Not a cat-provisioned worktree (no sidecar recorded) — nothing
            // to validate against.
            return Ok(HandlerOutput::allow());
        };
        let Ok(target_hash) = run_git_single_line(cwd, &["rev-parse", &target]) else {
            return Ok(HandlerOutput::allow());
        };

        if target_hash != fork_point {
            return Ok(HandlerOutput::warn(format!(
                "rebase target {target} ({target_hash}) is not {branch}'s recorded fork-point ({fork_point})"
            )));
        }
        Ok(HandlerOutput::allow())
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

/// The target ref of a `git rebase [--onto <newbase>] <upstream>` command.
/// `--abort`/`--continue`/`--skip` invocations have no target and are
/// ignored.
fn rebase_target(command: &str) -> Option<String> {
    let tokens = tokenize(command);
    let cmd = first_simple_command(&tokens);
    let words: Vec<&str> = cmd
        .iter()
        .filter_map(|t| match t {
            Token::Word(w) => Some(w.as_str()),
            Token::Operator(_) => None,
        })
        .collect();

    if words.first().copied() != Some("git") || words.get(1).copied() != Some("rebase") {
        return None;
    }

    if let Some(pos) = words.iter().position(|w| *w == "--onto") {
        return words.get(pos + 1).map(|s| s.to_string());
    }

    words[2..]
        .iter()
        .find(|w| {
            !w.starts_with('-') && !matches!(**w, "--abort" | "--continue" | "--skip" | "--quit")
        })
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_rebase_target_is_extracted() {
        assert_eq!(rebase_target("git rebase main"), Some("main".to_string()));
    }

    #[test]
    fn onto_form_extracts_the_onto_argument() {
        assert_eq!(
            rebase_target("git rebase --onto main abc123"),
            Some("main".to_string())
        );
    }

    #[test]
    fn continuation_flags_have_no_target() {
        assert_eq!(rebase_target("git rebase --continue"), None);
        assert_eq!(rebase_target("git rebase --abort"), None);
    }

    #[test]
    fn non_rebase_command_is_ignored() {
        assert_eq!(rebase_target("git status"), None);
    }
}
