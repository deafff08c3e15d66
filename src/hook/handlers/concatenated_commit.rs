//! Post-Bash advisory: warn when a commit message looks like it bundles
//! more than one unrelated scope into a single commit.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::hook::{HandlerOutput, HookInput};
use crate::shell_command::{Token, first_simple_command, strip_agent_id_prefix, tokenize};

pub struct DetectConcatenatedCommit;

static SCOPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(feat|fix|refactor|docs|test|chore|perf|style)(\([^)]*\))?:").unwrap());

impl crate::hook::Handler for DetectConcatenatedCommit {
    fn name(&self) -> &'static str {
        "detect-concatenated-commit"
    }

    fn handle(&self, input: &HookInput) -> anyhow::Result<HandlerOutput> {
        let Some(command) = bash_command(input) else {
            return Ok(HandlerOutput::allow());
        };
        let (_, command) = strip_agent_id_prefix(&command);
        let Some(message) = commit_message(command) else {
            return Ok(HandlerOutput::allow());
        };

        let scopes = concatenated_scopes(&message);
        if scopes.len() > 1 {
            let count = scopes.len();
            let list = scopes.into_iter().collect::<Vec<_>>().join(", ");
            return Ok(HandlerOutput::warn(format!(
                "commit message mixes {count} scopes ({list}); consider splitting into separate commits"
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

/// Extract the joined `-m`/`--message` contents of a `git commit` command,
/// the way git itself joins multiple `-m` flags into paragraphs.
fn commit_message(command: &str) -> Option<String> {
    let tokens = tokenize(command);
    let cmd = first_simple_command(&tokens);
    let words: Vec<&str> = cmd
        .iter()
        .filter_map(|t| match t {
            Token::Word(w) => Some(w.as_str()),
            Token::Operator(_) => None,
        })
        .collect();

    if words.first().copied() != Some("git") || words.get(1).copied() != Some("commit") {
        return None;
    }

    let mut messages = Vec::new();
    let mut i = 2;
    while i < words.len() {
        let word = words[i];
        if (word == "-m" || word == "--message") && i + 1 < words.len() {
            messages.push(words[i + 1].to_string());
            i += 2;
        } else if let Some(rest) = word.strip_prefix("--message=") {
            messages.push(rest.to_string());
            i += 1;
        } else {
            i += 1;
        }
    }

    if messages.is_empty() { None } else { Some(messages.join("\n\n")) }
}

fn concatenated_scopes(message: &str) -> BTreeSet<String> {
    let mut scopes = BTreeSet::new();
    for line in message.lines() {
        let trimmed = line.trim().trim_start_matches(['-', '*']).trim();
        if let Some(caps) = SCOPE_RE.captures(trimmed) {
            scopes.insert(caps[1].to_ascii_lowercase());
        }
    }
    scopes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::Handler;

    fn input(command: &str) -> HookInput {
        HookInput {
            hook_event_name: "PostToolUse".to_string(),
            session_id: "s1".to_string(),
            cwd: "/tmp".to_string(),
            source: None,
            tool_name: Some("Bash".to_string()),
            tool_input: Some(serde_json::json!({ "command": command })),
            extra: serde_json::json!({}),
        }
    }

    #[test]
    fn single_scope_commit_is_allowed() {
        let handler = DetectConcatenatedCommit;
        let out = handler
            .handle(&input(r#"git commit -m "feat: add parser""#))
            .unwrap();
        assert!(out.warning.is_none());
    }

    #[test]
    fn mixed_scope_body_is_flagged() {
        let handler = DetectConcatenatedCommit;
        let command = "git commit -m \"feat: add parser\" -m \"- feat: parser support\n- fix: unrelated bug\"";
        let out = handler.handle(&input(command)).unwrap();
        assert!(out.warning.unwrap().contains("feat, fix"));
    }

    #[test]
    fn non_commit_command_is_ignored() {
        let handler = DetectConcatenatedCommit;
        let out = handler.handle(&input("git status")).unwrap();
        assert!(out.warning.is_none());
    }
}
