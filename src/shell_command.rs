//! Shell-command tokenizing and intent extraction.
//!
//! The tokenizer is the single most important piece of defensive code in
//! this crate: every `Bash` command the unsafe-removal guard inspects is
//! first split into tokens here, so a quoting bug here is a guard bypass
//! everywhere else.

use std::fmt;

/// A single shell token, tagged with the kind of boundary that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A word: a flag, command name, or positional argument.
    Word(String),
    /// `;`, `|`, `&`, `&&`, `||`, or a redirection operator (`>`, `>>`, `<`).
    /// Tokenization stops respecting a single simple command once one of
    /// these appears; callers that only care about the first command in a
    /// pipeline truncate here.
    Operator(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word(w) => write!(f, "{w}"),
            Token::Operator(op) => write!(f, "{op}"),
        }
    }
}

const OPERATORS: &[&str] = &["&&", "||", ">>", ";", "|", "&", ">", "<"];

/// Tokenize a shell command string, respecting `"`/`'` quoting and backslash
/// escapes (via `shlex`), then re-splitting on operator boundaries `shlex`
/// itself doesn't know about (`;`, `|`, `&`, `>`, `<`, `&&`, `||`, `>>`).
///
/// Does not expand variables or globs. Ordering is preserved; adjacent
/// tokens are never merged.
pub fn tokenize(command: &str) -> Vec<Token> {
    let Some(words) = shlex::split(command) else {
        // Unbalanced quoting: shlex gives up, so conservatively treat the
        // whole string as a single opaque word rather than guessing.
        return vec![Token::Word(command.to_string())];
    };

    let mut tokens = Vec::new();
    for word in words {
        split_operators(&word, &mut tokens);
    }
    tokens
}

/// Split a single shlex-produced word further on any embedded (unquoted by
/// construction, since shlex already consumed quotes) operator substrings.
fn split_operators(word: &str, out: &mut Vec<Token>) {
    let mut rest = word;
    'outer: while !rest.is_empty() {
        for op in OPERATORS {
            if let Some(pos) = rest.find(op) {
                if pos > 0 {
                    out.push(Token::Word(rest[..pos].to_string()));
                }
                out.push(Token::Operator((*op).to_string()));
                rest = &rest[pos + op.len()..];
                continue 'outer;
            }
        }
        out.push(Token::Word(rest.to_string()));
        return;
    }
}

/// The first simple command in a token stream: the tokens up to (excluding)
/// the first operator. Safety handlers only reason about the first command
/// of a submitted string — anything chained after `;`/`&&`/`|` is out of
/// scope for a single-handler decision.
pub fn first_simple_command(tokens: &[Token]) -> &[Token] {
    tokens
        .iter()
        .position(|t| matches!(t, Token::Operator(_)))
        .map(|idx| &tokens[..idx])
        .unwrap_or(tokens)
}

/// Extracted shape of an `rm` invocation relevant to the unsafe-removal
/// guard: whether a recursive flag was present, and the positional targets
/// (post `--`-aware, flag-aware parsing).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RmInvocation {
    pub recursive: bool,
    pub targets: Vec<String>,
}

/// Recognize `rm` with a recursive flag in the first simple command of
/// `tokens`, returning its positional targets. Returns `None` if the first
/// word is not `rm`, or under another name entirely (aliases are not
/// resolved here — that's outside what the tokenizer can see).
pub fn detect_rm(tokens: &[Token]) -> Option<RmInvocation> {
    let cmd = first_simple_command(tokens);
    let mut words = cmd.iter().filter_map(|t| match t {
        Token::Word(w) => Some(w.as_str()),
        Token::Operator(_) => None,
    });

    let program = words.next()?;
    if program != "rm" && !program.ends_with("/rm") {
        return None;
    }

    let mut recursive = false;
    let mut targets = Vec::new();
    let mut end_of_options = false;

    for word in words {
        if !end_of_options && word == "--" {
            end_of_options = true;
            continue;
        }
        if !end_of_options && word.starts_with('-') && word.len() > 1 {
            if word == "--recursive" || (word.starts_with("--") && word.contains("recursive")) {
                recursive = true;
            } else if !word.starts_with("--") && (word.contains('r') || word.contains('R')) {
                recursive = true;
            }
            continue;
        }
        targets.push(word.to_string());
    }

    Some(RmInvocation { recursive, targets })
}

/// Recognize `git worktree remove [-flags] <target>` in the first simple
/// command of `tokens`, returning the target path if present.
pub fn detect_git_worktree_remove(tokens: &[Token]) -> Option<String> {
    let cmd = first_simple_command(tokens);
    let words: Vec<&str> = cmd
        .iter()
        .filter_map(|t| match t {
            Token::Word(w) => Some(w.as_str()),
            Token::Operator(_) => None,
        })
        .collect();

    if words.first().copied() != Some("git") {
        return None;
    }
    if words.get(1).copied() != Some("worktree") {
        return None;
    }
    if words.get(2).copied() != Some("remove") {
        return None;
    }

    words[3..]
        .iter()
        .find(|w| !w.starts_with('-'))
        .map(|w| w.to_string())
}

/// Strip a leading `CAT_AGENT_ID=<value>` environment-variable prefix off a
/// raw command string, returning the remaining command and the extracted
/// agent-id, if present.
pub fn strip_agent_id_prefix(command: &str) -> (Option<String>, &str) {
    let trimmed = command.trim_start();
    let Some(rest) = trimmed.strip_prefix("CAT_AGENT_ID=") else {
        return (None, command);
    };

    let end = rest
        .find(char::is_whitespace)
        .unwrap_or(rest.len());
    let (value, remainder) = rest.split_at(end);
    (Some(value.trim_matches(['"', '\'']).to_string()), remainder.trim_start())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_preserves_order_and_quoting() {
        let tokens = tokenize(r#"rm -rf "my dir" 'other dir'"#);
        assert_eq!(
            tokens,
            vec![
                Token::Word("rm".into()),
                Token::Word("-rf".into()),
                Token::Word("my dir".into()),
                Token::Word("other dir".into()),
            ]
        );
    }

    #[test]
    fn tokenize_splits_operators() {
        let tokens = tokenize("rm -rf foo; echo done");
        assert_eq!(
            tokens,
            vec![
                Token::Word("rm".into()),
                Token::Word("-rf".into()),
                Token::Word("foo".into()),
                Token::Operator(";".into()),
                Token::Word("echo".into()),
                Token::Word("done".into()),
            ]
        );
    }

    #[test]
    fn tokenize_rejects_unbalanced_quotes_as_opaque() {
        let tokens = tokenize(r#"rm -rf "unterminated"#);
        assert_eq!(tokens.len(), 1);
    }

    #[test]
    fn detect_rm_recursive_flag_combined() {
        let tokens = tokenize("rm -rf /workspace/.claude/cat/worktrees/2.1-other");
        let rm = detect_rm(&tokens).unwrap();
        assert!(rm.recursive);
        assert_eq!(rm.targets, vec!["/workspace/.claude/cat/worktrees/2.1-other"]);
    }

    #[test]
    fn detect_rm_long_flag() {
        let tokens = tokenize("rm --recursive --force ./build");
        let rm = detect_rm(&tokens).unwrap();
        assert!(rm.recursive);
        assert_eq!(rm.targets, vec!["./build"]);
    }

    #[test]
    fn detect_rm_respects_end_of_options() {
        let tokens = tokenize("rm -rf -- -weird-name");
        let rm = detect_rm(&tokens).unwrap();
        assert_eq!(rm.targets, vec!["-weird-name"]);
    }

    #[test]
    fn detect_rm_non_recursive_is_not_flagged() {
        let tokens = tokenize("rm file.txt");
        let rm = detect_rm(&tokens).unwrap();
        assert!(!rm.recursive);
    }

    #[test]
    fn detect_rm_ignores_other_commands() {
        let tokens = tokenize("ls -la");
        assert!(detect_rm(&tokens).is_none());
    }

    #[test]
    fn detect_git_worktree_remove_extracts_target() {
        let tokens = tokenize("git worktree remove --force /path/to/wt");
        assert_eq!(
            detect_git_worktree_remove(&tokens),
            Some("/path/to/wt".to_string())
        );
    }

    #[test]
    fn first_simple_command_stops_at_operator() {
        let tokens = tokenize("rm -rf foo && echo done");
        let first = first_simple_command(&tokens);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn strip_agent_id_prefix_extracts_value() {
        let (agent_id, rest) = strip_agent_id_prefix("CAT_AGENT_ID=S2/subagents/7 rm -rf foo");
        assert_eq!(agent_id.as_deref(), Some("S2/subagents/7"));
        assert_eq!(rest, "rm -rf foo");
    }

    #[test]
    fn strip_agent_id_prefix_absent() {
        let (agent_id, rest) = strip_agent_id_prefix("rm -rf foo");
        assert_eq!(agent_id, None);
        assert_eq!(rest, "rm -rf foo");
    }
}
