//! Rules: markdown files with YAML frontmatter under
//! `{repo}/.claude/cat/rules/`, filtered by subagent/path audience and
//! concatenated into the SessionStart/SubagentStart `additionalContext`.
//!
//! The frontmatter reader is intentionally minimal: two keys only
//! (`subAgents`, `paths`), each either an inline `[a, b]` list or a
//! block `- item` list. Anything else in the frontmatter is ignored.

use std::fs;
use std::path::Path;

use crate::agent_id::AgentId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Frontmatter {
    sub_agents: Option<Vec<String>>,
    paths: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
struct Rule {
    frontmatter: Frontmatter,
    body: String,
}

/// Load every rule file under `rules_dir`, filter by `agent`/`cwd`
/// audience, and return the matching bodies in filename order.
pub fn load_rules_for(rules_dir: &Path, agent: &AgentId, cwd: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(rules_dir) else {
        return Vec::new();
    };

    let mut paths: Vec<_> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "md"))
        .collect();
    paths.sort();

    let mut out = Vec::new();
    for path in paths {
        let Ok(content) = fs::read_to_string(&path) else {
            continue;
        };
        let rule = parse_rule(&content);
        if rule_applies(&rule.frontmatter, agent, cwd) {
            out.push(rule.body);
        }
    }
    out
}

fn rule_applies(frontmatter: &Frontmatter, agent: &AgentId, cwd: &Path) -> bool {
    if let Some(sub_agents) = &frontmatter.sub_agents {
        match agent.subagent_id() {
            Some(id) => {
                if !sub_agents.iter().any(|a| a == id) {
                    return false;
                }
            }
            None => return false,
        }
    }

    if let Some(patterns) = &frontmatter.paths {
        let cwd_str = cwd.to_string_lossy();
        if !patterns.iter().any(|pattern| glob_match(pattern, &cwd_str)) {
            return false;
        }
    }

    true
}

fn parse_rule(content: &str) -> Rule {
    let Some(rest) = content.strip_prefix("---\n") else {
        return Rule {
            frontmatter: Frontmatter::default(),
            body: content.trim().to_string(),
        };
    };

    let Some(end) = rest.find("\n---") else {
        return Rule {
            frontmatter: Frontmatter::default(),
            body: content.trim().to_string(),
        };
    };

    let yaml = &rest[..end];
    let body = rest[end + 4..].trim_start_matches('\n').trim().to_string();
    Rule {
        frontmatter: parse_frontmatter(yaml),
        body,
    }
}

fn parse_frontmatter(yaml: &str) -> Frontmatter {
    let mut frontmatter = Frontmatter::default();
    let lines: Vec<&str> = yaml.lines().collect();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        let trimmed = line.trim();
        if let Some(value) = trimmed.strip_prefix("subAgents:") {
            let (list, consumed) = read_list(value.trim(), &lines[i + 1..]);
            frontmatter.sub_agents = Some(list);
            i += 1 + consumed;
            continue;
        }
        if let Some(value) = trimmed.strip_prefix("paths:") {
            let (list, consumed) = read_list(value.trim(), &lines[i + 1..]);
            frontmatter.paths = Some(list);
            i += 1 + consumed;
            continue;
        }
        i += 1;
    }
    frontmatter
}

/// Read a YAML list value, either inline (`[a, b]`) on the same line, or as
/// a block of `- item` lines following it. Returns the parsed list and the
/// number of extra lines consumed from `following`.
fn read_list(inline: &str, following: &[&str]) -> (Vec<String>, usize) {
    if let Some(stripped) = inline.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        let items = stripped
            .split(',')
            .map(|s| unquote(s.trim()))
            .filter(|s| !s.is_empty())
            .collect();
        return (items, 0);
    }

    let mut items = Vec::new();
    let mut consumed = 0;
    for line in following {
        let trimmed = line.trim();
        match trimmed.strip_prefix("- ") {
            Some(item) => {
                items.push(unquote(item.trim()));
                consumed += 1;
            }
            None => break,
        }
    }
    (items, consumed)
}

fn unquote(s: &str) -> String {
    s.trim_matches(['"', '\'']).to_string()
}

/// `*` matches any run of characters within a glob pattern; everything else
/// is matched literally. No `**`/segment-aware semantics — a plain suffix
/// or prefix-style glob is all the audience filter needs.
fn glob_match(pattern: &str, candidate: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return candidate == pattern;
    }

    let mut rest = candidate;
    for (idx, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if idx == 0 {
            let Some(r) = rest.strip_prefix(part) else {
                return false;
            };
            rest = r;
        } else if idx == parts.len() - 1 {
            return rest.ends_with(part);
        } else {
            let Some(pos) = rest.find(part) else {
                return false;
            };
            rest = &rest[pos + part.len()..];
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_rule(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn rule_with_no_frontmatter_applies_to_everyone() {
        let dir = TempDir::new().unwrap();
        write_rule(dir.path(), "a.md", "Always follow the commit message format.");
        let rules = load_rules_for(dir.path(), &AgentId::main("S1"), Path::new("/workspace/repo"));
        assert_eq!(rules, vec!["Always follow the commit message format.".to_string()]);
    }

    #[test]
    fn sub_agents_filter_excludes_main_agent() {
        let dir = TempDir::new().unwrap();
        write_rule(
            dir.path(),
            "a.md",
            "---\nsubAgents: [reviewer]\n---\nReview carefully.",
        );
        let rules = load_rules_for(dir.path(), &AgentId::main("S1"), Path::new("/workspace/repo"));
        assert!(rules.is_empty());
    }

    #[test]
    fn sub_agents_filter_matches_named_subagent() {
        let dir = TempDir::new().unwrap();
        write_rule(
            dir.path(),
            "a.md",
            "---\nsubAgents: [reviewer]\n---\nReview carefully.",
        );
        let rules = load_rules_for(
            dir.path(),
            &AgentId::subagent("S1", "reviewer"),
            Path::new("/workspace/repo"),
        );
        assert_eq!(rules, vec!["Review carefully.".to_string()]);
    }

    #[test]
    fn paths_filter_matches_glob() {
        let dir = TempDir::new().unwrap();
        write_rule(
            dir.path(),
            "a.md",
            "---\npaths: [\"*/worktrees/*\"]\n---\nWorktree-only note.",
        );
        let rules = load_rules_for(
            dir.path(),
            &AgentId::main("S1"),
            Path::new("/workspace/repo/.claude/cat/worktrees/2.1-x"),
        );
        assert_eq!(rules, vec!["Worktree-only note.".to_string()]);

        let rules = load_rules_for(dir.path(), &AgentId::main("S1"), Path::new("/workspace/repo"));
        assert!(rules.is_empty());
    }

    #[test]
    fn block_list_frontmatter_is_parsed() {
        let dir = TempDir::new().unwrap();
        write_rule(
            dir.path(),
            "a.md",
            "---\nsubAgents:\n  - reviewer\n  - planner\n---\nBody text.",
        );
        let rules = load_rules_for(
            dir.path(),
            &AgentId::subagent("S1", "planner"),
            Path::new("/workspace/repo"),
        );
        assert_eq!(rules, vec!["Body text.".to_string()]);
    }

    #[test]
    fn rules_are_returned_in_filename_order() {
        let dir = TempDir::new().unwrap();
        write_rule(dir.path(), "b.md", "second");
        write_rule(dir.path(), "a.md", "first");
        let rules = load_rules_for(dir.path(), &AgentId::main("S1"), Path::new("/workspace/repo"));
        assert_eq!(rules, vec!["first".to_string(), "second".to_string()]);
    }
}
