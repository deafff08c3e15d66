//! Skill Output Dispatcher: a pure function routing a dotted type
//! (`status`, `config.settings`, …) to a read-only renderer, wrapping the
//! result in `<output type="…">…</output>` for the host's skill
//! preprocessor to splice into markdown.

use std::path::Path;

use crate::depgraph::DependencyGraph;
use crate::issue::{IssueStore, ResolveResult, Status};
use crate::lock::LockStore;
use crate::repository::Repository;

/// Dispatch `args[0]` (a dotted type) to its renderer and wrap the result.
/// `args[0]` is split on its *first* `.` only, so `deps.2.1-x` still
/// resolves to the `deps` renderer with `2.1-x` as its sole argument.
pub fn dispatch(repo_root: &Path, args: &[String]) -> String {
    let Some(first) = args.first() else {
        return wrap("error", "skill-output requires a dotted type argument");
    };

    let (renderer, sub) = match first.split_once('.') {
        Some((name, rest)) => (name, Some(rest.to_string())),
        None => (first.as_str(), None),
    };
    let rest_args: Vec<String> = sub.into_iter().chain(args[1..].iter().cloned()).collect();

    let body = match renderer {
        "status" => render_status(repo_root, &rest_args),
        "config" => render_config(repo_root, &rest_args),
        "work-complete" => render_work_complete(repo_root, &rest_args),
        "locks" => render_locks(repo_root),
        "deps" => render_deps(repo_root, &rest_args),
        other => Err(format!("unknown skill-output type {other:?}")),
    };

    match body {
        Ok(content) => wrap(first, &content),
        Err(message) => wrap(first, &format!("error: {message}")),
    }
}

fn wrap(kind: &str, content: &str) -> String {
    format!("<output type=\"{kind}\">{content}</output>")
}

/// `status` (no argument): a one-line summary across all issues.
/// `status.<issueId>`: that issue's status/progress/dependency line.
fn render_status(repo_root: &Path, args: &[String]) -> Result<String, String> {
    let store = IssueStore::load(repo_root).map_err(|e| e.to_string())?;

    if let Some(id) = args.first() {
        let issue = match store.resolve(id) {
            ResolveResult::Found(issue) => issue,
            ResolveResult::Ambiguous(candidates) => {
                return Err(format!("{id} is ambiguous among {}", candidates.join(", ")));
            }
            ResolveResult::NotFound => return Err(format!("no issue named {id}")),
        };
        let progress = issue.state.progress.map(|p| format!("{p}%")).unwrap_or_else(|| "-".to_string());
        return Ok(format!(
            "{} {} ({progress})",
            issue.qualified_name.raw,
            issue.state.status.as_str(),
        ));
    }

    let mut open = 0;
    let mut in_progress = 0;
    let mut closed = 0;
    let mut decomposed = 0;
    for issue in store.by_qualified_name.values() {
        match issue.state.status {
            Status::Open => open += 1,
            Status::InProgress => in_progress += 1,
            Status::Closed => closed += 1,
            Status::Decomposed => decomposed += 1,
        }
    }
    Ok(format!(
        "{open} open, {in_progress} in-progress, {closed} closed, {decomposed} decomposed"
    ))
}

/// `config` or `config.<field>`: the active three-tier config, or one field.
fn render_config(repo_root: &Path, args: &[String]) -> Result<String, String> {
    let config = crate::config::load(repo_root);
    let value = serde_json::to_value(config).map_err(|e| e.to_string())?;

    match args.first() {
        None => serde_json::to_string_pretty(&value).map_err(|e| e.to_string()),
        Some(field) => value
            .get(field)
            .map(|v| v.to_string())
            .ok_or_else(|| format!("no config field named {field}")),
    }
}

/// `work-complete.<issueId>`: whether an issue's dependencies are all
/// closed and it does not itself participate in a cycle.
fn render_work_complete(repo_root: &Path, args: &[String]) -> Result<String, String> {
    let id = args.first().ok_or("work-complete requires an issue id")?;
    let store = IssueStore::load(repo_root).map_err(|e| e.to_string())?;
    let issue = match store.resolve(id) {
        ResolveResult::Found(issue) => issue,
        ResolveResult::Ambiguous(candidates) => {
            return Err(format!("{id} is ambiguous among {}", candidates.join(", ")));
        }
        ResolveResult::NotFound => return Err(format!("no issue named {id}")),
    };
    let name = issue.qualified_name.raw.clone();

    let graph = DependencyGraph::build(&store);
    let cycles = graph.find_cycles().map_err(|e| e.to_string())?;
    if graph.is_cyclic(&name, &cycles) {
        return Ok(format!("{name}: blocked, participates in a dependency cycle"));
    }

    let blocked = graph.blocked_issues(&store);
    match blocked.get(&name) {
        Some(deps) if !deps.is_empty() => {
            let names: Vec<&str> = deps.iter().map(|d| d.name.as_str()).collect();
            Ok(format!("{name}: blocked on {}", names.join(", ")))
        }
        _ => Ok(format!("{name}: complete, no unresolved dependencies")),
    }
}

/// `locks`: the live lock table, one line per non-empty lock.
fn render_locks(repo_root: &Path) -> Result<String, String> {
    let locks = LockStore::new(repo_root);
    let entries = locks.list().map_err(|e| e.to_string())?;
    if entries.is_empty() {
        return Ok("no active locks".to_string());
    }

    let mut lines = Vec::new();
    for entry in entries {
        lines.push(format!(
            "{} held by {} ({}s old, {} worktree(s))",
            entry.issue_id,
            entry.session_id,
            entry.age_seconds,
            entry.worktrees.len(),
        ));
    }
    Ok(lines.join("\n"))
}

/// `deps.<issueId>`: the blocked-dependency list for one issue.
fn render_deps(repo_root: &Path, args: &[String]) -> Result<String, String> {
    let id = args.first().ok_or("deps requires an issue id")?;
    let store = IssueStore::load(repo_root).map_err(|e| e.to_string())?;
    let issue = match store.resolve(id) {
        ResolveResult::Found(issue) => issue,
        ResolveResult::Ambiguous(candidates) => {
            return Err(format!("{id} is ambiguous among {}", candidates.join(", ")));
        }
        ResolveResult::NotFound => return Err(format!("no issue named {id}")),
    };
    let name = issue.qualified_name.raw.clone();

    let graph = DependencyGraph::build(&store);
    let blocked = graph.blocked_issues(&store);
    match blocked.get(&name) {
        Some(deps) if !deps.is_empty() => {
            let lines: Vec<String> = deps
                .iter()
                .map(|d| format!("{} ({:?})", d.name, d.status))
                .collect();
            Ok(lines.join("\n"))
        }
        _ => Ok(format!("{name} has no unresolved dependencies")),
    }
}

/// Entry point for [`Repository`]-rooted callers that don't already have a
/// path to hand `dispatch`.
pub fn dispatch_in(repo: &Repository, args: &[String]) -> String {
    dispatch(repo.root(), args)
}
