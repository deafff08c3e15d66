//! Issue Store: walks the issue tree and maintains qualified-name and
//! bare-name indexes over it.

pub mod plan;
pub mod state;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use regex::Regex;

pub use plan::{Plan, Precondition, parse_plan};
pub use state::{IssueState, Status, apply_transition, parse_state};

const MAX_DEPTH: usize = 4;
const MAX_VISITED_ENTRIES: usize = 100_000;

static QUALIFIED_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)(?:\.(\d+)(?:\.(\d+))?)?-([a-zA-Z][a-zA-Z0-9_-]*)$").unwrap()
});

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    pub major: u32,
    pub minor: Option<u32>,
    pub patch: Option<u32>,
    pub slug: String,
    pub raw: String,
}

impl QualifiedName {
    pub fn parse(raw: &str) -> Option<QualifiedName> {
        let caps = QUALIFIED_NAME_RE.captures(raw)?;
        Some(QualifiedName {
            major: caps[1].parse().ok()?,
            minor: caps.get(2).map(|m| m.as_str().parse()).transpose().ok()?,
            patch: caps.get(3).map(|m| m.as_str().parse()).transpose().ok()?,
            slug: caps[4].to_string(),
            raw: raw.to_string(),
        })
    }

    pub fn sort_key(&self) -> (u32, u32, u32, &str) {
        (
            self.major,
            self.minor.unwrap_or(0),
            self.patch.unwrap_or(0),
            self.raw.as_str(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct Issue {
    pub qualified_name: QualifiedName,
    pub path: PathBuf,
    pub state: IssueState,
}

#[derive(Debug, thiserror::Error)]
pub enum IssueStoreError {
    #[error("scan cap of {0} entries exceeded walking {1}")]
    ScanCapExceeded(usize, PathBuf),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub struct IssueStore {
    pub by_qualified_name: HashMap<String, Issue>,
    pub by_bare_name: IndexMap<String, Vec<String>>,
}

impl IssueStore {
    /// Walk `{repo}/.claude/cat/issues/` (depth ≤ 4), recording every
    /// directory containing a `STATE.md`. Malformed `STATE.md` files are
    /// skipped with a debug-level log, not surfaced as a load error.
    pub fn load(repo_root: &Path) -> Result<IssueStore, IssueStoreError> {
        let issues_root = repo_root.join(".claude/cat/issues");
        let mut by_qualified_name = HashMap::new();
        let mut visited = 0usize;

        if issues_root.exists() {
            walk(&issues_root, 0, &mut visited, &mut by_qualified_name, &issues_root)?;
        }

        let mut by_bare_name: IndexMap<String, Vec<String>> = IndexMap::new();
        for issue in by_qualified_name.values() {
            by_bare_name
                .entry(issue.qualified_name.slug.clone())
                .or_default()
                .push(issue.qualified_name.raw.clone());
        }
        for candidates in by_bare_name.values_mut() {
            candidates.sort();
        }

        Ok(IssueStore {
            by_qualified_name,
            by_bare_name,
        })
    }

    /// Resolve a name that may be either a qualified name or a bare name.
    /// A bare name with more than one candidate is ambiguous.
    pub fn resolve(&self, name: &str) -> ResolveResult<'_> {
        if let Some(issue) = self.by_qualified_name.get(name) {
            return ResolveResult::Found(issue);
        }
        match self.by_bare_name.get(name) {
            None => ResolveResult::NotFound,
            Some(candidates) if candidates.len() == 1 => {
                ResolveResult::Found(&self.by_qualified_name[&candidates[0]])
            }
            Some(candidates) => ResolveResult::Ambiguous(candidates.clone()),
        }
    }
}

pub enum ResolveResult<'a> {
    Found(&'a Issue),
    Ambiguous(Vec<String>),
    NotFound,
}

fn walk(
    dir: &Path,
    depth: usize,
    visited: &mut usize,
    out: &mut HashMap<String, Issue>,
    issues_root: &Path,
) -> Result<(), IssueStoreError> {
    if depth > MAX_DEPTH {
        return Ok(());
    }

    let entries = std::fs::read_dir(dir)?;
    for entry in entries {
        let entry = entry?;
        *visited += 1;
        if *visited > MAX_VISITED_ENTRIES {
            return Err(IssueStoreError::ScanCapExceeded(
                MAX_VISITED_ENTRIES,
                issues_root.to_path_buf(),
            ));
        }

        let path = entry.path();
        if !path.is_dir() {
            continue;
        }

        let state_path = path.join("STATE.md");
        if state_path.is_file() {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if let Some(qualified_name) = QualifiedName::parse(name) {
                    match load_issue(&path, qualified_name.clone()) {
                        Ok(issue) => {
                            out.insert(qualified_name.raw.clone(), issue);
                        }
                        Err(e) => {
                            log::debug!("skipping unparseable issue at {}: {e}", path.display());
                        }
                    }
                }
            }
        }

        walk(&path, depth + 1, visited, out, issues_root)?;
    }

    Ok(())
}

fn load_issue(path: &Path, qualified_name: QualifiedName) -> Result<Issue> {
    let raw_state = std::fs::read_to_string(path.join("STATE.md"))
        .with_context(|| format!("reading STATE.md at {}", path.display()))?;
    let state = parse_state(&raw_state).with_context(|| format!("parsing STATE.md at {}", path.display()))?;
    Ok(Issue {
        qualified_name,
        path: path.to_path_buf(),
        state,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_qualified_name() {
        let name = QualifiedName::parse("2.1.3-add-parser").unwrap();
        assert_eq!(name.major, 2);
        assert_eq!(name.minor, Some(1));
        assert_eq!(name.patch, Some(3));
        assert_eq!(name.slug, "add-parser");
    }

    #[test]
    fn parses_major_minor_only() {
        let name = QualifiedName::parse("2.1-add-parser").unwrap();
        assert_eq!(name.patch, None);
    }

    #[test]
    fn parses_major_only() {
        let name = QualifiedName::parse("2-add-parser").unwrap();
        assert_eq!(name.minor, None);
    }

    #[test]
    fn rejects_invalid_slug() {
        assert!(QualifiedName::parse("2.1-").is_none());
        assert!(QualifiedName::parse("2.1-9bad").is_none());
    }

    #[test]
    fn sort_key_orders_numerically_not_lexically() {
        let a = QualifiedName::parse("2.2-a").unwrap();
        let b = QualifiedName::parse("2.10-b").unwrap();
        assert!(a.sort_key() < b.sort_key());
    }

    #[test]
    fn load_builds_indexes_from_fixture_tree() {
        let dir = tempfile::TempDir::new().unwrap();
        let issue_dir = dir.path().join(".claude/cat/issues/v2/v2.1/2.1-add-parser");
        std::fs::create_dir_all(&issue_dir).unwrap();
        std::fs::write(
            issue_dir.join("STATE.md"),
            "- **Status:** open\n- **Dependencies:** []\n",
        )
        .unwrap();

        let store = IssueStore::load(dir.path()).unwrap();
        assert!(store.by_qualified_name.contains_key("2.1-add-parser"));
        assert_eq!(
            store.by_bare_name.get("add-parser"),
            Some(&vec!["2.1-add-parser".to_string()])
        );
    }

    #[test]
    fn resolve_ambiguous_bare_name() {
        let mut by_qualified_name = HashMap::new();
        by_qualified_name.insert(
            "2.1-a".to_string(),
            Issue {
                qualified_name: QualifiedName::parse("2.1-a").unwrap(),
                path: PathBuf::new(),
                state: IssueState {
                    status: Status::Open,
                    progress: None,
                    last_updated: None,
                    dependencies: vec![],
                    decomposed_into: vec![],
                },
            },
        );
        by_qualified_name.insert(
            "3.1-a".to_string(),
            Issue {
                qualified_name: QualifiedName::parse("3.1-a").unwrap(),
                path: PathBuf::new(),
                state: IssueState {
                    status: Status::Open,
                    progress: None,
                    last_updated: None,
                    dependencies: vec![],
                    decomposed_into: vec![],
                },
            },
        );
        let mut by_bare_name = IndexMap::new();
        by_bare_name.insert("a".to_string(), vec!["2.1-a".to_string(), "3.1-a".to_string()]);

        let store = IssueStore {
            by_qualified_name,
            by_bare_name,
        };
        assert!(matches!(store.resolve("a"), ResolveResult::Ambiguous(_)));
        assert!(matches!(store.resolve("2.1-a"), ResolveResult::Found(_)));
        assert!(matches!(store.resolve("missing"), ResolveResult::NotFound));
    }
}
