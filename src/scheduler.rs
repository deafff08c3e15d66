//! Scheduler: the central state machine that picks the next executable
//! issue and, as a side effect of returning `Found`, holds its lock.

use anyhow::Result;

use crate::depgraph::DependencyGraph;
use crate::issue::{IssueStore, QualifiedName, ResolveResult, Status};
use crate::lock::{AcquireResult, LockStore};

#[derive(Debug, Clone)]
pub enum Scope {
    All { exclude_glob: Option<String> },
    Issue(String),
    BareName(String),
}

#[derive(Debug, Clone)]
pub struct NotFoundDiagnostics {
    pub blocked_issues: Vec<String>,
    pub locked_issues: Vec<String>,
    pub circular_dependencies: Vec<String>,
    pub closed_count: usize,
    pub total_count: usize,
}

#[derive(Debug, Clone)]
pub enum SchedulerResult {
    Found {
        issue_id: String,
        major: u32,
        minor: Option<u32>,
        patch: Option<u32>,
        slug: String,
        issue_path: std::path::PathBuf,
    },
    NotFound(NotFoundDiagnostics),
    Locked {
        issue_id: String,
        holder: String,
    },
    Blocked {
        issue_id: String,
        blocking_issues: Vec<String>,
    },
    Decomposed {
        issue_id: String,
    },
    ExistingWorktree {
        issue_id: String,
        worktree_path: std::path::PathBuf,
    },
    AlreadyComplete {
        issue_id: String,
    },
    NotExecutable {
        issue_id: String,
        reason: String,
    },
    Error {
        message: String,
    },
}

pub struct Scheduler<'a> {
    store: &'a IssueStore,
    graph: &'a DependencyGraph,
    locks: &'a LockStore,
    worktree_exists: &'a dyn Fn(&str) -> bool,
}

impl<'a> Scheduler<'a> {
    pub fn new(
        store: &'a IssueStore,
        graph: &'a DependencyGraph,
        locks: &'a LockStore,
        worktree_exists: &'a dyn Fn(&str) -> bool,
    ) -> Self {
        Scheduler {
            store,
            graph,
            locks,
            worktree_exists,
        }
    }

    pub fn schedule(&self, scope: Scope, session_id: &str) -> SchedulerResult {
        match scope {
            Scope::All { exclude_glob } => self.schedule_all(exclude_glob.as_deref(), session_id),
            Scope::Issue(id) => self.schedule_target(&id, session_id),
            Scope::BareName(name) => match self.store.resolve(&name) {
                ResolveResult::Found(issue) => {
                    self.schedule_target(&issue.qualified_name.raw.clone(), session_id)
                }
                ResolveResult::Ambiguous(_) => SchedulerResult::NotExecutable {
                    issue_id: name,
                    reason: "ambiguous".to_string(),
                },
                ResolveResult::NotFound => SchedulerResult::NotExecutable {
                    issue_id: name,
                    reason: "not_found".to_string(),
                },
            },
        }
    }

    fn schedule_all(&self, exclude_glob: Option<&str>, session_id: &str) -> SchedulerResult {
        let cycles = match self.graph.find_cycles() {
            Ok(c) => c,
            Err(e) => return SchedulerResult::Error { message: e.to_string() },
        };
        let blocked = self.graph.blocked_issues(self.store);

        let mut candidates: Vec<&QualifiedName> = Vec::new();
        let mut closed_count = 0usize;
        let total_count = self.store.by_qualified_name.len();
        let mut locked_issues = Vec::new();

        for issue in self.store.by_qualified_name.values() {
            if issue.state.status == Status::Closed {
                closed_count += 1;
                continue;
            }
            if let Some(glob) = exclude_glob
                && glob_match(glob, &issue.qualified_name.slug)
            {
                continue;
            }
            if issue.state.status == Status::Decomposed && !issue.state.decomposed_into.is_empty() {
                continue;
            }
            if blocked.contains_key(&issue.qualified_name.raw) {
                continue;
            }
            if self.graph.is_cyclic(&issue.qualified_name.raw, &cycles) {
                continue;
            }
            let branch = &issue.qualified_name.raw;
            if (self.worktree_exists)(branch) {
                continue;
            }
            if let Ok(Some(existing)) = self.locks.read(&issue.qualified_name.raw)
                && !self.locks.is_stale(&existing)
            {
                locked_issues.push(issue.qualified_name.raw.clone());
                continue;
            }
            candidates.push(&issue.qualified_name);
        }

        candidates.sort_by_key(|q| q.sort_key());

        for candidate in candidates {
            match self.locks.acquire(&candidate.raw, session_id) {
                Ok(AcquireResult::Acquired) => {
                    let issue = &self.store.by_qualified_name[&candidate.raw];
                    return SchedulerResult::Found {
                        issue_id: candidate.raw.clone(),
                        major: candidate.major,
                        minor: candidate.minor,
                        patch: candidate.patch,
                        slug: candidate.slug.clone(),
                        issue_path: issue.path.clone(),
                    };
                }
                Ok(AcquireResult::Contested { .. }) => continue,
                Err(e) => return SchedulerResult::Error { message: e.to_string() },
            }
        }

        SchedulerResult::NotFound(NotFoundDiagnostics {
            blocked_issues: blocked.keys().cloned().collect(),
            locked_issues,
            circular_dependencies: cycles,
            closed_count,
            total_count,
        })
    }

    fn schedule_target(&self, issue_id: &str, session_id: &str) -> SchedulerResult {
        let Some(issue) = self.store.by_qualified_name.get(issue_id) else {
            return SchedulerResult::NotExecutable {
                issue_id: issue_id.to_string(),
                reason: "not_found".to_string(),
            };
        };

        if issue.state.status == Status::Closed {
            return SchedulerResult::AlreadyComplete {
                issue_id: issue_id.to_string(),
            };
        }

        if issue.state.status == Status::Decomposed && !issue.state.decomposed_into.is_empty() {
            return SchedulerResult::Decomposed {
                issue_id: issue_id.to_string(),
            };
        }

        if (self.worktree_exists)(issue_id) {
            return SchedulerResult::ExistingWorktree {
                issue_id: issue_id.to_string(),
                worktree_path: issue.path.clone(),
            };
        }

        let blocked = self.graph.blocked_issues(self.store);
        if let Some(blocking) = blocked.get(issue_id) {
            return SchedulerResult::Blocked {
                issue_id: issue_id.to_string(),
                blocking_issues: blocking.iter().map(|b| b.name.clone()).collect(),
            };
        }

        let cycles = match self.graph.find_cycles() {
            Ok(c) => c,
            Err(e) => return SchedulerResult::Error { message: e.to_string() },
        };
        if self.graph.is_cyclic(issue_id, &cycles) {
            return SchedulerResult::NotExecutable {
                issue_id: issue_id.to_string(),
                reason: "cyclic".to_string(),
            };
        }

        match self.locks.acquire(issue_id, session_id) {
            Ok(AcquireResult::Acquired) => SchedulerResult::Found {
                issue_id: issue_id.to_string(),
                major: issue.qualified_name.major,
                minor: issue.qualified_name.minor,
                patch: issue.qualified_name.patch,
                slug: issue.qualified_name.slug.clone(),
                issue_path: issue.path.clone(),
            },
            Ok(AcquireResult::Contested { holder_session_id }) => SchedulerResult::Locked {
                issue_id: issue_id.to_string(),
                holder: holder_session_id,
            },
            Err(e) => SchedulerResult::Error { message: e.to_string() },
        }
    }

    /// Release the lock for `issue_id` if a downstream step failed after
    /// `Found` was returned but before the caller's sequence completed.
    pub fn release_on_failure(&self, issue_id: &str, session_id: &str) -> Result<()> {
        self.locks.release(issue_id, session_id)
    }
}

/// A restricted glob matcher: `*` matches within a single path-free segment,
/// consistent with the suffix-glob semantics used elsewhere (§4.G step 6).
fn glob_match(pattern: &str, value: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == value,
        Some((prefix, suffix)) => value.starts_with(prefix) && value.ends_with(suffix),
    }
}
