//! Worktree Provisioner: the post-selection sequence that turns a
//! Scheduler `Found` result into a ready-to-work worktree, or unwinds
//! cleanly back to nothing on any failure.

use std::path::PathBuf;

use anyhow::Context;

use crate::agent_id::AgentId;
use crate::errors::CatError;
use crate::issue::{Plan, Precondition, parse_plan};
use crate::lock::LockStore;
use crate::repository::Repository;
use crate::utils::today;

pub const DEFAULT_TOKEN_LIMIT: u64 = 160_000;

const TOKENS_BASE: u64 = 10_000;
const TOKENS_PER_CREATED_FILE: u64 = 5_000;
const TOKENS_PER_MODIFIED_FILE: u64 = 3_000;
const TOKENS_PER_TEST_FILE: u64 = 4_000;
const TOKENS_PER_EXECUTION_STEP: u64 = 2_000;

const SUSPICIOUS_COMMIT_SCAN_DEPTH: usize = 20;

pub struct ProvisionRequest<'a> {
    pub issue_id: &'a str,
    pub issue_path: PathBuf,
    pub base_branch: &'a str,
    pub session_id: &'a str,
    pub agent_id: &'a AgentId,
    pub token_limit: u64,
}

#[derive(Debug, Clone)]
pub struct ExistingWork {
    pub commits_ahead: usize,
    pub recent_oneline: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SuspiciousCommits {
    pub grep_matches: Vec<String>,
    pub touched_planned_files: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Ready {
    pub issue_id: String,
    pub worktree_path: PathBuf,
    pub branch: String,
    pub base_branch: String,
    pub token_estimate: u64,
    pub goal: Option<String>,
    pub preconditions: Vec<Precondition>,
    pub existing_work: ExistingWork,
    pub suspicious_commits: SuspiciousCommits,
}

/// Run the 9-step sequence. Every step is reversible; any failure tears
/// down the worktree and releases the lock before returning `ERROR`.
pub fn provision(
    repo: &Repository,
    locks: &LockStore,
    req: &ProvisionRequest<'_>,
) -> Result<Ready, CatError> {
    match try_provision(repo, locks, req) {
        Ok(outcome) => Ok(outcome),
        Err(ProvisionError::Oversized { estimated_tokens, limit }) => {
            cleanup(repo, locks, req);
            Err(CatError::Oversized { estimated_tokens, limit })
        }
        Err(ProvisionError::Other(e)) => {
            cleanup(repo, locks, req);
            Err(CatError::other(e.to_string()))
        }
    }
}

enum ProvisionError {
    Oversized { estimated_tokens: u64, limit: u64 },
    Other(anyhow::Error),
}

impl From<anyhow::Error> for ProvisionError {
    fn from(e: anyhow::Error) -> Self {
        ProvisionError::Other(e)
    }
}

fn try_provision(
    repo: &Repository,
    locks: &LockStore,
    req: &ProvisionRequest<'_>,
) -> Result<Ready, ProvisionError> {
    let branch = req.issue_id.to_string();
    let worktree_path = repo.worktree_path(&branch);

    // 1. Create worktree.
    repo.create_worktree(&branch, &worktree_path, req.base_branch)
        .context("creating worktree")?;

    // 2. Record fork-point.
    let head = repo.head(repo.root()).context("reading HEAD")?;
    repo.record_branch_point(&branch, &head)
        .context("recording fork-point")?;

    // 3. Verify checkout.
    let current = repo
        .current_branch(&worktree_path)
        .context("verifying worktree checkout")?;
    if current != branch {
        anyhow::bail!("worktree checked out {current}, expected {branch}");
    }

    // 4. Update lock with worktree path.
    locks
        .update(
            req.issue_id,
            req.session_id,
            &worktree_path.to_string_lossy(),
            req.agent_id,
        )
        .context("updating lock with worktree path")?;

    // 5-6. Check for existing work and scan for suspicious commits.
    let report = check_existing_work(repo, req.issue_id, &req.issue_path, req.base_branch)
        .context("checking existing work")?;
    let existing_work = report.existing_work;
    let suspicious_commits = report.suspicious_commits;

    let plan_path = req.issue_path.join("PLAN.md");
    let plan = load_plan(&plan_path)?;

    // 7. Update STATE.md: in-progress, 0%.
    let state_path = req.issue_path.join("STATE.md");
    let state_raw = std::fs::read_to_string(&state_path)
        .with_context(|| format!("reading {}", state_path.display()))?;
    let updated = crate::issue::apply_transition(
        &state_raw,
        crate::issue::Status::InProgress,
        0,
        &today(),
    );
    std::fs::write(&state_path, updated)
        .with_context(|| format!("writing {}", state_path.display()))?;

    // 8. Goal and pre-conditions already parsed above via `plan`.

    // 9. Token estimate.
    let token_estimate = estimate_tokens(&plan);
    if token_estimate > req.token_limit {
        return Err(ProvisionError::Oversized {
            estimated_tokens: token_estimate,
            limit: req.token_limit,
        });
    }

    Ok(Ready {
        issue_id: req.issue_id.to_string(),
        worktree_path,
        branch,
        base_branch: req.base_branch.to_string(),
        token_estimate,
        goal: plan.goal,
        preconditions: plan.preconditions,
        existing_work,
        suspicious_commits,
    })
}

/// The existing-work and suspicious-commit scan, standalone (provisioner
/// steps 5-6) against a worktree that already exists — used by
/// `existing-work-checker` to re-run the check without reprovisioning.
#[derive(Debug, Clone)]
pub struct ExistingWorkReport {
    pub existing_work: ExistingWork,
    pub suspicious_commits: SuspiciousCommits,
}

pub fn check_existing_work(
    repo: &Repository,
    issue_id: &str,
    issue_path: &std::path::Path,
    base_branch: &str,
) -> anyhow::Result<ExistingWorkReport> {
    let worktree_path = repo.worktree_path(issue_id);
    let commits_ahead = repo
        .count_commits_ahead(&worktree_path, base_branch)
        .context("counting commits ahead")?;
    let recent_oneline = repo
        .commits_ahead(&worktree_path, base_branch, 5)
        .context("reading recent commits")?;
    let existing_work = ExistingWork {
        commits_ahead,
        recent_oneline,
    };

    let slug = issue_id.rsplit_once('-').map(|(_, s)| s).unwrap_or(issue_id);
    let grep_matches = repo
        .log_grep(base_branch, slug)
        .unwrap_or_default()
        .into_iter()
        .filter(|line| !is_planning_commit(line))
        .collect();

    let plan_path = issue_path.join("PLAN.md");
    let plan = load_plan(&plan_path)?;
    let touched_planned_files = scan_suspicious_files(repo, base_branch, &plan);

    Ok(ExistingWorkReport {
        existing_work,
        suspicious_commits: SuspiciousCommits {
            grep_matches,
            touched_planned_files,
        },
    })
}

fn load_plan(path: &std::path::Path) -> anyhow::Result<Plan> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(parse_plan(&raw))
}

fn estimate_tokens(plan: &Plan) -> u64 {
    let test_files = plan
        .files_to_create
        .iter()
        .chain(plan.files_to_modify.iter())
        .filter(|f| f.contains("test"))
        .count() as u64;

    TOKENS_BASE
        + plan.files_to_create.len() as u64 * TOKENS_PER_CREATED_FILE
        + plan.files_to_modify.len() as u64 * TOKENS_PER_MODIFIED_FILE
        + test_files * TOKENS_PER_TEST_FILE
        + plan.execution_steps.len() as u64 * TOKENS_PER_EXECUTION_STEP
}

fn is_planning_commit(line: &str) -> bool {
    let subject = line.splitn(2, ' ').nth(1).unwrap_or(line);
    subject.starts_with("plan:") || subject.starts_with("issue:")
}

fn scan_suspicious_files(repo: &Repository, base: &str, plan: &Plan) -> Vec<String> {
    let commits = match repo.recent_commits_with_files(base, SUSPICIOUS_COMMIT_SCAN_DEPTH) {
        Ok(c) => c,
        Err(_) => return Vec::new(),
    };

    let declared: Vec<&str> = plan
        .files_to_create
        .iter()
        .chain(plan.files_to_modify.iter())
        .map(String::as_str)
        .collect();

    let mut out = Vec::new();
    for (commit, files) in commits {
        for file in files {
            if declared.iter().any(|pattern| suffix_glob_match(pattern, &file)) {
                out.push(format!("{commit}: {file}"));
            }
        }
    }
    out
}

/// `*` matches a single path segment; otherwise a plain suffix match.
fn suffix_glob_match(pattern: &str, path: &str) -> bool {
    match pattern.split_once('*') {
        None => path.ends_with(pattern),
        Some((_, suffix)) => path.ends_with(suffix),
    }
}

fn cleanup(repo: &Repository, locks: &LockStore, req: &ProvisionRequest<'_>) {
    let worktree_path = repo.worktree_path(req.issue_id);
    let _ = repo.remove_worktree(&worktree_path, true);
    let _ = repo.delete_branch(req.issue_id);
    let _ = locks.release(req.issue_id, req.session_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_estimate_matches_heuristic() {
        let plan = Plan {
            goal: None,
            files_to_create: vec!["src/a.rs".into(), "tests/a_test.rs".into()],
            files_to_modify: vec!["src/lib.rs".into()],
            execution_steps: vec!["one".into(), "two".into(), "three".into()],
            preconditions: vec![],
        };
        // base 10_000 + 2*5_000 (create) + 1*3_000 (modify) + 1*4_000 (one test file) + 3*2_000 (steps)
        assert_eq!(estimate_tokens(&plan), 10_000 + 10_000 + 3_000 + 4_000 + 6_000);
    }

    #[test]
    fn suffix_glob_match_handles_single_segment_star() {
        assert!(suffix_glob_match("src/*.rs", "src/parser.rs"));
        assert!(suffix_glob_match("src/lib.rs", "src/lib.rs"));
        assert!(!suffix_glob_match("src/lib.rs", "other/lib.rs"));
    }

    #[test]
    fn planning_commits_are_filtered_from_grep_matches() {
        assert!(is_planning_commit("abcdef plan: add issue 2.1"));
        assert!(!is_planning_commit("abcdef feat: implement parser"));
    }
}
